//! ICE candidate representation and parsing.
//!
//! This module provides the `Candidate` type, its RFC 8445 priority and the
//! SDP attribute form used to exchange candidates with the peer.

use std::net::{IpAddr, SocketAddr};
use std::time::Instant;

use crate::{candidate_type::CandidateType, errors::IceError};

/// The only component a data-channel transport uses.
pub const COMPONENT_RTP: u16 = 1;

/// Represents an ICE candidate.
///
/// SDP form:
/// ```text
/// candidate:<foundation> <component-id> udp <priority> <address> <port> typ <cand-type> [raddr <rel-addr> rport <rel-port>]
/// ```
///
/// Equality ignores the activity timestamps.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub foundation: String,
    pub component: u16,
    pub candidate_type: CandidateType,
    pub address: SocketAddr,
    /// Base of a reflexive candidate (the local socket it was learned on)
    pub related_address: Option<SocketAddr>,
    pub priority: u32,
    pub last_received: Option<Instant>,
    pub last_sent: Option<Instant>,
}

impl Candidate {
    pub fn host(address: SocketAddr, local_pref: u16) -> Self {
        Self::new(CandidateType::Host, address, None, local_pref)
    }

    /// Server-reflexive candidate mapped from the socket bound at `base`.
    pub fn server_reflexive(mapped: SocketAddr, base: SocketAddr, local_pref: u16) -> Self {
        Self::new(CandidateType::Srflx, mapped, Some(base), local_pref)
    }

    fn new(
        candidate_type: CandidateType,
        address: SocketAddr,
        related_address: Option<SocketAddr>,
        local_pref: u16,
    ) -> Self {
        let base_ip = related_address.unwrap_or(address).ip();
        Self {
            foundation: foundation(candidate_type, base_ip),
            component: COMPONENT_RTP,
            candidate_type,
            address,
            related_address,
            priority: Self::calculate_priority(
                candidate_type.preference(),
                local_pref,
                COMPONENT_RTP,
            ),
            last_received: None,
            last_sent: None,
        }
    }

    /// Priority = (2^24)*(type preference) + (2^8)*(local preference) + (256 - component ID)
    pub fn calculate_priority(type_pref: u32, local_pref: u16, component: u16) -> u32 {
        (type_pref << 24) + ((local_pref as u32) << 8) + (256 - component as u32)
    }

    /// Parses an SDP candidate attribute, with or without the `candidate:` prefix.
    pub fn parse(value: &str) -> Result<Self, IceError> {
        let value = value.trim();
        let value = value.strip_prefix("a=").unwrap_or(value);
        let value = value.strip_prefix("candidate:").unwrap_or(value);
        let invalid = |what: &str| IceError::InvalidCandidate(format!("{}: {}", what, value));

        let parts: Vec<&str> = value.split_whitespace().collect();
        if parts.len() < 8 || parts[6] != "typ" {
            return Err(invalid("malformed attribute"));
        }

        let foundation = parts[0].to_string();
        let component: u16 = parts[1].parse().map_err(|_| invalid("bad component"))?;
        if !parts[2].eq_ignore_ascii_case("udp") {
            return Err(invalid("unsupported transport"));
        }
        let priority: u32 = parts[3].parse().map_err(|_| invalid("bad priority"))?;
        let ip: IpAddr = parts[4].parse().map_err(|_| invalid("bad address"))?;
        let port: u16 = parts[5].parse().map_err(|_| invalid("bad port"))?;
        let candidate_type = CandidateType::parse(parts[7])?;

        let mut related_ip = None;
        let mut related_port = None;
        let mut i = 8;
        while i + 1 < parts.len() {
            match parts[i] {
                "raddr" => {
                    related_ip = Some(
                        parts[i + 1]
                            .parse::<IpAddr>()
                            .map_err(|_| invalid("bad related address"))?,
                    );
                }
                "rport" => {
                    related_port = Some(
                        parts[i + 1]
                            .parse::<u16>()
                            .map_err(|_| invalid("bad related port"))?,
                    );
                }
                _ => {}
            }
            i += 2;
        }

        Ok(Candidate {
            foundation,
            component,
            candidate_type,
            address: SocketAddr::new(ip, port),
            related_address: related_ip.map(|ip| SocketAddr::new(ip, related_port.unwrap_or(0))),
            priority,
            last_received: None,
            last_sent: None,
        })
    }

    pub(crate) fn same_family(&self, other: &Candidate) -> bool {
        self.address.is_ipv4() == other.address.is_ipv4()
    }
}

/// Same foundation for candidates of one type sharing a base IP.
fn foundation(candidate_type: CandidateType, base: IpAddr) -> String {
    let mut hash: u32 = 0x811c_9dc5;
    let octets = match base {
        IpAddr::V4(ip) => ip.octets().to_vec(),
        IpAddr::V6(ip) => ip.octets().to_vec(),
    };
    for byte in candidate_type.as_str().bytes().chain(octets) {
        hash ^= byte as u32;
        hash = hash.wrapping_mul(0x0100_0193);
    }
    hash.to_string()
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.foundation == other.foundation
            && self.component == other.component
            && self.candidate_type == other.candidate_type
            && self.address == other.address
            && self.related_address == other.related_address
            && self.priority == other.priority
    }
}

impl Eq for Candidate {}

impl std::fmt::Display for Candidate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "candidate:{} {} udp {} {} {} typ {}",
            self.foundation,
            self.component,
            self.priority,
            self.address.ip(),
            self.address.port(),
            self.candidate_type
        )?;

        if let Some(related) = self.related_address {
            write!(f, " raddr {} rport {}", related.ip(), related.port())?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};

    #[test]
    fn test_host_priority() {
        let candidate = Candidate::host("192.168.1.1:8080".parse().unwrap(), 65535);
        assert_eq!(candidate.priority, 2130706431);
        assert_eq!(candidate.component, 1);
        assert_eq!(candidate.candidate_type, CandidateType::Host);
    }

    #[test]
    fn test_srflx_priority_below_host() {
        let host = Candidate::host("10.0.0.2:5000".parse().unwrap(), 65535);
        let srflx = Candidate::server_reflexive(
            "203.0.113.1:40000".parse().unwrap(),
            "10.0.0.2:5000".parse().unwrap(),
            65535,
        );
        assert_eq!(srflx.priority, (100 << 24) + (65535 << 8) + 255);
        assert!(srflx.priority < host.priority);
        assert_ne!(srflx.foundation, host.foundation);
    }

    #[test]
    fn test_foundation_shared_by_type_and_base() {
        let a = Candidate::host("10.0.0.2:5000".parse().unwrap(), 10);
        let b = Candidate::host("10.0.0.2:6000".parse().unwrap(), 20);
        let c = Candidate::host("10.0.0.3:5000".parse().unwrap(), 10);
        assert_eq!(a.foundation, b.foundation);
        assert_ne!(a.foundation, c.foundation);
    }

    #[test]
    fn test_parse_host_candidate() {
        let candidate = Candidate::parse("candidate:1 1 UDP 2130706431 192.168.1.1 8080 typ host").unwrap();
        assert_eq!(candidate.foundation, "1");
        assert_eq!(candidate.priority, 2130706431);
        assert_eq!(
            candidate.address,
            SocketAddr::new(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 1)), 8080)
        );
        assert!(candidate.related_address.is_none());
    }

    #[test]
    fn test_parse_srflx_with_related() {
        let candidate =
            Candidate::parse("2 1 udp 1694498815 203.0.113.1 54321 typ srflx raddr 192.168.1.1 rport 8080")
                .unwrap();
        assert_eq!(candidate.candidate_type, CandidateType::Srflx);
        assert_eq!(candidate.related_address, Some("192.168.1.1:8080".parse().unwrap()));
    }

    #[test]
    fn test_parse_ipv6() {
        let candidate = Candidate::parse("3 1 udp 100 2001:db8::1 9 typ host").unwrap();
        assert_eq!(
            candidate.address.ip(),
            IpAddr::V6("2001:db8::1".parse::<Ipv6Addr>().unwrap())
        );
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for input in [
            "",
            "1 1 udp 100 10.0.0.1 9 host",
            "1 1 tcp 100 10.0.0.1 9 typ host",
            "1 x udp 100 10.0.0.1 9 typ host",
            "1 1 udp 100 10.0.0.300 9 typ host",
            "1 1 udp 100 10.0.0.1 99999 typ host",
            "1 1 udp 100 10.0.0.1 9 typ bogus",
        ] {
            assert!(Candidate::parse(input).is_err(), "{}", input);
        }
    }

    #[test]
    fn test_display_parses_back() {
        let srflx = Candidate::server_reflexive(
            "203.0.113.1:40000".parse().unwrap(),
            "10.0.0.2:5000".parse().unwrap(),
            7,
        );
        let text = srflx.to_string();
        assert!(text.starts_with("candidate:"));
        assert!(text.ends_with("typ srflx raddr 10.0.0.2 rport 5000"));
        assert_eq!(Candidate::parse(&text).unwrap(), srflx);
    }

    #[test]
    fn test_equality_ignores_timestamps() {
        let a = Candidate::host("127.0.0.1:1000".parse().unwrap(), 1);
        let mut b = a.clone();
        b.last_received = Some(Instant::now());
        assert_eq!(a, b);
    }
}
