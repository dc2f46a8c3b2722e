//! Candidate gathering: local interface enumeration, host sockets and
//! server-reflexive discovery.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs, UdpSocket};
use std::sync::Arc;

use logging::Logger;

use crate::candidate::Candidate;
use crate::config::AgentConfig;
use crate::errors::{IceError, Result};
use crate::url::{SchemeType, Url};

/// A gathered candidate and the socket it receives on.
pub(crate) struct LocalCandidate {
    pub(crate) candidate: Candidate,
    pub(crate) socket: Arc<UdpSocket>,
}

/// Gathers host candidates for every usable interface, then one
/// server-reflexive candidate per reachable STUN server.
pub(crate) fn gather_candidates(
    config: &AgentConfig,
    urls: &[Url],
    logger: &Logger,
) -> Result<Vec<LocalCandidate>> {
    let mut gathered = Vec::new();

    for ip in local_interfaces(config.include_loopback) {
        let socket = match bind_in_range(ip, config.port_min, config.port_max) {
            Ok(socket) => socket,
            Err(e @ IceError::PortExhausted { .. }) => return Err(e),
            Err(e) => {
                logger.warn(&format!("Skipping interface {}: {}", ip, e));
                continue;
            }
        };
        let address = socket.local_addr()?;
        let candidate = Candidate::host(address, local_preference(gathered.len()));
        logger.debug(&format!("Gathered {}", candidate));
        gathered.push(LocalCandidate {
            candidate,
            socket: Arc::new(socket),
        });
    }

    for url in urls {
        if url.scheme != SchemeType::Stun {
            logger.warn(&format!("Skipping {}: only stun URLs are gathered", url));
            continue;
        }
        match server_reflexive(url, config, gathered.len()) {
            Ok(local) => {
                logger.debug(&format!("Gathered {} via {}", local.candidate, url));
                gathered.push(local);
            }
            Err(e) => logger.warn(&format!("STUN probe to {} failed: {}", url, e)),
        }
    }

    if gathered.is_empty() {
        return Err(IceError::NoCandidates);
    }
    Ok(gathered)
}

/// Earlier interfaces are preferred.
fn local_preference(index: usize) -> u16 {
    u16::MAX.saturating_sub(index as u16)
}

fn server_reflexive(url: &Url, config: &AgentConfig, index: usize) -> Result<LocalCandidate> {
    let server = url
        .host_port()
        .to_socket_addrs()?
        .find(SocketAddr::is_ipv4)
        .ok_or_else(|| IceError::StunProbe(format!("{} has no IPv4 address", url.host)))?;

    let socket = bind_in_range(
        IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        config.port_min,
        config.port_max,
    )?;
    let mapped = stun::binding_request(&socket, server, config.stun_timeout())?;
    let base = socket.local_addr()?;

    Ok(LocalCandidate {
        candidate: Candidate::server_reflexive(mapped, base, local_preference(index)),
        socket: Arc::new(socket),
    })
}

/// Binds a UDP socket on `ip`, on an ephemeral port when the range is
/// `0..=0`, otherwise on the first free port of the range.
pub(crate) fn bind_in_range(ip: IpAddr, port_min: u16, port_max: u16) -> Result<UdpSocket> {
    if port_min == 0 && port_max == 0 {
        return Ok(UdpSocket::bind(SocketAddr::new(ip, 0))?);
    }

    for port in port_min.max(1)..=port_max {
        if let Ok(socket) = UdpSocket::bind(SocketAddr::new(ip, port)) {
            return Ok(socket);
        }
    }
    Err(IceError::PortExhausted { port_min, port_max })
}

/// Whether an interface address may carry a host candidate.
pub(crate) fn is_usable(ip: IpAddr, include_loopback: bool) -> bool {
    if ip.is_unspecified() || ip.is_multicast() {
        return false;
    }
    if ip.is_loopback() {
        return include_loopback;
    }
    match ip {
        IpAddr::V4(v4) => !v4.is_link_local() && !v4.is_broadcast(),
        IpAddr::V6(v6) => {
            let segments = v6.segments();
            let link_local = segments[0] & 0xffc0 == 0xfe80;
            let site_local = segments[0] & 0xffc0 == 0xfec0;
            let ipv4_compatible = segments[..6].iter().all(|s| *s == 0);
            !link_local && !site_local && !ipv4_compatible
        }
    }
}

/// Addresses of the interfaces that are up, filtered by [`is_usable`].
#[cfg(unix)]
pub(crate) fn local_interfaces(include_loopback: bool) -> Vec<IpAddr> {
    let mut addrs = Vec::new();

    unsafe {
        let mut ifaddrs: *mut libc::ifaddrs = std::ptr::null_mut();
        if libc::getifaddrs(&mut ifaddrs) != 0 {
            return addrs;
        }

        let mut current = ifaddrs;
        while !current.is_null() {
            let ifa = &*current;
            current = ifa.ifa_next;

            let flags = ifa.ifa_flags as libc::c_int;
            if flags & libc::IFF_UP == 0 {
                continue;
            }
            if flags & libc::IFF_LOOPBACK != 0 && !include_loopback {
                continue;
            }
            if ifa.ifa_addr.is_null() {
                continue;
            }

            let ip = match (*ifa.ifa_addr).sa_family as libc::c_int {
                libc::AF_INET => {
                    let sockaddr_in = ifa.ifa_addr as *const libc::sockaddr_in;
                    IpAddr::V4(Ipv4Addr::from(
                        (*sockaddr_in).sin_addr.s_addr.to_ne_bytes(),
                    ))
                }
                libc::AF_INET6 => {
                    let sockaddr_in6 = ifa.ifa_addr as *const libc::sockaddr_in6;
                    IpAddr::V6(Ipv6Addr::from((*sockaddr_in6).sin6_addr.s6_addr))
                }
                _ => continue,
            };

            if is_usable(ip, include_loopback) && !addrs.contains(&ip) {
                addrs.push(ip);
            }
        }

        libc::freeifaddrs(ifaddrs);
    }

    addrs
}

#[cfg(not(unix))]
pub(crate) fn local_interfaces(include_loopback: bool) -> Vec<IpAddr> {
    if include_loopback {
        vec![IpAddr::V4(Ipv4Addr::LOCALHOST)]
    } else {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usable_addresses() {
        let usable = |s: &str, lo| is_usable(s.parse().unwrap(), lo);

        assert!(usable("192.168.1.10", false));
        assert!(usable("2001:db8::1", false));
        assert!(!usable("127.0.0.1", false));
        assert!(usable("127.0.0.1", true));
        assert!(!usable("::1", false));
        assert!(!usable("169.254.1.1", true));
        assert!(!usable("224.0.0.1", true));
        assert!(!usable("0.0.0.0", true));
        assert!(!usable("fe80::1", true));
        assert!(!usable("fec0::1", true));
        assert!(!usable("ff02::1", true));
        assert!(!usable("::10.0.0.1", true));
    }

    #[test]
    fn test_loopback_enumerated_on_request() {
        let with = local_interfaces(true);
        assert!(with.iter().any(|ip| ip.is_loopback()));
        assert!(local_interfaces(false).iter().all(|ip| !ip.is_loopback()));
    }

    #[test]
    fn test_bind_in_range_exhausted() {
        let taken = UdpSocket::bind("127.0.0.1:0").unwrap();
        let port = taken.local_addr().unwrap().port();

        let err = bind_in_range(IpAddr::V4(Ipv4Addr::LOCALHOST), port, port).unwrap_err();
        assert_eq!(
            err,
            IceError::PortExhausted {
                port_min: port,
                port_max: port
            }
        );
    }

    #[test]
    fn test_bind_in_range_uses_range() {
        let probe = UdpSocket::bind("127.0.0.1:0").unwrap();
        let port = probe.local_addr().unwrap().port();
        drop(probe);

        let socket = bind_in_range(IpAddr::V4(Ipv4Addr::LOCALHOST), port, port).unwrap();
        assert_eq!(socket.local_addr().unwrap().port(), port);
    }

    #[test]
    fn test_local_preference_decreases() {
        assert_eq!(local_preference(0), 65535);
        assert!(local_preference(1) < local_preference(0));
    }
}
