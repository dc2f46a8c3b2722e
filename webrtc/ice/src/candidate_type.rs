//! ICE candidate types.

use crate::errors::IceError;

/// Represents the type of ICE candidate according to RFC 8445.
///
/// # Candidate Types
/// - **Host**: bound to a port on a local interface
/// - **Srflx**: Server Reflexive, the NAT-mapped address seen by a STUN server
/// - **Prflx**: Peer Reflexive, learned from a check (parsed, never gathered)
/// - **Relay**: allocated on a TURN server (parsed, never gathered)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CandidateType {
    #[default]
    Host,
    Srflx,
    Prflx,
    Relay,
}

impl CandidateType {
    /// Parses the `typ` token of a candidate attribute.
    pub fn parse(s: &str) -> Result<Self, IceError> {
        match s {
            "host" => Ok(CandidateType::Host),
            "srflx" => Ok(CandidateType::Srflx),
            "prflx" => Ok(CandidateType::Prflx),
            "relay" => Ok(CandidateType::Relay),
            _ => Err(IceError::InvalidCandidate(format!("unknown type {}", s))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CandidateType::Host => "host",
            CandidateType::Srflx => "srflx",
            CandidateType::Prflx => "prflx",
            CandidateType::Relay => "relay",
        }
    }

    /// Recommended type preference (RFC 8445 §5.1.2.2).
    pub fn preference(&self) -> u32 {
        match self {
            CandidateType::Host => 126,
            CandidateType::Prflx => 110,
            CandidateType::Srflx => 100,
            CandidateType::Relay => 0,
        }
    }
}

impl std::fmt::Display for CandidateType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_roundtrip() {
        for candidate_type in [
            CandidateType::Host,
            CandidateType::Srflx,
            CandidateType::Prflx,
            CandidateType::Relay,
        ] {
            assert_eq!(CandidateType::parse(candidate_type.as_str()).unwrap(), candidate_type);
            assert_eq!(candidate_type.to_string(), candidate_type.as_str());
        }
    }

    #[test]
    fn test_parse_is_case_sensitive() {
        assert!(CandidateType::parse("HOST").is_err());
        assert!(CandidateType::parse(" host").is_err());
        assert!(CandidateType::parse("").is_err());
    }

    #[test]
    fn test_preferences() {
        assert_eq!(CandidateType::Host.preference(), 126);
        assert_eq!(CandidateType::Srflx.preference(), 100);
        assert!(CandidateType::Prflx.preference() > CandidateType::Srflx.preference());
        assert_eq!(CandidateType::Relay.preference(), 0);
    }
}
