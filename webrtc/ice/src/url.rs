//! STUN (RFC 7064) and TURN (RFC 7065) server URLs.
//!
//! Grammar: `scheme:host[:port][?transport=udp|tcp]`. The port defaults to
//! 3478 for `stun`/`turn` and 5349 for the TLS variants.

use std::fmt;
use std::str::FromStr;

use crate::errors::{IceError, UrlErrorKind};

const DEFAULT_PORT: u16 = 3478;
const DEFAULT_TLS_PORT: u16 = 5349;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemeType {
    Stun,
    Stuns,
    Turn,
    Turns,
}

impl SchemeType {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "stun" => Some(SchemeType::Stun),
            "stuns" => Some(SchemeType::Stuns),
            "turn" => Some(SchemeType::Turn),
            "turns" => Some(SchemeType::Turns),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SchemeType::Stun => "stun",
            SchemeType::Stuns => "stuns",
            SchemeType::Turn => "turn",
            SchemeType::Turns => "turns",
        }
    }

    fn is_turn(&self) -> bool {
        matches!(self, SchemeType::Turn | SchemeType::Turns)
    }

    fn is_secure(&self) -> bool {
        matches!(self, SchemeType::Stuns | SchemeType::Turns)
    }
}

impl fmt::Display for SchemeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtoType {
    Udp,
    Tcp,
}

impl ProtoType {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "udp" => Some(ProtoType::Udp),
            "tcp" => Some(ProtoType::Tcp),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProtoType::Udp => "udp",
            ProtoType::Tcp => "tcp",
        }
    }
}

impl fmt::Display for ProtoType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed ICE server URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Url {
    pub scheme: SchemeType,
    /// Host name or IP literal, without IPv6 brackets
    pub host: String,
    pub port: u16,
    pub proto: ProtoType,
}

impl Url {
    pub fn parse(raw: &str) -> Result<Self, IceError> {
        let Some((raw_scheme, rest)) = raw.split_once(':') else {
            return Err(IceError::syntax("invalid scheme type"));
        };
        if raw_scheme.is_empty() {
            return Err(IceError::Url {
                kind: UrlErrorKind::Unknown,
                reason: "missing protocol scheme",
            });
        }
        let scheme =
            SchemeType::parse(raw_scheme).ok_or(IceError::syntax("invalid scheme type"))?;

        let (opaque, query) = match rest.split_once('?') {
            Some((opaque, query)) => (opaque, query),
            None => (rest, ""),
        };

        let (host, port) = split_host_port(opaque)?;
        if host.is_empty() {
            return Err(IceError::syntax("invalid hostname"));
        }
        let port = match port {
            Some(raw_port) => raw_port
                .parse::<u16>()
                .map_err(|_| IceError::syntax("invalid port"))?,
            None if scheme.is_secure() => DEFAULT_TLS_PORT,
            None => DEFAULT_PORT,
        };

        let proto = if scheme.is_turn() {
            parse_transport(query)?.unwrap_or(match scheme {
                SchemeType::Turns => ProtoType::Tcp,
                _ => ProtoType::Udp,
            })
        } else {
            if !query.is_empty() {
                return Err(IceError::syntax("queries not supported in stun address"));
            }
            match scheme {
                SchemeType::Stuns => ProtoType::Tcp,
                _ => ProtoType::Udp,
            }
        };

        Ok(Url {
            scheme,
            host: host.to_string(),
            port,
            proto,
        })
    }

    pub fn is_secure(&self) -> bool {
        self.scheme.is_secure()
    }

    /// `host:port` with IPv6 literals bracketed, suitable for name resolution.
    pub fn host_port(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

fn split_host_port(opaque: &str) -> Result<(&str, Option<&str>), IceError> {
    let too_many_colons = IceError::Url {
        kind: UrlErrorKind::Unknown,
        reason: "too many colons in address",
    };

    if let Some(bracketed) = opaque.strip_prefix('[') {
        let Some((host, after)) = bracketed.split_once(']') else {
            return Err(IceError::Url {
                kind: UrlErrorKind::Unknown,
                reason: "missing ']' in address",
            });
        };
        if after.is_empty() {
            return Ok((host, None));
        }
        let Some(port) = after.strip_prefix(':') else {
            return Err(IceError::syntax("invalid port"));
        };
        if port.contains(':') {
            return Err(too_many_colons);
        }
        return Ok((host, Some(port)));
    }

    match opaque.split_once(':') {
        None => Ok((opaque, None)),
        Some((_, port)) if port.contains(':') => Err(too_many_colons),
        Some((host, port)) => Ok((host, Some(port))),
    }
}

/// Parses a TURN query; only a single `transport` key is allowed.
fn parse_transport(query: &str) -> Result<Option<ProtoType>, IceError> {
    let pairs: Vec<(&str, &str)> = query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| pair.split_once('=').unwrap_or((pair, "")))
        .collect();

    match pairs.as_slice() {
        [] => Ok(None),
        [("transport", value)] if !value.is_empty() => match ProtoType::parse(value) {
            Some(proto) => Ok(Some(proto)),
            None => Err(IceError::Url {
                kind: UrlErrorKind::NotSupported,
                reason: "invalid transport protocol type",
            }),
        },
        _ => Err(IceError::syntax("invalid query")),
    }
}

impl FromStr for Url {
    type Err = IceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Url::parse(s)
    }
}

impl fmt::Display for Url {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.scheme, self.host_port())?;
        if self.scheme.is_turn() {
            write!(f, "?transport={}", self.proto)?;
        }
        Ok(())
    }
}
