//! XOR-MAPPED-ADDRESS attribute (RFC 5389 Section 15.2).
//!
//! The port is XOR'd with the top half of the magic cookie, an IPv4 address
//! with the magic cookie, an IPv6 address with the cookie followed by the
//! transaction id.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use crate::message_header::MAGIC_COOKIE;

/// Address family values according to RFC 5389.
const FAMILY_IPV4: u8 = 0x01;
const FAMILY_IPV6: u8 = 0x02;

fn xor_mask(transaction_id: &[u8; 12]) -> [u8; 16] {
    let mut mask = [0u8; 16];
    mask[..4].copy_from_slice(&MAGIC_COOKIE.to_be_bytes());
    mask[4..].copy_from_slice(transaction_id);
    mask
}

/// Encodes `addr` as an XOR-MAPPED-ADDRESS value.
pub fn encode(addr: &SocketAddr, transaction_id: &[u8; 12]) -> Vec<u8> {
    let mask = xor_mask(transaction_id);
    let port = addr.port() ^ (MAGIC_COOKIE >> 16) as u16;

    let mut out = Vec::with_capacity(20);
    match addr.ip() {
        IpAddr::V4(ip) => {
            out.extend_from_slice(&[0, FAMILY_IPV4]);
            out.extend_from_slice(&port.to_be_bytes());
            out.extend(ip.octets().iter().zip(mask.iter()).map(|(b, m)| b ^ m));
        }
        IpAddr::V6(ip) => {
            out.extend_from_slice(&[0, FAMILY_IPV6]);
            out.extend_from_slice(&port.to_be_bytes());
            out.extend(ip.octets().iter().zip(mask.iter()).map(|(b, m)| b ^ m));
        }
    }
    out
}

/// Decodes an XOR-MAPPED-ADDRESS attribute value.
///
/// # Arguments
/// * `bytes` - The attribute value bytes
/// * `transaction_id` - The transaction ID from the message header
///
/// # Returns
/// * `Some(SocketAddr)` - If decoding succeeds
/// * `None` - If the format is invalid
pub fn decode(bytes: &[u8], transaction_id: &[u8; 12]) -> Option<SocketAddr> {
    if bytes.len() < 4 {
        return None;
    }

    let family = bytes[1];
    let mask = xor_mask(transaction_id);

    let xor_port = u16::from_be_bytes([bytes[2], bytes[3]]);
    let port = xor_port ^ (MAGIC_COOKIE >> 16) as u16;

    match family {
        FAMILY_IPV4 => {
            if bytes.len() < 8 {
                return None;
            }
            let ip = Ipv4Addr::new(
                bytes[4] ^ mask[0],
                bytes[5] ^ mask[1],
                bytes[6] ^ mask[2],
                bytes[7] ^ mask[3],
            );
            Some(SocketAddr::new(IpAddr::V4(ip), port))
        }
        FAMILY_IPV6 => {
            if bytes.len() < 20 {
                return None;
            }
            let mut octets = [0u8; 16];
            for (i, octet) in octets.iter_mut().enumerate() {
                *octet = bytes[4 + i] ^ mask[i];
            }
            let ip = Ipv6Addr::from(octets);
            Some(SocketAddr::new(IpAddr::V6(ip), port))
        }
        _ => None,
    }
}
