//! First-byte classification of multiplexed datagrams.

/// Predicate deciding whether a datagram belongs to an endpoint.
pub type MatchFunc = Box<dyn Fn(&[u8]) -> bool + Send + Sync>;

/// Packet type classification for demultiplexing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    /// STUN binding request/response/indication
    Stun,
    /// ZRTP
    Zrtp,
    /// DTLS record (carries SCTP once the handshake is done)
    Dtls,
    /// TURN channel data
    Turn,
    /// SRTP media packet
    Srtp,
    /// SRTCP control packet
    Srtcp,
    Unknown,
}

/// Classify packet type by first byte (RFC 7983)
///
/// - STUN: 0-3
/// - ZRTP: 16-19
/// - DTLS: 20-63
/// - TURN channel: 64-79
/// - RTP/RTCP: 128-191, split on the payload type byte (192-223 is RTCP)
pub fn classify_packet(data: &[u8]) -> PacketType {
    let Some(&first) = data.first() else {
        return PacketType::Unknown;
    };

    match first {
        0..=3 => PacketType::Stun,
        16..=19 => PacketType::Zrtp,
        20..=63 => PacketType::Dtls,
        64..=79 => PacketType::Turn,
        128..=191 => {
            if is_rtcp(data) {
                PacketType::Srtcp
            } else {
                PacketType::Srtp
            }
        }
        _ => PacketType::Unknown,
    }
}

fn is_rtcp(data: &[u8]) -> bool {
    matches!(data.get(1), Some(192..=223))
}

/// Matches datagrams whose first byte is within `[lower, upper]`.
pub fn match_range(lower: u8, upper: u8) -> impl Fn(&[u8]) -> bool + Send + Sync + Clone {
    move |data: &[u8]| matches!(data.first(), Some(b) if (lower..=upper).contains(b))
}

pub fn match_all(_data: &[u8]) -> bool {
    true
}

pub fn match_stun(data: &[u8]) -> bool {
    classify_packet(data) == PacketType::Stun
}

pub fn match_zrtp(data: &[u8]) -> bool {
    classify_packet(data) == PacketType::Zrtp
}

pub fn match_dtls(data: &[u8]) -> bool {
    classify_packet(data) == PacketType::Dtls
}

pub fn match_turn(data: &[u8]) -> bool {
    classify_packet(data) == PacketType::Turn
}

pub fn match_srtp(data: &[u8]) -> bool {
    classify_packet(data) == PacketType::Srtp
}

pub fn match_srtcp(data: &[u8]) -> bool {
    classify_packet(data) == PacketType::Srtcp
}
