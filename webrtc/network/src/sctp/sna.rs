//! Serial number arithmetic (RFC 1982) for TSNs and stream sequence numbers.
//!
//! `a` is greater than `b` when `a - b` (mod 2^n) is in `(0, 2^(n-1))`;
//! exactly half the range apart is neither greater nor smaller.

const HALF_32: u32 = 1 << 31;
const HALF_16: u16 = 1 << 15;

pub fn sna32_gt(a: u32, b: u32) -> bool {
    let diff = a.wrapping_sub(b);
    diff > 0 && diff < HALF_32
}

pub fn sna32_lt(a: u32, b: u32) -> bool {
    sna32_gt(b, a)
}

pub fn sna32_gte(a: u32, b: u32) -> bool {
    a == b || sna32_gt(a, b)
}

pub fn sna32_lte(a: u32, b: u32) -> bool {
    a == b || sna32_lt(a, b)
}

pub fn sna16_gt(a: u16, b: u16) -> bool {
    let diff = a.wrapping_sub(b);
    diff > 0 && diff < HALF_16
}

pub fn sna16_lt(a: u16, b: u16) -> bool {
    sna16_gt(b, a)
}
