//! NTP <-> wallclock conversions used by the sender-stats engine to produce
//! Sender Report timestamps and to reconstruct RTT from RR LSR/DLSR fields.
//!
//! `unix2ntp` produces a 64-bit NTP timestamp: seconds since 1900 in the high
//! 32 bits, fractional seconds in the low 32.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

const NTP_EPOCH_OFFSET_SECS: u64 = 0x83AA_7E80;

pub(crate) fn unix2ntp(t: SystemTime) -> u64 {
    let d = t.duration_since(UNIX_EPOCH).unwrap_or(Duration::from_secs(0));
    let u = d.as_nanos() as u64;
    let mut s = u / 1_000_000_000;
    s += NTP_EPOCH_OFFSET_SECS;
    let mut f = u % 1_000_000_000;
    f <<= 32;
    f /= 1_000_000_000;
    s <<= 32;
    s | f
}

/// The middle 32 bits of a 64-bit NTP timestamp, as carried in an RTCP SR's
/// NTP field echo (the receiver's `last_sender_report`) and compared against
/// a compact "now" for RTT computation (RFC 3550 A.8).
pub(crate) fn compact(ntp: u64) -> u32 {
    ((ntp >> 16) & 0xFFFF_FFFF) as u32
}

/// RTT estimate in milliseconds from RFC 3550 A.8: `(now - DLSR - LSR)`,
/// where all three are compact (1/65536 s) NTP units.
pub(crate) fn rtt_ms(now: SystemTime, lsr: u32, dlsr: u32) -> u32 {
    let arrival = compact(unix2ntp(now));
    let rtt_compact = arrival.wrapping_sub(dlsr).wrapping_sub(lsr);
    ((rtt_compact as u64 * 1000) >> 16) as u32
}

/// Difference `a - b` between two full 64-bit NTP timestamps, in milliseconds.
pub(crate) fn diff_ms(a: u64, b: u64) -> i64 {
    let diff = a as i128 - b as i128;
    ((diff * 1000) >> 32) as i64
}

/// Inverse of [`unix2ntp`]: the wallclock `SystemTime` a full 64-bit NTP
/// timestamp represents.
pub(crate) fn ntp2unix(ntp: u64) -> SystemTime {
    let mut s = ntp >> 32;
    let f = ((ntp & 0xFFFF_FFFF) * 1_000_000_000) >> 32;
    s -= NTP_EPOCH_OFFSET_SECS;
    UNIX_EPOCH + Duration::new(s, f as u32)
}
