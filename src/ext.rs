//! Extended-sequence-number and extended-timestamp wrap arithmetic.
//!
//! The sequencer and the sender-stats engine both need to turn a narrow
//! wrapping wire counter (a 16-bit RTP sequence number, a 32-bit RTP
//! timestamp, a 24-bit RTCP loss count, ...) into a 64-bit monotonic
//! extension, given some nearby reference point. There are two distinct
//! shapes of that problem, and this module provides one helper for each.

/// Reconstructs the 64-bit value "near" `reference` whose low `bits` bits
/// equal `raw`'s low `bits` bits, preferring the epoch at-or-before
/// `reference`.
///
/// This is the right tool when you have an anchor (`extHighestSN`,
/// `extHighestTS`) and a bare wire value that is known to live within one
/// epoch of it, but you are not incrementally advancing a running counter
/// call-by-call (e.g. resolving an arbitrary NACKed sequence number against
/// the current high-water mark).
///
/// Note: this always borrows an epoch down when `raw`'s low bits are
/// greater than `reference`'s low bits, with no check that the borrow is
/// actually warranted (e.g. that `raw` is within half the domain of
/// `reference`). For `bits == 16` that is safe given the bounded windows
/// this crate uses it over. For `bits == 32` (ext-TS reconstruction) it is
/// not symmetric and can misattribute a timestamp whose true epoch is
/// older than one wrap — preserved intentionally, see DESIGN.md.
pub(crate) fn reconstruct_near(reference: u64, raw: u64, bits: u32) -> u64 {
    debug_assert!(bits > 0 && bits <= 64);
    let mask: u64 = if bits == 64 { u64::MAX } else { (1u64 << bits) - 1 };
    let raw_low = raw & mask;
    let mut v = (reference & !mask) | raw_low;
    if raw_low > (reference & mask) {
        v = v.wrapping_sub(1u64 << bits);
    }
    v
}

/// Reconstructs the smallest 64-bit value at-or-after `anchor` whose low
/// `bits` bits equal `raw`'s low `bits` bits.
///
/// This is the mirror image of [`reconstruct_near`]: where that helper
/// always prefers the epoch at-or-before its reference (right for
/// resolving a past sample against a high-water mark), this one always
/// prefers the epoch at-or-after its anchor. That's the right tool for
/// seeding a counter from its very first sample against a known lower
/// bound (e.g. reconstructing a receiver report's reported sequence number
/// against a stream's `extStartSN`, which the report can never legitimately
/// predate) rather than against a running high-water mark.
pub(crate) fn reconstruct_at_or_after(anchor: u64, raw: u64, bits: u32) -> u64 {
    debug_assert!(bits > 0 && bits < 64);
    let modulus: u64 = 1u64 << bits;
    let mask: u64 = modulus - 1;
    let raw_low = raw & mask;
    let mut v = (anchor & !mask) | raw_low;
    if v < anchor {
        v = v.wrapping_add(modulus);
    }
    v
}

/// Extends `raw` (an up-to-`bits`-wide wrapping wire counter) into the
/// 64-bit domain by adding the signed, wrapped delta from `prev_ext`'s own
/// low `bits` bits.
///
/// This is the right tool for a counter that is advanced incrementally,
/// call over call (the receiver-reported highest sequence number, the
/// receiver-reported cumulative loss count): it carries the high bits of
/// `prev_ext` forward unchanged unless the new raw value "crosses back"
/// below the previous one by more than half the field's domain, in which
/// case it is treated as a forward wrap rather than a real regression.
pub(crate) fn extend_counter(prev_ext: u64, raw: u64, bits: u32) -> u64 {
    debug_assert!(bits > 0 && bits < 64);
    let modulus: u64 = 1u64 << bits;
    let mask = modulus - 1;
    let half = modulus / 2;

    let prev_low = prev_ext & mask;
    let raw_low = raw & mask;
    let diff = raw_low.wrapping_sub(prev_low) & mask;
    let signed_delta: i64 = if diff < half {
        diff as i64
    } else {
        diff as i64 - modulus as i64
    };

    (prev_ext as i64).wrapping_add(signed_delta) as u64
}
