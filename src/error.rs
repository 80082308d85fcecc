use thiserror::Error;

/// Errors produced by the sequencer and sender-stats engines.
///
/// Every variant is recoverable: callers log it (or let the core log it for them)
/// and fall back to a benign default, per the failure semantics of each operation.
/// Nothing in this crate panics on these conditions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    #[error("packet too old to store in sequencer ring (diff {diff} < -{size})")]
    ErrTooOldPacket { diff: i64, size: u16 },

    #[error("padding range [{start}, {end}) starts before the already-excluded frontier")]
    ErrPaddingRangeBeforeHighest { start: u64, end: u64 },

    #[error("ext-SN {0} falls inside a padding exclusion and has no slot offset")]
    ErrOffsetNotFound(u64),

    #[error("receiver report reconstructs to an ext-SN older than the previously recorded one")]
    ErrRrOutOfOrder,

    #[error("receiver report reconstructs to an ext-SN before the stream's extStartSN")]
    ErrRrBeforeStart,

    #[error("receiver-reported loss count {0} could not be reconciled against prior state")]
    ErrUnexpectedLossCount(u32),

    #[error("snapshot delta spans {actual} expected packets, over the {limit} limit")]
    ErrTooManyPacketsInDelta { actual: u64, limit: u64 },

    #[error("range [{start}, {end}) overlaps an existing exclusion")]
    ErrRangeMapOverlap { start: u64, end: u64 },
}

pub type Result<T> = std::result::Result<T, Error>;
