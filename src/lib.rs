#![warn(rust_2018_idioms)]

//! Per-downstream-track packet sequencing and sender-side RTP statistics for
//! an SFU.
//!
//! [`Sequencer`] remembers recently forwarded packets so that a later NACK
//! can be resolved back into a retransmittable packet. [`SenderStats`]
//! accumulates running counters for one outbound RTP stream and
//! cross-correlates them against inbound RTCP receiver reports to produce
//! delta reports and synthesized Sender Reports.

mod clock;
mod error;
mod ext;
mod ntp;
mod range_map;
mod sequencer;
mod stats;

#[cfg(test)]
mod mock;

pub use clock::FnTimeGen;
pub use error::{Error, Result};
pub use sequencer::{ExtPacketMeta, PacketMeta, Sequencer, DEFAULT_RTT_MS, MAX_ACK};
pub use stats::{RtpDeltaInfo, SenderStats, SenderStatsSnapshotView};
