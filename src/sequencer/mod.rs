//! Per-downstream-track packet sequencer.
//!
//! Remembers the last `size` forwarded packets, keyed by rewritten
//! (ext-SN-derived) ring slot, so that a later NACK for one of those
//! sequence numbers can be resolved back into the publisher's original
//! packet plus the rewriting that was applied to it. Also throttles
//! repeated NACKs for the same packet.

#[cfg(test)]
mod sequencer_test;

use crate::clock;
use crate::clock::FnTimeGen;
use crate::error::Error;
use crate::ext::reconstruct_near;
use crate::range_map::RangeMap;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;

/// Maximum number of times a single forwarded packet will be retransmitted
/// in response to NACKs.
pub const MAX_ACK: u8 = 3;

/// Default minimum gap, in milliseconds, enforced between honored NACKs for
/// the same packet when no RTT estimate is available.
pub const DEFAULT_RTT_MS: u32 = 70;

/// A forwarded packet's recorded metadata, indexed by ring slot.
#[derive(Debug, Clone, Default)]
pub struct PacketMeta {
    /// Sequence number as received from the publisher.
    pub source_seq_no: u16,
    /// Sequence number as forwarded to the downstream receiver.
    pub target_seq_no: u16,
    /// Rewritten RTP timestamp (low 32 bits of the ext-TS at push time).
    pub timestamp: u32,
    pub marker: bool,
    /// ms since sequencer start at which a NACK was last honored for this packet.
    pub last_nack: u32,
    /// Count of honored NACKs for this packet, capped at [`MAX_ACK`].
    pub nacked: u8,
    pub layer: i8,
    pub codec_bytes: Vec<u8>,
    pub dd_bytes: Vec<u8>,
}

impl PacketMeta {
    fn is_empty(&self) -> bool {
        self.source_seq_no == 0 && self.target_seq_no == 0
    }

    fn invalidate(&mut self) {
        self.source_seq_no = 0;
        self.target_seq_no = 0;
    }
}

/// A [`PacketMeta`] augmented with the full 64-bit ext-SN/ext-TS, as handed
/// to the retransmission pipeline.
#[derive(Debug, Clone)]
pub struct ExtPacketMeta {
    pub packet_meta: PacketMeta,
    pub ext_sequence_number: u64,
    pub ext_timestamp: u64,
}

struct Inner {
    packets: Vec<PacketMeta>,
    size: u16,
    start_time: i64,
    initialized: bool,
    ext_highest_sn: u64,
    ext_highest_ts: u64,
    sn_offset: u64,
    range_map: RangeMap,
    rtt: u32,
}

impl Inner {
    fn ref_time(&self, packet_time_ms: i64) -> u32 {
        packet_time_ms.saturating_sub(self.start_time).max(0) as u32
    }

    fn refresh_offset(&mut self) {
        match self.range_map.get_value(self.ext_highest_sn.wrapping_add(1)) {
            Ok(v) => self.sn_offset = v,
            Err(err) => {
                log::warn!("sequencer: failed to refresh padding offset: {}", err);
            }
        }
        self.range_map
            .trim_before(self.ext_highest_sn.saturating_sub(self.size as u64));
    }

}

/// Bounded ring of recently-forwarded packet metadata for one downstream track.
pub struct Sequencer {
    inner: Mutex<Inner>,
    now_fn: Option<FnTimeGen>,
}

impl Sequencer {
    pub fn new(size: u16) -> Self {
        Self::with_clock(size, None)
    }

    pub fn with_clock(size: u16, now_fn: Option<FnTimeGen>) -> Self {
        Sequencer {
            inner: Mutex::new(Inner {
                packets: vec![PacketMeta::default(); size as usize],
                size,
                // Latched from the (possibly injected) clock on the first
                // `push`, not read eagerly here: reading it at construction
                // would pin it to real wall-clock time even when a mock
                // clock is supplied, breaking the NACK-gating window's
                // determinism under test.
                start_time: 0,
                initialized: false,
                ext_highest_sn: 0,
                ext_highest_ts: 0,
                sn_offset: 0,
                range_map: RangeMap::new(((size as usize + 1) / 2).max(1)),
                rtt: DEFAULT_RTT_MS,
            }),
            now_fn,
        }
    }

    /// Records one forwarded packet.
    #[allow(clippy::too_many_arguments)]
    pub async fn push(
        &self,
        packet_time_ms: i64,
        ext_incoming_sn: u64,
        ext_modified_sn: u64,
        ext_modified_ts: u64,
        marker: bool,
        layer: i8,
        codec_bytes: &[u8],
        dd_bytes: &[u8],
    ) {
        let mut inner = self.inner.lock().await;

        if !inner.initialized {
            let now = clock::now(&self.now_fn).await;
            inner.start_time = now
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis() as i64)
                .unwrap_or(0);
            inner.ext_highest_sn = ext_modified_sn.wrapping_sub(1);
            inner.ext_highest_ts = ext_modified_ts;
            inner.initialized = true;
            inner.refresh_offset();
        }

        let diff = ext_modified_sn as i64 - inner.ext_highest_sn as i64;
        let size = inner.size;

        let offset = if diff >= 0 {
            inner.ext_highest_sn = ext_modified_sn;
            inner.sn_offset
        } else if diff < -(size as i64) {
            log::warn!("sequencer: {}", Error::ErrTooOldPacket { diff, size });
            return;
        } else {
            match inner.range_map.get_value(ext_modified_sn) {
                Ok(v) => v,
                Err(err) => {
                    log::warn!("sequencer: {}", err);
                    return;
                }
            }
        };

        if (ext_modified_ts as i64 - inner.ext_highest_ts as i64) > 0 {
            inner.ext_highest_ts = ext_modified_ts;
        }

        let slot = ((ext_modified_sn.wrapping_sub(offset)) % size as u64) as usize;
        let ref_time = inner.ref_time(packet_time_ms);
        inner.packets[slot] = PacketMeta {
            source_seq_no: (ext_incoming_sn & 0xFFFF) as u16,
            target_seq_no: (ext_modified_sn & 0xFFFF) as u16,
            timestamp: (ext_modified_ts & 0xFFFF_FFFF) as u32,
            marker,
            last_nack: ref_time,
            nacked: 0,
            layer,
            codec_bytes: codec_bytes.to_vec(),
            dd_bytes: dd_bytes.to_vec(),
        };
    }

    /// Declares `[start_inclusive, end_inclusive]` as padding that was never
    /// actually forwarded.
    pub async fn push_padding(&self, start_inclusive: u64, end_inclusive: u64) {
        if end_inclusive < start_inclusive {
            return;
        }

        let mut inner = self.inner.lock().await;

        if end_inclusive <= inner.ext_highest_sn {
            let size = inner.size as u64;
            if start_inclusive + size <= inner.ext_highest_sn {
                log::warn!(
                    "sequencer: {}",
                    Error::ErrPaddingRangeBeforeHighest {
                        start: start_inclusive,
                        end: end_inclusive,
                    }
                );
                return;
            }
            let mut sn = start_inclusive;
            while sn <= end_inclusive {
                let offset = inner.range_map.get_value(sn).unwrap_or(inner.sn_offset);
                let idx = (sn.wrapping_sub(offset) % size) as usize;
                if inner.packets[idx].target_seq_no == (sn & 0xFFFF) as u16 {
                    inner.packets[idx].invalidate();
                }
                sn += 1;
            }
            return;
        }

        match inner.range_map.exclude_range(start_inclusive, end_inclusive + 1) {
            Ok(()) => {
                inner.ext_highest_sn = end_inclusive;
                inner.refresh_offset();
            }
            Err(err) => {
                log::warn!("sequencer: {}", err);
            }
        }
    }

    /// Resolves a batch of NACKed (raw, 16-bit) target sequence numbers into
    /// retransmittable packet metadata, honoring the per-packet retry cap
    /// and retransmission-gating window.
    pub async fn get_ext_packet_metas(&self, sn_list: &[u16]) -> Vec<ExtPacketMeta> {
        let mut inner = self.inner.lock().await;
        if !inner.initialized {
            return Vec::new();
        }

        let now = clock::now(&self.now_fn).await;
        let now_ms = now
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);
        let ref_now = inner.ref_time(now_ms);
        let window_ms = 100u32.min(2u32.saturating_mul(inner.rtt));

        let size = inner.size as u64;
        let ext_highest_sn = inner.ext_highest_sn;
        let ext_highest_ts = inner.ext_highest_ts;

        let mut metas = Vec::with_capacity(sn_list.len());
        for &sn in sn_list {
            let ext_sn = reconstruct_near(ext_highest_sn, sn as u64, 16);

            if ext_highest_sn.saturating_sub(ext_sn) >= size {
                continue;
            }

            let offset = match inner.range_map.get_value(ext_sn) {
                Ok(v) => v,
                Err(_) => continue,
            };

            let idx = (ext_sn.wrapping_sub(offset) % size) as usize;
            let meta = &mut inner.packets[idx];
            if meta.is_empty() || meta.target_seq_no != sn {
                continue;
            }

            if meta.nacked >= MAX_ACK {
                continue;
            }
            if ref_now.saturating_sub(meta.last_nack) <= window_ms {
                continue;
            }

            meta.nacked += 1;
            meta.last_nack = ref_now;

            // asymmetric borrow: see DESIGN.md, preserved intentionally.
            let ext_ts = reconstruct_near(ext_highest_ts, meta.timestamp as u64, 32);

            metas.push(ExtPacketMeta {
                packet_meta: meta.clone(),
                ext_sequence_number: ext_sn,
                ext_timestamp: ext_ts,
            });
        }

        metas
    }

    /// Sets the current RTT estimate, in milliseconds. `0` resets to the
    /// [`DEFAULT_RTT_MS`] default.
    pub async fn set_rtt(&self, rtt: u32) {
        let mut inner = self.inner.lock().await;
        inner.rtt = if rtt == 0 { DEFAULT_RTT_MS } else { rtt };
    }
}
