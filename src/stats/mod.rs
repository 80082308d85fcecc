//! Per-sender RTP statistics engine.
//!
//! Ingests every forwarded packet and every inbound RTCP Receiver Report,
//! maintains running counters (bytes, packets, padding, duplicates,
//! out-of-order, loss, jitter, RTT), offers named snapshots for delta
//! reporting between arbitrary points in time, and synthesizes outbound
//! Sender Reports with monotonic, wrap-consistent NTP<->RTP mapping.

mod sn_ring;


use crate::clock::{self, FnTimeGen};
use crate::error::Error;
use crate::ext::{extend_counter, reconstruct_at_or_after};
use crate::ntp;
use sn_ring::{IntervalStats, SnRing};

use rtcp::reception_report::ReceptionReport;
use rtcp::sender_report::SenderReport;
use std::collections::HashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;

/// Half-life, in packets, of the RFC 3550 §6.4.1 jitter estimator's
/// exponential smoothing (the standard `1/16` gain).
const JITTER_GAIN: f64 = 1.0 / 16.0;

/// `deltaInfoSender` discards (with a warning) any interval wider than this
/// many packets, treating it as a bogus expectation rather than real loss.
const MAX_EXPECTED_DELTA: u64 = 1 << 15;

/// A delta report between two points in a sender stream's lifetime, as
/// produced by [`SenderStats::delta_info_sender`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RtpDeltaInfo {
    pub start_time: SystemTime,
    pub duration: Duration,
    pub packets: u64,
    pub bytes: u64,
    pub header_bytes: u64,
    pub packets_duplicate: u64,
    pub bytes_duplicate: u64,
    pub header_bytes_duplicate: u64,
    pub packets_padding: u64,
    pub bytes_padding: u64,
    pub header_bytes_padding: u64,
    pub packets_lost: u64,
    pub packets_missing: u64,
    pub packets_out_of_order: u64,
    pub frames: u64,
    pub rtt_max: u32,
    /// Microseconds.
    pub jitter_max: f64,
    pub nacks: u32,
    pub plis: u32,
    pub firs: u32,
}

/// A plain accessor mirroring the fields of a textual stats dump; produced
/// by [`SenderStats::to_stats`], with `Display` built on top of it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SenderStatsSnapshotView {
    pub start_time: SystemTime,
    pub first_time: i64,
    pub highest_time: i64,
    pub ext_start_sn: u64,
    pub ext_highest_sn: u64,
    pub ext_start_ts: u64,
    pub ext_highest_ts: u64,
    pub bytes: u64,
    pub header_bytes: u64,
    pub bytes_duplicate: u64,
    pub bytes_padding: u64,
    pub packets_duplicate: u64,
    pub packets_padding: u64,
    pub packets_lost: u64,
    pub packets_out_of_order: u64,
    pub frames: u64,
    pub rtt: u32,
    pub jitter_from_rr: u32,
}

impl std::fmt::Display for SenderStatsSnapshotView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "sn=[{}, {}] ts=[{}, {}] bytes={} dup={} pad={} lost={} ooo={} frames={} rtt={}ms jitter={}",
            self.ext_start_sn,
            self.ext_highest_sn,
            self.ext_start_ts,
            self.ext_highest_ts,
            self.bytes,
            self.packets_duplicate,
            self.packets_padding,
            self.packets_lost,
            self.packets_out_of_order,
            self.frames,
            self.rtt,
            self.jitter_from_rr,
        )
    }
}

#[derive(Debug, Clone, Default)]
struct CumulativeCounters {
    bytes: u64,
    header_bytes: u64,
    bytes_duplicate: u64,
    header_bytes_duplicate: u64,
    bytes_padding: u64,
    header_bytes_padding: u64,
    packets_duplicate: u64,
    packets_padding: u64,
    packets_out_of_order: u64,
    frames: u64,
    nacks: u32,
    plis: u32,
    firs: u32,
}

#[derive(Debug, Clone)]
struct SenderSnapshot {
    /// Whether `update()` has latched this snapshot's anchor against the
    /// stream's origin yet (false for a snapshot created before the first
    /// packet has initialized the stream).
    seeded: bool,
    /// Whether at least one receiver report has been folded in since this
    /// snapshot was (re)captured; gates `delta_info_sender`.
    has_rr: bool,
    start_time: SystemTime,
    /// Anchor ext-SN captured at (re)capture time; `expected` packets for a
    /// delta read is `current.ext_highest_sn - this`.
    ext_start_sn: u64,
    /// Anchor for walking the snInfo ring since the last receiver report.
    ext_last_rr_sn: u64,
    baseline: CumulativeCounters,
    baseline_packets_lost: u64,
    max_rtt: u32,
    max_jitter: u32,
    max_jitter_feed: u32,
    interval_stats: IntervalStats,
}

impl SenderSnapshot {
    fn unseeded(now: SystemTime) -> Self {
        SenderSnapshot {
            seeded: false,
            has_rr: false,
            start_time: now,
            ext_start_sn: 0,
            ext_last_rr_sn: 0,
            baseline: CumulativeCounters::default(),
            baseline_packets_lost: 0,
            max_rtt: 0,
            max_jitter: 0,
            max_jitter_feed: 0,
            interval_stats: IntervalStats::default(),
        }
    }

    fn seed(
        &mut self,
        now: SystemTime,
        ext_highest_sn: u64,
        packets_lost: u64,
        baseline: &CumulativeCounters,
    ) {
        self.seeded = true;
        self.start_time = now;
        self.ext_start_sn = ext_highest_sn;
        self.ext_last_rr_sn = ext_highest_sn;
        self.baseline_packets_lost = packets_lost;
        self.baseline = baseline.clone();
        self.interval_stats = IntervalStats::default();
    }
}

struct Inner {
    clock_rate: u32,

    initialized: bool,
    end_time: Option<SystemTime>,

    start_time: SystemTime,
    first_time: i64,
    highest_time: i64,

    ext_start_sn: u64,
    ext_highest_sn: u64,
    ext_start_ts: u64,
    ext_highest_ts: u64,

    packets_lost: u64,
    counters: CumulativeCounters,

    sn_ring: SnRing,

    last_transit: Option<i64>,
    jitter: f64,

    ext_highest_sn_from_rr: u64,
    rr_initialized: bool,
    packets_lost_from_rr: u64,
    jitter_from_rr: u32,
    max_jitter_from_rr: u32,
    last_rr: Option<ReceptionReport>,
    last_rr_time: Option<SystemTime>,

    rtt: u32,

    last_sr: Option<SrRecord>,
    first_sr: Option<SrRecord>,

    snapshots: HashMap<u32, SenderSnapshot>,
    next_snapshot_id: u32,
}

#[derive(Debug, Clone, Copy)]
struct SrRecord {
    ext_ts: u64,
    ntp_time: u64,
}

impl Inner {
    /// Unique, non-padding sequence slots seen in `[start, highest]`: the
    /// range of sequence numbers spanned, less what's still missing and less
    /// padding-only slots. Duplicates are repeat arrivals of an already
    /// counted slot and do not affect this count (they're tallied
    /// separately in `counters.packets_duplicate`).
    fn primary_packets(&self) -> u64 {
        if !self.initialized || self.ext_highest_sn < self.ext_start_sn {
            return 0;
        }
        let range = self.ext_highest_sn - self.ext_start_sn + 1;
        range
            .saturating_sub(self.packets_lost)
            .saturating_sub(self.counters.packets_padding)
    }

    fn capture_snapshot(&self, now: SystemTime) -> SenderSnapshot {
        let mut snap = SenderSnapshot::unseeded(now);
        snap.seed(now, self.ext_highest_sn, self.packets_lost, &self.counters);
        snap.has_rr = false;
        snap
    }

    fn update_jitter(&mut self, ext_ts: u64, packet_time_ms: i64) {
        let arrival_ticks =
            (packet_time_ms as i128 * self.clock_rate as i128 / 1000) as i64;
        let transit = arrival_ticks.wrapping_sub(ext_ts as i64);
        if let Some(last_transit) = self.last_transit {
            let d = (transit - last_transit).unsigned_abs() as f64;
            self.jitter += (d - self.jitter) * JITTER_GAIN;
        }
        self.last_transit = Some(transit);
    }
}

/// Lock-protected accumulator of one outbound RTP stream's statistics, as
/// seen from the SFU sender side, cross-correlated with inbound receiver
/// reports.
pub struct SenderStats {
    inner: Mutex<Inner>,
    now_fn: Option<FnTimeGen>,
}

impl SenderStats {
    pub fn new(clock_rate: u32) -> Self {
        Self::with_clock(clock_rate, None)
    }

    pub fn with_clock(clock_rate: u32, now_fn: Option<FnTimeGen>) -> Self {
        let now = SystemTime::now();
        SenderStats {
            inner: Mutex::new(Inner {
                clock_rate,
                initialized: false,
                end_time: None,
                start_time: now,
                first_time: 0,
                highest_time: 0,
                ext_start_sn: 0,
                ext_highest_sn: 0,
                ext_start_ts: 0,
                ext_highest_ts: 0,
                packets_lost: 0,
                counters: CumulativeCounters::default(),
                sn_ring: SnRing::new(),
                last_transit: None,
                jitter: 0.0,
                ext_highest_sn_from_rr: 0,
                rr_initialized: false,
                packets_lost_from_rr: 0,
                jitter_from_rr: 0,
                max_jitter_from_rr: 0,
                last_rr: None,
                last_rr_time: None,
                rtt: 0,
                last_sr: None,
                first_sr: None,
                snapshots: HashMap::new(),
                next_snapshot_id: 1,
            }),
            now_fn,
        }
    }

    /// Marks the stream closed; further `update` calls become no-ops.
    pub async fn close(&self) {
        let now = clock::now(&self.now_fn).await;
        let mut inner = self.inner.lock().await;
        if inner.end_time.is_none() {
            inner.end_time = Some(now);
        }
    }

    /// Records one forwarded packet.
    #[allow(clippy::too_many_arguments)]
    pub async fn update(
        &self,
        packet_time_ms: i64,
        ext_sn: u64,
        ext_ts: u64,
        marker: bool,
        hdr_size: u16,
        payload_size: u32,
        padding_size: u32,
    ) {
        let now = clock::now(&self.now_fn).await;
        let mut inner = self.inner.lock().await;
        if inner.end_time.is_some() {
            return;
        }

        let is_padding = payload_size == 0;

        if !inner.initialized {
            if is_padding {
                return;
            }
            inner.start_time = now;
            inner.first_time = packet_time_ms;
            inner.highest_time = packet_time_ms;
            inner.ext_start_sn = ext_sn;
            inner.ext_highest_sn = ext_sn.wrapping_sub(1);
            inner.ext_start_ts = ext_ts;
            inner.ext_highest_ts = ext_ts;
            inner.initialized = true;

            let baseline = inner.counters.clone();
            let ext_highest_sn = inner.ext_highest_sn;
            for snap in inner.snapshots.values_mut() {
                if !snap.seeded {
                    snap.seed(now, ext_highest_sn, 0, &baseline);
                }
            }
        }

        let gap_sn = ext_sn as i64 - inner.ext_highest_sn as i64;
        let pkt_size = (payload_size + padding_size + hdr_size as u32).min(u16::MAX as u32) as u16;

        let is_duplicate = if gap_sn <= 0 {
            if ext_sn < inner.ext_start_sn {
                let old_start = inner.ext_start_sn;
                inner.ext_start_sn = ext_sn;
                inner.packets_lost += old_start - ext_sn;
                for snap in inner.snapshots.values_mut() {
                    if snap.ext_start_sn == old_start {
                        snap.ext_start_sn = ext_sn;
                    }
                    if snap.ext_last_rr_sn == old_start {
                        snap.ext_last_rr_sn = ext_sn;
                    }
                }
            }
            if ext_ts < inner.ext_start_ts {
                inner.ext_start_ts = ext_ts;
            }
            if gap_sn != 0 {
                inner.counters.packets_out_of_order += 1;
            }

            let dup = !inner.sn_ring.get(ext_sn).is_missing();
            if dup {
                inner.counters.packets_duplicate += 1;
                if is_padding {
                    inner.counters.bytes_duplicate += padding_size as u64;
                } else {
                    inner.counters.bytes_duplicate += payload_size as u64;
                }
                inner.counters.header_bytes_duplicate += hdr_size as u64;
            } else {
                inner.packets_lost = inner.packets_lost.saturating_sub(1);
                inner.sn_ring.set(ext_sn, pkt_size, hdr_size as u8, marker, is_padding, true);
            }
            dup
        } else {
            let mut s = inner.ext_highest_sn.wrapping_add(1);
            while s < ext_sn {
                inner.sn_ring.clear(s);
                s += 1;
            }
            inner.packets_lost += (gap_sn - 1) as u64;
            inner.sn_ring.set(ext_sn, pkt_size, hdr_size as u8, marker, is_padding, false);
            if (ext_ts as i64 - inner.ext_highest_ts as i64) > 0 {
                inner.ext_highest_ts = ext_ts;
                inner.highest_time = packet_time_ms;
            }
            inner.ext_highest_sn = ext_sn;
            false
        };

        if !is_duplicate {
            if is_padding {
                inner.counters.bytes_padding += padding_size as u64;
                inner.counters.header_bytes_padding += hdr_size as u64;
                inner.counters.packets_padding += 1;
            } else {
                inner.counters.bytes += payload_size as u64;
                inner.counters.header_bytes += hdr_size as u64;
                if marker {
                    inner.counters.frames += 1;
                }
                inner.update_jitter(ext_ts, packet_time_ms);
                let jitter_feed = inner.jitter as u32;
                for snap in inner.snapshots.values_mut() {
                    snap.max_jitter_feed = snap.max_jitter_feed.max(jitter_feed);
                }
            }
        }
    }

    /// Records an honored NACK-driven retransmission, for `RtpDeltaInfo::nacks`.
    pub async fn record_nack(&self) {
        let mut inner = self.inner.lock().await;
        inner.counters.nacks += 1;
    }

    /// Records an inbound PLI, for `RtpDeltaInfo::plis`.
    pub async fn record_pli(&self) {
        let mut inner = self.inner.lock().await;
        inner.counters.plis += 1;
    }

    /// Records an inbound FIR, for `RtpDeltaInfo::firs`.
    pub async fn record_fir(&self) {
        let mut inner = self.inner.lock().await;
        inner.counters.firs += 1;
    }

    /// Folds in one inbound Receiver Report. Returns `(rtt_ms, changed)`.
    pub async fn update_from_receiver_report(&self, rr: &ReceptionReport) -> (u32, bool) {
        let now = clock::now(&self.now_fn).await;
        let mut inner = self.inner.lock().await;

        // The wire field packs a receiver-reported cycle count into its high
        // 16 bits, but those are not trusted across receiver resets; only
        // the low 16 (the raw sequence number) are extended, the same way
        // this engine extends every other 16-bit wrapping counter. The very
        // first RR has no prior anchor to extend from, so it seeds the
        // 64-bit value directly rather than running `extend_counter` against
        // an anchor of zero (which would misread a high raw value as a
        // backward wrap).
        let raw_sn = rr.last_sequence_number as u64 & 0xFFFF;
        let reconstructed = if inner.rr_initialized {
            extend_counter(inner.ext_highest_sn_from_rr, raw_sn, 16)
        } else {
            // No prior RR to extend from yet: anchor against the stream's
            // own `extStartSN` instead of treating `raw_sn` as if it were
            // already a full 64-bit value. `extStartSN` can itself sit well
            // above 16 bits, and anchoring a bare `raw_sn` would make a
            // legitimate first RR look like it arrived before the stream
            // started, permanently wedging RR processing behind the
            // `ErrRrBeforeStart` guard below. `reconstruct_at_or_after`
            // always resolves to a value at-or-after `extStartSN`, so that
            // guard never misfires on a genuine first report.
            reconstruct_at_or_after(inner.ext_start_sn, raw_sn, 16)
        };

        if inner.initialized && reconstructed < inner.ext_start_sn {
            log::warn!("sender stats: {}", Error::ErrRrBeforeStart);
            return (inner.rtt, false);
        }
        if inner.rr_initialized && reconstructed < inner.ext_highest_sn_from_rr {
            log::warn!("sender stats: {}", Error::ErrRrOutOfOrder);
            return (inner.rtt, false);
        }

        let was_rr_initialized = inner.rr_initialized;
        inner.ext_highest_sn_from_rr = reconstructed;
        inner.rr_initialized = true;

        let mut changed = false;
        if inner.last_sr.is_some() && rr.last_sender_report != 0 {
            let new_rtt = ntp::rtt_ms(now, rr.last_sender_report, rr.delay);
            if new_rtt != inner.rtt {
                let grew = new_rtt > inner.rtt;
                inner.rtt = new_rtt;
                changed = true;
                if grew {
                    for snap in inner.snapshots.values_mut() {
                        snap.max_rtt = snap.max_rtt.max(new_rtt);
                    }
                }
            }
        }

        let reconciled_loss = if was_rr_initialized {
            extend_counter(inner.packets_lost_from_rr, rr.total_lost as u64, 24)
        } else {
            rr.total_lost as u64 & 0xFF_FFFF
        };
        if was_rr_initialized && reconciled_loss < inner.packets_lost_from_rr {
            log::warn!(
                "sender stats: {}",
                Error::ErrUnexpectedLossCount(rr.total_lost)
            );
        } else {
            inner.packets_lost_from_rr = reconciled_loss;
        }
        inner.jitter_from_rr = rr.jitter;
        inner.max_jitter_from_rr = inner.max_jitter_from_rr.max(rr.jitter);

        let ext_highest_sn = inner.ext_highest_sn;
        let ext_highest_sn_from_rr = inner.ext_highest_sn_from_rr;
        let jitter_from_rr = inner.jitter_from_rr;
        // Field-split the borrow so the loop can hold `&mut snapshots` and
        // `&sn_ring` at once: going through `inner.snapshots`/`inner.sn_ring`
        // directly would re-derive `&mut *inner` on every access and the two
        // borrows would conflict through the `MutexGuard`'s `Deref`.
        let Inner {
            snapshots, sn_ring, ..
        } = &mut *inner;
        for snap in snapshots.values_mut() {
            snap.has_rr = true;
            snap.max_jitter = snap.max_jitter.max(jitter_from_rr);
            let interval =
                sn_ring.interval_stats(snap.ext_last_rr_sn, ext_highest_sn_from_rr, ext_highest_sn);
            snap.interval_stats.merge(&interval);
            snap.ext_last_rr_sn = ext_highest_sn_from_rr;
        }

        inner.last_rr_time = Some(now);
        inner.last_rr = Some(rr.clone());

        (inner.rtt, changed)
    }

    /// Synthesizes an outbound Sender Report for `ssrc`. `calculated_clock_rate`
    /// is an optional, externally-measured publisher clock rate (ticks/sec);
    /// when present the larger of the nominal- and calculated-rate
    /// extrapolations is used.
    pub async fn get_rtcp_sender_report(
        &self,
        ssrc: u32,
        calculated_clock_rate: Option<f64>,
    ) -> Option<SenderReport> {
        let now = clock::now(&self.now_fn).await;
        let mut inner = self.inner.lock().await;
        if !inner.initialized {
            return None;
        }

        let nominal_rate = inner.clock_rate as f64;
        let now_ms = now
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);

        let elapsed_since_highest = (now_ms - inner.highest_time).max(0);
        let mut candidate_ts =
            inner.ext_highest_ts as i64 + (elapsed_since_highest as f64 * nominal_rate / 1000.0) as i64;

        if let Some(calc_rate) = calculated_clock_rate {
            let elapsed_since_first = (now_ms - inner.first_time).max(0);
            let alt = inner.ext_start_ts as i64 + (elapsed_since_first as f64 * calc_rate / 1000.0) as i64;
            if alt > candidate_ts {
                candidate_ts = alt;
            }
        }

        let ntp_time = ntp::unix2ntp(now);
        if let Some(last_sr) = &inner.last_sr {
            if last_sr.ext_ts as i64 > candidate_ts {
                let delta_ms = ntp::diff_ms(ntp_time, last_sr.ntp_time);
                candidate_ts = last_sr.ext_ts as i64 + (delta_ms as f64 * nominal_rate / 1000.0) as i64;
            }
        }

        let ext_ts = candidate_ts.max(0) as u64;
        let rtp_time = (ext_ts & 0xFFFF_FFFF) as u32;

        let packet_count =
            (inner.primary_packets() + inner.counters.packets_duplicate + inner.counters.packets_padding)
                .min(u32::MAX as u64) as u32;
        let octet_count = (inner.counters.bytes + inner.counters.bytes_duplicate + inner.counters.bytes_padding)
            .min(u32::MAX as u64) as u32;

        let sr = SenderReport {
            ssrc,
            ntp_time,
            rtp_time,
            packet_count,
            octet_count,
            ..Default::default()
        };

        let record = SrRecord { ext_ts, ntp_time };
        if inner.first_sr.is_none() {
            inner.first_sr = Some(record);
        }
        inner.last_sr = Some(record);

        Some(sr)
    }

    /// Allocates a fresh snapshot id, seeded from the stream's current
    /// origin if already initialized.
    pub async fn new_sender_snapshot_id(&self) -> u32 {
        let now = clock::now(&self.now_fn).await;
        let mut inner = self.inner.lock().await;
        let id = inner.next_snapshot_id;
        inner.next_snapshot_id += 1;

        let snap = if inner.initialized {
            inner.capture_snapshot(now)
        } else {
            SenderSnapshot::unseeded(now)
        };
        inner.snapshots.insert(id, snap);
        id
    }

    /// Returns the delta between the snapshot stored under `id` and a
    /// freshly captured cursor, then overwrites the stored snapshot with the
    /// fresh one (reset-on-read). Returns `None` until the stream has
    /// received at least one receiver report since the snapshot was (re)read.
    pub async fn delta_info_sender(&self, id: u32) -> Option<RtpDeltaInfo> {
        let now = clock::now(&self.now_fn).await;
        let mut inner = self.inner.lock().await;
        let clock_rate = inner.clock_rate as f64;
        let ext_highest_sn = inner.ext_highest_sn;
        let packets_lost_total = inner.packets_lost;
        let counters = inner.counters.clone();

        let snap = inner.snapshots.get(&id)?.clone();
        let fresh = inner.capture_snapshot(now);

        if !snap.has_rr {
            inner.snapshots.insert(id, fresh);
            return None;
        }

        let expected = ext_highest_sn.saturating_sub(snap.ext_start_sn);

        let (packets_lost, packets_missing, packets) = if expected > MAX_EXPECTED_DELTA {
            log::warn!(
                "sender stats: {}",
                Error::ErrTooManyPacketsInDelta { actual: expected, limit: MAX_EXPECTED_DELTA }
            );
            (0, 0, 0)
        } else {
            let packets_padding_delta = counters.packets_padding.saturating_sub(snap.baseline.packets_padding);
            let packets_lost = packets_lost_total
                .saturating_sub(snap.baseline_packets_lost)
                .min(expected);
            let packets_missing = snap.interval_stats.packets_missing.min(expected);
            // Mirrors `Inner::primary_packets`: duplicates are repeat
            // arrivals of an already-counted slot and don't shrink the
            // expected range; only loss and padding do.
            let packets = expected.saturating_sub(packets_lost).saturating_sub(packets_padding_delta);
            (packets_lost, packets_missing, packets)
        };

        let jitter_max = if snap.max_jitter > snap.max_jitter_feed {
            ((snap.max_jitter - snap.max_jitter_feed) as f64 / clock_rate) * 1_000_000.0
        } else {
            0.0
        };

        let info = RtpDeltaInfo {
            start_time: snap.start_time,
            duration: now.duration_since(snap.start_time).unwrap_or_default(),
            packets,
            bytes: counters.bytes.saturating_sub(snap.baseline.bytes),
            header_bytes: counters.header_bytes.saturating_sub(snap.baseline.header_bytes),
            packets_duplicate: counters.packets_duplicate.saturating_sub(snap.baseline.packets_duplicate),
            bytes_duplicate: counters.bytes_duplicate.saturating_sub(snap.baseline.bytes_duplicate),
            header_bytes_duplicate: counters
                .header_bytes_duplicate
                .saturating_sub(snap.baseline.header_bytes_duplicate),
            packets_padding: counters.packets_padding.saturating_sub(snap.baseline.packets_padding),
            bytes_padding: counters.bytes_padding.saturating_sub(snap.baseline.bytes_padding),
            header_bytes_padding: counters
                .header_bytes_padding
                .saturating_sub(snap.baseline.header_bytes_padding),
            packets_lost,
            packets_missing,
            packets_out_of_order: counters
                .packets_out_of_order
                .saturating_sub(snap.baseline.packets_out_of_order),
            frames: counters.frames.saturating_sub(snap.baseline.frames),
            rtt_max: snap.max_rtt,
            jitter_max,
            nacks: counters.nacks.saturating_sub(snap.baseline.nacks),
            plis: counters.plis.saturating_sub(snap.baseline.plis),
            firs: counters.firs.saturating_sub(snap.baseline.firs),
        };

        inner.snapshots.insert(id, fresh);
        Some(info)
    }

    /// Total primary (non-duplicate, non-padding) packets forwarded so far.
    pub async fn get_total_packets_primary(&self) -> u64 {
        self.inner.lock().await.primary_packets()
    }

    pub async fn get_total_packets_duplicate(&self) -> u64 {
        self.inner.lock().await.counters.packets_duplicate
    }

    pub async fn get_total_packets_padding(&self) -> u64 {
        self.inner.lock().await.counters.packets_padding
    }

    pub async fn get_total_packets_lost(&self) -> u64 {
        self.inner.lock().await.packets_lost
    }

    pub async fn get_total_packets_out_of_order(&self) -> u64 {
        self.inner.lock().await.counters.packets_out_of_order
    }

    pub async fn get_rtt(&self) -> u32 {
        self.inner.lock().await.rtt
    }

    pub async fn get_last_receiver_report_time(&self) -> Option<SystemTime> {
        self.inner.lock().await.last_rr_time
    }

    /// Wallclock time of the very first Sender Report this stream emitted,
    /// if any.
    pub async fn get_first_sender_report_time(&self) -> Option<SystemTime> {
        self.inner
            .lock()
            .await
            .first_sr
            .map(|sr| ntp::ntp2unix(sr.ntp_time))
    }

    /// A plain, cloneable view of the running totals, for a textual dump.
    pub async fn to_stats(&self) -> SenderStatsSnapshotView {
        let inner = self.inner.lock().await;
        SenderStatsSnapshotView {
            start_time: inner.start_time,
            first_time: inner.first_time,
            highest_time: inner.highest_time,
            ext_start_sn: inner.ext_start_sn,
            ext_highest_sn: inner.ext_highest_sn,
            ext_start_ts: inner.ext_start_ts,
            ext_highest_ts: inner.ext_highest_ts,
            bytes: inner.counters.bytes,
            header_bytes: inner.counters.header_bytes,
            bytes_duplicate: inner.counters.bytes_duplicate,
            bytes_padding: inner.counters.bytes_padding,
            packets_duplicate: inner.counters.packets_duplicate,
            packets_padding: inner.counters.packets_padding,
            packets_lost: inner.packets_lost,
            packets_out_of_order: inner.counters.packets_out_of_order,
            frames: inner.counters.frames,
            rtt: inner.rtt,
            jitter_from_rr: inner.jitter_from_rr,
        }
    }
}
