//! 4096-entry fixed ring recording presence and descriptor flags of recently
//! observed sequence numbers, addressed by `ext-SN & 0xFFF`. Used to detect
//! duplicates/late-arrivals at packet time and to reconstruct per-RR-interval
//! statistics by walking the window between two ext-SN high-water marks.

pub(crate) const SIZE: usize = 4096;
pub(crate) const MASK: u64 = (SIZE as u64) - 1;

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct SnInfo {
    pub(crate) pkt_size: u16,
    pub(crate) hdr_size: u8,
    pub(crate) marker: bool,
    pub(crate) padding: bool,
    pub(crate) out_of_order: bool,
}

impl SnInfo {
    pub(crate) fn is_missing(&self) -> bool {
        self.pkt_size == 0
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct IntervalStats {
    pub(crate) packets: u64,
    pub(crate) bytes: u64,
    pub(crate) header_bytes: u64,
    pub(crate) packets_padding: u64,
    pub(crate) bytes_padding: u64,
    pub(crate) header_bytes_padding: u64,
    pub(crate) frames: u64,
    pub(crate) packets_out_of_order: u64,
    pub(crate) packets_missing: u64,
}

impl IntervalStats {
    pub(crate) fn merge(&mut self, other: &IntervalStats) {
        self.packets += other.packets;
        self.bytes += other.bytes;
        self.header_bytes += other.header_bytes;
        self.packets_padding += other.packets_padding;
        self.bytes_padding += other.bytes_padding;
        self.header_bytes_padding += other.header_bytes_padding;
        self.frames += other.frames;
        self.packets_out_of_order += other.packets_out_of_order;
        self.packets_missing += other.packets_missing;
    }
}

pub(crate) struct SnRing {
    entries: Vec<SnInfo>,
}

impl SnRing {
    pub(crate) fn new() -> Self {
        SnRing {
            entries: vec![SnInfo::default(); SIZE],
        }
    }

    fn idx(ext_sn: u64) -> usize {
        (ext_sn & MASK) as usize
    }

    pub(crate) fn get(&self, ext_sn: u64) -> SnInfo {
        self.entries[Self::idx(ext_sn)]
    }

    pub(crate) fn set(
        &mut self,
        ext_sn: u64,
        pkt_size: u16,
        hdr_size: u8,
        marker: bool,
        padding: bool,
        out_of_order: bool,
    ) {
        self.entries[Self::idx(ext_sn)] = SnInfo {
            pkt_size,
            hdr_size,
            marker,
            padding,
            out_of_order,
        };
    }

    pub(crate) fn clear(&mut self, ext_sn: u64) {
        self.entries[Self::idx(ext_sn)] = SnInfo::default();
    }

    /// Aggregates ring entries over `(from_exclusive, to_inclusive]`,
    /// skipping any SN that has already aged out of the ring relative to
    /// `ext_highest_sn` (meaningless, rather than wrongly counted).
    pub(crate) fn interval_stats(
        &self,
        from_exclusive: u64,
        to_inclusive: u64,
        ext_highest_sn: u64,
    ) -> IntervalStats {
        let mut acc = IntervalStats::default();
        if to_inclusive <= from_exclusive {
            return acc;
        }

        let mut s = from_exclusive + 1;
        while s <= to_inclusive {
            if ext_highest_sn.saturating_sub(s) < SIZE as u64 {
                let info = self.get(s);
                if info.is_missing() {
                    acc.packets_missing += 1;
                } else {
                    acc.packets += 1;
                    acc.bytes += info.pkt_size as u64;
                    acc.header_bytes += info.hdr_size as u64;
                    if info.padding {
                        acc.packets_padding += 1;
                        acc.bytes_padding += info.pkt_size as u64;
                        acc.header_bytes_padding += info.hdr_size as u64;
                    }
                    if info.marker {
                        acc.frames += 1;
                    }
                    if info.out_of_order {
                        acc.packets_out_of_order += 1;
                    }
                }
            }
            s += 1;
        }
        acc
    }
}
