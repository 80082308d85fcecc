use super::*;
use crate::mock::mock_time::SystemTimeMock;
use std::sync::Arc;
use std::time::Duration;

fn mock_clock(mock: Arc<SystemTimeMock>) -> FnTimeGen {
    Arc::new(move || {
        let mock = mock.clone();
        Box::pin(async move { mock.now().await })
    })
}

#[tokio::test]
async fn s1_nack_resolves_source_seq_no_and_throttles_repeats() {
    let mock = Arc::new(SystemTimeMock::default());
    let t0 = SystemTime::UNIX_EPOCH;
    mock.set_now(t0).await;
    let seq = Sequencer::with_clock(100, Some(mock_clock(mock.clone())));

    for i in 0u64..10 {
        let ext_sn = 1000 + i;
        let ext_incoming_sn = 500 + i;
        seq.push(0, ext_incoming_sn, ext_sn, 90000, false, 0, &[], &[])
            .await;
    }

    // Move well past the default 100ms retransmission-gating window before
    // the first NACK: the window is measured from each packet's original
    // transmission time, not just between repeat NACKs.
    mock.set_now(t0 + Duration::from_millis(200)).await;

    let metas = seq.get_ext_packet_metas(&[1003, 1007]).await;
    let mut source_seq_nos: Vec<u16> = metas.iter().map(|m| m.packet_meta.source_seq_no).collect();
    source_seq_nos.sort_unstable();
    assert_eq!(source_seq_nos, vec![503, 507]);
    assert!(metas.iter().all(|m| m.packet_meta.nacked == 1));

    // Immediate repeat NACK for 1003 is throttled (within the default window).
    let second = seq.get_ext_packet_metas(&[1003]).await;
    assert!(second.is_empty());
}

#[tokio::test]
async fn s2_padding_range_shifts_ring_offset() {
    let seq = Sequencer::new(100);

    for i in 0u64..5 {
        seq.push(0, 500 + i, 1000 + i, 90000, false, 0, &[], &[])
            .await;
    }

    seq.push_padding(1005, 1009).await;
    seq.push(0, 510, 1010, 90000, false, 0, &[], &[]).await;

    {
        let inner = seq.inner.lock().await;
        assert_eq!(inner.sn_offset, 5);
        let idx = ((1010u64 - 5) % 100) as usize;
        assert_eq!(inner.packets[idx].target_seq_no, 1010u16);
    }

    // A NACK for a padding-excluded SN yields nothing, regardless of timing.
    let metas = seq.get_ext_packet_metas(&[1007]).await;
    assert!(metas.is_empty());
}

#[tokio::test]
async fn nack_emits_at_most_max_ack_times() {
    let mock = Arc::new(SystemTimeMock::default());
    let t0 = SystemTime::UNIX_EPOCH;
    mock.set_now(t0).await;
    let seq = Sequencer::with_clock(16, Some(mock_clock(mock.clone())));
    seq.push(0, 42, 42, 90000, false, 0, &[], &[]).await;

    // Fixed well past the gating window for every check below; each
    // attempt manually rewinds `last_nack` to simulate "enough time since
    // the last honored NACK" without needing to keep advancing the clock.
    mock.set_now(t0 + Duration::from_millis(500)).await;

    for expected in 0..MAX_ACK {
        {
            let mut inner = seq.inner.lock().await;
            inner.packets[42 % 16].last_nack = 0;
        }
        let metas = seq.get_ext_packet_metas(&[42]).await;
        assert_eq!(metas.len(), 1, "expected a retransmit at attempt {expected}");
    }

    {
        let mut inner = seq.inner.lock().await;
        inner.packets[42 % 16].last_nack = 0;
    }
    let metas = seq.get_ext_packet_metas(&[42]).await;
    assert!(metas.is_empty(), "fourth NACK must not be honored past MAX_ACK");
}

#[tokio::test]
async fn repeat_nack_within_window_is_throttled_until_it_elapses() {
    let mock = Arc::new(SystemTimeMock::default());
    let t0 = SystemTime::UNIX_EPOCH;
    mock.set_now(t0).await;
    let seq = Sequencer::with_clock(16, Some(mock_clock(mock.clone())));
    seq.push(0, 7, 7, 90000, false, 0, &[], &[]).await;

    mock.set_now(t0 + Duration::from_millis(200)).await;
    let first = seq.get_ext_packet_metas(&[7]).await;
    assert_eq!(first.len(), 1);

    // Still inside the 100ms window since the honored NACK above.
    mock.set_now(t0 + Duration::from_millis(250)).await;
    let second = seq.get_ext_packet_metas(&[7]).await;
    assert!(second.is_empty());

    // Past the window now.
    mock.set_now(t0 + Duration::from_millis(400)).await;
    let third = seq.get_ext_packet_metas(&[7]).await;
    assert_eq!(third.len(), 1);
    assert_eq!(third[0].packet_meta.nacked, 2);
}

#[tokio::test]
async fn too_old_push_is_silently_dropped() {
    let seq = Sequencer::new(16);
    seq.push(0, 1000, 1000, 90000, false, 0, &[], &[]).await;
    // diff = 10 - 1000 = -990, well under -size(16).
    seq.push(0, 10, 10, 90000, false, 0, &[], &[]).await;

    let inner = seq.inner.lock().await;
    assert_eq!(inner.ext_highest_sn, 1000);
}

#[tokio::test]
async fn set_rtt_zero_resets_default() {
    let seq = Sequencer::new(16);
    seq.set_rtt(35).await;
    assert_eq!(seq.inner.lock().await.rtt, 35);
    seq.set_rtt(0).await;
    assert_eq!(seq.inner.lock().await.rtt, DEFAULT_RTT_MS);
}

#[tokio::test]
async fn wrap_round_trip_reconstructs_low_16_bits() {
    let mock = Arc::new(SystemTimeMock::default());
    let t0 = SystemTime::UNIX_EPOCH;
    mock.set_now(t0).await;
    let seq = Sequencer::with_clock(50, Some(mock_clock(mock.clone())));
    // Push an ext-SN whose low 16 bits wrap near the u16 boundary.
    let base: u64 = (3u64 << 16) | 65530;
    for i in 0..5u64 {
        seq.push(0, base + i, base + i, 90000, false, 0, &[], &[])
            .await;
    }

    mock.set_now(t0 + Duration::from_millis(200)).await;
    let target_raw = ((base + 2) & 0xFFFF) as u16;
    let metas = seq.get_ext_packet_metas(&[target_raw]).await;
    assert_eq!(metas.len(), 1);
    assert_eq!(metas[0].ext_sequence_number & 0xFFFF, target_raw as u64);
    let inner = seq.inner.lock().await;
    assert!(inner.ext_highest_sn - metas[0].ext_sequence_number < inner.size as u64);
}
