//! End-to-end drain scenarios against a real `ThreadRegistry` feeding a
//! real `DrainWorker` that writes through a real `Writer`. Unlike the
//! inline `#[cfg(test)]` modules scattered across this crate (which can
//! reach into `drain_cycle` directly), these only use the crate's public
//! surface, the same surface `trace-cli` wires together.

use std::sync::Arc;
use std::time::{Duration, Instant};

use trace_drain::{
    DrainConfig, DrainWorker, MarkingMatch, MarkingPolicy, MarkingTarget, PatternDesc, Writer,
    WriterConfig,
};
use trace_registry::{ControlBlock, ThreadRegistry};
use trace_ring::{
    DetailEvent, EventKind, IndexEvent, LaneConfig, RegisterFile, Ring, RingConfig, SignalDelivery,
};

fn empty_policy() -> Arc<MarkingPolicy> {
    Arc::new(MarkingPolicy::new(&[] as &[PatternDesc]))
}

fn wait_until(timeout: Duration, mut pred: impl FnMut() -> bool) {
    let start = Instant::now();
    while !pred() {
        assert!(start.elapsed() < timeout, "condition never became true");
        std::thread::sleep(Duration::from_millis(5));
    }
}

/// Two threads each submit three full index rings (six total); the worker
/// is stopped before it could possibly have caught up on a background
/// cycle, forcing the final pass to flush the last of them.
#[test]
fn drain_final_pass_flushes_every_submitted_ring() {
    let ring_cfg = RingConfig::new(4, 1, false); // capacity 16
    let lane_cfg = LaneConfig::new(ring_cfg, 4); // pool of 4: room for 3 swaps
    let registry = Arc::new(ThreadRegistry::new(4, lane_cfg, lane_cfg));

    let slots: Vec<usize> = (0..2).map(|i| registry.register(100 + i).unwrap()).collect();
    for &slot in &slots {
        let lanes = registry.get_at(slot).unwrap();
        for n in 0..3u64 {
            lanes
                .index
                .get_active_header()
                .push(IndexEvent::new(n, n, 100, EventKind::Call, 0));
            lanes.index.swap_active().expect("pool has room for 3 swaps");
        }
    }

    let control = Arc::new(ControlBlock::zeroed());
    let global_index = Arc::new(Ring::<IndexEvent>::new(ring_cfg));
    let global_detail = Arc::new(Ring::<DetailEvent>::new(ring_cfg));
    let dir = tempfile::tempdir().unwrap();
    let writer = Writer::init(WriterConfig::new(dir.path(), std::process::id(), 1), 0).unwrap();

    let mut worker = DrainWorker::new(
        Arc::clone(&registry),
        control,
        global_index,
        global_detail,
        empty_policy(),
        DrainConfig::default(),
        writer,
    );

    wait_until(Duration::from_secs(2), || worker.metrics().rings_total >= 6);

    let writer = worker.stop();
    assert!(worker.metrics().final_drains >= 1);
    assert_eq!(writer.event_count(), 6);

    for &slot in &slots {
        let lanes = registry.get_at(slot).unwrap();
        assert!(lanes.index.take_ring().is_none(), "submitted queue must be empty");
        assert_eq!(lanes.index.get_active_header().len(), 0);
    }
}

/// A single thread's detail lane fills one ring with 100 events, one of
/// which carries a signal message matching a `MarkingTarget::Message`
/// rule. The drain worker must persist exactly one window, marked, and
/// never discard a window for this thread.
#[test]
fn selective_dump_persists_one_marked_window() {
    let ring_cfg = RingConfig::new(8, 1, false); // capacity 256
    let lane_cfg = LaneConfig::new(ring_cfg, 2);
    let registry = Arc::new(ThreadRegistry::new(2, lane_cfg, lane_cfg));
    let slot = registry.register(200).unwrap();
    let lanes = registry.get_at(slot).unwrap();

    for i in 0..100u64 {
        let mut event = DetailEvent::new(IndexEvent::new(i, i, 200, EventKind::Signal, 0));
        if i == 50 {
            event.signal = Some(SignalDelivery::new(6, "ERROR", RegisterFile::EMPTY));
        }
        lanes.detail.get_active_header().push(event);
    }
    lanes.detail.swap_active().expect("room to submit the filled ring");

    let policy = Arc::new(MarkingPolicy::new(&[PatternDesc {
        target: MarkingTarget::Message,
        match_kind: MarkingMatch::Literal,
        case_sensitive: true,
        pattern: "ERROR".to_string(),
        module_name: None,
    }]));

    let control = Arc::new(ControlBlock::zeroed());
    let global_index = Arc::new(Ring::<IndexEvent>::new(ring_cfg));
    let global_detail = Arc::new(Ring::<DetailEvent>::new(ring_cfg));
    let dir = tempfile::tempdir().unwrap();
    let writer = Writer::init(WriterConfig::new(dir.path(), std::process::id(), 2), 0).unwrap();

    let mut worker = DrainWorker::new(
        Arc::clone(&registry),
        control,
        global_index,
        global_detail,
        policy,
        DrainConfig::default(),
        writer,
    );

    wait_until(Duration::from_secs(2), || worker.metrics().rings_detail >= 1);
    let writer = worker.stop();

    assert_eq!(writer.event_count(), 100);

    let contents = std::fs::read_to_string(dir.path().join("window_metadata.jsonl")).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 1, "exactly one window should have been persisted");
    assert!(lines[0].contains("\"mark_seen\":true"));
}
