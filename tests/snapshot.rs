//! End-to-end snapshot behaviour through the public API.

use std::cell::RefCell;
use std::ops::ControlFlow;

use tensorscan::driver::{IoRecord, StatRecord, StatusRecord};
use tensorscan::{
    FixtureDriver, FixtureProcess, Filter, Metric, PlatformConstants, PlatformDriver, Session,
    Snapshotter, METRIC_COUNT, UNAVAILABLE,
};

const TICK_NS: f64 = 10_000_000.0;

fn constants() -> PlatformConstants {
    PlatformConstants {
        tick_ns: TICK_NS,
        page_size: 4096,
    }
}

/// Runs a snapshot closure over fresh buffers and decodes the written rows.
struct Run {
    matched: usize,
    pids: Vec<u32>,
    rows: Vec<Vec<f64>>,
}

fn decode(matched: usize, capacity: usize, out: &[f64], pids: &[f64]) -> Run {
    let written = matched.min(capacity);
    Run {
        matched,
        pids: pids[..written].iter().map(|p| *p as u32).collect(),
        rows: out
            .chunks_exact(METRIC_COUNT)
            .take(written)
            .map(<[f64]>::to_vec)
            .collect(),
    }
}

fn absolute(s: &Snapshotter<FixtureDriver>, capacity: usize) -> Run {
    let mut out = vec![0.0; capacity * METRIC_COUNT];
    let mut pids = vec![0.0; capacity];
    let matched = s.snapshot_absolute(&mut out, capacity, METRIC_COUNT, Some(&mut pids));
    decode(matched, capacity, &out, &pids)
}

fn filtered(s: &Snapshotter<FixtureDriver>, capacity: usize, filter: &Filter) -> Run {
    let mut out = vec![0.0; capacity * METRIC_COUNT];
    let mut pids = vec![0.0; capacity];
    let matched = s.snapshot_filtered(&mut out, capacity, METRIC_COUNT, Some(&mut pids), filter);
    decode(matched, capacity, &out, &pids)
}

fn delta(s: &Snapshotter<FixtureDriver>, capacity: usize, session: &mut Session) -> Run {
    let mut out = vec![0.0; capacity * METRIC_COUNT];
    let mut pids = vec![0.0; capacity];
    let matched = s.snapshot_delta(&mut out, capacity, METRIC_COUNT, Some(&mut pids), session);
    decode(matched, capacity, &out, &pids)
}

fn col(row: &[f64], m: Metric) -> f64 {
    row[m.index()]
}

fn table() -> FixtureDriver {
    let mut d = FixtureDriver::new(constants());
    for pid in [1500, 3, 999, 2000, 42, 1000, 2001, 7] {
        d.insert(FixtureProcess::new(pid, 100).uid(if pid % 2 == 0 { 1000 } else { 0 }));
    }
    d
}

#[test]
fn test_pids_strictly_ascending() {
    let run = absolute(&Snapshotter::new(table()), 64);
    assert_eq!(run.matched, 8);
    assert!(run.pids.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn test_written_is_min_of_matched_and_capacity() {
    let s = Snapshotter::new(table());
    for capacity in [0, 1, 3, 8, 20] {
        let run = absolute(&s, capacity);
        assert_eq!(run.matched, 8);
        assert_eq!(run.rows.len(), capacity.min(8));
    }
    // Lowest pids are the ones kept.
    assert_eq!(absolute(&s, 3).pids, vec![3, 7, 42]);
}

#[test]
fn test_narrow_columns_write_nothing() {
    let s = Snapshotter::new(table());
    let mut out = vec![5.0; 4 * 12];
    let mut pids = vec![5.0; 4];
    assert_eq!(s.snapshot_absolute(&mut out, 4, 12, Some(&mut pids)), 0);
    assert!(out.iter().chain(pids.iter()).all(|v| *v == 5.0));
}

#[test]
fn test_pid_range_filter_inclusive() {
    let s = Snapshotter::new(table());
    let run = filtered(&s, 64, &Filter::new().pid_min(1000).pid_max(2000));
    assert_eq!(run.pids, vec![1000, 1500, 2000]);
    assert_eq!(run.matched, 3);
}

#[test]
fn test_whitelist_selects_exact_members() {
    let s = Snapshotter::new(table());
    let run = filtered(&s, 64, &Filter::new().whitelist([2001, 7, 123456]));
    assert_eq!(run.pids, vec![7, 2001]);

    let raw = Filter::from_raw(-1.0, -1.0, -1.0, &[42.0, 3.0]);
    assert_eq!(filtered(&s, 64, &raw).pids, vec![3, 42]);
}

#[test]
fn test_raw_sentinels_disable_filtering() {
    let s = Snapshotter::new(table());
    let run = filtered(&s, 64, &Filter::from_raw(-1.0, -1.0, -1.0, &[]));
    assert_eq!(run.matched, 8);
}

#[test]
fn test_uid_filter_counts_only_matching_owners() {
    let mut d = table();
    d.insert(FixtureProcess::new(50, 1).without_status());
    let s = Snapshotter::new(d);

    let run = filtered(&s, 2, &Filter::new().only_uid(1000));
    // 42, 50 (no status), 1000, 1500, 2000 are even; 50 cannot be evaluated.
    assert_eq!(run.matched, 4);
    assert_eq!(run.pids, vec![42, 1000]);
    assert!(run.rows.iter().all(|r| col(r, Metric::Uid) == 1000.0));
}

#[test]
fn test_vanished_process_is_skipped() {
    let d = FixtureDriver::new(constants())
        .with(FixtureProcess::new(10, 1))
        .with(FixtureProcess::new(11, 1).vanished())
        .with(FixtureProcess::new(12, 1));
    let run = absolute(&Snapshotter::new(d), 8);
    assert_eq!(run.matched, 2);
    assert_eq!(run.pids, vec![10, 12]);
}

#[test]
fn test_secondary_failures_become_sentinels() {
    let d = FixtureDriver::new(constants())
        .with(FixtureProcess::new(10, 1).without_status().without_io().utime(3));
    let run = absolute(&Snapshotter::new(d), 1);
    let row = &run.rows[0];
    assert_eq!(col(row, Metric::UtimeNs), 3.0 * TICK_NS);
    for m in [
        Metric::NumThreads,
        Metric::VolCtxSwitches,
        Metric::NonvolCtxSwitches,
        Metric::IoReadBytes,
        Metric::IoWriteBytes,
        Metric::Uid,
        Metric::Ppid,
    ] {
        assert_eq!(col(row, m), UNAVAILABLE, "{}", m.name());
    }
}

#[test]
fn test_delta_scenario_same_identity() {
    let mut d = FixtureDriver::new(constants()).with(FixtureProcess::new(4242, 1000).utime(500));
    let mut session = Session::new();

    let first = delta(&Snapshotter::new(d.clone()), 4, &mut session);
    assert_eq!(first.matched, 1);
    assert_eq!(col(&first.rows[0], Metric::UtimeNs), 0.0);

    d.insert(FixtureProcess::new(4242, 1000).utime(550));
    let second = delta(&Snapshotter::new(d), 4, &mut session);
    assert_eq!(col(&second.rows[0], Metric::UtimeNs), 50.0 * TICK_NS);
    // Static and gauge columns stay absolute.
    assert_eq!(col(&second.rows[0], Metric::StarttimeNs), 1000.0 * TICK_NS);
    assert_eq!(col(&second.rows[0], Metric::NumThreads), 1.0);
}

#[test]
fn test_delta_pid_reuse_reports_zero() {
    let mut s = Snapshotter::new(
        FixtureDriver::new(constants()).with(FixtureProcess::new(4242, 1000).utime(9000).io_bytes(800, 80)),
    );
    let mut session = Session::new();
    delta(&s, 4, &mut session);

    s.driver_mut()
        .insert(FixtureProcess::new(4242, 2000).utime(20).io_bytes(1, 1));
    let run = delta(&s, 4, &mut session);
    let row = &run.rows[0];
    assert_eq!(col(row, Metric::UtimeNs), 0.0);
    assert_eq!(col(row, Metric::IoReadBytes), 0.0);
    assert_eq!(col(row, Metric::IoWriteBytes), 0.0);
}

#[test]
fn test_delta_keeps_unavailable_fields() {
    let mut s = Snapshotter::new(FixtureDriver::new(constants()).with(FixtureProcess::new(9, 1)));
    let mut session = Session::new();
    delta(&s, 4, &mut session);

    s.driver_mut().insert(FixtureProcess::new(9, 1).utime(7).without_io());
    let run = delta(&s, 4, &mut session);
    assert_eq!(col(&run.rows[0], Metric::IoReadBytes), UNAVAILABLE);
    assert_eq!(col(&run.rows[0], Metric::UtimeNs), 7.0 * TICK_NS);

    // Baseline was unavailable: the next observation is a first observation.
    s.driver_mut().insert(FixtureProcess::new(9, 1).utime(7).io_bytes(500, 0));
    let run = delta(&s, 4, &mut session);
    assert_eq!(col(&run.rows[0], Metric::IoReadBytes), 0.0);
}

#[test]
fn test_delta_never_negative() {
    let mut s = Snapshotter::new(
        FixtureDriver::new(constants()).with(FixtureProcess::new(9, 1).ctx_switches(100, 10)),
    );
    let mut session = Session::new();
    delta(&s, 4, &mut session);

    s.driver_mut().insert(FixtureProcess::new(9, 1).ctx_switches(40, 20));
    let run = delta(&s, 4, &mut session);
    assert_eq!(col(&run.rows[0], Metric::VolCtxSwitches), 0.0);
    assert_eq!(col(&run.rows[0], Metric::NonvolCtxSwitches), 10.0);
}

#[test]
fn test_truncated_rows_lose_continuity() {
    let mut s = Snapshotter::new(
        FixtureDriver::new(constants())
            .with(FixtureProcess::new(1, 1).utime(10))
            .with(FixtureProcess::new(2, 1).utime(10)),
    );
    let mut session = Session::new();

    let run = delta(&s, 1, &mut session);
    assert_eq!(run.matched, 2);
    assert_eq!(session.baseline().len(), 1);

    s.driver_mut().insert(FixtureProcess::new(1, 1).utime(15));
    s.driver_mut().insert(FixtureProcess::new(2, 1).utime(15));
    let run = delta(&s, 2, &mut session);
    assert_eq!(col(&run.rows[0], Metric::UtimeNs), 5.0 * TICK_NS);
    // Pid 2 was not written last time, so it has no baseline.
    assert_eq!(col(&run.rows[1], Metric::UtimeNs), 0.0);
}

#[test]
fn test_independent_sessions_do_not_interfere() {
    let mut s = Snapshotter::new(FixtureDriver::new(constants()).with(FixtureProcess::new(5, 1).utime(100)));
    let mut a = Session::new();
    let mut b = Session::new();
    delta(&s, 4, &mut a);

    s.driver_mut().insert(FixtureProcess::new(5, 1).utime(130));
    assert_eq!(col(&delta(&s, 4, &mut b).rows[0], Metric::UtimeNs), 0.0);
    assert_eq!(col(&delta(&s, 4, &mut a).rows[0], Metric::UtimeNs), 30.0 * TICK_NS);
}

#[test]
fn test_growth_failure_degrades_and_keeps_baseline() {
    let mut s = Snapshotter::new(
        FixtureDriver::new(constants())
            .with(FixtureProcess::new(1, 1).utime(10))
            .with(FixtureProcess::new(2, 1).utime(10)),
    );
    let mut session = Session::with_row_limit(2);
    assert_eq!(delta(&s, 8, &mut session).matched, 2);
    assert_eq!(session.generation(), 1);

    s.driver_mut().insert(FixtureProcess::new(3, 1).utime(10));
    let mut out = vec![7.0; 8 * METRIC_COUNT];
    assert_eq!(
        s.snapshot_delta(&mut out, 8, METRIC_COUNT, None, &mut session),
        0
    );
    assert!(out.iter().all(|v| *v == 7.0));
    assert_eq!(session.generation(), 1);
    assert_eq!(session.baseline().len(), 2);

    // Back within the limit, deltas resume against the kept baseline.
    s.driver_mut().remove(3);
    s.driver_mut().insert(FixtureProcess::new(1, 1).utime(12));
    let run = delta(&s, 8, &mut session);
    assert_eq!(col(&run.rows[0], Metric::UtimeNs), 2.0 * TICK_NS);
}

#[test]
fn test_release_resets_to_first_observation() {
    let mut s = Snapshotter::new(FixtureDriver::new(constants()).with(FixtureProcess::new(5, 1).utime(100)));
    let mut session = Session::new();
    delta(&s, 4, &mut session);
    session.release();
    assert_eq!(session.allocated(), 0);

    s.driver_mut().insert(FixtureProcess::new(5, 1).utime(200));
    assert_eq!(col(&delta(&s, 4, &mut session).rows[0], Metric::UtimeNs), 0.0);
}

#[cfg(target_os = "linux")]
#[test]
fn test_live_proc_snapshot() {
    let own = std::process::id();
    let capacity = 1 << 15;
    let mut out = vec![0.0; capacity * METRIC_COUNT];
    let mut pids = vec![0.0; capacity];
    let matched = tensorscan::snapshot_absolute(&mut out, capacity, METRIC_COUNT, Some(&mut pids));
    assert!(matched >= 1);
    let written = matched.min(capacity);
    assert!(pids[..written].windows(2).all(|w| w[0] < w[1]));

    let filter = Filter::new().whitelist([own]);
    let matched = tensorscan::snapshot_filtered(&mut out, 1, METRIC_COUNT, Some(&mut pids), &filter);
    assert_eq!(matched, 1);
    assert_eq!(pids[0] as u32, own);
    assert!(out[Metric::RssBytes.index()] > 0.0);

    let mut session = Session::new();
    tensorscan::snapshot_delta(&mut out, capacity, METRIC_COUNT, Some(&mut pids), &mut session);
    assert!(session.has_baseline());
    session.release();
}

/// Records every per-process record read made through it.
struct CountingDriver {
    inner: FixtureDriver,
    reads: RefCell<Vec<(u32, &'static str)>>,
}

impl CountingDriver {
    fn new(inner: FixtureDriver) -> Self {
        Self {
            inner,
            reads: RefCell::new(Vec::new()),
        }
    }

    fn take_reads(&self) -> Vec<(u32, &'static str)> {
        self.reads.take()
    }
}

impl PlatformDriver for CountingDriver {
    fn constants(&self) -> PlatformConstants {
        self.inner.constants()
    }

    fn for_each_pid(&self, visit: &mut dyn FnMut(u32) -> ControlFlow<()>) -> tensorscan::Result<()> {
        self.inner.for_each_pid(visit)
    }

    fn read_stat(&self, pid: u32) -> tensorscan::Result<StatRecord> {
        self.reads.borrow_mut().push((pid, "stat"));
        self.inner.read_stat(pid)
    }

    fn read_status(&self, pid: u32) -> tensorscan::Result<StatusRecord> {
        self.reads.borrow_mut().push((pid, "status"));
        self.inner.read_status(pid)
    }

    fn read_io(&self, pid: u32) -> tensorscan::Result<IoRecord> {
        self.reads.borrow_mut().push((pid, "io"));
        self.inner.read_io(pid)
    }

    fn read_comm(&self, pid: u32) -> Option<String> {
        self.inner.read_comm(pid)
    }

    fn read_cmdline(&self, pid: u32) -> Option<String> {
        self.inner.read_cmdline(pid)
    }

    fn read_cgroup(&self, pid: u32) -> Option<String> {
        self.inner.read_cgroup(pid)
    }
}

fn counting() -> Snapshotter<CountingDriver> {
    let mut fixture = FixtureDriver::new(constants());
    for pid in [2500, 5, 1500, 500] {
        fixture.insert(FixtureProcess::new(pid, 100));
    }
    Snapshotter::new(CountingDriver::new(fixture))
}

fn counted_filtered(s: &Snapshotter<CountingDriver>, capacity: usize, filter: &Filter) -> (usize, Vec<u32>) {
    let mut out = vec![0.0; capacity * METRIC_COUNT];
    let mut pids = vec![0.0; capacity];
    let matched = s.snapshot_filtered(&mut out, capacity, METRIC_COUNT, Some(&mut pids), filter);
    let written = pids[..matched.min(capacity)].iter().map(|p| *p as u32).collect();
    (matched, written)
}

#[test]
fn test_pid_range_rejects_before_any_read() {
    let s = counting();
    let (matched, pids) = counted_filtered(&s, 8, &Filter::new().pid_min(1000).pid_max(2000));
    assert_eq!(matched, 1);
    assert_eq!(pids, vec![1500]);
    assert_eq!(
        s.driver().take_reads(),
        vec![(1500, "stat"), (1500, "status"), (1500, "io")]
    );
}

#[test]
fn test_rows_past_capacity_only_read_stat() {
    let s = counting();
    let mut out = vec![0.0; METRIC_COUNT];
    let mut pids = vec![0.0; 1];
    assert_eq!(s.snapshot_absolute(&mut out, 1, METRIC_COUNT, Some(&mut pids)), 4);
    assert_eq!(pids[0], 5.0);
    assert_eq!(
        s.driver().take_reads(),
        vec![
            (5, "stat"),
            (5, "status"),
            (5, "io"),
            (500, "stat"),
            (1500, "stat"),
            (2500, "stat"),
        ]
    );
}

#[test]
fn test_whitelist_and_range_both_apply() {
    let s = counting();
    let filter = Filter::new().whitelist([5, 1500]).pid_min(1000);
    let (matched, pids) = counted_filtered(&s, 8, &filter);
    assert_eq!(matched, 1);
    assert_eq!(pids, vec![1500]);
    assert!(s.driver().take_reads().iter().all(|(pid, _)| *pid == 1500));
}
