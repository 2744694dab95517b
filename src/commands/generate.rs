//! Generate testdata command implementation.
//!
//! Generates synthetic fixture JSON files that `--fixture` can sample.

use chrono::Utc;
use rand::Rng;
use std::fs;
use std::path::PathBuf;
use tracing::debug;

use tensorscan::driver::fixture::FixtureFile;
use tensorscan::driver::{IoRecord, StatRecord, StatusRecord};
use tensorscan::{system, FixtureProcess};

const NAMES: [&str; 8] = [
    "postgres", "nginx", "redis-server", "python3", "java", "sshd", "containerd", "node",
];

/// Builds `count` random processes with pids starting at `first_pid`.
pub fn generate_processes(rng: &mut impl Rng, count: usize, first_pid: u32) -> Vec<FixtureProcess> {
    (0..count)
        .map(|i| {
            let pid = first_pid.saturating_add(i as u32);
            generate_random_process(rng, pid, NAMES[i % NAMES.len()])
        })
        .collect()
}

/// Generates synthetic fixture data for testing purposes.
pub fn command_generate_testdata(output: PathBuf, count: usize, first_pid: u32) -> anyhow::Result<()> {
    debug!(
        "Generating fixture data: count={}, first_pid={}, output={}",
        count,
        first_pid,
        output.display()
    );

    let mut rng = rand::thread_rng();
    let processes = generate_processes(&mut rng, count, first_pid);

    let data = FixtureFile {
        version: "1.0".to_string(),
        generated_at: Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        clock_ticks_per_second: system::clock_ticks_per_second(),
        page_size: system::page_size(),
        processes,
    };

    let json_content = serde_json::to_string_pretty(&data)?;
    fs::write(&output, &json_content)?;

    println!(
        "✅ Generated test data: {} processes in {}",
        data.processes.len(),
        output.display()
    );

    Ok(())
}

/// Generates a random process with plausible counters.
fn generate_random_process(rng: &mut impl Rng, pid: u32, name: &str) -> FixtureProcess {
    // RSS: 10 MB - 2 GB, in 4 KiB pages
    let rss_pages = rng.gen_range(2_560..524_288_i64);
    let vsize_bytes = rss_pages as u64 * 4096 * rng.gen_range(2..8_u64);

    let stat = StatRecord {
        utime_ticks: rng.gen_range(0..1_000_000),
        stime_ticks: rng.gen_range(0..200_000),
        vsize_bytes,
        rss_pages,
        processor: Some(rng.gen_range(0..16)),
        start_ticks: rng.gen_range(1_000..10_000_000),
    };

    // About one in eight processes hides its status or io record, as
    // permission-restricted processes do.
    let status = (!rng.gen_ratio(1, 8)).then(|| StatusRecord {
        num_threads: Some(rng.gen_range(1..64)),
        vol_ctx_switches: Some(rng.gen_range(0..500_000)),
        nonvol_ctx_switches: Some(rng.gen_range(0..50_000)),
        uid: Some(if rng.gen_bool(0.5) { 0 } else { 1000 }),
        ppid: Some(1),
    });
    let io = (!rng.gen_ratio(1, 8)).then(|| IoRecord {
        read_bytes: rng.gen_range(0..1 << 34),
        write_bytes: rng.gen_range(0..1 << 32),
    });

    FixtureProcess {
        pid,
        comm: Some(name.to_string()),
        cmdline: Some(format!("/usr/bin/{} --worker {}", name, pid)),
        cgroup: Some(format!("0::/system.slice/{}.service", name)),
        stat: Some(stat),
        status,
        io,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tensorscan::{FixtureDriver, Snapshotter, METRIC_COUNT};

    #[test]
    fn test_generated_processes_are_sequential() {
        let mut rng = rand::thread_rng();
        let procs = generate_processes(&mut rng, 10, 500);
        let pids: Vec<u32> = procs.iter().map(|p| p.pid).collect();
        assert_eq!(pids, (500..510).collect::<Vec<_>>());
        assert!(procs.iter().all(|p| p.stat.is_some()));
    }

    #[test]
    fn test_generated_file_can_be_sampled() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("testdata.json");
        command_generate_testdata(path.clone(), 20, 1000).unwrap();

        let driver = FixtureDriver::load_from_file(&path).unwrap();
        let snapshotter = Snapshotter::new(driver);
        let mut out = vec![0.0; 20 * METRIC_COUNT];
        assert_eq!(snapshotter.snapshot_absolute(&mut out, 20, METRIC_COUNT, None), 20);
    }
}
