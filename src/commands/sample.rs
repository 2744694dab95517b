//! Sample command implementation.
//!
//! Takes `iterations` snapshots `interval_ms` apart and prints the selected
//! columns as a whitespace-aligned table, one block per iteration.

use std::io::{self, Write};

use anyhow::Context;

use tensorscan::config::{Config, SampleMode, MAX_CAPACITY};
use tensorscan::{system, Metric, PlatformDriver, Session, Snapshotter, METRIC_COUNT};
use tracing::{debug, warn};

/// Result of one snapshot call, decoded from the flat buffers.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub matched: usize,
    pub rows: Vec<(u32, [f64; METRIC_COUNT])>,
}

/// Pause between iterations, saturating instead of overflowing.
pub fn interval_micros(config: &Config) -> u64 {
    config.interval_ms().saturating_mul(1000)
}

/// Runs one snapshot of the configured mode into freshly sized buffers.
pub fn take_snapshot<D: PlatformDriver>(
    snapshotter: &Snapshotter<D>,
    config: &Config,
    session: &mut Session,
) -> anyhow::Result<Table> {
    let capacity = config.capacity();
    let len = capacity
        .checked_mul(METRIC_COUNT)
        .filter(|_| capacity <= MAX_CAPACITY)
        .with_context(|| format!("capacity {} is too large for a snapshot buffer", capacity))?;
    let mut out = vec![0.0; len];
    let mut pids = vec![0.0; capacity];

    let matched = match (config.mode(), config.to_filter()) {
        (SampleMode::Delta, _) => {
            snapshotter.snapshot_delta(&mut out, capacity, METRIC_COUNT, Some(&mut pids), session)
        }
        (SampleMode::Absolute, Some(filter)) => snapshotter.snapshot_filtered(
            &mut out,
            capacity,
            METRIC_COUNT,
            Some(&mut pids),
            &filter,
        ),
        (SampleMode::Absolute, None) => {
            snapshotter.snapshot_absolute(&mut out, capacity, METRIC_COUNT, Some(&mut pids))
        }
    };

    let written = matched.min(capacity);
    let rows = out
        .chunks_exact(METRIC_COUNT)
        .zip(pids.iter())
        .take(written)
        .map(|(chunk, pid)| {
            let mut values = [0.0; METRIC_COUNT];
            values.copy_from_slice(chunk);
            (*pid as u32, values)
        })
        .collect();

    Ok(Table { matched, rows })
}

fn format_value(v: f64) -> String {
    if v < 0.0 {
        "-".to_string()
    } else if v.fract() == 0.0 {
        format!("{}", v as u64)
    } else {
        format!("{:.1}", v)
    }
}

/// Renders `table` with the chosen columns.
pub fn render(table: &Table, columns: &[Metric], names: Option<&dyn Fn(u32) -> Option<String>>) -> String {
    let mut out = String::new();
    out.push_str(&format!("{:>8}", "pid"));
    if names.is_some() {
        out.push_str(&format!(" {:<16}", "comm"));
    }
    for m in columns {
        out.push_str(&format!(" {:>20}", m.name()));
    }
    out.push('\n');

    for (pid, values) in &table.rows {
        out.push_str(&format!("{:>8}", pid));
        if let Some(lookup) = names {
            let comm = lookup(*pid).unwrap_or_else(|| "?".to_string());
            out.push_str(&format!(" {:<16}", comm));
        }
        for m in columns {
            out.push_str(&format!(" {:>20}", format_value(values[m.index()])));
        }
        out.push('\n');
    }
    out
}

pub fn command_sample(config: &Config, show_comm: bool) -> anyhow::Result<()> {
    let columns = config.selected_metrics()?;
    let driver = super::build_driver(config)?;
    let snapshotter = Snapshotter::new(driver);
    let mut session = match config.session_row_limit {
        Some(limit) => Session::with_row_limit(limit),
        None => Session::new(),
    };

    if config.mode() == SampleMode::Delta && config.to_filter().is_some() {
        warn!("Filters are ignored in delta mode");
    }

    let iterations = config.iterations().max(1);
    let stdout = io::stdout();
    let mut handle = stdout.lock();

    for i in 0..iterations {
        if i > 0 {
            system::sleep_micros(interval_micros(config));
        }

        let started = system::monotonic_seconds();
        let table = take_snapshot(&snapshotter, config, &mut session)?;
        debug!(
            iteration = i + 1,
            matched = table.matched,
            elapsed_s = system::monotonic_seconds() - started,
            "snapshot taken"
        );

        if table.matched > config.capacity() {
            warn!(
                "{} processes matched but capacity is {}; raise --capacity to see all",
                table.matched,
                config.capacity()
            );
        }

        writeln!(
            handle,
            "# iteration {}/{} mode={:?} matched={} written={}",
            i + 1,
            iterations,
            config.mode(),
            table.matched,
            table.rows.len()
        )?;
        let driver = snapshotter.driver();
        let lookup = |pid: u32| driver.read_comm(pid);
        let names: Option<&dyn Fn(u32) -> Option<String>> = if show_comm { Some(&lookup) } else { None };
        write!(handle, "{}", render(&table, &columns, names))?;
    }

    session.release();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tensorscan::{FixtureDriver, FixtureProcess, PlatformConstants};

    fn snapshotter() -> Snapshotter<FixtureDriver> {
        Snapshotter::new(
            FixtureDriver::new(PlatformConstants::default())
                .with(FixtureProcess::new(7, 1).utime(10).comm("init"))
                .with(FixtureProcess::new(3, 1).utime(20).without_io()),
        )
    }

    #[test]
    fn test_take_snapshot_absolute() {
        let config = Config::default();
        let table = take_snapshot(&snapshotter(), &config, &mut Session::new()).unwrap();
        assert_eq!(table.matched, 2);
        assert_eq!(table.rows[0].0, 3);
        assert_eq!(table.rows[1].1[Metric::UtimeNs.index()], 10.0 * 1e7);
    }

    #[test]
    fn test_take_snapshot_respects_capacity() {
        let config = Config {
            capacity: Some(1),
            ..Config::default()
        };
        let table = take_snapshot(&snapshotter(), &config, &mut Session::new()).unwrap();
        assert_eq!(table.matched, 2);
        assert_eq!(table.rows.len(), 1);
    }

    #[test]
    fn test_oversized_capacity_is_an_error() {
        let config = Config {
            capacity: Some(usize::MAX / 4),
            ..Config::default()
        };
        assert!(take_snapshot(&snapshotter(), &config, &mut Session::new()).is_err());
    }

    #[test]
    fn test_interval_saturates() {
        let config = Config {
            interval_ms: Some(u64::MAX),
            ..Config::default()
        };
        assert_eq!(interval_micros(&config), u64::MAX);
        assert_eq!(interval_micros(&Config::default()), 1_000_000);
    }

    #[test]
    fn test_render_marks_unavailable() {
        let config = Config::default();
        let table = take_snapshot(&snapshotter(), &config, &mut Session::new()).unwrap();
        let text = render(&table, &[Metric::IoReadBytes], None);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("io_read_bytes"));
        assert!(lines[1].trim_end().ends_with('-'));
        assert!(lines[2].trim_end().ends_with('0'));
    }
}
