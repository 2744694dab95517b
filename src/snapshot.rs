//! Snapshot orchestrator: the public entry points.
//!
//! Every operation validates the output shape first, captures through the
//! driver, optionally routes the samples through the delta merge and writes
//! the result row-major. All of them return the true number of matching
//! processes; a call-level failure is logged and reported as 0.

use std::time::Instant;

use tracing::{debug, instrument, warn};

use crate::delta::DeltaRows;
use crate::driver::{capture_absolute, PlatformDriver};
use crate::error::Result;
use crate::filter::Filter;
use crate::matrix::MatrixWriter;
use crate::sample::Sample;
use crate::session::Session;

pub struct Snapshotter<D> {
    driver: D,
}

impl<D: PlatformDriver> Snapshotter<D> {
    pub fn new(driver: D) -> Self {
        Self { driver }
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    pub fn into_driver(self) -> D {
        self.driver
    }

    /// Absolute rows for every visible process.
    #[instrument(level = "debug", skip_all, fields(rows = rows, cols = cols))]
    pub fn snapshot_absolute(
        &self,
        out: &mut [f64],
        rows: usize,
        cols: usize,
        pid_out: Option<&mut [f64]>,
    ) -> usize {
        self.absolute(out, rows, cols, pid_out, None)
    }

    /// Absolute rows for the processes `filter` admits.
    #[instrument(level = "debug", skip_all, fields(rows = rows, cols = cols))]
    pub fn snapshot_filtered(
        &self,
        out: &mut [f64],
        rows: usize,
        cols: usize,
        pid_out: Option<&mut [f64]>,
        filter: &Filter,
    ) -> usize {
        self.absolute(out, rows, cols, pid_out, Some(filter))
    }

    /// Rows whose counter columns are deltas against `session`'s baseline.
    ///
    /// The baseline is then replaced by the absolute samples written in this
    /// call. If the session cannot grow its buffers the call returns 0,
    /// writes nothing and keeps the previous baseline.
    #[instrument(level = "debug", skip_all, fields(rows = rows, cols = cols, generation = session.generation()))]
    pub fn snapshot_delta(
        &self,
        out: &mut [f64],
        rows: usize,
        cols: usize,
        pid_out: Option<&mut [f64]>,
        session: &mut Session,
    ) -> usize {
        let started = Instant::now();
        let mut writer = match MatrixWriter::new(out, rows, cols, pid_out) {
            Ok(w) => w,
            Err(e) => {
                warn!(error = %e, "rejecting delta snapshot");
                return 0;
            }
        };

        let limit = session.row_limit();
        let captured = {
            let (pids, current) = session.capture_buffers();
            capture_absolute(&self.driver, None, rows, pids, current, limit)
        };
        let matched = match captured {
            Ok(matched) => matched,
            Err(e) => {
                warn!(error = %e, "delta snapshot degraded, baseline kept");
                session.discard_current();
                return 0;
            }
        };

        let (previous, current) = session.previous_and_current();
        let written = current.len();
        for (index, (sample, row)) in DeltaRows::new(previous, current).enumerate() {
            writer.write(index, sample.pid(), &row);
        }
        session.commit_baseline();

        debug!(
            matched,
            written,
            elapsed_us = started.elapsed().as_micros() as u64,
            "delta snapshot complete"
        );
        matched
    }

    fn absolute(
        &self,
        out: &mut [f64],
        rows: usize,
        cols: usize,
        pid_out: Option<&mut [f64]>,
        filter: Option<&Filter>,
    ) -> usize {
        let started = Instant::now();
        match self.capture_into(out, rows, cols, pid_out, filter) {
            Ok((matched, written)) => {
                debug!(
                    matched,
                    written,
                    elapsed_us = started.elapsed().as_micros() as u64,
                    "snapshot complete"
                );
                matched
            }
            Err(e) => {
                warn!(error = %e, "snapshot failed");
                0
            }
        }
    }

    fn capture_into(
        &self,
        out: &mut [f64],
        rows: usize,
        cols: usize,
        pid_out: Option<&mut [f64]>,
        filter: Option<&Filter>,
    ) -> Result<(usize, usize)> {
        let mut writer = MatrixWriter::new(out, rows, cols, pid_out)?;
        let mut pids = Vec::new();
        let mut samples: Vec<Sample> = Vec::new();
        let matched = capture_absolute(&self.driver, filter, rows, &mut pids, &mut samples, None)?;
        for (index, sample) in samples.iter().enumerate() {
            writer.write(index, sample.pid(), &sample.row);
        }
        Ok((matched, samples.len()))
    }
}
