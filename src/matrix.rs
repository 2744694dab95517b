//! Flat row-major output marshalling.
//!
//! The caller's buffer holds `rows × cols` values; the first
//! `METRIC_COUNT` columns of each row carry the schema, any extra columns are
//! left as the caller set them.

use crate::error::{Result, ScanError};
use crate::sample::MetricRow;
use crate::schema::METRIC_COUNT;

/// Validated view over a caller-provided output matrix and optional pid column.
#[derive(Debug)]
pub struct MatrixWriter<'a> {
    out: &'a mut [f64],
    pid_out: Option<&'a mut [f64]>,
    rows: usize,
    cols: usize,
}

impl<'a> MatrixWriter<'a> {
    /// Checks the buffer shape. Nothing is written on failure.
    pub fn new(
        out: &'a mut [f64],
        rows: usize,
        cols: usize,
        pid_out: Option<&'a mut [f64]>,
    ) -> Result<Self> {
        if cols < METRIC_COUNT {
            return Err(ScanError::InvalidArguments(format!(
                "{} columns requested, schema needs {}",
                cols, METRIC_COUNT
            )));
        }
        let needed = rows
            .checked_mul(cols)
            .ok_or_else(|| ScanError::InvalidArguments("matrix size overflows".into()))?;
        if out.len() < needed {
            return Err(ScanError::InvalidArguments(format!(
                "output buffer holds {} values, {} needed",
                out.len(),
                needed
            )));
        }
        if let Some(pids) = pid_out.as_deref() {
            if pids.len() < rows {
                return Err(ScanError::InvalidArguments(format!(
                    "pid buffer holds {} values, {} needed",
                    pids.len(),
                    rows
                )));
            }
        }
        Ok(Self {
            out,
            pid_out,
            rows,
            cols,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Writes row `index`. Indices at or past `rows()` are ignored.
    pub fn write(&mut self, index: usize, pid: u32, row: &MetricRow) {
        if index >= self.rows {
            return;
        }
        let start = index * self.cols;
        self.out[start..start + METRIC_COUNT].copy_from_slice(&row.to_array());
        if let Some(pids) = self.pid_out.as_deref_mut() {
            pids[index] = f64::from(pid);
        }
    }
}
