//! Counter deltas between two pid-ascending sample sets.
//!
//! The merge walks both sets once with a forward cursor into the baseline,
//! so a call costs O(n + m). A baseline entry only applies when both pid and
//! start time match; a recycled pid is treated as a first observation.

use crate::sample::{MetricRow, Sample};
use crate::schema::{is_unavailable, Metric};

/// Delta of one counter value.
///
/// `baseline` is `None` when the process has no matching previous sample.
pub fn counter_delta(current: f64, baseline: Option<f64>) -> f64 {
    if is_unavailable(current) {
        return current;
    }
    match baseline {
        Some(prev) if !is_unavailable(prev) => (current - prev).max(0.0),
        _ => 0.0,
    }
}

/// Applies `baseline` to `current`: counters become deltas, everything else
/// passes through.
pub fn delta_row(current: &MetricRow, baseline: Option<&MetricRow>) -> MetricRow {
    let mut out = *current;
    for metric in Metric::ALL.into_iter().filter(|m| m.is_counter()) {
        out.set(
            metric,
            counter_delta(current.get(metric), baseline.map(|b| b.get(metric))),
        );
    }
    out
}

/// Iterator over `current`, yielding `(sample, delta_row)` in order.
///
/// Both slices must be strictly ascending by pid.
pub struct DeltaRows<'a> {
    previous: &'a [Sample],
    current: std::slice::Iter<'a, Sample>,
    cursor: usize,
}

impl<'a> DeltaRows<'a> {
    pub fn new(previous: &'a [Sample], current: &'a [Sample]) -> Self {
        Self {
            previous,
            current: current.iter(),
            cursor: 0,
        }
    }

    fn baseline_for(&mut self, sample: &Sample) -> Option<&'a MetricRow> {
        let pid = sample.pid();
        while self
            .previous
            .get(self.cursor)
            .is_some_and(|prev| prev.pid() < pid)
        {
            self.cursor += 1;
        }
        let previous: &'a [Sample] = self.previous;
        previous
            .get(self.cursor)
            .filter(|prev| prev.identity == sample.identity)
            .map(|prev| &prev.row)
    }
}

impl<'a> Iterator for DeltaRows<'a> {
    type Item = (&'a Sample, MetricRow);

    fn next(&mut self) -> Option<Self::Item> {
        let sample = self.current.next()?;
        let baseline = self.baseline_for(sample);
        Some((sample, delta_row(&sample.row, baseline)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.current.size_hint()
    }
}

impl ExactSizeIterator for DeltaRows<'_> {}
