//! Error budget for import pipelines.
//!
//! Parse and insert failures are counted against two independent
//! thresholds. The first count that goes past its threshold trips the
//! budget, and the count at that moment is kept for the summary even if
//! in-flight batches keep adding failures afterwards.
//!
//! Counters are atomic because workers record insert failures concurrently;
//! the sample list and the trip record sit behind mutexes.

use crate::models::Threshold;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// Number of error messages retained for diagnostics.
pub const ERROR_SAMPLE_LIMIT: usize = 5;

/// Kind of recoverable error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed source record.
    Parse,
    /// Write statement rejected by the database.
    Insert,
}

impl ErrorKind {
    /// Lowercase name used in summaries.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Parse => "parse",
            Self::Insert => "insert",
        }
    }
}

/// A retained error message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorSample {
    /// 1-based source record index.
    pub record: u64,
    /// Error text.
    pub message: String,
}

/// The threshold crossing that aborted a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BudgetTrip {
    /// Which budget was exhausted.
    pub kind: ErrorKind,
    /// The error count that crossed the threshold.
    pub count: u64,
}

/// What the caller should do after recording an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Keep going.
    Continue,
    /// Stop producing work.
    Abort,
}

/// Counts recoverable errors and decides when to abort.
#[derive(Debug)]
pub struct ErrorBudget {
    parse_limit: Threshold,
    insert_limit: Threshold,
    parse_errors: AtomicU64,
    insert_errors: AtomicU64,
    samples: Mutex<Vec<ErrorSample>>,
    trip: Mutex<Option<BudgetTrip>>,
}

impl ErrorBudget {
    /// Creates a budget with the given thresholds.
    #[must_use]
    pub const fn new(parse_limit: Threshold, insert_limit: Threshold) -> Self {
        Self {
            parse_limit,
            insert_limit,
            parse_errors: AtomicU64::new(0),
            insert_errors: AtomicU64::new(0),
            samples: Mutex::new(Vec::new()),
            trip: Mutex::new(None),
        }
    }

    /// Records a parse failure for a source record.
    pub fn record_parse(&self, record: u64, message: impl Into<String>) -> Verdict {
        let count = self.parse_errors.fetch_add(1, Ordering::SeqCst) + 1;
        metrics::counter!("tablecopy_parse_errors_total").increment(1);
        self.record(ErrorKind::Parse, count, self.parse_limit, record, message.into())
    }

    /// Records a failed write for a source record.
    pub fn record_insert(&self, record: u64, message: impl Into<String>) -> Verdict {
        let count = self.insert_errors.fetch_add(1, Ordering::SeqCst) + 1;
        metrics::counter!("tablecopy_insert_errors_total").increment(1);
        self.record(ErrorKind::Insert, count, self.insert_limit, record, message.into())
    }

    fn record(
        &self,
        kind: ErrorKind,
        count: u64,
        limit: Threshold,
        record: u64,
        message: String,
    ) -> Verdict {
        if let Ok(mut samples) = self.samples.lock()
            && samples.len() < ERROR_SAMPLE_LIMIT
        {
            samples.push(ErrorSample { record, message });
        }
        if !limit.is_exceeded_by(count) {
            return Verdict::Continue;
        }
        if let Ok(mut trip) = self.trip.lock()
            && trip.is_none()
        {
            tracing::warn!(kind = kind.as_str(), count, %limit, "Error budget exhausted");
            *trip = Some(BudgetTrip { kind, count });
        }
        Verdict::Abort
    }

    /// Returns the trip record if the budget has been exhausted.
    #[must_use]
    pub fn trip(&self) -> Option<BudgetTrip> {
        self.trip.lock().ok().and_then(|trip| *trip)
    }

    /// Returns whether the budget has been exhausted.
    #[must_use]
    pub fn is_tripped(&self) -> bool {
        self.trip().is_some()
    }

    /// Parse failures recorded so far.
    #[must_use]
    pub fn parse_errors(&self) -> u64 {
        self.parse_errors.load(Ordering::SeqCst)
    }

    /// Insert failures recorded so far.
    #[must_use]
    pub fn insert_errors(&self) -> u64 {
        self.insert_errors.load(Ordering::SeqCst)
    }

    /// The first retained error messages, in recording order.
    #[must_use]
    pub fn samples(&self) -> Vec<ErrorSample> {
        self.samples
            .lock()
            .map(|samples| samples.clone())
            .unwrap_or_default()
    }
}

/// Renders retained samples as an indented list for summaries.
///
/// Returns an empty string when there is nothing to show.
#[must_use]
pub fn render_samples(samples: &[ErrorSample], total_errors: u64) -> String {
    if samples.is_empty() {
        return String::new();
    }
    let mut out = String::from("\n\nFirst errors encountered:");
    for sample in samples {
        out.push_str(&format!("\n  - Row {}: {}", sample.record, sample.message));
    }
    let shown = samples.len() as u64;
    if total_errors > shown {
        out.push_str(&format!("\n  ... and {} more errors", total_errors - shown));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_unlimited_never_trips() {
        let budget = ErrorBudget::new(Threshold::Unlimited, Threshold::Unlimited);
        for i in 0..100 {
            assert_eq!(budget.record_parse(i, "bad"), Verdict::Continue);
        }
        assert!(!budget.is_tripped());
        assert_eq!(budget.parse_errors(), 100);
    }

    #[test]
    fn test_trips_after_threshold() {
        let budget = ErrorBudget::new(Threshold::Max(2), Threshold::Unlimited);
        assert_eq!(budget.record_parse(1, "a"), Verdict::Continue);
        assert_eq!(budget.record_parse(2, "b"), Verdict::Continue);
        assert_eq!(budget.record_parse(3, "c"), Verdict::Abort);
        assert_eq!(
            budget.trip(),
            Some(BudgetTrip {
                kind: ErrorKind::Parse,
                count: 3
            })
        );
    }

    #[test]
    fn test_zero_threshold_trips_on_first_error() {
        let budget = ErrorBudget::new(Threshold::Unlimited, Threshold::Max(0));
        assert_eq!(budget.record_insert(1, "timeout"), Verdict::Abort);
    }

    #[test]
    fn test_trip_count_is_frozen() {
        let budget = ErrorBudget::new(Threshold::Unlimited, Threshold::Max(1));
        budget.record_insert(1, "x");
        budget.record_insert(2, "x");
        budget.record_insert(3, "x");
        assert_eq!(budget.trip().map(|t| t.count), Some(2));
        assert_eq!(budget.insert_errors(), 3);
    }

    #[test]
    fn test_keeps_first_five_samples() {
        let budget = ErrorBudget::new(Threshold::Unlimited, Threshold::Unlimited);
        for i in 1..=8 {
            budget.record_insert(i, format!("error {i}"));
        }
        let samples = budget.samples();
        assert_eq!(samples.len(), ERROR_SAMPLE_LIMIT);
        assert_eq!(samples[0].record, 1);
        assert_eq!(samples[4].message, "error 5");

        let rendered = render_samples(&samples, 8);
        assert!(rendered.contains("First errors encountered:"));
        assert!(rendered.contains("  - Row 1: error 1"));
        assert!(rendered.ends_with("... and 3 more errors"));
    }

    #[test]
    fn test_concurrent_insert_errors_are_counted() {
        let budget = Arc::new(ErrorBudget::new(Threshold::Unlimited, Threshold::Unlimited));
        let handles: Vec<_> = (0..4)
            .map(|w| {
                let budget = Arc::clone(&budget);
                thread::spawn(move || {
                    for i in 0..250 {
                        budget.record_insert(w * 1000 + i, "boom");
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(budget.insert_errors(), 1000);
        assert_eq!(budget.samples().len(), ERROR_SAMPLE_LIMIT);
    }
}
