//! Initializer timing metrics.
//!
//! Every invocation made by the dispatcher is recorded with its position in
//! the overall invocation order, its offset from boot and how long it ran.
//! The completion barrier stamps the moment startup resources were released.

use std::time::{Duration, Instant};

use crate::registry::InitKind;

/// One initializer invocation.
#[derive(Debug, Clone)]
pub struct InitRecord {
    /// Position in the overall invocation order, starting at 0
    pub sequence: usize,
    /// Registry index of the entry
    pub index: usize,
    /// Component name
    pub name: String,
    /// Entry kind
    pub kind: InitKind,
    /// Status returned by the initializer
    pub status: i32,
    /// Offset from boot at which the initializer was entered
    pub started: Duration,
    /// Time spent inside the initializer
    pub duration: Duration,
}

impl InitRecord {
    /// Offset from boot at which the initializer returned.
    pub fn finished(&self) -> Duration {
        self.started + self.duration
    }

    /// Whether the initializer reported success.
    pub fn succeeded(&self) -> bool {
        self.status == 0
    }
}

/// Initializer metrics collector.
///
/// # Example
///
/// ```rust
/// use std::time::Instant;
/// use lazyinit::registry::InitKind;
/// use lazyinit::startup::InitMetrics;
///
/// let mut metrics = InitMetrics::new(Instant::now());
/// let status = metrics.measure(0, "camera", InitKind::Normal, || 0);
/// assert_eq!(status, 0);
/// assert_eq!(metrics.records().len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct InitMetrics {
    boot: Instant,
    records: Vec<InitRecord>,
    completed_at: Option<Duration>,
}

impl InitMetrics {
    /// Create a collector measuring offsets from `boot`.
    pub fn new(boot: Instant) -> Self {
        Self {
            boot,
            records: Vec::new(),
            completed_at: None,
        }
    }

    /// Run an initializer and record it.
    pub fn measure<F>(&mut self, index: usize, name: &str, kind: InitKind, f: F) -> i32
    where
        F: FnOnce() -> i32,
    {
        let start = Instant::now();
        let status = f();
        let duration = start.elapsed();

        self.records.push(InitRecord {
            sequence: self.records.len(),
            index,
            name: name.to_string(),
            kind,
            status,
            started: start.saturating_duration_since(self.boot),
            duration,
        });
        status
    }

    /// Stamp the completion barrier.
    pub fn mark_completed(&mut self) {
        if self.completed_at.is_none() {
            self.completed_at = Some(self.boot.elapsed());
        }
    }

    /// Offset from boot at which the barrier fired.
    pub fn completed_at(&self) -> Option<Duration> {
        self.completed_at
    }

    /// Every invocation, in invocation order.
    pub fn records(&self) -> &[InitRecord] {
        &self.records
    }

    /// The invocation of a named component.
    pub fn record(&self, name: &str) -> Option<&InitRecord> {
        self.records.iter().find(|r| r.name == name)
    }

    /// Number of initializers that returned non-zero.
    pub fn failures(&self) -> usize {
        self.records.iter().filter(|r| !r.succeeded()).count()
    }

    /// Time spent inside initializers overall.
    pub fn total_init_time(&self) -> Duration {
        self.records.iter().map(|r| r.duration).sum()
    }

    /// Records sorted by duration (descending).
    pub fn sorted_by_duration(&self) -> Vec<&InitRecord> {
        let mut records: Vec<_> = self.records.iter().collect();
        records.sort_by(|a, b| b.duration.cmp(&a.duration));
        records
    }

    /// Print a formatted report of initializer timing.
    pub fn report(&self) {
        let total = self.total_init_time();

        eprintln!("\n=== Initializer Timing Report ===");
        eprintln!();

        for record in self.sorted_by_duration() {
            let pct = if total.as_nanos() > 0 {
                (record.duration.as_nanos() as f64 / total.as_nanos() as f64) * 100.0
            } else {
                0.0
            };

            eprintln!(
                "  {:24} {:>8.2}ms ({:>5.1}%) {:>4} [{}]",
                record.name,
                record.duration.as_secs_f64() * 1000.0,
                pct,
                record.status,
                record.kind
            );
        }

        eprintln!();
        eprintln!(
            "  {:24} {:>8.2}ms",
            "TOTAL",
            total.as_secs_f64() * 1000.0
        );
        if let Some(at) = self.completed_at {
            eprintln!(
                "  {:24} {:>8.2}ms after boot",
                "RELEASED",
                at.as_secs_f64() * 1000.0
            );
        }
        eprintln!();
    }

    /// Get a JSON representation of the metrics.
    pub fn to_json(&self) -> serde_json::Value {
        let records: Vec<serde_json::Value> = self
            .records
            .iter()
            .map(|r| {
                serde_json::json!({
                    "sequence": r.sequence,
                    "index": r.index,
                    "name": r.name,
                    "kind": r.kind.to_string(),
                    "status": r.status,
                    "started_us": r.started.as_micros(),
                    "duration_us": r.duration.as_micros(),
                })
            })
            .collect();

        serde_json::json!({
            "total_init_ms": self.total_init_time().as_secs_f64() * 1000.0,
            "completed_at_ms": self.completed_at.map(|d| d.as_secs_f64() * 1000.0),
            "initializers": records,
        })
    }
}
