//! Failure aggregation and the diagnostics sink.
//!
//! Every failure noticed while serving requests becomes one human-readable
//! line. The line is emitted to the [`DiagnosticSink`] right away and also
//! appended to a bounded buffer, so the periodic reporter and the completion
//! barrier can print the whole history again later.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

/// Default size of the failure buffer in bytes.
pub const DEFAULT_BUFFER_CAPACITY: usize = 16 * 1024;

/// Destination for formatted diagnostic lines.
pub trait DiagnosticSink: Send + Sync {
    /// Emit one line, without a trailing newline.
    fn emit(&self, line: &str);
}

/// Sink that forwards every line to `tracing` at error level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn emit(&self, line: &str) {
        tracing::error!(target: "lazyinit", "{}", line);
    }
}

/// Sink that keeps every line in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl MemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything emitted so far.
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    /// Drop everything emitted so far.
    pub fn clear(&self) {
        self.lines.lock().clear();
    }
}

impl DiagnosticSink for MemorySink {
    fn emit(&self, line: &str) {
        self.lines.lock().push(line.to_string());
    }
}

/// Append-only, bounded buffer of failure lines.
pub struct Aggregator {
    buffer: String,
    capacity: usize,
    truncated: bool,
    sink: Arc<dyn DiagnosticSink>,
}

impl Aggregator {
    /// Create an aggregator holding at most `capacity` bytes.
    pub fn new(capacity: usize, sink: Arc<dyn DiagnosticSink>) -> Self {
        Self {
            buffer: String::with_capacity(capacity.min(DEFAULT_BUFFER_CAPACITY)),
            capacity,
            truncated: false,
            sink,
        }
    }

    /// Record one failure line.
    ///
    /// The line reaches the sink immediately. The buffered copy is cut at the
    /// last character boundary that fits; once the buffer is full further
    /// lines are only emitted, never stored.
    pub fn record(&mut self, line: impl AsRef<str>) {
        let line = line.as_ref().trim_end_matches('\n');
        if line.is_empty() {
            return;
        }
        self.sink.emit(line);

        let remaining = self.capacity.saturating_sub(self.buffer.len());
        let needed = line.len() + 1;
        if needed <= remaining {
            self.buffer.push_str(line);
            self.buffer.push('\n');
            return;
        }

        self.truncated = true;
        let mut cut = remaining;
        while cut > 0 && !line.is_char_boundary(cut) {
            cut -= 1;
        }
        self.buffer.push_str(&line[..cut]);
    }

    /// Whether anything was recorded.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Whether some recorded text did not fit.
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    /// Buffered lines, oldest first.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.buffer.split('\n').filter(|l| !l.is_empty())
    }

    /// Buffered bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Emit every buffered line to the sink.
    ///
    /// Returns whether there was anything to emit. The buffer keeps its
    /// contents, so each periodic report shows the full history.
    pub fn flush(&self) -> bool {
        if self.buffer.is_empty() {
            return false;
        }
        for line in self.lines() {
            self.sink.emit(line);
        }
        true
    }

    /// The sink lines are emitted to.
    pub fn sink(&self) -> &Arc<dyn DiagnosticSink> {
        &self.sink
    }
}

impl fmt::Debug for Aggregator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Aggregator")
            .field("len", &self.buffer.len())
            .field("capacity", &self.capacity)
            .field("truncated", &self.truncated)
            .finish()
    }
}
