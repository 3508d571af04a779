//! Shared test utilities and fixtures for the lazyinit test suite.
//!
//! This module provides:
//! - Policy and registrar fixtures
//! - Recording initializers that count and order their invocations
//! - A release counter
//!
//! # Usage
//!
//! ```rust,ignore
//! mod common;
//! use common::*;
//! ```

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use lazyinit::diagnostics::MemorySink;
use lazyinit::dispatch::{ClassificationMode, LazyInit, LazyInitBuilder};
use lazyinit::policy::PolicyTables;
use lazyinit::registry::Registrar;

// ============================================================================
// Invocation Log
// ============================================================================

/// Records the order in which initializers ran.
#[derive(Debug, Clone, Default)]
pub struct InvocationLog {
    names: Arc<Mutex<Vec<String>>>,
}

impl InvocationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// An initializer that logs `name` and returns `status`.
    pub fn initializer(&self, name: &str, status: i32) -> impl FnOnce() -> i32 + Send + 'static {
        let names = Arc::clone(&self.names);
        let name = name.to_string();
        move || {
            names.lock().push(name);
            status
        }
    }

    pub fn names(&self) -> Vec<String> {
        self.names.lock().clone()
    }

    pub fn count(&self, name: &str) -> usize {
        self.names.lock().iter().filter(|n| *n == name).count()
    }
}

// ============================================================================
// Release Counter
// ============================================================================

/// Counts how many times the release action fired.
#[derive(Debug, Clone, Default)]
pub struct ReleaseCounter {
    count: Arc<AtomicUsize>,
}

impl ReleaseCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn action(&self) -> impl FnOnce() + Send + 'static {
        let count = Arc::clone(&self.count);
        move || {
            count.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub fn get(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

// ============================================================================
// Fixtures
// ============================================================================

/// Everything a dispatch test needs to observe the core.
pub struct Harness {
    pub core: LazyInit,
    pub log: InvocationLog,
    pub sink: MemorySink,
    pub released: ReleaseCounter,
}

/// Policy used by most tests.
///
/// `x`, `y`, `z` are eligible, `w` and `v` are deferred to the end, `skip`
/// is ignored (and also listed as eligible), `plain` is built in.
pub fn standard_policy() -> PolicyTables {
    PolicyTables::builder()
        .eligible(["x", "y", "z", "skip"])
        .deferred(["w", "v"])
        .ignored(["skip"])
        .builtin(["plain"])
        .build()
}

/// Register `components` as `(name, status)` pairs and build a core.
pub fn harness_with(
    policy: PolicyTables,
    components: &[(&str, i32)],
    configure: impl FnOnce(LazyInitBuilder) -> LazyInitBuilder,
) -> Harness {
    let log = InvocationLog::new();
    let registrar = Registrar::new(policy);
    for (name, status) in components {
        registrar.register(*name, log.initializer(name, *status));
    }

    let sink = MemorySink::new();
    let released = ReleaseCounter::new();
    let builder = LazyInit::builder(registrar)
        .sink(Arc::new(sink.clone()))
        .reporter_enabled(false)
        .on_release(released.action());
    let core = configure(builder).build();

    Harness {
        core,
        log,
        sink,
        released,
    }
}

/// Standard policy with `x`, `y`, `z` normal and `w` deferred.
pub fn harness(mode: ClassificationMode) -> Harness {
    harness_with(
        standard_policy(),
        &[("x", 0), ("y", 0), ("z", 0), ("w", 0)],
        |b| b.mode(mode),
    )
}
