//! Matcher, dispatcher and completion barrier.
//!
//! [`LazyInit`] owns the sealed registry together with the process-wide
//! state. Every request runs under one lock: classify the name, look it up,
//! translate its arguments, invoke the initializer at most once. A request
//! that reached a waiting entry then checks whether every normal entry has
//! run. The first request that observes that
//! runs the deferred-to-end entries, flushes the failure buffer, fires the
//! release action and latches `completed`. Afterwards every request is a
//! no-op.
//!
//! Initializers run while the lock is held. An initializer must not issue a
//! load request itself.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::diagnostics::{Aggregator, DiagnosticSink, TracingSink, DEFAULT_BUFFER_CAPACITY};
use crate::params::{self, NoParams, ParamSink};
use crate::policy::{Classification, PolicyTables};
use crate::registry::{InitKind, Registrar, Registry};
use crate::startup::{InitMetrics, PeriodicTask};

/// Default delay before the periodic reporter starts printing.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(30);

/// Default period of the reporter.
pub const DEFAULT_REPORT_INTERVAL: Duration = Duration::from_secs(5);

/// The one-way action performed when every component has been loaded.
pub type ReleaseAction = Box<dyn FnOnce() + Send>;

/// Outcome of a single load request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchResult {
    /// Nothing left to do for this name, or its initializer returned 0.
    Success,
    /// The barrier already fired; the request was ignored.
    AlreadyCompleted,
    /// Strict mode only: the name is unknown to every table.
    UnknownComponent,
    /// The request arguments could not be decoded; nothing was invoked.
    ConfigurationError(String),
    /// The initializer ran and returned a non-zero status.
    InitializerFailed(i32),
}

impl DispatchResult {
    /// Whether the request can be considered handled.
    ///
    /// Initializer failures are advisory and count as handled.
    pub fn is_ok(&self) -> bool {
        !matches!(
            self,
            DispatchResult::UnknownComponent | DispatchResult::ConfigurationError(_)
        )
    }
}

impl fmt::Display for DispatchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchResult::Success => write!(f, "success"),
            DispatchResult::AlreadyCompleted => write!(f, "already completed"),
            DispatchResult::UnknownComponent => write!(f, "unknown component"),
            DispatchResult::ConfigurationError(details) => {
                write!(f, "configuration error: {}", details)
            }
            DispatchResult::InitializerFailed(code) => {
                write!(f, "initializer failed with status {}", code)
            }
        }
    }
}

/// How a request for a name nobody knows is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassificationMode {
    /// Report [`DispatchResult::UnknownComponent`]; the loader treats it as fatal.
    #[default]
    Strict,
    /// Record a diagnostic and report success.
    Permissive,
}

impl fmt::Display for ClassificationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClassificationMode::Strict => write!(f, "strict"),
            ClassificationMode::Permissive => write!(f, "permissive"),
        }
    }
}

/// What a reporter tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportOutcome {
    /// Still inside the grace period; nothing printed.
    Quiet,
    /// Failures were flushed and `pending` unrun entries listed.
    Reported { pending: usize },
    /// The barrier already fired; the reporter should stop.
    Completed,
}

struct State {
    completed: bool,
    registry: Registry,
    aggregator: Aggregator,
    release: Option<ReleaseAction>,
    metrics: InitMetrics,
}

struct Shared {
    policy: Arc<PolicyTables>,
    mode: ClassificationMode,
    params: Arc<dyn ParamSink>,
    grace_period: Duration,
    boot: Instant,
    completed: AtomicBool,
    state: Mutex<State>,
    reporter: PeriodicTask,
}

/// Handle to the deferred-initializer core.
///
/// Cloning is cheap; all clones share the same registry and state.
#[derive(Clone)]
pub struct LazyInit {
    shared: Arc<Shared>,
}

impl LazyInit {
    /// Start configuring a core from a finished boot scan.
    pub fn builder(registrar: Registrar) -> LazyInitBuilder {
        LazyInitBuilder::new(registrar)
    }

    /// Serve one load request for `name`.
    ///
    /// `raw_args` carries free-form `param=value` pairs for the component.
    pub fn dispatch(&self, name: &str, raw_args: Option<&str>) -> DispatchResult {
        let shared = &self.shared;
        let (result, fired) = {
            let mut guard = shared.state.lock();
            let state = &mut *guard;

            if state.completed {
                debug!("\"{}\" requested after completion", name);
                return DispatchResult::AlreadyCompleted;
            }

            let (result, reached) = shared.match_and_run(state, name, raw_args);
            if !reached {
                return result;
            }

            let fired = shared.evaluate_barrier(state);
            if !fired {
                let weak = Arc::downgrade(&self.shared);
                shared.reporter.arm(move || report_tick(&weak));
            }
            (result, fired)
        };

        if fired {
            shared.reporter.cancel_sync();
        }
        result
    }

    /// Run one reporter tick as if `uptime` had elapsed since boot.
    ///
    /// The background reporter calls this with the real uptime.
    pub fn report(&self, uptime: Duration) -> ReportOutcome {
        self.shared.report(uptime)
    }

    /// Whether the barrier has fired.
    pub fn is_completed(&self) -> bool {
        self.shared.completed.load(Ordering::Acquire)
    }

    /// Whether `name` is registered and its initializer was attempted.
    ///
    /// `None` when the name is not registered.
    pub fn has_run(&self, name: &str) -> Option<bool> {
        self.shared
            .state
            .lock()
            .registry
            .get(name)
            .map(|e| e.has_run())
    }

    /// Registered names whose initializer has not run, in registration order.
    pub fn pending(&self) -> Vec<String> {
        self.shared
            .state
            .lock()
            .registry
            .unrun()
            .map(|e| e.name().to_string())
            .collect()
    }

    /// Number of registered entries.
    pub fn len(&self) -> usize {
        self.shared.state.lock().registry.len()
    }

    /// Whether nothing was registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Failure lines recorded so far.
    pub fn diagnostics(&self) -> Vec<String> {
        self.shared
            .state
            .lock()
            .aggregator
            .lines()
            .map(String::from)
            .collect()
    }

    /// Snapshot of initializer timings.
    pub fn metrics(&self) -> InitMetrics {
        self.shared.state.lock().metrics.clone()
    }

    /// The policy tables requests are classified against.
    pub fn policy(&self) -> &PolicyTables {
        &self.shared.policy
    }

    /// How unknown names are treated.
    pub fn mode(&self) -> ClassificationMode {
        self.shared.mode
    }

    /// Whether the periodic reporter has been started.
    pub fn is_reporter_started(&self) -> bool {
        self.shared.reporter.is_started()
    }

    /// Whether the periodic reporter has been cancelled by the barrier.
    pub fn is_reporter_cancelled(&self) -> bool {
        self.shared.reporter.is_cancelled()
    }

    /// Time since the boot instant this core measures from.
    pub fn uptime(&self) -> Duration {
        self.shared.boot.elapsed()
    }
}

impl fmt::Debug for LazyInit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyInit")
            .field("mode", &self.shared.mode)
            .field("completed", &self.is_completed())
            .field("pending", &self.pending().len())
            .finish()
    }
}

fn report_tick(weak: &Weak<Shared>) -> bool {
    match weak.upgrade() {
        Some(shared) => shared.report(shared.boot.elapsed()) != ReportOutcome::Completed,
        None => false,
    }
}

impl Shared {
    /// Serve one request. The flag is set when the request reached an
    /// entry that has not run yet; only those move the barrier.
    fn match_and_run(
        &self,
        state: &mut State,
        name: &str,
        raw_args: Option<&str>,
    ) -> (DispatchResult, bool) {
        debug!("trying to load \"{}\"", name);

        if self.policy.classify(name) == Classification::Ignored {
            debug!("\"{}\" is ignored (not lazy-loaded)", name);
            return (DispatchResult::Success, false);
        }

        let Some(entry) = state.registry.get_mut(name) else {
            return (self.unmatched(state, name), false);
        };
        let (index, kind) = (entry.index(), entry.kind());

        if entry.has_run() {
            debug!("lazy_initcalls[{}]: {} already loaded", index, name);
            return (DispatchResult::Success, false);
        }

        let first_request = entry.mark_configured();
        if let Some(raw) = raw_args.filter(|a| !a.trim().is_empty()) {
            if first_request {
                for line in params::translate(name, raw, self.params.as_ref()) {
                    state.aggregator.record(line);
                }
            } else {
                debug!(
                    "lazy_initcalls[{}]: {} already configured, ignoring \"{}\"",
                    index, name, raw
                );
            }
        }

        if kind == InitKind::DeferredToEnd {
            debug!(
                "lazy_initcalls[{}]: {} runs once every other component is loaded",
                index, name
            );
            return (DispatchResult::Success, true);
        }

        let result = match invoke(state, index) {
            0 => DispatchResult::Success,
            status => DispatchResult::InitializerFailed(status),
        };
        (result, true)
    }

    fn unmatched(&self, state: &mut State, name: &str) -> DispatchResult {
        if self.policy.is_builtin(name) {
            debug!("\"{}\" is built in without a deferred initializer", name);
            return DispatchResult::Success;
        }

        let line = format!("failed to find a built-in component with the name \"{}\"", name);
        match self.mode {
            ClassificationMode::Strict => {
                error!("{}", line);
                DispatchResult::UnknownComponent
            }
            ClassificationMode::Permissive => {
                state.aggregator.record(line);
                DispatchResult::Success
            }
        }
    }

    /// Fire the barrier if every normal entry has run. Returns whether it fired.
    fn evaluate_barrier(&self, state: &mut State) -> bool {
        if state.completed || !state.registry.all_normal_run() {
            return false;
        }

        let deferred = state.registry.deferred_indices();
        if !deferred.is_empty() {
            info!("all requested components loaded, now loading deferred built-in components");
        }
        for index in deferred {
            invoke(state, index);
        }

        info!("all components loaded, releasing startup resources");
        if state.aggregator.flush() {
            warn!("all components loaded with errors, review if necessary");
        }

        if let Some(release) = state.release.take() {
            release();
        }

        state.completed = true;
        state.metrics.mark_completed();
        self.completed.store(true, Ordering::Release);
        true
    }

    fn report(&self, uptime: Duration) -> ReportOutcome {
        let state = self.state.lock();
        if state.completed {
            return ReportOutcome::Completed;
        }
        if uptime < self.grace_period {
            return ReportOutcome::Quiet;
        }

        state.aggregator.flush();
        let sink = state.aggregator.sink();
        let mut pending = 0;
        for entry in state.registry.unrun() {
            sink.emit(&format!(
                "lazy_initcalls[{}]: {} not loaded yet",
                entry.index(),
                entry.name()
            ));
            pending += 1;
        }
        ReportOutcome::Reported { pending }
    }
}

/// Claim and run the entry at `index`, recording a non-zero status.
fn invoke(state: &mut State, index: usize) -> i32 {
    let Some(entry) = state.registry.entry_mut(index) else {
        return 0;
    };
    let name = entry.name().to_string();
    let kind = entry.kind();
    let Some(init) = entry.claim() else {
        return 0;
    };

    debug!("lazy_initcalls[{}]: running {}", index, name);
    let status = state.metrics.measure(index, &name, kind, init);
    if status != 0 {
        state.aggregator.record(format!(
            "lazy_initcalls[{}]: {}'s init function returned {}",
            index, name, status
        ));
    }
    status
}

/// Builder for [`LazyInit`].
pub struct LazyInitBuilder {
    registrar: Registrar,
    mode: ClassificationMode,
    params: Arc<dyn ParamSink>,
    sink: Arc<dyn DiagnosticSink>,
    release: Option<ReleaseAction>,
    grace_period: Duration,
    report_interval: Duration,
    reporter_enabled: bool,
    buffer_capacity: usize,
    boot: Instant,
}

impl LazyInitBuilder {
    fn new(registrar: Registrar) -> Self {
        Self {
            registrar,
            mode: ClassificationMode::default(),
            params: Arc::new(NoParams),
            sink: Arc::new(TracingSink),
            release: None,
            grace_period: DEFAULT_GRACE_PERIOD,
            report_interval: DEFAULT_REPORT_INTERVAL,
            reporter_enabled: true,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            boot: Instant::now(),
        }
    }

    /// Apply mode, reporter and diagnostics settings from a [`Config`].
    pub fn config(mut self, config: &Config) -> Self {
        self.mode = config.mode();
        self.grace_period = config.reporter.grace_period;
        self.report_interval = config.reporter.interval;
        self.reporter_enabled = config.reporter.enabled;
        self.buffer_capacity = config.diagnostics.buffer_capacity;
        self
    }

    /// How unknown names are treated.
    pub fn mode(mut self, mode: ClassificationMode) -> Self {
        self.mode = mode;
        self
    }

    /// Collaborator that applies translated request parameters.
    pub fn params(mut self, params: Arc<dyn ParamSink>) -> Self {
        self.params = params;
        self
    }

    /// Where diagnostic lines go.
    pub fn sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Action fired exactly once when every component has been loaded.
    pub fn on_release<F>(mut self, release: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        self.release = Some(Box::new(release));
        self
    }

    /// Uptime below which the reporter stays quiet.
    pub fn grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    /// Period of the reporter.
    pub fn report_interval(mut self, interval: Duration) -> Self {
        self.report_interval = interval;
        self
    }

    /// Whether the background reporter thread may be started.
    pub fn reporter_enabled(mut self, enabled: bool) -> Self {
        self.reporter_enabled = enabled;
        self
    }

    /// Size of the failure buffer in bytes.
    pub fn buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity;
        self
    }

    /// Instant uptime is measured from.
    pub fn boot_time(mut self, boot: Instant) -> Self {
        self.boot = boot;
        self
    }

    /// Seal the registry and build the core.
    pub fn build(self) -> LazyInit {
        let (policy, registry) = self.registrar.into_parts();
        info!(
            "{} deferred initializers registered ({} mode)",
            registry.len(),
            self.mode
        );

        let reporter = if self.reporter_enabled {
            PeriodicTask::new("lazyinit-report", self.report_interval)
        } else {
            PeriodicTask::disabled("lazyinit-report")
        };

        LazyInit {
            shared: Arc::new(Shared {
                policy,
                mode: self.mode,
                params: self.params,
                grace_period: self.grace_period,
                boot: self.boot,
                completed: AtomicBool::new(false),
                state: Mutex::new(State {
                    completed: false,
                    registry,
                    aggregator: Aggregator::new(self.buffer_capacity, self.sink),
                    release: self.release,
                    metrics: InitMetrics::new(self.boot),
                }),
                reporter,
            }),
        }
    }
}

impl fmt::Debug for LazyInitBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyInitBuilder")
            .field("registrar", &self.registrar)
            .field("mode", &self.mode)
            .field("grace_period", &self.grace_period)
            .field("report_interval", &self.report_interval)
            .field("reporter_enabled", &self.reporter_enabled)
            .field("buffer_capacity", &self.buffer_capacity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::MemorySink;
    use std::sync::atomic::AtomicUsize;

    fn fixture(mode: ClassificationMode) -> (LazyInit, MemorySink, Arc<AtomicUsize>) {
        let registrar = Registrar::new(
            PolicyTables::builder()
                .eligible(["a", "b"])
                .deferred(["z"])
                .ignored(["skip"])
                .builtin(["plain"])
                .build(),
        );
        registrar.register("a", || 0);
        registrar.register("b", || -5);
        registrar.register("z", || 0);

        let sink = MemorySink::new();
        let released = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&released);
        let core = LazyInit::builder(registrar)
            .mode(mode)
            .sink(Arc::new(sink.clone()))
            .reporter_enabled(false)
            .on_release(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .build();
        (core, sink, released)
    }

    #[test]
    fn test_dispatch_walks_to_completion() {
        let (core, _sink, released) = fixture(ClassificationMode::Strict);

        assert_eq!(core.dispatch("a", None), DispatchResult::Success);
        assert!(!core.is_completed());
        assert_eq!(core.pending(), vec!["b".to_string(), "z".to_string()]);

        assert_eq!(core.dispatch("b", None), DispatchResult::InitializerFailed(-5));
        assert!(core.is_completed());
        assert!(core.pending().is_empty());
        assert_eq!(released.load(Ordering::SeqCst), 1);

        assert_eq!(core.dispatch("a", None), DispatchResult::AlreadyCompleted);
        assert_eq!(core.dispatch("nope", None), DispatchResult::AlreadyCompleted);
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unknown_strict_and_permissive() {
        let (strict, _, _) = fixture(ClassificationMode::Strict);
        assert_eq!(strict.dispatch("wifi", None), DispatchResult::UnknownComponent);
        assert!(strict.diagnostics().is_empty());

        let (permissive, sink, _) = fixture(ClassificationMode::Permissive);
        assert_eq!(permissive.dispatch("wifi", None), DispatchResult::Success);
        assert_eq!(
            permissive.diagnostics(),
            vec!["failed to find a built-in component with the name \"wifi\"".to_string()]
        );
        assert_eq!(sink.lines().len(), 1);
    }

    #[test]
    fn test_ignored_and_builtin_are_noops() {
        let (core, _, _) = fixture(ClassificationMode::Strict);
        assert_eq!(core.dispatch("skip", None), DispatchResult::Success);
        assert_eq!(core.dispatch("plain", None), DispatchResult::Success);
        assert_eq!(core.has_run("skip"), None);
        assert_eq!(core.pending().len(), 3);
    }

    #[test]
    fn test_deferred_request_waits_for_barrier() {
        let (core, _, _) = fixture(ClassificationMode::Strict);
        assert_eq!(core.dispatch("z", None), DispatchResult::Success);
        assert_eq!(core.has_run("z"), Some(false));

        core.dispatch("a", None);
        core.dispatch("b", None);
        assert_eq!(core.has_run("z"), Some(true));
        let metrics = core.metrics();
        assert_eq!(metrics.records().last().unwrap().name, "z");
    }

    #[test]
    fn test_report_respects_grace_period() {
        let (core, sink, _) = fixture(ClassificationMode::Strict);
        core.dispatch("b", None);
        sink.clear();

        assert_eq!(core.report(Duration::from_secs(1)), ReportOutcome::Quiet);
        assert!(sink.lines().is_empty());

        assert_eq!(
            core.report(Duration::from_secs(31)),
            ReportOutcome::Reported { pending: 2 }
        );
        assert_eq!(
            sink.lines(),
            vec![
                "lazy_initcalls[1]: b's init function returned -5".to_string(),
                "lazy_initcalls[0]: a not loaded yet".to_string(),
                "lazy_initcalls[2]: z not loaded yet".to_string(),
            ]
        );

        core.dispatch("a", None);
        assert_eq!(core.report(Duration::from_secs(60)), ReportOutcome::Completed);
    }

    #[test]
    fn test_dispatch_result_display() {
        assert_eq!(DispatchResult::InitializerFailed(-5).to_string(), "initializer failed with status -5");
        assert!(DispatchResult::InitializerFailed(1).is_ok());
        assert!(!DispatchResult::UnknownComponent.is_ok());
    }
}
