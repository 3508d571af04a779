//! Periodic, cancellable background task.
//!
//! The dispatcher arms the task on the first request that leaves work
//! pending. From then on the task wakes every `interval` and runs its tick
//! until the tick returns `false` or the task is cancelled. Cancellation is
//! synchronous: once [`PeriodicTask::cancel_sync`] returns, no tick is running
//! and none will start.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, error};

#[derive(Debug, Default)]
struct Flags {
    started: bool,
    cancelled: bool,
}

#[derive(Debug, Default)]
struct Control {
    flags: Mutex<Flags>,
    wake: Condvar,
}

/// A self-rescheduling background task with cancel-and-wait.
#[derive(Debug)]
pub struct PeriodicTask {
    name: String,
    interval: Duration,
    enabled: bool,
    control: Arc<Control>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl PeriodicTask {
    /// Create a task that ticks every `interval` once armed.
    pub fn new(name: impl Into<String>, interval: Duration) -> Self {
        Self {
            name: name.into(),
            interval,
            enabled: true,
            control: Arc::new(Control::default()),
            handle: Mutex::new(None),
        }
    }

    /// Create a task that never runs; arming and cancelling are no-ops.
    pub fn disabled(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            interval: Duration::ZERO,
            enabled: false,
            control: Arc::new(Control::default()),
            handle: Mutex::new(None),
        }
    }

    /// Tick interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Start ticking, unless already started or cancelled.
    ///
    /// The first tick happens one interval after arming.
    pub fn arm<F>(&self, mut tick: F)
    where
        F: FnMut() -> bool + Send + 'static,
    {
        if !self.enabled {
            return;
        }

        let mut flags = self.control.flags.lock();
        if flags.started || flags.cancelled {
            return;
        }

        let control = Arc::clone(&self.control);
        let interval = self.interval;
        let spawned = thread::Builder::new()
            .name(self.name.clone())
            .spawn(move || loop {
                if !wait_interval(&control, interval) {
                    break;
                }
                if !tick() {
                    break;
                }
            });

        match spawned {
            Ok(handle) => {
                flags.started = true;
                *self.handle.lock() = Some(handle);
                debug!("{}: armed, interval {:?}", self.name, interval);
            }
            Err(e) => error!("{}: failed to spawn: {}", self.name, e),
        }
    }

    /// Cancel the task and wait for a running tick to finish.
    ///
    /// Cancelling is permanent: later calls to [`arm`](Self::arm) do nothing.
    pub fn cancel_sync(&self) {
        {
            let mut flags = self.control.flags.lock();
            flags.cancelled = true;
            self.control.wake.notify_all();
        }

        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            // The tick itself may drop the last owner of this task.
            if handle.thread().id() == thread::current().id() {
                return;
            }
            if handle.join().is_err() {
                error!("{}: tick panicked", self.name);
            }
            debug!("{}: cancelled", self.name);
        }
    }

    /// Whether the background thread was started.
    pub fn is_started(&self) -> bool {
        self.control.flags.lock().started
    }

    /// Whether the task was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.control.flags.lock().cancelled
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        self.cancel_sync();
    }
}

/// Sleep for one interval. Returns `false` if cancelled meanwhile.
fn wait_interval(control: &Control, interval: Duration) -> bool {
    let deadline = Instant::now() + interval;
    let mut flags = control.flags.lock();
    while !flags.cancelled {
        if control.wake.wait_until(&mut flags, deadline).timed_out() {
            break;
        }
    }
    !flags.cancelled
}
