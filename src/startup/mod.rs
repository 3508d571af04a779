//! Boot-time support for the dispatcher.
//!
//! - [`InitMetrics`] records when each deferred initializer ran and how long
//!   it took, measured from boot.
//! - [`PeriodicTask`] is the cancellable background thread behind the
//!   "not loaded yet" reporter.

pub mod metrics;
pub mod reporter;

pub use metrics::{InitMetrics, InitRecord};
pub use reporter::PeriodicTask;
