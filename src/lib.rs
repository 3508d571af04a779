//! # lazyinit - Deferred Built-in Initializers
//!
//! lazyinit lets a boot sequence put the initializers of built-in components
//! aside and run each one only when a load request names it. Once every
//! deferred component has been requested, a one-way barrier runs the
//! components that must come last, prints any failures, and fires a release
//! action so startup-only resources can be reclaimed.
//!
//! ## Core Concepts
//!
//! - **Policy tables**: which names are eligible, ignored, deferred to the
//!   end, or built in without a deferred initializer
//! - **Registrar**: boot-time registration of initializers
//! - **Dispatcher**: serves load requests, runs each initializer at most once
//! - **Completion barrier**: the Pending to Done transition
//! - **Aggregator**: bounded buffer of failure lines
//! - **Reporter**: periodic "not loaded yet" listing until completion
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────┐  register   ┌──────────────┐   seal    ┌──────────────────┐
//! │  boot scan   │ ──────────▶ │  Registrar   │ ────────▶ │     LazyInit     │
//! └──────────────┘             └──────────────┘           │  (one lock over  │
//!                                                         │  registry, state │
//! ┌──────────────┐  load_image ┌──────────────┐ dispatch  │  and aggregator) │
//! │   requests   │ ──────────▶ │    Loader    │ ────────▶ │                  │
//! └──────────────┘             └──────────────┘           └──────────────────┘
//!                                                             │          │
//!                                                   diagnostics      release
//!                                                             ▼          ▼
//!                                                     DiagnosticSink  FnOnce()
//! ```
//!
//! ## Quick Example
//!
//! ```rust
//! use lazyinit::prelude::*;
//!
//! let policy = PolicyTables::builder()
//!     .eligible(["camera", "cnss2"])
//!     .build();
//!
//! let registrar = Registrar::new(policy);
//! assert!(registrar.register("camera", || 0));
//! assert!(registrar.register("cnss2", || 0));
//!
//! let core = LazyInit::builder(registrar)
//!     .reporter_enabled(false)
//!     .build();
//!
//! assert_eq!(core.dispatch("camera", Some("debug=1")), DispatchResult::Success);
//! assert!(!core.is_completed());
//! assert_eq!(core.dispatch("cnss2", None), DispatchResult::Success);
//! assert!(core.is_completed());
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

// Re-export commonly used items in prelude
pub mod prelude {
    //! Convenient re-exports of commonly used types and traits.

    pub use crate::config::Config;
    pub use crate::diagnostics::{DiagnosticSink, MemorySink, TracingSink};
    pub use crate::dispatch::{
        ClassificationMode, DispatchResult, LazyInit, LazyInitBuilder, ReportOutcome,
    };
    pub use crate::error::{Error, Result};
    pub use crate::loader::{Capability, ImageLoader, Loader, ModinfoLoader};
    pub use crate::params::{ParamKind, ParamSink, ParamTable, ParamValue};
    pub use crate::policy::{Classification, PolicyTables};
    pub use crate::registry::{InitKind, Registrar, Rejection};
}

// ============================================================================
// Core
// ============================================================================

/// Error types and the crate `Result` alias.
pub mod error;

/// Name classification tables.
pub mod policy;

/// Deferred initializer registry and boot-time registrar.
pub mod registry;

/// Matcher, dispatcher and completion barrier.
pub mod dispatch;

// ============================================================================
// Collaborators
// ============================================================================

/// Failure aggregation and diagnostic sinks.
pub mod diagnostics;

/// Request argument translation.
pub mod params;

/// Load front door: privilege check, image validation, dispatch.
pub mod loader;

/// Initializer metrics and the periodic reporter task.
pub mod startup;

// ============================================================================
// Configuration
// ============================================================================

/// Layered file and environment configuration.
pub mod config;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
