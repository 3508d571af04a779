//! Registry of deferred initializers.
//!
//! Entries are appended during the boot scan through a [`Registrar`] and
//! never removed. The registrar is consumed when the dispatcher is built, so
//! nothing can register once requests are being served.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::policy::{Classification, PolicyTables};

/// A component initializer: runs once, returns a status code (0 is success).
pub type Initializer = Box<dyn FnOnce() -> i32 + Send>;

/// When an entry is allowed to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InitKind {
    /// Runs when a load request names it.
    Normal,
    /// Runs only after every `Normal` entry has run.
    DeferredToEnd,
}

impl fmt::Display for InitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InitKind::Normal => write!(f, "normal"),
            InitKind::DeferredToEnd => write!(f, "deferred"),
        }
    }
}

/// One boot-discovered initializer.
pub struct RegistryEntry {
    index: usize,
    name: String,
    kind: InitKind,
    initializer: Option<Initializer>,
    has_run: bool,
    configured: bool,
}

impl RegistryEntry {
    /// Stable registration index, used in diagnostics.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Component name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Entry kind.
    pub fn kind(&self) -> InitKind {
        self.kind
    }

    /// Whether the initializer has been attempted.
    pub fn has_run(&self) -> bool {
        self.has_run
    }

    /// Mark the entry as run and hand out its initializer.
    ///
    /// `has_run` flips before the caller gets a chance to invoke anything, so
    /// a failing initializer is never retried.
    pub(crate) fn claim(&mut self) -> Option<Initializer> {
        if self.has_run {
            return None;
        }
        self.has_run = true;
        self.initializer.take()
    }

    /// Note that a request reached this entry. Returns `true` the first time,
    /// which is the only time its load arguments are applied.
    pub(crate) fn mark_configured(&mut self) -> bool {
        !std::mem::replace(&mut self.configured, true)
    }
}

// Implement Debug manually since Initializer doesn't implement Debug
impl fmt::Debug for RegistryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryEntry")
            .field("index", &self.index)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("has_run", &self.has_run)
            .finish()
    }
}

/// Why a registration was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Listed in the ignored table.
    Ignored,
    /// Not listed in any deferral table.
    NotEnrolled,
    /// Already registered under this name.
    Duplicate,
    /// The registry is full.
    CapacityExceeded,
}

/// Capacity-bounded, append-only table of initializers in registration order.
#[derive(Debug, Default)]
pub struct Registry {
    entries: Vec<RegistryEntry>,
    by_name: HashMap<String, usize>,
    capacity: usize,
}

impl Registry {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            by_name: HashMap::with_capacity(capacity),
            capacity,
        }
    }

    fn insert(
        &mut self,
        name: String,
        kind: InitKind,
        initializer: Initializer,
    ) -> Result<usize, Rejection> {
        if self.by_name.contains_key(&name) {
            return Err(Rejection::Duplicate);
        }
        if self.entries.len() >= self.capacity {
            return Err(Rejection::CapacityExceeded);
        }

        let index = self.entries.len();
        self.by_name.insert(name.clone(), index);
        self.entries.push(RegistryEntry {
            index,
            name,
            kind,
            initializer: Some(initializer),
            has_run: false,
            configured: false,
        });
        Ok(index)
    }

    /// Look up an entry by exact name.
    pub fn get(&self, name: &str) -> Option<&RegistryEntry> {
        self.by_name.get(name).map(|&i| &self.entries[i])
    }

    pub(crate) fn get_mut(&mut self, name: &str) -> Option<&mut RegistryEntry> {
        let index = *self.by_name.get(name)?;
        self.entries.get_mut(index)
    }

    pub(crate) fn entry_mut(&mut self, index: usize) -> Option<&mut RegistryEntry> {
        self.entries.get_mut(index)
    }

    /// Entries in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &RegistryEntry> {
        self.entries.iter()
    }

    /// Number of registered entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing was registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether every `Normal` entry has run.
    pub fn all_normal_run(&self) -> bool {
        self.entries
            .iter()
            .filter(|e| e.kind == InitKind::Normal)
            .all(|e| e.has_run)
    }

    /// Entries that have not run yet.
    pub fn unrun(&self) -> impl Iterator<Item = &RegistryEntry> {
        self.entries.iter().filter(|e| !e.has_run)
    }

    /// Indices of the deferred-to-end entries, in registration order.
    pub(crate) fn deferred_indices(&self) -> Vec<usize> {
        self.entries
            .iter()
            .filter(|e| e.kind == InitKind::DeferredToEnd)
            .map(|e| e.index)
            .collect()
    }
}

/// Boot-time registration front end.
///
/// `register` takes `&self` so several discovery threads can share one
/// registrar; a narrow lock serializes the appends.
#[derive(Debug)]
pub struct Registrar {
    policy: Arc<PolicyTables>,
    registry: Mutex<Registry>,
}

impl Registrar {
    /// Create an empty registrar sized from the policy tables.
    pub fn new(policy: PolicyTables) -> Self {
        Self::with_policy(Arc::new(policy))
    }

    /// Create an empty registrar sharing existing policy tables.
    pub fn with_policy(policy: Arc<PolicyTables>) -> Self {
        let capacity = policy.capacity();
        Self {
            policy,
            registry: Mutex::new(Registry::with_capacity(capacity)),
        }
    }

    /// Offer a boot-discovered initializer for deferral.
    ///
    /// Returns `true` when the registry took ownership of `init`; on `false`
    /// the caller is expected to run the initializer through the normal boot
    /// path.
    pub fn register<F>(&self, name: impl Into<String>, init: F) -> bool
    where
        F: FnOnce() -> i32 + Send + 'static,
    {
        self.try_register(name, init).is_ok()
    }

    /// Like [`register`](Self::register), reporting why a name was refused.
    pub fn try_register<F>(&self, name: impl Into<String>, init: F) -> Result<usize, Rejection>
    where
        F: FnOnce() -> i32 + Send + 'static,
    {
        let name = name.into();
        let kind = match self.policy.classify(&name) {
            Classification::Ignored => return Err(Rejection::Ignored),
            Classification::Unrecognized => return Err(Rejection::NotEnrolled),
            Classification::Eligible => InitKind::Normal,
            Classification::DeferredToEnd => InitKind::DeferredToEnd,
        };

        let mut registry = self.registry.lock();
        match registry.insert(name.clone(), kind, Box::new(init)) {
            Ok(index) => {
                debug!("adding lazy_initcalls[{}] from {} ({})", index, name, kind);
                Ok(index)
            }
            Err(rejection) => {
                warn!("refusing to register {}: {:?}", name, rejection);
                Err(rejection)
            }
        }
    }

    /// Number of registered entries so far.
    pub fn len(&self) -> usize {
        self.registry.lock().len()
    }

    /// Whether nothing has been registered.
    pub fn is_empty(&self) -> bool {
        self.registry.lock().is_empty()
    }

    /// The tables this registrar classifies against.
    pub fn policy(&self) -> &Arc<PolicyTables> {
        &self.policy
    }

    /// Close the scan window and start building the dispatcher.
    pub fn seal(self) -> crate::dispatch::LazyInitBuilder {
        crate::dispatch::LazyInit::builder(self)
    }

    pub(crate) fn into_parts(self) -> (Arc<PolicyTables>, Registry) {
        (self.policy, self.registry.into_inner())
    }
}
