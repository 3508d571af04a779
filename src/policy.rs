//! Static policy tables.
//!
//! Three name sets decide what the registry is allowed to defer:
//!
//! - **Eligible**: components whose initializer waits for a load request.
//! - **Ignored**: components that always initialize through the normal boot
//!   path. Matching them is skipped entirely.
//! - **Deferred-to-end**: eligible components that must run only after every
//!   other eligible component has run.
//!
//! A fourth, name-only list records components that are built in but have no
//! initializer worth deferring, so a request for them is not a lookup failure.
//!
//! Precedence is `Ignored > DeferredToEnd > Eligible`. Each name is classified
//! once when the tables are built; [`PolicyTables::classify`] is a map lookup.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// How the policy tables treat a component name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    /// Never deferred; requests fall through to normal loading.
    Ignored,
    /// Deferred until a request names it.
    Eligible,
    /// Deferred, and run only once every eligible component has run.
    DeferredToEnd,
    /// Not mentioned by any deferral table.
    Unrecognized,
}

impl Classification {
    /// Whether a component with this classification may enter the registry.
    pub fn is_deferrable(self) -> bool {
        matches!(self, Classification::Eligible | Classification::DeferredToEnd)
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Classification::Ignored => write!(f, "ignored"),
            Classification::Eligible => write!(f, "eligible"),
            Classification::DeferredToEnd => write!(f, "deferred"),
            Classification::Unrecognized => write!(f, "unrecognized"),
        }
    }
}

/// Immutable, pre-classified policy tables.
#[derive(Debug, Clone, Default)]
pub struct PolicyTables {
    classes: HashMap<String, Classification>,
    builtin: HashSet<String>,
    conflicts: Vec<String>,
}

impl PolicyTables {
    /// Start building a set of tables.
    pub fn builder() -> PolicyTablesBuilder {
        PolicyTablesBuilder::default()
    }

    /// Classify a name. Matching is exact and case-sensitive.
    pub fn classify(&self, name: &str) -> Classification {
        self.classes
            .get(name)
            .copied()
            .unwrap_or(Classification::Unrecognized)
    }

    /// Whether the name is known to be built in without a deferred initializer.
    pub fn is_builtin(&self, name: &str) -> bool {
        self.builtin.contains(name)
    }

    /// Upper bound on registry entries: every eligible or deferred name.
    pub fn capacity(&self) -> usize {
        self.classes.values().filter(|c| c.is_deferrable()).count()
    }

    /// Names listed as both ignored and eligible (ignored wins).
    pub fn conflicts(&self) -> &[String] {
        &self.conflicts
    }

    /// Fail if any name is listed as both ignored and eligible.
    pub fn validate(&self) -> Result<()> {
        match self.conflicts.first() {
            Some(name) => Err(Error::PolicyConflict { name: name.clone() }),
            None => Ok(()),
        }
    }

    /// Names with the given classification, sorted.
    pub fn names(&self, class: Classification) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .classes
            .iter()
            .filter(|(_, c)| **c == class)
            .map(|(n, _)| n.as_str())
            .collect();
        names.sort_unstable();
        names
    }

    /// Number of names in the built-in presence list.
    pub fn builtin_count(&self) -> usize {
        self.builtin.len()
    }
}

/// Builder for [`PolicyTables`].
#[derive(Debug, Clone, Default)]
pub struct PolicyTablesBuilder {
    eligible: Vec<String>,
    ignored: Vec<String>,
    deferred: Vec<String>,
    builtin: Vec<String>,
}

impl PolicyTablesBuilder {
    /// Add names that may be deferred.
    pub fn eligible<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.eligible.extend(names.into_iter().map(Into::into));
        self
    }

    /// Add names that are never deferred.
    pub fn ignored<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignored.extend(names.into_iter().map(Into::into));
        self
    }

    /// Add names that run after every eligible component.
    pub fn deferred<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.deferred.extend(names.into_iter().map(Into::into));
        self
    }

    /// Add built-in names that have no deferred initializer.
    pub fn builtin<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.builtin.extend(names.into_iter().map(Into::into));
        self
    }

    /// Classify every name once and freeze the tables.
    ///
    /// Overlaps are resolved by precedence and remembered in
    /// [`PolicyTables::conflicts`]; call [`PolicyTables::validate`] to reject them.
    pub fn build(self) -> PolicyTables {
        let ignored: HashSet<&str> = self.ignored.iter().map(String::as_str).collect();
        let mut classes = HashMap::with_capacity(
            self.eligible.len() + self.ignored.len() + self.deferred.len(),
        );
        let mut conflicts = Vec::new();

        for name in &self.eligible {
            if ignored.contains(name.as_str()) {
                if !conflicts.contains(name) {
                    conflicts.push(name.clone());
                }
                continue;
            }
            classes.insert(name.clone(), Classification::Eligible);
        }
        for name in &self.deferred {
            if !ignored.contains(name.as_str()) {
                classes.insert(name.clone(), Classification::DeferredToEnd);
            }
        }
        for name in self.ignored {
            classes.insert(name, Classification::Ignored);
        }

        PolicyTables {
            classes,
            builtin: self.builtin.into_iter().collect(),
            conflicts,
        }
    }
}
