//! Name Allocation
//!
//! Every emitted record carries a name that is unique within its namespace.
//! The allocator hands out names in two ways:
//! - a preferred name is kept as-is when free, otherwise its numeric suffix
//!   is stripped and the lowest free counter is appended ("Zone 3" -> "Zone 1")
//! - anonymous objects get "{namespace}{spacer}{n}" from a per-namespace
//!   counter that only moves forward
//!
//! Cycle stubs are reserved here too, so a stub name can never collide with
//! a name handed out later in the run.

use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use regex::Regex;

use crate::config::{NamingConfig, NamingScope};

// =============================================================================
// Name Allocator
// =============================================================================

/// Run-scoped allocator of unique record names
#[derive(Debug, Clone)]
pub struct NameAllocator {
    config: NamingConfig,

    /// namespace key -> folded names in use
    taken: HashMap<String, HashSet<String>>,

    /// namespace -> last anonymous counter
    counters: HashMap<String, u64>,
}

impl Default for NameAllocator {
    fn default() -> Self {
        Self::new(NamingConfig::default())
    }
}

impl NameAllocator {
    pub fn new(config: NamingConfig) -> Self {
        Self {
            config,
            taken: HashMap::new(),
            counters: HashMap::new(),
        }
    }

    pub fn config(&self) -> &NamingConfig {
        &self.config
    }

    /// Reserve a unique name in `namespace`.
    ///
    /// Blank preferred names count as absent.
    pub fn reserve(&mut self, preferred: Option<&str>, namespace: &str) -> String {
        match preferred.map(str::trim).filter(|p| !p.is_empty()) {
            Some(name) => self.reserve_preferred(name, namespace),
            None => self.reserve_anonymous(namespace),
        }
    }

    fn reserve_preferred(&mut self, name: &str, namespace: &str) -> String {
        if self.claim(namespace, name) {
            return name.to_string();
        }

        let base = strip_counter(name);
        let mut n = 1u64;
        loop {
            let candidate = format!("{}{}{}", base, self.config.spacer, n);
            if self.claim(namespace, &candidate) {
                tracing::trace!(preferred = name, assigned = %candidate, "name collision");
                return candidate;
            }
            n += 1;
        }
    }

    fn reserve_anonymous(&mut self, namespace: &str) -> String {
        loop {
            let counter = self.counters.entry(namespace.to_string()).or_insert(0);
            *counter += 1;
            let candidate = format!("{}{}{}", namespace, self.config.spacer, counter);
            if self.claim(namespace, &candidate) {
                return candidate;
            }
        }
    }

    /// Mark `name` as used. Returns false if it was already taken.
    pub fn claim(&mut self, namespace: &str, name: &str) -> bool {
        let key = self.namespace_key(namespace);
        let folded = self.fold(name);
        self.taken.entry(key).or_default().insert(folded)
    }

    /// Carry a name reserved in `reserved_in` over to `target`. Returns
    /// false if `target` already holds it under a separate namespace.
    pub fn claim_in(&mut self, name: &str, reserved_in: &str, target: &str) -> bool {
        if self.namespace_key(reserved_in) == self.namespace_key(target) {
            return true;
        }
        self.claim(target, name)
    }

    pub fn is_taken(&self, namespace: &str, name: &str) -> bool {
        self.taken
            .get(&self.namespace_key(namespace))
            .is_some_and(|names| names.contains(&self.fold(name)))
    }

    /// Number of names in use in `namespace`
    pub fn count(&self, namespace: &str) -> usize {
        self.taken
            .get(&self.namespace_key(namespace))
            .map_or(0, HashSet::len)
    }

    fn namespace_key(&self, namespace: &str) -> String {
        match self.config.scope {
            NamingScope::PerTag => namespace.to_string(),
            NamingScope::Global => String::new(),
        }
    }

    fn fold(&self, name: &str) -> String {
        if self.config.case_insensitive {
            name.to_ascii_lowercase()
        } else {
            name.to_string()
        }
    }
}

/// Strip a trailing " N" or "_N" counter ("Zone 3" -> "Zone")
fn strip_counter(name: &str) -> &str {
    static SUFFIX: OnceLock<Regex> = OnceLock::new();
    let re = SUFFIX.get_or_init(|| Regex::new(r"^(.+?)[ _]\d+$").expect("valid suffix regex"));
    re.captures(name)
        .and_then(|caps| caps.get(1))
        .map_or(name, |m| m.as_str())
}
