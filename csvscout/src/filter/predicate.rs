use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// A pure test over a record id
pub trait IdPredicate: Send + Sync {
    fn matches(&self, id: i64) -> bool;
}

impl<F> IdPredicate for F
where
    F: Fn(i64) -> bool + Send + Sync,
{
    fn matches(&self, id: i64) -> bool {
        self(id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parity {
    Odd,
    Even,
}

impl IdPredicate for Parity {
    fn matches(&self, id: i64) -> bool {
        match self {
            Parity::Odd => id % 2 != 0,
            Parity::Even => id % 2 == 0,
        }
    }
}

/// Used for kinds nobody registered
#[derive(Debug, Clone, Copy)]
pub struct MatchNothing;

impl IdPredicate for MatchNothing {
    fn matches(&self, _id: i64) -> bool {
        false
    }
}

/// Maps filter kind names to predicates.
///
/// `"odd"` and `"even"` are always present in [`FilterRegistry::new`].
/// Resolving an unknown kind is not an error: it yields a predicate that
/// matches nothing, so the filter simply returns no records.
#[derive(Clone)]
pub struct FilterRegistry {
    kinds: HashMap<String, Arc<dyn IdPredicate>>,
}

impl FilterRegistry {
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry
            .register("odd", Parity::Odd)
            .register("even", Parity::Even);
        registry
    }

    pub fn empty() -> Self {
        Self {
            kinds: HashMap::new(),
        }
    }

    /// Adds or replaces a kind
    pub fn register(
        &mut self,
        kind: impl Into<String>,
        predicate: impl IdPredicate + 'static,
    ) -> &mut Self {
        self.kinds.insert(kind.into(), Arc::new(predicate));
        self
    }

    pub fn is_known(&self, kind: &str) -> bool {
        self.kinds.contains_key(kind)
    }

    pub fn resolve(&self, kind: &str) -> Arc<dyn IdPredicate> {
        match self.kinds.get(kind) {
            Some(predicate) => Arc::clone(predicate),
            None => {
                debug!("Unknown filter kind {:?}, nothing will match", kind);
                Arc::new(MatchNothing)
            }
        }
    }

    /// Registered kind names, sorted
    pub fn kinds(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.kinds.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for FilterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for FilterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}
