//! Active resolution context.
//!
//! Holds the resolver the host should use for symbol lookups. The handle is
//! passed around explicitly; installing a new resolver swaps the pointer and
//! leaves the previous chain reachable through the new one's parent.

use std::sync::{Arc, RwLock};

use crate::resolver::{ResolvedSymbol, SymbolResolver};

/// Thread-safe handle to the active resolver.
pub struct ResolutionContext {
    active: RwLock<Arc<dyn SymbolResolver>>,
}

impl ResolutionContext {
    /// Create a context starting at a base resolver.
    pub fn new(base: Arc<dyn SymbolResolver>) -> Self {
        Self {
            active: RwLock::new(base),
        }
    }

    /// The active resolver.
    pub fn current(&self) -> Arc<dyn SymbolResolver> {
        match self.active.read() {
            Ok(active) => active.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Replace the active resolver, returning the previous one.
    pub fn install(&self, resolver: Arc<dyn SymbolResolver>) -> Arc<dyn SymbolResolver> {
        let mut active = match self.active.write() {
            Ok(active) => active,
            Err(poisoned) => poisoned.into_inner(),
        };

        tracing::debug!(
            "Installed resolver with {} artifacts",
            resolver.artifacts().len()
        );
        std::mem::replace(&mut *active, resolver)
    }

    /// Look up a symbol through the active resolver.
    pub fn resolve(&self, symbol: &str) -> Option<ResolvedSymbol> {
        self.current().resolve(symbol)
    }

    /// Number of links in the active chain.
    pub fn depth(&self) -> usize {
        let mut depth = 1;
        let mut link = self.current();
        loop {
            let parent = match link.parent() {
                Some(parent) => parent.clone(),
                None => return depth,
            };
            depth += 1;
            link = parent;
        }
    }
}
