use arc_swap::ArcSwap;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::Error;
use crate::strategy::Strategy;

/// Name-keyed strategy registry.
///
/// Lookups read a snapshot, so registration may happen while requests are
/// being dispatched.
pub struct StrategyRegistry {
    strategies: ArcSwap<HashMap<String, Arc<dyn Strategy>>>,
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self {
            strategies: ArcSwap::from_pointee(HashMap::new()),
        }
    }

    /// Registers `strategy` under `name`, or under its own name when none is given.
    /// An existing registration with the same name is replaced.
    pub fn register(&self, name: Option<&str>, strategy: Arc<dyn Strategy>) -> Result<(), Error> {
        let name = match name
            .filter(|name| !name.is_empty())
            .or_else(|| strategy.name())
        {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => {
                return Err(Error::Initialization(
                    "Authentication strategies must have a name".to_string(),
                ))
            }
        };

        if self.insert(name.clone(), strategy) {
            info!("Replaced authentication strategy '{name}'");
        } else {
            debug!("Registered authentication strategy '{name}'");
        }
        Ok(())
    }

    /// Stores `strategy` under `name`, returning whether a previous one was replaced.
    pub(crate) fn insert(&self, name: String, strategy: Arc<dyn Strategy>) -> bool {
        let mut replaced = false;
        self.strategies.rcu(|strategies| {
            let mut strategies = HashMap::clone(strategies);
            replaced = strategies
                .insert(name.clone(), strategy.clone())
                .is_some();
            strategies
        });
        replaced
    }

    pub fn unregister(&self, name: &str) {
        if !self.strategies.load().contains_key(name) {
            return;
        }

        self.strategies.rcu(|strategies| {
            let mut strategies = HashMap::clone(strategies);
            strategies.remove(name);
            strategies
        });
        debug!("Unregistered authentication strategy '{name}'");
    }

    pub fn resolve(&self, name: &str) -> Option<Arc<dyn Strategy>> {
        self.strategies.load().get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.strategies.load().keys().cloned().collect();
        names.sort();
        names
    }
}
