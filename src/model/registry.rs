//! Process-wide policy cache keyed by artifact identity.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::error::Result;
use crate::model::policy::Policy;

/// Shared cache of loaded policies. Models are immutable once loaded, so
/// concurrent loads of the same key may race; last writer wins and both
/// callers get a usable policy. There is no eviction.
#[derive(Default)]
pub struct ModelRegistry {
    models: DashMap<String, Arc<dyn Policy>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Arc<dyn Policy>> {
        self.models.get(key).map(|entry| Arc::clone(entry.value()))
    }

    /// Return the cached policy or run the loader and cache its result.
    pub fn get_or_load<F>(&self, key: &str, loader: F) -> Result<Arc<dyn Policy>>
    where
        F: FnOnce() -> Result<Arc<dyn Policy>>,
    {
        if let Some(policy) = self.get(key) {
            return Ok(policy);
        }
        let policy = loader()?;
        debug!(key, "caching loaded policy");
        self.models.insert(key.to_string(), Arc::clone(&policy));
        Ok(policy)
    }

    pub fn insert(&self, key: &str, policy: Arc<dyn Policy>) {
        self.models.insert(key.to_string(), policy);
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::policy::LinearPolicy;

    fn policy(bias: f64) -> Arc<dyn Policy> {
        Arc::new(LinearPolicy {
            weights: vec![],
            bias,
        })
    }

    #[test]
    fn get_or_load_runs_loader_once() {
        let registry = ModelRegistry::new();
        let mut calls = 0;
        let first = registry
            .get_or_load("v1", || {
                calls += 1;
                Ok(policy(0.5))
            })
            .unwrap();
        let second = registry
            .get_or_load("v1", || {
                calls += 1;
                Ok(policy(0.9))
            })
            .unwrap();
        assert_eq!(calls, 1);
        assert_eq!(first.predict(&[]), second.predict(&[]));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn loader_errors_leave_no_entry() {
        let registry = ModelRegistry::new();
        let result = registry.get_or_load("broken", || {
            Err(crate::error::AurumError::ModelNotFound("broken".to_string()))
        });
        assert!(result.is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn explicit_insert_overwrites() {
        let registry = ModelRegistry::new();
        registry.insert("v1", policy(0.1));
        registry.insert("v1", policy(0.2));
        let cached = registry.get("v1").unwrap();
        assert!((cached.predict(&[]) - 0.2f64.tanh()).abs() < 1e-12);
        assert_eq!(registry.len(), 1);
    }
}
