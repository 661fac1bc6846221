// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Application metadata lookups used to enrich events carrying an application id.
//!
//! The router only depends on the [`AppCache`] trait. How the cache is filled (Cloud Controller
//! polling, a local database...) is up to the implementation; [`InMemoryAppCache`] is a simple
//! map that callers populate themselves, and [`NoopAppCache`] disables enrichment.

use std::collections::HashMap;
use std::sync::RwLock;
use tracing::trace;

/// Metadata known about a running application.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct App {
    pub name: String,
    pub guid: String,
    pub space_name: String,
    pub space_guid: String,
    pub org_name: String,
    pub org_guid: String,
    /// The application asked not to have its events forwarded.
    pub ignored: bool,
}

#[derive(Debug, PartialEq, thiserror::Error)]
pub enum CacheError {
    #[error("application {0} not found")]
    NotFound(String),

    #[error("cache backend error: {0}")]
    Backend(String),
}

pub trait AppCache: Send + Sync {
    fn get_app(&self, app_id: &str) -> Result<App, CacheError>;
}

/// Cache that never knows any application.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopAppCache;

impl AppCache for NoopAppCache {
    fn get_app(&self, app_id: &str) -> Result<App, CacheError> {
        Err(CacheError::NotFound(app_id.to_string()))
    }
}

/// Map-backed cache, keyed by application guid.
#[derive(Debug, Default)]
pub struct InMemoryAppCache {
    apps: RwLock<HashMap<String, App>>,
}

impl InMemoryAppCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the entry for `app.guid`.
    pub fn insert(&self, app: App) {
        if let Ok(mut apps) = self.apps.write() {
            apps.insert(app.guid.clone(), app);
        }
    }

    pub fn remove(&self, app_id: &str) -> Option<App> {
        self.apps.write().ok()?.remove(app_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.apps.read().map(|apps| apps.len()).unwrap_or_default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AppCache for InMemoryAppCache {
    fn get_app(&self, app_id: &str) -> Result<App, CacheError> {
        let apps = self
            .apps
            .read()
            .map_err(|e| CacheError::Backend(e.to_string()))?;

        match apps.get(app_id) {
            Some(app) => {
                trace!("App cache hit for {}", app_id);
                Ok(app.clone())
            }
            None => Err(CacheError::NotFound(app_id.to_string())),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn app(guid: &str) -> App {
        App {
            name: "my-app".to_string(),
            guid: guid.to_string(),
            space_name: "dev".to_string(),
            space_guid: "space-1".to_string(),
            org_name: "acme".to_string(),
            org_guid: "org-1".to_string(),
            ignored: false,
        }
    }

    #[test]
    fn test_noop_cache_never_finds() {
        assert_eq!(
            NoopAppCache.get_app("abc"),
            Err(CacheError::NotFound("abc".to_string()))
        );
    }

    #[test]
    fn test_in_memory_insert_get_remove() {
        let cache = InMemoryAppCache::new();
        assert!(cache.is_empty());

        cache.insert(app("guid-1"));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get_app("guid-1").unwrap().name, "my-app");
        assert!(matches!(
            cache.get_app("guid-2"),
            Err(CacheError::NotFound(_))
        ));

        assert!(cache.remove("guid-1").is_some());
        assert!(cache.get_app("guid-1").is_err());
    }

    #[test]
    fn test_insert_replaces_existing_entry() {
        let cache = InMemoryAppCache::new();
        cache.insert(app("guid-1"));
        cache.insert(App {
            ignored: true,
            ..app("guid-1")
        });
        assert_eq!(cache.len(), 1);
        assert!(cache.get_app("guid-1").unwrap().ignored);
    }
}
