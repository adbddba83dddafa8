//! The provider registry.
//!
//! Populated once at startup from the compiled-in provider set, then
//! immutable: handlers read it without any locking. Providers shipped
//! with the daemon register themselves on the candidate list; the
//! registry applies the ignore list from the global config,
//! de-duplicates by name (first wins), drops providers that report
//! themselves unavailable, and fans out `setup` once the daemon runs.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use crate::provider::Provider;

/// Immutable name → provider map.
pub struct Registry {
    providers: HashMap<String, Arc<dyn Provider>>,
    names: Vec<String>,
}

impl Registry {
    /// Build the registry from candidate providers.
    #[must_use]
    pub fn build(candidates: Vec<Arc<dyn Provider>>, ignored: &[String]) -> Self {
        let mut providers: HashMap<String, Arc<dyn Provider>> = HashMap::new();
        let mut names = Vec::new();

        for candidate in candidates {
            let name = candidate.name();

            if ignored.iter().any(|i| i == name) {
                info!(provider = name, "ignored by configuration");
                continue;
            }

            if providers.contains_key(name) {
                continue;
            }

            if !candidate.available() {
                info!(provider = name, "unavailable, skipping");
                continue;
            }

            info!(provider = name, "loaded");
            names.push(name.to_string());
            providers.insert(name.to_string(), candidate);
        }

        names.sort_unstable();

        Self { providers, names }
    }

    /// Run every provider's `setup` concurrently. A slow or failing
    /// setup never delays or kills the daemon.
    pub fn spawn_setup(&self) {
        for provider in self.providers.values() {
            let provider = Arc::clone(provider);
            tokio::spawn(async move {
                provider.setup().await;
            });
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Provider>> {
        self.providers.get(name)
    }

    /// Resolve a wire provider key, stripping a `menus:<id>` qualifier
    /// down to the owning `menus` provider.
    #[must_use]
    pub fn resolve(&self, key: &str) -> Option<&Arc<dyn Provider>> {
        self.get(family_of(key))
    }

    /// Registered provider names, sorted.
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<dyn Provider>)> {
        self.providers.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

/// The provider family owning a wire key: `menus:<id>` belongs to
/// `menus`, everything else to itself.
#[must_use]
pub fn family_of(key: &str) -> &str {
    key.strip_prefix("menus:")
        .map_or(key, |_| "menus")
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use elephant_proto::messages::Item;

    use super::*;
    use crate::provider::{Activation, QueryContext};

    struct Fake {
        name: &'static str,
        available: bool,
    }

    #[async_trait]
    impl Provider for Fake {
        fn name(&self) -> &'static str {
            self.name
        }

        fn name_pretty(&self) -> String {
            self.name.to_uppercase()
        }

        fn available(&self) -> bool {
            self.available
        }

        fn doc(&self) -> String {
            String::new()
        }

        async fn query(
            &self,
            _ctx: &QueryContext,
            _query: &str,
            _single: bool,
            _exact: bool,
        ) -> Vec<Item> {
            Vec::new()
        }

        async fn activate(&self, _activation: Activation<'_>) {}
    }

    fn fake(name: &'static str, available: bool) -> Arc<dyn Provider> {
        Arc::new(Fake { name, available })
    }

    #[test]
    fn build_skips_ignored_unavailable_and_duplicates() {
        let registry = Registry::build(
            vec![
                fake("calc", true),
                fake("calc", true),
                fake("files", false),
                fake("todo", true),
                fake("menus", true),
            ],
            &["todo".to_string()],
        );

        assert_eq!(registry.names(), ["calc", "menus"]);
        assert!(registry.get("files").is_none());
        assert!(registry.get("todo").is_none());
    }

    #[test]
    fn resolve_routes_menu_keys_to_the_menus_provider() {
        let registry = Registry::build(vec![fake("menus", true)], &[]);

        assert!(registry.resolve("menus:bookmarks").is_some());
        assert!(registry.resolve("menus").is_some());
        assert!(registry.resolve("bookmarks").is_none());
    }

    #[test]
    fn family_strips_only_the_menus_qualifier() {
        assert_eq!(family_of("menus:power"), "menus");
        assert_eq!(family_of("bluetooth"), "bluetooth");
        assert_eq!(family_of("calc"), "calc");
    }
}
