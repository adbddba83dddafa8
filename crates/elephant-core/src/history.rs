//! Per-provider usage history.
//!
//! Activations are counted per `(query, identifier)` pair so providers
//! can boost what the user actually picks. The on-disk form is one JSON
//! file per provider in the cache directory; every mutation persists via
//! a temp-file rename so a crash never leaves a torn file behind.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, warn};

use crate::paths;

/// Action name providers expose on items that carry a history bonus.
pub const ACTION_DELETE: &str = "history:delete";

const EXACT_WEIGHT: i32 = 100;
const PREFIX_WEIGHT: i32 = 25;
const EMPTY_WEIGHT: i32 = 10;

type Buckets = HashMap<String, HashMap<String, u32>>;

/// Usage counters for one provider.
#[derive(Debug)]
pub struct History {
    provider: String,
    path: PathBuf,
    buckets: Mutex<Buckets>,
}

impl History {
    /// Load the provider's history from the cache directory.
    #[must_use]
    pub fn load(provider: &str) -> Self {
        Self::load_from(provider, paths::cache_file(&format!("{provider}.history")))
    }

    /// Load from an explicit path. Missing or unreadable files start
    /// empty.
    #[must_use]
    pub fn load_from(provider: &str, path: PathBuf) -> Self {
        let buckets = match std::fs::read(&path) {
            Ok(raw) => serde_json::from_slice(&raw).unwrap_or_else(|err| {
                warn!(provider, error = %err, "discarding unreadable history");
                Buckets::default()
            }),
            Err(_) => Buckets::default(),
        };

        Self {
            provider: provider.to_string(),
            path,
            buckets: Mutex::new(buckets),
        }
    }

    /// Record one activation of `identifier` for `query`.
    pub fn save(&self, query: &str, identifier: &str) {
        let snapshot = {
            let mut buckets = self.buckets.lock().expect("history lock poisoned");
            *buckets
                .entry(query.to_string())
                .or_default()
                .entry(identifier.to_string())
                .or_insert(0) += 1;
            buckets.clone()
        };

        self.persist(snapshot);
    }

    /// Drop `identifier` from every query bucket.
    pub fn remove(&self, identifier: &str) {
        let snapshot = {
            let mut buckets = self.buckets.lock().expect("history lock poisoned");
            for bucket in buckets.values_mut() {
                bucket.remove(identifier);
            }
            buckets.retain(|_, bucket| !bucket.is_empty());
            buckets.clone()
        };

        self.persist(snapshot);
    }

    /// Bonus score for `identifier` under the current `query`.
    ///
    /// Exact-query use dominates; queries the current one is a prefix of
    /// contribute partially; empty-query activations contribute a small
    /// catch-all bonus.
    #[must_use]
    pub fn usage_score(&self, query: &str, identifier: &str) -> i32 {
        let buckets = self.buckets.lock().expect("history lock poisoned");

        let count = |bucket: Option<&HashMap<String, u32>>| -> i32 {
            bucket
                .and_then(|b| b.get(identifier))
                .copied()
                .map_or(0, |c| c.min(i32::MAX as u32) as i32)
        };

        let exact = count(buckets.get(query));

        if query.is_empty() {
            return exact.saturating_mul(EXACT_WEIGHT);
        }

        let prefix: i32 = buckets
            .iter()
            .filter(|(stored, _)| !stored.is_empty() && *stored != query && stored.starts_with(query))
            .map(|(_, bucket)| count(Some(bucket)))
            .sum();

        let empty = count(buckets.get(""));

        exact
            .saturating_mul(EXACT_WEIGHT)
            .saturating_add(prefix.saturating_mul(PREFIX_WEIGHT))
            .saturating_add(empty.saturating_mul(EMPTY_WEIGHT))
    }

    fn persist(&self, snapshot: Buckets) {
        let provider = self.provider.clone();
        let path = self.path.clone();

        let write = move || {
            if let Err(err) = write_atomic(&path, &snapshot) {
                warn!(provider, error = %err, "history not persisted");
            } else {
                debug!(provider, "history persisted");
            }
        };

        // Best-effort: callers never wait for the disk.
        if tokio::runtime::Handle::try_current().is_ok() {
            tokio::task::spawn_blocking(write);
        } else {
            write();
        }
    }
}

fn write_atomic(path: &Path, buckets: &Buckets) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let tmp = path.with_extension("history.tmp");
    let raw = serde_json::to_vec(buckets)?;
    std::fs::write(&tmp, raw)?;
    std::fs::rename(&tmp, path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch(name: &str) -> (tempfile::TempDir, History) {
        let dir = tempfile::tempdir().unwrap();
        let history = History::load_from(name, dir.path().join(format!("{name}.history")));
        (dir, history)
    }

    #[test]
    fn unknown_pairs_score_zero() {
        let (_dir, history) = scratch("calc");
        assert_eq!(history.usage_score("2+2", "abc"), 0);
    }

    #[test]
    fn score_is_monotone_under_save() {
        let (_dir, history) = scratch("calc");

        let mut previous = 0;
        for _ in 0..5 {
            history.save("fire", "firefox.desktop");
            let score = history.usage_score("fire", "firefox.desktop");
            assert!(score > previous);
            previous = score;
        }
    }

    #[test]
    fn exact_use_dominates_prefix_and_empty() {
        let (_dir, history) = scratch("apps");

        history.save("fire", "firefox.desktop");
        history.save("firefox", "firefox.desktop");
        history.save("", "firefox.desktop");

        let exact = history.usage_score("firefox", "firefox.desktop");
        let prefixed = history.usage_score("fire", "firefox.desktop");
        let unrelated = history.usage_score("chrom", "firefox.desktop");

        // "fire" sees its own exact bucket plus "firefox" as prefix hit.
        assert_eq!(prefixed, EXACT_WEIGHT + PREFIX_WEIGHT + EMPTY_WEIGHT);
        assert_eq!(exact, EXACT_WEIGHT + EMPTY_WEIGHT);
        assert_eq!(unrelated, EMPTY_WEIGHT);
    }

    #[test]
    fn empty_query_reads_only_the_catch_all_bucket() {
        let (_dir, history) = scratch("apps");

        history.save("", "firefox.desktop");
        history.save("fire", "firefox.desktop");

        assert_eq!(history.usage_score("", "firefox.desktop"), EXACT_WEIGHT);
    }

    #[test]
    fn remove_drops_the_identifier_everywhere() {
        let (_dir, history) = scratch("apps");

        history.save("fire", "firefox.desktop");
        history.save("", "firefox.desktop");
        history.save("fire", "firefly.desktop");

        history.remove("firefox.desktop");

        assert_eq!(history.usage_score("fire", "firefox.desktop"), 0);
        assert_eq!(history.usage_score("", "firefox.desktop"), 0);
        assert!(history.usage_score("fire", "firefly.desktop") > 0);
    }

    #[test]
    fn history_survives_a_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("apps.history");

        {
            let history = History::load_from("apps", path.clone());
            history.save("fire", "firefox.desktop");
        }

        let reloaded = History::load_from("apps", path);
        assert_eq!(
            reloaded.usage_score("fire", "firefox.desktop"),
            EXACT_WEIGHT
        );
    }
}
