//! The `calc` provider: calculations and unit conversions via
//! libqalculate's `qalc`.
//!
//! Solving can take long enough to feel sluggish, so the query returns a
//! placeholder item immediately and the real result arrives through the
//! async item-update path once `qalc` finishes. Saved results live in a
//! capped list on disk and are surfaced on single-provider queries.

use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, error, warn};

use elephant_core::config::CommonConfig;
use elephant_core::provider::{Activation, Provider, QueryContext};
use elephant_core::{config, paths};
use elephant_proto::DELETE_SENTINEL;
use elephant_proto::messages::{Item, ItemType, ProviderStateResponse};

use super::{lookup_path, spawn_detached};

pub const NAME: &str = "calc";

pub const ACTION_COPY: &str = "copy";
pub const ACTION_SAVE: &str = "save";
pub const ACTION_DELETE: &str = "delete";
pub const ACTION_DELETE_ALL: &str = "delete_all";

#[derive(Debug, Deserialize)]
#[serde(default)]
struct Config {
    #[serde(flatten)]
    common: CommonConfig,
    /// Cap on the saved-results list.
    max_items: usize,
    /// Text shown until the async result lands.
    placeholder: String,
    /// Skip queries without a digit.
    require_number: bool,
    /// Skip queries shorter than this.
    min_chars: usize,
    /// Command run on copy; `%VALUE%` is the result.
    command: String,
    /// Automatically save computed results.
    autosave: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            common: CommonConfig {
                icon: "accessories-calculator".to_string(),
                ..CommonConfig::default()
            },
            max_items: 100,
            placeholder: "calculating...".to_string(),
            require_number: true,
            min_chars: 3,
            command: "wl-copy -n %VALUE%".to_string(),
            autosave: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SavedResult {
    identifier: String,
    input: String,
    result: String,
}

pub struct Calc {
    config: Config,
    saved: Mutex<Vec<SavedResult>>,
}

impl Calc {
    #[must_use]
    pub fn new() -> Self {
        let config: Config = config::load_provider(NAME);
        let saved = load_saved();

        Self {
            config,
            saved: Mutex::new(saved),
        }
    }

    fn persist(&self) {
        let snapshot = {
            let mut saved = self.saved.lock().expect("calc lock poisoned");
            saved.truncate(self.config.max_items);
            saved.clone()
        };

        let path = paths::cache_file(&format!("{NAME}.json"));
        if let Err(err) = std::fs::write(&path, serde_json::to_vec(&snapshot).unwrap_or_default())
        {
            warn!(error = %err, "saved results not persisted");
        }
    }

    fn save_result(&self, input: &str, result: &str) {
        let entry = SavedResult {
            identifier: identifier_for(input),
            input: input.to_string(),
            result: result.to_string(),
        };

        self.saved
            .lock()
            .expect("calc lock poisoned")
            .insert(0, entry);
        self.persist();
    }

    async fn solve(query: &str) -> Option<String> {
        let output = tokio::process::Command::new("qalc")
            .arg("-t")
            .arg(query)
            .output()
            .await;

        match output {
            Ok(out) if out.status.success() => {
                Some(String::from_utf8_lossy(&out.stdout).trim().to_string())
            }
            Ok(out) => {
                debug!(query, status = %out.status, "qalc rejected the expression");
                None
            }
            Err(err) => {
                error!(error = %err, "qalc did not run");
                None
            }
        }
    }
}

impl Default for Calc {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Provider for Calc {
    fn name(&self) -> &'static str {
        NAME
    }

    fn name_pretty(&self) -> String {
        if self.config.common.name_pretty.is_empty() {
            "Calculator/Unit-Conversion".to_string()
        } else {
            self.config.common.name_pretty.clone()
        }
    }

    fn icon(&self) -> String {
        self.config.common.icon.clone()
    }

    fn hide_from_provider_list(&self) -> bool {
        self.config.common.hide_from_providerlist
    }

    fn available(&self) -> bool {
        if lookup_path("qalc").is_none() {
            debug!("libqalculate not found, disabling");
            return false;
        }

        true
    }

    async fn setup(&self) {
        // Warms up qalc's exchange-rate data.
        let _ = tokio::process::Command::new("qalc")
            .arg("-e")
            .arg("1+1")
            .output()
            .await;
    }

    fn doc(&self) -> String {
        include_str!("docs/calc.md").to_string()
    }

    async fn query(
        &self,
        ctx: &QueryContext,
        query: &str,
        single: bool,
        _exact: bool,
    ) -> Vec<Item> {
        let mut items = Vec::new();

        let has_number = !self.config.require_number || query.chars().any(|c| c.is_ascii_digit());

        if !query.is_empty() && query.chars().count() >= self.config.min_chars && has_number {
            let mut actions = vec![ACTION_COPY.to_string()];
            if !self.config.autosave {
                actions.push(ACTION_SAVE.to_string());
            }

            let item = Item {
                identifier: identifier_for(query),
                text: self.config.placeholder.clone(),
                subtext: query.to_string(),
                icon: self.config.common.icon.clone(),
                provider: NAME.to_string(),
                score: self.config.max_items as i32 + 1,
                r#type: ItemType::Regular as i32,
                state: vec!["current".to_string()],
                actions,
                ..Default::default()
            };

            let ctx = ctx.clone();
            let mut pending = item.clone();
            let query = query.to_string();
            tokio::spawn(async move {
                pending.text = Calc::solve(&query)
                    .await
                    .unwrap_or_else(|| DELETE_SENTINEL.to_string());
                ctx.update_item(&pending).await;
            });

            items.push(item);
        }

        if single {
            let saved = self.saved.lock().expect("calc lock poisoned");
            for (index, entry) in saved.iter().enumerate() {
                items.push(Item {
                    identifier: entry.identifier.clone(),
                    text: entry.result.clone(),
                    subtext: entry.input.clone(),
                    icon: self.config.common.icon.clone(),
                    provider: NAME.to_string(),
                    score: (self.config.max_items.saturating_sub(index)) as i32,
                    r#type: ItemType::Regular as i32,
                    state: vec!["saved".to_string()],
                    actions: vec![ACTION_DELETE.to_string(), ACTION_COPY.to_string()],
                    ..Default::default()
                });
            }
        }

        items
    }

    async fn activate(&self, activation: Activation<'_>) {
        let known = {
            let saved = self.saved.lock().expect("calc lock poisoned");
            saved
                .iter()
                .find(|entry| entry.identifier == activation.identifier)
                .map(|entry| entry.result.clone())
        };

        let (result, fresh) = match known {
            Some(result) => (result, false),
            None => match Calc::solve(activation.query).await {
                Some(result) => (result, true),
                None => return,
            },
        };

        match activation.action {
            ACTION_COPY => {
                spawn_detached(&self.config.command, &result);

                if fresh && self.config.autosave {
                    self.save_result(activation.query, &result);
                }
            }
            ACTION_SAVE => self.save_result(activation.query, &result),
            ACTION_DELETE => {
                self.saved
                    .lock()
                    .expect("calc lock poisoned")
                    .retain(|entry| entry.identifier != activation.identifier);
                self.persist();
            }
            ACTION_DELETE_ALL => {
                self.saved.lock().expect("calc lock poisoned").clear();
                self.persist();
            }
            other => error!(action = other, "unknown action"),
        }
    }

    fn state(&self, _provider_key: &str) -> ProviderStateResponse {
        let mut actions = Vec::new();

        if !self.saved.lock().expect("calc lock poisoned").is_empty() {
            actions.push(ACTION_DELETE_ALL.to_string());
        }

        ProviderStateResponse {
            provider: String::new(),
            states: Vec::new(),
            actions,
        }
    }
}

fn identifier_for(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

fn load_saved() -> Vec<SavedResult> {
    let path = paths::cache_file(&format!("{NAME}.json"));

    match std::fs::read(&path) {
        Ok(raw) => serde_json::from_slice(&raw).unwrap_or_else(|err| {
            warn!(error = %err, "discarding unreadable saved results");
            Vec::new()
        }),
        Err(_) => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_are_stable_per_input() {
        assert_eq!(identifier_for("2+2"), identifier_for("2+2"));
        assert_ne!(identifier_for("2+2"), identifier_for("2+3"));
        assert_eq!(identifier_for("2+2").len(), 64);
    }
}
