//! The `providerlist` provider: lets front-ends discover which
//! providers this daemon carries.

use std::sync::OnceLock;

use async_trait::async_trait;
use serde::Deserialize;

use elephant_core::config::CommonConfig;
use elephant_core::provider::{Activation, Provider, QueryContext};
use elephant_core::{Registry, config, fuzzy};
use elephant_proto::messages::{FuzzyInfo, Item, ItemType};

pub const NAME: &str = "providerlist";

#[derive(Debug, Deserialize)]
#[serde(default)]
struct Config {
    #[serde(flatten)]
    common: CommonConfig,
    /// Providers to omit from the listing.
    hidden: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            common: CommonConfig {
                icon: "applications-other".to_string(),
                ..CommonConfig::default()
            },
            hidden: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
struct Listed {
    name: String,
    name_pretty: String,
    icon: String,
}

pub struct Providerlist {
    config: Config,
    // Filled once after the registry is built; the registry cannot hand
    // a snapshot to a provider it is still constructing.
    listed: OnceLock<Vec<Listed>>,
}

impl Providerlist {
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: config::load_provider(NAME),
            listed: OnceLock::new(),
        }
    }

    /// Capture the visible provider set from the finished registry.
    pub fn populate(&self, registry: &Registry) {
        let mut listed: Vec<Listed> = registry
            .iter()
            .filter(|(name, provider)| {
                *name != NAME
                    && !provider.hide_from_provider_list()
                    && !self.config.hidden.iter().any(|h| h == name)
            })
            .map(|(name, provider)| Listed {
                name: name.to_string(),
                name_pretty: provider.name_pretty(),
                icon: provider.icon(),
            })
            .collect();

        listed.sort_by(|a, b| a.name_pretty.cmp(&b.name_pretty));
        let _ = self.listed.set(listed);
    }
}

impl Default for Providerlist {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Provider for Providerlist {
    fn name(&self) -> &'static str {
        NAME
    }

    fn name_pretty(&self) -> String {
        if self.config.common.name_pretty.is_empty() {
            "Providerlist".to_string()
        } else {
            self.config.common.name_pretty.clone()
        }
    }

    fn icon(&self) -> String {
        self.config.common.icon.clone()
    }

    fn hide_from_provider_list(&self) -> bool {
        true
    }

    fn doc(&self) -> String {
        include_str!("docs/providerlist.md").to_string()
    }

    async fn query(
        &self,
        _ctx: &QueryContext,
        query: &str,
        _single: bool,
        exact: bool,
    ) -> Vec<Item> {
        let Some(listed) = self.listed.get() else {
            return Vec::new();
        };

        let mut items = Vec::new();

        for provider in listed {
            let mut item = Item {
                identifier: provider.name.clone(),
                text: provider.name_pretty.clone(),
                subtext: provider.name.clone(),
                icon: provider.icon.clone(),
                provider: NAME.to_string(),
                score: 0,
                r#type: ItemType::Regular as i32,
                ..Default::default()
            };

            if !query.is_empty() {
                let fields = [provider.name_pretty.as_str(), provider.name.as_str()];
                let Some(m) = fuzzy::score_fields(query, &fields, exact) else {
                    continue;
                };

                if m.score < self.config.common.min_score {
                    continue;
                }

                item.score = m.score;
                item.fuzzy = Some(FuzzyInfo {
                    field: "text".to_string(),
                    start: m.start,
                    positions: m.positions,
                });
            }

            items.push(item);
        }

        items
    }

    // Front-ends switch providers themselves; there is nothing to run.
    async fn activate(&self, _activation: Activation<'_>) {}
}
