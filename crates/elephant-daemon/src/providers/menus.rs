//! The `menus` provider: user-defined menus multiplexed behind one
//! provider family.
//!
//! A menu is a TOML file under `menus/` in a config directory. Its
//! entries are addressed as provider `menus:<menu-name>`; activating an
//! entry runs the resolved action command, and entries whose identifier
//! points at another menu pivot front-ends there through the event bus.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{error, info, warn};

use elephant_core::config::CommonConfig;
use elephant_core::provider::{Activation, Provider, QueryContext};
use elephant_core::{History, config, fuzzy, history, paths};
use elephant_proto::DELETE_SENTINEL;
use elephant_proto::messages::{FuzzyInfo, Item, ItemType, ProviderStateResponse};

use super::spawn_detached;
use crate::subscriptions::EventSender;

pub const NAME: &str = "menus";

pub const ACTION_GO_PARENT: &str = "menus:parent";
pub const ACTION_OPEN: &str = "menus:open";
pub const ACTION_DEFAULT: &str = "menus:default";

/// Score band for fixed-order entries, above anything fuzzy or history
/// can produce.
const PIN_BASE: i32 = 1_000_000;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Config {
    #[serde(flatten)]
    common: CommonConfig,
}

/// One menu definition.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Menu {
    pub name: String,
    pub name_pretty: String,
    pub icon: String,
    /// Menu to pivot back to via the `menus:parent` action.
    pub parent: String,
    /// Default action command; `%VALUE%` and `%ARGS%` are substituted,
    /// otherwise the entry value is piped to stdin.
    pub action: String,
    /// Named action commands, overridable per entry.
    pub actions: HashMap<String, String>,
    /// Keep definition order instead of fuzzy ranking.
    pub fixed_order: bool,
    pub history: bool,
    pub history_when_empty: bool,
    pub min_score: i32,
    pub entries: Vec<MenuEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MenuEntry {
    /// Defaults to `<menu>:<text>`; `menus:<other>` opens another menu.
    pub identifier: String,
    pub text: String,
    pub subtext: String,
    pub icon: String,
    /// Payload handed to the action command.
    pub value: String,
    pub keywords: Vec<String>,
    pub state: Vec<String>,
    pub actions: HashMap<String, String>,
    pub preview: String,
    pub preview_type: String,
    /// Command whose output asynchronously replaces the entry text.
    #[serde(rename = "async")]
    pub async_command: String,
}

pub struct Menus {
    config: Config,
    menus: HashMap<String, Menu>,
    history: History,
    events: EventSender,
}

impl Menus {
    #[must_use]
    pub fn new(events: EventSender) -> Self {
        Self {
            config: config::load_provider(NAME),
            menus: load_menus(),
            history: History::load(NAME),
            events,
        }
    }

    fn entry_to_item(
        &self,
        ctx: &QueryContext,
        menu: &Menu,
        entry: &MenuEntry,
        single: bool,
    ) -> Item {
        let icon = if entry.icon.is_empty() {
            menu.icon.clone()
        } else {
            entry.icon.clone()
        };

        let subtext = if single || menu.name_pretty.is_empty() {
            entry.subtext.clone()
        } else if entry.subtext.is_empty() {
            menu.name_pretty.clone()
        } else {
            format!("{}: {}", menu.name_pretty, entry.subtext)
        };

        let mut actions: Vec<String> = entry.actions.keys().cloned().collect();
        for action in menu.actions.keys() {
            if !actions.contains(action) {
                actions.push(action.clone());
            }
        }
        if entry.identifier.starts_with("menus:") {
            actions.push(ACTION_OPEN.to_string());
        }
        if actions.is_empty() {
            actions.push(ACTION_DEFAULT.to_string());
        }

        let item = Item {
            identifier: entry.identifier.clone(),
            text: entry.text.clone(),
            subtext,
            icon,
            provider: format!("{NAME}:{}", menu.name),
            score: 0,
            r#type: ItemType::Regular as i32,
            state: entry.state.clone(),
            actions,
            preview: entry.preview.clone(),
            preview_type: entry.preview_type.clone(),
            fuzzy: None,
        };

        if !entry.async_command.is_empty() {
            spawn_async_text(ctx.clone(), entry.async_command.clone(), item.clone());
        }

        item
    }
}

/// Run the entry's async command and replace the emitted item once the
/// output is in.
fn spawn_async_text(ctx: QueryContext, command: String, mut item: Item) {
    tokio::spawn(async move {
        let output = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(&command)
            .output()
            .await;

        item.text = match output {
            Ok(out) if out.status.success() => {
                String::from_utf8_lossy(&out.stdout).trim().to_string()
            }
            Ok(out) => {
                error!(%command, status = %out.status, "async entry command failed");
                DELETE_SENTINEL.to_string()
            }
            Err(err) => {
                error!(%command, error = %err, "async entry command failed");
                DELETE_SENTINEL.to_string()
            }
        };

        ctx.update_item(&item).await;
    });
}

#[async_trait]
impl Provider for Menus {
    fn name(&self) -> &'static str {
        NAME
    }

    fn name_pretty(&self) -> String {
        if self.config.common.name_pretty.is_empty() {
            "Menus".to_string()
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

    fn doc(&self) -> String {
        include_str!("docs/menus.md").to_string()
    }

    async fn query(
        &self,
        ctx: &QueryContext,
        query: &str,
        single: bool,
        exact: bool,
    ) -> Vec<Item> {
        let (filter, needle) = match query.split_once(':') {
            Some((menu, rest)) => (Some(menu), rest),
            None => (None, query),
        };

        let mut items = Vec::new();

        for menu in self.menus.values() {
            if filter.is_some_and(|f| f != menu.name) {
                continue;
            }

            for (index, entry) in menu.entries.iter().enumerate() {
                let mut item = self.entry_to_item(ctx, menu, entry, single);

                if menu.fixed_order {
                    item.score = PIN_BASE - index as i32;
                }

                if !needle.is_empty() {
                    let mut fields = vec![entry.text.as_str(), entry.subtext.as_str()];
                    fields.extend(entry.keywords.iter().map(String::as_str));

                    match fuzzy::score_fields(needle, &fields, exact) {
                        Some(m) => {
                            item.score = m.score;
                            item.fuzzy = Some(FuzzyInfo {
                                field: "text".to_string(),
                                start: m.start,
                                positions: m.positions,
                            });
                        }
                        None => item.score = 0,
                    }
                }

                if menu.history
                    && (item.score > menu.min_score
                        || (needle.is_empty() && menu.history_when_empty))
                {
                    let usage = self.history.usage_score(query, &item.identifier);

                    if usage != 0 {
                        item.state.push("history".to_string());
                        item.actions.push(history::ACTION_DELETE.to_string());
                        item.score += usage;
                    }
                }

                if item.score > self.config.common.min_score || needle.is_empty() {
                    items.push(item);
                }
            }
        }

        items
    }

    async fn activate(&self, activation: Activation<'_>) {
        match activation.action {
            ACTION_GO_PARENT => {
                let name = activation
                    .identifier
                    .strip_prefix("menus:")
                    .unwrap_or(activation.identifier);

                if let Some(menu) = self.menus.get(name) {
                    if !menu.parent.is_empty() {
                        let _ = self.events.send(format!("{NAME}:{}", menu.parent));
                    }
                }
            }
            history::ACTION_DELETE => self.history.remove(activation.identifier),
            action => {
                let Some((menu, entry)) = self.find_entry(activation.identifier) else {
                    warn!(identifier = activation.identifier, "unknown menu entry");
                    return;
                };

                // Entries pointing at another menu pivot instead of
                // running a command.
                if let Some(target) = entry.identifier.strip_prefix("menus:") {
                    let _ = self.events.send(format!("{NAME}:{target}"));
                    return;
                }

                let run = entry
                    .actions
                    .get(action)
                    .or_else(|| menu.actions.get(action))
                    .cloned()
                    .unwrap_or_else(|| menu.action.clone());

                if run.is_empty() {
                    warn!(menu = %menu.name, action, "no command configured for action");
                    return;
                }

                let run = run.replace("%ARGS%", activation.arguments);
                spawn_detached(&run, &entry.value);

                if menu.history {
                    self.history.save(activation.query, activation.identifier);
                }
            }
        }
    }

    fn state(&self, provider_key: &str) -> ProviderStateResponse {
        let menu = provider_key.split_once(':').map(|(_, m)| m).unwrap_or("");

        let actions = match self.menus.get(menu) {
            Some(menu) if !menu.parent.is_empty() => vec![ACTION_GO_PARENT.to_string()],
            _ => Vec::new(),
        };

        ProviderStateResponse {
            provider: String::new(),
            states: Vec::new(),
            actions,
        }
    }
}

impl Menus {
    fn find_entry(&self, identifier: &str) -> Option<(&Menu, &MenuEntry)> {
        self.menus.values().find_map(|menu| {
            menu.entries
                .iter()
                .find(|entry| entry.identifier == identifier)
                .map(|entry| (menu, entry))
        })
    }
}

/// Load every `menus/*.toml` from the config directories; the first
/// definition of a name wins.
fn load_menus() -> HashMap<String, Menu> {
    let mut menus = HashMap::new();

    for dir in paths::config_dirs() {
        let menu_dir = dir.join("menus");
        let Ok(files) = std::fs::read_dir(&menu_dir) else {
            continue;
        };

        for file in files.flatten() {
            let path = file.path();
            if path.extension().is_none_or(|ext| ext != "toml") {
                continue;
            }

            let mut menu: Menu = match config::parse_file(&path) {
                Ok(menu) => menu,
                Err(err) => {
                    warn!(file = %path.display(), error = %err, "skipping broken menu");
                    continue;
                }
            };

            if menu.name.is_empty() {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    menu.name = stem.to_string();
                }
            }

            for entry in &mut menu.entries {
                if entry.identifier.is_empty() {
                    entry.identifier = format!("{}:{}", menu.name, entry.text);
                }
            }

            if menus.contains_key(&menu.name) {
                continue;
            }

            info!(menu = %menu.name, entries = menu.entries.len(), "menu loaded");
            menus.insert(menu.name.clone(), menu);
        }
    }

    menus
}
