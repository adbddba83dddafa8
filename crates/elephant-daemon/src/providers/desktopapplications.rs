//! The `desktopapplications` provider: launch installed applications.
//!
//! Scans the XDG application directories for `.desktop` entries, filters
//! them against the current desktop environment, and launches the
//! activated entry detached from the daemon.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;

use async_trait::async_trait;
use ini::Ini;
use serde::Deserialize;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use elephant_core::config::CommonConfig;
use elephant_core::provider::{Activation, Provider, QueryContext};
use elephant_core::{History, config, fuzzy, history};
use elephant_proto::messages::{FuzzyInfo, Item, ItemType};

use super::spawn_detached;

pub const NAME: &str = "desktopapplications";

pub const ACTION_START: &str = "start";

#[derive(Debug, Deserialize)]
#[serde(default)]
struct Config {
    #[serde(flatten)]
    common: CommonConfig,
    /// Restrict matching to the application name.
    only_search_title: bool,
    history: bool,
    history_when_empty: bool,
    /// Prepended to every launch command, e.g. `uwsm app --`.
    launch_prefix: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            common: CommonConfig {
                icon: "applications-other".to_string(),
                ..CommonConfig::default()
            },
            only_search_title: false,
            history: true,
            history_when_empty: false,
            launch_prefix: String::new(),
        }
    }
}

#[derive(Debug, Clone, Default)]
struct DesktopFile {
    name: String,
    generic_name: String,
    comment: String,
    exec: String,
    icon: String,
    keywords: Vec<String>,
    no_display: bool,
    hidden: bool,
    only_show_in: Vec<String>,
    not_show_in: Vec<String>,
}

pub struct DesktopApplications {
    config: Config,
    history: History,
    desktop: String,
    files: RwLock<HashMap<String, DesktopFile>>,
}

impl DesktopApplications {
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: config::load_provider(NAME),
            history: History::load(NAME),
            desktop: std::env::var("XDG_CURRENT_DESKTOP").unwrap_or_default(),
            files: RwLock::new(HashMap::new()),
        }
    }

    fn visible(&self, file: &DesktopFile) -> bool {
        if file.hidden || file.no_display {
            return false;
        }

        if !file.not_show_in.is_empty() && file.not_show_in.iter().any(|d| *d == self.desktop) {
            return false;
        }

        if !file.only_show_in.is_empty() && !file.only_show_in.iter().any(|d| *d == self.desktop)
        {
            return false;
        }

        true
    }

    fn score(
        &self,
        query: &str,
        file: &DesktopFile,
        exact: bool,
    ) -> Option<(fuzzy::FieldMatch, String)> {
        let keywords = file.keywords.join(",");

        let fields: Vec<&str> = if self.config.only_search_title {
            vec![file.name.as_str()]
        } else {
            vec![
                file.name.as_str(),
                file.exec.as_str(),
                file.generic_name.as_str(),
                keywords.as_str(),
                file.comment.as_str(),
            ]
        };

        let m = fuzzy::score_fields(query, &fields, exact)?;
        let matched = fields[m.field_index].to_string();
        Some((m, matched))
    }
}

impl Default for DesktopApplications {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Provider for DesktopApplications {
    fn name(&self) -> &'static str {
        NAME
    }

    fn name_pretty(&self) -> String {
        if self.config.common.name_pretty.is_empty() {
            "Desktop Applications".to_string()
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

    async fn setup(&self) {
        let mut files = HashMap::new();

        for dir in application_dirs() {
            for entry in WalkDir::new(&dir)
                .follow_links(true)
                .into_iter()
                .filter_map(Result::ok)
            {
                let path = entry.path();
                if path.extension().is_none_or(|ext| ext != "desktop") {
                    continue;
                }

                let Some(id) = path.file_name().and_then(|n| n.to_str()) else {
                    continue;
                };

                // First hit wins: user dirs precede system dirs.
                if files.contains_key(id) {
                    continue;
                }

                match parse_desktop_file(path) {
                    Some(file) => {
                        files.insert(id.to_string(), file);
                    }
                    None => debug!(file = %path.display(), "no desktop entry section"),
                }
            }
        }

        info!(count = files.len(), "desktop entries scanned");
        *self.files.write().expect("desktop files lock poisoned") = files;
    }

    fn doc(&self) -> String {
        include_str!("docs/desktopapplications.md").to_string()
    }

    async fn query(
        &self,
        _ctx: &QueryContext,
        query: &str,
        _single: bool,
        exact: bool,
    ) -> Vec<Item> {
        let files = self.files.read().expect("desktop files lock poisoned");
        let mut items = Vec::new();

        for (id, file) in files.iter() {
            if !self.visible(file) {
                continue;
            }

            let mut score = 0;
            let mut subtext = file.generic_name.clone();
            let mut fuzzy_info = None;

            if !query.is_empty() {
                let Some((m, matched)) = self.score(query, file, exact) else {
                    continue;
                };

                score = m.score;
                let field = if matched == file.name {
                    "text"
                } else {
                    subtext = matched;
                    "subtext"
                };

                fuzzy_info = Some(FuzzyInfo {
                    field: field.to_string(),
                    start: m.start,
                    positions: m.positions,
                });
            }

            let mut state = Vec::new();
            let mut actions = vec![ACTION_START.to_string()];

            if self.config.history
                && (score > self.config.common.min_score
                    || (query.is_empty() && self.config.history_when_empty))
            {
                let usage = self.history.usage_score(query, id);

                if usage != 0 {
                    state.push("history".to_string());
                    actions.push(history::ACTION_DELETE.to_string());
                    score += usage;
                }
            }

            if score >= self.config.common.min_score || query.is_empty() {
                items.push(Item {
                    identifier: id.clone(),
                    text: file.name.clone(),
                    subtext,
                    icon: file.icon.clone(),
                    provider: NAME.to_string(),
                    score,
                    r#type: ItemType::Regular as i32,
                    state,
                    actions,
                    fuzzy: fuzzy_info,
                    ..Default::default()
                });
            }
        }

        items
    }

    async fn activate(&self, activation: Activation<'_>) {
        if activation.action == history::ACTION_DELETE {
            self.history.remove(activation.identifier);
            return;
        }

        let exec = {
            let files = self.files.read().expect("desktop files lock poisoned");
            files
                .get(activation.identifier)
                .map(|file| file.exec.clone())
        };

        let Some(exec) = exec else {
            warn!(identifier = activation.identifier, "unknown desktop entry");
            return;
        };

        let mut run = strip_field_codes(&exec);
        if !self.config.launch_prefix.is_empty() {
            run = format!("{} {run}", self.config.launch_prefix);
        }

        spawn_detached(&run, "");

        if self.config.history {
            self.history.save(activation.query, activation.identifier);
        }
    }
}

/// XDG application directories, user dirs first.
fn application_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::new();

    if let Some(data) = dirs::data_dir() {
        dirs.push(data.join("applications"));
    }

    let system = std::env::var("XDG_DATA_DIRS")
        .unwrap_or_else(|_| "/usr/local/share:/usr/share".to_string());
    for dir in std::env::split_paths(&system) {
        dirs.push(dir.join("applications"));
    }

    dirs.retain(|dir| dir.is_dir());
    dirs
}

fn parse_desktop_file(path: &std::path::Path) -> Option<DesktopFile> {
    let ini = Ini::load_from_file(path).ok()?;
    let section = ini.section(Some("Desktop Entry"))?;

    let get = |key: &str| section.get(key).unwrap_or_default().to_string();
    let get_bool = |key: &str| section.get(key) == Some("true");
    let get_list = |key: &str| -> Vec<String> {
        section
            .get(key)
            .unwrap_or_default()
            .split(';')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    };

    Some(DesktopFile {
        name: get("Name"),
        generic_name: get("GenericName"),
        comment: get("Comment"),
        exec: get("Exec"),
        icon: get("Icon"),
        keywords: get_list("Keywords"),
        no_display: get_bool("NoDisplay"),
        hidden: get_bool("Hidden"),
        only_show_in: get_list("OnlyShowIn"),
        not_show_in: get_list("NotShowIn"),
    })
}

/// Remove the freedesktop `%f`/`%U`-style field codes from an Exec line.
fn strip_field_codes(exec: &str) -> String {
    let mut out = String::with_capacity(exec.len());
    let mut chars = exec.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '%' {
            match chars.peek() {
                Some('%') => {
                    chars.next();
                    out.push('%');
                }
                Some(_) => {
                    chars.next();
                }
                None => {}
            }
        } else {
            out.push(c);
        }
    }

    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_codes_are_stripped() {
        assert_eq!(strip_field_codes("firefox %u"), "firefox");
        assert_eq!(strip_field_codes("mpv --player %F"), "mpv --player");
        assert_eq!(strip_field_codes("echo 100%% done"), "echo 100% done");
        assert_eq!(strip_field_codes("plain"), "plain");
    }

    #[test]
    fn desktop_files_parse() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("firefox.desktop");
        std::fs::write(
            &path,
            "[Desktop Entry]\n\
             Name=Firefox\n\
             GenericName=Web Browser\n\
             Exec=firefox %u\n\
             Icon=firefox\n\
             Keywords=internet;www;\n\
             NotShowIn=KDE;\n",
        )
        .unwrap();

        let file = parse_desktop_file(&path).unwrap();
        assert_eq!(file.name, "Firefox");
        assert_eq!(file.keywords, vec!["internet", "www"]);
        assert_eq!(file.not_show_in, vec!["KDE"]);
        assert!(!file.no_display);
    }
}
