//! Built-in providers.
//!
//! Providers compile into the daemon and register themselves on the
//! candidate list below; cargo features select the set a build carries.
//! Everything a provider needs from the outside world arrives through
//! its constructor, so the set stays trivial to extend.

#[cfg(feature = "calc")]
pub mod calc;
#[cfg(feature = "desktopapplications")]
pub mod desktopapplications;
#[cfg(feature = "menus")]
pub mod menus;
#[cfg(feature = "providerlist")]
pub mod providerlist;

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use tracing::{debug, error};

use elephant_core::config::ElephantConfig;
use elephant_core::{Provider, Registry};

use crate::subscriptions::EventSender;

/// Build the registry from the compiled-in provider set.
#[must_use]
pub fn load(config: &ElephantConfig, events: EventSender) -> Arc<Registry> {
    #[cfg(not(feature = "menus"))]
    let _ = &events;

    let mut candidates: Vec<Arc<dyn Provider>> = Vec::new();

    #[cfg(feature = "menus")]
    candidates.push(Arc::new(menus::Menus::new(events)));
    #[cfg(feature = "desktopapplications")]
    candidates.push(Arc::new(desktopapplications::DesktopApplications::new()));
    #[cfg(feature = "calc")]
    candidates.push(Arc::new(calc::Calc::new()));

    #[cfg(feature = "providerlist")]
    let providerlist = Arc::new(providerlist::Providerlist::new());
    #[cfg(feature = "providerlist")]
    candidates.push(Arc::clone(&providerlist) as Arc<dyn Provider>);

    let registry = Arc::new(Registry::build(candidates, &config.ignored_providers));

    #[cfg(feature = "providerlist")]
    providerlist.populate(&registry);

    registry
}

/// Find an executable on `$PATH`.
#[must_use]
pub(crate) fn lookup_path(binary: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;

    std::env::split_paths(&path)
        .map(|dir| dir.join(binary))
        .find(|candidate| candidate.is_file())
}

/// Run a shell command detached from the daemon's process group, piping
/// `value` to stdin when the template does not consume it via
/// `%VALUE%`.
pub(crate) fn spawn_detached(template: &str, value: &str) {
    let (run, pipe) = if template.contains("%VALUE%") {
        (template.replace("%VALUE%", value), false)
    } else {
        (template.to_string(), !value.is_empty())
    };

    let mut command = tokio::process::Command::new("sh");
    command.arg("-c").arg(&run);
    command.stdout(Stdio::null()).stderr(Stdio::null());

    #[cfg(unix)]
    command.process_group(0);

    if pipe {
        command.stdin(Stdio::piped());
    } else {
        command.stdin(Stdio::null());
    }

    let child = match command.spawn() {
        Ok(child) => child,
        Err(err) => {
            error!(%run, error = %err, "spawn failed");
            return;
        }
    };

    let value = value.to_string();
    tokio::spawn(async move {
        let mut child = child;

        if pipe {
            if let Some(mut stdin) = child.stdin.take() {
                use tokio::io::AsyncWriteExt;
                let _ = stdin.write_all(value.as_bytes()).await;
            }
        }

        match child.wait().await {
            Ok(status) => debug!(%status, "detached command finished"),
            Err(err) => error!(error = %err, "detached command failed"),
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_path_finds_sh() {
        assert!(lookup_path("sh").is_some());
        assert!(lookup_path("definitely-not-a-binary-9000").is_none());
    }
}
