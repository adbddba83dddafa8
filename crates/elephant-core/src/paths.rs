//! XDG path resolution.

use std::fs;
use std::path::PathBuf;

use tracing::warn;

const APP_DIR: &str = "elephant";
const SOCKET_NAME: &str = "elephant.sock";

/// The daemon socket path.
///
/// `$XDG_RUNTIME_DIR/elephant/elephant.sock`, falling back to the temp
/// directory when the runtime dir is unset.
#[must_use]
pub fn socket_path() -> PathBuf {
    let base = match std::env::var_os("XDG_RUNTIME_DIR") {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => {
            warn!("XDG_RUNTIME_DIR not set, falling back to the temp directory");
            std::env::temp_dir()
        }
    };

    base.join(APP_DIR).join(SOCKET_NAME)
}

/// Path of a file in the elephant cache directory, creating the
/// directory on first use.
#[must_use]
pub fn cache_file(name: &str) -> PathBuf {
    let dir = dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR);

    if let Err(err) = fs::create_dir_all(&dir) {
        warn!(dir = %dir.display(), error = %err, "cannot create cache directory");
    }

    dir.join(name)
}

/// Existing configuration directories, user dir first.
///
/// `$XDG_CONFIG_HOME/elephant` followed by the system-wide
/// `/etc/xdg/elephant`.
#[must_use]
pub fn config_dirs() -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    if let Some(user) = dirs::config_dir() {
        candidates.push(user.join(APP_DIR));
    }
    candidates.push(PathBuf::from("/etc/xdg").join(APP_DIR));

    candidates.retain(|dir| dir.is_dir());
    candidates
}
