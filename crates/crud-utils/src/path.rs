//! Filesystem locations used by the configuration layer.

use std::{env, path::PathBuf};

/// Returns the user's home directory.
///
/// Falls back to the current directory when `HOME` is not set.
pub fn home_dir() -> PathBuf {
    env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

/// Returns the user's config directory following the XDG Base Directory
/// Specification, `$XDG_CONFIG_HOME` or `$HOME/.config`.
pub fn xdg_config_home() -> PathBuf {
    env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Expands a leading `~` to the home directory.
///
/// ```
/// use crud_utils::path::expand_tilde;
///
/// assert_eq!(expand_tilde("/tmp/app.db"), std::path::PathBuf::from("/tmp/app.db"));
/// ```
pub fn expand_tilde(path: &str) -> PathBuf {
    match path.strip_prefix('~') {
        Some("") => home_dir(),
        Some(rest) if rest.starts_with('/') => home_dir().join(&rest[1..]),
        _ => PathBuf::from(path),
    }
}
