//! XDG Base Directory paths for pairlink.
//!
//! The pairing server follows XDG conventions on every platform so that
//! operators find `config.toml` and locally stored archives in the same
//! place on Linux and macOS hosts.

use std::path::PathBuf;

const APP_DIR: &str = "pairlink";

/// Get the pairlink config directory.
///
/// Returns `$XDG_CONFIG_HOME/pairlink` if set, otherwise `~/.config/pairlink`.
///
/// # Examples
///
/// ```
/// use pairlink_paths::config_dir;
///
/// let user_config = config_dir().join("config.toml");
/// ```
pub fn config_dir() -> PathBuf {
    xdg_dir("XDG_CONFIG_HOME", ".config")
}

/// Get the pairlink data directory.
///
/// Returns `$XDG_DATA_HOME/pairlink` if set, otherwise `~/.local/share/pairlink`.
/// Credential archives land here when the local blob store is selected.
pub fn data_dir() -> PathBuf {
    xdg_dir("XDG_DATA_HOME", ".local/share")
}

/// Directory used by the local blob store when none is configured.
pub fn archive_dir() -> PathBuf {
    data_dir().join("archives")
}

fn xdg_dir(env_key: &str, home_fallback: &str) -> PathBuf {
    if let Ok(base) = std::env::var(env_key)
        && !base.is_empty()
    {
        PathBuf::from(base).join(APP_DIR)
    } else if let Some(home) = dirs::home_dir() {
        home.join(home_fallback).join(APP_DIR)
    } else {
        PathBuf::from(home_fallback).join(APP_DIR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_dir_ends_with_app_name() {
        assert!(config_dir().ends_with(APP_DIR));
    }

    #[test]
    fn archive_dir_lives_under_data_dir() {
        assert!(archive_dir().starts_with(data_dir()));
        assert!(archive_dir().ends_with("archives"));
    }

    #[test]
    fn xdg_dir_respects_env() {
        unsafe {
            std::env::set_var("PAIRLINK_TEST_XDG_BASE", "/tmp/pairlink-xdg");
        }
        let path = xdg_dir("PAIRLINK_TEST_XDG_BASE", ".config");
        assert_eq!(path, PathBuf::from("/tmp/pairlink-xdg/pairlink"));
        unsafe {
            std::env::remove_var("PAIRLINK_TEST_XDG_BASE");
        }
    }
}
