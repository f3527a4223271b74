//! Application directory paths.
//!
//! Uses the [`dirs`] crate for platform-appropriate directory resolution.
//!
//! | Purpose | macOS | Linux |
//! |---------|-------|-------|
//! | Config | `~/Library/Application Support/nudge/` | `~/.config/nudge/` |
//!
//! # Environment Overrides
//!
//! - `NUDGE_CONFIG_DIR` overrides [`config_dir`]

use std::path::PathBuf;

/// Application config directory.
#[must_use]
pub fn config_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("NUDGE_CONFIG_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::config_dir()
        .map(|d| d.join("nudge"))
        .unwrap_or_else(|| PathBuf::from("/tmp/nudge-config"))
}

/// Main config file path (`config_dir()/config.toml`).
#[must_use]
pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_file_ends_with_config_toml() {
        let path = config_file();
        let s = path.to_string_lossy();
        assert!(s.ends_with("config.toml"), "config_file: {s}");
    }

    #[test]
    fn config_dir_override_via_env() {
        let key = "NUDGE_CONFIG_DIR";
        let original = std::env::var_os(key);

        // SAFETY: no other test in this crate reads NUDGE_CONFIG_DIR's value.
        unsafe { std::env::set_var(key, "/custom/config") };
        let result = config_dir();
        assert_eq!(result, PathBuf::from("/custom/config"));

        match original {
            Some(val) => unsafe { std::env::set_var(key, val) },
            None => unsafe { std::env::remove_var(key) },
        }
    }
}
