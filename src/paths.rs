//! Path resolution for rdeploy
//!
//! # Environment Variables
//!
//! - `RDEPLOY_CONFIG_DIR` - Override config directory (e.g., `~/dotfiles/rdeploy`)
//!
//! # Path Resolution Priority
//!
//! For config_dir():
//! 1. `RDEPLOY_CONFIG_DIR` environment variable
//! 2. `XDG_CONFIG_HOME/rdeploy` (if set)
//! 3. Platform default:
//!    - Windows: `%APPDATA%\rdeploy`
//!    - macOS/Linux: `~/.config/rdeploy`

use anyhow::{Context, Result};
use std::path::PathBuf;

/// Environment variable for config directory override
pub const ENV_CONFIG_DIR: &str = "RDEPLOY_CONFIG_DIR";

/// Name of the config file inside the config directory
pub const CONFIG_FILE: &str = "config.toml";

/// Get the rdeploy config directory path
pub fn config_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(ENV_CONFIG_DIR) {
        let path = expand(&dir);
        log::debug!(
            "Using config dir from {}: {}",
            ENV_CONFIG_DIR,
            path.display()
        );
        return Ok(path);
    }

    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        let path = PathBuf::from(xdg_config).join("rdeploy");
        log::debug!("Using XDG_CONFIG_HOME: {}", path.display());
        return Ok(path);
    }

    #[cfg(windows)]
    {
        if let Some(app_data) = dirs::config_dir() {
            let path = app_data.join("rdeploy");
            log::debug!("Using Windows config dir: {}", path.display());
            return Ok(path);
        }
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    let path = home.join(".config").join("rdeploy");
    log::debug!("Using default config dir: {}", path.display());
    Ok(path)
}

/// Default config file path
pub fn config_file() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE))
}

/// Expand ~ and environment variables in a path string.
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    /// Run `f` with `key` set to `value`, restoring the previous value after.
    ///
    /// # Safety
    /// env::set_var is unsafe when other threads read the environment. Only
    /// the variables owned by this module are touched here.
    fn with_env_var<F, R>(key: &str, value: &str, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let original = env::var(key).ok();
        // SAFETY: no other test reads these variables
        unsafe { env::set_var(key, value) };
        let result = f();
        match original {
            // SAFETY: as above
            Some(v) => unsafe { env::set_var(key, v) },
            None => unsafe { env::remove_var(key) },
        }
        result
    }

    #[test]
    fn test_config_dir_env_override() {
        with_env_var(ENV_CONFIG_DIR, "/custom/rdeploy", || {
            assert_eq!(config_dir().unwrap(), PathBuf::from("/custom/rdeploy"));
            assert_eq!(
                config_file().unwrap(),
                PathBuf::from("/custom/rdeploy/config.toml")
            );
        });
    }

    #[test]
    fn test_expand_with_tilde() {
        let result = expand("~/deploy/config.toml");
        let home = dirs::home_dir().unwrap();
        assert_eq!(result, home.join("deploy").join("config.toml"));
    }

    #[test]
    fn test_expand_absolute() {
        assert_eq!(expand("/etc/rdeploy"), PathBuf::from("/etc/rdeploy"));
    }

    #[test]
    fn test_expand_unknown_env_var_unchanged() {
        let result = expand("/path/$RDEPLOY_NONEXISTENT_VAR_12345/file");
        assert_eq!(
            result,
            PathBuf::from("/path/$RDEPLOY_NONEXISTENT_VAR_12345/file")
        );
    }
}
