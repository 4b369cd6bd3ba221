//! Path resolution for cdist
//!
//! # Environment Variables
//!
//! - `CDIST_CONFIG_DIR` - Override config directory (e.g., `~/dotfiles/cdist`)
//!
//! # Path Resolution Priority
//!
//! For config_dir():
//! 1. `CDIST_CONFIG_DIR` environment variable
//! 2. `XDG_CONFIG_HOME/cdist` (if set)
//! 3. `~/.config/cdist`

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Environment variable for config directory override
pub const ENV_CONFIG_DIR: &str = "CDIST_CONFIG_DIR";

/// Config file name inside the config directory
pub const CONFIG_FILE: &str = "cdist.toml";

/// Get the cdist config directory path
pub fn config_dir() -> Result<PathBuf> {
    resolve_config_dir(
        std::env::var(ENV_CONFIG_DIR).ok().as_deref(),
        std::env::var("XDG_CONFIG_HOME").ok().as_deref(),
        dirs::home_dir().as_deref(),
    )
}

/// Path of the config file
pub fn config_file() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE))
}

fn resolve_config_dir(
    override_dir: Option<&str>,
    xdg_config: Option<&str>,
    home: Option<&Path>,
) -> Result<PathBuf> {
    if let Some(dir) = override_dir.filter(|dir| !dir.is_empty()) {
        let path = expand(dir);
        log::debug!("Using config dir from {}: {}", ENV_CONFIG_DIR, path.display());
        return Ok(path);
    }

    if let Some(xdg) = xdg_config.filter(|dir| !dir.is_empty()) {
        let path = PathBuf::from(xdg).join("cdist");
        log::debug!("Using XDG_CONFIG_HOME: {}", path.display());
        return Ok(path);
    }

    let home = home.context("Could not determine home directory")?;
    let path = home.join(".config").join("cdist");
    log::debug!("Using default config dir: {}", path.display());
    Ok(path)
}

/// Expand `~` and environment variables in a configured path.
///
/// Unknown variables are left as they are.
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_override_wins() {
        let dir = resolve_config_dir(Some("/srv/cdist"), Some("/xdg"), Some(Path::new("/home/u")))
            .unwrap();
        assert_eq!(dir, PathBuf::from("/srv/cdist"));
    }

    #[test]
    fn test_override_with_tilde() {
        let dir = resolve_config_dir(Some("~/dotfiles/cdist"), None, None).unwrap();
        if let Some(home) = dirs::home_dir() {
            assert_eq!(dir, home.join("dotfiles/cdist"));
        }
    }

    #[test]
    fn test_xdg_config_home() {
        let dir = resolve_config_dir(None, Some("/xdg"), Some(Path::new("/home/u"))).unwrap();
        assert_eq!(dir, PathBuf::from("/xdg/cdist"));
    }

    #[test]
    fn test_empty_values_fall_through() {
        let dir = resolve_config_dir(Some(""), Some(""), Some(Path::new("/home/u"))).unwrap();
        assert_eq!(dir, PathBuf::from("/home/u/.config/cdist"));
    }

    #[test]
    fn test_no_home() {
        assert!(resolve_config_dir(None, None, None).is_err());
    }

    #[test]
    fn test_expand_absolute() {
        assert_eq!(expand("/var/lib/cdist"), PathBuf::from("/var/lib/cdist"));
    }

    #[test]
    fn test_expand_unknown_env_var_unchanged() {
        assert_eq!(
            expand("/x/$CDIST_SURELY_UNSET_VARIABLE/y"),
            PathBuf::from("/x/$CDIST_SURELY_UNSET_VARIABLE/y")
        );
    }
}
