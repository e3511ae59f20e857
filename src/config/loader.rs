//! Configuration loader for /etc/sailjail.conf.

use std::path::{Path, PathBuf};

use crate::config::keyfile::KeyFile;
use crate::config::schema::*;
use crate::error::ConfigError;

/// Default configuration file.
pub const DEFAULT_CONFIG_FILE: &str = "/etc/sailjail.conf";

/// Get the default configuration file path.
pub fn default_config_path() -> PathBuf {
    PathBuf::from(DEFAULT_CONFIG_FILE)
}

/// Load configuration from a file path, on top of the defaults.
pub fn load_config(path: &Path) -> Result<LauncherConfig, ConfigError> {
    let keyfile = KeyFile::load(path)?;
    tracing::debug!("Loading {}", path.display());

    let mut config = LauncherConfig::default();
    apply_settings(&mut config, &keyfile);
    Ok(config)
}

/// Load the default configuration file, or return the defaults if it is
/// missing or unusable.
pub fn load_default_config() -> LauncherConfig {
    let path = default_config_path();
    if !path.exists() {
        return LauncherConfig::default();
    }

    match load_config(&path) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!("{}", e);
            LauncherConfig::default()
        }
    }
}

/// Parse configuration from a string.
pub fn parse_config(content: &str) -> Result<LauncherConfig, ConfigError> {
    let keyfile = KeyFile::parse(content)?;
    let mut config = LauncherConfig::default();
    apply_settings(&mut config, &keyfile);
    Ok(config)
}

/// Apply the `[Settings]` group. Bad values are logged and the previous
/// value is kept.
fn apply_settings(config: &mut LauncherConfig, kf: &KeyFile) {
    if let Some(exec) = kf.string(SETTINGS_SECTION, KEY_EXEC) {
        if exec.starts_with('/') {
            config.exec = PathBuf::from(exec);
            tracing::debug!("  {}={}", KEY_EXEC, exec);
        } else {
            tracing::warn!(
                "[{}] {} value '{}' must be an absolute path, ignoring!",
                SETTINGS_SECTION,
                KEY_EXEC,
                exec
            );
        }
    }

    if let Some(dir) = kf.string(SETTINGS_SECTION, KEY_PLUGIN_DIR) {
        config.plugin_dir = PathBuf::from(dir);
        tracing::debug!("  {}={}", KEY_PLUGIN_DIR, dir);
    }

    if let Some(dir) = kf.string(SETTINGS_SECTION, KEY_DESKTOP_DIR) {
        config.desktop_dir = PathBuf::from(dir);
        tracing::debug!("  {}={}", KEY_DESKTOP_DIR, dir);
    }

    let perm_dir = kf.string(SETTINGS_SECTION, KEY_PERM_DIR);
    if let Some(dir) = kf.string(SETTINGS_SECTION, KEY_PROFILE_DIR) {
        config.profile_dir = PathBuf::from(dir);
        tracing::debug!("  {}={}", KEY_PROFILE_DIR, dir);

        // ProfileDir moves the permissions directory along with it
        if perm_dir.is_none() {
            config.perm_dir = config.profile_dir.join(DEFAULT_PERM_SUBDIR);
            tracing::debug!("  {}={}", KEY_PERM_DIR, config.perm_dir.display());
        }
    }

    if let Some(dir) = perm_dir {
        config.perm_dir = PathBuf::from(dir);
        tracing::debug!("  {}={}", KEY_PERM_DIR, dir);
    }

    match kf.boolean(SETTINGS_SECTION, KEY_PASSTHROUGH) {
        Ok(Some(passthrough)) => {
            config.passthrough = passthrough;
            tracing::debug!("  {}={}", KEY_PASSTHROUGH, passthrough);
        }
        Ok(None) => {}
        Err(value) => {
            tracing::warn!("Invalid {} value '{}', ignoring", KEY_PASSTHROUGH, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_config() {
        let config = parse_config("").unwrap();
        assert_eq!(config, LauncherConfig::default());
    }

    #[test]
    fn test_parse_full_config() {
        let config = parse_config(
            "[Settings]\n\
             Exec=/usr/local/bin/firejail\n\
             PluginDir=/opt/plugins\n\
             DesktopDir=/opt/applications\n\
             ProfileDir=/opt/sailjail\n\
             PermissionsDir=/opt/perms\n\
             Passthrough=true\n",
        )
        .unwrap();

        assert_eq!(config.exec, PathBuf::from("/usr/local/bin/firejail"));
        assert_eq!(config.plugin_dir, PathBuf::from("/opt/plugins"));
        assert_eq!(config.desktop_dir, PathBuf::from("/opt/applications"));
        assert_eq!(config.profile_dir, PathBuf::from("/opt/sailjail"));
        assert_eq!(config.perm_dir, PathBuf::from("/opt/perms"));
        assert!(config.passthrough);
    }

    #[test]
    fn test_profile_dir_moves_perm_dir() {
        let config = parse_config("[Settings]\nProfileDir=/opt/sailjail\n").unwrap();
        assert_eq!(config.perm_dir, PathBuf::from("/opt/sailjail/permissions"));
    }

    #[test]
    fn test_bad_values_keep_defaults() {
        let config = parse_config("[Settings]\nExec=firejail\nPassthrough=perhaps\n").unwrap();
        assert_eq!(config.exec, PathBuf::from(DEFAULT_EXEC));
        assert!(!config.passthrough);
    }

    #[test]
    fn test_other_sections_ignored() {
        let config = parse_config("[Other]\nExec=/bin/false\n").unwrap();
        assert_eq!(config.exec, PathBuf::from(DEFAULT_EXEC));
    }

    #[test]
    fn test_load_config_errors_carry_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sailjail.conf");
        std::fs::write(&path, "garbage\n").unwrap();

        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("sailjail.conf"));

        let err = load_config(&dir.path().join("missing.conf")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
