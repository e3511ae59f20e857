//! Launcher settings and their compiled-in defaults.

use std::path::PathBuf;

/// Sandbox tool executed in sandboxed mode.
pub const DEFAULT_EXEC: &str = "/usr/bin/firejail";
/// Where plugin modules live.
pub const DEFAULT_PLUGIN_DIR: &str = "/usr/lib/sailjail/plugins";
/// Where `.desktop` files live.
pub const DEFAULT_DESKTOP_DIR: &str = "/usr/share/applications";
/// Where application profiles live.
pub const DEFAULT_PROFILE_DIR: &str = "/etc/sailjail";
/// Permissions directory, relative to the profile directory.
pub const DEFAULT_PERM_SUBDIR: &str = "permissions";

/// Settings group in the configuration file.
pub const SETTINGS_SECTION: &str = "Settings";

pub const KEY_EXEC: &str = "Exec";
pub const KEY_PLUGIN_DIR: &str = "PluginDir";
pub const KEY_DESKTOP_DIR: &str = "DesktopDir";
pub const KEY_PROFILE_DIR: &str = "ProfileDir";
pub const KEY_PERM_DIR: &str = "PermissionsDir";
pub const KEY_PASSTHROUGH: &str = "Passthrough";

/// Launcher configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LauncherConfig {
    /// Absolute path of the sandbox tool.
    pub exec: PathBuf,
    /// Plugin directory.
    pub plugin_dir: PathBuf,
    /// Directory containing `.desktop` files.
    pub desktop_dir: PathBuf,
    /// Directory containing application profiles.
    pub profile_dir: PathBuf,
    /// Directory containing permission files.
    pub perm_dir: PathBuf,
    /// Skip the sandbox and exec the program directly.
    pub passthrough: bool,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            exec: PathBuf::from(DEFAULT_EXEC),
            plugin_dir: PathBuf::from(DEFAULT_PLUGIN_DIR),
            desktop_dir: PathBuf::from(DEFAULT_DESKTOP_DIR),
            profile_dir: PathBuf::from(DEFAULT_PROFILE_DIR),
            perm_dir: PathBuf::from(DEFAULT_PROFILE_DIR).join(DEFAULT_PERM_SUBDIR),
            passthrough: false,
        }
    }
}

impl LauncherConfig {
    /// Configuration rooted at the given directories, mostly for tests and
    /// plugins that carry their own profile trees.
    pub fn with_dirs(profile_dir: impl Into<PathBuf>, desktop_dir: impl Into<PathBuf>) -> Self {
        let profile_dir = profile_dir.into();
        Self {
            perm_dir: profile_dir.join(DEFAULT_PERM_SUBDIR),
            profile_dir,
            desktop_dir: desktop_dir.into(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LauncherConfig::default();
        assert_eq!(config.exec, PathBuf::from("/usr/bin/firejail"));
        assert_eq!(config.perm_dir, PathBuf::from("/etc/sailjail/permissions"));
        assert!(!config.passthrough);
    }

    #[test]
    fn test_with_dirs_derives_perm_dir() {
        let config = LauncherConfig::with_dirs("/tmp/p", "/tmp/d");
        assert_eq!(config.perm_dir, PathBuf::from("/tmp/p/permissions"));
        assert_eq!(config.desktop_dir, PathBuf::from("/tmp/d"));
        assert_eq!(config.exec, PathBuf::from(DEFAULT_EXEC));
    }
}
