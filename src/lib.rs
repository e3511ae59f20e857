//! sailjail - launch programs in a firejail sandbox.
//!
//! The launcher computes a rule set from the program's profile and lets
//! launch hooks confirm it. It then switches to the invoking user and execs
//! firejail, or the program itself in passthrough mode.

pub mod cli;
pub mod config;
pub mod creds;
pub mod error;
pub mod launch;
pub mod launcher;
pub mod plugin;
pub mod rules;
pub mod sandbox;
pub mod utils;

pub use config::{KeyFile, LauncherConfig};
pub use creds::Credentials;
pub use error::{ConfigError, CredentialError, EnforcementError, LauncherError, Result};
pub use launch::{LaunchHook, LaunchHooks};
pub use launcher::Launcher;
pub use rules::{Restriction, RuleSet, RuleSetBuilder};

/// Re-export commonly used items.
pub mod prelude {
    pub use crate::launch::{CommandLine, LaunchApp, LaunchContext, LaunchHook, RunUser};
    pub use crate::plugin::{Plugin, PluginContext, PluginDesc};
    pub use crate::rules::{Bus, PermitKind, Restriction, RuleSet};
}
