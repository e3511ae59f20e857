//! Error types for the launcher.

use std::path::PathBuf;

use nix::errno::Errno;
use thiserror::Error;

/// Exit code for command line errors.
pub const EXIT_CMDLINE: u8 = 1;
/// Exit code for profile and configuration errors.
pub const EXIT_CONFIG: u8 = 2;
/// Exit code when a launch hook denied the launch.
pub const EXIT_DENIED: u8 = 3;
/// Exit code for everything else.
pub const EXIT_ERROR: u8 = 4;
/// Exit code once enforcement was reached. A successful exec never returns.
pub const EXIT_EXEC: u8 = 5;

/// Main error type for one launch attempt.
#[derive(Error, Debug)]
pub enum LauncherError {
    #[error("{0}")]
    CommandLine(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Credentials(#[from] CredentialError),

    #[error("Launch of {program} denied")]
    Denied { program: String },

    #[error("Plugin \"{name}\" failed to start: {source}")]
    Plugin {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error(transparent)]
    Enforcement(#[from] EnforcementError),
}

impl LauncherError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            LauncherError::CommandLine(_) => EXIT_CMDLINE,
            LauncherError::Config(_) => EXIT_CONFIG,
            LauncherError::Denied { .. } => EXIT_DENIED,
            LauncherError::Credentials(_) | LauncherError::Plugin { .. } => EXIT_ERROR,
            LauncherError::Enforcement(_) => EXIT_EXEC,
        }
    }
}

/// Configuration and profile errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}: line {line}: {message}", path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("{}: Does not look like application profile", path.display())]
    NotAProfile { path: PathBuf },

    #[error("No section for {program} in {}", path.display())]
    NoSection { program: String, path: PathBuf },

    #[error("{0}: unknown profile type")]
    UnknownProfileType(String),

    #[error("Invalid value {value} for {key}")]
    InvalidValue { key: String, value: String },

    #[error("{message}, however {} exists, maybe try that instead", desktop.display())]
    TryDesktop { message: String, desktop: PathBuf },
}

/// Errors resolving the credentials of a process.
#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid credentials data: {0}")]
    Malformed(String),
}

/// Errors raised while dropping privileges or replacing the process image.
#[derive(Error, Debug)]
pub enum EnforcementError {
    #[error("setgroups error: {0}")]
    SetGroups(Errno),

    #[error("setresgid({rgid},{egid},{sgid}) error: {source}")]
    SetResGid {
        rgid: u32,
        egid: u32,
        sgid: u32,
        source: Errno,
    },

    #[error("setresuid({ruid},{euid},{suid}) error: {source}")]
    SetResUid {
        ruid: u32,
        euid: u32,
        suid: u32,
        source: Errno,
    },

    #[error("exec({program}) error: {source}")]
    Exec { program: String, source: Errno },

    #[error("Argument contains a NUL byte: {0:?}")]
    InvalidArgument(String),

    #[error("Nothing to execute")]
    EmptyCommand,
}

pub type Result<T> = std::result::Result<T, LauncherError>;
