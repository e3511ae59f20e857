//! Command line parsing.

use std::ffi::OsString;
use std::path::PathBuf;

use clap::{ArgAction, Parser};

use crate::rules::ProfileOptions;
use crate::sandbox::Trace;
use crate::utils::{LogConfig, LogOutput};

/// Start applications in a firejail sandbox restricted to what their
/// profile grants.
#[derive(Parser, Debug)]
#[command(name = "sailjail")]
#[command(version)]
#[command(override_usage = "sailjail [OPTIONS] [--] PROGRAM [ARGS...]")]
pub struct Cli {
    /// Settings file (default: /etc/sailjail.conf)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Plugin directory
    #[arg(short = 'd', long = "plugin-dir", value_name = "DIR")]
    pub plugin_dir: Option<PathBuf>,

    /// Application profile, a .profile or .desktop file
    #[arg(short = 'p', long = "profile", value_name = "FILE")]
    pub profile: Option<String>,

    /// Section of the profile to use
    #[arg(short = 's', long = "section")]
    pub section: Option<String>,

    /// Application name
    #[arg(short = 'a', long = "app")]
    pub app: Option<String>,

    /// Where to send log messages (stdout or stderr)
    #[arg(short = 'o', long = "output", value_name = "TYPE", default_value = "stderr")]
    pub output: LogOutput,

    /// Enable verbose log output, repeat for more
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,

    /// Disable all log output
    #[arg(short = 'q', long = "quiet")]
    pub quiet: bool,

    /// Enable firejail tracing, optionally into DIR
    #[arg(
        short = 't',
        long = "trace",
        value_name = "DIR",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = ""
    )]
    pub trace: Option<String>,

    /// Program and arguments to run, passed on byte for byte
    #[arg(
        value_name = "PROGRAM",
        required = true,
        trailing_var_arg = true,
        value_parser = clap::value_parser!(OsString)
    )]
    pub args: Vec<OsString>,
}

impl Cli {
    pub fn log_config(&self) -> LogConfig {
        LogConfig::from_flags(self.verbose, self.quiet, self.output).with_env()
    }

    pub fn trace(&self) -> Trace {
        match &self.trace {
            None => Trace::Off,
            Some(dir) if dir.is_empty() => Trace::On,
            Some(dir) => Trace::Dir(PathBuf::from(dir)),
        }
    }

    pub fn profile_options(&self) -> ProfileOptions {
        ProfileOptions {
            profile: self.profile.clone(),
            section: self.section.clone(),
            app: self.app.clone(),
            home: std::env::var_os("HOME").map(PathBuf::from),
        }
    }
}
