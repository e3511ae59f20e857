//! Logging configuration.

use std::fmt;
use std::str::FromStr;

use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;

/// Environment variable that turns on debug logging.
pub const SAILJAIL_DEBUG_ENV: &str = "SAILJAIL_DEBUG";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    /// No logging at all.
    Quiet,
    /// Warnings and errors.
    #[default]
    Default,
    Debug,
    /// Everything, including the sandbox tool's own debug output.
    Verbose,
}

impl LogLevel {
    fn directive(&self) -> &'static str {
        match self {
            LogLevel::Quiet => "off",
            LogLevel::Default => "sailjail=info,warn",
            LogLevel::Debug => "sailjail=debug,warn",
            LogLevel::Verbose => "sailjail=trace,info",
        }
    }
}

/// Where log messages go.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogOutput {
    Stdout,
    #[default]
    Stderr,
}

impl FromStr for LogOutput {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stdout" => Ok(LogOutput::Stdout),
            "stderr" => Ok(LogOutput::Stderr),
            other => Err(format!("Invalid log type '{}'", other)),
        }
    }
}

impl fmt::Display for LogOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogOutput::Stdout => "stdout",
            LogOutput::Stderr => "stderr",
        })
    }
}

/// Logging setup decided once at startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogConfig {
    pub level: LogLevel,
    pub output: LogOutput,
}

impl LogConfig {
    /// Level from the command line flags. `quiet` wins over any number of
    /// `-v`.
    pub fn from_flags(verbose: u8, quiet: bool, output: LogOutput) -> Self {
        let level = match (quiet, verbose) {
            (true, _) => LogLevel::Quiet,
            (false, 0) => LogLevel::Default,
            (false, 1) => LogLevel::Debug,
            (false, _) => LogLevel::Verbose,
        };
        Self { level, output }
    }

    /// Apply the debug environment variable on top of the flags.
    pub fn with_env(mut self) -> Self {
        if self.level == LogLevel::Default && std::env::var_os(SAILJAIL_DEBUG_ENV).is_some() {
            self.level = LogLevel::Debug;
        }
        self
    }
}

/// Initialize the global subscriber.
pub fn init_logging(config: &LogConfig) {
    let writer = match config.output {
        LogOutput::Stdout => BoxMakeWriter::new(std::io::stdout),
        LogOutput::Stderr => BoxMakeWriter::new(std::io::stderr),
    };
    let debug = config.level >= LogLevel::Debug;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.level.directive()))
        .with_writer(writer)
        .with_target(false)
        .with_level(debug)
        .without_time()
        .with_ansi(false)
        .try_init()
        .ok();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levels_from_flags() {
        let out = LogOutput::Stderr;
        assert_eq!(LogConfig::from_flags(0, false, out).level, LogLevel::Default);
        assert_eq!(LogConfig::from_flags(1, false, out).level, LogLevel::Debug);
        assert_eq!(LogConfig::from_flags(2, false, out).level, LogLevel::Verbose);
        assert_eq!(LogConfig::from_flags(5, false, out).level, LogLevel::Verbose);
        assert_eq!(LogConfig::from_flags(2, true, out).level, LogLevel::Quiet);
    }

    #[test]
    fn test_log_output_parse() {
        assert_eq!("stdout".parse::<LogOutput>(), Ok(LogOutput::Stdout));
        assert_eq!("stderr".parse::<LogOutput>(), Ok(LogOutput::Stderr));
        assert!("syslog".parse::<LogOutput>().is_err());
    }

    #[test]
    fn test_level_ordering() {
        assert!(LogLevel::Verbose > LogLevel::Debug);
        assert!(LogLevel::Debug > LogLevel::Default);
        assert!(LogLevel::Default > LogLevel::Quiet);
    }
}
