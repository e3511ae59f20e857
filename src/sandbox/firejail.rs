//! Firejail command line generation.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::config::LauncherConfig;
use crate::rules::{Bus, RuleSet};
use crate::utils::{os_basename, LogConfig, LogLevel};

/// Firejail's own tracing of the sandboxed program.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Trace {
    #[default]
    Off,
    /// Trace to the log.
    On,
    /// Trace to `<dir>/<program>.trace`.
    Dir(PathBuf),
}

impl Trace {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, Trace::Off)
    }
}

/// Generate the firejail argument vector for running `argv` under `rules`.
///
/// The program and its arguments are passed through unmodified after `--`.
pub fn generate_firejail_args(
    config: &LauncherConfig,
    rules: &RuleSet,
    log: &LogConfig,
    trace: &Trace,
    argv: &[OsString],
) -> Vec<OsString> {
    let mut args = vec![config.exec.clone().into_os_string()];

    match log.level {
        LogLevel::Quiet | LogLevel::Default => args.push("--quiet".into()),
        LogLevel::Debug => {}
        LogLevel::Verbose => args.push("--debug".into()),
    }

    match trace {
        Trace::Off => {}
        Trace::On => args.push("--trace".into()),
        Trace::Dir(dir) => {
            let mut file = argv
                .first()
                .map(|program| os_basename(program).to_os_string())
                .unwrap_or_default();
            file.push(".trace");
            args.push(option_with_path("--trace=", &dir.join(file)));
        }
    }

    for profile in rules.profiles() {
        args.push(option_with_path("--profile=", &profile.path));
    }

    for path in rules.paths() {
        let option = if path.allow { "whitelist" } else { "blacklist" };
        args.push(format!("--{}={}", option, path.path).into());
    }

    let dbus_log = log.level == LogLevel::Verbose || trace.is_enabled();
    for bus in [Bus::User, Bus::System] {
        let dbus = rules.dbus(bus);
        if dbus.is_empty() {
            continue;
        }

        let prefix = format!("--dbus-{}", bus.name());
        args.push(format!("{}=filter", prefix).into());
        if dbus_log {
            args.push(format!("{}.log", prefix).into());
        }
        for name in dbus.own() {
            args.push(format!("{}.own={}", prefix, name.name).into());
        }
        // Talking implies seeing
        for name in dbus.talk() {
            args.push(format!("{}.see={}", prefix, name.name).into());
            args.push(format!("{}.talk={}", prefix, name.name).into());
        }
    }

    args.push("--".into());
    args.extend(argv.iter().cloned());
    args
}

/// `option` followed by `path`, without going through UTF-8.
fn option_with_path(option: &str, path: &Path) -> OsString {
    let mut arg = OsString::from(option);
    arg.push(path);
    arg
}
