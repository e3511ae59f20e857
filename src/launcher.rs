//! One launch, from settings to exec.

use std::convert::Infallible;
use std::ffi::OsString;
use std::sync::Arc;

use crate::cli::Cli;
use crate::config::{load_config, load_default_config, LauncherConfig};
use crate::creds::Credentials;
use crate::error::{LauncherError, Result};
use crate::launch::{CommandLine, LaunchApp, LaunchContext, LaunchHooks, RunUser};
use crate::plugin::{PluginContext, PluginDesc, Plugins, BUILTIN_PLUGINS};
use crate::rules::{resolve_rules, ProfileOptions};
use crate::sandbox::{enforce, Launch, NixOps, PrivilegeOps, Trace};
use crate::utils::LogConfig;

/// Settings for launching programs.
#[derive(Debug, Clone)]
pub struct Launcher {
    config: LauncherConfig,
    log: LogConfig,
    trace: Trace,
    options: ProfileOptions,
    plugins: Vec<PluginDesc>,
}

impl Launcher {
    pub fn new(config: LauncherConfig, log: LogConfig) -> Self {
        Self {
            config,
            log,
            trace: Trace::Off,
            options: ProfileOptions::default(),
            plugins: BUILTIN_PLUGINS.to_vec(),
        }
    }

    /// Settings from the command line. An explicitly given settings file
    /// must load, the default one is optional.
    pub fn from_cli(cli: &Cli, log: LogConfig) -> Result<Self> {
        let mut config = match &cli.config {
            Some(path) => load_config(path)?,
            None => load_default_config(),
        };
        if let Some(dir) = &cli.plugin_dir {
            config.plugin_dir = dir.clone();
        }

        Ok(Self::new(config, log)
            .with_trace(cli.trace())
            .with_options(cli.profile_options()))
    }

    pub fn with_trace(mut self, trace: Trace) -> Self {
        self.trace = trace;
        self
    }

    pub fn with_options(mut self, options: ProfileOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_plugins(mut self, plugins: &[PluginDesc]) -> Self {
        self.plugins = plugins.to_vec();
        self
    }

    pub fn config(&self) -> &LauncherConfig {
        &self.config
    }

    /// Run `argv` on behalf of the user described by `creds`.
    ///
    /// Only returns on failure.
    pub fn launch<O: PrivilegeOps>(
        &self,
        ops: &mut O,
        creds: &Credentials,
        argv: &[OsString],
    ) -> Result<Infallible> {
        // Profiles are looked up by name, the argv itself stays untouched
        let program = argv
            .first()
            .ok_or_else(|| LauncherError::CommandLine("Missing program name".to_string()))?
            .to_string_lossy();

        let resolved = resolve_rules(&program, &self.config, &self.options)?;

        let mut hooks = LaunchHooks::new();
        let mut plugins = Plugins::new(&self.plugins);
        tracing::debug!(
            "Plugins from {}: {:?}",
            self.config.plugin_dir.display(),
            plugins.names()
        );
        plugins.start_all(&mut PluginContext {
            hooks: &mut hooks,
            config: &self.config,
        })?;

        let app = LaunchApp {
            file: resolved.profile_path.clone(),
            section: resolved.section.clone(),
        };
        let cmd = CommandLine {
            args: argv.to_vec(),
        };
        let user = RunUser {
            euid: creds.euid,
            egid: creds.egid,
            groups: creds.groups.clone(),
        };
        let ctx = LaunchContext {
            app: &app,
            cmd: &cmd,
            user: &user,
        };

        let confirmed = hooks.confirm(&ctx, Arc::new(resolved.rules));
        match &confirmed {
            Some(rules) => hooks.notify_confirmed(&ctx, rules),
            None => hooks.notify_denied(&ctx),
        }
        plugins.stop_all(&mut PluginContext {
            hooks: &mut hooks,
            config: &self.config,
        });

        let rules = confirmed.ok_or_else(|| LauncherError::Denied {
            program: program.into_owned(),
        })?;

        let launch = Launch {
            config: &self.config,
            rules: &rules,
            creds,
            log: &self.log,
            trace: &self.trace,
            argv,
        };
        Ok(enforce(ops, &launch)?)
    }
}

/// Launch the program named on the command line for the invoking user.
pub fn run(cli: &Cli, log: LogConfig) -> Result<Infallible> {
    let launcher = Launcher::from_cli(cli, log)?;
    let creds = Credentials::of_parent()?;
    launcher.launch(&mut NixOps, &creds, &cli.args)
}
