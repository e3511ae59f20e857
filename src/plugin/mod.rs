//! Statically linked launch plugins.

mod launch_log;

use crate::config::LauncherConfig;
use crate::error::LauncherError;
use crate::launch::LaunchHooks;

pub use launch_log::LaunchLogPlugin;

/// Plugins built into the launcher.
pub const BUILTIN_PLUGINS: &[PluginDesc] = &[launch_log::DESC];

/// What a plugin gets to work with while starting and stopping.
pub struct PluginContext<'a> {
    pub hooks: &'a mut LaunchHooks,
    pub config: &'a LauncherConfig,
}

pub trait Plugin {
    fn start(&mut self, ctx: &mut PluginContext<'_>) -> anyhow::Result<()>;

    fn stop(&mut self, _ctx: &mut PluginContext<'_>) {}
}

/// Describes a plugin that can be created.
#[derive(Clone, Copy)]
pub struct PluginDesc {
    pub name: &'static str,
    pub description: &'static str,
    /// Failure to start aborts the launch.
    pub must_start: bool,
    pub create: fn() -> anyhow::Result<Box<dyn Plugin>>,
}

impl std::fmt::Debug for PluginDesc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginDesc")
            .field("name", &self.name)
            .field("must_start", &self.must_start)
            .finish()
    }
}

struct Entry {
    desc: PluginDesc,
    plugin: Box<dyn Plugin>,
    started: bool,
}

/// Plugin instances in creation order.
pub struct Plugins {
    entries: Vec<Entry>,
    started: bool,
}

impl Plugins {
    /// Create an instance of each plugin. Names must be unique.
    pub fn new(descs: &[PluginDesc]) -> Self {
        let mut entries: Vec<Entry> = Vec::with_capacity(descs.len());
        for desc in descs {
            if entries.iter().any(|e| e.desc.name == desc.name) {
                tracing::warn!("Duplicate plugin \"{}\"", desc.name);
                continue;
            }
            match (desc.create)() {
                Ok(plugin) => {
                    tracing::debug!("Created plugin \"{}\" ({})", desc.name, desc.description);
                    entries.push(Entry {
                        desc: *desc,
                        plugin,
                        started: false,
                    });
                }
                Err(e) => tracing::warn!("Failed to create plugin \"{}\": {:#}", desc.name, e),
            }
        }
        Self {
            entries,
            started: false,
        }
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.entries.iter().map(|e| e.desc.name).collect()
    }

    /// Start all plugins in order.
    ///
    /// If a plugin that must start fails, the already started plugins are
    /// stopped again and the error is returned.
    pub fn start_all(&mut self, ctx: &mut PluginContext<'_>) -> Result<(), LauncherError> {
        if self.started {
            return Ok(());
        }
        self.started = true;

        for i in 0..self.entries.len() {
            let entry = &mut self.entries[i];
            match entry.plugin.start(ctx) {
                Ok(()) => {
                    tracing::debug!("Started plugin \"{}\"", entry.desc.name);
                    entry.started = true;
                }
                Err(e) if entry.desc.must_start => {
                    let name = entry.desc.name.to_string();
                    self.stop_all(ctx);
                    return Err(LauncherError::Plugin { name, source: e });
                }
                Err(e) => {
                    tracing::warn!("Plugin \"{}\" failed to start: {:#}", entry.desc.name, e);
                }
            }
        }
        Ok(())
    }

    /// Stop started plugins in reverse order.
    pub fn stop_all(&mut self, ctx: &mut PluginContext<'_>) {
        if !self.started {
            return;
        }
        self.started = false;

        for entry in self.entries.iter_mut().rev().filter(|e| e.started) {
            entry.plugin.stop(ctx);
            entry.started = false;
            tracing::debug!("Stopped plugin \"{}\"", entry.desc.name);
        }
    }
}
