//! Logs the outcome of every launch.

use std::borrow::Cow;
use std::sync::Arc;

use super::{Plugin, PluginContext, PluginDesc};
use crate::launch::{HookId, LaunchContext, LaunchHook};
use crate::rules::RuleSet;

pub(super) const DESC: PluginDesc = PluginDesc {
    name: "launch-log",
    description: "Logs confirmed and denied launches",
    must_start: false,
    create: LaunchLogPlugin::create,
};

#[derive(Debug, Default)]
pub struct LaunchLogPlugin {
    hook: Option<HookId>,
}

impl LaunchLogPlugin {
    fn create() -> anyhow::Result<Box<dyn Plugin>> {
        Ok(Box::new(Self::default()))
    }
}

impl Plugin for LaunchLogPlugin {
    fn start(&mut self, ctx: &mut PluginContext<'_>) -> anyhow::Result<()> {
        if self.hook.is_none() {
            self.hook = Some(ctx.hooks.add(Arc::new(LaunchLogHook)));
        }
        Ok(())
    }

    fn stop(&mut self, ctx: &mut PluginContext<'_>) {
        if let Some(id) = self.hook.take() {
            ctx.hooks.remove(id);
        }
    }
}

struct LaunchLogHook;

impl LaunchLogHook {
    fn program<'a>(ctx: &LaunchContext<'a>) -> Cow<'a, str> {
        ctx.cmd
            .args
            .first()
            .map(|program| program.to_string_lossy())
            .unwrap_or(Cow::Borrowed("?"))
    }
}

impl LaunchHook for LaunchLogHook {
    fn launch_confirmed(&self, ctx: &LaunchContext<'_>, rules: &RuleSet) {
        let profile = ctx
            .app
            .file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "no profile".to_string());
        tracing::info!(
            "Launching {} for uid {} ({}, {} profile(s), {} path rule(s))",
            Self::program(ctx),
            ctx.user.euid,
            profile,
            rules.profiles().len(),
            rules.paths().len()
        );
    }

    fn launch_denied(&self, ctx: &LaunchContext<'_>) {
        tracing::warn!(
            "Launch of {} for uid {} denied",
            Self::program(ctx),
            ctx.user.euid
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LauncherConfig;
    use crate::launch::{CommandLine, LaunchApp, LaunchHooks, RunUser};

    #[test]
    fn test_registers_and_removes_hook() {
        let mut hooks = LaunchHooks::new();
        let config = LauncherConfig::default();
        let mut ctx = PluginContext {
            hooks: &mut hooks,
            config: &config,
        };

        let mut plugin = LaunchLogPlugin::default();
        plugin.start(&mut ctx).unwrap();
        plugin.start(&mut ctx).unwrap();
        assert_eq!(ctx.hooks.len(), 1);

        plugin.stop(&mut ctx);
        assert!(ctx.hooks.is_empty());
    }

    #[test]
    fn test_hook_approves_unchanged() {
        let mut hooks = LaunchHooks::new();
        hooks.add(Arc::new(LaunchLogHook));

        let app = LaunchApp::default();
        let cmd = CommandLine {
            args: vec!["foo".into()],
        };
        let user = RunUser::default();
        let ctx = LaunchContext {
            app: &app,
            cmd: &cmd,
            user: &user,
        };
        let rules = Arc::new(RuleSet::default());
        let confirmed = hooks.confirm(&ctx, rules.clone()).unwrap();
        assert!(Arc::ptr_eq(&rules, &confirmed));
        hooks.notify_confirmed(&ctx, &confirmed);
        hooks.notify_denied(&ctx);
    }
}
