//! Launch confirmation pipeline.
//!
//! Hooks registered by plugins may replace or veto the rule set of every
//! launch, and are told about the outcome afterwards.

use std::ffi::OsString;
use std::path::PathBuf;
use std::sync::Arc;

use crate::rules::RuleSet;

/// What is being launched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchApp {
    /// Profile or desktop file the rules came from.
    pub file: Option<PathBuf>,
    pub section: Option<String>,
}

/// Command line of the launched program, program first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandLine {
    pub args: Vec<OsString>,
}

/// The user on whose behalf the program is launched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunUser {
    pub euid: u32,
    pub egid: u32,
    pub groups: Vec<u32>,
}

/// Arguments shared by all hook callbacks.
#[derive(Debug, Clone, Copy)]
pub struct LaunchContext<'a> {
    pub app: &'a LaunchApp,
    pub cmd: &'a CommandLine,
    pub user: &'a RunUser,
}

/// A launch policy extension.
///
/// The defaults approve every launch unchanged and ignore the outcome.
pub trait LaunchHook: Send + Sync {
    /// Return the rule set to continue with, or `None` to veto the launch.
    fn confirm_launch(
        &self,
        _ctx: &LaunchContext<'_>,
        rules: Arc<RuleSet>,
    ) -> Option<Arc<RuleSet>> {
        Some(rules)
    }

    fn launch_confirmed(&self, _ctx: &LaunchContext<'_>, _rules: &RuleSet) {}

    fn launch_denied(&self, _ctx: &LaunchContext<'_>) {}
}

/// Registration handle. Handles are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HookId(u64);

/// Hooks in registration order.
#[derive(Default)]
pub struct LaunchHooks {
    next_id: u64,
    hooks: Vec<(HookId, Arc<dyn LaunchHook>)>,
}

impl LaunchHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, hook: Arc<dyn LaunchHook>) -> HookId {
        self.next_id += 1;
        let id = HookId(self.next_id);
        self.hooks.push((id, hook));
        id
    }

    /// Unregister a hook. Unknown handles are ignored.
    pub fn remove(&mut self, id: HookId) -> bool {
        match self.hooks.iter().position(|(hook_id, _)| *hook_id == id) {
            Some(pos) => {
                self.hooks.remove(pos);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Pass the rule set through every hook in order.
    ///
    /// Returns `None` as soon as one hook vetoes. With no hooks the input
    /// comes back as is.
    pub fn confirm(&self, ctx: &LaunchContext<'_>, rules: Arc<RuleSet>) -> Option<Arc<RuleSet>> {
        self.hooks.iter().try_fold(rules, |current, (id, hook)| {
            let next = hook.confirm_launch(ctx, current);
            if next.is_none() {
                tracing::debug!("Launch hook {:?} vetoed the launch", id);
            }
            next
        })
    }

    pub fn notify_confirmed(&self, ctx: &LaunchContext<'_>, rules: &RuleSet) {
        for (_, hook) in &self.hooks {
            hook.launch_confirmed(ctx, rules);
        }
    }

    /// Every hook hears about the denial, including the one that vetoed.
    pub fn notify_denied(&self, ctx: &LaunchContext<'_>) {
        for (_, hook) in &self.hooks {
            hook.launch_denied(ctx);
        }
    }
}

impl std::fmt::Debug for LaunchHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LaunchHooks")
            .field("hooks", &self.hooks.iter().map(|(id, _)| id).collect::<Vec<_>>())
            .finish()
    }
}
