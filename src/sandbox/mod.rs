//! Enforcement of the confirmed rule set.
//!
//! In sandboxed mode the program runs under firejail with arguments derived
//! from the rules. In passthrough mode it is executed directly. Either way
//! the launcher first switches to the identity of the user it runs for.

pub mod firejail;
pub mod privileges;

use std::convert::Infallible;
use std::ffi::OsString;

use crate::config::LauncherConfig;
use crate::creds::Credentials;
use crate::error::EnforcementError;
use crate::rules::{PermitKind, RuleSet};
use crate::utils::{join_args, LogConfig};

pub use firejail::{generate_firejail_args, Trace};
pub use privileges::{change_identity, Identity, NixOps, PrivilegeOps};

/// Group whose id is granted by the Privileged permit.
pub const PRIVILEGED_GROUP: &str = "privileged";

/// Everything needed to run the program.
#[derive(Debug)]
pub struct Launch<'a> {
    pub config: &'a LauncherConfig,
    pub rules: &'a RuleSet,
    pub creds: &'a Credentials,
    pub log: &'a LogConfig,
    pub trace: &'a Trace,
    /// Program and its arguments.
    pub argv: &'a [OsString],
}

/// Drop privileges and exec. Never returns on success.
pub fn enforce<O: PrivilegeOps>(
    ops: &mut O,
    launch: &Launch<'_>,
) -> Result<Infallible, EnforcementError> {
    let (identity, args) = if launch.config.passthrough {
        tracing::debug!("Passthrough mode, not sandboxing");
        (passthrough_identity(launch.creds), launch.argv.to_vec())
    } else {
        let privileged_gid = if launch.rules.has_permit(PermitKind::Privileged) {
            resolve_privileged_gid(ops)
        } else {
            None
        };
        let args = generate_firejail_args(
            launch.config,
            launch.rules,
            launch.log,
            launch.trace,
            launch.argv,
        );
        (sandboxed_identity(launch.creds, privileged_gid), args)
    };

    let argv = privileges::exec_args(&args)?;
    tracing::debug!(
        "Executing {}",
        join_args(args.iter().map(|arg| arg.to_string_lossy()))
    );

    change_identity(ops, &identity)?;
    privileges::exec(ops, &argv)
}

fn resolve_privileged_gid<O: PrivilegeOps>(ops: &O) -> Option<u32> {
    let gid = ops.group_id(PRIVILEGED_GROUP);
    match gid {
        Some(gid) => tracing::debug!("Group {} is {}", PRIVILEGED_GROUP, gid),
        None => tracing::warn!(
            "Group {} not found, ignoring Privileged permission",
            PRIVILEGED_GROUP
        ),
    }
    gid
}

/// Become exactly the user described by the credentials.
pub fn passthrough_identity(creds: &Credentials) -> Identity {
    Identity {
        fsuid: creds.fsuid,
        fsgid: creds.fsgid,
        groups: creds.groups.clone(),
        rgid: creds.rgid,
        egid: creds.egid,
        sgid: creds.sgid,
        ruid: creds.ruid,
        euid: creds.euid,
        suid: creds.suid,
    }
}

/// Identity firejail is started with.
///
/// With the privileged group both the real and effective gid are replaced,
/// firejail resets the effective gid from the real one.
pub fn sandboxed_identity(creds: &Credentials, privileged_gid: Option<u32>) -> Identity {
    let rgid = privileged_gid.unwrap_or(creds.rgid);
    let egid = privileged_gid.unwrap_or(creds.egid);
    Identity {
        fsuid: creds.euid,
        fsgid: egid,
        groups: creds.groups.clone(),
        rgid,
        egid,
        sgid: creds.sgid,
        ruid: creds.ruid,
        euid: creds.euid,
        suid: creds.suid,
    }
}

#[cfg(test)]
mod tests {
    use super::privileges::testing::{Call, Recorder};
    use super::*;
    use crate::utils::{LogLevel, LogOutput};

    fn creds() -> Credentials {
        Credentials {
            ruid: 100000,
            euid: 100001,
            suid: 100002,
            fsuid: 100003,
            rgid: 100004,
            egid: 100005,
            sgid: 100006,
            fsgid: 100007,
            groups: vec![39, 100000],
        }
    }

    fn privileged_rules() -> RuleSet {
        let mut b = RuleSet::builder();
        b.add_permit(PermitKind::Privileged, true);
        b.build()
    }

    fn run(
        ops: &mut Recorder,
        config: &LauncherConfig,
        rules: &RuleSet,
        argv: &[OsString],
    ) -> EnforcementError {
        let creds = creds();
        let log = LogConfig {
            level: LogLevel::Default,
            output: LogOutput::Stderr,
        };
        let launch = Launch {
            config,
            rules,
            creds: &creds,
            log: &log,
            trace: &Trace::Off,
            argv,
        };
        match enforce(ops, &launch) {
            Ok(never) => match never {},
            Err(e) => e,
        }
    }

    fn argv() -> Vec<OsString> {
        vec!["/usr/bin/foo".into(), "bar".into()]
    }

    #[test]
    fn test_passthrough() {
        let config = LauncherConfig {
            passthrough: true,
            ..LauncherConfig::default()
        };
        let mut ops = Recorder::default();
        let err = run(&mut ops, &config, &privileged_rules(), &argv());
        assert!(matches!(err, EnforcementError::Exec { .. }));
        assert_eq!(
            ops.calls,
            vec![
                Call::SetFsUid(100003),
                Call::SetFsGid(100007),
                Call::SetGroups(vec![39, 100000]),
                Call::SetResGid(100004, 100005, 100006),
                Call::SetResUid(100000, 100001, 100002),
                Call::Flush,
                Call::Exec(vec!["/usr/bin/foo".into(), "bar".into()]),
            ]
        );
    }

    #[test]
    fn test_sandboxed() {
        let config = LauncherConfig::default();
        let mut ops = Recorder::default();
        run(&mut ops, &config, &RuleSet::default(), &argv());
        assert_eq!(
            ops.calls,
            vec![
                Call::SetFsUid(100001),
                Call::SetFsGid(100005),
                Call::SetGroups(vec![39, 100000]),
                Call::SetResGid(100004, 100005, 100006),
                Call::SetResUid(100000, 100001, 100002),
                Call::Flush,
                Call::Exec(vec![
                    "/usr/bin/firejail".into(),
                    "--quiet".into(),
                    "--".into(),
                    "/usr/bin/foo".into(),
                    "bar".into(),
                ]),
            ]
        );
    }

    #[test]
    fn test_privileged_permit_replaces_gids() {
        let config = LauncherConfig::default();
        let mut ops = Recorder {
            privileged_gid: Some(996),
            ..Default::default()
        };
        run(&mut ops, &config, &privileged_rules(), &argv());
        assert_eq!(ops.calls[1], Call::SetFsGid(996));
        assert_eq!(ops.calls[3], Call::SetResGid(996, 996, 100006));
    }

    #[test]
    fn test_missing_privileged_group_is_ignored() {
        let config = LauncherConfig::default();
        let mut ops = Recorder::default();
        run(&mut ops, &config, &privileged_rules(), &argv());
        assert_eq!(ops.calls[3], Call::SetResGid(100004, 100005, 100006));
    }

    #[test]
    fn test_group_only_used_with_permit() {
        let config = LauncherConfig::default();
        let mut ops = Recorder {
            privileged_gid: Some(996),
            ..Default::default()
        };
        run(&mut ops, &config, &RuleSet::default(), &argv());
        assert_eq!(ops.calls[3], Call::SetResGid(100004, 100005, 100006));
    }

    #[test]
    fn test_nul_argument_stops_before_transition() {
        let config = LauncherConfig::default();
        let mut ops = Recorder::default();
        let err = run(&mut ops, &config, &RuleSet::default(), &["foo\0".into()]);
        assert!(matches!(err, EnforcementError::InvalidArgument(_)));
        assert!(ops.calls.is_empty());
    }

    #[test]
    fn test_fatal_failure_prevents_exec() {
        let config = LauncherConfig::default();
        let mut ops = Recorder {
            privileged: true,
            fail_setresgid: true,
            ..Default::default()
        };
        let err = run(&mut ops, &config, &RuleSet::default(), &argv());
        assert!(matches!(err, EnforcementError::SetResGid { .. }));
        assert!(!ops.calls.iter().any(|c| matches!(c, Call::Exec(_))));
    }
}
