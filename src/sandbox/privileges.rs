//! Identity transition and process replacement.

use std::convert::Infallible;
use std::ffi::{CString, OsString};
use std::io::Write;
use std::os::unix::ffi::OsStrExt;

use nix::errno::Errno;
use nix::unistd::{self, Gid, Group, Uid};

use crate::error::EnforcementError;

/// The system calls needed to drop privileges and exec.
pub trait PrivilegeOps {
    /// Whether the calling process runs with root uid or gid.
    fn is_privileged(&self) -> bool;

    fn group_id(&self, name: &str) -> Option<u32>;

    /// Advisory, the result is not checked.
    fn setfsuid(&mut self, uid: u32);

    /// Advisory, the result is not checked.
    fn setfsgid(&mut self, gid: u32);

    fn setgroups(&mut self, groups: &[u32]) -> Result<(), Errno>;

    fn setresgid(&mut self, rgid: u32, egid: u32, sgid: u32) -> Result<(), Errno>;

    fn setresuid(&mut self, ruid: u32, euid: u32, suid: u32) -> Result<(), Errno>;

    fn flush(&mut self);

    /// Replace the process image. Only returns on failure.
    fn exec(&mut self, argv: &[CString]) -> Errno;
}

/// The real thing.
#[derive(Debug, Default)]
pub struct NixOps;

impl PrivilegeOps for NixOps {
    fn is_privileged(&self) -> bool {
        unistd::geteuid().is_root() || unistd::getegid().as_raw() == 0
    }

    fn group_id(&self, name: &str) -> Option<u32> {
        match Group::from_name(name) {
            Ok(group) => group.map(|g| g.gid.as_raw()),
            Err(e) => {
                tracing::debug!("Failed to look up group {}: {}", name, e);
                None
            }
        }
    }

    fn setfsuid(&mut self, uid: u32) {
        unistd::setfsuid(Uid::from_raw(uid));
    }

    fn setfsgid(&mut self, gid: u32) {
        unistd::setfsgid(Gid::from_raw(gid));
    }

    fn setgroups(&mut self, groups: &[u32]) -> Result<(), Errno> {
        let groups: Vec<Gid> = groups.iter().map(|&g| Gid::from_raw(g)).collect();
        unistd::setgroups(&groups)
    }

    fn setresgid(&mut self, rgid: u32, egid: u32, sgid: u32) -> Result<(), Errno> {
        unistd::setresgid(Gid::from_raw(rgid), Gid::from_raw(egid), Gid::from_raw(sgid))
    }

    fn setresuid(&mut self, ruid: u32, euid: u32, suid: u32) -> Result<(), Errno> {
        unistd::setresuid(Uid::from_raw(ruid), Uid::from_raw(euid), Uid::from_raw(suid))
    }

    fn flush(&mut self) {
        std::io::stdout().flush().ok();
        std::io::stderr().flush().ok();
    }

    fn exec(&mut self, argv: &[CString]) -> Errno {
        let Some(program) = argv.first() else {
            return Errno::EINVAL;
        };
        match unistd::execvp(program, argv) {
            Ok(never) => match never {},
            Err(errno) => errno,
        }
    }
}

/// The ids to switch to, in the order they are applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub fsuid: u32,
    pub fsgid: u32,
    pub groups: Vec<u32>,
    pub rgid: u32,
    pub egid: u32,
    pub sgid: u32,
    pub ruid: u32,
    pub euid: u32,
    pub suid: u32,
}

/// Switch to `identity`.
///
/// Groups are finalized before the uid, since changing the uid may take
/// away the right to change groups. Failures are only fatal for a
/// privileged caller.
pub fn change_identity<O: PrivilegeOps>(
    ops: &mut O,
    identity: &Identity,
) -> Result<(), EnforcementError> {
    let fatal = ops.is_privileged();

    ops.setfsuid(identity.fsuid);
    ops.setfsgid(identity.fsgid);

    checked(
        fatal,
        ops.setgroups(&identity.groups)
            .map_err(EnforcementError::SetGroups),
    )?;
    checked(
        fatal,
        ops.setresgid(identity.rgid, identity.egid, identity.sgid)
            .map_err(|source| EnforcementError::SetResGid {
                rgid: identity.rgid,
                egid: identity.egid,
                sgid: identity.sgid,
                source,
            }),
    )?;
    checked(
        fatal,
        ops.setresuid(identity.ruid, identity.euid, identity.suid)
            .map_err(|source| EnforcementError::SetResUid {
                ruid: identity.ruid,
                euid: identity.euid,
                suid: identity.suid,
                source,
            }),
    )
}

fn checked(fatal: bool, result: Result<(), EnforcementError>) -> Result<(), EnforcementError> {
    match result {
        Err(e) if fatal => Err(e),
        Err(e) => {
            tracing::debug!("{} (not privileged, ignored)", e);
            Ok(())
        }
        Ok(()) => Ok(()),
    }
}

/// Convert the argument vector for exec. The bytes are kept as they are.
pub fn exec_args(argv: &[OsString]) -> Result<Vec<CString>, EnforcementError> {
    if argv.is_empty() {
        return Err(EnforcementError::EmptyCommand);
    }
    argv.iter()
        .map(|arg| {
            CString::new(arg.as_bytes()).map_err(|_| {
                EnforcementError::InvalidArgument(arg.to_string_lossy().into_owned())
            })
        })
        .collect()
}

/// Flush output and replace the process image.
pub fn exec<O: PrivilegeOps>(
    ops: &mut O,
    argv: &[CString],
) -> Result<Infallible, EnforcementError> {
    let program = argv
        .first()
        .ok_or(EnforcementError::EmptyCommand)?
        .to_string_lossy()
        .into_owned();

    ops.flush();
    let source = ops.exec(argv);
    Err(EnforcementError::Exec { program, source })
}


#[cfg(test)]
mod tests {
    use super::testing::{Call, Recorder};
    use super::*;

    fn identity() -> Identity {
        Identity {
            fsuid: 1,
            fsgid: 2,
            groups: vec![3, 4],
            rgid: 5,
            egid: 6,
            sgid: 7,
            ruid: 8,
            euid: 9,
            suid: 10,
        }
    }

    #[test]
    fn test_transition_order() {
        let mut ops = Recorder::default();
        change_identity(&mut ops, &identity()).unwrap();
        assert_eq!(
            ops.calls,
            vec![
                Call::SetFsUid(1),
                Call::SetFsGid(2),
                Call::SetGroups(vec![3, 4]),
                Call::SetResGid(5, 6, 7),
                Call::SetResUid(8, 9, 10),
            ]
        );
    }

    #[test]
    fn test_failure_fatal_when_privileged() {
        let mut ops = Recorder {
            privileged: true,
            fail_setresgid: true,
            ..Default::default()
        };
        let err = change_identity(&mut ops, &identity()).unwrap_err();
        assert!(matches!(err, EnforcementError::SetResGid { rgid: 5, .. }));
        // uid is left alone
        assert!(!ops.calls.iter().any(|c| matches!(c, Call::SetResUid(..))));
    }

    #[test]
    fn test_failure_tolerated_when_unprivileged() {
        let mut ops = Recorder {
            fail_setresgid: true,
            ..Default::default()
        };
        change_identity(&mut ops, &identity()).unwrap();
        assert_eq!(ops.calls.last(), Some(&Call::SetResUid(8, 9, 10)));
    }

    #[test]
    fn test_exec_flushes_first_and_reports_failure() {
        let mut ops = Recorder::default();
        let argv = exec_args(&["/bin/true".into(), "x".into()]).unwrap();
        let err = exec(&mut ops, &argv).unwrap_err();
        assert_eq!(
            ops.calls,
            vec![Call::Flush, Call::Exec(vec!["/bin/true".into(), "x".into()])]
        );
        assert_eq!(
            err.to_string(),
            "exec(/bin/true) error: ENOENT: No such file or directory"
        );
    }

    #[test]
    fn test_exec_args_rejects_nul() {
        let err = exec_args(&["foo\0bar".into()]).unwrap_err();
        assert!(matches!(err, EnforcementError::InvalidArgument(_)));
        assert!(matches!(exec_args(&[]), Err(EnforcementError::EmptyCommand)));
    }

    #[test]
    fn test_exec_args_keep_raw_bytes() {
        use std::os::unix::ffi::OsStringExt;

        let arg = OsString::from_vec(b"caf\xe9.txt".to_vec());
        let argv = exec_args(&["/usr/bin/cat".into(), arg]).unwrap();
        assert_eq!(argv[1].as_bytes(), b"caf\xe9.txt");
    }
}
