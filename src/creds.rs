//! Credentials of a running process, read from `/proc/<pid>/status`.

use std::path::{Path, PathBuf};

use nix::unistd::{getppid, Pid};

use crate::error::CredentialError;

const UID_FIELD: &str = "Uid:";
const GID_FIELD: &str = "Gid:";
const GROUPS_FIELD: &str = "Groups:";

/// User, group and supplementary group ids of a process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub ruid: u32,
    pub euid: u32,
    pub suid: u32,
    pub fsuid: u32,
    pub rgid: u32,
    pub egid: u32,
    pub sgid: u32,
    pub fsgid: u32,
    pub groups: Vec<u32>,
}

impl Credentials {
    /// Parse the contents of a status file.
    pub fn parse(status: &str) -> Result<Self, CredentialError> {
        let [ruid, euid, suid, fsuid] = id_quad(status, UID_FIELD)?;
        let [rgid, egid, sgid, fsgid] = id_quad(status, GID_FIELD)?;

        let groups = ids(field(status, GROUPS_FIELD)?, GROUPS_FIELD)?;
        if groups.is_empty() {
            return Err(CredentialError::Malformed(format!("empty {} list", GROUPS_FIELD)));
        }

        Ok(Self {
            ruid,
            euid,
            suid,
            fsuid,
            rgid,
            egid,
            sgid,
            fsgid,
            groups,
        })
    }

    /// Read a status file. Only the id lines need to be text, other fields
    /// such as `Name:` may hold arbitrary bytes.
    pub fn from_file(path: &Path) -> Result<Self, CredentialError> {
        let status = std::fs::read(path).map_err(|e| CredentialError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse(&String::from_utf8_lossy(&status))
    }

    pub fn for_pid(pid: Pid) -> Result<Self, CredentialError> {
        Self::from_file(&status_path(pid))
    }

    /// Credentials of the process that started us.
    pub fn of_parent() -> Result<Self, CredentialError> {
        Self::for_pid(getppid())
    }
}

fn status_path(pid: Pid) -> PathBuf {
    PathBuf::from(format!("/proc/{}/status", pid))
}

/// Value of the line starting with `name`.
fn field<'a>(status: &'a str, name: &str) -> Result<&'a str, CredentialError> {
    status
        .lines()
        .find_map(|line| line.strip_prefix(name))
        .ok_or_else(|| CredentialError::Malformed(format!("no {} line", name)))
}

fn id_quad(status: &str, name: &str) -> Result<[u32; 4], CredentialError> {
    let values = ids(field(status, name)?, name)?;
    <[u32; 4]>::try_from(values.as_slice()).map_err(|_| {
        CredentialError::Malformed(format!(
            "expected 4 values for {}, got {}",
            name,
            values.len()
        ))
    })
}

/// Whitespace separated unsigned decimal numbers.
fn ids(value: &str, name: &str) -> Result<Vec<u32>, CredentialError> {
    value
        .split_ascii_whitespace()
        .map(|token| {
            if !token.bytes().all(|b| b.is_ascii_digit()) {
                return Err(CredentialError::Malformed(format!(
                    "invalid {} value '{}'",
                    name, token
                )));
            }
            token.parse::<u32>().map_err(|e| {
                CredentialError::Malformed(format!("invalid {} value '{}': {}", name, token, e))
            })
        })
        .collect()
}
