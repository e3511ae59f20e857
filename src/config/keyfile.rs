//! Desktop-entry style key file reader.
//!
//! Used for the launcher settings, application profiles and `.desktop`
//! files. Only the subset needed here is supported: groups, `Key=Value`
//! pairs, comments and the usual backslash escapes.

use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// One `[Group]` of a key file.
#[derive(Debug, Clone, Default)]
struct Group {
    name: String,
    entries: Vec<(String, String)>,
}

/// A parsed key file.
#[derive(Debug, Clone, Default)]
pub struct KeyFile {
    path: Option<PathBuf>,
    groups: Vec<Group>,
}

impl KeyFile {
    /// Load and parse a key file from disk.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut keyfile = Self::parse_with_path(&content, path)?;
        keyfile.path = Some(path.to_path_buf());
        Ok(keyfile)
    }

    /// Parse key file contents that did not come from a file.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Self::parse_with_path(content, Path::new("<memory>"))
    }

    fn parse_with_path(content: &str, path: &Path) -> Result<Self, ConfigError> {
        let mut keyfile = KeyFile::default();
        let mut current: Option<usize> = None;

        for (index, raw) in content.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let parse_error = |message: &str| ConfigError::Parse {
                path: path.to_path_buf(),
                line: index + 1,
                message: message.to_string(),
            };

            if let Some(rest) = line.strip_prefix('[') {
                let name = rest
                    .strip_suffix(']')
                    .ok_or_else(|| parse_error("unterminated group name"))?;
                if name.is_empty() || name.contains('[') || name.contains(']') {
                    return Err(parse_error("invalid group name"));
                }
                current = Some(keyfile.group_index_or_insert(name));
                continue;
            }

            let group = current.ok_or_else(|| parse_error("key outside of any group"))?;
            let (key, value) = line
                .split_once('=')
                .ok_or_else(|| parse_error("expected Key=Value"))?;
            let key = key.trim();
            if key.is_empty() {
                return Err(parse_error("empty key"));
            }

            let value = unescape(value.trim());
            let entries = &mut keyfile.groups[group].entries;
            match entries.iter_mut().find(|(k, _)| k == key) {
                Some(entry) => entry.1 = value,
                None => entries.push((key.to_string(), value)),
            }
        }

        Ok(keyfile)
    }

    fn group_index_or_insert(&mut self, name: &str) -> usize {
        match self.groups.iter().position(|g| g.name == name) {
            Some(index) => index,
            None => {
                self.groups.push(Group {
                    name: name.to_string(),
                    entries: Vec::new(),
                });
                self.groups.len() - 1
            }
        }
    }

    /// The file this key file was loaded from, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Group names in order of first appearance.
    pub fn groups(&self) -> Vec<&str> {
        self.groups.iter().map(|g| g.name.as_str()).collect()
    }

    pub fn has_group(&self, name: &str) -> bool {
        self.groups.iter().any(|g| g.name == name)
    }

    /// String value of `key` in `group`.
    pub fn string(&self, group: &str, key: &str) -> Option<&str> {
        self.groups
            .iter()
            .find(|g| g.name == group)?
            .entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Boolean value of `key` in `group`.
    ///
    /// `Ok(None)` if the key is absent, `Err` with the raw value if it is
    /// not a boolean.
    pub fn boolean(&self, group: &str, key: &str) -> Result<Option<bool>, String> {
        match self.string(group, key).map(str::trim) {
            None => Ok(None),
            Some("true") | Some("1") => Ok(Some(true)),
            Some("false") | Some("0") => Ok(Some(false)),
            Some(other) => Err(other.to_string()),
        }
    }
}

fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('s') => out.push(' '),
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_groups_and_keys() {
        let kf = KeyFile::parse(
            "# comment\n\
             [Desktop Entry]\n\
             Type = Application\n\
             Name[fi]=Kamera\n\
             \n\
             [X-Sailjail]\n\
             Permissions=Camera;Audio\n",
        )
        .unwrap();

        assert_eq!(kf.groups(), vec!["Desktop Entry", "X-Sailjail"]);
        assert_eq!(kf.string("Desktop Entry", "Type"), Some("Application"));
        assert_eq!(kf.string("Desktop Entry", "Name[fi]"), Some("Kamera"));
        assert_eq!(kf.string("X-Sailjail", "Permissions"), Some("Camera;Audio"));
        assert_eq!(kf.string("X-Sailjail", "Missing"), None);
        assert_eq!(kf.string("Missing", "Type"), None);
    }

    #[test]
    fn test_repeated_groups_merge_and_last_key_wins() {
        let kf = KeyFile::parse("[A]\nx=1\n[B]\ny=2\n[A]\nx=3\nz=4\n").unwrap();
        assert_eq!(kf.groups(), vec!["A", "B"]);
        assert_eq!(kf.string("A", "x"), Some("3"));
        assert_eq!(kf.string("A", "z"), Some("4"));
    }

    #[test]
    fn test_escapes() {
        let kf = KeyFile::parse("[A]\nk=a\\sb\\tc\\\\d\n").unwrap();
        assert_eq!(kf.string("A", "k"), Some("a b\tc\\d"));
    }

    #[test]
    fn test_boolean() {
        let kf = KeyFile::parse("[S]\na=true\nb=0\nc=maybe\n").unwrap();
        assert_eq!(kf.boolean("S", "a"), Ok(Some(true)));
        assert_eq!(kf.boolean("S", "b"), Ok(Some(false)));
        assert_eq!(kf.boolean("S", "c"), Err("maybe".to_string()));
        assert_eq!(kf.boolean("S", "d"), Ok(None));
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            KeyFile::parse("x=1\n"),
            Err(ConfigError::Parse { line: 1, .. })
        ));
        assert!(matches!(
            KeyFile::parse("[A]\nnot a pair\n"),
            Err(ConfigError::Parse { line: 2, .. })
        ));
        assert!(KeyFile::parse("[A\n").is_err());
        assert!(KeyFile::parse("#!/bin/sh\necho hello\n").is_err());
    }

    #[test]
    fn test_load_records_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.conf");
        std::fs::write(&path, "[Settings]\nExec=/bin/true\n").unwrap();

        let kf = KeyFile::load(&path).unwrap();
        assert_eq!(kf.path(), Some(path.as_path()));
        assert!(kf.has_group("Settings"));

        let missing = KeyFile::load(&dir.path().join("none"));
        assert!(matches!(missing, Err(ConfigError::Io { .. })));
    }
}
