//! Path name helpers.

use std::ffi::OsStr;
use std::os::unix::ffi::OsStrExt;

/// Last component of a slash separated name.
///
/// Unlike [`std::path::Path::file_name`] this never fails, so `"/usr/bin/"`
/// yields an empty string and a name without slashes is returned as is.
pub fn basename(name: &str) -> &str {
    match name.rfind('/') {
        Some(pos) => &name[pos + 1..],
        None => name,
    }
}

/// [`basename`] for names that need not be UTF-8.
pub fn os_basename(name: &OsStr) -> &OsStr {
    let bytes = name.as_bytes();
    match bytes.iter().rposition(|&b| b == b'/') {
        Some(pos) => OsStr::from_bytes(&bytes[pos + 1..]),
        None => name,
    }
}

/// Basename of `name` with `suffix` removed, if it has that suffix.
pub fn file_stem_with_suffix<'a>(name: &'a str, suffix: &str) -> Option<&'a str> {
    basename(name)
        .strip_suffix(suffix)
        .filter(|stem| !stem.is_empty())
}
