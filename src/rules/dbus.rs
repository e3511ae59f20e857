//! D-Bus bus name validation.

use once_cell::sync::Lazy;
use regex::Regex;

/// Longest bus name the D-Bus specification allows.
const MAX_NAME_LEN: usize = 255;

static WELL_KNOWN_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_-][A-Za-z0-9_-]*(\.[A-Za-z_-][A-Za-z0-9_-]*)+$")
        .expect("well-known bus name pattern")
});

static UNIQUE_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^:[A-Za-z0-9_-]+(\.[A-Za-z0-9_-]+)+$").expect("unique bus name pattern")
});

/// Check whether `name` is a valid well-known or unique bus name.
pub fn is_dbus_name(name: &str) -> bool {
    if name.is_empty() || name.len() > MAX_NAME_LEN {
        return false;
    }
    if name.starts_with(':') {
        UNIQUE_NAME.is_match(name)
    } else {
        WELL_KNOWN_NAME.is_match(name)
    }
}

/// Split a comma separated list, keeping only valid bus names.
pub fn parse_dbus_names(value: &str) -> Vec<&str> {
    value
        .split(',')
        .map(str::trim)
        .filter(|name| {
            let valid = is_dbus_name(name);
            if !valid && !name.is_empty() {
                tracing::trace!("Ignoring invalid D-Bus name '{}'", name);
            }
            valid
        })
        .collect()
}
