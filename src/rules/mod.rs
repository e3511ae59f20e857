//! Rule set data model and algebra.
//!
//! A [`RuleSet`] is built once through a [`RuleSetBuilder`], after which it
//! is never mutated. Narrowing with [`RuleSet::restrict`] always yields a
//! new, independent value.

pub mod dbus;
pub mod profile;

use std::fmt;
use std::path::{Path, PathBuf};

pub use dbus::is_dbus_name;
pub use profile::{resolve_rules, rules_from_keyfile, ProfileOptions, ResolvedProfile};

/// Special capabilities that are granted independently of file access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PermitKind {
    Privileged,
}

impl PermitKind {
    /// Name used for the permit in `Permissions=` lists.
    pub fn name(&self) -> &'static str {
        match self {
            PermitKind::Privileged => "Privileged",
        }
    }

    /// Parse a reserved permit name.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "Privileged" => Some(PermitKind::Privileged),
            _ => None,
        }
    }
}

impl fmt::Display for PermitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Permit {
    pub kind: PermitKind,
    pub required: bool,
}

/// Reference to a profile file to be included by the sandbox tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileRef {
    pub path: PathBuf,
    pub required: bool,
}

/// File or directory access rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathRule {
    pub path: String,
    pub allow: bool,
    pub required: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DBusName {
    pub name: String,
    pub required: bool,
}

/// Names a sandboxed program may own or talk to on one bus.
///
/// Talking to a name implies seeing it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DBusRules {
    own: Vec<DBusName>,
    talk: Vec<DBusName>,
}

impl DBusRules {
    pub fn own(&self) -> &[DBusName] {
        &self.own
    }

    pub fn talk(&self) -> &[DBusName] {
        &self.talk
    }

    pub fn is_empty(&self) -> bool {
        self.own.is_empty() && self.talk.is_empty()
    }

    fn restrict(&self, allowed: &DBusRestriction) -> DBusRules {
        DBusRules {
            own: keep_allowed(&self.own, |n| n.required || allowed.own.contains(&n.name)),
            talk: keep_allowed(&self.talk, |n| {
                n.required || allowed.talk.contains(&n.name)
            }),
        }
    }
}

/// Which bus a D-Bus rule applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bus {
    User,
    System,
}

impl Bus {
    pub fn name(&self) -> &'static str {
        match self {
            Bus::User => "user",
            Bus::System => "system",
        }
    }
}

/// The complete computed policy for one launch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleSet {
    permits: Vec<Permit>,
    profiles: Vec<ProfileRef>,
    paths: Vec<PathRule>,
    dbus_user: DBusRules,
    dbus_system: DBusRules,
    organization_name: Option<String>,
    application_name: Option<String>,
}

impl RuleSet {
    pub fn builder() -> RuleSetBuilder {
        RuleSetBuilder::default()
    }

    pub fn permits(&self) -> &[Permit] {
        &self.permits
    }

    pub fn profiles(&self) -> &[ProfileRef] {
        &self.profiles
    }

    pub fn paths(&self) -> &[PathRule] {
        &self.paths
    }

    pub fn dbus_user(&self) -> &DBusRules {
        &self.dbus_user
    }

    pub fn dbus_system(&self) -> &DBusRules {
        &self.dbus_system
    }

    pub fn dbus(&self, bus: Bus) -> &DBusRules {
        match bus {
            Bus::User => &self.dbus_user,
            Bus::System => &self.dbus_system,
        }
    }

    pub fn organization_name(&self) -> Option<&str> {
        self.organization_name.as_deref()
    }

    pub fn application_name(&self) -> Option<&str> {
        self.application_name.as_deref()
    }

    pub fn has_permit(&self, kind: PermitKind) -> bool {
        self.permits.iter().any(|p| p.kind == kind)
    }

    /// Only leaves required items and the optional ones named in `allowed`.
    ///
    /// Disallow rules are always kept.
    pub fn restrict(&self, allowed: &Restriction) -> RuleSet {
        RuleSet {
            permits: keep_allowed(&self.permits, |p| {
                p.required || allowed.permits.contains(&p.kind)
            }),
            profiles: keep_allowed(&self.profiles, |p| {
                p.required || allowed.profiles.contains(&p.path)
            }),
            paths: keep_allowed(&self.paths, |p| {
                p.required || !p.allow || allowed.paths.contains(&p.path)
            }),
            dbus_user: self.dbus_user.restrict(&allowed.dbus_user),
            dbus_system: self.dbus_system.restrict(&allowed.dbus_system),
            organization_name: self.organization_name.clone(),
            application_name: self.application_name.clone(),
        }
    }
}

fn keep_allowed<T: Clone>(items: &[T], keep: impl Fn(&T) -> bool) -> Vec<T> {
    items.iter().filter(|item| keep(*item)).cloned().collect()
}

/// Optional D-Bus names to keep for one bus.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DBusRestriction {
    pub own: Vec<String>,
    pub talk: Vec<String>,
}

/// Optional items to keep when restricting a rule set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Restriction {
    pub permits: Vec<PermitKind>,
    pub profiles: Vec<PathBuf>,
    pub paths: Vec<String>,
    pub dbus_user: DBusRestriction,
    pub dbus_system: DBusRestriction,
}

/// Entries that are unique by key within their list.
trait Keyed {
    fn same_key(&self, other: &Self) -> bool;
    fn escalate(&mut self, other: Self);
    fn describe(&self) -> String;
}

impl Keyed for Permit {
    fn same_key(&self, other: &Self) -> bool {
        self.kind == other.kind
    }
    fn escalate(&mut self, other: Self) {
        self.required |= other.required;
    }
    fn describe(&self) -> String {
        format!("Permission {}", self.kind)
    }
}

impl Keyed for ProfileRef {
    fn same_key(&self, other: &Self) -> bool {
        self.path == other.path
    }
    fn escalate(&mut self, other: Self) {
        self.required |= other.required;
    }
    fn describe(&self) -> String {
        format!("Profile {}", self.path.display())
    }
}

impl Keyed for PathRule {
    fn same_key(&self, other: &Self) -> bool {
        self.path == other.path
    }
    // The later allow/disallow decision wins
    fn escalate(&mut self, other: Self) {
        self.required |= other.required;
        self.allow = other.allow;
    }
    fn describe(&self) -> String {
        format!("Path {}", self.path)
    }
}

impl Keyed for DBusName {
    fn same_key(&self, other: &Self) -> bool {
        self.name == other.name
    }
    fn escalate(&mut self, other: Self) {
        self.required |= other.required;
    }
    fn describe(&self) -> String {
        format!("D-Bus name {}", self.name)
    }
}

fn merge<T: Keyed>(list: &mut Vec<T>, entry: T) {
    match list.iter_mut().find(|e| e.same_key(&entry)) {
        Some(prev) => {
            tracing::warn!("{} is specified more than once", entry.describe());
            prev.escalate(entry);
        }
        None => list.push(entry),
    }
}

fn optional_suffix(required: bool) -> &'static str {
    if required {
        ""
    } else {
        " (optional)"
    }
}

/// Accumulates rules, merging duplicates.
///
/// Adding an entry whose key is already present keeps the single existing
/// entry in place and makes it required if either occurrence was.
#[derive(Debug, Clone, Default)]
pub struct RuleSetBuilder {
    rules: RuleSet,
}

impl RuleSetBuilder {
    pub fn add_permit(&mut self, kind: PermitKind, required: bool) -> &mut Self {
        tracing::debug!("Adding permission {}{}", kind, optional_suffix(required));
        merge(&mut self.rules.permits, Permit { kind, required });
        self
    }

    pub fn add_profile(&mut self, path: impl Into<PathBuf>, required: bool) -> &mut Self {
        let path = path.into();
        tracing::debug!(
            "Adding profile {}{}",
            path.display(),
            optional_suffix(required)
        );
        merge(&mut self.rules.profiles, ProfileRef { path, required });
        self
    }

    pub fn add_path(&mut self, path: impl Into<String>, allow: bool, required: bool) -> &mut Self {
        let path = path.into();
        tracing::debug!(
            "{} path {}{}",
            if allow { "Allowing" } else { "Disallowing" },
            path,
            optional_suffix(required)
        );
        merge(
            &mut self.rules.paths,
            PathRule {
                path,
                allow,
                required,
            },
        );
        self
    }

    pub fn add_dbus_own(&mut self, bus: Bus, name: impl Into<String>, required: bool) -> &mut Self {
        let name = name.into();
        tracing::debug!("Allowing dbus-{}.own {}", bus.name(), name);
        merge(&mut self.dbus_mut(bus).own, DBusName { name, required });
        self
    }

    pub fn add_dbus_talk(
        &mut self,
        bus: Bus,
        name: impl Into<String>,
        required: bool,
    ) -> &mut Self {
        let name = name.into();
        tracing::debug!("Allowing dbus-{}.talk {}", bus.name(), name);
        merge(&mut self.dbus_mut(bus).talk, DBusName { name, required });
        self
    }

    pub fn set_names(
        &mut self,
        organization: Option<String>,
        application: Option<String>,
    ) -> &mut Self {
        self.rules.organization_name = organization;
        self.rules.application_name = application;
        self
    }

    pub fn has_profile(&self, path: &Path) -> bool {
        self.rules.profiles.iter().any(|p| p.path == path)
    }

    fn dbus_mut(&mut self, bus: Bus) -> &mut DBusRules {
        match bus {
            Bus::User => &mut self.rules.dbus_user,
            Bus::System => &mut self.rules.dbus_system,
        }
    }

    pub fn build(self) -> RuleSet {
        self.rules
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RuleSet {
        let mut b = RuleSet::builder();
        b.add_permit(PermitKind::Privileged, false)
            .add_profile("/perm/Base.profile", true)
            .add_profile("/perm/Camera.profile", false)
            .add_profile("/perm/Audio.profile", false)
            .add_path("/usr/share/foo", true, false)
            .add_path("/home/user/Pictures", true, true)
            .add_path("/home/user/secret", false, false)
            .add_dbus_own(Bus::User, "org.foo.Bar", false)
            .add_dbus_talk(Bus::User, "org.freedesktop.Notifications", false)
            .add_dbus_talk(Bus::System, "net.connman", true)
            .set_names(Some("org.foo".into()), Some("bar".into()));
        b.build()
    }

    #[test]
    fn test_permit_names() {
        assert_eq!(PermitKind::parse("Privileged"), Some(PermitKind::Privileged));
        assert_eq!(PermitKind::parse("privileged"), None);
        assert_eq!(PermitKind::Privileged.to_string(), "Privileged");
    }

    #[test]
    fn test_merge_escalates_required() {
        // Every order of the same key ends with one entry, required if any was
        let orders: [&[bool]; 4] = [
            &[false, true],
            &[true, false],
            &[false, false],
            &[true, true, false],
        ];
        for order in orders {
            let mut b = RuleSet::builder();
            for &required in order {
                b.add_path("/x", true, required)
                    .add_profile("/p", required)
                    .add_permit(PermitKind::Privileged, required)
                    .add_dbus_own(Bus::User, "a.b", required);
            }
            let rules = b.build();
            let expected = order.iter().any(|&r| r);

            assert_eq!(rules.paths().len(), 1);
            assert_eq!(rules.paths()[0].required, expected);
            assert_eq!(rules.profiles().len(), 1);
            assert_eq!(rules.profiles()[0].required, expected);
            assert_eq!(rules.permits().len(), 1);
            assert_eq!(rules.permits()[0].required, expected);
            assert_eq!(rules.dbus_user().own().len(), 1);
            assert_eq!(rules.dbus_user().own()[0].required, expected);
        }
    }

    #[test]
    fn test_merge_keeps_position() {
        let mut b = RuleSet::builder();
        b.add_profile("/base", true)
            .add_profile("/a", false)
            .add_profile("/base", false);
        let rules = b.build();
        let paths: Vec<_> = rules.profiles().iter().map(|p| p.path.clone()).collect();
        assert_eq!(paths, vec![PathBuf::from("/base"), PathBuf::from("/a")]);
        assert!(rules.profiles()[0].required);
    }

    #[test]
    fn test_restrict_with_nothing_allowed() {
        let rules = sample();
        let restricted = rules.restrict(&Restriction::default());

        assert!(restricted.permits().is_empty());
        let profiles: Vec<_> = restricted.profiles().iter().map(|p| p.path.clone()).collect();
        assert_eq!(profiles, vec![PathBuf::from("/perm/Base.profile")]);
        let paths: Vec<_> = restricted.paths().iter().map(|p| p.path.as_str()).collect();
        assert_eq!(paths, vec!["/home/user/Pictures", "/home/user/secret"]);
        assert!(restricted.dbus_user().is_empty());
        assert_eq!(restricted.dbus_system().talk().len(), 1);
        assert_eq!(restricted.organization_name(), Some("org.foo"));
        assert_eq!(restricted.application_name(), Some("bar"));
    }

    #[test]
    fn test_restrict_keeps_allowed_optionals() {
        let rules = sample();
        let allowed = Restriction {
            permits: vec![PermitKind::Privileged],
            profiles: vec![PathBuf::from("/perm/Camera.profile")],
            paths: vec!["/usr/share/foo".into()],
            dbus_user: DBusRestriction {
                own: vec![],
                talk: vec!["org.freedesktop.Notifications".into()],
            },
            dbus_system: DBusRestriction::default(),
        };
        let restricted = rules.restrict(&allowed);

        assert!(restricted.has_permit(PermitKind::Privileged));
        assert_eq!(restricted.profiles().len(), 2);
        assert_eq!(restricted.profiles()[1].path, PathBuf::from("/perm/Camera.profile"));
        assert_eq!(restricted.paths().len(), 3);
        assert!(restricted.dbus_user().own().is_empty());
        assert_eq!(restricted.dbus_user().talk().len(), 1);
        // own and talk lists are matched independently
        let own_only = rules.restrict(&Restriction {
            dbus_user: DBusRestriction {
                own: vec!["org.freedesktop.Notifications".into()],
                talk: vec![],
            },
            ..Restriction::default()
        });
        assert!(own_only.dbus_user().talk().is_empty());
    }

    #[test]
    fn test_restrict_is_idempotent() {
        let rules = sample();
        let allowed = Restriction {
            profiles: vec![PathBuf::from("/perm/Audio.profile")],
            paths: vec!["/nonexistent".into()],
            ..Restriction::default()
        };
        let once = rules.restrict(&allowed);
        let twice = once.restrict(&allowed);
        assert_eq!(once, twice);
        // the source is left untouched
        assert_eq!(rules, sample());
    }

    #[test]
    fn test_restrict_never_drops_required_or_disallow() {
        let rules = sample();
        let restricted = rules.restrict(&Restriction::default());
        for p in rules.paths().iter().filter(|p| p.required || !p.allow) {
            assert!(restricted.paths().contains(p));
        }
        for p in rules.profiles().iter().filter(|p| p.required) {
            assert!(restricted.profiles().contains(p));
        }
    }
}
