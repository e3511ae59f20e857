//! Profile resolution: finds the profile file and section for a program and
//! turns its directives into a [`RuleSet`].

use std::path::{Path, PathBuf};

use crate::config::{KeyFile, LauncherConfig};
use crate::error::ConfigError;
use crate::rules::dbus::{is_dbus_name, parse_dbus_names};
use crate::rules::{Bus, PermitKind, RuleSet, RuleSetBuilder};
use crate::utils::{basename, file_stem_with_suffix};

/// Section used when nothing more specific matches.
pub const DEFAULT_SECTION: &str = "Sailjail";
/// Default section inside `.desktop` files (desktop-file-install wants the X- prefix).
pub const DESKTOP_DEFAULT_SECTION: &str = "X-Sailjail";

const PROFILE_SUFFIX: &str = ".profile";
const PERMISSION_SUFFIX: &str = ".permission";
const DESKTOP_SUFFIX: &str = ".desktop";

/// Always included, first and required.
const BASE_PROFILE: &str = "Base";

const LIST_SEPARATORS: &[char] = &[':', ';', ','];

const DESKTOP_ENTRY_GROUP: &str = "Desktop Entry";
const DESKTOP_ENTRY_TYPE: &str = "Type";
const DESKTOP_TYPE_APPLICATION: &str = "Application";

const KEY_PERMISSIONS: &str = "Permissions";
const KEY_FILE_ACCESS: &str = "FileAccess";
const KEY_DBUS_USER_OWN: &str = "DBusUserOwn";
const KEY_DBUS_USER_TALK: &str = "DBusUserTalk";
const KEY_DBUS_SYSTEM_OWN: &str = "DBusSystemOwn";
const KEY_DBUS_SYSTEM_TALK: &str = "DBusSystemTalk";
const KEY_ORGANIZATION_NAME: &str = "OrganizationName";
const KEY_APPLICATION_NAME: &str = "ApplicationName";

/// User choices that affect profile resolution.
#[derive(Debug, Clone, Default)]
pub struct ProfileOptions {
    /// Explicit profile file (bare name or path).
    pub profile: Option<String>,
    /// Explicit section within the profile.
    pub section: Option<String>,
    /// Forced application name.
    pub app: Option<String>,
    /// Home directory used for per-user application paths.
    pub home: Option<PathBuf>,
}

/// Outcome of profile resolution.
#[derive(Debug, Clone)]
pub struct ResolvedProfile {
    pub rules: RuleSet,
    /// Profile file the rules came from, if there was one.
    pub profile_path: Option<PathBuf>,
    /// Section the rules came from.
    pub section: Option<String>,
}

/// Context shared by the directive parsers of one section.
struct SectionContext<'a> {
    config: &'a LauncherConfig,
    app: Option<&'a str>,
    home: Option<&'a Path>,
}

/// Build the rule set for launching `program`.
pub fn resolve_rules(
    program: &str,
    config: &LauncherConfig,
    opts: &ProfileOptions,
) -> Result<ResolvedProfile, ConfigError> {
    let path = profile_path(program, config, opts)?;

    if opts.profile.is_none() && !path.exists() {
        tracing::debug!("No specific profile found for {}", program);
        let mut builder = RuleSet::builder();
        add_base_profile(&mut builder, config);
        return Ok(ResolvedProfile {
            rules: builder.build(),
            profile_path: None,
            section: None,
        });
    }

    load_profile(&path, program, config, opts).map_err(|e| suggest_desktop_file(e, config, opts))
}

/// Build a rule set from an already parsed key file.
///
/// `section` defaults to `[Sailjail]`. The base profile is included.
pub fn rules_from_keyfile(
    keyfile: &KeyFile,
    section: Option<&str>,
    app: Option<&str>,
    config: &LauncherConfig,
) -> Result<RuleSet, ConfigError> {
    let home = std::env::var_os("HOME").map(PathBuf::from);
    let ctx = SectionContext {
        config,
        app,
        home: home.as_deref(),
    };
    parse_section(keyfile, section.unwrap_or(DEFAULT_SECTION), &ctx)
}

fn profile_path(
    program: &str,
    config: &LauncherConfig,
    opts: &ProfileOptions,
) -> Result<PathBuf, ConfigError> {
    match &opts.profile {
        // A full path is used as is
        Some(profile) if profile.contains('/') => Ok(PathBuf::from(profile)),
        // Otherwise the suffix tells where to look
        Some(profile) if profile.ends_with(PROFILE_SUFFIX) => Ok(config.profile_dir.join(profile)),
        Some(profile) if profile.ends_with(DESKTOP_SUFFIX) => Ok(config.desktop_dir.join(profile)),
        Some(profile) => Err(ConfigError::UnknownProfileType(profile.clone())),
        None => Ok(config
            .profile_dir
            .join(format!("{}{}", basename(program), PROFILE_SUFFIX))),
    }
}

fn load_profile(
    path: &Path,
    program: &str,
    config: &LauncherConfig,
    opts: &ProfileOptions,
) -> Result<ResolvedProfile, ConfigError> {
    let keyfile = KeyFile::load(path).map_err(|e| match e {
        ConfigError::Parse { .. } => {
            // The parser detail only shows up with -v
            tracing::debug!("{}", e);
            ConfigError::NotAProfile {
                path: path.to_path_buf(),
            }
        }
        other => other,
    })?;

    let section = select_section(&keyfile, path, program, opts).ok_or_else(|| {
        ConfigError::NoSection {
            program: program.to_string(),
            path: path.to_path_buf(),
        }
    })?;

    let inferred_app = match opts.app {
        Some(_) => None,
        None => infer_app_name(&keyfile, path),
    };
    let ctx = SectionContext {
        config,
        app: opts.app.as_deref().or(inferred_app.as_deref()),
        home: opts.home.as_deref(),
    };

    tracing::debug!("Parsing [{}] section from {}", section, path.display());
    let rules = parse_section(&keyfile, &section, &ctx)?;

    Ok(ResolvedProfile {
        rules,
        profile_path: Some(path.to_path_buf()),
        section: Some(section),
    })
}

/// Explicit section, then the program basename, then the forced application
/// name, then the default section for the file type.
fn select_section(
    keyfile: &KeyFile,
    path: &Path,
    program: &str,
    opts: &ProfileOptions,
) -> Option<String> {
    if let Some(section) = &opts.section {
        return keyfile.has_group(section).then(|| section.clone());
    }

    let program_name = basename(program);
    if keyfile.has_group(program_name) {
        return Some(program_name.to_string());
    }

    if let Some(app) = opts.app.as_deref().filter(|app| keyfile.has_group(app)) {
        return Some(app.to_string());
    }

    let default_section = if is_desktop_file(path) {
        DESKTOP_DEFAULT_SECTION
    } else {
        DEFAULT_SECTION
    };
    keyfile
        .has_group(default_section)
        .then(|| default_section.to_string())
}

/// A `.desktop` file of `Type=Application` names the application after
/// itself.
fn infer_app_name(keyfile: &KeyFile, path: &Path) -> Option<String> {
    if !is_desktop_file(path) {
        return None;
    }
    if keyfile.string(DESKTOP_ENTRY_GROUP, DESKTOP_ENTRY_TYPE) != Some(DESKTOP_TYPE_APPLICATION) {
        return None;
    }

    let app = file_stem_with_suffix(path.to_str()?, DESKTOP_SUFFIX)?;
    tracing::debug!("Assuming app name {}", app);
    Some(app.to_string())
}

fn is_desktop_file(path: &Path) -> bool {
    path.to_string_lossy().ends_with(DESKTOP_SUFFIX)
}

/// Point at a matching `.desktop` file when the user supplied a `.profile`
/// that could not be used.
fn suggest_desktop_file(
    error: ConfigError,
    config: &LauncherConfig,
    opts: &ProfileOptions,
) -> ConfigError {
    let unusable = match &error {
        ConfigError::Io { source, .. } => source.kind() == std::io::ErrorKind::NotFound,
        ConfigError::NotAProfile { .. } => true,
        _ => false,
    };
    let name = opts
        .profile
        .as_deref()
        .and_then(|profile| file_stem_with_suffix(profile, PROFILE_SUFFIX));

    match name {
        Some(name) if unusable => {
            let desktop = config.desktop_dir.join(format!("{}{}", name, DESKTOP_SUFFIX));
            if desktop.is_file() {
                ConfigError::TryDesktop {
                    message: error.to_string(),
                    desktop,
                }
            } else {
                error
            }
        }
        _ => error,
    }
}

fn parse_section(
    keyfile: &KeyFile,
    section: &str,
    ctx: &SectionContext<'_>,
) -> Result<RuleSet, ConfigError> {
    let mut builder = RuleSet::builder();

    add_base_profile(&mut builder, ctx.config);

    if let Some(value) = keyfile.string(section, KEY_PERMISSIONS) {
        parse_permissions(&mut builder, value, ctx.config);
    }

    if let Some(value) = keyfile.string(section, KEY_FILE_ACCESS) {
        parse_file_access(&mut builder, value);
    }

    if let Some(app) = ctx.app {
        add_app_dirs(&mut builder, app, ctx);
    }

    let dbus_keys = [
        (KEY_DBUS_USER_OWN, Bus::User, true),
        (KEY_DBUS_USER_TALK, Bus::User, false),
        (KEY_DBUS_SYSTEM_OWN, Bus::System, true),
        (KEY_DBUS_SYSTEM_TALK, Bus::System, false),
    ];
    for (key, bus, own) in dbus_keys {
        let Some(value) = keyfile.string(section, key) else {
            continue;
        };
        // Consider all of them as required for now
        for name in parse_dbus_names(value) {
            if own {
                builder.add_dbus_own(bus, name, true);
            } else {
                builder.add_dbus_talk(bus, name, true);
            }
        }
    }

    parse_names(&mut builder, keyfile, section)?;

    Ok(builder.build())
}

fn add_base_profile(builder: &mut RuleSetBuilder, config: &LauncherConfig) {
    match locate_permission(&config.perm_dir, BASE_PROFILE) {
        Some(path) => {
            builder.add_profile(path, true);
        }
        None => tracing::debug!("No base profile in {}", config.perm_dir.display()),
    }
}

/// `Permissions=` entries are permits or names of permission files,
/// optionally prefixed with `!` (required) or `?` (optional).
fn parse_permissions(builder: &mut RuleSetBuilder, value: &str, config: &LauncherConfig) {
    for token in value.split(LIST_SEPARATORS) {
        let token = token.trim();
        let (required, name) = match token.chars().next() {
            Some('?') => (false, &token[1..]),
            Some('!') => (true, &token[1..]),
            _ => (true, token),
        };
        let name = name.trim_start();
        if name.is_empty() {
            continue;
        }

        // A permit may also come with a permission file of the same name
        let permit = PermitKind::parse(name);
        if let Some(kind) = permit {
            builder.add_permit(kind, required);
        }

        match locate_permission(&config.perm_dir, name) {
            Some(path) => {
                builder.add_profile(path, required);
            }
            None if permit.is_none() => tracing::warn!("{}: profile does not exist", name),
            None => {}
        }
    }
}

/// Find a permission file by name in the permissions directory.
///
/// A name with a slash must name a file directly inside that directory.
/// Without a known suffix `.profile` is tried first, then `.permission`.
fn locate_permission(perm_dir: &Path, name: &str) -> Option<PathBuf> {
    let path = if name.contains('/') {
        let path = PathBuf::from(name);
        if path.parent() != Some(perm_dir) {
            tracing::warn!("{}: ignored due to not matching {}", name, perm_dir.display());
            return None;
        }
        path
    } else {
        perm_dir.join(name)
    };

    if name.ends_with(PROFILE_SUFFIX) || name.ends_with(PERMISSION_SUFFIX) {
        return path.exists().then_some(path);
    }

    [PROFILE_SUFFIX, PERMISSION_SUFFIX]
        .iter()
        .map(|suffix| {
            let mut candidate = path.clone().into_os_string();
            candidate.push(suffix);
            PathBuf::from(candidate)
        })
        .find(|candidate| candidate.exists())
}

/// `FileAccess=` entries: `+` allow, `?` optional allow, `!` deny,
/// `-` optional deny. No prefix means allow.
fn parse_file_access(builder: &mut RuleSetBuilder, value: &str) {
    for token in value.split(LIST_SEPARATORS) {
        let token = token.trim();
        let (allow, required, path) = match token.chars().next() {
            Some('+') => (true, true, &token[1..]),
            Some('?') => (true, false, &token[1..]),
            Some('!') => (false, true, &token[1..]),
            Some('-') => (false, false, &token[1..]),
            _ => (true, true, token),
        };
        if !path.is_empty() {
            builder.add_path(path, allow, required);
        }
    }
}

fn add_app_dirs(builder: &mut RuleSetBuilder, app: &str, ctx: &SectionContext<'_>) {
    // APPNAME.profile is pulled in implicitly unless it's already there
    let profile = ctx
        .config
        .perm_dir
        .join(format!("{}{}", app, PROFILE_SUFFIX));
    if profile.exists() && !builder.has_profile(&profile) {
        builder.add_profile(profile, true);
    }

    builder.add_path(
        Path::new("/usr/share").join(app).display().to_string(),
        true,
        false,
    );
    builder.add_path(
        ctx.config
            .desktop_dir
            .join(format!("{}{}", app, DESKTOP_SUFFIX))
            .display()
            .to_string(),
        true,
        false,
    );
    if let Some(home) = ctx.home {
        builder.add_path(
            home.join(".local/share").join(app).display().to_string(),
            true,
            false,
        );
    }
}

/// `OrganizationName=` and `ApplicationName=` derive a bus name and the
/// per-application data directories.
fn parse_names(
    builder: &mut RuleSetBuilder,
    keyfile: &KeyFile,
    section: &str,
) -> Result<(), ConfigError> {
    let org = keyfile.string(section, KEY_ORGANIZATION_NAME);
    let app = keyfile.string(section, KEY_APPLICATION_NAME);

    for (key, value, org_rules) in [
        (KEY_ORGANIZATION_NAME, org, true),
        (KEY_APPLICATION_NAME, app, false),
    ] {
        if let Some(value) = value {
            if !is_valid_name(value, org_rules) {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    value: value.to_string(),
                });
            }
        }
    }

    if let (Some(org), Some(app)) = (org, app) {
        let bus_name = format!("{}.{}", org, app);
        if is_dbus_name(&bus_name) {
            builder.add_dbus_own(Bus::User, bus_name, true);
        }

        // The sandbox tool expands ${HOME}
        for dir in [".cache", ".local/share", ".config"] {
            builder.add_path(format!("${{HOME}}/{}/{}/{}", dir, org, app), true, true);
        }
    }

    builder.set_names(org.map(String::from), app.map(String::from));
    Ok(())
}

/// Starts with a letter, ends with a letter or digit, and only contains
/// alphanumerics and `_`. Organization names may also contain `-` and
/// single dots, and no dot-separated element may begin with a digit.
fn is_valid_name(value: &str, org_rules: bool) -> bool {
    let bytes = value.as_bytes();
    let (Some(first), Some(last)) = (bytes.first(), bytes.last()) else {
        return false;
    };
    if !first.is_ascii_alphabetic() || !last.is_ascii_alphanumeric() {
        return false;
    }

    bytes.windows(2).all(|pair| {
        let (prev, c) = (pair[0], pair[1]);
        match c {
            b'0'..=b'9' => prev != b'.',
            c if c.is_ascii_alphabetic() => true,
            b'_' => true,
            b'-' => org_rules,
            b'.' => org_rules && prev != b'.',
            _ => false,
        }
    })
}
