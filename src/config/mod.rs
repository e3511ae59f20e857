//! Configuration module.

pub mod keyfile;
pub mod loader;
pub mod schema;

pub use keyfile::KeyFile;
pub use loader::{default_config_path, load_config, load_default_config, parse_config};
pub use schema::LauncherConfig;
