//! Utility modules.

pub mod logging;
pub mod path;
pub mod shell;

pub use logging::{init_logging, LogConfig, LogLevel, LogOutput, SAILJAIL_DEBUG_ENV};
pub use path::{basename, file_stem_with_suffix, os_basename};
pub use shell::join_args;
