//! Configuration for the Parley runtime.
//!
//! Figment-based loading from defaults, files and `PARLEY_*` environment
//! variables, plus validation of the loaded values.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    LogFormat, LogLevel, LogOutput, LoggingConfig, ParleyConfig, PolicyKind, PollingConfig,
    SpanEventConfig,
};
pub use validation::validate_config;
