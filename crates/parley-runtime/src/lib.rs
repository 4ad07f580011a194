//! Parley Runtime - polling, configuration and logging for Parley bots.
//!
//! This crate provides:
//! - Update sources (`UpdateSource`, `MemorySource`)
//! - The update driver and its failure policies (`UpdateDriver`, `FailurePolicy`)
//! - The polling runtime (`ParleyRuntime`)
//! - Configuration loading and logging setup
//!
//! ```ignore
//! use parley_runtime::{MemorySource, ParleyRuntime};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = ParleyRuntime::builder()
//!         .source(MemorySource::new())
//!         .build()?;
//!
//!     runtime.add_message_handler(MessageHandler::new(greet).commands(["start"]));
//!
//!     // Run until Ctrl+C
//!     runtime.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod driver;
pub mod error;
pub mod logging;
pub mod runtime;
pub mod source;

// Re-exports
pub use config::{ConfigError, ConfigLoader, ConfigResult, ParleyConfig, PollingConfig};
pub use driver::{BatchReport, FailurePolicy, PolicyDecision, UpdateDriver, classify};
pub use error::{RuntimeError, RuntimeResult, SourceError};
pub use logging::{LoggingBuilder, SpanEvents};
pub use runtime::{ParleyRuntime, RuntimeBuilder};
pub use source::{MemorySource, UpdateSource};

// Re-export tracing for use by other crates
pub use tracing;
pub use tracing_subscriber;

/// Prelude module for convenient imports.
///
/// Provides the logging macros along with `Level`.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
