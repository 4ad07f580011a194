//! # Parley
//!
//! Update dispatch and resumable conversations for chat bots.
//!
//! ## Overview
//!
//! Parley routes incoming updates to handlers through an event bus. Each
//! event has an ordered chain of listeners; the first one to claim an event
//! ends its walk. A message handler can turn into a conversation that
//! receives the chat's following messages one at a time, without any state
//! machine of its own.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌─────────────────────────────────────┐
//! │ UpdateSource │────▶│ UpdateDriver │────▶│ EventBus                            │
//! │  (polling)   │     │  (policy)    │     │  message: [conversation:42, /start, │
//! └──────────────┘     └──────────────┘     │            echo]                    │
//!                                           │  inline_query: [...]                │
//!                                           └─────────────────────────────────────┘
//! ```
//!
//! - **Runtime**: fetches updates from a source and tracks the offset
//! - **Driver**: dispatches each update and applies the failure policy
//! - **Bus**: ordered listener chains per event name
//! - **Handlers**: filtered async functions; conversations are prepended
//!   per chat while they wait for input
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use parley::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = ParleyRuntime::builder().source(my_source).build()?;
//!
//!     runtime.add_message_handler(
//!         MessageHandler::new(|_msg: Message| async {
//!             Reply::converse(|mut inbox| async move {
//!                 let name = inbox.next().await;
//!                 println!("Hello, {}", name.text().unwrap_or("stranger"));
//!                 Ok(())
//!             })
//!         })
//!         .commands(["start"]),
//!     );
//!
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config`: TOML configuration files (default)
//! - `yaml-config`: YAML configuration files
//! - `json-log`: JSON log output

pub use parley_core as core;
pub use parley_framework as framework;
pub use parley_runtime as runtime;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use parley::prelude::*;
/// ```
pub mod prelude {
    // Runtime - main entry point
    pub use parley_runtime::{FailurePolicy, MemorySource, ParleyRuntime, UpdateSource};

    // Envelopes
    pub use parley_core::prelude::*;

    // Handlers and conversations
    pub use parley_framework::{
        CallbackQueryHandler, ChosenInlineResultHandler, EventBus, Inbox, InlineHandler,
        Listener, ListenerId, MessageHandler, Reply,
    };

    // Filters
    pub use parley_framework::filter;
}
