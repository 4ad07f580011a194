//! # Parley Framework
//!
//! Listener registration, first-match dispatch and resumable conversations.
//!
//! This layer provides:
//! - [`EventBus`]: ordered listener chains keyed by [`EventName`](parley_core::EventName)
//! - [`Listener`]: the unit of registration, claiming or declining an event
//! - [`filter`]: predicate combinators over payloads
//! - [`MessageHandler`] and [`EventHandler`]: handler functions behind filters
//! - [`conversation`]: handlers that suspend and resume on the chat's next
//!   message
//!
//! ```text
//! payload ──▶ EventBus::dispatch ──▶ [continuation, handler, handler, ...]
//!                                         │ first `true` wins
//!                                         ▼
//!                              Reply::Converse ──▶ prepend continuation
//! ```

pub mod bus;
pub mod conversation;
pub mod error;
pub mod event_handler;
pub mod filter;
pub mod handler;
pub mod listener;
pub mod message_handler;

pub use bus::EventBus;
pub use conversation::{Continuation, Conversation, Inbox, NextMessage};
pub use error::{DispatchError, DispatchResult, HandlerError, HandlerResult};
pub use event_handler::{
    CallbackQueryHandler, ChosenInlineResultHandler, EventHandler, EventPayload, InlineHandler,
};
pub use filter::Filter;
pub use handler::{BoxFuture, BoxedHandler, Handler, IntoReply, Reply, into_handler};
pub use listener::{BoxedListener, FnListener, Listener, ListenerId, listener_fn, update_observer};
pub use message_handler::MessageHandler;
