//! Message handlers.
//!
//! A [`MessageHandler`] pairs a handler function with optional filters. The
//! filters are checked in a fixed order (content types, commands, regexp,
//! func) no matter in which order the builder methods were called.
//!
//! ```rust,ignore
//! use parley_framework::MessageHandler;
//!
//! let start = MessageHandler::new(greet).commands(["start", "help"]);
//!
//! let orders = MessageHandler::new(track_order)
//!     .regexp(Regex::new(r"#(\d+)")?)
//!     .func(|message| message.chat.chat_type == "private");
//!
//! let photos = MessageHandler::new(archive).content_types([ContentType::Photo]);
//! ```

use std::future::Future;

use async_trait::async_trait;
use regex::Regex;
use tracing::trace;

use parley_core::{ContentType, Message, Payload};

use crate::bus::EventBus;
use crate::conversation::Continuation;
use crate::error::{DispatchError, DispatchResult};
use crate::filter::{self, Filter};
use crate::handler::{BoxedHandler, IntoReply, Reply, into_handler};
use crate::listener::Listener;

/// A listener running a handler function on matching messages.
///
/// Works for both new and edited messages, depending on which chain it is
/// registered on.
pub struct MessageHandler {
    handler: BoxedHandler<Message>,
    name: Option<String>,
    content_types: Option<Filter>,
    commands: Option<Filter>,
    regexp: Option<Filter>,
    func: Option<Filter>,
}

impl MessageHandler {
    /// Creates a handler accepting every message.
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(Message) -> Fut + Send + Sync + 'static,
        Fut: Future + Send + 'static,
        Fut::Output: IntoReply,
    {
        Self {
            handler: into_handler(f),
            name: None,
            content_types: None,
            commands: None,
            regexp: None,
            func: None,
        }
    }

    /// Sets a name for logs and errors.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Restricts the handler to the given content types.
    pub fn content_types(mut self, types: impl IntoIterator<Item = ContentType>) -> Self {
        self.content_types = Some(filter::has_content_types(types));
        self
    }

    /// Restricts the handler to text messages carrying one of `commands`.
    pub fn commands<S>(mut self, commands: impl IntoIterator<Item = S>) -> Self
    where
        S: Into<String>,
    {
        self.commands = Some(filter::has_commands(commands));
        self
    }

    /// Restricts the handler to text messages matched by `regex`.
    pub fn regexp(mut self, regex: Regex) -> Self {
        self.regexp = Some(filter::has_regex(regex));
        self
    }

    /// Restricts the handler to messages accepted by `predicate`.
    pub fn func<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&Message) -> bool + Send + Sync + 'static,
    {
        self.func = Some(filter::func(predicate));
        self
    }

    /// Returns the handler's name.
    pub fn get_name(&self) -> &str {
        self.name.as_deref().unwrap_or("message_handler")
    }

    /// Checks the payload against every configured filter.
    pub fn matches(&self, payload: Payload<'_>) -> bool {
        [
            &self.content_types,
            &self.commands,
            &self.regexp,
            &self.func,
        ]
        .into_iter()
        .flatten()
        .all(|f| f(payload))
    }
}

#[async_trait]
impl Listener for MessageHandler {
    async fn call(&self, bus: &EventBus, payload: Payload<'_>) -> DispatchResult<bool> {
        let Some(message) = payload.as_message() else {
            return Ok(false);
        };
        if !self.matches(payload) {
            trace!(handler = self.get_name(), "Filters rejected message");
            return Ok(false);
        }

        let event = payload.event_name();
        let fail = |source| DispatchError::handler(event, self.get_name(), source);

        // A handler that ran claims the message, whatever it returned.
        let reply = (self.handler)(message.clone()).await.map_err(fail)?;
        if let Reply::Converse(conversation) = reply {
            Continuation::open(bus, message.chat_id(), conversation)
                .await
                .map_err(fail)?;
        }
        Ok(true)
    }

    fn name(&self) -> &str {
        self.get_name()
    }
}

impl std::fmt::Debug for MessageHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageHandler")
            .field("name", &self.get_name())
            .field("content_types", &self.content_types.is_some())
            .field("commands", &self.commands.is_some())
            .field("regexp", &self.regexp.is_some())
            .field("func", &self.func.is_some())
            .finish()
    }
}
