//! Event names and payloads.
//!
//! Every inbound [`Update`] is routed under exactly one specific
//! [`EventName`] (plus the catch-all [`EventName::Update`]). Listeners receive
//! a [`Payload`], a cheap borrowed view of the envelope that was dispatched.

use std::fmt;
use std::str::FromStr;

use crate::message::{ChatId, ContentType, Message};
use crate::update::{CallbackQuery, ChosenInlineResult, InlineQuery, Update};

// ============================================================================
// Event Name
// ============================================================================

/// Dispatch key for the event bus.
///
/// The set is closed: adapters never invent new names, they only classify
/// updates into one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventName {
    /// Every update, dispatched before the specific event.
    Update,
    /// A new incoming message.
    Message,
    /// A new version of a message that was edited.
    EditedMessage,
    /// An incoming inline query.
    InlineQuery,
    /// An inline result that was chosen by a user.
    ChosenInlineResult,
    /// A callback from an inline keyboard button.
    CallbackQuery,
}

impl EventName {
    /// All event names, in classification order.
    pub const ALL: [EventName; 6] = [
        EventName::Update,
        EventName::Message,
        EventName::EditedMessage,
        EventName::InlineQuery,
        EventName::ChosenInlineResult,
        EventName::CallbackQuery,
    ];

    /// Returns the snake_case name of this event.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Update => "update",
            Self::Message => "message",
            Self::EditedMessage => "edited_message",
            Self::InlineQuery => "inline_query",
            Self::ChosenInlineResult => "chosen_inline_result",
            Self::CallbackQuery => "callback_query",
        }
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        let name = normalized.strip_prefix("on_").unwrap_or(&normalized);
        Self::ALL
            .into_iter()
            .find(|event| event.as_str() == name)
            .ok_or_else(|| format!("unknown event name: {s}"))
    }
}

// ============================================================================
// Payload
// ============================================================================

/// A borrowed view of the envelope being dispatched.
///
/// The bus hands the same payload to every listener in a chain, so it is
/// `Copy` and never owns the data it points to.
#[derive(Debug, Clone, Copy)]
pub enum Payload<'a> {
    /// The complete update.
    Update(&'a Update),
    /// A new message.
    Message(&'a Message),
    /// An edited message.
    EditedMessage(&'a Message),
    /// An inline query.
    InlineQuery(&'a InlineQuery),
    /// A chosen inline result.
    ChosenInlineResult(&'a ChosenInlineResult),
    /// A callback query.
    CallbackQuery(&'a CallbackQuery),
}

impl<'a> Payload<'a> {
    /// Returns the event name this payload is naturally dispatched under.
    pub fn event_name(&self) -> EventName {
        match self {
            Self::Update(_) => EventName::Update,
            Self::Message(_) => EventName::Message,
            Self::EditedMessage(_) => EventName::EditedMessage,
            Self::InlineQuery(_) => EventName::InlineQuery,
            Self::ChosenInlineResult(_) => EventName::ChosenInlineResult,
            Self::CallbackQuery(_) => EventName::CallbackQuery,
        }
    }

    /// Returns the message carried by a message or edited-message payload.
    pub fn as_message(&self) -> Option<&'a Message> {
        match self {
            Self::Message(message) | Self::EditedMessage(message) => Some(message),
            _ => None,
        }
    }

    /// Returns the chat this payload belongs to.
    ///
    /// Inline queries and chosen inline results are not tied to a chat.
    /// A callback query only has one if its originating message is known.
    pub fn chat_id(&self) -> Option<ChatId> {
        match self {
            Self::Update(update) => update.chat_id(),
            Self::Message(message) | Self::EditedMessage(message) => Some(message.chat.id),
            Self::CallbackQuery(query) => query.message.as_ref().map(|m| m.chat.id),
            Self::InlineQuery(_) | Self::ChosenInlineResult(_) => None,
        }
    }

    /// Returns the content type if this payload is a message.
    pub fn content_type(&self) -> Option<ContentType> {
        self.as_message().map(Message::content_type)
    }

    /// Returns the text body if this payload is a text message.
    pub fn text(&self) -> Option<&'a str> {
        self.as_message().and_then(Message::text)
    }
}

impl<'a> From<&'a Update> for Payload<'a> {
    fn from(update: &'a Update) -> Self {
        Self::Update(update)
    }
}

impl<'a> From<&'a Message> for Payload<'a> {
    fn from(message: &'a Message) -> Self {
        Self::Message(message)
    }
}
