//! Update envelopes.
//!
//! An [`Update`] is the unit delivered by an update source. At most one of
//! its payload fields is populated; the driver classifies the update by the
//! first populated field.

use serde::Deserialize;

use crate::error::EnvelopeResult;
use crate::message::{ChatId, Location, Message, User};

/// An incoming inline query.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InlineQuery {
    pub id: String,
    pub from: User,
    pub query: String,
    #[serde(default)]
    pub offset: String,
    #[serde(default)]
    pub location: Option<Location>,
}

impl InlineQuery {
    pub fn new(id: impl Into<String>, from: User, query: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            from,
            query: query.into(),
            offset: String::new(),
            location: None,
        }
    }
}

/// An inline result that a user picked and sent to a chat partner.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChosenInlineResult {
    pub result_id: String,
    pub from: User,
    pub query: String,
    #[serde(default)]
    pub location: Option<Location>,
    #[serde(default)]
    pub inline_message_id: Option<String>,
}

impl ChosenInlineResult {
    pub fn new(result_id: impl Into<String>, from: User, query: impl Into<String>) -> Self {
        Self {
            result_id: result_id.into(),
            from,
            query: query.into(),
            location: None,
            inline_message_id: None,
        }
    }
}

/// A press on an inline keyboard button.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub inline_message_id: Option<String>,
}

impl CallbackQuery {
    pub fn new(id: impl Into<String>, from: User, data: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            from,
            data: Some(data.into()),
            message: None,
            inline_message_id: None,
        }
    }
}

/// One inbound update.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub edited_message: Option<Message>,
    #[serde(default)]
    pub inline_query: Option<InlineQuery>,
    #[serde(default)]
    pub chosen_inline_result: Option<ChosenInlineResult>,
    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
}

impl Update {
    /// Decodes an update from its JSON representation.
    pub fn from_json(json: &str) -> EnvelopeResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Creates an update carrying a new message.
    pub fn message(update_id: i64, message: Message) -> Self {
        Self {
            update_id,
            message: Some(message),
            ..Default::default()
        }
    }

    /// Creates an update carrying an edited message.
    pub fn edited_message(update_id: i64, message: Message) -> Self {
        Self {
            update_id,
            edited_message: Some(message),
            ..Default::default()
        }
    }

    /// Creates an update carrying an inline query.
    pub fn inline_query(update_id: i64, query: InlineQuery) -> Self {
        Self {
            update_id,
            inline_query: Some(query),
            ..Default::default()
        }
    }

    /// Creates an update carrying a chosen inline result.
    pub fn chosen_inline_result(update_id: i64, result: ChosenInlineResult) -> Self {
        Self {
            update_id,
            chosen_inline_result: Some(result),
            ..Default::default()
        }
    }

    /// Creates an update carrying a callback query.
    pub fn callback_query(update_id: i64, query: CallbackQuery) -> Self {
        Self {
            update_id,
            callback_query: Some(query),
            ..Default::default()
        }
    }

    /// Returns the chat id of whichever chat-bound payload is present.
    pub fn chat_id(&self) -> Option<ChatId> {
        self.message
            .as_ref()
            .or(self.edited_message.as_ref())
            .or_else(|| self.callback_query.as_ref()?.message.as_ref())
            .map(Message::chat_id)
    }
}

impl std::fmt::Display for Update {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Update[update_id={}]", self.update_id)
    }
}
