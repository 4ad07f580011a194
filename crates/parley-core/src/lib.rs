//! # Parley Core
//!
//! Envelope types shared by every layer of the Parley framework.
//!
//! This crate is deliberately small. It knows nothing about listeners,
//! buses or polling; it only describes what arrives from the outside world:
//!
//! - **Envelopes**: [`Update`] and the payloads it can carry ([`Message`],
//!   [`InlineQuery`], [`ChosenInlineResult`], [`CallbackQuery`])
//! - **Event names**: the closed [`EventName`] set used as dispatch keys
//! - **Payloads**: [`Payload`], a borrowed view of one envelope handed to
//!   listeners
//! - **Commands**: [`command::extract_command`] for `/command@bot` parsing
//!
//! ```text
//! Update ──▶ Payload::Message(&Message) ──▶ EventName::Message
//!        └─▶ Payload::InlineQuery(&..)  ──▶ EventName::InlineQuery
//! ```

pub mod command;
pub mod error;
pub mod event;
pub mod message;
pub mod update;

pub use error::{EnvelopeError, EnvelopeResult};
pub use event::{EventName, Payload};
pub use message::{
    Audio, Chat, ChatId, Contact, ContentType, Document, Location, Message, MessageKind,
    PhotoSize, Sticker, User, Venue, Video, Voice,
};
pub use update::{CallbackQuery, ChosenInlineResult, InlineQuery, Update};

/// Prelude for common imports.
pub mod prelude {
    pub use super::command::extract_command;
    pub use super::event::{EventName, Payload};
    pub use super::message::{Chat, ChatId, ContentType, Message, MessageKind, User};
    pub use super::update::{CallbackQuery, ChosenInlineResult, InlineQuery, Update};
}
