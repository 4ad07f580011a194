//! Message envelopes.
//!
//! A [`Message`] always carries exactly one [`MessageKind`]; its
//! [`ContentType`] is derived from that kind and never stored separately.
//!
//! Messages deserialize from the Bot API JSON shape. The content kind is
//! picked from whichever content field is present, checking fields in
//! [`ContentType::ALL`] order.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ============================================================================
// Identifiers
// ============================================================================

/// Unique identifier of a chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatId(pub i64);

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ChatId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// A user or bot account.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct User {
    pub id: i64,
    pub first_name: String,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

impl User {
    /// Creates a user with only the required fields set.
    pub fn new(id: i64, first_name: impl Into<String>) -> Self {
        Self {
            id,
            first_name: first_name.into(),
            last_name: None,
            username: None,
        }
    }
}

/// A chat: private, group, supergroup or channel.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Chat {
    pub id: ChatId,
    #[serde(rename = "type")]
    pub chat_type: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

impl Chat {
    /// Creates a private chat with the given id.
    pub fn private(id: i64) -> Self {
        Self {
            id: ChatId(id),
            chat_type: "private".to_string(),
            title: None,
            username: None,
            first_name: None,
            last_name: None,
        }
    }
}

// ============================================================================
// Content payloads
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Audio {
    pub file_id: String,
    pub duration: u32,
    #[serde(default)]
    pub performer: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub file_size: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Document {
    pub file_id: String,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub file_size: Option<u64>,
}

/// One size of a photo or thumbnail.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PhotoSize {
    pub file_id: String,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub file_size: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Sticker {
    pub file_id: String,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub emoji: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Video {
    pub file_id: String,
    pub width: u32,
    pub height: u32,
    pub duration: u32,
    #[serde(default)]
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Voice {
    pub file_id: String,
    pub duration: u32,
    #[serde(default)]
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Contact {
    pub phone_number: String,
    pub first_name: String,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub user_id: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Location {
    pub longitude: f64,
    pub latitude: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Venue {
    pub location: Location,
    pub title: String,
    pub address: String,
    #[serde(default)]
    pub foursquare_id: Option<String>,
}

// ============================================================================
// Content type
// ============================================================================

/// The content-type tag of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentType {
    Text,
    Audio,
    Document,
    Photo,
    Sticker,
    Video,
    Voice,
    Contact,
    Location,
    Venue,
    NewChatMember,
    LeftChatMember,
    /// A service message without any of the contents above
    /// (title changes, pinned messages, chat migrations, ...).
    Unsupported,
}

impl ContentType {
    /// Every content type that carries content, in detection order.
    pub const ALL: [ContentType; 12] = [
        ContentType::Text,
        ContentType::Audio,
        ContentType::Document,
        ContentType::Photo,
        ContentType::Sticker,
        ContentType::Video,
        ContentType::Voice,
        ContentType::Contact,
        ContentType::Location,
        ContentType::Venue,
        ContentType::NewChatMember,
        ContentType::LeftChatMember,
    ];

    /// Returns the snake_case name, matching the Bot API field name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Audio => "audio",
            Self::Document => "document",
            Self::Photo => "photo",
            Self::Sticker => "sticker",
            Self::Video => "video",
            Self::Voice => "voice",
            Self::Contact => "contact",
            Self::Location => "location",
            Self::Venue => "venue",
            Self::NewChatMember => "new_chat_member",
            Self::LeftChatMember => "left_chat_member",
            Self::Unsupported => "unsupported",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .chain([Self::Unsupported])
            .find(|ct| ct.as_str() == name)
            .ok_or_else(|| format!("unknown content type: {s}"))
    }
}

// ============================================================================
// Message
// ============================================================================

/// The content of a message. Exactly one kind per message.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageKind {
    Text(String),
    Audio(Audio),
    Document(Document),
    Photo(Vec<PhotoSize>),
    Sticker(Sticker),
    Video(Video),
    Voice(Voice),
    Contact(Contact),
    Location(Location),
    Venue(Venue),
    NewChatMember(User),
    LeftChatMember(User),
    Unsupported,
}

impl MessageKind {
    /// Returns the content-type tag of this kind.
    pub fn content_type(&self) -> ContentType {
        match self {
            Self::Text(_) => ContentType::Text,
            Self::Audio(_) => ContentType::Audio,
            Self::Document(_) => ContentType::Document,
            Self::Photo(_) => ContentType::Photo,
            Self::Sticker(_) => ContentType::Sticker,
            Self::Video(_) => ContentType::Video,
            Self::Voice(_) => ContentType::Voice,
            Self::Contact(_) => ContentType::Contact,
            Self::Location(_) => ContentType::Location,
            Self::Venue(_) => ContentType::Venue,
            Self::NewChatMember(_) => ContentType::NewChatMember,
            Self::LeftChatMember(_) => ContentType::LeftChatMember,
            Self::Unsupported => ContentType::Unsupported,
        }
    }
}

/// A chat message.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "RawMessage")]
pub struct Message {
    pub message_id: i64,
    pub from: Option<User>,
    pub date: i64,
    pub chat: Chat,
    pub edit_date: Option<i64>,
    pub caption: Option<String>,
    pub kind: MessageKind,
}

impl Message {
    /// Creates a message in a private chat.
    ///
    /// The message id and date are zero; use the `with_*` methods to set
    /// them when they matter.
    pub fn new(chat_id: i64, kind: MessageKind) -> Self {
        Self {
            message_id: 0,
            from: None,
            date: 0,
            chat: Chat::private(chat_id),
            edit_date: None,
            caption: None,
            kind,
        }
    }

    /// Creates a text message in a private chat.
    pub fn text_in(chat_id: i64, text: impl Into<String>) -> Self {
        Self::new(chat_id, MessageKind::Text(text.into()))
    }

    /// Sets the message id.
    pub fn with_message_id(mut self, message_id: i64) -> Self {
        self.message_id = message_id;
        self
    }

    /// Sets the sender.
    pub fn with_from(mut self, user: User) -> Self {
        self.from = Some(user);
        self
    }

    /// Returns the content-type tag.
    pub fn content_type(&self) -> ContentType {
        self.kind.content_type()
    }

    /// Returns the text body of a text message.
    pub fn text(&self) -> Option<&str> {
        match &self.kind {
            MessageKind::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Returns the id of the chat the message was sent in.
    pub fn chat_id(&self) -> ChatId {
        self.chat.id
    }
}

/// Wire shape of a message, before the content kind is resolved.
#[derive(Deserialize)]
struct RawMessage {
    message_id: i64,
    #[serde(default)]
    from: Option<User>,
    date: i64,
    chat: Chat,
    #[serde(default)]
    edit_date: Option<i64>,
    #[serde(default)]
    caption: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    audio: Option<Audio>,
    #[serde(default)]
    document: Option<Document>,
    #[serde(default)]
    photo: Option<Vec<PhotoSize>>,
    #[serde(default)]
    sticker: Option<Sticker>,
    #[serde(default)]
    video: Option<Video>,
    #[serde(default)]
    voice: Option<Voice>,
    #[serde(default)]
    contact: Option<Contact>,
    #[serde(default)]
    location: Option<Location>,
    #[serde(default)]
    venue: Option<Venue>,
    #[serde(default)]
    new_chat_member: Option<User>,
    #[serde(default)]
    left_chat_member: Option<User>,
}

impl From<RawMessage> for Message {
    fn from(raw: RawMessage) -> Self {
        // Order matches ContentType::ALL.
        let kind = if let Some(text) = raw.text {
            MessageKind::Text(text)
        } else if let Some(audio) = raw.audio {
            MessageKind::Audio(audio)
        } else if let Some(document) = raw.document {
            MessageKind::Document(document)
        } else if let Some(photo) = raw.photo {
            MessageKind::Photo(photo)
        } else if let Some(sticker) = raw.sticker {
            MessageKind::Sticker(sticker)
        } else if let Some(video) = raw.video {
            MessageKind::Video(video)
        } else if let Some(voice) = raw.voice {
            MessageKind::Voice(voice)
        } else if let Some(contact) = raw.contact {
            MessageKind::Contact(contact)
        } else if let Some(location) = raw.location {
            MessageKind::Location(location)
        } else if let Some(venue) = raw.venue {
            MessageKind::Venue(venue)
        } else if let Some(user) = raw.new_chat_member {
            MessageKind::NewChatMember(user)
        } else if let Some(user) = raw.left_chat_member {
            MessageKind::LeftChatMember(user)
        } else {
            MessageKind::Unsupported
        };

        Self {
            message_id: raw.message_id,
            from: raw.from,
            date: raw.date,
            chat: raw.chat,
            edit_date: raw.edit_date,
            caption: raw.caption,
            kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_text_message() {
        let json = r#"{
            "message_id": 5,
            "from": {"id": 9, "first_name": "Ann", "username": "ann"},
            "date": 1700000000,
            "chat": {"id": -100, "type": "group", "title": "Cats"},
            "text": "/start@parley_bot now"
        }"#;

        let message: Message = serde_json::from_str(json).unwrap();

        assert_eq!(message.message_id, 5);
        assert_eq!(message.chat_id(), ChatId(-100));
        assert_eq!(message.chat.chat_type, "group");
        assert_eq!(message.from.as_ref().map(|u| u.id), Some(9));
        assert_eq!(message.content_type(), ContentType::Text);
        assert_eq!(message.text(), Some("/start@parley_bot now"));
    }

    #[test]
    fn test_decode_photo_with_caption() {
        let json = r#"{
            "message_id": 6,
            "date": 1,
            "chat": {"id": 3, "type": "private"},
            "caption": "look",
            "photo": [{"file_id": "a", "width": 90, "height": 60}]
        }"#;

        let message: Message = serde_json::from_str(json).unwrap();

        assert_eq!(message.content_type(), ContentType::Photo);
        assert_eq!(message.caption.as_deref(), Some("look"));
        assert_eq!(message.text(), None);
    }

    #[test]
    fn test_decode_service_message_is_unsupported() {
        let json = r#"{
            "message_id": 7,
            "date": 1,
            "chat": {"id": 3, "type": "group"},
            "new_chat_title": "Dogs"
        }"#;

        let message: Message = serde_json::from_str(json).unwrap();
        assert_eq!(message.content_type(), ContentType::Unsupported);
    }

    #[test]
    fn test_content_type_from_str() {
        assert_eq!("photo".parse::<ContentType>(), Ok(ContentType::Photo));
        assert_eq!(
            "NEW_CHAT_MEMBER".parse::<ContentType>(),
            Ok(ContentType::NewChatMember)
        );
        assert!("hologram".parse::<ContentType>().is_err());
    }
}
