//! Predicate combinators.
//!
//! A [`Filter`] decides whether a listener is interested in a payload. The
//! constructors here cover the usual message checks; anything else can be
//! written as a plain closure and wrapped with [`filter`].
//!
//! ```rust,ignore
//! use parley_framework::filter;
//!
//! let start = filter::has_commands(["start", "help"]);
//! let photos = filter::has_content_types([ContentType::Photo]);
//! ```

use std::collections::HashSet;
use std::sync::Arc;

use regex::Regex;

use parley_core::command::extract_command;
use parley_core::{ChatId, ContentType, Message, Payload};

/// A type-erased predicate over a payload.
pub type Filter = Arc<dyn Fn(Payload<'_>) -> bool + Send + Sync>;

/// Wraps a closure into a [`Filter`].
pub fn filter<F>(f: F) -> Filter
where
    F: Fn(Payload<'_>) -> bool + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Accepts payloads belonging to the given chat.
///
/// Payloads without a chat never match.
pub fn same_chat(chat_id: ChatId) -> Filter {
    filter(move |payload| payload.chat_id() == Some(chat_id))
}

/// Accepts messages whose content type is one of `types`.
pub fn has_content_types(types: impl IntoIterator<Item = ContentType>) -> Filter {
    let types: HashSet<ContentType> = types.into_iter().collect();
    filter(move |payload| {
        payload
            .content_type()
            .is_some_and(|content_type| types.contains(&content_type))
    })
}

/// Accepts text messages whose command is one of `commands`.
///
/// Commands are given without the leading `/` and compared case-sensitively.
/// Non-text messages never match.
pub fn has_commands<S>(commands: impl IntoIterator<Item = S>) -> Filter
where
    S: Into<String>,
{
    let commands: HashSet<String> = commands.into_iter().map(Into::into).collect();
    filter(move |payload| {
        payload
            .text()
            .and_then(extract_command)
            .is_some_and(|command| commands.contains(command))
    })
}

/// Accepts text messages in which `regex` finds a match anywhere.
///
/// Non-text messages never match.
pub fn has_regex(regex: Regex) -> Filter {
    filter(move |payload| payload.text().is_some_and(|text| regex.is_match(text)))
}

/// Accepts messages for which `predicate` returns `true`.
pub fn func<F>(predicate: F) -> Filter
where
    F: Fn(&Message) -> bool + Send + Sync + 'static,
{
    filter(move |payload| payload.as_message().is_some_and(&predicate))
}

/// Accepts payloads that pass every filter, checking them in order.
///
/// Evaluation stops at the first filter that rejects.
pub fn all(filters: impl IntoIterator<Item = Filter>) -> Filter {
    let filters: Vec<Filter> = filters.into_iter().collect();
    filter(move |payload| filters.iter().all(|f| f(payload)))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use parley_core::{Location, MessageKind};

    use super::*;

    fn text(chat_id: i64, text: &str) -> Message {
        Message::text_in(chat_id, text)
    }

    #[test]
    fn test_same_chat() {
        let f = same_chat(ChatId(10));
        assert!(f(Payload::Message(&text(10, "hi"))));
        assert!(!f(Payload::Message(&text(11, "hi"))));
    }

    #[test]
    fn test_has_commands_strips_bot_suffix() {
        let f = has_commands(["start"]);
        assert!(f(Payload::Message(&text(1, "/start@parley_bot now"))));
        assert!(!f(Payload::Message(&text(1, "/Start"))));
        assert!(!f(Payload::Message(&text(1, "start"))));
    }

    #[test]
    fn test_text_filters_reject_non_text() {
        let location = Message::new(
            1,
            MessageKind::Location(Location {
                longitude: 0.0,
                latitude: 0.0,
            }),
        );
        let payload = Payload::Message(&location);

        assert!(!has_commands(["start"])(payload));
        assert!(!has_regex(Regex::new(".*").unwrap())(payload));
        assert!(has_content_types([ContentType::Location])(payload));
    }

    #[test]
    fn test_has_regex_searches_anywhere() {
        let f = has_regex(Regex::new(r"\d{3}").unwrap());
        assert!(f(Payload::Message(&text(1, "order 123 now"))));
        assert!(!f(Payload::Message(&text(1, "order twelve"))));
    }

    #[test]
    fn test_all_short_circuits() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let f = all([
            has_content_types([ContentType::Photo]),
            filter(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                true
            }),
        ]);

        assert!(!f(Payload::Message(&text(1, "not a photo"))));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_func_sees_message() {
        let f = func(|message| message.text().is_some_and(|t| t.len() > 3));
        assert!(f(Payload::Message(&text(1, "long enough"))));
        assert!(!f(Payload::Message(&text(1, "no"))));
    }
}
