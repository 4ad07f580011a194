//! Bot command extraction.
//!
//! A command is the first whitespace-separated token of a text message when
//! that text starts with `/`. An `@botname` suffix is stripped, so
//! `/start@parley_bot` and `/start` both yield `start`. Matching is
//! case-sensitive.

/// Returns `true` if the text is a bot command.
pub fn is_command(text: &str) -> bool {
    text.starts_with('/')
}

/// Extracts the command name from a text, without the leading `/`.
///
/// Returns `None` if the text is not a command.
///
/// ```
/// use parley_core::command::extract_command;
///
/// assert_eq!(extract_command("/start"), Some("start"));
/// assert_eq!(extract_command("/help@parley_bot me"), Some("help"));
/// assert_eq!(extract_command("hello"), None);
/// ```
pub fn extract_command(text: &str) -> Option<&str> {
    if !is_command(text) {
        return None;
    }

    let token = text.split_whitespace().next().unwrap_or_default();
    let name = token.split('@').next().unwrap_or_default();
    Some(name.strip_prefix('/').unwrap_or(name))
}

/// Returns everything after the command token, trimmed.
///
/// Returns `None` if the text is not a command.
pub fn command_arguments(text: &str) -> Option<&str> {
    if !is_command(text) {
        return None;
    }

    Some(
        text.split_once(char::is_whitespace)
            .map(|(_, rest)| rest.trim())
            .unwrap_or_default(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_command() {
        assert_eq!(extract_command("/start"), Some("start"));
        assert_eq!(extract_command("/start@parley_bot"), Some("start"));
        assert_eq!(extract_command("/order 12 pizzas"), Some("order"));
        assert_eq!(extract_command("/"), Some(""));
    }

    #[test]
    fn test_extract_command_rejects_plain_text() {
        assert_eq!(extract_command("hello /start"), None);
        assert_eq!(extract_command(" /start"), None);
        assert_eq!(extract_command(""), None);
    }

    #[test]
    fn test_extract_command_is_case_sensitive() {
        assert_eq!(extract_command("/Start"), Some("Start"));
    }

    #[test]
    fn test_command_arguments() {
        assert_eq!(command_arguments("/order 12 pizzas "), Some("12 pizzas"));
        assert_eq!(command_arguments("/start"), Some(""));
        assert_eq!(command_arguments("hi there"), None);
    }
}
