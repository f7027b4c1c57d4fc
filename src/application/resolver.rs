//! Chat locator resolution.
//!
//! Turns a user-supplied link or handle into a [`ChatLocator`]. Pure string
//! work, no network access.

use crate::domain::{AppError, ChatLocator, Result};

/// Offset applied to the numeric segment of private `/c/<n>` links.
pub const PRIVATE_CHAT_OFFSET: i64 = 1_000_000_000_000;

/// Path marker for private supergroup/channel links.
const PRIVATE_MARKER: &str = "/c/";

/// Resolves a locator string.
///
/// Supported shapes:
/// - `https://t.me/c/123456789[/msg]` -> `NumericChatId(-1_000_000_000_000 - 123456789)`
/// - `https://t.me/username?x=y`, `t.me/joinchat/HASH`, `username` -> `Handle`
///
/// # Errors
/// Returns a resolution error for a malformed numeric segment or an empty handle.
pub fn resolve_locator(locator: &str) -> Result<ChatLocator> {
    let locator = locator.trim();

    if let Some((_, rest)) = locator.rsplit_once(PRIVATE_MARKER) {
        let segment = rest
            .split(['/', '?', '#'])
            .next()
            .unwrap_or_default();
        return private_chat_id(locator, segment).map(ChatLocator::NumericChatId);
    }

    let without_query = locator.split(['?', '#']).next().unwrap_or_default();
    let handle = without_query
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .trim_start_matches('@');

    if handle.is_empty() {
        return Err(AppError::resolution(locator, "no chat handle found"));
    }

    Ok(ChatLocator::Handle(handle.to_string()))
}

fn private_chat_id(locator: &str, segment: &str) -> Result<i64> {
    if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AppError::resolution(
            locator,
            format!("private chat segment '{segment}' is not a number"),
        ));
    }

    let n: u64 = segment
        .parse()
        .map_err(|e| AppError::resolution(locator, format!("private chat id: {e}")))?;

    i64::try_from(n)
        .ok()
        .and_then(|n| (-PRIVATE_CHAT_OFFSET).checked_sub(n))
        .ok_or_else(|| AppError::resolution(locator, "private chat id out of range"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_private_supergroup_url() {
        assert_eq!(
            resolve_locator("https://t.me/c/123456789").unwrap(),
            ChatLocator::NumericChatId(-1_000_123_456_789)
        );
    }

    #[test]
    fn test_private_url_with_message_id() {
        assert_eq!(
            resolve_locator("https://t.me/c/987/12345").unwrap(),
            ChatLocator::NumericChatId(-1_000_000_000_987)
        );
    }

    #[test]
    fn test_private_offset_arithmetic() {
        for n in [0_i64, 1, 42, 1_234_567_890, 9_999_999_999] {
            let locator = format!("https://t.me/c/{n}");
            assert_eq!(
                resolve_locator(&locator).unwrap(),
                ChatLocator::NumericChatId(-PRIVATE_CHAT_OFFSET - n)
            );
        }
    }

    #[test]
    fn test_public_group_url() {
        assert_eq!(
            resolve_locator("https://t.me/mygroup").unwrap(),
            ChatLocator::Handle("mygroup".into())
        );
    }

    #[test]
    fn test_joinchat_url() {
        assert_eq!(
            resolve_locator("https://t.me/joinchat/ABCDEFGH").unwrap(),
            ChatLocator::Handle("ABCDEFGH".into())
        );
    }

    #[test]
    fn test_query_is_stripped() {
        assert_eq!(
            resolve_locator("https://t.me/rustlang?start=abc").unwrap(),
            ChatLocator::Handle("rustlang".into())
        );
    }

    #[test]
    fn test_bare_handle() {
        assert_eq!(
            resolve_locator("@rustlang").unwrap(),
            ChatLocator::Handle("rustlang".into())
        );
    }

    #[test]
    fn test_malformed_private_segment() {
        let err = resolve_locator("https://t.me/c/12ab34").unwrap_err();
        assert!(matches!(err, AppError::Resolution { .. }));
        assert!(resolve_locator("https://t.me/c/").is_err());
        assert!(resolve_locator("https://t.me/c/-5").is_err());
    }

    #[test]
    fn test_empty_handle() {
        assert!(resolve_locator("https://t.me/").is_err());
        assert!(resolve_locator("").is_err());
    }
}
