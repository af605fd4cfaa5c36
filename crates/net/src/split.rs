//! Outgoing message splitting
//!
//! ICB lines are limited to 255 bytes, and the server relays a message with
//! the sender's nick in front of it. Long text is therefore cut into
//! several messages, preferring to cut after whitespace.

/// Budget for a public message before the sender's nick:
/// 255 minus type byte, space after the nick, separator, NUL and slack.
pub const OPEN_MESSAGE_BUDGET: usize = 250;

/// Budget for a private message before the longer of the two nicks:
/// 255 minus `hm`, space after the nick, separators, NUL and slack.
pub const PRIVATE_MESSAGE_BUDGET: usize = 248;

/// How far back from the cut point to look for whitespace
pub const WORD_BOUNDARY_WINDOW: usize = 128;

/// Usable bytes per public message for `nick`
pub fn open_message_limit(nick: &str) -> usize {
    OPEN_MESSAGE_BUDGET.saturating_sub(nick.len())
}

/// Usable bytes per private message. The recipient sees the message with
/// our nick, but the server may render it with the target's, so the longer
/// one counts.
pub fn private_message_limit(nick: &str, target: &str) -> usize {
    PRIVATE_MESSAGE_BUDGET.saturating_sub(nick.len().max(target.len()))
}

/// Split `text` into chunks of at most `limit` bytes.
///
/// When a chunk has to be cut, the cut goes right after the last whitespace
/// byte among the 127 bytes before the limit, which stays on the end of
/// that chunk. Without whitespace there the cut is hard, moved back to a
/// UTF-8 boundary. Empty text yields no chunks.
pub fn split_message(text: &str, limit: usize) -> Vec<&str> {
    let limit = limit.max(1);
    let mut chunks = Vec::new();
    let mut rest = text;

    while !rest.is_empty() {
        if rest.len() <= limit {
            chunks.push(rest);
            break;
        }

        let cut = word_boundary(rest.as_bytes(), limit).unwrap_or_else(|| hard_cut(rest, limit));
        let (chunk, tail) = rest.split_at(cut);
        chunks.push(chunk);
        rest = tail;
    }

    chunks
}

/// Cut offset just past the last whitespace in the window before `limit`
fn word_boundary(bytes: &[u8], limit: usize) -> Option<usize> {
    (1..WORD_BOUNDARY_WINDOW.min(limit))
        .find(|&back| bytes[limit - back].is_ascii_whitespace())
        .map(|back| limit - back + 1)
}

/// Largest char boundary <= `limit`, but never an empty chunk
fn hard_cut(text: &str, limit: usize) -> usize {
    let mut cut = limit;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    if cut == 0 {
        cut = text.chars().next().map_or(text.len(), char::len_utf8);
    }
    cut
}
