//! Classification of change messages.
//!
//! Gerrit records votes as change messages too. A message becomes a comment
//! only when it has the shape
//!
//! ```text
//! Patch Set <digits>:[ <label><+|-><digits>]
//!
//! <at least one more character on the next line>
//! ```
//!
//! Inline comments are summarized as `(N comments)` in the body, so they
//! count as comments as well.

const UPLOAD_PREFIX: &str = "Uploaded patch set ";
const HEADER_PREFIX: &str = "Patch Set ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind<'a> {
    /// `Uploaded patch set N.`
    PatchSetUploaded,
    /// A well formed header with nothing after it.
    VoteOnly { vote: Option<&'a str> },
    VoteWithBody { vote: &'a str, body: &'a str },
    PlainBody { body: &'a str },
    /// Anything else: merge notices, multi-vote headers, free text.
    Unrecognized,
}

impl MessageKind<'_> {
    pub fn is_comment(&self) -> bool {
        matches!(self, Self::VoteWithBody { .. } | Self::PlainBody { .. })
    }
}

pub fn classify(message: &str) -> MessageKind<'_> {
    if message.starts_with(UPLOAD_PREFIX) {
        return MessageKind::PatchSetUploaded;
    }
    let Some((header, rest)) = split_header(message) else {
        return MessageKind::Unrecognized;
    };
    let Some(vote) = parse_header(header) else {
        return MessageKind::Unrecognized;
    };
    match (vote, body_after_blank_line(rest)) {
        (Some(vote), Some(body)) => MessageKind::VoteWithBody { vote, body },
        (None, Some(body)) => MessageKind::PlainBody { body },
        (vote, None) => MessageKind::VoteOnly { vote },
    }
}

/// Splits at the first newline; a message without one is all header.
fn split_header(message: &str) -> Option<(&str, Option<&str>)> {
    if !message.starts_with(HEADER_PREFIX) {
        return None;
    }
    Some(match message.split_once('\n') {
        Some((header, rest)) => (header, Some(rest)),
        None => (message, None),
    })
}

/// Returns the vote token, if any, for `Patch Set N:` or `Patch Set N: <vote>`.
fn parse_header(header: &str) -> Option<Option<&str>> {
    let rest = header.strip_prefix(HEADER_PREFIX)?;
    let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return None;
    }
    let rest = rest[digits..].strip_prefix(':')?;
    if rest.is_empty() {
        return Some(None);
    }
    let token = rest.strip_prefix(' ')?;
    is_vote_token(token).then_some(Some(token))
}

/// `<label><+|-><digits>` where the label is non-empty and nothing contains a space.
fn is_vote_token(token: &str) -> bool {
    if token.contains(' ') {
        return false;
    }
    let value_len = token
        .bytes()
        .rev()
        .take_while(u8::is_ascii_digit)
        .count();
    if value_len == 0 {
        return false;
    }
    let without_value = &token[..token.len() - value_len];
    match without_value
        .strip_suffix('+')
        .or_else(|| without_value.strip_suffix('-'))
    {
        Some(label) => !label.is_empty(),
        None => false,
    }
}

/// The text after the header must start with a blank line followed by a
/// non-empty line.
fn body_after_blank_line(rest: Option<&str>) -> Option<&str> {
    let body = rest?.strip_prefix('\n')?;
    match body.chars().next() {
        Some(first) if first != '\n' => Some(body),
        _ => None,
    }
}
