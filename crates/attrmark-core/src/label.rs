/// Characters a backslash may escape.
pub const ESCAPE_CHARACTERS: &[char] = &[
    '\\', '`', '*', '_', '{', '}', '[', ']', '(', ')', '#', '+', '-', '.', '!', '<', '>', ':',
    '|',
];

pub(crate) fn is_escapable(ch: char) -> bool {
    ESCAPE_CHARACTERS.contains(&ch)
}

/// Reference keys compare case-insensitively with runs of whitespace folded to one space.
pub(crate) fn normalize_link_label(label: &str) -> String {
    let mut out = String::with_capacity(label.len());
    for word in label.split_whitespace() {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
    }
    out.to_lowercase()
}

/// Drops the backslash in front of escapable characters.
pub(crate) fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\\'
            && let Some(&next) = chars.peek()
            && is_escapable(next)
        {
            out.push(next);
            chars.next();
            continue;
        }
        out.push(ch);
    }
    out
}
