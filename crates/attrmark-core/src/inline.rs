use once_cell::sync::Lazy;
use regex::Regex;
use tracing::trace;

use crate::ast::{AttributeTag, Image, Inline, InlineSeq, Link, LinkTarget};
use crate::attributes::match_attributes;
use crate::label::{is_escapable, normalize_link_label, unescape};

static AUTOLINK_URI: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^<([A-Za-z][A-Za-z0-9+.-]{1,31}:[^<>\x00-\x20]*)>").expect("uri autolink pattern")
});

static AUTOLINK_EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^<([A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)*)>",
    )
    .expect("email autolink pattern")
});

type Matcher = fn(&Tokenizer, &str, usize, usize) -> Option<(Inline, usize)>;

/// An inline construct, tried when the scanner reaches one of its marker bytes.
struct InlineRule {
    name: &'static str,
    markers: &'static [u8],
    matcher: Matcher,
}

// Rules sharing a marker are tried in table order.
const INLINE_RULES: &[InlineRule] = &[
    InlineRule {
        name: "escape",
        markers: b"\\",
        matcher: Tokenizer::escape,
    },
    InlineRule {
        name: "attributes",
        markers: b"{",
        matcher: Tokenizer::attributes,
    },
    InlineRule {
        name: "image",
        markers: b"!",
        matcher: Tokenizer::image,
    },
    InlineRule {
        name: "link",
        markers: b"[",
        matcher: Tokenizer::link,
    },
    InlineRule {
        name: "code",
        markers: b"`",
        matcher: Tokenizer::code_span,
    },
    InlineRule {
        name: "strong",
        markers: b"*_",
        matcher: Tokenizer::strong,
    },
    InlineRule {
        name: "emphasis",
        markers: b"*_",
        matcher: Tokenizer::emphasis,
    },
    InlineRule {
        name: "autolink",
        markers: b"<",
        matcher: Tokenizer::autolink,
    },
];

fn is_special(byte: u8) -> bool {
    byte == b'\n' || INLINE_RULES.iter().any(|rule| rule.markers.contains(&byte))
}

/// Turns the text of one block into inline elements. Never fails.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Tokenizer {
    limit: usize,
}

impl Tokenizer {
    pub(crate) fn new(limit: usize) -> Self {
        Self { limit }
    }

    pub(crate) fn tokenize(&self, text: &str) -> InlineSeq {
        self.tokenize_at(text, 0)
    }

    fn tokenize_at(&self, text: &str, depth: usize) -> InlineSeq {
        let bytes = text.as_bytes();
        let mut out = Vec::new();
        let mut buf = String::new();
        let mut pos = 0;

        'scan: while pos < bytes.len() {
            let byte = bytes[pos];
            if byte == b'\n' {
                let spaces = buf.len() - buf.trim_end_matches(' ').len();
                buf.truncate(buf.trim_end_matches([' ', '\t']).len());
                flush_text(&mut buf, &mut out);
                out.push(if spaces >= 2 {
                    Inline::HardBreak
                } else {
                    Inline::SoftBreak
                });
                pos += 1;
                while matches!(bytes.get(pos), Some(b' ' | b'\t')) {
                    pos += 1;
                }
                continue;
            }
            if !is_special(byte) {
                let next = bytes[pos..]
                    .iter()
                    .position(|&b| is_special(b))
                    .map_or(bytes.len(), |offset| pos + offset);
                buf.push_str(&text[pos..next]);
                pos = next;
                continue;
            }
            for rule in INLINE_RULES {
                if !rule.markers.contains(&byte) {
                    continue;
                }
                if let Some((inline, len)) = (rule.matcher)(self, text, pos, depth) {
                    trace!(rule = rule.name, offset = pos, len, "inline matched");
                    match inline {
                        Inline::Text(literal) => buf.push_str(&literal),
                        other => {
                            flush_text(&mut buf, &mut out);
                            out.push(other);
                        }
                    }
                    pos += len.max(1);
                    continue 'scan;
                }
            }
            buf.push(byte as char);
            pos += 1;
        }
        flush_text(&mut buf, &mut out);
        out
    }

    fn nested(&self, inner: &str, depth: usize) -> InlineSeq {
        if depth + 1 >= self.limit {
            trace!(depth, "inline nesting limit reached");
            return vec![Inline::Text(inner.to_string())];
        }
        self.tokenize_at(inner, depth + 1)
    }

    fn escape(&self, text: &str, pos: usize, _depth: usize) -> Option<(Inline, usize)> {
        let next = text[pos + 1..].chars().next()?;
        is_escapable(next).then_some((Inline::Escape(next), 1 + next.len_utf8()))
    }

    fn attributes(&self, text: &str, pos: usize, _depth: usize) -> Option<(Inline, usize)> {
        let matched = match_attributes(&text[pos..])?;
        let tag = AttributeTag {
            attrs: matched.attrs,
            paragraph: matched.paragraph,
        };
        Some((Inline::AttributeTag(tag), matched.len))
    }

    fn link(&self, text: &str, pos: usize, depth: usize) -> Option<(Inline, usize)> {
        let bracketed = bracketed(text, pos)?;
        let link = Link {
            children: self.nested(bracketed.label, depth),
            target: bracketed.target,
            attrs: None,
            orig: text[pos..bracketed.end].to_string(),
        };
        Some((Inline::Link(link), bracketed.end - pos))
    }

    fn image(&self, text: &str, pos: usize, depth: usize) -> Option<(Inline, usize)> {
        if text.as_bytes().get(pos + 1) != Some(&b'[') {
            return None;
        }
        let bracketed = bracketed(text, pos + 1)?;
        let image = Image {
            alt: plain_text(&self.nested(bracketed.label, depth)),
            target: bracketed.target,
            attrs: None,
            orig: text[pos..bracketed.end].to_string(),
        };
        Some((Inline::Image(image), bracketed.end - pos))
    }

    fn code_span(&self, text: &str, pos: usize, _depth: usize) -> Option<(Inline, usize)> {
        let bytes = text.as_bytes();
        let run = run_length(bytes, pos, b'`');
        let mut search = pos + run;
        while search < bytes.len() {
            if bytes[search] != b'`' {
                search += 1;
                continue;
            }
            let close = run_length(bytes, search, b'`');
            if close == run {
                let content = text[pos + run..search].replace('\n', " ");
                let content = strip_code_padding(&content).to_string();
                return Some((Inline::CodeSpan(content), search + close - pos));
            }
            search += close;
        }
        // An unmatched run stays literal as a whole.
        Some((Inline::Text(text[pos..pos + run].to_string()), run))
    }

    fn strong(&self, text: &str, pos: usize, depth: usize) -> Option<(Inline, usize)> {
        let (content, len) = self.delimited(text, pos, depth, 2)?;
        Some((Inline::Strong(content), len))
    }

    fn emphasis(&self, text: &str, pos: usize, depth: usize) -> Option<(Inline, usize)> {
        let (content, len) = self.delimited(text, pos, depth, 1)?;
        Some((Inline::Emph(content), len))
    }

    fn delimited(
        &self,
        text: &str,
        pos: usize,
        depth: usize,
        count: usize,
    ) -> Option<(InlineSeq, usize)> {
        let bytes = text.as_bytes();
        let marker = bytes[pos];
        let run = run_length(bytes, pos, marker);
        if (count == 1 && run != 1) || run < count {
            return None;
        }
        let open_end = pos + count;
        let next = text[open_end..].chars().next()?;
        if next.is_whitespace() {
            return None;
        }
        if marker == b'_' && char_before(text, pos).is_some_and(char::is_alphanumeric) {
            return None;
        }
        let close = find_closer(text, open_end, marker, count)?;
        let content = self.nested(&text[open_end..close], depth);
        Some((content, close + count - pos))
    }

    fn autolink(&self, text: &str, pos: usize, _depth: usize) -> Option<(Inline, usize)> {
        let rest = &text[pos..];
        if let Some(captures) = AUTOLINK_URI.captures(rest) {
            let url = captures.get(1)?.as_str().to_string();
            return Some((Inline::Autolink { url, email: false }, captures.get(0)?.end()));
        }
        let captures = AUTOLINK_EMAIL.captures(rest)?;
        let url = captures.get(1)?.as_str().to_string();
        Some((Inline::Autolink { url, email: true }, captures.get(0)?.end()))
    }
}

fn flush_text(buf: &mut String, out: &mut InlineSeq) {
    if buf.is_empty() {
        return;
    }
    out.push(Inline::Text(std::mem::take(buf)));
}

fn run_length(bytes: &[u8], pos: usize, marker: u8) -> usize {
    bytes[pos..].iter().take_while(|&&b| b == marker).count()
}

fn char_before(text: &str, pos: usize) -> Option<char> {
    text[..pos].chars().next_back()
}

fn strip_code_padding(content: &str) -> &str {
    if content.len() >= 2
        && content.starts_with(' ')
        && content.ends_with(' ')
        && !content.trim().is_empty()
    {
        &content[1..content.len() - 1]
    } else {
        content
    }
}

// Index just past the code span opening at `pos`, or past its backtick run when unmatched.
fn skip_code_span(bytes: &[u8], pos: usize) -> usize {
    let run = run_length(bytes, pos, b'`');
    let mut search = pos + run;
    while search < bytes.len() {
        if bytes[search] == b'`' {
            let close = run_length(bytes, search, b'`');
            if close == run {
                return search + close;
            }
            search += close;
        } else {
            search += 1;
        }
    }
    pos + run
}

fn find_closer(text: &str, from: usize, marker: u8, count: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut i = from;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'`' => i = skip_code_span(bytes, i),
            byte if byte == marker => {
                let run = run_length(bytes, i, marker);
                let candidate = if count == 1 {
                    (run == 1).then_some(i)
                } else {
                    (run >= count).then_some(i + run - count)
                };
                if let Some(close) = candidate
                    && close > from
                    && char_before(text, close).is_some_and(|ch| !ch.is_whitespace())
                    && (marker != b'_'
                        || !text[close + count..]
                            .chars()
                            .next()
                            .is_some_and(char::is_alphanumeric))
                {
                    return Some(close);
                }
                i += run;
            }
            _ => i += 1,
        }
    }
    None
}

fn matching_bracket(bytes: &[u8], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut i = open;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => {
                i += 2;
                continue;
            }
            b'`' => {
                i = skip_code_span(bytes, i);
                continue;
            }
            b'[' => depth += 1,
            b']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

struct Bracketed<'a> {
    label: &'a str,
    target: LinkTarget,
    end: usize,
}

// `[label]` followed by an inline destination, a `[key]`, `[]`, or nothing.
fn bracketed(text: &str, open: usize) -> Option<Bracketed<'_>> {
    let bytes = text.as_bytes();
    let close = matching_bracket(bytes, open)?;
    let label = &text[open + 1..close];
    let after = close + 1;

    if let Some((target, end)) = inline_destination(text, after) {
        return Some(Bracketed { label, target, end });
    }

    if bytes.get(after) == Some(&b'[')
        && let Some(second) = matching_bracket(bytes, after)
    {
        let explicit = &text[after + 1..second];
        let source = if explicit.trim().is_empty() {
            label
        } else {
            explicit
        };
        let key = normalize_link_label(source);
        if key.is_empty() {
            return None;
        }
        return Some(Bracketed {
            label,
            target: LinkTarget::Reference { key },
            end: second + 1,
        });
    }

    let key = normalize_link_label(label);
    if key.is_empty() {
        return None;
    }
    Some(Bracketed {
        label,
        target: LinkTarget::Reference { key },
        end: after,
    })
}

fn skip_whitespace(bytes: &[u8], mut pos: usize) -> usize {
    while bytes.get(pos).is_some_and(|b| b.is_ascii_whitespace()) {
        pos += 1;
    }
    pos
}

// `(url "title")` right after the closing bracket.
fn inline_destination(text: &str, after: usize) -> Option<(LinkTarget, usize)> {
    let bytes = text.as_bytes();
    if bytes.get(after) != Some(&b'(') {
        return None;
    }
    let mut i = skip_whitespace(bytes, after + 1);
    let url = if bytes.get(i) == Some(&b'<') {
        let close = i + 1 + text[i + 1..].find(['>', '\n'])?;
        if bytes[close] != b'>' {
            return None;
        }
        let url = unescape(&text[i + 1..close]);
        i = close + 1;
        url
    } else {
        let start = i;
        let mut parens = 0usize;
        while let Some(&byte) = bytes.get(i) {
            match byte {
                b'\\' if i + 1 < bytes.len() => i += 2,
                b'(' => {
                    parens += 1;
                    i += 1;
                }
                b')' => {
                    if parens == 0 {
                        break;
                    }
                    parens -= 1;
                    i += 1;
                }
                byte if byte.is_ascii_whitespace() => break,
                _ => i += 1,
            }
        }
        unescape(&text[start..i])
    };

    i = skip_whitespace(bytes, i);
    let mut title = None;
    if let Some(&quote) = bytes.get(i)
        && matches!(quote, b'"' | b'\'' | b'(')
    {
        let closing = if quote == b'(' { b')' } else { quote };
        let offset = bytes[i + 1..].iter().position(|&b| b == closing)?;
        title = Some(unescape(&text[i + 1..i + 1 + offset]));
        i = skip_whitespace(bytes, i + 2 + offset);
    }
    if bytes.get(i) != Some(&b')') {
        return None;
    }
    Some((LinkTarget::Direct { url, title }, i + 1))
}

/// Flattens inline elements into the text an `alt` attribute shows.
pub(crate) fn plain_text(inlines: &[Inline]) -> String {
    let mut out = String::new();
    for inline in inlines {
        match inline {
            Inline::Text(text) | Inline::CodeSpan(text) => out.push_str(text),
            Inline::Escape(ch) => out.push(*ch),
            Inline::Emph(children) | Inline::Strong(children) => {
                out.push_str(&plain_text(children));
            }
            Inline::SoftBreak | Inline::HardBreak => out.push(' '),
            Inline::Autolink { url, .. } => out.push_str(url),
            Inline::Link(link) => out.push_str(&plain_text(&link.children)),
            Inline::Image(image) => out.push_str(&image.alt),
            Inline::AttributeTag(tag) => out.push_str(&tag.raw()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::Tokenizer;
    use crate::ast::{Inline, LinkTarget};

    fn tokenize(text: &str) -> Vec<Inline> {
        Tokenizer::new(32).tokenize(text)
    }

    fn text(value: &str) -> Inline {
        Inline::Text(value.to_string())
    }

    #[test]
    fn escapes_only_cover_the_escape_set() {
        assert_eq!(
            tokenize(r"\*a\q"),
            vec![Inline::Escape('*'), text(r"a\q")]
        );
    }

    #[test]
    fn inline_link_with_title() {
        let inlines = tokenize(r#"[Home](/index "Start")"#);
        let [Inline::Link(link)] = inlines.as_slice() else {
            panic!("expected a link, got {inlines:?}");
        };
        assert_eq!(link.children, vec![text("Home")]);
        assert_eq!(
            link.target,
            LinkTarget::Direct {
                url: "/index".to_string(),
                title: Some("Start".to_string())
            }
        );
        assert_eq!(link.orig, r#"[Home](/index "Start")"#);
    }

    #[test]
    fn destinations_keep_balanced_parentheses() {
        let inlines = tokenize("[w](https://en.wikipedia.org/wiki/Rust_(language))");
        let [Inline::Link(link)] = inlines.as_slice() else {
            panic!("expected a link, got {inlines:?}");
        };
        assert_eq!(
            link.target,
            LinkTarget::Direct {
                url: "https://en.wikipedia.org/wiki/Rust_(language)".to_string(),
                title: None
            }
        );
    }

    #[test]
    fn reference_forms_record_normalized_keys() {
        let keys: Vec<_> = tokenize("[a][Full Key] [Collapsed][] [Short]")
            .into_iter()
            .filter_map(|inline| match inline {
                Inline::Link(link) => match link.target {
                    LinkTarget::Reference { key } => Some(key),
                    LinkTarget::Direct { .. } => None,
                },
                _ => None,
            })
            .collect();
        assert_eq!(keys, vec!["full key", "collapsed", "short"]);
    }

    #[test]
    fn image_alt_is_flattened() {
        let inlines = tokenize("![an *odd* pic][label]");
        let [Inline::Image(image)] = inlines.as_slice() else {
            panic!("expected an image, got {inlines:?}");
        };
        assert_eq!(image.alt, "an odd pic");
        assert_eq!(image.orig, "![an *odd* pic][label]");
    }

    #[test]
    fn attribute_tag_after_link() {
        let inlines = tokenize("[Home](/index){.nav}");
        assert!(matches!(inlines[0], Inline::Link(_)));
        let Inline::AttributeTag(tag) = &inlines[1] else {
            panic!("expected an attribute tag, got {inlines:?}");
        };
        assert_eq!(tag.attrs.classes(), vec!["nav"]);
    }

    #[test]
    fn malformed_attribute_is_literal() {
        assert_eq!(tokenize("{not valid"), vec![text("{not valid")]);
    }

    #[test]
    fn code_span_strips_one_space() {
        assert_eq!(
            tokenize("`` a`b ``"),
            vec![Inline::CodeSpan("a`b".to_string())]
        );
        assert_eq!(tokenize("``open"), vec![text("``open")]);
    }

    #[test]
    fn underscore_does_not_split_words() {
        assert_eq!(tokenize("snake_case_name"), vec![text("snake_case_name")]);
        assert_eq!(
            tokenize("_em_ and __strong__"),
            vec![
                Inline::Emph(vec![text("em")]),
                text(" and "),
                Inline::Strong(vec![text("strong")]),
            ]
        );
    }

    #[test]
    fn autolinks_and_literal_angle_brackets() {
        assert_eq!(
            tokenize("<https://example.com> <me@example.com> a < b"),
            vec![
                Inline::Autolink {
                    url: "https://example.com".to_string(),
                    email: false
                },
                text(" "),
                Inline::Autolink {
                    url: "me@example.com".to_string(),
                    email: true
                },
                text(" a < b"),
            ]
        );
    }

    #[test]
    fn line_breaks() {
        assert_eq!(
            tokenize("one  \ntwo\n   three"),
            vec![
                text("one"),
                Inline::HardBreak,
                text("two"),
                Inline::SoftBreak,
                text("three"),
            ]
        );
    }

    #[test]
    fn nesting_limit_keeps_inner_text_literal() {
        assert_eq!(
            Tokenizer::new(1).tokenize("*a `b`*"),
            vec![Inline::Emph(vec![text("a `b`")])]
        );
    }
}
