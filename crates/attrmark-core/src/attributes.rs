use once_cell::sync::Lazy;
use regex::Regex;
use tracing::trace;

/// Inside of one `{...}` group: `#id` / `.class` tokens separated by optional whitespace.
pub(crate) const ATTRIBUTE_TOKENS: &str = r"(?:[#.][A-Za-z0-9_-]+\s*)+";

// The second group only counts when both groups close the text.
static ATTRIBUTE_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"^\{{({ATTRIBUTE_TOKENS})\}}(?:\{{({ATTRIBUTE_TOKENS})\}}\s*$)?"
    ))
    .expect("attribute pattern is valid")
});

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum AttrToken {
    Id(String),
    Class(String),
}

/// Tokens of one attribute group, plus the text they were read from.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct AttrSet {
    pub raw: String,
    pub tokens: Vec<AttrToken>,
}

impl AttrSet {
    /// Reads the inside of a matched group, e.g. `#intro .wide`.
    pub fn parse(raw: &str) -> Self {
        let mut tokens = Vec::new();
        for word in raw.split_whitespace() {
            push_prefixed_tokens(word, &mut tokens);
        }
        Self {
            raw: raw.to_string(),
            tokens,
        }
    }

    /// Reads a fenced-code info string. Braces are ignored and bare words become classes.
    pub fn from_info(info: &str) -> Self {
        let mut tokens = Vec::new();
        let cleaned: String = info
            .chars()
            .map(|ch| if ch == '{' || ch == '}' { ' ' } else { ch })
            .collect();
        for word in cleaned.split_whitespace() {
            if word.starts_with('#') || word.starts_with('.') {
                push_prefixed_tokens(word, &mut tokens);
            } else {
                tokens.push(AttrToken::Class(word.to_string()));
            }
        }
        Self {
            raw: info.to_string(),
            tokens,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// The effective id: the last `#token` wins.
    pub fn id(&self) -> Option<&str> {
        self.tokens.iter().rev().find_map(|token| match token {
            AttrToken::Id(id) => Some(id.as_str()),
            AttrToken::Class(_) => None,
        })
    }

    pub fn classes(&self) -> Vec<&str> {
        self.tokens
            .iter()
            .filter_map(|token| match token {
                AttrToken::Class(class) => Some(class.as_str()),
                AttrToken::Id(_) => None,
            })
            .collect()
    }
}

// `#a.b` splits into `#a` and `.b`.
fn push_prefixed_tokens(word: &str, tokens: &mut Vec<AttrToken>) {
    let mut prefix: Option<char> = None;
    let mut name = String::new();
    for ch in word.chars() {
        if ch == '#' || ch == '.' {
            flush_token(prefix, &mut name, tokens);
            prefix = Some(ch);
        } else {
            name.push(ch);
        }
    }
    flush_token(prefix, &mut name, tokens);
}

fn flush_token(prefix: Option<char>, name: &mut String, tokens: &mut Vec<AttrToken>) {
    if name.is_empty() {
        return;
    }
    let value = std::mem::take(name);
    match prefix {
        Some('#') => tokens.push(AttrToken::Id(value)),
        Some(_) => tokens.push(AttrToken::Class(value)),
        None => {}
    }
}

/// A successful match of one or two attribute groups.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AttrMatch {
    pub attrs: AttrSet,
    /// Second group of a trailing `{...}{...}` pair, meant for the enclosing paragraph.
    pub paragraph: Option<AttrSet>,
    /// Bytes consumed, both groups included.
    pub len: usize,
}

/// Matches attribute groups at the very start of `text`.
pub fn match_attributes(text: &str) -> Option<AttrMatch> {
    let captures = ATTRIBUTE_TAG.captures(text)?;
    let whole = captures.get(0)?;
    let attrs = AttrSet::parse(captures.get(1)?.as_str());
    let paragraph = captures.get(2).map(|group| AttrSet::parse(group.as_str()));
    trace!(
        attrs = %attrs.raw,
        paragraph = ?paragraph.as_ref().map(|set| set.raw.as_str()),
        "attribute group matched"
    );
    Some(AttrMatch {
        attrs,
        paragraph,
        len: whole.end(),
    })
}
