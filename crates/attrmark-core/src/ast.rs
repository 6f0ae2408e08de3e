use crate::attributes::AttrSet;
use crate::span::LineSpan;

pub type InlineSeq = Vec<Inline>;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Document {
    pub blocks: Vec<Block>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Block {
    pub lines: LineSpan,
    /// Heading attributes taken from trailing `{...}` tags.
    pub attrs: Option<AttrSet>,
    /// Paragraph attribute carried over from a trailing `{...}{...}` pair.
    pub p_attr: Option<AttrSet>,
    pub kind: BlockKind,
}

impl Block {
    pub(crate) fn new(lines: LineSpan, kind: BlockKind) -> Self {
        Self {
            lines,
            attrs: None,
            p_attr: None,
            kind,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum BlockKind {
    Paragraph { content: InlineSeq },
    Heading { level: u8, title: InlineSeq },
    CodeBlock(CodeBlock),
    Table(Table),
    List(List),
    BlockQuote { blocks: Vec<Block> },
    ThematicBreak,
    /// Nested content past the nesting limit, kept verbatim.
    Text(String),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CodeBlockKind {
    Fenced,
    Indented,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CodeBlock {
    pub kind: CodeBlockKind,
    /// Rest of the opening fence line, parsed into attributes when rendered.
    pub info: String,
    pub text: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Table {
    pub headers: Vec<InlineSeq>,
    pub aligns: Vec<TableAlign>,
    pub rows: Vec<Vec<InlineSeq>>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TableAlign {
    None,
    Left,
    Center,
    Right,
}

#[derive(Clone, Debug, PartialEq)]
pub struct List {
    pub ordered: bool,
    pub start: Option<u64>,
    pub tight: bool,
    pub items: Vec<ListItem>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ListItem {
    pub blocks: Vec<Block>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Inline {
    Text(String),
    Escape(char),
    CodeSpan(String),
    Emph(InlineSeq),
    Strong(InlineSeq),
    SoftBreak,
    HardBreak,
    Autolink { url: String, email: bool },
    Link(Link),
    Image(Image),
    AttributeTag(AttributeTag),
}

#[derive(Clone, Debug, PartialEq)]
pub enum LinkTarget {
    Direct { url: String, title: Option<String> },
    /// Normalized label, looked up in the registry at render time.
    Reference { key: String },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Link {
    pub children: InlineSeq,
    pub target: LinkTarget,
    pub attrs: Option<AttrSet>,
    /// Source text, rendered when a reference cannot be resolved.
    pub orig: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Image {
    pub alt: String,
    pub target: LinkTarget,
    pub attrs: Option<AttrSet>,
    pub orig: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AttributeTag {
    pub attrs: AttrSet,
    pub paragraph: Option<AttrSet>,
}

impl AttributeTag {
    /// Source text of the tag, used when nothing claims it.
    pub fn raw(&self) -> String {
        match &self.paragraph {
            Some(paragraph) => format!("{{{}}}{{{}}}", self.attrs.raw, paragraph.raw),
            None => format!("{{{}}}", self.attrs.raw),
        }
    }
}
