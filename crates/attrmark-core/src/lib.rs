mod ast;
mod attach;
mod attributes;
mod emit;
mod inline;
mod label;
mod nesting;
mod options;
mod parser;
mod registry;
mod span;

pub use ast::{
    AttributeTag, Block, BlockKind, CodeBlock, CodeBlockKind, Document, Image, Inline, InlineSeq,
    Link, LinkTarget, List, ListItem, Table, TableAlign,
};
pub use attributes::{AttrMatch, AttrSet, AttrToken, match_attributes};
pub use emit::{emit_html, emit_html_sanitized, render_attributes};
pub use label::ESCAPE_CHARACTERS;
pub use options::{DEFAULT_MAXIMUM_NESTING_LEVEL, Options};
pub use parser::{ParseResult, parse, parse_with_options};
pub use registry::{Reference, ReferenceRegistry};
pub use span::{LineSpan, Segment, SegmentKind};

/// Parses and renders in one step.
pub fn markdown_to_html(source: &str, options: &Options) -> String {
    let result = parse_with_options(source, options);
    emit_html(&result.document.blocks, &result.references, options)
}
