use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tracing::{debug, trace};

use crate::ast::{
    Block, BlockKind, CodeBlock, CodeBlockKind, Document, Inline, InlineSeq, List, ListItem,
    Table, TableAlign,
};
use crate::attach::attach_attributes;
use crate::attributes::{ATTRIBUTE_TOKENS, AttrSet};
use crate::inline::Tokenizer;
use crate::label::unescape;
use crate::nesting::NestingDepth;
use crate::options::Options;
use crate::registry::{Reference, ReferenceRegistry};
use crate::span::{LineSpan, Segment, SegmentKind};

static REFERENCE_DEFINITION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        concat!(
            r"^ {{0,3}}\[(?P<label>(?:[^\]\\]|\\.)+)\]:[ \t]*",
            r"(?:<(?P<durl>[^<>]*)>|(?P<url>\S+?))",
            r#"(?:[ \t]+(?:"(?P<dq>[^"]*)"|'(?P<sq>[^']*)'|\((?P<pq>[^)]*)\)))?[ \t]*"#,
            r"(?:\{{(?P<attrs>{tokens})\}}(?:\{{(?P<para>{tokens})\}})?)?[ \t]*$",
        ),
        tokens = ATTRIBUTE_TOKENS
    ))
    .expect("reference definition pattern is valid")
});

static TITLE_CONTINUATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^[ \t]+(?:"(?P<dq>[^"]*)"|'(?P<sq>[^']*)'|\((?P<pq>[^)]*)\))[ \t]*$"#)
        .expect("title continuation pattern is valid")
});

pub struct ParseResult {
    pub document: Document,
    pub references: ReferenceRegistry,
    /// Top-level segmentation; the ranges cover every input line exactly once.
    pub segments: Vec<Segment>,
}

pub fn parse(source: &str) -> ParseResult {
    parse_with_options(source, &Options::default())
}

pub fn parse_with_options(source: &str, options: &Options) -> ParseResult {
    let lines = split_lines(source);
    let mut parser = Parser::new(*options);
    let (mut blocks, segments) = parser.parse_blocks(&lines);
    attach_attributes(&mut blocks);
    ParseResult {
        document: Document { blocks },
        references: parser.references,
        segments,
    }
}

struct Parser {
    options: Options,
    tokenizer: Tokenizer,
    references: ReferenceRegistry,
    depth: NestingDepth,
}

#[derive(Clone, Debug)]
struct Line {
    /// Index of the source line this text came from.
    index: usize,
    text: String,
}

/// What a block consumer took from the line array.
struct Consumed {
    block: Option<Block>,
    /// First line not consumed.
    next: usize,
    /// Paragraph attribute handed to the next paragraph of this container.
    pending: Option<AttrSet>,
}

impl Consumed {
    fn block(block: Block, next: usize) -> Self {
        Self {
            block: Some(block),
            next,
            pending: None,
        }
    }
}

struct BlockRule {
    name: &'static str,
    detect: fn(&[Line], usize) -> bool,
    consume: fn(&mut Parser, &[Line], usize) -> Consumed,
}

// First detector that accepts a line wins.
const BLOCK_RULES: &[BlockRule] = &[
    BlockRule {
        name: "reference",
        detect: detect_reference,
        consume: Parser::consume_reference,
    },
    BlockRule {
        name: "fenced-code",
        detect: detect_fenced_code,
        consume: Parser::consume_fenced_code,
    },
    BlockRule {
        name: "indented-code",
        detect: detect_indented_code,
        consume: Parser::consume_indented_code,
    },
    BlockRule {
        name: "heading",
        detect: detect_heading,
        consume: Parser::consume_heading,
    },
    BlockRule {
        name: "thematic-break",
        detect: detect_thematic_break,
        consume: Parser::consume_thematic_break,
    },
    BlockRule {
        name: "quote",
        detect: detect_quote,
        consume: Parser::consume_quote,
    },
    BlockRule {
        name: "table",
        detect: is_table_start,
        consume: Parser::consume_table,
    },
    BlockRule {
        name: "list",
        detect: detect_list,
        consume: Parser::consume_list,
    },
];

const PARAGRAPH_RULE: BlockRule = BlockRule {
    name: "paragraph",
    detect: |_, _| true,
    consume: Parser::consume_paragraph,
};

impl Parser {
    fn new(options: Options) -> Self {
        Self {
            options,
            tokenizer: Tokenizer::new(options.maximum_nesting_level),
            references: ReferenceRegistry::new(),
            depth: NestingDepth::default(),
        }
    }

    fn parse_blocks(&mut self, lines: &[Line]) -> (Vec<Block>, Vec<Segment>) {
        let mut blocks = Vec::new();
        let mut segments = Vec::new();
        // Paragraph attributes are scoped to the current container only.
        let mut pending: Option<AttrSet> = None;
        let mut i = 0;

        while i < lines.len() {
            if is_blank(&lines[i].text) {
                let start = i;
                while i < lines.len() && is_blank(&lines[i].text) {
                    i += 1;
                }
                segments.push(segment(lines, start, i, SegmentKind::Blank));
                continue;
            }

            let rule = BLOCK_RULES
                .iter()
                .find(|rule| (rule.detect)(lines, i))
                .unwrap_or(&PARAGRAPH_RULE);
            trace!(rule = rule.name, line = lines[i].index, "block detected");
            let consumed = (rule.consume)(self, lines, i);
            let next = consumed.next.clamp(i + 1, lines.len());

            if let Some(attr) = consumed.pending
                && let Some(previous) = pending.replace(attr)
            {
                debug!(attr = %previous.raw, "paragraph attribute replaced before use");
            }
            let kind = if consumed.block.is_some() {
                SegmentKind::Block
            } else {
                SegmentKind::Definition
            };
            if let Some(mut block) = consumed.block {
                // Whatever block comes next uses up the pending attribute; only paragraphs show it.
                if let Some(attr) = pending.take() {
                    debug!(attr = %attr.raw, "paragraph attribute attached");
                    block.p_attr = Some(attr);
                }
                blocks.push(block);
            }
            segments.push(segment(lines, i, next, kind));
            i = next;
        }

        if let Some(attr) = pending {
            debug!(attr = %attr.raw, "paragraph attribute has no paragraph to attach to");
        }
        (blocks, segments)
    }

    /// Parses container content one level deeper, or keeps it as text past the limit.
    fn parse_nested(&mut self, lines: &[Line]) -> Vec<Block> {
        let limit = self.options.maximum_nesting_level;
        let Some(_guard) = self.depth.enter(limit) else {
            debug!(limit, "nesting limit reached, keeping content as text");
            let text = lines
                .iter()
                .map(|line| line.text.as_str())
                .collect::<Vec<_>>()
                .join("\n");
            return vec![Block::new(
                line_span(lines, 0, lines.len()),
                BlockKind::Text(text),
            )];
        };
        trace!(depth = self.depth.current(), "entering container");
        self.parse_blocks(lines).0
    }

    fn consume_reference(&mut self, lines: &[Line], start: usize) -> Consumed {
        let mut i = start;
        let mut pending = None;
        while i < lines.len()
            && let Some(captures) = REFERENCE_DEFINITION.captures(&lines[i].text)
        {
            i += 1;
            let mut title = captured_title(&captures);
            if title.is_none()
                && let Some(line) = lines.get(i)
                && let Some(continuation) = TITLE_CONTINUATION.captures(&line.text)
            {
                title = captured_title(&continuation);
                i += 1;
            }
            let label = captures.name("label").map_or("", |m| m.as_str());
            let url = captures
                .name("durl")
                .or_else(|| captures.name("url"))
                .map_or(String::new(), |m| unescape(m.as_str()));
            let attrs = captures.name("attrs").map(|m| AttrSet::parse(m.as_str()));
            if let Some(para) = captures.name("para") {
                pending = Some(AttrSet::parse(para.as_str()));
            }
            self.references.define(label, Reference { url, title, attrs });
        }
        Consumed {
            block: None,
            next: i,
            pending,
        }
    }

    fn consume_fenced_code(&mut self, lines: &[Line], start: usize) -> Consumed {
        let Some((indent, fence, info)) = parse_fence_open(&lines[start].text) else {
            return self.consume_paragraph(lines, start);
        };
        let fence = fence.to_string();
        let info = info.to_string();
        let mut body = Vec::new();
        let mut i = start + 1;
        let mut closed = false;
        while i < lines.len() {
            let text = &lines[i].text;
            i += 1;
            if text.trim() == fence {
                closed = true;
                break;
            }
            body.push(strip_leading_spaces(text, indent));
        }
        if !closed {
            debug!(line = lines[start].index, "unterminated fence runs to end of input");
        }
        let mut text = body.join("\n");
        text.push('\n');
        let block = Block::new(
            line_span(lines, start, i),
            BlockKind::CodeBlock(CodeBlock {
                kind: CodeBlockKind::Fenced,
                info,
                text,
            }),
        );
        Consumed::block(block, i)
    }

    fn consume_indented_code(&mut self, lines: &[Line], start: usize) -> Consumed {
        let mut end = start + 1;
        let mut i = start + 1;
        while i < lines.len() {
            let text = &lines[i].text;
            if is_blank(text) {
                i += 1;
                continue;
            }
            if indent_width(text) < 4 {
                break;
            }
            i += 1;
            end = i;
        }
        let mut text = lines[start..end]
            .iter()
            .map(|line| remove_indent_columns(&line.text, 4))
            .collect::<Vec<_>>()
            .join("\n");
        text.push('\n');
        let block = Block::new(
            line_span(lines, start, end),
            BlockKind::CodeBlock(CodeBlock {
                kind: CodeBlockKind::Indented,
                info: String::new(),
                text,
            }),
        );
        Consumed::block(block, end)
    }

    fn consume_heading(&mut self, lines: &[Line], start: usize) -> Consumed {
        let text = &lines[start].text;
        if let Some((level, content)) = parse_atx_heading(text) {
            let title = self.tokenizer.tokenize(content);
            let block = Block::new(
                line_span(lines, start, start + 1),
                BlockKind::Heading { level, title },
            );
            return Consumed::block(block, start + 1);
        }
        let Some(level) = lines
            .get(start + 1)
            .and_then(|next| setext_underline_level(&next.text))
        else {
            return self.consume_paragraph(lines, start);
        };
        let title = self.tokenizer.tokenize(text.trim());
        let block = Block::new(
            line_span(lines, start, start + 2),
            BlockKind::Heading { level, title },
        );
        Consumed::block(block, start + 2)
    }

    fn consume_thematic_break(&mut self, lines: &[Line], start: usize) -> Consumed {
        let block = Block::new(line_span(lines, start, start + 1), BlockKind::ThematicBreak);
        Consumed::block(block, start + 1)
    }

    fn consume_quote(&mut self, lines: &[Line], start: usize) -> Consumed {
        let mut inner = Vec::new();
        let mut can_lazy = false;
        let mut i = start;
        while i < lines.len() {
            let line = &lines[i];
            if let Some(content) = quote_content(&line.text) {
                can_lazy = !is_blank(content)
                    && indent_width(content) < 4
                    && parse_fence_open(content).is_none();
                inner.push(Line {
                    index: line.index,
                    text: content.to_string(),
                });
                i += 1;
                continue;
            }
            if can_lazy && continues_lazily(lines, i) {
                inner.push(line.clone());
                i += 1;
                continue;
            }
            break;
        }
        let blocks = self.parse_nested(&inner);
        let block = Block::new(line_span(lines, start, i), BlockKind::BlockQuote { blocks });
        Consumed::block(block, i)
    }

    fn consume_table(&mut self, lines: &[Line], start: usize) -> Consumed {
        let header_cells = split_table_cells(table_row_text(&lines[start].text));
        let Some(aligns) = lines
            .get(start + 1)
            .and_then(|line| parse_table_separator(table_row_text(&line.text)))
        else {
            return self.consume_paragraph(lines, start);
        };
        let headers = self.table_cells(&header_cells, aligns.len());

        let mut rows = Vec::new();
        let mut i = start + 2;
        while i < lines.len() {
            let text = &lines[i].text;
            if is_blank(text) || !text.contains('|') {
                break;
            }
            let cells = split_table_cells(table_row_text(text));
            rows.push(self.table_cells(&cells, aligns.len()));
            i += 1;
        }

        let block = Block::new(
            line_span(lines, start, i),
            BlockKind::Table(Table {
                headers,
                aligns,
                rows,
            }),
        );
        Consumed::block(block, i)
    }

    fn table_cells(&self, cells: &[String], expected: usize) -> Vec<InlineSeq> {
        let mut out: Vec<InlineSeq> = cells
            .iter()
            .take(expected)
            .map(|cell| self.tokenizer.tokenize(cell))
            .collect();
        out.resize_with(expected, Vec::new);
        out
    }

    fn consume_list(&mut self, lines: &[Line], start: usize) -> Consumed {
        let Some(first) = parse_list_marker(&lines[start].text) else {
            return self.consume_paragraph(lines, start);
        };
        let mut items = Vec::new();
        let mut loose = false;
        let mut i = start;

        while i < lines.len() {
            let Some(marker) = parse_list_marker(&lines[i].text) else {
                break;
            };
            if !marker.same_list(&first) {
                break;
            }
            let first_line = &lines[i];
            let mut item_lines = vec![Line {
                index: first_line.index,
                text: first_line.text[marker.content_start..].to_string(),
            }];
            let mut can_lazy = !marker.empty;
            let mut blanks: Vec<usize> = Vec::new();
            let mut j = i + 1;
            while j < lines.len() {
                let next = &lines[j];
                if is_blank(&next.text) {
                    blanks.push(j);
                    can_lazy = false;
                    j += 1;
                    continue;
                }
                if indent_width(&next.text) >= marker.content_indent {
                    for blank in blanks.drain(..) {
                        item_lines.push(Line {
                            index: lines[blank].index,
                            text: String::new(),
                        });
                    }
                    let text = remove_indent_columns(&next.text, marker.content_indent);
                    can_lazy = indent_width(&text) < 4 && parse_fence_open(&text).is_none();
                    item_lines.push(Line {
                        index: next.index,
                        text,
                    });
                    j += 1;
                    continue;
                }
                if blanks.is_empty()
                    && can_lazy
                    && parse_list_marker(&next.text).is_none()
                    && continues_lazily(lines, j)
                {
                    item_lines.push(next.clone());
                    j += 1;
                    continue;
                }
                break;
            }

            let blocks = self.parse_nested(&item_lines);
            if blocks
                .windows(2)
                .any(|pair| pair[1].lines.start > pair[0].lines.end)
            {
                loose = true;
            }
            items.push(ListItem { blocks });

            let continues = j < lines.len()
                && parse_list_marker(&lines[j].text).is_some_and(|next| next.same_list(&first));
            if !continues {
                // Trailing blank lines belong to whatever follows the list.
                i = j - blanks.len();
                break;
            }
            if !blanks.is_empty() {
                loose = true;
            }
            i = j;
        }

        let block = Block::new(
            line_span(lines, start, i),
            BlockKind::List(List {
                ordered: first.ordered,
                start: first.start,
                tight: !loose,
                items,
            }),
        );
        Consumed::block(block, i)
    }

    fn consume_paragraph(&mut self, lines: &[Line], start: usize) -> Consumed {
        let mut texts: Vec<&str> = Vec::new();
        let mut i = start;
        while i < lines.len() {
            let line = &lines[i];
            if is_blank(&line.text) || (i > start && interrupts_paragraph(lines, i)) {
                break;
            }
            texts.push(line.text.trim_start());
            if let Some(level) = lines
                .get(i + 1)
                .and_then(|next| setext_underline_level(&next.text))
            {
                let title = self.tokenizer.tokenize(texts.join("\n").trim_end());
                let block = Block::new(
                    line_span(lines, start, i + 2),
                    BlockKind::Heading { level, title },
                );
                return Consumed::block(block, i + 2);
            }
            i += 1;
        }

        let mut content = self.tokenizer.tokenize(texts.join("\n").trim_end());
        let pending = take_paragraph_attribute(&mut content);
        Consumed {
            block: Some(Block::new(
                line_span(lines, start, i),
                BlockKind::Paragraph { content },
            )),
            next: i,
            pending,
        }
    }
}

// A trailing `{...}{...}` pair hands its second group to the paragraph.
fn take_paragraph_attribute(content: &mut InlineSeq) -> Option<AttrSet> {
    match content.last_mut() {
        Some(Inline::AttributeTag(tag)) => tag.paragraph.take(),
        _ => None,
    }
}

fn captured_title(captures: &Captures<'_>) -> Option<String> {
    captures
        .name("dq")
        .or_else(|| captures.name("sq"))
        .or_else(|| captures.name("pq"))
        .map(|m| unescape(m.as_str()))
}

fn segment(lines: &[Line], start: usize, end: usize, kind: SegmentKind) -> Segment {
    Segment {
        lines: line_span(lines, start, end),
        kind,
    }
}

fn line_span(lines: &[Line], start: usize, end: usize) -> LineSpan {
    match (lines.get(start), end.checked_sub(1).and_then(|last| lines.get(last))) {
        (Some(first), Some(last)) if end > start => LineSpan {
            start: first.index,
            end: last.index + 1,
        },
        _ => LineSpan::default(),
    }
}

fn split_lines(source: &str) -> Vec<Line> {
    source
        .split('\n')
        .enumerate()
        .map(|(index, text)| Line {
            index,
            text: text.strip_suffix('\r').unwrap_or(text).to_string(),
        })
        .collect()
}

fn is_blank(text: &str) -> bool {
    text.trim().is_empty()
}

fn is_space_or_tab(byte: u8) -> bool {
    byte == b' ' || byte == b'\t'
}

fn indent_width(text: &str) -> usize {
    let mut columns = 0;
    for byte in text.bytes() {
        match byte {
            b' ' => columns += 1,
            b'\t' => columns += 4 - columns % 4,
            _ => break,
        }
    }
    columns
}

/// Drops `columns` columns of leading indentation; a tab straddling the boundary
/// leaves its remaining columns as spaces.
fn remove_indent_columns(text: &str, columns: usize) -> String {
    let mut col = 0;
    for (idx, byte) in text.bytes().enumerate() {
        if col >= columns {
            return text[idx..].to_string();
        }
        match byte {
            b' ' => col += 1,
            b'\t' => {
                let next = col + 4 - col % 4;
                if next > columns {
                    return format!("{}{}", " ".repeat(next - columns), &text[idx + 1..]);
                }
                col = next;
            }
            _ => return text[idx..].to_string(),
        }
    }
    String::new()
}

fn strip_leading_spaces(text: &str, max: usize) -> &str {
    let count = text.bytes().take(max).take_while(|b| *b == b' ').count();
    &text[count..]
}

fn detect_reference(lines: &[Line], i: usize) -> bool {
    REFERENCE_DEFINITION.is_match(&lines[i].text)
}

fn detect_fenced_code(lines: &[Line], i: usize) -> bool {
    parse_fence_open(&lines[i].text).is_some()
}

fn detect_indented_code(lines: &[Line], i: usize) -> bool {
    indent_width(&lines[i].text) >= 4
}

fn detect_heading(lines: &[Line], i: usize) -> bool {
    if parse_atx_heading(&lines[i].text).is_some() {
        return true;
    }
    lines
        .get(i + 1)
        .is_some_and(|next| setext_underline_level(&next.text).is_some())
        && !interrupts_paragraph(lines, i)
}

fn detect_thematic_break(lines: &[Line], i: usize) -> bool {
    is_thematic_break_line(&lines[i].text)
}

fn detect_quote(lines: &[Line], i: usize) -> bool {
    quote_content(&lines[i].text).is_some()
}

fn detect_list(lines: &[Line], i: usize) -> bool {
    parse_list_marker(&lines[i].text).is_some()
}

// Blocks allowed to cut a running paragraph short.
fn interrupts_paragraph(lines: &[Line], i: usize) -> bool {
    let text = &lines[i].text;
    parse_fence_open(text).is_some()
        || parse_atx_heading(text).is_some()
        || is_thematic_break_line(text)
        || quote_content(text).is_some()
        || is_table_start(lines, i)
        || parse_list_marker(text)
            .is_some_and(|marker| !marker.empty && (!marker.ordered || marker.start == Some(1)))
}

fn continues_lazily(lines: &[Line], i: usize) -> bool {
    let text = &lines[i].text;
    !is_blank(text) && setext_underline_level(text).is_none() && !interrupts_paragraph(lines, i)
}

/// `(indent, fence, info)` for an opening fence line.
fn parse_fence_open(text: &str) -> Option<(usize, &str, &str)> {
    let indent = text.bytes().take_while(|b| *b == b' ').count();
    if indent > 3 {
        return None;
    }
    let rest = &text[indent..];
    let fence_char = *rest.as_bytes().first()?;
    if fence_char != b'`' && fence_char != b'~' {
        return None;
    }
    let run = rest.bytes().take_while(|b| *b == fence_char).count();
    if run < 3 {
        return None;
    }
    let info = rest[run..].trim();
    if fence_char == b'`' && info.contains('`') {
        return None;
    }
    Some((indent, &rest[..run], info))
}

fn setext_underline_level(text: &str) -> Option<u8> {
    if indent_width(text) > 3 {
        return None;
    }
    let trimmed = text.trim();
    let ch = *trimmed.as_bytes().first()?;
    if ch != b'=' && ch != b'-' {
        return None;
    }
    if !trimmed.bytes().all(|b| b == ch) {
        return None;
    }
    Some(if ch == b'=' { 1 } else { 2 })
}

/// Level and content of an ATX heading, without the optional closing `#` run.
fn parse_atx_heading(text: &str) -> Option<(u8, &str)> {
    if indent_width(text) > 3 {
        return None;
    }
    let trimmed = text.trim_start_matches(' ');
    let bytes = trimmed.as_bytes();
    let level = bytes.iter().take_while(|b| **b == b'#').count();
    if level == 0 || level > 6 {
        return None;
    }
    if level < bytes.len() && !is_space_or_tab(bytes[level]) {
        return None;
    }
    let content = trimmed[level..].trim_matches([' ', '\t']);
    let without_hashes = content.trim_end_matches('#');
    let content = if without_hashes.is_empty() {
        without_hashes
    } else if without_hashes.ends_with([' ', '\t']) {
        without_hashes.trim_end_matches([' ', '\t'])
    } else {
        content
    };
    Some((level as u8, content))
}

fn is_thematic_break_line(text: &str) -> bool {
    if indent_width(text) > 3 {
        return false;
    }
    let mut marker: Option<u8> = None;
    let mut count = 0;
    for byte in text.bytes() {
        if is_space_or_tab(byte) {
            continue;
        }
        match marker {
            None if matches!(byte, b'-' | b'*' | b'_') => marker = Some(byte),
            Some(expected) if expected == byte => {}
            _ => return false,
        }
        count += 1;
    }
    count >= 3
}

/// Content after a `>` marker and its optional following space.
fn quote_content(text: &str) -> Option<&str> {
    if indent_width(text) > 3 {
        return None;
    }
    let rest = text.trim_start_matches(' ').strip_prefix('>')?;
    Some(
        rest.strip_prefix(' ')
            .or_else(|| rest.strip_prefix('\t'))
            .unwrap_or(rest),
    )
}

fn is_table_start(lines: &[Line], i: usize) -> bool {
    let header = &lines[i].text;
    if indent_width(header) > 3 || !header.contains('|') {
        return false;
    }
    let Some(aligns) = lines
        .get(i + 1)
        .and_then(|line| parse_table_separator(table_row_text(&line.text)))
    else {
        return false;
    };
    split_table_cells(table_row_text(header)).len() == aligns.len()
}

fn table_row_text(text: &str) -> &str {
    text.trim()
}

/// Splits a row on unescaped pipes outside code spans; outer pipes are optional.
fn split_table_cells(text: &str) -> Vec<String> {
    let bytes = text.as_bytes();
    let mut cells = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'`' => {
                let run = bytes[i..].iter().take_while(|b| **b == b'`').count();
                let mut search = i + run;
                let mut end = None;
                while search < bytes.len() {
                    if bytes[search] == b'`' {
                        let close = bytes[search..].iter().take_while(|b| **b == b'`').count();
                        if close == run {
                            end = Some(search + close);
                            break;
                        }
                        search += close;
                    } else {
                        search += 1;
                    }
                }
                i = end.unwrap_or(i + run);
            }
            b'|' => {
                cells.push(text[start..i].trim().to_string());
                i += 1;
                start = i;
            }
            _ => i += 1,
        }
    }
    cells.push(text[start.min(text.len())..].trim().to_string());

    if cells.len() > 1 {
        if text.starts_with('|') {
            cells.remove(0);
        }
        if text.ends_with('|') && !text.ends_with("\\|") {
            cells.pop();
        }
    }
    cells
}

fn parse_table_separator(text: &str) -> Option<Vec<TableAlign>> {
    if !text.contains('|') {
        return None;
    }
    let cells = split_table_cells(text);
    let mut aligns = Vec::with_capacity(cells.len());
    for cell in cells {
        let left = cell.starts_with(':');
        let right = cell.len() > 1 && cell.ends_with(':');
        let dashes = cell.trim_matches(':');
        if dashes.is_empty() || !dashes.bytes().all(|b| b == b'-') {
            return None;
        }
        aligns.push(match (left, right) {
            (true, true) => TableAlign::Center,
            (true, false) => TableAlign::Left,
            (false, true) => TableAlign::Right,
            (false, false) => TableAlign::None,
        });
    }
    Some(aligns)
}

#[derive(Clone, Copy, Debug)]
struct ListMarker {
    ordered: bool,
    /// `-`, `+`, `*`, or the `.` / `)` after an ordered number.
    delimiter: u8,
    start: Option<u64>,
    content_indent: usize,
    content_start: usize,
    empty: bool,
}

impl ListMarker {
    fn same_list(&self, other: &ListMarker) -> bool {
        self.ordered == other.ordered && self.delimiter == other.delimiter
    }
}

fn parse_list_marker(text: &str) -> Option<ListMarker> {
    if is_thematic_break_line(text) {
        return None;
    }
    let bytes = text.as_bytes();
    let indent = bytes.iter().take_while(|b| **b == b' ').count();
    if indent > 3 {
        return None;
    }
    let mut idx = indent;
    let (ordered, delimiter, start) = match *bytes.get(idx)? {
        marker @ (b'-' | b'+' | b'*') => {
            idx += 1;
            (false, marker, None)
        }
        b'0'..=b'9' => {
            let digits = bytes[idx..].iter().take_while(|b| b.is_ascii_digit()).count();
            if digits > 9 {
                return None;
            }
            let number = text[idx..idx + digits].parse::<u64>().ok();
            idx += digits;
            let delimiter = *bytes.get(idx)?;
            if delimiter != b'.' && delimiter != b')' {
                return None;
            }
            idx += 1;
            (true, delimiter, number)
        }
        _ => return None,
    };

    let rest = &text[idx..];
    if !rest.is_empty() && !rest.starts_with([' ', '\t']) {
        return None;
    }
    let whitespace = rest.bytes().take_while(|b| is_space_or_tab(*b)).count();
    let mut post_cols = 0;
    for byte in rest.bytes().take(whitespace) {
        let col = idx + post_cols;
        post_cols += if byte == b'\t' { 4 - col % 4 } else { 1 };
    }
    let empty = is_blank(rest);
    let (content_indent, content_start) = if empty {
        (idx + 1, text.len())
    } else if post_cols > 4 {
        // One column belongs to the marker; the rest is indented code.
        (idx + 1, idx + 1)
    } else {
        (idx + post_cols, idx + whitespace)
    };
    Some(ListMarker {
        ordered,
        delimiter,
        start,
        content_indent,
        content_start,
        empty,
    })
}

#[cfg(test)]
mod tests {
    use super::{parse, parse_atx_heading, parse_list_marker, split_table_cells};
    use crate::ast::BlockKind;
    use crate::span::SegmentKind;

    #[test]
    fn segments_cover_every_line() {
        let source = "# Title\n\n[a]: /a\n\ntext\nmore\n\n\n- item\n";
        let result = parse(source);
        let mut expected_start = 0;
        for segment in &result.segments {
            assert_eq!(segment.lines.start, expected_start);
            assert!(segment.lines.end > segment.lines.start);
            expected_start = segment.lines.end;
        }
        assert_eq!(expected_start, source.split('\n').count());
        assert!(
            result
                .segments
                .iter()
                .any(|segment| segment.kind == SegmentKind::Definition)
        );
    }

    #[test]
    fn reference_title_may_sit_on_the_next_line() {
        let result = parse("[pic]: /a.png\n  \"A picture\"\n");
        let reference = result.references.resolve("PIC").expect("defined");
        assert_eq!(reference.url, "/a.png");
        assert_eq!(reference.title.as_deref(), Some("A picture"));
        assert!(result.document.blocks.is_empty());
    }

    #[test]
    fn reference_line_hands_paragraph_attribute_to_next_block() {
        let result = parse("[a]: /a {.link}{#lead}\n\nFirst.\n\nSecond.\n");
        let reference = result.references.resolve("a").expect("defined");
        assert_eq!(
            reference.attrs.as_ref().map(|attrs| attrs.raw.as_str()),
            Some(".link")
        );
        let blocks = &result.document.blocks;
        assert_eq!(
            blocks[0].p_attr.as_ref().and_then(|attrs| attrs.id()),
            Some("lead")
        );
        assert!(blocks[1].p_attr.is_none());
    }

    #[test]
    fn pending_attribute_is_used_up_by_a_heading() {
        let result = parse("[a]: /a {.x}{#lead}\n\n# Heading\n\nPara\n");
        let blocks = &result.document.blocks;
        assert!(matches!(blocks[0].kind, BlockKind::Heading { .. }));
        assert!(blocks[0].p_attr.is_some());
        assert!(matches!(blocks[1].kind, BlockKind::Paragraph { .. }));
        assert!(blocks[1].p_attr.is_none());
    }

    #[test]
    fn unterminated_fence_takes_the_rest() {
        let result = parse("```rust\nfn main() {}\n\nlet x = 1;");
        let [block] = result.document.blocks.as_slice() else {
            panic!("expected one block");
        };
        let BlockKind::CodeBlock(code) = &block.kind else {
            panic!("expected code, got {:?}", block.kind);
        };
        assert_eq!(code.info, "rust");
        assert_eq!(code.text, "fn main() {}\n\nlet x = 1;\n");
    }

    #[test]
    fn atx_heading_drops_closing_hashes() {
        assert_eq!(parse_atx_heading("## Title ##"), Some((2, "Title")));
        assert_eq!(parse_atx_heading("# C#"), Some((1, "C#")));
        assert_eq!(parse_atx_heading("#"), Some((1, "")));
        assert_eq!(parse_atx_heading("#hashtag"), None);
    }

    #[test]
    fn list_markers() {
        let bullet = parse_list_marker("-   item").expect("bullet");
        assert_eq!(bullet.content_indent, 4);
        let ordered = parse_list_marker("3) item").expect("ordered");
        assert_eq!(ordered.start, Some(3));
        assert!(parse_list_marker("-item").is_none());
        assert!(parse_list_marker("* * *").is_none());
    }

    #[test]
    fn table_cells_respect_escapes_and_code() {
        assert_eq!(
            split_table_cells(r"| a \| b | `c | d` |"),
            vec![r"a \| b".to_string(), "`c | d`".to_string()]
        );
    }

    #[test]
    fn lists_track_looseness() {
        let tight = parse("- a\n- b\n");
        let loose = parse("- a\n\n- b\n");
        for (result, expected) in [(tight, true), (loose, false)] {
            let BlockKind::List(list) = &result.document.blocks[0].kind else {
                panic!("expected a list");
            };
            assert_eq!(list.items.len(), 2);
            assert_eq!(list.tight, expected);
        }
    }
}
