use std::collections::{HashMap, HashSet};

use ammonia::Builder;
use tracing::{debug, trace};

use crate::ast::{
    Block, BlockKind, CodeBlock, CodeBlockKind, Image, Inline, Link, LinkTarget, List, Table,
    TableAlign,
};
use crate::attributes::{AttrSet, AttrToken};
use crate::options::Options;
use crate::registry::ReferenceRegistry;

/// Emits raw, un-sanitized HTML from a slice of blocks.
pub fn emit_html(blocks: &[Block], references: &ReferenceRegistry, options: &Options) -> String {
    let renderer = Renderer {
        references,
        options,
    };
    let mut writer = HtmlWriter::new();
    for block in blocks {
        renderer.emit_block(&mut writer, block);
    }
    writer.finish()
}

/// Emits HTML and passes it through an allow-list of the tags and attributes the renderer produces.
pub fn emit_html_sanitized(
    blocks: &[Block],
    references: &ReferenceRegistry,
    options: &Options,
) -> String {
    let raw_html = emit_html(blocks, references, options);

    let tags: HashSet<&'static str> = [
        "a",
        "blockquote",
        "br",
        "code",
        "em",
        "h1",
        "h2",
        "h3",
        "h4",
        "h5",
        "h6",
        "hr",
        "img",
        "li",
        "ol",
        "p",
        "pre",
        "strong",
        "table",
        "tbody",
        "td",
        "th",
        "thead",
        "tr",
        "ul",
    ]
    .into_iter()
    .collect();

    let generic_attributes: HashSet<&'static str> = ["class", "id"].into_iter().collect();

    let mut tag_attributes = HashMap::new();
    tag_attributes.insert("a", ["href", "title"].into_iter().collect());
    tag_attributes.insert("img", ["alt", "src", "title"].into_iter().collect());
    tag_attributes.insert("ol", ["start"].into_iter().collect());
    tag_attributes.insert("th", ["align"].into_iter().collect());
    tag_attributes.insert("td", ["align"].into_iter().collect());

    Builder::new()
        .tags(tags)
        .generic_attributes(generic_attributes)
        .tag_attributes(tag_attributes)
        .clean(&raw_html)
        .to_string()
}

/// ` id="..." class="..."` for an attribute set, in order of first appearance.
pub fn render_attributes(attrs: Option<&AttrSet>) -> String {
    let Some(attrs) = attrs else {
        return String::new();
    };
    let id = attrs
        .id()
        .filter(|id| !id.is_empty())
        .map(|id| format!(" id=\"{}\"", escape_attr(id)))
        .unwrap_or_default();
    let classes = attrs.classes();
    let class = if classes.is_empty() {
        String::new()
    } else {
        format!(" class=\"{}\"", escape_attr(&classes.join(" ")))
    };
    match attrs.tokens.first() {
        Some(AttrToken::Class(_)) => format!("{class}{id}"),
        _ => format!("{id}{class}"),
    }
}

struct HtmlWriter {
    out: String,
}

impl HtmlWriter {
    fn new() -> Self {
        Self { out: String::new() }
    }

    fn line(&mut self, line: &str) {
        self.out.push_str(line);
        self.out.push('\n');
    }

    fn raw(&mut self, text: &str) {
        self.out.push_str(text);
    }

    fn ensure_newline(&mut self) {
        if !self.out.is_empty() && !self.out.ends_with('\n') {
            self.out.push('\n');
        }
    }

    // Keeps `<li>text` on one line while separating later blocks.
    fn ensure_newline_unless_open(&mut self, open: &str) {
        if !self.out.ends_with(open) {
            self.ensure_newline();
        }
    }

    fn finish(self) -> String {
        self.out
    }
}

struct Renderer<'a> {
    references: &'a ReferenceRegistry,
    options: &'a Options,
}

/// Link fields after consulting the registry.
struct Resolved<'a> {
    url: &'a str,
    title: Option<&'a str>,
    attrs: Option<&'a AttrSet>,
}

impl Renderer<'_> {
    fn emit_block(&self, writer: &mut HtmlWriter, block: &Block) {
        match &block.kind {
            BlockKind::Heading { level, title } => {
                let content = self.render_inlines(title);
                writer.line(&format!(
                    "<h{level}{}>{}</h{level}>",
                    render_attributes(block.attrs.as_ref()),
                    content.trim_end_matches(['#', ' ', '\t'])
                ));
            }
            BlockKind::Paragraph { content } => {
                writer.line(&format!(
                    "<p{}>{}</p>",
                    paragraph_attribute(block.p_attr.as_ref()),
                    self.render_inlines(content)
                ));
            }
            BlockKind::CodeBlock(code) => self.emit_code_block(writer, code),
            BlockKind::BlockQuote { blocks } => {
                writer.line("<blockquote>");
                for child in blocks {
                    self.emit_block(writer, child);
                }
                writer.line("</blockquote>");
            }
            BlockKind::List(list) => self.emit_list(writer, list),
            BlockKind::Table(table) => self.emit_table(writer, table),
            BlockKind::ThematicBreak => {
                writer.line(if self.options.html5 { "<hr>" } else { "<hr />" });
            }
            BlockKind::Text(text) => writer.line(&escape_html(text)),
        }
    }

    fn emit_code_block(&self, writer: &mut HtmlWriter, code: &CodeBlock) {
        let attrs = match code.kind {
            CodeBlockKind::Fenced => render_attributes(Some(&AttrSet::from_info(&code.info))),
            CodeBlockKind::Indented => String::new(),
        };
        let (pre_attrs, code_attrs) = if self.options.code_attributes_on_pre {
            (attrs.as_str(), "")
        } else {
            ("", attrs.as_str())
        };
        writer.line(&format!(
            "<pre{pre_attrs}><code{code_attrs}>{}</code></pre>",
            escape_html(&code.text)
        ));
    }

    fn emit_list(&self, writer: &mut HtmlWriter, list: &List) {
        let tag = if list.ordered { "ol" } else { "ul" };
        let start = match list.start {
            Some(start) if list.ordered && start != 1 => format!(" start=\"{start}\""),
            _ => String::new(),
        };
        writer.line(&format!("<{tag}{start}>"));
        for item in &list.items {
            writer.raw("<li>");
            for child in &item.blocks {
                match &child.kind {
                    // Tight items show paragraph text without the `<p>` wrapper.
                    BlockKind::Paragraph { content } if list.tight && child.p_attr.is_none() => {
                        writer.ensure_newline_unless_open("<li>");
                        writer.raw(&self.render_inlines(content));
                    }
                    _ => {
                        writer.ensure_newline();
                        self.emit_block(writer, child);
                    }
                }
            }
            writer.line("</li>");
        }
        writer.line(&format!("</{tag}>"));
    }

    fn emit_table(&self, writer: &mut HtmlWriter, table: &Table) {
        writer.line("<table>");
        writer.line("<thead>");
        writer.line("<tr>");
        for (cell, align) in table.headers.iter().zip(&table.aligns) {
            writer.line(&format!(
                "<th{}>{}</th>",
                align_attr(*align),
                self.render_inlines(cell)
            ));
        }
        writer.line("</tr>");
        writer.line("</thead>");
        if !table.rows.is_empty() {
            writer.line("<tbody>");
            for row in &table.rows {
                writer.line("<tr>");
                for (cell, align) in row.iter().zip(&table.aligns) {
                    writer.line(&format!(
                        "<td{}>{}</td>",
                        align_attr(*align),
                        self.render_inlines(cell)
                    ));
                }
                writer.line("</tr>");
            }
            writer.line("</tbody>");
        }
        writer.line("</table>");
    }

    fn render_inlines(&self, inlines: &[Inline]) -> String {
        let mut out = String::new();
        for inline in inlines {
            match inline {
                Inline::Text(text) => out.push_str(&escape_html(text)),
                Inline::Escape(ch) => out.push_str(&escape_html(ch.encode_utf8(&mut [0; 4]))),
                Inline::CodeSpan(text) => {
                    out.push_str("<code>");
                    out.push_str(&escape_html(text));
                    out.push_str("</code>");
                }
                Inline::Emph(children) => {
                    out.push_str("<em>");
                    out.push_str(&self.render_inlines(children));
                    out.push_str("</em>");
                }
                Inline::Strong(children) => {
                    out.push_str("<strong>");
                    out.push_str(&self.render_inlines(children));
                    out.push_str("</strong>");
                }
                Inline::SoftBreak => out.push('\n'),
                Inline::HardBreak => {
                    out.push_str(if self.options.html5 { "<br>" } else { "<br />" });
                    out.push('\n');
                }
                Inline::Autolink { url, email } => {
                    let href = if *email {
                        format!("mailto:{url}")
                    } else {
                        url.clone()
                    };
                    out.push_str(&format!(
                        "<a href=\"{}\">{}</a>",
                        escape_attr(&href),
                        escape_html(url)
                    ));
                }
                Inline::Link(link) => out.push_str(&self.render_link(link)),
                Inline::Image(image) => out.push_str(&self.render_image(image)),
                // Nothing claimed the tag, so it is shown as written.
                Inline::AttributeTag(tag) => out.push_str(&escape_html(&tag.raw())),
            }
        }
        out
    }

    fn render_link(&self, link: &Link) -> String {
        let Some(resolved) = self.resolve(&link.target, link.attrs.as_ref()) else {
            return escape_html(&link.orig);
        };
        format!(
            "<a href=\"{}\"{}{}>{}</a>",
            escape_attr(resolved.url),
            title_attr(resolved.title),
            render_attributes(resolved.attrs),
            self.render_inlines(&link.children)
        )
    }

    fn render_image(&self, image: &Image) -> String {
        let Some(resolved) = self.resolve(&image.target, image.attrs.as_ref()) else {
            return escape_html(&image.orig);
        };
        format!(
            "<img src=\"{}\" alt=\"{}\"{}{}{}",
            escape_attr(resolved.url),
            escape_attr(&image.alt),
            title_attr(resolved.title),
            render_attributes(resolved.attrs),
            if self.options.html5 { ">" } else { " />" }
        )
    }

    // Definition fields win over the element's own; attributes only when the definition has some.
    fn resolve<'b>(
        &'b self,
        target: &'b LinkTarget,
        attrs: Option<&'b AttrSet>,
    ) -> Option<Resolved<'b>> {
        match target {
            LinkTarget::Direct { url, title } => Some(Resolved {
                url,
                title: title.as_deref(),
                attrs,
            }),
            LinkTarget::Reference { key } => match self.references.resolve(key) {
                Some(reference) => {
                    trace!(key = %key, "reference resolved");
                    Some(Resolved {
                        url: &reference.url,
                        title: reference.title.as_deref(),
                        attrs: reference.attrs.as_ref().or(attrs),
                    })
                }
                None => {
                    debug!(key = %key, "unresolved reference kept as text");
                    None
                }
            },
        }
    }
}

// Only the first token of a paragraph attribute is used.
fn paragraph_attribute(attrs: Option<&AttrSet>) -> String {
    match attrs.and_then(|attrs| attrs.tokens.first()) {
        Some(AttrToken::Id(id)) => format!(" id=\"{}\"", escape_attr(id)),
        Some(AttrToken::Class(class)) => format!(" class=\"{}\"", escape_attr(class)),
        None => String::new(),
    }
}

fn title_attr(title: Option<&str>) -> String {
    title
        .filter(|title| !title.is_empty())
        .map(|title| format!(" title=\"{}\"", escape_attr(title)))
        .unwrap_or_default()
}

fn align_attr(align: TableAlign) -> &'static str {
    match align {
        TableAlign::None => "",
        TableAlign::Left => " align=\"left\"",
        TableAlign::Center => " align=\"center\"",
        TableAlign::Right => " align=\"right\"",
    }
}

pub(crate) fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}

fn escape_attr(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}
