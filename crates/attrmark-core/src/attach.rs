use tracing::debug;

use crate::ast::{AttributeTag, Block, BlockKind, Inline, InlineSeq};
use crate::attributes::AttrSet;

/// Moves attribute tags onto the link or image right before them, and heading-level
/// tags onto their heading. Tags nobody claims stay in place and render literally.
pub(crate) fn attach_attributes(blocks: &mut [Block]) {
    for block in blocks {
        match &mut block.kind {
            BlockKind::Paragraph { content } => attach_inline(content),
            BlockKind::Heading { title, .. } => {
                attach_inline(title);
                if let Some(attrs) = take_heading_attributes(title) {
                    debug!(attrs = %attrs.raw, "heading attributes attached");
                    block.attrs = Some(attrs);
                }
            }
            BlockKind::Table(table) => {
                for cell in table
                    .headers
                    .iter_mut()
                    .chain(table.rows.iter_mut().flatten())
                {
                    attach_inline(cell);
                }
            }
            BlockKind::List(list) => {
                for item in &mut list.items {
                    attach_attributes(&mut item.blocks);
                }
            }
            BlockKind::BlockQuote { blocks } => attach_attributes(blocks),
            BlockKind::CodeBlock(_) | BlockKind::ThematicBreak | BlockKind::Text(_) => {}
        }
    }
}

fn attach_inline(inlines: &mut InlineSeq) {
    let mut out = Vec::with_capacity(inlines.len());
    // Index in `out` of the link or image a following tag may claim.
    let mut target: Option<usize> = None;
    for inline in std::mem::take(inlines) {
        match inline {
            Inline::Link(mut link) => {
                attach_inline(&mut link.children);
                out.push(Inline::Link(link));
                target = Some(out.len() - 1);
            }
            Inline::Image(image) => {
                out.push(Inline::Image(image));
                target = Some(out.len() - 1);
            }
            Inline::AttributeTag(tag) => {
                if let Some(index) = target.take()
                    && claim(&mut out[index], &tag)
                {
                    continue;
                }
                out.push(Inline::AttributeTag(tag));
            }
            Inline::Emph(mut children) => {
                attach_inline(&mut children);
                out.push(Inline::Emph(children));
                target = None;
            }
            Inline::Strong(mut children) => {
                attach_inline(&mut children);
                out.push(Inline::Strong(children));
                target = None;
            }
            other => {
                out.push(other);
                target = None;
            }
        }
    }
    *inlines = out;
}

fn claim(target: &mut Inline, tag: &AttributeTag) -> bool {
    let slot = match target {
        Inline::Link(link) => &mut link.attrs,
        Inline::Image(image) => &mut image.attrs,
        _ => return false,
    };
    debug!(attrs = %tag.attrs.raw, "attribute group attached");
    *slot = Some(tag.attrs.clone());
    true
}

// Every remaining top-level tag leaves the title; the last one wins.
fn take_heading_attributes(title: &mut InlineSeq) -> Option<AttrSet> {
    let mut attrs = None;
    title.retain(|inline| match inline {
        Inline::AttributeTag(tag) => {
            attrs = Some(tag.attrs.clone());
            false
        }
        _ => true,
    });
    attrs
}

#[cfg(test)]
mod tests {
    use crate::ast::{BlockKind, Inline};
    use crate::parse;

    fn paragraph(source: &str) -> Vec<Inline> {
        let result = parse(source);
        match result.document.blocks.into_iter().next().map(|block| block.kind) {
            Some(BlockKind::Paragraph { content }) => content,
            other => panic!("expected a paragraph, got {other:?}"),
        }
    }

    #[test]
    fn tag_moves_onto_preceding_link() {
        let content = paragraph("[Home](/index){#home .nav}");
        let [Inline::Link(link)] = content.as_slice() else {
            panic!("expected a single link, got {content:?}");
        };
        let attrs = link.attrs.as_ref().expect("attributes");
        assert_eq!(attrs.id(), Some("home"));
        assert_eq!(attrs.classes(), vec!["nav"]);
    }

    #[test]
    fn text_between_breaks_the_association() {
        let content = paragraph("[Home](/index) {.nav}");
        assert!(matches!(content.last(), Some(Inline::AttributeTag(_))));
    }

    #[test]
    fn tags_inside_link_text_attach_inside() {
        let content = paragraph("[![logo](/l.png){.icon}](/)");
        let [Inline::Link(link)] = content.as_slice() else {
            panic!("expected a link, got {content:?}");
        };
        assert!(link.attrs.is_none());
        let [Inline::Image(image)] = link.children.as_slice() else {
            panic!("expected an image, got {:?}", link.children);
        };
        assert_eq!(
            image.attrs.as_ref().map(|attrs| attrs.classes()),
            Some(vec!["icon"])
        );
    }

    #[test]
    fn heading_takes_last_tag() {
        let result = parse("## Title {#first} {#second .wide}");
        let block = &result.document.blocks[0];
        let attrs = block.attrs.as_ref().expect("heading attributes");
        assert_eq!(attrs.id(), Some("second"));
        let BlockKind::Heading { title, .. } = &block.kind else {
            panic!("expected a heading");
        };
        assert!(
            title
                .iter()
                .all(|inline| !matches!(inline, Inline::AttributeTag(_)))
        );
    }
}
