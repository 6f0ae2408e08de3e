use attrmark_core::{Block, BlockKind, LineSpan, Options, markdown_to_html, parse};
use proptest::prelude::*;

const MARKUP: &str = "[a-z #.*_`{}\\[\\]()!<>|:~=\\\\\n-]{0,160}";

fn check_blocks(blocks: &[Block], parent: LineSpan, context: &str) -> Result<(), String> {
    let mut prev_end = parent.start;
    for (idx, block) in blocks.iter().enumerate() {
        let label = format!("{context}[{idx}]");
        if block.lines.start < prev_end || block.lines.end > parent.end {
            return Err(format!(
                "{label} lines {:?} escape parent {parent:?} or overlap a sibling",
                block.lines
            ));
        }
        prev_end = block.lines.end;
        match &block.kind {
            BlockKind::BlockQuote { blocks } => {
                check_blocks(blocks, block.lines, &format!("{label}.quote"))?;
            }
            BlockKind::List(list) => {
                for (item_idx, item) in list.items.iter().enumerate() {
                    check_blocks(
                        &item.blocks,
                        block.lines,
                        &format!("{label}.item[{item_idx}]"),
                    )?;
                }
            }
            _ => {}
        }
    }
    Ok(())
}

proptest! {
    #[test]
    fn parser_never_panics(source in "\\PC{0,200}") {
        let _ = markdown_to_html(&source, &Options::default());
    }

    #[test]
    fn parser_never_panics_on_markup(source in MARKUP) {
        let options = Options {
            maximum_nesting_level: 3,
            ..Options::default()
        };
        let _ = markdown_to_html(&source, &options);
    }

    #[test]
    fn segments_partition_the_input(source in MARKUP) {
        let result = parse(&source);
        let mut expected_start = 0;
        for segment in &result.segments {
            prop_assert_eq!(segment.lines.start, expected_start);
            prop_assert!(segment.lines.end > segment.lines.start);
            expected_start = segment.lines.end;
        }
        prop_assert_eq!(expected_start, source.split('\n').count());
    }

    #[test]
    fn block_lines_nest_inside_their_container(source in MARKUP) {
        let result = parse(&source);
        let whole = LineSpan { start: 0, end: source.split('\n').count() };
        if let Err(message) = check_blocks(&result.document.blocks, whole, "document") {
            return Err(TestCaseError::fail(format!("{message}\nsource: {source:?}")));
        }
    }

    #[test]
    fn malformed_group_is_preserved(word in "[a-z]{1,8}", junk in "[a-z]{1,10}") {
        let html = markdown_to_html(&format!("{word} {{{junk}"), &Options::default());
        prop_assert_eq!(html, format!("<p>{word} {{{junk}</p>\n"));
    }

    #[test]
    fn definition_order_does_not_matter(label in "[a-z]{1,8}", path in "[a-z]{1,8}") {
        let definition = format!("[{label}]: /{path} \"t\" {{.c}}");
        let usage = format!("[text][{label}] and [{label}]");
        let forward = markdown_to_html(&format!("{usage}\n\n{definition}"), &Options::default());
        let backward = markdown_to_html(&format!("{definition}\n\n{usage}"), &Options::default());
        prop_assert_eq!(forward, backward);
    }

    #[test]
    fn plain_text_is_escaped(body in "[a-z &<]{0,40}") {
        let html = markdown_to_html(&format!("x{body}"), &Options::default());
        let escaped = body.trim_end().replace('&', "&amp;").replace('<', "&lt;");
        prop_assert_eq!(html, format!("<p>x{escaped}</p>\n"));
    }
}
