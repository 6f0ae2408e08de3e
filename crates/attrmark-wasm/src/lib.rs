use attrmark_core::{
    Block, BlockKind, Options, emit_html, emit_html_sanitized, parse_with_options,
};
use serde::{Deserialize, Serialize};
use wasm_bindgen::prelude::*;

#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RenderOptions {
    code_attributes_on_pre: Option<bool>,
    html5: Option<bool>,
    maximum_nesting_level: Option<usize>,
    sanitize: Option<bool>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsLines {
    start_line: usize,
    end_line: usize,
    depth: usize,
}

#[wasm_bindgen]
pub fn render_html(source: &str) -> String {
    let options = Options::default();
    let parsed = parse_with_options(source, &options);
    emit_html(&parsed.document.blocks, &parsed.references, &options)
}

#[wasm_bindgen]
pub fn render_html_with_options(source: &str, options: JsValue) -> Result<String, JsValue> {
    let requested = options_from_js(options)?;
    let core_options = core_options(&requested);
    let parsed = parse_with_options(source, &core_options);
    let blocks = &parsed.document.blocks;
    let html = if requested.sanitize.unwrap_or(false) {
        emit_html_sanitized(blocks, &parsed.references, &core_options)
    } else {
        emit_html(blocks, &parsed.references, &core_options)
    };
    Ok(html)
}

/// Source line ranges of every block, outermost first, for editor highlighting.
#[wasm_bindgen]
pub fn block_lines(source: &str) -> Result<JsValue, JsValue> {
    let parsed = parse_with_options(source, &Options::default());
    let mut out = Vec::new();
    collect_block_lines(&parsed.document.blocks, 0, &mut out);
    serde_wasm_bindgen::to_value(&out).map_err(|err| JsValue::from_str(&err.to_string()))
}

fn options_from_js(value: JsValue) -> Result<RenderOptions, JsValue> {
    if value.is_null() || value.is_undefined() {
        return Ok(RenderOptions::default());
    }
    serde_wasm_bindgen::from_value(value).map_err(|err| JsValue::from_str(&err.to_string()))
}

fn core_options(requested: &RenderOptions) -> Options {
    let mut out = Options::default();
    if let Some(code_attributes_on_pre) = requested.code_attributes_on_pre {
        out.code_attributes_on_pre = code_attributes_on_pre;
    }
    if let Some(html5) = requested.html5 {
        out.html5 = html5;
    }
    if let Some(maximum_nesting_level) = requested.maximum_nesting_level {
        out.maximum_nesting_level = maximum_nesting_level;
    }
    out
}

fn collect_block_lines(blocks: &[Block], depth: usize, out: &mut Vec<JsLines>) {
    for block in blocks {
        out.push(JsLines {
            start_line: block.lines.start,
            end_line: block.lines.end,
            depth,
        });
        match &block.kind {
            BlockKind::BlockQuote { blocks } => collect_block_lines(blocks, depth + 1, out),
            BlockKind::List(list) => {
                for item in &list.items {
                    collect_block_lines(&item.blocks, depth + 1, out);
                }
            }
            _ => {}
        }
    }
}
