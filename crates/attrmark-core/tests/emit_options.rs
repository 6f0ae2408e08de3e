use attrmark_core::{Options, emit_html, emit_html_sanitized, markdown_to_html, parse};

#[test]
fn code_attributes_move_to_pre() {
    let options = Options {
        code_attributes_on_pre: true,
        ..Options::default()
    };
    let html = markdown_to_html("```rust {#main .numbered}\nfn main() {}\n```\n", &options);
    assert_eq!(
        html,
        "<pre class=\"rust numbered\" id=\"main\"><code>fn main() {}\n</code></pre>\n"
    );
}

#[test]
fn code_attributes_stay_on_code_by_default() {
    let html = markdown_to_html("```rust {#main}\nlet x = 1;\n```\n", &Options::default());
    assert_eq!(
        html,
        "<pre><code class=\"rust\" id=\"main\">let x = 1;\n</code></pre>\n"
    );
}

#[test]
fn html5_void_elements() {
    let options = Options {
        html5: true,
        ..Options::default()
    };
    let html = markdown_to_html("![a](/a.png)\n\n***\n\nx  \ny", &options);
    assert_eq!(
        html,
        "<p><img src=\"/a.png\" alt=\"a\"></p>\n<hr>\n<p>x<br>\ny</p>\n"
    );
}

#[test]
fn sanitized_output_keeps_attributes_and_drops_scripts() {
    let parsed = parse("[x](javascript:alert(1)){#k .c}\n\n# Head {.wide}\n");
    let options = Options::default();
    let raw = emit_html(&parsed.document.blocks, &parsed.references, &options);
    assert!(raw.contains("javascript:"));

    let html = emit_html_sanitized(&parsed.document.blocks, &parsed.references, &options);
    assert!(!html.contains("javascript:"), "{html}");
    assert!(html.contains("id=\"k\""), "{html}");
    assert!(html.contains("class=\"c\""), "{html}");
    assert!(html.contains("<h1 class=\"wide\">Head</h1>"), "{html}");
}
