use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use tempfile::tempdir;

#[test]
fn reads_stdin_and_writes_stdout() {
    let mut cmd = cargo_bin_cmd!("attrmark");
    cmd.write_stdin("# Title {#intro}\n\n[Home](/index){.nav}\n");
    cmd.assert().success().stdout(
        "<h1 id=\"intro\">Title</h1>\n<p><a href=\"/index\" class=\"nav\">Home</a></p>\n",
    );
}

#[test]
fn reads_file_and_writes_output_file() {
    let dir = tempdir().unwrap();
    let input_path = dir.path().join("doc.md");
    let output_path = dir.path().join("doc.html");
    fs::write(&input_path, "```\ncode\n```\n").unwrap();

    let mut cmd = cargo_bin_cmd!("attrmark");
    cmd.arg(input_path.as_os_str())
        .arg("-o")
        .arg(output_path.as_os_str());
    cmd.assert().success().stdout(predicate::str::is_empty());

    let html = fs::read_to_string(&output_path).unwrap();
    assert_eq!(html, "<pre><code>code\n</code></pre>\n");
}

#[test]
fn html5_flag_drops_closing_slash() {
    let mut cmd = cargo_bin_cmd!("attrmark");
    cmd.arg("--html5").write_stdin("***\n");
    cmd.assert().success().stdout("<hr>\n");
}

#[test]
fn config_file_sets_render_options() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("attrmark.toml");
    fs::write(
        &config_path,
        r#"[render]
html5 = true
code_attributes_on_pre = true
"#,
    )
    .unwrap();

    let mut cmd = cargo_bin_cmd!("attrmark");
    cmd.arg("--config")
        .arg(config_path.as_os_str())
        .write_stdin("```rust {#main}\nx\n```\n\n***\n");
    cmd.assert().success().stdout(
        "<pre class=\"rust\" id=\"main\"><code>x\n</code></pre>\n<hr>\n",
    );
}

#[test]
fn nesting_flag_overrides_config_file() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("attrmark.toml");
    fs::write(&config_path, "[parse]\nmaximum_nesting_level = 8\n").unwrap();

    let mut cmd = cargo_bin_cmd!("attrmark");
    cmd.arg("--config")
        .arg(config_path.as_os_str())
        .arg("--maximum-nesting-level")
        .arg("1")
        .write_stdin("> > x\n");
    cmd.assert()
        .success()
        .stdout("<blockquote>\n<blockquote>\nx\n</blockquote>\n</blockquote>\n");
}

#[test]
fn sanitized_flag_strips_script_urls() {
    let mut cmd = cargo_bin_cmd!("attrmark");
    cmd.arg("--sanitized")
        .write_stdin("[x](javascript:alert(1)){.c}\n");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("javascript").not())
        .stdout(predicate::str::contains("class=\"c\""));
}

#[test]
fn missing_input_fails() {
    let dir = tempdir().unwrap();
    let mut cmd = cargo_bin_cmd!("attrmark");
    cmd.arg(dir.path().join("absent.md").as_os_str());
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("failed to read"));
}

#[test]
fn missing_config_fails() {
    let dir = tempdir().unwrap();
    let mut cmd = cargo_bin_cmd!("attrmark");
    cmd.arg("--config")
        .arg(dir.path().join("absent.toml").as_os_str())
        .write_stdin("text\n");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("could not load settings"));
}
