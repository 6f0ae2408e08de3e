mod error;
mod settings;

use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use attrmark_core::{Options, emit_html, emit_html_sanitized, parse_with_options};
use clap::{ArgAction, Parser};
use tracing::{Level, debug, info};
use tracing_subscriber::EnvFilter;

use crate::error::CliError;
use crate::settings::{Loader, Settings};

/// Compile Markdown with `{#id .class}` attribute groups to HTML.
#[derive(Debug, Parser)]
#[command(name = "attrmark", version, about)]
struct Cli {
    /// Markdown file to read; standard input when omitted.
    input: Option<PathBuf>,

    /// Write the HTML to this file instead of standard output.
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// TOML settings layered over the built-in defaults.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Write void elements as `<br>` rather than `<br />`.
    #[arg(long)]
    html5: bool,

    /// Put fenced-code attributes on `<pre>` instead of `<code>`.
    #[arg(long)]
    code_attributes_on_pre: bool,

    /// How many container blocks may nest before their content is kept as text.
    #[arg(long, value_name = "N")]
    maximum_nesting_level: Option<u32>,

    /// Pass the output through the HTML allow-list.
    #[arg(long)]
    sanitized: bool,

    /// More logging on stderr (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let settings = load_settings(&cli).context("could not load settings")?;
    let options = Options::from(&settings);
    debug!(?options, sanitize = settings.render.sanitize, "settings loaded");

    let source = read_input(cli.input.as_deref())?;
    let result = parse_with_options(&source, &options);
    info!(
        blocks = result.document.blocks.len(),
        references = result.references.len(),
        segments = result.segments.len(),
        "document parsed"
    );

    let blocks = &result.document.blocks;
    let html = if settings.render.sanitize {
        emit_html_sanitized(blocks, &result.references, &options)
    } else {
        emit_html(blocks, &result.references, &options)
    };
    write_output(cli.output.as_deref(), &html)?;
    Ok(())
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(io::stderr)
        .init();
}

// Flags only ever switch settings on, so an unset flag leaves the file's value alone.
fn load_settings(cli: &Cli) -> Result<Settings, CliError> {
    let mut loader = Loader::new();
    if let Some(path) = &cli.config {
        debug!(path = %path.display(), "layering config file");
        loader = loader.with_file(path);
    }
    if cli.html5 {
        loader = loader.set_override("render.html5", true)?;
    }
    if cli.code_attributes_on_pre {
        loader = loader.set_override("render.code_attributes_on_pre", true)?;
    }
    if cli.sanitized {
        loader = loader.set_override("render.sanitize", true)?;
    }
    if let Some(level) = cli.maximum_nesting_level {
        loader = loader.set_override("parse.maximum_nesting_level", i64::from(level))?;
    }
    Ok(loader.build()?)
}

fn read_input(path: Option<&Path>) -> Result<String, CliError> {
    match path {
        Some(path) => fs::read_to_string(path).map_err(|source| CliError::Read {
            name: path.display().to_string(),
            source,
        }),
        None => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .map_err(|source| CliError::Read {
                    name: "standard input".to_string(),
                    source,
                })?;
            Ok(buffer)
        }
    }
}

fn write_output(path: Option<&Path>, html: &str) -> Result<(), CliError> {
    match path {
        Some(path) => fs::write(path, html).map_err(|source| CliError::Write {
            name: path.display().to_string(),
            source,
        }),
        None => {
            let mut stdout = io::stdout().lock();
            stdout
                .write_all(html.as_bytes())
                .and_then(|()| stdout.flush())
                .map_err(|source| CliError::Write {
                    name: "standard output".to_string(),
                    source,
                })
        }
    }
}
