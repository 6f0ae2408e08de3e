//! Layered settings for the command line.
//!
//! `defaults/attrmark.default.toml` is embedded into the binary. A user file given with
//! `--config` is layered on top through [`Loader`], then individual flags are applied as
//! overrides before deserializing into [`Settings`].

use std::path::Path;

use attrmark_core::Options;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, File, FileFormat, ValueKind};
use serde::Deserialize;

const DEFAULT_TOML: &str = include_str!("../defaults/attrmark.default.toml");

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub parse: ParseSettings,
    pub render: RenderSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParseSettings {
    pub maximum_nesting_level: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RenderSettings {
    pub code_attributes_on_pre: bool,
    pub html5: bool,
    /// Not part of [`Options`]; picks the sanitizing emitter.
    pub sanitize: bool,
}

impl From<&Settings> for Options {
    fn from(settings: &Settings) -> Self {
        Options {
            code_attributes_on_pre: settings.render.code_attributes_on_pre,
            html5: settings.render.html5,
            maximum_nesting_level: settings.parse.maximum_nesting_level,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Loader {
    builder: ConfigBuilder<DefaultState>,
}

impl Loader {
    /// Start from the embedded defaults.
    pub fn new() -> Self {
        let builder = Config::builder().add_source(File::from_str(DEFAULT_TOML, FileFormat::Toml));
        Self { builder }
    }

    /// Layer a TOML file. A missing file is an error at build time.
    pub fn with_file(mut self, path: impl AsRef<Path>) -> Self {
        let source = File::from(path.as_ref())
            .format(FileFormat::Toml)
            .required(true);
        self.builder = self.builder.add_source(source);
        self
    }

    pub fn set_override<I>(mut self, key: &str, value: I) -> Result<Self, ConfigError>
    where
        I: Into<ValueKind>,
    {
        self.builder = self.builder.set_override(key, value)?;
        Ok(self)
    }

    pub fn build(self) -> Result<Settings, ConfigError> {
        self.builder.build()?.try_deserialize()
    }
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}
