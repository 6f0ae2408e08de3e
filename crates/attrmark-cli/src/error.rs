use std::io;

use config::ConfigError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("failed to read {name}")]
    Read {
        name: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to write {name}")]
    Write {
        name: String,
        #[source]
        source: io::Error,
    },
    #[error("invalid configuration")]
    Config(#[from] ConfigError),
}
