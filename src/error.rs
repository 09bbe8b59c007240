use std::path::PathBuf;

use thiserror::Error;

/// Fatal errors. Anything here aborts the run before output is produced.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid domain {input:?}; expected form: <label>.<tld>")]
    InvalidDomain { input: String },

    #[error(transparent)]
    Table(#[from] TableError),

    #[error("unknown strategy '{0}'")]
    UnknownStrategy(String),

    #[error("cannot start verification: {0}")]
    Config(String),
}

/// A mapping table that cannot be trusted to produce meaningful variants.
#[derive(Debug, Error)]
pub enum TableError {
    #[error("mapping table '{table}' has no entries")]
    Empty { table: String },

    #[error("mapping table '{table}' maps {key:?} to itself")]
    Identity { table: String, key: char },

    #[error("mapping table '{table}' has an invalid replacement {value:?} for {key:?}")]
    InvalidReplacement {
        table: String,
        key: char,
        value: String,
    },

    #[error("mapping table key {key:?} in '{table}' must be a single character")]
    InvalidKey { table: String, key: String },

    #[error("failed to read mapping table {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse mapping table {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
