use std::io;

use thiserror::Error;

/// Errors produced by the mutation engine and its cache.
#[derive(Debug, Error)]
pub enum Error {
    /// The source could not be parsed. Fatal for the whole file: a partial
    /// mutation set is not usable.
    #[error("failed to parse {filename}: {detail}")]
    Parse { filename: String, detail: String },

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("cache error: {0}")]
    Cache(String),

    /// An operator claimed to have mutated the source but the serialized
    /// output is identical to the input. Always a bug in an operator.
    #[error("mutation recorded but source is unchanged in {0}")]
    UnchangedMutation(String),

    #[error("{0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
