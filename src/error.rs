use thiserror::Error;

use crate::config::ConfigError;
use crate::eval::Failure;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    // snippet failed; carries the structured failure untouched
    #[error("Evaluation failed: {0}")]
    Failure(#[from] Failure),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type AdminResult<T> = Result<T, Error>;

impl Error {
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Error::Internal(message.into())
    }
}
