use std::sync::mpsc::RecvError;

use thiserror::Error;

pub use anyhow::Context;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),
    #[error("XML parse error: {0}")]
    Xml(#[from] roxmltree::Error),
    #[error(transparent)]
    Recv(#[from] RecvError),
    #[error("operation cancelled by user")]
    Cancelled,
    #[error("API error {code}: {message}")]
    Api { code: String, message: String },
    #[error("missing input: {0}")]
    MissingInput(String),
    #[error("a fetch job is already running")]
    JobInProgress,
    #[error("{0}")]
    Message(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AppError {
    pub fn message<T: Into<String>>(msg: T) -> Self {
        AppError::Message(msg.into())
    }

    pub fn missing<T: Into<String>>(what: T) -> Self {
        AppError::MissingInput(what.into())
    }

    pub fn api(code: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Api {
            code: code.into(),
            message: message.into(),
        }
    }
}
