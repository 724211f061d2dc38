//! Crate-wide error type.
//!
//! Failures are never propagated past a feed boundary; the runner hands them
//! to the [`ErrorLog`](crate::status::ErrorLog), which renders the variant
//! label from [`SitefeedError::kind`] together with the `source()` chain.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SitefeedError {
    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("invalid selector `{selector}`: {message}")]
    Selector { selector: String, message: String },

    #[error("malformed feed document: {0}")]
    Xml(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("JSON decode failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML decode failed: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("feed document `{file}` has no channel element")]
    MissingChannel { file: String },
}

impl SitefeedError {
    /// Short classification label shown in the status feed.
    pub fn kind(&self) -> &'static str {
        match self {
            SitefeedError::Io(_) => "Io",
            SitefeedError::Http(_) => "Http",
            SitefeedError::Url(_) => "Url",
            SitefeedError::Selector { .. } => "Selector",
            SitefeedError::Xml(_) => "Xml",
            SitefeedError::Config(_) => "Config",
            SitefeedError::Json(_) => "Json",
            SitefeedError::Yaml(_) => "Yaml",
            SitefeedError::MissingChannel { .. } => "MissingChannel",
        }
    }

    /// Wrap any displayable XML reader/writer failure.
    pub fn xml<E: std::fmt::Display>(err: E) -> Self {
        SitefeedError::Xml(err.to_string())
    }
}
