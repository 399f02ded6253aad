//! Error types for gqlnb-core.

use std::path::PathBuf;

use thiserror::Error;

use crate::extract::SourceSpan;

/// Result type for gqlnb-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in gqlnb-core.
#[derive(Debug, Error)]
pub enum Error {
    /// An operation literal failed to parse.
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    /// A variable value failed type validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Connection-level failure talking to an endpoint.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A result body could not be rendered.
    #[error(transparent)]
    Formatting(#[from] FormattingError),

    /// No usable endpoint configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Execution was cancelled by the user.
    #[error("execution cancelled")]
    Cancelled,

    /// Invalid task state transition.
    #[error("invalid state transition: {0}")]
    InvalidTransition(String),

    /// The execution driver stopped abnormally.
    #[error("execution aborted: {0}")]
    Aborted(String),
}

/// An operation literal that could not be parsed.
#[derive(Debug, Clone, Error)]
#[error("parse error at {span}: {message}")]
pub struct ExtractionError {
    /// Span of the offending literal within the cell.
    pub span: SourceSpan,
    /// Parser message.
    pub message: String,
}

/// A variable that failed validation or casting.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid value for ${variable} ({type_name}): {message}")]
pub struct ValidationError {
    /// Variable name (without `$`).
    pub variable: String,
    /// Declared type as written in the operation.
    pub type_name: String,
    /// What was wrong with the value.
    pub message: String,
}

/// Connection-level failures. Always terminal for the affected stream.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The request could not be built or sent.
    #[error("request failed: {0}")]
    Request(String),

    /// Could not connect to the endpoint.
    #[error("connection failed: {0}")]
    Connect(String),

    /// The request timed out.
    #[error("request timed out")]
    Timeout,

    /// The server answered with a non-success status and no GraphQL body.
    #[error("server responded with HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// A streaming connection broke mid-flight.
    #[error("stream interrupted: {0}")]
    Stream(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_connect() {
            Self::Connect(e.to_string())
        } else {
            Self::Request(e.to_string())
        }
    }
}

/// A raw result body that is not well-formed structured data.
#[derive(Debug, Clone, Error)]
#[error("malformed result: {0}")]
pub struct FormattingError(pub String);

/// Endpoint configuration problems.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No config file found walking up from the document.
    #[error("no GraphQL config found for {0}")]
    NotFound(PathBuf),

    /// A config file exists but could not be read or parsed.
    #[error("invalid GraphQL config {path}: {message}")]
    Invalid { path: PathBuf, message: String },

    /// The config resolved to zero endpoints.
    #[error("no controller available: no endpoints configured for {0}")]
    NoEndpoints(PathBuf),

    /// A named endpoint was requested but is not configured.
    #[error("unknown endpoint: {0}")]
    UnknownEndpoint(String),
}

impl Error {
    /// Get a recovery hint for this error, if available.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Error::Config(ConfigError::NotFound(_)) | Error::Config(ConfigError::NoEndpoints(_)) => {
                Some("add a .graphqlrc.json with an `extensions.endpoints` entry or an http(s) `schema` URL")
            }
            Error::Transport(TransportError::Connect(_)) => {
                Some("check that the endpoint URL is reachable")
            }
            _ => None,
        }
    }

    /// Format the error with its recovery hint.
    pub fn with_hint(&self) -> String {
        match self.hint() {
            Some(hint) => format!("{}\n  hint: {}", self, hint),
            None => self.to_string(),
        }
    }
}
