//! Rendering raw results into display records.
//!
//! Formatting is a pure function of its input: the same `RawResult` always
//! renders to the same bytes. Key order follows the payload (serde_json is
//! built with `preserve_order`) and indentation is fixed at four spaces.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_json::ser::PrettyFormatter;

use crate::dispatch::RawResult;
use crate::error::{Error, FormattingError};

/// MIME type of rendered success payloads.
pub const JSON_MIME: &str = "text/x-json";

/// MIME type of rendered error records.
pub const ERROR_MIME: &str = "application/vnd.code.notebook.error";

/// What kind of failure an error record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Extraction,
    Validation,
    Transport,
    Operation,
    Formatting,
    Config,
    Cancelled,
}

impl ErrorKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Extraction => "ExtractionError",
            Self::Validation => "ValidationError",
            Self::Transport => "TransportError",
            Self::Operation => "OperationError",
            Self::Formatting => "FormattingError",
            Self::Config => "ConfigError",
            Self::Cancelled => "Cancelled",
        }
    }
}

/// Source location reported by a server error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorLocation {
    pub line: u64,
    pub column: u64,
}

/// One entry of a GraphQL `errors` array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub locations: Vec<ErrorLocation>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub path: Vec<Value>,
}

impl ErrorDetail {
    fn render(&self) -> String {
        let mut line = self.message.clone();
        for loc in &self.locations {
            line.push_str(&format!(" (line {}, column {})", loc.line, loc.column));
        }
        if !self.path.is_empty() {
            let path: Vec<String> = self
                .path
                .iter()
                .map(|seg| match seg {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect();
            line.push_str(&format!(" at {}", path.join(".")));
        }
        line
    }
}

/// A rendered error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub kind: ErrorKind,
    /// Summary message.
    pub message: String,
    /// Individual server errors, for operation errors.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<ErrorDetail>,
    /// Rendered partial `data` delivered alongside the errors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partial_data: Option<String>,
}

impl ErrorRecord {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: Vec::new(),
            partial_data: None,
        }
    }

    /// Record for an error raised before or outside dispatch.
    pub fn from_error(error: &Error) -> Self {
        let kind = match error {
            Error::Extraction(_) => ErrorKind::Extraction,
            Error::Validation(_) => ErrorKind::Validation,
            Error::Transport(_) => ErrorKind::Transport,
            Error::Formatting(_) => ErrorKind::Formatting,
            Error::Config(_) => ErrorKind::Config,
            Error::Cancelled => ErrorKind::Cancelled,
            Error::InvalidTransition(_) | Error::Aborted(_) => ErrorKind::Operation,
        };
        Self::new(kind, error.to_string())
    }

    /// Plain-text rendering.
    pub fn text(&self) -> String {
        let mut out = format!("{}: {}", self.kind.name(), self.message);
        for detail in &self.details {
            out.push_str("\n  - ");
            out.push_str(&detail.render());
        }
        if let Some(data) = &self.partial_data {
            out.push_str("\ndata: ");
            out.push_str(data);
        }
        out
    }
}

/// One renderable output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputRecord {
    /// Rendered `data` payload.
    Data { mime: String, text: String },
    /// Error record.
    Error(ErrorRecord),
}

impl OutputRecord {
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    pub fn mime(&self) -> &str {
        match self {
            Self::Data { mime, .. } => mime,
            Self::Error(_) => ERROR_MIME,
        }
    }

    /// Display text of the record.
    pub fn text(&self) -> String {
        match self {
            Self::Data { text, .. } => text.clone(),
            Self::Error(record) => record.text(),
        }
    }
}

/// Turns raw results into output records.
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputFormatter;

impl OutputFormatter {
    pub fn new() -> Self {
        Self
    }

    /// Render one raw result. Never fails: malformed bodies become a
    /// `FormattingError` record.
    pub fn format(&self, raw: &RawResult) -> OutputRecord {
        let result = match raw {
            RawResult::Data(body) => format_data(body),
            RawResult::OperationError(body) => format_operation_error(body),
            RawResult::Transport(e) => Ok(OutputRecord::Error(ErrorRecord::new(
                ErrorKind::Transport,
                e.to_string(),
            ))),
        };

        result.unwrap_or_else(|e| {
            tracing::debug!("formatting failed: {}", e);
            OutputRecord::Error(ErrorRecord::new(ErrorKind::Formatting, e.to_string()))
        })
    }
}

fn parse_object(body: &str) -> Result<serde_json::Map<String, Value>, FormattingError> {
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(FormattingError("response body is not a JSON object".to_string())),
        Err(e) => Err(FormattingError(format!("response body is not valid JSON: {}", e))),
    }
}

fn format_data(body: &str) -> Result<OutputRecord, FormattingError> {
    let object = parse_object(body)?;
    let data = object
        .get("data")
        .ok_or_else(|| FormattingError("response has no `data` field".to_string()))?;

    Ok(OutputRecord::Data {
        mime: JSON_MIME.to_string(),
        text: render(data)?,
    })
}

fn format_operation_error(body: &str) -> Result<OutputRecord, FormattingError> {
    let object = parse_object(body)?;
    let errors = object
        .get("errors")
        .cloned()
        .ok_or_else(|| FormattingError("response has no `errors` field".to_string()))?;
    let details: Vec<ErrorDetail> = serde_json::from_value(errors)
        .map_err(|e| FormattingError(format!("malformed `errors` array: {}", e)))?;

    let message = match details.as_slice() {
        [only] => only.message.clone(),
        many => format!("{} errors returned by the server", many.len()),
    };

    let partial_data = match object.get("data") {
        None | Some(Value::Null) => None,
        Some(data) => Some(render(data)?),
    };

    Ok(OutputRecord::Error(ErrorRecord {
        kind: ErrorKind::Operation,
        message,
        details,
        partial_data,
    }))
}

/// Pretty-print with four-space indentation.
fn render(value: &Value) -> Result<String, FormattingError> {
    let mut buf = Vec::new();
    let formatter = PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value
        .serialize(&mut ser)
        .map_err(|e| FormattingError(e.to_string()))?;
    String::from_utf8(buf).map_err(|e| FormattingError(e.to_string()))
}
