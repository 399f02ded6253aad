//! Sending one operation to one endpoint.
//!
//! Every dispatch returns a stream, whatever the operation kind:
//!
//! - query / mutation: exactly one `DispatchItem::Result`, then the stream ends.
//! - subscription: a `Connected` marker once the server accepted the stream,
//!   then one `Result` per server message until the remote end closes, a
//!   transport error occurs, or the cancel token fires. A server that answers
//!   with a plain response instead of an event stream yields a single
//!   `Response` and no `Connected`.
//!
//! Dropping the stream aborts the underlying request.

mod http;

use std::sync::Arc;

use futures::stream::BoxStream;
use serde_json::{Value, json};

use crate::endpoints::EndpointDescriptor;
use crate::error::TransportError;
use crate::execute::CancelToken;
use crate::extract::{ExtractedOperation, OperationKind};
use crate::variables::ResolvedVariables;

pub use http::HttpDispatcher;

/// A raw result, classified but not yet rendered.
#[derive(Debug, Clone)]
pub enum RawResult {
    /// A response body without errors.
    Data(String),
    /// A well-formed body carrying a non-empty `errors` array.
    OperationError(String),
    /// Connection-level failure. Always the last item of its stream.
    Transport(TransportError),
}

impl RawResult {
    /// Classify a response body.
    ///
    /// Bodies with errors are operation errors whatever the status. A failed
    /// status without a GraphQL body is a transport error. Anything else is
    /// data, including unparsable bodies, which the formatter reports.
    pub fn from_response(status: u16, body: String) -> Self {
        let parsed = serde_json::from_str::<Value>(&body).ok();
        let has_errors = parsed
            .as_ref()
            .and_then(|v| v.get("errors"))
            .and_then(Value::as_array)
            .is_some_and(|errors| !errors.is_empty());
        let has_data = parsed.as_ref().is_some_and(|v| v.get("data").is_some());

        if has_errors {
            RawResult::OperationError(body)
        } else if (200..300).contains(&status) || has_data {
            RawResult::Data(body)
        } else {
            RawResult::Transport(TransportError::Status {
                status,
                body: body.trim().to_string(),
            })
        }
    }

    pub fn is_error(&self) -> bool {
        !matches!(self, RawResult::Data(_))
    }

    pub fn is_transport_error(&self) -> bool {
        matches!(self, RawResult::Transport(_))
    }
}

/// One item of a dispatch stream.
#[derive(Debug, Clone)]
pub enum DispatchItem {
    /// The subscription stream is open.
    Connected,
    /// A result to format.
    Result(RawResult),
    /// A subscription answered without a stream; nothing follows.
    Response(RawResult),
}

/// Everything needed to send one operation.
#[derive(Debug, Clone)]
pub struct DispatchRequest {
    pub endpoint: EndpointDescriptor,
    /// Full literal text, so fragments resolve.
    pub query: Arc<str>,
    pub operation_name: Option<String>,
    pub variables: ResolvedVariables,
    pub kind: OperationKind,
}

impl DispatchRequest {
    pub fn new(
        endpoint: EndpointDescriptor,
        operation: &ExtractedOperation,
        variables: ResolvedVariables,
    ) -> Self {
        Self {
            endpoint,
            query: operation.document_text.clone(),
            operation_name: operation.name.clone(),
            variables,
            kind: operation.kind,
        }
    }

    /// JSON request body, shared by both transports.
    pub fn body(&self) -> Value {
        json!({
            "query": &*self.query,
            "variables": self.variables.to_json(),
            "operationName": self.operation_name,
        })
    }
}

/// Sends operations to endpoints.
pub trait Dispatcher: Send + Sync {
    /// Start dispatching. Nothing is sent until the stream is polled.
    fn dispatch(&self, request: DispatchRequest, cancel: CancelToken) -> BoxStream<'static, DispatchItem>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_success() {
        let raw = RawResult::from_response(200, r#"{"data":{"a":1}}"#.to_string());
        assert!(matches!(raw, RawResult::Data(_)));
    }

    #[test]
    fn test_classify_errors_any_status() {
        let body = r#"{"errors":[{"message":"boom"}]}"#;
        assert!(matches!(
            RawResult::from_response(200, body.to_string()),
            RawResult::OperationError(_)
        ));
        assert!(matches!(
            RawResult::from_response(400, body.to_string()),
            RawResult::OperationError(_)
        ));
    }

    #[test]
    fn test_classify_empty_errors_is_data() {
        let raw = RawResult::from_response(200, r#"{"data":null,"errors":[]}"#.to_string());
        assert!(matches!(raw, RawResult::Data(_)));
    }

    #[test]
    fn test_classify_status_without_body() {
        let raw = RawResult::from_response(502, "Bad Gateway\n".to_string());
        match raw {
            RawResult::Transport(TransportError::Status { status, body }) => {
                assert_eq!(status, 502);
                assert_eq!(body, "Bad Gateway");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_malformed_success_body_passes_through() {
        let raw = RawResult::from_response(200, "<html>".to_string());
        assert!(matches!(raw, RawResult::Data(_)));
    }

    #[test]
    fn test_request_body() {
        let mut variables = ResolvedVariables::new();
        variables.insert("id", json!("1"));
        let request = DispatchRequest {
            endpoint: EndpointDescriptor {
                name: "default".to_string(),
                url: "http://x".to_string(),
                headers: Default::default(),
                project: "default".to_string(),
                config_dir: Default::default(),
                is_default: true,
            },
            query: Arc::from("query Q($id: ID!) { node(id: $id) { id } }"),
            operation_name: Some("Q".to_string()),
            variables,
            kind: OperationKind::Query,
        };
        assert_eq!(
            request.body(),
            json!({
                "query": "query Q($id: ID!) { node(id: $id) { id } }",
                "variables": {"id": "1"},
                "operationName": "Q"
            })
        );
    }
}
