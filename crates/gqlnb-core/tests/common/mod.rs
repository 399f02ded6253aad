//! Shared fixtures: a local GraphQL server and a recording dispatcher.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::convert::Infallible;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use futures::stream::{self, BoxStream, StreamExt};
use serde_json::{Value, json};

use gqlnb_core::{
    CancelToken, CellExecution, CellSummary, DispatchItem, DispatchRequest, Dispatcher,
    EndpointDescriptor, ExecutionEvent, OutputEvent,
};

/// A GraphQL server answering by operation name:
///
/// - `Fail`: operation error with a location
/// - `Malformed`: a 200 response that is not JSON
/// - `Down`: HTTP 503 with a plain-text body
/// - `Slow`: answers after two seconds
/// - anything else: `{"data": {"operation": <name>, "variables": <variables>}}`
///
/// Subscriptions (requests accepting `text/event-stream`):
///
/// - `Ticks`: three `next` events, then the stream stays open
/// - `Finite`: two `next` events, then the server closes
/// - `Flaky`: one `next` event carrying errors, one good event, then closes
/// - `Garbled`: one `next` event that is not JSON, then closes
/// - `Unsupported`: a plain `200 application/json` errors body, no stream
pub struct TestServer {
    pub url: String,
    requests: Arc<Mutex<Vec<Value>>>,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    pub async fn start() -> Self {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new()
            .route("/graphql", post(graphql))
            .with_state(requests.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            url: format!("http://{}/graphql", addr),
            requests,
            handle,
        }
    }

    /// Request bodies received so far, in arrival order.
    pub fn requests(&self) -> Vec<Value> {
        self.requests.lock().unwrap().clone()
    }

    pub fn endpoint(&self) -> EndpointDescriptor {
        endpoint(&self.url)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub fn endpoint(url: &str) -> EndpointDescriptor {
    let mut headers = BTreeMap::new();
    headers.insert("x-notebook".to_string(), "tests".to_string());
    EndpointDescriptor {
        name: "default".to_string(),
        url: url.to_string(),
        headers,
        project: "default".to_string(),
        config_dir: PathBuf::from("/tests"),
        is_default: true,
    }
}

/// URL of a port nothing listens on.
pub async fn closed_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}/graphql", addr)
}

/// URL of a server that answers every request with `status` and a body cut
/// short of its declared length.
pub async fn truncated_url(status: u16) -> String {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                // Read the whole request so closing does not reset the connection.
                let mut buf = Vec::new();
                let mut chunk = [0u8; 1024];
                loop {
                    let n = socket.read(&mut chunk).await.unwrap_or(0);
                    if n == 0 {
                        return;
                    }
                    buf.extend_from_slice(&chunk[..n]);
                    let text = String::from_utf8_lossy(&buf).to_string();
                    let Some(head_end) = text.find("\r\n\r\n") else {
                        continue;
                    };
                    let length = text[..head_end]
                        .lines()
                        .find_map(|l| {
                            let (name, value) = l.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())?
                        })
                        .unwrap_or(0);
                    if buf.len() >= head_end + 4 + length {
                        break;
                    }
                }

                let response = format!(
                    "HTTP/1.1 {} Error\r\ncontent-type: application/json\r\ncontent-length: 100\r\n\r\n{{\"errors\"",
                    status
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });
    format!("http://{}/graphql", addr)
}

async fn graphql(
    State(requests): State<Arc<Mutex<Vec<Value>>>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    requests.lock().unwrap().push(body.clone());

    let operation = body["operationName"].as_str().unwrap_or("").to_string();
    let streaming = headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("text/event-stream"));

    if streaming {
        if operation == "Unsupported" {
            return Json(json!({"errors": [{"message": "subscriptions not supported"}]})).into_response();
        }
        return subscription(&operation).into_response();
    }

    match operation.as_str() {
        "Fail" => Json(json!({
            "errors": [{"message": "boom", "locations": [{"line": 1, "column": 1}], "path": ["b"]}],
            "data": null
        }))
        .into_response(),
        "Malformed" => "this is not json".into_response(),
        "Down" => (StatusCode::SERVICE_UNAVAILABLE, "unavailable").into_response(),
        "Slow" => {
            tokio::time::sleep(Duration::from_secs(2)).await;
            Json(json!({"data": {"slow": true}})).into_response()
        }
        _ => Json(json!({
            "data": {"operation": operation, "variables": body["variables"].clone()}
        }))
        .into_response(),
    }
}

fn next_event(data: Value) -> Result<Event, Infallible> {
    Ok(Event::default().event("next").data(data.to_string()))
}

fn subscription(operation: &str) -> Sse<BoxStream<'static, Result<Event, Infallible>>> {
    let events: BoxStream<'static, Result<Event, Infallible>> = match operation {
        "Ticks" => stream::iter((1..=3).map(|n| next_event(json!({"data": {"tick": n}}))))
            .chain(stream::pending())
            .boxed(),
        "Finite" => stream::iter((1..=2).map(|n| next_event(json!({"data": {"tick": n}}))))
            .chain(stream::once(async {
                Ok(Event::default().event("complete").data(""))
            }))
            .boxed(),
        "Flaky" => stream::iter(vec![
            next_event(json!({"errors": [{"message": "tick failed"}]})),
            next_event(json!({"data": {"tick": 2}})),
        ])
        .boxed(),
        "Garbled" => stream::once(async { Ok(Event::default().event("next").data("not json")) }).boxed(),
        _ => stream::empty().boxed(),
    };
    Sse::new(events)
}

/// Dispatcher that records calls and answers every request with one result.
#[derive(Default)]
pub struct RecordingDispatcher {
    calls: AtomicUsize,
}

impl RecordingDispatcher {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Dispatcher for RecordingDispatcher {
    fn dispatch(&self, _request: DispatchRequest, _cancel: CancelToken) -> BoxStream<'static, DispatchItem> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        stream::once(async {
            DispatchItem::Result(gqlnb_core::RawResult::Data(r#"{"data":{}}"#.to_string()))
        })
        .boxed()
    }
}

/// Drain an execution, with a timeout guarding against hangs.
pub async fn collect(mut execution: CellExecution) -> (Vec<ExecutionEvent>, CellSummary) {
    tokio::time::timeout(Duration::from_secs(10), async move {
        let mut events = Vec::new();
        while let Some(event) = execution.next_event().await {
            events.push(event);
        }
        let summary = execution.wait().await.unwrap();
        (events, summary)
    })
    .await
    .expect("execution did not finish")
}

pub fn outputs(events: &[ExecutionEvent]) -> Vec<OutputEvent> {
    events
        .iter()
        .filter_map(|e| match e {
            ExecutionEvent::Output { output, .. } => Some(output.clone()),
            _ => None,
        })
        .collect()
}
