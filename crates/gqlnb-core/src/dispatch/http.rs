//! HTTP transport: JSON POST for single-shot operations, GraphQL over
//! Server-Sent Events for subscriptions.

use std::time::Duration;

use eventsource_stream::Eventsource;
use futures::StreamExt;
use futures::stream::BoxStream;
use reqwest::header::{ACCEPT, CONTENT_TYPE};

use super::{DispatchItem, DispatchRequest, Dispatcher, RawResult};
use crate::config::ExecutionConfig;
use crate::error::{Result, TransportError};
use crate::execute::CancelToken;

/// Dispatcher speaking GraphQL over HTTP.
#[derive(Debug, Clone)]
pub struct HttpDispatcher {
    client: reqwest::Client,
    request_timeout: Duration,
}

impl HttpDispatcher {
    pub fn new(config: &ExecutionConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| TransportError::Request(e.to_string()))?;

        Ok(Self {
            client,
            request_timeout: config.request_timeout,
        })
    }

    fn request(client: &reqwest::Client, request: &DispatchRequest) -> reqwest::RequestBuilder {
        let mut builder = client
            .post(&request.endpoint.url)
            .header(CONTENT_TYPE, "application/json");
        for (name, value) in &request.endpoint.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder.json(&request.body())
    }
}

impl Dispatcher for HttpDispatcher {
    fn dispatch(&self, request: DispatchRequest, cancel: CancelToken) -> BoxStream<'static, DispatchItem> {
        let client = self.client.clone();
        let timeout = self.request_timeout;

        tracing::debug!(
            endpoint = %request.endpoint.url,
            kind = %request.kind,
            operation = request.operation_name.as_deref().unwrap_or("<anonymous>"),
            "dispatching operation"
        );

        if request.kind.is_streaming() {
            subscribe(client, request, cancel).boxed()
        } else {
            async_stream::stream! {
                let send = Self::request(&client, &request).timeout(timeout).send();
                let result = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return,
                    result = exchange(send) => result,
                };
                tracing::debug!(error = result.is_error(), "single-shot dispatch finished");
                yield DispatchItem::Result(result);
            }
            .boxed()
        }
    }
}

async fn exchange(
    send: impl Future<Output = reqwest::Result<reqwest::Response>>,
) -> RawResult {
    let response = match send.await {
        Ok(response) => response,
        Err(e) => return RawResult::Transport(e.into()),
    };
    read_body(response).await
}

async fn read_body(response: reqwest::Response) -> RawResult {
    let status = response.status().as_u16();
    match response.text().await {
        Ok(body) => RawResult::from_response(status, body),
        Err(e) => RawResult::Transport(e.into()),
    }
}

fn is_event_stream(response: &reqwest::Response) -> bool {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim_start().starts_with("text/event-stream"))
}

fn subscribe(
    client: reqwest::Client,
    request: DispatchRequest,
    cancel: CancelToken,
) -> impl futures::Stream<Item = DispatchItem> + Send + 'static {
    async_stream::stream! {
        let send = HttpDispatcher::request(&client, &request)
            .header(ACCEPT, "text/event-stream")
            .send();
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            response = send => response,
        };

        let response = match response {
            Ok(response) => response,
            Err(e) => {
                yield DispatchItem::Result(RawResult::Transport(e.into()));
                return;
            }
        };

        if !response.status().is_success() || !is_event_stream(&response) {
            tracing::debug!(status = %response.status(), "subscription answered without an event stream");
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                result = read_body(response) => result,
            };
            yield DispatchItem::Response(result);
            return;
        }

        yield DispatchItem::Connected;

        let mut events = response.bytes_stream().eventsource();
        let mut delivered = 0usize;
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::debug!(delivered, "subscription cancelled");
                    break;
                }
                next = events.next() => next,
            };

            match next {
                Some(Ok(event)) => {
                    // Unnamed events arrive as "message".
                    if event.event == "next" || event.event == "message" {
                        delivered += 1;
                        yield DispatchItem::Result(RawResult::from_response(200, event.data));
                    }
                }
                Some(Err(e)) => {
                    yield DispatchItem::Result(RawResult::Transport(TransportError::Stream(e.to_string())));
                    break;
                }
                None => {
                    tracing::debug!(delivered, "subscription closed by server");
                    break;
                }
            }
        }
    }
}
