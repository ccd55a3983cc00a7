//! Downstream agent runtime client.
//!
//! `POST {endpoint}/agents/{agentId}/agentAliases/{aliasId}/sessions/{sessionId}/text`
//! answers with newline-delimited JSON events. The body is read lazily, one
//! line at a time, and handed to the caller as a stream.
//!
//! # Security
//!
//! - Session attributes carry user identity; they are never logged
//! - Error messages returned to the HTTP layer are generic

use crate::agent::events::AgentEvent;
use crate::errors::AgentError;
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use reqwest::StatusCode;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};
use tokio_util::io::StreamReader;
use tracing::instrument;

/// Longest accepted event line. Chunks are small; this bounds memory.
const MAX_EVENT_LINE_BYTES: usize = 1024 * 1024;

/// Lazily decoded agent events.
pub type AgentEventStream = BoxStream<'static, Result<AgentEvent, AgentError>>;

/// One agent invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentRequest {
    pub session_id: String,
    pub input_text: String,
    /// Passed to the agent as `sessionState.sessionAttributes`.
    pub session_attributes: BTreeMap<String, String>,
}

/// Trait for agent invocation (enables mocking).
#[async_trait]
pub trait AgentClient: Send + Sync {
    /// Start an invocation and return its event stream.
    async fn invoke(&self, request: AgentRequest) -> Result<AgentEventStream, AgentError>;
}

/// HTTP client for the agent runtime.
pub struct HttpAgentClient {
    http_client: reqwest::Client,
    endpoint: String,
    agent_id: String,
    agent_alias_id: String,
}

impl HttpAgentClient {
    /// Create a client; `timeout` bounds the whole invocation including the
    /// streamed body.
    pub fn new(
        endpoint: String,
        agent_id: String,
        agent_alias_id: String,
        timeout: Duration,
    ) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(target: "gateway.agent.client", error = %e, "Failed to build HTTP client with custom config, using defaults");
                reqwest::Client::new()
            });

        Self {
            http_client,
            endpoint,
            agent_id,
            agent_alias_id,
        }
    }

    /// Invocation URL for a session. Path segments are percent-encoded.
    fn invoke_url(&self, session_id: &str) -> Result<reqwest::Url, AgentError> {
        let mut url = reqwest::Url::parse(&self.endpoint)
            .map_err(|e| AgentError::Unavailable(format!("invalid agent endpoint: {e}")))?;

        url.path_segments_mut()
            .map_err(|()| AgentError::Unavailable("agent endpoint cannot be a base".to_string()))?
            .pop_if_empty()
            .extend([
                "agents",
                self.agent_id.as_str(),
                "agentAliases",
                self.agent_alias_id.as_str(),
                "sessions",
                session_id,
                "text",
            ]);

        Ok(url)
    }
}

#[async_trait]
impl AgentClient for HttpAgentClient {
    #[instrument(skip_all, fields(session_id = %request.session_id))]
    async fn invoke(&self, request: AgentRequest) -> Result<AgentEventStream, AgentError> {
        let url = self.invoke_url(&request.session_id)?;

        let body = serde_json::json!({
            "inputText": request.input_text,
            "sessionState": {
                "sessionAttributes": request.session_attributes,
            },
        });

        let response = self
            .http_client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(target: "gateway.agent.client", error = %e, "Agent request failed");
                AgentError::Unavailable(format!("request failed: {e}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(target: "gateway.agent.client", status = %status, "Agent returned error status");
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AgentError::AccessDenied,
                StatusCode::TOO_MANY_REQUESTS => AgentError::Throttled,
                _ => AgentError::Unavailable(format!("status {status}")),
            });
        }

        let reader = StreamReader::new(response.bytes_stream().map_err(std::io::Error::other));
        let lines = FramedRead::new(reader, LinesCodec::new_with_max_length(MAX_EVENT_LINE_BYTES));

        let events = lines.filter_map(|line| async move {
            match line {
                Ok(line) if line.trim().is_empty() => None,
                Ok(line) => Some(
                    serde_json::from_str::<AgentEvent>(&line)
                        .map_err(|e| AgentError::Decode(e.to_string())),
                ),
                Err(LinesCodecError::MaxLineLengthExceeded) => Some(Err(AgentError::Decode(
                    "event line too long".to_string(),
                ))),
                Err(LinesCodecError::Io(e)) => Some(Err(AgentError::Unavailable(format!(
                    "stream interrupted: {e}"
                )))),
            }
        });

        Ok(events.boxed())
    }
}

/// Mock agent client module for testing.
pub mod mock {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Mock agent client that replays scripted stream items.
    pub struct MockAgentClient {
        items: Vec<Result<AgentEvent, AgentError>>,
        error: Option<AgentError>,
        call_count: AtomicUsize,
        last_request: Mutex<Option<AgentRequest>>,
    }

    impl MockAgentClient {
        /// Stream one `outputText` chunk per entry.
        pub fn with_text(chunks: &[&str]) -> Self {
            Self::with_items(
                chunks
                    .iter()
                    .map(|text| Ok(AgentEvent::output_text(text)))
                    .collect(),
            )
        }

        /// Stream the given items verbatim, errors included.
        pub fn with_items(items: Vec<Result<AgentEvent, AgentError>>) -> Self {
            Self {
                items,
                error: None,
                call_count: AtomicUsize::new(0),
                last_request: Mutex::new(None),
            }
        }

        /// Fail every invocation before any event.
        pub fn failing(error: AgentError) -> Self {
            Self {
                items: vec![],
                error: Some(error),
                call_count: AtomicUsize::new(0),
                last_request: Mutex::new(None),
            }
        }

        /// Get the number of calls made.
        pub fn call_count(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }

        /// The most recent request, if any.
        pub fn last_request(&self) -> Option<AgentRequest> {
            self.last_request
                .lock()
                .ok()
                .and_then(|request| request.clone())
        }
    }

    #[async_trait]
    impl AgentClient for MockAgentClient {
        async fn invoke(&self, request: AgentRequest) -> Result<AgentEventStream, AgentError> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            if let Ok(mut last) = self.last_request.lock() {
                *last = Some(request);
            }

            if let Some(error) = &self.error {
                return Err(error.clone());
            }

            Ok(futures::stream::iter(self.items.clone()).boxed())
        }
    }

    #[cfg(test)]
    #[allow(clippy::unwrap_used, clippy::expect_used)]
    mod tests {
        use super::*;
        use crate::agent::aggregator::aggregate_stream;

        fn request() -> AgentRequest {
            AgentRequest {
                session_id: "s-1".to_string(),
                input_text: "hi".to_string(),
                session_attributes: BTreeMap::new(),
            }
        }

        #[tokio::test]
        async fn test_mock_streams_text() {
            let mock = MockAgentClient::with_text(&["Hello ", "world"]);

            let stream = mock.invoke(request()).await.unwrap();
            assert_eq!(aggregate_stream(stream).await, "Hello world");
            assert_eq!(mock.call_count(), 1);
            assert_eq!(mock.last_request().unwrap().session_id, "s-1");
        }

        #[tokio::test]
        async fn test_mock_failing() {
            let mock = MockAgentClient::failing(AgentError::Throttled);

            assert!(matches!(
                mock.invoke(request()).await,
                Err(AgentError::Throttled)
            ));
            assert_eq!(mock.call_count(), 1);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::agent::aggregator::{aggregate_stream, APOLOGY_RESPONSE};
    use base64::{engine::general_purpose::STANDARD, Engine};
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SESSION_PATH: &str = "/agents/AGENT/agentAliases/ALIAS/sessions/session-1/text";

    fn client(endpoint: &str) -> HttpAgentClient {
        HttpAgentClient::new(
            endpoint.to_string(),
            "AGENT".to_string(),
            "ALIAS".to_string(),
            Duration::from_secs(5),
        )
    }

    fn request() -> AgentRequest {
        AgentRequest {
            session_id: "session-1".to_string(),
            input_text: "What is Rust?".to_string(),
            session_attributes: BTreeMap::from([("userId".to_string(), "user-123".to_string())]),
        }
    }

    fn chunk_line(payload: &str) -> String {
        format!(r#"{{"chunk":{{"bytes":"{}"}}}}"#, STANDARD.encode(payload))
    }

    #[test]
    fn test_invoke_url_encodes_segments() {
        let client = client("http://agent.internal:8090/runtime/");
        let url = client.invoke_url("a b/c").unwrap();

        assert_eq!(
            url.as_str(),
            "http://agent.internal:8090/runtime/agents/AGENT/agentAliases/ALIAS/sessions/a%20b%2Fc/text"
        );
    }

    #[tokio::test]
    async fn test_invoke_streams_events() {
        let server = MockServer::start().await;
        let body = format!(
            "{}\n\n{}\n{}\n",
            chunk_line(r#"{"outputText":"Rust is "}"#),
            r#"{"trace":{}}"#,
            chunk_line(r#"{"outputText":"a language."}"#)
        );
        Mock::given(method("POST"))
            .and(path(SESSION_PATH))
            .and(body_json(serde_json::json!({
                "inputText": "What is Rust?",
                "sessionState": {"sessionAttributes": {"userId": "user-123"}}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .expect(1)
            .mount(&server)
            .await;

        let stream = client(&server.uri()).invoke(request()).await.unwrap();
        let events: Vec<_> = stream.collect().await;

        assert_eq!(events.len(), 3);
        assert!(events.iter().all(Result::is_ok));
    }

    #[tokio::test]
    async fn test_invalid_line_is_decode_error() {
        let server = MockServer::start().await;
        let body = format!("{}\nnot-json\n", chunk_line(r#"{"outputText":"Hi"}"#));
        Mock::given(method("POST"))
            .and(path(SESSION_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;

        let stream = client(&server.uri()).invoke(request()).await.unwrap();
        let events: Vec<_> = stream.collect().await;

        assert!(events.first().unwrap().is_ok());
        assert!(matches!(events.get(1), Some(Err(AgentError::Decode(_)))));

        let stream = client(&server.uri()).invoke(request()).await.unwrap();
        assert_eq!(aggregate_stream(stream).await, APOLOGY_RESPONSE);
    }

    #[tokio::test]
    async fn test_status_mapping() {
        for (status, expected) in [
            (401, AgentError::AccessDenied),
            (403, AgentError::AccessDenied),
            (429, AgentError::Throttled),
            (503, AgentError::Unavailable("status 503 Service Unavailable".to_string())),
        ] {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .respond_with(ResponseTemplate::new(status))
                .mount(&server)
                .await;

            let result = client(&server.uri()).invoke(request()).await;
            assert_eq!(result.err(), Some(expected), "status {status}");
        }
    }

    #[tokio::test]
    async fn test_connection_failure_is_unavailable() {
        // Nothing listens on port 1
        let result = client("http://127.0.0.1:1").invoke(request()).await;
        assert!(matches!(result, Err(AgentError::Unavailable(_))));
    }
}
