//! Response aggregation: fold an agent event stream into one answer.
//!
//! One pass, no retries. The result is always a string:
//! - a stream error or an undecodable payload aborts with [`APOLOGY_RESPONSE`]
//!   and discards any text accumulated so far
//! - a payload that names `outputText` without a string value aborts the
//!   same way
//! - any other payload without `outputText` is skipped
//! - a clean pass with only whitespace yields [`EMPTY_RESPONSE`]
//! - otherwise the accumulated text is returned trimmed

use crate::agent::events::AgentEvent;
use crate::observability::metrics::{record_aggregation, AggregationOutcome};
use futures::{Stream, StreamExt};
use std::fmt::Display;

/// Returned when the stream fails mid-way.
pub const APOLOGY_RESPONSE: &str =
    "I apologize, but I encountered an issue processing the response. Please try again.";

/// Returned when a clean pass produced no text.
pub const EMPTY_RESPONSE: &str =
    "I apologize, but I couldn't generate a response to your question. Please try rephrasing or ask something else.";

/// A chunk payload could not be decoded, or named `outputText` without text.
#[derive(Debug)]
struct StreamDecodeError(String);

const OUTPUT_TEXT: &str = "outputText";

/// Pull the text fragment out of a decoded chunk.
///
/// `Ok(None)` means the chunk carries no text and is skipped. A chunk that
/// names `outputText` but cannot yield a string from it is malformed.
fn output_text(decoded: &serde_json::Value) -> Result<Option<&str>, StreamDecodeError> {
    use serde_json::Value;

    match decoded {
        Value::Object(map) => match map.get(OUTPUT_TEXT) {
            None => Ok(None),
            Some(Value::String(text)) => Ok(Some(text.as_str())),
            Some(other) => Err(StreamDecodeError(format!(
                "outputText is not a string: {other}"
            ))),
        },
        Value::Array(items) if items.iter().any(|item| item.as_str() == Some(OUTPUT_TEXT)) => {
            Err(StreamDecodeError(
                "outputText listed in an array payload".to_string(),
            ))
        }
        Value::String(text) if text.contains(OUTPUT_TEXT) => Err(StreamDecodeError(
            "outputText named in a string payload".to_string(),
        )),
        _ => Ok(None),
    }
}

#[derive(Default)]
struct Accumulator {
    text: String,
    chunks: usize,
}

impl Accumulator {
    fn push(&mut self, event: &AgentEvent) -> Result<(), StreamDecodeError> {
        let Some(payload) = event.payload() else {
            return Ok(());
        };

        let decoded: serde_json::Value = std::str::from_utf8(payload)
            .map_err(|e| StreamDecodeError(format!("payload is not UTF-8: {e}")))
            .and_then(|text| {
                serde_json::from_str(text)
                    .map_err(|e| StreamDecodeError(format!("payload is not JSON: {e}")))
            })?;

        match output_text(&decoded)? {
            Some(text) => {
                self.text.push_str(text);
                self.chunks += 1;
            }
            None => {
                tracing::debug!(target: "gateway.agent.aggregator", "Skipping chunk without outputText");
            }
        }

        Ok(())
    }

    fn finish(self) -> String {
        let trimmed = self.text.trim();

        if trimmed.is_empty() {
            tracing::warn!(target: "gateway.agent.aggregator", "Agent produced no output text");
            record_aggregation(AggregationOutcome::Empty);
            return EMPTY_RESPONSE.to_string();
        }

        tracing::debug!(
            target: "gateway.agent.aggregator",
            chunks = self.chunks,
            length = trimmed.len(),
            "Aggregated agent response"
        );
        record_aggregation(AggregationOutcome::Complete);
        trimmed.to_string()
    }
}

fn abort(error: &dyn Display) -> String {
    tracing::error!(target: "gateway.agent.aggregator", error = %error, "Error processing agent response");
    record_aggregation(AggregationOutcome::Aborted);
    APOLOGY_RESPONSE.to_string()
}

/// Fold a fallible sequence of events into the final answer.
pub fn aggregate<I, E>(events: I) -> String
where
    I: IntoIterator<Item = Result<AgentEvent, E>>,
    E: Display,
{
    let mut acc = Accumulator::default();

    for event in events {
        let event = match event {
            Ok(event) => event,
            Err(e) => return abort(&e),
        };
        if let Err(e) = acc.push(&event) {
            return abort(&e.0);
        }
    }

    acc.finish()
}

/// Async twin of [`aggregate`] for the streaming agent client.
pub async fn aggregate_stream<S, E>(events: S) -> String
where
    S: Stream<Item = Result<AgentEvent, E>>,
    E: Display,
{
    let mut events = std::pin::pin!(events);
    let mut acc = Accumulator::default();

    while let Some(event) = events.next().await {
        let event = match event {
            Ok(event) => event,
            Err(e) => return abort(&e),
        };
        if let Err(e) = acc.push(&event) {
            return abort(&e.0);
        }
    }

    acc.finish()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::errors::AgentError;

    fn ok(event: AgentEvent) -> Result<AgentEvent, AgentError> {
        Ok(event)
    }

    #[test]
    fn test_concatenates_output_text() {
        let events = vec![
            ok(AgentEvent::chunk(r#"{"outputText":"Hello "}"#)),
            ok(AgentEvent::chunk(r#"{"outputText":"world"}"#)),
        ];

        assert_eq!(aggregate(events), "Hello world");
    }

    #[test]
    fn test_empty_sequence() {
        assert_eq!(aggregate(Vec::<Result<AgentEvent, AgentError>>::new()), EMPTY_RESPONSE);
    }

    #[test]
    fn test_whitespace_only() {
        let events = vec![
            ok(AgentEvent::output_text("  ")),
            ok(AgentEvent::output_text("\n\t")),
        ];
        assert_eq!(aggregate(events), EMPTY_RESPONSE);
    }

    #[test]
    fn test_result_is_trimmed() {
        let events = vec![
            ok(AgentEvent::output_text("\n  The answer")),
            ok(AgentEvent::output_text(" is 42.  \n")),
        ];
        assert_eq!(aggregate(events), "The answer is 42.");
    }

    #[test]
    fn test_invalid_json_aborts() {
        let events = vec![
            ok(AgentEvent::output_text("partial text")),
            ok(AgentEvent::chunk("not json at all")),
            ok(AgentEvent::output_text("never seen")),
        ];
        assert_eq!(aggregate(events), APOLOGY_RESPONSE);
    }

    #[test]
    fn test_invalid_utf8_aborts() {
        let events = vec![ok(AgentEvent::chunk(vec![0xffu8, 0xfe, 0x7b]))];
        assert_eq!(aggregate(events), APOLOGY_RESPONSE);
    }

    #[test]
    fn test_item_error_aborts() {
        let events = vec![
            ok(AgentEvent::output_text("Hello")),
            Err(AgentError::Decode("bad line".to_string())),
        ];
        assert_eq!(aggregate(events), APOLOGY_RESPONSE);
    }

    #[test]
    fn test_chunks_without_output_text_are_skipped() {
        let events = vec![
            ok(AgentEvent::default()),
            ok(AgentEvent::chunk(r#"{"citations":[]}"#)),
            ok(AgentEvent::chunk(r#"["citations"]"#)),
            ok(AgentEvent::chunk(r#""a string""#)),
            ok(AgentEvent::chunk("42")),
            ok(AgentEvent::chunk("null")),
            ok(AgentEvent::output_text("kept")),
        ];
        assert_eq!(aggregate(events), "kept");
    }

    #[test]
    fn test_malformed_output_text_aborts() {
        let payloads = [
            r#"{"outputText":42}"#,
            r#"{"outputText":null}"#,
            r#"{"outputText":["a"]}"#,
            r#"["outputText"]"#,
            r#""has outputText inside""#,
        ];

        for payload in payloads {
            let events = vec![
                ok(AgentEvent::output_text("partial")),
                ok(AgentEvent::chunk(payload)),
                ok(AgentEvent::output_text("never seen")),
            ];
            assert_eq!(aggregate(events), APOLOGY_RESPONSE, "payload {payload}");
        }
    }

    #[tokio::test]
    async fn test_stream_malformed_output_text_aborts() {
        let events = vec![
            ok(AgentEvent::output_text("Hello")),
            ok(AgentEvent::chunk(r#"{"outputText":null}"#)),
        ];
        assert_eq!(
            aggregate_stream(futures::stream::iter(events)).await,
            APOLOGY_RESPONSE
        );
    }

    #[tokio::test]
    async fn test_stream_matches_iterator() {
        let events = vec![
            ok(AgentEvent::output_text("Hello ")),
            ok(AgentEvent::default()),
            ok(AgentEvent::output_text("world")),
        ];

        assert_eq!(
            aggregate_stream(futures::stream::iter(events.clone())).await,
            aggregate(events)
        );
    }

    #[tokio::test]
    async fn test_stream_item_error_aborts() {
        let events = vec![
            ok(AgentEvent::output_text("Hello")),
            Err(AgentError::Unavailable("connection reset".to_string())),
        ];
        assert_eq!(
            aggregate_stream(futures::stream::iter(events)).await,
            APOLOGY_RESPONSE
        );
    }

    #[tokio::test]
    async fn test_empty_stream() {
        let events = futures::stream::empty::<Result<AgentEvent, AgentError>>();
        assert_eq!(aggregate_stream(events).await, EMPTY_RESPONSE);
    }
}
