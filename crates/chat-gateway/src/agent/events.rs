//! Agent response stream events.
//!
//! Each event is one JSON record. Only `chunk.bytes` matters to the gateway;
//! other event kinds (trace, return control, ...) deserialize with no chunk
//! and are ignored. On the wire `bytes` is base64.

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Deserializer};

/// One record of the agent's response stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AgentEvent {
    #[serde(default)]
    pub chunk: Option<Chunk>,
}

/// A partial response payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Chunk {
    /// Raw payload; expected to be UTF-8 JSON carrying `outputText`.
    #[serde(default, deserialize_with = "deserialize_base64")]
    pub bytes: Option<Vec<u8>>,
}

impl AgentEvent {
    /// Event carrying `bytes` as its chunk payload.
    pub fn chunk(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            chunk: Some(Chunk {
                bytes: Some(bytes.into()),
            }),
        }
    }

    /// Event carrying `{"outputText": text}`.
    pub fn output_text(text: &str) -> Self {
        Self::chunk(serde_json::json!({ "outputText": text }).to_string())
    }

    /// Payload bytes, if this event carries any.
    pub fn payload(&self) -> Option<&[u8]> {
        self.chunk.as_ref()?.bytes.as_deref()
    }
}

fn deserialize_base64<'de, D>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error>
where
    D: Deserializer<'de>,
{
    let encoded: Option<String> = Option::deserialize(deserializer)?;
    encoded
        .map(|value| STANDARD.decode(value).map_err(serde::de::Error::custom))
        .transpose()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_event_decodes_base64() {
        let encoded = STANDARD.encode(r#"{"outputText":"Hello"}"#);
        let json = format!(r#"{{"chunk":{{"bytes":"{encoded}"}}}}"#);

        let event: AgentEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(event.payload().unwrap(), br#"{"outputText":"Hello"}"#);
    }

    #[test]
    fn test_other_events_have_no_payload() {
        for json in [
            r#"{}"#,
            r#"{"trace":{"orchestrationTrace":{}}}"#,
            r#"{"chunk":{}}"#,
            r#"{"chunk":{"bytes":null}}"#,
        ] {
            let event: AgentEvent = serde_json::from_str(json).unwrap();
            assert!(event.payload().is_none(), "{json} should carry no payload");
        }
    }

    #[test]
    fn test_invalid_base64_is_an_error() {
        assert!(serde_json::from_str::<AgentEvent>(r#"{"chunk":{"bytes":"***"}}"#).is_err());
    }

    #[test]
    fn test_output_text_constructor() {
        let event = AgentEvent::output_text("Hi \"there\"");
        let payload: serde_json::Value = serde_json::from_slice(event.payload().unwrap()).unwrap();
        assert_eq!(payload["outputText"], "Hi \"there\"");
    }
}
