use max_model::{ErrorKind, ToolCallRequest};
use serde::{Deserialize, Serialize};

/// The events in a preset response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum PresetEvent {
    #[serde(rename = "message_delta")]
    MessageDelta(String),
    #[serde(rename = "tool_call")]
    ToolCall(ToolCallRequest),
}

/// How a preset response fails, if it does.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PresetFailure {
    /// `send_request` itself fails, before any event is produced.
    OnRequest(#[serde(with = "kind_repr")] ErrorKind),
    /// The stream fails after all preset events have been delivered.
    MidStream(#[serde(with = "kind_repr")] ErrorKind),
}

/// The preset response for one model call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresetResponse {
    /// Events in this response.
    pub events: Vec<PresetEvent>,
    /// If set, the response fails instead of completing.
    pub failure: Option<PresetFailure>,
}

impl PresetResponse {
    /// Creates a `PresetResponse` with the specified events.
    #[inline]
    pub fn with_events(events: impl Into<Vec<PresetEvent>>) -> Self {
        Self {
            events: events.into(),
            failure: None,
        }
    }

    /// Creates a response that streams `text` in one delta.
    #[inline]
    pub fn text<S: Into<String>>(text: S) -> Self {
        Self::with_events([PresetEvent::MessageDelta(text.into())])
    }

    /// Creates a response whose request fails with `kind`.
    #[inline]
    pub fn failing(kind: ErrorKind) -> Self {
        Self {
            events: vec![],
            failure: Some(PresetFailure::OnRequest(kind)),
        }
    }

    /// Makes the stream fail with `kind` after the events were delivered.
    #[inline]
    pub fn then_fail(mut self, kind: ErrorKind) -> Self {
        self.failure = Some(PresetFailure::MidStream(kind));
        self
    }
}

mod kind_repr {
    use max_model::ErrorKind;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        kind: &ErrorKind,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(match kind {
            ErrorKind::Unreachable => "unreachable",
            ErrorKind::Timeout => "timeout",
            ErrorKind::RateLimitExceeded => "rate_limit_exceeded",
            ErrorKind::Moderated => "moderated",
            ErrorKind::Other => "other",
        })
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<ErrorKind, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(match s.as_str() {
            "unreachable" => ErrorKind::Unreachable,
            "timeout" => ErrorKind::Timeout,
            "rate_limit_exceeded" => ErrorKind::RateLimitExceeded,
            "moderated" => ErrorKind::Moderated,
            _ => ErrorKind::Other,
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_serialize_deserialize() {
        let response = PresetResponse::with_events([
            PresetEvent::MessageDelta("Let me search for that.".to_string()),
            PresetEvent::ToolCall(ToolCallRequest {
                id: "1".to_string(),
                name: "search_codebase".to_string(),
                arguments: json!({ "query": "config loader" }),
            }),
        ])
        .then_fail(ErrorKind::Timeout);

        let serialized = serde_json::to_string(&response).unwrap();
        let deserialized: PresetResponse =
            serde_json::from_str(&serialized).unwrap();

        assert_eq!(response, deserialized);
    }
}
