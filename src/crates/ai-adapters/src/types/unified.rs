use serde::Serialize;

/// Backend-agnostic stream event handed to the caller.
///
/// A successful stream is zero or more `TextDelta`s followed by exactly one
/// `Usage`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum StreamEvent {
    TextDelta { text: String },
    Usage { input_tokens: u32, output_tokens: u32 },
}

impl StreamEvent {
    pub fn text(text: impl Into<String>) -> Self {
        StreamEvent::TextDelta { text: text.into() }
    }

    pub fn usage(input_tokens: u32, output_tokens: u32) -> Self {
        StreamEvent::Usage {
            input_tokens,
            output_tokens,
        }
    }

    pub fn is_usage(&self) -> bool {
        matches!(self, StreamEvent::Usage { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::StreamEvent;

    #[test]
    fn usage_serializes_with_camel_case_fields() {
        let value = serde_json::to_value(StreamEvent::usage(12, 34)).expect("serializable");
        assert_eq!(
            value,
            serde_json::json!({"type": "usage", "inputTokens": 12, "outputTokens": 34})
        );
    }

    #[test]
    fn text_delta_serializes_tagged() {
        let value = serde_json::to_value(StreamEvent::text("hi")).expect("serializable");
        assert_eq!(value, serde_json::json!({"type": "text_delta", "text": "hi"}));
    }
}
