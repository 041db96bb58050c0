use serde::{Deserialize, Serialize};
use tarx_core_types::Message;

/// Body of `POST {localBase}/v1/chat/completions`.
#[derive(Debug, Serialize)]
pub struct ChatCompletionRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [Message],
    pub stream: bool,
    pub max_tokens: u32,
}

#[derive(Debug, Default, Deserialize)]
pub struct CompletionUsage {
    #[serde(default)]
    pub prompt_tokens: Option<u32>,
    #[serde(default)]
    pub completion_tokens: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct Choice {
    #[serde(default)]
    delta: Option<Delta>,
}

#[derive(Debug, Default, Deserialize)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    reasoning_content: Option<String>,
}

/// One `data:` payload of the OpenAI-compatible local server stream.
///
/// Every field is optional: llama-server and friends emit keepalive chunks,
/// usage-only chunks with `choices: []`, and reasoning models that only fill
/// `reasoning_content`.
#[derive(Debug, Default, Deserialize)]
pub struct ChatCompletionChunk {
    #[serde(default)]
    choices: Option<Vec<Choice>>,
    #[serde(default)]
    usage: Option<CompletionUsage>,
}

impl ChatCompletionChunk {
    /// Text carried by the first choice: `content` if non-empty, otherwise
    /// `reasoning_content` if non-empty.
    pub fn text_delta(&self) -> Option<&str> {
        let delta = self.choices.as_ref()?.first()?.delta.as_ref()?;
        delta
            .content
            .as_deref()
            .filter(|text| !text.is_empty())
            .or_else(|| {
                delta
                    .reasoning_content
                    .as_deref()
                    .filter(|text| !text.is_empty())
            })
    }

    pub fn usage(&self) -> Option<&CompletionUsage> {
        self.usage.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::ChatCompletionChunk;

    #[test]
    fn prefers_content_over_reasoning_content() {
        let raw = r#"{"choices":[{"index":0,"delta":{"content":"hi","reasoning_content":"thinking"}}]}"#;
        let chunk: ChatCompletionChunk = serde_json::from_str(raw).expect("valid chunk");
        assert_eq!(chunk.text_delta(), Some("hi"));
    }

    #[test]
    fn falls_back_to_reasoning_content_when_content_is_empty() {
        let raw = r#"{"choices":[{"delta":{"content":"","reasoning_content":"thinking"}}]}"#;
        let chunk: ChatCompletionChunk = serde_json::from_str(raw).expect("valid chunk");
        assert_eq!(chunk.text_delta(), Some("thinking"));
    }

    #[test]
    fn handles_empty_choices_with_usage_chunk() {
        let raw = r#"{
            "id": "chatcmpl_test",
            "created": 123,
            "model": "tx-16g",
            "choices": [],
            "usage": {"prompt_tokens": 7, "completion_tokens": 3, "total_tokens": 10}
        }"#;
        let chunk: ChatCompletionChunk = serde_json::from_str(raw).expect("valid chunk");
        assert!(chunk.text_delta().is_none());
        let usage = chunk.usage().expect("usage present");
        assert_eq!(usage.prompt_tokens, Some(7));
        assert_eq!(usage.completion_tokens, Some(3));
    }

    #[test]
    fn tolerates_null_choices_and_delta() {
        let chunk: ChatCompletionChunk =
            serde_json::from_str(r#"{"choices":null}"#).expect("valid chunk");
        assert!(chunk.text_delta().is_none());

        let chunk: ChatCompletionChunk =
            serde_json::from_str(r#"{"choices":[{"delta":null}]}"#).expect("valid chunk");
        assert!(chunk.text_delta().is_none());
    }
}
