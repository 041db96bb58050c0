use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of `POST {meshBase}/mesh/query/stream`.
#[derive(Debug, Serialize)]
pub struct MeshQueryRequest<'a> {
    pub model: &'a str,
    pub prompt: &'a str,
    #[serde(rename = "systemPrompt", skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<&'a str>,
    pub stream: bool,
    pub timeout: u64,
}

/// Response of `GET {meshBase}/mesh/status`.
///
/// Mesh daemons report the peer count as either `peerCount` or `peer_count`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MeshStatus {
    #[serde(default)]
    pub running: Option<bool>,
    #[serde(rename = "peerCount", default)]
    peer_count_camel: Option<u64>,
    #[serde(default)]
    peer_count: Option<u64>,
}

impl MeshStatus {
    pub fn peer_count(&self) -> u64 {
        self.peer_count_camel.or(self.peer_count).unwrap_or(0)
    }

    pub fn is_running(&self) -> bool {
        self.running.unwrap_or(false)
    }

    /// The mesh can take work only when it is running and has at least one peer.
    pub fn is_available(&self) -> bool {
        self.is_running() && self.peer_count() > 0
    }
}

/// One `data:` payload of the mesh stream.
///
/// `done` and `error` are interpreted loosely: any truthy value ends the stream.
#[derive(Debug, Default, Deserialize)]
pub struct MeshChunk {
    #[serde(default)]
    content: Option<Value>,
    #[serde(default)]
    done: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
}

impl MeshChunk {
    pub fn text(&self) -> Option<&str> {
        self.content
            .as_ref()
            .and_then(Value::as_str)
            .filter(|text| !text.is_empty())
    }

    pub fn is_done(&self) -> bool {
        self.done.as_ref().is_some_and(is_truthy)
    }

    pub fn error(&self) -> Option<&Value> {
        self.error.as_ref().filter(|value| is_truthy(value))
    }

    pub fn is_terminal(&self) -> bool {
        self.is_done() || self.error().is_some()
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0 && !n.is_nan()),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::{MeshChunk, MeshQueryRequest, MeshStatus};

    #[test]
    fn status_reads_either_peer_count_spelling() {
        let camel: MeshStatus =
            serde_json::from_str(r#"{"running":true,"peerCount":3}"#).expect("valid status");
        assert_eq!(camel.peer_count(), 3);
        assert!(camel.is_available());

        let snake: MeshStatus =
            serde_json::from_str(r#"{"running":true,"peer_count":2}"#).expect("valid status");
        assert_eq!(snake.peer_count(), 2);
    }

    #[test]
    fn status_without_peers_is_unavailable() {
        let status: MeshStatus = serde_json::from_str(r#"{"running":true}"#).expect("valid status");
        assert!(!status.is_available());

        let stopped: MeshStatus =
            serde_json::from_str(r#"{"running":false,"peerCount":4}"#).expect("valid status");
        assert!(!stopped.is_available());
    }

    #[test]
    fn chunk_terminal_flags() {
        let done: MeshChunk = serde_json::from_str(r#"{"done":true}"#).expect("valid chunk");
        assert!(done.is_terminal());

        let not_done: MeshChunk =
            serde_json::from_str(r#"{"content":"a","done":false}"#).expect("valid chunk");
        assert!(!not_done.is_terminal());
        assert_eq!(not_done.text(), Some("a"));

        let errored: MeshChunk =
            serde_json::from_str(r#"{"error":"peer dropped"}"#).expect("valid chunk");
        assert!(errored.is_terminal());

        let empty_error: MeshChunk =
            serde_json::from_str(r#"{"content":"b","error":""}"#).expect("valid chunk");
        assert!(!empty_error.is_terminal());
    }

    #[test]
    fn query_request_omits_missing_system_prompt() {
        let request = MeshQueryRequest {
            model: "tx-16g",
            prompt: "hello",
            system_prompt: None,
            stream: true,
            timeout: 120_000,
        };
        let value = serde_json::to_value(&request).expect("serializable");
        assert_eq!(
            value,
            serde_json::json!({"model": "tx-16g", "prompt": "hello", "stream": true, "timeout": 120000})
        );
    }
}
