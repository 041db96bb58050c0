use super::{decode_stream, DecodeControl, DecodedStream, LineFlow, StreamDecoder};
use crate::types::openai::ChatCompletionChunk;
use crate::types::unified::StreamEvent;
use log::debug;
use reqwest::Response;

const DATA_PREFIX: &str = "data: ";
const DONE_SENTINEL: &str = "[DONE]";

/// Decoder for the OpenAI-compatible local server stream.
///
/// Output tokens are counted one per text delta until the server reports
/// authoritative `usage` numbers.
#[derive(Debug, Default)]
pub struct LocalServerDecoder {
    input_tokens: u32,
    output_tokens: u32,
}

impl LocalServerDecoder {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StreamDecoder for LocalServerDecoder {
    fn backend(&self) -> &'static str {
        "local-server"
    }

    fn decode_line(&mut self, line: &str, out: &mut Vec<StreamEvent>) -> LineFlow {
        let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
            return LineFlow::Continue;
        };
        if line.contains(DONE_SENTINEL) {
            return LineFlow::Continue;
        }

        let chunk: ChatCompletionChunk = match serde_json::from_str(payload) {
            Ok(chunk) => chunk,
            Err(e) => {
                debug!("Skipping malformed local-server SSE line: {}, data: {}", e, payload);
                return LineFlow::Continue;
            }
        };

        if let Some(text) = chunk.text_delta() {
            self.output_tokens += 1;
            out.push(StreamEvent::text(text));
        }

        if let Some(usage) = chunk.usage() {
            if let Some(prompt_tokens) = usage.prompt_tokens.filter(|n| *n > 0) {
                self.input_tokens = prompt_tokens;
            }
            if let Some(completion_tokens) = usage.completion_tokens.filter(|n| *n > 0) {
                self.output_tokens = completion_tokens;
            }
        }

        LineFlow::Continue
    }

    fn usage(&self) -> StreamEvent {
        StreamEvent::usage(self.input_tokens, self.output_tokens)
    }
}

/// Decode a local server chat completion response body.
pub fn local_server_stream(response: Response, control: DecodeControl) -> DecodedStream {
    decode_stream(LocalServerDecoder::new(), response.bytes_stream(), control)
}
