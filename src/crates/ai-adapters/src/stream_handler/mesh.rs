use super::{decode_stream, DecodeControl, DecodedStream, LineFlow, StreamDecoder};
use crate::types::mesh::MeshChunk;
use crate::types::unified::StreamEvent;
use log::{debug, warn};
use reqwest::Response;

const DATA_PREFIX: &str = "data: ";
const DONE_SENTINEL: &str = "[DONE]";

/// Decoder for the mesh query stream.
///
/// The mesh does not report input tokens; output tokens are the number of
/// text deltas emitted.
#[derive(Debug, Default)]
pub struct MeshDecoder {
    deltas: u32,
}

impl MeshDecoder {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StreamDecoder for MeshDecoder {
    fn backend(&self) -> &'static str {
        "mesh"
    }

    fn decode_line(&mut self, line: &str, out: &mut Vec<StreamEvent>) -> LineFlow {
        let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
            return LineFlow::Continue;
        };
        if payload == DONE_SENTINEL {
            return LineFlow::Finished;
        }

        let chunk: MeshChunk = match serde_json::from_str(payload) {
            Ok(chunk) => chunk,
            Err(e) => {
                debug!("Skipping malformed mesh SSE line: {}, data: {}", e, payload);
                return LineFlow::Continue;
            }
        };

        if let Some(text) = chunk.text() {
            self.deltas += 1;
            out.push(StreamEvent::text(text));
        }

        // An `error` payload still completes the stream normally.
        if chunk.is_terminal() {
            if let Some(error) = chunk.error() {
                warn!("Mesh stream reported an error, ending stream: {}", error);
            }
            return LineFlow::Finished;
        }

        LineFlow::Continue
    }

    fn usage(&self) -> StreamEvent {
        StreamEvent::usage(0, self.deltas)
    }
}

/// Decode a mesh query response body.
pub fn mesh_stream(response: Response, control: DecodeControl) -> DecodedStream {
    decode_stream(MeshDecoder::new(), response.bytes_stream(), control)
}
