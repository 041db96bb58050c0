//! Streaming protocol adapters for the TARX backends.
//!
//! Both backends speak newline-delimited `data: <json>` server-sent events but
//! with different payloads. Each payload format has a [`StreamDecoder`]
//! implementation; [`decode_stream`] owns the shared line framing, cancellation
//! and deadline handling and turns raw response bytes into canonical
//! [`StreamEvent`]s.

pub mod stream_handler;
pub mod types;

pub use stream_handler::{
    decode_stream, mesh_stream, local_server_stream, DecodeControl, DecodeError, DecodedStream,
    Deadline, LineBuffer, LineFlow, LocalServerDecoder, MeshDecoder, StreamDecoder,
};
pub use types::mesh::{MeshChunk, MeshQueryRequest, MeshStatus};
pub use types::openai::{ChatCompletionChunk, ChatCompletionRequest, CompletionUsage};
pub use types::unified::StreamEvent;
