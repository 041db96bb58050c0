//! Line framing and the decode driver shared by both backend decoders.

pub mod mesh;
pub mod openai;

pub use mesh::{mesh_stream, MeshDecoder};
pub use openai::{local_server_stream, LocalServerDecoder};

use crate::types::unified::StreamEvent;
use bytes::BytesMut;
use futures::{Stream, StreamExt};
use log::{debug, error, trace};
use std::pin::Pin;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

pub type DecodedStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, DecodeError>> + Send>>;

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("{backend} stream read error: {message}")]
    Transport {
        backend: &'static str,
        message: String,
    },
    #[error("{backend} stream timed out after {}ms", .timeout.as_millis())]
    Timeout {
        backend: &'static str,
        timeout: Duration,
    },
}

/// What a decoder wants after consuming one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineFlow {
    Continue,
    Finished,
}

/// Payload-level decoding for one backend protocol.
///
/// Implementations see complete lines only; framing, cancellation and the
/// final usage event are handled by [`decode_stream`].
pub trait StreamDecoder: Send {
    /// Short backend name used in logs and errors.
    fn backend(&self) -> &'static str;

    /// Consume one complete line, pushing any text events into `out`.
    fn decode_line(&mut self, line: &str, out: &mut Vec<StreamEvent>) -> LineFlow;

    /// Usage event reflecting everything decoded so far.
    fn usage(&self) -> StreamEvent;
}

/// Wall-clock budget for a whole stream.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    pub at: Instant,
    pub budget: Duration,
}

impl Deadline {
    pub fn after(budget: Duration) -> Self {
        Self {
            at: Instant::now() + budget,
            budget,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DecodeControl {
    pub cancel: CancellationToken,
    pub deadline: Option<Deadline>,
}

impl DecodeControl {
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Deadline) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

/// Splits a byte stream into `\n`-terminated lines.
///
/// Splitting happens on raw bytes, so a UTF-8 sequence cut by a read
/// boundary stays in the buffer until the rest of its line arrives.
///
/// Each `data:` line is handled on its own and never merged into an SSE
/// event, so an event-aggregating parser such as `eventsource-stream` does not fit.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: BytesMut,
}

impl LineBuffer {
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line = self.pending.split_to(pos + 1);
            let mut bytes = &line[..pos];
            if let Some(stripped) = bytes.strip_suffix(b"\r") {
                bytes = stripped;
            }
            lines.push(String::from_utf8_lossy(bytes).into_owned());
        }
        lines
    }

    /// Bytes of the incomplete trailing line.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

enum NextRead<T> {
    Cancelled,
    TimedOut,
    Read(Option<T>),
}

async fn wait_for(deadline: Option<Deadline>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline.at).await,
        None => std::future::pending::<()>().await,
    }
}

/// Drive `decoder` over `bytes`.
///
/// - Emits text events as lines complete, then exactly one usage event when
///   the decoder finishes or the byte stream ends.
/// - Cancellation ends the stream silently: no usage, no error.
/// - A read error or an elapsed deadline ends the stream with one error.
pub fn decode_stream<D, S, B, E>(mut decoder: D, bytes: S, control: DecodeControl) -> DecodedStream
where
    D: StreamDecoder + 'static,
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    Box::pin(async_stream::stream! {
        let backend = decoder.backend();
        let mut bytes = Box::pin(bytes);
        let mut lines = LineBuffer::default();
        let mut events = Vec::new();

        loop {
            let next = tokio::select! {
                biased;
                _ = control.cancel.cancelled() => NextRead::Cancelled,
                _ = wait_for(control.deadline) => NextRead::TimedOut,
                read = bytes.next() => NextRead::Read(read),
            };

            let chunk = match next {
                NextRead::Cancelled => {
                    debug!("{} stream cancelled by caller", backend);
                    return;
                }
                NextRead::TimedOut => {
                    let timeout = control.deadline.map(|d| d.budget).unwrap_or_default();
                    error!("{} stream timed out after {}ms", backend, timeout.as_millis());
                    yield Err(DecodeError::Timeout { backend, timeout });
                    return;
                }
                NextRead::Read(Some(Ok(chunk))) => chunk,
                NextRead::Read(Some(Err(e))) => {
                    let message = e.to_string();
                    error!("{} stream read error: {}", backend, message);
                    yield Err(DecodeError::Transport { backend, message });
                    return;
                }
                NextRead::Read(None) => break,
            };

            for line in lines.push(chunk.as_ref()) {
                if control.cancel.is_cancelled() {
                    debug!("{} stream cancelled by caller", backend);
                    return;
                }
                trace!("{} SSE: {:?}", backend, line);
                let flow = decoder.decode_line(&line, &mut events);
                for event in events.drain(..) {
                    yield Ok(event);
                }
                if flow == LineFlow::Finished {
                    if control.cancel.is_cancelled() {
                        debug!("{} stream cancelled by caller", backend);
                        return;
                    }
                    yield Ok(decoder.usage());
                    return;
                }
            }
        }

        if lines.pending_len() > 0 {
            debug!(
                "{} stream ended with {} bytes of unterminated line, discarding",
                backend,
                lines.pending_len()
            );
        }
        if control.cancel.is_cancelled() {
            return;
        }
        yield Ok(decoder.usage());
    })
}
