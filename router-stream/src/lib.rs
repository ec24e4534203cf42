//! Streaming response transcoders: OpenAI-style SSE and Ollama-style NDJSON,
//! in both directions plus passthrough, with a cleanup guarantee that fires
//! on every exit path (success, upstream error, or the client dropping the
//! connection mid-stream).

mod error;
mod guard;
mod mode;
mod ollama_to_openai;
mod openai_to_ollama;
mod passthrough;

pub use error::StreamError;
pub use guard::ReleaseGuard;
pub use mode::StreamMode;
pub use ollama_to_openai::ollama_to_openai;
pub use openai_to_ollama::openai_to_ollama;
pub use passthrough::{force_chunk, ollama_passthrough, openai_passthrough};

use std::pin::Pin;

use bytes::Bytes;
use futures::Stream;

/// Upstream transport errors are type-erased: this crate only needs
/// `Display` to format the in-band error events the protocol specifies.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The raw byte stream coming from the HTTP executor.
pub type UpstreamStream = Pin<Box<dyn Stream<Item = Result<Bytes, BoxError>> + Send>>;

/// A fully transcoded, ready-to-forward response body. Errors are already
/// resolved into in-band protocol events, so this stream never fails.
pub type TranscodedStream = Pin<Box<dyn Stream<Item = Bytes> + Send>>;
