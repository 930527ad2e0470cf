//! Transport client for the Dify chat, knowledge-base and document-conversion APIs.
//!
//! Each endpoint family authenticates with its own base URL and bearer key.
//! Missing credentials for a family are reported before any request is sent.
//!
//! Streaming chat answers arrive as newline-delimited `data: {json}` records;
//! [`AnswerStreamDecoder`] turns arbitrary byte chunks into ordered deltas and
//! an aggregate [`DecodedAnswer`].

pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod headers;
pub mod knowledge;
pub mod payload;
pub mod retry;
pub mod sse;
pub mod stream;
pub mod url;

pub use client::{ApiRequest, DifyApiClient, MultipartField, RequestBody};
pub use config::{ApiFamily, Credentials, DifyApiConfig};
pub use error::{DifyApiError, UploadError};
pub use events::{AnswerDelta, DecodedAnswer, StreamEventKind, StreamFailure};
pub use payload::{ChatCompletion, ChatRequest, ResponseMode, RetrieverResource};
pub use sse::AnswerStreamDecoder;
pub use stream::{decode_answer_stream, CancellationSignal, ChunkStream};
pub use reqwest::StatusCode;
pub use url::{normalize_base_url, DEFAULT_KNOWLEDGE_BASE_URL};
