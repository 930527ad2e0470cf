use std::future::Future;
use std::pin::Pin;
use std::sync::{atomic::AtomicBool, atomic::Ordering, Arc};
use std::time::Duration;

use futures_util::{Stream, StreamExt};

use crate::error::DifyApiError;
use crate::events::{AnswerDelta, DecodedAnswer};
use crate::sse::AnswerStreamDecoder;

/// Optional cancellation signal shared across request and stream loops.
pub type CancellationSignal = Arc<AtomicBool>;

/// Raw body chunks of a streaming response, in arrival order.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, DifyApiError>> + Send>>;

const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Drive `chunks` through an [`AnswerStreamDecoder`] until the transport closes.
///
/// `on_delta` observes every decoded record in order. A service `error` record
/// ends decoding with [`DifyApiError::StreamFailed`]; malformed records are
/// skipped by the decoder. Cancellation is checked while awaiting each chunk.
pub async fn decode_answer_stream<S, F>(
    mut chunks: S,
    cancellation: Option<&CancellationSignal>,
    mut on_delta: F,
) -> Result<DecodedAnswer, DifyApiError>
where
    S: Stream<Item = Result<Vec<u8>, DifyApiError>> + Unpin,
    F: FnMut(&AnswerDelta),
{
    let mut decoder = AnswerStreamDecoder::new();

    loop {
        let Some(chunk) = await_or_cancel(chunks.next(), cancellation).await? else {
            break;
        };
        if is_cancelled(cancellation) {
            return Err(DifyApiError::Cancelled);
        }
        let chunk = chunk?;
        for delta in decoder.feed(&chunk) {
            on_delta(&delta);
            fail_on_stream_error(&decoder)?;
        }
    }

    if is_cancelled(cancellation) {
        return Err(DifyApiError::Cancelled);
    }

    for delta in decoder.finish() {
        on_delta(&delta);
        fail_on_stream_error(&decoder)?;
    }

    Ok(decoder.into_answer())
}

/// Collect every chunk of an in-memory payload into a [`ChunkStream`].
pub fn chunks_from_iter<I>(chunks: I) -> ChunkStream
where
    I: IntoIterator<Item = Vec<u8>>,
    I::IntoIter: Send + 'static,
{
    Box::pin(futures_util::stream::iter(
        chunks.into_iter().map(Ok::<Vec<u8>, DifyApiError>),
    ))
}

fn fail_on_stream_error(decoder: &AnswerStreamDecoder) -> Result<(), DifyApiError> {
    match decoder.failure() {
        Some(failure) => Err(DifyApiError::StreamFailed {
            code: failure.code.clone(),
            message: failure.message.clone(),
        }),
        None => Ok(()),
    }
}

pub fn is_cancelled(cancel: Option<&CancellationSignal>) -> bool {
    cancel.is_some_and(|token| token.load(Ordering::Acquire))
}

pub(crate) async fn await_or_cancel<F>(
    future: F,
    cancellation: Option<&CancellationSignal>,
) -> Result<F::Output, DifyApiError>
where
    F: Future,
{
    if cancellation.is_none() {
        return Ok(future.await);
    }

    let mut future = Box::pin(future);

    loop {
        if is_cancelled(cancellation) {
            return Err(DifyApiError::Cancelled);
        }

        if let Ok(output) = tokio::time::timeout(CANCEL_POLL_INTERVAL, &mut future).await {
            if is_cancelled(cancellation) {
                return Err(DifyApiError::Cancelled);
            }
            return Ok(output);
        }
    }
}
