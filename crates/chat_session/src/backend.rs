use async_trait::async_trait;
use dify_api::{
    CancellationSignal, ChatCompletion, ChatRequest, ChunkStream, DifyApiClient, DifyApiError,
};

/// Chat transport used by [`crate::ConversationSession`].
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Whole answer in one response.
    async fn chat_blocking(
        &self,
        request: &ChatRequest,
        cancellation: Option<&CancellationSignal>,
    ) -> Result<ChatCompletion, DifyApiError>;

    /// Raw body chunks of a streaming answer.
    async fn open_stream(
        &self,
        request: &ChatRequest,
        cancellation: Option<&CancellationSignal>,
    ) -> Result<ChunkStream, DifyApiError>;
}

#[async_trait]
impl ChatBackend for DifyApiClient {
    async fn chat_blocking(
        &self,
        request: &ChatRequest,
        cancellation: Option<&CancellationSignal>,
    ) -> Result<ChatCompletion, DifyApiError> {
        self.chat(request, cancellation).await
    }

    async fn open_stream(
        &self,
        request: &ChatRequest,
        cancellation: Option<&CancellationSignal>,
    ) -> Result<ChunkStream, DifyApiError> {
        self.chat_stream(request, cancellation).await
    }
}
