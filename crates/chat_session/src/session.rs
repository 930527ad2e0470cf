use std::sync::Arc;

use dify_api::{
    decode_answer_stream, CancellationSignal, ChatRequest, DecodedAnswer, DifyApiError,
    ResponseMode,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::backend::ChatBackend;
use crate::error::ChatError;
use crate::identity::{authenticated_user, IdentityProvider};
use crate::message::{Conversation, Message};
use crate::reference::resolve_references;

type Inputs = serde_json::Map<String, serde_json::Value>;

/// One user's conversation with the chat service.
///
/// Submissions are sequential: `submit` takes `&mut self`, so a second
/// submission cannot start while one is in flight.
pub struct ConversationSession {
    backend: Arc<dyn ChatBackend>,
    identity: Arc<dyn IdentityProvider>,
    mode: ResponseMode,
    inputs: Inputs,
    conversation: Conversation,
}

impl ConversationSession {
    pub fn new(
        backend: Arc<dyn ChatBackend>,
        identity: Arc<dyn IdentityProvider>,
        mode: ResponseMode,
    ) -> Self {
        Self {
            backend,
            identity,
            mode,
            inputs: Inputs::new(),
            conversation: Conversation::new(),
        }
    }

    /// App variables sent with every request. Values that do not serialize
    /// to a JSON object are ignored and the previous inputs are kept.
    #[must_use]
    pub fn with_inputs<T: Serialize>(mut self, inputs: &T) -> Self {
        match serde_json::to_value(inputs) {
            Ok(serde_json::Value::Object(map)) => self.inputs = map,
            Ok(other) => {
                warn!(kind = json_kind(&other), "ignoring inputs that are not an object")
            }
            Err(error) => warn!(%error, "ignoring inputs that failed to serialize"),
        }
        self
    }

    pub fn response_mode(&self) -> ResponseMode {
        self.mode
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Start over with an empty history and no service conversation.
    pub fn reset(&mut self) {
        self.conversation.clear();
    }

    pub async fn submit(&mut self, text: &str) -> Result<Message, ChatError> {
        self.submit_with_handler(text, None, |_| {}).await
    }

    /// Send `text` and append the finalized answer.
    ///
    /// In streaming mode `on_progress` sees the pending message after every
    /// text fragment. On failure an apology is appended and returned inside
    /// [`ChatError::Failed`]. On cancellation the pending answer is dropped.
    pub async fn submit_with_handler<F>(
        &mut self,
        text: &str,
        cancellation: Option<&CancellationSignal>,
        mut on_progress: F,
    ) -> Result<Message, ChatError>
    where
        F: FnMut(&Message),
    {
        let query = text.trim();
        if query.is_empty() {
            return Err(ChatError::EmptyQuery);
        }
        let user_id =
            authenticated_user(self.identity.as_ref()).ok_or(ChatError::Unauthenticated)?;

        self.conversation.bind_user(&user_id);
        self.conversation.push(Message::user(query));

        let request = ChatRequest::new(query, &user_id, self.mode)
            .with_conversation_id(self.conversation.id())
            .with_inputs(self.inputs.clone());
        debug!(
            mode = self.mode.as_str(),
            conversation_id = ?self.conversation.id(),
            "submitting message"
        );

        let outcome = match self.mode {
            ResponseMode::Blocking => self.run_blocking(&request, cancellation).await,
            ResponseMode::Streaming => {
                self.run_streaming(&request, cancellation, &mut on_progress)
                    .await
            }
        };

        match outcome {
            Ok(message) => {
                info!(
                    conversation_id = ?self.conversation.id(),
                    references = message.references.len(),
                    "answer received"
                );
                Ok(message)
            }
            Err(DifyApiError::Cancelled) => {
                self.conversation.discard_pending();
                debug!("submission cancelled; pending answer discarded");
                Err(ChatError::Cancelled)
            }
            Err(source) => {
                self.conversation.discard_pending();
                warn!(error = %source, "submission failed");
                let apology = self.conversation.push(Message::apology()).clone();
                Err(ChatError::Failed {
                    source,
                    apology: Box::new(apology),
                })
            }
        }
    }

    async fn run_blocking(
        &mut self,
        request: &ChatRequest,
        cancellation: Option<&CancellationSignal>,
    ) -> Result<Message, DifyApiError> {
        let completion = self.backend.chat_blocking(request, cancellation).await?;
        self.conversation
            .assign_id(completion.conversation_id.as_deref());

        let message = Message::assistant(
            completion.answer,
            resolve_references(&completion.metadata.retriever_resources),
        )
        .with_service_message_id(completion.message_id);
        Ok(self.conversation.push(message).clone())
    }

    async fn run_streaming<F>(
        &mut self,
        request: &ChatRequest,
        cancellation: Option<&CancellationSignal>,
        on_progress: &mut F,
    ) -> Result<Message, DifyApiError>
    where
        F: FnMut(&Message),
    {
        let chunks = self.backend.open_stream(request, cancellation).await?;

        self.conversation.begin_pending();
        let conversation = &mut self.conversation;
        let decoded: DecodedAnswer = decode_answer_stream(chunks, cancellation, |delta| {
            conversation.assign_id(delta.conversation_id.as_deref());
            if delta.text.is_empty() {
                return;
            }
            conversation.append_pending(&delta.text);
            if let Some(pending) = conversation.pending() {
                on_progress(pending);
            }
        })
        .await?;

        self.conversation
            .assign_id(decoded.conversation_id.as_deref());
        let references = resolve_references(&decoded.retriever_resources);
        self.conversation
            .finalize_pending(references, decoded.message_id)
            .cloned()
            .ok_or_else(|| {
                DifyApiError::InvalidResponse("stream ended without an answer".to_owned())
            })
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
