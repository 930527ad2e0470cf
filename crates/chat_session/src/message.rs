use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::debug;
use uuid::Uuid;

use crate::reference::Reference;

/// Reply appended in place of an answer when a submission fails.
pub const APOLOGY_TEXT: &str = "Sorry, something went wrong while generating a response.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// Locally generated; unique within a conversation.
    pub id: String,
    pub role: Role,
    pub text: String,
    /// In the order the service ranked them.
    pub references: Vec<Reference>,
    pub created_at: OffsetDateTime,
    /// Id assigned by the service to the answer, when known.
    pub service_message_id: Option<String>,
}

impl Message {
    fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            text: text.into(),
            references: Vec::new(),
            created_at: OffsetDateTime::now_utc(),
            service_message_id: None,
        }
    }

    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    #[must_use]
    pub fn assistant(text: impl Into<String>, references: Vec<Reference>) -> Self {
        let mut message = Self::new(Role::Assistant, text);
        message.references = references;
        message
    }

    #[must_use]
    pub fn apology() -> Self {
        Self::new(Role::Assistant, APOLOGY_TEXT)
    }

    #[must_use]
    pub fn with_service_message_id(mut self, id: Option<String>) -> Self {
        self.service_message_id = id;
        self
    }
}

/// Ordered message history of one user and one remote conversation.
///
/// Appended messages are final and never reordered. While an answer streams,
/// the partial assistant message lives in [`Conversation::pending`].
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    id: Option<String>,
    user_id: Option<String>,
    messages: Vec<Message>,
    pending: Option<Message>,
}

impl Conversation {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Service-assigned id; `None` until the first answer arrives.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Assistant message still being streamed.
    pub fn pending(&self) -> Option<&Message> {
        self.pending.as_ref()
    }

    pub(crate) fn bind_user(&mut self, user_id: &str) {
        if self.user_id.is_none() {
            self.user_id = Some(user_id.to_owned());
        }
    }

    /// Latch the service conversation id. Later ids are ignored.
    pub(crate) fn assign_id(&mut self, id: Option<&str>) {
        let Some(id) = id.filter(|id| !id.trim().is_empty()) else {
            return;
        };
        match self.id.as_deref() {
            None => self.id = Some(id.to_owned()),
            Some(current) if current != id => {
                debug!(current, ignored = id, "conversation id already assigned");
            }
            Some(_) => {}
        }
    }

    pub(crate) fn push(&mut self, message: Message) -> &Message {
        self.messages.push(message);
        &self.messages[self.messages.len() - 1]
    }

    pub(crate) fn begin_pending(&mut self) {
        self.pending = Some(Message::assistant(String::new(), Vec::new()));
    }

    /// Text only grows while pending.
    pub(crate) fn append_pending(&mut self, fragment: &str) {
        if let Some(pending) = self.pending.as_mut() {
            pending.text.push_str(fragment);
        }
    }

    pub(crate) fn finalize_pending(
        &mut self,
        references: Vec<Reference>,
        service_message_id: Option<String>,
    ) -> Option<&Message> {
        let mut message = self.pending.take()?;
        message.references = references;
        message.service_message_id = service_message_id;
        Some(self.push(message))
    }

    pub(crate) fn discard_pending(&mut self) -> Option<Message> {
        self.pending.take()
    }

    /// Forget every message and the service id, keeping the user.
    pub fn clear(&mut self) {
        self.id = None;
        self.messages.clear();
        self.pending = None;
    }
}
