use dify_api::DifyApiError;
use thiserror::Error;

use crate::message::Message;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("no signed-in user")]
    Unauthenticated,

    #[error("message is empty")]
    EmptyQuery,

    /// The pending answer was discarded; nothing was appended for it.
    #[error("response was cancelled")]
    Cancelled,

    /// The apology has already been appended to the conversation.
    #[error("chat request failed: {source}")]
    Failed {
        #[source]
        source: DifyApiError,
        apology: Box<Message>,
    },
}

impl ChatError {
    /// Underlying transport error, when the failure came from the service call.
    pub fn api_error(&self) -> Option<&DifyApiError> {
        match self {
            Self::Failed { source, .. } => Some(source),
            _ => None,
        }
    }
}
