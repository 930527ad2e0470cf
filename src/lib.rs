//! Dify chat and knowledge-base client.
//!
//! [`config::EnvConfig`] reads deployment settings from the environment and
//! produces the explicit [`DifyApiConfig`] every client is built from.

use std::sync::Arc;

pub mod config;
pub mod logging;

pub use chat_session::{
    ChatBackend, ChatError, Conversation, ConversationSession, IdentityProvider, Message,
    Reference, Role, StaticIdentity,
};
pub use dify_api::{
    AnswerStreamDecoder, ApiFamily, DifyApiClient, DifyApiConfig, DifyApiError, ResponseMode,
    UploadError,
};
pub use knowledge_base::{
    KnowledgeClient, PageRequest, PageResult, SegmentTarget, SortedSegments, UploadOptions,
};

/// Session for `identity` using the chat family and the configured response mode.
pub fn chat_session(
    config: &config::EnvConfig,
    identity: Arc<dyn IdentityProvider>,
) -> Result<ConversationSession, DifyApiError> {
    let client = DifyApiClient::new(config.api_config(), &[ApiFamily::Chat])?;
    Ok(ConversationSession::new(
        Arc::new(client),
        identity,
        config.response_mode,
    ))
}

/// Knowledge client for the configured dataset.
pub fn knowledge_client(config: &config::EnvConfig) -> Result<KnowledgeClient, DifyApiError> {
    KnowledgeClient::new(config.api_config())
}
