//! Conversation state for one user talking to a Dify chat app.
//!
//! A [`ConversationSession`] appends the user's message, sends it in the
//! configured [`dify_api::ResponseMode`], and appends exactly one assistant
//! message per submission: the answer, or an apology when the call fails.
//! Cited knowledge-base segments are attached as [`Reference`]s.

pub mod backend;
pub mod error;
pub mod identity;
pub mod message;
pub mod reference;
pub mod session;

pub use backend::ChatBackend;
pub use error::ChatError;
pub use identity::{IdentityProvider, StaticIdentity};
pub use message::{Conversation, Message, Role, APOLOGY_TEXT};
pub use reference::{resolve_references, Reference};
pub use session::ConversationSession;
