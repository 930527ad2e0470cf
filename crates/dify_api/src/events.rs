use std::fmt;

use serde::Deserialize;

use crate::payload::{ChatMetadata, RetrieverResource};

/// Event tag of one streamed record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StreamEventKind {
    Message,
    AgentMessage,
    AgentThought,
    MessageFile,
    MessageEnd,
    MessageReplace,
    Error,
    Ping,
    /// Any tag this crate does not model, preserved verbatim.
    Other(String),
}

impl StreamEventKind {
    pub fn parse(value: &str) -> Self {
        match value {
            "message" => Self::Message,
            "agent_message" => Self::AgentMessage,
            "agent_thought" => Self::AgentThought,
            "message_file" => Self::MessageFile,
            "message_end" => Self::MessageEnd,
            "message_replace" => Self::MessageReplace,
            "error" => Self::Error,
            "ping" => Self::Ping,
            other => Self::Other(other.to_owned()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Message => "message",
            Self::AgentMessage => "agent_message",
            Self::AgentThought => "agent_thought",
            Self::MessageFile => "message_file",
            Self::MessageEnd => "message_end",
            Self::MessageReplace => "message_replace",
            Self::Error => "error",
            Self::Ping => "ping",
            Self::Other(value) => value,
        }
    }

    /// Only direct and agent-originated messages add to the answer text.
    pub fn contributes_text(&self) -> bool {
        matches!(self, Self::Message | Self::AgentMessage)
    }
}

impl fmt::Display for StreamEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One decoded record, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerDelta {
    pub event: StreamEventKind,
    /// Answer fragment. Empty for events that do not contribute text.
    pub text: String,
    /// Conversation id carried by this record, if any.
    pub conversation_id: Option<String>,
}

/// Aggregate state once the stream has ended.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedAnswer {
    pub answer: String,
    pub conversation_id: Option<String>,
    pub message_id: Option<String>,
    /// Citations from the `message_end` record; empty when none arrived.
    pub retriever_resources: Vec<RetrieverResource>,
    /// Whether a `message_end` record was observed.
    pub completed: bool,
}

/// Service-reported stream failure (`event: error`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamFailure {
    pub code: Option<String>,
    pub message: String,
    pub status: Option<u16>,
}

/// Wire shape of a `data:` record payload.
#[derive(Debug, Deserialize)]
pub(crate) struct StreamRecord {
    pub event: String,
    #[serde(default)]
    pub answer: Option<String>,
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub message_id: Option<String>,
    #[serde(default)]
    pub metadata: Option<ChatMetadata>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub status: Option<u16>,
}
