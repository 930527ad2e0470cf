use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// How the chat endpoint delivers its answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseMode {
    /// One JSON object carrying the whole answer.
    Blocking,
    /// Newline-delimited `data: {json}` records.
    #[default]
    Streaming,
}

impl ResponseMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "blocking" => Some(Self::Blocking),
            "streaming" => Some(Self::Streaming),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Blocking => "blocking",
            Self::Streaming => "streaming",
        }
    }
}

/// Request body for `POST /chat-messages`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub inputs: Map<String, Value>,
    pub query: String,
    pub response_mode: ResponseMode,
    pub user: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<FileAttachment>,
}

impl ChatRequest {
    pub fn new(query: impl Into<String>, user: impl Into<String>, mode: ResponseMode) -> Self {
        Self {
            inputs: Map::new(),
            query: query.into(),
            response_mode: mode,
            user: user.into(),
            conversation_id: None,
            files: Vec::new(),
        }
    }

    /// Continue an existing conversation. Blank ids are ignored.
    pub fn with_conversation_id(mut self, conversation_id: Option<impl Into<String>>) -> Self {
        self.conversation_id = conversation_id
            .map(Into::into)
            .filter(|value: &String| !value.trim().is_empty());
        self
    }

    pub fn with_inputs(mut self, inputs: Map<String, Value>) -> Self {
        self.inputs = inputs;
        self
    }

    pub fn with_file(mut self, file: FileAttachment) -> Self {
        self.files.push(file);
        self
    }
}

/// File reference attached to a chat request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileAttachment {
    #[serde(rename = "type")]
    pub kind: String,
    pub transfer_method: String,
    pub upload_file_id: String,
}

impl FileAttachment {
    /// A previously uploaded document (`type=document`, `transfer_method=local_file`).
    pub fn uploaded_document(upload_file_id: impl Into<String>) -> Self {
        Self {
            kind: "document".to_owned(),
            transfer_method: "local_file".to_owned(),
            upload_file_id: upload_file_id.into(),
        }
    }
}

/// Blocking-mode response of `POST /chat-messages`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChatCompletion {
    #[serde(default)]
    pub message_id: Option<String>,
    #[serde(default)]
    pub conversation_id: Option<String>,
    pub answer: String,
    #[serde(default)]
    pub metadata: ChatMetadata,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ChatMetadata {
    #[serde(default, deserialize_with = "null_as_default")]
    pub retriever_resources: Vec<RetrieverResource>,
}

/// One knowledge-base segment cited by an answer, as supplied by the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrieverResource {
    #[serde(default)]
    pub position: Option<u32>,
    pub dataset_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub dataset_name: String,
    pub document_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub document_name: String,
    pub segment_id: String,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub content: Option<String>,
}

/// Cursor-paged window returned by the conversation history endpoints.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct HistoryWindow<T> {
    #[serde(default, deserialize_with = "null_as_default")]
    pub data: Vec<T>,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default)]
    pub limit: u32,
}

/// Entry of `GET /conversations`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ConversationSummary {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub created_at: Option<i64>,
    #[serde(default)]
    pub updated_at: Option<i64>,
}

/// Entry of `GET /messages`: one user query and the answer it received.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HistoryMessage {
    pub id: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub answer: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub retriever_resources: Vec<RetrieverResource>,
    #[serde(default)]
    pub created_at: Option<i64>,
}

/// Response of `POST /files/upload`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UploadedFile {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub extension: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
}

/// Deserialize `null` as the type's default instead of failing.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
