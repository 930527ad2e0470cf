//! Wire types of the knowledge-base endpoints.
//!
//! Required fields fail deserialization eagerly; unknown fields are ignored so
//! new service fields never break older clients.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::payload::null_as_default;

/// Paginated list envelope: `{data[], total, has_more, limit, page}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct PaginatedResponse<T> {
    #[serde(default, deserialize_with = "null_as_default")]
    pub data: Vec<T>,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default)]
    pub limit: u32,
    #[serde(default)]
    pub page: u32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Dataset {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub permission: Option<String>,
    #[serde(default)]
    pub data_source_type: Option<String>,
    #[serde(default)]
    pub indexing_technique: Option<String>,
    #[serde(default)]
    pub app_count: u64,
    #[serde(default)]
    pub document_count: u64,
    #[serde(default)]
    pub word_count: u64,
    #[serde(default)]
    pub created_at: Option<i64>,
    #[serde(default)]
    pub updated_at: Option<i64>,
}

/// Indexing state reported by the service.
///
/// The member set belongs to the service; unknown values are preserved in
/// [`IndexingStatus::Other`] rather than rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum IndexingStatus {
    Queued,
    Indexing,
    Completed,
    Error,
    Paused,
    Other(String),
}

impl IndexingStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Queued => "queued",
            Self::Indexing => "indexing",
            Self::Completed => "completed",
            Self::Error => "error",
            Self::Paused => "paused",
            Self::Other(value) => value,
        }
    }

    /// Completed or failed; the service will not move it further on its own.
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }
}

impl From<String> for IndexingStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "queued" => Self::Queued,
            "indexing" => Self::Indexing,
            "completed" => Self::Completed,
            "error" => Self::Error,
            "paused" => Self::Paused,
            _ => Self::Other(value),
        }
    }
}

impl From<IndexingStatus> for String {
    fn from(value: IndexingStatus) -> Self {
        value.as_str().to_owned()
    }
}

impl fmt::Display for IndexingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Document {
    pub id: String,
    pub position: i64,
    pub name: String,
    pub indexing_status: IndexingStatus,
    #[serde(default)]
    pub data_source_type: Option<String>,
    #[serde(default)]
    pub created_from: Option<String>,
    /// Epoch seconds.
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub tokens: Option<u64>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub archived: bool,
}

impl Document {
    /// Indexed and currently served to retrieval.
    pub fn is_available(&self) -> bool {
        self.indexing_status == IndexingStatus::Completed && self.enabled && !self.archived
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Segment {
    pub id: String,
    /// Natural order within the document. Not necessarily contiguous.
    pub position: i64,
    pub document_id: String,
    pub content: String,
    #[serde(default)]
    pub answer: Option<String>,
    #[serde(default)]
    pub word_count: u64,
    #[serde(default)]
    pub tokens: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub hit_count: u64,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub created_at: Option<i64>,
    #[serde(default)]
    pub updated_at: Option<i64>,
    #[serde(default)]
    pub indexing_at: Option<i64>,
    #[serde(default)]
    pub completed_at: Option<i64>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Response of the segment list under one document: `{data[], doc_form, total}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SegmentsResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub data: Vec<Segment>,
    #[serde(default)]
    pub doc_form: Option<String>,
    #[serde(default)]
    pub total: Option<u64>,
}

/// Indexing technique selector for new documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexingTechnique {
    #[default]
    HighQuality,
    Economy,
}

/// `process_rule` object accepted by document creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessRule {
    pub mode: ProcessMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules: Option<ProcessRules>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessMode {
    Automatic,
    Custom,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessRules {
    pub pre_processing_rules: Vec<PreProcessingRule>,
    pub segmentation: Segmentation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreProcessingRule {
    pub id: String,
    pub enabled: bool,
}

impl PreProcessingRule {
    pub fn new(id: impl Into<String>, enabled: bool) -> Self {
        Self {
            id: id.into(),
            enabled,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segmentation {
    pub separator: String,
    pub max_tokens: u32,
}

impl Default for Segmentation {
    fn default() -> Self {
        Self {
            separator: "\n".to_owned(),
            max_tokens: 500,
        }
    }
}

impl ProcessRule {
    /// Let the service pick segmentation and cleaning.
    pub fn automatic() -> Self {
        Self {
            mode: ProcessMode::Automatic,
            rules: None,
        }
    }

    pub fn custom(
        segmentation: Segmentation,
        pre_processing_rules: Vec<PreProcessingRule>,
    ) -> Self {
        Self {
            mode: ProcessMode::Custom,
            rules: Some(ProcessRules {
                pre_processing_rules,
                segmentation,
            }),
        }
    }
}

impl Default for ProcessRule {
    /// Newline separator, 500 tokens per segment, whitespace and URL/e-mail cleanup.
    fn default() -> Self {
        Self::custom(
            Segmentation::default(),
            vec![
                PreProcessingRule::new("remove_extra_spaces", true),
                PreProcessingRule::new("remove_urls_emails", true),
            ],
        )
    }
}

/// `data` part of `create-by-file`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateByFileData {
    pub name: String,
    pub indexing_technique: IndexingTechnique,
    pub process_rule: ProcessRule,
}

/// Body of `create-by-text`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateByTextRequest {
    pub name: String,
    pub text: String,
    pub indexing_technique: IndexingTechnique,
    pub process_rule: ProcessRule,
}

/// Response of both document creation endpoints.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CreatedDocument {
    pub document: Document,
    #[serde(default)]
    pub batch: Option<String>,
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{Document, IndexingStatus, PaginatedResponse, ProcessRule};

    #[test]
    fn paginated_documents_accept_null_data() {
        let page: PaginatedResponse<Document> = serde_json::from_value(json!({
            "data": null,
            "has_more": false,
            "limit": 20,
            "total": 0,
            "page": 1
        }))
        .expect("parse");
        assert!(page.data.is_empty());
        assert_eq!(page.limit, 20);

        let page: PaginatedResponse<Document> = serde_json::from_value(json!({
            "data": [{"id": "d1", "position": 1, "name": "a.pdf", "indexing_status": "queued"}],
            "total": 1
        }))
        .expect("parse");
        assert_eq!(page.data[0].indexing_status, IndexingStatus::Queued);
        assert!(!page.has_more);
    }

    #[test]
    fn indexing_status_keeps_unknown_values() {
        let status: IndexingStatus = serde_json::from_value(json!("splitting")).expect("parse");
        assert_eq!(status, IndexingStatus::Other("splitting".to_owned()));
        assert_eq!(status.as_str(), "splitting");
        assert_eq!(serde_json::to_value(&status).expect("serialize"), json!("splitting"));

        let status: IndexingStatus = serde_json::from_value(json!("completed")).expect("parse");
        assert!(status.is_settled());
    }

    #[test]
    fn document_requires_position() {
        let missing = serde_json::from_value::<Document>(json!({
            "id": "d1", "name": "a.pdf", "indexing_status": "indexing"
        }));
        assert!(missing.is_err());
    }

    #[test]
    fn document_availability_honours_flags() {
        let mut document: Document = serde_json::from_value(json!({
            "id": "d1", "position": 1, "name": "a.pdf", "indexing_status": "completed",
            "created_at": 1700000000, "enabled": true, "archived": false, "extra": {"x": 1}
        }))
        .expect("parse");
        assert!(document.is_available());

        document.archived = true;
        assert!(!document.is_available());
    }

    #[test]
    fn default_process_rule_matches_custom_upload_defaults() {
        let value = serde_json::to_value(ProcessRule::default()).expect("serialize");
        assert_eq!(
            value,
            json!({
                "mode": "custom",
                "rules": {
                    "pre_processing_rules": [
                        {"id": "remove_extra_spaces", "enabled": true},
                        {"id": "remove_urls_emails", "enabled": true}
                    ],
                    "segmentation": {"separator": "\n", "max_tokens": 500}
                }
            })
        );
        assert_eq!(
            serde_json::to_value(ProcessRule::automatic()).expect("serialize"),
            json!({"mode": "automatic"})
        );
    }
}
