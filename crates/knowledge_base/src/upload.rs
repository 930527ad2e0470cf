use dify_api::error::ErrorBody;
use dify_api::knowledge::{IndexingTechnique, ProcessRule};
use dify_api::{DifyApiError, UploadError};

pub const CODE_STORAGE_QUOTA_EXCEEDED: &str = "storage_quota_exceeded";
pub const CODE_ACCESS_DENIED: &str = "access_denied";
pub const CODE_NETWORK_ERROR: &str = "network_error";
pub const CODE_CONFIG_ERROR: &str = "config_error";
pub const CODE_UPLOAD_FAILED: &str = "upload_failed";

/// Service message returned when the dataset's vector storage is full.
pub const VECTOR_SPACE_LIMIT_MESSAGE: &str =
    "The capacity of the vector space has reached the limit of your subscription";

const FALLBACK_STATUS: u16 = 500;

/// Segmentation and indexing options for a new document.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UploadOptions {
    /// Display name; defaults to the file name.
    pub name: Option<String>,
    pub indexing_technique: IndexingTechnique,
    pub process_rule: ProcessRule,
}

impl UploadOptions {
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_indexing_technique(mut self, technique: IndexingTechnique) -> Self {
        self.indexing_technique = technique;
        self
    }

    #[must_use]
    pub fn with_process_rule(mut self, rule: ProcessRule) -> Self {
        self.process_rule = rule;
        self
    }
}

/// Translate a transport failure into a structured, user-facing [`UploadError`].
pub fn translate_upload_error(error: DifyApiError) -> UploadError {
    match error {
        DifyApiError::Configuration { family, missing } => UploadError::new(
            CODE_CONFIG_ERROR,
            format!("{family} API configuration is missing its {missing}"),
            FALLBACK_STATUS,
        ),
        DifyApiError::Network(_) => UploadError::new(
            CODE_NETWORK_ERROR,
            "A network error occurred. Check the internet connection.",
            FALLBACK_STATUS,
        ),
        DifyApiError::HttpStatus { status, body, .. } => {
            translate_rejection(status.as_u16(), &body)
        }
        other => UploadError::new(CODE_UPLOAD_FAILED, other.to_string(), FALLBACK_STATUS),
    }
}

fn translate_rejection(status: u16, body: &str) -> UploadError {
    let parsed = ErrorBody::parse(body);
    let message = parsed.as_ref().and_then(ErrorBody::non_empty_message);

    match message {
        Some(message) if message.contains(VECTOR_SPACE_LIMIT_MESSAGE) => UploadError::new(
            CODE_STORAGE_QUOTA_EXCEEDED,
            "Storage capacity limit reached. Delete documents you no longer need.",
            status,
        ),
        Some(message) => {
            let code = parsed
                .as_ref()
                .and_then(ErrorBody::non_empty_code)
                .unwrap_or(CODE_UPLOAD_FAILED);
            UploadError::new(code, message, status)
        }
        None if status == 403 => UploadError::new(
            CODE_ACCESS_DENIED,
            "Access was denied. Check the API key.",
            status,
        ),
        None => UploadError::new(CODE_UPLOAD_FAILED, "Upload failed.", status),
    }
}
