use std::sync::Arc;

use dify_api::knowledge::{
    CreateByFileData, CreateByTextRequest, Dataset, Document, IndexingTechnique, ProcessRule,
    SegmentsResponse,
};
use dify_api::payload::FileAttachment;
use dify_api::{
    ApiFamily, ChatRequest, DifyApiClient, DifyApiConfig, DifyApiError, ResponseMode, UploadError,
};
use tracing::{debug, info, warn};

use crate::pagination::{total_pages, PageRequest, PageResult};
use crate::segments::{LocatedSegment, SegmentTarget, SortedSegments};
use crate::upload::{translate_upload_error, UploadOptions};

/// User recorded by the conversion app for uploads made by this client.
pub const CONVERSION_USER: &str = "pdf-uploader";

/// Instruction sent to the conversion app alongside the uploaded file.
pub const CONVERSION_PROMPT: &str = "Convert the contents of this PDF file to Markdown.";

/// Read access to datasets, documents and segments, plus document registration.
///
/// Calls share no mutable state and may run concurrently.
#[derive(Debug, Clone)]
pub struct KnowledgeClient {
    api: Arc<DifyApiClient>,
}

impl KnowledgeClient {
    /// Build a dedicated transport for the knowledge family.
    pub fn new(config: DifyApiConfig) -> Result<Self, DifyApiError> {
        let api = DifyApiClient::new(config, &[ApiFamily::Knowledge])?;
        Ok(Self { api: Arc::new(api) })
    }

    /// Reuse an existing transport; it must have knowledge credentials.
    pub fn from_client(api: Arc<DifyApiClient>) -> Result<Self, DifyApiError> {
        api.endpoint(ApiFamily::Knowledge, &[])?;
        Ok(Self { api })
    }

    pub fn api(&self) -> &DifyApiClient {
        &self.api
    }

    /// Dataset configured as the default, or a configuration error.
    pub fn default_dataset_id(&self) -> Result<&str, DifyApiError> {
        self.api
            .config()
            .default_dataset_id()
            .ok_or_else(|| DifyApiError::Configuration {
                family: ApiFamily::Knowledge,
                missing: "dataset id",
            })
    }

    pub async fn list_datasets(
        &self,
        request: PageRequest,
    ) -> Result<PageResult<Dataset>, DifyApiError> {
        let response = self.api.list_datasets(request.page, request.limit).await?;
        Ok(PageResult::from_response(response, request))
    }

    /// Documents of the default dataset.
    pub async fn list_documents(
        &self,
        request: PageRequest,
    ) -> Result<PageResult<Document>, DifyApiError> {
        let dataset_id = self.default_dataset_id()?;
        self.list_documents_in(dataset_id, request).await
    }

    pub async fn list_documents_in(
        &self,
        dataset_id: &str,
        request: PageRequest,
    ) -> Result<PageResult<Document>, DifyApiError> {
        let response = self
            .api
            .list_documents(dataset_id, request.page, request.limit)
            .await?;
        Ok(PageResult::from_response(response, request))
    }

    /// Every document of a dataset, walking pages until the service reports
    /// no more. Never requests more than the page count implied by the first
    /// page's `total`.
    pub async fn all_documents(
        &self,
        dataset_id: &str,
        limit: u32,
    ) -> Result<Vec<Document>, DifyApiError> {
        let mut request = PageRequest::first(limit);
        let first = self.list_documents_in(dataset_id, request).await?;
        let pages = total_pages(first.total, first.limit);
        let mut has_more = first.has_more;
        let mut documents = first.data;

        while has_more && u64::from(request.page) < pages {
            request = request.next();
            let page = self.list_documents_in(dataset_id, request).await?;
            has_more = page.has_more && !page.is_empty();
            documents.extend(page.data);
        }

        debug!(dataset_id, count = documents.len(), pages, "collected documents");
        Ok(documents)
    }

    /// Segments of a document exactly as the service returned them.
    ///
    /// The service does not guarantee order; use [`Self::sorted_segments`] for display.
    pub async fn list_segments(
        &self,
        dataset_id: &str,
        document_id: &str,
    ) -> Result<SegmentsResponse, DifyApiError> {
        self.api.list_segments(dataset_id, document_id).await
    }

    pub async fn sorted_segments(
        &self,
        dataset_id: &str,
        document_id: &str,
    ) -> Result<SortedSegments, DifyApiError> {
        let response = self.list_segments(dataset_id, document_id).await?;
        Ok(SortedSegments::from_response(response))
    }

    /// Fetch the target's document segments and resolve the target's index.
    pub async fn locate_segment(
        &self,
        target: &SegmentTarget,
    ) -> Result<LocatedSegment, DifyApiError> {
        let segments = self
            .sorted_segments(&target.dataset_id, &target.document_id)
            .await?;
        let index = segments.position_of(&target.segment_id);
        if index.is_none() {
            debug!(
                document_id = %target.document_id,
                segment_id = %target.segment_id,
                "segment not found in document"
            );
        }
        Ok(LocatedSegment { segments, index })
    }

    /// Register a file with the default dataset. Indexing continues on the
    /// service; the returned document usually reports `indexing`.
    pub async fn upload_document(
        &self,
        file_bytes: Vec<u8>,
        file_name: &str,
        options: UploadOptions,
    ) -> Result<Document, UploadError> {
        let dataset_id = self.default_dataset_id().map_err(translate_upload_error)?;
        self.upload_document_to(dataset_id, file_bytes, file_name, options)
            .await
    }

    pub async fn upload_document_to(
        &self,
        dataset_id: &str,
        file_bytes: Vec<u8>,
        file_name: &str,
        options: UploadOptions,
    ) -> Result<Document, UploadError> {
        let data = CreateByFileData {
            name: options.name.unwrap_or_else(|| file_name.to_owned()),
            indexing_technique: options.indexing_technique,
            process_rule: options.process_rule,
        };

        match self
            .api
            .create_document_by_file(dataset_id, file_name, file_bytes, &data)
            .await
        {
            Ok(created) => {
                info!(
                    dataset_id,
                    document_id = %created.document.id,
                    status = %created.document.indexing_status,
                    "document registered"
                );
                Ok(created.document)
            }
            Err(error) => Err(log_upload_failure(translate_upload_error(error))),
        }
    }

    /// Register raw text as a new document of `dataset_id`.
    pub async fn create_document_by_text(
        &self,
        dataset_id: &str,
        name: &str,
        text: &str,
        rule: ProcessRule,
    ) -> Result<Document, UploadError> {
        let body = CreateByTextRequest {
            name: name.to_owned(),
            text: text.to_owned(),
            indexing_technique: IndexingTechnique::HighQuality,
            process_rule: rule,
        };

        match self.api.create_document_by_text(dataset_id, &body).await {
            Ok(created) => Ok(created.document),
            Err(error) => Err(log_upload_failure(translate_upload_error(error))),
        }
    }

    /// Convert a file to Markdown with the conversion app, then register the
    /// Markdown as a text document with the automatic process rule.
    pub async fn convert_and_add(
        &self,
        file_bytes: Vec<u8>,
        file_name: &str,
        dataset_id: &str,
    ) -> Result<Document, UploadError> {
        let uploaded = self
            .api
            .upload_file(ApiFamily::Conversion, file_name, file_bytes, CONVERSION_USER)
            .await
            .map_err(|error| log_upload_failure(translate_upload_error(error)))?;
        debug!(file_id = %uploaded.id, file_name, "file uploaded for conversion");

        let request = ChatRequest::new(CONVERSION_PROMPT, CONVERSION_USER, ResponseMode::Blocking)
            .with_file(FileAttachment::uploaded_document(uploaded.id));
        let converted = self
            .api
            .chat_on(ApiFamily::Conversion, &request)
            .await
            .map_err(|error| log_upload_failure(translate_upload_error(error)))?;

        self.create_document_by_text(
            dataset_id,
            file_name,
            &converted.answer,
            ProcessRule::automatic(),
        )
        .await
    }
}

fn log_upload_failure(error: UploadError) -> UploadError {
    warn!(code = %error.code, status = error.status, message = %error.message, "upload failed");
    error
}
