use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, Response, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::{ApiFamily, Credentials, DifyApiConfig};
use crate::error::{parse_error_message, DifyApiError};
use crate::events::{AnswerDelta, DecodedAnswer};
use crate::headers::{build_headers, ACCEPT_EVENT_STREAM, ACCEPT_JSON};
use crate::knowledge::{
    CreateByFileData, CreateByTextRequest, CreatedDocument, Dataset, Document, PaginatedResponse,
    SegmentsResponse,
};
use crate::payload::{
    ChatCompletion, ChatRequest, ConversationSummary, HistoryMessage, HistoryWindow,
    ResponseMode, UploadedFile,
};
use crate::retry::{is_retryable_http_error, retry_delay};
use crate::stream::{
    await_or_cancel, decode_answer_stream, is_cancelled, CancellationSignal, ChunkStream,
};
use crate::url::endpoint_url;

/// One part of a multipart body. Kept as plain data so retries can rebuild the form.
#[derive(Debug, Clone, PartialEq)]
pub enum MultipartField {
    Text {
        name: String,
        value: String,
    },
    File {
        name: String,
        file_name: String,
        mime_type: Option<String>,
        bytes: Vec<u8>,
    },
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(Value),
    Multipart(Vec<MultipartField>),
}

/// Endpoint-family-relative request description.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub family: ApiFamily,
    pub method: Method,
    pub path: Vec<String>,
    pub query: Vec<(String, String)>,
    pub body: RequestBody,
    pub accept: &'static str,
    /// Overrides the configured timeout for this call.
    pub timeout: Option<Duration>,
}

impl ApiRequest {
    pub fn new<I, S>(family: ApiFamily, method: Method, path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            family,
            method,
            path: path.into_iter().map(Into::into).collect(),
            query: Vec::new(),
            body: RequestBody::Empty,
            accept: ACCEPT_JSON,
            timeout: None,
        }
    }

    pub fn get<I, S>(family: ApiFamily, path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(family, Method::GET, path)
    }

    pub fn post<I, S>(family: ApiFamily, path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(family, Method::POST, path)
    }

    pub fn delete<I, S>(family: ApiFamily, path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(family, Method::DELETE, path)
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    pub fn with_json(mut self, body: Value) -> Self {
        self.body = RequestBody::Json(body);
        self
    }

    pub fn with_multipart(mut self, fields: Vec<MultipartField>) -> Self {
        self.body = RequestBody::Multipart(fields);
        self
    }

    pub fn is_event_stream(&self) -> bool {
        self.accept == ACCEPT_EVENT_STREAM
    }

    pub fn accepting_event_stream(mut self) -> Self {
        self.accept = ACCEPT_EVENT_STREAM;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[derive(Debug)]
pub struct DifyApiClient {
    http: Client,
    config: DifyApiConfig,
}

impl DifyApiClient {
    /// Build a client, failing fast when any of `required` lacks a usable
    /// base URL or API key.
    pub fn new(config: DifyApiConfig, required: &[ApiFamily]) -> Result<Self, DifyApiError> {
        for family in required {
            let credentials = credentials_for(&config, *family)?;
            endpoint_url(&credentials.base_url, &[])?;
        }

        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.connect_timeout(timeout).read_timeout(timeout);
        }
        let http = builder.build()?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &DifyApiConfig {
        &self.config
    }

    pub fn is_configured(&self, family: ApiFamily) -> bool {
        credentials_for(&self.config, family).is_ok()
    }

    pub fn endpoint(&self, family: ApiFamily, path: &[&str]) -> Result<Url, DifyApiError> {
        let credentials = credentials_for(&self.config, family)?;
        endpoint_url(&credentials.base_url, path)
    }

    pub fn build_headers(
        &self,
        family: ApiFamily,
        accept: &str,
    ) -> Result<HeaderMap, DifyApiError> {
        let headers = build_headers(&self.config, family, accept)?;
        let mut out = HeaderMap::new();
        for (key, value) in headers {
            out.insert(
                HeaderName::from_bytes(key.as_bytes())
                    .map_err(|_| DifyApiError::InvalidHeader(format!("invalid header key: {key}")))?,
                HeaderValue::from_str(&value).map_err(|_| {
                    DifyApiError::InvalidHeader(format!("invalid header value for {key}"))
                })?,
            );
        }
        Ok(out)
    }

    pub fn build_request(
        &self,
        request: &ApiRequest,
    ) -> Result<reqwest::RequestBuilder, DifyApiError> {
        let path: Vec<&str> = request.path.iter().map(String::as_str).collect();
        let url = self.endpoint(request.family, &path)?;
        let headers = self.build_headers(request.family, request.accept)?;

        let mut builder = self
            .http
            .request(request.method.clone(), url)
            .headers(headers);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(timeout) = self.total_deadline(request) {
            builder = builder.timeout(timeout);
        }

        Ok(match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(body) => builder.json(body),
            RequestBody::Multipart(fields) => builder.multipart(build_form(fields)?),
        })
    }

    /// Whole-request deadline. Event streams only get one when the request
    /// asks for it; otherwise the configured timeout bounds each read.
    fn total_deadline(&self, request: &ApiRequest) -> Option<Duration> {
        if request.timeout.is_some() || request.is_event_stream() {
            return request.timeout;
        }
        self.config.timeout
    }

    /// Send a request, retrying transient failures up to `max_retries` times.
    ///
    /// Statuses of 400 and above surface as [`DifyApiError::HttpStatus`].
    pub async fn send(
        &self,
        request: &ApiRequest,
        cancellation: Option<&CancellationSignal>,
    ) -> Result<Response, DifyApiError> {
        let max_retries = self.config.max_retries;
        let mut attempt = 0;

        loop {
            if is_cancelled(cancellation) {
                return Err(DifyApiError::Cancelled);
            }

            let builder = self.build_request(request)?;
            debug!(
                family = %request.family,
                method = %request.method,
                path = %request.path.join("/"),
                attempt,
                "sending request"
            );
            let response = await_or_cancel(builder.send(), cancellation).await?;

            match response {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) => {
                    let status = response.status();
                    let body = await_or_cancel(response.text(), cancellation)
                        .await?
                        .unwrap_or_default();
                    let message = parse_error_message(status, &body);

                    if attempt < max_retries && is_retryable_http_error(status.as_u16(), &body) {
                        debug!(%status, attempt, "retrying rejected request");
                        await_or_cancel(tokio::time::sleep(retry_delay(attempt)), cancellation)
                            .await?;
                        attempt += 1;
                        continue;
                    }

                    warn!(
                        family = %request.family,
                        %status,
                        %message,
                        "request rejected by service"
                    );
                    return Err(DifyApiError::HttpStatus {
                        status,
                        message,
                        body,
                    });
                }
                Err(error) => {
                    if attempt < max_retries {
                        debug!(%error, attempt, "retrying after network error");
                        await_or_cancel(tokio::time::sleep(retry_delay(attempt)), cancellation)
                            .await?;
                        attempt += 1;
                        continue;
                    }
                    warn!(family = %request.family, %error, "request failed");
                    return Err(DifyApiError::Network(error));
                }
            }
        }
    }

    /// Send a request and parse the JSON response body as `T`.
    pub async fn send_json<T>(
        &self,
        request: &ApiRequest,
        cancellation: Option<&CancellationSignal>,
    ) -> Result<T, DifyApiError>
    where
        T: DeserializeOwned,
    {
        let response = self.send(request, cancellation).await?;
        let body = await_or_cancel(response.text(), cancellation).await??;
        parse_json_body(&body)
    }

    /// Send a request and return its body as raw chunks.
    pub async fn send_streaming(
        &self,
        request: &ApiRequest,
        cancellation: Option<&CancellationSignal>,
    ) -> Result<ChunkStream, DifyApiError> {
        let response = self.send(request, cancellation).await?;
        Ok(Box::pin(response.bytes_stream().map(|chunk| {
            chunk.map(|bytes| bytes.to_vec()).map_err(DifyApiError::from)
        })))
    }

    /// `POST /chat-messages` in blocking mode.
    pub async fn chat(
        &self,
        request: &ChatRequest,
        cancellation: Option<&CancellationSignal>,
    ) -> Result<ChatCompletion, DifyApiError> {
        let mut body = request.clone();
        body.response_mode = ResponseMode::Blocking;
        let api_request = chat_messages_request(ApiFamily::Chat, &body)?;
        self.send_json(&api_request, cancellation).await
    }

    /// `POST /chat-messages` in streaming mode, returning the raw body chunks.
    pub async fn chat_stream(
        &self,
        request: &ChatRequest,
        cancellation: Option<&CancellationSignal>,
    ) -> Result<ChunkStream, DifyApiError> {
        let mut body = request.clone();
        body.response_mode = ResponseMode::Streaming;
        let api_request = chat_messages_request(ApiFamily::Chat, &body)?.accepting_event_stream();
        self.send_streaming(&api_request, cancellation).await
    }

    /// Streaming chat decoded end to end; `on_delta` observes each record.
    pub async fn chat_stream_with_handler<F>(
        &self,
        request: &ChatRequest,
        cancellation: Option<&CancellationSignal>,
        on_delta: F,
    ) -> Result<DecodedAnswer, DifyApiError>
    where
        F: FnMut(&AnswerDelta),
    {
        let chunks = self.chat_stream(request, cancellation).await?;
        decode_answer_stream(chunks, cancellation, on_delta).await
    }

    /// `GET /messages`: one window of a remote conversation's history.
    pub async fn conversation_messages(
        &self,
        conversation_id: &str,
        user: &str,
        first_id: Option<&str>,
        limit: u32,
    ) -> Result<HistoryWindow<HistoryMessage>, DifyApiError> {
        let mut request = ApiRequest::get(ApiFamily::Chat, ["messages"])
            .with_query("conversation_id", conversation_id)
            .with_query("user", user)
            .with_query("limit", limit);
        if let Some(first_id) = first_id.filter(|value| !value.trim().is_empty()) {
            request = request.with_query("first_id", first_id);
        }
        self.send_json(&request, None).await
    }

    /// `GET /conversations`: the user's conversations, newest first.
    pub async fn list_conversations(
        &self,
        user: &str,
        last_id: Option<&str>,
        limit: u32,
    ) -> Result<HistoryWindow<ConversationSummary>, DifyApiError> {
        let mut request = ApiRequest::get(ApiFamily::Chat, ["conversations"])
            .with_query("user", user)
            .with_query("limit", limit);
        if let Some(last_id) = last_id.filter(|value| !value.trim().is_empty()) {
            request = request.with_query("last_id", last_id);
        }
        self.send_json(&request, None).await
    }

    /// `DELETE /conversations/{id}`.
    pub async fn delete_conversation(
        &self,
        conversation_id: &str,
        user: &str,
    ) -> Result<(), DifyApiError> {
        let request = ApiRequest::delete(ApiFamily::Chat, ["conversations", conversation_id])
            .with_json(serde_json::json!({ "user": user }));
        self.send(&request, None).await?;
        Ok(())
    }

    /// `GET /datasets?page&limit`.
    pub async fn list_datasets(
        &self,
        page: u32,
        limit: u32,
    ) -> Result<PaginatedResponse<Dataset>, DifyApiError> {
        let request = ApiRequest::get(ApiFamily::Knowledge, ["datasets"])
            .with_query("page", page)
            .with_query("limit", limit);
        self.send_json(&request, None).await
    }

    /// `GET /datasets/{dataset}/documents?page&limit`.
    pub async fn list_documents(
        &self,
        dataset_id: &str,
        page: u32,
        limit: u32,
    ) -> Result<PaginatedResponse<Document>, DifyApiError> {
        let request = ApiRequest::get(ApiFamily::Knowledge, ["datasets", dataset_id, "documents"])
            .with_query("page", page)
            .with_query("limit", limit);
        self.send_json(&request, None).await
    }

    /// `GET /datasets/{dataset}/documents/{document}/segments`, in service order.
    pub async fn list_segments(
        &self,
        dataset_id: &str,
        document_id: &str,
    ) -> Result<SegmentsResponse, DifyApiError> {
        let request = ApiRequest::get(
            ApiFamily::Knowledge,
            ["datasets", dataset_id, "documents", document_id, "segments"],
        );
        self.send_json(&request, None).await
    }

    /// `POST /datasets/{dataset}/document/create-by-file`.
    pub async fn create_document_by_file(
        &self,
        dataset_id: &str,
        file_name: &str,
        file_bytes: Vec<u8>,
        data: &CreateByFileData,
    ) -> Result<CreatedDocument, DifyApiError> {
        let fields = vec![
            MultipartField::File {
                name: "file".to_owned(),
                file_name: file_name.to_owned(),
                mime_type: None,
                bytes: file_bytes,
            },
            MultipartField::Text {
                name: "data".to_owned(),
                value: serde_json::to_string(data)?,
            },
        ];
        let request = ApiRequest::post(
            ApiFamily::Knowledge,
            ["datasets", dataset_id, "document", "create-by-file"],
        )
        .with_multipart(fields);
        self.send_json(&request, None).await
    }

    /// `POST /datasets/{dataset}/document/create-by-text`.
    pub async fn create_document_by_text(
        &self,
        dataset_id: &str,
        body: &CreateByTextRequest,
    ) -> Result<CreatedDocument, DifyApiError> {
        let request = ApiRequest::post(
            ApiFamily::Knowledge,
            ["datasets", dataset_id, "document", "create-by-text"],
        )
        .with_json(serde_json::to_value(body)?);
        self.send_json(&request, None).await
    }

    /// `POST /files/upload` on the given family's app.
    pub async fn upload_file(
        &self,
        family: ApiFamily,
        file_name: &str,
        file_bytes: Vec<u8>,
        user: &str,
    ) -> Result<UploadedFile, DifyApiError> {
        let fields = vec![
            MultipartField::File {
                name: "file".to_owned(),
                file_name: file_name.to_owned(),
                mime_type: None,
                bytes: file_bytes,
            },
            MultipartField::Text {
                name: "user".to_owned(),
                value: user.to_owned(),
            },
        ];
        let request = ApiRequest::post(family, ["files", "upload"]).with_multipart(fields);
        self.send_json(&request, None).await
    }

    /// Blocking `POST /chat-messages` against another family's app.
    pub async fn chat_on(
        &self,
        family: ApiFamily,
        request: &ChatRequest,
    ) -> Result<ChatCompletion, DifyApiError> {
        let mut body = request.clone();
        body.response_mode = ResponseMode::Blocking;
        let api_request = chat_messages_request(family, &body)?;
        self.send_json(&api_request, None).await
    }
}

fn credentials_for(
    config: &DifyApiConfig,
    family: ApiFamily,
) -> Result<&Credentials, DifyApiError> {
    let credentials = config
        .credentials(family)
        .ok_or_else(|| DifyApiError::configuration(family, "credentials"))?;
    match credentials.missing_field() {
        Some(missing) => Err(DifyApiError::configuration(family, missing)),
        None => Ok(credentials),
    }
}

fn chat_messages_request(
    family: ApiFamily,
    body: &ChatRequest,
) -> Result<ApiRequest, DifyApiError> {
    Ok(ApiRequest::post(family, ["chat-messages"]).with_json(serde_json::to_value(body)?))
}

fn build_form(fields: &[MultipartField]) -> Result<Form, DifyApiError> {
    let mut form = Form::new();
    for field in fields {
        form = match field {
            MultipartField::Text { name, value } => form.text(name.clone(), value.clone()),
            MultipartField::File {
                name,
                file_name,
                mime_type,
                bytes,
            } => {
                let mut part = Part::bytes(bytes.clone()).file_name(file_name.clone());
                if let Some(mime_type) = mime_type {
                    part = part.mime_str(mime_type).map_err(|_| {
                        DifyApiError::InvalidHeader(format!("invalid mime type: {mime_type}"))
                    })?;
                }
                form.part(name.clone(), part)
            }
        };
    }
    Ok(form)
}

fn parse_json_body<T>(body: &str) -> Result<T, DifyApiError>
where
    T: DeserializeOwned,
{
    serde_json::from_str::<T>(body).map_err(|error| {
        DifyApiError::InvalidResponse(format!("{error} in body of {} bytes", body.len()))
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{parse_json_body, ApiRequest, DifyApiClient, MultipartField};
    use crate::config::{ApiFamily, DifyApiConfig};
    use crate::error::DifyApiError;
    use crate::payload::ChatCompletion;

    fn knowledge_only() -> DifyApiConfig {
        DifyApiConfig::new().with_knowledge("https://api.dify.ai/v1", "dataset-key")
    }

    #[test]
    fn construction_fails_fast_for_missing_family() {
        let error = DifyApiClient::new(knowledge_only(), &[ApiFamily::Chat])
            .expect_err("chat family is missing");
        assert!(matches!(
            error,
            DifyApiError::Configuration {
                family: ApiFamily::Chat,
                ..
            }
        ));
    }

    #[test]
    fn construction_rejects_blank_key() {
        let config = DifyApiConfig::new().with_chat("https://api.dify.ai/v1", "  ");
        let error = DifyApiClient::new(config, &[ApiFamily::Chat]).expect_err("blank key");
        assert_eq!(error.to_string(), "chat API is not configured: missing API key");
    }

    #[test]
    fn construction_rejects_unparsable_base_url() {
        let config = DifyApiConfig::new().with_chat("not a url", "key");
        let error = DifyApiClient::new(config, &[ApiFamily::Chat]).expect_err("bad url");
        assert!(matches!(error, DifyApiError::InvalidBaseUrl(_)));
    }

    #[test]
    fn unconfigured_family_fails_before_any_request() {
        let client = DifyApiClient::new(knowledge_only(), &[ApiFamily::Knowledge]).expect("client");
        let error = client
            .build_request(&ApiRequest::post(ApiFamily::Conversion, ["files", "upload"]))
            .expect_err("conversion not configured");
        assert!(matches!(error, DifyApiError::Configuration { .. }));
    }

    #[test]
    fn request_carries_family_bearer_and_query() {
        let config = knowledge_only().with_chat("https://chat.example/v1/", "app-key");
        let client = DifyApiClient::new(config, &[ApiFamily::Chat, ApiFamily::Knowledge])
            .expect("client");

        let request = client
            .build_request(
                &ApiRequest::get(ApiFamily::Knowledge, ["datasets"])
                    .with_query("page", 2)
                    .with_query("limit", 20),
            )
            .expect("builder")
            .build()
            .expect("request");
        assert_eq!(
            request.url().as_str(),
            "https://api.dify.ai/v1/datasets?page=2&limit=20"
        );
        assert_eq!(request.headers()["authorization"], "Bearer dataset-key");

        let request = client
            .build_request(&ApiRequest::post(ApiFamily::Chat, ["chat-messages"]).with_json(json!({})))
            .expect("builder")
            .build()
            .expect("request");
        assert_eq!(request.url().as_str(), "https://chat.example/v1/chat-messages");
        assert_eq!(request.headers()["authorization"], "Bearer app-key");
        assert_eq!(*request.method(), reqwest::Method::POST);
    }

    #[test]
    fn multipart_request_builds_with_boundary_content_type() {
        let client = DifyApiClient::new(knowledge_only(), &[ApiFamily::Knowledge]).expect("client");
        let request = client
            .build_request(
                &ApiRequest::post(ApiFamily::Knowledge, ["datasets", "ds", "document", "create-by-file"])
                    .with_multipart(vec![MultipartField::Text {
                        name: "data".to_owned(),
                        value: "{}".to_owned(),
                    }]),
            )
            .expect("builder")
            .build()
            .expect("request");
        let content_type = request.headers()["content-type"].to_str().expect("ascii");
        assert!(content_type.starts_with("multipart/form-data; boundary="));
    }

    #[test]
    fn invalid_json_body_is_an_invalid_response() {
        let error = parse_json_body::<ChatCompletion>("{\"conversation_id\":\"c\"}")
            .expect_err("answer is required");
        assert!(matches!(error, DifyApiError::InvalidResponse(_)));
    }
}
