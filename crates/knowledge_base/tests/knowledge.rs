mod support;

use dify_api::knowledge::{IndexingStatus, IndexingTechnique, ProcessRule, Segmentation};
use dify_api::DifyApiConfig;
use knowledge_base::{KnowledgeClient, PageRequest, SegmentTarget, UploadOptions};

use support::{json, Reply, ScriptedServer};

fn client_for(server: &ScriptedServer) -> KnowledgeClient {
    let config = DifyApiConfig::new()
        .with_knowledge(&server.base_url, "dataset-key")
        .with_conversion(&server.base_url, "md-key")
        .with_dataset_id("ds-main");
    KnowledgeClient::new(config).expect("client")
}

fn document_json(id: &str, position: i64, status: &str) -> String {
    format!(
        r#"{{"id":"{id}","position":{position},"name":"{id}.pdf","indexing_status":"{status}","created_at":1700000000,"enabled":true,"archived":false}}"#
    )
}

#[tokio::test]
async fn locate_segment_sorts_then_resolves_index() {
    let server = ScriptedServer::new(vec![json(
        200,
        r#"{"data":[
            {"id":"a","position":2,"document_id":"doc-1","content":"third"},
            {"id":"b","position":0,"document_id":"doc-1","content":"first"},
            {"id":"c","position":1,"document_id":"doc-1","content":"second"}
        ],"doc_form":"text_model","total":3}"#,
    )])
    .await;
    let client = client_for(&server);

    let located = client
        .locate_segment(&SegmentTarget::new("ds-other", "doc-1", "c"))
        .await
        .expect("segments");

    let ids: Vec<&str> = located
        .segments
        .iter()
        .map(|segment| segment.id.as_str())
        .collect();
    assert_eq!(ids, vec!["b", "c", "a"]);
    assert_eq!(located.index, Some(1));
    assert_eq!(located.segment().map(|segment| segment.content.as_str()), Some("second"));
    assert_eq!(located.segments.doc_form(), Some("text_model"));

    assert!(server
        .request(0)
        .starts_with("GET /v1/datasets/ds-other/documents/doc-1/segments HTTP/1.1"));
}

#[tokio::test]
async fn list_segments_keeps_service_order() {
    let server = ScriptedServer::new(vec![json(
        200,
        r#"{"data":[
            {"id":"a","position":2,"document_id":"d","content":"x"},
            {"id":"b","position":0,"document_id":"d","content":"y"}
        ],"doc_form":"text_model","total":2}"#,
    )])
    .await;
    let client = client_for(&server);

    let raw = client.list_segments("ds", "d").await.expect("segments");
    assert_eq!(raw.data[0].id, "a");
    assert_eq!(raw.total, Some(2));
}

#[tokio::test]
async fn list_documents_uses_default_dataset_and_reports_page_count() {
    let body = format!(
        r#"{{"data":[{}],"has_more":true,"limit":20,"total":41,"page":1}}"#,
        document_json("d1", 1, "completed")
    );
    let server = ScriptedServer::new(vec![json(200, &body)]).await;
    let client = client_for(&server);

    let page = client
        .list_documents(PageRequest::default())
        .await
        .expect("documents");

    assert_eq!(page.total_pages(), 3);
    assert!(page.data[0].is_available());
    assert!(server
        .request(0)
        .starts_with("GET /v1/datasets/ds-main/documents?page=1&limit=20 HTTP/1.1"));
}

#[tokio::test]
async fn empty_dataset_list_still_has_one_page() {
    let server = ScriptedServer::new(vec![json(
        200,
        r#"{"data":[],"has_more":false,"limit":20,"total":0,"page":1}"#,
    )])
    .await;
    let client = client_for(&server);

    let page = client
        .list_datasets(PageRequest::default())
        .await
        .expect("datasets");
    assert!(page.is_empty());
    assert_eq!(page.total_pages(), 1);
}

#[tokio::test]
async fn all_documents_walks_every_page() {
    let first = format!(
        r#"{{"data":[{},{}],"has_more":true,"limit":2,"total":3,"page":1}}"#,
        document_json("d1", 1, "completed"),
        document_json("d2", 2, "indexing"),
    );
    let second = format!(
        r#"{{"data":[{}],"has_more":false,"limit":2,"total":3,"page":2}}"#,
        document_json("d3", 3, "splitting"),
    );
    let server = ScriptedServer::new(vec![json(200, &first), json(200, &second)]).await;
    let client = client_for(&server);

    let documents = client.all_documents("ds-main", 2).await.expect("documents");

    let ids: Vec<&str> = documents.iter().map(|document| document.id.as_str()).collect();
    assert_eq!(ids, vec!["d1", "d2", "d3"]);
    assert_eq!(
        documents[2].indexing_status,
        IndexingStatus::Other("splitting".to_owned())
    );
    assert_eq!(server.request_count(), 2);
    assert!(server.request(1).contains("page=2&limit=2"));
}

#[tokio::test]
async fn upload_registers_document_with_process_rule() {
    let body = format!(r#"{{"document":{},"batch":"b-1"}}"#, document_json("new", 4, "indexing"));
    let server = ScriptedServer::new(vec![json(200, &body)]).await;
    let client = client_for(&server);

    let options = UploadOptions::default()
        .with_name("Handbook")
        .with_indexing_technique(IndexingTechnique::Economy)
        .with_process_rule(ProcessRule::custom(
            Segmentation {
                separator: "###".to_owned(),
                max_tokens: 800,
            },
            Vec::new(),
        ));
    let document = client
        .upload_document(b"%PDF-1.7".to_vec(), "handbook.pdf", options)
        .await
        .expect("upload");

    assert_eq!(document.id, "new");
    assert_eq!(document.indexing_status, IndexingStatus::Indexing);

    let sent = server.request(0);
    assert!(sent.starts_with("POST /v1/datasets/ds-main/document/create-by-file HTTP/1.1"));
    assert!(sent.contains("filename=\"handbook.pdf\""));
    assert!(sent.contains("\"name\":\"Handbook\""));
    assert!(sent.contains("\"indexing_technique\":\"economy\""));
    assert!(sent.contains("\"separator\":\"###\""));
    assert!(sent.contains("\"max_tokens\":800"));
}

#[tokio::test]
async fn upload_translates_storage_quota_and_access_denied() {
    let server = ScriptedServer::new(vec![
        json(
            403,
            r#"{"code":"forbidden","message":"The capacity of the vector space has reached the limit of your subscription.","status":403}"#,
        ),
        json(403, ""),
    ])
    .await;
    let client = client_for(&server);

    let error = client
        .upload_document(b"x".to_vec(), "a.txt", UploadOptions::default())
        .await
        .expect_err("quota");
    assert_eq!(error.code, "storage_quota_exceeded");
    assert_eq!(error.status, 403);

    let error = client
        .upload_document(b"x".to_vec(), "a.txt", UploadOptions::default())
        .await
        .expect_err("forbidden");
    assert_eq!(error.code, "access_denied");
}

#[tokio::test]
async fn upload_network_failure_is_network_error() {
    let server = ScriptedServer::new(vec![Reply::Reset]).await;
    let client = client_for(&server);

    let error = client
        .upload_document(b"x".to_vec(), "a.txt", UploadOptions::default())
        .await
        .expect_err("reset");
    assert_eq!(error.code, "network_error");
    assert_eq!(error.status, 500);
}

#[tokio::test]
async fn upload_without_default_dataset_is_config_error() {
    let config = DifyApiConfig::new().with_knowledge("http://127.0.0.1:9/v1", "dataset-key");
    let client = KnowledgeClient::new(config).expect("client");

    let error = client
        .upload_document(b"x".to_vec(), "a.txt", UploadOptions::default())
        .await
        .expect_err("no dataset");
    assert_eq!(error.code, "config_error");
    assert_eq!(error.status, 500);
}

#[tokio::test]
async fn convert_and_add_uploads_converts_then_registers_text() {
    let created = format!(r#"{{"document":{}}}"#, document_json("md-doc", 9, "indexing"));
    let server = ScriptedServer::new(vec![
        json(200, r#"{"id":"file-7","name":"report.pdf","size":8,"extension":"pdf"}"#),
        json(200, r##"{"message_id":"m","conversation_id":"c","answer":"# Report\n\nBody"}"##),
        json(200, &created),
    ])
    .await;
    let client = client_for(&server);

    let document = client
        .convert_and_add(b"%PDF-1.7".to_vec(), "report.pdf", "ds-target")
        .await
        .expect("converted");
    assert_eq!(document.id, "md-doc");

    let upload = server.request(0);
    assert!(upload.starts_with("POST /v1/files/upload HTTP/1.1"));
    assert!(upload.to_ascii_lowercase().contains("authorization: bearer md-key"));
    assert!(upload.contains("pdf-uploader"));

    let conversion = server.request(1);
    assert!(conversion.starts_with("POST /v1/chat-messages HTTP/1.1"));
    assert!(conversion.contains("\"response_mode\":\"blocking\""));
    assert!(conversion.contains("\"upload_file_id\":\"file-7\""));
    assert!(conversion.contains("\"transfer_method\":\"local_file\""));

    let register = server.request(2);
    assert!(register.starts_with("POST /v1/datasets/ds-target/document/create-by-text HTTP/1.1"));
    assert!(register.to_ascii_lowercase().contains("authorization: bearer dataset-key"));
    assert!(register.contains("\"text\":\"# Report\\n\\nBody\""));
    assert!(register.contains("\"process_rule\":{\"mode\":\"automatic\"}"));
}
