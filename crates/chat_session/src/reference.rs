use dify_api::RetrieverResource;
use knowledge_base::SegmentTarget;
use serde::{Deserialize, Serialize};

/// Citation linking an assistant answer to one knowledge-base segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    pub dataset_id: String,
    pub dataset_name: String,
    pub document_id: String,
    pub document_name: String,
    pub segment_id: String,
    /// Relevance in `0.0..=1.0`, when the service reports one.
    pub score: Option<f64>,
    pub position: Option<u32>,
    pub content: Option<String>,
}

impl Reference {
    /// Navigation target; segment content is fetched only when navigated to.
    #[must_use]
    pub fn target(&self) -> SegmentTarget {
        SegmentTarget::new(&self.dataset_id, &self.document_id, &self.segment_id)
    }
}

impl From<&RetrieverResource> for Reference {
    fn from(resource: &RetrieverResource) -> Self {
        Self {
            dataset_id: resource.dataset_id.clone(),
            dataset_name: resource.dataset_name.clone(),
            document_id: resource.document_id.clone(),
            document_name: resource.document_name.clone(),
            segment_id: resource.segment_id.clone(),
            score: resource.score,
            position: resource.position,
            content: resource.content.clone(),
        }
    }
}

/// Map cited resources to references in the order the service ranked them.
pub fn resolve_references(resources: &[RetrieverResource]) -> Vec<Reference> {
    resources.iter().map(Reference::from).collect()
}
