use std::collections::HashSet;

use dify_api::knowledge::{Segment, SegmentsResponse};
use tracing::warn;

/// Addressable location of one segment: `(dataset, document, segment)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SegmentTarget {
    pub dataset_id: String,
    pub document_id: String,
    pub segment_id: String,
}

impl SegmentTarget {
    #[must_use]
    pub fn new(
        dataset_id: impl Into<String>,
        document_id: impl Into<String>,
        segment_id: impl Into<String>,
    ) -> Self {
        Self {
            dataset_id: dataset_id.into(),
            document_id: document_id.into(),
            segment_id: segment_id.into(),
        }
    }
}

/// Segments of one document in `position` order.
///
/// Ties keep arrival order. Ids are unique; later duplicates are dropped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SortedSegments {
    segments: Vec<Segment>,
    doc_form: Option<String>,
}

impl SortedSegments {
    pub fn from_unordered(segments: Vec<Segment>) -> Self {
        let mut seen = HashSet::with_capacity(segments.len());
        let mut unique = Vec::with_capacity(segments.len());
        for segment in segments {
            if seen.insert(segment.id.clone()) {
                unique.push(segment);
            } else {
                warn!(segment_id = %segment.id, "dropping duplicate segment id");
            }
        }

        unique.sort_by_key(|segment| segment.position);
        Self {
            segments: unique,
            doc_form: None,
        }
    }

    pub fn from_response(response: SegmentsResponse) -> Self {
        let mut sorted = Self::from_unordered(response.data);
        sorted.doc_form = response.doc_form;
        sorted
    }

    /// Index of `segment_id` within the sorted order.
    pub fn position_of(&self, segment_id: &str) -> Option<usize> {
        self.segments
            .iter()
            .position(|segment| segment.id == segment_id)
    }

    pub fn get(&self, index: usize) -> Option<&Segment> {
        self.segments.get(index)
    }

    pub fn find(&self, segment_id: &str) -> Option<&Segment> {
        self.position_of(segment_id).and_then(|index| self.get(index))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Segment> {
        self.segments.iter()
    }

    pub fn as_slice(&self) -> &[Segment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Document form reported by the service (`text_model`, `qa_model`, ...).
    pub fn doc_form(&self) -> Option<&str> {
        self.doc_form.as_deref()
    }

    pub fn into_vec(self) -> Vec<Segment> {
        self.segments
    }
}

impl<'a> IntoIterator for &'a SortedSegments {
    type Item = &'a Segment;
    type IntoIter = std::slice::Iter<'a, Segment>;

    fn into_iter(self) -> Self::IntoIter {
        self.segments.iter()
    }
}

impl IntoIterator for SortedSegments {
    type Item = Segment;
    type IntoIter = std::vec::IntoIter<Segment>;

    fn into_iter(self) -> Self::IntoIter {
        self.segments.into_iter()
    }
}

/// Sorted segments of a document with the index of the requested segment.
#[derive(Debug, Clone, PartialEq)]
pub struct LocatedSegment {
    pub segments: SortedSegments,
    /// `None` when the segment is not (or no longer) part of the document.
    pub index: Option<usize>,
}

impl LocatedSegment {
    pub fn segment(&self) -> Option<&Segment> {
        self.index.and_then(|index| self.segments.get(index))
    }
}

#[cfg(test)]
mod tests {
    use dify_api::knowledge::Segment;
    use serde_json::json;

    use super::SortedSegments;

    fn segment(id: &str, position: i64) -> Segment {
        serde_json::from_value(json!({
            "id": id,
            "position": position,
            "document_id": "doc",
            "content": format!("content {id}"),
        }))
        .expect("segment")
    }

    #[test]
    fn sorts_by_position_and_locates_by_id() {
        let sorted = SortedSegments::from_unordered(vec![
            segment("a", 2),
            segment("b", 0),
            segment("c", 1),
        ]);

        let ids: Vec<&str> = sorted.iter().map(|segment| segment.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
        assert_eq!(sorted.position_of("c"), Some(1));
        assert_eq!(sorted.position_of("missing"), None);
    }

    #[test]
    fn equal_positions_keep_arrival_order() {
        let sorted = SortedSegments::from_unordered(vec![
            segment("x", 5),
            segment("y", 1),
            segment("z", 5),
        ]);
        let ids: Vec<&str> = sorted.iter().map(|segment| segment.id.as_str()).collect();
        assert_eq!(ids, vec!["y", "x", "z"]);
    }

    #[test]
    fn duplicate_ids_keep_first_occurrence() {
        let sorted = SortedSegments::from_unordered(vec![
            segment("a", 3),
            segment("a", 0),
            segment("b", 1),
        ]);
        assert_eq!(sorted.len(), 2);
        assert_eq!(sorted.find("a").map(|segment| segment.position), Some(3));
    }

    #[test]
    fn sorted_output_is_non_decreasing_for_any_input_order() {
        let positions = [9_i64, -1, 4, 4, 0, 12, 3, 3, 7];
        for rotation in 0..positions.len() {
            let mut input: Vec<i64> = positions.to_vec();
            input.rotate_left(rotation);
            let segments = input
                .iter()
                .enumerate()
                .map(|(index, position)| segment(&format!("s{index}"), *position))
                .collect();
            let sorted = SortedSegments::from_unordered(segments);
            assert!(sorted
                .as_slice()
                .windows(2)
                .all(|pair| pair[0].position <= pair[1].position));
        }
    }
}
