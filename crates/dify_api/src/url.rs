use reqwest::Url;

use crate::error::DifyApiError;

/// Default base URL of the hosted knowledge API.
pub const DEFAULT_KNOWLEDGE_BASE_URL: &str = "https://api.dify.ai/v1";

/// Build an endpoint URL by appending path segments to a base URL.
///
/// Segments are percent-encoded individually, so ids may contain any
/// character. A trailing `/` on the base is ignored.
pub fn endpoint_url(base_url: &str, segments: &[&str]) -> Result<Url, DifyApiError> {
    let trimmed = base_url.trim().trim_end_matches('/');
    let mut url = Url::parse(trimmed)
        .map_err(|error| DifyApiError::InvalidBaseUrl(format!("{trimmed}: {error}")))?;

    {
        let mut path = url
            .path_segments_mut()
            .map_err(|_| DifyApiError::InvalidBaseUrl(format!("{trimmed}: cannot be a base")))?;
        path.pop_if_empty();
        for segment in segments {
            path.push(segment);
        }
    }

    Ok(url)
}

/// Strip surrounding whitespace and any trailing `/` from a base URL.
pub fn normalize_base_url(input: &str) -> String {
    input.trim().trim_end_matches('/').to_string()
}
