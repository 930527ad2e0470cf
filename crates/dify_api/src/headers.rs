use std::collections::BTreeMap;

use crate::config::{ApiFamily, DifyApiConfig};
use crate::error::DifyApiError;

pub const HEADER_ACCEPT: &str = "accept";
pub const HEADER_AUTHORIZATION: &str = "authorization";
pub const HEADER_USER_AGENT: &str = "user-agent";

pub const ACCEPT_JSON: &str = "application/json";
pub const ACCEPT_EVENT_STREAM: &str = "text/event-stream";

/// Build a deterministic header map for one request to `family`.
///
/// `Content-Type` is left to the body encoder so multipart boundaries survive.
pub fn build_headers(
    config: &DifyApiConfig,
    family: ApiFamily,
    accept: &str,
) -> Result<BTreeMap<String, String>, DifyApiError> {
    let credentials = config
        .credentials(family)
        .ok_or_else(|| DifyApiError::configuration(family, "credentials"))?;
    if let Some(missing) = credentials.missing_field() {
        return Err(DifyApiError::configuration(family, missing));
    }

    let mut headers = BTreeMap::new();
    headers.insert(
        HEADER_AUTHORIZATION.to_owned(),
        format!("Bearer {}", credentials.api_key.trim()),
    );
    headers.insert(HEADER_ACCEPT.to_owned(), accept.to_owned());

    let user_agent = config
        .user_agent
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
        .unwrap_or_else(default_user_agent);
    headers.insert(HEADER_USER_AGENT.to_owned(), user_agent);

    for (key, value) in &config.extra_headers {
        let key = key.trim().to_ascii_lowercase();
        // Extra headers cannot swap the credential of another family.
        if key == HEADER_AUTHORIZATION {
            continue;
        }
        headers.insert(key, value.trim().to_owned());
    }

    Ok(headers)
}

fn default_user_agent() -> String {
    format!("dify_api/{}", env!("CARGO_PKG_VERSION"))
}
