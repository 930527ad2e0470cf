use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Endpoint family. Each family authenticates with its own bearer key against
/// its own base URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ApiFamily {
    /// Conversational app (`/chat-messages`, `/conversations`, `/messages`).
    Chat,
    /// Knowledge-base API (`/datasets/...`).
    Knowledge,
    /// Document-conversion app used to turn uploaded files into Markdown.
    Conversion,
}

impl ApiFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::Knowledge => "knowledge",
            Self::Conversion => "conversion",
        }
    }
}

impl fmt::Display for ApiFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Base URL and bearer key for one endpoint family.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub base_url: String,
    pub api_key: String,
}

impl Credentials {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    /// Name of the first missing field, if any.
    pub(crate) fn missing_field(&self) -> Option<&'static str> {
        if self.base_url.trim().is_empty() {
            Some("base URL")
        } else if self.api_key.trim().is_empty() {
            Some("API key")
        } else {
            None
        }
    }
}

// Keys must never end up in logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

/// Transport configuration for Dify API requests.
#[derive(Debug, Clone, Default)]
pub struct DifyApiConfig {
    pub chat: Option<Credentials>,
    pub knowledge: Option<Credentials>,
    pub conversion: Option<Credentials>,
    /// Dataset used when a knowledge call does not name one explicitly.
    pub dataset_id: Option<String>,
    /// Optional `User-Agent` override.
    pub user_agent: Option<String>,
    /// Additional headers merged into request headers.
    pub extra_headers: BTreeMap<String, String>,
    /// Deadline for non-streaming calls, and the longest wait for the next
    /// chunk of a streamed answer. Expiry surfaces as a network error.
    pub timeout: Option<Duration>,
    /// Retries after the initial attempt for transient failures. Default: 0.
    pub max_retries: u32,
}

impl DifyApiConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_chat(mut self, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        self.chat = Some(Credentials::new(base_url, api_key));
        self
    }

    pub fn with_knowledge(
        mut self,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        self.knowledge = Some(Credentials::new(base_url, api_key));
        self
    }

    pub fn with_conversion(
        mut self,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        self.conversion = Some(Credentials::new(base_url, api_key));
        self
    }

    pub fn with_dataset_id(mut self, dataset_id: impl Into<String>) -> Self {
        self.dataset_id = Some(dataset_id.into());
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn insert_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers.insert(key.into(), value.into());
        self
    }

    pub fn credentials(&self, family: ApiFamily) -> Option<&Credentials> {
        match family {
            ApiFamily::Chat => self.chat.as_ref(),
            ApiFamily::Knowledge => self.knowledge.as_ref(),
            ApiFamily::Conversion => self.conversion.as_ref(),
        }
    }

    /// Default dataset id, ignoring blank values.
    pub fn default_dataset_id(&self) -> Option<&str> {
        self.dataset_id
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }
}
