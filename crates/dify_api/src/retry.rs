use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;

/// Base delay before the first retry.
pub const BASE_DELAY_MS: u64 = 1000;
/// Upper bound on a single backoff delay.
pub const MAX_DELAY_MS: u64 = 30_000;

fn retryable_body_regex() -> &'static Regex {
    static CACHED: OnceLock<Regex> = OnceLock::new();
    CACHED.get_or_init(|| {
        Regex::new(r"(?i)rate.?limit|overloaded|service.?unavailable|upstream.?connect|connection.?refused|gateway.?time.?out")
            .expect("retry regex must compile")
    })
}

/// Retry policy for transient statuses and transient failure text.
///
/// 4xx rejections other than 429 are not retried unless the body names a
/// transient cause.
pub fn is_retryable_http_error(status: u16, body: &str) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504) || retryable_body_regex().is_match(body)
}

/// Exponential backoff delay for a retry attempt, capped at [`MAX_DELAY_MS`].
pub fn retry_delay(attempt: u32) -> Duration {
    let exponent = attempt.min(30);
    let millis = BASE_DELAY_MS.saturating_mul(2u64.saturating_pow(exponent));
    Duration::from_millis(millis.min(MAX_DELAY_MS))
}
