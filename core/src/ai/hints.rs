use httpdate::parse_http_date;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use serde_json::Value;
use std::time::{Duration, SystemTime};

/// Server-provided delays are trusted only up to this window.
pub const MAX_SERVER_HINT_WINDOW: Duration = Duration::from_secs(60);

/// Extracts a clamped retry delay from a 429 response, preferring the
/// `Retry-After` header over the `RetryInfo` detail in the error body.
pub fn retry_hint(headers: &HeaderMap, body: &str) -> Option<Duration> {
    let hint = retry_after_header(headers).or_else(|| retry_info_from_body(body));
    hint.map(|delay| delay.min(MAX_SERVER_HINT_WINDOW))
}

fn retry_after_header(headers: &HeaderMap) -> Option<Duration> {
    let raw = headers.get(RETRY_AFTER)?.to_str().ok()?;
    parse_retry_after(raw, SystemTime::now())
}

/// Parses an HTTP `Retry-After` value, either delta-seconds or an HTTP date.
pub fn parse_retry_after(value: &str, now: SystemTime) -> Option<Duration> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(seconds) = trimmed.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    if let Ok(when) = parse_http_date(trimmed) {
        return match when.duration_since(now) {
            Ok(delta) => Some(delta),
            Err(_) => Some(Duration::from_secs(0)),
        };
    }

    None
}

fn retry_info_from_body(body: &str) -> Option<Duration> {
    for detail in error_details(body)? {
        let type_url = detail.get("@type").and_then(Value::as_str).unwrap_or("");
        if !type_url.ends_with("RetryInfo") {
            continue;
        }
        if let Some(delay) = detail.get("retryDelay").and_then(parse_retry_delay_field) {
            return Some(delay);
        }
    }
    None
}

/// True when the error body carries a `QuotaFailure` detail, meaning the key
/// is out of quota rather than momentarily throttled.
pub fn is_quota_exhausted(body: &str) -> bool {
    let Some(details) = error_details(body) else {
        return false;
    };
    details.iter().any(|detail| {
        detail
            .get("@type")
            .and_then(Value::as_str)
            .is_some_and(|type_url| type_url.ends_with("QuotaFailure"))
    })
}

fn error_details(body: &str) -> Option<Vec<Value>> {
    let value: Value = serde_json::from_str(body).ok()?;
    value
        .get("error")?
        .get("details")?
        .as_array()
        .cloned()
}

/// Parses the `retryDelay` field of a `RetryInfo` detail: either a string
/// such as `"3s"`/`"1.5s"`, or a `{seconds, nanos}` object.
pub fn parse_retry_delay_field(value: &Value) -> Option<Duration> {
    if let Some(text) = value.as_str() {
        return parse_seconds_string(text);
    }

    let object = value.as_object()?;
    let seconds = object.get("seconds").and_then(lenient_i64).unwrap_or(0);
    let nanos = object.get("nanos").and_then(lenient_i64).unwrap_or(0);
    if seconds < 0 || nanos < 0 {
        return None;
    }

    let secs: u64 = seconds.try_into().ok()?;
    let nanos: u32 = nanos.try_into().ok()?;
    Some(Duration::from_secs(secs) + Duration::from_nanos(u64::from(nanos)))
}

fn parse_seconds_string(input: &str) -> Option<Duration> {
    let trimmed = input.trim();
    let stripped = trimmed.strip_suffix('s')?;
    let seconds = stripped.parse::<f64>().ok()?;
    if !seconds.is_finite() || seconds.is_sign_negative() {
        return None;
    }
    Some(Duration::from_secs_f64(seconds))
}

fn lenient_i64(value: &Value) -> Option<i64> {
    if let Some(number) = value.as_i64() {
        return Some(number);
    }
    value.as_str()?.parse::<i64>().ok()
}
