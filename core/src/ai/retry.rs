use super::CompletionError;
use std::time::Duration;

/// Policy parameters for retry decisions.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Delay between chapter attempts; also the first backoff step.
    pub base_delay: Duration,
    /// Cap applied to backoff delays and server hints alike.
    pub max_delay: Duration,
    /// Total attempts allowed, the first call included.
    pub max_attempts: u32,
}

impl RetryPolicy {
    pub const fn new(base_delay: Duration, max_delay: Duration, max_attempts: u32) -> Self {
        Self {
            base_delay,
            max_delay,
            max_attempts,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(30), 3)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryDecision {
    pub should_retry: bool,
    pub delay: Duration,
    pub used_hint: bool,
}

impl RetryDecision {
    const fn no_retry() -> Self {
        Self {
            should_retry: false,
            delay: Duration::from_millis(0),
            used_hint: false,
        }
    }
}

/// Decision for the rate-limit retries of a glossary segment call: only
/// rate-limit faults qualify, the server hint wins when present, and the
/// fallback is doubling backoff capped at `max_delay`.
///
/// * `retries_made` counts the retries already spent on this call.
pub fn backoff_retry(
    error: &CompletionError,
    policy: &RetryPolicy,
    retries_made: u32,
) -> RetryDecision {
    if retries_made >= policy.max_attempts {
        return RetryDecision::no_retry();
    }

    let CompletionError::RateLimited { retry_hint, .. } = error else {
        return RetryDecision::no_retry();
    };

    if let Some(hint) = retry_hint {
        return RetryDecision {
            should_retry: true,
            delay: (*hint).min(policy.max_delay),
            used_hint: true,
        };
    }

    RetryDecision {
        should_retry: true,
        delay: exponential_backoff(policy.base_delay, policy.max_delay, retries_made),
        used_hint: false,
    }
}

fn exponential_backoff(base: Duration, max_delay: Duration, retries_made: u32) -> Duration {
    if base.is_zero() {
        return Duration::from_millis(0);
    }

    let mut multiplier: u128 = 1;
    for _ in 0..retries_made {
        multiplier = multiplier.saturating_mul(2);
    }

    let delay_ms = base.as_millis().saturating_mul(multiplier);
    let capped_ms = delay_ms.min(max_delay.as_millis());
    Duration::from_millis(capped_ms as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::hints::{parse_retry_after, parse_retry_delay_field, retry_hint};
    use reqwest::header::HeaderMap;
    use std::time::SystemTime;

    const POLICY: RetryPolicy = RetryPolicy {
        base_delay: Duration::from_secs(1),
        max_delay: Duration::from_secs(30),
        max_attempts: 3,
    };

    fn rate_limited(hint: Option<Duration>) -> CompletionError {
        CompletionError::RateLimited {
            message: "slow down".into(),
            retry_hint: hint,
        }
    }

    #[test]
    fn uses_hint_delay_when_available() {
        let decision = backoff_retry(&rate_limited(Some(Duration::from_secs(19))), &POLICY, 0);
        assert!(decision.should_retry);
        assert!(decision.used_hint);
        assert_eq!(decision.delay, Duration::from_secs(19));
    }

    #[test]
    fn exponential_backoff_without_hint() {
        let first = backoff_retry(&rate_limited(None), &POLICY, 0);
        let second = backoff_retry(&rate_limited(None), &POLICY, 1);
        let third = backoff_retry(&rate_limited(None), &POLICY, 2);

        assert_eq!(first.delay, Duration::from_secs(1));
        assert_eq!(second.delay, Duration::from_secs(2));
        assert_eq!(third.delay, Duration::from_secs(4));
        assert!(!first.used_hint);
    }

    #[test]
    fn respects_max_delay_cap() {
        let policy = RetryPolicy::new(Duration::from_secs(4), Duration::from_secs(10), 5);
        let decision = backoff_retry(&rate_limited(None), &policy, 3);
        assert_eq!(decision.delay, Duration::from_secs(10));
    }

    #[test]
    fn hint_is_capped_too() {
        let policy = RetryPolicy::new(Duration::from_secs(1), Duration::from_secs(5), 3);
        let decision = backoff_retry(&rate_limited(Some(Duration::from_secs(40))), &policy, 0);
        assert_eq!(decision.delay, Duration::from_secs(5));
    }

    #[test]
    fn non_rate_limit_errors_fail_fast() {
        let error = CompletionError::Network {
            message: "connection reset".into(),
        };
        assert!(!backoff_retry(&error, &POLICY, 0).should_retry);

        let error = CompletionError::AccessDenied {
            message: "blocked".into(),
        };
        assert!(!backoff_retry(&error, &POLICY, 0).should_retry);
    }

    #[test]
    fn retry_budget_is_bounded() {
        let decision = backoff_retry(&rate_limited(None), &POLICY, POLICY.max_attempts);
        assert!(!decision.should_retry);
    }

    #[test]
    fn terminal_classification_matches_taxonomy() {
        assert!(CompletionError::AccessDenied {
            message: "403".into()
        }
        .is_terminal());
        assert!(CompletionError::InvalidRequest {
            message: "bad header bytes".into()
        }
        .is_terminal());
        assert!(CompletionError::EmptyResponse.is_terminal());
        assert!(!rate_limited(None).is_terminal());
        assert!(!CompletionError::MalformedResponse {
            message: "shape".into()
        }
        .is_terminal());
    }

    #[test]
    fn parse_retry_after_seconds_header() {
        let duration = parse_retry_after("120", SystemTime::now()).unwrap();
        assert_eq!(duration, Duration::from_secs(120));
    }

    #[test]
    fn parse_retry_after_http_date() {
        let now = SystemTime::now();
        let later = now + Duration::from_secs(30);
        let header = httpdate::fmt_http_date(later);
        let parsed = parse_retry_after(&header, now).unwrap();
        assert_eq!(parsed.as_secs(), 30);
    }

    #[test]
    fn parse_retry_delay_string_and_object() {
        let string_form = serde_json::json!("1.5s");
        assert_eq!(
            parse_retry_delay_field(&string_form).unwrap().as_millis(),
            1500
        );

        let object_form = serde_json::json!({"seconds": "2", "nanos": 500_000_000});
        assert_eq!(
            parse_retry_delay_field(&object_form).unwrap().as_millis(),
            2500
        );
    }

    #[test]
    fn body_hint_is_clamped_to_window() {
        let body = r#"{"error":{"details":[{"@type":"type.googleapis.com/google.rpc.RetryInfo","retryDelay":"600s"}]}}"#;
        let hint = retry_hint(&HeaderMap::new(), body).unwrap();
        assert_eq!(hint, Duration::from_secs(60));
    }
}
