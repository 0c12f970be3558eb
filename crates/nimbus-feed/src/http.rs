//! Shared HTTP plumbing for vendor feeds.

use std::time::Duration;

use nimbus_core::Rational;
use nimbus_core::error::ExternalError;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

pub fn client() -> Result<Client, ExternalError> {
    Client::builder()
        .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
        .user_agent(concat!("nimbus/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(map_error)
}

pub fn map_error(e: reqwest::Error) -> ExternalError {
    if e.is_timeout() {
        ExternalError::Timeout
    } else if e.is_decode() {
        ExternalError::Decode(e.to_string())
    } else {
        ExternalError::Transport(e.to_string())
    }
}

/// GET `url` and decode the body as JSON; non-2xx is [`ExternalError::Status`].
pub async fn get_json(
    client: &Client,
    url: &str,
    query: &[(&str, String)],
) -> Result<Value, ExternalError> {
    debug!(%url, "GET");
    let resp = client
        .get(url)
        .query(query)
        .send()
        .await
        .map_err(map_error)?;
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(ExternalError::Status {
            status: status.as_u16(),
            body,
        });
    }
    resp.json().await.map_err(map_error)
}

/// Exact value of a JSON number or numeric string.
///
/// The number's shortest decimal text is parsed, so `0.1` is exactly 1/10.
pub fn rational(v: &Value) -> Option<Rational> {
    match v {
        Value::Number(n) => n.to_string().parse().ok(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rational_is_exact_for_json_floats() {
        assert_eq!(rational(&json!(0.1)), Rational::from_ratio(1, 10));
        assert_eq!(rational(&json!(1.5e-7)), Rational::from_ratio(15, 100_000_000));
        assert_eq!(rational(&json!("42")), Some(Rational::from(42u64)));
        assert_eq!(rational(&json!(null)), None);
        assert_eq!(rational(&json!("n/a")), None);
    }
}
