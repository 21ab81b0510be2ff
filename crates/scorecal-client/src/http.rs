//! HTTP transport for the remote scoring client.
//!
//! One scoring query maps to exactly one HTTP call: a failed call surfaces
//! as a single [`ClientError`] with no retry, backoff, or caching.

use crate::traits::{ClientConfig, ClientError, ClientResult};
use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use tracing::debug;

/// Thin wrapper over a reqwest client carrying the service configuration.
pub struct HttpTransport {
    client: Client,
    config: ClientConfig,
}

impl HttpTransport {
    /// Creates a transport from client configuration.
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/json"),
        );
        for (key, value) in &config.headers {
            if let (Ok(name), Ok(val)) = (
                reqwest::header::HeaderName::try_from(key.as_str()),
                reqwest::header::HeaderValue::try_from(value.as_str()),
            ) {
                headers.insert(name, val);
            }
        }
        if let Ok(model) = reqwest::header::HeaderValue::try_from(config.model.as_str()) {
            headers.insert("X-Model", model);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| ClientError::Config(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// Builds a URL from a path.
    pub fn build_url(&self, path: &str) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{}/{}", base, path)
    }

    /// Gets the base URL.
    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// Gets the client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Executes a single POST and deserializes the JSON response.
    ///
    /// Non-success statuses surface as [`ClientError::Request`] carrying the
    /// status code and the raw response body; service-side validation
    /// messages are relayed verbatim.
    pub async fn post_json<T, R>(&self, path: &str, body: &T) -> ClientResult<R>
    where
        T: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = self.build_url(path);
        debug!(url = %url, "issuing scoring request");

        let response = self
            .client
            .post(&url)
            .header(
                self.config.api_key_header.as_str(),
                self.config.api_key.expose_secret(),
            )
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ClientError::Timeout(e.to_string())
                } else {
                    ClientError::Connection(e.to_string())
                }
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ClientError::InvalidResponse(e.to_string()))?;

        if !status.is_success() {
            return Err(Self::status_error(status, text));
        }

        serde_json::from_str(&text).map_err(|e| {
            ClientError::InvalidResponse(format!(
                "failed to parse response (status {}): {} - body: {}",
                status,
                e,
                text.chars().take(500).collect::<String>()
            ))
        })
    }

    fn status_error(status: StatusCode, body: String) -> ClientError {
        ClientError::Request {
            status: status.as_u16(),
            message: body,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api_key::ApiKey;
    use std::collections::HashMap;

    fn create_test_config() -> ClientConfig {
        ClientConfig {
            name: "test".to_string(),
            base_url: "https://scoring.example.com/v1".to_string(),
            model: "aldebaran-en".to_string(),
            api_key: ApiKey::new("test-api-key".to_string()),
            api_key_header: "X-API-KEY".to_string(),
            timeout_secs: 30,
            headers: HashMap::new(),
        }
    }

    #[test]
    fn test_build_url() {
        let transport = HttpTransport::new(create_test_config()).unwrap();

        assert_eq!(
            transport.build_url("/select"),
            "https://scoring.example.com/v1/select"
        );
        assert_eq!(
            transport.build_url("select"),
            "https://scoring.example.com/v1/select"
        );
    }

    #[test]
    fn test_build_url_trailing_slash() {
        let mut config = create_test_config();
        config.base_url = "https://scoring.example.com/v1/".to_string();
        let transport = HttpTransport::new(config).unwrap();

        assert_eq!(
            transport.build_url("select"),
            "https://scoring.example.com/v1/select"
        );
    }

    #[test]
    fn test_status_error_carries_body() {
        let err = HttpTransport::status_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "reference must not be empty".to_string(),
        );
        match err {
            ClientError::Request { status, message } => {
                assert_eq!(status, 422);
                assert_eq!(message, "reference must not be empty");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
