//! Shared HTTP plumbing for the provider implementations
//!
//! Each provider builds its own requests and supplies its own failure decoder;
//! this module only runs the round-trip under a [`CallContext`] and reads the
//! whole body before the context is released.

use reqwest::header::HeaderMap;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::traits::ScmProviderType;
use crate::context::CallContext;
use crate::errors::{ApiFailure, ScmError};

const USER_AGENT: &str = concat!("scm-providers/", env!("CARGO_PKG_VERSION"));

/// Decodes a backend's non-success response body into an [`ApiFailure`].
pub(crate) type FailureDecoder = fn(u16, &str) -> ApiFailure;

/// A successful response with its body already read
#[derive(Debug)]
pub(crate) struct ApiResponse {
    pub headers: HeaderMap,
    pub body: String,
}

impl ApiResponse {
    pub fn json<T: DeserializeOwned>(&self, provider: ScmProviderType) -> Result<T, ScmError> {
        serde_json::from_str(&self.body).map_err(|source| ScmError::Decode { provider, source })
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

pub(crate) fn build_client() -> Result<Client, ScmError> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(std::time::Duration::from_secs(30))
        .build()
        .map_err(|e| ScmError::InvalidConfiguration(format!("Failed to create HTTP client: {}", e)))
}

/// Resolve the API base URL, dropping any trailing slash. A configured URL
/// must be absolute http(s).
pub(crate) fn base_url(api_url: Option<&str>, default: &str) -> Result<String, ScmError> {
    let Some(configured) = api_url.map(str::trim).filter(|url| !url.is_empty()) else {
        return Ok(default.trim_end_matches('/').to_string());
    };

    let parsed = url::Url::parse(configured).map_err(|e| {
        ScmError::InvalidConfiguration(format!("Invalid api_url '{}': {}", configured, e))
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ScmError::InvalidConfiguration(format!(
            "Invalid api_url '{}': scheme must be http or https",
            configured
        )));
    }

    Ok(configured.trim_end_matches('/').to_string())
}

/// Send `request` under `ctx`. Non-success statuses are decoded with
/// `decode_failure` and classified into the shared error taxonomy.
pub(crate) async fn execute(
    ctx: &CallContext,
    request: RequestBuilder,
    decode_failure: FailureDecoder,
) -> Result<ApiResponse, ScmError> {
    ctx.run(async move {
        let response = request.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().await?;

        if !status.is_success() {
            debug!("API request failed with status {}", status);
            return Err(ScmError::from(decode_failure(status.as_u16(), &body)));
        }

        Ok(ApiResponse { headers, body })
    })
    .await
}

/// Percent-encode each segment of a repository path, keeping the separators.
pub(crate) fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Fallback message when a backend sends an error without a usable body
pub(crate) fn fallback_message(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        "Unknown error".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn decode(status: u16, body: &str) -> ApiFailure {
        ApiFailure::new(ScmProviderType::Gitea, status, fallback_message(body))
    }

    #[test]
    fn test_base_url() {
        assert_eq!(base_url(None, "https://gitea.com/").unwrap(), "https://gitea.com");
        assert_eq!(
            base_url(Some("https://git.example.com/"), "https://gitea.com").unwrap(),
            "https://git.example.com"
        );
        assert_eq!(
            base_url(Some(" "), "https://gitea.com").unwrap(),
            "https://gitea.com"
        );
    }

    #[test]
    fn test_base_url_rejects_malformed() {
        assert!(matches!(
            base_url(Some("git.example.com"), "https://gitea.com"),
            Err(ScmError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            base_url(Some("ftp://git.example.com"), "https://gitea.com"),
            Err(ScmError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_encode_path() {
        assert_eq!(encode_path("charts/my app/values.yaml"), "charts/my%20app/values.yaml");
        assert_eq!(encode_path("feature/x#1"), "feature/x%231");
        assert_eq!(encode_path(""), "");
    }

    #[test]
    fn test_fallback_message() {
        assert_eq!(fallback_message(""), "Unknown error");
        assert_eq!(fallback_message(" oops \n"), "oops");
    }

    #[tokio::test]
    async fn test_execute_success_reads_body() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ping"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("x-next", "2")
                    .set_body_json(serde_json::json!({"ok": true})),
            )
            .mount(&mock_server)
            .await;

        let client = build_client().unwrap();
        let response = execute(
            &CallContext::new(),
            client.get(format!("{}/ping", mock_server.uri())),
            decode,
        )
        .await
        .unwrap();

        assert_eq!(response.header("x-next"), Some("2"));
        let body: serde_json::Value = response.json(ScmProviderType::Gitea).unwrap();
        assert_eq!(body["ok"], true);
    }

    #[tokio::test]
    async fn test_execute_classifies_failure() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .mount(&mock_server)
            .await;

        let client = build_client().unwrap();
        let err = execute(&CallContext::new(), client.get(mock_server.uri()), decode)
            .await
            .unwrap_err();

        match err {
            ScmError::RateLimited(failure) => assert_eq!(failure.message, "slow down"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_decode_error_is_reported() {
        let response = ApiResponse {
            headers: HeaderMap::new(),
            body: "not json".to_string(),
        };
        let result: Result<serde_json::Value, _> = response.json(ScmProviderType::GitHub);
        assert!(matches!(
            result,
            Err(ScmError::Decode {
                provider: ScmProviderType::GitHub,
                ..
            })
        ));
    }
}
