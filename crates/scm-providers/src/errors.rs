//! SCM provider error types

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::providers::traits::ScmProviderType;

/// A non-success response decoded from a backend API.
///
/// `code` carries the backend's machine-readable error identifier when it
/// sends one (Azure DevOps `typeKey`, GitLab `message` token, Bitbucket
/// `error.data.key`, ...). Not-found classification looks at `status` and
/// `code` only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiFailure {
    pub provider: ScmProviderType,
    pub status: u16,
    pub code: Option<String>,
    pub message: String,
}

impl ApiFailure {
    pub fn new(provider: ScmProviderType, status: u16, message: impl Into<String>) -> Self {
        Self {
            provider,
            status,
            code: None,
            message: message.into(),
        }
    }

    pub fn with_code(mut self, code: Option<String>) -> Self {
        self.code = code;
        self
    }

    pub fn code_is(&self, code: &str) -> bool {
        self.code.as_deref() == Some(code)
    }
}

impl fmt::Display for ApiFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} API returned status {}: {}",
            self.provider, self.status, self.message
        )?;
        if let Some(code) = &self.code {
            write!(f, " ({})", code)?;
        }
        Ok(())
    }
}

/// SCM provider errors
#[derive(Error, Debug)]
pub enum ScmError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(ApiFailure),

    #[error("Rate limited: {0}")]
    RateLimited(ApiFailure),

    #[error("Not found: {0}")]
    NotFound(ApiFailure),

    #[error("API error: {0}")]
    Api(ApiFailure),

    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Failed to decode {provider} response: {source}")]
    Decode {
        provider: ScmProviderType,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid repository id: {0}")]
    InvalidRepositoryId(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Deadline exceeded after {0:?}")]
    DeadlineExceeded(Duration),
}

impl ScmError {
    /// The decoded backend failure, for errors that came from an API response.
    pub fn api_failure(&self) -> Option<&ApiFailure> {
        match self {
            ScmError::AuthenticationFailed(failure)
            | ScmError::RateLimited(failure)
            | ScmError::NotFound(failure)
            | ScmError::Api(failure) => Some(failure),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ScmError::NotFound(_))
    }
}

impl From<ApiFailure> for ScmError {
    fn from(failure: ApiFailure) -> Self {
        match failure.status {
            401 | 403 => ScmError::AuthenticationFailed(failure),
            404 => ScmError::NotFound(failure),
            429 => ScmError::RateLimited(failure),
            _ => ScmError::Api(failure),
        }
    }
}
