use thiserror::Error;

use crate::FailedResponse;

/// Errors returned by remote model operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Base URL is not a valid absolute `http`/`https` URL.
    #[error("invalid base URL '{0}'")]
    InvalidBaseUrl(String),

    /// Entity path or pagination link did not form a valid URL.
    #[error("invalid request URL '{0}'")]
    InvalidPath(String),

    /// Filter conditions could not be encoded as a query string.
    #[error("invalid filter conditions: {0}")]
    InvalidConditions(String),

    /// Header name or value is not valid HTTP.
    #[error("invalid header: {0}")]
    InvalidHeader(String),

    /// A configuration value (for example from the environment) is malformed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The server did not answer within the configured timeout.
    #[error("request to {url} timed out: {source}")]
    Timeout {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// HTTP transport-layer request failure.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Response body could not be parsed into the requested response type.
    #[error("failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The server answered with a status of 400 or above.
    #[error("Response: {body} URL: {url}")]
    FailedRequest {
        status: reqwest::StatusCode,
        url: String,
        body: String,
    },
}

impl ClientError {
    /// Returns the HTTP status for [`ClientError::FailedRequest`].
    pub fn status(&self) -> Option<reqwest::StatusCode> {
        match self {
            Self::FailedRequest { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns `true` for [`ClientError::Timeout`].
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Decodes the body of a failed request as a [`FailedResponse`].
    ///
    /// Returns `None` for other variants or when the body has no `detail`.
    pub fn failed_response(&self) -> Option<FailedResponse> {
        match self {
            Self::FailedRequest { body, .. } => serde_json::from_str(body).ok(),
            _ => None,
        }
    }
}
