//! Error types for gemval-provider

use thiserror::Error;

/// Errors raised while talking to a source-control provider.
///
/// A 404 on a raw file fetch is not an error: it is reported as an absent
/// file by [`crate::ProviderClient::fetch_raw_file`].
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Non-success HTTP status
    #[error("{provider} returned HTTP {status}: {message}")]
    Status {
        provider: &'static str,
        status: u16,
        message: String,
    },

    /// Transport failure (connect, timeout, TLS)
    #[error("{provider} request failed: {message}")]
    Request {
        provider: &'static str,
        message: String,
    },

    /// GraphQL `errors` array or missing `data`
    #[error("{provider} GraphQL query failed: {message}")]
    GraphQl {
        provider: &'static str,
        message: String,
    },

    /// Response body did not have the expected shape
    #[error("{provider} response could not be decoded: {message}")]
    Decode {
        provider: &'static str,
        message: String,
    },

    /// Repository identifier is not `owner/name`
    #[error("invalid repository identifier: {0}")]
    InvalidRepository(String),
}

impl ProviderError {
    /// HTTP status carried by the error, if the provider answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            ProviderError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub(crate) fn from_reqwest(provider: &'static str, err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return ProviderError::Status {
                provider,
                status: status.as_u16(),
                message: err.to_string(),
            };
        }
        if err.is_decode() {
            return ProviderError::Decode {
                provider,
                message: err.to_string(),
            };
        }
        ProviderError::Request {
            provider,
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_display() {
        let err = ProviderError::Status {
            provider: "github",
            status: 502,
            message: "bad gateway".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("github"));
        assert!(msg.contains("502"));
        assert!(msg.contains("bad gateway"));
        assert_eq!(err.status(), Some(502));
    }

    #[test]
    fn test_non_status_errors_have_no_status() {
        let err = ProviderError::GraphQl {
            provider: "gitlab",
            message: "Field 'projects' doesn't exist".to_string(),
        };
        assert!(err.to_string().contains("GraphQL"));
        assert_eq!(err.status(), None);
    }
}
