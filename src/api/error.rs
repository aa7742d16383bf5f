/// Error types for the cluster management API client
use reqwest::StatusCode;
use std::path::PathBuf;
use thiserror::Error;

use super::models::GenericResponse;

/// Top-level error returned by every wrapper operation
#[derive(Debug, Error)]
pub enum Error {
    /// The client could not be constructed from its configuration
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// The authorization header provider failed
    #[error("could not determine authorization header: {0}")]
    Authorization(String),

    /// A request was sent but failed
    #[error(transparent)]
    Client(#[from] ClientError),
}

impl Error {
    /// HTTP status code, if the failure came from an API response
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Error::Client(e) => e.status_code,
            _ => None,
        }
    }
}

/// Problems detected while building the HTTP client
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("no API endpoint specified")]
    EndpointNotSpecified,

    #[error("invalid API endpoint '{endpoint}': {reason}")]
    EndpointInvalid { endpoint: String, reason: String },

    #[error("could not read CA certificates from {}: {source}", path.display())]
    CaRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse CA certificates in {}: {reason}", path.display())]
    CaParse { path: PathBuf, reason: String },

    #[error("failed to create HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
}

/// Broad classification of a failed request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The API answered with a non-2xx status
    Api,
    /// The request never produced a response (network, TLS, timeout)
    Transport,
    /// A successful response carried a body we could not decode
    Decode,
    /// The request body could not be serialized
    Encode,
    /// A caller-supplied ID cannot be used as a path segment
    Argument,
}

/// Simplified error for a failed API call
#[derive(Debug, Error)]
#[error("{operation}: {message}")]
pub struct ClientError {
    pub operation: &'static str,
    pub kind: ErrorKind,
    pub status_code: Option<u16>,
    pub message: String,
    pub details: Option<String>,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ClientError {
    /// Build an error from a non-2xx response and its body text
    pub fn from_response(operation: &'static str, status: StatusCode, body: &str) -> Self {
        let details = match serde_json::from_str::<GenericResponse>(body) {
            Ok(generic) if !generic.message.is_empty() => Some(generic.message),
            _ if !body.trim().is_empty() => Some(body.trim().to_string()),
            _ => None,
        };

        Self {
            operation,
            kind: ErrorKind::Api,
            status_code: Some(status.as_u16()),
            message: status_message(status),
            details,
            source: None,
        }
    }

    /// Build an error from a request that failed below the HTTP layer
    pub fn from_transport(operation: &'static str, err: reqwest::Error) -> Self {
        let message = if err.is_timeout() {
            "request timed out".to_string()
        } else if err.is_connect() {
            "could not connect to the API endpoint".to_string()
        } else {
            "network error".to_string()
        };

        Self {
            operation,
            kind: ErrorKind::Transport,
            status_code: err.status().map(|s| s.as_u16()),
            message,
            details: None,
            source: Some(Box::new(err)),
        }
    }

    /// Build an error from a 2xx response whose body did not decode
    pub fn from_decode(operation: &'static str, err: serde_json::Error) -> Self {
        Self {
            operation,
            kind: ErrorKind::Decode,
            status_code: None,
            message: "malformed response from API".to_string(),
            details: Some(err.to_string()),
            source: Some(Box::new(err)),
        }
    }

    /// Build an error from a request body that failed to serialize
    pub fn from_encode(operation: &'static str, err: serde_json::Error) -> Self {
        Self {
            operation,
            kind: ErrorKind::Encode,
            status_code: None,
            message: "could not encode request".to_string(),
            details: Some(err.to_string()),
            source: Some(Box::new(err)),
        }
    }

    /// Build an error for an ID that would not survive URL path building
    pub fn invalid_segment(operation: &'static str, segment: &str) -> Self {
        Self {
            operation,
            kind: ErrorKind::Argument,
            status_code: None,
            message: format!("invalid resource ID {:?}", segment),
            details: None,
            source: None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status_code == Some(StatusCode::NOT_FOUND.as_u16())
    }
}

fn status_message(status: StatusCode) -> String {
    match status {
        StatusCode::BAD_REQUEST => "bad request".to_string(),
        StatusCode::UNAUTHORIZED => "not authorized, please log in again".to_string(),
        StatusCode::FORBIDDEN => "access forbidden".to_string(),
        StatusCode::NOT_FOUND => "resource not found".to_string(),
        StatusCode::CONFLICT => "conflict with the current state of the resource".to_string(),
        s if s.is_server_error() => format!("server error (HTTP {})", s.as_u16()),
        s => format!("unexpected response (HTTP {})", s.as_u16()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structured_api_body() {
        let err = ClientError::from_response(
            "get cluster",
            StatusCode::NOT_FOUND,
            r#"{"code":"RESOURCE_NOT_FOUND","message":"The cluster could not be found."}"#,
        );
        assert_eq!(err.kind, ErrorKind::Api);
        assert_eq!(err.status_code, Some(404));
        assert!(err.is_not_found());
        assert_eq!(err.message, "resource not found");
        assert_eq!(
            err.details.as_deref(),
            Some("The cluster could not be found.")
        );
        assert_eq!(err.to_string(), "get cluster: resource not found");
    }

    #[test]
    fn test_plain_text_body() {
        let err = ClientError::from_response("get info", StatusCode::BAD_GATEWAY, "upstream down\n");
        assert_eq!(err.status_code, Some(502));
        assert_eq!(err.message, "server error (HTTP 502)");
        assert_eq!(err.details.as_deref(), Some("upstream down"));
    }

    #[test]
    fn test_empty_body() {
        let err = ClientError::from_response("delete cluster", StatusCode::UNAUTHORIZED, "");
        assert!(err.details.is_none());
        assert!(err.message.contains("not authorized"));
    }

    #[test]
    fn test_decode_error_keeps_source() {
        let json_err = serde_json::from_str::<GenericResponse>("{").unwrap_err();
        let err = ClientError::from_decode("get releases", json_err);
        assert_eq!(err.kind, ErrorKind::Decode);
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_status_code_passthrough() {
        let err: Error = ClientError::from_response("x", StatusCode::FORBIDDEN, "").into();
        assert_eq!(err.status_code(), Some(403));

        let err: Error = ConfigurationError::EndpointNotSpecified.into();
        assert_eq!(err.status_code(), None);
    }
}
