use thiserror::Error;

/// Errors that can occur when talking to the storefront backend.
#[derive(Debug, Error)]
pub enum ApiError {
  /// The request never got a response.
  #[error("network error: {0}")]
  Network(#[from] reqwest::Error),

  /// The backend answered with a non-success status.
  #[error("{message} (HTTP {status})")]
  Backend { status: u16, message: String },

  /// The response body did not have the expected shape.
  #[error("unexpected response from {endpoint}: {source}")]
  Decode {
    endpoint: String,
    source: serde_json::Error,
  },

  /// The operation needs a signed-in user and no token is stored.
  #[error("not signed in; run `storefront login` first")]
  Unauthenticated,

  /// The response decoded but lacked a field the caller needs.
  #[error("response from {endpoint} is missing `{field}`")]
  MissingField {
    endpoint: String,
    field: &'static str,
  },

  /// The request could not be built.
  #[error("invalid request: {0}")]
  InvalidRequest(String),
}

impl ApiError {
  /// True when the failure happened before the backend answered.
  pub fn is_network(&self) -> bool {
    matches!(self, ApiError::Network(_))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_backend_error_shows_server_message() {
    let err = ApiError::Backend {
      status: 401,
      message: "Invalid credentials".to_string(),
    };
    assert_eq!(err.to_string(), "Invalid credentials (HTTP 401)");
    assert!(!err.is_network());
  }
}
