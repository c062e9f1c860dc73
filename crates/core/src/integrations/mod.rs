//! HTTP-backed collaborators: NHTSA vPIC decode, NHTSA recalls and the scraper service.
//!
//! Response parsing lives in pure functions next to each client so it can be tested
//! without a network.

pub mod nhtsa;
pub mod scraper;

use std::time::Duration;

use reqwest::{Client, Response, StatusCode};

use crate::errors::CollaboratorError;

pub use nhtsa::NhtsaClient;
pub use scraper::ScraperClient;

pub(crate) fn http_client(timeout_secs: u64) -> Result<Client, CollaboratorError> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(concat!("estimaro/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|error| CollaboratorError::Unavailable(format!("http client setup: {error}")))
}

pub(crate) fn transport_error(error: reqwest::Error, timeout_secs: u64) -> CollaboratorError {
    if error.is_timeout() {
        CollaboratorError::Timeout(timeout_secs.saturating_mul(1_000))
    } else {
        CollaboratorError::Unavailable(error.to_string())
    }
}

/// 404 is a miss, 429 and 5xx are worth retrying, any other failure status is a bad request.
pub(crate) fn status_error(status: StatusCode, endpoint: &str) -> CollaboratorError {
    if status == StatusCode::NOT_FOUND {
        CollaboratorError::NotFound(endpoint.to_owned())
    } else if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        CollaboratorError::Unavailable(format!("{endpoint} returned {status}"))
    } else {
        CollaboratorError::Malformed(format!("{endpoint} rejected the request with {status}"))
    }
}

pub(crate) async fn read_body(
    response: Response,
    endpoint: &str,
    timeout_secs: u64,
) -> Result<String, CollaboratorError> {
    if !response.status().is_success() {
        return Err(status_error(response.status(), endpoint));
    }
    response.text().await.map_err(|error| transport_error(error, timeout_secs))
}

#[cfg(test)]
mod tests {
    use reqwest::StatusCode;

    use super::status_error;
    use crate::errors::CollaboratorError;

    #[test]
    fn status_codes_map_to_retryable_or_terminal_errors() {
        assert!(matches!(
            status_error(StatusCode::NOT_FOUND, "/scrape/parts"),
            CollaboratorError::NotFound(_)
        ));
        assert!(status_error(StatusCode::BAD_GATEWAY, "/scrape/pricing").is_retryable());
        assert!(status_error(StatusCode::TOO_MANY_REQUESTS, "/scrape/pricing").is_retryable());
        assert!(!status_error(StatusCode::UNAUTHORIZED, "/scrape/labor").is_retryable());
    }
}
