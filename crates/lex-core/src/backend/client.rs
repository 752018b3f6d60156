//! HTTP client for the query endpoint.

use futures_util::StreamExt;
use serde::Serialize;

use super::sse::SseParser;
use super::{EventStream, TransportError, TransportErrorKind, TransportResult, USER_AGENT};

/// Request body for the query endpoint.
#[derive(Debug, Serialize)]
struct QueryRequest<'a> {
    query: &'a str,
    session_id: &'a str,
}

/// Client for the assistant backend.
///
/// One logical session maps to one `BackendClient`-issued `session_id`
/// carried unchanged on every request. The client is cheap to clone; clones
/// share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct BackendClient {
    base_url: String,
    http: reqwest::Client,
}

impl BackendClient {
    /// Creates a new client against the given base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            base_url,
            http: reqwest::Client::new(),
        }
    }

    /// Sends a query and returns the stream of classified events.
    ///
    /// A non-success status aborts before any frame is decoded. Dropping the
    /// returned stream cancels the in-flight response and releases the
    /// connection.
    ///
    /// # Errors
    /// Returns a [`TransportError`] if the request cannot be sent or the
    /// backend answers with a non-success status.
    pub async fn send_query_stream(
        &self,
        query: &str,
        session_id: &str,
    ) -> TransportResult<EventStream> {
        let request = QueryRequest { query, session_id };
        let url = format!("{}/query", self.base_url);

        let response = self
            .http
            .post(&url)
            .header("content-type", "application/json")
            .header("accept", "text/event-stream")
            .header("user-agent", USER_AGENT)
            .json(&request)
            .send()
            .await
            .map_err(|e| classify_reqwest_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(TransportError::http_status(status.as_u16(), &error_body));
        }

        Ok(SseParser::new(response.bytes_stream().boxed()).boxed())
    }
}

fn classify_reqwest_error(e: &reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::timeout(format!("request timed out: {e}"))
    } else if e.is_connect() {
        TransportError::connect(format!("connection failed: {e}"))
    } else {
        TransportError::new(TransportErrorKind::Connect, format!("request error: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slashes_are_trimmed() {
        let client = BackendClient::new("http://localhost:8000/");
        assert_eq!(client.base_url, "http://localhost:8000");
    }

    #[test]
    fn query_request_serializes_expected_body() {
        let request = QueryRequest {
            query: "hi",
            session_id: "s-1",
        };
        let body = serde_json::to_string(&request).unwrap();
        assert_eq!(body, r#"{"query":"hi","session_id":"s-1"}"#);
    }
}
