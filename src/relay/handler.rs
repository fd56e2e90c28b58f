use crate::config::{ErrorShape, DEFAULT_REQUEST_BODY_LIMIT};
use crate::relay::error::{RelayError, RelayResult};
use crate::relay::upstream::UpstreamClient;
use crate::types::{GenerateContentRequest, PromptRequest};
use axum::{
    body::Body,
    http::{header, Method, StatusCode},
    response::Response,
};
use secrecy::SecretString;
use std::time::Instant;
use tracing::{debug, error, warn};

#[derive(Debug, Clone)]
pub struct RelayHandler {
    upstream: UpstreamClient,
    credential: Option<SecretString>,
    error_shape: ErrorShape,
    body_limit: usize,
}

impl RelayHandler {
    pub fn new(
        upstream: UpstreamClient,
        credential: Option<SecretString>,
        error_shape: ErrorShape,
    ) -> Self {
        Self {
            upstream,
            credential,
            error_shape,
            body_limit: DEFAULT_REQUEST_BODY_LIMIT,
        }
    }

    /// Largest request body read, in bytes. Checked only for POST.
    pub fn with_body_limit(mut self, body_limit: usize) -> Self {
        self.body_limit = body_limit;
        self
    }

    /// Relay one frontend request. Every failure becomes a response.
    pub async fn handle(&self, method: Method, body: Body) -> Response {
        match self.relay(method, body).await {
            Ok(response) => response,
            Err(relay_error) => {
                metrics::counter!("relay_requests_total", "outcome" => relay_error.kind())
                    .increment(1);
                match relay_error {
                    RelayError::MethodNotAllowed => debug!("Rejected non-POST request"),
                    _ => error!(
                        "Relay error: {} (kind: {}, status: {})",
                        relay_error,
                        relay_error.kind(),
                        relay_error.status_code()
                    ),
                }
                relay_error.into_response_with(self.error_shape)
            }
        }
    }

    async fn relay(&self, method: Method, body: Body) -> RelayResult<Response> {
        if method != Method::POST {
            return Err(RelayError::MethodNotAllowed);
        }

        let body = axum::body::to_bytes(body, self.body_limit)
            .await
            .map_err(|e| RelayError::BodyRead {
                message: e.to_string(),
            })?;

        let body: serde_json::Value = serde_json::from_slice(&body)
            .map_err(|source| RelayError::InvalidJson { source })?;
        let request = PromptRequest::from_body(body).ok_or(RelayError::NullBody)?;

        let credential = self
            .credential
            .as_ref()
            .ok_or(RelayError::MissingCredential)?;

        let payload = GenerateContentRequest::from_prompt(request.prompt);

        let started = Instant::now();
        let reply = self.upstream.generate_content(credential, &payload).await;
        metrics::histogram!("relay_upstream_duration_seconds")
            .record(started.elapsed().as_secs_f64());
        let reply = reply?;

        let status = if reply.is_success() {
            metrics::counter!("relay_requests_total", "outcome" => "success").increment(1);
            debug!("Upstream {} succeeded ({})", self.upstream.model(), reply.status);
            StatusCode::OK
        } else {
            metrics::counter!("relay_requests_total", "outcome" => "upstream_rejected")
                .increment(1);
            warn!(
                "Upstream {} rejected request with status {}, forwarding",
                self.upstream.model(),
                reply.status
            );
            StatusCode::from_u16(reply.status)
                .map_err(|e| RelayError::internal(format!("Invalid status code: {}", e)))?
        };

        Response::builder()
            .status(status)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(reply.body))
            .map_err(|e| RelayError::internal(format!("Failed to build response: {}", e)))
    }

    /// Health check endpoint
    pub async fn health_check() -> Result<&'static str, StatusCode> {
        Ok("OK")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UpstreamConfig;

    fn create_test_handler(credential: Option<&str>, error_shape: ErrorShape) -> RelayHandler {
        // Nothing listens here; tests below never reach upstream
        let upstream = UpstreamClient::new(UpstreamConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            ..UpstreamConfig::default()
        })
        .unwrap();
        RelayHandler::new(
            upstream,
            credential.map(|key| SecretString::new(key.to_string())),
            error_shape,
        )
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_health_check() {
        let result = RelayHandler::health_check().await;
        assert!(result.is_ok());
        assert_eq!(result.unwrap(), "OK");
    }

    #[tokio::test]
    async fn test_non_post_methods_rejected() {
        let handler = create_test_handler(Some("test-key"), ErrorShape::Nested);

        for method in [Method::GET, Method::PUT, Method::DELETE, Method::PATCH] {
            // Body is never inspected
            let response = handler.handle(method, Body::from("not json")).await;
            assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
            let body = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap();
            assert_eq!(body, "Method Not Allowed");
        }
    }

    #[tokio::test]
    async fn test_missing_credential() {
        let handler = create_test_handler(None, ErrorShape::Nested);

        let response = handler
            .handle(Method::POST, Body::from(r#"{"prompt":"hello"}"#))
            .await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert!(body["error"]["message"]
            .as_str()
            .unwrap()
            .contains("Missing API key"));
    }

    #[tokio::test]
    async fn test_invalid_json_checked_before_credential() {
        let handler = create_test_handler(None, ErrorShape::Flat);

        let response = handler.handle(Method::POST, Body::from("{prompt")).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        let message = body["error"].as_str().unwrap();
        assert!(message.starts_with("Invalid JSON payload"));
    }

    #[tokio::test]
    async fn test_null_body_rejected() {
        let handler = create_test_handler(Some("test-key"), ErrorShape::Nested);

        let response = handler.handle(Method::POST, Body::from("null")).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert!(body["error"]["message"]
            .as_str()
            .unwrap()
            .contains("null request body"));
    }

    #[tokio::test]
    async fn test_oversized_post_body() {
        let handler =
            create_test_handler(Some("test-key"), ErrorShape::Nested).with_body_limit(16);

        let body = format!(r#"{{"prompt":"{}"}}"#, "x".repeat(64));
        let response = handler.handle(Method::POST, Body::from(body)).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert!(body["error"]["message"]
            .as_str()
            .unwrap()
            .starts_with("Failed to read request body"));
    }

    #[tokio::test]
    async fn test_oversized_body_on_wrong_method_is_405() {
        let handler =
            create_test_handler(Some("test-key"), ErrorShape::Nested).with_body_limit(16);

        let response = handler
            .handle(Method::GET, Body::from("x".repeat(4096)))
            .await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_empty_body_is_invalid_json() {
        let handler = create_test_handler(Some("test-key"), ErrorShape::Nested);

        let response = handler.handle(Method::POST, Body::empty()).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert!(!body["error"]["message"].as_str().unwrap().is_empty());
    }
}
