//! JSON convenience services.
//!
//! # Design Decisions
//! - Payloads are typed through serde; the wrapper owns (de)serialization
//! - A body that does not parse as `Input` is the client's fault: `400`
//! - Output serialization failures are service errors (forced `500`)

use async_trait::async_trait;
use hyper::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::message::{media, FullRequest, FullResponse};
use crate::service::method::method_not_allowed;
use crate::service::{LightweightService, ServiceError};

/// Answers `GET` requests with a JSON document.
#[async_trait]
pub trait JsonGetService: Send + Sync {
    type Output: Serialize + Send;

    async fn serve_json(&self, request: &FullRequest) -> Result<Self::Output, ServiceError>;
}

/// Answers `POST` requests carrying a JSON document with another one.
#[async_trait]
pub trait JsonPostService: Send + Sync {
    type Input: DeserializeOwned + Send;
    type Output: Serialize + Send;

    async fn serve_json(&self, request: &FullRequest, input: Self::Input) -> Result<Self::Output, ServiceError>;
}

/// Adapts a [`JsonGetService`] into a lightweight service.
#[derive(Debug, Clone, Default)]
pub struct JsonGet<S>(pub S);

/// Adapts a [`JsonPostService`] into a lightweight service.
#[derive(Debug, Clone, Default)]
pub struct JsonPost<S>(pub S);

#[async_trait]
impl<S: JsonGetService> LightweightService for JsonGet<S> {
    async fn serve_full_request(&self, request: FullRequest) -> Result<FullResponse, ServiceError> {
        if request.method() != Method::GET {
            return Ok(method_not_allowed("GET"));
        }
        let output = self.0.serve_json(&request).await?;
        json_response(&output)
    }
}

#[async_trait]
impl<S: JsonPostService> LightweightService for JsonPost<S> {
    async fn serve_full_request(&self, request: FullRequest) -> Result<FullResponse, ServiceError> {
        if request.method() != Method::POST {
            return Ok(method_not_allowed("POST"));
        }
        let input: S::Input = match serde_json::from_slice(request.body()) {
            Ok(input) => input,
            Err(e) => {
                tracing::debug!(uri = %request.uri(), error = %e, "Rejecting malformed JSON body");
                return Ok(FullResponse::text(StatusCode::BAD_REQUEST, format!("invalid JSON body: {}", e)));
            }
        };
        let output = self.0.serve_json(&request, input).await?;
        json_response(&output)
    }
}

fn json_response<T: Serialize>(output: &T) -> Result<FullResponse, ServiceError> {
    let body = serde_json::to_vec(output)?;
    Ok(FullResponse::with_body(StatusCode::OK, Some(media::APPLICATION_JSON), body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::RequestWithoutBody;
    use hyper::HeaderMap;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Sum {
        a: i64,
        b: i64,
    }

    #[derive(Serialize)]
    struct Total {
        total: i64,
    }

    struct Adder;

    #[async_trait]
    impl JsonPostService for Adder {
        type Input = Sum;
        type Output = Total;

        async fn serve_json(&self, _request: &FullRequest, input: Sum) -> Result<Total, ServiceError> {
            Ok(Total { total: input.a + input.b })
        }
    }

    struct Version;

    #[async_trait]
    impl JsonGetService for Version {
        type Output = serde_json::Value;

        async fn serve_json(&self, _request: &FullRequest) -> Result<serde_json::Value, ServiceError> {
            Ok(serde_json::json!({ "version": "1.0" }))
        }
    }

    fn request(method: Method, body: &'static str) -> FullRequest {
        FullRequest::new(RequestWithoutBody::new(method, "/json", HeaderMap::new()), body)
    }

    #[tokio::test]
    async fn post_round_trips_typed_json() {
        let response = JsonPost(Adder)
            .serve_full_request(request(Method::POST, r#"{"a":2,"b":40}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.content_type(), Some(media::APPLICATION_JSON));
        assert_eq!(response.body().as_ref(), br#"{"total":42}"#);
    }

    #[tokio::test]
    async fn malformed_json_is_bad_request() {
        let response = JsonPost(Adder)
            .serve_full_request(request(Method::POST, "{not json"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn get_serializes_output() {
        let response = JsonGet(Version)
            .serve_full_request(request(Method::GET, ""))
            .await
            .unwrap();
        assert_eq!(response.body().as_ref(), br#"{"version":"1.0"}"#);

        let rejected = JsonGet(Version)
            .serve_full_request(request(Method::DELETE, ""))
            .await
            .unwrap();
        assert_eq!(rejected.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
