//! Method-restricted wrappers for lightweight services.

use async_trait::async_trait;
use hyper::{Method, StatusCode};

use crate::message::{FullRequest, FullResponse};
use crate::service::{LightweightService, ServiceError};

/// Serves `GET` requests through `S`; anything else gets `405`.
#[derive(Debug, Clone, Default)]
pub struct GetOnly<S>(pub S);

/// Serves `POST` requests through `S`; anything else gets `405`.
#[derive(Debug, Clone, Default)]
pub struct PostOnly<S>(pub S);

#[async_trait]
impl<S: LightweightService> LightweightService for GetOnly<S> {
    async fn serve_full_request(&self, request: FullRequest) -> Result<FullResponse, ServiceError> {
        if request.method() != Method::GET {
            return Ok(method_not_allowed("GET"));
        }
        self.0.serve_full_request(request).await
    }

    fn release(&self) {
        self.0.release();
    }
}

#[async_trait]
impl<S: LightweightService> LightweightService for PostOnly<S> {
    async fn serve_full_request(&self, request: FullRequest) -> Result<FullResponse, ServiceError> {
        if request.method() != Method::POST {
            return Ok(method_not_allowed("POST"));
        }
        self.0.serve_full_request(request).await
    }

    fn release(&self) {
        self.0.release();
    }
}

pub(crate) fn method_not_allowed(allow: &'static str) -> FullResponse {
    let mut response = FullResponse::new(StatusCode::METHOD_NOT_ALLOWED);
    response.add_custom_header(hyper::header::ALLOW, hyper::header::HeaderValue::from_static(allow));
    response
}
