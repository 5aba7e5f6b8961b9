//! `application/x-www-form-urlencoded` POST service.

use std::collections::HashMap;

use async_trait::async_trait;
use hyper::{Method, StatusCode};

use crate::message::request::parse_urlencoded;
use crate::message::{media, FullRequest, FullResponse};
use crate::service::method::method_not_allowed;
use crate::service::{LightweightService, ServiceError};

/// Receives decoded form parameters; repeated keys keep every value.
#[async_trait]
pub trait FormService: Send + Sync {
    async fn serve_form(
        &self,
        request: &FullRequest,
        params: HashMap<String, Vec<String>>,
    ) -> Result<FullResponse, ServiceError>;
}

/// Adapts a [`FormService`]; non-POST gets `405`, other content types `400`.
#[derive(Debug, Clone, Default)]
pub struct FormPost<S>(pub S);

#[async_trait]
impl<S: FormService> LightweightService for FormPost<S> {
    async fn serve_full_request(&self, request: FullRequest) -> Result<FullResponse, ServiceError> {
        if request.method() != Method::POST {
            return Ok(method_not_allowed("POST"));
        }
        if !media::matches(request.content_type(), media::APPLICATION_X_WWW_FORM_URLENCODED) {
            return Ok(FullResponse::new(StatusCode::BAD_REQUEST));
        }
        let params = parse_urlencoded(request.body());
        self.0.serve_form(&request, params).await
    }
}
