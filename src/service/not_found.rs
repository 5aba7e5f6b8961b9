//! Built-in fallback service.

use async_trait::async_trait;
use hyper::StatusCode;

use crate::message::{FullRequest, FullResponse};
use crate::service::{LightweightService, ServiceError, ServiceFactory};

/// Answers every request with an empty `404 Not Found`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotFoundService;

impl NotFoundService {
    /// The shared factory used when no default route is registered.
    pub fn factory() -> ServiceFactory {
        ServiceFactory::shared_lightweight(NotFoundService)
    }
}

#[async_trait]
impl LightweightService for NotFoundService {
    async fn serve_full_request(&self, request: FullRequest) -> Result<FullResponse, ServiceError> {
        tracing::debug!(uri = %request.uri(), "No route matched");
        Ok(FullResponse::new(StatusCode::NOT_FOUND))
    }
}
