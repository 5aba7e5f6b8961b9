//! The four handler contracts.

use async_trait::async_trait;
use hyper::StatusCode;

use crate::message::{ContentBlock, FullRequest, FullResponse, LastContentBlock, RequestWithoutBody};
use crate::protocol::Connection;
use crate::service::ServiceError;

/// Complete request in, complete response out.
///
/// The dispatcher sends the returned response with
/// [`Connection::send_full_response`]. Suitable when both request and
/// response are small enough to buffer.
#[async_trait]
pub trait LightweightService: Send + Sync {
    async fn serve_full_request(&self, request: FullRequest) -> Result<FullResponse, ServiceError>;

    /// Called once the request cycle ends, unless the instance is shared.
    fn release(&self) {}
}

/// Complete request in; the service writes its own response, possibly
/// streamed, through the connection.
#[async_trait]
pub trait FullRequestService: Send + Sync {
    async fn serve_full_request(
        &self,
        request: FullRequest,
        connection: &mut Connection,
    ) -> Result<(), ServiceError>;

    fn release(&self) {}
}

/// Streamed request in, streamed response out, with full manual control.
///
/// The service must have completed its response by the time
/// `serve_last_content_block` returns.
#[async_trait]
pub trait GeneralService: Send {
    async fn serve_request_without_body(
        &mut self,
        request: &RequestWithoutBody,
        connection: &mut Connection,
    ) -> Result<(), ServiceError>;

    async fn serve_content_block(
        &mut self,
        block: ContentBlock,
        connection: &mut Connection,
    ) -> Result<(), ServiceError>;

    async fn serve_last_content_block(
        &mut self,
        block: LastContentBlock,
        connection: &mut Connection,
    ) -> Result<(), ServiceError>;

    fn release(&mut self) {}
}

/// Streamed request in; the service edits one response accumulator, which
/// the dispatcher sends as a unit after the last block.
#[async_trait]
pub trait FullResponseService: Send {
    /// Create the accumulator. Called once, before the request head is served.
    fn create_full_response(&mut self) -> FullResponse {
        FullResponse::new(StatusCode::OK)
    }

    async fn serve_request_without_body(
        &mut self,
        request: &RequestWithoutBody,
        response: &mut FullResponse,
    ) -> Result<(), ServiceError>;

    async fn serve_content_block(
        &mut self,
        block: ContentBlock,
        response: &mut FullResponse,
    ) -> Result<(), ServiceError>;

    async fn serve_last_content_block(
        &mut self,
        block: LastContentBlock,
        response: &mut FullResponse,
    ) -> Result<(), ServiceError>;

    fn release(&mut self) {}
}
