//! Shared utilities for dispatcher and server tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use hyper::{HeaderMap, Method, StatusCode};

use http_service_router::dispatch::{
    recover_with_internal_error, ConnectionError, ConnectionHooks, InboundEvent, ServiceDispatcher,
};
use http_service_router::message::{
    BodyStream, ContentBlock, FullRequest, FullResponse, LastContentBlock, RequestWithoutBody, ResponseWithoutBody,
};
use http_service_router::net::ConnectionId;
use http_service_router::protocol::{Connection, ProtocolViolation, ResponseState, SendHandle, Transport};
use http_service_router::routing::RouteTable;
use http_service_router::service::{
    FullRequestService, FullResponseService, GeneralService, LightweightService, Service, ServiceError, ServiceKind,
};

/// One operation that reached the transport.
#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    Head(StatusCode),
    Block(Bytes),
    Last(Bytes),
    Stream,
    Full(StatusCode, Bytes),
    Close,
}

/// Transport that records every send instead of writing it.
#[derive(Debug, Clone, Default)]
pub struct RecordingTransport {
    log: Arc<Mutex<Vec<Sent>>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.log.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.log.lock().unwrap().clear();
    }

    fn record(&self, sent: Sent) -> SendHandle {
        self.log.lock().unwrap().push(sent);
        SendHandle::done()
    }
}

impl Transport for RecordingTransport {
    fn send_response_without_body(&mut self, head: ResponseWithoutBody) -> SendHandle {
        self.record(Sent::Head(head.status()))
    }

    fn send_content_block(&mut self, block: ContentBlock) -> SendHandle {
        self.record(Sent::Block(block.into_content()))
    }

    fn send_last_content_block(&mut self, block: LastContentBlock) -> SendHandle {
        self.record(Sent::Last(block.into_parts().0))
    }

    fn send_body_stream(&mut self, _body: BodyStream) -> SendHandle {
        self.record(Sent::Stream)
    }

    fn send_full_response(&mut self, response: FullResponse) -> SendHandle {
        let (head, body) = response.into_parts();
        self.record(Sent::Full(head.status(), body))
    }

    fn close(&mut self) -> SendHandle {
        self.record(Sent::Close)
    }
}

/// A service failure as seen by the hooks.
#[derive(Debug, Clone)]
pub struct Reported {
    pub kind: Option<ServiceKind>,
    pub state: ResponseState,
    pub violation: Option<ProtocolViolation>,
    pub panicked: bool,
}

/// What the hooks of a connection observed, shared with the test.
#[derive(Debug, Default)]
pub struct HookLog {
    /// `(uri, kind, n)`: the n-th service created on its connection.
    pub services: Mutex<Vec<(String, ServiceKind, usize)>>,
    pub service_errors: Mutex<Vec<Reported>>,
    pub connection_errors: Mutex<Vec<String>>,
    pub connected: AtomicUsize,
    pub disconnected: AtomicUsize,
}

impl HookLog {
    pub fn service_errors(&self) -> Vec<Reported> {
        self.service_errors.lock().unwrap().clone()
    }
}

/// Per-connection hooks that record into a [`HookLog`], then apply the
/// default policy.
#[derive(Debug)]
pub struct RecordingHooks {
    log: Arc<HookLog>,
    created: usize,
}

impl RecordingHooks {
    pub fn new(log: Arc<HookLog>) -> Self {
        Self { log, created: 0 }
    }
}

impl ConnectionHooks for RecordingHooks {
    fn on_connected(&mut self, _connection: &Connection) {
        self.log.connected.fetch_add(1, Ordering::SeqCst);
    }

    fn on_disconnected(&mut self, _connection: &Connection) {
        self.log.disconnected.fetch_add(1, Ordering::SeqCst);
    }

    fn on_service_created(&mut self, _connection: &Connection, request: &RequestWithoutBody, service: &Service) {
        self.created += 1;
        self.log
            .services
            .lock()
            .unwrap()
            .push((request.uri().to_string(), service.kind(), self.created));
    }

    fn on_connection_throwable(&mut self, _connection: &mut Connection, error: &ConnectionError) {
        self.log.connection_errors.lock().unwrap().push(error.to_string());
    }

    fn on_service_throwable(&mut self, connection: &mut Connection, service: Option<&Service>, error: &ServiceError) {
        self.log.service_errors.lock().unwrap().push(Reported {
            kind: service.map(Service::kind),
            state: connection.state(),
            violation: match error {
                ServiceError::Protocol(violation) => Some(violation.clone()),
                _ => None,
            },
            panicked: matches!(error, ServiceError::Panicked(_)),
        });
        recover_with_internal_error(connection, service, error);
    }
}

/// A dispatcher over a recording transport.
pub struct Harness {
    pub dispatcher: ServiceDispatcher,
    pub transport: RecordingTransport,
    pub hooks: Arc<HookLog>,
}

impl Harness {
    pub fn new(routes: RouteTable) -> Self {
        let transport = RecordingTransport::new();
        let hooks = Arc::new(HookLog::default());
        let connection = Connection::new(ConnectionId::new(), None, Box::new(transport.clone()));
        let dispatcher = ServiceDispatcher::new(
            Arc::new(routes),
            Box::new(RecordingHooks::new(hooks.clone())),
            connection,
        );
        Self {
            dispatcher,
            transport,
            hooks,
        }
    }

    pub async fn connect(routes: RouteTable) -> Self {
        let mut harness = Self::new(routes);
        harness.dispatcher.handle_event(InboundEvent::Connected).await;
        harness
    }

    /// Feed one request the way the server does: head, one block per body
    /// piece, the last block, then the assembled body if one is expected.
    pub async fn request(&mut self, request: RequestWithoutBody, pieces: &[&'static str]) {
        self.dispatcher.handle_event(InboundEvent::RequestHeader(request)).await;
        let aggregate = self.dispatcher.expects_full_request();

        let mut body = Vec::new();
        for piece in pieces {
            body.extend_from_slice(piece.as_bytes());
            self.dispatcher
                .handle_event(InboundEvent::ContentBlock(ContentBlock::new(*piece)))
                .await;
        }
        self.dispatcher
            .handle_event(InboundEvent::LastContentBlock(LastContentBlock::empty()))
            .await;
        if aggregate {
            self.dispatcher
                .handle_event(InboundEvent::FullRequestAssembled(Bytes::from(body)))
                .await;
        }
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.transport.sent()
    }

    /// The session must be back to `{Initial, no service, no pending response}`.
    pub fn assert_idle(&self) {
        assert_eq!(self.dispatcher.state(), ResponseState::Initial);
        assert!(!self.dispatcher.has_active_service());
        assert!(!self.dispatcher.has_pending_response());
    }
}

pub fn get(uri: &str) -> RequestWithoutBody {
    RequestWithoutBody::new(Method::GET, uri, HeaderMap::new())
}

pub fn post(uri: &str) -> RequestWithoutBody {
    RequestWithoutBody::new(Method::POST, uri, HeaderMap::new())
}

// Sample services.

/// Lightweight: `200 Hello`.
pub struct Hello;

#[async_trait]
impl LightweightService for Hello {
    async fn serve_full_request(&self, _request: FullRequest) -> Result<FullResponse, ServiceError> {
        Ok(FullResponse::text(StatusCode::OK, "Hello"))
    }
}

/// Lightweight that fails.
pub struct Failing;

#[async_trait]
impl LightweightService for Failing {
    async fn serve_full_request(&self, _request: FullRequest) -> Result<FullResponse, ServiceError> {
        Err(ServiceError::handler("backend unavailable"))
    }
}

/// Lightweight that panics.
pub struct Panicking;

#[async_trait]
impl LightweightService for Panicking {
    async fn serve_full_request(&self, _request: FullRequest) -> Result<FullResponse, ServiceError> {
        panic!("handler bug")
    }
}

/// FullRequest: answers with the size of the assembled body.
pub struct BodySize;

#[async_trait]
impl FullRequestService for BodySize {
    async fn serve_full_request(
        &self,
        request: FullRequest,
        connection: &mut Connection,
    ) -> Result<(), ServiceError> {
        let size = request.body().len().to_string();
        connection.send_full_response(FullResponse::text(StatusCode::OK, size))?;
        Ok(())
    }
}

/// General: sends a content block before any header.
#[derive(Default)]
pub struct BodyBeforeHeader;

#[async_trait]
impl GeneralService for BodyBeforeHeader {
    async fn serve_request_without_body(
        &mut self,
        _request: &RequestWithoutBody,
        connection: &mut Connection,
    ) -> Result<(), ServiceError> {
        connection.send_content_block(ContentBlock::new("too early"))?;
        Ok(())
    }

    async fn serve_content_block(&mut self, _block: ContentBlock, _connection: &mut Connection) -> Result<(), ServiceError> {
        Ok(())
    }

    async fn serve_last_content_block(
        &mut self,
        _block: LastContentBlock,
        _connection: &mut Connection,
    ) -> Result<(), ServiceError> {
        Ok(())
    }
}

/// General: streams the body back, counting its releases.
pub struct Echo {
    pub released: Arc<AtomicUsize>,
}

#[async_trait]
impl GeneralService for Echo {
    async fn serve_request_without_body(
        &mut self,
        _request: &RequestWithoutBody,
        connection: &mut Connection,
    ) -> Result<(), ServiceError> {
        connection.send_response_without_body(ResponseWithoutBody::new(StatusCode::OK))?;
        Ok(())
    }

    async fn serve_content_block(&mut self, block: ContentBlock, connection: &mut Connection) -> Result<(), ServiceError> {
        connection.send_content_block(block)?;
        Ok(())
    }

    async fn serve_last_content_block(
        &mut self,
        block: LastContentBlock,
        connection: &mut Connection,
    ) -> Result<(), ServiceError> {
        connection.send_last_content_block(block)?;
        Ok(())
    }

    fn release(&mut self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

/// General: sends the header, then fails on the first body piece.
#[derive(Default)]
pub struct FailsMidResponse;

#[async_trait]
impl GeneralService for FailsMidResponse {
    async fn serve_request_without_body(
        &mut self,
        _request: &RequestWithoutBody,
        connection: &mut Connection,
    ) -> Result<(), ServiceError> {
        connection.send_response_without_body(ResponseWithoutBody::new(StatusCode::OK))?;
        Ok(())
    }

    async fn serve_content_block(&mut self, _block: ContentBlock, _connection: &mut Connection) -> Result<(), ServiceError> {
        Err(ServiceError::handler("disk read failed"))
    }

    async fn serve_last_content_block(
        &mut self,
        _block: LastContentBlock,
        _connection: &mut Connection,
    ) -> Result<(), ServiceError> {
        Ok(())
    }
}

/// General: returns normally without ever responding.
#[derive(Default)]
pub struct Silent;

#[async_trait]
impl GeneralService for Silent {
    async fn serve_request_without_body(
        &mut self,
        _request: &RequestWithoutBody,
        _connection: &mut Connection,
    ) -> Result<(), ServiceError> {
        Ok(())
    }

    async fn serve_content_block(&mut self, _block: ContentBlock, _connection: &mut Connection) -> Result<(), ServiceError> {
        Ok(())
    }

    async fn serve_last_content_block(
        &mut self,
        _block: LastContentBlock,
        _connection: &mut Connection,
    ) -> Result<(), ServiceError> {
        Ok(())
    }
}

/// FullResponse: leaves the accumulator untouched.
#[derive(Default)]
pub struct Untouched;

#[async_trait]
impl FullResponseService for Untouched {
    async fn serve_request_without_body(
        &mut self,
        _request: &RequestWithoutBody,
        _response: &mut FullResponse,
    ) -> Result<(), ServiceError> {
        Ok(())
    }

    async fn serve_content_block(&mut self, _block: ContentBlock, _response: &mut FullResponse) -> Result<(), ServiceError> {
        Ok(())
    }

    async fn serve_last_content_block(
        &mut self,
        _block: LastContentBlock,
        _response: &mut FullResponse,
    ) -> Result<(), ServiceError> {
        Ok(())
    }
}

/// FullResponse: concatenates the body, uppercased, into a `201`.
#[derive(Default)]
pub struct Shout {
    body: Vec<u8>,
}

#[async_trait]
impl FullResponseService for Shout {
    fn create_full_response(&mut self) -> FullResponse {
        FullResponse::new(StatusCode::CREATED)
    }

    async fn serve_request_without_body(
        &mut self,
        _request: &RequestWithoutBody,
        _response: &mut FullResponse,
    ) -> Result<(), ServiceError> {
        Ok(())
    }

    async fn serve_content_block(&mut self, block: ContentBlock, _response: &mut FullResponse) -> Result<(), ServiceError> {
        self.body.extend(block.content().iter().map(u8::to_ascii_uppercase));
        Ok(())
    }

    async fn serve_last_content_block(
        &mut self,
        _block: LastContentBlock,
        response: &mut FullResponse,
    ) -> Result<(), ServiceError> {
        response.set_body(std::mem::take(&mut self.body));
        Ok(())
    }
}

/// FullResponse: copies each piece into the accumulator, failing on piece
/// number `fail_at` (the last block counts as one more piece).
pub struct Fragile {
    fail_at: usize,
    seen: usize,
}

impl Fragile {
    pub fn failing_at(fail_at: usize) -> Self {
        Self { fail_at, seen: 0 }
    }

    fn next_piece(&mut self) -> Result<(), ServiceError> {
        self.seen += 1;
        if self.seen == self.fail_at {
            return Err(ServiceError::handler("accumulator rejected piece"));
        }
        Ok(())
    }
}

#[async_trait]
impl FullResponseService for Fragile {
    async fn serve_request_without_body(
        &mut self,
        _request: &RequestWithoutBody,
        _response: &mut FullResponse,
    ) -> Result<(), ServiceError> {
        Ok(())
    }

    async fn serve_content_block(&mut self, block: ContentBlock, response: &mut FullResponse) -> Result<(), ServiceError> {
        self.next_piece()?;
        response.set_body(block.into_content());
        Ok(())
    }

    async fn serve_last_content_block(
        &mut self,
        _block: LastContentBlock,
        _response: &mut FullResponse,
    ) -> Result<(), ServiceError> {
        self.next_piece()
    }
}
