//! The per-connection service dispatcher.
//!
//! # Responsibilities
//! - Resolve a service for each request header and own it for the cycle
//! - Feed request pieces to the service according to its variant
//! - Send the response of buffered-response variants
//! - Reset the protocol and release the service when the cycle ends
//!
//! # Design Decisions
//! - A cycle that ends without a completed response is reported to
//!   `on_service_throwable` as `IncompleteResponse`
//! - Panics inside service callbacks are caught and treated as errors
//! - Events arriving with no active service are dropped; this happens after
//!   a service failed early and the rest of its body is still arriving

use std::any::Any;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use bytes::Bytes;
use futures_util::FutureExt;
use tracing::Instrument;
use uuid::Uuid;

use crate::dispatch::{ConnectionHooks, InboundEvent};
use crate::message::{ContentBlock, FullRequest, FullResponse, LastContentBlock, RequestWithoutBody};
use crate::observability::metrics;
use crate::protocol::{Connection, ProtocolViolation, ResponseState};
use crate::routing::RouteTable;
use crate::service::{Service, ServiceError, ServiceInstance};

/// The service serving the current request cycle.
struct ActiveService {
    instance: ServiceInstance,
    request: RequestWithoutBody,
    request_id: Uuid,
}

/// Drives one connection's request cycles.
pub struct ServiceDispatcher {
    routes: Arc<RouteTable>,
    hooks: Box<dyn ConnectionHooks>,
    connection: Connection,
    active: Option<ActiveService>,
    pending_full_response: Option<FullResponse>,
}

impl ServiceDispatcher {
    pub fn new(routes: Arc<RouteTable>, hooks: Box<dyn ConnectionHooks>, connection: Connection) -> Self {
        Self {
            routes,
            hooks,
            connection,
            active: None,
            pending_full_response: None,
        }
    }

    /// Handle the next inbound event. Never fails: service errors are routed
    /// to the hooks.
    pub async fn handle_event(&mut self, event: InboundEvent) {
        let request_id = match &event {
            InboundEvent::RequestHeader(_) => Some(Uuid::new_v4()),
            _ => self.active.as_ref().map(|active| active.request_id),
        };

        let span = tracing::debug_span!(
            "dispatch",
            connection_id = %self.connection.id(),
            request_id = tracing::field::Empty,
        );
        if let Some(id) = request_id {
            span.record("request_id", tracing::field::display(id));
        }

        self.dispatch(event, request_id).instrument(span).await
    }

    async fn dispatch(&mut self, event: InboundEvent, request_id: Option<Uuid>) {
        match event {
            InboundEvent::Connected => self.hooks.on_connected(&self.connection),
            InboundEvent::RequestHeader(request) => {
                let request_id = request_id.unwrap_or_else(Uuid::new_v4);
                self.on_request_header(request, request_id).await
            }
            InboundEvent::ContentBlock(block) => self.on_content_block(block).await,
            InboundEvent::LastContentBlock(block) => self.on_last_content_block(block).await,
            InboundEvent::FullRequestAssembled(body) => self.on_full_request(body).await,
            InboundEvent::ConnectionError(error) => {
                self.hooks.on_connection_throwable(&mut self.connection, &error)
            }
            InboundEvent::Disconnected => {
                self.release();
                self.hooks.on_disconnected(&self.connection);
            }
        }
    }

    async fn on_request_header(&mut self, request: RequestWithoutBody, request_id: Uuid) {
        if self.active.is_some() {
            tracing::warn!("Request header arrived before the previous cycle finished");
            self.finish_cycle();
        }

        let mut instance = self.routes.resolve(request.uri()).create();
        metrics::record_request(instance.kind().as_str());
        self.hooks.on_service_created(&self.connection, &request, instance.service());

        let result = match instance.service_mut() {
            Service::General(service) => {
                guarded(service.serve_request_without_body(&request, &mut self.connection)).await
            }
            Service::FullResponse(service) => {
                match catch_unwind(AssertUnwindSafe(|| service.create_full_response())) {
                    Ok(mut response) => {
                        let result = guarded(service.serve_request_without_body(&request, &mut response)).await;
                        self.pending_full_response = Some(response);
                        result
                    }
                    Err(payload) => Err(ServiceError::Panicked(panic_message(&*payload))),
                }
            }
            Service::Lightweight(_) | Service::FullRequest(_) => Ok(()),
        };

        self.active = Some(ActiveService {
            instance,
            request,
            request_id,
        });

        if let Err(error) = result {
            self.fail(error);
        }
    }

    async fn on_content_block(&mut self, block: ContentBlock) {
        let Some(active) = self.active.as_mut() else {
            tracing::trace!(bytes = block.len(), "Dropping content block, no active service");
            return;
        };

        let result = match active.instance.service_mut() {
            Service::General(service) => guarded(service.serve_content_block(block, &mut self.connection)).await,
            Service::FullResponse(service) => match self.pending_full_response.as_mut() {
                Some(response) => guarded(service.serve_content_block(block, response)).await,
                None => Ok(()),
            },
            Service::Lightweight(_) | Service::FullRequest(_) => Ok(()),
        };

        if let Err(error) = result {
            self.fail(error);
        }
    }

    async fn on_last_content_block(&mut self, block: LastContentBlock) {
        let Some(active) = self.active.as_mut() else {
            tracing::trace!("Dropping last content block, no active service");
            return;
        };

        let result = match active.instance.service_mut() {
            Service::General(service) => {
                guarded(service.serve_last_content_block(block, &mut self.connection)).await
            }
            Service::FullResponse(service) => {
                let served = match self.pending_full_response.as_mut() {
                    Some(response) => guarded(service.serve_last_content_block(block, response)).await,
                    None => Ok(()),
                };
                match (served, self.pending_full_response.take()) {
                    (Ok(()), Some(response)) => self
                        .connection
                        .send_full_response(response)
                        .map(drop)
                        .map_err(ServiceError::from),
                    (served, _) => served,
                }
            }
            // Buffered variants are served once the body is assembled.
            Service::Lightweight(_) | Service::FullRequest(_) => return,
        };

        match result {
            Ok(()) => self.finish_cycle(),
            Err(error) => self.fail(error),
        }
    }

    async fn on_full_request(&mut self, body: Bytes) {
        let Some(active) = self.active.as_mut() else {
            tracing::trace!("Dropping assembled request, no active service");
            return;
        };

        let request = FullRequest::new(active.request.clone(), body);
        let result = match active.instance.service_mut() {
            Service::Lightweight(service) => match guarded(service.serve_full_request(request)).await {
                Ok(response) => self
                    .connection
                    .send_full_response(response)
                    .map(drop)
                    .map_err(ServiceError::from),
                Err(error) => Err(error),
            },
            Service::FullRequest(service) => {
                guarded(service.serve_full_request(request, &mut self.connection)).await
            }
            Service::General(_) | Service::FullResponse(_) => {
                tracing::warn!("Assembled request delivered to a streaming service, ignoring");
                return;
            }
        };

        match result {
            Ok(()) => self.finish_cycle(),
            Err(error) => self.fail(error),
        }
    }

    /// End a cycle that returned normally.
    fn finish_cycle(&mut self) {
        let state = self.connection.state();
        if state == ResponseState::Completed {
            self.release();
        } else {
            self.fail(ProtocolViolation::IncompleteResponse { state }.into());
        }
    }

    /// Report a failed service, then end its cycle.
    fn fail(&mut self, error: ServiceError) {
        let service = self.active.as_ref().map(|active| active.instance.service());
        metrics::record_service_error(error.kind());
        self.hooks.on_service_throwable(&mut self.connection, service, &error);
        self.release();
    }

    /// Return the session to `{Initial, no service, no pending response}`.
    fn release(&mut self) {
        self.connection.reset();
        self.pending_full_response = None;
        if let Some(active) = self.active.take() {
            let kind = active.instance.kind();
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| active.instance.release())) {
                tracing::error!(service = %kind, panic = %panic_message(&*payload), "Service release panicked");
            }
        }
    }

    /// Drop the current request without serving it, as when the transport
    /// refused its body. The service is released and nothing is reported.
    pub fn abandon_request(&mut self) {
        if self.active.is_some() {
            tracing::debug!("Abandoning request");
        }
        self.release();
    }

    /// Whether the transport must aggregate the current request body and
    /// deliver it as [`InboundEvent::FullRequestAssembled`].
    pub fn expects_full_request(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|active| active.instance.kind().buffers_request())
    }

    pub fn state(&self) -> ResponseState {
        self.connection.state()
    }

    pub fn has_active_service(&self) -> bool {
        self.active.is_some()
    }

    pub fn has_pending_response(&self) -> bool {
        self.pending_full_response.is_some()
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Used by the transport to answer requests it rejects itself.
    pub fn connection_mut(&mut self) -> &mut Connection {
        &mut self.connection
    }
}

impl std::fmt::Debug for ServiceDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceDispatcher")
            .field("connection", &self.connection)
            .field("active", &self.active.as_ref().map(|a| a.instance.kind()))
            .field("pending_full_response", &self.pending_full_response.is_some())
            .finish()
    }
}

/// Run a service future, turning a panic into [`ServiceError::Panicked`].
async fn guarded<T, F>(fut: F) -> Result<T, ServiceError>
where
    F: Future<Output = Result<T, ServiceError>>,
{
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => Err(ServiceError::Panicked(panic_message(&*payload))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
