//! HTTP/1.1 server wiring hyper connections to service dispatchers.
//!
//! # Responsibilities
//! - Accept connections from the bounded listener
//! - Run one `ServiceDispatcher` per connection
//! - Translate each hyper request into inbound events
//! - Aggregate bodies for buffered services, refusing oversized ones
//! - Stop accepting and drain connections on shutdown
//!
//! # Data Flow
//! ```text
//! Listener::accept
//!     → serve_connection (task per connection)
//!         → hooks for this connection, Connected
//!         → hyper http1 connection
//!             → service_fn: spawn drive_request, await response head
//!             → drive_request (holds the dispatcher lock for the exchange):
//!                 RequestHeader, ContentBlock*, LastContentBlock,
//!                 FullRequestAssembled (buffered services only)
//!         → ConnectionError?, Disconnected
//! ```
//!
//! # Design Decisions
//! - The dispatcher sits behind a `tokio::sync::Mutex` so exchanges on one
//!   connection are handled strictly one after another
//! - The exchange slot is armed and finished under that lock

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{HeaderMap, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, oneshot, Mutex};

use crate::config::LimitsConfig;
use crate::dispatch::{ConnectionError, ConnectionHooksFactory, InboundEvent, ServiceDispatcher};
use crate::lifecycle::Shutdown;
use crate::message::{ContentBlock, LastContentBlock, RequestWithoutBody};
use crate::net::connection::{ConnectionId, ConnectionTracker};
use crate::net::listener::{Listener, ListenerError};
use crate::net::transport::{ExchangeSlot, HyperTransport, ResponseBody};
use crate::observability::metrics;
use crate::protocol::Connection;
use crate::routing::RouteTable;

/// How long shutdown waits for open connections.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Everything a connection task needs.
#[derive(Clone)]
struct ConnectionContext {
    routes: Arc<RouteTable>,
    hooks: ConnectionHooksFactory,
    max_full_request_bytes: usize,
}

/// HTTP server dispatching requests to the services of a route table.
pub struct HttpServer {
    context: ConnectionContext,
    tracker: ConnectionTracker,
}

impl HttpServer {
    /// `hooks` is called once per accepted connection.
    pub fn new(routes: RouteTable, hooks: ConnectionHooksFactory, limits: &LimitsConfig) -> Self {
        Self {
            context: ConnectionContext {
                routes: Arc::new(routes),
                hooks,
                max_full_request_bytes: limits.max_full_request_bytes,
            },
            tracker: ConnectionTracker::new(),
        }
    }

    pub fn tracker(&self) -> &ConnectionTracker {
        &self.tracker
    }

    /// Accept connections until `shutdown` triggers, then drain.
    pub async fn run(self, listener: Listener, shutdown: Shutdown) -> Result<(), ListenerError> {
        if let Ok(addr) = listener.local_addr() {
            tracing::info!(address = %addr, "HTTP server starting");
        }

        let mut shutdown_rx = shutdown.subscribe();
        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer, permit)) => {
                        let guard = self.tracker.track();
                        let context = self.context.clone();
                        let connection_shutdown = shutdown.subscribe();
                        tokio::spawn(async move {
                            serve_connection(stream, peer, guard.id(), context, connection_shutdown).await;
                            drop(permit);
                            drop(guard);
                        });
                    }
                    Err(ListenerError::Closed) => break,
                    Err(e) => tracing::error!(error = %e, "Accept failed"),
                },
                _ = shutdown_rx.recv() => {
                    tracing::info!("Shutdown requested, no longer accepting connections");
                    break;
                }
            }
        }

        if self.tracker.wait_for_idle(DRAIN_TIMEOUT).await {
            tracing::info!("HTTP server stopped");
        } else {
            tracing::warn!(
                remaining = self.tracker.active_count(),
                "HTTP server stopped with connections still open"
            );
        }
        Ok(())
    }
}

async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    id: ConnectionId,
    context: ConnectionContext,
    mut shutdown: broadcast::Receiver<()>,
) {
    let slot = ExchangeSlot::new();
    let connection = Connection::new(id, Some(peer), Box::new(HyperTransport::new(slot.clone())));
    let dispatcher = Arc::new(Mutex::new(ServiceDispatcher::new(
        Arc::clone(&context.routes),
        context.hooks.create(),
        connection,
    )));
    dispatcher.lock().await.handle_event(InboundEvent::Connected).await;

    let outcome = {
        let service = {
            let dispatcher = Arc::clone(&dispatcher);
            let slot = slot.clone();
            let limit = context.max_full_request_bytes;
            service_fn(move |request: Request<Incoming>| {
                let dispatcher = Arc::clone(&dispatcher);
                let slot = slot.clone();
                async move {
                    let (head_tx, head_rx) = oneshot::channel();
                    tokio::spawn(drive_request(dispatcher, slot, request, head_tx, limit));
                    head_rx.await.map_err(|_| {
                        std::io::Error::new(std::io::ErrorKind::ConnectionAborted, "response abandoned")
                    })
                }
            })
        };

        let conn = http1::Builder::new().serve_connection(TokioIo::new(stream), service);
        tokio::pin!(conn);

        let mut draining = false;
        loop {
            tokio::select! {
                result = conn.as_mut() => break result,
                _ = slot.closed() => break Ok(()),
                _ = shutdown.recv(), if !draining => {
                    draining = true;
                    conn.as_mut().graceful_shutdown();
                }
            }
        }
    };

    let mut dispatcher = dispatcher.lock().await;
    if let Err(e) = outcome {
        if !slot.is_closed() {
            dispatcher
                .handle_event(InboundEvent::ConnectionError(ConnectionError::transport(e)))
                .await;
        }
    }
    dispatcher.handle_event(InboundEvent::Disconnected).await;
}

/// Feed one request to the dispatcher.
async fn drive_request(
    dispatcher: Arc<Mutex<ServiceDispatcher>>,
    slot: ExchangeSlot,
    request: Request<Incoming>,
    head: oneshot::Sender<Response<ResponseBody>>,
    limit: usize,
) {
    let mut dispatcher = dispatcher.lock().await;
    slot.begin(head);

    let (parts, mut body) = request.into_parts();
    let head = RequestWithoutBody::from_parts(&parts);
    let declared_length = head.content_length();
    dispatcher.handle_event(InboundEvent::RequestHeader(head)).await;

    let aggregate = dispatcher.expects_full_request();
    if aggregate && declared_length.is_some_and(|len| len > limit as u64) {
        reject_oversized(&mut dispatcher, &slot, limit).await;
        return;
    }

    let mut buffered = BytesMut::new();
    let mut trailers = HeaderMap::new();

    while let Some(frame) = body.frame().await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => {
                dispatcher
                    .handle_event(InboundEvent::ConnectionError(ConnectionError::transport(e)))
                    .await;
                dispatcher.abandon_request();
                slot.finish();
                return;
            }
        };

        match frame.into_data() {
            Ok(data) => {
                if aggregate {
                    if buffered.len() + data.len() > limit {
                        reject_oversized(&mut dispatcher, &slot, limit).await;
                        return;
                    }
                    buffered.extend_from_slice(&data);
                }
                dispatcher
                    .handle_event(InboundEvent::ContentBlock(ContentBlock::new(data)))
                    .await;
            }
            Err(frame) => {
                if let Ok(received) = frame.into_trailers() {
                    trailers = received;
                }
            }
        }
    }

    dispatcher
        .handle_event(InboundEvent::LastContentBlock(LastContentBlock::with_trailers(
            Bytes::new(),
            trailers,
        )))
        .await;
    if aggregate {
        dispatcher
            .handle_event(InboundEvent::FullRequestAssembled(buffered.freeze()))
            .await;
    }
    slot.finish();
}

/// Answer 413 and close; the service never sees the request.
async fn reject_oversized(dispatcher: &mut ServiceDispatcher, slot: &ExchangeSlot, limit: usize) {
    metrics::record_payload_rejected();
    tracing::warn!(limit, "Request body too large");
    slot.reject(StatusCode::PAYLOAD_TOO_LARGE);
    dispatcher
        .handle_event(InboundEvent::ConnectionError(ConnectionError::PayloadTooLarge { limit }))
        .await;
    dispatcher.abandon_request();
    slot.finish();
}
