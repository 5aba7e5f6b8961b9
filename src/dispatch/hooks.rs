//! Connection lifecycle hooks.
//!
//! Each connection gets its own hooks instance from a
//! [`ConnectionHooksFactory`], so hooks may keep per-connection state.

use std::fmt;
use std::sync::Arc;

use hyper::StatusCode;

use crate::dispatch::ConnectionError;
use crate::message::{FullResponse, RequestWithoutBody};
use crate::protocol::{Connection, ResponseState};
use crate::service::{Service, ServiceError};

/// Application callbacks around the dispatch of one connection.
///
/// Every method has a default that logs through `tracing`; override only
/// what you need. `on_service_throwable` defaults to
/// [`recover_with_internal_error`].
pub trait ConnectionHooks: Send {
    fn on_connected(&mut self, connection: &Connection) {
        tracing::debug!(connection = %connection, "Connection opened");
    }

    fn on_disconnected(&mut self, connection: &Connection) {
        tracing::debug!(connection = %connection, "Connection closed");
    }

    fn on_service_created(&mut self, connection: &Connection, request: &RequestWithoutBody, service: &Service) {
        tracing::debug!(
            connection = %connection,
            method = %request.method(),
            uri = %request.uri(),
            service = %service.kind(),
            "Service created"
        );
    }

    fn on_connection_throwable(&mut self, connection: &mut Connection, error: &ConnectionError) {
        tracing::warn!(connection = %connection, error = %error, "Connection error");
    }

    /// `service` is `None` when the failure happened before an instance
    /// existed.
    fn on_service_throwable(&mut self, connection: &mut Connection, service: Option<&Service>, error: &ServiceError) {
        recover_with_internal_error(connection, service, error);
    }
}

/// Hooks with every default in place.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultConnectionHooks;

impl ConnectionHooks for DefaultConnectionHooks {}

type CreateHooks = dyn Fn() -> Box<dyn ConnectionHooks> + Send + Sync;

/// Creates the hooks instance of each new connection.
#[derive(Clone)]
pub struct ConnectionHooksFactory {
    create: Arc<CreateHooks>,
}

impl ConnectionHooksFactory {
    pub fn new<F, H>(create: F) -> Self
    where
        F: Fn() -> H + Send + Sync + 'static,
        H: ConnectionHooks + 'static,
    {
        Self {
            create: Arc::new(move || -> Box<dyn ConnectionHooks> { Box::new(create()) }),
        }
    }

    pub fn create(&self) -> Box<dyn ConnectionHooks> {
        (self.create)()
    }
}

impl Default for ConnectionHooksFactory {
    fn default() -> Self {
        Self::new(|| DefaultConnectionHooks)
    }
}

impl fmt::Debug for ConnectionHooksFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHooksFactory").finish_non_exhaustive()
    }
}

/// Default recovery for a failed service.
///
/// Nothing sent yet: force an empty `500`. Partial response on the wire: the
/// client can only be told by closing the connection. Already completed: log.
pub fn recover_with_internal_error(connection: &mut Connection, service: Option<&Service>, error: &ServiceError) {
    let service = service.map(|s| s.kind().as_str()).unwrap_or("none");
    match connection.state() {
        ResponseState::Initial => {
            tracing::error!(connection = %connection, service, error = %error, "Service failed, sending 500");
            let _ = connection.force_send_full_response(FullResponse::new(StatusCode::INTERNAL_SERVER_ERROR));
        }
        ResponseState::HeaderSent => {
            tracing::error!(
                connection = %connection,
                service,
                error = %error,
                "Service failed mid-response, closing connection"
            );
            let _ = connection.close();
        }
        ResponseState::Completed => {
            tracing::error!(connection = %connection, service, error = %error, "Service failed after responding");
        }
    }
}
