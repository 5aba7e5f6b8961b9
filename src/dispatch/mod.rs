//! Per-connection dispatch of inbound events to services.
//!
//! # Data Flow
//! ```text
//! Transport parses the wire and emits InboundEvents, in order:
//!     Connected
//!     (RequestHeader, ContentBlock*, LastContentBlock, FullRequestAssembled?)*
//!     ConnectionError? Disconnected
//!
//! dispatcher.rs
//!     RequestHeader → RouteTable::resolve → ServiceFactory::create
//!     → feed the instance per its variant contract
//!     → reset the connection's protocol and release the instance
//!
//! hooks.rs
//!     per-connection lifecycle callbacks; default policy for failed services
//! ```
//!
//! # Design Decisions
//! - One dispatcher per connection; events are handled strictly in order
//! - Service failures (errors and panics) are caught here and never unwind
//!   into the transport
//! - Connection-level failures go to hooks without touching the service

pub mod dispatcher;
pub mod hooks;

use bytes::Bytes;

use crate::message::{ContentBlock, LastContentBlock, RequestWithoutBody};
use crate::service::BoxError;

pub use dispatcher::ServiceDispatcher;
pub use hooks::{recover_with_internal_error, ConnectionHooks, ConnectionHooksFactory, DefaultConnectionHooks};

/// One parsed inbound event for a connection.
#[derive(Debug)]
pub enum InboundEvent {
    Connected,
    RequestHeader(RequestWithoutBody),
    ContentBlock(ContentBlock),
    LastContentBlock(LastContentBlock),
    /// The whole body, aggregated by the transport for buffered services.
    FullRequestAssembled(Bytes),
    ConnectionError(ConnectionError),
    Disconnected,
}

/// Failure below the service layer.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("transport error: {0}")]
    Transport(#[source] BoxError),

    #[error("request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },
}

impl ConnectionError {
    pub fn transport(err: impl Into<BoxError>) -> Self {
        ConnectionError::Transport(err.into())
    }
}
