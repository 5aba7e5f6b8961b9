//! Service (request handler) subsystem.
//!
//! # Data Flow
//! ```text
//! RouteTable resolves a ServiceFactory
//!     → factory.rs (create a fresh instance, or hand out the shared one)
//!     → Service (tagged by variant)
//!     → dispatcher feeds it inbound events per variant contract:
//!
//!   Lightweight   FullRequest → FullResponse       (buffered in, buffered out)
//!   FullRequest   FullRequest + Connection         (buffered in, streamed out)
//!   General       head/blocks + Connection         (streamed in, streamed out)
//!   FullResponse  head/blocks + &mut FullResponse  (streamed in, buffered out)
//! ```
//!
//! # Design Decisions
//! - Variants are a closed enum; the dispatcher matches exhaustively
//! - Buffered-request variants take `&self` and may be shared singletons;
//!   streamed variants take `&mut self` and are always per request
//! - Every callback returns `Result`; the dispatcher is the catch point

pub mod factory;
pub mod file;
pub mod form;
pub mod json;
pub mod method;
pub mod not_found;
pub mod traits;

use std::fmt;
use std::io;
use std::sync::Arc;

use crate::protocol::ProtocolViolation;

pub use factory::{ServiceFactory, ServiceInstance};
pub use file::FileService;
pub use form::{FormPost, FormService};
pub use json::{JsonGet, JsonGetService, JsonPost, JsonPostService};
pub use method::{GetOnly, PostOnly};
pub use not_found::NotFoundService;
pub use traits::{FullRequestService, FullResponseService, GeneralService, LightweightService};

/// Boxed error type services may return.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failure of a service callback, as seen by the dispatcher.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("protocol violation: {0}")]
    Protocol(#[from] ProtocolViolation),

    #[error("service error: {0}")]
    Handler(#[source] BoxError),

    #[error("service panicked: {0}")]
    Panicked(String),
}

impl ServiceError {
    /// Wrap any application error.
    pub fn handler(err: impl Into<BoxError>) -> Self {
        ServiceError::Handler(err.into())
    }

    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::Protocol(_) => "protocol",
            ServiceError::Handler(_) => "handler",
            ServiceError::Panicked(_) => "panicked",
        }
    }
}

impl From<io::Error> for ServiceError {
    fn from(err: io::Error) -> Self {
        ServiceError::Handler(Box::new(err))
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        ServiceError::Handler(Box::new(err))
    }
}

/// Which handler contract a service implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceKind {
    Lightweight,
    FullRequest,
    General,
    FullResponse,
}

impl ServiceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceKind::Lightweight => "lightweight",
            ServiceKind::FullRequest => "full_request",
            ServiceKind::General => "general",
            ServiceKind::FullResponse => "full_response",
        }
    }

    /// Whether the transport must aggregate the body before serving.
    pub fn buffers_request(&self) -> bool {
        matches!(self, ServiceKind::Lightweight | ServiceKind::FullRequest)
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A service instance, tagged by the contract it implements.
pub enum Service {
    Lightweight(Arc<dyn LightweightService>),
    FullRequest(Arc<dyn FullRequestService>),
    General(Box<dyn GeneralService>),
    FullResponse(Box<dyn FullResponseService>),
}

impl Service {
    pub fn lightweight(service: impl LightweightService + 'static) -> Self {
        Service::Lightweight(Arc::new(service))
    }

    pub fn full_request(service: impl FullRequestService + 'static) -> Self {
        Service::FullRequest(Arc::new(service))
    }

    pub fn general(service: impl GeneralService + 'static) -> Self {
        Service::General(Box::new(service))
    }

    pub fn full_response(service: impl FullResponseService + 'static) -> Self {
        Service::FullResponse(Box::new(service))
    }

    pub fn kind(&self) -> ServiceKind {
        match self {
            Service::Lightweight(_) => ServiceKind::Lightweight,
            Service::FullRequest(_) => ServiceKind::FullRequest,
            Service::General(_) => ServiceKind::General,
            Service::FullResponse(_) => ServiceKind::FullResponse,
        }
    }
}

impl fmt::Debug for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Service").field(&self.kind()).finish()
    }
}
