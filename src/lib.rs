//! Service-routing HTTP dispatch library.
//!
//! Resolves each request to a service through a tiered route table, feeds it
//! the request according to one of four handler contracts, and enforces the
//! order in which the response may be sent.

// Core
pub mod dispatch;
pub mod message;
pub mod protocol;
pub mod routing;
pub mod service;

// Transport and process
pub mod config;
pub mod lifecycle;
pub mod net;
pub mod observability;

pub use config::schema::ServerConfig;
pub use dispatch::{ConnectionHooks, ConnectionHooksFactory, InboundEvent, ServiceDispatcher};
pub use lifecycle::Shutdown;
pub use net::HttpServer;
pub use routing::RouteTable;
pub use service::{Service, ServiceError, ServiceFactory};
