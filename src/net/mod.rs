//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, connection limits)
//!     → connection.rs (id, lifecycle tracking)
//!     → server.rs (hyper HTTP/1.1, inbound events to the dispatcher)
//!     → transport.rs (dispatcher sends back into hyper)
//! ```
//!
//! # Design Decisions
//! - Bounded accept queue prevents resource exhaustion
//! - Each connection tracked for graceful shutdown
//! - The dispatch core never sees hyper types; only this layer does

pub mod connection;
pub mod listener;
pub mod server;
pub mod transport;

pub use connection::{ConnectionId, ConnectionTracker};
pub use listener::{Listener, ListenerError};
pub use server::HttpServer;
pub use transport::{ExchangeSlot, HyperTransport};
