//! Response protocol subsystem.
//!
//! # Data Flow
//! ```text
//! Service calls a send operation on its Connection
//!     → state.rs (ResponseProtocol checks and advances the state)
//!     → transport.rs (Transport performs the non-blocking send)
//!     → SendHandle returned to the service
//!
//! Response States (per request cycle):
//!     Initial → HeaderSent → Completed
//!     Initial ──────────────→ Completed   (full response)
//! ```
//!
//! # Design Decisions
//! - The state machine is the single source of truth for wire ordering
//! - A rejected send leaves the state untouched and reaches no transport
//! - Forced full responses bypass the check; they exist for error recovery
//! - Sends never block; completion is observed through the returned handle

pub mod connection;
pub mod state;
pub mod transport;

pub use connection::Connection;
pub use state::{ProtocolViolation, ResponseProtocol, ResponseState, SendOp};
pub use transport::{SendError, SendHandle, Transport};
