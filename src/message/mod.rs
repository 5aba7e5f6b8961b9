//! HTTP message model exchanged between the transport and services.
//!
//! # Data Flow
//! ```text
//! Inbound (from transport):
//!     RequestWithoutBody (method, raw URI, headers, derived fields)
//!     → ContentBlock*        (streamed body pieces)
//!     → LastContentBlock     (terminal piece, optional trailers)
//!     → FullRequest          (head + aggregated body, buffered services only)
//!
//! Outbound (to transport):
//!     ResponseWithoutBody → ContentBlock* → LastContentBlock | BodyStream
//!     or FullResponse as one unit
//! ```
//!
//! # Design Decisions
//! - Derived request fields are computed once at construction
//! - Response headers are plain fields until send time
//! - Payloads are `Bytes`, so blocks move between tasks without copies

pub mod body;
pub mod content;
pub mod media;
pub mod request;
pub mod response;

pub use body::BodyStream;
pub use content::{ContentBlock, LastContentBlock};
pub use request::{FullRequest, RequestWithoutBody};
pub use response::{FullResponse, ResponseWithoutBody};
