//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request URI
//!     → router.rs (tiered lookup)
//!         1. exact raw URI (path + query)
//!         2. exact path
//!         3. directory prefix (lexicographic floor)
//!         4. regex, first registered full match
//!         5. default, else built-in 404
//!     → matcher.rs (anchored regex evaluation for tier 4)
//!     → Return: exactly one ServiceFactory
//!
//! Route Registration (at startup):
//!     register(kind, key, factory)
//!     → reject duplicate keys per kind
//!     → compile regex patterns
//!     → shared as Arc<RouteTable>, immutable afterwards
//! ```
//!
//! # Design Decisions
//! - Routes registered at startup, immutable at runtime (no locking)
//! - Deterministic: same table and URI always resolve the same factory
//! - "No match" is never an error; each tier falls through to the next

pub mod matcher;
pub mod router;

pub use matcher::PathPattern;
pub use router::{RouteError, RouteKind, RouteTable};
