//! Wire types for the last-mile companion service.
//!
//! This crate contains the serde-serializable types exchanged with the
//! session, intent and stop services over REST, and the JSON frames carried
//! by the two push channels (process-wide notifications and per-session live
//! locations).
//!
//! # Design Philosophy
//!
//! Types in this crate are:
//! * Pure data: No behavior beyond serialization/deserialization and a few
//!   total accessors
//! * 1:1 with the wire: field names match the server's JSON (snake_case)
//! * Stable: Changes only when the service contract changes
//!
//! State-machine rules, reconciliation and presentation live in `lastmile-core`.

pub mod intent;
pub mod location;
pub mod notification;
pub mod session;
pub mod stop;

pub use intent::*;
pub use location::*;
pub use notification::*;
pub use session::*;
pub use stop::*;
