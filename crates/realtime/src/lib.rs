//! Real-time fan-out for the restaurant order service.
//!
//! This crate provides:
//! - Token-based connection identity with a guest fallback
//! - Room names and their join rules
//! - `RealtimeHub`, the `Broadcaster` backed by one broadcast channel per room
//! - `Session`, the per-connection join/leave state

pub mod error;
pub mod hub;
pub mod identity;
pub mod message;
pub mod room;
pub mod session;

pub use error::JoinError;
pub use hub::{DEFAULT_CHANNEL_CAPACITY, Frame, RealtimeHub};
pub use identity::{Claims, Identity, Role, TokenError, TokenVerifier, bearer_token};
pub use message::{ClientMessage, ServerMessage};
pub use session::Session;
