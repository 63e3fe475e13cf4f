//! Relay Models - Plain data types shared across the workspace.
//!
//! Wire-facing types use camelCase field names to match the server's JSON.

pub mod chat;
pub mod message;
pub mod user;

pub use chat::{ChatKey, ChatKind};
pub use message::{Message, MessageKind, MessageStatus, Reaction};
pub use user::{Session, User};
