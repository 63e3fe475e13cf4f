//! Relay API - HTTP client for the chat server REST API.
//!
//! Provides the [`ApiClient`] plus typed endpoint wrappers for
//! authentication, message history and CRUD operations, and directory
//! listings (conversations, rooms, contacts).

pub mod client;
pub mod endpoints;
pub mod response;

pub use client::{ApiClient, RetryConfig};
pub use response::{Page, PageLocation};
