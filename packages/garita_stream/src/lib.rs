//! Server-push channel client for the garita console.
//!
//! The server exposes long-lived SSE endpoints that announce state changes
//! (new access requests, company/user record edits). This crate owns the
//! client side of that wire: one persistent connection per (endpoint,
//! credential) pair, a registry of named-event handlers that can be swapped
//! without touching the connection, and a multiplexer that fans each inbound
//! envelope out to every handler registered for its event name.
//!
//! Consumers never see transport errors — connection loss is retried with
//! backoff inside the channel task, and malformed messages are logged and
//! skipped.

pub mod backoff;
pub mod channel;
pub mod dispatch;
pub mod error;
pub mod registry;
pub mod sse;
pub mod supervisor;

pub use backoff::Backoff;
pub use channel::{ChannelConfig, ChannelHandle, PushChannel, SseConnector, StreamConnector};
pub use error::StreamError;
pub use registry::{Handler, HandlerRegistry, SubscriptionId};
pub use sse::{RawEnvelope, SseDecoder};
pub use supervisor::ChannelSupervisor;
