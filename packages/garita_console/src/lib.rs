//! Headless console agent for the garita attendance/access-control server.
//!
//! The server owns all business logic; this client keeps three local state
//! slices reconciled against it in real time: the pending-request inbox, the
//! active-company cache, and the signed-in user's own record. Push events
//! (via `garita_stream`) are hints — each consumer folds them in either by
//! shallow-merging a delta or by triggering an authoritative REST refetch.

pub mod agent;
pub mod api;
pub mod config;
pub mod credentials;
pub mod models;
pub mod state;

pub use agent::ConsoleAgent;
pub use api::{ApiError, ConsoleApi, RequestKind, RestClient};
pub use config::Config;
