//! Error types for the push channel client.
//!
//! All of these stay inside the channel task: transport failures feed the
//! reconnect loop and are never surfaced to subscribers.

#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("http transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("stream endpoint returned status {0}")]
    Status(u16),
}
