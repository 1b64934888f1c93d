//! Push channel client: one long-lived server-push connection per
//! (endpoint, credential) pair.
//!
//! The channel task owns the connection for its whole life: connect, decode,
//! dispatch, and reconnect with backoff on any transport failure. Subscribers
//! never observe transport errors; the only externally visible lifecycle is
//! `open` / `close`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::backoff::Backoff;
use crate::dispatch::dispatch_envelope;
use crate::error::StreamError;
use crate::registry::HandlerRegistry;
use crate::sse::SseDecoder;

pub type ByteStream = BoxStream<'static, Result<Bytes, StreamError>>;

/// Transport seam: produces one raw byte stream per connection attempt.
///
/// The production implementation is [`SseConnector`]; tests script their own.
#[async_trait]
pub trait StreamConnector: Send + Sync {
    async fn connect(&self, endpoint: &str, credential: &str) -> Result<ByteStream, StreamError>;
}

/// HTTP implementation over reqwest. The credential travels as a `token`
/// query parameter: the stream endpoint does not accept custom headers.
pub struct SseConnector {
    client: reqwest::Client,
}

impl SseConnector {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for SseConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StreamConnector for SseConnector {
    async fn connect(&self, endpoint: &str, credential: &str) -> Result<ByteStream, StreamError> {
        let response = self
            .client
            .get(endpoint)
            .query(&[("token", credential)])
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(StreamError::Status(status.as_u16()));
        }
        Ok(response.bytes_stream().map_err(StreamError::from).boxed())
    }
}

/// Reconnect pacing knobs.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    pub backoff_base: Duration,
    pub backoff_cap: Duration,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            backoff_base: Duration::from_secs(1),
            backoff_cap: Duration::from_secs(30),
        }
    }
}

pub struct PushChannel;

impl PushChannel {
    /// Open a channel to `endpoint` authenticated by `credential`.
    ///
    /// Returns `None` when the credential is empty: "not authenticated yet"
    /// is a deliberate no-op state, not an error, and no anonymous connection
    /// attempt is ever made.
    pub fn open(
        connector: Arc<dyn StreamConnector>,
        endpoint: &str,
        credential: &str,
        registry: Arc<HandlerRegistry>,
        config: ChannelConfig,
    ) -> Option<ChannelHandle> {
        if credential.trim().is_empty() {
            debug!(endpoint, "no credential, suppressing connection attempt");
            return None;
        }
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_channel(
            connector,
            endpoint.to_string(),
            credential.trim().to_string(),
            registry,
            cancel.clone(),
            config,
        ));
        Some(ChannelHandle { cancel, task })
    }
}

/// Owner's handle to an open channel. Closing is idempotent and stops
/// dispatch synchronously: the channel task checks the token before every
/// envelope it would deliver.
pub struct ChannelHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl ChannelHandle {
    pub fn close(&self) {
        self.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Drop for ChannelHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.task.abort();
    }
}

async fn run_channel(
    connector: Arc<dyn StreamConnector>,
    endpoint: String,
    credential: String,
    registry: Arc<HandlerRegistry>,
    cancel: CancellationToken,
    config: ChannelConfig,
) {
    let mut backoff = Backoff::new(config.backoff_base, config.backoff_cap);
    let mut decoder = SseDecoder::new();

    loop {
        if cancel.is_cancelled() {
            break;
        }
        decoder.reset();

        let connected = tokio::select! {
            _ = cancel.cancelled() => break,
            result = connector.connect(&endpoint, &credential) => result,
        };

        match connected {
            Ok(mut stream) => {
                debug!(endpoint = %endpoint, "push channel connected");
                backoff.reset();
                loop {
                    let chunk = tokio::select! {
                        _ = cancel.cancelled() => return,
                        chunk = stream.next() => chunk,
                    };
                    match chunk {
                        Some(Ok(bytes)) => {
                            for envelope in decoder.push(&bytes) {
                                if cancel.is_cancelled() {
                                    return;
                                }
                                dispatch_envelope(&registry, &envelope);
                            }
                        }
                        Some(Err(err)) => {
                            debug!(endpoint = %endpoint, %err, "stream error, will reconnect");
                            break;
                        }
                        None => {
                            debug!(endpoint = %endpoint, "stream ended, will reconnect");
                            break;
                        }
                    }
                }
            }
            Err(err) => {
                debug!(endpoint = %endpoint, %err, "connect failed, will retry");
            }
        }

        let delay = backoff.next_delay();
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }
    }
    debug!(endpoint = %endpoint, "push channel closed");
}
