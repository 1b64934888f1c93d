//! Connection supervision keyed on value equality, not handler identity.
//!
//! Consumers swap handler closures constantly (every state refresh produces a
//! logically identical but freshly allocated closure). Reconnecting on each
//! swap would lose events during the reconnect window, so the supervisor
//! derives a key from the things that actually warrant a new connection —
//! the credential and the *set* of subscribed event names — and only tears
//! down and reopens when that key changes. Handler churn goes through
//! [`HandlerRegistry::replace`] and never touches the connection.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use tracing::info;

use crate::channel::{ChannelConfig, ChannelHandle, PushChannel, StreamConnector};
use crate::registry::HandlerRegistry;

#[derive(Debug, Clone, PartialEq, Eq)]
struct ChannelKey {
    credential: String,
    events: BTreeSet<String>,
}

pub struct ChannelSupervisor {
    connector: Arc<dyn StreamConnector>,
    registry: Arc<HandlerRegistry>,
    endpoint: String,
    config: ChannelConfig,
    current: Mutex<Option<(ChannelKey, ChannelHandle)>>,
}

impl ChannelSupervisor {
    pub fn new(
        connector: Arc<dyn StreamConnector>,
        registry: Arc<HandlerRegistry>,
        endpoint: impl Into<String>,
        config: ChannelConfig,
    ) -> Self {
        Self {
            connector,
            registry,
            endpoint: endpoint.into(),
            config,
            current: Mutex::new(None),
        }
    }

    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        &self.registry
    }

    /// Reconcile the connection with the current credential and the
    /// registry's event-name set.
    ///
    /// - Same key as the open connection: no-op, the connection stays up.
    /// - Different key: close the old connection, open one with the new key.
    /// - Missing/empty credential: close and stay offline until a credential
    ///   shows up on a later call.
    ///
    /// An empty event-name set with a valid credential keeps (or opens) a
    /// connection with zero listeners; only `close` or a key change tears it
    /// down.
    pub fn ensure(&self, credential: Option<&str>) {
        let credential = credential.unwrap_or("").trim();
        let desired = (!credential.is_empty()).then(|| ChannelKey {
            credential: credential.to_string(),
            events: self.registry.event_names(),
        });

        let mut guard = self.current.lock().unwrap_or_else(|e| e.into_inner());
        if let (Some((key, _)), Some(want)) = (guard.as_ref(), desired.as_ref()) {
            if key == want {
                return;
            }
        }
        if guard.is_none() && desired.is_none() {
            return;
        }

        if let Some((key, handle)) = guard.take() {
            info!(endpoint = %self.endpoint, events = ?key.events, "closing push channel");
            handle.close();
        }
        if let Some(key) = desired {
            let handle = PushChannel::open(
                Arc::clone(&self.connector),
                &self.endpoint,
                &key.credential,
                Arc::clone(&self.registry),
                self.config.clone(),
            );
            if let Some(handle) = handle {
                info!(endpoint = %self.endpoint, events = ?key.events, "opened push channel");
                *guard = Some((key, handle));
            }
        }
    }

    pub fn is_open(&self) -> bool {
        self.current
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    /// Close the connection if one is open. Idempotent.
    pub fn close(&self) {
        if let Some((_, handle)) = self
            .current
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            info!(endpoint = %self.endpoint, "closing push channel");
            handle.close();
        }
    }
}

impl Drop for ChannelSupervisor {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ByteStream;
    use crate::error::StreamError;
    use async_trait::async_trait;
    use futures::StreamExt;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Counts connect calls; every connection just hangs open.
    #[derive(Default)]
    struct CountingConnector {
        connects: AtomicUsize,
    }

    #[async_trait]
    impl StreamConnector for CountingConnector {
        async fn connect(&self, _: &str, _: &str) -> Result<ByteStream, StreamError> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            Ok(futures::stream::pending().boxed())
        }
    }

    fn fast() -> ChannelConfig {
        ChannelConfig {
            backoff_base: Duration::from_millis(5),
            backoff_cap: Duration::from_millis(20),
        }
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(30)).await;
    }

    #[tokio::test]
    async fn handler_churn_does_not_reconnect() {
        let connector = Arc::new(CountingConnector::default());
        let registry = HandlerRegistry::new();
        let id = registry.subscribe("usuario-actualizado", Arc::new(|_| {}));
        let supervisor = ChannelSupervisor::new(
            Arc::clone(&connector) as Arc<dyn StreamConnector>,
            Arc::clone(&registry),
            "http://x/api/stream",
            fast(),
        );

        supervisor.ensure(Some("tok"));
        settle().await;
        assert_eq!(connector.connects.load(Ordering::SeqCst), 1);

        // Many "re-renders": fresh closures, same name set.
        for _ in 0..10 {
            registry.replace(&id, Arc::new(|_| {}));
            supervisor.ensure(Some("tok"));
        }
        settle().await;
        assert_eq!(connector.connects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn name_set_change_reopens_exactly_once() {
        let connector = Arc::new(CountingConnector::default());
        let registry = HandlerRegistry::new();
        registry.subscribe("empresa-actualizada", Arc::new(|_| {}));
        let supervisor = ChannelSupervisor::new(
            Arc::clone(&connector) as Arc<dyn StreamConnector>,
            Arc::clone(&registry),
            "http://x/api/stream",
            fast(),
        );

        supervisor.ensure(Some("tok"));
        settle().await;
        assert_eq!(connector.connects.load(Ordering::SeqCst), 1);

        registry.subscribe("usuario-actualizado", Arc::new(|_| {}));
        supervisor.ensure(Some("tok"));
        supervisor.ensure(Some("tok"));
        settle().await;
        assert_eq!(connector.connects.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn credential_change_reopens_and_loss_closes() {
        let connector = Arc::new(CountingConnector::default());
        let registry = HandlerRegistry::new();
        registry.subscribe("ping", Arc::new(|_| {}));
        let supervisor = ChannelSupervisor::new(
            Arc::clone(&connector) as Arc<dyn StreamConnector>,
            registry,
            "http://x/api/stream",
            fast(),
        );

        supervisor.ensure(None);
        settle().await;
        assert!(!supervisor.is_open());
        assert_eq!(connector.connects.load(Ordering::SeqCst), 0);

        supervisor.ensure(Some("first"));
        settle().await;
        assert!(supervisor.is_open());
        supervisor.ensure(Some("second"));
        settle().await;
        assert_eq!(connector.connects.load(Ordering::SeqCst), 2);

        supervisor.ensure(None);
        assert!(!supervisor.is_open());
    }

    #[tokio::test]
    async fn close_twice_is_harmless() {
        let connector = Arc::new(CountingConnector::default());
        let registry = HandlerRegistry::new();
        registry.subscribe("ping", Arc::new(|_| {}));
        let supervisor = ChannelSupervisor::new(
            Arc::clone(&connector) as Arc<dyn StreamConnector>,
            registry,
            "http://x/api/stream",
            fast(),
        );
        supervisor.ensure(Some("tok"));
        settle().await;
        supervisor.close();
        supervisor.close();
        assert!(!supervisor.is_open());
    }
}
