//! Pending-request inbox: refetch-on-any-signal.
//!
//! Push events about requests carry partial payloads and may race a
//! reconnect, so they are never merged directly. Any `nueva-solicitud` or
//! `solicitud-actualizada` event invalidates the whole cached list and
//! triggers a refetch of both request categories. The refetch is *silent*
//! (loading flag untouched) when event-triggered; the initial load is not.

use std::sync::Arc;

use garita_stream::{HandlerRegistry, SubscriptionId};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::api::{ConsoleApi, RequestKind};
use crate::models::{ESTADO_PENDIENTE, Solicitud};

use super::events;

#[derive(Default)]
struct InboxState {
    items: Vec<Solicitud>,
    loading: bool,
}

pub struct NotificationInbox {
    api: Arc<dyn ConsoleApi>,
    inner: RwLock<InboxState>,
    cancel: CancellationToken,
}

impl NotificationInbox {
    pub fn new(api: Arc<dyn ConsoleApi>) -> Arc<Self> {
        Arc::new(Self {
            api,
            inner: RwLock::new(InboxState::default()),
            cancel: CancellationToken::new(),
        })
    }

    /// Initial population: same fetch as the event path, but with a
    /// user-visible loading flag.
    pub async fn load(&self) {
        self.refresh(false).await;
    }

    /// Refetch both categories and atomically replace the cached list.
    ///
    /// On any fetch failure the previous list stays visible — a transient
    /// server hiccup must not flash an empty inbox.
    pub async fn refresh(&self, silent: bool) {
        if self.cancel.is_cancelled() {
            return;
        }
        if !silent {
            self.inner.write().await.loading = true;
        }

        let fetched = self.fetch_pending().await;
        if self.cancel.is_cancelled() {
            return;
        }

        let mut guard = self.inner.write().await;
        if !silent {
            guard.loading = false;
        }
        match fetched {
            Some(mut items) => {
                // The query already filters server-side; keep the server as
                // source of truth anyway and drop anything not pending.
                items.retain(|item| item.estado == ESTADO_PENDIENTE);
                items.sort_by(|a, b| b.creado_en.cmp(&a.creado_en));
                info!(count = items.len(), silent, "inbox reconciled");
                guard.items = items;
            }
            None => {
                warn!("inbox refetch failed, keeping previous list");
            }
        }
    }

    /// Both categories must succeed for the replacement to be authoritative;
    /// otherwise report "no update".
    async fn fetch_pending(&self) -> Option<Vec<Solicitud>> {
        let mut all = Vec::new();
        for kind in [RequestKind::Movil, RequestKind::Escritorio] {
            match self.api.pending_requests(kind).await {
                Ok(Some(items)) => all.extend(items),
                Ok(None) => return None,
                Err(err) => {
                    warn!(kind = kind.as_str(), %err, "pending request fetch failed");
                    return None;
                }
            }
        }
        Some(all)
    }

    /// Register for both request events. Handlers only treat the event as a
    /// signal: the payload is discarded and a silent refetch is spawned.
    pub fn attach(self: &Arc<Self>, registry: &HandlerRegistry) -> Vec<SubscriptionId> {
        [events::NUEVA_SOLICITUD, events::SOLICITUD_ACTUALIZADA]
            .into_iter()
            .map(|event| {
                let inbox = Arc::clone(self);
                registry.subscribe(
                    event,
                    Arc::new(move |_payload| {
                        let inbox = Arc::clone(&inbox);
                        tokio::spawn(async move {
                            inbox.refresh(true).await;
                        });
                    }),
                )
            })
            .collect()
    }

    /// Stop reacting: in-flight refetches finish but their results are
    /// dropped instead of mutating detached state.
    pub fn detach(&self) {
        self.cancel.cancel();
    }

    pub async fn items(&self) -> Vec<Solicitud> {
        self.inner.read().await.items.clone()
    }

    /// Unread counter shown next to the bell icon: every retained item is
    /// pending, so it is simply the list length.
    pub async fn unread(&self) -> usize {
        self.inner.read().await.items.len()
    }

    pub async fn is_loading(&self) -> bool {
        self.inner.read().await.loading
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiError;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    fn solicitud(id: i64, estado: &str, ts: i64) -> Solicitud {
        Solicitud {
            id,
            nombre: format!("visitante-{id}"),
            contacto: None,
            tipo: "movil".to_string(),
            estado: estado.to_string(),
            creado_en: Utc.timestamp_opt(ts, 0).unwrap(),
        }
    }

    struct MockApi {
        movil: Mutex<Vec<Solicitud>>,
        escritorio: Mutex<Vec<Solicitud>>,
        fail: AtomicBool,
        delay: Option<Duration>,
    }

    impl MockApi {
        fn new(movil: Vec<Solicitud>, escritorio: Vec<Solicitud>) -> Arc<Self> {
            Arc::new(Self {
                movil: Mutex::new(movil),
                escritorio: Mutex::new(escritorio),
                fail: AtomicBool::new(false),
                delay: None,
            })
        }
    }

    #[async_trait]
    impl ConsoleApi for MockApi {
        async fn pending_requests(
            &self,
            kind: RequestKind,
        ) -> Result<Option<Vec<Solicitud>>, ApiError> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail.load(Ordering::SeqCst) {
                return Err(ApiError::Status(502));
            }
            let items = match kind {
                RequestKind::Movil => self.movil.lock().unwrap().clone(),
                RequestKind::Escritorio => self.escritorio.lock().unwrap().clone(),
            };
            Ok(Some(items))
        }

        async fn active_companies(&self) -> Result<Option<Vec<crate::models::Empresa>>, ApiError> {
            Ok(None)
        }

        async fn current_user(&self) -> Result<Option<crate::models::Usuario>, ApiError> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn load_concatenates_filters_and_sorts_descending() {
        let api = MockApi::new(
            vec![solicitud(2, "pendiente", 200), solicitud(3, "aprobada", 300)],
            vec![solicitud(1, "pendiente", 100)],
        );
        let inbox = NotificationInbox::new(api);
        inbox.load().await;

        let items = inbox.items().await;
        let ids: Vec<i64> = items.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![2, 1]);
        assert_eq!(inbox.unread().await, 2);
        assert!(!inbox.is_loading().await);
    }

    #[tokio::test]
    async fn fetch_failure_keeps_previous_list() {
        let api = MockApi::new(vec![solicitud(1, "pendiente", 100)], vec![]);
        let inbox = NotificationInbox::new(Arc::clone(&api) as Arc<dyn ConsoleApi>);
        inbox.load().await;
        assert_eq!(inbox.unread().await, 1);

        api.fail.store(true, Ordering::SeqCst);
        inbox.refresh(true).await;
        assert_eq!(inbox.unread().await, 1);
    }

    #[tokio::test]
    async fn silent_refresh_never_touches_loading_flag() {
        let api = Arc::new(MockApi {
            movil: Mutex::new(vec![solicitud(1, "pendiente", 100)]),
            escritorio: Mutex::new(vec![]),
            fail: AtomicBool::new(false),
            delay: Some(Duration::from_millis(150)),
        });
        let inbox = NotificationInbox::new(Arc::clone(&api) as Arc<dyn ConsoleApi>);

        let silent = {
            let inbox = Arc::clone(&inbox);
            tokio::spawn(async move { inbox.refresh(true).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!inbox.is_loading().await);
        silent.await.unwrap();

        let visible = {
            let inbox = Arc::clone(&inbox);
            tokio::spawn(async move { inbox.load().await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(inbox.is_loading().await);
        visible.await.unwrap();
        assert!(!inbox.is_loading().await);
    }

    #[tokio::test]
    async fn event_signal_triggers_silent_refetch_through_registry() {
        let api = MockApi::new(vec![solicitud(42, "pendiente", 500)], vec![]);
        let inbox = NotificationInbox::new(Arc::clone(&api) as Arc<dyn ConsoleApi>);
        let registry = HandlerRegistry::new();
        let _subs = inbox.attach(&registry);

        registry.dispatch(
            events::NUEVA_SOLICITUD,
            &json!({"id": 42, "estado": "pendiente"}),
        );

        for _ in 0..100 {
            if inbox.unread().await == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        let items = inbox.items().await;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, 42);
        assert!(!inbox.is_loading().await);
    }

    #[tokio::test]
    async fn detached_inbox_ignores_late_results() {
        let api = MockApi::new(vec![solicitud(1, "pendiente", 100)], vec![]);
        let inbox = NotificationInbox::new(Arc::clone(&api) as Arc<dyn ConsoleApi>);
        inbox.load().await;
        assert_eq!(inbox.unread().await, 1);

        inbox.detach();
        api.movil.lock().unwrap().push(solicitud(2, "pendiente", 200));
        inbox.refresh(true).await;
        assert_eq!(inbox.unread().await, 1);
    }
}
