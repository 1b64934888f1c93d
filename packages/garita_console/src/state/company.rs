//! Active-company cache: conditional merge-or-refetch.
//!
//! The console tracks exactly one "active company" record. An
//! `empresa-actualizada` event whose payload is still active is a cheap
//! delta: shallow-merge it and skip the round trip. A payload that reports
//! the subject inactive must NOT be merged — the cached record would keep
//! stale "active" data under a new shape, and a *different* company may now
//! be the active one — so the cache refetches the authoritative answer
//! instead.

use std::sync::Arc;

use garita_stream::{HandlerRegistry, SubscriptionId};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::ConsoleApi;
use crate::models::{Empresa, EmpresaPatch};

use super::events;

pub struct CompanyCache {
    api: Arc<dyn ConsoleApi>,
    inner: RwLock<Option<Empresa>>,
    cancel: CancellationToken,
}

impl CompanyCache {
    pub fn new(api: Arc<dyn ConsoleApi>) -> Arc<Self> {
        Arc::new(Self {
            api,
            inner: RwLock::new(None),
            cancel: CancellationToken::new(),
        })
    }

    /// Authoritative refetch of whichever company is currently active. An
    /// empty result clears the cache (no company is active); a failed or
    /// rejected fetch leaves the previous record visible.
    pub async fn refetch(&self) {
        match self.api.active_companies().await {
            Ok(Some(companies)) => {
                if self.cancel.is_cancelled() {
                    return;
                }
                let active = companies.into_iter().next();
                info!(active = active.as_ref().map(|e| e.id), "company cache reconciled");
                *self.inner.write().await = active;
            }
            Ok(None) => debug!("company fetch rejected, keeping cache"),
            Err(err) => warn!(%err, "company refetch failed, keeping cache"),
        }
    }

    /// Initial population, shared with the inactive-event path.
    pub async fn load(&self) {
        self.refetch().await;
    }

    async fn apply(&self, patch: EmpresaPatch) {
        if self.cancel.is_cancelled() {
            return;
        }
        let mut guard = self.inner.write().await;
        match guard.as_mut() {
            Some(empresa) => {
                patch.apply_to(empresa);
                info!(id = empresa.id, "company cache merged event delta");
            }
            None => {
                // Nothing to merge onto; fall back to the authoritative path.
                drop(guard);
                self.refetch().await;
            }
        }
    }

    pub fn attach(self: &Arc<Self>, registry: &HandlerRegistry) -> SubscriptionId {
        let cache = Arc::clone(self);
        registry.subscribe(
            events::EMPRESA_ACTUALIZADA,
            Arc::new(move |payload| {
                let patch: EmpresaPatch = match serde_json::from_value(payload.clone()) {
                    Ok(patch) => patch,
                    Err(err) => {
                        warn!(%err, "unusable empresa-actualizada payload, ignoring");
                        return;
                    }
                };
                let cache = Arc::clone(&cache);
                if patch.es_activo == Some(false) {
                    tokio::spawn(async move { cache.refetch().await });
                } else {
                    tokio::spawn(async move { cache.apply(patch).await });
                }
            }),
        )
    }

    pub fn detach(&self) {
        self.cancel.cancel();
    }

    pub async fn active(&self) -> Option<Empresa> {
        self.inner.read().await.clone()
    }
}
