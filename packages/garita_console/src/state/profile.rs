//! Signed-in user record: merge-on-signal with an identity guard.
//!
//! A `usuario-actualizado` event is only about *some* user; the cache holds
//! exactly one. Events whose subject id does not equal the cached id are
//! ignored outright — no fuzzy matching. Matching events shallow-merge and
//! the merged record is written back to disk so it survives a restart.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use garita_stream::{HandlerRegistry, SubscriptionId};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::models::{Usuario, UsuarioPatch};

use super::events;

pub struct ProfileCache {
    store_path: PathBuf,
    inner: RwLock<Option<Usuario>>,
    cancel: CancellationToken,
}

impl ProfileCache {
    /// Open the cache, restoring the persisted record if one exists. A
    /// corrupt or missing file just means an empty cache.
    pub fn open(store_path: impl Into<PathBuf>) -> Arc<Self> {
        let store_path = store_path.into();
        let restored = read_record(&store_path);
        if let Some(user) = &restored {
            debug!(id = user.id, "restored persisted user record");
        }
        Arc::new(Self {
            store_path,
            inner: RwLock::new(restored),
            cancel: CancellationToken::new(),
        })
    }

    /// Replace the cached record wholesale (initial REST load) and persist.
    pub async fn set(&self, user: Usuario) {
        if self.cancel.is_cancelled() {
            return;
        }
        self.persist(&user);
        *self.inner.write().await = Some(user);
    }

    async fn apply(&self, patch: UsuarioPatch) {
        if self.cancel.is_cancelled() {
            return;
        }
        let mut guard = self.inner.write().await;
        let Some(user) = guard.as_mut() else {
            debug!("no user record loaded, ignoring event");
            return;
        };
        let Some(subject) = patch.id else {
            debug!("usuario-actualizado without subject id, ignoring");
            return;
        };
        if subject != user.id {
            debug!(subject, cached = user.id, "subject id mismatch, ignoring");
            return;
        }
        patch.apply_to(user);
        info!(id = user.id, "user record merged event delta");
        let snapshot = user.clone();
        drop(guard);
        self.persist(&snapshot);
    }

    pub fn attach(self: &Arc<Self>, registry: &HandlerRegistry) -> SubscriptionId {
        let cache = Arc::clone(self);
        registry.subscribe(
            events::USUARIO_ACTUALIZADO,
            Arc::new(move |payload| {
                let patch: UsuarioPatch = match serde_json::from_value(payload.clone()) {
                    Ok(patch) => patch,
                    Err(err) => {
                        warn!(%err, "unusable usuario-actualizado payload, ignoring");
                        return;
                    }
                };
                let cache = Arc::clone(&cache);
                tokio::spawn(async move { cache.apply(patch).await });
            }),
        )
    }

    pub fn detach(&self) {
        self.cancel.cancel();
    }

    pub async fn user(&self) -> Option<Usuario> {
        self.inner.read().await.clone()
    }

    /// Atomic write: temp file in the same directory, then rename, so a
    /// crash mid-write never leaves a truncated record. Persist failures are
    /// logged; the in-memory record stays correct regardless.
    fn persist(&self, user: &Usuario) {
        let result = (|| -> std::io::Result<()> {
            if let Some(parent) = self.store_path.parent() {
                fs::create_dir_all(parent)?;
            }
            let tmp = self.store_path.with_extension("json.tmp");
            let body = serde_json::to_vec_pretty(user)?;
            fs::write(&tmp, body)?;
            fs::rename(&tmp, &self.store_path)
        })();
        if let Err(err) = result {
            warn!(path = %self.store_path.display(), %err, "failed to persist user record");
        }
    }
}

fn read_record(path: &Path) -> Option<Usuario> {
    let raw = fs::read(path).ok()?;
    match serde_json::from_slice(&raw) {
        Ok(user) => Some(user),
        Err(err) => {
            warn!(path = %path.display(), %err, "ignoring unreadable user record");
            None
        }
    }
}
