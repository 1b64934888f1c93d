//! REST collaborator client.
//!
//! Reconciliation consumers only ever *read* through this interface — push
//! events are hints, the REST API is the source of truth. The trait seam
//! exists so consumers can be exercised against a mock.

use async_trait::async_trait;
use tracing::debug;

use crate::models::{ApiResponse, Empresa, Solicitud, Usuario};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("http transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server returned status {0}")]
    Status(u16),
}

/// Request category, as the `tipo` query parameter spells it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    Movil,
    Escritorio,
}

impl RequestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestKind::Movil => "movil",
            RequestKind::Escritorio => "escritorio",
        }
    }
}

/// Read-side REST contract the consumers depend on.
///
/// Every method returns `Ok(None)` when the server answered with
/// `success: false` — callers treat that as "no update", never as an error.
#[async_trait]
pub trait ConsoleApi: Send + Sync {
    /// `GET /api/solicitudes?tipo=<kind>&estado=pendiente`
    async fn pending_requests(&self, kind: RequestKind) -> Result<Option<Vec<Solicitud>>, ApiError>;

    /// `GET /api/empresas?es_activo=true`
    async fn active_companies(&self) -> Result<Option<Vec<Empresa>>, ApiError>;

    /// `GET /api/usuarios/yo` — the signed-in administrator's own record.
    async fn current_user(&self) -> Result<Option<Usuario>, ApiError>;
}

pub struct RestClient {
    client: reqwest::Client,
    base_url: String,
    credential: Option<String>,
}

impl RestClient {
    pub fn new(base_url: impl Into<String>, credential: Option<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            client: reqwest::Client::new(),
            base_url,
            credential,
        }
    }

    async fn get_envelope<T>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Option<T>, ApiError>
    where
        T: serde::de::DeserializeOwned,
    {
        let mut request = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .query(query);
        if let Some(token) = &self.credential {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status(status.as_u16()));
        }
        let envelope: ApiResponse<T> = response.json().await?;
        if !envelope.success {
            debug!(path, "server answered success=false, treating as no update");
            return Ok(None);
        }
        Ok(envelope.data)
    }
}

#[async_trait]
impl ConsoleApi for RestClient {
    async fn pending_requests(&self, kind: RequestKind) -> Result<Option<Vec<Solicitud>>, ApiError> {
        self.get_envelope(
            "/api/solicitudes",
            &[("tipo", kind.as_str()), ("estado", "pendiente")],
        )
        .await
    }

    async fn active_companies(&self) -> Result<Option<Vec<Empresa>>, ApiError> {
        self.get_envelope("/api/empresas", &[("es_activo", "true")])
            .await
    }

    async fn current_user(&self) -> Result<Option<Usuario>, ApiError> {
        self.get_envelope("/api/usuarios/yo", &[]).await
    }
}
