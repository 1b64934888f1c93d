//! Wire types shared by the REST client and the reconciliation consumers.
//!
//! Patch types mirror their full counterparts with every field optional:
//! push events may carry partial records, and a shallow merge must only
//! overwrite the fields actually present.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Standard REST response envelope. `success: false` means "no update", not
/// an error condition.
#[derive(Debug, Clone, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(default)]
    pub data: Option<T>,
}

/// One pending access/device request surfaced to administrators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Solicitud {
    pub id: i64,
    pub nombre: String,
    #[serde(default)]
    pub contacto: Option<String>,
    pub tipo: String,
    pub estado: String,
    pub creado_en: DateTime<Utc>,
}

/// Status value for requests the inbox retains.
pub const ESTADO_PENDIENTE: &str = "pendiente";

/// The currently active company record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Empresa {
    pub id: i64,
    pub nombre: String,
    #[serde(default)]
    pub logo: Option<String>,
    pub es_activo: bool,
}

/// Partial company record carried by `empresa-actualizada` events.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmpresaPatch {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub nombre: Option<String>,
    #[serde(default)]
    pub logo: Option<String>,
    #[serde(default)]
    pub es_activo: Option<bool>,
}

impl EmpresaPatch {
    /// Shallow merge: fields present in the patch overwrite, absent fields
    /// keep their cached value.
    pub fn apply_to(&self, empresa: &mut Empresa) {
        if let Some(id) = self.id {
            empresa.id = id;
        }
        if let Some(nombre) = &self.nombre {
            empresa.nombre = nombre.clone();
        }
        if self.logo.is_some() {
            empresa.logo = self.logo.clone();
        }
        if let Some(es_activo) = self.es_activo {
            empresa.es_activo = es_activo;
        }
    }
}

/// The signed-in administrator's own record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Usuario {
    pub id: i64,
    pub nombre: String,
    #[serde(default)]
    pub correo: Option<String>,
    #[serde(default)]
    pub telefono: Option<String>,
}

/// Partial user record carried by `usuario-actualizado` events. `id` is the
/// subject identifier checked against the cached record before any merge.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UsuarioPatch {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub nombre: Option<String>,
    #[serde(default)]
    pub correo: Option<String>,
    #[serde(default)]
    pub telefono: Option<String>,
}

impl UsuarioPatch {
    pub fn apply_to(&self, usuario: &mut Usuario) {
        if let Some(nombre) = &self.nombre {
            usuario.nombre = nombre.clone();
        }
        if self.correo.is_some() {
            usuario.correo = self.correo.clone();
        }
        if self.telefono.is_some() {
            usuario.telefono = self.telefono.clone();
        }
    }
}
