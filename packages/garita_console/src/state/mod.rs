//! Domain reconciliation consumers.
//!
//! Each consumer owns one state slice and one reconciliation strategy:
//!
//! - [`profile`] — merge-on-signal with an identity guard, persisted to disk;
//! - [`company`] — shallow-merge while the subject stays active, full refetch
//!   the moment it goes inactive;
//! - [`inbox`] — any request event invalidates the whole cached list and
//!   triggers a silent refetch.
//!
//! Handlers registered by consumers are synchronous and cheap: they spawn the
//! actual reconciliation as a fire-and-forget task. A detached consumer
//! ignores late task results instead of mutating dead state.

pub mod company;
pub mod inbox;
pub mod profile;

pub use company::CompanyCache;
pub use inbox::NotificationInbox;
pub use profile::ProfileCache;

/// Event names the server tags its push messages with.
pub mod events {
    pub const NUEVA_SOLICITUD: &str = "nueva-solicitud";
    pub const SOLICITUD_ACTUALIZADA: &str = "solicitud-actualizada";
    pub const EMPRESA_ACTUALIZADA: &str = "empresa-actualizada";
    pub const USUARIO_ACTUALIZADO: &str = "usuario-actualizado";
}
