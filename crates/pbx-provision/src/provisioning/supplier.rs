use std::collections::BTreeMap;

use super::model::{TenantId, TenantRecords};

/// Names another tenant already owns, delivered alongside a snapshot so the
/// validator can enforce system-wide uniqueness without touching storage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForeignIndex {
    pub dids: BTreeMap<String, TenantId>,
    pub domains: BTreeMap<String, TenantId>,
    pub contexts: BTreeMap<String, TenantId>,
    pub profiles: BTreeMap<String, TenantId>,
}

/// Storage abstraction so the orchestrator can be exercised in isolation.
///
/// The compiler never queries a persistent store directly; whatever backs
/// this trait owns entity lifecycle and hands out consistent snapshots.
pub trait RecordSupplier: Send + Sync {
    /// Full routing snapshot for one tenant.
    fn records(&self, tenant: &TenantId) -> Result<TenantRecords, SupplierError>;
    /// Cross-tenant uniqueness context, excluding the named tenant's own
    /// entries.
    fn foreign_index(&self, tenant: &TenantId) -> Result<ForeignIndex, SupplierError>;
    /// Tenants with mutations awaiting a compilation pass.
    fn pending_tenants(&self) -> Result<Vec<TenantId>, SupplierError>;
}

#[derive(Debug, thiserror::Error)]
pub enum SupplierError {
    #[error("tenant {0} not found")]
    TenantNotFound(TenantId),
    #[error("record store unavailable: {0}")]
    Unavailable(String),
}
