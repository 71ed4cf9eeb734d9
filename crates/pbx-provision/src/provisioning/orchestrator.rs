//! Sequences one compilation pass per tenant-mutation event:
//! load → validate → render → publish → activate.
//!
//! Passes for the same tenant are serialized through a per-tenant gate, and
//! a queued-but-unstarted pass is superseded when a newer event for that
//! tenant is already waiting, since only the latest snapshot is meaningful. An
//! in-flight pass always runs to completion. Passes for different tenants
//! run in parallel.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use super::model::TenantId;
use super::publish::ArtifactPublisher;
use super::reload::{ActivationOutcome, ReloadController};
use super::render;
use super::supplier::RecordSupplier;
use super::validate::{self, Violation};

/// Pipeline stage a result refers to, so the caller can show an accurate
/// message instead of a generic error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Load,
    Validate,
    Render,
    Publish,
    Reload,
}

impl Stage {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Load => "load",
            Self::Validate => "validate",
            Self::Render => "render",
            Self::Publish => "publish",
            Self::Reload => "reload",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    EngineUnreachable,
    ReloadRejected,
}

/// Non-fatal activation problem the operator must still see.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivationWarning {
    pub kind: WarningKind,
    pub detail: String,
    pub guidance: String,
}

/// Structured result of one compilation pass.
#[derive(Debug, Clone, Serialize)]
pub struct ProvisionOutcome {
    pub tenant: TenantId,
    pub stage: Stage,
    pub success: bool,
    pub detail: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub violations: Vec<Violation>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub documents: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<ActivationWarning>,
    pub completed_at: DateTime<Utc>,
}

impl ProvisionOutcome {
    fn failure(tenant: &TenantId, stage: Stage, detail: String) -> Self {
        Self {
            tenant: tenant.clone(),
            stage,
            success: false,
            detail,
            violations: Vec::new(),
            documents: Vec::new(),
            warning: None,
            completed_at: Utc::now(),
        }
    }
}

/// How a mutation event was handled.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case", tag = "disposition")]
pub enum MutationDisposition {
    Completed(ProvisionOutcome),
    /// A newer event for the same tenant was already queued; this one was
    /// dropped before it started.
    Superseded,
}

#[derive(Default)]
struct TenantGate {
    lock: tokio::sync::Mutex<()>,
    epoch: AtomicU64,
}

pub struct Provisioner<S> {
    supplier: Arc<S>,
    publisher: ArtifactPublisher,
    reload: ReloadController,
    gates: Mutex<HashMap<TenantId, Arc<TenantGate>>>,
}

impl<S> Provisioner<S>
where
    S: RecordSupplier + 'static,
{
    pub fn new(supplier: Arc<S>, publisher: ArtifactPublisher, reload: ReloadController) -> Self {
        Self {
            supplier,
            publisher,
            reload,
            gates: Mutex::new(HashMap::new()),
        }
    }

    pub fn supplier(&self) -> &Arc<S> {
        &self.supplier
    }

    /// Entry point for the at-least-once mutation event channel.
    ///
    /// Duplicate events are safe: re-running a pass for an unchanged
    /// snapshot reproduces identical documents.
    pub async fn handle_mutation(&self, tenant: &TenantId) -> MutationDisposition {
        let gate = self.gate(tenant);
        let ticket = gate.epoch.fetch_add(1, Ordering::SeqCst) + 1;

        let _serialized = gate.lock.lock().await;
        if gate.epoch.load(Ordering::SeqCst) > ticket {
            info!(tenant = %tenant, "compilation pass superseded by a newer mutation");
            return MutationDisposition::Superseded;
        }
        MutationDisposition::Completed(self.provision(tenant).await)
    }

    /// Run one full compilation pass, short-circuiting on the first failing
    /// stage. Callers needing per-tenant serialization go through
    /// [`Self::handle_mutation`].
    pub async fn provision(&self, tenant: &TenantId) -> ProvisionOutcome {
        let records = match self.supplier.records(tenant) {
            Ok(records) => records,
            Err(err) => {
                return ProvisionOutcome::failure(
                    tenant,
                    Stage::Load,
                    format!("record supplier failed: {err}"),
                )
            }
        };
        let foreign = match self.supplier.foreign_index(tenant) {
            Ok(foreign) => foreign,
            Err(err) => {
                return ProvisionOutcome::failure(
                    tenant,
                    Stage::Load,
                    format!("record supplier failed: {err}"),
                )
            }
        };

        let validated = match validate::validate(records, &foreign) {
            Ok(validated) => validated,
            Err(violations) => {
                info!(tenant = %tenant, count = violations.len(), "configuration invalid");
                let detail = format!(
                    "configuration invalid: {} violation(s); nothing was written",
                    violations.len()
                );
                return ProvisionOutcome {
                    violations,
                    ..ProvisionOutcome::failure(tenant, Stage::Validate, detail)
                };
            }
        };

        let documents = match render::render(&validated) {
            Ok(documents) => documents,
            Err(err) => {
                // Should not happen for a validated snapshot; surfaced
                // verbatim as an internal defect.
                warn!(tenant = %tenant, error = %err, "render failed on validated snapshot");
                return ProvisionOutcome::failure(tenant, Stage::Render, err.to_string());
            }
        };

        let receipt = match self.publisher.publish(&documents) {
            Ok(receipt) => receipt,
            Err(err) => {
                warn!(tenant = %tenant, error = %err, "publish failed; previous documents retained");
                return ProvisionOutcome::failure(
                    tenant,
                    Stage::Publish,
                    format!("{err}; previous documents retained, safe to retry"),
                );
            }
        };
        let written: Vec<String> = receipt
            .written
            .iter()
            .map(|path| path.display().to_string())
            .collect();

        let (detail, warning) = match self.reload.activate().await {
            ActivationOutcome::Reloaded { strategy } => {
                (format!("documents published and activated via '{strategy}'"), None)
            }
            ActivationOutcome::PendingActivation { reason } => (
                "documents published; activation deferred".to_string(),
                Some(ActivationWarning {
                    kind: WarningKind::EngineUnreachable,
                    detail: reason,
                    guidance: "documents are in place and will be adopted at the next \
                               engine start; re-run provisioning to retry activation"
                        .to_string(),
                }),
            ),
            ActivationOutcome::Failed { attempts } => {
                let detail = attempts
                    .iter()
                    .map(|attempt| format!("{}: {}", attempt.strategy, attempt.error))
                    .collect::<Vec<_>>()
                    .join("; ");
                (
                    "documents published but the engine did not reload".to_string(),
                    Some(ActivationWarning {
                        kind: WarningKind::ReloadRejected,
                        detail,
                        guidance: "documents are published but not yet active; retry \
                                   provisioning or reload the engine manually"
                            .to_string(),
                    }),
                )
            }
        };

        info!(tenant = %tenant, documents = written.len(), warning = warning.is_some(), "compilation pass complete");
        ProvisionOutcome {
            tenant: tenant.clone(),
            stage: Stage::Reload,
            success: true,
            detail,
            violations: Vec::new(),
            documents: written,
            warning,
            completed_at: Utc::now(),
        }
    }

    fn gate(&self, tenant: &TenantId) -> Arc<TenantGate> {
        let mut gates = self.gates.lock().expect("gate mutex poisoned");
        gates.entry(tenant.clone()).or_default().clone()
    }
}
