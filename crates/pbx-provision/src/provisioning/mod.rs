//! The configuration compiler: tenant routing records in, engine
//! configuration documents out, activation on top.

pub mod model;
pub mod orchestrator;
pub mod publish;
pub mod reload;
pub mod render;
pub mod supplier;
pub mod validate;

#[cfg(test)]
mod tests;

pub use model::{
    DialPattern, Extension, ExtensionRange, InboundRoute, IvrFlow, IvrNode, IvrNodeKind,
    MenuBranch, OutboundRule, RingGroup, RingStrategy, RouteTarget, Tenant, TenantId,
    TenantRecords, TimeoutAction, Transport, Trunk,
};
pub use orchestrator::{
    ActivationWarning, MutationDisposition, ProvisionOutcome, Provisioner, Stage, WarningKind,
};
pub use publish::{ArtifactPublisher, PublishError, PublishReceipt};
pub use reload::{
    ActivationOutcome, CommandEngineControl, EngineControl, EngineControlError, ReloadController,
    ReloadPhase, ReloadStrategy, StrategyAttempt,
};
pub use render::{render, RenderError, RenderedDocument};
pub use supplier::{ForeignIndex, RecordSupplier, SupplierError};
pub use validate::{validate, EntityKind, EntityRef, ReasonCode, ValidatedRecords, Violation};
