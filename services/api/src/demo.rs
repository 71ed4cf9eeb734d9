use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;

use pbx_provision::config::AppConfig;
use pbx_provision::provisioning::{
    ArtifactPublisher, CommandEngineControl, Provisioner, ReloadController, TenantId,
};
use pbx_provision::AppError;

use crate::infra::seeded_supplier;

#[derive(Args, Debug)]
pub(crate) struct ProvisionArgs {
    /// Tenant to compile and publish.
    #[arg(long)]
    pub(crate) tenant: String,
    /// Write documents under this directory instead of the configured
    /// engine configuration root.
    #[arg(long)]
    pub(crate) output: Option<PathBuf>,
}

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Directory receiving the demo documents (default: ./demo-conf).
    #[arg(long)]
    pub(crate) output: Option<PathBuf>,
}

fn build_provisioner(
    config: &AppConfig,
    output: Option<PathBuf>,
) -> Provisioner<crate::infra::InMemoryRecordSupplier> {
    let root = output.unwrap_or_else(|| config.engine.config_root.clone());
    let engine = Arc::new(CommandEngineControl::new(
        config.engine.probe_command.clone(),
        config.engine.command_timeout,
    ));
    Provisioner::new(
        Arc::new(seeded_supplier()),
        ArtifactPublisher::new(root),
        ReloadController::new(engine, config.engine.reload_strategies.clone()),
    )
}

/// One-shot compilation pass for a single tenant, reported as JSON so the
/// output can feed scripts and runbooks.
pub(crate) async fn run_provision(args: ProvisionArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let provisioner = build_provisioner(&config, args.output);

    let outcome = provisioner.provision(&TenantId(args.tenant)).await;
    let rendered = serde_json::to_string_pretty(&outcome)
        .unwrap_or_else(|err| format!("{{\"error\":\"{err}\"}}"));
    println!("{rendered}");
    Ok(())
}

/// Walk both seed tenants through the full pipeline and narrate the result.
pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let output = args.output.unwrap_or_else(|| PathBuf::from("demo-conf"));
    println!("Tenant provisioning demo; documents land in {}", output.display());
    let provisioner = build_provisioner(&config, Some(output));

    for tenant in ["acme", "globex"] {
        let outcome = provisioner.provision(&TenantId(tenant.to_string())).await;
        println!("\ntenant {tenant}: {}", outcome.detail);
        for document in &outcome.documents {
            println!("  wrote {document}");
        }
        for violation in &outcome.violations {
            println!("  violation: {violation}");
        }
        if let Some(warning) = &outcome.warning {
            println!("  warning: {}", warning.detail);
            println!("  {}", warning.guidance);
        }
    }
    Ok(())
}
