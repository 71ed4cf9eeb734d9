use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum_prometheus::PrometheusMetricLayer;
use tracing::info;

use pbx_provision::config::AppConfig;
use pbx_provision::provisioning::{
    ArtifactPublisher, CommandEngineControl, Provisioner, ReloadController,
};
use pbx_provision::telemetry;
use pbx_provision::AppError;

use crate::cli::ServeArgs;
use crate::infra::{seeded_supplier, AppState};
use crate::routes::router;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let engine = Arc::new(CommandEngineControl::new(
        config.engine.probe_command.clone(),
        config.engine.command_timeout,
    ));
    let reload = ReloadController::new(engine, config.engine.reload_strategies.clone());
    let provisioner = Arc::new(Provisioner::new(
        Arc::new(seeded_supplier()),
        ArtifactPublisher::new(config.engine.config_root.clone()),
        reload,
    ));

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
        provisioner,
    };

    let app = router(app_state).layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        config_root = %config.engine.config_root.display(),
        "provisioning service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
