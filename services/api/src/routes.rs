use axum::extract::Path;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use serde::Serialize;
use serde_json::json;

use pbx_provision::provisioning::{MutationDisposition, RecordSupplier, Stage, TenantId};
use pbx_provision::AppError;

use crate::infra::AppState;

pub(crate) fn router(state: AppState) -> axum::Router {
    axum::Router::new()
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .route("/api/v1/tenants", axum::routing::get(list_tenants_endpoint))
        .route(
            "/api/v1/tenants/:tenant_id/provision",
            axum::routing::post(provision_endpoint),
        )
        .layer(Extension(state))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

#[derive(Debug, Serialize)]
pub(crate) struct TenantSummary {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) domain: String,
}

pub(crate) async fn list_tenants_endpoint(
    Extension(state): Extension<AppState>,
) -> Result<Json<Vec<TenantSummary>>, AppError> {
    let supplier = state.provisioner.supplier();
    let mut summaries = Vec::new();
    for tenant in supplier.pending_tenants()? {
        let records = supplier.records(&tenant)?;
        summaries.push(TenantSummary {
            id: tenant.0,
            name: records.tenant.name,
            domain: records.tenant.domain,
        });
    }
    Ok(Json(summaries))
}

/// One compilation pass for the tenant, reported as the structured outcome.
/// A pass that ran but failed is still a well-formed response; the status
/// code mirrors the failing stage.
pub(crate) async fn provision_endpoint(
    Extension(state): Extension<AppState>,
    Path(tenant_id): Path<String>,
) -> impl IntoResponse {
    let tenant = TenantId(tenant_id);
    match state.provisioner.handle_mutation(&tenant).await {
        MutationDisposition::Superseded => (
            StatusCode::ACCEPTED,
            Json(json!({ "disposition": "superseded" })),
        ),
        MutationDisposition::Completed(outcome) => {
            let status = if outcome.success {
                StatusCode::OK
            } else {
                match outcome.stage {
                    Stage::Load => StatusCode::NOT_FOUND,
                    Stage::Validate => StatusCode::UNPROCESSABLE_ENTITY,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                }
            };
            let body = serde_json::to_value(&outcome)
                .unwrap_or_else(|err| json!({ "error": err.to_string() }));
            (status, Json(body))
        }
    }
}
