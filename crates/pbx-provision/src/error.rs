use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::config::ConfigError;
use crate::provisioning::SupplierError;
use crate::telemetry::TelemetryError;

/// Top-level error for the service binaries.
///
/// Stage failures inside a compilation pass are not errors at this level;
/// the orchestrator reports them as structured outcomes. This type covers
/// everything around the pipeline: configuration, telemetry, transport, and
/// record-supplier lookups.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("server error: {0}")]
    Server(#[from] axum::Error),
    #[error("record supplier error: {0}")]
    Supplier(#[from] SupplierError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Supplier(SupplierError::TenantNotFound(_)) => StatusCode::NOT_FOUND,
            AppError::Supplier(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Config(_) | AppError::Telemetry(_) | AppError::Io(_) | AppError::Server(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}
