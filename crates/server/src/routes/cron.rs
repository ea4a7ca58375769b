//! Scheduled jobs, triggered by an external scheduler with `CRON_SECRET`.

use axum::{Json, extract::State};
use chrono::Utc;

use crate::error::AppError;
use crate::middleware::RequireCron;
use crate::services::backup::BackupRunReport;
use crate::services::license::SweepReport;
use crate::services::{BackupService, LicenseService};
use crate::state::AppState;

/// `GET|POST /api/cron/backup`: back up every active store to disk.
///
/// # Errors
///
/// Returns 500 if the store list cannot be loaded. Per-store failures are
/// counted in the report instead.
pub async fn backup(
    _cron: RequireCron,
    State(state): State<AppState>,
) -> Result<Json<BackupRunReport>, AppError> {
    let report = BackupService::new(state.pool())
        .run_scheduled(&state.config().backup)
        .await?;
    tracing::info!(
        stores = report.stores,
        written = report.written,
        failed = report.failed,
        "scheduled backup finished"
    );
    Ok(Json(report))
}

/// `GET|POST /api/cron/licenses`: expire overdue licenses and send expiry
/// warnings.
///
/// # Errors
///
/// Returns 500 if a query fails.
pub async fn licenses(
    _cron: RequireCron,
    State(state): State<AppState>,
) -> Result<Json<SweepReport>, AppError> {
    let report = LicenseService::new(state.pool(), state.signer())
        .sweep(Utc::now())
        .await?;
    tracing::info!(expired = report.expired, warned = report.warned, "license sweep finished");
    Ok(Json(report))
}
