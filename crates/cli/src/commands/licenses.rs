//! License administration.
//!
//! Uses the same key pair as the server (`LICENSE_PRIVATE_KEY`,
//! `LICENSE_PUBLIC_KEY`).

use chrono::{DateTime, Utc};

use tableside_core::{LicenseId, LicensePlan, LicenseStatus, StoreId};
use tableside_server::config::LicenseKeysConfig;
use tableside_server::db::LicenseRepository;
use tableside_server::services::{LicenseService, LicenseSigner};

use super::{connect, print_json};

fn signer() -> Result<LicenseSigner, Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let config = LicenseKeysConfig::from_env()?;
    Ok(LicenseSigner::from_config(&config)?)
}

/// Issue a license and print it, including the full key.
pub async fn issue(
    store: StoreId,
    plan: LicensePlan,
    max_devices: i32,
    expires_at: Option<DateTime<Utc>>,
) -> Result<(), Box<dyn std::error::Error>> {
    let signer = signer()?;
    let pool = connect().await?;

    let license = LicenseService::new(&pool, &signer)
        .issue(store, plan, max_devices, expires_at)
        .await?;

    print_json(&license)?;
    Ok(())
}

/// Revoke a license. Its terminals stop syncing immediately and go offline
/// once their cached token runs out.
pub async fn revoke(id: LicenseId) -> Result<(), Box<dyn std::error::Error>> {
    let signer = signer()?;
    let pool = connect().await?;

    let license = LicenseService::new(&pool, &signer)
        .transition(id, LicenseStatus::Revoked)
        .await?;

    tracing::info!(license_id = %license.id, "License revoked");
    Ok(())
}

/// List licenses, optionally for one store.
pub async fn list(store: Option<StoreId>) -> Result<(), Box<dyn std::error::Error>> {
    let pool = connect().await?;
    let licenses = LicenseRepository::new(&pool).list(store).await?;
    print_json(&licenses)?;
    Ok(())
}

/// Run the expiry sweep once (same job as `/api/cron/licenses`).
pub async fn sweep() -> Result<(), Box<dyn std::error::Error>> {
    let signer = signer()?;
    let pool = connect().await?;

    let report = LicenseService::new(&pool, &signer).sweep(Utc::now()).await?;

    tracing::info!(expired = report.expired, warned = report.warned, "Sweep complete");
    print_json(&report)?;
    Ok(())
}
