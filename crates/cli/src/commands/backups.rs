//! Scheduled backups from the command line.

use tableside_server::config::BackupConfig;
use tableside_server::services::BackupService;

use super::{connect, print_json};

/// Back up every active store into `BACKUP_DIR` (same job as `/api/cron/backup`).
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let config = BackupConfig::from_env()?;
    let pool = connect().await?;

    let report = BackupService::new(&pool).run_scheduled(&config).await?;

    tracing::info!(
        stores = report.stores,
        written = report.written,
        failed = report.failed,
        dir = %config.dir.display(),
        "Backup run complete"
    );
    print_json(&report)?;
    Ok(())
}
