//! Subcommand implementations and the shared runtime they build on.

pub mod allocate;
pub mod daemon;
pub mod expense;
pub mod goal;
pub mod income;
pub mod onboard;
pub mod status;
pub mod tick;
pub mod user;

use stashflow_config::AppConfig;
use stashflow_core::clock::SystemClock;
use stashflow_core::model::User;
use stashflow_planner::FinanceService;
use stashflow_security::{AuditLogger, AuditSink, LocalTokenIssuer, TracingSink};
use std::path::Path;
use std::sync::Arc;

type CmdResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Config plus a ready `FinanceService` over the configured store.
pub struct Runtime {
    pub config: AppConfig,
    pub service: Arc<FinanceService>,
}

pub async fn runtime() -> CmdResult<Runtime> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    runtime_with(config).await
}

pub async fn runtime_with(config: AppConfig) -> CmdResult<Runtime> {
    ensure_database_dir(&config.database.url)?;
    let store =
        stashflow_store::open(&config.database.url, config.database.max_connections).await?;

    let sinks: Vec<Arc<dyn AuditSink>> = vec![Arc::new(TracingSink)];
    let audit = AuditLogger::from_config(&config.audit, sinks);

    let mut service = FinanceService::new(
        store,
        Arc::new(SystemClock),
        audit,
        config.planner.clone(),
    );
    if let Some(issuer) = LocalTokenIssuer::from_config(&config.identity) {
        service = service.with_identity(Arc::new(issuer));
    }

    Ok(Runtime {
        config,
        service: Arc::new(service),
    })
}

/// Look up a user by external id with a hint when it is missing.
pub async fn resolve_user(service: &FinanceService, external_id: &str) -> CmdResult<User> {
    service.user_by_external(external_id).await.map_err(|e| {
        format!("{e} (register first with `stashflow user add {external_id}`)").into()
    })
}

/// Create the directory holding a file-backed SQLite database.
fn ensure_database_dir(url: &str) -> CmdResult<()> {
    let Some(path) = url.strip_prefix("sqlite://") else {
        return Ok(());
    };
    if path.contains(":memory:") {
        return Ok(());
    }
    let path = path.split('?').next().unwrap_or(path);
    if let Some(parent) = Path::new(path).parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}
