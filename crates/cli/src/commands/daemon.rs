//! `stashflow daemon`: Payday scheduler plus the payday dialog.

use super::runtime;
use stashflow_channels::CliChannel;
use stashflow_core::channel::Channel;
use stashflow_planner::{PaydayDesk, SessionStore};
use stashflow_scheduler::PaydayScheduler;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

pub async fn run(user: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let rt = runtime().await?;
    let config = rt.config;

    let channel: Arc<dyn Channel> = match (config.channel("telegram"), user) {
        (None, Some(external_id)) => Arc::new(CliChannel::as_user(external_id)),
        _ => stashflow_channels::from_config(&config),
    };
    let allowed_users = config
        .channel(channel.name())
        .map(|c| c.allowed_users.clone())
        .unwrap_or_else(|| vec!["*".to_string()]);

    println!("Stashflow Daemon: Starting");
    println!("   Channel:   {}", channel.name());
    println!(
        "   Scheduler: {}",
        if config.scheduler.enabled {
            format!("every {}s", config.scheduler.tick_interval_secs)
        } else {
            "disabled".into()
        }
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let scheduler_handle = if config.scheduler.enabled {
        let scheduler = Arc::new(PaydayScheduler::new(
            rt.service.clone(),
            channel.clone(),
            config.scheduler.clone(),
        ));
        Some(scheduler.start(shutdown_rx.clone()))
    } else {
        None
    };

    let inbound = channel.start().await?;
    let desk = Arc::new(PaydayDesk::new(
        rt.service.clone(),
        SessionStore::from_config(&config.session),
        allowed_users,
        channel.name(),
    ));
    let desk_handle = tokio::spawn(desk.serve(channel.clone(), inbound, shutdown_rx));

    info!("Daemon running, press Ctrl+C to stop");
    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");

    let _ = shutdown_tx.send(true);
    if let Some(handle) = scheduler_handle
        && let Err(e) = handle.await
    {
        warn!("Scheduler task ended abnormally: {e}");
    }
    if let Err(e) = desk_handle.await {
        warn!("Payday desk ended abnormally: {e}");
    }
    channel.stop().await?;

    println!("Stopped.");
    Ok(())
}
