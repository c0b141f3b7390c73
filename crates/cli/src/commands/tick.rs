//! `stashflow tick`: Run one payday tick now.

use super::runtime;
use stashflow_scheduler::PaydayScheduler;
use std::sync::Arc;

pub async fn run(json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let rt = runtime().await?;
    let channel = stashflow_channels::from_config(&rt.config);
    let scheduler = Arc::new(PaydayScheduler::new(
        rt.service.clone(),
        channel,
        rt.config.scheduler.clone(),
    ));

    let report = scheduler.run_tick().await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "Due: {}  notified: {}  already done today: {}  failed deliveries: {}  errors: {}",
            report.candidates,
            report.notified,
            report.skipped,
            report.failed_deliveries,
            report.errors
        );
    }
    Ok(())
}
