//! `stashflow status`: Show configuration and a savings summary.

use super::{resolve_user, runtime};
use stashflow_config::AppConfig;

pub async fn run(user: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let rt = runtime().await?;
    let config = &rt.config;

    println!("Stashflow Status");
    println!("================");
    println!("  Config dir:   {}", AppConfig::config_dir().display());
    println!("  Store:        {}", rt.service.store().backend_name());
    println!(
        "  Scheduler:    {} (every {}s)",
        if config.scheduler.enabled { "enabled" } else { "disabled" },
        config.scheduler.tick_interval_secs
    );
    println!(
        "  Telegram:     {}",
        if config.channel("telegram").is_some() { "configured" } else { "not configured" }
    );
    println!("  Small goals:  <= {}", config.planner.small_goal_threshold);
    println!(
        "  Audit:        {}",
        if config.audit.enabled { "enabled" } else { "disabled" }
    );

    let config_path = AppConfig::config_dir().join("config.toml");
    if config_path.exists() {
        println!("\n  ✅ Config file found");
    } else {
        println!("\n  ⚠️  No config file: run `stashflow onboard` first");
    }

    let Some(external_id) = user else {
        return Ok(());
    };
    let user = resolve_user(&rt.service, &external_id).await?;
    let service = &rt.service;

    let income: i64 = service.incomes(user.id).await?.iter().map(|i| i.amount).sum();
    let expenses: i64 = service.expenses(user.id).await?.iter().map(|e| e.amount).sum();
    println!("\n{} ({})", user.username, user.external_id);
    println!("  Income:   {income}");
    println!("  Expenses: {expenses}");
    println!("  Surplus:  {}", service.surplus(user.id).await?);

    let goals = service.goals(user.id).await?;
    let this_month = service.month_contributions(user.id).await?;
    if goals.is_empty() {
        println!("  No goals yet.");
    }
    for g in goals {
        let target_date = g
            .target_date
            .map(|d| d.to_string())
            .unwrap_or_else(|| "-".into());
        if g.is_active() {
            println!(
                "  #{} {:<20} {:>8}/{:<8} {:>3}%  {}/month  this month {}  eta {}",
                g.priority,
                g.name,
                g.current_amount,
                g.target_amount,
                g.progress_percent(),
                g.monthly_contrib,
                this_month.get(&g.id).copied().unwrap_or(0),
                target_date
            );
        } else {
            println!("  ✓  {:<20} {:>8}/{:<8} done", g.name, g.current_amount, g.target_amount);
        }
    }

    Ok(())
}
