//! `stashflow onboard`: First-time setup.

use stashflow_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = AppConfig::config_dir();
    let config_path = config_dir.join("config.toml");

    println!("Stashflow: First-Time Setup");
    println!("============================\n");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
        println!("✅ Created config directory: {}", config_dir.display());
    } else {
        println!("  Config directory exists: {}", config_dir.display());
    }

    if config_path.exists() {
        println!("\n⚠️  Config already exists at: {}", config_path.display());
        println!("   Edit it manually or delete and re-run onboard.\n");
        return Ok(());
    }

    std::fs::write(&config_path, AppConfig::default_toml())?;
    println!("✅ Created config.toml at: {}", config_path.display());
    println!("\n📝 Next steps:");
    println!("   1. Register yourself:   stashflow user add <chat-id> --username <name>");
    println!("   2. Add your salary:     stashflow income add -u <chat-id> --name salary --amount 3000 --day 25");
    println!("   3. Add a goal:          stashflow goal add -u <chat-id> --name laptop --target 1500");
    println!("   4. Start the scheduler: stashflow daemon");
    println!("\n   Set TELEGRAM_BOT_TOKEN to receive payday messages on Telegram.\n");

    Ok(())
}
