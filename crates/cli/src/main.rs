//! Stashflow CLI: the main entry point.
//!
//! Commands:
//! - `onboard`: Write the default config
//! - `status`: Show configuration and, with `--user`, a savings summary
//! - `daemon`: Run the payday scheduler and answer button presses
//! - `tick`: Run one payday tick now
//! - `user`: Register or show a user
//! - `income`: Add, list or delete recurring income
//! - `expense`: Add, list or delete flat monthly expenses
//! - `goal`: Manage savings goals
//! - `allocate`: Recompute a user's monthly plan

use clap::{Parser, Subcommand};

mod commands;

use commands::{expense::ExpenseCommand, goal::GoalCommand, income::IncomeCommand, user::UserCommand};

#[derive(Parser)]
#[command(
    name = "stashflow",
    about = "Stashflow: split your surplus across savings goals and get nudged on payday",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize configuration
    Onboard,

    /// Show configuration and store status
    Status {
        /// Also summarize this user's goals (chat / external id)
        #[arg(short, long, env = "STASHFLOW_USER")]
        user: Option<String>,
    },

    /// Run the payday scheduler and the payday dialog until Ctrl+C
    Daemon {
        /// External id terminal input is attributed to when no chat channel is configured
        #[arg(short, long, env = "STASHFLOW_USER")]
        user: Option<String>,
    },

    /// Run a single payday tick now
    Tick {
        /// Print the tick report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Manage users
    #[command(subcommand)]
    User(UserCommand),

    /// Manage recurring income
    #[command(subcommand)]
    Income(IncomeCommand),

    /// Manage flat monthly expenses
    #[command(subcommand)]
    Expense(ExpenseCommand),

    /// Manage savings goals
    #[command(subcommand)]
    Goal(GoalCommand),

    /// Recompute monthly budgets for a user's goals
    Allocate {
        #[arg(short, long, env = "STASHFLOW_USER")]
        user: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Onboard => commands::onboard::run().await?,
        Commands::Status { user } => commands::status::run(user).await?,
        Commands::Daemon { user } => commands::daemon::run(user).await?,
        Commands::Tick { json } => commands::tick::run(json).await?,
        Commands::User(cmd) => commands::user::run(cmd).await?,
        Commands::Income(cmd) => commands::income::run(cmd).await?,
        Commands::Expense(cmd) => commands::expense::run(cmd).await?,
        Commands::Goal(cmd) => commands::goal::run(cmd).await?,
        Commands::Allocate { user } => commands::allocate::run(user).await?,
    }

    Ok(())
}
