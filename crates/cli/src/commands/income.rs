//! `stashflow income`: Recurring income.

use super::{resolve_user, runtime};
use clap::Subcommand;
use stashflow_core::model::{Frequency, IncomeId};
use stashflow_planner::IncomeSpec;

#[derive(Subcommand)]
pub enum IncomeCommand {
    /// Add a recurring income
    Add {
        #[arg(short, long, env = "STASHFLOW_USER")]
        user: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        amount: i64,
        /// monthly, weekly or biweekly
        #[arg(long, default_value = "monthly")]
        frequency: Frequency,
        /// Day of month (1-31) for monthly, weekday (0 = Sunday) otherwise
        #[arg(long)]
        day: u32,
        /// Hour of day (UTC) to send the payday message
        #[arg(long, default_value_t = 9)]
        hour: u32,
    },
    /// List a user's incomes
    List {
        #[arg(short, long, env = "STASHFLOW_USER")]
        user: String,
    },
    /// Remove an income
    Delete {
        #[arg(short, long, env = "STASHFLOW_USER")]
        user: String,
        id: i64,
    },
}

pub async fn run(cmd: IncomeCommand) -> Result<(), Box<dyn std::error::Error>> {
    let rt = runtime().await?;
    match cmd {
        IncomeCommand::Add {
            user,
            name,
            amount,
            frequency,
            day,
            hour,
        } => {
            let user = resolve_user(&rt.service, &user).await?;
            let income = rt
                .service
                .add_income(
                    user.id,
                    IncomeSpec {
                        name,
                        amount,
                        frequency,
                        recurring_day: day,
                        notification_hour: hour,
                    },
                )
                .await?;
            println!(
                "✅ Income #{} '{}' added, next payday {}",
                income.id,
                income.name,
                income.next_pay_date.format("%Y-%m-%d %H:%M UTC")
            );
        }
        IncomeCommand::List { user } => {
            let user = resolve_user(&rt.service, &user).await?;
            let incomes = rt.service.incomes(user.id).await?;
            if incomes.is_empty() {
                println!("No incomes.");
            }
            for i in incomes {
                println!(
                    "#{:<4} {:<20} {:>8}  {:<8} day {:<2}  next {}",
                    i.id,
                    i.name,
                    i.amount,
                    i.frequency,
                    i.recurring_day,
                    i.next_pay_date.format("%Y-%m-%d %H:%M")
                );
            }
        }
        IncomeCommand::Delete { user, id } => {
            let user = resolve_user(&rt.service, &user).await?;
            rt.service.delete_income(user.id, IncomeId(id)).await?;
            println!("🗑️  Income #{id} deleted");
            println!("   Monthly surplus is now {}", rt.service.surplus(user.id).await?);
        }
    }
    Ok(())
}
