//! `stashflow expense`: Flat monthly expenses.

use super::{resolve_user, runtime};
use clap::Subcommand;
use stashflow_core::model::ExpenseId;

#[derive(Subcommand)]
pub enum ExpenseCommand {
    /// Add a monthly expense
    Add {
        #[arg(short, long, env = "STASHFLOW_USER")]
        user: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        amount: i64,
    },
    /// List a user's expenses
    List {
        #[arg(short, long, env = "STASHFLOW_USER")]
        user: String,
    },
    /// Remove an expense
    Delete {
        #[arg(short, long, env = "STASHFLOW_USER")]
        user: String,
        id: i64,
    },
}

pub async fn run(cmd: ExpenseCommand) -> Result<(), Box<dyn std::error::Error>> {
    let rt = runtime().await?;
    match cmd {
        ExpenseCommand::Add { user, name, amount } => {
            let user = resolve_user(&rt.service, &user).await?;
            let expense = rt.service.add_expense(user.id, &name, amount).await?;
            println!("✅ Expense #{} '{}' added", expense.id, expense.name);
            println!("   Monthly surplus is now {}", rt.service.surplus(user.id).await?);
        }
        ExpenseCommand::List { user } => {
            let user = resolve_user(&rt.service, &user).await?;
            for e in rt.service.expenses(user.id).await? {
                println!("#{:<4} {:<20} {:>8}", e.id, e.name, e.amount);
            }
        }
        ExpenseCommand::Delete { user, id } => {
            let user = resolve_user(&rt.service, &user).await?;
            rt.service.delete_expense(user.id, ExpenseId(id)).await?;
            println!("🗑️  Expense #{id} deleted");
            println!("   Monthly surplus is now {}", rt.service.surplus(user.id).await?);
        }
    }
    Ok(())
}
