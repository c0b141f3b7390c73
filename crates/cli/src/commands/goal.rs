//! `stashflow goal`: Savings goals.

use super::{resolve_user, runtime};
use clap::Subcommand;
use stashflow_core::model::GoalId;
use stashflow_planner::{ContributionOutcome, StatusChange};

#[derive(Subcommand)]
pub enum GoalCommand {
    /// Create a goal at the lowest priority
    Add {
        #[arg(short, long, env = "STASHFLOW_USER")]
        user: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        target: i64,
    },
    /// List goals by priority
    List {
        #[arg(short, long, env = "STASHFLOW_USER")]
        user: String,
    },
    /// Delete a goal
    Delete {
        #[arg(short, long, env = "STASHFLOW_USER")]
        user: String,
        id: i64,
    },
    /// Move a goal to another priority (1 = highest)
    Priority {
        #[arg(short, long, env = "STASHFLOW_USER")]
        user: String,
        id: i64,
        priority: u32,
    },
    /// Put money into a goal
    Contribute {
        #[arg(short, long, env = "STASHFLOW_USER")]
        user: String,
        id: i64,
        amount: i64,
    },
    /// Take money out of a goal
    Withdraw {
        #[arg(short, long, env = "STASHFLOW_USER")]
        user: String,
        id: i64,
        amount: i64,
    },
}

pub async fn run(cmd: GoalCommand) -> Result<(), Box<dyn std::error::Error>> {
    let rt = runtime().await?;
    let service = &rt.service;
    match cmd {
        GoalCommand::Add { user, name, target } => {
            let user = resolve_user(service, &user).await?;
            let goal = service.create_goal(user.id, &name, target).await?;
            println!(
                "✅ Goal #{} '{}' created at priority {}, {}/month",
                goal.id, goal.name, goal.priority, goal.monthly_contrib
            );
        }
        GoalCommand::List { user } => {
            let user = resolve_user(service, &user).await?;
            for g in service.goals(user.id).await? {
                let rank = if g.is_active() {
                    format!("#{}", g.priority)
                } else {
                    "done".into()
                };
                println!(
                    "{:<5} [{}] {:<20} {:>8}/{:<8} {}/month",
                    rank, g.id, g.name, g.current_amount, g.target_amount, g.monthly_contrib
                );
            }
        }
        GoalCommand::Delete { user, id } => {
            let user = resolve_user(service, &user).await?;
            service.delete_goal(user.id, GoalId(id)).await?;
            println!("🗑️  Goal #{id} deleted");
        }
        GoalCommand::Priority { user, id, priority } => {
            let user = resolve_user(service, &user).await?;
            service.change_priority(user.id, GoalId(id), priority).await?;
            println!("✅ Goal #{id} moved to priority {priority}");
        }
        GoalCommand::Contribute { user, id, amount } => {
            let user = resolve_user(service, &user).await?;
            let out = service.contribute(user.id, GoalId(id), amount).await?;
            print_outcome("Added", &out);
        }
        GoalCommand::Withdraw { user, id, amount } => {
            let user = resolve_user(service, &user).await?;
            let out = service.withdraw(user.id, GoalId(id), amount).await?;
            print_outcome("Withdrew", &out);
        }
    }
    Ok(())
}

fn print_outcome(verb: &str, out: &ContributionOutcome) {
    println!(
        "✅ {verb} {}: {} is at {}/{}",
        out.applied, out.goal.name, out.goal.current_amount, out.goal.target_amount
    );
    match out.status_change {
        Some(StatusChange::Completed) => println!("🎉 Goal reached!"),
        Some(StatusChange::Reactivated) => {
            println!("   Goal reopened at priority {}", out.goal.priority)
        }
        None => {}
    }
}
