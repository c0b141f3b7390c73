//! `stashflow allocate`: Recompute a user's monthly plan.

use super::{resolve_user, runtime};

pub async fn run(user: String) -> Result<(), Box<dyn std::error::Error>> {
    let rt = runtime().await?;
    let user = resolve_user(&rt.service, &user).await?;
    let report = rt.service.reallocate(user.id).await?;

    println!("Surplus {} split over {} goal(s):", report.surplus, report.allocations.len());
    for a in &report.allocations {
        println!("  #{} {:<20} {:>8}/month", a.priority, a.goal_name, a.amount);
    }
    let unassigned = report.surplus - report.allocated();
    if unassigned > 0 {
        println!("  Unassigned: {unassigned}");
    }
    if report.failed_writes > 0 {
        println!("⚠️  {} goal(s) could not be saved, see the log", report.failed_writes);
    }
    Ok(())
}
