//! Goal allocation: spread the monthly surplus over active goals.
//!
//! Priority-weighted waterfall: goal `i` of `N` (rank 1 = highest) gets
//! weight `N - rank + 1` and a base share of `surplus * weight / (N(N+1)/2)`.
//! Shares above a goal's remaining need are pooled and handed to the goals
//! that still have room, in proportion to their weights, for at most `N`
//! passes. Any rounding remainder stays unassigned.

use chrono::Datelike;
use serde::Serialize;
use stashflow_core::calendar::{add_months, month_start, months_to_cover};
use stashflow_core::clock::Clock;
use stashflow_core::error::Result;
use stashflow_core::model::{GoalId, UserId};
use stashflow_core::store::FinanceStore;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Split `surplus` over goals given their remaining needs in priority order.
///
/// Weights come from position in `needs`, which matches the priority
/// formula as long as priorities are dense.
pub fn allocate(surplus: i64, needs: &[i64]) -> Vec<i64> {
    let n = needs.len();
    if n == 0 {
        return Vec::new();
    }
    if surplus <= 0 {
        return vec![0; n];
    }

    let weights: Vec<i128> = (0..n).map(|i| (n - i) as i128).collect();
    let normalizer: i128 = (n as i128) * (n as i128 + 1) / 2;
    let needs: Vec<i64> = needs.iter().map(|&need| need.max(0)).collect();
    let surplus_wide = surplus as i128;

    let mut alloc: Vec<i64> = weights
        .iter()
        .map(|w| (surplus_wide * w / normalizer) as i64)
        .collect();

    for (a, need) in alloc.iter_mut().zip(&needs) {
        *a = (*a).min(*need);
    }

    let mut pool = surplus - alloc.iter().sum::<i64>();
    let mut passes = 0;
    while pool > 0 && passes < n {
        let open: Vec<usize> = (0..n).filter(|&i| alloc[i] < needs[i]).collect();
        if open.is_empty() {
            break;
        }
        let open_weight: i128 = open.iter().map(|&i| weights[i]).sum();
        let pool_wide = pool as i128;

        let mut distributed = 0;
        for &i in &open {
            let share = (pool_wide * weights[i] / open_weight) as i64;
            let give = share.min(needs[i] - alloc[i]);
            alloc[i] += give;
            distributed += give;
        }

        if distributed == 0 {
            break;
        }
        pool -= distributed;
        passes += 1;
    }

    for a in alloc.iter_mut() {
        if *a == 0 {
            *a = 1;
        }
    }

    alloc
}

/// One goal's planned monthly amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GoalAllocation {
    pub goal_id: GoalId,
    pub goal_name: String,
    pub priority: u32,
    pub amount: i64,
}

/// What a reallocation did.
#[derive(Debug, Clone, Serialize)]
pub struct AllocationReport {
    pub user_id: UserId,
    pub surplus: i64,
    pub allocations: Vec<GoalAllocation>,
    /// Goals whose new plan could not be saved.
    pub failed_writes: usize,
}

impl AllocationReport {
    pub fn allocated(&self) -> i64 {
        self.allocations.iter().map(|a| a.amount).sum()
    }
}

/// Recomputes and persists every active goal's monthly budget.
pub struct GoalAllocator {
    store: Arc<dyn FinanceStore>,
    clock: Arc<dyn Clock>,
}

impl GoalAllocator {
    pub fn new(store: Arc<dyn FinanceStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Total recurring income minus flat expenses, floored at zero.
    pub async fn surplus(&self, user_id: UserId) -> Result<i64> {
        let income: i64 = self
            .store
            .list_user_incomes(user_id)
            .await?
            .iter()
            .map(|i| i.amount)
            .sum();
        let expenses: i64 = self
            .store
            .list_user_expenses(user_id)
            .await?
            .iter()
            .map(|e| e.amount)
            .sum();
        Ok((income - expenses).max(0))
    }

    /// Recompute the user's plan and save it goal by goal.
    ///
    /// A failed write is logged and counted; the remaining goals are still
    /// processed.
    pub async fn reallocate(&self, user_id: UserId) -> Result<AllocationReport> {
        let surplus = self.surplus(user_id).await?;
        let goals = self.store.list_active_goals(user_id).await?;

        let mut report = AllocationReport {
            user_id,
            surplus,
            allocations: Vec::with_capacity(goals.len()),
            failed_writes: 0,
        };
        if goals.is_empty() {
            debug!(%user_id, "No active goals, nothing to allocate");
            return Ok(report);
        }

        let today = self.clock.now().date_naive();
        let month = month_start(today);
        let needs: Vec<i64> = goals.iter().map(|g| g.remaining_need()).collect();
        let amounts = allocate(surplus, &needs);

        for (mut goal, amount) in goals.into_iter().zip(amounts) {
            goal.monthly_budget_limit = amount;
            goal.monthly_contrib = amount;

            if surplus > 0 {
                if goal.month_started != Some(month) {
                    match self.store.get_contribution(user_id, goal.id, month).await {
                        Ok(row) => {
                            goal.monthly_accumulated = row.map(|r| r.amount_contributed).unwrap_or(0);
                            goal.month_started = Some(month);
                        }
                        Err(e) => {
                            warn!(%user_id, goal_id = %goal.id, "Ledger lookup failed during allocation: {e}");
                            report.failed_writes += 1;
                            continue;
                        }
                    }
                }

                let months = months_to_cover(goal.remaining_need(), amount.max(1));
                goal.target_date = Some(add_months(today, months));
            }

            if let Err(e) = self.store.update_goal(&goal).await {
                warn!(%user_id, goal_id = %goal.id, "Failed to save goal allocation: {e}");
                report.failed_writes += 1;
                continue;
            }

            report.allocations.push(GoalAllocation {
                goal_id: goal.id,
                goal_name: goal.name,
                priority: goal.priority,
                amount,
            });
        }

        info!(
            %user_id,
            surplus,
            goals = report.allocations.len(),
            allocated = report.allocated(),
            failed = report.failed_writes,
            month = month.month(),
            "Surplus allocated"
        );
        Ok(report)
    }
}
