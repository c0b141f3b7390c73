//! Manual contributions and withdrawals against a single goal.
//!
//! Both paths do a lazy month rollover on first touch, keep
//! `0 <= current_amount <= target_amount`, mirror `monthly_accumulated`
//! into the ledger and then re-run allocation for the owner. Allocation
//! failures are logged and swallowed; the money movement stands.

use crate::allocator::GoalAllocator;
use crate::ledger::ContributionLedger;
use crate::reindex::PriorityReindexer;
use chrono::NaiveDate;
use serde::Serialize;
use stashflow_core::calendar::month_start;
use stashflow_core::clock::Clock;
use stashflow_core::error::{Error, Result};
use stashflow_core::model::{GoalId, GoalStatus, SavingsGoal, UserId};
use stashflow_core::store::FinanceStore;
use stashflow_security::{AuditEvent, AuditLogger, AuditOutcome};
use std::sync::Arc;
use tracing::{info, warn};

/// Status change caused by a contribution or withdrawal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusChange {
    /// Target reached; the goal left the active ranking.
    Completed,
    /// Dropped below target again; re-appended at the end of the ranking.
    Reactivated,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContributionOutcome {
    /// Goal state as saved.
    pub goal: SavingsGoal,
    /// Amount actually moved after capping.
    pub applied: i64,
    pub status_change: Option<StatusChange>,
}

/// Reset the monthly counter when the goal's marker is from another month.
///
/// Returns whether a rollover happened.
pub fn roll_month(goal: &mut SavingsGoal, month: NaiveDate) -> bool {
    let month = month_start(month);
    if goal.month_started == Some(month) {
        return false;
    }
    goal.monthly_accumulated = 0;
    goal.month_started = Some(month);
    true
}

pub struct GoalContributionService {
    store: Arc<dyn FinanceStore>,
    clock: Arc<dyn Clock>,
    ledger: ContributionLedger,
    reindexer: PriorityReindexer,
    allocator: Arc<GoalAllocator>,
    audit: Arc<AuditLogger>,
    reallocate_on_withdraw: bool,
}

impl GoalContributionService {
    pub fn new(
        store: Arc<dyn FinanceStore>,
        clock: Arc<dyn Clock>,
        allocator: Arc<GoalAllocator>,
        audit: Arc<AuditLogger>,
        reallocate_on_withdraw: bool,
    ) -> Self {
        Self {
            ledger: ContributionLedger::new(store.clone()),
            reindexer: PriorityReindexer::new(store.clone()),
            store,
            clock,
            allocator,
            audit,
            reallocate_on_withdraw,
        }
    }

    /// Put `amount` into a goal, capped at what the goal still needs.
    pub async fn contribute(
        &self,
        goal_id: GoalId,
        amount: i64,
        acting_user: Option<UserId>,
    ) -> Result<ContributionOutcome> {
        check_amount(amount)?;
        let mut goal = self.load(goal_id, acting_user).await?;
        if !goal.is_active() {
            return Err(Error::InvalidInput(format!(
                "goal '{}' is already completed",
                goal.name
            )));
        }

        let month = month_start(self.clock.now().date_naive());
        roll_month(&mut goal, month);

        let applied = amount.min(goal.remaining_need());
        goal.current_amount += applied;
        goal.monthly_accumulated += applied;

        let mut status_change = None;
        if goal.current_amount >= goal.target_amount {
            goal.status = GoalStatus::Completed;
            status_change = Some(StatusChange::Completed);
        }

        self.store.update_goal(&goal).await?;
        self.ledger
            .upsert(goal.user_id, goal.id, month, goal.monthly_accumulated)
            .await?;

        if status_change == Some(StatusChange::Completed) {
            self.reindexer.close_gap(goal.user_id, goal.priority).await?;
            info!(user_id = %goal.user_id, goal_id = %goal.id, "Goal completed");
        }

        self.audit.log(
            AuditEvent::ContributionApplied {
                goal_id: goal.id.0,
                amount: applied,
            },
            &goal.user_id.to_string(),
            &goal.name,
            AuditOutcome::Success,
            (applied < amount).then(|| format!("requested {amount}, capped at {applied}")),
        );

        info!(
            user_id = %goal.user_id,
            goal_id = %goal.id,
            applied,
            current = goal.current_amount,
            target = goal.target_amount,
            "Contribution applied"
        );

        self.reallocate_quietly(goal.user_id).await;
        Ok(ContributionOutcome {
            goal,
            applied,
            status_change,
        })
    }

    /// Take `amount` out of a goal, floored at zero.
    pub async fn withdraw(
        &self,
        goal_id: GoalId,
        amount: i64,
        acting_user: Option<UserId>,
    ) -> Result<ContributionOutcome> {
        check_amount(amount)?;
        let mut goal = self.load(goal_id, acting_user).await?;

        let month = month_start(self.clock.now().date_naive());
        roll_month(&mut goal, month);

        let applied = amount.min(goal.current_amount);
        goal.current_amount -= applied;
        goal.monthly_accumulated = (goal.monthly_accumulated - applied).max(0);

        let mut status_change = None;
        if !goal.is_active() && goal.current_amount < goal.target_amount {
            goal.priority = self.reindexer.next_priority(goal.user_id).await?;
            goal.status = GoalStatus::Active;
            status_change = Some(StatusChange::Reactivated);
        }

        self.store.update_goal(&goal).await?;
        self.ledger
            .upsert(goal.user_id, goal.id, month, goal.monthly_accumulated)
            .await?;

        self.audit.log(
            AuditEvent::WithdrawalApplied {
                goal_id: goal.id.0,
                amount: applied,
            },
            &goal.user_id.to_string(),
            &goal.name,
            AuditOutcome::Success,
            None,
        );

        info!(
            user_id = %goal.user_id,
            goal_id = %goal.id,
            applied,
            current = goal.current_amount,
            reactivated = status_change.is_some(),
            "Withdrawal applied"
        );

        if self.reallocate_on_withdraw {
            self.reallocate_quietly(goal.user_id).await;
        }
        Ok(ContributionOutcome {
            goal,
            applied,
            status_change,
        })
    }

    async fn load(&self, goal_id: GoalId, acting_user: Option<UserId>) -> Result<SavingsGoal> {
        let goal = self
            .store
            .get_goal(goal_id)
            .await?
            .ok_or_else(|| Error::not_found("goal", goal_id))?;
        if let Some(user) = acting_user
            && user != goal.user_id
        {
            return Err(Error::not_owned("goal", goal_id));
        }
        Ok(goal)
    }

    async fn reallocate_quietly(&self, user_id: UserId) {
        if let Err(e) = self.allocator.reallocate(user_id).await {
            warn!(%user_id, "Re-allocation after goal update failed: {e}");
        }
    }
}

fn check_amount(amount: i64) -> Result<()> {
    if amount <= 0 {
        return Err(Error::InvalidInput(format!(
            "amount must be a positive whole number, got {amount}"
        )));
    }
    Ok(())
}
