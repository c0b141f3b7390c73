//! `FinanceService`: the entry point the CLI, the payday dialog and the
//! scheduler call into.
//!
//! Owns the planner components and wires re-allocation after every change
//! that moves the user's surplus or goal ranking.

use crate::allocator::{AllocationReport, GoalAllocator};
use crate::contribution::{ContributionOutcome, GoalContributionService};
use crate::ledger::ContributionLedger;
use crate::recommend::{Recommendation, recommend};
use crate::reindex::PriorityReindexer;
use stashflow_config::PlannerConfig;
use stashflow_core::calendar::{first_pay_date, validate_schedule};
use stashflow_core::clock::Clock;
use stashflow_core::error::{Error, Result, StoreError};
use stashflow_core::identity::IdentityProvider;
use stashflow_core::model::{
    Expense, ExpenseId, Frequency, GoalId, Income, IncomeId, NewGoal, NewIncome, SavingsGoal,
    User, UserId,
};
use stashflow_core::store::FinanceStore;
use stashflow_security::{AuditEvent, AuditLogger, AuditOutcome, resolve_token};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Input for [`FinanceService::add_income`].
#[derive(Debug, Clone)]
pub struct IncomeSpec {
    pub name: String,
    pub amount: i64,
    pub frequency: Frequency,
    pub recurring_day: u32,
    pub notification_hour: u32,
}

pub struct FinanceService {
    store: Arc<dyn FinanceStore>,
    clock: Arc<dyn Clock>,
    audit: Arc<AuditLogger>,
    identity: Option<Arc<dyn IdentityProvider>>,
    config: PlannerConfig,
    ledger: ContributionLedger,
    reindexer: PriorityReindexer,
    allocator: Arc<GoalAllocator>,
    contributions: GoalContributionService,
}

impl FinanceService {
    pub fn new(
        store: Arc<dyn FinanceStore>,
        clock: Arc<dyn Clock>,
        audit: Arc<AuditLogger>,
        config: PlannerConfig,
    ) -> Self {
        let allocator = Arc::new(GoalAllocator::new(store.clone(), clock.clone()));
        let contributions = GoalContributionService::new(
            store.clone(),
            clock.clone(),
            allocator.clone(),
            audit.clone(),
            config.reallocate_on_withdraw,
        );
        Self {
            ledger: ContributionLedger::new(store.clone()),
            reindexer: PriorityReindexer::new(store.clone()),
            store,
            clock,
            audit,
            identity: None,
            config,
            allocator,
            contributions,
        }
    }

    /// Use `provider` to issue tokens for new users.
    pub fn with_identity(mut self, provider: Arc<dyn IdentityProvider>) -> Self {
        self.identity = Some(provider);
        self
    }

    pub fn store(&self) -> &Arc<dyn FinanceStore> {
        &self.store
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn audit(&self) -> &Arc<AuditLogger> {
        &self.audit
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    // --- Users ---

    /// Register a chat user, or return the existing record.
    pub async fn register_user(&self, external_id: &str, username: &str) -> Result<User> {
        let external_id = external_id.trim();
        if external_id.is_empty() {
            return Err(Error::InvalidInput("external id must not be empty".into()));
        }
        if let Some(existing) = self.store.get_user_by_external_id(external_id).await? {
            return Ok(existing);
        }

        let token = resolve_token(self.identity.as_deref(), external_id, username).await;
        let user = match self.store.create_user(external_id, username, &token).await {
            Ok(user) => user,
            // Lost a registration race; the other writer's row stands.
            Err(StoreError::Conflict(_)) => self
                .store
                .get_user_by_external_id(external_id)
                .await?
                .ok_or_else(|| Error::not_found("user", external_id))?,
            Err(e) => return Err(e.into()),
        };

        self.audit.log(
            AuditEvent::UserRegistered,
            external_id,
            username,
            AuditOutcome::Success,
            None,
        );
        info!(user_id = %user.id, external_id, "User registered");
        Ok(user)
    }

    pub async fn user(&self, user_id: UserId) -> Result<User> {
        self.store
            .get_user(user_id)
            .await?
            .ok_or_else(|| Error::not_found("user", user_id))
    }

    pub async fn user_by_external(&self, external_id: &str) -> Result<User> {
        self.store
            .get_user_by_external_id(external_id)
            .await?
            .ok_or_else(|| Error::not_found("user", external_id))
    }

    // --- Income and expenses ---

    pub async fn add_income(&self, user_id: UserId, spec: IncomeSpec) -> Result<Income> {
        self.user(user_id).await?;
        if spec.name.trim().is_empty() {
            return Err(Error::InvalidInput("income name must not be empty".into()));
        }
        if spec.amount <= 0 {
            return Err(Error::InvalidInput(format!(
                "income amount must be positive, got {}",
                spec.amount
            )));
        }
        validate_schedule(spec.frequency, spec.recurring_day, spec.notification_hour)
            .map_err(Error::InvalidInput)?;

        let next_pay_date = first_pay_date(
            spec.frequency,
            spec.recurring_day,
            spec.notification_hour,
            self.clock.now(),
        );
        let income = self
            .store
            .create_income(NewIncome {
                user_id,
                name: spec.name.trim().to_string(),
                amount: spec.amount,
                frequency: spec.frequency,
                recurring_day: spec.recurring_day,
                notification_hour: spec.notification_hour,
                next_pay_date,
            })
            .await?;

        info!(%user_id, income_id = %income.id, next = %income.next_pay_date, "Income added");
        self.reallocate_quietly(user_id).await;
        Ok(income)
    }

    pub async fn incomes(&self, user_id: UserId) -> Result<Vec<Income>> {
        Ok(self.store.list_user_incomes(user_id).await?)
    }

    pub async fn owned_income(&self, user_id: UserId, income_id: IncomeId) -> Result<Income> {
        let income = self
            .store
            .get_income(income_id)
            .await?
            .ok_or_else(|| Error::not_found("income", income_id))?;
        if income.user_id != user_id {
            return Err(Error::not_owned("income", income_id));
        }
        Ok(income)
    }

    /// Remove an income; the surplus shrinks so budgets are recomputed.
    pub async fn delete_income(&self, user_id: UserId, income_id: IncomeId) -> Result<()> {
        let income = self.owned_income(user_id, income_id).await?;
        if !self.store.delete_income(income_id).await? {
            return Err(Error::not_found("income", income_id));
        }

        self.audit.log(
            AuditEvent::IncomeDeleted {
                income_id: income_id.0,
            },
            &user_id.to_string(),
            &income.name,
            AuditOutcome::Success,
            None,
        );
        info!(%user_id, %income_id, "Income deleted");

        self.reallocate_quietly(user_id).await;
        Ok(())
    }

    pub async fn add_expense(&self, user_id: UserId, name: &str, amount: i64) -> Result<Expense> {
        self.user(user_id).await?;
        if name.trim().is_empty() {
            return Err(Error::InvalidInput("expense name must not be empty".into()));
        }
        if amount <= 0 {
            return Err(Error::InvalidInput(format!(
                "expense amount must be positive, got {amount}"
            )));
        }

        let expense = self.store.create_expense(user_id, name.trim(), amount).await?;
        info!(%user_id, expense_id = %expense.id, amount, "Expense added");
        self.reallocate_quietly(user_id).await;
        Ok(expense)
    }

    pub async fn expenses(&self, user_id: UserId) -> Result<Vec<Expense>> {
        Ok(self.store.list_user_expenses(user_id).await?)
    }

    pub async fn delete_expense(&self, user_id: UserId, expense_id: ExpenseId) -> Result<()> {
        let expense = self
            .store
            .get_expense(expense_id)
            .await?
            .ok_or_else(|| Error::not_found("expense", expense_id))?;
        if expense.user_id != user_id {
            return Err(Error::not_owned("expense", expense_id));
        }
        if !self.store.delete_expense(expense_id).await? {
            return Err(Error::not_found("expense", expense_id));
        }

        self.audit.log(
            AuditEvent::ExpenseDeleted {
                expense_id: expense_id.0,
            },
            &user_id.to_string(),
            &expense.name,
            AuditOutcome::Success,
            None,
        );
        info!(%user_id, %expense_id, "Expense deleted");

        self.reallocate_quietly(user_id).await;
        Ok(())
    }

    pub async fn surplus(&self, user_id: UserId) -> Result<i64> {
        self.allocator.surplus(user_id).await
    }

    // --- Goals ---

    /// Create a goal at the bottom of the ranking.
    pub async fn create_goal(&self, user_id: UserId, name: &str, target: i64) -> Result<SavingsGoal> {
        self.user(user_id).await?;
        if name.trim().is_empty() {
            return Err(Error::InvalidInput("goal name must not be empty".into()));
        }
        if target <= 0 {
            return Err(Error::InvalidInput(format!(
                "goal target must be positive, got {target}"
            )));
        }

        let priority = self.reindexer.next_priority(user_id).await?;
        let goal = self
            .store
            .create_goal(NewGoal {
                user_id,
                name: name.trim().to_string(),
                target_amount: target,
                priority,
            })
            .await?;

        self.audit.log(
            AuditEvent::GoalCreated { goal_id: goal.id.0 },
            &user_id.to_string(),
            &goal.name,
            AuditOutcome::Success,
            None,
        );
        info!(%user_id, goal_id = %goal.id, priority, target, "Goal created");

        self.reallocate_quietly(user_id).await;
        Ok(self.store.get_goal(goal.id).await?.unwrap_or(goal))
    }

    pub async fn delete_goal(&self, user_id: UserId, goal_id: GoalId) -> Result<()> {
        let goal = self.owned_goal(user_id, goal_id).await?;
        if !self.store.delete_goal(goal_id).await? {
            return Err(Error::not_found("goal", goal_id));
        }
        if goal.is_active() {
            self.reindexer.close_gap(user_id, goal.priority).await?;
        }

        self.audit.log(
            AuditEvent::GoalDeleted { goal_id: goal_id.0 },
            &user_id.to_string(),
            &goal.name,
            AuditOutcome::Success,
            None,
        );
        info!(%user_id, %goal_id, "Goal deleted");

        self.reallocate_quietly(user_id).await;
        Ok(())
    }

    pub async fn change_priority(
        &self,
        user_id: UserId,
        goal_id: GoalId,
        new_priority: u32,
    ) -> Result<()> {
        let old = self.reindexer.swap(user_id, goal_id, new_priority).await?;
        if old == new_priority {
            return Ok(());
        }

        self.audit.log(
            AuditEvent::PriorityChanged {
                goal_id: goal_id.0,
                from: old,
                to: new_priority,
            },
            &user_id.to_string(),
            &goal_id.to_string(),
            AuditOutcome::Success,
            None,
        );
        self.reallocate_quietly(user_id).await;
        Ok(())
    }

    pub async fn contribute(
        &self,
        user_id: UserId,
        goal_id: GoalId,
        amount: i64,
    ) -> Result<ContributionOutcome> {
        self.contributions.contribute(goal_id, amount, Some(user_id)).await
    }

    pub async fn withdraw(
        &self,
        user_id: UserId,
        goal_id: GoalId,
        amount: i64,
    ) -> Result<ContributionOutcome> {
        self.contributions.withdraw(goal_id, amount, Some(user_id)).await
    }

    /// All goals, active first by priority, then completed.
    pub async fn goals(&self, user_id: UserId) -> Result<Vec<SavingsGoal>> {
        let mut goals = self.store.list_goals(user_id).await?;
        goals.sort_by_key(|g| (!g.is_active(), g.priority, g.created_at));
        Ok(goals)
    }

    pub async fn owned_goal(&self, user_id: UserId, goal_id: GoalId) -> Result<SavingsGoal> {
        let goal = self
            .store
            .get_goal(goal_id)
            .await?
            .ok_or_else(|| Error::not_found("goal", goal_id))?;
        if goal.user_id != user_id {
            return Err(Error::not_owned("goal", goal_id));
        }
        Ok(goal)
    }

    // --- Planning ---

    /// Renumber ranks if they are not dense, then recompute budgets.
    pub async fn reallocate(&self, user_id: UserId) -> Result<AllocationReport> {
        let repaired = self.reindexer.normalize(user_id).await?;
        if repaired > 0 {
            warn!(%user_id, repaired, "Goal ranks had gaps, renumbered");
        }
        self.allocator.reallocate(user_id).await
    }

    /// What each goal received in the current month, read from the ledger.
    ///
    /// Unlike a goal's `monthly_accumulated`, this never shows a previous
    /// month's total before the goal is next touched.
    pub async fn month_contributions(&self, user_id: UserId) -> Result<HashMap<GoalId, i64>> {
        let today = self.clock.now().date_naive();
        self.ledger.month_totals(user_id, today).await
    }

    /// Suggested split of one payment of `income` over the owner's goals.
    pub async fn payday_recommendation(&self, income: &Income) -> Result<Recommendation> {
        let goals = self.store.list_active_goals(income.user_id).await?;
        let today = self.clock.now().date_naive();
        let contributed = self.ledger.month_totals(income.user_id, today).await?;
        Ok(recommend(
            income.amount,
            &goals,
            &contributed,
            self.config.small_goal_threshold,
        ))
    }

    async fn reallocate_quietly(&self, user_id: UserId) {
        if let Err(e) = self.allocator.reallocate(user_id).await {
            warn!(%user_id, "Re-allocation failed: {e}");
        }
    }
}
