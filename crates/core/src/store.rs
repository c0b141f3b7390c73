//! Store traits: the persistence seam for every domain table.
//!
//! One trait per table so tests can stub a single concern. `FinanceStore`
//! bundles all of them and is what the planner and scheduler hold
//! (`Arc<dyn FinanceStore>`).
//!
//! Implementations: SQLite (sqlx) and in-memory, both in `stashflow-store`.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::error::StoreError;
use crate::model::{
    Expense, ExpenseId, GoalId, Income, IncomeId, MonthlyContribution, NewGoal, NewIncome,
    SavingsGoal, User, UserId,
};

type StoreResult<T> = std::result::Result<T, StoreError>;

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create_user(
        &self,
        external_id: &str,
        username: &str,
        auth_token: &str,
    ) -> StoreResult<User>;

    async fn get_user(&self, id: UserId) -> StoreResult<Option<User>>;

    async fn get_user_by_external_id(&self, external_id: &str) -> StoreResult<Option<User>>;
}

#[async_trait]
pub trait IncomeStore: Send + Sync {
    async fn create_income(&self, income: NewIncome) -> StoreResult<Income>;

    async fn get_income(&self, id: IncomeId) -> StoreResult<Option<Income>>;

    async fn list_user_incomes(&self, user_id: UserId) -> StoreResult<Vec<Income>>;

    /// Incomes whose next pay date is at or before `until`, oldest first.
    async fn list_due_incomes(&self, until: DateTime<Utc>) -> StoreResult<Vec<Income>>;

    async fn update_next_pay_date(&self, id: IncomeId, next: DateTime<Utc>) -> StoreResult<()>;

    async fn delete_income(&self, id: IncomeId) -> StoreResult<bool>;
}

#[async_trait]
pub trait ExpenseStore: Send + Sync {
    async fn create_expense(&self, user_id: UserId, name: &str, amount: i64)
    -> StoreResult<Expense>;

    async fn get_expense(&self, id: ExpenseId) -> StoreResult<Option<Expense>>;

    async fn list_user_expenses(&self, user_id: UserId) -> StoreResult<Vec<Expense>>;

    async fn delete_expense(&self, id: ExpenseId) -> StoreResult<bool>;
}

#[async_trait]
pub trait GoalStore: Send + Sync {
    async fn create_goal(&self, goal: NewGoal) -> StoreResult<SavingsGoal>;

    async fn get_goal(&self, id: GoalId) -> StoreResult<Option<SavingsGoal>>;

    /// Active goals ordered by priority ascending, then creation time.
    async fn list_active_goals(&self, user_id: UserId) -> StoreResult<Vec<SavingsGoal>>;

    /// All goals of a user regardless of status, same ordering.
    async fn list_goals(&self, user_id: UserId) -> StoreResult<Vec<SavingsGoal>>;

    /// Persist every mutable column of the goal.
    async fn update_goal(&self, goal: &SavingsGoal) -> StoreResult<()>;

    async fn delete_goal(&self, id: GoalId) -> StoreResult<bool>;
}

#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Insert a ledger row unless one already exists for (user, goal, month).
    ///
    /// Returns `None` when the row already existed. Never errors on the
    /// uniqueness conflict itself.
    async fn insert_contribution_if_absent(
        &self,
        user_id: UserId,
        goal_id: GoalId,
        month: NaiveDate,
        amount: i64,
    ) -> StoreResult<Option<MonthlyContribution>>;

    async fn get_contribution(
        &self,
        user_id: UserId,
        goal_id: GoalId,
        month: NaiveDate,
    ) -> StoreResult<Option<MonthlyContribution>>;

    async fn update_contribution(&self, row: &MonthlyContribution) -> StoreResult<()>;

    async fn list_user_contributions(
        &self,
        user_id: UserId,
        month: NaiveDate,
    ) -> StoreResult<Vec<MonthlyContribution>>;
}

#[async_trait]
pub trait ProcessingLogStore: Send + Sync {
    async fn is_income_processed(&self, income_id: IncomeId, date: NaiveDate) -> StoreResult<bool>;

    /// Record that `income_id` was handled on `date`.
    ///
    /// Returns `false` if a row already existed; the first writer wins.
    async fn record_income_processed(
        &self,
        income_id: IncomeId,
        user_id: UserId,
        date: NaiveDate,
        income_amount: i64,
    ) -> StoreResult<bool>;
}

/// Everything the planner and scheduler need from persistence.
pub trait FinanceStore:
    UserStore + IncomeStore + ExpenseStore + GoalStore + LedgerStore + ProcessingLogStore
{
    /// The backend name (e.g., "sqlite", "in_memory").
    fn backend_name(&self) -> &str;
}
