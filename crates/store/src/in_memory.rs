//! In-memory backend: useful for testing and dry runs.
//!
//! Mirrors the SQLite backend's semantics, including the uniqueness rules on
//! the contribution ledger and the processing log.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use stashflow_core::error::StoreError;
use stashflow_core::model::{
    Expense, ExpenseId, GoalId, GoalStatus, Income, IncomeId, IncomeProcessingLog,
    MonthlyContribution, NewGoal, NewIncome, SavingsGoal, User, UserId,
};
use stashflow_core::store::{
    ExpenseStore, FinanceStore, GoalStore, IncomeStore, LedgerStore, ProcessingLogStore,
    UserStore,
};
use std::sync::Arc;
use tokio::sync::RwLock;

type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Default)]
struct Tables {
    next_id: i64,
    users: Vec<User>,
    incomes: Vec<Income>,
    expenses: Vec<Expense>,
    goals: Vec<SavingsGoal>,
    contributions: Vec<MonthlyContribution>,
    processing_log: Vec<IncomeProcessingLog>,
}

impl Tables {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// A `FinanceStore` that keeps every table in process memory.
#[derive(Clone)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            tables: Arc::new(RwLock::new(Tables::default())),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn sort_goals(goals: &mut [SavingsGoal]) {
    goals.sort_by(|a, b| {
        a.priority
            .cmp(&b.priority)
            .then(a.created_at.cmp(&b.created_at))
            .then(a.id.cmp(&b.id))
    });
}

#[async_trait]
impl UserStore for InMemoryStore {
    async fn create_user(
        &self,
        external_id: &str,
        username: &str,
        auth_token: &str,
    ) -> StoreResult<User> {
        let mut tables = self.tables.write().await;
        if tables.users.iter().any(|u| u.external_id == external_id) {
            return Err(StoreError::Conflict(format!(
                "user with external id {external_id} exists"
            )));
        }
        let user = User {
            id: UserId(tables.allocate_id()),
            external_id: external_id.to_string(),
            username: username.to_string(),
            auth_token: auth_token.to_string(),
            created_at: Utc::now(),
        };
        tables.users.push(user.clone());
        Ok(user)
    }

    async fn get_user(&self, id: UserId) -> StoreResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().find(|u| u.id == id).cloned())
    }

    async fn get_user_by_external_id(&self, external_id: &str) -> StoreResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .iter()
            .find(|u| u.external_id == external_id)
            .cloned())
    }
}

#[async_trait]
impl IncomeStore for InMemoryStore {
    async fn create_income(&self, income: NewIncome) -> StoreResult<Income> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        let income = Income {
            id: IncomeId(tables.allocate_id()),
            user_id: income.user_id,
            name: income.name,
            amount: income.amount,
            frequency: income.frequency,
            recurring_day: income.recurring_day,
            notification_hour: income.notification_hour,
            next_pay_date: income.next_pay_date,
            created_at: now,
            updated_at: now,
        };
        tables.incomes.push(income.clone());
        Ok(income)
    }

    async fn get_income(&self, id: IncomeId) -> StoreResult<Option<Income>> {
        let tables = self.tables.read().await;
        Ok(tables.incomes.iter().find(|i| i.id == id).cloned())
    }

    async fn list_user_incomes(&self, user_id: UserId) -> StoreResult<Vec<Income>> {
        let tables = self.tables.read().await;
        Ok(tables
            .incomes
            .iter()
            .filter(|i| i.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn list_due_incomes(&self, until: DateTime<Utc>) -> StoreResult<Vec<Income>> {
        let tables = self.tables.read().await;
        let mut due: Vec<Income> = tables
            .incomes
            .iter()
            .filter(|i| i.next_pay_date <= until)
            .cloned()
            .collect();
        due.sort_by(|a, b| a.next_pay_date.cmp(&b.next_pay_date).then(a.id.cmp(&b.id)));
        Ok(due)
    }

    async fn update_next_pay_date(&self, id: IncomeId, next: DateTime<Utc>) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let income = tables
            .incomes
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| StoreError::QueryFailed(format!("income {id} does not exist")))?;
        income.next_pay_date = next;
        income.updated_at = Utc::now();
        Ok(())
    }

    async fn delete_income(&self, id: IncomeId) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        let before = tables.incomes.len();
        tables.incomes.retain(|i| i.id != id);
        Ok(tables.incomes.len() < before)
    }
}

#[async_trait]
impl ExpenseStore for InMemoryStore {
    async fn create_expense(
        &self,
        user_id: UserId,
        name: &str,
        amount: i64,
    ) -> StoreResult<Expense> {
        let mut tables = self.tables.write().await;
        let expense = Expense {
            id: ExpenseId(tables.allocate_id()),
            user_id,
            name: name.to_string(),
            amount,
            created_at: Utc::now(),
        };
        tables.expenses.push(expense.clone());
        Ok(expense)
    }

    async fn get_expense(&self, id: ExpenseId) -> StoreResult<Option<Expense>> {
        let tables = self.tables.read().await;
        Ok(tables.expenses.iter().find(|e| e.id == id).cloned())
    }

    async fn list_user_expenses(&self, user_id: UserId) -> StoreResult<Vec<Expense>> {
        let tables = self.tables.read().await;
        Ok(tables
            .expenses
            .iter()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn delete_expense(&self, id: ExpenseId) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        let before = tables.expenses.len();
        tables.expenses.retain(|e| e.id != id);
        Ok(tables.expenses.len() < before)
    }
}

#[async_trait]
impl GoalStore for InMemoryStore {
    async fn create_goal(&self, goal: NewGoal) -> StoreResult<SavingsGoal> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        let goal = SavingsGoal {
            id: GoalId(tables.allocate_id()),
            user_id: goal.user_id,
            name: goal.name,
            target_amount: goal.target_amount,
            current_amount: 0,
            priority: goal.priority,
            monthly_contrib: 0,
            monthly_budget_limit: 0,
            monthly_accumulated: 0,
            month_started: None,
            target_date: None,
            status: GoalStatus::Active,
            created_at: now,
            updated_at: now,
        };
        tables.goals.push(goal.clone());
        Ok(goal)
    }

    async fn get_goal(&self, id: GoalId) -> StoreResult<Option<SavingsGoal>> {
        let tables = self.tables.read().await;
        Ok(tables.goals.iter().find(|g| g.id == id).cloned())
    }

    async fn list_active_goals(&self, user_id: UserId) -> StoreResult<Vec<SavingsGoal>> {
        let tables = self.tables.read().await;
        let mut goals: Vec<SavingsGoal> = tables
            .goals
            .iter()
            .filter(|g| g.user_id == user_id && g.is_active())
            .cloned()
            .collect();
        sort_goals(&mut goals);
        Ok(goals)
    }

    async fn list_goals(&self, user_id: UserId) -> StoreResult<Vec<SavingsGoal>> {
        let tables = self.tables.read().await;
        let mut goals: Vec<SavingsGoal> = tables
            .goals
            .iter()
            .filter(|g| g.user_id == user_id)
            .cloned()
            .collect();
        sort_goals(&mut goals);
        Ok(goals)
    }

    async fn update_goal(&self, goal: &SavingsGoal) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let stored = tables
            .goals
            .iter_mut()
            .find(|g| g.id == goal.id)
            .ok_or_else(|| StoreError::QueryFailed(format!("goal {} does not exist", goal.id)))?;
        let created_at = stored.created_at;
        *stored = goal.clone();
        stored.created_at = created_at;
        stored.updated_at = Utc::now();
        Ok(())
    }

    async fn delete_goal(&self, id: GoalId) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        let before = tables.goals.len();
        tables.goals.retain(|g| g.id != id);
        Ok(tables.goals.len() < before)
    }
}

#[async_trait]
impl LedgerStore for InMemoryStore {
    async fn insert_contribution_if_absent(
        &self,
        user_id: UserId,
        goal_id: GoalId,
        month: NaiveDate,
        amount: i64,
    ) -> StoreResult<Option<MonthlyContribution>> {
        let mut tables = self.tables.write().await;
        let exists = tables
            .contributions
            .iter()
            .any(|c| c.user_id == user_id && c.goal_id == goal_id && c.month == month);
        if exists {
            return Ok(None);
        }
        let now = Utc::now();
        let row = MonthlyContribution {
            id: tables.allocate_id(),
            user_id,
            goal_id,
            month,
            amount_contributed: amount,
            created_at: now,
            updated_at: now,
        };
        tables.contributions.push(row.clone());
        Ok(Some(row))
    }

    async fn get_contribution(
        &self,
        user_id: UserId,
        goal_id: GoalId,
        month: NaiveDate,
    ) -> StoreResult<Option<MonthlyContribution>> {
        let tables = self.tables.read().await;
        Ok(tables
            .contributions
            .iter()
            .find(|c| c.user_id == user_id && c.goal_id == goal_id && c.month == month)
            .cloned())
    }

    async fn update_contribution(&self, row: &MonthlyContribution) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let stored = tables
            .contributions
            .iter_mut()
            .find(|c| c.id == row.id)
            .ok_or_else(|| {
                StoreError::QueryFailed(format!("contribution {} does not exist", row.id))
            })?;
        stored.amount_contributed = row.amount_contributed;
        stored.updated_at = Utc::now();
        Ok(())
    }

    async fn list_user_contributions(
        &self,
        user_id: UserId,
        month: NaiveDate,
    ) -> StoreResult<Vec<MonthlyContribution>> {
        let tables = self.tables.read().await;
        let mut rows: Vec<MonthlyContribution> = tables
            .contributions
            .iter()
            .filter(|c| c.user_id == user_id && c.month == month)
            .cloned()
            .collect();
        rows.sort_by_key(|c| c.goal_id);
        Ok(rows)
    }
}

#[async_trait]
impl ProcessingLogStore for InMemoryStore {
    async fn is_income_processed(&self, income_id: IncomeId, date: NaiveDate) -> StoreResult<bool> {
        let tables = self.tables.read().await;
        Ok(tables
            .processing_log
            .iter()
            .any(|l| l.income_id == income_id && l.processed_date == date))
    }

    async fn record_income_processed(
        &self,
        income_id: IncomeId,
        user_id: UserId,
        date: NaiveDate,
        income_amount: i64,
    ) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        let exists = tables
            .processing_log
            .iter()
            .any(|l| l.income_id == income_id && l.processed_date == date);
        if exists {
            return Ok(false);
        }
        let entry = IncomeProcessingLog {
            id: tables.allocate_id(),
            income_id,
            user_id,
            processed_date: date,
            income_amount,
            created_at: Utc::now(),
        };
        tables.processing_log.push(entry);
        Ok(true)
    }
}

impl FinanceStore for InMemoryStore {
    fn backend_name(&self) -> &str {
        "in_memory"
    }
}
