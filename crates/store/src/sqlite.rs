//! SQLite backend.
//!
//! One database file, one table per domain type:
//! - `users`, `incomes`, `expenses`, `savings_goals`
//! - `monthly_contributions`: unique per (user_id, goal_id, month)
//! - `income_processing_log`: unique per (income_id, processed_date)
//!
//! Timestamps are stored as fixed-width RFC 3339 text so that string
//! comparison matches time order. Dates are `YYYY-MM-DD`.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{Row, SqlitePool};
use stashflow_core::error::StoreError;
use stashflow_core::model::{
    Expense, ExpenseId, Frequency, GoalId, GoalStatus, Income, IncomeId, MonthlyContribution,
    NewGoal, NewIncome, SavingsGoal, User, UserId,
};
use stashflow_core::store::{
    ExpenseStore, FinanceStore, GoalStore, IncomeStore, LedgerStore, ProcessingLogStore,
    UserStore,
};
use std::str::FromStr;
use tracing::{debug, info};

type StoreResult<T> = std::result::Result<T, StoreError>;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// A SQLite-backed `FinanceStore`.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) a database and run migrations.
    ///
    /// Pass `"sqlite::memory:"` for an ephemeral database (useful for tests).
    pub async fn new(path: &str) -> StoreResult<Self> {
        Self::with_max_connections(path, 4).await
    }

    /// Same as [`SqliteStore::new`] with an explicit pool size.
    ///
    /// In-memory databases are private to one connection, so the pool is
    /// pinned to a single long-lived connection for them.
    pub async fn with_max_connections(path: &str, max_connections: u32) -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| StoreError::Storage(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .pragma("foreign_keys", "ON");

        let ephemeral = path.contains(":memory:");
        let mut pool_options = SqlitePoolOptions::new();
        pool_options = if ephemeral {
            pool_options
                .max_connections(1)
                .idle_timeout(None::<std::time::Duration>)
                .max_lifetime(None::<std::time::Duration>)
        } else {
            pool_options.max_connections(max_connections.max(1))
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite store initialized at {path}");
        Ok(store)
    }

    /// Create from an existing pool (useful for testing).
    pub async fn from_pool(pool: SqlitePool) -> StoreResult<Self> {
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> StoreResult<()> {
        let statements: [(&str, &str); 8] = [
            (
                "users table",
                r#"
                CREATE TABLE IF NOT EXISTS users (
                    id           INTEGER PRIMARY KEY AUTOINCREMENT,
                    external_id  TEXT UNIQUE NOT NULL,
                    username     TEXT NOT NULL,
                    auth_token   TEXT NOT NULL,
                    created_at   TEXT NOT NULL
                )
                "#,
            ),
            (
                "incomes table",
                r#"
                CREATE TABLE IF NOT EXISTS incomes (
                    id                INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id           INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    name              TEXT NOT NULL,
                    amount            INTEGER NOT NULL,
                    frequency         TEXT NOT NULL,
                    recurring_day     INTEGER NOT NULL,
                    notification_hour INTEGER NOT NULL,
                    next_pay_date     TEXT NOT NULL,
                    created_at        TEXT NOT NULL,
                    updated_at        TEXT NOT NULL
                )
                "#,
            ),
            (
                "incomes due index",
                "CREATE INDEX IF NOT EXISTS idx_incomes_next_pay_date ON incomes(next_pay_date)",
            ),
            (
                "expenses table",
                r#"
                CREATE TABLE IF NOT EXISTS expenses (
                    id          INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id     INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    name        TEXT NOT NULL,
                    amount      INTEGER NOT NULL,
                    created_at  TEXT NOT NULL
                )
                "#,
            ),
            (
                "savings_goals table",
                r#"
                CREATE TABLE IF NOT EXISTS savings_goals (
                    id                   INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id              INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    name                 TEXT NOT NULL,
                    target_amount        INTEGER NOT NULL,
                    current_amount       INTEGER NOT NULL DEFAULT 0,
                    priority             INTEGER NOT NULL,
                    monthly_contrib      INTEGER NOT NULL DEFAULT 0,
                    monthly_budget_limit INTEGER NOT NULL DEFAULT 0,
                    monthly_accumulated  INTEGER NOT NULL DEFAULT 0,
                    month_started        TEXT,
                    target_date          TEXT,
                    status               TEXT NOT NULL DEFAULT 'active',
                    created_at           TEXT NOT NULL,
                    updated_at           TEXT NOT NULL
                )
                "#,
            ),
            (
                "goals user index",
                "CREATE INDEX IF NOT EXISTS idx_goals_user_priority ON savings_goals(user_id, status, priority)",
            ),
            (
                "monthly_contributions table",
                r#"
                CREATE TABLE IF NOT EXISTS monthly_contributions (
                    id                 INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id            INTEGER NOT NULL,
                    goal_id            INTEGER NOT NULL,
                    month              TEXT NOT NULL,
                    amount_contributed INTEGER NOT NULL DEFAULT 0,
                    created_at         TEXT NOT NULL,
                    updated_at         TEXT NOT NULL,
                    UNIQUE(user_id, goal_id, month)
                )
                "#,
            ),
            (
                "income_processing_log table",
                r#"
                CREATE TABLE IF NOT EXISTS income_processing_log (
                    id             INTEGER PRIMARY KEY AUTOINCREMENT,
                    income_id      INTEGER NOT NULL,
                    user_id        INTEGER NOT NULL,
                    processed_date TEXT NOT NULL,
                    income_amount  INTEGER NOT NULL,
                    created_at     TEXT NOT NULL,
                    UNIQUE(income_id, processed_date)
                )
                "#,
            ),
        ];

        for (what, sql) in statements {
            sqlx::query(sql)
                .execute(&self.pool)
                .await
                .map_err(|e| StoreError::MigrationFailed(format!("{what}: {e}")))?;
        }

        debug!("SQLite migrations complete");
        Ok(())
    }
}

fn fmt_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn fmt_date(date: &NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn col<'r, T>(row: &'r SqliteRow, name: &str) -> StoreResult<T>
where
    T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(name)
        .map_err(|e| StoreError::QueryFailed(format!("{name} column: {e}")))
}

fn ts_col(row: &SqliteRow, name: &str) -> StoreResult<DateTime<Utc>> {
    let raw: String = col(row, name)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::CorruptRow(format!("{name} '{raw}': {e}")))
}

fn date_col(row: &SqliteRow, name: &str) -> StoreResult<NaiveDate> {
    let raw: String = col(row, name)?;
    NaiveDate::parse_from_str(&raw, DATE_FORMAT)
        .map_err(|e| StoreError::CorruptRow(format!("{name} '{raw}': {e}")))
}

fn opt_date_col(row: &SqliteRow, name: &str) -> StoreResult<Option<NaiveDate>> {
    let raw: Option<String> = col(row, name)?;
    raw.map(|s| {
        NaiveDate::parse_from_str(&s, DATE_FORMAT)
            .map_err(|e| StoreError::CorruptRow(format!("{name} '{s}': {e}")))
    })
    .transpose()
}

fn u32_col(row: &SqliteRow, name: &str) -> StoreResult<u32> {
    let raw: i64 = col(row, name)?;
    u32::try_from(raw).map_err(|_| StoreError::CorruptRow(format!("{name} out of range: {raw}")))
}

fn row_to_user(row: &SqliteRow) -> StoreResult<User> {
    Ok(User {
        id: UserId(col(row, "id")?),
        external_id: col(row, "external_id")?,
        username: col(row, "username")?,
        auth_token: col(row, "auth_token")?,
        created_at: ts_col(row, "created_at")?,
    })
}

fn row_to_income(row: &SqliteRow) -> StoreResult<Income> {
    let frequency: String = col(row, "frequency")?;
    Ok(Income {
        id: IncomeId(col(row, "id")?),
        user_id: UserId(col(row, "user_id")?),
        name: col(row, "name")?,
        amount: col(row, "amount")?,
        frequency: Frequency::from_str(&frequency).map_err(StoreError::CorruptRow)?,
        recurring_day: u32_col(row, "recurring_day")?,
        notification_hour: u32_col(row, "notification_hour")?,
        next_pay_date: ts_col(row, "next_pay_date")?,
        created_at: ts_col(row, "created_at")?,
        updated_at: ts_col(row, "updated_at")?,
    })
}

fn row_to_expense(row: &SqliteRow) -> StoreResult<Expense> {
    Ok(Expense {
        id: ExpenseId(col(row, "id")?),
        user_id: UserId(col(row, "user_id")?),
        name: col(row, "name")?,
        amount: col(row, "amount")?,
        created_at: ts_col(row, "created_at")?,
    })
}

fn row_to_goal(row: &SqliteRow) -> StoreResult<SavingsGoal> {
    let status: String = col(row, "status")?;
    Ok(SavingsGoal {
        id: GoalId(col(row, "id")?),
        user_id: UserId(col(row, "user_id")?),
        name: col(row, "name")?,
        target_amount: col(row, "target_amount")?,
        current_amount: col(row, "current_amount")?,
        priority: u32_col(row, "priority")?,
        monthly_contrib: col(row, "monthly_contrib")?,
        monthly_budget_limit: col(row, "monthly_budget_limit")?,
        monthly_accumulated: col(row, "monthly_accumulated")?,
        month_started: opt_date_col(row, "month_started")?,
        target_date: opt_date_col(row, "target_date")?,
        status: GoalStatus::from_str(&status).map_err(StoreError::CorruptRow)?,
        created_at: ts_col(row, "created_at")?,
        updated_at: ts_col(row, "updated_at")?,
    })
}

fn row_to_contribution(row: &SqliteRow) -> StoreResult<MonthlyContribution> {
    Ok(MonthlyContribution {
        id: col(row, "id")?,
        user_id: UserId(col(row, "user_id")?),
        goal_id: GoalId(col(row, "goal_id")?),
        month: date_col(row, "month")?,
        amount_contributed: col(row, "amount_contributed")?,
        created_at: ts_col(row, "created_at")?,
        updated_at: ts_col(row, "updated_at")?,
    })
}

#[async_trait]
impl UserStore for SqliteStore {
    async fn create_user(
        &self,
        external_id: &str,
        username: &str,
        auth_token: &str,
    ) -> StoreResult<User> {
        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO users (external_id, username, auth_token, created_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(external_id)
        .bind(username)
        .bind(auth_token)
        .bind(fmt_ts(&now))
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                StoreError::Conflict(format!("user with external id {external_id} exists"))
            }
            other => StoreError::Storage(format!("INSERT user failed: {other}")),
        })?;

        Ok(User {
            id: UserId(result.last_insert_rowid()),
            external_id: external_id.to_string(),
            username: username.to_string(),
            auth_token: auth_token.to_string(),
            created_at: now,
        })
    }

    async fn get_user(&self, id: UserId) -> StoreResult<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE id = ?1")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("GET user: {e}")))?;
        row.as_ref().map(row_to_user).transpose()
    }

    async fn get_user_by_external_id(&self, external_id: &str) -> StoreResult<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE external_id = ?1")
            .bind(external_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("GET user by external id: {e}")))?;
        row.as_ref().map(row_to_user).transpose()
    }
}

#[async_trait]
impl IncomeStore for SqliteStore {
    async fn create_income(&self, income: NewIncome) -> StoreResult<Income> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO incomes
                (user_id, name, amount, frequency, recurring_day, notification_hour,
                 next_pay_date, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
            "#,
        )
        .bind(income.user_id.0)
        .bind(&income.name)
        .bind(income.amount)
        .bind(income.frequency.as_str())
        .bind(i64::from(income.recurring_day))
        .bind(i64::from(income.notification_hour))
        .bind(fmt_ts(&income.next_pay_date))
        .bind(fmt_ts(&now))
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("INSERT income failed: {e}")))?;

        Ok(Income {
            id: IncomeId(result.last_insert_rowid()),
            user_id: income.user_id,
            name: income.name,
            amount: income.amount,
            frequency: income.frequency,
            recurring_day: income.recurring_day,
            notification_hour: income.notification_hour,
            next_pay_date: income.next_pay_date,
            created_at: now,
            updated_at: now,
        })
    }

    async fn get_income(&self, id: IncomeId) -> StoreResult<Option<Income>> {
        let row = sqlx::query("SELECT * FROM incomes WHERE id = ?1")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("GET income: {e}")))?;
        row.as_ref().map(row_to_income).transpose()
    }

    async fn list_user_incomes(&self, user_id: UserId) -> StoreResult<Vec<Income>> {
        let rows = sqlx::query("SELECT * FROM incomes WHERE user_id = ?1 ORDER BY id")
            .bind(user_id.0)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("LIST incomes: {e}")))?;
        rows.iter().map(row_to_income).collect()
    }

    async fn list_due_incomes(&self, until: DateTime<Utc>) -> StoreResult<Vec<Income>> {
        let rows = sqlx::query(
            "SELECT * FROM incomes WHERE next_pay_date <= ?1 ORDER BY next_pay_date, id",
        )
        .bind(fmt_ts(&until))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("LIST due incomes: {e}")))?;
        rows.iter().map(row_to_income).collect()
    }

    async fn update_next_pay_date(&self, id: IncomeId, next: DateTime<Utc>) -> StoreResult<()> {
        let result =
            sqlx::query("UPDATE incomes SET next_pay_date = ?1, updated_at = ?2 WHERE id = ?3")
                .bind(fmt_ts(&next))
                .bind(fmt_ts(&Utc::now()))
                .bind(id.0)
                .execute(&self.pool)
                .await
                .map_err(|e| StoreError::Storage(format!("UPDATE income failed: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::QueryFailed(format!("income {id} does not exist")));
        }
        Ok(())
    }

    async fn delete_income(&self, id: IncomeId) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM incomes WHERE id = ?1")
            .bind(id.0)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(format!("DELETE income failed: {e}")))?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl ExpenseStore for SqliteStore {
    async fn create_expense(
        &self,
        user_id: UserId,
        name: &str,
        amount: i64,
    ) -> StoreResult<Expense> {
        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO expenses (user_id, name, amount, created_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(user_id.0)
        .bind(name)
        .bind(amount)
        .bind(fmt_ts(&now))
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("INSERT expense failed: {e}")))?;

        Ok(Expense {
            id: ExpenseId(result.last_insert_rowid()),
            user_id,
            name: name.to_string(),
            amount,
            created_at: now,
        })
    }

    async fn get_expense(&self, id: ExpenseId) -> StoreResult<Option<Expense>> {
        let row = sqlx::query("SELECT * FROM expenses WHERE id = ?1")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("GET expense: {e}")))?;
        row.as_ref().map(row_to_expense).transpose()
    }

    async fn list_user_expenses(&self, user_id: UserId) -> StoreResult<Vec<Expense>> {
        let rows = sqlx::query("SELECT * FROM expenses WHERE user_id = ?1 ORDER BY id")
            .bind(user_id.0)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("LIST expenses: {e}")))?;
        rows.iter().map(row_to_expense).collect()
    }

    async fn delete_expense(&self, id: ExpenseId) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM expenses WHERE id = ?1")
            .bind(id.0)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(format!("DELETE expense failed: {e}")))?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl GoalStore for SqliteStore {
    async fn create_goal(&self, goal: NewGoal) -> StoreResult<SavingsGoal> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO savings_goals
                (user_id, name, target_amount, current_amount, priority, status, created_at, updated_at)
            VALUES (?1, ?2, ?3, 0, ?4, 'active', ?5, ?5)
            "#,
        )
        .bind(goal.user_id.0)
        .bind(&goal.name)
        .bind(goal.target_amount)
        .bind(i64::from(goal.priority))
        .bind(fmt_ts(&now))
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("INSERT goal failed: {e}")))?;

        Ok(SavingsGoal {
            id: GoalId(result.last_insert_rowid()),
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
        })
    }

    async fn get_goal(&self, id: GoalId) -> StoreResult<Option<SavingsGoal>> {
        let row = sqlx::query("SELECT * FROM savings_goals WHERE id = ?1")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("GET goal: {e}")))?;
        row.as_ref().map(row_to_goal).transpose()
    }

    async fn list_active_goals(&self, user_id: UserId) -> StoreResult<Vec<SavingsGoal>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM savings_goals
            WHERE user_id = ?1 AND status = 'active'
            ORDER BY priority ASC, created_at ASC, id ASC
            "#,
        )
        .bind(user_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("LIST active goals: {e}")))?;
        rows.iter().map(row_to_goal).collect()
    }

    async fn list_goals(&self, user_id: UserId) -> StoreResult<Vec<SavingsGoal>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM savings_goals
            WHERE user_id = ?1
            ORDER BY priority ASC, created_at ASC, id ASC
            "#,
        )
        .bind(user_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("LIST goals: {e}")))?;
        rows.iter().map(row_to_goal).collect()
    }

    async fn update_goal(&self, goal: &SavingsGoal) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE savings_goals SET
                name = ?1,
                target_amount = ?2,
                current_amount = ?3,
                priority = ?4,
                monthly_contrib = ?5,
                monthly_budget_limit = ?6,
                monthly_accumulated = ?7,
                month_started = ?8,
                target_date = ?9,
                status = ?10,
                updated_at = ?11
            WHERE id = ?12
            "#,
        )
        .bind(&goal.name)
        .bind(goal.target_amount)
        .bind(goal.current_amount)
        .bind(i64::from(goal.priority))
        .bind(goal.monthly_contrib)
        .bind(goal.monthly_budget_limit)
        .bind(goal.monthly_accumulated)
        .bind(goal.month_started.as_ref().map(fmt_date))
        .bind(goal.target_date.as_ref().map(fmt_date))
        .bind(goal.status.as_str())
        .bind(fmt_ts(&Utc::now()))
        .bind(goal.id.0)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("UPDATE goal failed: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::QueryFailed(format!("goal {} does not exist", goal.id)));
        }
        Ok(())
    }

    async fn delete_goal(&self, id: GoalId) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM savings_goals WHERE id = ?1")
            .bind(id.0)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(format!("DELETE goal failed: {e}")))?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl LedgerStore for SqliteStore {
    async fn insert_contribution_if_absent(
        &self,
        user_id: UserId,
        goal_id: GoalId,
        month: NaiveDate,
        amount: i64,
    ) -> StoreResult<Option<MonthlyContribution>> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO monthly_contributions
                (user_id, goal_id, month, amount_contributed, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?5)
            ON CONFLICT(user_id, goal_id, month) DO NOTHING
            "#,
        )
        .bind(user_id.0)
        .bind(goal_id.0)
        .bind(fmt_date(&month))
        .bind(amount)
        .bind(fmt_ts(&now))
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("INSERT contribution failed: {e}")))?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        Ok(Some(MonthlyContribution {
            id: result.last_insert_rowid(),
            user_id,
            goal_id,
            month,
            amount_contributed: amount,
            created_at: now,
            updated_at: now,
        }))
    }

    async fn get_contribution(
        &self,
        user_id: UserId,
        goal_id: GoalId,
        month: NaiveDate,
    ) -> StoreResult<Option<MonthlyContribution>> {
        let row = sqlx::query(
            "SELECT * FROM monthly_contributions WHERE user_id = ?1 AND goal_id = ?2 AND month = ?3",
        )
        .bind(user_id.0)
        .bind(goal_id.0)
        .bind(fmt_date(&month))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("GET contribution: {e}")))?;
        row.as_ref().map(row_to_contribution).transpose()
    }

    async fn update_contribution(&self, row: &MonthlyContribution) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE monthly_contributions SET amount_contributed = ?1, updated_at = ?2 WHERE id = ?3",
        )
        .bind(row.amount_contributed)
        .bind(fmt_ts(&Utc::now()))
        .bind(row.id)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("UPDATE contribution failed: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::QueryFailed(format!(
                "contribution {} does not exist",
                row.id
            )));
        }
        Ok(())
    }

    async fn list_user_contributions(
        &self,
        user_id: UserId,
        month: NaiveDate,
    ) -> StoreResult<Vec<MonthlyContribution>> {
        let rows = sqlx::query(
            "SELECT * FROM monthly_contributions WHERE user_id = ?1 AND month = ?2 ORDER BY goal_id",
        )
        .bind(user_id.0)
        .bind(fmt_date(&month))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("LIST contributions: {e}")))?;
        rows.iter().map(row_to_contribution).collect()
    }
}

#[async_trait]
impl ProcessingLogStore for SqliteStore {
    async fn is_income_processed(&self, income_id: IncomeId, date: NaiveDate) -> StoreResult<bool> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS cnt FROM income_processing_log WHERE income_id = ?1 AND processed_date = ?2",
        )
        .bind(income_id.0)
        .bind(fmt_date(&date))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("CHECK processing log: {e}")))?;

        let cnt: i64 = col(&row, "cnt")?;
        Ok(cnt > 0)
    }

    async fn record_income_processed(
        &self,
        income_id: IncomeId,
        user_id: UserId,
        date: NaiveDate,
        income_amount: i64,
    ) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO income_processing_log
                (income_id, user_id, processed_date, income_amount, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(income_id, processed_date) DO NOTHING
            "#,
        )
        .bind(income_id.0)
        .bind(user_id.0)
        .bind(fmt_date(&date))
        .bind(income_amount)
        .bind(fmt_ts(&Utc::now()))
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("INSERT processing log failed: {e}")))?;

        Ok(result.rows_affected() > 0)
    }
}

impl FinanceStore for SqliteStore {
    fn backend_name(&self) -> &str {
        "sqlite"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    async fn test_store() -> SqliteStore {
        SqliteStore::new("sqlite::memory:").await.unwrap()
    }

    fn month(y: i32, m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, 1).unwrap()
    }

    async fn user(store: &SqliteStore) -> User {
        store.create_user("100", "alice", "tok").await.unwrap()
    }

    #[tokio::test]
    async fn user_lookup_by_external_id() {
        let store = test_store().await;
        let created = user(&store).await;

        let found = store.get_user_by_external_id("100").await.unwrap().unwrap();
        assert_eq!(found.id, created.id);
        assert_eq!(found.auth_token, "tok");
        assert!(store.get_user_by_external_id("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn expense_get_and_delete() {
        let store = test_store().await;
        let u = user(&store).await;
        let rent = store.create_expense(u.id, "rent", 3_000).await.unwrap();

        let found = store.get_expense(rent.id).await.unwrap().unwrap();
        assert_eq!((found.name.as_str(), found.amount, found.user_id), ("rent", 3_000, u.id));

        assert!(store.delete_expense(rent.id).await.unwrap());
        assert!(store.get_expense(rent.id).await.unwrap().is_none());
        assert!(!store.delete_expense(rent.id).await.unwrap());
    }

    #[tokio::test]
    async fn duplicate_external_id_is_conflict() {
        let store = test_store().await;
        user(&store).await;
        let err = store.create_user("100", "bob", "x").await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn due_incomes_are_selected_by_timestamp() {
        let store = test_store().await;
        let u = user(&store).await;
        let due = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        let later = Utc.with_ymd_and_hms(2026, 3, 15, 9, 0, 0).unwrap();

        for (name, day, at) in [("salary", 1, due), ("bonus", 15, later)] {
            store
                .create_income(NewIncome {
                    user_id: u.id,
                    name: name.into(),
                    amount: 50_000,
                    frequency: Frequency::Monthly,
                    recurring_day: day,
                    notification_hour: 9,
                    next_pay_date: at,
                })
                .await
                .unwrap();
        }

        let before = store
            .list_due_incomes(Utc.with_ymd_and_hms(2026, 3, 1, 8, 59, 59).unwrap())
            .await
            .unwrap();
        assert!(before.is_empty());

        let at_nine = store
            .list_due_incomes(Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap())
            .await
            .unwrap();
        assert_eq!(at_nine.len(), 1);
        assert_eq!(at_nine[0].name, "salary");

        store
            .update_next_pay_date(at_nine[0].id, Utc.with_ymd_and_hms(2026, 4, 1, 9, 0, 0).unwrap())
            .await
            .unwrap();
        let again = store
            .list_due_incomes(Utc.with_ymd_and_hms(2026, 3, 2, 0, 0, 0).unwrap())
            .await
            .unwrap();
        assert!(again.is_empty());
    }

    #[tokio::test]
    async fn goal_update_roundtrips_all_columns() {
        let store = test_store().await;
        let u = user(&store).await;
        let mut goal = store
            .create_goal(NewGoal {
                user_id: u.id,
                name: "Laptop".into(),
                target_amount: 10_000,
                priority: 1,
            })
            .await
            .unwrap();

        goal.current_amount = 2_500;
        goal.monthly_contrib = 3_000;
        goal.monthly_budget_limit = 3_000;
        goal.monthly_accumulated = 2_500;
        goal.month_started = Some(month(2026, 3));
        goal.target_date = Some(NaiveDate::from_ymd_opt(2026, 6, 10).unwrap());
        store.update_goal(&goal).await.unwrap();

        let back = store.get_goal(goal.id).await.unwrap().unwrap();
        assert_eq!(back.current_amount, 2_500);
        assert_eq!(back.monthly_budget_limit, 3_000);
        assert_eq!(back.month_started, Some(month(2026, 3)));
        assert_eq!(back.target_date, goal.target_date);
        assert_eq!(back.status, GoalStatus::Active);
    }

    #[tokio::test]
    async fn active_goals_ordered_by_priority() {
        let store = test_store().await;
        let u = user(&store).await;
        for (name, priority) in [("c", 3), ("a", 1), ("b", 2)] {
            store
                .create_goal(NewGoal {
                    user_id: u.id,
                    name: name.into(),
                    target_amount: 1_000,
                    priority,
                })
                .await
                .unwrap();
        }
        let names: Vec<String> = store
            .list_active_goals(u.id)
            .await
            .unwrap()
            .into_iter()
            .map(|g| g.name)
            .collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn ledger_insert_is_unique_per_month() {
        let store = test_store().await;
        let u = user(&store).await;
        let g = GoalId(7);

        let first = store
            .insert_contribution_if_absent(u.id, g, month(2026, 3), 100)
            .await
            .unwrap();
        assert!(first.is_some());

        let second = store
            .insert_contribution_if_absent(u.id, g, month(2026, 3), 999)
            .await
            .unwrap();
        assert!(second.is_none());

        let mut row = store
            .get_contribution(u.id, g, month(2026, 3))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.amount_contributed, 100);

        row.amount_contributed = 250;
        store.update_contribution(&row).await.unwrap();

        let rows = store.list_user_contributions(u.id, month(2026, 3)).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].amount_contributed, 250);
        assert!(store.list_user_contributions(u.id, month(2026, 4)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn processing_log_first_writer_wins() {
        let store = test_store().await;
        let u = user(&store).await;
        let day = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();

        assert!(!store.is_income_processed(IncomeId(1), day).await.unwrap());
        assert!(store.record_income_processed(IncomeId(1), u.id, day, 5_000).await.unwrap());
        assert!(!store.record_income_processed(IncomeId(1), u.id, day, 5_000).await.unwrap());
        assert!(store.is_income_processed(IncomeId(1), day).await.unwrap());
        assert!(!store.is_income_processed(IncomeId(1), day.succ_opt().unwrap()).await.unwrap());
    }

    #[tokio::test]
    async fn file_database_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = format!("sqlite://{}", dir.path().join("stash.db").display());

        {
            let store = SqliteStore::new(&path).await.unwrap();
            user(&store).await;
        }

        let store = SqliteStore::new(&path).await.unwrap();
        assert!(store.get_user_by_external_id("100").await.unwrap().is_some());
    }
}
