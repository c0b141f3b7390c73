//! Domain model: users, incomes, expenses, savings goals and the two
//! bookkeeping tables (monthly ledger and income processing log).
//!
//! Money is always whole units in `i64`. There is no currency and no
//! sub-unit precision.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(
    /// Internal user identifier.
    UserId
);
id_type!(
    /// Income source identifier.
    IncomeId
);
id_type!(
    /// Expense identifier.
    ExpenseId
);
id_type!(
    /// Savings goal identifier.
    GoalId
);

/// A registered user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,

    /// Chat-platform identifier used for delivery.
    pub external_id: String,

    pub username: String,

    /// Opaque token issued by the identity service (or a local placeholder).
    #[serde(skip_serializing, default)]
    pub auth_token: String,

    pub created_at: DateTime<Utc>,
}

/// How often an income is paid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    /// `recurring_day` is a day of month, 1..=31.
    Monthly,
    /// `recurring_day` is a weekday, 0 = Sunday .. 6 = Saturday.
    Weekly,
    /// Same weekday convention as weekly, every other week.
    Biweekly,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Monthly => "monthly",
            Frequency::Weekly => "weekly",
            Frequency::Biweekly => "biweekly",
        }
    }
}

impl std::fmt::Display for Frequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Frequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "monthly" => Ok(Frequency::Monthly),
            "weekly" => Ok(Frequency::Weekly),
            "biweekly" => Ok(Frequency::Biweekly),
            other => Err(format!("unknown frequency: {other}")),
        }
    }
}

/// A recurring income source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Income {
    pub id: IncomeId,
    pub user_id: UserId,
    pub name: String,
    pub amount: i64,
    pub frequency: Frequency,
    pub recurring_day: u32,
    /// Hour of day (0..=23, UTC) the payday notification goes out.
    pub notification_hour: u32,
    pub next_pay_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields needed to insert a new income.
#[derive(Debug, Clone)]
pub struct NewIncome {
    pub user_id: UserId,
    pub name: String,
    pub amount: i64,
    pub frequency: Frequency,
    pub recurring_day: u32,
    pub notification_hour: u32,
    pub next_pay_date: DateTime<Utc>,
}

/// A flat monthly expense.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Expense {
    pub id: ExpenseId,
    pub user_id: UserId,
    pub name: String,
    pub amount: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalStatus {
    Active,
    Completed,
}

impl GoalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GoalStatus::Active => "active",
            GoalStatus::Completed => "completed",
        }
    }
}

impl std::str::FromStr for GoalStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(GoalStatus::Active),
            "completed" => Ok(GoalStatus::Completed),
            other => Err(format!("unknown goal status: {other}")),
        }
    }
}

/// A savings goal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavingsGoal {
    pub id: GoalId,
    pub user_id: UserId,
    pub name: String,
    pub target_amount: i64,
    pub current_amount: i64,

    /// Dense rank among the user's active goals, 1 = highest.
    pub priority: u32,

    /// Planned contribution for this month, set by the allocator.
    pub monthly_contrib: i64,

    /// Ceiling used by payday recommendations, set by the allocator.
    pub monthly_budget_limit: i64,

    /// Amount put in since `month_started`.
    pub monthly_accumulated: i64,

    /// First day of the month `monthly_accumulated` refers to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub month_started: Option<NaiveDate>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_date: Option<NaiveDate>,

    pub status: GoalStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SavingsGoal {
    /// What is still missing to reach the target, never negative.
    pub fn remaining_need(&self) -> i64 {
        (self.target_amount - self.current_amount).max(0)
    }

    pub fn is_active(&self) -> bool {
        self.status == GoalStatus::Active
    }

    /// Whole-number progress towards the target.
    pub fn progress_percent(&self) -> i64 {
        if self.target_amount <= 0 {
            return 0;
        }
        self.current_amount * 100 / self.target_amount
    }
}

/// Fields needed to insert a new goal.
#[derive(Debug, Clone)]
pub struct NewGoal {
    pub user_id: UserId,
    pub name: String,
    pub target_amount: i64,
    pub priority: u32,
}

/// One ledger row: what a user put into a goal during a month.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthlyContribution {
    pub id: i64,
    pub user_id: UserId,
    pub goal_id: GoalId,
    /// Always the first day of the month.
    pub month: NaiveDate,
    pub amount_contributed: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Marker that an income occurrence was handled on a given date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomeProcessingLog {
    pub id: i64,
    pub income_id: IncomeId,
    pub user_id: UserId,
    pub processed_date: NaiveDate,
    pub income_amount: i64,
    pub created_at: DateTime<Utc>,
}
