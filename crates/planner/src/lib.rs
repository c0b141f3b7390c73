//! Stashflow planner: turns income, expenses and goals into a monthly plan.
//!
//! - `allocator`: priority-weighted split of the monthly surplus
//! - `ledger`: per (user, goal, month) contribution record
//! - `reindex`: keeps active-goal priorities dense
//! - `recommend`: advisory split of a single payday
//! - `contribution`: manual contributions and withdrawals
//! - `service`: `FinanceService`, the facade over all of the above
//! - `dialog`: payday button presses and typed amounts

pub mod allocator;
pub mod contribution;
pub mod dialog;
pub mod ledger;
pub mod recommend;
pub mod reindex;
pub mod service;

pub use allocator::{AllocationReport, GoalAllocation, GoalAllocator, allocate};
pub use contribution::{ContributionOutcome, GoalContributionService, StatusChange};
pub use dialog::{PaydayDesk, PendingInput, Reply, SessionStore};
pub use ledger::ContributionLedger;
pub use recommend::{Recommendation, RecommendationLine, recommend};
pub use reindex::PriorityReindexer;
pub use service::{FinanceService, IncomeSpec};
