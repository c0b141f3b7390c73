//! # Stashflow Core
//!
//! Domain types, traits, and error definitions for the Stashflow savings
//! planner. This crate has **no storage or transport dependencies**: it
//! defines the model that every other crate implements against.
//!
//! ## Design Philosophy
//!
//! Persistence, chat delivery and identity are traits here. Implementations
//! live in their respective crates, so the planner and scheduler can be
//! driven against in-memory stand-ins in tests.

pub mod calendar;
pub mod channel;
pub mod clock;
pub mod error;
pub mod identity;
pub mod model;
pub mod store;

// Re-export key types at crate root for ergonomics
pub use channel::{Channel, ChannelId, ChannelMessage, Control, Controls};
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{ChannelError, Error, IdentityError, Result, StoreError};
pub use identity::IdentityProvider;
pub use model::{
    Expense, ExpenseId, Frequency, GoalId, GoalStatus, Income, IncomeId, IncomeProcessingLog,
    MonthlyContribution, NewGoal, NewIncome, SavingsGoal, User, UserId,
};
pub use store::{
    ExpenseStore, FinanceStore, GoalStore, IncomeStore, LedgerStore, ProcessingLogStore,
    UserStore,
};
