//! Contribution ledger: what each goal received in each month.
//!
//! Rows are keyed by (user, goal, month) where month is the first day of
//! the month. Rows are created on the first contribution in a month, then
//! updated; they are never deleted.

use chrono::NaiveDate;
use stashflow_core::calendar::month_start;
use stashflow_core::error::{Error, Result};
use stashflow_core::model::{GoalId, MonthlyContribution, UserId};
use stashflow_core::store::FinanceStore;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

pub struct ContributionLedger {
    store: Arc<dyn FinanceStore>,
}

impl ContributionLedger {
    pub fn new(store: Arc<dyn FinanceStore>) -> Self {
        Self { store }
    }

    /// Insert a row unless one exists; `None` means it already existed.
    pub async fn create_if_absent(
        &self,
        user_id: UserId,
        goal_id: GoalId,
        month: NaiveDate,
        amount: i64,
    ) -> Result<Option<MonthlyContribution>> {
        let month = month_start(month);
        Ok(self
            .store
            .insert_contribution_if_absent(user_id, goal_id, month, amount)
            .await?)
    }

    pub async fn find(
        &self,
        user_id: UserId,
        goal_id: GoalId,
        month: NaiveDate,
    ) -> Result<Option<MonthlyContribution>> {
        Ok(self
            .store
            .get_contribution(user_id, goal_id, month_start(month))
            .await?)
    }

    /// Like [`ContributionLedger::find`] but a missing row is `NotFound`.
    pub async fn get(
        &self,
        user_id: UserId,
        goal_id: GoalId,
        month: NaiveDate,
    ) -> Result<MonthlyContribution> {
        let month = month_start(month);
        self.find(user_id, goal_id, month).await?.ok_or_else(|| {
            Error::not_found("contribution", format!("goal {goal_id} in {month}"))
        })
    }

    pub async fn update(&self, row: &MonthlyContribution) -> Result<()> {
        Ok(self.store.update_contribution(row).await?)
    }

    /// Set the month's amount for a goal, creating the row if needed.
    ///
    /// Two writers racing on a fresh row both end up updating it; the last
    /// write wins.
    pub async fn upsert(
        &self,
        user_id: UserId,
        goal_id: GoalId,
        month: NaiveDate,
        amount: i64,
    ) -> Result<MonthlyContribution> {
        if let Some(created) = self.create_if_absent(user_id, goal_id, month, amount).await? {
            debug!(%user_id, %goal_id, month = %created.month, amount, "Ledger row created");
            return Ok(created);
        }

        let mut row = self.get(user_id, goal_id, month).await?;
        row.amount_contributed = amount;
        self.update(&row).await?;
        debug!(%user_id, %goal_id, month = %row.month, amount, "Ledger row updated");
        Ok(row)
    }

    /// Amount already contributed per goal in the given month.
    pub async fn month_totals(
        &self,
        user_id: UserId,
        month: NaiveDate,
    ) -> Result<HashMap<GoalId, i64>> {
        let rows = self
            .store
            .list_user_contributions(user_id, month_start(month))
            .await?;
        Ok(rows
            .into_iter()
            .map(|r| (r.goal_id, r.amount_contributed))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stashflow_core::store::UserStore;
    use stashflow_store::InMemoryStore;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    async fn setup() -> (ContributionLedger, UserId) {
        let store = Arc::new(InMemoryStore::new());
        let user = store.create_user("100", "alice", "tok").await.unwrap();
        (ContributionLedger::new(store), user.id)
    }

    #[tokio::test]
    async fn month_is_normalized_to_first_day() {
        let (ledger, user) = setup().await;
        ledger
            .create_if_absent(user, GoalId(1), date(2026, 3, 17), 40)
            .await
            .unwrap()
            .unwrap();
        let row = ledger.get(user, GoalId(1), date(2026, 3, 2)).await.unwrap();
        assert_eq!(row.month, date(2026, 3, 1));
    }

    #[tokio::test]
    async fn get_missing_row_is_not_found() {
        let (ledger, user) = setup().await;
        let err = ledger.get(user, GoalId(1), date(2026, 3, 1)).await.unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[tokio::test]
    async fn upsert_creates_then_updates() {
        let (ledger, user) = setup().await;
        let first = ledger.upsert(user, GoalId(1), date(2026, 3, 5), 100).await.unwrap();
        let second = ledger.upsert(user, GoalId(1), date(2026, 3, 25), 300).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(
            ledger.get(user, GoalId(1), date(2026, 3, 1)).await.unwrap().amount_contributed,
            300
        );
    }

    #[tokio::test]
    async fn month_totals_only_cover_that_month() {
        let (ledger, user) = setup().await;
        ledger.upsert(user, GoalId(1), date(2026, 3, 1), 100).await.unwrap();
        ledger.upsert(user, GoalId(2), date(2026, 3, 1), 50).await.unwrap();
        ledger.upsert(user, GoalId(1), date(2026, 4, 1), 999).await.unwrap();

        let totals = ledger.month_totals(user, date(2026, 3, 9)).await.unwrap();
        assert_eq!(totals.len(), 2);
        assert_eq!(totals[&GoalId(1)], 100);
        assert_eq!(totals[&GoalId(2)], 50);
    }
}
