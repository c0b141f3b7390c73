//! Payday recommendations: how one income payment could be split.
//!
//! Pure and advisory: nothing is written. Goals are walked in priority
//! order, each taking at most
//! `min(remaining need, unused monthly budget, money left, half the payment)`.
//! Goals needing no more than the small-goal threshold are offered their
//! whole remaining need so they can be closed out, still bounded by the
//! money left.
//!
//! Every active goal gets a line, including goals whose suggestion is 0
//! because this month's budget is already met or the payment ran out.

use serde::Serialize;
use stashflow_core::model::{GoalId, SavingsGoal};
use std::collections::HashMap;

/// One goal's row: its progress and the suggested transfer (possibly 0).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecommendationLine {
    pub goal_id: GoalId,
    pub goal_name: String,
    pub amount: i64,
    /// Remaining need before this transfer.
    pub remaining_need: i64,
    pub current_amount: i64,
    pub target_amount: i64,
    /// Already put in this month.
    pub contributed: i64,
    pub monthly_budget: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Recommendation {
    pub income_amount: i64,
    pub lines: Vec<RecommendationLine>,
    pub total: i64,
}

impl Recommendation {
    /// Money from the payment that no goal was offered.
    pub fn unallocated(&self) -> i64 {
        self.income_amount.max(0) - self.total
    }

    /// True when there are no active goals at all.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// True when at least one goal is offered money.
    pub fn has_suggestions(&self) -> bool {
        self.lines.iter().any(|l| l.amount > 0)
    }

    /// This month's contributions across all listed goals.
    pub fn month_contributed(&self) -> i64 {
        self.lines.iter().map(|l| l.contributed).sum()
    }

    /// This month's planned budget across all listed goals.
    pub fn month_planned(&self) -> i64 {
        self.lines.iter().map(|l| l.monthly_budget).sum()
    }
}

/// Split `income_amount` across `goals` (sorted by priority, active only).
///
/// `contributed` holds what each goal already received this month.
pub fn recommend(
    income_amount: i64,
    goals: &[SavingsGoal],
    contributed: &HashMap<GoalId, i64>,
    small_goal_threshold: i64,
) -> Recommendation {
    let mut lines = Vec::new();
    let mut remaining_income = income_amount.max(0);
    let half_income = income_amount.max(0) / 2;

    for goal in goals.iter().filter(|g| g.is_active()) {
        let already = contributed.get(&goal.id).copied().unwrap_or(0);
        let room = (goal.monthly_budget_limit - already).max(0);
        let need = goal.remaining_need();

        let suggest = if need <= small_goal_threshold {
            need.min(remaining_income)
        } else {
            need.min(room).min(remaining_income).min(half_income)
        };

        let suggest = suggest.max(0);
        remaining_income -= suggest;
        lines.push(RecommendationLine {
            goal_id: goal.id,
            goal_name: goal.name.clone(),
            amount: suggest,
            remaining_need: need,
            current_amount: goal.current_amount,
            target_amount: goal.target_amount,
            contributed: already,
            monthly_budget: goal.monthly_budget_limit,
        });
    }

    let total = lines.iter().map(|l| l.amount).sum();
    Recommendation {
        income_amount,
        lines,
        total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use stashflow_core::model::{GoalStatus, UserId};

    fn goal(id: i64, priority: u32, target: i64, current: i64, limit: i64) -> SavingsGoal {
        SavingsGoal {
            id: GoalId(id),
            user_id: UserId(1),
            name: format!("g{id}"),
            target_amount: target,
            current_amount: current,
            priority,
            monthly_contrib: limit,
            monthly_budget_limit: limit,
            monthly_accumulated: 0,
            month_started: None,
            target_date: None,
            status: GoalStatus::Active,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn caps_by_half_income_and_budget_room() {
        let goals = vec![goal(1, 1, 100_000, 0, 40_000), goal(2, 2, 100_000, 0, 10_000)];
        let rec = recommend(60_000, &goals, &HashMap::new(), 5_000);

        assert_eq!(rec.lines[0].amount, 30_000); // half of the payment
        assert_eq!(rec.lines[1].amount, 10_000); // budget room
        assert_eq!(rec.total, 40_000);
        assert_eq!(rec.unallocated(), 20_000);
    }

    #[test]
    fn already_contributed_reduces_room() {
        let goals = vec![goal(1, 1, 100_000, 0, 12_000)];
        let contributed = HashMap::from([(GoalId(1), 9_000)]);
        let rec = recommend(50_000, &goals, &contributed, 5_000);
        assert_eq!(rec.lines[0].amount, 3_000);

        let contributed = HashMap::from([(GoalId(1), 15_000)]);
        let rec = recommend(50_000, &goals, &contributed, 5_000);
        assert!(!rec.has_suggestions());
        assert_eq!(rec.lines.len(), 1);
        assert_eq!(rec.lines[0].remaining_need, 100_000);
        assert_eq!(rec.month_contributed(), 15_000);
        assert_eq!(rec.month_planned(), 12_000);
    }

    #[test]
    fn small_goal_paid_off_past_half_cap() {
        // Need 4_000 > half of 6_000, but it is a small goal.
        let goals = vec![goal(1, 1, 10_000, 6_000, 0)];
        let rec = recommend(6_000, &goals, &HashMap::new(), 5_000);
        assert_eq!(rec.lines[0].amount, 4_000);
    }

    #[test]
    fn small_goal_override_bounded_by_money_left() {
        let goals = vec![goal(1, 1, 100_000, 0, 100_000), goal(2, 2, 4_000, 0, 0)];
        let rec = recommend(6_000, &goals, &HashMap::new(), 5_000);
        assert_eq!(rec.lines[0].amount, 3_000);
        assert_eq!(rec.lines[1].amount, 3_000);
        assert!(rec.total <= 6_000);
    }

    #[test]
    fn stops_when_income_exhausted() {
        let goals = vec![
            goal(1, 1, 2_000, 0, 0),
            goal(2, 2, 2_000, 0, 0),
            goal(3, 3, 2_000, 0, 0),
        ];
        let rec = recommend(3_000, &goals, &HashMap::new(), 5_000);
        assert_eq!(rec.lines.len(), 3);
        assert_eq!(rec.lines[1].amount, 1_000);
        assert_eq!(rec.lines[2].amount, 0);
        assert_eq!(rec.lines[2].remaining_need, 2_000);
        assert_eq!(rec.unallocated(), 0);
    }

    #[test]
    fn total_never_exceeds_income() {
        let goals: Vec<SavingsGoal> = (1..=6)
            .map(|i| goal(i, i as u32, 1_000 * i * 3, 0, 2_500 * i))
            .collect();
        for income in [0, 1, 999, 5_000, 12_345, 80_000] {
            let rec = recommend(income, &goals, &HashMap::new(), 5_000);
            assert!(rec.total <= income, "income {income} got {}", rec.total);
            assert!(rec.lines.iter().all(|l| l.amount <= l.remaining_need));
        }
    }

    #[test]
    fn non_positive_income_yields_nothing() {
        let goals = vec![goal(1, 1, 1_000, 0, 1_000)];
        assert!(!recommend(0, &goals, &HashMap::new(), 5_000).has_suggestions());
        assert!(!recommend(-10, &goals, &HashMap::new(), 5_000).has_suggestions());
    }
}
