//! Payday notification text and controls.

use stashflow_channels::PaydayAction;
use stashflow_core::channel::{Control, Controls};
use stashflow_core::model::Income;
use stashflow_planner::Recommendation;

/// Message body and button rows for one due income.
///
/// Every active goal is listed with its progress and gets an "Other amount"
/// button; an "Add" button is offered only when its suggestion is positive.
/// A final row holds "Done".
pub fn render_notification(income: &Income, rec: &Recommendation) -> (String, Controls) {
    let mut text = format!("Payday! {} paid {}.\n", income.name, income.amount);
    let mut controls: Controls = Vec::with_capacity(rec.lines.len() + 1);

    if rec.is_empty() {
        text.push_str("You have no active savings goals.");
    } else {
        text.push_str(&format!(
            "This month: {} of {} planned saved so far.\n",
            rec.month_contributed(),
            rec.month_planned()
        ));
        text.push_str("Goals:\n");
        for line in &rec.lines {
            text.push_str(&format!(
                "- {}: {}/{} saved, still needs {}, suggested {}\n",
                line.goal_name,
                line.current_amount,
                line.target_amount,
                line.remaining_need,
                line.amount
            ));

            let mut row = Vec::with_capacity(2);
            if line.amount > 0 {
                row.push(Control::new(
                    format!("Add {} to {}", line.amount, line.goal_name),
                    PaydayAction::Apply {
                        income: income.id,
                        goal: line.goal_id,
                        amount: line.amount,
                    }
                    .encode(),
                ));
            }
            row.push(Control::new(
                format!("Other amount for {}", line.goal_name),
                PaydayAction::Custom {
                    income: income.id,
                    goal: line.goal_id,
                }
                .encode(),
            ));
            controls.push(row);
        }
        if rec.has_suggestions() {
            text.push_str(&format!("Left over: {}", rec.unallocated()));
        } else {
            text.push_str("This month's budgets are already met; pick an amount to save more.");
        }
    }

    controls.push(vec![Control::new(
        "Done",
        PaydayAction::Done { income: income.id }.encode(),
    )]);
    (text, controls)
}
