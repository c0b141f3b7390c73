//! Payday callback payloads carried by message controls.
//!
//! Format: `payday:<verb>:<income>[:<goal>[:<amount>]]`
//! - `payday:apply:<income>:<goal>:<amount>`: put the suggested amount in
//! - `payday:custom:<income>:<goal>`: ask the user for an amount
//! - `payday:done:<income>`: close the payday dialog

use stashflow_core::error::ChannelError;
use stashflow_core::model::{GoalId, IncomeId};

const PREFIX: &str = "payday";

/// A parsed payday button press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaydayAction {
    Apply {
        income: IncomeId,
        goal: GoalId,
        amount: i64,
    },
    Custom {
        income: IncomeId,
        goal: GoalId,
    },
    Done {
        income: IncomeId,
    },
}

impl PaydayAction {
    pub fn income(&self) -> IncomeId {
        match self {
            PaydayAction::Apply { income, .. }
            | PaydayAction::Custom { income, .. }
            | PaydayAction::Done { income } => *income,
        }
    }

    /// Render as callback data.
    pub fn encode(&self) -> String {
        match self {
            PaydayAction::Apply {
                income,
                goal,
                amount,
            } => format!("{PREFIX}:apply:{income}:{goal}:{amount}"),
            PaydayAction::Custom { income, goal } => format!("{PREFIX}:custom:{income}:{goal}"),
            PaydayAction::Done { income } => format!("{PREFIX}:done:{income}"),
        }
    }

    /// Whether `data` looks like a payday payload at all.
    pub fn matches(data: &str) -> bool {
        data.split(':').next() == Some(PREFIX)
    }

    /// Parse callback data.
    pub fn parse(data: &str) -> Result<Self, ChannelError> {
        let invalid = |why: &str| ChannelError::InvalidPayload(format!("{why}: '{data}'"));
        let parts: Vec<&str> = data.trim().split(':').collect();

        if parts.first() != Some(&PREFIX) {
            return Err(invalid("not a payday payload"));
        }

        let id = |idx: usize, what: &str| -> Result<i64, ChannelError> {
            parts
                .get(idx)
                .ok_or_else(|| invalid(&format!("missing {what}")))?
                .parse::<i64>()
                .map_err(|_| invalid(&format!("bad {what}")))
        };

        match (parts.get(1).copied(), parts.len()) {
            (Some("apply"), 5) => {
                let amount = id(4, "amount")?;
                if amount <= 0 {
                    return Err(invalid("amount must be positive"));
                }
                Ok(PaydayAction::Apply {
                    income: IncomeId(id(2, "income id")?),
                    goal: GoalId(id(3, "goal id")?),
                    amount,
                })
            }
            (Some("custom"), 4) => Ok(PaydayAction::Custom {
                income: IncomeId(id(2, "income id")?),
                goal: GoalId(id(3, "goal id")?),
            }),
            (Some("done"), 3) => Ok(PaydayAction::Done {
                income: IncomeId(id(2, "income id")?),
            }),
            (Some(verb), _) => Err(invalid(&format!("unknown verb or arity for '{verb}'"))),
            (None, _) => Err(invalid("missing verb")),
        }
    }
}

impl std::fmt::Display for PaydayAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.encode())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_each_verb() {
        assert_eq!(
            PaydayAction::parse("payday:apply:3:7:2500").unwrap(),
            PaydayAction::Apply {
                income: IncomeId(3),
                goal: GoalId(7),
                amount: 2500
            }
        );
        assert_eq!(
            PaydayAction::parse("payday:custom:3:7").unwrap(),
            PaydayAction::Custom {
                income: IncomeId(3),
                goal: GoalId(7)
            }
        );
        assert_eq!(
            PaydayAction::parse("payday:done:3").unwrap(),
            PaydayAction::Done { income: IncomeId(3) }
        );
    }

    #[test]
    fn encode_matches_parse() {
        let action = PaydayAction::Custom {
            income: IncomeId(11),
            goal: GoalId(4),
        };
        assert_eq!(action.encode(), "payday:custom:11:4");
        assert_eq!(PaydayAction::parse(&action.encode()).unwrap(), action);
    }

    #[test]
    fn rejects_malformed_payloads() {
        for bad in [
            "",
            "goal:apply:1:2:3",
            "payday",
            "payday:apply:1:2",
            "payday:apply:1:2:-5",
            "payday:apply:1:x:5",
            "payday:done",
            "payday:done:1:2",
            "payday:explode:1",
        ] {
            assert!(PaydayAction::parse(bad).is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn prefix_detection() {
        assert!(PaydayAction::matches("payday:done:1"));
        assert!(!PaydayAction::matches("menu:main"));
    }
}
