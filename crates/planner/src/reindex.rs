//! Priority reindexing: keeps a user's active goals ranked 1..N.
//!
//! Every operation here preserves density: after it returns, the active
//! goals' priorities are exactly a permutation of 1..N.

use stashflow_core::error::{Error, Result};
use stashflow_core::model::{GoalId, UserId};
use stashflow_core::store::FinanceStore;
use std::sync::Arc;
use tracing::{debug, info};

pub struct PriorityReindexer {
    store: Arc<dyn FinanceStore>,
}

impl PriorityReindexer {
    pub fn new(store: Arc<dyn FinanceStore>) -> Self {
        Self { store }
    }

    /// Priority for a goal joining the active set: one past the current worst.
    pub async fn next_priority(&self, user_id: UserId) -> Result<u32> {
        let goals = self.store.list_active_goals(user_id).await?;
        Ok(goals.iter().map(|g| g.priority).max().unwrap_or(0) + 1)
    }

    /// Close the hole left by a goal that held `removed` and left the
    /// active set. Goals ranked below it move up by one.
    ///
    /// Returns how many goals were renumbered.
    pub async fn close_gap(&self, user_id: UserId, removed: u32) -> Result<usize> {
        let goals = self.store.list_active_goals(user_id).await?;
        let mut moved = 0;
        for mut goal in goals.into_iter().filter(|g| g.priority > removed) {
            goal.priority -= 1;
            self.store.update_goal(&goal).await?;
            moved += 1;
        }
        debug!(%user_id, removed, moved, "Closed priority gap");
        Ok(moved)
    }

    /// Move `goal_id` to `new_priority`, swapping with the goal that held it.
    ///
    /// Returns the goal's previous priority.
    pub async fn swap(&self, user_id: UserId, goal_id: GoalId, new_priority: u32) -> Result<u32> {
        let goals = self.store.list_active_goals(user_id).await?;
        let count = goals.len() as u32;
        if new_priority < 1 || new_priority > count {
            return Err(Error::InvalidInput(format!(
                "priority must be between 1 and {count}, got {new_priority}"
            )));
        }

        let Some(mut moving) = goals.iter().find(|g| g.id == goal_id).cloned() else {
            // Distinguish "not yours / gone" from "completed".
            return match self.store.get_goal(goal_id).await? {
                Some(g) if g.user_id != user_id => Err(Error::not_owned("goal", goal_id)),
                Some(_) => Err(Error::InvalidInput(format!(
                    "goal {goal_id} is completed and has no priority"
                ))),
                None => Err(Error::not_found("goal", goal_id)),
            };
        };

        let old_priority = moving.priority;
        if old_priority == new_priority {
            return Ok(old_priority);
        }

        if let Some(mut displaced) = goals.into_iter().find(|g| g.priority == new_priority) {
            displaced.priority = old_priority;
            self.store.update_goal(&displaced).await?;
        }
        moving.priority = new_priority;
        self.store.update_goal(&moving).await?;

        info!(%user_id, %goal_id, from = old_priority, to = new_priority, "Goal priority changed");
        Ok(old_priority)
    }

    /// Renumber the active goals 1..N in their current order.
    ///
    /// Repairs gaps or duplicates left by an interrupted update. Returns
    /// how many goals changed.
    pub async fn normalize(&self, user_id: UserId) -> Result<usize> {
        let goals = self.store.list_active_goals(user_id).await?;
        let mut changed = 0;
        for (rank, mut goal) in goals.into_iter().enumerate() {
            let expected = rank as u32 + 1;
            if goal.priority != expected {
                goal.priority = expected;
                self.store.update_goal(&goal).await?;
                changed += 1;
            }
        }
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stashflow_core::model::{GoalStatus, NewGoal};
    use stashflow_core::store::{GoalStore, UserStore};
    use stashflow_store::InMemoryStore;

    async fn setup(n: u32) -> (Arc<InMemoryStore>, PriorityReindexer, UserId, Vec<GoalId>) {
        let store = Arc::new(InMemoryStore::new());
        let user = store.create_user("100", "alice", "tok").await.unwrap();
        let mut ids = Vec::new();
        for p in 1..=n {
            let g = store
                .create_goal(NewGoal {
                    user_id: user.id,
                    name: format!("goal{p}"),
                    target_amount: 1_000,
                    priority: p,
                })
                .await
                .unwrap();
            ids.push(g.id);
        }
        let reindexer = PriorityReindexer::new(store.clone());
        (store, reindexer, user.id, ids)
    }

    async fn priorities(store: &InMemoryStore, user: UserId) -> Vec<(String, u32)> {
        store
            .list_active_goals(user)
            .await
            .unwrap()
            .into_iter()
            .map(|g| (g.name, g.priority))
            .collect()
    }

    #[tokio::test]
    async fn deleting_middle_goal_leaves_dense_ranks() {
        let (store, reindexer, user, ids) = setup(3).await;
        store.delete_goal(ids[1]).await.unwrap();
        assert_eq!(reindexer.close_gap(user, 2).await.unwrap(), 1);

        assert_eq!(
            priorities(&store, user).await,
            vec![("goal1".to_string(), 1), ("goal3".to_string(), 2)]
        );
    }

    #[tokio::test]
    async fn completion_is_treated_like_removal() {
        let (store, reindexer, user, ids) = setup(3).await;
        let mut first = store.get_goal(ids[0]).await.unwrap().unwrap();
        first.status = GoalStatus::Completed;
        store.update_goal(&first).await.unwrap();
        reindexer.close_gap(user, 1).await.unwrap();

        assert_eq!(
            priorities(&store, user).await,
            vec![("goal2".to_string(), 1), ("goal3".to_string(), 2)]
        );
        assert_eq!(reindexer.next_priority(user).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn swap_exchanges_ranks() {
        let (store, reindexer, user, ids) = setup(3).await;
        assert_eq!(reindexer.swap(user, ids[2], 1).await.unwrap(), 3);
        assert_eq!(
            priorities(&store, user).await,
            vec![
                ("goal3".to_string(), 1),
                ("goal2".to_string(), 2),
                ("goal1".to_string(), 3)
            ]
        );
    }

    #[tokio::test]
    async fn swap_validates_range_and_ownership() {
        let (store, reindexer, user, ids) = setup(2).await;
        assert!(matches!(
            reindexer.swap(user, ids[0], 0).await,
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            reindexer.swap(user, ids[0], 3).await,
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            reindexer.swap(user, GoalId(999), 1).await,
            Err(Error::NotFound { .. })
        ));

        let other = store.create_user("200", "bob", "tok").await.unwrap();
        store
            .create_goal(NewGoal {
                user_id: other.id,
                name: "bob's".into(),
                target_amount: 10,
                priority: 1,
            })
            .await
            .unwrap();
        assert!(matches!(
            reindexer.swap(other.id, ids[0], 1).await,
            Err(Error::OwnershipMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn normalize_repairs_gaps() {
        let (store, reindexer, user, ids) = setup(3).await;
        let mut last = store.get_goal(ids[2]).await.unwrap().unwrap();
        last.priority = 7;
        store.update_goal(&last).await.unwrap();

        assert_eq!(reindexer.normalize(user).await.unwrap(), 1);
        let ranks: Vec<u32> = priorities(&store, user).await.into_iter().map(|(_, p)| p).collect();
        assert_eq!(ranks, vec![1, 2, 3]);
    }
}
