//! Payday dialog: turns button presses and typed amounts into
//! contributions.
//!
//! Conversation state lives in a bounded `SessionStore` keyed by chat id.
//! Entries expire after an idle TTL and the oldest entry is evicted when
//! the store is full.

use crate::contribution::StatusChange;
use crate::service::FinanceService;
use stashflow_channels::PaydayAction;
use stashflow_config::SessionConfig;
use stashflow_core::channel::{Channel, ChannelMessage, Controls};
use stashflow_core::error::{ChannelError, Error};
use stashflow_core::model::{GoalId, IncomeId, User};
use stashflow_security::{AllowlistPolicy, AuditEvent, AuditLogger, AuditOutcome};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// What the dialog is waiting for from a chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PendingInput {
    #[default]
    Idle,
    /// The user pressed "enter amount" for this goal.
    PaydayAmount { income: IncomeId, goal: GoalId },
}

struct Session {
    input: PendingInput,
    touched: Instant,
}

/// Bounded, expiring per-chat dialog state.
pub struct SessionStore {
    sessions: Mutex<HashMap<String, Session>>,
    max_sessions: usize,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(max_sessions: usize, ttl: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            max_sessions: max_sessions.max(1),
            ttl,
        }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(config.max_sessions, Duration::from_secs(config.ttl_secs))
    }

    /// Current state for `chat_id`; expired entries read as `Idle`.
    pub fn get(&self, chat_id: &str) -> PendingInput {
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        match sessions.get(chat_id) {
            Some(s) if s.touched.elapsed() < self.ttl => s.input,
            Some(_) => {
                sessions.remove(chat_id);
                PendingInput::Idle
            }
            None => PendingInput::Idle,
        }
    }

    pub fn set(&self, chat_id: &str, input: PendingInput) {
        if input == PendingInput::Idle {
            self.clear(chat_id);
            return;
        }

        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        let ttl = self.ttl;
        sessions.retain(|_, s| s.touched.elapsed() < ttl);

        if !sessions.contains_key(chat_id) && sessions.len() >= self.max_sessions {
            let oldest = sessions
                .iter()
                .min_by_key(|(_, s)| s.touched)
                .map(|(k, _)| k.clone());
            if let Some(key) = oldest {
                debug!(chat_id = %key, "Session store full, evicting oldest");
                sessions.remove(&key);
            }
        }

        sessions.insert(
            chat_id.to_string(),
            Session {
                input,
                touched: Instant::now(),
            },
        );
    }

    pub fn clear(&self, chat_id: &str) {
        self.sessions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(chat_id);
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A message to send back to the chat.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub text: String,
    pub controls: Option<Controls>,
}

impl Reply {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            controls: None,
        }
    }
}

/// Parse a typed amount: a positive whole number, thousands separators allowed.
pub fn parse_amount(input: &str) -> Result<i64, String> {
    let cleaned: String = input
        .trim()
        .chars()
        .filter(|c| !matches!(c, ',' | '_' | ' '))
        .collect();
    if cleaned.is_empty() {
        return Err("Please send an amount.".into());
    }
    match cleaned.parse::<i64>() {
        Ok(n) if n > 0 => Ok(n),
        Ok(_) => Err("The amount must be greater than zero.".into()),
        Err(_) => Err(format!("'{}' is not a whole number.", input.trim())),
    }
}

/// Handles inbound payday interactions for one channel.
pub struct PaydayDesk {
    service: Arc<FinanceService>,
    sessions: SessionStore,
    allowed_users: Vec<String>,
    channel_name: String,
}

impl PaydayDesk {
    pub fn new(
        service: Arc<FinanceService>,
        sessions: SessionStore,
        allowed_users: Vec<String>,
        channel_name: impl Into<String>,
    ) -> Self {
        Self {
            service,
            sessions,
            allowed_users,
            channel_name: channel_name.into(),
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    fn audit(&self) -> &Arc<AuditLogger> {
        self.service.audit()
    }

    /// React to one inbound message. `None` means stay silent.
    pub async fn handle(&self, msg: &ChannelMessage) -> Option<Reply> {
        let check = AllowlistPolicy::check_list(&self.allowed_users, &msg.sender_id);
        if !check.is_allowed() {
            warn!(channel = %self.channel_name, sender_id = %msg.sender_id, "Sender blocked");
            self.audit().log(
                AuditEvent::SenderBlocked {
                    channel: self.channel_name.clone(),
                },
                &msg.sender_id,
                &msg.chat_id,
                AuditOutcome::Denied,
                None,
            );
            return None;
        }

        if let Some(data) = msg.callback_data.as_deref() {
            if !PaydayAction::matches(data) {
                return None;
            }
            return Some(match PaydayAction::parse(data) {
                Ok(action) => self.on_action(msg, action).await,
                Err(e) => {
                    debug!("Ignoring malformed payday payload: {e}");
                    Reply::text("That button is no longer valid.")
                }
            });
        }

        match self.sessions.get(&msg.chat_id) {
            PendingInput::PaydayAmount { income, goal } => {
                Some(self.on_amount(msg, income, goal).await)
            }
            PendingInput::Idle => None,
        }
    }

    async fn on_action(&self, msg: &ChannelMessage, action: PaydayAction) -> Reply {
        let user = match self.sender(msg).await {
            Ok(user) => user,
            Err(reply) => return reply,
        };
        if let Err(reply) = self.check_income(&user, action.income()).await {
            return reply;
        }

        match action {
            PaydayAction::Apply { goal, amount, .. } => {
                self.sessions.clear(&msg.chat_id);
                self.apply(&user, goal, amount).await
            }
            PaydayAction::Custom { income, goal } => {
                match self.service.owned_goal(user.id, goal).await {
                    Ok(g) if g.is_active() => {
                        self.sessions
                            .set(&msg.chat_id, PendingInput::PaydayAmount { income, goal });
                        Reply::text(format!(
                            "How much would you like to put into {}? It still needs {}.",
                            g.name,
                            g.remaining_need()
                        ))
                    }
                    Ok(g) => Reply::text(format!("{} is already complete.", g.name)),
                    Err(e) => error_reply(&e),
                }
            }
            PaydayAction::Done { income } => {
                self.sessions.clear(&msg.chat_id);
                info!(user_id = %user.id, %income, "Payday dialog closed");
                Reply::text("All set. See you next payday.")
            }
        }
    }

    async fn on_amount(&self, msg: &ChannelMessage, income: IncomeId, goal: GoalId) -> Reply {
        let amount = match parse_amount(&msg.content) {
            Ok(amount) => amount,
            Err(why) => return Reply::text(why),
        };
        let user = match self.sender(msg).await {
            Ok(user) => user,
            Err(reply) => return reply,
        };

        self.sessions.clear(&msg.chat_id);
        debug!(user_id = %user.id, %income, %goal, amount, "Custom payday amount");
        self.apply(&user, goal, amount).await
    }

    async fn apply(&self, user: &User, goal: GoalId, amount: i64) -> Reply {
        match self.service.contribute(user.id, goal, amount).await {
            Ok(out) => {
                let mut text = format!(
                    "Added {} to {}. {}/{} saved.",
                    out.applied, out.goal.name, out.goal.current_amount, out.goal.target_amount
                );
                if out.status_change == Some(StatusChange::Completed) {
                    text.push_str(" Goal reached!");
                }
                Reply::text(text)
            }
            Err(e) => error_reply(&e),
        }
    }

    async fn sender(&self, msg: &ChannelMessage) -> Result<User, Reply> {
        self.service
            .user_by_external(&msg.sender_id)
            .await
            .map_err(|e| error_reply(&e))
    }

    async fn check_income(&self, user: &User, income: IncomeId) -> Result<(), Reply> {
        match self.service.store().get_income(income).await {
            Ok(Some(i)) if i.user_id == user.id => Ok(()),
            Ok(Some(_)) => Err(error_reply(&Error::not_owned("income", income))),
            Ok(None) => Err(error_reply(&Error::not_found("income", income))),
            Err(e) => Err(error_reply(&Error::from(e))),
        }
    }

    /// Answer inbound messages until the stream ends or shutdown is signalled.
    pub async fn serve(
        self: Arc<Self>,
        channel: Arc<dyn Channel>,
        mut inbound: mpsc::Receiver<Result<ChannelMessage, ChannelError>>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!(channel = %channel.name(), "Payday desk listening");
        loop {
            tokio::select! {
                next = inbound.recv() => {
                    let msg = match next {
                        Some(Ok(msg)) => msg,
                        Some(Err(e)) => {
                            warn!(channel = %channel.name(), "Inbound error: {e}");
                            continue;
                        }
                        None => break,
                    };
                    if let Some(reply) = self.handle(&msg).await
                        && let Err(e) = channel
                            .send(&msg.chat_id, &reply.text, reply.controls.as_ref())
                            .await
                    {
                        warn!(chat_id = %msg.chat_id, "Failed to send reply: {e}");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!(channel = %channel.name(), "Payday desk stopped");
    }
}

fn error_reply(err: &Error) -> Reply {
    match err {
        Error::NotFound { kind, .. } => Reply::text(format!("That {kind} no longer exists.")),
        Error::OwnershipMismatch { kind, .. } => {
            Reply::text(format!("That {kind} is not yours."))
        }
        Error::InvalidInput(why) => Reply::text(why.clone()),
        other => {
            warn!("Payday action failed: {other}");
            Reply::text("Something went wrong, please try again later.")
        }
    }
}
