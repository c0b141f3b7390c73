//! Payday scheduler: finds due incomes and notifies their owners once per day.
//!
//! Each tick:
//! 1. lists incomes whose next pay date is at or before now (late ones
//!    included, so downtime is caught up)
//! 2. skips any income already in the processing log for today
//! 3. sends the payday recommendation with controls to the owner
//! 4. writes the processing log row whatever the delivery outcome
//! 5. moves the income's next pay date forward
//!
//! Ticks never overlap. A failure on one income is logged and the tick
//! moves on; the income stays due and is retried on the next tick.

pub mod notification;

pub use notification::render_notification;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use stashflow_config::SchedulerConfig;
use stashflow_core::calendar::next_pay_date;
use stashflow_core::channel::Channel;
use stashflow_core::error::Result;
use stashflow_core::model::Income;
use stashflow_planner::FinanceService;
use stashflow_security::{AuditEvent, AuditOutcome};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// What one tick did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    /// Incomes that were due.
    pub candidates: usize,
    /// Notifications delivered.
    pub notified: usize,
    /// Already handled today.
    pub skipped: usize,
    /// Notifications the channel refused; still logged as processed.
    pub failed_deliveries: usize,
    /// Incomes left due because processing failed.
    pub errors: usize,
}

enum Handled {
    Notified,
    DeliveryFailed,
    Skipped,
}

pub struct PaydayScheduler {
    service: Arc<FinanceService>,
    channel: Arc<dyn Channel>,
    config: SchedulerConfig,
    tick_lock: Mutex<()>,
}

impl PaydayScheduler {
    pub fn new(
        service: Arc<FinanceService>,
        channel: Arc<dyn Channel>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            service,
            channel,
            config,
            tick_lock: Mutex::new(()),
        }
    }

    /// Run one tick at the service clock's current time.
    pub async fn run_tick(&self) -> Result<TickReport> {
        let now = self.service.clock().now();
        self.run_tick_at(now).await
    }

    pub async fn run_tick_at(&self, now: DateTime<Utc>) -> Result<TickReport> {
        let _guard = self.tick_lock.lock().await;
        let today = now.date_naive();

        let due = self.service.store().list_due_incomes(now).await?;
        let mut report = TickReport {
            candidates: due.len(),
            ..TickReport::default()
        };
        debug!(%now, candidates = due.len(), "Payday tick");

        for income in due {
            match self.process(&income, today).await {
                Ok(Handled::Notified) => report.notified += 1,
                Ok(Handled::DeliveryFailed) => report.failed_deliveries += 1,
                Ok(Handled::Skipped) => report.skipped += 1,
                Err(e) => {
                    error!(income_id = %income.id, user_id = %income.user_id, "Payday processing failed: {e}");
                    report.errors += 1;
                }
            }
        }

        if report.candidates > 0 {
            info!(
                candidates = report.candidates,
                notified = report.notified,
                skipped = report.skipped,
                failed_deliveries = report.failed_deliveries,
                errors = report.errors,
                "Payday tick finished"
            );
        }
        Ok(report)
    }

    async fn process(&self, income: &Income, today: NaiveDate) -> Result<Handled> {
        let store = self.service.store();

        if store.is_income_processed(income.id, today).await? {
            debug!(income_id = %income.id, %today, "Already processed today");
            self.advance(income, today).await?;
            return Ok(Handled::Skipped);
        }

        let user = self.service.user(income.user_id).await?;
        let rec = self.service.payday_recommendation(income).await?;
        let (text, controls) = render_notification(income, &rec);

        let delivered = match self
            .channel
            .send(&user.external_id, &text, Some(&controls))
            .await
        {
            Ok(()) => true,
            Err(e) => {
                warn!(income_id = %income.id, chat_id = %user.external_id, "Payday notification failed: {e}");
                false
            }
        };

        self.service.audit().log(
            AuditEvent::PaydayNotified {
                income_id: income.id.0,
            },
            "scheduler",
            &user.external_id,
            if delivered {
                AuditOutcome::Success
            } else {
                AuditOutcome::Failure
            },
            Some(format!("suggested {} of {}", rec.total, income.amount)),
        );

        let first = store
            .record_income_processed(income.id, income.user_id, today, income.amount)
            .await?;
        if !first {
            debug!(income_id = %income.id, %today, "Processing log row already present");
        }

        self.advance(income, today).await?;

        if delivered {
            info!(income_id = %income.id, user_id = %user.id, suggested = rec.total, "Payday notified");
            Ok(Handled::Notified)
        } else {
            Ok(Handled::DeliveryFailed)
        }
    }

    async fn advance(&self, income: &Income, today: NaiveDate) -> Result<()> {
        let next = next_pay_date(
            income.frequency,
            income.recurring_day,
            income.notification_hour,
            income.next_pay_date,
            today,
        );
        self.service
            .store()
            .update_next_pay_date(income.id, next)
            .await?;
        debug!(income_id = %income.id, %next, "Next pay date advanced");
        Ok(())
    }

    /// Run ticks in the background until `shutdown` turns true.
    ///
    /// A tick in progress always finishes; shutdown is only observed
    /// between ticks.
    pub fn start(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let period = Duration::from_secs(self.config.tick_interval_secs.max(1));
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            if !self.config.run_on_startup {
                // The first tick of an interval completes immediately.
                interval.tick().await;
            }

            info!(every_secs = period.as_secs(), "Payday scheduler started");
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if let Err(e) = self.run_tick().await {
                            error!("Payday tick failed: {e}");
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
            info!("Payday scheduler stopped");
        })
    }
}
