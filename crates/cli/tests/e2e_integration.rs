//! End-to-end tests for the Stashflow planning pipeline.
//!
//! These drive the full flow (registration, income, goals, allocation, the
//! payday tick and the button-press dialog) against both store backends.

use std::sync::Arc;

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use stashflow_channels::{MemoryChannel, PaydayAction};
use stashflow_config::{AppConfig, PlannerConfig, SchedulerConfig};
use stashflow_core::channel::{ChannelId, ChannelMessage};
use stashflow_core::clock::FixedClock;
use stashflow_core::model::{Frequency, GoalStatus};
use stashflow_core::store::FinanceStore;
use stashflow_planner::{FinanceService, IncomeSpec, PaydayDesk, SessionStore};
use stashflow_scheduler::PaydayScheduler;
use stashflow_security::{AuditEvent, AuditLogger};
use stashflow_store::{InMemoryStore, SqliteStore};

// ── Harness ──────────────────────────────────────────────────────────────

struct Harness {
    clock: Arc<FixedClock>,
    service: Arc<FinanceService>,
    channel: Arc<MemoryChannel>,
    scheduler: PaydayScheduler,
    desk: PaydayDesk,
}

fn harness(store: Arc<dyn FinanceStore>) -> Harness {
    let clock = Arc::new(FixedClock::new(
        Utc.with_ymd_and_hms(2026, 3, 20, 12, 0, 0).unwrap(),
    ));
    let service = Arc::new(FinanceService::new(
        store,
        clock.clone(),
        Arc::new(AuditLogger::new()),
        PlannerConfig::default(),
    ));
    let channel = Arc::new(MemoryChannel::new());
    let scheduler = PaydayScheduler::new(service.clone(), channel.clone(), SchedulerConfig::default());
    let desk = PaydayDesk::new(
        service.clone(),
        SessionStore::new(16, std::time::Duration::from_secs(600)),
        vec!["*".into()],
        "memory",
    );
    Harness {
        clock,
        service,
        channel,
        scheduler,
        desk,
    }
}

fn press(sender: &str, data: &str) -> ChannelMessage {
    ChannelMessage {
        channel_id: ChannelId("memory".into()),
        sender_id: sender.into(),
        sender_name: None,
        content: String::new(),
        chat_id: sender.into(),
        callback_data: Some(data.into()),
    }
}

fn typed(sender: &str, text: &str) -> ChannelMessage {
    ChannelMessage {
        content: text.into(),
        callback_data: None,
        ..press(sender, "")
    }
}

async fn sqlite() -> Arc<dyn FinanceStore> {
    Arc::new(SqliteStore::new("sqlite::memory:").await.unwrap())
}

fn memory() -> Arc<dyn FinanceStore> {
    Arc::new(InMemoryStore::new())
}

// ── Full pipeline ────────────────────────────────────────────────────────

async fn payday_round_trip(store: Arc<dyn FinanceStore>) {
    let h = harness(store);
    let svc = &h.service;

    let user = svc.register_user("4242", "alice").await.unwrap();
    let income = svc
        .add_income(
            user.id,
            IncomeSpec {
                name: "salary".into(),
                amount: 12_000,
                frequency: Frequency::Monthly,
                recurring_day: 25,
                notification_hour: 9,
            },
        )
        .await
        .unwrap();
    svc.add_expense(user.id, "rent", 3_000).await.unwrap();
    let laptop = svc.create_goal(user.id, "laptop", 10_000).await.unwrap();
    let trip = svc.create_goal(user.id, "trip", 10_000).await.unwrap();

    // Surplus 9000 over two equal goals.
    let laptop = svc.owned_goal(user.id, laptop.id).await.unwrap();
    let trip = svc.owned_goal(user.id, trip.id).await.unwrap();
    assert_eq!(laptop.monthly_contrib, 6_000);
    assert_eq!(trip.monthly_contrib, 3_000);

    // Nothing is due before the 25th.
    let report = h.scheduler.run_tick().await.unwrap();
    assert_eq!(report.candidates, 0);

    h.clock.set(Utc.with_ymd_and_hms(2026, 3, 25, 9, 5, 0).unwrap());
    let report = h.scheduler.run_tick().await.unwrap();
    assert_eq!(report.notified, 1);
    assert_eq!(h.channel.sent_count(), 1);

    let note = &h.channel.sent()[0];
    assert_eq!(note.chat_id, "4242");
    let controls = note.controls.clone().unwrap();
    let apply = PaydayAction::parse(&controls[0][0].data).unwrap();
    // Half of 12_000 is the cap for the top goal; its budget is 6_000.
    assert_eq!(
        apply,
        PaydayAction::Apply {
            income: income.id,
            goal: laptop.id,
            amount: 6_000
        }
    );

    // Same day, second tick: no repeat notification.
    h.clock.advance(Duration::minutes(30));
    h.scheduler.run_tick().await.unwrap();
    assert_eq!(h.channel.sent_count(), 1);

    // Press "apply" for the laptop, then "other amount" for the trip.
    let reply = h.desk.handle(&press("4242", &controls[0][0].data)).await.unwrap();
    assert!(reply.text.contains("Added 6000 to laptop"), "{}", reply.text);

    let custom = PaydayAction::Custom {
        income: income.id,
        goal: trip.id,
    }
    .encode();
    h.desk.handle(&press("4242", &custom)).await.unwrap();
    let reply = h.desk.handle(&typed("4242", "2500")).await.unwrap();
    assert!(reply.text.contains("Added 2500 to trip"), "{}", reply.text);

    let done = PaydayAction::Done { income: income.id }.encode();
    h.desk.handle(&press("4242", &done)).await.unwrap();
    assert!(h.desk.sessions().is_empty());

    // Ledger reflects both contributions for March.
    let march = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
    let store = svc.store();
    assert_eq!(
        store
            .get_contribution(user.id, laptop.id, march)
            .await
            .unwrap()
            .unwrap()
            .amount_contributed,
        6_000
    );
    assert_eq!(
        store
            .get_contribution(user.id, trip.id, march)
            .await
            .unwrap()
            .unwrap()
            .amount_contributed,
        2_500
    );

    // Next payday moved to April.
    let income = store.get_income(income.id).await.unwrap().unwrap();
    assert_eq!(
        income.next_pay_date,
        Utc.with_ymd_and_hms(2026, 4, 25, 9, 0, 0).unwrap()
    );

    let events: Vec<AuditEvent> = svc.audit().entries().into_iter().map(|e| e.event).collect();
    assert!(events.contains(&AuditEvent::PaydayNotified {
        income_id: income.id.0
    }));
}

#[tokio::test]
async fn payday_round_trip_in_memory() {
    payday_round_trip(memory()).await;
}

#[tokio::test]
async fn payday_round_trip_sqlite() {
    payday_round_trip(sqlite().await).await;
}

// ── Goal lifecycle ───────────────────────────────────────────────────────

async fn completion_and_reactivation(store: Arc<dyn FinanceStore>) {
    let h = harness(store);
    let svc = &h.service;
    let user = svc.register_user("7", "bob").await.unwrap();
    let a = svc.create_goal(user.id, "a", 1_000).await.unwrap();
    let b = svc.create_goal(user.id, "b", 1_000).await.unwrap();
    let c = svc.create_goal(user.id, "c", 1_000).await.unwrap();

    let out = svc.contribute(user.id, a.id, 5_000).await.unwrap();
    assert_eq!(out.applied, 1_000);
    assert_eq!(out.goal.status, GoalStatus::Completed);

    let ranks = |goals: Vec<stashflow_core::model::SavingsGoal>| -> Vec<(i64, u32)> {
        goals
            .into_iter()
            .filter(|g| g.is_active())
            .map(|g| (g.id.0, g.priority))
            .collect()
    };
    assert_eq!(
        ranks(svc.goals(user.id).await.unwrap()),
        vec![(b.id.0, 1), (c.id.0, 2)]
    );

    let out = svc.withdraw(user.id, a.id, 10).await.unwrap();
    assert_eq!(out.goal.status, GoalStatus::Active);
    assert_eq!(out.goal.priority, 3);

    svc.delete_goal(user.id, b.id).await.unwrap();
    assert_eq!(
        ranks(svc.goals(user.id).await.unwrap()),
        vec![(c.id.0, 1), (a.id.0, 2)]
    );
}

#[tokio::test]
async fn completion_and_reactivation_in_memory() {
    completion_and_reactivation(memory()).await;
}

#[tokio::test]
async fn completion_and_reactivation_sqlite() {
    completion_and_reactivation(sqlite().await).await;
}

// ── Month rollover ───────────────────────────────────────────────────────

#[tokio::test]
async fn allocation_resets_month_counter_from_ledger() {
    let h = harness(sqlite().await);
    let svc = &h.service;
    let user = svc.register_user("9", "carol").await.unwrap();
    svc.add_income(
        user.id,
        IncomeSpec {
            name: "pay".into(),
            amount: 4_000,
            frequency: Frequency::Weekly,
            recurring_day: 5,
            notification_hour: 8,
        },
    )
    .await
    .unwrap();
    let goal = svc.create_goal(user.id, "car", 100_000).await.unwrap();
    svc.contribute(user.id, goal.id, 700).await.unwrap();

    h.clock.set(Utc.with_ymd_and_hms(2026, 4, 2, 12, 0, 0).unwrap());
    svc.reallocate(user.id).await.unwrap();

    let goal = svc.owned_goal(user.id, goal.id).await.unwrap();
    assert_eq!(goal.monthly_accumulated, 0);
    assert_eq!(goal.month_started, NaiveDate::from_ymd_opt(2026, 4, 1));
    assert_eq!(goal.current_amount, 700);
}

// ── Configuration ────────────────────────────────────────────────────────

#[tokio::test]
async fn config_file_drives_the_planner() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    std::io::Write::write_all(
        &mut file,
        br#"
[database]
url = "memory://"

[planner]
small_goal_threshold = 0
"#,
    )
    .unwrap();
    let config = AppConfig::load_from(file.path()).unwrap();
    assert_eq!(config.planner.small_goal_threshold, 0);

    let store = stashflow_store::open(&config.database.url, config.database.max_connections)
        .await
        .unwrap();
    assert_eq!(store.backend_name(), "in_memory");
}
