//! Integration tests for subscription creation, pause/resume, and
//! cancellation, running the manager against a real `RocksDB` store.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tempfile::TempDir;

use tally_core::{
    BillingError, BillingInterval, BillingTiming, CreditNote, CreditNoteId, Currency, CustomerId,
    DomainEvent, EventId, EventPayload, Invoice, Plan, PlanId, Price, Subscription,
    SubscriptionId, SubscriptionStatus,
};
use tally_lifecycle::{CancelMode, SubscriptionManager};
use tally_store::{RocksStore, Store};

fn setup() -> (TempDir, Arc<RocksStore>, SubscriptionManager<RocksStore>) {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(RocksStore::open(dir.path()).unwrap());
    let manager = SubscriptionManager::new(Arc::clone(&store));
    (dir, store, manager)
}

fn monthly_plan(name: &str, usd_amount: Decimal) -> Plan {
    Plan::new(
        name,
        BillingInterval::Monthly,
        BillingTiming::InAdvance,
        vec![Price {
            currency: Currency::new("USD"),
            amount: usd_amount,
        }],
    )
}

// April: a 30-day month, so a monthly period is exactly 30 whole days.
fn april_first() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap()
}

// ULID outbox keys order at millisecond granularity; keep successive
// transitions in distinct milliseconds so event order is deterministic.
fn settle() {
    std::thread::sleep(std::time::Duration::from_millis(2));
}

#[test]
fn subscribe_starts_active_with_full_period() {
    let (_dir, store, manager) = setup();
    let plan = monthly_plan("Starter", dec!(29));
    store.put_plan(&plan).unwrap();

    let now = april_first();
    let sub = manager
        .subscribe(CustomerId::generate(), plan.id, Currency::new("usd"), 0, now)
        .unwrap();

    assert_eq!(sub.status, SubscriptionStatus::Active);
    assert_eq!(sub.current_period_start, now);
    assert_eq!(sub.current_period_end, now + Duration::days(30));
    assert_eq!(sub.currency, Currency::new("USD"));
    assert_eq!(sub.version, 0);

    // The created event instructs invoicing to bill immediately: the plan
    // is in-advance and there is no trial.
    let events = store.pending_events(10).unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].subscription_id, sub.id);
    assert!(matches!(
        events[0].payload,
        EventPayload::Created {
            trial: false,
            generate_invoice: true,
            ..
        }
    ));
}

#[test]
fn subscribe_with_trial_defers_first_invoice() {
    let (_dir, store, manager) = setup();
    let plan = monthly_plan("Starter", dec!(29));
    store.put_plan(&plan).unwrap();

    let now = april_first();
    let sub = manager
        .subscribe(CustomerId::generate(), plan.id, Currency::new("USD"), 14, now)
        .unwrap();

    assert_eq!(sub.status, SubscriptionStatus::Trialing);
    assert_eq!(sub.trial_start, Some(now));
    assert_eq!(sub.trial_end, Some(now + Duration::days(14)));
    // The trial covers the first period.
    assert_eq!(sub.current_period_end, now + Duration::days(14));

    let events = store.pending_events(10).unwrap();
    assert!(matches!(
        events[0].payload,
        EventPayload::Created {
            trial: true,
            generate_invoice: false,
            ..
        }
    ));
}

#[test]
fn subscribe_unknown_plan_fails() {
    let (_dir, _store, manager) = setup();
    let err = manager
        .subscribe(
            CustomerId::generate(),
            PlanId::generate(),
            Currency::new("USD"),
            0,
            april_first(),
        )
        .unwrap_err();
    assert!(matches!(err, BillingError::NotFound { entity: "plan", .. }));
}

#[test]
fn subscribe_inactive_plan_fails() {
    let (_dir, store, manager) = setup();
    let mut plan = monthly_plan("Retired", dec!(29));
    plan.is_active = false;
    store.put_plan(&plan).unwrap();

    let err = manager
        .subscribe(
            CustomerId::generate(),
            plan.id,
            Currency::new("USD"),
            0,
            april_first(),
        )
        .unwrap_err();
    assert!(matches!(err, BillingError::ConfigurationMismatch(_)));
}

#[test]
fn subscribe_unconfigured_currency_fails() {
    let (_dir, store, manager) = setup();
    let plan = monthly_plan("Starter", dec!(29));
    store.put_plan(&plan).unwrap();

    let err = manager
        .subscribe(
            CustomerId::generate(),
            plan.id,
            Currency::new("EUR"),
            0,
            april_first(),
        )
        .unwrap_err();
    assert!(matches!(err, BillingError::ConfigurationMismatch(_)));
}

#[test]
fn pause_and_resume_persist_and_bump_version() {
    let (_dir, store, manager) = setup();
    let plan = monthly_plan("Starter", dec!(29));
    store.put_plan(&plan).unwrap();

    let now = april_first();
    let sub = manager
        .subscribe(CustomerId::generate(), plan.id, Currency::new("USD"), 0, now)
        .unwrap();

    settle();
    let paused = manager.pause(sub.id, now + Duration::days(3)).unwrap();
    assert_eq!(paused.status, SubscriptionStatus::Paused);
    assert_eq!(paused.version, 1);

    settle();
    let resumed = manager.resume(sub.id, now + Duration::days(5)).unwrap();
    assert_eq!(resumed.status, SubscriptionStatus::Active);
    assert_eq!(resumed.version, 2);

    let stored = store.get_subscription(&sub.id).unwrap().unwrap();
    assert_eq!(stored.status, SubscriptionStatus::Active);
    assert_eq!(stored.version, 2);

    let kinds: Vec<_> = store
        .pending_events(10)
        .unwrap()
        .iter()
        .map(tally_core::DomainEvent::kind)
        .collect();
    assert_eq!(
        kinds,
        vec![
            "subscription.created",
            "subscription.paused",
            "subscription.resumed",
        ]
    );
}

#[test]
fn pause_trialing_subscription_fails() {
    let (_dir, store, manager) = setup();
    let plan = monthly_plan("Starter", dec!(29));
    store.put_plan(&plan).unwrap();

    let sub = manager
        .subscribe(
            CustomerId::generate(),
            plan.id,
            Currency::new("USD"),
            14,
            april_first(),
        )
        .unwrap();

    let err = manager.pause(sub.id, april_first()).unwrap_err();
    assert!(matches!(
        err,
        BillingError::InvalidState {
            operation: "pause",
            status: SubscriptionStatus::Trialing,
        }
    ));
}

#[test]
fn cancel_now_without_invoice_issues_no_credit() {
    let (_dir, store, manager) = setup();
    let plan = monthly_plan("Starter", dec!(29));
    store.put_plan(&plan).unwrap();

    let now = april_first();
    let sub = manager
        .subscribe(CustomerId::generate(), plan.id, Currency::new("USD"), 0, now)
        .unwrap();

    settle();
    let canceled = manager
        .cancel(sub.id, CancelMode::Now, now + Duration::days(10))
        .unwrap();
    assert_eq!(canceled.status, SubscriptionStatus::Canceled);
    assert_eq!(canceled.canceled_at, Some(now + Duration::days(10)));

    // No invoice was ever billed, so there is nothing to credit against.
    let notes = store
        .list_credit_notes_by_customer(&sub.customer_id, 10, 0)
        .unwrap();
    assert!(notes.is_empty());

    let events = store.pending_events(10).unwrap();
    assert!(matches!(
        events[1].payload,
        EventPayload::Canceled { proration: None }
    ));
}

#[test]
fn cancel_now_credits_unused_remainder() {
    let (_dir, store, manager) = setup();
    let plan = monthly_plan("Starter", dec!(29));
    store.put_plan(&plan).unwrap();

    let now = april_first();
    let sub = manager
        .subscribe(CustomerId::generate(), plan.id, Currency::new("USD"), 0, now)
        .unwrap();
    let invoice = Invoice::new(sub.id, sub.customer_id, dec!(29), Currency::new("USD"));
    store.put_invoice(&invoice).unwrap();

    // 10 of 30 days used: credit 29 * 20/30 = 19.33.
    settle();
    let canceled = manager
        .cancel(sub.id, CancelMode::Now, now + Duration::days(10))
        .unwrap();
    assert_eq!(canceled.status, SubscriptionStatus::Canceled);

    let notes = store
        .list_credit_notes_by_customer(&sub.customer_id, 10, 0)
        .unwrap();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].amount.round_dp(2), dec!(19.33));
    assert_eq!(notes[0].invoice_id, invoice.id);
    assert_eq!(notes[0].metadata["remaining_days"], 20);
    assert_eq!(notes[0].metadata["total_days"], 30);

    let events = store.pending_events(10).unwrap();
    match &events[1].payload {
        EventPayload::Canceled {
            proration: Some(credit),
        } => {
            assert_eq!(credit.credit_note_id, notes[0].id);
            assert_eq!(credit.amount.round_dp(2), dec!(19.33));
            assert_eq!(credit.remaining_days, 20);
            assert_eq!(credit.total_days, 30);
        }
        other => panic!("expected canceled event with proration, got {other:?}"),
    }
}

#[test]
fn cancel_at_period_end_only_records_intent() {
    let (_dir, store, manager) = setup();
    let plan = monthly_plan("Starter", dec!(29));
    store.put_plan(&plan).unwrap();

    let now = april_first();
    let sub = manager
        .subscribe(CustomerId::generate(), plan.id, Currency::new("USD"), 0, now)
        .unwrap();
    let invoice = Invoice::new(sub.id, sub.customer_id, dec!(29), Currency::new("USD"));
    store.put_invoice(&invoice).unwrap();

    let scheduled = manager
        .cancel(sub.id, CancelMode::PeriodEnd, now + Duration::days(10))
        .unwrap();

    // Status untouched, no credit, no extra event; only cancel_at is set.
    assert_eq!(scheduled.status, SubscriptionStatus::Active);
    assert_eq!(scheduled.cancel_at, Some(sub.current_period_end));
    assert!(store
        .list_credit_notes_by_customer(&sub.customer_id, 10, 0)
        .unwrap()
        .is_empty());
    assert_eq!(store.pending_events(10).unwrap().len(), 1);
}

#[test]
fn cancel_already_canceled_fails() {
    let (_dir, store, manager) = setup();
    let plan = monthly_plan("Starter", dec!(29));
    store.put_plan(&plan).unwrap();

    let now = april_first();
    let sub = manager
        .subscribe(CustomerId::generate(), plan.id, Currency::new("USD"), 0, now)
        .unwrap();
    manager
        .cancel(sub.id, CancelMode::Now, now + Duration::days(1))
        .unwrap();

    let err = manager
        .cancel(sub.id, CancelMode::Now, now + Duration::days(2))
        .unwrap_err();
    assert!(matches!(
        err,
        BillingError::InvalidState {
            operation: "cancel",
            status: SubscriptionStatus::Canceled,
        }
    ));
}

/// A store whose transitions always lose: another writer lands a commit for
/// the same subscription at the same expected version just before the
/// delegated commit runs.
struct ContendedStore {
    inner: Arc<RocksStore>,
}

impl Store for ContendedStore {
    fn put_plan(&self, plan: &Plan) -> tally_store::Result<()> {
        self.inner.put_plan(plan)
    }

    fn get_plan(&self, plan_id: &PlanId) -> tally_store::Result<Option<Plan>> {
        self.inner.get_plan(plan_id)
    }

    fn put_subscription(&self, subscription: &Subscription) -> tally_store::Result<()> {
        self.inner.put_subscription(subscription)
    }

    fn get_subscription(
        &self,
        subscription_id: &SubscriptionId,
    ) -> tally_store::Result<Option<Subscription>> {
        self.inner.get_subscription(subscription_id)
    }

    fn put_invoice(&self, invoice: &Invoice) -> tally_store::Result<()> {
        self.inner.put_invoice(invoice)
    }

    fn latest_invoice(
        &self,
        subscription_id: &SubscriptionId,
    ) -> tally_store::Result<Option<Invoice>> {
        self.inner.latest_invoice(subscription_id)
    }

    fn get_credit_note(
        &self,
        credit_note_id: &CreditNoteId,
    ) -> tally_store::Result<Option<CreditNote>> {
        self.inner.get_credit_note(credit_note_id)
    }

    fn list_credit_notes_by_customer(
        &self,
        customer_id: &CustomerId,
        limit: usize,
        offset: usize,
    ) -> tally_store::Result<Vec<CreditNote>> {
        self.inner
            .list_credit_notes_by_customer(customer_id, limit, offset)
    }

    fn pending_events(&self, limit: usize) -> tally_store::Result<Vec<DomainEvent>> {
        self.inner.pending_events(limit)
    }

    fn mark_dispatched(&self, event_id: &EventId) -> tally_store::Result<()> {
        self.inner.mark_dispatched(event_id)
    }

    fn create_subscription(
        &self,
        subscription: &Subscription,
        events: &[DomainEvent],
    ) -> tally_store::Result<()> {
        self.inner.create_subscription(subscription, events)
    }

    fn commit_transition(
        &self,
        expected_version: u64,
        subscription: &Subscription,
        credit_note: Option<&CreditNote>,
        events: &[DomainEvent],
    ) -> tally_store::Result<u64> {
        let rival = self
            .inner
            .get_subscription(&subscription.id)?
            .expect("subscription exists");
        self.inner
            .commit_transition(expected_version, &rival, None, &[])?;
        self.inner
            .commit_transition(expected_version, subscription, credit_note, events)
    }
}

#[test]
fn losing_a_commit_race_surfaces_concurrent_update() {
    let dir = TempDir::new().unwrap();
    let inner = Arc::new(RocksStore::open(dir.path()).unwrap());
    let manager = SubscriptionManager::new(Arc::new(ContendedStore {
        inner: Arc::clone(&inner),
    }));

    let plan = monthly_plan("Starter", dec!(29));
    inner.put_plan(&plan).unwrap();

    let now = april_first();
    let sub = manager
        .subscribe(CustomerId::generate(), plan.id, Currency::new("USD"), 0, now)
        .unwrap();

    let err = manager
        .pause(sub.id, now + Duration::days(1))
        .unwrap_err();
    assert!(matches!(err, BillingError::ConcurrentUpdate { .. }));

    // The rival's write persisted; the losing pause changed nothing.
    let stored = inner.get_subscription(&sub.id).unwrap().unwrap();
    assert_eq!(stored.version, 1);
    assert_eq!(stored.status, SubscriptionStatus::Active);
}

#[test]
fn outbox_drains_in_order() {
    let (_dir, store, manager) = setup();
    let plan = monthly_plan("Starter", dec!(29));
    store.put_plan(&plan).unwrap();

    let now = april_first();
    let sub = manager
        .subscribe(CustomerId::generate(), plan.id, Currency::new("USD"), 0, now)
        .unwrap();
    settle();
    manager.pause(sub.id, now + Duration::days(1)).unwrap();

    let events = store.pending_events(10).unwrap();
    assert_eq!(events.len(), 2);
    store.mark_dispatched(&events[0].id).unwrap();

    let remaining = store.pending_events(10).unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].kind(), "subscription.paused");
}
