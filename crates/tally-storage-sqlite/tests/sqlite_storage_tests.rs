use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rust_decimal_macros::dec;
use tally_domain::{
    Actor, DefinitionStatus, GeneratedChargeInstance, InvoiceStatus, PaymentMethod,
    RecurrenceRule, Role,
};
use tally_engine::{
    AdvanceRequest, AdvanceService, CategoryService, ChargeStore, CoreError, DefinitionDraft,
    DefinitionService, EngineSettings, FixedClock, RecurrenceEngine,
};
use tally_storage_sqlite::SqliteChargeStore;
use tempfile::tempdir;
use uuid::Uuid;

fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

fn admin() -> Actor {
    Actor::new(Uuid::new_v4(), Role::Admin)
}

fn engine_on(today: NaiveDate) -> RecurrenceEngine {
    RecurrenceEngine::new(EngineSettings::default(), Arc::new(FixedClock::on(today)))
}

fn seed(store: &mut SqliteChargeStore, title: &str, start: NaiveDate) -> (Uuid, Uuid) {
    let clock = FixedClock::on(date(2025, 12, 1));
    let existing = store
        .read(|tx| tx.categories())
        .expect("categories")
        .into_iter()
        .next();
    let category = match existing {
        Some(category) => category,
        None => CategoryService::create(store, &admin(), &clock, "Utilities").expect("category"),
    };
    let definition = DefinitionService::create(
        store,
        &admin(),
        &clock,
        DefinitionDraft {
            title: title.into(),
            amount: dec!(99.90),
            rule: RecurrenceRule::monthly(),
            start_date: start,
            end_date: None,
            category_id: category.id,
            notes: None,
        },
    )
    .expect("definition");
    (category.id, definition.id)
}

fn charge_dates(store: &mut SqliteChargeStore, id: Uuid) -> Vec<NaiveDate> {
    store
        .read(|tx| tx.instances_for_definition(id))
        .expect("instances")
        .into_iter()
        .map(|instance| instance.charge_date)
        .collect()
}

#[test]
fn generation_is_idempotent_on_sqlite() {
    let mut store = SqliteChargeStore::in_memory().expect("open");
    let (_, id) = seed(&mut store, "Hosting", date(2026, 1, 31));
    let engine = engine_on(date(2026, 4, 30));

    let first = engine.generate(&mut store, date(2026, 4, 30)).expect("first run");
    let second = engine.generate(&mut store, date(2026, 4, 30)).expect("second run");

    assert_eq!(first.created, 4);
    assert_eq!(second.created, 0);
    assert_eq!(
        charge_dates(&mut store, id),
        vec![
            date(2026, 1, 31),
            date(2026, 2, 28),
            date(2026, 3, 28),
            date(2026, 4, 28)
        ]
    );
    let invoices = store.read(|tx| tx.invoices(Some(id))).expect("invoices");
    assert_eq!(invoices.len(), 4);
    assert_eq!(invoices[0].invoice_no, "EXP-2026-0004");
    assert_eq!(invoices[3].invoice_no, "EXP-2026-0001");
}

#[test]
fn duplicate_cycle_insert_is_a_conflict() {
    let mut store = SqliteChargeStore::in_memory().expect("open");
    let (_, id) = seed(&mut store, "Hosting", date(2026, 1, 1));
    engine_on(date(2026, 1, 1))
        .generate(&mut store, date(2026, 1, 1))
        .expect("generate");
    let definition = store
        .read(|tx| tx.definition(id))
        .expect("read")
        .expect("definition");

    let duplicate =
        GeneratedChargeInstance::from_definition(&definition, date(2026, 1, 1), Utc::now());
    let err = store
        .transaction(|tx| tx.insert_instance(&duplicate))
        .expect_err("unique index rejects the second row");

    assert!(matches!(err, CoreError::Conflict(_)));
    assert_eq!(charge_dates(&mut store, id).len(), 1);
}

#[test]
fn failing_cycle_rolls_back_only_that_cycle() {
    let mut store = SqliteChargeStore::in_memory().expect("open");
    let (_, failing) = seed(&mut store, "Hosting", date(2026, 1, 1));
    let (_, unaffected) = seed(&mut store, "Backups", date(2026, 3, 15));
    store
        .connection()
        .execute_batch(
            "CREATE TRIGGER reject_march BEFORE INSERT ON charge_invoices \
             WHEN NEW.due_date = '2026-03-01' \
             BEGIN SELECT RAISE(ABORT, 'simulated outage'); END;",
        )
        .expect("trigger");

    let report = engine_on(date(2026, 4, 1))
        .generate(&mut store, date(2026, 4, 1))
        .expect("generate");

    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].id, failing);
    assert_eq!(report.failed[0].cycles_committed, 2);
    assert_eq!(
        charge_dates(&mut store, failing),
        vec![date(2026, 1, 1), date(2026, 2, 1)]
    );
    let definition = store
        .read(|tx| tx.definition(failing))
        .expect("read")
        .expect("definition");
    assert_eq!(definition.next_run_date, Some(date(2026, 3, 1)));
    assert_eq!(charge_dates(&mut store, unaffected), vec![date(2026, 3, 15)]);
}

#[test]
fn malformed_rule_row_is_skipped() {
    let mut store = SqliteChargeStore::in_memory().expect("open");
    let (category_id, healthy) = seed(&mut store, "Hosting", date(2026, 1, 1));
    let broken = Uuid::new_v4();
    let stamp = Utc::now().to_rfc3339();
    store
        .connection()
        .execute(
            "INSERT INTO recurring_charges (id, title, amount, recurrence_type, \
             recurrence_interval, start_date, next_run_date, status, category_id, created_by, \
             created_at, updated_at) \
             VALUES (?1, 'Legacy', '10.00', 'fortnightly', 1, '2026-01-01', '2026-01-01', \
             'active', ?2, ?3, ?4, ?4)",
            rusqlite::params![
                broken.to_string(),
                category_id.to_string(),
                Uuid::new_v4().to_string(),
                stamp
            ],
        )
        .expect("raw insert");

    let report = engine_on(date(2026, 1, 1))
        .generate(&mut store, date(2026, 1, 1))
        .expect("generate");

    assert_eq!(report.created, 1);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].id, broken);
    assert!(report.failed.is_empty());
    assert_eq!(charge_dates(&mut store, healthy), vec![date(2026, 1, 1)]);

    let listed = DefinitionService::list(&mut store, &admin(), date(2026, 1, 1)).expect("list");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].definition.id, healthy);
}

#[test]
fn advance_balance_settles_generated_invoice() {
    let mut store = SqliteChargeStore::in_memory().expect("open");
    let (_, id) = seed(&mut store, "Hosting", date(2026, 2, 1));
    AdvanceService::record(
        &mut store,
        &admin(),
        &FixedClock::on(date(2026, 1, 20)),
        id,
        AdvanceRequest {
            method: PaymentMethod::Bank,
            amount: dec!(150),
            paid_at: date(2026, 1, 20),
            reference: Some("TRX-1".into()),
            note: None,
        },
    )
    .expect("advance");

    engine_on(date(2026, 3, 1))
        .generate(&mut store, date(2026, 3, 1))
        .expect("generate");

    let invoices = store.read(|tx| tx.invoices(Some(id))).expect("invoices");
    let february = invoices
        .iter()
        .find(|invoice| invoice.invoice_date == date(2026, 2, 1))
        .expect("february invoice");
    let march = invoices
        .iter()
        .find(|invoice| invoice.invoice_date == date(2026, 3, 1))
        .expect("march invoice");
    assert_eq!(february.status, InvoiceStatus::Paid);
    assert_eq!(march.status, InvoiceStatus::Unpaid);
    let balance = store
        .read(|tx| AdvanceService::balance_in(tx, id))
        .expect("balance");
    assert_eq!(balance, dec!(0));
}

#[test]
fn file_database_survives_reopen() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("data").join("tally.db");
    let id = {
        let mut store = SqliteChargeStore::open(&path).expect("open");
        let (_, id) = seed(&mut store, "Hosting", date(2026, 1, 1));
        engine_on(date(2026, 2, 1))
            .generate(&mut store, date(2026, 2, 1))
            .expect("generate");
        id
    };

    let mut reopened = SqliteChargeStore::open(&path).expect("reopen");
    assert_eq!(charge_dates(&mut reopened, id).len(), 2);
    let again = engine_on(date(2026, 2, 1))
        .generate(&mut reopened, date(2026, 2, 1))
        .expect("generate again");
    assert_eq!(again.created, 0);
}

#[test]
fn stopped_status_is_read_as_cancelled() {
    let mut store = SqliteChargeStore::in_memory().expect("open");
    let (_, id) = seed(&mut store, "Hosting", date(2026, 1, 1));
    store
        .connection()
        .execute(
            "UPDATE recurring_charges SET status = 'stopped' WHERE id = ?1",
            [id.to_string()],
        )
        .expect("raw update");

    let definition = store
        .read(|tx| tx.definition(id))
        .expect("read")
        .expect("definition");
    assert_eq!(definition.status, DefinitionStatus::Cancelled);
    let report = engine_on(date(2026, 3, 1))
        .generate(&mut store, date(2026, 3, 1))
        .expect("generate");
    assert_eq!(report.processed, 0);
}
