use std::{fs, sync::Arc};

use chrono::NaiveDate;
use rust_decimal_macros::dec;
use tally_domain::{Actor, RecurrenceRule, Role};
use tally_engine::{
    CategoryService, ChargeStore, CoreError, DefinitionDraft, DefinitionService, EngineSettings,
    FixedClock, RecurrenceEngine,
};
use tally_storage_json::JsonChargeStore;
use tempfile::tempdir;
use uuid::Uuid;

fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

fn seed(store: &mut JsonChargeStore, start: NaiveDate) -> Uuid {
    let admin = Actor::new(Uuid::new_v4(), Role::Admin);
    let clock = FixedClock::on(date(2026, 1, 1));
    let category = CategoryService::create(store, &admin, &clock, "Utilities").expect("category");
    DefinitionService::create(
        store,
        &admin,
        &clock,
        DefinitionDraft {
            title: "Internet".into(),
            amount: dec!(45.50),
            rule: RecurrenceRule::monthly(),
            start_date: start,
            end_date: None,
            category_id: category.id,
            notes: Some("Fiber line".into()),
        },
    )
    .expect("definition")
    .id
}

#[test]
fn committed_generation_survives_reopen() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("charges.json");
    let backups = dir.path().join("backups");
    let mut store = JsonChargeStore::open(path.clone(), backups.clone()).expect("open store");
    let id = seed(&mut store, date(2026, 1, 1));

    let engine = RecurrenceEngine::new(
        EngineSettings::default(),
        Arc::new(FixedClock::on(date(2026, 3, 1))),
    );
    let report = engine.generate(&mut store, date(2026, 3, 1)).expect("generate");
    assert_eq!(report.created, 3);
    drop(store);

    let mut reopened = JsonChargeStore::open(path, backups).expect("reopen store");
    assert_eq!(reopened.state().instances.len(), 3);
    assert_eq!(reopened.state().invoices.len(), 3);
    let definition = reopened
        .read(|tx| tx.definition(id))
        .expect("read")
        .expect("definition present");
    assert_eq!(definition.next_run_date, Some(date(2026, 4, 1)));

    let again = engine.generate(&mut reopened, date(2026, 3, 1)).expect("generate again");
    assert_eq!(again.created, 0);
}

#[test]
fn failed_transaction_leaves_file_untouched() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("charges.json");
    let mut store =
        JsonChargeStore::open(path.clone(), dir.path().join("backups")).expect("open store");
    seed(&mut store, date(2026, 1, 1));
    let before = fs::read_to_string(&path).expect("snapshot written");

    let result: Result<(), CoreError> = store.transaction(|tx| {
        let mut definition = tx.definitions()?.remove(0);
        definition.title = "Changed".into();
        tx.update_definition(&definition)?;
        Err(CoreError::Storage("simulated failure".into()))
    });

    assert!(result.is_err());
    assert_eq!(fs::read_to_string(&path).expect("snapshot"), before);
    assert_eq!(store.state().definitions[0].title, "Internet");
}

#[test]
fn read_only_transactions_do_not_rewrite_snapshot() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("charges.json");
    let mut store = JsonChargeStore::open(path.clone(), dir.path().join("backups")).expect("open");

    store.read(|tx| tx.definitions()).expect("read");

    assert!(!path.exists());
}

#[test]
fn backups_are_listed_and_restorable() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("charges.json");
    let mut store =
        JsonChargeStore::open(path.clone(), dir.path().join("backups")).expect("open store");
    seed(&mut store, date(2026, 1, 1));

    let info = store.backup(Some("Before cleanup!")).expect("backup");
    assert!(info.id.starts_with("charges_"));
    assert!(info.id.ends_with("_before-cleanup.json"));
    assert!(info.created_at.is_some());

    store
        .transaction(|tx| {
            let mut definition = tx.definitions()?.remove(0);
            definition.title = "Renamed".into();
            tx.update_definition(&definition)
        })
        .expect("rename");

    let backups = store.list_backups().expect("list backups");
    assert!(backups.iter().any(|entry| entry.id == info.id));

    store.restore(&info).expect("restore");
    assert_eq!(store.state().definitions[0].title, "Internet");
    let reloaded = JsonChargeStore::open(path, dir.path().join("backups")).expect("reopen");
    assert_eq!(reloaded.state().definitions[0].title, "Internet");
}

#[test]
fn snapshot_accepts_stopped_status_alias() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("charges.json");
    let mut store =
        JsonChargeStore::open(path.clone(), dir.path().join("backups")).expect("open store");
    seed(&mut store, date(2026, 1, 1));
    drop(store);

    let raw = fs::read_to_string(&path).expect("snapshot");
    let mut value: serde_json::Value = serde_json::from_str(&raw).expect("parse snapshot");
    value["definitions"][0]["status"] = "stopped".into();
    fs::write(&path, value.to_string()).expect("rewrite");

    let reopened = JsonChargeStore::open(path, dir.path().join("backups")).expect("reopen");
    assert_eq!(
        reopened.state().definitions[0].status,
        tally_domain::DefinitionStatus::Cancelled
    );
}

#[test]
fn undecodable_definition_is_skipped_and_kept() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("charges.json");
    let backups = dir.path().join("backups");
    let mut store = JsonChargeStore::open(path.clone(), backups.clone()).expect("open store");
    let healthy = seed(&mut store, date(2026, 1, 1));
    drop(store);

    let broken = Uuid::new_v4();
    let raw = fs::read_to_string(&path).expect("snapshot");
    let mut value: serde_json::Value = serde_json::from_str(&raw).expect("parse snapshot");
    let mut legacy = value["definitions"][0].clone();
    legacy["id"] = broken.to_string().into();
    legacy["recurrence_type"] = "fortnightly".into();
    value["definitions"]
        .as_array_mut()
        .expect("definitions array")
        .push(legacy);
    fs::write(&path, value.to_string()).expect("rewrite");

    let mut store = JsonChargeStore::open(path.clone(), backups.clone()).expect("reopen");
    assert_eq!(store.state().definitions.len(), 1);
    assert_eq!(store.state().unreadable_definitions[0].id, broken);

    let engine = RecurrenceEngine::new(
        EngineSettings::default(),
        Arc::new(FixedClock::on(date(2026, 1, 1))),
    );
    let report = engine.generate(&mut store, date(2026, 1, 1)).expect("generate");
    assert_eq!(report.created, 1);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].id, broken);
    assert!(report.failed.is_empty());
    let listed = store.read(|tx| tx.definitions()).expect("list");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, healthy);
    drop(store);

    let reopened = JsonChargeStore::open(path, backups).expect("reopen after write");
    assert_eq!(reopened.state().instances.len(), 1);
    assert_eq!(reopened.state().unreadable_definitions.len(), 1);
    assert_eq!(
        reopened.state().unreadable_definitions[0].row["recurrence_type"],
        "fortnightly"
    );
}
