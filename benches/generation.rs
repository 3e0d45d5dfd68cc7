use std::sync::Arc;

use chrono::NaiveDate;
use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use rust_decimal::Decimal;
use tally_core::{
    domain::{Actor, RecurrenceRule, RecurrenceType, Role},
    engine::{
        CategoryService, DefinitionDraft, DefinitionService, EngineSettings, FixedClock,
        InMemoryChargeStore, RecurrenceEngine,
    },
};
use uuid::Uuid;

fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

fn seeded_store(definitions: usize) -> InMemoryChargeStore {
    let mut store = InMemoryChargeStore::new();
    let admin = Actor::new(Uuid::new_v4(), Role::Admin);
    let clock = FixedClock::on(date(2024, 1, 1));
    let category = CategoryService::create(&mut store, &admin, &clock, "Bench").expect("category");
    let units = [
        RecurrenceType::Weekly,
        RecurrenceType::Monthly,
        RecurrenceType::Yearly,
    ];
    for idx in 0..definitions {
        let rule = RecurrenceRule::new(units[idx % units.len()], 1).expect("rule");
        DefinitionService::create(
            &mut store,
            &admin,
            &clock,
            DefinitionDraft {
                title: format!("Charge {idx}"),
                amount: Decimal::new(1000 + idx as i64, 2),
                rule,
                start_date: date(2024, 1, 1 + (idx % 28) as u32),
                end_date: None,
                category_id: category.id,
                notes: None,
            },
        )
        .expect("definition");
    }
    store
}

fn bench_catch_up(c: &mut Criterion) {
    let as_of = date(2025, 12, 31);
    let engine = RecurrenceEngine::new(EngineSettings::default(), Arc::new(FixedClock::on(as_of)));
    let template = seeded_store(black_box(200));

    c.bench_function("catch_up_200_definitions_24_months", |b| {
        b.iter_batched(
            || InMemoryChargeStore::from_state(template.state().clone()),
            |mut store| {
                engine.generate(&mut store, as_of).expect("generate");
            },
            BatchSize::LargeInput,
        )
    });

    c.bench_function("idempotent_rerun_200_definitions", |b| {
        let mut store = InMemoryChargeStore::from_state(template.state().clone());
        engine.generate(&mut store, as_of).expect("first run");
        b.iter(|| engine.generate(&mut store, black_box(as_of)).expect("rerun"))
    });
}

criterion_group!(benches, bench_catch_up);
criterion_main!(benches);
