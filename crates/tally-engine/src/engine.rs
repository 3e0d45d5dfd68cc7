//! Date-driven expansion of recurring definitions into charge instances.

use std::sync::Arc;

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use tally_domain::{Actor, GeneratedChargeInstance};

use crate::{
    advance_service::AdvanceService,
    invoice_service::InvoiceService,
    policy::{Capability, Policy},
    settings::EngineSettings,
    storage::{ChargeStore, ChargeTx, DueCandidate},
    time::Clock,
    CoreError,
};

/// Per-run overrides of the engine settings.
#[derive(Debug, Clone, Default)]
pub struct GenerationOptions {
    /// Only process this definition.
    pub definition: Option<Uuid>,
    /// Overrides [`EngineSettings::lookahead_days`].
    pub lookahead_days: Option<u32>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SkippedDefinition {
    pub id: Uuid,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FailedDefinition {
    pub id: Uuid,
    pub error: String,
    /// Cycles persisted for this definition before the failure.
    pub cycles_committed: u32,
}

/// Outcome of one generation run.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationReport {
    pub as_of: NaiveDate,
    pub run_until: NaiveDate,
    /// Definitions examined.
    pub processed: usize,
    /// Instances newly written.
    pub created: usize,
    /// Cycles advanced, including ones that reused an existing instance.
    pub cycles: usize,
    pub completed: Vec<Uuid>,
    pub skipped: Vec<SkippedDefinition>,
    pub failed: Vec<FailedDefinition>,
    /// Definitions that hit the per-run cycle limit; any cycles left resume next run.
    pub limited: Vec<Uuid>,
}

impl GenerationReport {
    fn new(as_of: NaiveDate, run_until: NaiveDate) -> Self {
        Self {
            as_of,
            run_until,
            processed: 0,
            created: 0,
            cycles: 0,
            completed: Vec::new(),
            skipped: Vec::new(),
            failed: Vec::new(),
            limited: Vec::new(),
        }
    }

    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CycleStep {
    Materialized { created: bool, completed: bool },
    /// The schedule already ran past its end date.
    Completed,
    /// Nothing due, or the definition is no longer active.
    Idle,
}

pub struct RecurrenceEngine {
    settings: EngineSettings,
    clock: Arc<dyn Clock>,
}

impl RecurrenceEngine {
    pub fn new(settings: EngineSettings, clock: Arc<dyn Clock>) -> Self {
        Self { settings, clock }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// Materializes every cycle due on or before `as_of` as the scheduler.
    pub fn generate<S: ChargeStore>(
        &self,
        store: &mut S,
        as_of: NaiveDate,
    ) -> Result<GenerationReport, CoreError> {
        self.generate_with(store, as_of, &GenerationOptions::default())
    }

    pub fn generate_with<S: ChargeStore>(
        &self,
        store: &mut S,
        as_of: NaiveDate,
        options: &GenerationOptions,
    ) -> Result<GenerationReport, CoreError> {
        self.generate_as(store, &Actor::system(), as_of, options)
    }

    /// Runs generation on behalf of `actor`.
    ///
    /// Each cycle commits in its own transaction: the instance, its invoice,
    /// any advance payment and the advanced `next_run_date` land together.
    /// A definition that fails stops at its last committed cycle while the
    /// remaining definitions still run.
    pub fn generate_as<S: ChargeStore>(
        &self,
        store: &mut S,
        actor: &Actor,
        as_of: NaiveDate,
        options: &GenerationOptions,
    ) -> Result<GenerationReport, CoreError> {
        Policy::authorize(actor, Capability::RunGeneration)?;
        let lookahead = options
            .lookahead_days
            .unwrap_or(self.settings.lookahead_days);
        let run_until = as_of
            .checked_add_days(Days::new(u64::from(lookahead)))
            .ok_or_else(|| {
                CoreError::InvalidOperation(format!(
                    "lookahead of {lookahead} days from {as_of} is out of range"
                ))
            })?;

        let mut report = GenerationReport::new(as_of, run_until);
        let candidates = store.read(|tx| tx.due_definitions(run_until, options.definition))?;
        info!(%as_of, %run_until, due = candidates.len(), "generation started");

        for candidate in candidates {
            report.processed += 1;
            match candidate {
                DueCandidate::Malformed { id, reason } => {
                    warn!(definition = %id, %reason, "skipping malformed definition");
                    report.skipped.push(SkippedDefinition { id, reason });
                }
                DueCandidate::Ready(definition) => {
                    if let Err(err) = definition.rule.validate() {
                        warn!(definition = %definition.id, error = %err, "skipping definition with invalid rule");
                        report.skipped.push(SkippedDefinition {
                            id: definition.id,
                            reason: err.to_string(),
                        });
                        continue;
                    }
                    self.run_definition(store, definition.id, run_until, &mut report);
                }
            }
        }

        info!(
            processed = report.processed,
            created = report.created,
            cycles = report.cycles,
            completed = report.completed.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "generation finished"
        );
        Ok(report)
    }

    fn run_definition<S: ChargeStore>(
        &self,
        store: &mut S,
        id: Uuid,
        run_until: NaiveDate,
        report: &mut GenerationReport,
    ) {
        let today = self.clock.today();
        let mut cycles = 0u32;
        loop {
            if cycles >= self.settings.max_cycles_per_definition {
                warn!(definition = %id, cycles, "cycle limit reached; remaining cycles wait for the next run");
                report.limited.push(id);
                return;
            }
            let step = store.transaction(|tx| self.materialize_next_cycle(tx, id, run_until, today));
            match step {
                Ok(CycleStep::Materialized { created, completed }) => {
                    cycles += 1;
                    report.cycles += 1;
                    if created {
                        report.created += 1;
                    }
                    if completed {
                        report.completed.push(id);
                        return;
                    }
                }
                Ok(CycleStep::Completed) => {
                    report.completed.push(id);
                    return;
                }
                Ok(CycleStep::Idle) => return,
                Err(err) if err.is_definition_fault() => {
                    warn!(definition = %id, error = %err, "skipping definition");
                    report.skipped.push(SkippedDefinition {
                        id,
                        reason: err.to_string(),
                    });
                    return;
                }
                Err(err) => {
                    warn!(definition = %id, error = %err, cycles, "definition failed; cycle rolled back");
                    report.failed.push(FailedDefinition {
                        id,
                        error: err.to_string(),
                        cycles_committed: cycles,
                    });
                    return;
                }
            }
        }
    }

    /// Materializes the definition's current cycle if it is due.
    fn materialize_next_cycle(
        &self,
        tx: &mut dyn ChargeTx,
        id: Uuid,
        run_until: NaiveDate,
        today: NaiveDate,
    ) -> Result<CycleStep, CoreError> {
        let now = self.clock.now();
        let Some(mut definition) = tx.definition(id)? else {
            return Ok(CycleStep::Idle);
        };
        if !definition.status.is_active() {
            debug!(definition = %id, status = %definition.status, "definition no longer active");
            return Ok(CycleStep::Idle);
        }
        let Some(cycle_date) = definition.next_run_date else {
            return Ok(CycleStep::Idle);
        };
        if definition.ends_before(cycle_date) {
            definition.mark_completed(now);
            tx.update_definition(&definition)?;
            info!(definition = %id, "definition completed");
            return Ok(CycleStep::Completed);
        }
        if cycle_date > run_until {
            return Ok(CycleStep::Idle);
        }

        let next = definition
            .rule
            .advance(cycle_date)
            .map_err(|source| CoreError::InvalidRule { id, source })?;

        let (instance, created) = find_or_create_instance(tx, &definition, cycle_date, now)?;
        let (mut invoice, _) =
            InvoiceService::ensure_for_instance(tx, &instance, &self.settings, now)?;
        AdvanceService::apply_to_invoice(
            tx,
            &mut invoice,
            cycle_date,
            definition.created_by,
            now,
            today,
        )?;

        definition.next_run_date = Some(next);
        definition.touch(now);
        let completed = definition.ends_before(next);
        if completed {
            definition.mark_completed(now);
        }
        tx.update_definition(&definition)?;
        debug!(definition = %id, %cycle_date, %next, created, "cycle materialized");
        if completed {
            info!(definition = %id, "definition completed");
        }
        Ok(CycleStep::Materialized { created, completed })
    }
}

fn find_or_create_instance(
    tx: &mut dyn ChargeTx,
    definition: &tally_domain::RecurringChargeDefinition,
    cycle_date: NaiveDate,
    now: DateTime<Utc>,
) -> Result<(GeneratedChargeInstance, bool), CoreError> {
    if let Some(existing) = tx.instance_for_cycle(definition.id, cycle_date)? {
        debug!(definition = %definition.id, %cycle_date, "reusing existing instance");
        return Ok((existing, false));
    }
    let instance = GeneratedChargeInstance::from_definition(definition, cycle_date, now);
    tx.insert_instance(&instance)?;
    Ok((instance, true))
}
