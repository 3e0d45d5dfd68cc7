use chrono::NaiveDate;
use clap::Args;
use tally_engine::{GenerationOptions, GenerationReport};
use uuid::Uuid;

use crate::{
    cli::{output, Session},
    errors::TallyError,
};

#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Generate cycles due on or before this date (defaults to today).
    #[arg(long = "as-of", value_name = "YYYY-MM-DD")]
    pub as_of: Option<NaiveDate>,

    /// Only process this definition.
    #[arg(long, value_name = "ID")]
    pub definition: Option<Uuid>,

    /// Days past the as-of date to include, overriding the config.
    #[arg(long, value_name = "DAYS")]
    pub lookahead: Option<u32>,

    /// Print the run report as JSON.
    #[arg(long)]
    pub json: bool,
}

pub fn run(session: &mut Session, args: GenerateArgs) -> Result<(), TallyError> {
    let as_of = args.as_of.unwrap_or_else(|| session.today());
    let options = GenerationOptions {
        definition: args.definition,
        lookahead_days: args.lookahead,
    };
    let engine = session.engine();
    let report = engine.generate_as(&mut session.store, &session.actor, as_of, &options)?;

    if args.json {
        output::print_json(&report)?;
    } else {
        for line in summary_lines(&report) {
            println!("{line}");
        }
    }

    if report.has_failures() {
        return Err(TallyError::GenerationFailed(report.failed.len()));
    }
    Ok(())
}

fn summary_lines(report: &GenerationReport) -> Vec<String> {
    let mut lines = vec![format!(
        "Generated {} charge(s) over {} cycle(s) from {} definition(s), due through {} (as of {}).",
        report.created, report.cycles, report.processed, report.run_until, report.as_of
    )];
    lines.extend(report.completed.iter().map(|id| format!("completed  {id}")));
    lines.extend(
        report
            .limited
            .iter()
            .map(|id| format!("limited    {id} (cycle limit reached, resumes next run)")),
    );
    lines.extend(
        report
            .skipped
            .iter()
            .map(|skip| format!("skipped    {}: {}", skip.id, skip.reason)),
    );
    lines.extend(report.failed.iter().map(|failure| {
        format!(
            "failed     {} after {} cycle(s): {}",
            failure.id, failure.cycles_committed, failure.error
        )
    }));
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_engine::{FailedDefinition, SkippedDefinition};

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
    }

    #[test]
    fn summary_lists_every_outcome() {
        let skipped = Uuid::new_v4();
        let failed = Uuid::new_v4();
        let report = GenerationReport {
            as_of: date(2026, 4, 1),
            run_until: date(2026, 4, 1),
            processed: 3,
            created: 4,
            cycles: 4,
            completed: Vec::new(),
            skipped: vec![SkippedDefinition {
                id: skipped,
                reason: "unknown recurrence type".into(),
            }],
            failed: vec![FailedDefinition {
                id: failed,
                error: "disk full".into(),
                cycles_committed: 2,
            }],
            limited: Vec::new(),
        };

        let lines = summary_lines(&report);

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("Generated 4 charge(s) over 4 cycle(s) from 3 definition(s)"));
        assert!(lines[1].contains(&skipped.to_string()));
        assert!(lines[2].contains("after 2 cycle(s): disk full"));
    }
}
