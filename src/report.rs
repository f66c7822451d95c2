//! Run report for text and JSON modes
//!
//! Records are grouped under their scenario in first-seen order. Text output is
//! one `PASS`/`SKIP`/`FAIL` line per step followed by a tally.

use crate::context::{StepOutcome, StepRecord};
use serde::Serialize;

/// Steps of one scenario, in execution order
#[derive(Debug, Serialize)]
pub struct ScenarioReport {
    pub name: String,
    pub steps: Vec<StepRecord>,
}

/// Everything a run produced
#[derive(Debug, Serialize)]
pub struct Report {
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub scenarios: Vec<ScenarioReport>,
}

impl Report {
    pub fn new(records: &[StepRecord]) -> Self {
        let mut scenarios: Vec<ScenarioReport> = Vec::new();
        for record in records {
            match scenarios.iter_mut().find(|s| s.name == record.scenario) {
                Some(group) => group.steps.push(record.clone()),
                None => scenarios.push(ScenarioReport {
                    name: record.scenario.clone(),
                    steps: vec![record.clone()],
                }),
            }
        }

        Self {
            passed: records.iter().filter(|r| r.outcome.is_pass()).count(),
            failed: records.iter().filter(|r| r.outcome.is_failure()).count(),
            skipped: records.iter().filter(|r| r.outcome.is_skipped()).count(),
            scenarios,
        }
    }

    /// 0 only when every step passed; skips count against the run
    pub fn exit_code(&self) -> i32 {
        if self.failed == 0 && self.skipped == 0 { 0 } else { 1 }
    }

    pub fn render_text(&self) -> String {
        let mut out = String::new();
        for scenario in &self.scenarios {
            out.push_str(&scenario.name);
            out.push('\n');
            for record in &scenario.steps {
                out.push_str("  ");
                out.push_str(&step_line(record));
                out.push('\n');
            }
            out.push('\n');
        }
        out.push_str(&format!(
            "{} passed, {} failed, {} skipped\n",
            self.passed, self.failed, self.skipped
        ));
        out
    }
}

/// Report text and process exit code for `records`
pub fn summarize(records: &[StepRecord]) -> (String, i32) {
    let report = Report::new(records);
    (report.render_text(), report.exit_code())
}

fn step_line(record: &StepRecord) -> String {
    let line = match &record.outcome {
        StepOutcome::Pass => format!("PASS {}", record.step),
        StepOutcome::Skipped { missing } => {
            format!("SKIP {} (missing: {})", record.step, missing.join(", "))
        }
        StepOutcome::BusinessFailure { code, message } => {
            format!("FAIL {}: business failure {}: {}", record.step, code, message)
        }
        StepOutcome::TransportFailure { cause } => {
            format!("FAIL {}: transport failure: {}", record.step, cause)
        }
        StepOutcome::AssertionFailure { expected, actual } => format!(
            "FAIL {}: expected {}, got {}",
            record.step, expected, actual
        ),
    };
    match &record.note {
        Some(note) => format!("{} [{}]", line, note),
        None => line,
    }
}

/// Print JSON output to stdout
pub fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Error serializing JSON: {}", e);
            std::process::exit(1);
        }
    }
}
