use std::fmt;
use std::time::Duration;

use tabled::settings::Style;
use tabled::{Table, Tabled};

/// What happened to one scenario.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScenarioOutcome {
    Passed,
    /// The first step that failed, and why.
    Failed { step: String, error: String },
    /// The scenario never ran because the suite was stopped before it.
    Skipped { reason: String },
}

impl fmt::Display for ScenarioOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScenarioOutcome::Passed => write!(f, "passed"),
            ScenarioOutcome::Failed { step, error } => write!(f, "failed: {step}: {error}"),
            ScenarioOutcome::Skipped { reason } => write!(f, "skipped: {reason}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScenarioReport {
    pub name: String,
    pub outcome: ScenarioOutcome,
    pub duration: Duration,
}

impl ScenarioReport {
    pub fn passed(&self) -> bool {
        self.outcome == ScenarioOutcome::Passed
    }
}

#[derive(Debug, Clone)]
pub struct SuiteReport {
    pub suite_name: String,
    pub scenarios: Vec<ScenarioReport>,
}

impl SuiteReport {
    pub(crate) fn new(suite_name: String) -> Self {
        Self {
            suite_name,
            scenarios: Vec::new(),
        }
    }

    pub fn scenario(&self, name: &str) -> Option<&ScenarioReport> {
        self.scenarios.iter().find(|s| s.name == name)
    }

    pub fn passed_count(&self) -> usize {
        self.scenarios.iter().filter(|s| s.passed()).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &ScenarioReport> {
        self.scenarios
            .iter()
            .filter(|s| matches!(s.outcome, ScenarioOutcome::Failed { .. }))
    }

    /// A suite succeeds when every scenario that was selected ran and passed.
    pub fn is_success(&self) -> bool {
        self.scenarios.iter().all(ScenarioReport::passed)
    }

    pub fn print_summary(&self) {
        let rows = self
            .scenarios
            .iter()
            .map(|s| ScenarioRow {
                scenario: s.name.clone(),
                outcome: s.outcome.to_string(),
                duration_ms: s.duration.as_millis(),
            })
            .collect::<Vec<_>>();

        let mut table = Table::new(rows);
        table.with(Style::modern());

        println!(
            "\nSuite {}: {} of {} scenarios passed",
            self.suite_name,
            self.passed_count(),
            self.scenarios.len()
        );
        println!("{table}");
    }
}

#[derive(Tabled)]
struct ScenarioRow {
    scenario: String,
    outcome: String,
    duration_ms: u128,
}
