use std::collections::HashSet;

use anyhow::bail;

use crate::chain::{StepChain, StepFailure};
use crate::cli::ScenarioSuiteCli;
use crate::context::{ScenarioContext, UserValuesConstraint};

pub type HookResult = anyhow::Result<()>;

pub type ScenarioHookMut<SV> = fn(&mut ScenarioContext<SV>) -> HookResult;

/// A step chain with its value type erased so scenarios with different threaded values can live
/// in one suite.
pub(crate) trait ScenarioSteps<SV: UserValuesConstraint>: Send + Sync {
    fn run(&self, ctx: &mut ScenarioContext<SV>) -> Result<(), StepFailure>;
}

impl<SV: UserValuesConstraint, T: Default + 'static> ScenarioSteps<SV> for StepChain<SV, T> {
    fn run(&self, ctx: &mut ScenarioContext<SV>) -> Result<(), StepFailure> {
        StepChain::run(self, ctx).map(|_| ())
    }
}

/// The builder for a suite definition.
///
/// A suite is a named group of scenarios that share a setup and a teardown hook. The hooks run
/// around every scenario, so each scenario starts from a fresh context.
pub struct SuiteDefinitionBuilder<SV: UserValuesConstraint> {
    /// The name of the suite.
    ///
    /// Recommended value is `env!("CARGO_PKG_NAME")`.
    name: String,
    cli: ScenarioSuiteCli,
    /// Runs before every scenario. If it fails, the scenario fails with the step label `setup` and
    /// its steps are not run.
    setup_fn: Option<ScenarioHookMut<SV>>,
    /// Runs after every scenario, whatever the outcome. This hook is best effort: an error is logged
    /// and does not change the scenario's outcome.
    teardown_fn: Option<ScenarioHookMut<SV>>,
    scenarios: Vec<ScenarioDefinition<SV>>,
}

pub(crate) struct ScenarioDefinition<SV: UserValuesConstraint> {
    pub name: String,
    pub steps: Box<dyn ScenarioSteps<SV>>,
}

pub(crate) struct SuiteDefinition<SV: UserValuesConstraint> {
    pub name: String,
    pub cli: ScenarioSuiteCli,
    pub setup_fn: Option<ScenarioHookMut<SV>>,
    pub teardown_fn: Option<ScenarioHookMut<SV>>,
    pub scenarios: Vec<ScenarioDefinition<SV>>,
}

impl<SV: UserValuesConstraint> SuiteDefinitionBuilder<SV> {
    pub fn new(name: &str, cli: ScenarioSuiteCli) -> Self {
        Self {
            name: name.to_string(),
            cli,
            setup_fn: None,
            teardown_fn: None,
            scenarios: Vec::new(),
        }
    }

    /// Set the setup hook [SuiteDefinitionBuilder::setup_fn] that runs before each scenario.
    pub fn use_setup(mut self, setup_fn: ScenarioHookMut<SV>) -> Self {
        self.setup_fn = Some(setup_fn);
        self
    }

    /// Set the teardown hook [SuiteDefinitionBuilder::teardown_fn] that runs after each scenario.
    pub fn use_teardown(mut self, teardown_fn: ScenarioHookMut<SV>) -> Self {
        self.teardown_fn = Some(teardown_fn);
        self
    }

    /// Add a scenario. Scenarios run in the order they are added.
    pub fn add_scenario<T: Default + 'static>(
        mut self,
        name: &str,
        steps: StepChain<SV, T>,
    ) -> Self {
        self.scenarios.push(ScenarioDefinition {
            name: name.to_string(),
            steps: Box::new(steps),
        });
        self
    }

    pub(crate) fn build(self) -> anyhow::Result<SuiteDefinition<SV>> {
        let mut seen = HashSet::new();
        for scenario in &self.scenarios {
            if !seen.insert(scenario.name.as_str()) {
                bail!(
                    "Scenario [{}] is defined more than once in suite [{}]",
                    scenario.name,
                    self.name
                );
            }
        }

        Ok(SuiteDefinition {
            name: self.name,
            cli: self.cli,
            setup_fn: self.setup_fn,
            teardown_fn: self.teardown_fn,
            scenarios: self.scenarios,
        })
    }
}

impl<SV: UserValuesConstraint> SuiteDefinition<SV> {
    /// The scenarios selected by the `--filter` option, in definition order.
    pub(crate) fn selected_scenarios(&self) -> impl Iterator<Item = &ScenarioDefinition<SV>> {
        let filter = self.cli.filter.as_deref();
        self.scenarios
            .iter()
            .filter(move |s| filter.map_or(true, |f| s.name.contains(f)))
    }
}
