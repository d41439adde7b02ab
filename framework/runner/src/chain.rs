use std::fmt;

use harness_core::prelude::ShutdownSignalError;

use crate::context::{ScenarioContext, UserValuesConstraint};
use crate::types::HarnessResult;

/// How values move between the steps of a [StepChain].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainMode {
    /// Steps are independent. Every step receives `T::default()` and its output is only kept if it
    /// is the last step.
    Series,
    /// Each step receives the output of the step before it. The first step receives
    /// `T::default()`.
    Waterfall,
}

type StepFn<SV, T> = Box<dyn Fn(&mut ScenarioContext<SV>, T) -> HarnessResult<T> + Send + Sync>;

struct Step<SV: UserValuesConstraint, T> {
    label: String,
    run: StepFn<SV, T>,
}

/// An ordered list of labelled steps. A step only starts once the one before it has succeeded and
/// the first failure stops the chain.
pub struct StepChain<SV: UserValuesConstraint, T = ()> {
    mode: ChainMode,
    steps: Vec<Step<SV, T>>,
}

impl<SV: UserValuesConstraint, T: Default + 'static> StepChain<SV, T> {
    pub fn series() -> Self {
        Self::new(ChainMode::Series)
    }

    pub fn waterfall() -> Self {
        Self::new(ChainMode::Waterfall)
    }

    pub fn new(mode: ChainMode) -> Self {
        Self {
            mode,
            steps: Vec::new(),
        }
    }

    /// Append a step. The label describes what is being attempted and is what gets reported if the
    /// step fails.
    pub fn step<F>(mut self, label: impl Into<String>, run: F) -> Self
    where
        F: Fn(&mut ScenarioContext<SV>, T) -> HarnessResult<T> + Send + Sync + 'static,
    {
        self.steps.push(Step {
            label: label.into(),
            run: Box::new(run),
        });
        self
    }

    pub fn mode(&self) -> ChainMode {
        self.mode
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Run every step in order, returning the output of the last one.
    pub fn run(&self, ctx: &mut ScenarioContext<SV>) -> Result<T, StepFailure> {
        let mut carried = T::default();

        for (index, step) in self.steps.iter().enumerate() {
            if ctx.shutdown_listener().should_shutdown() {
                return Err(StepFailure::new(
                    index,
                    &step.label,
                    ShutdownSignalError::default().into(),
                ));
            }

            let input = match self.mode {
                ChainMode::Series => T::default(),
                ChainMode::Waterfall => std::mem::take(&mut carried),
            };

            log::debug!("[{}] step {}: {}", ctx.scenario_name(), index + 1, step.label);
            carried = (step.run)(ctx, input)
                .map_err(|source| StepFailure::new(index, &step.label, source))?;
        }

        Ok(carried)
    }
}

/// The first step of a chain that did not succeed.
#[derive(Debug)]
pub struct StepFailure {
    index: usize,
    label: String,
    source: anyhow::Error,
}

impl StepFailure {
    fn new(index: usize, label: &str, source: anyhow::Error) -> Self {
        Self {
            index,
            label: label.to_string(),
            source,
        }
    }

    /// Position of the failed step in its chain, starting at zero.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn error(&self) -> &anyhow::Error {
        &self.source
    }

    /// Check the type of the error the step returned.
    pub fn is<E>(&self) -> bool
    where
        E: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        self.source.is::<E>()
    }
}

impl fmt::Display for StepFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {:#}", self.label, self.source)
    }
}

impl std::error::Error for StepFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.source.as_ref())
    }
}
