mod chain;
mod cli;
mod context;
mod definition;
mod executor;
mod init;
mod progress;
mod report;
mod run;
mod shutdown;
mod types;

pub mod prelude {
    pub use crate::chain::{ChainMode, StepChain, StepFailure};
    pub use crate::cli::ScenarioSuiteCli;
    pub use crate::context::UserValuesConstraint;
    pub use crate::context::{RunnerContext, ScenarioContext};
    pub use crate::definition::{HookResult, SuiteDefinitionBuilder};
    pub use crate::executor::Executor;
    pub use crate::init::init;
    pub use crate::report::{ScenarioOutcome, ScenarioReport, SuiteReport};
    pub use crate::run::run;
    pub use crate::types::HarnessResult;

    pub use harness_core::prelude::{ShutdownSignalError, SuiteAbortError};
    pub use harness_instruments::Reporter;
}
