use std::{fmt::Debug, sync::Arc};

use harness_core::prelude::{DelegatedShutdownListener, ShutdownHandle};
use harness_instruments::Reporter;

use crate::executor::Executor;

pub trait UserValuesConstraint: Default + Debug + Send + Sync + 'static {}

/// State shared by every scenario in a suite.
#[derive(Debug)]
pub struct RunnerContext {
    executor: Arc<Executor>,
    reporter: Arc<Reporter>,
    shutdown_handle: ShutdownHandle,
    connection_string: String,
}

impl RunnerContext {
    pub(crate) fn new(
        executor: Arc<Executor>,
        reporter: Arc<Reporter>,
        shutdown_handle: ShutdownHandle,
        connection_string: String,
    ) -> Self {
        Self {
            executor,
            reporter,
            shutdown_handle,
            connection_string,
        }
    }

    pub fn executor(&self) -> &Arc<Executor> {
        &self.executor
    }

    pub fn reporter(&self) -> Arc<Reporter> {
        self.reporter.clone()
    }

    pub fn get_connection_string(&self) -> &str {
        &self.connection_string
    }

    /// Stop the suite: the step in flight is cancelled and the remaining scenarios are skipped.
    pub fn force_stop_suite(&self) {
        self.shutdown_handle.shutdown();
    }
}

/// The mutable state of one scenario, created fresh before its setup and dropped after its
/// teardown.
pub struct ScenarioContext<SV: UserValuesConstraint> {
    runner_context: Arc<RunnerContext>,
    scenario_name: String,
    shutdown_listener: DelegatedShutdownListener,
    value: SV,
}

impl<SV: UserValuesConstraint> ScenarioContext<SV> {
    pub(crate) fn new(
        runner_context: Arc<RunnerContext>,
        scenario_name: String,
        shutdown_listener: DelegatedShutdownListener,
    ) -> Self {
        Self {
            runner_context,
            scenario_name,
            shutdown_listener,
            value: Default::default(),
        }
    }

    pub fn runner_context(&self) -> &Arc<RunnerContext> {
        &self.runner_context
    }

    pub fn scenario_name(&self) -> &str {
        &self.scenario_name
    }

    pub fn shutdown_listener(&mut self) -> &mut DelegatedShutdownListener {
        &mut self.shutdown_listener
    }

    pub fn get_mut(&mut self) -> &mut SV {
        &mut self.value
    }

    pub fn get(&self) -> &SV {
        &self.value
    }
}
