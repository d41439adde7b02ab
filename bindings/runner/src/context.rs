use anyhow::Context;
use divvyd_client_instrumented::prelude::DivvydRemote;
use harness_runner::prelude::UserValuesConstraint;

use crate::accounts::AccountBook;
use crate::divvyd_runner::DivvydRunner;

/// The value every divvyd scenario carries from its setup to its teardown.
#[derive(Default, Debug)]
pub struct DivvydScenarioContext {
    pub(crate) remote: Option<DivvydRemote>,
    pub(crate) accounts: AccountBook,
    pub(crate) divvyd_runner: Option<DivvydRunner>,
}

impl UserValuesConstraint for DivvydScenarioContext {}

impl DivvydScenarioContext {
    /// The connection opened by [crate::prelude::connect_remote].
    pub fn remote(&self) -> anyhow::Result<&DivvydRemote> {
        self.remote
            .as_ref()
            .context("Not connected, call 'connect_remote' in the suite setup")
    }

    pub fn accounts(&self) -> &AccountBook {
        &self.accounts
    }

    pub fn accounts_mut(&mut self) -> &mut AccountBook {
        &mut self.accounts
    }
}
