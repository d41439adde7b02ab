mod accounts;
mod bin_path;
mod common;
mod context;
mod divvyd_runner;

pub mod prelude {
    /// Common operations for divvyd scenarios.
    ///
    /// This is a good place to start if you are getting started writing scenarios.
    pub use crate::common::*;

    pub use crate::accounts::{AccountBook, AccountKeys, ROOT_ACCOUNT};
    pub use crate::context::DivvydScenarioContext;
    pub use crate::divvyd_runner::{DivvydConfig, DivvydRunner};

    /// Re-export of the `harness_runner` prelude.
    ///
    /// This is for convenience so that you can depend on a single crate for the runner in your scenarios.
    pub use harness_runner::prelude::*;

    /// Re-export of the instrumented client for convenience.
    pub use divvyd_client_instrumented::prelude::*;
}
