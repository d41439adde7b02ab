mod abort;
mod shutdown;

pub mod prelude {
    pub use crate::abort::SuiteAbortError;
    pub use crate::shutdown::{DelegatedShutdownListener, ShutdownHandle, ShutdownSignalError};
}
