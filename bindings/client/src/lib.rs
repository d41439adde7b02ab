mod error;
mod in_memory;
mod remote;
mod transport;
mod types;
mod websocket;

pub use error::{handle_remote_err, RemoteError, RemoteResult};
pub use in_memory::{InMemoryLedger, GENESIS_ADDRESS, GENESIS_PASSPHRASE};
pub use remote::{connect, DivvydRemoteInstrumented};
pub use transport::Transport;
pub use websocket::WebsocketTransport;

pub mod prelude {
    pub use crate::remote::DivvydRemoteInstrumented as DivvydRemote;
    pub use crate::{connect, handle_remote_err, RemoteError, RemoteResult};

    // The typed schema is re-exported here so scenarios only need to depend on this crate.
    pub use crate::types::{
        AccountFlag, AccountRootFlags, AccountSetTxFlag, Amount, AmountParseError,
        DivvyStateEntry, EngineResult, LedgerSelector, LineStateFlags, PathAlternative,
        PathFindResult, PathStep, SubmitResult, Transaction, TrustLine, TrustSetTxFlag, Wallet,
    };
}
