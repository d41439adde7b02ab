use async_trait::async_trait;
use serde_json::Value;

use crate::error::RemoteResult;

/// Carries JSON requests to a server and returns the raw response envelope.
///
/// The envelope has the shape `{"id", "status", "type", "result" | "error", "error_message"}`.
/// Decoding the envelope is left to [crate::DivvydRemoteInstrumented] so that every transport is
/// checked by the same code.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn request(&self, command: &str, params: Value) -> RemoteResult<Value>;

    async fn close(&self) -> RemoteResult<()>;
}
