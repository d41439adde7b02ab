/// Return this error from a scenario step or hook to indicate that the rest of the suite cannot
/// run.
///
/// This should be used when the failure is not about the behaviour being tested but about the
/// environment, for example the connection to the server under test has been closed. The current
/// scenario is reported as failed and every scenario after it is skipped, since they would all
/// fail for the same reason.
#[derive(derive_more::Error, derive_more::Display, Debug)]
#[display("Suite aborted: {reason}")]
pub struct SuiteAbortError {
    reason: String,
}

impl SuiteAbortError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

impl Default for SuiteAbortError {
    fn default() -> Self {
        Self::new("connection to the server was lost")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_reason() {
        let err = SuiteAbortError::new("websocket closed");
        assert_eq!(err.to_string(), "Suite aborted: websocket closed");
        assert_eq!(err.reason(), "websocket closed");
    }

    #[test]
    fn downcasts_through_anyhow() {
        let err: Box<dyn std::error::Error + Send + Sync> = Box::new(SuiteAbortError::default());
        assert!(err.downcast_ref::<SuiteAbortError>().is_some());
    }
}
