mod report;

use std::time::{Duration, Instant};

pub use report::{OperationSummary, Reporter};

/// Timing of a single operation against the server, such as one RPC request.
#[derive(Debug, Clone)]
pub struct OperationRecord {
    operation_id: String,
    started: Instant,
    elapsed: Option<Duration>,
    is_error: bool,
}

impl OperationRecord {
    pub fn new(operation_id: impl Into<String>) -> Self {
        Self {
            operation_id: operation_id.into(),
            started: Instant::now(),
            elapsed: None,
            is_error: false,
        }
    }

    pub fn operation_id(&self) -> &str {
        &self.operation_id
    }

    /// The time the operation took. Only available once the record has been reported.
    pub fn duration(&self) -> Option<Duration> {
        self.elapsed
    }

    pub fn is_error(&self) -> bool {
        self.is_error
    }

    fn finish(mut self, is_error: bool) -> Self {
        self.elapsed = Some(self.started.elapsed());
        self.is_error = is_error;
        self
    }
}

/// Close the record using the outcome of the operation and hand it to the reporter.
pub fn report_operation<T, E>(
    reporter: &Reporter,
    operation_record: OperationRecord,
    response: &Result<T, E>,
) {
    let record = operation_record.finish(response.is_err());
    log::trace!(
        "Operation {} took {:?}, failed? {}",
        record.operation_id,
        record.elapsed,
        record.is_error
    );
    reporter.add_operation(record);
}
