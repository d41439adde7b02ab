mod operations_table;

use std::collections::BTreeMap;

use parking_lot::Mutex;
use tabled::settings::Style;
use tabled::Table;

use crate::report::operations_table::OperationRow;
use crate::OperationRecord;

/// Aggregated timings for one operation id.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationSummary {
    pub operation_id: String,
    pub total_operations: usize,
    pub failed_operations: usize,
    pub total_duration_ms: f64,
    pub min_time_ms: Option<f64>,
    pub max_time_ms: Option<f64>,
}

/// Keeps every operation in memory and prints a summary table when the run is finalised.
///
/// A disabled reporter drops records on the floor, which keeps the call sites unconditional.
#[derive(Debug)]
pub struct Reporter {
    enabled: bool,
    operation_records: Mutex<Vec<OperationRecord>>,
}

impl Default for Reporter {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Reporter {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            operation_records: Mutex::new(Vec::new()),
        }
    }

    pub fn disabled() -> Self {
        Self::new(false)
    }

    pub fn add_operation(&self, operation_record: OperationRecord) {
        if self.enabled {
            self.operation_records.lock().push(operation_record);
        }
    }

    pub fn summary(&self) -> Vec<OperationSummary> {
        let records = self.operation_records.lock();
        let mut grouped: BTreeMap<&str, Vec<&OperationRecord>> = BTreeMap::new();
        for record in records.iter() {
            grouped
                .entry(record.operation_id.as_str())
                .or_default()
                .push(record);
        }

        grouped
            .into_iter()
            .map(|(operation_id, operations)| {
                let millis = |record: &&OperationRecord| {
                    record
                        .duration()
                        .map(|d| d.as_micros() as f64 / 1000.0)
                        .unwrap_or_default()
                };
                let succeeded = operations.iter().filter(|op| !op.is_error);

                OperationSummary {
                    operation_id: operation_id.to_string(),
                    total_operations: operations.len(),
                    failed_operations: operations.iter().filter(|op| op.is_error).count(),
                    total_duration_ms: operations.iter().map(millis).sum(),
                    min_time_ms: succeeded.clone().map(millis).reduce(f64::min),
                    max_time_ms: succeeded.map(millis).reduce(f64::max),
                }
            })
            .collect()
    }

    /// Print the summary of operations, if anything was recorded.
    pub fn finalize(&self) {
        let rows = self
            .summary()
            .into_iter()
            .map(OperationRow::from)
            .collect::<Vec<_>>();
        if rows.is_empty() {
            return;
        }

        let mut table = Table::new(rows);
        table.with(Style::modern());

        println!("\nSummary of operations");
        println!("{table}");
    }
}
