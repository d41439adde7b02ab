use tabled::Tabled;

use crate::OperationSummary;

#[derive(Tabled)]
pub struct OperationRow {
    pub operation_id: String,
    #[tabled(display = "float2")]
    pub avg_time_ms: f64,
    #[tabled(display = "float2_opt")]
    pub min_time_ms: Option<f64>,
    #[tabled(display = "float2_opt")]
    pub max_time_ms: Option<f64>,
    pub total_operations: usize,
    pub failed_operations: usize,
    #[tabled(display = "float2")]
    pub total_duration_ms: f64,
}

impl From<OperationSummary> for OperationRow {
    fn from(summary: OperationSummary) -> Self {
        Self {
            avg_time_ms: summary.total_duration_ms / summary.total_operations.max(1) as f64,
            operation_id: summary.operation_id,
            min_time_ms: summary.min_time_ms,
            max_time_ms: summary.max_time_ms,
            total_operations: summary.total_operations,
            failed_operations: summary.failed_operations,
            total_duration_ms: summary.total_duration_ms,
        }
    }
}

fn float2(n: &f64) -> String {
    format!("{:.2}", n)
}

fn float2_opt(n: &Option<f64>) -> String {
    n.map(|n| format!("{:.2}", n)).unwrap_or_else(|| "-".to_string())
}
