// src/db/monitoring.rs

use std::time::Instant;
use log::{debug, error};
use once_cell::sync::Lazy;
use prometheus::{Encoder, TextEncoder, IntCounterVec, HistogramVec, register_int_counter_vec, register_histogram_vec};

/// Строки пакетной обработки по сущности и исходу
/// (inserted / updated / skipped / failed).
pub static RECONCILE_ROWS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "crm_reconcile_rows_total",
        "Rows processed by batch import and grid edits",
        &["entity", "outcome"]
    ).expect("Failed to create RECONCILE_ROWS")
});

pub static DB_OPERATION_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "crm_db_operation_duration_seconds",
        "Duration of batch DB operations in seconds",
        &["operation"],
        vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 5.0]
    ).expect("Failed to create DB_OPERATION_DURATION")
});

pub fn record_row(entity: &str, outcome: &str) {
    RECONCILE_ROWS.with_label_values(&[entity, outcome]).inc();
}

/// Выполняет операцию и пишет её длительность в гистограмму.
pub fn measure_db_operation<F, T>(operation: &str, f: F) -> T
where
    F: FnOnce() -> T,
{
    let start = Instant::now();
    let result = f();
    let secs = start.elapsed().as_secs_f64();

    DB_OPERATION_DURATION.with_label_values(&[operation]).observe(secs);

    debug!("DB operation {} took {:.4} seconds", operation, secs);
    result
}

/// Экспорт метрик в текстовом формате Prometheus.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
