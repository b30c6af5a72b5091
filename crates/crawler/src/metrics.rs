use once_cell::sync::Lazy;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Encoder, Histogram, IntCounter, IntCounterVec, IntGauge, TextEncoder,
};

pub static RUNS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "crawler_runs_total",
        "Total number of crawler passes attempted"
    )
    .expect("crawler runs total")
});

pub static RUN_FAILURES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "crawler_run_failure_total",
        "Crawler passes aborted by a fetch or sink error"
    )
    .expect("crawler run failures")
});

pub static LAST_RUN_TIMESTAMP: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "crawler_last_run_timestamp_seconds",
        "Unix timestamp when the crawler pass last started"
    )
    .expect("crawler last run timestamp")
});

pub static LAST_SUCCESS_TIMESTAMP: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "crawler_last_success_timestamp_seconds",
        "Unix timestamp when the crawler pass last completed"
    )
    .expect("crawler last success timestamp")
});

pub static RUN_DURATION: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "crawler_run_duration_seconds",
        "Wall clock duration of a crawler pass",
        vec![0.5, 1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0]
    )
    .expect("crawler run duration")
});

pub static FETCH_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "crawler_fetch_requests_total",
        "Change query pages requested grouped by outcome",
        &["outcome"]
    )
    .expect("crawler fetch requests")
});

pub static FETCH_LATENCY_SECONDS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "crawler_fetch_latency_seconds",
        "Latency of a single change query page",
        vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
    )
    .expect("crawler fetch latency")
});

pub static CHANGES_FETCHED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "crawler_changes_fetched_total",
        "Raw changes returned by the Gerrit API"
    )
    .expect("crawler changes fetched")
});

pub static DOCUMENTS_EMITTED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "crawler_documents_emitted_total",
        "Documents handed to the sink grouped by type",
        &["type"]
    )
    .expect("crawler documents emitted")
});

pub static EXTRACTION_FAILURES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "crawler_extraction_failures_total",
        "Raw changes skipped because extraction failed"
    )
    .expect("crawler extraction failures")
});

/// Text exposition of the default registry.
pub fn render() -> String {
    let mut buffer = Vec::new();
    if let Err(err) = TextEncoder::new().encode(&prometheus::gather(), &mut buffer) {
        tracing::warn!(error = %err, "failed to encode metrics");
        return String::new();
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_includes_touched_metrics() {
        EXTRACTION_FAILURES_TOTAL.inc_by(0);
        let text = render();
        assert!(text.contains("crawler_extraction_failures_total"));
    }
}
