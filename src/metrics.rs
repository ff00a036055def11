// Prometheus metrics definitions for the respawn bot.

use lazy_static::lazy_static;
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // ── Counters ─────────────────────────────────────────────────────

    /// Chat commands handled, by command and outcome.
    pub static ref COMMANDS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("respawn_bot_commands_total", "Chat commands handled"),
        &["command", "outcome"],
    )
    .unwrap();

    /// Kill reports written to the ledger.
    pub static ref KILLS_RECORDED_TOTAL: IntCounter = IntCounter::new(
        "respawn_bot_kills_recorded_total",
        "Kill reports written to the ledger",
    )
    .unwrap();

    /// Ledger rows moved forward past elapsed cycles.
    pub static ref RECORDS_ADVANCED_TOTAL: IntCounter = IntCounter::new(
        "respawn_bot_records_advanced_total",
        "Ledger rows advanced past elapsed cycles",
    )
    .unwrap();

    /// Reminder pushes delivered.
    pub static ref REMINDERS_SENT_TOTAL: IntCounter = IntCounter::new(
        "respawn_bot_reminders_sent_total",
        "Reminder pushes delivered",
    )
    .unwrap();

    /// Pushes or replies that the messaging API did not accept.
    pub static ref PUSH_FAILURES_TOTAL: IntCounter = IntCounter::new(
        "respawn_bot_push_failures_total",
        "Outbound messages that failed to deliver",
    )
    .unwrap();

    /// Scanner ticks, by outcome (ok, error).
    pub static ref SCAN_TICKS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("respawn_bot_scan_ticks_total", "Reminder scanner ticks"),
        &["outcome"],
    )
    .unwrap();

    // ── Histograms ───────────────────────────────────────────────────

    /// Wall time of one scanner tick in seconds.
    pub static ref SCAN_DURATION_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new("respawn_bot_scan_duration_seconds", "Reminder scan duration in seconds")
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
    )
    .unwrap();
}

/// Register all metrics with the custom registry. Call once at startup.
pub fn register_metrics() {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(COMMANDS_TOTAL.clone()),
        Box::new(KILLS_RECORDED_TOTAL.clone()),
        Box::new(RECORDS_ADVANCED_TOTAL.clone()),
        Box::new(REMINDERS_SENT_TOTAL.clone()),
        Box::new(PUSH_FAILURES_TOTAL.clone()),
        Box::new(SCAN_TICKS_TOTAL.clone()),
        Box::new(SCAN_DURATION_SECONDS.clone()),
    ];

    for c in collectors {
        if let Err(e) = REGISTRY.register(c) {
            tracing::warn!("Metric registration skipped: {e}");
        }
    }
}

/// Serialize all registered metrics to the Prometheus text exposition format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {e}");
    }
    String::from_utf8(buffer).unwrap_or_default()
}
