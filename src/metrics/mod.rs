//! Metrics collection for observability

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec_with_registry, register_counter_with_registry,
    register_histogram_vec_with_registry, register_histogram_with_registry, Counter, CounterVec,
    Histogram, HistogramVec, Opts, Registry,
};
use std::sync::Arc;

/// Global metrics registry
pub static METRICS: Lazy<Arc<Metrics>> =
    Lazy::new(|| Arc::new(Metrics::new().expect("Failed to initialize metrics")));

/// Metrics collector
pub struct Metrics {
    registry: Registry,

    // Tokenizer metrics
    pub remote_token_counts: CounterVec,

    // Summarization metrics
    pub summarizations: CounterVec,
    pub summarization_rounds: Histogram,
    pub summarized_chunks: Counter,
    pub context_overflows: Counter,

    // History enforcement metrics
    pub history_truncations: Counter,
    pub history_evicted_turns: Counter,

    // Provider metrics
    pub provider_requests: CounterVec,
    pub provider_request_duration: HistogramVec,
    pub context_length_apologies: Counter,

    // Tool metrics
    pub tool_invocations: CounterVec,
    pub transcript_cache_hits: Counter,
    pub transcript_cache_misses: Counter,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let registry = Registry::new();

        let remote_token_counts = register_counter_vec_with_registry!(
            Opts::new("remote_token_counts_total", "Provider-side token count requests"),
            &["status"],
            registry
        )?;

        let summarizations = register_counter_vec_with_registry!(
            Opts::new("summarizations_total", "Summarization passes by mode"),
            &["mode"],
            registry
        )?;

        let summarization_rounds = register_histogram_with_registry!(
            "summarization_rounds",
            "Reduction rounds needed per summarized text",
            vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 8.0],
            registry
        )?;

        let summarized_chunks = register_counter_with_registry!(
            Opts::new("summarized_chunks_total", "Chunks sent for summarization"),
            registry
        )?;

        let context_overflows = register_counter_with_registry!(
            Opts::new("context_overflows_total", "Texts that could not be reduced to fit"),
            registry
        )?;

        let history_truncations = register_counter_with_registry!(
            Opts::new("history_truncations_total", "Requests whose history was truncated"),
            registry
        )?;

        let history_evicted_turns = register_counter_with_registry!(
            Opts::new("history_evicted_turns_total", "Conversation turns evicted"),
            registry
        )?;

        let provider_requests = register_counter_vec_with_registry!(
            Opts::new("provider_requests_total", "Completion requests by status"),
            &["status"],
            registry
        )?;

        let provider_request_duration = register_histogram_vec_with_registry!(
            "provider_request_duration_seconds",
            "Completion request duration in seconds",
            &["model"],
            registry
        )?;

        let context_length_apologies = register_counter_with_registry!(
            Opts::new(
                "context_length_apologies_total",
                "Context-length errors answered with an apology"
            ),
            registry
        )?;

        let tool_invocations = register_counter_vec_with_registry!(
            Opts::new("tool_invocations_total", "Tool invocations by tool and status"),
            &["tool", "status"],
            registry
        )?;

        let transcript_cache_hits = register_counter_with_registry!(
            Opts::new("transcript_cache_hits_total", "Transcript cache hits"),
            registry
        )?;

        let transcript_cache_misses = register_counter_with_registry!(
            Opts::new("transcript_cache_misses_total", "Transcript cache misses"),
            registry
        )?;

        Ok(Self {
            registry,
            remote_token_counts,
            summarizations,
            summarization_rounds,
            summarized_chunks,
            context_overflows,
            history_truncations,
            history_evicted_turns,
            provider_requests,
            provider_request_duration,
            context_length_apologies,
            tool_invocations,
            transcript_cache_hits,
            transcript_cache_misses,
        })
    }

    /// Get the metrics registry for exporting
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_remote_token_count(&self, success: bool) {
        let status = if success { "success" } else { "error" };
        self.remote_token_counts.with_label_values(&[status]).inc();
    }

    /// Record a summarization pass ("single" or "chunked")
    pub fn record_summarization(&self, mode: &str, chunks: usize) {
        self.summarizations.with_label_values(&[mode]).inc();
        self.summarized_chunks.inc_by(chunks as f64);
    }

    pub fn record_summary_rounds(&self, rounds: usize, overflow: bool) {
        self.summarization_rounds.observe(rounds as f64);
        if overflow {
            self.context_overflows.inc();
        }
    }

    pub fn record_history_enforcement(&self, evicted: usize) {
        if evicted > 0 {
            self.history_truncations.inc();
            self.history_evicted_turns.inc_by(evicted as f64);
        }
    }

    pub fn record_provider_request(&self, model: &str, status: &str, seconds: f64) {
        self.provider_requests.with_label_values(&[status]).inc();
        self.provider_request_duration
            .with_label_values(&[model])
            .observe(seconds);
    }

    pub fn record_tool_invocation(&self, tool: &str, success: bool) {
        let status = if success { "success" } else { "error" };
        self.tool_invocations.with_label_values(&[tool, status]).inc();
    }

    pub fn record_transcript_cache(&self, hit: bool) {
        if hit {
            self.transcript_cache_hits.inc();
        } else {
            self.transcript_cache_misses.inc();
        }
    }

    /// Export metrics in Prometheus text format
    pub fn export_prometheus(&self) -> String {
        use prometheus::Encoder;

        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();

        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer).unwrap_or_default();

        String::from_utf8(buffer).unwrap_or_default()
    }
}
