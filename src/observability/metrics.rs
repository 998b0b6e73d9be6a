//! Metrics collection using metrics-rs.

use metrics::{Counter, Unit, counter, gauge};
use std::sync::atomic::{AtomicBool, Ordering};

/// Whether metrics have been initialized.
static METRICS_INITIALIZED: AtomicBool = AtomicBool::new(false);

// Metric names as constants for consistency
const STREAMS_DISCOVERED: &str = "mosaic_streams_discovered";
const STREAMS_ATTACHED: &str = "mosaic_streams_attached";
const STREAMS_DROPPED: &str = "mosaic_streams_dropped";
const ATTACHMENT_FAILURES: &str = "mosaic_attachment_failures";
const GRAPH_NODES: &str = "mosaic_graph_nodes";

/// Initialize metrics descriptions.
///
/// Call this once at application startup before using any metrics.
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init_metrics() {
    if METRICS_INITIALIZED.swap(true, Ordering::SeqCst) {
        return;
    }

    metrics::describe_counter!(
        STREAMS_DISCOVERED,
        Unit::Count,
        "Elementary streams announced by demuxers"
    );
    metrics::describe_counter!(
        STREAMS_ATTACHED,
        Unit::Count,
        "Streams whose chain was fully linked"
    );
    metrics::describe_counter!(
        STREAMS_DROPPED,
        Unit::Count,
        "Streams dropped because the stream limit was reached"
    );
    metrics::describe_counter!(
        ATTACHMENT_FAILURES,
        Unit::Count,
        "Attachment attempts that failed, by error kind"
    );
    metrics::describe_gauge!(GRAPH_NODES, Unit::Count, "Nodes currently owned by a graph");
}

/// Record a failed attachment.
#[inline]
pub fn record_attachment_failure(graph: &str, kind: &'static str) {
    counter!(ATTACHMENT_FAILURES, "graph" => graph.to_string(), "kind" => kind).increment(1);
}

/// Record the number of nodes owned by a graph.
#[inline]
pub fn record_graph_nodes(graph: &str, nodes: usize) {
    gauge!(GRAPH_NODES, "graph" => graph.to_string()).set(nodes as f64);
}

/// Metrics handles for one attachment handler.
///
/// Keeps pre-labelled counters so the hot path does not rebuild label sets.
#[derive(Clone)]
pub struct AttachmentMetrics {
    graph: String,
    discovered: Counter,
    attached: Counter,
    dropped: Counter,
}

impl AttachmentMetrics {
    /// Create the handles for `graph`.
    pub fn new(graph: &str) -> Self {
        Self {
            graph: graph.to_string(),
            discovered: counter!(STREAMS_DISCOVERED, "graph" => graph.to_string()),
            attached: counter!(STREAMS_ATTACHED, "graph" => graph.to_string()),
            dropped: counter!(STREAMS_DROPPED, "graph" => graph.to_string()),
        }
    }

    /// A stream was announced.
    #[inline]
    pub fn discovered(&self) {
        self.discovered.increment(1);
    }

    /// A stream's chain was fully linked.
    #[inline]
    pub fn attached(&self) {
        self.attached.increment(1);
    }

    /// A stream was dropped by the stream limit.
    #[inline]
    pub fn dropped(&self) {
        self.dropped.increment(1);
    }

    /// An attachment failed with an error of `kind`.
    #[inline]
    pub fn failed(&self, kind: &'static str) {
        record_attachment_failure(&self.graph, kind);
    }

    /// Get the graph name.
    pub fn graph(&self) -> &str {
        &self.graph
    }
}

impl std::fmt::Debug for AttachmentMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttachmentMetrics")
            .field("graph", &self.graph)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_metrics() {
        init_metrics();
        init_metrics();
    }

    #[test]
    fn test_attachment_metrics() {
        let metrics = AttachmentMetrics::new("test-graph");
        metrics.discovered();
        metrics.attached();
        metrics.dropped();
        metrics.failed("construction");
        assert_eq!(metrics.graph(), "test-graph");
    }

    #[test]
    fn test_global_recording_functions() {
        // No recorder installed: all of these are no-ops.
        record_attachment_failure("test", "negotiation");
        record_graph_nodes("test", 4);
    }
}
