//! Observability features: metrics and tracing.
//!
//! ## Metrics
//!
//! Mosaic exposes the following metrics:
//!
//! | Metric | Type | Description |
//! |--------|------|-------------|
//! | `mosaic_streams_discovered` | Counter | Streams announced by demuxers |
//! | `mosaic_streams_attached` | Counter | Streams whose chain was fully linked |
//! | `mosaic_streams_dropped` | Counter | Streams dropped by the stream limit |
//! | `mosaic_attachment_failures` | Counter | Failed attachments, labelled by `kind` |
//! | `mosaic_graph_nodes` | Gauge | Nodes owned by a graph |
//!
//! Nothing is exported by default; install a `metrics` recorder
//! (prometheus, statsd, ...) to collect them.
//!
//! ## Tracing
//!
//! Mosaic emits a `player` span around a player's lifetime and an
//! `attachment` span around each run of the attachment protocol.

mod metrics;
mod tracing_support;

pub use metrics::{AttachmentMetrics, init_metrics, record_attachment_failure, record_graph_nodes};
pub use tracing_support::{
    span_attachment, span_player, trace_attachment_error, trace_state_change,
    trace_stream_attached, trace_stream_discovered,
};
