//! Tracing integration for structured logging and spans.

use crate::element::ElementState;
use tracing::{Level, Span, span};

/// Create a span covering a player's lifetime.
///
/// # Example
///
/// ```rust
/// use mosaic::observability::span_player;
///
/// let span = span_player("mosaic");
/// let _guard = span.enter();
/// ```
#[inline]
pub fn span_player(name: &str) -> Span {
    span!(Level::INFO, "player", name = %name)
}

/// Create a span for one run of the attachment protocol.
#[inline]
pub fn span_attachment(graph: &str, pad: &str, count: u64) -> Span {
    span!(
        Level::DEBUG,
        "attachment",
        graph = %graph,
        pad = %pad,
        count = count
    )
}

/// Log a stream announced by a demuxer.
#[inline]
pub fn trace_stream_discovered(graph: &str, demuxer: &str, pad: &str) {
    tracing::debug!(
        graph = %graph,
        demuxer = %demuxer,
        pad = %pad,
        "stream discovered"
    );
}

/// Log a completed attachment.
#[inline]
pub fn trace_stream_attached(graph: &str, pad: &str, count: u64, linked: bool) {
    tracing::info!(
        graph = %graph,
        pad = %pad,
        count = count,
        linked = linked,
        "stream attached"
    );
}

/// Log a failed attachment step.
#[inline]
pub fn trace_attachment_error(graph: &str, pad: &str, error: &dyn std::error::Error) {
    tracing::warn!(
        graph = %graph,
        pad = %pad,
        error = %error,
        "attachment failed"
    );
}

/// Log a node state change.
#[inline]
pub fn trace_state_change(graph: &str, node: &str, from: ElementState, to: ElementState) {
    tracing::trace!(
        graph = %graph,
        node = %node,
        from = %from,
        to = %to,
        "node state changed"
    );
}
