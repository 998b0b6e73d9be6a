//! Dynamic stream attachment.
//!
//! Every elementary stream a demuxer announces goes through the same
//! protocol, serialized by the graph mutex:
//!
//! ```text
//!   demux:video_N ─► queueNN ─► h264-parserNN ─► h264-decoderNN ─► compositor:sink_M
//!                                                                   (xpos 0,
//!                                                                    ypos N*stride,
//!                                                                    zorder N)
//! ```
//!
//! 1. construct the decode chain (names derived from the attachment count)
//! 2. allocate a compositor slot
//! 3. insert the chain
//! 4. bring each node to the graph's state
//! 5. link the demuxer pad through the chain
//! 6. link the chain tail to the slot, constrained to the stream geometry
//! 7. advance the attachment count
//!
//! A failure in steps 1 or 2 leaves the graph and the count untouched. A
//! failure in steps 4 to 6 still advances the count; the chain is then
//! handled according to the configured [`NegotiationFailurePolicy`].

use crate::element::{Element, Pad, SlotPlacement};
use crate::error::{Error, Result};
use crate::format::Caps;
use crate::negotiation;
use crate::observability::{self, AttachmentMetrics};
use crate::pipeline::{
    AttachMode, Discovery, ElementFactory, Graph, NegotiationFailurePolicy, NodeId, PadRef,
    PlayerConfig,
};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;

/// A compositor input allocated for one stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSlot {
    /// Request pad on the compositor.
    pub pad: String,
    /// Layout of the input.
    pub placement: SlotPlacement,
}

/// Request a compositor input for the stream with index `count`.
///
/// The input is placed at `xpos = 0`, `ypos = count * stride`,
/// `zorder = count`. Fails with [`Error::SlotExhausted`] when the compositor
/// has no input left, or with [`Error::Config`] when the position does not
/// fit the output frame coordinates.
pub fn allocate_slot(
    graph: &mut Graph,
    compositor: NodeId,
    count: u64,
    stride: u32,
) -> Result<StreamSlot> {
    let ypos = count
        .checked_mul(u64::from(stride))
        .and_then(|y| i32::try_from(y).ok())
        .ok_or_else(|| Error::Config(format!("slot {count} lies outside the output frame")))?;
    let zorder = u32::try_from(count)
        .map_err(|_| Error::Config(format!("slot {count} exceeds the z-order range")))?;
    let placement = SlotPlacement {
        xpos: 0,
        ypos,
        zorder,
    };

    let pad = graph.request_pad(compositor)?;
    if let Err(err) = graph.set_placement(compositor, pad.name(), placement) {
        if let Err(release) = graph.release_pad(compositor, pad.name()) {
            tracing::warn!(pad = %pad, error = %release, "failed to release slot");
        }
        return Err(err);
    }

    tracing::debug!(pad = %pad, xpos = 0, ypos, zorder, "slot allocated");
    Ok(StreamSlot {
        pad: pad.name().to_string(),
        placement,
    })
}

/// How an attachment that reached the linking phase ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachOutcome {
    /// The chain is linked end to end.
    Linked,
    /// Linking failed and the chain was removed again.
    RolledBack {
        /// Why linking failed.
        reason: String,
    },
    /// Linking failed and the chain was left in the graph, unlinked.
    Orphaned {
        /// Why linking failed.
        reason: String,
    },
}

impl AttachOutcome {
    /// Whether the stream is linked end to end.
    pub fn is_linked(&self) -> bool {
        matches!(self, Self::Linked)
    }
}

/// Record of one stream that went through the linking phase.
#[derive(Debug, Clone, PartialEq)]
pub struct AttachedStream {
    /// Attachment count before this stream.
    pub index: u64,
    /// The demuxer pad carrying the stream.
    pub demux_pad: PadRef,
    /// Caps announced for the stream.
    pub caps: Caps,
    /// Chain nodes, upstream first. Stale after a rollback.
    pub nodes: Vec<NodeId>,
    /// Compositor input, in compositor mode.
    pub slot: Option<StreamSlot>,
    /// How linking ended.
    pub outcome: AttachOutcome,
}

/// Lock the graph, recovering from a poisoned mutex.
pub(crate) fn lock_graph(graph: &Mutex<Graph>) -> MutexGuard<'_, Graph> {
    graph.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Write a DOT snapshot of `graph` to `dir/<graph name><suffix>.dot`.
///
/// Failures are logged.
pub(crate) fn dump_dot(graph: &Graph, dir: &Path, suffix: &str) {
    let path = dir.join(format!("{}{}.dot", graph.name(), suffix));
    match std::fs::write(&path, graph.to_dot()) {
        Ok(()) => tracing::debug!(path = %path.display(), "graph snapshot written"),
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "failed to write graph snapshot")
        }
    }
}

/// Runs the attachment protocol for discovered streams.
#[derive(Debug)]
pub struct AttachmentHandler {
    graph: Arc<Mutex<Graph>>,
    factory: ElementFactory,
    config: PlayerConfig,
    compositor: Option<NodeId>,
    streams: Arc<Mutex<Vec<AttachedStream>>>,
    attached: watch::Sender<u64>,
    metrics: AttachmentMetrics,
}

impl AttachmentHandler {
    /// Create a handler attaching streams into `graph`.
    ///
    /// `compositor` must be set in [`AttachMode::Compositor`].
    pub fn new(
        graph: Arc<Mutex<Graph>>,
        factory: ElementFactory,
        config: PlayerConfig,
        compositor: Option<NodeId>,
    ) -> Self {
        let metrics = AttachmentMetrics::new(&config.name);
        let (attached, _) = watch::channel(0);
        Self {
            graph,
            factory,
            config,
            compositor,
            streams: Arc::new(Mutex::new(vec![])),
            attached,
            metrics,
        }
    }

    /// Use shared storage for records and the attachment count.
    pub(crate) fn share_with(
        mut self,
        streams: Arc<Mutex<Vec<AttachedStream>>>,
        attached: watch::Sender<u64>,
    ) -> Self {
        self.streams = streams;
        self.attached = attached;
        self
    }

    /// Records of every stream that reached the linking phase.
    pub fn streams(&self) -> Arc<Mutex<Vec<AttachedStream>>> {
        self.streams.clone()
    }

    /// Subscribe to the attachment count.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.attached.subscribe()
    }

    /// Handle one discovery notification.
    ///
    /// Attachment failures are logged and counted, never propagated.
    pub fn handle(&self, discovery: Discovery) {
        match discovery {
            Discovery::PadAdded { node, pad, caps } => {
                if let Err(err) = self.attach(node, pad, caps) {
                    tracing::warn!(graph = %self.config.name, error = %err, "stream not attached");
                }
            }
            Discovery::NoMorePads { node } => {
                tracing::info!(graph = %self.config.name, node = %node, "demuxer exposed all streams");
            }
        }
    }

    /// Attach the stream announced on `pad` of `demuxer`.
    ///
    /// Returns `Ok(None)` when the stream was dropped by the stream limit,
    /// and the stream's record once it went through the linking phase.
    pub fn attach(&self, demuxer: NodeId, pad: Pad, caps: Caps) -> Result<Option<AttachedStream>> {
        let mut graph = lock_graph(&self.graph);
        let graph_name = graph.name().to_string();
        let demuxer_name = graph.node_name(demuxer).unwrap_or_default();

        self.metrics.discovered();
        observability::trace_stream_discovered(&graph_name, &demuxer_name, pad.name());
        if let Err(err) = graph.add_pad(demuxer, pad.clone()) {
            return Err(self.report_failure(&graph_name, &pad, err));
        }

        let count = graph.attachment_count();
        if let Some(max) = self.config.max_streams {
            if count >= max as u64 {
                self.metrics.dropped();
                tracing::info!(
                    graph = %graph_name,
                    pad = %pad,
                    max_streams = max,
                    "stream limit reached, dropping stream"
                );
                return Ok(None);
            }
        }

        let _span = observability::span_attachment(&graph_name, pad.name(), count).entered();

        let elements = match self.construct_chain(count) {
            Ok(elements) => elements,
            Err(err) => return Err(self.report_failure(&graph_name, &pad, err)),
        };

        let slot = match (self.config.mode, self.compositor) {
            (AttachMode::Compositor, Some(compositor)) => {
                match allocate_slot(&mut graph, compositor, count, self.config.geometry.stride()) {
                    Ok(slot) => Some(slot),
                    Err(err) => return Err(self.report_failure(&graph_name, &pad, err)),
                }
            }
            (AttachMode::Compositor, None) => {
                let err = Error::Config("compositor mode without a compositor".to_string());
                return Err(self.report_failure(&graph_name, &pad, err));
            }
            (AttachMode::SeparateSinks, _) => None,
        };

        let mut nodes = Vec::with_capacity(elements.len());
        for (name, type_name, element) in elements {
            match graph.add(name, type_name, element) {
                Ok(id) => nodes.push(id),
                Err(err) => {
                    self.remove_chain(&mut graph, &nodes, slot.as_ref());
                    return Err(self.report_failure(&graph_name, &pad, err));
                }
            }
        }

        let demux_pad = PadRef::new(demuxer, pad.name());
        let outcome = match self.link_chain(&mut graph, &demux_pad, &nodes, slot.as_ref()) {
            Ok(()) => AttachOutcome::Linked,
            Err(err) => {
                self.metrics.failed(err.kind());
                observability::trace_attachment_error(&graph_name, pad.name(), &err);
                match self.config.on_negotiation_failure {
                    NegotiationFailurePolicy::RollBack => {
                        self.remove_chain(&mut graph, &nodes, slot.as_ref());
                        AttachOutcome::RolledBack {
                            reason: err.to_string(),
                        }
                    }
                    NegotiationFailurePolicy::KeepOrphans => AttachOutcome::Orphaned {
                        reason: err.to_string(),
                    },
                }
            }
        };

        if let Some(dir) = &self.config.dot_dir {
            dump_dot(&graph, dir, &count.to_string());
        }

        let total = graph.bump_attachment_count();
        if outcome.is_linked() {
            self.metrics.attached();
        }
        self.attached.send_replace(total);
        observability::trace_stream_attached(&graph_name, pad.name(), total, outcome.is_linked());

        let record = AttachedStream {
            index: count,
            demux_pad,
            caps,
            nodes,
            slot,
            outcome,
        };
        self.streams
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(record.clone());
        Ok(Some(record))
    }

    /// Count and log a failed attachment step, handing the error back.
    fn report_failure(&self, graph_name: &str, pad: &Pad, err: Error) -> Error {
        self.metrics.failed(err.kind());
        observability::trace_attachment_error(graph_name, pad.name(), &err);
        err
    }

    /// Create the chain's elements, upstream first.
    fn construct_chain(
        &self,
        count: u64,
    ) -> Result<Vec<(String, String, Box<dyn Element>)>> {
        let chain = &self.config.chain;
        let mut plan = vec![
            (format!("queue{count:02}"), chain.queue.clone()),
            (format!("h264-parser{count:02}"), chain.parser.clone()),
            (format!("h264-decoder{count:02}"), chain.decoder.clone()),
        ];
        if let Some(queue) = &chain.output_queue {
            plan.push((format!("queue-out{count:02}"), queue.clone()));
        }
        if self.config.mode == AttachMode::SeparateSinks {
            plan.push((format!("video-sink{count:02}"), chain.sink.clone()));
        }

        plan.into_iter()
            .map(|(name, type_name)| {
                let element = self.factory.create(&type_name, &name)?;
                Ok((name, type_name, element))
            })
            .collect()
    }

    /// Bring the chain up and link it from the demuxer pad to its slot.
    fn link_chain(
        &self,
        graph: &mut Graph,
        demux_pad: &PadRef,
        nodes: &[NodeId],
        slot: Option<&StreamSlot>,
    ) -> Result<()> {
        for &id in nodes {
            graph.sync_state_with_parent(id)?;
        }

        let (&head, &tail) = match (nodes.first(), nodes.last()) {
            (Some(head), Some(tail)) => (head, tail),
            _ => return Err(Error::Link("empty decode chain".to_string())),
        };
        graph.link_pads(demux_pad.node, &demux_pad.pad, head, "sink", None)?;
        graph.link_many(nodes)?;

        if let (Some(slot), Some(compositor)) = (slot, self.compositor) {
            negotiation::link_filtered(
                graph,
                &PadRef::new(tail, "src"),
                &PadRef::new(compositor, slot.pad.clone()),
                &self.config.geometry.descriptor(),
            )?;
        }
        Ok(())
    }

    /// Remove chain nodes and release their slot.
    fn remove_chain(&self, graph: &mut Graph, nodes: &[NodeId], slot: Option<&StreamSlot>) {
        for &id in nodes.iter().rev() {
            if let Err(err) = graph.remove(id) {
                tracing::warn!(id = %id, error = %err, "failed to remove chain node");
            }
        }
        if let (Some(slot), Some(compositor)) = (slot, self.compositor) {
            if let Err(err) = graph.release_pad(compositor, &slot.pad) {
                tracing::warn!(pad = %slot.pad, error = %err, "failed to release slot");
            }
        }
    }
}
