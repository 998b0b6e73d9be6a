//! Graph of processing nodes, backed by a stable daggy DAG.
//!
//! Node indices stay valid when other nodes are removed, and every
//! [`NodeId`] carries a generation so an id held past its node's removal
//! never resolves to a node inserted later in the same slot.

use crate::element::{
    Element, ElementContext, ElementKind, ElementState, Pad, PadDirection, SlotPlacement,
    StateChange,
};
use crate::error::{Error, Result};
use crate::format::Caps;
use crate::negotiation::{self, NegotiationError};
use crate::observability;
use crate::pipeline::{BusMessage, BusSender, DiscoverySender};
use daggy::NodeIndex;
use daggy::petgraph::Direction;
use daggy::petgraph::visit::{EdgeRef, IntoEdgeReferences};
use daggy::stable_dag::StableDag;
use std::collections::HashMap;
use std::fmt;

/// Typed identity of a node: arena index plus generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    index: NodeIndex,
    generation: u32,
}

impl NodeId {
    /// Get the underlying index.
    pub fn index(&self) -> usize {
        self.index.index()
    }

    /// Get the generation the node was inserted with.
    pub fn generation(&self) -> u32 {
        self.generation
    }

    #[cfg(test)]
    pub(crate) fn from_raw(index: usize, generation: u32) -> Self {
        Self {
            index: NodeIndex::new(index),
            generation,
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}.{}", self.index.index(), self.generation)
    }
}

/// A pad on a specific node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PadRef {
    /// The node owning the pad.
    pub node: NodeId,
    /// Pad name.
    pub pad: String,
}

impl PadRef {
    /// Create a new pad reference.
    pub fn new(node: NodeId, pad: impl Into<String>) -> Self {
        Self {
            node,
            pad: pad.into(),
        }
    }
}

impl fmt::Display for PadRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.node, self.pad)
    }
}

/// A node in the graph.
pub struct Node {
    name: String,
    type_name: String,
    kind: ElementKind,
    element: Box<dyn Element>,
    state: ElementState,
    pads: Vec<Pad>,
    generation: u32,
}

impl Node {
    /// Get the node's unique name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the factory type the element was created from.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Get the element kind.
    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    /// Get the node's current run-state.
    pub fn state(&self) -> ElementState {
        self.state
    }

    /// Get all pads of this node.
    pub fn pads(&self) -> &[Pad] {
        &self.pads
    }

    /// Find a pad by name.
    pub fn pad(&self, name: &str) -> Option<&Pad> {
        self.pads.iter().find(|p| p.name() == name)
    }

    /// Get a reference to the element.
    pub fn element(&self) -> &dyn Element {
        self.element.as_ref()
    }

    /// Get a mutable reference to the element.
    pub fn element_mut(&mut self) -> &mut dyn Element {
        self.element.as_mut()
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("name", &self.name)
            .field("type_name", &self.type_name)
            .field("kind", &self.kind)
            .field("state", &self.state)
            .field("pads", &self.pads.len())
            .finish()
    }
}

/// Edge weight: an established connection between two pads.
#[derive(Debug, Clone)]
pub struct Link {
    /// Name of the output pad on the upstream node.
    pub src_pad: String,
    /// Name of the input pad on the downstream node.
    pub sink_pad: String,
    /// Descriptor the link was constrained to, if any.
    pub filter: Option<Caps>,
    /// Negotiated caps.
    pub caps: Caps,
}

/// Read-only view of a link.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkInfo {
    /// Upstream pad.
    pub src: PadRef,
    /// Downstream pad.
    pub sink: PadRef,
    /// Negotiated caps.
    pub caps: Caps,
    /// Whether the link was constrained by a descriptor.
    pub filtered: bool,
}

/// A dynamically growing graph of processing nodes.
///
/// The graph owns every inserted node, the posting side of the event bus,
/// the posting side of the discovery queue, and the attachment counter.
pub struct Graph {
    name: String,
    dag: StableDag<Node, Link>,
    nodes_by_name: HashMap<String, NodeId>,
    target: ElementState,
    next_generation: u32,
    attachment_count: u64,
    bus: BusSender,
    discovery: DiscoverySender,
}

impl Graph {
    /// Create an empty graph in the `Null` state.
    pub fn new(name: impl Into<String>, bus: BusSender, discovery: DiscoverySender) -> Self {
        Self {
            name: name.into(),
            dag: StableDag::new(),
            nodes_by_name: HashMap::new(),
            target: ElementState::Null,
            next_generation: 0,
            attachment_count: 0,
            bus,
            discovery,
        }
    }

    /// Get the graph's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the state the graph was last asked to reach.
    pub fn target_state(&self) -> ElementState {
        self.target
    }

    /// Get the bus sender.
    pub fn bus(&self) -> &BusSender {
        &self.bus
    }

    /// Get the discovery sender.
    pub fn discovery(&self) -> &DiscoverySender {
        &self.discovery
    }

    /// Number of streams that went through the attachment protocol.
    pub fn attachment_count(&self) -> u64 {
        self.attachment_count
    }

    /// Advance the attachment counter by one and return the new value.
    pub(crate) fn bump_attachment_count(&mut self) -> u64 {
        self.attachment_count += 1;
        self.attachment_count
    }

    // ========================================================================
    // Nodes
    // ========================================================================

    /// Insert a node.
    ///
    /// The node starts in `Null`; use [`sync_state_with_parent`] to bring it
    /// to the graph's target state.
    ///
    /// [`sync_state_with_parent`]: Self::sync_state_with_parent
    pub fn add(
        &mut self,
        name: impl Into<String>,
        type_name: impl Into<String>,
        element: Box<dyn Element>,
    ) -> Result<NodeId> {
        let name = name.into();
        if self.nodes_by_name.contains_key(&name) {
            return Err(Error::DuplicateName(name));
        }

        let generation = self.next_generation;
        self.next_generation = self.next_generation.wrapping_add(1);

        let node = Node {
            name: name.clone(),
            type_name: type_name.into(),
            kind: element.kind(),
            pads: element.pads(),
            element,
            state: ElementState::Null,
            generation,
        };
        let index = self.dag.add_node(node);
        let id = NodeId { index, generation };
        self.nodes_by_name.insert(name.clone(), id);

        tracing::debug!(graph = %self.name, node = %name, id = %id, "node added");
        observability::record_graph_nodes(&self.name, self.dag.node_count());
        Ok(id)
    }

    fn resolve(&self, id: NodeId) -> Result<NodeIndex> {
        match self.dag.graph().node_weight(id.index) {
            Some(node) if node.generation == id.generation => Ok(id.index),
            _ => Err(Error::NodeNotFound(id.to_string())),
        }
    }

    fn id_at(&self, index: NodeIndex) -> Option<NodeId> {
        self.dag.graph().node_weight(index).map(|node| NodeId {
            index,
            generation: node.generation,
        })
    }

    /// Get a node by id.
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.dag
            .graph()
            .node_weight(id.index)
            .filter(|node| node.generation == id.generation)
    }

    /// Get a mutable reference to a node by id.
    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.dag
            .node_weight_mut(id.index)
            .filter(|node| node.generation == id.generation)
    }

    /// Get a node's name by id.
    pub fn node_name(&self, id: NodeId) -> Option<String> {
        self.node(id).map(|node| node.name.clone())
    }

    /// Look up a node id by name.
    pub fn node_id(&self, name: &str) -> Option<NodeId> {
        self.nodes_by_name.get(name).copied()
    }

    /// Whether `id` refers to a live node.
    pub fn contains(&self, id: NodeId) -> bool {
        self.node(id).is_some()
    }

    /// Ids of all live nodes, in index order.
    pub fn node_ids(&self) -> Vec<NodeId> {
        self.dag
            .graph()
            .node_indices()
            .filter_map(|index| self.id_at(index))
            .collect()
    }

    /// Get the number of nodes.
    pub fn node_count(&self) -> usize {
        self.dag.node_count()
    }

    /// Get the number of links.
    pub fn link_count(&self) -> usize {
        self.dag.edge_count()
    }

    /// Check if the graph is empty.
    pub fn is_empty(&self) -> bool {
        self.dag.node_count() == 0
    }

    /// Remove a node, bringing it down to `Null` first.
    ///
    /// All links touching the node are removed with it.
    pub fn remove(&mut self, id: NodeId) -> Result<Node> {
        let index = self.resolve(id)?;
        self.drive_node(index, ElementState::Null, false)?;
        let node = self
            .dag
            .remove_node(index)
            .ok_or_else(|| Error::NodeNotFound(id.to_string()))?;
        self.nodes_by_name.remove(&node.name);

        tracing::debug!(graph = %self.name, node = %node.name, id = %id, "node removed");
        observability::record_graph_nodes(&self.name, self.dag.node_count());
        Ok(node)
    }

    // ========================================================================
    // Pads
    // ========================================================================

    /// Add a pad to a node (used for pads a demuxer exposes at runtime).
    pub fn add_pad(&mut self, id: NodeId, pad: Pad) -> Result<()> {
        let node = self
            .node_mut(id)
            .ok_or_else(|| Error::NodeNotFound(id.to_string()))?;
        if node.pad(pad.name()).is_some() {
            return Err(Error::DuplicateName(format!("{}:{}", node.name, pad.name())));
        }
        node.pads.push(pad);
        Ok(())
    }

    /// Ask a fan-in node for a new input pad.
    pub fn request_pad(&mut self, id: NodeId) -> Result<Pad> {
        let node = self
            .node_mut(id)
            .ok_or_else(|| Error::NodeNotFound(id.to_string()))?;
        let pad = node.element.request_pad()?;
        node.pads.push(pad.clone());
        tracing::debug!(node = %node.name, pad = %pad, "request pad created");
        Ok(pad)
    }

    /// Release a request pad, dropping any link attached to it.
    pub fn release_pad(&mut self, id: NodeId, pad: &str) -> Result<()> {
        let index = self.resolve(id)?;
        let edges: Vec<_> = self
            .dag
            .graph()
            .edges_directed(index, Direction::Incoming)
            .filter(|edge| edge.weight().sink_pad == pad)
            .chain(
                self.dag
                    .graph()
                    .edges_directed(index, Direction::Outgoing)
                    .filter(|edge| edge.weight().src_pad == pad),
            )
            .map(|edge| edge.id())
            .collect();
        for edge in edges {
            self.dag.remove_edge(edge);
        }

        let node = self
            .node_mut(id)
            .ok_or_else(|| Error::NodeNotFound(id.to_string()))?;
        node.element.release_pad(pad);
        node.pads.retain(|p| p.name() != pad);
        Ok(())
    }

    /// Set layout metadata on an input pad of a fan-in node.
    pub fn set_placement(&mut self, id: NodeId, pad: &str, placement: SlotPlacement) -> Result<()> {
        let node = self
            .node_mut(id)
            .ok_or_else(|| Error::NodeNotFound(id.to_string()))?;
        if node.pad(pad).is_none() {
            return Err(NegotiationError::NoSuchPad {
                node: node.name.clone(),
                pad: pad.to_string(),
            }
            .into());
        }
        node.element.set_placement(pad, placement)
    }

    /// Layout metadata of an input pad, if set.
    pub fn placement(&self, id: NodeId, pad: &str) -> Option<SlotPlacement> {
        self.node(id)?.element.placement(pad)
    }

    fn pad_is_linked(&self, index: NodeIndex, pad: &str, direction: Direction) -> bool {
        self.dag
            .graph()
            .edges_directed(index, direction)
            .any(|edge| match direction {
                Direction::Outgoing => edge.weight().src_pad == pad,
                Direction::Incoming => edge.weight().sink_pad == pad,
            })
    }

    /// Whether a pad carries a link.
    pub fn is_linked(&self, pad: &PadRef) -> bool {
        let Ok(index) = self.resolve(pad.node) else {
            return false;
        };
        self.pad_is_linked(index, &pad.pad, Direction::Outgoing)
            || self.pad_is_linked(index, &pad.pad, Direction::Incoming)
    }

    fn free_pad(&self, id: NodeId, direction: PadDirection) -> Result<String> {
        let index = self.resolve(id)?;
        let node = &self.dag.graph()[index];
        let link_direction = match direction {
            PadDirection::Output => Direction::Outgoing,
            PadDirection::Input => Direction::Incoming,
        };
        node.pads
            .iter()
            .filter(|pad| pad.direction() == direction)
            .find(|pad| !self.pad_is_linked(index, pad.name(), link_direction))
            .map(|pad| pad.name().to_string())
            .ok_or_else(|| {
                Error::Link(format!(
                    "'{}' has no free {:?} pad",
                    node.name, direction
                ))
            })
    }

    // ========================================================================
    // Links
    // ========================================================================

    /// Link the first free output pad of `src` to the first free input pad
    /// of `sink`, without a descriptor.
    pub fn link(&mut self, src: NodeId, sink: NodeId) -> Result<Caps> {
        let src_pad = self.free_pad(src, PadDirection::Output)?;
        let sink_pad = self.free_pad(sink, PadDirection::Input)?;
        self.link_pads(src, &src_pad, sink, &sink_pad, None)
    }

    /// Link a chain of nodes in order.
    pub fn link_many(&mut self, nodes: &[NodeId]) -> Result<()> {
        for pair in nodes.windows(2) {
            self.link(pair[0], pair[1])?;
        }
        Ok(())
    }

    /// Link two specific pads, optionally constrained by `filter`.
    ///
    /// Both pads must exist and be unlinked. The negotiated caps are stored
    /// on the link and handed to the downstream element.
    pub fn link_pads(
        &mut self,
        src: NodeId,
        src_pad: &str,
        sink: NodeId,
        sink_pad: &str,
        filter: Option<&Caps>,
    ) -> Result<Caps> {
        let src_index = self.resolve(src)?;
        let sink_index = self.resolve(sink)?;

        let (src_name, produced) = {
            let node = &self.dag.graph()[src_index];
            check_pad(node, src_pad, PadDirection::Output)?;
            (node.name.clone(), node.element.output_caps(src_pad))
        };
        let (sink_name, accepted) = {
            let node = &self.dag.graph()[sink_index];
            check_pad(node, sink_pad, PadDirection::Input)?;
            (node.name.clone(), node.element.input_caps(sink_pad))
        };

        if self.pad_is_linked(src_index, src_pad, Direction::Outgoing) {
            return Err(NegotiationError::AlreadyLinked {
                node: src_name,
                pad: src_pad.to_string(),
            }
            .into());
        }
        if self.pad_is_linked(sink_index, sink_pad, Direction::Incoming) {
            return Err(NegotiationError::AlreadyLinked {
                node: sink_name,
                pad: sink_pad.to_string(),
            }
            .into());
        }

        let caps = negotiation::negotiate(&src_name, &produced, &sink_name, &accepted, filter)?;

        let link = Link {
            src_pad: src_pad.to_string(),
            sink_pad: sink_pad.to_string(),
            filter: filter.cloned(),
            caps: caps.clone(),
        };
        let edge = self
            .dag
            .add_edge(src_index, sink_index, link)
            .map_err(|_| NegotiationError::CycleDetected {
                upstream: src_name.clone(),
                downstream: sink_name.clone(),
            })?;

        let accepted = match self.dag.node_weight_mut(sink_index) {
            Some(node) => node.element.set_input_caps(sink_pad, &caps),
            None => Err(Error::NodeNotFound(sink.to_string())),
        };
        if let Err(err) = accepted {
            self.dag.remove_edge(edge);
            return Err(err);
        }

        tracing::debug!(
            "linked {}:{} -> {}:{} ({})",
            src_name,
            src_pad,
            sink_name,
            sink_pad,
            caps
        );
        Ok(caps)
    }

    /// All links in the graph.
    pub fn links(&self) -> Vec<LinkInfo> {
        self.dag
            .graph()
            .edge_references()
            .filter_map(|edge| {
                let src = self.id_at(edge.source())?;
                let sink = self.id_at(edge.target())?;
                let link = edge.weight();
                Some(LinkInfo {
                    src: PadRef::new(src, link.src_pad.clone()),
                    sink: PadRef::new(sink, link.sink_pad.clone()),
                    caps: link.caps.clone(),
                    filtered: link.filter.is_some(),
                })
            })
            .collect()
    }

    /// The link leaving `pad`, if any.
    pub fn link_from(&self, pad: &PadRef) -> Option<LinkInfo> {
        self.links().into_iter().find(|link| &link.src == pad)
    }

    /// The link entering `pad`, if any.
    pub fn link_into(&self, pad: &PadRef) -> Option<LinkInfo> {
        self.links().into_iter().find(|link| &link.sink == pad)
    }

    // ========================================================================
    // State
    // ========================================================================

    fn topological_order(&self) -> Result<Vec<NodeIndex>> {
        daggy::petgraph::algo::toposort(self.dag.graph(), None)
            .map_err(|_| Error::lifecycle(&self.name, "graph contains a cycle"))
    }

    /// Move the whole graph to `target`.
    ///
    /// Nodes move one state at a time. Going up, downstream nodes step
    /// before upstream ones so consumers are ready before producers start;
    /// going down, producers stop first. An upward step that fails aborts
    /// the transition with [`Error::Lifecycle`]. Downward steps always
    /// complete.
    pub fn set_state(&mut self, target: ElementState) -> Result<()> {
        let from = self.target;
        self.target = target;
        let upward = target > from;

        let mut order = self.topological_order()?;
        if upward {
            order.reverse();
        }

        let mut level = from;
        while let Some(next) = level.step_toward(target) {
            for &index in &order {
                self.drive_node(index, next, upward)?;
            }
            level = next;
        }

        tracing::info!(graph = %self.name, from = %from, to = %target, "graph state changed");
        self.bus.post(BusMessage::StateChanged {
            element: self.name.clone(),
            old: from,
            new: target,
            pending: target,
        });
        Ok(())
    }

    /// Bring a node to the graph's current target state.
    pub fn sync_state_with_parent(&mut self, id: NodeId) -> Result<()> {
        let index = self.resolve(id)?;
        let target = self.target;
        let upward = self.dag.graph()[index].state < target;
        self.drive_node(index, target, upward)
    }

    /// Step the node at `index` towards `goal`, in one direction only.
    fn drive_node(&mut self, index: NodeIndex, goal: ElementState, upward: bool) -> Result<()> {
        let Some(id) = self.id_at(index) else {
            return Ok(());
        };
        let graph_name = self.name.clone();
        let pending = self.target;
        let bus = self.bus.clone();
        let discovery = self.discovery.clone();

        let Some(node) = self.dag.node_weight_mut(index) else {
            return Ok(());
        };

        loop {
            let state = node.state;
            let moves = if upward { state < goal } else { state > goal };
            if !moves {
                return Ok(());
            }
            let Some(step) = state.step_toward(goal) else {
                return Ok(());
            };

            let change = StateChange {
                from: state,
                to: step,
            };
            let ctx = ElementContext::new(node.name.clone(), id, bus.clone(), discovery.clone());
            if let Err(err) = node.element.change_state(change, &ctx) {
                if change.is_upward() {
                    tracing::error!(node = %node.name, from = %state, to = %step, error = %err, "state change failed");
                    return Err(Error::lifecycle(&node.name, err.to_string()));
                }
                tracing::warn!(node = %node.name, from = %state, to = %step, error = %err, "ignoring failure while shutting down");
            }

            node.state = step;
            observability::trace_state_change(&graph_name, &node.name, state, step);
            bus.post(BusMessage::StateChanged {
                element: node.name.clone(),
                old: state,
                new: step,
                pending,
            });
        }
    }

    /// Bring every node down to `Null`, then release all of them.
    ///
    /// Returns the number of released nodes.
    pub fn teardown(&mut self) -> usize {
        if let Err(err) = self.set_state(ElementState::Null) {
            tracing::warn!(graph = %self.name, error = %err, "state change during teardown failed");
        }

        let mut released = 0;
        for id in self.node_ids() {
            match self.remove(id) {
                Ok(_) => released += 1,
                Err(err) => tracing::warn!(graph = %self.name, id = %id, error = %err, "failed to release node"),
            }
        }
        released
    }

    // ========================================================================
    // Debug output
    // ========================================================================

    /// Render the graph in Graphviz DOT format.
    pub fn to_dot(&self) -> String {
        let mut dot = format!("digraph \"{}\" {{\n", self.name);
        dot.push_str("  rankdir=LR;\n");
        dot.push_str("  node [shape=box];\n\n");

        for index in self.dag.graph().node_indices() {
            let node = &self.dag.graph()[index];
            dot.push_str(&format!(
                "  \"{}\" [label=\"{}\\n({})\\n{}\"];\n",
                node.name, node.name, node.type_name, node.state
            ));
        }

        dot.push('\n');

        for edge in self.dag.graph().edge_references() {
            let src = &self.dag.graph()[edge.source()];
            let sink = &self.dag.graph()[edge.target()];
            let link = edge.weight();
            dot.push_str(&format!(
                "  \"{}\" -> \"{}\" [label=\"{}→{}\"];\n",
                src.name, sink.name, link.src_pad, link.sink_pad
            ));
        }

        dot.push_str("}\n");
        dot
    }
}

fn check_pad(node: &Node, pad: &str, direction: PadDirection) -> Result<()> {
    match node.pad(pad) {
        None => Err(NegotiationError::NoSuchPad {
            node: node.name.clone(),
            pad: pad.to_string(),
        }
        .into()),
        Some(p) if p.direction() != direction => Err(NegotiationError::WrongDirection {
            node: node.name.clone(),
            pad: pad.to_string(),
        }
        .into()),
        Some(_) => Ok(()),
    }
}

impl fmt::Debug for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Graph")
            .field("name", &self.name)
            .field("nodes", &self.node_count())
            .field("links", &self.link_count())
            .field("target", &self.target)
            .field("attachment_count", &self.attachment_count)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::PadPresence;
    use crate::format::{Framerate, VideoCodec};
    use crate::pipeline::{Bus, discovery_channel};
    use std::sync::{Arc, Mutex};

    type Journal = Arc<Mutex<Vec<String>>>;

    struct TestElement {
        kind: ElementKind,
        name: &'static str,
        journal: Journal,
        fail_on: Option<ElementState>,
        produces: Caps,
        next_request: u32,
        placements: HashMap<String, SlotPlacement>,
    }

    impl TestElement {
        fn boxed(kind: ElementKind, name: &'static str, journal: &Journal) -> Box<dyn Element> {
            Box::new(Self {
                kind,
                name,
                journal: journal.clone(),
                fail_on: None,
                produces: Caps::Any,
                next_request: 0,
                placements: HashMap::new(),
            })
        }
    }

    impl Element for TestElement {
        fn kind(&self) -> ElementKind {
            self.kind
        }

        fn output_caps(&self, _pad: &str) -> Caps {
            self.produces.clone()
        }

        fn request_pad(&mut self) -> Result<Pad> {
            if self.kind != ElementKind::Compositor {
                return Err(Error::Link("no request pads".into()));
            }
            let pad = Pad::requested(format!("sink_{}", self.next_request));
            self.next_request += 1;
            Ok(pad)
        }

        fn set_placement(&mut self, pad: &str, placement: SlotPlacement) -> Result<()> {
            self.placements.insert(pad.to_string(), placement);
            Ok(())
        }

        fn placement(&self, pad: &str) -> Option<SlotPlacement> {
            self.placements.get(pad).copied()
        }

        fn change_state(&mut self, change: StateChange, _ctx: &ElementContext) -> Result<()> {
            if Some(change.to) == self.fail_on {
                return Err(Error::Config("refusing".into()));
            }
            self.journal
                .lock()
                .unwrap()
                .push(format!("{}:{}", self.name, change.to));
            Ok(())
        }
    }

    fn graph() -> Graph {
        let bus = Bus::new();
        let (discovery, _) = discovery_channel();
        Graph::new("test", bus.sender(), discovery)
    }

    fn chain(graph: &mut Graph, journal: &Journal) -> (NodeId, NodeId, NodeId) {
        let src = graph
            .add("src", "testsrc", TestElement::boxed(ElementKind::Source, "src", journal))
            .unwrap();
        let queue = graph
            .add("queue", "queue", TestElement::boxed(ElementKind::Queue, "queue", journal))
            .unwrap();
        let sink = graph
            .add("sink", "fakesink", TestElement::boxed(ElementKind::Sink, "sink", journal))
            .unwrap();
        graph.link_many(&[src, queue, sink]).unwrap();
        (src, queue, sink)
    }

    #[test]
    fn test_add_nodes() {
        let mut graph = graph();
        let journal = Journal::default();
        let (src, queue, sink) = chain(&mut graph, &journal);

        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.link_count(), 2);
        assert_eq!(graph.node_id("src"), Some(src));
        assert_eq!(graph.node_id("queue"), Some(queue));
        assert_eq!(graph.node(sink).unwrap().type_name(), "fakesink");
        assert_eq!(graph.node(sink).unwrap().state(), ElementState::Null);
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut graph = graph();
        let journal = Journal::default();
        graph
            .add("a", "queue", TestElement::boxed(ElementKind::Queue, "a", &journal))
            .unwrap();
        let err = graph
            .add("a", "queue", TestElement::boxed(ElementKind::Queue, "a", &journal))
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateName(name) if name == "a"));
    }

    #[test]
    fn test_stale_id_after_removal() {
        let mut graph = graph();
        let journal = Journal::default();
        let old = graph
            .add("a", "queue", TestElement::boxed(ElementKind::Queue, "a", &journal))
            .unwrap();
        graph.remove(old).unwrap();
        let new = graph
            .add("b", "queue", TestElement::boxed(ElementKind::Queue, "b", &journal))
            .unwrap();

        assert!(!graph.contains(old));
        assert!(graph.contains(new));
        assert!(graph.node(old).is_none());
        assert!(matches!(graph.remove(old), Err(Error::NodeNotFound(_))));
        assert_eq!(graph.node_id("a"), None);
    }

    #[test]
    fn test_pad_linked_once() {
        let mut graph = graph();
        let journal = Journal::default();
        let (src, queue, _) = chain(&mut graph, &journal);

        let err = graph.link_pads(src, "src", queue, "sink", None).unwrap_err();
        assert!(matches!(
            err,
            Error::Negotiation(NegotiationError::AlreadyLinked { .. })
        ));
        assert!(graph.is_linked(&PadRef::new(src, "src")));
    }

    #[test]
    fn test_cycle_detection() {
        let mut graph = graph();
        let journal = Journal::default();
        let a = graph
            .add("a", "queue", TestElement::boxed(ElementKind::Queue, "a", &journal))
            .unwrap();
        let b = graph
            .add("b", "queue", TestElement::boxed(ElementKind::Queue, "b", &journal))
            .unwrap();
        graph.link(a, b).unwrap();

        let err = graph.link(b, a).unwrap_err();
        assert!(matches!(
            err,
            Error::Negotiation(NegotiationError::CycleDetected { .. })
        ));
        assert_eq!(graph.link_count(), 1);
    }

    #[test]
    fn test_wrong_direction_and_missing_pad() {
        let mut graph = graph();
        let journal = Journal::default();
        let (src, queue, _) = chain(&mut graph, &journal);

        let err = graph.link_pads(queue, "sink", src, "src", None).unwrap_err();
        assert!(matches!(
            err,
            Error::Negotiation(NegotiationError::WrongDirection { .. })
        ));
        let err = graph.link_pads(src, "video_0", queue, "sink", None).unwrap_err();
        assert!(matches!(
            err,
            Error::Negotiation(NegotiationError::NoSuchPad { .. })
        ));
    }

    #[test]
    fn test_filtered_link_rejects_mismatch() {
        let mut graph = graph();
        let journal = Journal::default();
        let element = TestElement {
            kind: ElementKind::Decoder,
            name: "dec",
            journal: journal.clone(),
            fail_on: None,
            produces: Caps::encoded(VideoCodec::H264),
            next_request: 0,
            placements: HashMap::new(),
        };
        let dec = graph.add("dec", "avdec_h264", Box::new(element)).unwrap();
        let mixer = graph
            .add("mixer", "videomixer", TestElement::boxed(ElementKind::Compositor, "mixer", &journal))
            .unwrap();
        let pad = graph.request_pad(mixer).unwrap();
        assert_eq!(pad.presence(), PadPresence::Request);

        let descriptor = negotiation::descriptor(200, 150, Framerate::FPS_30);
        let err = graph
            .link_pads(dec, "src", mixer, pad.name(), Some(&descriptor))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Negotiation(NegotiationError::NoCommonFormat { .. })
        ));
        assert_eq!(graph.link_count(), 0);
    }

    #[test]
    fn test_request_pad_placement_and_release() {
        let mut graph = graph();
        let journal = Journal::default();
        let src = graph
            .add("src", "videotestsrc", TestElement::boxed(ElementKind::Source, "src", &journal))
            .unwrap();
        let mixer = graph
            .add("mixer", "videomixer", TestElement::boxed(ElementKind::Compositor, "mixer", &journal))
            .unwrap();
        let pad = graph.request_pad(mixer).unwrap();
        assert_eq!(pad.name(), "sink_0");

        let placement = SlotPlacement {
            xpos: 0,
            ypos: 200,
            zorder: 1,
        };
        graph.set_placement(mixer, "sink_0", placement).unwrap();
        assert_eq!(graph.placement(mixer, "sink_0"), Some(placement));
        assert!(graph.set_placement(mixer, "sink_9", placement).is_err());

        graph.link_pads(src, "src", mixer, "sink_0", None).unwrap();
        graph.release_pad(mixer, "sink_0").unwrap();
        assert_eq!(graph.link_count(), 0);
        assert!(graph.node(mixer).unwrap().pad("sink_0").is_none());
    }

    #[test]
    fn test_set_state_order() {
        let mut graph = graph();
        let journal = Journal::default();
        let (src, queue, sink) = chain(&mut graph, &journal);

        graph.set_state(ElementState::Playing).unwrap();
        for id in [src, queue, sink] {
            assert_eq!(graph.node(id).unwrap().state(), ElementState::Playing);
        }

        let log = journal.lock().unwrap().clone();
        assert_eq!(
            &log[..3],
            &["sink:Ready", "queue:Ready", "src:Ready"].map(String::from)
        );
        assert_eq!(log.len(), 9);
        assert_eq!(log[8], "src:Playing");

        journal.lock().unwrap().clear();
        graph.set_state(ElementState::Null).unwrap();
        let log = journal.lock().unwrap().clone();
        assert_eq!(log[0], "src:Paused");
        assert_eq!(log[8], "sink:Null");
    }

    #[test]
    fn test_upward_failure_is_lifecycle_error() {
        let mut graph = graph();
        let journal = Journal::default();
        let element = TestElement {
            kind: ElementKind::Source,
            name: "src",
            journal: journal.clone(),
            fail_on: Some(ElementState::Paused),
            produces: Caps::Any,
            next_request: 0,
            placements: HashMap::new(),
        };
        let src = graph.add("src", "filesrc", Box::new(element)).unwrap();

        let err = graph.set_state(ElementState::Playing).unwrap_err();
        assert!(matches!(err, Error::Lifecycle { ref node, .. } if node == "src"));
        assert_eq!(graph.node(src).unwrap().state(), ElementState::Ready);
    }

    #[test]
    fn test_sync_state_with_parent() {
        let mut graph = graph();
        let journal = Journal::default();
        chain(&mut graph, &journal);
        graph.set_state(ElementState::Playing).unwrap();

        let late = graph
            .add("late", "queue", TestElement::boxed(ElementKind::Queue, "late", &journal))
            .unwrap();
        assert_eq!(graph.node(late).unwrap().state(), ElementState::Null);
        graph.sync_state_with_parent(late).unwrap();
        assert_eq!(graph.node(late).unwrap().state(), ElementState::Playing);
    }

    #[test]
    fn test_state_changes_posted_on_bus() {
        let mut bus = Bus::new();
        let receiver = bus.take_receiver().unwrap();
        let (discovery, _rx) = discovery_channel();
        let mut graph = Graph::new("posted", bus.sender(), discovery);
        let journal = Journal::default();
        graph
            .add("q", "queue", TestElement::boxed(ElementKind::Queue, "q", &journal))
            .unwrap();
        graph.set_state(ElementState::Ready).unwrap();

        let first = receiver.try_recv().unwrap().unwrap();
        assert_eq!(
            first,
            BusMessage::StateChanged {
                element: "q".into(),
                old: ElementState::Null,
                new: ElementState::Ready,
                pending: ElementState::Ready,
            }
        );
        let second = receiver.try_recv().unwrap().unwrap();
        assert!(matches!(second, BusMessage::StateChanged { ref element, .. } if element == "posted"));
    }

    #[test]
    fn test_teardown_releases_everything() {
        let mut graph = graph();
        let journal = Journal::default();
        chain(&mut graph, &journal);
        graph.set_state(ElementState::Playing).unwrap();

        assert_eq!(graph.teardown(), 3);
        assert!(graph.is_empty());
        assert_eq!(graph.link_count(), 0);
        assert_eq!(graph.target_state(), ElementState::Null);
    }

    #[test]
    fn test_attachment_counter() {
        let mut graph = graph();
        assert_eq!(graph.attachment_count(), 0);
        assert_eq!(graph.bump_attachment_count(), 1);
        assert_eq!(graph.bump_attachment_count(), 2);
        assert_eq!(graph.attachment_count(), 2);
    }

    #[test]
    fn test_to_dot() {
        let mut graph = graph();
        let journal = Journal::default();
        chain(&mut graph, &journal);

        let dot = graph.to_dot();
        assert!(dot.starts_with("digraph \"test\" {"));
        assert!(dot.contains("rankdir=LR;"));
        assert!(dot.contains("\"queue\" [label=\"queue\\n(queue)\\nNull\"];"));
        assert!(dot.contains("\"src\" -> \"queue\" [label=\"src→sink\"];"));
        assert!(dot.ends_with("}\n"));
    }
}
