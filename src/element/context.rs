//! Element runtime context.
//!
//! The context is handed to elements on every state transition and gives
//! them the two ways of talking back to the application: posting messages
//! on the event bus, and announcing newly discovered elementary streams.

use crate::element::Pad;
use crate::format::Caps;
use crate::pipeline::{BusMessage, BusSender, DiscoverySender, NodeId};

/// Runtime context for an element.
#[derive(Clone)]
pub struct ElementContext {
    name: String,
    node: NodeId,
    bus: BusSender,
    discovery: DiscoverySender,
}

impl ElementContext {
    /// Create a new element context.
    pub fn new(
        name: impl Into<String>,
        node: NodeId,
        bus: BusSender,
        discovery: DiscoverySender,
    ) -> Self {
        Self {
            name: name.into(),
            node,
            bus,
            discovery,
        }
    }

    /// Get the element's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the id of the node wrapping the element.
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Get the bus sender.
    pub fn bus(&self) -> &BusSender {
        &self.bus
    }

    /// Get the stream discovery sender.
    pub fn discovery(&self) -> &DiscoverySender {
        &self.discovery
    }

    /// Post a message on the bus.
    pub fn post(&self, message: BusMessage) -> bool {
        self.bus.post(message)
    }

    /// Post end-of-stream on behalf of this element.
    pub fn post_eos(&self) -> bool {
        self.bus.post_eos(Some(self.name.clone()))
    }

    /// Post an error on behalf of this element.
    pub fn post_error(&self, message: impl Into<String>, debug: Option<String>) -> bool {
        self.bus
            .post_error(Some(self.name.clone()), Some(message.into()), debug)
    }

    /// Announce a new elementary stream exposed on `pad`.
    pub fn announce_stream(&self, pad: Pad, caps: Caps) -> bool {
        self.discovery.pad_added(self.node, pad, caps)
    }

    /// Announce that no further streams will be exposed.
    pub fn no_more_streams(&self) -> bool {
        self.discovery.no_more_pads(self.node)
    }
}

impl std::fmt::Debug for ElementContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElementContext")
            .field("name", &self.name)
            .field("node", &self.node)
            .finish()
    }
}
