//! Error types for Mosaic.

use crate::negotiation::NegotiationError;
use thiserror::Error;

/// Result type alias using Mosaic's Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Mosaic operations.
#[derive(Error, Debug)]
pub enum Error {
    /// A node could not be created by the element factory.
    #[error("failed to create '{type_name}' element '{name}': {reason}")]
    Construction {
        /// Factory type name that was requested.
        type_name: String,
        /// Unique name the node would have had.
        name: String,
        /// Why construction failed.
        reason: String,
    },

    /// A capability-constrained link could not be established.
    #[error(transparent)]
    Negotiation(#[from] NegotiationError),

    /// A state transition did not succeed.
    #[error("state change failed on '{node}': {reason}")]
    Lifecycle {
        /// Node (or graph) whose transition failed.
        node: String,
        /// Why the transition failed.
        reason: String,
    },

    /// An error reported on the event bus while the graph was running.
    #[error("stream error from {}: {message}", element.as_deref().unwrap_or("unknown element"))]
    Stream {
        /// Name of the posting element, if known.
        element: Option<String>,
        /// Human readable error text.
        message: String,
        /// Additional debugging detail.
        debug: Option<String>,
    },

    /// Two pads could not be connected.
    #[error("link failed: {0}")]
    Link(String),

    /// The compositor has no free input slot left.
    #[error("compositor '{compositor}' has no free slot (limit {limit})")]
    SlotExhausted {
        /// Compositor node name.
        compositor: String,
        /// Configured slot limit.
        limit: usize,
    },

    /// A node id did not resolve to a live node.
    #[error("node not found: {0}")]
    NodeNotFound(String),

    /// A node name is already used in the graph.
    #[error("duplicate node name: {0}")]
    DuplicateName(String),

    /// Invalid configuration or property value.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Shorthand for a lifecycle failure.
    pub fn lifecycle(node: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Lifecycle {
            node: node.into(),
            reason: reason.into(),
        }
    }

    /// Short label used for metrics and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Construction { .. } => "construction",
            Self::Negotiation(_) => "negotiation",
            Self::Lifecycle { .. } => "lifecycle",
            Self::Stream { .. } => "stream",
            Self::Link(_) => "link",
            Self::SlotExhausted { .. } => "slot",
            Self::NodeNotFound(_) => "node",
            Self::DuplicateName(_) => "name",
            Self::Config(_) => "config",
            Self::Io(_) => "io",
        }
    }
}
