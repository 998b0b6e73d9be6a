//! Negotiation error types.

use thiserror::Error;

/// Why a link between two pads could not be made.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NegotiationError {
    /// The two descriptors (and the filter, if any) do not intersect.
    #[error("No common format between {upstream} and {downstream}:\n  {explanation}")]
    NoCommonFormat {
        /// Node on the output side of the link.
        upstream: String,
        /// Node on the input side of the link.
        downstream: String,
        /// Both sides' descriptors, one per line.
        explanation: String,
    },

    /// A capability descriptor does not pin the stream geometry.
    #[error("Descriptor for {upstream} -> {downstream} is not fixed: {caps}")]
    NotFixed {
        /// Node on the output side of the link.
        upstream: String,
        /// Node on the input side of the link.
        downstream: String,
        /// The offending descriptor.
        caps: String,
    },

    /// The pad does not exist on the element.
    #[error("Element {node} has no pad {pad}")]
    NoSuchPad {
        /// Node name.
        node: String,
        /// Pad name.
        pad: String,
    },

    /// The pad already carries a link.
    #[error("Pad {node}:{pad} is already linked")]
    AlreadyLinked {
        /// Node name.
        node: String,
        /// Pad name.
        pad: String,
    },

    /// Pads were given in the wrong direction.
    #[error("Cannot link {node}:{pad}: wrong pad direction")]
    WrongDirection {
        /// Node name.
        node: String,
        /// Pad name.
        pad: String,
    },

    /// The link would close a cycle.
    #[error("Linking {upstream} -> {downstream} would create a cycle")]
    CycleDetected {
        /// Node on the output side of the link.
        upstream: String,
        /// Node on the input side of the link.
        downstream: String,
    },
}

impl NegotiationError {
    /// Create a "no common format" error with both sides' caps.
    pub fn no_common_format(
        upstream: impl Into<String>,
        downstream: impl Into<String>,
        upstream_caps: &str,
        downstream_caps: &str,
    ) -> Self {
        Self::NoCommonFormat {
            upstream: upstream.into(),
            downstream: downstream.into(),
            explanation: format!(
                "Upstream produces: {}\nDownstream accepts: {}",
                upstream_caps, downstream_caps
            ),
        }
    }
}
