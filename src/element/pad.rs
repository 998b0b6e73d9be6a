//! Pad abstraction for element inputs and outputs.
//!
//! Pads are the connection points of nodes. Most pads exist for the whole
//! life of an element; demuxers expose "sometimes" pads once they discover
//! a stream, and fan-in elements such as the compositor hand out "request"
//! pads on demand.

use std::fmt;

/// Direction of a pad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PadDirection {
    /// Receives data from upstream.
    Input,
    /// Sends data downstream.
    Output,
}

/// How a pad comes into existence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PadPresence {
    /// Present from construction.
    Always,
    /// Created by the element at runtime (e.g. demuxer streams).
    Sometimes,
    /// Created when requested by the application (e.g. compositor slots).
    Request,
}

/// Template describing pads an element may have.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PadTemplate {
    /// Name pattern, e.g. `"src"` or `"sink_%u"`.
    pub name: String,
    /// Direction of pads created from this template.
    pub direction: PadDirection,
    /// Presence of pads created from this template.
    pub presence: PadPresence,
}

impl PadTemplate {
    /// Create a new pad template.
    pub fn new(name: impl Into<String>, direction: PadDirection, presence: PadPresence) -> Self {
        Self {
            name: name.into(),
            direction,
            presence,
        }
    }

    /// Template for an on-request input pad.
    pub fn request_input(name: impl Into<String>) -> Self {
        Self::new(name, PadDirection::Input, PadPresence::Request)
    }

    /// Template for a sometimes-present output pad.
    pub fn sometimes_output(name: impl Into<String>) -> Self {
        Self::new(name, PadDirection::Output, PadPresence::Sometimes)
    }

    /// Expand a `%u` pattern into a concrete pad name.
    pub fn instantiate(&self, index: usize) -> String {
        self.name.replace("%u", &index.to_string())
    }
}

/// A pad instance on a node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Pad {
    name: String,
    direction: PadDirection,
    presence: PadPresence,
}

impl Pad {
    /// Create a new pad.
    pub fn new(name: impl Into<String>, direction: PadDirection, presence: PadPresence) -> Self {
        Self {
            name: name.into(),
            direction,
            presence,
        }
    }

    /// The standard always-present input pad named `"sink"`.
    pub fn sink() -> Self {
        Self::new("sink", PadDirection::Input, PadPresence::Always)
    }

    /// The standard always-present output pad named `"src"`.
    pub fn src() -> Self {
        Self::new("src", PadDirection::Output, PadPresence::Always)
    }

    /// A dynamically exposed output pad.
    pub fn sometimes(name: impl Into<String>) -> Self {
        Self::new(name, PadDirection::Output, PadPresence::Sometimes)
    }

    /// A requested input pad.
    pub fn requested(name: impl Into<String>) -> Self {
        Self::new(name, PadDirection::Input, PadPresence::Request)
    }

    /// Get the pad's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the pad's direction.
    pub fn direction(&self) -> PadDirection {
        self.direction
    }

    /// Get the pad's presence.
    pub fn presence(&self) -> PadPresence {
        self.presence
    }

    /// Check if this is an input pad.
    pub fn is_input(&self) -> bool {
        self.direction == PadDirection::Input
    }

    /// Check if this is an output pad.
    pub fn is_output(&self) -> bool {
        self.direction == PadDirection::Output
    }
}

impl fmt::Display for Pad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
