//! Core element trait and run-state types.

use crate::element::{ElementContext, Pad};
use crate::error::{Error, Result};
use crate::format::Caps;
use std::fmt;

// ============================================================================
// Run state
// ============================================================================

/// Run-state of a node (and target state of a graph).
///
/// States are ordered: a node moves one step at a time between `Null` and
/// `Playing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum ElementState {
    /// Initial state, no resources held.
    #[default]
    Null,
    /// Resources allocated, not processing.
    Ready,
    /// Prerolled, clock stopped.
    Paused,
    /// Data is flowing.
    Playing,
}

impl ElementState {
    /// The next state on the way to `target`, or `None` if already there.
    pub fn step_toward(self, target: Self) -> Option<Self> {
        use ElementState::*;
        match self.cmp(&target) {
            std::cmp::Ordering::Equal => None,
            std::cmp::Ordering::Less => Some(match self {
                Null => Ready,
                Ready => Paused,
                Paused | Playing => Playing,
            }),
            std::cmp::Ordering::Greater => Some(match self {
                Playing => Paused,
                Paused => Ready,
                Ready | Null => Null,
            }),
        }
    }
}

impl fmt::Display for ElementState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A single-step state transition handed to [`Element::change_state`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateChange {
    /// State before the transition.
    pub from: ElementState,
    /// State after the transition.
    pub to: ElementState,
}

impl StateChange {
    /// Whether this transition moves towards `Playing`.
    pub fn is_upward(&self) -> bool {
        self.to > self.from
    }
}

// ============================================================================
// Element kind and slot placement
// ============================================================================

/// Type tag of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    /// Entry node producing container bytes or raw frames.
    Source,
    /// Splits a container into elementary streams.
    Demuxer,
    /// Buffering node.
    Queue,
    /// Elementary stream parser.
    Parser,
    /// Decoder producing raw frames.
    Decoder,
    /// Fan-in node merging several frame streams.
    Compositor,
    /// Final consumer.
    Sink,
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Layout metadata of one compositor input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SlotPlacement {
    /// Horizontal offset in the output frame.
    pub xpos: i32,
    /// Vertical offset in the output frame.
    pub ypos: i32,
    /// Stacking order; higher is rendered on top.
    pub zorder: u32,
}

// ============================================================================
// Element trait
// ============================================================================

/// An opaque processing node.
///
/// Implementations are supplied through the
/// [`ElementFactory`](crate::pipeline::ElementFactory). The graph only talks
/// to elements through this control-plane surface: pads, caps, slot
/// placement, and run-state transitions.
pub trait Element: Send {
    /// Type tag of this element.
    fn kind(&self) -> ElementKind;

    /// Pads present from construction.
    fn pads(&self) -> Vec<Pad> {
        match self.kind() {
            ElementKind::Source => vec![Pad::src()],
            ElementKind::Sink => vec![Pad::sink()],
            ElementKind::Demuxer => vec![Pad::sink()],
            ElementKind::Compositor => vec![Pad::src()],
            ElementKind::Queue | ElementKind::Parser | ElementKind::Decoder => {
                vec![Pad::sink(), Pad::src()]
            }
        }
    }

    /// What this element can currently produce on an output pad.
    fn output_caps(&self, _pad: &str) -> Caps {
        Caps::Any
    }

    /// What this element accepts on an input pad.
    fn input_caps(&self, _pad: &str) -> Caps {
        Caps::Any
    }

    /// Called once a link into `pad` has been negotiated to `caps`.
    fn set_input_caps(&mut self, _pad: &str, _caps: &Caps) -> Result<()> {
        Ok(())
    }

    /// Create a new request pad.
    fn request_pad(&mut self) -> Result<Pad> {
        Err(Error::Link(format!(
            "{} elements have no request pads",
            self.kind()
        )))
    }

    /// Release a request pad created by [`request_pad`](Self::request_pad).
    fn release_pad(&mut self, _pad: &str) {}

    /// Set layout metadata on an input pad.
    fn set_placement(&mut self, pad: &str, _placement: SlotPlacement) -> Result<()> {
        Err(Error::Config(format!(
            "{} element has no placement for pad '{pad}'",
            self.kind()
        )))
    }

    /// Layout metadata of an input pad, if any was set.
    fn placement(&self, _pad: &str) -> Option<SlotPlacement> {
        None
    }

    /// Perform one step of a state transition.
    fn change_state(&mut self, _change: StateChange, _ctx: &ElementContext) -> Result<()> {
        Ok(())
    }
}
