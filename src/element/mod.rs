//! Element system for Mosaic graphs.
//!
//! Elements are opaque processing nodes. The graph never looks at the media
//! they handle; it drives them through a small control-plane surface:
//!
//! - [`Element::pads`] / [`Element::request_pad`]: connection points
//! - [`Element::output_caps`] / [`Element::input_caps`]: capabilities used
//!   when linking
//! - [`Element::set_placement`]: per-slot layout on fan-in elements
//! - [`Element::change_state`]: one step of a run-state transition, with an
//!   [`ElementContext`] for posting bus messages and announcing streams
//!
//! # Example
//!
//! ```rust
//! use mosaic::element::{Element, ElementKind};
//! use mosaic::format::Caps;
//!
//! struct Identity;
//!
//! impl Element for Identity {
//!     fn kind(&self) -> ElementKind {
//!         ElementKind::Queue
//!     }
//!
//!     fn output_caps(&self, _pad: &str) -> Caps {
//!         Caps::Any
//!     }
//! }
//! ```

mod context;
mod pad;
mod traits;

pub use context::ElementContext;
pub use pad::{Pad, PadDirection, PadPresence, PadTemplate};
pub use traits::{Element, ElementKind, ElementState, SlotPlacement, StateChange};
