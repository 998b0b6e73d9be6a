//! # Mosaic
//!
//! A dynamically growing media graph: a source feeds a demultiplexer that
//! discovers its elementary streams only after it starts running, and every
//! discovered stream is decoded and wired into its own slot of a shared
//! compositor.
//!
//! ## Features
//!
//! - **Runtime attachment**: decode chains are built and linked while the
//!   graph is playing, one stream at a time
//! - **Deterministic layout**: stream `N` lands at `ypos = N * width`,
//!   `zorder = N`
//! - **Fixed-geometry links**: compositor inputs are constrained to one
//!   width, height and framerate
//! - **Bus-driven lifecycle**: a run ends on end-of-stream or the first
//!   error posted by any node
//! - **Typed node ids**: generation-tagged, stale ids never resolve
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mosaic::prelude::*;
//!
//! # async fn example() -> mosaic::Result<()> {
//! let mut player = Player::new(PlayerConfig::file("cams.mkv"))?;
//! player.start()?;
//! let result = player.run().await;
//! player.stop_and_teardown();
//! result
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod element;
pub mod elements;
pub mod error;
pub mod format;
pub mod negotiation;
pub mod observability;
pub mod pipeline;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::element::{Element, ElementKind, ElementState, SlotPlacement};
    pub use crate::error::{Error, Result};
    pub use crate::format::{Caps, Framerate};
    pub use crate::pipeline::{
        AttachMode, BusMessage, ElementFactory, Graph, NegotiationFailurePolicy, NodeId, Player,
        PlayerConfig, Properties,
    };
}

pub use error::{Error, Result};
