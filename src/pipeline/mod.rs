//! Graph construction, attachment and execution.
//!
//! This module provides the core infrastructure:
//!
//! - [`Graph`]: the DAG of processing nodes, its links and run-state
//! - [`Bus`] / [`BusWatch`]: the event bus and the lifecycle state machine
//!   that decides when a run ends
//! - [`Discovery`]: stream announcements queued by demuxers
//! - [`AttachmentHandler`]: wires each discovered stream into the graph
//! - [`Player`]: builds, starts, runs and tears down a graph
//! - [`ElementFactory`]: creates elements by type name
//!
//! # Example
//!
//! ```rust,no_run
//! use mosaic::pipeline::{Player, PlayerConfig};
//!
//! # async fn example() -> mosaic::Result<()> {
//! let config = PlayerConfig::file("cams.mkv").with_max_streams(3);
//! let mut player = Player::new(config)?;
//! player.start()?;
//! let result = player.run().await;
//! let report = player.stop_and_teardown();
//! println!("attached {} streams", report.attached);
//! result
//! # }
//! ```

pub mod attach;
mod bus;
mod config;
mod discovery;
pub mod factory;
mod graph;
mod player;

pub use attach::{AttachOutcome, AttachedStream, AttachmentHandler, StreamSlot, allocate_slot};
pub use bus::{Bus, BusMessage, BusSender, BusState, BusWatch, Termination};
pub use config::{
    AttachMode, ChainConfig, DOT_DIR_ENV, NegotiationFailurePolicy, PlayerConfig, SourceConfig,
    StaticSource, StreamGeometry,
};
pub use discovery::{Discovery, DiscoverySender, discovery_channel};
pub use factory::{ElementConstructor, ElementFactory, Properties, PropertyValue};
pub use graph::{Graph, Link, LinkInfo, Node, NodeId, PadRef};
pub use player::{Player, Skeleton, TeardownReport};
