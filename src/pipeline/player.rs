//! Graph orchestrator.
//!
//! A [`Player`] owns the graph, its bus and the discovery queue. It builds
//! the fixed skeleton, starts the graph together with the attachment task,
//! waits for the bus to stop, and tears everything down.
//!
//! ```text
//!   source ─► demuxer ···(discovered at runtime)···► decode chains ─┐
//!                                                                   ▼
//!                                              compositor ─► video-output
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use mosaic::pipeline::{Player, PlayerConfig};
//!
//! # async fn example() -> mosaic::Result<()> {
//! let mut player = Player::new(PlayerConfig::file("cams.mkv"))?;
//! player.build()?;
//! player.start()?;
//! let result = player.run().await;
//! player.stop_and_teardown();
//! result
//! # }
//! ```

use crate::element::{ElementState, PadPresence, SlotPlacement};
use crate::error::{Error, Result};
use crate::negotiation;
use crate::observability;
use crate::pipeline::attach::{dump_dot, lock_graph};
use crate::pipeline::{
    AttachMode, AttachedStream, AttachmentHandler, Bus, BusSender, BusWatch, Discovery,
    ElementFactory, Graph, NodeId, PadRef, PlayerConfig, Properties, StaticSource, StreamSlot,
    discovery_channel,
};
use kanal::AsyncReceiver;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::Instrument;

/// Fixed nodes created by [`Player::build`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Skeleton {
    /// Entry node.
    pub source: NodeId,
    /// Demultiplexer.
    pub demuxer: NodeId,
    /// Compositor, in compositor mode.
    pub compositor: Option<NodeId>,
    /// Output sink behind the compositor, in compositor mode.
    pub output: Option<NodeId>,
}

/// Summary returned by [`Player::stop_and_teardown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TeardownReport {
    /// Nodes released.
    pub released: usize,
    /// Final attachment count.
    pub attached: u64,
}

/// Builds, runs and tears down one graph.
pub struct Player {
    config: PlayerConfig,
    factory: ElementFactory,
    graph: Arc<Mutex<Graph>>,
    bus: Bus,
    discovery: Option<AsyncReceiver<Discovery>>,
    skeleton: Option<Skeleton>,
    handler: Option<AttachmentHandler>,
    streams: Arc<Mutex<Vec<AttachedStream>>>,
    attached_tx: Option<watch::Sender<u64>>,
    attached: watch::Receiver<u64>,
    task: Option<JoinHandle<()>>,
    torn_down: bool,
    span: tracing::Span,
}

impl Player {
    /// Create a player using the stock element factory.
    ///
    /// The configuration is checked before anything is created.
    pub fn new(config: PlayerConfig) -> Result<Self> {
        Self::with_factory(config, ElementFactory::new())
    }

    /// Create a player using a custom element factory.
    pub fn with_factory(config: PlayerConfig, factory: ElementFactory) -> Result<Self> {
        config.validate()?;
        observability::init_metrics();

        let bus = Bus::new();
        let (discovery_tx, discovery_rx) = discovery_channel();
        let graph = Graph::new(config.name.clone(), bus.sender(), discovery_tx);
        let (attached_tx, attached) = watch::channel(0);
        let span = observability::span_player(&config.name);

        Ok(Self {
            config,
            factory,
            graph: Arc::new(Mutex::new(graph)),
            bus,
            discovery: Some(discovery_rx),
            skeleton: None,
            handler: None,
            streams: Arc::new(Mutex::new(vec![])),
            attached_tx: Some(attached_tx),
            attached,
            task: None,
            torn_down: false,
            span,
        })
    }

    /// Get the configuration.
    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    /// Get the skeleton, once built.
    pub fn skeleton(&self) -> Option<Skeleton> {
        self.skeleton
    }

    /// Create the fixed nodes and link them.
    ///
    /// In compositor mode this also links every configured static source to
    /// its own compositor input.
    pub fn build(&mut self) -> Result<()> {
        let _guard = self.span.enter();
        if self.skeleton.is_some() {
            return Err(Error::Config("player is already built".to_string()));
        }

        let config = &self.config;
        let factory = &self.factory;
        let mut graph = lock_graph(&self.graph);

        let source_type = config.source.type_name();
        let element = factory.create_with(source_type, "source", &config.source.properties())?;
        let source = graph.add("source", source_type, element)?;

        let element = factory.create_with(&config.demuxer, "demuxer", &config.demuxer_properties)?;
        let demuxer = graph.add("demuxer", &config.demuxer, element)?;
        graph.link(source, demuxer)?;

        let (compositor, output) = match config.mode {
            AttachMode::Compositor => {
                let element = factory.create_with(
                    &config.compositor,
                    "compositor",
                    &config.compositor_properties,
                )?;
                let compositor = graph.add("compositor", &config.compositor, element)?;
                let element = factory.create(&config.sink, "video-output")?;
                let output = graph.add("video-output", &config.sink, element)?;
                graph.link(compositor, output)?;

                for (index, source) in config.static_sources.iter().enumerate() {
                    link_static_source(&mut graph, factory, compositor, index, source)?;
                }
                (Some(compositor), Some(output))
            }
            AttachMode::SeparateSinks => (None, None),
        };

        tracing::info!(
            graph = %graph.name(),
            nodes = graph.node_count(),
            links = graph.link_count(),
            "graph built"
        );
        drop(graph);

        self.skeleton = Some(Skeleton {
            source,
            demuxer,
            compositor,
            output,
        });

        let mut handler = AttachmentHandler::new(
            self.graph.clone(),
            self.factory.clone(),
            self.config.clone(),
            compositor,
        );
        if let Some(attached_tx) = self.attached_tx.take() {
            handler = handler.share_with(self.streams.clone(), attached_tx);
        }
        self.handler = Some(handler);
        Ok(())
    }

    /// Start the attachment task and bring the graph to `Playing`.
    ///
    /// Builds the skeleton first if needed. Must be called within a tokio
    /// runtime. A node refusing to start yields [`Error::Lifecycle`].
    pub fn start(&mut self) -> Result<()> {
        if self.skeleton.is_none() {
            self.build()?;
        }
        let _guard = self.span.enter();

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| Error::lifecycle(&self.config.name, "no tokio runtime to run on"))?;
        if let (Some(handler), Some(receiver)) = (self.handler.take(), self.discovery.take()) {
            let span = observability::span_player(&self.config.name);
            let handler = Arc::new(handler);
            self.task = Some(runtime.spawn(
                async move {
                    // Attachments run one at a time on the blocking pool.
                    while let Ok(discovery) = receiver.recv().await {
                        let handler = handler.clone();
                        let span = tracing::Span::current();
                        let attached = tokio::task::spawn_blocking(move || {
                            span.in_scope(|| handler.handle(discovery))
                        })
                        .await;
                        if let Err(err) = attached {
                            tracing::error!(error = %err, "attachment worker failed");
                            break;
                        }
                    }
                    tracing::debug!("discovery queue closed");
                }
                .instrument(span),
            ));
        }

        let mut graph = lock_graph(&self.graph);
        if let Err(err) = graph.set_state(ElementState::Playing) {
            tracing::error!(graph = %graph.name(), error = %err, "unable to set the graph to the playing state");
            return Err(err);
        }
        Ok(())
    }

    /// Dispatch bus messages until end-of-stream or an error.
    ///
    /// Returns `Ok(())` on end-of-stream and [`Error::Stream`] on a bus
    /// error. There is no timeout.
    pub async fn run(&mut self) -> Result<()> {
        let receiver = self.bus.take_receiver().ok_or_else(|| {
            Error::lifecycle(&self.config.name, "the event bus is already being watched")
        })?;
        let mut bus_watch = BusWatch::new();
        let result = bus_watch
            .watch(&receiver)
            .instrument(self.span.clone())
            .await;
        tracing::debug!(graph = %self.config.name, handled = bus_watch.handled(), "bus watch stopped");
        result
    }

    /// Bring the graph to `Null`, release every node, and close the bus
    /// and the discovery queue.
    ///
    /// Safe to call more than once.
    pub fn stop_and_teardown(&mut self) -> TeardownReport {
        let _guard = self.span.enter();
        let mut graph = lock_graph(&self.graph);
        graph.discovery().close();

        if let Some(dir) = &self.config.dot_dir {
            dump_dot(&graph, dir, "-final");
        }

        let report = TeardownReport {
            attached: graph.attachment_count(),
            released: graph.teardown(),
        };
        drop(graph);

        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.bus.close();
        self.torn_down = true;

        tracing::info!(
            released = report.released,
            attached = report.attached,
            "graph torn down"
        );
        report
    }

    /// Number of streams that went through the attachment protocol.
    pub fn attached_count(&self) -> u64 {
        lock_graph(&self.graph).attachment_count()
    }

    /// Watch the attachment count.
    pub fn attachments(&self) -> watch::Receiver<u64> {
        self.attached.clone()
    }

    /// Records of streams that went through the linking phase.
    pub fn streams(&self) -> Vec<AttachedStream> {
        self.streams
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Compositor inputs and their placement, in pad order.
    pub fn slots(&self) -> Vec<StreamSlot> {
        let Some(compositor) = self.skeleton.and_then(|s| s.compositor) else {
            return vec![];
        };
        let graph = lock_graph(&self.graph);
        let Some(node) = graph.node(compositor) else {
            return vec![];
        };
        node.pads()
            .iter()
            .filter(|pad| pad.presence() == PadPresence::Request)
            .filter_map(|pad| {
                graph.placement(compositor, pad.name()).map(|placement| StreamSlot {
                    pad: pad.name().to_string(),
                    placement,
                })
            })
            .collect()
    }

    /// A sender for posting on the graph's bus.
    pub fn bus(&self) -> BusSender {
        self.bus.sender()
    }

    /// Run `f` with the graph locked.
    pub fn with_graph<R>(&self, f: impl FnOnce(&Graph) -> R) -> R {
        f(&lock_graph(&self.graph))
    }
}

/// Link a pattern source to its own compositor input with explicit placement.
fn link_static_source(
    graph: &mut Graph,
    factory: &ElementFactory,
    compositor: NodeId,
    index: usize,
    source: &StaticSource,
) -> Result<()> {
    let name = format!("static-source{index:02}");
    let properties = Properties::new().with("pattern", source.pattern);
    let element = factory.create_with("videotestsrc", &name, &properties)?;
    let id = graph.add(name.clone(), "videotestsrc", element)?;

    let pad = graph.request_pad(compositor)?;
    graph.set_placement(
        compositor,
        pad.name(),
        SlotPlacement {
            xpos: source.xpos,
            ypos: source.ypos,
            zorder: source.zorder,
        },
    )?;
    negotiation::link_filtered(
        graph,
        &PadRef::new(id, "src"),
        &PadRef::new(compositor, pad.name()),
        &source.descriptor(),
    )?;
    tracing::debug!(source = %name, pad = %pad, "static source linked");
    Ok(())
}

impl Drop for Player {
    fn drop(&mut self) {
        if self.skeleton.is_some() && !self.torn_down {
            self.stop_and_teardown();
        }
    }
}

impl std::fmt::Debug for Player {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Player")
            .field("name", &self.config.name)
            .field("skeleton", &self.skeleton)
            .field("started", &self.task.is_some())
            .field("torn_down", &self.torn_down)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::Framerate;
    use crate::pipeline::{BusMessage, StreamGeometry};
    use std::time::Duration;

    fn demux_properties(streams: u32) -> Properties {
        Properties::new()
            .with("streams", streams)
            .with("interval-ms", 5u32)
    }

    #[test]
    fn test_build_skeleton() {
        let config = PlayerConfig::pattern(0).with_sink("fakesink");
        let mut player = Player::new(config).unwrap();
        player.build().unwrap();

        let skeleton = player.skeleton().unwrap();
        assert!(skeleton.compositor.is_some());
        player.with_graph(|graph| {
            assert_eq!(graph.node_count(), 4);
            assert_eq!(graph.link_count(), 2);
            assert_eq!(graph.node_name(skeleton.demuxer).as_deref(), Some("demuxer"));
        });
        assert!(player.build().is_err());
        assert_eq!(player.attached_count(), 0);
    }

    #[test]
    fn test_build_separate_sinks_has_no_compositor() {
        let config = PlayerConfig::pattern(0).with_mode(AttachMode::SeparateSinks);
        let mut player = Player::new(config).unwrap();
        player.build().unwrap();
        let skeleton = player.skeleton().unwrap();
        assert_eq!(skeleton.compositor, None);
        assert_eq!(player.with_graph(Graph::node_count), 2);
        assert!(player.slots().is_empty());
    }

    #[test]
    fn test_static_sources_get_explicit_slots() {
        let config = PlayerConfig::pattern(0)
            .with_sink("fakesink")
            .with_static_source(StaticSource::new(1, 200, 150).at(0, 0, 0))
            .with_static_source(StaticSource::new(18, 640, 360).at(200, 0, 1));
        let mut player = Player::new(config).unwrap();
        player.build().unwrap();

        let slots = player.slots();
        assert_eq!(slots.len(), 2);
        assert_eq!(slots[1].pad, "sink_1");
        assert_eq!(
            slots[1].placement,
            SlotPlacement {
                xpos: 200,
                ypos: 0,
                zorder: 1
            }
        );
        assert_eq!(player.attached_count(), 0);
        player.with_graph(|graph| {
            let id = graph.node_id("static-source01").unwrap();
            assert!(graph.link_from(&PadRef::new(id, "src")).unwrap().filtered);
        });
    }

    #[test]
    fn test_invalid_config_rejected_before_build() {
        let err = Player::new(PlayerConfig::file("")).unwrap_err();
        assert_eq!(err.kind(), "config");
    }

    #[tokio::test]
    async fn test_unreadable_file_fails_to_start() {
        let mut player = Player::new(PlayerConfig::file("/nonexistent/cams.mkv")).unwrap();
        let err = player.start().unwrap_err();
        assert!(matches!(err, Error::Lifecycle { ref node, .. } if node == "source"));
        let report = player.stop_and_teardown();
        assert_eq!(report.released, 4);
    }

    #[test]
    fn test_start_needs_runtime() {
        let mut player = Player::new(PlayerConfig::pattern(0)).unwrap();
        let err = player.start().unwrap_err();
        assert_eq!(err.kind(), "lifecycle");
    }

    #[tokio::test]
    async fn test_run_until_eos() {
        let config = PlayerConfig::pattern(0)
            .with_sink("fakesink")
            .with_demuxer("matroskademux", demux_properties(2).with("eos-after-ms", 20u32))
            .with_geometry(StreamGeometry::new(200, 150, Framerate::FPS_30));
        let mut player = Player::new(config).unwrap();
        let mut attached = player.attachments();
        player.start().unwrap();
        tokio::time::timeout(Duration::from_secs(5), attached.wait_for(|n| *n == 2))
            .await
            .unwrap()
            .unwrap();
        player.run().await.unwrap();

        assert_eq!(player.attached_count(), 2);
        let report = player.stop_and_teardown();
        assert_eq!(report.attached, 2);
        assert_eq!(report.released, 10);
        assert_eq!(player.with_graph(Graph::node_count), 0);
    }

    #[tokio::test]
    async fn test_injected_error_stops_run() {
        let config = PlayerConfig::pattern(0)
            .with_sink("fakesink")
            .with_demuxer("matroskademux", demux_properties(0));
        let mut player = Player::new(config).unwrap();
        player.start().unwrap();

        let bus = player.bus();
        bus.post(BusMessage::StreamStatus {
            element: "test".into(),
            status: "enter".into(),
        });
        bus.post_error(Some("test".into()), Some("injected".into()), None);

        let err = player.run().await.unwrap_err();
        assert_eq!(err.kind(), "stream");
        assert!(player.run().await.is_err());
        player.stop_and_teardown();
    }
}
