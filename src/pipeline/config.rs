//! Player configuration.

use crate::error::{Error, Result};
use crate::format::{Caps, Framerate};
use crate::negotiation;
use crate::pipeline::Properties;
use std::path::PathBuf;

/// Environment variable naming the directory for DOT graph dumps.
pub const DOT_DIR_ENV: &str = "MOSAIC_DEBUG_DUMP_DOT_DIR";

/// The fixed entry node of the graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceConfig {
    /// Read a container file (`filesrc`).
    File {
        /// Path of the container.
        location: PathBuf,
    },
    /// Generate a test pattern (`videotestsrc`).
    Pattern {
        /// Pattern number.
        pattern: u32,
    },
}

impl SourceConfig {
    /// Factory type name of the entry node.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::File { .. } => "filesrc",
            Self::Pattern { .. } => "videotestsrc",
        }
    }

    /// Construction properties of the entry node.
    pub fn properties(&self) -> Properties {
        match self {
            Self::File { location } => {
                Properties::new().with("location", location.display().to_string())
            }
            Self::Pattern { pattern } => Properties::new().with("pattern", *pattern),
        }
    }
}

/// Where each discovered stream ends up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AttachMode {
    /// Every stream gets a slot on the shared compositor.
    #[default]
    Compositor,
    /// Every stream gets its own video sink; no compositor is built.
    SeparateSinks,
}

/// What to do with a decode chain whose output could not be linked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NegotiationFailurePolicy {
    /// Remove the chain's nodes and release the compositor slot.
    #[default]
    RollBack,
    /// Leave the chain in the graph, unlinked and inert.
    KeepOrphans,
}

/// Geometry every attached stream is constrained to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamGeometry {
    /// Frame width; also the vertical stride between slots.
    pub width: u32,
    /// Frame height.
    pub height: u32,
    /// Frame rate.
    pub framerate: Framerate,
}

impl StreamGeometry {
    /// Create a geometry.
    pub fn new(width: u32, height: u32, framerate: Framerate) -> Self {
        Self {
            width,
            height,
            framerate,
        }
    }

    /// The capability descriptor for compositor links.
    pub fn descriptor(&self) -> Caps {
        negotiation::descriptor(self.width, self.height, self.framerate)
    }

    /// Distance between consecutive slots along the y axis.
    pub fn stride(&self) -> u32 {
        self.width
    }
}

impl Default for StreamGeometry {
    fn default() -> Self {
        Self::new(200, 150, Framerate::FPS_30)
    }
}

/// A pattern source linked to its own compositor slot at build time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticSource {
    /// Pattern number.
    pub pattern: u32,
    /// Frame width.
    pub width: u32,
    /// Frame height.
    pub height: u32,
    /// Frame rate.
    pub framerate: Framerate,
    /// Horizontal offset in the output.
    pub xpos: i32,
    /// Vertical offset in the output.
    pub ypos: i32,
    /// Stacking order.
    pub zorder: u32,
}

impl StaticSource {
    /// A static source of the given pattern and size, at the origin.
    pub fn new(pattern: u32, width: u32, height: u32) -> Self {
        Self {
            pattern,
            width,
            height,
            framerate: Framerate::FPS_10,
            xpos: 0,
            ypos: 0,
            zorder: 0,
        }
    }

    /// Set the position and stacking order.
    pub fn at(mut self, xpos: i32, ypos: i32, zorder: u32) -> Self {
        self.xpos = xpos;
        self.ypos = ypos;
        self.zorder = zorder;
        self
    }

    /// Set the frame rate.
    pub fn with_framerate(mut self, framerate: Framerate) -> Self {
        self.framerate = framerate;
        self
    }

    /// The capability descriptor of this source's link.
    pub fn descriptor(&self) -> Caps {
        negotiation::descriptor(self.width, self.height, self.framerate)
    }
}

/// Element types of one decode chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainConfig {
    /// Input buffering node.
    pub queue: String,
    /// Stream parser.
    pub parser: String,
    /// Decoder.
    pub decoder: String,
    /// Optional output buffering node.
    pub output_queue: Option<String>,
    /// Sink used in [`AttachMode::SeparateSinks`].
    pub sink: String,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            queue: "queue".to_string(),
            parser: "h264parse".to_string(),
            decoder: "avdec_h264".to_string(),
            output_queue: None,
            sink: "autovideosink".to_string(),
        }
    }
}

/// Configuration of a [`Player`](crate::pipeline::Player).
///
/// # Example
///
/// ```rust
/// use mosaic::pipeline::{AttachMode, PlayerConfig};
///
/// let config = PlayerConfig::file("cams.mkv")
///     .with_max_streams(3)
///     .with_mode(AttachMode::SeparateSinks);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerConfig {
    /// Graph name; also used as the DOT dump prefix.
    pub name: String,
    /// Entry node.
    pub source: SourceConfig,
    /// Demuxer type.
    pub demuxer: String,
    /// Extra demuxer properties.
    pub demuxer_properties: Properties,
    /// Decode chain element types.
    pub chain: ChainConfig,
    /// Compositor type.
    pub compositor: String,
    /// Extra compositor properties.
    pub compositor_properties: Properties,
    /// Final sink type behind the compositor.
    pub sink: String,
    /// Geometry every attached stream is constrained to.
    pub geometry: StreamGeometry,
    /// Streams beyond this many are dropped.
    pub max_streams: Option<usize>,
    /// Where streams are attached.
    pub mode: AttachMode,
    /// What to do when a chain cannot be linked.
    pub on_negotiation_failure: NegotiationFailurePolicy,
    /// Pattern sources linked at build time.
    pub static_sources: Vec<StaticSource>,
    /// Directory for DOT graph dumps.
    pub dot_dir: Option<PathBuf>,
}

impl PlayerConfig {
    /// Play a container file.
    pub fn file(location: impl Into<PathBuf>) -> Self {
        Self::with_source(SourceConfig::File {
            location: location.into(),
        })
    }

    /// Feed a test pattern into the demuxer.
    pub fn pattern(pattern: u32) -> Self {
        Self::with_source(SourceConfig::Pattern { pattern })
    }

    fn with_source(source: SourceConfig) -> Self {
        Self {
            name: "mosaic".to_string(),
            source,
            demuxer: "matroskademux".to_string(),
            demuxer_properties: Properties::new(),
            chain: ChainConfig::default(),
            compositor: "videomixer".to_string(),
            compositor_properties: Properties::new(),
            sink: "autovideosink".to_string(),
            geometry: StreamGeometry::default(),
            max_streams: None,
            mode: AttachMode::default(),
            on_negotiation_failure: NegotiationFailurePolicy::default(),
            static_sources: vec![],
            dot_dir: None,
        }
    }

    /// Set the graph name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the demuxer type.
    pub fn with_demuxer(mut self, type_name: impl Into<String>, properties: Properties) -> Self {
        self.demuxer = type_name.into();
        self.demuxer_properties = properties;
        self
    }

    /// Set the decode chain element types.
    pub fn with_chain(mut self, chain: ChainConfig) -> Self {
        self.chain = chain;
        self
    }

    /// Set the compositor type and properties.
    pub fn with_compositor(mut self, type_name: impl Into<String>, properties: Properties) -> Self {
        self.compositor = type_name.into();
        self.compositor_properties = properties;
        self
    }

    /// Set the sink type used behind the compositor and, in separate-sink
    /// mode, at the end of every chain.
    pub fn with_sink(mut self, type_name: impl Into<String>) -> Self {
        let type_name = type_name.into();
        self.chain.sink = type_name.clone();
        self.sink = type_name;
        self
    }

    /// Set the stream geometry.
    pub fn with_geometry(mut self, geometry: StreamGeometry) -> Self {
        self.geometry = geometry;
        self
    }

    /// Drop streams beyond `max`.
    pub fn with_max_streams(mut self, max: usize) -> Self {
        self.max_streams = Some(max);
        self
    }

    /// Set the attach mode.
    pub fn with_mode(mut self, mode: AttachMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the negotiation failure policy.
    pub fn with_policy(mut self, policy: NegotiationFailurePolicy) -> Self {
        self.on_negotiation_failure = policy;
        self
    }

    /// Add a pattern source linked at build time.
    pub fn with_static_source(mut self, source: StaticSource) -> Self {
        self.static_sources.push(source);
        self
    }

    /// Dump DOT snapshots into `dir`.
    pub fn with_dot_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dot_dir = Some(dir.into());
        self
    }

    /// Take the DOT dump directory from [`DOT_DIR_ENV`] if it is set and no
    /// directory was configured.
    pub fn with_dot_dir_from_env(mut self) -> Self {
        if self.dot_dir.is_none() {
            self.dot_dir = std::env::var_os(DOT_DIR_ENV)
                .filter(|dir| !dir.is_empty())
                .map(PathBuf::from);
        }
        self
    }

    /// Check the configuration before any graph is built.
    pub fn validate(&self) -> Result<()> {
        if let SourceConfig::File { location } = &self.source {
            if location.as_os_str().is_empty() {
                return Err(Error::Config("missing input location".to_string()));
            }
        }
        if self.geometry.width == 0 || self.geometry.height == 0 {
            return Err(Error::Config(format!(
                "stream geometry must be non-zero, got {}x{}",
                self.geometry.width, self.geometry.height
            )));
        }
        if self.geometry.framerate.num == 0 || self.geometry.framerate.den == 0 {
            return Err(Error::Config(format!(
                "invalid framerate {}",
                self.geometry.framerate
            )));
        }
        if self.mode == AttachMode::SeparateSinks && !self.static_sources.is_empty() {
            return Err(Error::Config(
                "static sources need a compositor; not available with separate sinks".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self::pattern(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PlayerConfig::file("in.mkv");
        assert_eq!(config.geometry, StreamGeometry::new(200, 150, Framerate::FPS_30));
        assert_eq!(config.geometry.stride(), 200);
        assert_eq!(config.max_streams, None);
        assert_eq!(config.mode, AttachMode::Compositor);
        assert_eq!(config.on_negotiation_failure, NegotiationFailurePolicy::RollBack);
        assert_eq!(config.source.type_name(), "filesrc");
        assert_eq!(
            config.source.properties().string("location").as_deref(),
            Some("in.mkv")
        );
    }

    #[test]
    fn test_validate() {
        assert!(PlayerConfig::file("").validate().is_err());
        assert!(PlayerConfig::pattern(18).validate().is_ok());

        let config = PlayerConfig::pattern(0)
            .with_mode(AttachMode::SeparateSinks)
            .with_static_source(StaticSource::new(1, 40, 80));
        assert!(config.validate().is_err());

        let config = PlayerConfig::pattern(0)
            .with_geometry(StreamGeometry::new(0, 150, Framerate::FPS_30));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_with_sink_sets_both() {
        let config = PlayerConfig::pattern(0).with_sink("fakesink");
        assert_eq!(config.sink, "fakesink");
        assert_eq!(config.chain.sink, "fakesink");
    }

    #[test]
    fn test_static_source_descriptor() {
        let source = StaticSource::new(1, 640, 360).at(200, 0, 1);
        let caps = source.descriptor();
        assert!(caps.video_format().unwrap().has_fixed_geometry());
        assert_eq!(source.zorder, 1);
        assert_eq!(source.framerate, Framerate::FPS_10);
    }

    #[test]
    fn test_explicit_dot_dir_wins_over_env() {
        let config = PlayerConfig::pattern(0)
            .with_dot_dir("/tmp/dots")
            .with_dot_dir_from_env();
        assert_eq!(config.dot_dir, Some(PathBuf::from("/tmp/dots")));
    }
}
