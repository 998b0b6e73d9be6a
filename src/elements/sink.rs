//! Video sink elements.

use crate::element::{Element, ElementKind};
use crate::error::Result;
use crate::format::Caps;
use crate::pipeline::Properties;

/// Final consumer of a frame stream.
///
/// `autovideosink` accepts raw video only; `fakesink` accepts anything.
#[derive(Debug, Clone)]
pub struct VideoSink {
    accepts: Caps,
    sync: bool,
}

impl VideoSink {
    /// Create a sink accepting raw video.
    pub fn new() -> Self {
        Self {
            accepts: Caps::video_raw(),
            sync: true,
        }
    }

    /// Create from properties (`sync`).
    pub fn from_properties(props: &Properties) -> Result<Self> {
        let mut sink = Self::new();
        if let Some(sync) = props.bool("sync")? {
            sink.sync = sync;
        }
        Ok(sink)
    }

    /// Accept any caps.
    pub fn accept_anything(mut self) -> Self {
        self.accepts = Caps::Any;
        self
    }

    /// Whether rendering is synchronized to the clock.
    pub fn sync(&self) -> bool {
        self.sync
    }
}

impl Default for VideoSink {
    fn default() -> Self {
        Self::new()
    }
}

impl Element for VideoSink {
    fn kind(&self) -> ElementKind {
        ElementKind::Sink
    }

    fn input_caps(&self, _pad: &str) -> Caps {
        self.accepts.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::VideoCodec;

    #[test]
    fn test_video_sink_caps() {
        let sink = VideoSink::new();
        assert!(sink.input_caps("sink").is_video_raw());
        assert!(sink.sync());

        let fake = VideoSink::from_properties(&Properties::new().with("sync", false))
            .unwrap()
            .accept_anything();
        assert!(!fake.sync());
        assert!(fake
            .input_caps("sink")
            .intersect(&Caps::encoded(VideoCodec::H264))
            .is_some());
    }
}
