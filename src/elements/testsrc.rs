//! Test pattern video source.

use crate::element::{Element, ElementKind};
use crate::error::Result;
use crate::format::{Caps, Framerate, VideoFormatCaps};
use crate::pipeline::Properties;

/// A source producing a synthetic raw video pattern.
///
/// Width, height and framerate are left open unless set, so the source
/// takes whatever geometry a filtered link asks for.
///
/// # Example
///
/// ```rust
/// use mosaic::elements::VideoTestSrc;
/// use mosaic::element::Element;
///
/// let src = VideoTestSrc::new(18).with_size(640, 360);
/// assert_eq!(src.pattern(), 18);
/// assert!(src.output_caps("src").is_video_raw());
/// ```
#[derive(Debug, Clone, Default)]
pub struct VideoTestSrc {
    pattern: u32,
    format: VideoFormatCaps,
}

impl VideoTestSrc {
    /// Create a source for the given pattern number.
    pub fn new(pattern: u32) -> Self {
        Self {
            pattern,
            format: VideoFormatCaps::any(),
        }
    }

    /// Create from properties (`pattern`, `width`, `height`, `framerate`).
    pub fn from_properties(props: &Properties) -> Result<Self> {
        let mut src = Self::new(props.u32("pattern")?.unwrap_or(0));
        if let (Some(width), Some(height)) = (props.u32("width")?, props.u32("height")?) {
            src = src.with_size(width, height);
        }
        if let Some(fps) = props.u32("framerate")? {
            src = src.with_framerate(Framerate::new(fps, 1));
        }
        Ok(src)
    }

    /// Pin the output frame size.
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.format = self.format.with_size(width, height);
        self
    }

    /// Pin the output framerate.
    pub fn with_framerate(mut self, framerate: Framerate) -> Self {
        self.format = self.format.with_framerate(framerate);
        self
    }

    /// Get the pattern number.
    pub fn pattern(&self) -> u32 {
        self.pattern
    }
}

impl Element for VideoTestSrc {
    fn kind(&self) -> ElementKind {
        ElementKind::Source
    }

    fn output_caps(&self, _pad: &str) -> Caps {
        Caps::VideoRaw(self.format.clone())
    }
}
