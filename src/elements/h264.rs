//! H.264 parser and decoder stand-ins.
//!
//! Neither touches media. They exist so a decode chain has the right shape
//! and the right caps: the parser accepts and forwards H.264, the decoder
//! turns H.264 of some geometry into raw video of the same geometry.

use crate::element::{Element, ElementKind};
use crate::error::{Error, Result};
use crate::format::{Caps, PixelFormat, VideoCodec};

/// H.264 elementary stream parser.
#[derive(Debug, Clone, Default)]
pub struct H264Parse {
    caps: Option<Caps>,
}

impl H264Parse {
    /// Create a new parser.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Element for H264Parse {
    fn kind(&self) -> ElementKind {
        ElementKind::Parser
    }

    fn input_caps(&self, _pad: &str) -> Caps {
        Caps::encoded(VideoCodec::H264)
    }

    fn output_caps(&self, _pad: &str) -> Caps {
        self.caps
            .clone()
            .unwrap_or_else(|| Caps::encoded(VideoCodec::H264))
    }

    fn set_input_caps(&mut self, _pad: &str, caps: &Caps) -> Result<()> {
        self.caps = Some(caps.clone());
        Ok(())
    }
}

/// H.264 decoder producing I420 frames at the stream's native geometry.
#[derive(Debug, Clone, Default)]
pub struct AvDecH264 {
    caps: Option<Caps>,
}

impl AvDecH264 {
    /// Create a new decoder.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Element for AvDecH264 {
    fn kind(&self) -> ElementKind {
        ElementKind::Decoder
    }

    fn input_caps(&self, _pad: &str) -> Caps {
        Caps::encoded(VideoCodec::H264)
    }

    fn output_caps(&self, _pad: &str) -> Caps {
        match &self.caps {
            Some(Caps::Video { format, .. }) => {
                Caps::VideoRaw(format.clone().with_pixel_format(PixelFormat::I420))
            }
            _ => Caps::video_raw(),
        }
    }

    fn set_input_caps(&mut self, _pad: &str, caps: &Caps) -> Result<()> {
        match caps {
            Caps::Video {
                codec: VideoCodec::H264,
                ..
            } => {
                self.caps = Some(caps.clone());
                Ok(())
            }
            other => Err(Error::Config(format!("avdec_h264 cannot decode {other}"))),
        }
    }
}
