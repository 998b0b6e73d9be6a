//! Media format and capabilities types.
//!
//! Capabilities ("caps") describe what an element can produce on an output
//! pad or accept on an input pad. Linking two pads intersects their caps;
//! a link made under an explicit descriptor additionally intersects with the
//! descriptor, which is how a decode chain is forced onto the geometry the
//! compositor expects.
//!
//! ```rust
//! use mosaic::format::{Caps, Framerate, VideoFormatCaps};
//!
//! let decoder_out = Caps::VideoRaw(VideoFormatCaps::any());
//! let descriptor = Caps::VideoRaw(
//!     VideoFormatCaps::any()
//!         .with_size(200, 150)
//!         .with_framerate(Framerate::FPS_30),
//! );
//!
//! let negotiated = decoder_out.intersect(&descriptor).unwrap();
//! assert!(negotiated.is_video_raw());
//! ```

use std::fmt;

// ============================================================================
// CapsValue - constraint value for negotiation
// ============================================================================

/// A value that can be fixed, a range, a list, or any.
///
/// ```rust
/// use mosaic::format::CapsValue;
///
/// let fixed: CapsValue<u32> = CapsValue::Fixed(200);
/// let range: CapsValue<u32> = CapsValue::Range { min: 16, max: 4096 };
/// assert_eq!(fixed.intersect(&range), Some(CapsValue::Fixed(200)));
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum CapsValue<T> {
    /// Exact value.
    Fixed(T),
    /// Inclusive range of acceptable values.
    Range {
        /// Minimum acceptable value.
        min: T,
        /// Maximum acceptable value.
        max: T,
    },
    /// Acceptable values, most preferred first.
    List(Vec<T>),
    /// Unconstrained.
    #[default]
    Any,
}

impl<T: Clone + Ord> CapsValue<T> {
    /// Check if a value is accepted by this constraint.
    pub fn accepts(&self, value: &T) -> bool {
        match self {
            Self::Fixed(v) => v == value,
            Self::Range { min, max } => value >= min && value <= max,
            Self::List(values) => values.contains(value),
            Self::Any => true,
        }
    }

    /// Intersect two constraints.
    ///
    /// Returns `None` if there is no common value.
    pub fn intersect(&self, other: &Self) -> Option<Self> {
        match (self, other) {
            (Self::Any, other) => Some(other.clone()),
            (this, Self::Any) => Some(this.clone()),
            (Self::Fixed(v), other) | (other, Self::Fixed(v)) => {
                other.accepts(v).then(|| Self::Fixed(v.clone()))
            }
            (Self::Range { min: a, max: b }, Self::Range { min: c, max: d }) => {
                let lo = a.max(c);
                let hi = b.min(d);
                match lo.cmp(hi) {
                    std::cmp::Ordering::Greater => None,
                    std::cmp::Ordering::Equal => Some(Self::Fixed(lo.clone())),
                    std::cmp::Ordering::Less => Some(Self::Range {
                        min: lo.clone(),
                        max: hi.clone(),
                    }),
                }
            }
            (Self::List(list), constraint) | (constraint, Self::List(list)) => {
                Self::from_candidates(list.iter().filter(|v| constraint.accepts(v)).cloned())
            }
        }
    }

    fn from_candidates(values: impl Iterator<Item = T>) -> Option<Self> {
        let mut values: Vec<T> = values.collect();
        match values.len() {
            0 => None,
            1 => values.pop().map(Self::Fixed),
            _ => Some(Self::List(values)),
        }
    }

    /// Choose a single value (first in list, min of range).
    ///
    /// Returns `None` for `Any`.
    pub fn fixate(&self) -> Option<T> {
        match self {
            Self::Fixed(v) => Some(v.clone()),
            Self::Range { min, .. } => Some(min.clone()),
            Self::List(values) => values.first().cloned(),
            Self::Any => None,
        }
    }

    /// Check if this is a fixed value.
    #[inline]
    pub fn is_fixed(&self) -> bool {
        matches!(self, Self::Fixed(_))
    }

    /// Get the fixed value if this is fixed.
    #[inline]
    pub fn as_fixed(&self) -> Option<&T> {
        match self {
            Self::Fixed(v) => Some(v),
            _ => None,
        }
    }
}

impl<T: Clone + Ord> From<T> for CapsValue<T> {
    fn from(value: T) -> Self {
        Self::Fixed(value)
    }
}

impl<T: fmt::Display> fmt::Display for CapsValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(v) => write!(f, "{v}"),
            Self::Range { min, max } => write!(f, "[{min}, {max}]"),
            Self::List(values) => {
                write!(f, "{{")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, "}}")
            }
            Self::Any => write!(f, "ANY"),
        }
    }
}

// ============================================================================
// Video formats
// ============================================================================

/// Pixel formats produced by the stock decoders.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub enum PixelFormat {
    /// YUV 4:2:0 planar.
    #[default]
    I420,
    /// YUV 4:2:0 semi-planar.
    Nv12,
    /// RGBA 8-bit per channel.
    Rgba,
    /// BGRA 8-bit per channel.
    Bgra,
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::I420 => "I420",
            Self::Nv12 => "NV12",
            Self::Rgba => "RGBA",
            Self::Bgra => "BGRA",
        };
        f.write_str(name)
    }
}

/// Encoded video codecs an elementary stream may carry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VideoCodec {
    /// H.264 / AVC.
    H264,
    /// H.265 / HEVC.
    H265,
}

impl fmt::Display for VideoCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::H264 => f.write_str("video/x-h264"),
            Self::H265 => f.write_str("video/x-h265"),
        }
    }
}

/// Frame rate as numerator/denominator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Framerate {
    /// Numerator (frames).
    pub num: u32,
    /// Denominator (seconds).
    pub den: u32,
}

impl Framerate {
    /// Create a new framerate.
    pub const fn new(num: u32, den: u32) -> Self {
        Self { num, den }
    }

    /// 10 fps.
    pub const FPS_10: Self = Self::new(10, 1);
    /// 30 fps.
    pub const FPS_30: Self = Self::new(30, 1);

    /// Frame duration in nanoseconds.
    #[inline]
    pub const fn frame_duration_ns(&self) -> u64 {
        if self.num == 0 {
            return 0;
        }
        (self.den as u64 * 1_000_000_000) / self.num as u64
    }
}

impl Default for Framerate {
    fn default() -> Self {
        Self::FPS_30
    }
}

impl PartialOrd for Framerate {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Framerate {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // a/b vs c/d => a*d vs c*b
        let lhs = self.num as u64 * other.den as u64;
        let rhs = other.num as u64 * self.den as u64;
        lhs.cmp(&rhs).then(self.den.cmp(&other.den))
    }
}

impl fmt::Display for Framerate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

/// A concrete raw video format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct VideoFormat {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Pixel layout.
    pub pixel_format: PixelFormat,
    /// Frame rate.
    pub framerate: Framerate,
}

/// Video format with per-field constraints.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct VideoFormatCaps {
    /// Width constraint.
    pub width: CapsValue<u32>,
    /// Height constraint.
    pub height: CapsValue<u32>,
    /// Pixel format constraint.
    pub pixel_format: CapsValue<PixelFormat>,
    /// Framerate constraint.
    pub framerate: CapsValue<Framerate>,
}

impl VideoFormatCaps {
    /// Accept any video format.
    pub fn any() -> Self {
        Self::default()
    }

    /// Caps that only accept `format`.
    pub fn fixed(format: VideoFormat) -> Self {
        Self {
            width: CapsValue::Fixed(format.width),
            height: CapsValue::Fixed(format.height),
            pixel_format: CapsValue::Fixed(format.pixel_format),
            framerate: CapsValue::Fixed(format.framerate),
        }
    }

    /// Constrain to an exact frame size.
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = CapsValue::Fixed(width);
        self.height = CapsValue::Fixed(height);
        self
    }

    /// Constrain to an exact framerate.
    pub fn with_framerate(mut self, framerate: Framerate) -> Self {
        self.framerate = CapsValue::Fixed(framerate);
        self
    }

    /// Constrain to an exact pixel format.
    pub fn with_pixel_format(mut self, pixel_format: PixelFormat) -> Self {
        self.pixel_format = CapsValue::Fixed(pixel_format);
        self
    }

    /// Intersect with another video caps.
    pub fn intersect(&self, other: &Self) -> Option<Self> {
        Some(Self {
            width: self.width.intersect(&other.width)?,
            height: self.height.intersect(&other.height)?,
            pixel_format: self.pixel_format.intersect(&other.pixel_format)?,
            framerate: self.framerate.intersect(&other.framerate)?,
        })
    }

    /// Whether geometry and framerate are pinned to single values.
    ///
    /// Pixel format is allowed to stay open.
    pub fn has_fixed_geometry(&self) -> bool {
        self.width.is_fixed() && self.height.is_fixed() && self.framerate.is_fixed()
    }

    /// Fixate to a concrete format, defaulting the pixel format.
    pub fn fixate(&self) -> Option<VideoFormat> {
        Some(VideoFormat {
            width: self.width.fixate()?,
            height: self.height.fixate()?,
            pixel_format: self.pixel_format.fixate().unwrap_or_default(),
            framerate: self.framerate.fixate()?,
        })
    }
}

impl From<VideoFormat> for VideoFormatCaps {
    fn from(format: VideoFormat) -> Self {
        Self::fixed(format)
    }
}

impl fmt::Display for VideoFormatCaps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "width={}, height={}, format={}, framerate={}",
            self.width, self.height, self.pixel_format, self.framerate
        )
    }
}

// ============================================================================
// Caps
// ============================================================================

/// Capabilities of a pad.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum Caps {
    /// Raw (decoded) video with constraints.
    VideoRaw(VideoFormatCaps),
    /// Encoded video. The geometry constraints describe the coded picture.
    Video {
        /// Codec of the elementary stream.
        codec: VideoCodec,
        /// Picture constraints.
        format: VideoFormatCaps,
    },
    /// Unparsed container bytes.
    Bytes,
    /// Anything.
    #[default]
    Any,
}

impl Caps {
    /// Raw video of any geometry.
    pub fn video_raw() -> Self {
        Self::VideoRaw(VideoFormatCaps::any())
    }

    /// Encoded video of any geometry.
    pub fn encoded(codec: VideoCodec) -> Self {
        Self::Video {
            codec,
            format: VideoFormatCaps::any(),
        }
    }

    /// Intersect with another caps.
    pub fn intersect(&self, other: &Self) -> Option<Self> {
        match (self, other) {
            (Self::Any, other) => Some(other.clone()),
            (this, Self::Any) => Some(this.clone()),
            (Self::VideoRaw(a), Self::VideoRaw(b)) => Some(Self::VideoRaw(a.intersect(b)?)),
            (
                Self::Video {
                    codec: a,
                    format: fa,
                },
                Self::Video {
                    codec: b,
                    format: fb,
                },
            ) if a == b => Some(Self::Video {
                codec: *a,
                format: fa.intersect(fb)?,
            }),
            (Self::Bytes, Self::Bytes) => Some(Self::Bytes),
            _ => None,
        }
    }

    /// Whether this caps describes raw video.
    pub fn is_video_raw(&self) -> bool {
        matches!(self, Self::VideoRaw(_))
    }

    /// The video constraints, if this caps carries any.
    pub fn video_format(&self) -> Option<&VideoFormatCaps> {
        match self {
            Self::VideoRaw(format) | Self::Video { format, .. } => Some(format),
            Self::Bytes | Self::Any => None,
        }
    }
}

impl fmt::Display for Caps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::VideoRaw(format) => write!(f, "video/x-raw, {format}"),
            Self::Video { codec, format } => write!(f, "{codec}, {format}"),
            Self::Bytes => f.write_str("application/octet-stream"),
            Self::Any => f.write_str("ANY"),
        }
    }
}
