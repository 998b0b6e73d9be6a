//! Stock elements.
//!
//! These are stand-ins for the nodes a media library would supply. They do
//! not process media; they implement the control-plane behavior the graph
//! relies on (pads, caps, slot placement, state transitions, asynchronous
//! stream discovery).
//!
//! | Type name | Element |
//! |-----------|---------|
//! | `filesrc` | [`FileSrc`] |
//! | `videotestsrc` | [`VideoTestSrc`] |
//! | `matroskademux`, `streamdemux` | [`StreamDemux`] |
//! | `queue` | [`Queue`] |
//! | `h264parse` | [`H264Parse`] |
//! | `avdec_h264` | [`AvDecH264`] |
//! | `videomixer`, `compositor` | [`Compositor`] |
//! | `autovideosink`, `fakesink` | [`VideoSink`] |

mod compositor;
mod file;
mod h264;
mod queue;
mod sink;
mod streamdemux;
mod testsrc;

pub use compositor::Compositor;
pub use file::FileSrc;
pub use h264::{AvDecH264, H264Parse};
pub use queue::Queue;
pub use sink::VideoSink;
pub use streamdemux::{DEFAULT_STREAM_HEIGHT, DEFAULT_STREAM_WIDTH, StreamDemux, StreamSpec};
pub use testsrc::VideoTestSrc;
