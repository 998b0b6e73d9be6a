//! Stand-in container demuxer.
//!
//! [`StreamDemux`] behaves like a container demuxer from the graph's point
//! of view: it exposes no output pads until it is playing, then announces
//! its elementary streams one by one from its own worker thread, followed by
//! an optional "no more pads" notification and an optional end-of-stream.

use crate::element::{
    Element, ElementContext, ElementKind, ElementState, Pad, PadTemplate, StateChange,
};
use crate::error::{Error, Result};
use crate::format::{Caps, Framerate, VideoCodec, VideoFormatCaps};
use crate::pipeline::Properties;
use kanal::{ReceiveErrorTimeout, Receiver, Sender, bounded};
use std::thread;
use std::time::Duration;

/// Default stream width, matching the compositor slot stride.
pub const DEFAULT_STREAM_WIDTH: u32 = 200;
/// Default stream height.
pub const DEFAULT_STREAM_HEIGHT: u32 = 150;

/// One elementary stream inside the container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSpec {
    /// Codec of the stream.
    pub codec: VideoCodec,
    /// Coded picture width.
    pub width: u32,
    /// Coded picture height.
    pub height: u32,
    /// Stream framerate.
    pub framerate: Framerate,
}

impl StreamSpec {
    /// An H.264 stream with the given geometry.
    pub fn h264(width: u32, height: u32, framerate: Framerate) -> Self {
        Self {
            codec: VideoCodec::H264,
            width,
            height,
            framerate,
        }
    }

    /// Caps announced for this stream.
    pub fn caps(&self) -> Caps {
        Caps::Video {
            codec: self.codec,
            format: VideoFormatCaps::any()
                .with_size(self.width, self.height)
                .with_framerate(self.framerate),
        }
    }
}

impl Default for StreamSpec {
    fn default() -> Self {
        Self::h264(DEFAULT_STREAM_WIDTH, DEFAULT_STREAM_HEIGHT, Framerate::FPS_30)
    }
}

/// Demuxer that discovers its streams only once playing.
pub struct StreamDemux {
    streams: Vec<StreamSpec>,
    template: PadTemplate,
    interval: Duration,
    eos_after: Option<Duration>,
    no_more_pads: bool,
    announced: bool,
    worker: Option<(Sender<()>, thread::JoinHandle<()>)>,
}

impl StreamDemux {
    /// Create a demuxer exposing `streams`.
    pub fn new(streams: Vec<StreamSpec>) -> Self {
        Self {
            streams,
            template: PadTemplate::sometimes_output("video_%u"),
            interval: Duration::ZERO,
            eos_after: None,
            no_more_pads: true,
            announced: false,
            worker: None,
        }
    }

    /// Create a demuxer exposing `count` identical default streams.
    pub fn uniform(count: usize) -> Self {
        Self::new(vec![StreamSpec::default(); count])
    }

    /// Create from properties.
    ///
    /// - `streams`: number of streams (default 1, or the number of `sizes`)
    /// - `width`, `height`, `framerate`: default stream geometry
    /// - `sizes`: per-stream `WxH` list, e.g. `200x150,640x360`
    /// - `interval-ms`: delay before each announcement
    /// - `eos-after-ms`: post end-of-stream this long after the last one
    /// - `no-more-pads`: whether to signal the end of discovery (default true)
    pub fn from_properties(props: &Properties) -> Result<Self> {
        let width = props.u32("width")?.unwrap_or(DEFAULT_STREAM_WIDTH);
        let height = props.u32("height")?.unwrap_or(DEFAULT_STREAM_HEIGHT);
        let framerate = Framerate::new(props.u32("framerate")?.unwrap_or(30), 1);

        let sizes = match props.string("sizes") {
            Some(list) => parse_sizes(&list)?,
            None => vec![],
        };
        let count = match props.u64("streams")? {
            Some(count) => count as usize,
            None if !sizes.is_empty() => sizes.len(),
            None => 1,
        };

        let streams = (0..count)
            .map(|i| {
                let (w, h) = sizes.get(i).copied().unwrap_or((width, height));
                StreamSpec::h264(w, h, framerate)
            })
            .collect();

        let mut demux = Self::new(streams);
        if let Some(ms) = props.u64("interval-ms")? {
            demux = demux.with_interval(Duration::from_millis(ms));
        }
        if let Some(ms) = props.u64("eos-after-ms")? {
            demux = demux.with_eos_after(Duration::from_millis(ms));
        }
        if props.bool("no-more-pads")? == Some(false) {
            demux.no_more_pads = false;
        }
        Ok(demux)
    }

    /// Wait this long before each announcement.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Post end-of-stream this long after the last announcement.
    pub fn with_eos_after(mut self, delay: Duration) -> Self {
        self.eos_after = Some(delay);
        self
    }

    /// Streams this demuxer will expose.
    pub fn streams(&self) -> &[StreamSpec] {
        &self.streams
    }

    fn stream_for_pad(&self, pad: &str) -> Option<&StreamSpec> {
        let index: usize = pad.strip_prefix("video_")?.parse().ok()?;
        self.streams.get(index)
    }

    fn start_worker(&mut self, ctx: &ElementContext) {
        let (shutdown_tx, shutdown_rx) = bounded::<()>(1);
        let ctx = ctx.clone();
        let streams = self.streams.clone();
        let template = self.template.clone();
        let interval = self.interval;
        let eos_after = self.eos_after;
        let no_more_pads = self.no_more_pads;

        let handle = thread::spawn(move || {
            for (index, spec) in streams.iter().enumerate() {
                if !wait(&shutdown_rx, interval) {
                    return;
                }
                let pad = Pad::sometimes(template.instantiate(index));
                tracing::debug!(element = %ctx.name(), pad = %pad, caps = %spec.caps(), "exposing stream");
                if !ctx.announce_stream(pad, spec.caps()) {
                    return;
                }
            }
            if no_more_pads {
                ctx.no_more_streams();
            }
            if let Some(delay) = eos_after {
                if wait(&shutdown_rx, delay) {
                    ctx.post_eos();
                }
            }
        });
        self.worker = Some((shutdown_tx, handle));
    }

    fn stop_worker(&mut self) {
        if let Some((shutdown, handle)) = self.worker.take() {
            drop(shutdown);
            if handle.join().is_err() {
                tracing::warn!("demux worker thread panicked");
            }
        }
    }
}

/// Sleep for `duration` unless shut down first. Returns `false` on shutdown.
fn wait(shutdown: &Receiver<()>, duration: Duration) -> bool {
    if duration.is_zero() {
        return matches!(shutdown.try_recv(), Ok(None));
    }
    matches!(
        shutdown.recv_timeout(duration),
        Err(ReceiveErrorTimeout::Timeout)
    )
}

fn parse_sizes(list: &str) -> Result<Vec<(u32, u32)>> {
    list.split(',')
        .map(|item| {
            let (w, h) = item
                .trim()
                .split_once('x')
                .ok_or_else(|| Error::Config(format!("invalid stream size '{item}'")))?;
            let parse = |v: &str| {
                v.parse::<u32>()
                    .map_err(|_| Error::Config(format!("invalid stream size '{item}'")))
            };
            Ok((parse(w)?, parse(h)?))
        })
        .collect()
}

impl Element for StreamDemux {
    fn kind(&self) -> ElementKind {
        ElementKind::Demuxer
    }

    fn output_caps(&self, pad: &str) -> Caps {
        self.stream_for_pad(pad)
            .map(StreamSpec::caps)
            .unwrap_or(Caps::Any)
    }

    fn change_state(&mut self, change: StateChange, ctx: &ElementContext) -> Result<()> {
        match (change.from, change.to) {
            (ElementState::Paused, ElementState::Playing) if !self.announced => {
                self.announced = true;
                self.start_worker(ctx);
            }
            (ElementState::Paused, ElementState::Ready) => self.stop_worker(),
            _ => {}
        }
        Ok(())
    }
}

impl Drop for StreamDemux {
    fn drop(&mut self) {
        self.stop_worker();
    }
}
