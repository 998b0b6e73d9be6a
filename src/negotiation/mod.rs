//! Caps negotiation for links.
//!
//! Negotiation here is link-by-link: when two pads are connected, the
//! upstream output caps are intersected with the downstream input caps and,
//! for filtered links, with an explicit capability descriptor. The result
//! is stored on the link and handed to the downstream element. A link that
//! has been established is never renegotiated.
//!
//! ```text
//!   producer.output_caps(pad)
//!            ∩ descriptor           (filtered links only)
//!            ∩ consumer.input_caps(pad)
//!            = negotiated caps      (or NoCommonFormat)
//! ```
//!
//! # Example
//!
//! ```rust
//! use mosaic::format::{Caps, Framerate};
//! use mosaic::negotiation::{descriptor, negotiate};
//!
//! let wanted = descriptor(200, 150, Framerate::FPS_30);
//! let caps = negotiate("decoder", &Caps::video_raw(), "mixer", &Caps::Any, Some(&wanted)).unwrap();
//! assert_eq!(caps, wanted);
//! ```

mod error;

pub use error::NegotiationError;

use crate::format::{Caps, Framerate, VideoFormatCaps};
use crate::pipeline::{Graph, PadRef};

/// Build the fixed geometry descriptor used for compositor inputs.
///
/// Width, height and framerate are pinned; the pixel format is left open.
pub fn descriptor(width: u32, height: u32, framerate: Framerate) -> Caps {
    Caps::VideoRaw(
        VideoFormatCaps::any()
            .with_size(width, height)
            .with_framerate(framerate),
    )
}

/// Intersect what `upstream` produces with what `downstream` accepts.
///
/// When `filter` is given, the result is further restricted to it.
pub fn negotiate(
    upstream: &str,
    produced: &Caps,
    downstream: &str,
    accepted: &Caps,
    filter: Option<&Caps>,
) -> Result<Caps, NegotiationError> {
    let caps = produced.intersect(accepted).ok_or_else(|| {
        NegotiationError::no_common_format(
            upstream,
            downstream,
            &produced.to_string(),
            &accepted.to_string(),
        )
    })?;

    match filter {
        None => Ok(caps),
        Some(filter) => caps.intersect(filter).ok_or_else(|| {
            NegotiationError::no_common_format(
                upstream,
                downstream,
                &produced.to_string(),
                &filter.to_string(),
            )
        }),
    }
}

/// Link `producer` to `consumer`, constrained to `descriptor`.
///
/// The descriptor must pin width, height and framerate. The producer must
/// already be able to emit data matching it, otherwise no link is created
/// and a [`NegotiationError`] is returned. Returns the negotiated caps.
pub fn link_filtered(
    graph: &mut Graph,
    producer: &PadRef,
    consumer: &PadRef,
    descriptor: &Caps,
) -> crate::Result<Caps> {
    let fixed = descriptor
        .video_format()
        .is_some_and(VideoFormatCaps::has_fixed_geometry);
    if !fixed {
        return Err(NegotiationError::NotFixed {
            upstream: graph.node_name(producer.node).unwrap_or_default(),
            downstream: graph.node_name(consumer.node).unwrap_or_default(),
            caps: descriptor.to_string(),
        }
        .into());
    }

    let caps = graph.link_pads(
        producer.node,
        &producer.pad,
        consumer.node,
        &consumer.pad,
        Some(descriptor),
    )?;
    tracing::debug!(
        producer = %producer,
        consumer = %consumer,
        caps = %caps,
        "filtered link established"
    );
    Ok(caps)
}
