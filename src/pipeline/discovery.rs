//! Stream discovery notifications.
//!
//! Demuxers announce elementary streams from their own worker threads. The
//! announcements go into a queue that a dedicated attachment task drains,
//! so notification delivery never runs the attachment protocol itself.

use crate::element::Pad;
use crate::format::Caps;
use crate::pipeline::NodeId;
use kanal::{AsyncReceiver, Sender};
use std::fmt;

/// A discovery notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Discovery {
    /// A demuxer exposed a new output pad carrying one elementary stream.
    PadAdded {
        /// The demuxer node.
        node: NodeId,
        /// The newly exposed pad.
        pad: Pad,
        /// Caps of the elementary stream.
        caps: Caps,
    },
    /// The demuxer will not expose any further pads.
    NoMorePads {
        /// The demuxer node.
        node: NodeId,
    },
}

/// Posting side of the discovery queue. Cheap to clone, usable from any
/// thread.
#[derive(Clone)]
pub struct DiscoverySender {
    sender: Sender<Discovery>,
}

impl DiscoverySender {
    /// Queue a notification. Returns `false` once the queue is closed.
    pub fn send(&self, discovery: Discovery) -> bool {
        self.sender.send(discovery).is_ok()
    }

    /// Announce a new pad on `node`.
    pub fn pad_added(&self, node: NodeId, pad: Pad, caps: Caps) -> bool {
        self.send(Discovery::PadAdded { node, pad, caps })
    }

    /// Announce that `node` is done exposing pads.
    pub fn no_more_pads(&self, node: NodeId) -> bool {
        self.send(Discovery::NoMorePads { node })
    }

    /// Close the queue. Pending notifications are discarded.
    pub fn close(&self) {
        let _ = self.sender.close();
    }
}

impl fmt::Debug for DiscoverySender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiscoverySender")
            .field("pending", &self.sender.len())
            .finish()
    }
}

/// Create a discovery queue.
pub fn discovery_channel() -> (DiscoverySender, AsyncReceiver<Discovery>) {
    let (sender, receiver) = kanal::unbounded();
    (DiscoverySender { sender }, receiver.to_async())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::VideoCodec;

    #[tokio::test]
    async fn test_notifications_keep_order() {
        let (sender, receiver) = discovery_channel();
        let node = NodeId::from_raw(0, 0);

        let worker = {
            let sender = sender.clone();
            std::thread::spawn(move || {
                sender.pad_added(node, Pad::sometimes("video_0"), Caps::encoded(VideoCodec::H264));
                sender.pad_added(node, Pad::sometimes("video_1"), Caps::encoded(VideoCodec::H264));
                sender.no_more_pads(node);
            })
        };
        worker.join().unwrap();

        let mut names = vec![];
        for _ in 0..3 {
            match receiver.recv().await.unwrap() {
                Discovery::PadAdded { pad, .. } => names.push(pad.name().to_string()),
                Discovery::NoMorePads { .. } => names.push("done".to_string()),
            }
        }
        assert_eq!(names, vec!["video_0", "video_1", "done"]);
    }

    #[test]
    fn test_closed_queue_rejects() {
        let (sender, _receiver) = discovery_channel();
        sender.close();
        assert!(!sender.no_more_pads(NodeId::from_raw(0, 0)));
    }
}
