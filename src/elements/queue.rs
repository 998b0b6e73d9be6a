//! Queue element.

use crate::element::{Element, ElementKind};
use crate::error::Result;
use crate::format::Caps;
use crate::pipeline::Properties;

/// A buffering node between pipeline stages.
///
/// Passes caps through unchanged: whatever was negotiated on its input is
/// what it offers downstream.
///
/// # Example
///
/// ```rust
/// use mosaic::elements::Queue;
///
/// let queue = Queue::new().with_max_buffers(100);
/// assert_eq!(queue.max_buffers(), 100);
/// ```
#[derive(Debug, Clone)]
pub struct Queue {
    max_buffers: usize,
    caps: Option<Caps>,
}

impl Queue {
    /// Default maximum number of queued buffers.
    pub const DEFAULT_MAX_BUFFERS: usize = 200;

    /// Create a queue with the default limit.
    pub fn new() -> Self {
        Self {
            max_buffers: Self::DEFAULT_MAX_BUFFERS,
            caps: None,
        }
    }

    /// Create from properties (`max-size-buffers`).
    pub fn from_properties(props: &Properties) -> Result<Self> {
        let mut queue = Self::new();
        if let Some(max) = props.u64("max-size-buffers")? {
            queue = queue.with_max_buffers(max as usize);
        }
        Ok(queue)
    }

    /// Set the maximum number of queued buffers.
    pub fn with_max_buffers(mut self, max_buffers: usize) -> Self {
        self.max_buffers = max_buffers;
        self
    }

    /// Get the maximum number of queued buffers.
    pub fn max_buffers(&self) -> usize {
        self.max_buffers
    }
}

impl Default for Queue {
    fn default() -> Self {
        Self::new()
    }
}

impl Element for Queue {
    fn kind(&self) -> ElementKind {
        ElementKind::Queue
    }

    fn output_caps(&self, _pad: &str) -> Caps {
        self.caps.clone().unwrap_or_default()
    }

    fn set_input_caps(&mut self, _pad: &str, caps: &Caps) -> Result<()> {
        self.caps = Some(caps.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::VideoCodec;

    #[test]
    fn test_queue_passes_caps_through() {
        let mut queue = Queue::new();
        assert_eq!(queue.output_caps("src"), Caps::Any);

        queue
            .set_input_caps("sink", &Caps::encoded(VideoCodec::H264))
            .unwrap();
        assert_eq!(queue.output_caps("src"), Caps::encoded(VideoCodec::H264));
    }

    #[test]
    fn test_queue_properties() {
        let queue = Queue::from_properties(&Properties::new().with("max-size-buffers", 8u32)).unwrap();
        assert_eq!(queue.max_buffers(), 8);
    }
}
