//! Compositor (video mixer) element.

use crate::element::{Element, ElementKind, Pad, PadTemplate, SlotPlacement};
use crate::error::{Error, Result};
use crate::format::{Caps, VideoFormatCaps};
use crate::pipeline::Properties;
use std::collections::BTreeMap;

/// Fan-in node merging several raw video streams into one.
///
/// Inputs are request pads named `sink_%u`. Each input carries layout
/// metadata (x/y position and z-order). An optional slot limit makes
/// further pad requests fail with [`Error::SlotExhausted`].
///
/// # Example
///
/// ```rust
/// use mosaic::elements::Compositor;
/// use mosaic::element::{Element, SlotPlacement};
///
/// let mut mixer = Compositor::new("mixer").with_max_slots(1);
/// let pad = mixer.request_pad().unwrap();
/// assert_eq!(pad.name(), "sink_0");
/// mixer.set_placement("sink_0", SlotPlacement { xpos: 0, ypos: 0, zorder: 0 }).unwrap();
/// assert!(mixer.request_pad().is_err());
/// ```
#[derive(Debug, Clone)]
pub struct Compositor {
    name: String,
    template: PadTemplate,
    next_pad: usize,
    max_slots: Option<usize>,
    slots: BTreeMap<String, SlotPlacement>,
}

impl Compositor {
    /// Create a compositor without a slot limit.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            template: PadTemplate::request_input("sink_%u"),
            next_pad: 0,
            max_slots: None,
            slots: BTreeMap::new(),
        }
    }

    /// Create from properties (`name`, `max-slots`).
    pub fn from_properties(props: &Properties) -> Result<Self> {
        let mut mixer = Self::new(props.name().unwrap_or_else(|| "compositor".to_string()));
        if let Some(max) = props.u64("max-slots")? {
            mixer = mixer.with_max_slots(max as usize);
        }
        Ok(mixer)
    }

    /// Limit the number of simultaneously requested inputs.
    pub fn with_max_slots(mut self, max_slots: usize) -> Self {
        self.max_slots = Some(max_slots);
        self
    }

    /// Number of inputs currently requested.
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// All inputs and their placements, by pad name.
    pub fn slots(&self) -> impl Iterator<Item = (&str, &SlotPlacement)> {
        self.slots.iter().map(|(pad, placement)| (pad.as_str(), placement))
    }
}

impl Element for Compositor {
    fn kind(&self) -> ElementKind {
        ElementKind::Compositor
    }

    fn input_caps(&self, _pad: &str) -> Caps {
        Caps::video_raw()
    }

    fn output_caps(&self, _pad: &str) -> Caps {
        Caps::VideoRaw(VideoFormatCaps::any())
    }

    fn request_pad(&mut self) -> Result<Pad> {
        if let Some(limit) = self.max_slots {
            if self.slots.len() >= limit {
                return Err(Error::SlotExhausted {
                    compositor: self.name.clone(),
                    limit,
                });
            }
        }
        let name = self.template.instantiate(self.next_pad);
        self.next_pad += 1;
        self.slots.insert(name.clone(), SlotPlacement::default());
        Ok(Pad::requested(name))
    }

    fn release_pad(&mut self, pad: &str) {
        self.slots.remove(pad);
    }

    fn set_placement(&mut self, pad: &str, placement: SlotPlacement) -> Result<()> {
        match self.slots.get_mut(pad) {
            Some(slot) => {
                *slot = placement;
                Ok(())
            }
            None => Err(Error::Config(format!(
                "{} has no requested pad '{pad}'",
                self.name
            ))),
        }
    }

    fn placement(&self, pad: &str) -> Option<SlotPlacement> {
        self.slots.get(pad).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pads_are_numbered_in_order() {
        let mut mixer = Compositor::new("mixer");
        let names: Vec<_> = (0..3)
            .map(|_| mixer.request_pad().unwrap().name().to_string())
            .collect();
        assert_eq!(names, vec!["sink_0", "sink_1", "sink_2"]);
        assert_eq!(mixer.slot_count(), 3);
    }

    #[test]
    fn test_slot_limit() {
        let mut mixer = Compositor::from_properties(
            &Properties::new().with("name", "mix").with("max-slots", 2u32),
        )
        .unwrap();
        mixer.request_pad().unwrap();
        mixer.request_pad().unwrap();
        let err = mixer.request_pad().unwrap_err();
        assert!(matches!(err, Error::SlotExhausted { ref compositor, limit: 2 } if compositor == "mix"));

        // Releasing frees a slot; pad names are never reused.
        mixer.release_pad("sink_0");
        assert_eq!(mixer.request_pad().unwrap().name(), "sink_2");
    }

    #[test]
    fn test_placement() {
        let mut mixer = Compositor::new("mixer");
        mixer.request_pad().unwrap();
        let placement = SlotPlacement {
            xpos: 0,
            ypos: 200,
            zorder: 1,
        };
        mixer.set_placement("sink_0", placement).unwrap();
        assert_eq!(mixer.placement("sink_0"), Some(placement));
        assert!(mixer.set_placement("sink_5", placement).is_err());
        assert_eq!(mixer.slots().count(), 1);
    }
}
