//! File source element.

use crate::element::{Element, ElementContext, ElementKind, ElementState, StateChange};
use crate::error::{Error, Result};
use crate::format::Caps;
use crate::pipeline::Properties;
use std::fs::File;
use std::path::{Path, PathBuf};

/// A source element that reads container bytes from a file.
///
/// The file is opened on the `Null -> Ready` transition, so a missing or
/// unreadable file makes the graph fail to start rather than failing at
/// construction.
///
/// # Example
///
/// ```rust
/// use mosaic::elements::FileSrc;
///
/// let src = FileSrc::new("input.mkv");
/// assert!(!src.is_open());
/// ```
pub struct FileSrc {
    location: PathBuf,
    file: Option<File>,
}

impl FileSrc {
    /// Create a new FileSrc that will read from the given path.
    pub fn new<P: AsRef<Path>>(location: P) -> Self {
        Self {
            location: location.as_ref().to_path_buf(),
            file: None,
        }
    }

    /// Create from properties. `location` is required.
    pub fn from_properties(props: &Properties) -> Result<Self> {
        let location = props
            .string("location")
            .ok_or_else(|| Error::Config("filesrc requires 'location' property".to_string()))?;
        Ok(Self::new(location))
    }

    /// Get the file path.
    pub fn location(&self) -> &Path {
        &self.location
    }

    /// Whether the file is currently open.
    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }
}

impl Element for FileSrc {
    fn kind(&self) -> ElementKind {
        ElementKind::Source
    }

    fn output_caps(&self, _pad: &str) -> Caps {
        Caps::Bytes
    }

    fn change_state(&mut self, change: StateChange, ctx: &ElementContext) -> Result<()> {
        match (change.from, change.to) {
            (ElementState::Null, ElementState::Ready) => {
                let file = File::open(&self.location).map_err(|err| {
                    Error::Config(format!(
                        "could not open '{}' for reading: {err}",
                        self.location.display()
                    ))
                })?;
                tracing::debug!(
                    element = %ctx.name(),
                    location = %self.location.display(),
                    "file opened"
                );
                self.file = Some(file);
            }
            (ElementState::Ready, ElementState::Null) => {
                self.file = None;
            }
            _ => {}
        }
        Ok(())
    }
}
