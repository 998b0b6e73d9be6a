//! Element factory: creates elements by type name.

use crate::element::Element;
use crate::elements::{
    AvDecH264, Compositor, FileSrc, H264Parse, Queue, StreamDemux, VideoSink, VideoTestSrc,
};
use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// A property value handed to element constructors.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    /// A string value.
    String(String),
    /// An integer value.
    Integer(i64),
    /// A floating-point value.
    Float(f64),
    /// A boolean value.
    Bool(bool),
}

impl PropertyValue {
    /// Get as a string, converting if necessary.
    pub fn as_string(&self) -> String {
        match self {
            PropertyValue::String(s) => s.clone(),
            PropertyValue::Integer(i) => i.to_string(),
            PropertyValue::Float(f) => f.to_string(),
            PropertyValue::Bool(b) => b.to_string(),
        }
    }

    /// Try to get as an integer.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            PropertyValue::Integer(i) => Some(*i),
            PropertyValue::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Try to get as a u64.
    pub fn as_u64(&self) -> Option<u64> {
        self.as_i64().and_then(|i| u64::try_from(i).ok())
    }

    /// Try to get as a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Bool(b) => Some(*b),
            PropertyValue::Integer(i) => Some(*i != 0),
            PropertyValue::String(s) => match s.as_str() {
                "true" | "yes" | "1" => Some(true),
                "false" | "no" | "0" => Some(false),
                _ => None,
            },
            PropertyValue::Float(_) => None,
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<u32> for PropertyValue {
    fn from(value: u32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Construction properties of an element.
///
/// The factory always sets `name` to the node's unique name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Properties {
    values: BTreeMap<String, PropertyValue>,
}

impl Properties {
    /// Create an empty property set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter.
    pub fn with(mut self, key: &str, value: impl Into<PropertyValue>) -> Self {
        self.set(key, value);
        self
    }

    /// Set a property.
    pub fn set(&mut self, key: &str, value: impl Into<PropertyValue>) {
        self.values.insert(key.to_string(), value.into());
    }

    /// Get a raw property.
    pub fn get(&self, key: &str) -> Option<&PropertyValue> {
        self.values.get(key)
    }

    /// Get a property as a string.
    pub fn string(&self, key: &str) -> Option<String> {
        self.get(key).map(PropertyValue::as_string)
    }

    /// Get a property as an unsigned integer.
    ///
    /// Fails if the property is present but not a non-negative integer.
    pub fn u64(&self, key: &str) -> Result<Option<u64>> {
        match self.get(key) {
            None => Ok(None),
            Some(value) => value.as_u64().map(Some).ok_or_else(|| {
                Error::Config(format!("property '{key}' expects an unsigned integer, got {value:?}"))
            }),
        }
    }

    /// Get a property as a `u32`.
    pub fn u32(&self, key: &str) -> Result<Option<u32>> {
        match self.u64(key)? {
            None => Ok(None),
            Some(value) => u32::try_from(value)
                .map(Some)
                .map_err(|_| Error::Config(format!("property '{key}' out of range: {value}"))),
        }
    }

    /// Get a property as a boolean.
    pub fn bool(&self, key: &str) -> Result<Option<bool>> {
        match self.get(key) {
            None => Ok(None),
            Some(value) => value.as_bool().map(Some).ok_or_else(|| {
                Error::Config(format!("property '{key}' expects a boolean, got {value:?}"))
            }),
        }
    }

    /// The element's unique name, if set.
    pub fn name(&self) -> Option<String> {
        self.string("name")
    }

    /// Iterate over all properties.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Type alias for element constructor functions.
pub type ElementConstructor = Arc<dyn Fn(&Properties) -> Result<Box<dyn Element>> + Send + Sync>;

/// Registry of element constructors.
#[derive(Clone)]
pub struct ElementFactory {
    constructors: BTreeMap<String, ElementConstructor>,
}

impl ElementFactory {
    /// Create a new factory with the stock elements registered.
    pub fn new() -> Self {
        let mut factory = Self::empty();

        // Sources
        factory.register("filesrc", |props| Ok(Box::new(FileSrc::from_properties(props)?)));
        factory.register("videotestsrc", |props| {
            Ok(Box::new(VideoTestSrc::from_properties(props)?))
        });

        // Demuxers
        factory.register("matroskademux", |props| {
            Ok(Box::new(StreamDemux::from_properties(props)?))
        });
        factory.register("streamdemux", |props| {
            Ok(Box::new(StreamDemux::from_properties(props)?))
        });

        // Decode chain
        factory.register("queue", |props| Ok(Box::new(Queue::from_properties(props)?)));
        factory.register("h264parse", |_| Ok(Box::new(H264Parse::new())));
        factory.register("avdec_h264", |_| Ok(Box::new(AvDecH264::new())));

        // Fan-in
        factory.register("videomixer", |props| {
            Ok(Box::new(Compositor::from_properties(props)?))
        });
        factory.register("compositor", |props| {
            Ok(Box::new(Compositor::from_properties(props)?))
        });

        // Sinks
        factory.register("autovideosink", |props| {
            Ok(Box::new(VideoSink::from_properties(props)?))
        });
        factory.register("fakesink", |props| {
            Ok(Box::new(VideoSink::from_properties(props)?.accept_anything()))
        });

        factory
    }

    /// Create a factory with nothing registered.
    pub fn empty() -> Self {
        Self {
            constructors: BTreeMap::new(),
        }
    }

    /// Register (or replace) an element constructor.
    pub fn register<F>(&mut self, type_name: &str, constructor: F)
    where
        F: Fn(&Properties) -> Result<Box<dyn Element>> + Send + Sync + 'static,
    {
        self.constructors
            .insert(type_name.to_string(), Arc::new(constructor));
    }

    /// Create an element with default properties.
    pub fn create(&self, type_name: &str, name: &str) -> Result<Box<dyn Element>> {
        self.create_with(type_name, name, &Properties::new())
    }

    /// Create an element with the given properties.
    ///
    /// Every failure is reported as [`Error::Construction`].
    pub fn create_with(
        &self,
        type_name: &str,
        name: &str,
        properties: &Properties,
    ) -> Result<Box<dyn Element>> {
        let constructor = self
            .constructors
            .get(type_name)
            .ok_or_else(|| Error::Construction {
                type_name: type_name.to_string(),
                name: name.to_string(),
                reason: "no such element type".to_string(),
            })?;

        let properties = properties.clone().with("name", name);
        constructor(&properties).map_err(|err| match err {
            Error::Construction { .. } => err,
            other => Error::Construction {
                type_name: type_name.to_string(),
                name: name.to_string(),
                reason: other.to_string(),
            },
        })
    }

    /// Check if an element type is registered.
    pub fn is_registered(&self, type_name: &str) -> bool {
        self.constructors.contains_key(type_name)
    }

    /// List all available element type names, sorted.
    pub fn list_elements(&self) -> Vec<String> {
        self.constructors.keys().cloned().collect()
    }
}

impl Default for ElementFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ElementFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementFactory")
            .field("elements", &self.list_elements())
            .finish()
    }
}
