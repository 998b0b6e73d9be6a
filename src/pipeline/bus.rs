//! Event bus and the lifecycle state machine that watches it.
//!
//! Every node posts control-plane messages on one bus, possibly from worker
//! threads. A single dispatch loop ([`BusWatch::watch`]) drains the bus in
//! order and feeds each message to [`BusWatch::handle`], which decides when
//! the graph has to stop: on end-of-stream or on the first error.

use crate::element::ElementState;
use crate::error::{Error, Result};
use kanal::{AsyncReceiver, Sender};
use std::fmt;

/// Messages posted on the event bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusMessage {
    /// End of stream reached.
    Eos {
        /// The posting element (if known).
        element: Option<String>,
    },

    /// A fatal error.
    Error {
        /// The posting element (if known).
        element: Option<String>,
        /// Error text; `None` when the error carried no message.
        message: Option<String>,
        /// Debugging detail.
        debug: Option<String>,
    },

    /// A node (or the graph) changed state.
    StateChanged {
        /// The node whose state changed.
        element: String,
        /// Previous state.
        old: ElementState,
        /// New state.
        new: ElementState,
        /// Final state the node is heading to.
        pending: ElementState,
    },

    /// The stream duration became known or changed.
    DurationChanged {
        /// The posting element.
        element: String,
    },

    /// Latency of the graph changed.
    Latency {
        /// The posting element.
        element: String,
    },

    /// A streaming thread was created, started, or stopped.
    StreamStatus {
        /// The posting element.
        element: String,
        /// Free-form status text.
        status: String,
    },

    /// Application-defined message.
    Application {
        /// The posting element.
        element: String,
        /// Message name.
        name: String,
    },
}

impl BusMessage {
    /// Whether this message ends the dispatch loop.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Eos { .. } | Self::Error { .. })
    }
}

impl fmt::Display for BusMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Eos { .. } => write!(f, "End of stream"),
            Self::Error {
                element, message, ..
            } => write!(
                f,
                "Error received from element {}: {}",
                element.as_deref().unwrap_or("<unknown>"),
                message.as_deref().unwrap_or("unknown error")
            ),
            Self::StateChanged {
                element, old, new, ..
            } => write!(f, "{element}: {old} -> {new}"),
            Self::DurationChanged { element } => write!(f, "{element}: duration changed"),
            Self::Latency { element } => write!(f, "{element}: latency changed"),
            Self::StreamStatus { element, status } => write!(f, "{element}: stream {status}"),
            Self::Application { element, name } => write!(f, "{element}: application '{name}'"),
        }
    }
}

/// Posting side of the bus. Cheap to clone, usable from any thread.
#[derive(Clone)]
pub struct BusSender {
    sender: Sender<BusMessage>,
}

impl BusSender {
    /// Post a message.
    ///
    /// Returns `false` if the bus has been torn down.
    pub fn post(&self, message: BusMessage) -> bool {
        self.sender.send(message).is_ok()
    }

    /// Post end-of-stream.
    pub fn post_eos(&self, element: Option<String>) -> bool {
        self.post(BusMessage::Eos { element })
    }

    /// Post an error.
    pub fn post_error(
        &self,
        element: Option<String>,
        message: Option<String>,
        debug: Option<String>,
    ) -> bool {
        self.post(BusMessage::Error {
            element,
            message,
            debug,
        })
    }
}

impl fmt::Debug for BusSender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BusSender")
            .field("pending", &self.sender.len())
            .finish()
    }
}

/// The event bus of a graph.
pub struct Bus {
    sender: BusSender,
    receiver: Option<AsyncReceiver<BusMessage>>,
}

impl Bus {
    /// Create a new, unbounded bus.
    pub fn new() -> Self {
        let (sender, receiver) = kanal::unbounded();
        Self {
            sender: BusSender { sender },
            receiver: Some(receiver.to_async()),
        }
    }

    /// A sender for posting messages.
    pub fn sender(&self) -> BusSender {
        self.sender.clone()
    }

    /// Take the receiving end. Only one watcher may exist.
    pub fn take_receiver(&mut self) -> Option<AsyncReceiver<BusMessage>> {
        self.receiver.take()
    }

    /// Close the bus; pending and future posts are dropped.
    pub fn close(&mut self) {
        if let Some(receiver) = self.receiver.take() {
            let _ = receiver.close();
        }
        let _ = self.sender.sender.close();
    }
}

impl Default for Bus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Bus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bus")
            .field("watched", &self.receiver.is_none())
            .finish()
    }
}

/// State of the bus watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BusState {
    /// Messages are being processed.
    #[default]
    Running,
    /// A terminal message was seen; nothing more is processed.
    Stopping,
}

/// How the watch reached `Stopping`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    /// End of stream.
    EndOfStream,
    /// A stream error.
    Error {
        /// The posting element (if known).
        element: Option<String>,
        /// Error text.
        message: String,
        /// Debugging detail.
        debug: Option<String>,
    },
}

impl Termination {
    /// Convert into the result `run()` reports.
    pub fn into_result(self) -> Result<()> {
        match self {
            Self::EndOfStream => Ok(()),
            Self::Error {
                element,
                message,
                debug,
            } => Err(Error::Stream {
                element,
                message,
                debug,
            }),
        }
    }
}

/// The lifecycle state machine fed by the bus.
#[derive(Debug, Default)]
pub struct BusWatch {
    state: BusState,
    termination: Option<Termination>,
    handled: u64,
}

impl BusWatch {
    /// Create a watch in the `Running` state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state.
    pub fn state(&self) -> BusState {
        self.state
    }

    /// How the watch stopped, once it has.
    pub fn termination(&self) -> Option<&Termination> {
        self.termination.as_ref()
    }

    /// Number of messages processed while running.
    pub fn handled(&self) -> u64 {
        self.handled
    }

    /// Process one message and return the resulting state.
    ///
    /// Once `Stopping`, further messages are ignored.
    pub fn handle(&mut self, message: BusMessage) -> BusState {
        if self.state == BusState::Stopping {
            return self.state;
        }
        self.handled += 1;

        match message {
            BusMessage::Eos { element } => {
                tracing::info!(element = element.as_deref().unwrap_or("-"), "End of stream");
                self.stop(Termination::EndOfStream);
            }
            BusMessage::Error {
                element,
                message,
                debug,
            } => {
                let message = message.unwrap_or_else(|| "unknown error".to_string());
                let source = element.as_deref().unwrap_or("<unknown>");
                let detail = debug.as_deref().unwrap_or("none");
                tracing::error!(element = source, "Error: {}", message);
                tracing::error!("Debugging information: {}", detail);
                self.stop(Termination::Error {
                    element,
                    message,
                    debug,
                });
            }
            BusMessage::StateChanged {
                element,
                old,
                new,
                pending,
            } => {
                tracing::debug!(
                    element = %element,
                    old = %old,
                    new = %new,
                    pending = %pending,
                    "state changed"
                );
            }
            BusMessage::DurationChanged { element } | BusMessage::Latency { element } => {
                tracing::debug!(element = %element, "informational bus message");
            }
            BusMessage::StreamStatus { element, status } => {
                tracing::trace!(element = %element, status = %status, "stream status");
            }
            BusMessage::Application { .. } => {}
        }

        self.state
    }

    fn stop(&mut self, termination: Termination) {
        self.state = BusState::Stopping;
        self.termination = Some(termination);
    }

    /// Drain `receiver` until a terminal message arrives.
    ///
    /// A bus that closes before any terminal message is reported as a
    /// stream error.
    pub async fn watch(&mut self, receiver: &AsyncReceiver<BusMessage>) -> Result<()> {
        while self.state == BusState::Running {
            match receiver.recv().await {
                Ok(message) => {
                    self.handle(message);
                }
                Err(_) => {
                    self.stop(Termination::Error {
                        element: None,
                        message: "event bus closed".to_string(),
                        debug: None,
                    });
                }
            }
        }

        match self.termination.clone() {
            Some(termination) => termination.into_result(),
            None => Ok(()),
        }
    }
}
