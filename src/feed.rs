//! Buffered delivery of settings and command documents
//!
//! Feed readers (stdin, tests, an embedding host) push messages through a
//! clonable `FeedSender`; the frame loop drains everything pending at the
//! start of each frame and applies it to the engine in arrival order.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use serde::Deserialize;
use serde_json::Value;

use crate::overlay::command::CommandEvent;
use crate::overlay::Engine;

/// One document delivered by a feed
#[derive(Debug, Clone, PartialEq)]
pub enum FeedMessage {
    /// Full settings snapshot
    Settings(Value),
    /// Ad-hoc command event
    Command(CommandEvent),
}

impl FeedMessage {
    /// Hand the message to the engine
    pub fn apply(&self, engine: &mut Engine) {
        match self {
            FeedMessage::Settings(doc) => engine.apply_settings(doc),
            FeedMessage::Command(event) => {
                engine.handle_command(event);
            }
        }
    }
}

/// Feed errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FeedError {
    /// Buffer is full (backpressure)
    #[error("Feed buffer is full")]
    Full,
    /// Frame loop stopped
    #[error("Feed buffer disconnected")]
    Disconnected,
    /// Line did not parse as a feed document
    #[error("Malformed feed line: {0}")]
    Malformed(String),
}

/// Wire shape of one input line: `{"settings": {...}}` or `{"command": {...}}`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum FeedLine {
    Settings(Value),
    Command(CommandEvent),
}

/// Parse one JSON line into a feed message
pub fn parse_line(line: &str) -> Result<FeedMessage, FeedError> {
    let parsed: FeedLine =
        serde_json::from_str(line.trim()).map_err(|e| FeedError::Malformed(e.to_string()))?;

    Ok(match parsed {
        FeedLine::Settings(doc) => FeedMessage::Settings(doc),
        FeedLine::Command(event) => FeedMessage::Command(event),
    })
}

/// Bounded buffer between feed readers and the frame loop
pub struct FeedBuffer {
    sender: Sender<FeedMessage>,
    receiver: Receiver<FeedMessage>,
    capacity: usize,
}

impl FeedBuffer {
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity);
        Self {
            sender,
            receiver,
            capacity,
        }
    }

    /// Create a sender handle for a feed reader
    pub fn sender(&self) -> FeedSender {
        FeedSender {
            sender: self.sender.clone(),
        }
    }

    /// Drain all pending messages for this frame
    pub fn drain(&self) -> Vec<FeedMessage> {
        self.receiver.try_iter().collect()
    }

    #[inline]
    pub fn pending_count(&self) -> usize {
        self.receiver.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for FeedBuffer {
    fn default() -> Self {
        Self::new(1024)
    }
}

/// Clonable sender handle for feed readers
#[derive(Clone)]
pub struct FeedSender {
    sender: Sender<FeedMessage>,
}

impl FeedSender {
    /// Submit a message (non-blocking)
    #[inline]
    pub fn try_send(&self, message: FeedMessage) -> Result<(), FeedError> {
        self.sender.try_send(message).map_err(|e| match e {
            TrySendError::Full(_) => FeedError::Full,
            TrySendError::Disconnected(_) => FeedError::Disconnected,
        })
    }

    /// Parse a line and submit it
    pub fn submit_line(&self, line: &str) -> Result<(), FeedError> {
        self.try_send(parse_line(line)?)
    }
}
