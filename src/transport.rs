//! Transport collaborator
//!
//! Connection setup, discovery and the actual radio I/O live outside the
//! engine. The session only needs to write addressed frames and, for products
//! without notifications, read a reply back.

use crate::types::{hex_dump, CorrelationKey, OutgoingFrame, Result};
use log::{debug, info};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Trait for the packet transport the platform provides
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Write one frame to `frame.write_channel`
    async fn write(&self, frame: &OutgoingFrame) -> Result<()>;

    /// Synchronously read a reply from `channel`
    async fn read(&self, channel: &str, key: Option<CorrelationKey>) -> Result<Vec<u8>>;
}

/// Transport that records writes and serves queued reads; used for replays
#[derive(Clone, Default)]
pub struct LoggingTransport {
    written: Arc<Mutex<Vec<OutgoingFrame>>>,
    reads: Arc<Mutex<VecDeque<Vec<u8>>>>,
}

impl LoggingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn written(&self) -> Vec<OutgoingFrame> {
        self.written
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Queue bytes for the next `read`
    pub fn queue_read(&self, bytes: Vec<u8>) {
        self.reads
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(bytes);
    }
}

#[async_trait::async_trait]
impl Transport for LoggingTransport {
    async fn write(&self, frame: &OutgoingFrame) -> Result<()> {
        info!(
            "-> {} [{}]{}",
            frame.write_channel,
            hex_dump(&frame.payload),
            frame.key.map(|k| format!(" {}", k)).unwrap_or_default()
        );
        self.written
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(frame.clone());
        Ok(())
    }

    async fn read(&self, channel: &str, _key: Option<CorrelationKey>) -> Result<Vec<u8>> {
        let bytes = self
            .reads
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .unwrap_or_default();
        debug!("<- {} [{}]", channel, hex_dump(&bytes));
        Ok(bytes)
    }
}
