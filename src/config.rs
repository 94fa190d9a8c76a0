//! Per-product descriptor
//!
//! A descriptor names the family a product speaks and the transport channels
//! it exposes. Loading it from wherever it lives is up to the application;
//! this module parses and validates the JSON form and maps requests onto
//! concrete channels.

use crate::types::{
    BandError, ChannelRole, CorrelationKey, Family, OutgoingFrame, ReplyMode, Request, Result,
};
use serde::{Deserialize, Serialize};

/// ATT header bytes subtracted from the MTU
const ATT_OVERHEAD: usize = 3;

fn default_notify() -> bool {
    true
}

fn default_mtu() -> usize {
    23
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelMap {
    pub control_write: String,
    #[serde(default)]
    pub control_notify: Option<String>,
    #[serde(default)]
    pub control_read: Option<String>,
    #[serde(default)]
    pub bulk_write: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDescriptor {
    pub model: String,
    pub family: Family,
    /// Service UUIDs the product must expose
    #[serde(default)]
    pub services: Vec<String>,
    pub channels: ChannelMap,
    /// Replies arrive by notification; otherwise they are read back synchronously
    #[serde(default = "default_notify")]
    pub notify: bool,
    #[serde(default = "default_mtu")]
    pub mtu: usize,
}

impl ProductDescriptor {
    pub fn from_json(text: &str) -> Result<Self> {
        let descriptor: ProductDescriptor = serde_json::from_str(text)?;
        descriptor.validate()?;
        Ok(descriptor)
    }

    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(BandError::InvalidDescriptor("model name is empty".into()));
        }
        if self.channels.control_write.trim().is_empty() {
            return Err(BandError::InvalidDescriptor("control_write channel is empty".into()));
        }
        if self.notify && self.channels.control_notify.is_none() {
            return Err(BandError::InvalidDescriptor(
                "notify is set but no control_notify channel is given".into(),
            ));
        }
        if !self.notify && self.channels.control_read.is_none() {
            return Err(BandError::InvalidDescriptor(
                "notify is off but no control_read channel is given".into(),
            ));
        }
        if self.mtu <= ATT_OVERHEAD {
            return Err(BandError::InvalidDescriptor(format!("mtu {} too small", self.mtu)));
        }
        Ok(())
    }

    /// Largest frame that fits in one write
    pub fn max_frame(&self) -> usize {
        self.mtu - ATT_OVERHEAD
    }

    /// Resolve a request to concrete channels
    pub fn address(&self, request: &Request, key: Option<CorrelationKey>) -> Result<OutgoingFrame> {
        let write_channel = match request.role {
            ChannelRole::Control => self.channels.control_write.clone(),
            ChannelRole::Bulk => self
                .channels
                .bulk_write
                .clone()
                .ok_or(BandError::MissingChannel(ChannelRole::Bulk))?,
        };
        let expects_reply = request.reply == ReplyMode::Default;
        let read_channel = if !expects_reply {
            None
        } else if self.notify {
            self.channels.control_notify.clone()
        } else {
            self.channels.control_read.clone()
        };
        Ok(OutgoingFrame {
            write_channel,
            read_channel,
            notify: expects_reply && self.notify,
            key: if request.correlated { key } else { None },
            payload: request.payload.clone(),
        })
    }
}
