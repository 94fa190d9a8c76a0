//! Common types, enums, and error definitions shared by every band family

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, BandError>;

/// Errors raised while building frames, loading descriptors or talking to the transport
#[derive(Error, Debug)]
pub enum BandError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Unsupported by family {family}: {what}")]
    Unsupported { family: Family, what: String },

    #[error("Invalid descriptor: {0}")]
    InvalidDescriptor(String),

    #[error("No channel configured for {0}")]
    MissingChannel(ChannelRole),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Unknown family code: {0}")]
    UnknownFamily(String),

    #[error("Invalid hex input: {0}")]
    InvalidHex(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failure half of the single result delivered to the issuer of a command
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("reply frame too short or malformed")]
    InvalidLength,

    #[error("device rejected the command with status {code:#04x}")]
    Rejected { code: u8 },

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("timed out waiting for the device")]
    Timeout,

    #[error("checksum mismatch: sent {sent:#010x}, device computed {device:#010x}")]
    ChecksumMismatch { sent: u32, device: u32 },

    #[error("command dropped before a result was produced")]
    Dropped,

    #[error("unexpected frame: {0}")]
    Unexpected(String),
}

/// Outcome delivered to the issuer of a command
pub type CommandResult<T> = std::result::Result<T, CommandError>;

/// Hardware generation; each speaks its own wire format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Family {
    A,
    B,
    C,
}

impl Family {
    /// Parse a family from its single-letter name
    pub fn from_name(name: &str) -> Result<Self> {
        match name.trim() {
            "A" | "a" => Ok(Family::A),
            "B" | "b" => Ok(Family::B),
            "C" | "c" => Ok(Family::C),
            other => Err(BandError::UnknownFamily(other.to_string())),
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Family::A => write!(f, "A"),
            Family::B => write!(f, "B"),
            Family::C => write!(f, "C"),
        }
    }
}

/// What a command reports after looking at one inbound frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeStatus {
    /// Reply fully decoded and the result delivered
    Completed,
    /// More frames are needed
    Incomplete,
    /// Terminal frame seen but gaps remain; resend requests were queued
    ItemMissed,
    /// Frame belongs to somebody else
    Incompatible,
    /// Frame matched this command but is malformed; failure delivered
    InvalidLength,
}

impl DecodeStatus {
    /// Whether the dispatcher should evict the command after this status
    pub fn is_terminal(self) -> bool {
        matches!(self, DecodeStatus::Completed | DecodeStatus::InvalidLength)
    }
}

impl fmt::Display for DecodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeStatus::Completed => write!(f, "COMPLETED"),
            DecodeStatus::Incomplete => write!(f, "INCOMPLETE"),
            DecodeStatus::ItemMissed => write!(f, "ITEM_MISSED"),
            DecodeStatus::Incompatible => write!(f, "INCOMPATIBLE"),
            DecodeStatus::InvalidLength => write!(f, "INVALID_LENGTH"),
        }
    }
}

static NEXT_KEY: AtomicU64 = AtomicU64::new(1);

/// Opaque identifier linking an outgoing command to its reply frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CorrelationKey(u64);

impl CorrelationKey {
    /// Mint a fresh key; keys increase monotonically within the process
    pub fn next() -> Self {
        CorrelationKey(NEXT_KEY.fetch_add(1, Ordering::SeqCst))
    }

    pub fn from_raw(raw: u64) -> Self {
        CorrelationKey(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for CorrelationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Logical channel a request is written to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelRole {
    Control,
    Bulk,
}

impl fmt::Display for ChannelRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelRole::Control => write!(f, "control"),
            ChannelRole::Bulk => write!(f, "bulk"),
        }
    }
}

/// How the reply to a request comes back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyMode {
    /// Reply arrives through whatever the descriptor configures
    Default,
    /// No reply expected
    None,
}

/// A frame a command wants written, before channel ids are resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub payload: Vec<u8>,
    pub role: ChannelRole,
    pub reply: ReplyMode,
    /// Carry the issuing command's key so replies route back to it
    pub correlated: bool,
}

impl Request {
    /// Control-channel request whose reply routes back to the issuer
    pub fn control(payload: Vec<u8>) -> Self {
        Self {
            payload,
            role: ChannelRole::Control,
            reply: ReplyMode::Default,
            correlated: true,
        }
    }

    /// Control-channel frame that expects nothing back (acks, resend requests to unkeyed devices)
    pub fn control_unacked(payload: Vec<u8>) -> Self {
        Self {
            payload,
            role: ChannelRole::Control,
            reply: ReplyMode::None,
            correlated: false,
        }
    }

    /// Bulk-channel chunk, fire-and-forget
    pub fn bulk(payload: Vec<u8>) -> Self {
        Self {
            payload,
            role: ChannelRole::Bulk,
            reply: ReplyMode::None,
            correlated: false,
        }
    }
}

/// A frame with concrete transport addressing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingFrame {
    pub write_channel: String,
    pub read_channel: Option<String>,
    /// Reply arrives by notification rather than a synchronous read
    pub notify: bool,
    pub key: Option<CorrelationKey>,
    pub payload: Vec<u8>,
}

/// Space-separated upper-case hex, used for frame logging
pub fn hex_dump(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parse hex with optional whitespace between byte pairs
pub fn parse_hex(text: &str) -> Result<Vec<u8>> {
    let digits: Vec<u8> = text
        .bytes()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    if digits.len() % 2 != 0 || !digits.iter().all(u8::is_ascii_hexdigit) {
        return Err(BandError::InvalidHex(text.to_string()));
    }
    digits
        .chunks(2)
        .map(|pair| {
            std::str::from_utf8(pair)
                .ok()
                .and_then(|s| u8::from_str_radix(s, 16).ok())
                .ok_or_else(|| BandError::InvalidHex(text.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_family_from_name() {
        assert_eq!(Family::from_name("A").unwrap(), Family::A);
        assert_eq!(Family::from_name(" c ").unwrap(), Family::C);
        assert!(Family::from_name("D").is_err());
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(DecodeStatus::Completed.is_terminal());
        assert!(DecodeStatus::InvalidLength.is_terminal());
        assert!(!DecodeStatus::Incomplete.is_terminal());
        assert!(!DecodeStatus::ItemMissed.is_terminal());
        assert!(!DecodeStatus::Incompatible.is_terminal());
    }

    #[test]
    fn test_keys_are_unique_and_increasing() {
        let a = CorrelationKey::next();
        let b = CorrelationKey::next();
        assert_ne!(a, b);
        assert!(b > a);
    }

    #[test]
    fn test_hex_roundtrip() {
        let bytes = vec![0x05, 0x01, 0xFF, 0x0A];
        assert_eq!(hex_dump(&bytes), "05 01 FF 0A");
        assert_eq!(parse_hex("05 01 ff0a").unwrap(), bytes);
        assert!(parse_hex("0").is_err());
        assert!(parse_hex("zz").is_err());
    }

    #[test]
    fn test_parse_hex_rejects_non_ascii() {
        assert!(matches!(parse_hex("a€"), Err(BandError::InvalidHex(_))));
        assert!(matches!(parse_hex("0€"), Err(BandError::InvalidHex(_))));
        assert!(parse_hex("é1").is_err());
        assert!(parse_hex("+1").is_err());
    }

    #[test]
    fn test_family_serde() {
        let family: Family = serde_json::from_str("\"B\"").unwrap();
        assert_eq!(family, Family::B);
    }
}
