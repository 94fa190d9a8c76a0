//! Unsolicited frame classification and event delivery
//!
//! Buttons pressed on the band, camera shutter requests, media keys and call
//! actions arrive as frames no command asked for. Each family has an ordered
//! table of [`Signature`]s; the first one whose header and value set match a
//! frame decodes it into a [`BandEvent`].

use crate::command::Effects;
use crate::types::{hex_dump, Family, Request};
use log::{debug, info, warn};
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FindPhoneAction {
    Start,
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CameraAction {
    Open,
    Close,
    Capture,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MusicAction {
    Play,
    Pause,
    PlayPause,
    Next,
    Previous,
    VolumeUp,
    VolumeDown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CallAction {
    Answer,
    End,
}

/// Watch-face upload state as reported to the application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TransferState {
    Started,
    Sending,
    AwaitingEnd,
    Completed,
    TimedOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TransferProgress {
    pub state: TransferState,
    pub sent: usize,
    pub total: usize,
}

/// Typed notification for the application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BandEvent {
    FindPhone(FindPhoneAction),
    Camera(CameraAction),
    Music(MusicAction),
    Call(CallAction),
    WatchFaceTransfer(TransferProgress),
}

impl fmt::Display for BandEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BandEvent::FindPhone(a) => write!(f, "find-phone {:?}", a),
            BandEvent::Camera(a) => write!(f, "camera {:?}", a),
            BandEvent::Music(a) => write!(f, "music {:?}", a),
            BandEvent::Call(a) => write!(f, "call {:?}", a),
            BandEvent::WatchFaceTransfer(p) => {
                write!(f, "watch-face {:?} {}/{}", p.state, p.sent, p.total)
            }
        }
    }
}

/// Receives classified events; implemented by the application
pub trait EventSink: Send + Sync {
    fn deliver(&self, event: BandEvent);
}

/// Sink forwarding events into a tokio channel
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<BandEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<BandEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn deliver(&self, event: BandEvent) {
        if self.tx.send(event).is_err() {
            warn!("Event receiver closed, dropping {}", event);
        }
    }
}

/// Sink that only logs
pub struct LogSink;

impl EventSink for LogSink {
    fn deliver(&self, event: BandEvent) {
        info!("Band event: {}", event);
    }
}

/// Sink that keeps every event, handy for inspection
#[derive(Clone, Default)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<BandEvent>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<BandEvent> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl EventSink for RecordingSink {
    fn deliver(&self, event: BandEvent) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event);
    }
}

/// Header signature of one unsolicited frame kind
pub struct Signature {
    pub name: &'static str,
    /// Literal leading bytes
    pub prefix: &'static [u8],
    /// Required trailing byte, for enveloped frames
    pub trailer: Option<u8>,
    pub min_len: usize,
    /// Position of the value byte checked against the decoder's value set
    pub value_at: usize,
    /// `None` means the value is outside the accepted set
    pub decode: fn(u8) -> Option<BandEvent>,
    /// Acknowledgement frame owed to the band, if any
    pub ack: Option<fn(u8) -> Option<Vec<u8>>>,
}

impl Signature {
    fn matches(&self, frame: &[u8]) -> Option<(BandEvent, u8)> {
        if frame.len() < self.min_len || !frame.starts_with(self.prefix) {
            return None;
        }
        if let Some(trailer) = self.trailer {
            if frame.last() != Some(&trailer) {
                return None;
            }
        }
        let value = *frame.get(self.value_at)?;
        (self.decode)(value).map(|event| (event, value))
    }
}

/// Ordered signature table for one family
pub struct EventClassifier {
    family: Family,
    signatures: &'static [Signature],
}

impl EventClassifier {
    pub fn new(family: Family, signatures: &'static [Signature]) -> Self {
        Self { family, signatures }
    }

    pub fn for_family(family: Family) -> Self {
        let signatures = match family {
            Family::A => crate::family_a::events::SIGNATURES,
            Family::B => crate::family_b::events::SIGNATURES,
            Family::C => crate::family_c::events::SIGNATURES,
        };
        Self::new(family, signatures)
    }

    pub fn family(&self) -> Family {
        self.family
    }

    /// Classify one frame; on a match the event and any ack go into `effects`
    pub fn classify(&self, frame: &[u8], effects: &mut Effects) -> Option<&'static str> {
        for signature in self.signatures {
            let Some((event, value)) = signature.matches(frame) else {
                continue;
            };
            info!("Family {} unsolicited {}: {}", self.family, signature.name, event);
            effects.emit(event);
            if let Some(ack) = signature.ack.and_then(|build| build(value)) {
                debug!("Acknowledging {}: {}", signature.name, hex_dump(&ack));
                effects.send(Request::control_unacked(ack));
            }
            return Some(signature.name);
        }
        None
    }
}
