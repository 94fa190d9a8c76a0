//! Family C: third-generation bands
//!
//! Every frame is wrapped in an envelope `class key len:u16le payload marker`
//! whose marker tells the direction: `5A` towards the band, `A5` from it.
//! Integers are little-endian, years count from 2000 and weekdays run from
//! Monday = 1. This family also accepts watch-face uploads.

pub mod codes;
pub mod commands;
pub mod events;
pub mod history;
pub mod watch_face;

pub use commands::{device_info, find_band, set_alarms, set_time, set_user_info, set_weather};
pub use history::{heart_rate_history, sport_history};
pub use watch_face::{chunk_size_for, upload_watch_face, WatchFaceCodec};

use crate::command::Matcher;

pub(crate) const CLASS_DEVICE: u8 = 0x20;
pub(crate) const CLASS_SETTINGS: u8 = 0x21;
pub(crate) const CLASS_CONTROL: u8 = 0x22;
pub(crate) const CLASS_HISTORY: u8 = 0x25;
pub(crate) const CLASS_TRANSFER: u8 = 0x30;
pub(crate) const CLASS_NOTIFY: u8 = 0x40;

pub(crate) const MARKER_REQUEST: u8 = 0x5A;
pub(crate) const MARKER_REPLY: u8 = 0xA5;

/// Envelope bytes around the payload
pub(crate) const ENVELOPE_LEN: usize = 5;

/// `class key len:u16le payload 5A`
pub(crate) fn request(class: u8, key: u8, payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(payload.len() + ENVELOPE_LEN);
    frame.extend_from_slice(&[class, key]);
    frame.extend_from_slice(&(payload.len() as u16).to_le_bytes());
    frame.extend_from_slice(payload);
    frame.push(MARKER_REQUEST);
    frame
}

pub(crate) fn reply(class: u8, key: u8, min_len: usize) -> Matcher {
    Matcher::enveloped(&[class, key], min_len, MARKER_REPLY)
}
