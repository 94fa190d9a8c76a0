//! Family B: second-generation bands
//!
//! Requests are `class key len payload`; replies set bit 7 of the class byte.
//! Integers are big-endian and years count from 1900. History entries carry
//! their own one-byte bucket index, which wraps.

pub mod codes;
pub mod commands;
pub mod events;
pub mod history;

pub use commands::{device_info, find_band, set_alarms, set_time, set_user_info, set_weather};
pub use history::{heart_rate_history, sleep_history, sport_history, steps_history};

use crate::command::Matcher;

pub(crate) const CLASS_DEVICE: u8 = 0x10;
pub(crate) const CLASS_SETTINGS: u8 = 0x11;
pub(crate) const CLASS_CONTROL: u8 = 0x13;
pub(crate) const CLASS_HISTORY: u8 = 0x15;
pub(crate) const CLASS_NOTIFY: u8 = 0x1A;

pub(crate) const REPLY_BIT: u8 = 0x80;

/// `class key len payload`
pub(crate) fn request(class: u8, key: u8, payload: &[u8]) -> Vec<u8> {
    let mut frame = vec![class, key, payload.len() as u8];
    frame.extend_from_slice(payload);
    frame
}

pub(crate) fn reply(class: u8, key: u8, min_len: usize) -> Matcher {
    Matcher::plain(&[class | REPLY_BIT, key], min_len)
}
