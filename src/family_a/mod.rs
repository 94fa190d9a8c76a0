//! Family A: first-generation bands
//!
//! Frames are `class key payload...` and every reply echoes the request's
//! `class key` pair. Multi-byte integers are little-endian and years are sent
//! as absolute values. History replies come as header frames, 20-byte data
//! frames (`class key seq valid_len payload[16]`) and a three-byte terminal
//! frame `class key FF`.

pub mod codes;
pub mod commands;
pub mod events;
pub mod history;

pub use commands::{
    battery, camera_mode, device_info, find_band, set_alarms, set_time, set_user_info,
    set_weather,
};
pub use history::{heart_rate_history, sleep_history, steps_history};

use crate::command::Matcher;

pub(crate) const CLASS_DEVICE: u8 = 0x01;
pub(crate) const CLASS_SETTINGS: u8 = 0x02;
pub(crate) const CLASS_CONTROL: u8 = 0x03;
pub(crate) const CLASS_HISTORY: u8 = 0x05;
pub(crate) const CLASS_NOTIFY: u8 = 0x07;

/// Replies echo the request header
pub(crate) fn reply(class: u8, key: u8, min_len: usize) -> Matcher {
    Matcher::plain(&[class, key], min_len)
}
