//! Family C code tables

use crate::records::{AlarmKind, Gender, SportType, WeatherCondition};
use chrono::Weekday;

pub fn sport(code: u8) -> SportType {
    match code {
        0x03 => SportType::Walk,
        0x04 => SportType::Run,
        0x05 => SportType::Cycle,
        0x06 => SportType::Hike,
        0x07 => SportType::Swim,
        0x0C => SportType::Yoga,
        0x0D => SportType::Treadmill,
        0x14 => SportType::Badminton,
        other => SportType::Other(other),
    }
}

pub fn alarm_kind(kind: AlarmKind) -> u8 {
    match kind {
        AlarmKind::Wake => 0x10,
        AlarmKind::Sleep => 0x11,
        AlarmKind::Exercise => 0x12,
        AlarmKind::Medicine => 0x13,
        AlarmKind::Meeting => 0x14,
        AlarmKind::Custom => 0x1F,
    }
}

/// Sent as `u16le`
pub fn weather(condition: WeatherCondition) -> u16 {
    match condition {
        WeatherCondition::Sunny => 100,
        WeatherCondition::Cloudy => 101,
        WeatherCondition::Overcast => 104,
        WeatherCondition::Wind => 200,
        WeatherCondition::Thunderstorm => 302,
        WeatherCondition::Rain => 305,
        WeatherCondition::Snow => 400,
        WeatherCondition::Fog => 501,
    }
}

/// Monday is 1, Sunday is 7
pub fn weekday(day: Weekday) -> u8 {
    day.number_from_monday() as u8
}

/// Bit 0 is Monday
pub fn weekday_mask(days: &[Weekday]) -> u8 {
    days.iter()
        .fold(0, |mask, day| mask | (1 << day.num_days_from_monday()))
}

pub fn gender(gender: Gender) -> u8 {
    match gender {
        Gender::Female => 0,
        Gender::Male => 1,
    }
}
