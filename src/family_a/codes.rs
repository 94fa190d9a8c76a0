//! Family A code tables

use crate::records::{AlarmKind, Gender, SleepStage, WeatherCondition};
use chrono::Weekday;

pub fn sleep_stage(code: u8) -> Option<SleepStage> {
    match code {
        0 => Some(SleepStage::Awake),
        1 => Some(SleepStage::Light),
        2 => Some(SleepStage::Deep),
        3 => Some(SleepStage::Rem),
        _ => None,
    }
}

/// Custom alarms are not supported by this generation
pub fn alarm_kind(kind: AlarmKind) -> Option<u8> {
    match kind {
        AlarmKind::Wake => Some(0),
        AlarmKind::Sleep => Some(1),
        AlarmKind::Exercise => Some(2),
        AlarmKind::Medicine => Some(3),
        AlarmKind::Meeting => Some(4),
        AlarmKind::Custom => None,
    }
}

pub fn weather(condition: WeatherCondition) -> u8 {
    match condition {
        WeatherCondition::Sunny => 0,
        WeatherCondition::Cloudy => 1,
        WeatherCondition::Overcast => 2,
        WeatherCondition::Rain => 3,
        WeatherCondition::Snow => 4,
        WeatherCondition::Fog => 5,
        WeatherCondition::Thunderstorm => 6,
        WeatherCondition::Wind => 7,
    }
}

/// Monday is 0
pub fn weekday(day: Weekday) -> u8 {
    day.num_days_from_monday() as u8
}

/// Bit 0 is Monday
pub fn weekday_mask(days: &[Weekday]) -> u8 {
    days.iter()
        .fold(0, |mask, day| mask | (1 << day.num_days_from_monday()))
}

pub fn gender(gender: Gender) -> u8 {
    match gender {
        Gender::Male => 0,
        Gender::Female => 1,
    }
}
