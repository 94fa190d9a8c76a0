//! Family B code tables

use crate::records::{AlarmKind, Gender, SleepStage, SportType, WeatherCondition, Wrist};
use chrono::Weekday;

pub fn sleep_stage(code: u8) -> Option<SleepStage> {
    match code {
        1 => Some(SleepStage::Light),
        2 => Some(SleepStage::Deep),
        3 => Some(SleepStage::Rem),
        4 => Some(SleepStage::Awake),
        _ => None,
    }
}

pub fn sport(code: u8) -> SportType {
    match code {
        1 => SportType::Walk,
        2 => SportType::Run,
        3 => SportType::Cycle,
        4 => SportType::Hike,
        5 => SportType::Swim,
        6 => SportType::Yoga,
        7 => SportType::Treadmill,
        8 => SportType::Badminton,
        other => SportType::Other(other),
    }
}

pub fn alarm_kind(kind: AlarmKind) -> u8 {
    match kind {
        AlarmKind::Wake => 1,
        AlarmKind::Sleep => 2,
        AlarmKind::Exercise => 3,
        AlarmKind::Medicine => 4,
        AlarmKind::Meeting => 5,
        AlarmKind::Custom => 6,
    }
}

pub fn weather(condition: WeatherCondition) -> u8 {
    match condition {
        WeatherCondition::Sunny => 0x01,
        WeatherCondition::Cloudy => 0x02,
        WeatherCondition::Overcast => 0x03,
        WeatherCondition::Rain => 0x0A,
        WeatherCondition::Thunderstorm => 0x0B,
        WeatherCondition::Snow => 0x14,
        WeatherCondition::Fog => 0x1E,
        WeatherCondition::Wind => 0x28,
    }
}

/// Sunday is 0
pub fn weekday(day: Weekday) -> u8 {
    day.num_days_from_sunday() as u8
}

/// Bit 0 is Sunday
pub fn weekday_mask(days: &[Weekday]) -> u8 {
    days.iter()
        .fold(0, |mask, day| mask | (1 << day.num_days_from_sunday()))
}

pub fn gender(gender: Gender) -> u8 {
    match gender {
        Gender::Male => 1,
        Gender::Female => 2,
    }
}

pub fn wrist(wrist: Wrist) -> u8 {
    match wrist {
        Wrist::Left => 0,
        Wrist::Right => 1,
    }
}
