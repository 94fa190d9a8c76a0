//! Domain records produced by successful decodes, and parameter types for
//! setter commands
//!
//! The enums here are the shared semantic vocabulary. Each family keeps its
//! own code tables for them in its `codes` module.

use crate::bitfield::{unpack_bits, SPORT_SLOT_WIDTHS, STEP_SLOT_WIDTHS};
use crate::types::{BandError, Family, Result};
use chrono::{NaiveDate, NaiveDateTime, Weekday};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    pub family: Family,
    pub firmware: String,
    pub battery: u8,
    pub hardware_revision: Option<u8>,
    pub model_code: Option<u16>,
    pub serial: Option<String>,
    pub screen: Option<(u16, u16)>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatteryStatus {
    pub level: u8,
    pub charging: bool,
}

/// One bucket of step telemetry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StepSlot {
    pub index: u32,
    pub start: NaiveDateTime,
    pub mode: u8,
    pub steps: u16,
    pub active_minutes: u8,
    pub calories: u16,
    pub distance_m: u16,
    pub wear: u8,
}

impl StepSlot {
    /// Decode a packed 6-byte slot
    pub fn unpack(index: u32, start: NaiveDateTime, bytes: &[u8]) -> Self {
        let f = unpack_bits(bytes, &STEP_SLOT_WIDTHS);
        Self {
            index,
            start,
            mode: f[0] as u8,
            steps: f[1] as u16,
            active_minutes: f[2] as u8,
            calories: f[3] as u16,
            distance_m: f[4] as u16,
            wear: f[5] as u8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct StepsSummary {
    pub steps: u32,
    pub calories: u32,
    pub distance_m: u32,
    pub active_minutes: Option<u16>,
    pub goal_percent: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepsRecord {
    pub date: NaiveDate,
    pub summary: StepsSummary,
    pub slots: Vec<StepSlot>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SleepStage {
    Awake,
    Light,
    Deep,
    Rem,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SleepSegment {
    pub stage: SleepStage,
    pub start: NaiveDateTime,
    pub duration_minutes: u16,
    pub movement: Option<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SleepSummary {
    pub total_minutes: u16,
    pub deep_minutes: u16,
    pub light_minutes: u16,
    pub awake_minutes: u16,
    pub rem_minutes: Option<u16>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SleepRecord {
    pub date: NaiveDate,
    pub summary: SleepSummary,
    pub segments: Vec<SleepSegment>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HeartRateSample {
    pub index: u32,
    pub time: NaiveDateTime,
    pub bpm: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct HeartRateSummary {
    pub resting: u8,
    pub max: u8,
    pub average: u8,
    pub min: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeartRateRecord {
    pub date: NaiveDate,
    pub summary: HeartRateSummary,
    pub samples: Vec<HeartRateSample>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SportType {
    Walk,
    Run,
    Cycle,
    Hike,
    Swim,
    Yoga,
    Treadmill,
    Badminton,
    Other(u8),
}

impl fmt::Display for SportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SportType::Walk => write!(f, "walk"),
            SportType::Run => write!(f, "run"),
            SportType::Cycle => write!(f, "cycle"),
            SportType::Hike => write!(f, "hike"),
            SportType::Swim => write!(f, "swim"),
            SportType::Yoga => write!(f, "yoga"),
            SportType::Treadmill => write!(f, "treadmill"),
            SportType::Badminton => write!(f, "badminton"),
            SportType::Other(code) => write!(f, "sport({:#04x})", code),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SportSession {
    pub sport: SportType,
    pub start: NaiveDateTime,
    pub duration_minutes: u16,
    pub steps: u32,
    pub calories: u16,
    pub distance_m: u32,
    pub average_hr: u8,
    pub max_hr: u8,
}

impl SportSession {
    /// Decode a packed 10-byte slot; `sport` maps the family's sport code
    pub fn unpack(start: NaiveDateTime, bytes: &[u8], sport: fn(u8) -> SportType) -> Self {
        let f = unpack_bits(bytes, &SPORT_SLOT_WIDTHS);
        Self {
            sport: sport(f[0] as u8),
            start,
            duration_minutes: f[1] as u16,
            steps: f[2],
            calories: f[3] as u16,
            distance_m: f[4],
            average_hr: f[5] as u8,
            max_hr: f[6] as u8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SportRecord {
    pub date: NaiveDate,
    pub sessions: Vec<SportSession>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Gender {
    Male,
    Female,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Wrist {
    Left,
    Right,
}

/// User profile; each generation stores a different shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum UserInfo {
    A {
        height_cm: u8,
        weight_kg: u8,
        gender: Gender,
        age: u8,
        stride_cm: u8,
        step_goal: u32,
    },
    B {
        gender: Gender,
        age: u8,
        height_cm: u16,
        /// Tenths of a kilogram
        weight_dg: u16,
        wrist: Wrist,
    },
    C {
        height_cm: u8,
        weight_kg: u8,
        gender: Gender,
        birth_date: NaiveDate,
    },
}

impl UserInfo {
    pub fn family(&self) -> Family {
        match self {
            UserInfo::A { .. } => Family::A,
            UserInfo::B { .. } => Family::B,
            UserInfo::C { .. } => Family::C,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AlarmKind {
    Wake,
    Sleep,
    Exercise,
    Medicine,
    Meeting,
    Custom,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alarm {
    pub id: u8,
    pub kind: AlarmKind,
    pub hour: u8,
    pub minute: u8,
    pub days: Vec<Weekday>,
    pub enabled: bool,
}

impl Alarm {
    pub fn validate(&self) -> Result<()> {
        if self.hour > 23 || self.minute > 59 {
            return Err(BandError::InvalidParameter(format!(
                "alarm {} time {:02}:{:02}",
                self.id, self.hour, self.minute
            )));
        }
        Ok(())
    }
}

/// Reject more alarms than a family can store
pub fn check_alarm_count(alarms: &[Alarm], max: usize) -> Result<()> {
    if alarms.len() > max {
        return Err(BandError::InvalidParameter(format!(
            "{} alarms given, at most {} supported",
            alarms.len(),
            max
        )));
    }
    alarms.iter().try_for_each(Alarm::validate)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum WeatherCondition {
    Sunny,
    Cloudy,
    Overcast,
    Rain,
    Snow,
    Fog,
    Thunderstorm,
    Wind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeatherDay {
    pub condition: WeatherCondition,
    pub low: i8,
    pub high: i8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeatherReport {
    pub condition: WeatherCondition,
    pub current: i8,
    pub humidity: u8,
    pub uv_index: u8,
    pub aqi: u16,
    /// Today first
    pub forecast: Vec<WeatherDay>,
}

impl WeatherReport {
    /// Today's low/high, falling back to the current temperature
    pub fn today_range(&self) -> (i8, i8) {
        self.forecast
            .first()
            .map(|d| (d.low, d.high))
            .unwrap_or((self.current, self.current))
    }
}

/// Set-time parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockSetting {
    pub local: NaiveDateTime,
    /// Offset from UTC in minutes
    pub utc_offset_minutes: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_info_family() {
        let info = UserInfo::B {
            gender: Gender::Female,
            age: 31,
            height_cm: 168,
            weight_dg: 612,
            wrist: Wrist::Left,
        };
        assert_eq!(info.family(), Family::B);
    }

    #[test]
    fn test_weather_today_range() {
        let mut report = WeatherReport {
            condition: WeatherCondition::Rain,
            current: 12,
            humidity: 80,
            uv_index: 1,
            aqi: 40,
            forecast: vec![],
        };
        assert_eq!(report.today_range(), (12, 12));
        report.forecast.push(WeatherDay {
            condition: WeatherCondition::Rain,
            low: 8,
            high: 15,
        });
        assert_eq!(report.today_range(), (8, 15));
    }

    #[test]
    fn test_alarm_validation() {
        let alarm = Alarm {
            id: 1,
            kind: AlarmKind::Wake,
            hour: 7,
            minute: 30,
            days: vec![Weekday::Mon],
            enabled: true,
        };
        assert!(check_alarm_count(&[alarm.clone()], 1).is_ok());
        assert!(check_alarm_count(&[alarm.clone(), alarm.clone()], 1).is_err());
        let late = Alarm { hour: 24, ..alarm };
        assert!(late.validate().is_err());
    }

    #[test]
    fn test_unpack_step_slot() {
        let start = NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(0, 15, 0)
            .unwrap();
        let slot = StepSlot::unpack(1, start, &[0x44, 0xB1, 0x42, 0xA0, 0xD2, 0xFF]);
        assert_eq!(slot.mode, 1);
        assert_eq!(slot.steps, 300);
        assert_eq!(slot.active_minutes, 5);
        assert_eq!(slot.calories, 42);
        assert_eq!(slot.distance_m, 210);
        assert_eq!(slot.wear, 0xFF);
    }

    #[test]
    fn test_sport_display() {
        assert_eq!(SportType::Run.to_string(), "run");
        assert_eq!(SportType::Other(0x2A).to_string(), "sport(0x2a)");
    }
}
