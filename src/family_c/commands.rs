//! Family C single-frame commands

use super::{
    codes, reply, request, CLASS_CONTROL, CLASS_DEVICE, CLASS_SETTINGS, ENVELOPE_LEN,
};
use crate::command::{status_at, Completion, FireAndForget, SimpleCommand};
use crate::datetime::{encode_date, YearBase};
use crate::records::{check_alarm_count, Alarm, ClockSetting, DeviceInfo, UserInfo, WeatherReport};
use crate::types::{BandError, CommandError, Family, Result};
use chrono::{Datelike, Timelike};
use log::debug;

const MAX_ALARMS: usize = 10;
const MAX_FORECAST_DAYS: usize = 7;

/// Settings replies carry a single status byte
const STATUS_REPLY_LEN: usize = ENVELOPE_LEN + 1;
const DEVICE_INFO_LEN: usize = ENVELOPE_LEN + 10;

type Issued<T> = (SimpleCommand<T>, Completion<T>);

pub fn device_info() -> Issued<DeviceInfo> {
    SimpleCommand::new(
        "C device info",
        request(CLASS_DEVICE, 0x01, &[]),
        reply(CLASS_DEVICE, 0x01, DEVICE_INFO_LEN),
        |f| {
            let name_len = usize::from(f[13]);
            // Name must end before the marker
            let name = f
                .get(14..14 + name_len)
                .filter(|_| 14 + name_len < f.len())
                .ok_or(CommandError::InvalidLength)?;
            let build = u16::from_le_bytes([f[6], f[7]]);
            Ok(DeviceInfo {
                family: Family::C,
                firmware: format!("{}.{}.{}", f[4], f[5], build),
                battery: f[8],
                hardware_revision: None,
                model_code: None,
                serial: None,
                screen: Some((
                    u16::from_le_bytes([f[9], f[10]]),
                    u16::from_le_bytes([f[11], f[12]]),
                )),
                name: Some(String::from_utf8_lossy(name).into_owned()),
            })
        },
    )
}

fn setter(name: &'static str, key: u8, payload: &[u8]) -> Issued<()> {
    SimpleCommand::new(
        name,
        request(CLASS_SETTINGS, key, payload),
        reply(CLASS_SETTINGS, key, STATUS_REPLY_LEN),
        |f| status_at(f, 4),
    )
}

/// The UTC offset travels in quarter hours
pub fn set_time(clock: ClockSetting) -> Result<Issued<()>> {
    let t = clock.local;
    let quarters = i8::try_from(clock.utc_offset_minutes / 15).map_err(|_| {
        BandError::InvalidParameter(format!("UTC offset {} minutes", clock.utc_offset_minutes))
    })?;
    let mut payload = encode_date(t.date(), YearBase::Since2000, false)?.to_vec();
    payload.extend_from_slice(&[
        t.hour() as u8,
        t.minute() as u8,
        t.second() as u8,
        codes::weekday(t.weekday()),
        quarters as u8,
    ]);
    Ok(setter("C set time", 0x01, &payload))
}

/// Birth year is 1900-based here while every other date of this family
/// counts from 2000.
pub fn set_user_info(info: &UserInfo) -> Result<Issued<()>> {
    let UserInfo::C {
        height_cm,
        weight_kg,
        gender,
        birth_date,
    } = info
    else {
        return Err(BandError::Unsupported {
            family: Family::C,
            what: format!("user info for family {}", info.family()),
        });
    };
    let mut payload = vec![*height_cm, *weight_kg, codes::gender(*gender)];
    payload.extend_from_slice(&encode_date(*birth_date, YearBase::Since1900, false)?);
    Ok(setter("C set user info", 0x02, &payload))
}

/// Entry: `id type hh mm mask enabled`
pub fn set_alarms(alarms: &[Alarm]) -> Result<Issued<()>> {
    check_alarm_count(alarms, MAX_ALARMS)?;
    let mut payload = vec![alarms.len() as u8];
    for alarm in alarms {
        payload.extend_from_slice(&[
            alarm.id,
            codes::alarm_kind(alarm.kind),
            alarm.hour,
            alarm.minute,
            codes::weekday_mask(&alarm.days),
            u8::from(alarm.enabled),
        ]);
    }
    Ok(setter("C set alarms", 0x03, &payload))
}

/// Sends up to seven forecast days; an empty forecast becomes one day built
/// from the current conditions.
pub fn set_weather(report: &WeatherReport) -> Result<Issued<()>> {
    let mut days: Vec<(u16, i8, i8)> = report
        .forecast
        .iter()
        .map(|d| (codes::weather(d.condition), d.low, d.high))
        .collect();
    if days.is_empty() {
        days.push((codes::weather(report.condition), report.current, report.current));
    }
    if days.len() > MAX_FORECAST_DAYS {
        debug!("Weather: dropping {} forecast days", days.len() - MAX_FORECAST_DAYS);
        days.truncate(MAX_FORECAST_DAYS);
    }

    let mut payload = vec![report.current as u8, days.len() as u8];
    for (condition, low, high) in days {
        payload.extend_from_slice(&condition.to_le_bytes());
        payload.extend_from_slice(&[low as u8, high as u8]);
    }
    Ok(setter("C set weather", 0x04, &payload))
}

pub fn find_band() -> FireAndForget {
    FireAndForget::new("C find band", request(CLASS_CONTROL, 0x01, &[]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{Command, Effects};
    use crate::records::{AlarmKind, Gender, WeatherCondition, WeatherDay};
    use crate::types::DecodeStatus;
    use chrono::{NaiveDate, Weekday};

    fn clock(offset: i32) -> ClockSetting {
        ClockSetting {
            local: NaiveDate::from_ymd_opt(2024, 3, 10)
                .unwrap()
                .and_hms_opt(8, 5, 9)
                .unwrap(),
            utc_offset_minutes: offset,
        }
    }

    #[test]
    fn test_device_info_golden() {
        let (mut cmd, mut done) = device_info();
        assert_eq!(cmd.encode()[0].payload, vec![0x20, 0x01, 0x00, 0x00, 0x5A]);
        let frame = [
            0x20, 0x01, 0x0E, 0x00, 1, 7, 0x2C, 0x01, 91, 0xF0, 0x00, 0x18, 0x01, 4, b'B',
            b'a', b'n', b'd', 0xA5,
        ];
        let mut fx = Effects::new();
        assert_eq!(cmd.decode(&frame, &mut fx), DecodeStatus::Completed);
        let info = done.try_take().unwrap().unwrap();
        assert_eq!(info.firmware, "1.7.300");
        assert_eq!(info.battery, 91);
        assert_eq!(info.screen, Some((240, 280)));
        assert_eq!(info.name.as_deref(), Some("Band"));
    }

    #[test]
    fn test_device_info_name_overrun() {
        let (mut cmd, mut done) = device_info();
        let frame = [
            0x20, 0x01, 0x0B, 0x00, 1, 7, 0x2C, 0x01, 91, 0xF0, 0x00, 0x18, 0x01, 9, b'B', 0xA5,
        ];
        let mut fx = Effects::new();
        assert_eq!(cmd.decode(&frame, &mut fx), DecodeStatus::InvalidLength);
        assert_eq!(done.try_take(), Some(Err(CommandError::InvalidLength)));
    }

    #[test]
    fn test_device_info_ignores_request_echo() {
        let (mut cmd, _) = device_info();
        let mut fx = Effects::new();
        assert_eq!(
            cmd.decode(&[0x20, 0x01, 0x00, 0x00, 0x5A], &mut fx),
            DecodeStatus::Incompatible
        );
    }

    #[test]
    fn test_set_time_frame() {
        let (mut cmd, mut done) = set_time(clock(330)).unwrap();
        // 2024 - 2000 = 24, Sunday = 7, +05:30 = 22 quarters
        assert_eq!(
            cmd.encode()[0].payload,
            vec![0x21, 0x01, 0x09, 0x00, 24, 0, 3, 10, 8, 5, 9, 7, 22, 0x5A]
        );
        let mut fx = Effects::new();
        assert_eq!(
            cmd.decode(&[0x21, 0x01, 0x01, 0x00, 0x00, 0xA5], &mut fx),
            DecodeStatus::Completed
        );
        assert_eq!(done.try_take(), Some(Ok(())));
    }

    #[test]
    fn test_set_time_negative_offset() {
        let (cmd, _) = set_time(clock(-300)).unwrap();
        assert_eq!(cmd.encode()[0].payload[12], (-20i8) as u8);
    }

    #[test]
    fn test_status_reply_bad_length() {
        let (mut cmd, mut done) = set_time(clock(0)).unwrap();
        let mut fx = Effects::new();
        assert_eq!(
            cmd.decode(&[0x21, 0x01, 0x02, 0x00, 0x00, 0xA5], &mut fx),
            DecodeStatus::InvalidLength
        );
        assert_eq!(done.try_take(), Some(Err(CommandError::InvalidLength)));
    }

    #[test]
    fn test_user_info_birth_year_from_1900() {
        let info = UserInfo::C {
            height_cm: 172,
            weight_kg: 64,
            gender: Gender::Male,
            birth_date: NaiveDate::from_ymd_opt(1992, 7, 4).unwrap(),
        };
        let (cmd, _) = set_user_info(&info).unwrap();
        assert_eq!(
            cmd.encode()[0].payload,
            vec![0x21, 0x02, 0x07, 0x00, 172, 64, 1, 92, 0, 7, 4, 0x5A]
        );
    }

    #[test]
    fn test_alarms_frame() {
        let alarms = vec![Alarm {
            id: 4,
            kind: AlarmKind::Meeting,
            hour: 13,
            minute: 30,
            days: vec![Weekday::Mon, Weekday::Wed],
            enabled: false,
        }];
        let (cmd, _) = set_alarms(&alarms).unwrap();
        assert_eq!(
            cmd.encode()[0].payload,
            vec![0x21, 0x03, 0x07, 0x00, 1, 4, 0x14, 13, 30, 0b0000_0101, 0, 0x5A]
        );
        assert!(set_alarms(&vec![alarms[0].clone(); 11]).is_err());
    }

    #[test]
    fn test_weather_empty_forecast_uses_current() {
        let report = WeatherReport {
            condition: WeatherCondition::Cloudy,
            current: 18,
            humidity: 50,
            uv_index: 3,
            aqi: 20,
            forecast: vec![],
        };
        let (cmd, _) = set_weather(&report).unwrap();
        assert_eq!(
            cmd.encode()[0].payload,
            vec![0x21, 0x04, 0x06, 0x00, 18, 1, 101, 0, 18, 18, 0x5A]
        );
    }

    #[test]
    fn test_weather_forecast_capped() {
        let day = WeatherDay {
            condition: WeatherCondition::Snow,
            low: -4,
            high: 2,
        };
        let report = WeatherReport {
            condition: WeatherCondition::Snow,
            current: -1,
            humidity: 80,
            uv_index: 0,
            aqi: 10,
            forecast: vec![day; 9],
        };
        let (cmd, _) = set_weather(&report).unwrap();
        let frame = &cmd.encode()[0].payload;
        assert_eq!(frame[5], 7);
        assert_eq!(&frame[6..10], &[0x90, 0x01, 0xFC, 0x02]);
        assert_eq!(frame.len(), 5 + 2 + 7 * 4);
    }

    #[test]
    fn test_find_band() {
        assert_eq!(
            find_band().encode()[0].payload,
            vec![0x22, 0x01, 0x00, 0x00, 0x5A]
        );
    }
}
