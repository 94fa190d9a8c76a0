//! Family A single-frame commands

use super::{codes, reply, CLASS_CONTROL, CLASS_DEVICE, CLASS_SETTINGS};
use crate::command::{status_at, Completion, FireAndForget, SimpleCommand};
use crate::records::{
    check_alarm_count, Alarm, BatteryStatus, ClockSetting, DeviceInfo, UserInfo, WeatherReport,
};
use crate::types::{BandError, Family, Result};
use chrono::{Datelike, Timelike};

const MAX_ALARMS: usize = 3;

type Issued<T> = (SimpleCommand<T>, Completion<T>);

pub fn device_info() -> Issued<DeviceInfo> {
    SimpleCommand::new(
        "A device info",
        vec![CLASS_DEVICE, 0x01],
        reply(CLASS_DEVICE, 0x01, 9),
        |f| {
            Ok(DeviceInfo {
                family: Family::A,
                firmware: format!("{}.{}.{}", f[2], f[3], f[4]),
                battery: f[5],
                hardware_revision: Some(f[6]),
                model_code: Some(u16::from_le_bytes([f[7], f[8]])),
                serial: None,
                screen: None,
                name: None,
            })
        },
    )
}

pub fn battery() -> Issued<BatteryStatus> {
    SimpleCommand::new(
        "A battery",
        vec![CLASS_DEVICE, 0x02],
        reply(CLASS_DEVICE, 0x02, 4),
        |f| {
            Ok(BatteryStatus {
                level: f[2],
                charging: f[3] != 0,
            })
        },
    )
}

fn setter(name: &'static str, key: u8, payload: &[u8]) -> Issued<()> {
    let mut request = vec![CLASS_SETTINGS, key];
    request.extend_from_slice(payload);
    SimpleCommand::new(name, request, reply(CLASS_SETTINGS, key, 3), |f| {
        status_at(f, 2)
    })
}

pub fn set_time(clock: ClockSetting) -> Result<Issued<()>> {
    let t = clock.local;
    let year = u16::try_from(t.year())
        .map_err(|_| BandError::InvalidParameter(format!("year {}", t.year())))?;
    let y = year.to_le_bytes();
    Ok(setter(
        "A set time",
        0x01,
        &[
            y[0],
            y[1],
            t.month() as u8,
            t.day() as u8,
            t.hour() as u8,
            t.minute() as u8,
            t.second() as u8,
            codes::weekday(t.weekday()),
        ],
    ))
}

pub fn set_user_info(info: &UserInfo) -> Result<Issued<()>> {
    let UserInfo::A {
        height_cm,
        weight_kg,
        gender,
        age,
        stride_cm,
        step_goal,
    } = info
    else {
        return Err(BandError::Unsupported {
            family: Family::A,
            what: format!("user info for family {}", info.family()),
        });
    };
    let mut payload = vec![*height_cm, *weight_kg, codes::gender(*gender), *age, *stride_cm];
    payload.extend_from_slice(&step_goal.to_le_bytes());
    Ok(setter("A set user info", 0x02, &payload))
}

/// A disabled alarm is sent with an empty day mask
pub fn set_alarms(alarms: &[Alarm]) -> Result<Issued<()>> {
    check_alarm_count(alarms, MAX_ALARMS)?;
    let mut payload = vec![alarms.len() as u8];
    for alarm in alarms {
        let kind = codes::alarm_kind(alarm.kind).ok_or_else(|| BandError::Unsupported {
            family: Family::A,
            what: format!("{:?} alarm", alarm.kind),
        })?;
        let mask = if alarm.enabled {
            codes::weekday_mask(&alarm.days)
        } else {
            0
        };
        payload.extend_from_slice(&[alarm.id, kind, alarm.hour, alarm.minute, mask]);
    }
    Ok(setter("A set alarms", 0x03, &payload))
}

pub fn set_weather(report: &WeatherReport) -> Result<Issued<()>> {
    let (low, high) = report.today_range();
    Ok(setter(
        "A set weather",
        0x04,
        &[
            codes::weather(report.condition),
            report.current as u8,
            low as u8,
            high as u8,
            report.humidity,
        ],
    ))
}

/// Make the band vibrate; there is no reply
pub fn find_band() -> FireAndForget {
    FireAndForget::new("A find band", vec![CLASS_CONTROL, 0x01])
}

/// Enter or leave remote-camera mode
pub fn camera_mode(on: bool) -> Issued<()> {
    SimpleCommand::new(
        "A camera mode",
        vec![CLASS_CONTROL, 0x02, u8::from(on)],
        reply(CLASS_CONTROL, 0x02, 3),
        |f| status_at(f, 2),
    )
}
