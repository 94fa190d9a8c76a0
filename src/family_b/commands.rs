//! Family B single-frame commands

use super::{codes, reply, request, CLASS_CONTROL, CLASS_DEVICE, CLASS_SETTINGS};
use crate::command::{status_at, Completion, FireAndForget, SimpleCommand};
use crate::datetime::{encode_date, YearBase};
use crate::records::{check_alarm_count, Alarm, ClockSetting, DeviceInfo, UserInfo, WeatherReport};
use crate::types::{BandError, Family, Result};
use chrono::{Datelike, Timelike};

const MAX_ALARMS: usize = 4;
const ALARM_ENABLED: u8 = 0x80;

type Issued<T> = (SimpleCommand<T>, Completion<T>);

pub fn device_info() -> Issued<DeviceInfo> {
    SimpleCommand::new(
        "B device info",
        request(CLASS_DEVICE, 0x01, &[]),
        reply(CLASS_DEVICE, 0x01, 12),
        |f| {
            let serial: String = f[6..12].iter().map(|b| format!("{:02X}", b)).collect();
            Ok(DeviceInfo {
                family: Family::B,
                firmware: format!("{}.{}", f[3], f[4]),
                battery: f[5],
                hardware_revision: None,
                model_code: None,
                serial: Some(serial),
                screen: None,
                name: None,
            })
        },
    )
}

/// Settings replies are `91 kk 01 status`
fn setter(name: &'static str, key: u8, payload: &[u8]) -> Issued<()> {
    SimpleCommand::new(
        name,
        request(CLASS_SETTINGS, key, payload),
        reply(CLASS_SETTINGS, key, 4),
        |f| status_at(f, 3),
    )
}

pub fn set_time(clock: ClockSetting) -> Result<Issued<()>> {
    let t = clock.local;
    let mut payload = encode_date(t.date(), YearBase::Since1900, true)?.to_vec();
    payload.extend_from_slice(&[
        t.hour() as u8,
        t.minute() as u8,
        t.second() as u8,
        codes::weekday(t.weekday()),
    ]);
    Ok(setter("B set time", 0x01, &payload))
}

pub fn set_user_info(info: &UserInfo) -> Result<Issued<()>> {
    let UserInfo::B {
        gender,
        age,
        height_cm,
        weight_dg,
        wrist,
    } = info
    else {
        return Err(BandError::Unsupported {
            family: Family::B,
            what: format!("user info for family {}", info.family()),
        });
    };
    let mut payload = vec![codes::gender(*gender), *age];
    payload.extend_from_slice(&height_cm.to_be_bytes());
    payload.extend_from_slice(&weight_dg.to_be_bytes());
    payload.push(codes::wrist(*wrist));
    Ok(setter("B set user info", 0x02, &payload))
}

/// Entry: `enabled<<7 | type, hh, mm, mask`
pub fn set_alarms(alarms: &[Alarm]) -> Result<Issued<()>> {
    check_alarm_count(alarms, MAX_ALARMS)?;
    let mut payload = vec![alarms.len() as u8];
    for alarm in alarms {
        let flags = codes::alarm_kind(alarm.kind) | if alarm.enabled { ALARM_ENABLED } else { 0 };
        payload.extend_from_slice(&[
            flags,
            alarm.hour,
            alarm.minute,
            codes::weekday_mask(&alarm.days),
        ]);
    }
    Ok(setter("B set alarms", 0x03, &payload))
}

pub fn set_weather(report: &WeatherReport) -> Result<Issued<()>> {
    let (low, high) = report.today_range();
    let mut payload = vec![
        codes::weather(report.condition),
        report.current as u8,
        low as u8,
        high as u8,
        report.uv_index,
    ];
    payload.extend_from_slice(&report.aqi.to_be_bytes());
    Ok(setter("B set weather", 0x04, &payload))
}

pub fn find_band() -> FireAndForget {
    FireAndForget::new("B find band", request(CLASS_CONTROL, 0x01, &[]))
}
