//! Family A history streams: steps, sleep and heart rate
//!
//! Request `05 kk day_offset`; the band answers with two or three header
//! frames, 16-byte data frames and the terminal `05 kk FF`. Entries carry no
//! index of their own: their position in the payload is the time bucket.

use super::{codes, reply, CLASS_HISTORY};
use crate::bitfield::{bytes_to_uint, unpack_bits};
use crate::datetime::{day_offset, decode_date, DayWindow, YearBase};
use crate::reassembly::{Assembled, GapPolicy, HistoryCommand, ReassemblyLayout, SeqField};
use crate::records::{
    HeartRateRecord, HeartRateSample, HeartRateSummary, SleepRecord, SleepSegment, SleepSummary,
    StepSlot, StepsRecord, StepsSummary,
};
use crate::command::Completion;
use crate::types::{CommandError, CommandResult, Result};
use chrono::{NaiveDate, NaiveDateTime};
use log::debug;

const KIND_STEPS: u8 = 0x01;
const KIND_SLEEP: u8 = 0x02;
const KIND_HEART_RATE: u8 = 0x03;
const KEY_RESEND: u8 = 0x0F;

const MAX_DAYS_BACK: u8 = 6;
const DATA_PAYLOAD: usize = 16;
const STEP_BUCKET_MINUTES: u32 = 15;
const HR_BUCKET_MINUTES: u32 = 5;

type Issued<T> = (HistoryCommand<T>, Completion<T>);

fn is_terminal(frame: &[u8]) -> bool {
    frame.len() == 3 && frame[2] == 0xFF
}

/// `05 kk year:u16le MM dd total_len:u16le`
fn declared_len(header: &[u8]) -> Option<usize> {
    header.get(6..8).map(|b| bytes_to_uint(b, false) as usize)
}

fn layout(header_min_sizes: Vec<usize>) -> ReassemblyLayout {
    ReassemblyLayout {
        header_min_sizes,
        seq: SeqField::U8,
        seq_offset: 2,
        valid_len_offset: 3,
        payload_offset: 4,
        payload_size: DATA_PAYLOAD,
        is_terminal,
        declared_len,
        // This generation never reports lost frames
        gap_policy: GapPolicy::Trust,
    }
}

fn request(kind: u8, date: NaiveDate, now: NaiveDateTime) -> Result<Vec<u8>> {
    Ok(vec![CLASS_HISTORY, kind, day_offset(date, now, MAX_DAYS_BACK)?])
}

fn resend(kind: u8) -> impl Fn(u32) -> Option<Vec<u8>> + Send + 'static {
    move |seq| {
        let index = u8::try_from(seq).ok()?;
        Some(vec![CLASS_HISTORY, KEY_RESEND, kind, index])
    }
}

fn window(assembled: &Assembled, now: NaiveDateTime) -> CommandResult<DayWindow> {
    assembled
        .header(0)
        .get(2..)
        .and_then(|b| decode_date(b, YearBase::Absolute, false))
        .map(|date| DayWindow::new(date, now))
        .ok_or(CommandError::InvalidLength)
}

fn le(bytes: &[u8]) -> u64 {
    bytes_to_uint(bytes, false)
}

pub fn steps_history(date: NaiveDate, now: NaiveDateTime) -> Result<Issued<StepsRecord>> {
    Ok(HistoryCommand::new(
        "A steps history",
        request(KIND_STEPS, date, now)?,
        reply(CLASS_HISTORY, KIND_STEPS, 3),
        layout(vec![8, 12, 5]),
        move |a| parse_steps(a, now),
        resend(KIND_STEPS),
    ))
}

fn parse_steps(a: &Assembled, now: NaiveDateTime) -> CommandResult<StepsRecord> {
    let window = window(a, now)?;
    let (totals, activity) = (a.header(1), a.header(2));
    let summary = StepsSummary {
        steps: le(&totals[2..6]) as u32,
        calories: le(&totals[6..8]) as u32,
        distance_m: le(&totals[8..12]) as u32,
        active_minutes: Some(le(&activity[2..4]) as u16),
        goal_percent: Some(activity[4]),
    };

    let mut slots = Vec::new();
    for (i, chunk) in a.payload.chunks_exact(6).enumerate() {
        let index = i as u32;
        if !window.admits(index, STEP_BUCKET_MINUTES) {
            debug!("Steps: stopping at bucket {} for today", index);
            break;
        }
        let start = window.bucket_start(index, STEP_BUCKET_MINUTES);
        slots.push(StepSlot::unpack(index, start, chunk));
    }

    Ok(StepsRecord {
        date: window.date,
        summary,
        slots,
    })
}

pub fn sleep_history(date: NaiveDate, now: NaiveDateTime) -> Result<Issued<SleepRecord>> {
    Ok(HistoryCommand::new(
        "A sleep history",
        request(KIND_SLEEP, date, now)?,
        reply(CLASS_HISTORY, KIND_SLEEP, 3),
        layout(vec![8, 10]),
        move |a| parse_sleep(a, now),
        resend(KIND_SLEEP),
    ))
}

/// Entries: `[3 stage, 11 start minute, 10 duration, 8 movement]`
fn parse_sleep(a: &Assembled, now: NaiveDateTime) -> CommandResult<SleepRecord> {
    let window = window(a, now)?;
    let h = a.header(1);
    let summary = SleepSummary {
        total_minutes: le(&h[2..4]) as u16,
        deep_minutes: le(&h[4..6]) as u16,
        light_minutes: le(&h[6..8]) as u16,
        awake_minutes: le(&h[8..10]) as u16,
        rem_minutes: None,
    };

    let anchor = window.sleep_anchor();
    let mut segments = Vec::new();
    for entry in a.payload.chunks_exact(4) {
        let f = unpack_bits(entry, &[3, 11, 10, 8]);
        let start = anchor + chrono::Duration::minutes(i64::from(f[1]));
        if window.is_today() && start > now {
            break;
        }
        let Some(stage) = codes::sleep_stage(f[0] as u8) else {
            debug!("Sleep: skipping unknown stage {}", f[0]);
            continue;
        };
        segments.push(SleepSegment {
            stage,
            start,
            duration_minutes: f[2] as u16,
            movement: Some(f[3] as u8),
        });
    }

    Ok(SleepRecord {
        date: window.date,
        summary,
        segments,
    })
}

pub fn heart_rate_history(
    date: NaiveDate,
    now: NaiveDateTime,
) -> Result<Issued<HeartRateRecord>> {
    Ok(HistoryCommand::new(
        "A heart rate history",
        request(KIND_HEART_RATE, date, now)?,
        reply(CLASS_HISTORY, KIND_HEART_RATE, 3),
        layout(vec![8, 5]),
        move |a| parse_heart_rate(a, now),
        resend(KIND_HEART_RATE),
    ))
}

/// One bpm byte per bucket; zero means no sample
fn parse_heart_rate(a: &Assembled, now: NaiveDateTime) -> CommandResult<HeartRateRecord> {
    let window = window(a, now)?;
    let h = a.header(1);
    let summary = HeartRateSummary {
        resting: h[2],
        max: h[3],
        average: h[4],
        min: None,
    };

    let samples = a
        .payload
        .iter()
        .enumerate()
        .map(|(i, &bpm)| (i as u32, bpm))
        .take_while(|&(index, _)| window.admits(index, HR_BUCKET_MINUTES))
        .filter(|&(_, bpm)| bpm != 0)
        .map(|(index, bpm)| HeartRateSample {
            index,
            time: window.bucket_start(index, HR_BUCKET_MINUTES),
            bpm,
        })
        .collect();

    Ok(HeartRateRecord {
        date: window.date,
        summary,
        samples,
    })
}
