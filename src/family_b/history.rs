//! Family B history streams: steps, sleep, heart rate and sport sessions
//!
//! Request `15 kk 01 day_offset`. Replies use class `95`: two header frames,
//! data frames `95 kk seq valid_len payload[16]` and the terminal
//! `95 kk FF 00`. Lost data frames are detected against the total length in
//! header 1 and requested again with `15 0F 02 kk seq`.

use super::{codes, reply, request, CLASS_HISTORY};
use crate::bitfield::{bytes_to_uint, unpack_bits};
use crate::command::Completion;
use crate::datetime::{day_offset, decode_date, DayWindow, YearBase};
use crate::reassembly::{
    Assembled, GapPolicy, HistoryCommand, IndexUnwrapper, ReassemblyLayout, SeqField,
};
use crate::records::{
    HeartRateRecord, HeartRateSample, HeartRateSummary, SleepRecord, SleepSegment, SleepSummary,
    SportRecord, SportSession, StepSlot, StepsRecord, StepsSummary,
};
use crate::types::{CommandError, CommandResult, Result};
use chrono::{NaiveDate, NaiveDateTime};
use log::debug;

const KIND_STEPS: u8 = 0x01;
const KIND_SLEEP: u8 = 0x02;
const KIND_HEART_RATE: u8 = 0x03;
const KIND_SPORT: u8 = 0x04;
const KEY_RESEND: u8 = 0x0F;

const MAX_DAYS_BACK: u8 = 6;
const DATA_PAYLOAD: usize = 16;
const STEP_BUCKET_MINUTES: u32 = 10;
const HR_BUCKET_MINUTES: u32 = 5;

type Issued<T> = (HistoryCommand<T>, Completion<T>);

fn is_terminal(frame: &[u8]) -> bool {
    frame.len() == 4 && frame[2] == 0xFF && frame[3] == 0x00
}

/// `95 kk year:u16be MM dd total_len:u16be`
fn declared_len(header: &[u8]) -> Option<usize> {
    header.get(6..8).map(|b| bytes_to_uint(b, true) as usize)
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
        gap_policy: GapPolicy::Detect,
    }
}

fn history_request(kind: u8, date: NaiveDate, now: NaiveDateTime) -> Result<Vec<u8>> {
    Ok(request(CLASS_HISTORY, kind, &[day_offset(date, now, MAX_DAYS_BACK)?]))
}

fn resend(kind: u8) -> impl Fn(u32) -> Option<Vec<u8>> + Send + 'static {
    move |seq| {
        let index = u8::try_from(seq).ok()?;
        Some(request(CLASS_HISTORY, KEY_RESEND, &[kind, index]))
    }
}

fn window(assembled: &Assembled, now: NaiveDateTime) -> CommandResult<DayWindow> {
    assembled
        .header(0)
        .get(2..)
        .and_then(|b| decode_date(b, YearBase::Since1900, true))
        .map(|date| DayWindow::new(date, now))
        .ok_or(CommandError::InvalidLength)
}

fn be(bytes: &[u8]) -> u64 {
    bytes_to_uint(bytes, true)
}

fn issue<T, P>(
    name: &'static str,
    kind: u8,
    headers: Vec<usize>,
    date: NaiveDate,
    now: NaiveDateTime,
    parse: P,
) -> Result<Issued<T>>
where
    T: Send + 'static,
    P: Fn(&Assembled, NaiveDateTime) -> CommandResult<T> + Send + 'static,
{
    Ok(HistoryCommand::new(
        name,
        history_request(kind, date, now)?,
        reply(CLASS_HISTORY, kind, 3),
        layout(headers),
        move |a| parse(a, now),
        resend(kind),
    ))
}

pub fn steps_history(date: NaiveDate, now: NaiveDateTime) -> Result<Issued<StepsRecord>> {
    issue("B steps history", KIND_STEPS, vec![8, 14], date, now, parse_steps)
}

/// Entries: `index` followed by a packed 6-byte slot
fn parse_steps(a: &Assembled, now: NaiveDateTime) -> CommandResult<StepsRecord> {
    let window = window(a, now)?;
    let h = a.header(1);
    let summary = StepsSummary {
        steps: be(&h[2..6]) as u32,
        calories: be(&h[6..10]) as u32,
        distance_m: be(&h[10..14]) as u32,
        active_minutes: None,
        goal_percent: None,
    };

    let mut unwrap = IndexUnwrapper::new();
    let mut slots = Vec::new();
    for entry in a.payload.chunks_exact(7) {
        let index = unwrap.next(entry[0]);
        if !window.admits(index, STEP_BUCKET_MINUTES) {
            debug!("Steps: stopping at bucket {} for today", index);
            break;
        }
        let start = window.bucket_start(index, STEP_BUCKET_MINUTES);
        slots.push(StepSlot::unpack(index, start, &entry[1..]));
    }

    Ok(StepsRecord {
        date: window.date,
        summary,
        slots,
    })
}

pub fn sleep_history(date: NaiveDate, now: NaiveDateTime) -> Result<Issued<SleepRecord>> {
    issue("B sleep history", KIND_SLEEP, vec![8, 12], date, now, parse_sleep)
}

/// Entries: `[4 stage, 11 start minute, 9 duration]`
fn parse_sleep(a: &Assembled, now: NaiveDateTime) -> CommandResult<SleepRecord> {
    let window = window(a, now)?;
    let h = a.header(1);
    let summary = SleepSummary {
        total_minutes: be(&h[2..4]) as u16,
        deep_minutes: be(&h[4..6]) as u16,
        light_minutes: be(&h[6..8]) as u16,
        awake_minutes: be(&h[8..10]) as u16,
        rem_minutes: Some(be(&h[10..12]) as u16),
    };

    let anchor = window.sleep_anchor();
    let mut segments = Vec::new();
    for entry in a.payload.chunks_exact(3) {
        let f = unpack_bits(entry, &[4, 11, 9]);
        let start = anchor + chrono::Duration::minutes(i64::from(f[1]));
        if window.is_today() && start > now {
            break;
        }
        match codes::sleep_stage(f[0] as u8) {
            Some(stage) => segments.push(SleepSegment {
                stage,
                start,
                duration_minutes: f[2] as u16,
                movement: None,
            }),
            None => debug!("Sleep: skipping unknown stage {}", f[0]),
        }
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
    issue(
        "B heart rate history",
        KIND_HEART_RATE,
        vec![8, 5],
        date,
        now,
        parse_heart_rate,
    )
}

/// Entries: `index bpm`
fn parse_heart_rate(a: &Assembled, now: NaiveDateTime) -> CommandResult<HeartRateRecord> {
    let window = window(a, now)?;
    let h = a.header(1);
    let summary = HeartRateSummary {
        resting: h[2],
        max: h[3],
        average: h[4],
        min: None,
    };

    let mut unwrap = IndexUnwrapper::new();
    let mut samples = Vec::new();
    for entry in a.payload.chunks_exact(2) {
        let index = unwrap.next(entry[0]);
        if !window.admits(index, HR_BUCKET_MINUTES) {
            break;
        }
        if entry[1] == 0 {
            continue;
        }
        samples.push(HeartRateSample {
            index,
            time: window.bucket_start(index, HR_BUCKET_MINUTES),
            bpm: entry[1],
        });
    }

    Ok(HeartRateRecord {
        date: window.date,
        summary,
        samples,
    })
}

pub fn sport_history(date: NaiveDate, now: NaiveDateTime) -> Result<Issued<SportRecord>> {
    issue("B sport history", KIND_SPORT, vec![8, 3], date, now, parse_sport)
}

/// Entries: `hh mm` followed by a packed 10-byte sport slot
fn parse_sport(a: &Assembled, now: NaiveDateTime) -> CommandResult<SportRecord> {
    let window = window(a, now)?;
    let count = usize::from(a.header(1)[2]);

    let mut sessions = Vec::new();
    for entry in a.payload.chunks_exact(12) {
        let start = window
            .date
            .and_hms_opt(u32::from(entry[0]), u32::from(entry[1]), 0)
            .ok_or(CommandError::InvalidLength)?;
        if window.is_today() && start > now {
            break;
        }
        sessions.push(SportSession::unpack(start, &entry[2..], codes::sport));
    }
    if sessions.len() != count {
        debug!("Sport: header announced {} sessions, parsed {}", count, sessions.len());
    }

    Ok(SportRecord {
        date: window.date,
        sessions,
    })
}
