//! Family C history streams: heart rate and sport sessions
//!
//! Every frame of the stream is enveloped. Data frames carry a two-byte
//! sequence number and up to 64 payload bytes; the terminal frame is a data
//! frame with sequence `FFFF` and no payload.

use super::{codes, reply, request, CLASS_HISTORY, ENVELOPE_LEN};
use crate::bitfield::bytes_to_uint;
use crate::command::Completion;
use crate::datetime::{day_offset, decode_date, DayWindow, YearBase};
use crate::reassembly::{
    Assembled, GapPolicy, HistoryCommand, IndexUnwrapper, ReassemblyLayout, SeqField,
};
use crate::records::{
    HeartRateRecord, HeartRateSample, HeartRateSummary, SportRecord, SportSession,
};
use crate::types::{CommandError, CommandResult, Result};
use chrono::{NaiveDate, NaiveDateTime};
use log::debug;

const KIND_HEART_RATE: u8 = 0x01;
const KIND_SPORT: u8 = 0x02;
const KEY_RESEND: u8 = 0x0F;

const MAX_DAYS_BACK: u8 = 6;
const DATA_PAYLOAD: usize = 64;
const HR_BUCKET_MINUTES: u32 = 5;
const SPORT_ENTRY_LEN: usize = 14;

type Issued<T> = (HistoryCommand<T>, Completion<T>);

/// `25 kk 0300 FF FF 00 A5`
fn is_terminal(frame: &[u8]) -> bool {
    frame.len() == ENVELOPE_LEN + 3 && frame[4] == 0xFF && frame[5] == 0xFF
}

/// H1 payload `year:u16le MM dd total_len:u32le`
fn declared_len(header: &[u8]) -> Option<usize> {
    header.get(8..12).map(|b| bytes_to_uint(b, false) as usize)
}

fn layout(header_min_sizes: Vec<usize>) -> ReassemblyLayout {
    ReassemblyLayout {
        header_min_sizes,
        seq: SeqField::U16Le,
        seq_offset: 4,
        valid_len_offset: 6,
        payload_offset: 7,
        payload_size: DATA_PAYLOAD,
        is_terminal,
        declared_len,
        gap_policy: GapPolicy::Detect,
    }
}

/// `FFFF` is the terminal sequence and never a data frame
fn resend(kind: u8) -> impl Fn(u32) -> Option<Vec<u8>> + Send + 'static {
    move |seq| {
        let idx = u16::try_from(seq).ok().filter(|&i| i != u16::MAX)?.to_le_bytes();
        Some(request(CLASS_HISTORY, KEY_RESEND, &[kind, idx[0], idx[1]]))
    }
}

fn window(assembled: &Assembled, now: NaiveDateTime) -> CommandResult<DayWindow> {
    assembled
        .header(0)
        .get(4..)
        .and_then(|b| decode_date(b, YearBase::Since2000, false))
        .map(|date| DayWindow::new(date, now))
        .ok_or(CommandError::InvalidLength)
}

fn epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2000, 1, 1)
        .unwrap_or_default()
        .and_time(chrono::NaiveTime::default())
}

pub fn heart_rate_history(
    date: NaiveDate,
    now: NaiveDateTime,
) -> Result<Issued<HeartRateRecord>> {
    let offset = day_offset(date, now, MAX_DAYS_BACK)?;
    Ok(HistoryCommand::new(
        "C heart rate history",
        request(CLASS_HISTORY, KIND_HEART_RATE, &[offset]),
        reply(CLASS_HISTORY, KIND_HEART_RATE, ENVELOPE_LEN + 2),
        layout(vec![13, 9]),
        move |a| parse_heart_rate(a, now),
        resend(KIND_HEART_RATE),
    ))
}

/// H2 payload `resting max avg min`, entries `index bpm`
fn parse_heart_rate(a: &Assembled, now: NaiveDateTime) -> CommandResult<HeartRateRecord> {
    let window = window(a, now)?;
    let h = a.header(1);
    let summary = HeartRateSummary {
        resting: h[4],
        max: h[5],
        average: h[6],
        min: Some(h[7]),
    };

    let mut unwrap = IndexUnwrapper::new();
    let mut samples = Vec::new();
    for entry in a.payload.chunks_exact(2) {
        let index = unwrap.next(entry[0]);
        if !window.admits(index, HR_BUCKET_MINUTES) {
            break;
        }
        if entry[1] != 0 {
            samples.push(HeartRateSample {
                index,
                time: window.bucket_start(index, HR_BUCKET_MINUTES),
                bpm: entry[1],
            });
        }
    }

    Ok(HeartRateRecord {
        date: window.date,
        summary,
        samples,
    })
}

pub fn sport_history(date: NaiveDate, now: NaiveDateTime) -> Result<Issued<SportRecord>> {
    let offset = day_offset(date, now, MAX_DAYS_BACK)?;
    Ok(HistoryCommand::new(
        "C sport history",
        request(CLASS_HISTORY, KIND_SPORT, &[offset]),
        reply(CLASS_HISTORY, KIND_SPORT, ENVELOPE_LEN + 2),
        layout(vec![13, 7]),
        move |a| parse_sport(a, now),
        resend(KIND_SPORT),
    ))
}

/// Entries: `start:u32le` seconds since 2000-01-01 and a packed sport slot
fn parse_sport(a: &Assembled, now: NaiveDateTime) -> CommandResult<SportRecord> {
    let window = window(a, now)?;
    let h = a.header(1);
    let count = u16::from_le_bytes([h[4], h[5]]);

    let mut sessions = Vec::new();
    for entry in a.payload.chunks_exact(SPORT_ENTRY_LEN) {
        let seconds = bytes_to_uint(&entry[..4], false) as i64;
        let start = epoch() + chrono::Duration::seconds(seconds);
        if window.is_today() && start > now {
            break;
        }
        sessions.push(SportSession::unpack(start, &entry[4..], codes::sport));
    }
    debug!("Sport: {} of {} sessions decoded", sessions.len(), count);

    Ok(SportRecord {
        date: window.date,
        sessions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitfield::pack_bits;
    use crate::command::{Command, Effects};
    use crate::records::SportType;
    use crate::types::{DecodeStatus, Request};

    fn at(d: u32, hh: u32, mm: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, d)
            .unwrap()
            .and_hms_opt(hh, mm, 0)
            .unwrap()
    }

    fn reply_frame(kind: u8, payload: &[u8]) -> Vec<u8> {
        let mut f = vec![CLASS_HISTORY, kind];
        f.extend_from_slice(&(payload.len() as u16).to_le_bytes());
        f.extend_from_slice(payload);
        f.push(0xA5);
        f
    }

    fn header1(kind: u8, day: u8, total: usize) -> Vec<u8> {
        let mut p = vec![24, 0, 3, day];
        p.extend_from_slice(&(total as u32).to_le_bytes());
        reply_frame(kind, &p)
    }

    fn data_frames(kind: u8, payload: &[u8]) -> Vec<Vec<u8>> {
        payload
            .chunks(DATA_PAYLOAD)
            .enumerate()
            .map(|(i, chunk)| {
                let mut p = (i as u16 + 1).to_le_bytes().to_vec();
                p.push(chunk.len() as u8);
                p.extend_from_slice(chunk);
                reply_frame(kind, &p)
            })
            .collect()
    }

    fn terminal(kind: u8) -> Vec<u8> {
        reply_frame(kind, &[0xFF, 0xFF, 0x00])
    }

    #[test]
    fn test_request_and_resend_frames() {
        let now = at(10, 12, 0);
        let (cmd, _) = sport_history(at(8, 0, 0).date(), now).unwrap();
        assert_eq!(
            cmd.encode()[0].payload,
            vec![0x25, 0x02, 0x01, 0x00, 0x02, 0x5A]
        );
        assert_eq!(
            resend(KIND_HEART_RATE)(300),
            Some(vec![0x25, 0x0F, 0x03, 0x00, 0x01, 0x2C, 0x01, 0x5A])
        );
        assert_eq!(resend(KIND_HEART_RATE)(0xFFFF), None);
        assert_eq!(resend(KIND_HEART_RATE)(0x1_0000), None);
    }

    #[test]
    fn test_declared_length_past_sequence_range() {
        let now = at(10, 20, 0);
        let (mut cmd, mut done) = heart_rate_history(now.date(), now).unwrap();
        let mut fx = Effects::new();
        // 70000 frames of 64 bytes cannot be numbered by a u16
        cmd.decode(&header1(KIND_HEART_RATE, 10, DATA_PAYLOAD * 70_000), &mut fx);
        cmd.decode(&reply_frame(KIND_HEART_RATE, &[55, 150, 80, 48]), &mut fx);
        assert_eq!(
            cmd.decode(&terminal(KIND_HEART_RATE), &mut fx),
            DecodeStatus::InvalidLength
        );
        assert!(fx.requests.is_empty());
        assert_eq!(done.try_take(), Some(Err(CommandError::InvalidLength)));
    }

    #[test]
    fn test_heart_rate_with_resend() {
        let now = at(10, 20, 0);
        // 100 entries: indices 0..100, bpm 60 + i % 20
        let payload: Vec<u8> = (0..100u8).flat_map(|i| [i, 60 + i % 20]).collect();
        let data = data_frames(KIND_HEART_RATE, &payload);
        assert_eq!(data.len(), 4);

        let (mut cmd, mut done) = heart_rate_history(now.date(), now).unwrap();
        let mut fx = Effects::new();
        cmd.decode(&header1(KIND_HEART_RATE, 10, payload.len()), &mut fx);
        cmd.decode(&reply_frame(KIND_HEART_RATE, &[55, 150, 80, 48]), &mut fx);
        for frame in [&data[0], &data[1], &data[3]] {
            assert_eq!(cmd.decode(frame, &mut fx), DecodeStatus::Incomplete);
        }
        assert_eq!(
            cmd.decode(&terminal(KIND_HEART_RATE), &mut fx),
            DecodeStatus::ItemMissed
        );
        assert_eq!(
            fx.requests,
            vec![Request::control(vec![
                0x25, 0x0F, 0x03, 0x00, KIND_HEART_RATE, 0x03, 0x00, 0x5A
            ])]
        );

        assert_eq!(cmd.decode(&data[2], &mut fx), DecodeStatus::Completed);
        let record = done.try_take().unwrap().unwrap();
        assert_eq!(record.summary.min, Some(48));
        assert_eq!(record.samples.len(), 100);
        assert_eq!(record.samples[99].time, at(10, 8, 15));
        assert_eq!(record.samples[99].bpm, 79);
    }

    #[test]
    fn test_heart_rate_today_cutoff() {
        let now = at(10, 0, 12);
        let payload: Vec<u8> = (0..10u8).flat_map(|i| [i, 70]).collect();
        let mut frames = vec![
            header1(KIND_HEART_RATE, 10, payload.len()),
            reply_frame(KIND_HEART_RATE, &[55, 150, 80, 48]),
        ];
        frames.extend(data_frames(KIND_HEART_RATE, &payload));
        frames.push(terminal(KIND_HEART_RATE));

        let (mut cmd, mut done) = heart_rate_history(now.date(), now).unwrap();
        let mut fx = Effects::new();
        for f in &frames {
            cmd.decode(f, &mut fx);
        }
        // 00:12 lies in bucket 2
        assert_eq!(done.try_take().unwrap().unwrap().samples.len(), 3);
    }

    #[test]
    fn test_sport_golden() {
        let now = at(10, 12, 0);
        // 2024-03-09 06:45 is 763_281_900 s after 2000-01-01
        let start = (at(9, 6, 45) - epoch()).num_seconds() as u32;
        assert_eq!(start, 763_281_900);
        let mut payload = start.to_le_bytes().to_vec();
        payload.extend(pack_bits(&[
            (0x0C, 6),
            (55, 10),
            (120, 16),
            (190, 14),
            (0, 18),
            (98, 8),
            (121, 8),
        ]));

        let mut frames = vec![
            header1(KIND_SPORT, 9, payload.len()),
            reply_frame(KIND_SPORT, &[1, 0]),
        ];
        frames.extend(data_frames(KIND_SPORT, &payload));
        frames.push(terminal(KIND_SPORT));

        let (mut cmd, mut done) = sport_history(at(9, 0, 0).date(), now).unwrap();
        let mut fx = Effects::new();
        let statuses: Vec<DecodeStatus> = frames.iter().map(|f| cmd.decode(f, &mut fx)).collect();
        assert_eq!(statuses.last(), Some(&DecodeStatus::Completed));
        let record = done.try_take().unwrap().unwrap();
        assert_eq!(record.date, at(9, 0, 0).date());
        let s = record.sessions[0];
        assert_eq!(s.sport, SportType::Yoga);
        assert_eq!(s.start, at(9, 6, 45));
        assert_eq!(s.duration_minutes, 55);
        assert_eq!(s.calories, 190);
        assert_eq!(s.average_hr, 98);
    }

    #[test]
    fn test_envelope_length_mismatch() {
        let now = at(10, 12, 0);
        let (mut cmd, mut done) = heart_rate_history(now.date(), now).unwrap();
        let mut fx = Effects::new();
        let mut frame = header1(KIND_HEART_RATE, 10, 4);
        frame[2] = 0x09;
        assert_eq!(cmd.decode(&frame, &mut fx), DecodeStatus::InvalidLength);
        assert_eq!(done.try_take(), Some(Err(CommandError::InvalidLength)));
    }
}
