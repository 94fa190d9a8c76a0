//! Credit-based chunked upload
//!
//! ```text
//! Idle --start ok--> AwaitingPrn --grant(n)--> Transferring --grant(n)--> ...
//!                                                   |
//!                                  payload exhausted, end frame sent
//!                                                   v
//!                                              AwaitingEnd --ack--> Completed
//!                                                   \--timeout code / bad crc--> TimedOut
//! ```
//!
//! Only the start, PRN and end frames are correlated. Chunks are written to
//! the bulk channel without acknowledgement; after each burst of `n` chunks
//! the uploader waits for the band to grant more credit.

use crate::command::{Command, Completion, Effects, Reply};
use crate::events::{BandEvent, TransferProgress, TransferState};
use crate::types::{CommandError, CorrelationKey, DecodeStatus, Request};
use crc::{Crc, CRC_32_ISO_HDLC};
use log::{debug, info, warn};
use std::fmt;

const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// Checksum carried by the end-of-transfer frame
pub fn checksum(data: &[u8]) -> u32 {
    CRC32.checksum(data)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferPhase {
    Idle,
    AwaitingPrn,
    Transferring,
    AwaitingEnd,
    Completed,
    TimedOut,
}

impl fmt::Display for TransferPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferPhase::Idle => write!(f, "IDLE"),
            TransferPhase::AwaitingPrn => write!(f, "AWAITING_PRN"),
            TransferPhase::Transferring => write!(f, "TRANSFERRING"),
            TransferPhase::AwaitingEnd => write!(f, "AWAITING_END"),
            TransferPhase::Completed => write!(f, "COMPLETED"),
            TransferPhase::TimedOut => write!(f, "TIMED_OUT"),
        }
    }
}

/// A transfer control reply, as understood by the family codec
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferReply {
    Foreign,
    Malformed,
    Started { status: u8 },
    Grant { prn: u16 },
    Ended { status: u8, crc: u32 },
}

/// Wire format of one family's transfer protocol
pub trait TransferCodec: Send {
    fn start_request(&self, total: usize, chunk_size: usize) -> Vec<u8>;
    fn prn_request(&self) -> Vec<u8>;
    fn chunk(&self, offset: usize, bytes: &[u8]) -> Vec<u8>;
    fn end_request(&self, crc: u32) -> Vec<u8>;
    fn classify(&self, frame: &[u8]) -> TransferReply;

    /// Status code meaning the band gave up waiting
    fn timeout_status(&self) -> u8;
}

/// Outcome of a successful upload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferSummary {
    pub bytes: usize,
    pub chunks: usize,
    pub crc: u32,
}

pub struct FileTransfer<C: TransferCodec> {
    name: &'static str,
    key: CorrelationKey,
    codec: C,
    data: Vec<u8>,
    chunk_size: usize,
    offset: usize,
    chunks_sent: usize,
    crc: u32,
    phase: TransferPhase,
    reply: Reply<TransferSummary>,
}

impl<C: TransferCodec> FileTransfer<C> {
    pub fn new(
        name: &'static str,
        codec: C,
        data: Vec<u8>,
        chunk_size: usize,
    ) -> (Self, Completion<TransferSummary>) {
        let (reply, completion) = Reply::channel();
        let crc = checksum(&data);
        let transfer = Self {
            name,
            key: CorrelationKey::next(),
            codec,
            data,
            chunk_size: chunk_size.max(1),
            offset: 0,
            chunks_sent: 0,
            crc,
            phase: TransferPhase::Idle,
            reply,
        };
        (transfer, completion)
    }

    pub fn phase(&self) -> TransferPhase {
        self.phase
    }

    pub fn sent(&self) -> usize {
        self.offset
    }

    fn progress(&self, effects: &mut Effects, state: TransferState) {
        effects.emit(BandEvent::WatchFaceTransfer(TransferProgress {
            state,
            sent: self.offset,
            total: self.data.len(),
        }));
    }

    fn time_out(&mut self, effects: &mut Effects, error: CommandError) {
        warn!("{}: {} -> TIMED_OUT ({})", self.name, self.phase, error);
        self.phase = TransferPhase::TimedOut;
        self.progress(effects, TransferState::TimedOut);
        self.reply.fail(error);
    }

    fn send_burst(&mut self, prn: u16, effects: &mut Effects) {
        let mut budget = usize::from(prn);
        while budget > 0 && self.offset < self.data.len() {
            let end = (self.offset + self.chunk_size).min(self.data.len());
            let frame = self.codec.chunk(self.offset, &self.data[self.offset..end]);
            effects.send(Request::bulk(frame));
            self.offset = end;
            self.chunks_sent += 1;
            budget -= 1;
        }
        debug!(
            "{}: burst of {} chunks, {}/{} bytes",
            self.name,
            usize::from(prn) - budget,
            self.offset,
            self.data.len()
        );

        if self.offset >= self.data.len() {
            effects.send(Request::control(self.codec.end_request(self.crc)));
            self.phase = TransferPhase::AwaitingEnd;
            self.progress(effects, TransferState::AwaitingEnd);
        } else {
            self.phase = TransferPhase::Transferring;
            self.progress(effects, TransferState::Sending);
        }
    }
}

impl<C: TransferCodec> Command for FileTransfer<C> {
    fn name(&self) -> &'static str {
        self.name
    }

    fn key(&self) -> Option<CorrelationKey> {
        Some(self.key)
    }

    fn encode(&self) -> Vec<Request> {
        vec![Request::control(
            self.codec.start_request(self.data.len(), self.chunk_size),
        )]
    }

    fn decode(&mut self, frame: &[u8], effects: &mut Effects) -> DecodeStatus {
        if matches!(self.phase, TransferPhase::Completed | TransferPhase::TimedOut) {
            return DecodeStatus::Incompatible;
        }

        match (self.phase, self.codec.classify(frame)) {
            (_, TransferReply::Foreign) => DecodeStatus::Incompatible,
            (_, TransferReply::Malformed) => {
                self.time_out(effects, CommandError::InvalidLength);
                DecodeStatus::InvalidLength
            }
            (TransferPhase::Idle, TransferReply::Started { status: 0 }) => {
                info!("{}: band accepted {} bytes", self.name, self.data.len());
                self.phase = TransferPhase::AwaitingPrn;
                self.progress(effects, TransferState::Started);
                effects.send(Request::control(self.codec.prn_request()));
                DecodeStatus::Incomplete
            }
            (TransferPhase::Idle, TransferReply::Started { status }) => {
                self.time_out(effects, CommandError::Rejected { code: status });
                DecodeStatus::Completed
            }
            (TransferPhase::AwaitingPrn | TransferPhase::Transferring, TransferReply::Grant { prn }) => {
                if prn == 0 {
                    debug!("{}: zero credit, waiting for next grant", self.name);
                    return DecodeStatus::Incomplete;
                }
                self.send_burst(prn, effects);
                DecodeStatus::Incomplete
            }
            (TransferPhase::AwaitingEnd, TransferReply::Grant { .. }) => {
                debug!("{}: surplus grant ignored", self.name);
                DecodeStatus::Incomplete
            }
            (TransferPhase::AwaitingEnd, TransferReply::Ended { status, crc }) => {
                if status == self.codec.timeout_status() {
                    self.time_out(effects, CommandError::Timeout);
                } else if status != 0 {
                    self.time_out(effects, CommandError::Rejected { code: status });
                } else if crc != self.crc {
                    self.time_out(
                        effects,
                        CommandError::ChecksumMismatch {
                            sent: self.crc,
                            device: crc,
                        },
                    );
                } else {
                    info!("{}: completed, crc {:#010x}", self.name, crc);
                    self.phase = TransferPhase::Completed;
                    self.progress(effects, TransferState::Completed);
                    self.reply.succeed(TransferSummary {
                        bytes: self.data.len(),
                        chunks: self.chunks_sent,
                        crc: self.crc,
                    });
                }
                DecodeStatus::Completed
            }
            (phase, reply) => {
                warn!("{}: {:?} not expected in {}", self.name, reply, phase);
                DecodeStatus::Incompatible
            }
        }
    }

    fn on_failure(&mut self, error: CommandError) {
        if !matches!(self.phase, TransferPhase::Completed | TransferPhase::TimedOut) {
            self.phase = TransferPhase::TimedOut;
        }
        self.reply.fail(error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal codec: one-byte opcodes, replies `[op, ...]`
    struct TestCodec;

    impl TransferCodec for TestCodec {
        fn start_request(&self, total: usize, chunk_size: usize) -> Vec<u8> {
            vec![0x01, total as u8, chunk_size as u8]
        }
        fn prn_request(&self) -> Vec<u8> {
            vec![0x02]
        }
        fn chunk(&self, offset: usize, bytes: &[u8]) -> Vec<u8> {
            let mut f = vec![0x03, offset as u8];
            f.extend_from_slice(bytes);
            f
        }
        fn end_request(&self, crc: u32) -> Vec<u8> {
            let mut f = vec![0x04];
            f.extend_from_slice(&crc.to_le_bytes());
            f
        }
        fn classify(&self, frame: &[u8]) -> TransferReply {
            match frame {
                [0x81, status] => TransferReply::Started { status: *status },
                [0x82, lo, hi] => TransferReply::Grant {
                    prn: u16::from_le_bytes([*lo, *hi]),
                },
                [0x84, status, a, b, c, d] => TransferReply::Ended {
                    status: *status,
                    crc: u32::from_le_bytes([*a, *b, *c, *d]),
                },
                [0x81 | 0x82 | 0x84, ..] => TransferReply::Malformed,
                _ => TransferReply::Foreign,
            }
        }
        fn timeout_status(&self) -> u8 {
            2
        }
    }

    fn end_reply(status: u8, crc: u32) -> Vec<u8> {
        let mut f = vec![0x84, status];
        f.extend_from_slice(&crc.to_le_bytes());
        f
    }

    fn bulk_count(fx: &Effects) -> usize {
        fx.requests
            .iter()
            .filter(|r| r.role == crate::types::ChannelRole::Bulk)
            .count()
    }

    #[test]
    fn test_checksum_known_vector() {
        assert_eq!(checksum(b"123456789"), 0xCBF4_3926);
    }

    #[test]
    fn test_happy_path() {
        let data: Vec<u8> = (0..25).collect();
        let (mut t, mut completion) = FileTransfer::new("upload", TestCodec, data.clone(), 10);
        assert_eq!(t.encode()[0].payload, vec![0x01, 25, 10]);

        let mut fx = Effects::new();
        assert_eq!(t.decode(&[0x81, 0x00], &mut fx), DecodeStatus::Incomplete);
        assert_eq!(t.phase(), TransferPhase::AwaitingPrn);
        assert_eq!(fx.requests.last().unwrap().payload, vec![0x02]);

        let mut fx = Effects::new();
        assert_eq!(t.decode(&[0x82, 0x02, 0x00], &mut fx), DecodeStatus::Incomplete);
        assert_eq!(bulk_count(&fx), 2);
        assert_eq!(t.phase(), TransferPhase::Transferring);
        assert_eq!(t.sent(), 20);

        let mut fx = Effects::new();
        t.decode(&[0x82, 0x05, 0x00], &mut fx);
        assert_eq!(bulk_count(&fx), 1);
        assert_eq!(t.phase(), TransferPhase::AwaitingEnd);
        let end = fx.requests.last().unwrap();
        assert_eq!(end.payload[0], 0x04);
        assert!(end.correlated);

        let mut fx = Effects::new();
        assert_eq!(
            t.decode(&end_reply(0, checksum(&data)), &mut fx),
            DecodeStatus::Completed
        );
        assert_eq!(t.phase(), TransferPhase::Completed);
        let summary = completion.try_take().unwrap().unwrap();
        assert_eq!(summary.bytes, 25);
        assert_eq!(summary.chunks, 3);
        assert_eq!(
            fx.events.last(),
            Some(&BandEvent::WatchFaceTransfer(TransferProgress {
                state: TransferState::Completed,
                sent: 25,
                total: 25,
            }))
        );
    }

    #[test]
    fn test_checksum_mismatch_times_out() {
        let data = vec![0xAB; 400];
        let (mut t, mut completion) = FileTransfer::new("upload", TestCodec, data.clone(), 20);
        let mut fx = Effects::new();
        t.decode(&[0x81, 0x00], &mut fx);

        let mut fx = Effects::new();
        t.decode(&[0x82, 10, 0], &mut fx);
        assert_eq!(bulk_count(&fx), 10);
        assert_eq!(t.phase(), TransferPhase::Transferring);

        let mut fx = Effects::new();
        t.decode(&[0x82, 10, 0], &mut fx);
        assert_eq!(bulk_count(&fx), 10);
        assert_eq!(t.phase(), TransferPhase::AwaitingEnd);

        let wrong = checksum(&data) ^ 0xFFFF_FFFF;
        assert_eq!(t.decode(&end_reply(0, wrong), &mut fx), DecodeStatus::Completed);
        assert_eq!(t.phase(), TransferPhase::TimedOut);
        assert!(matches!(
            completion.try_take(),
            Some(Err(CommandError::ChecksumMismatch { .. }))
        ));
    }

    #[test]
    fn test_timeout_code() {
        let (mut t, mut completion) = FileTransfer::new("upload", TestCodec, vec![1, 2, 3], 8);
        let mut fx = Effects::new();
        t.decode(&[0x81, 0x00], &mut fx);
        t.decode(&[0x82, 1, 0], &mut fx);
        t.decode(&end_reply(2, 0), &mut fx);
        assert_eq!(t.phase(), TransferPhase::TimedOut);
        assert_eq!(completion.try_take(), Some(Err(CommandError::Timeout)));
    }

    #[test]
    fn test_zero_grant_waits() {
        let (mut t, _completion) = FileTransfer::new("upload", TestCodec, vec![0; 16], 8);
        let mut fx = Effects::new();
        t.decode(&[0x81, 0x00], &mut fx);
        let mut fx = Effects::new();
        assert_eq!(t.decode(&[0x82, 0, 0], &mut fx), DecodeStatus::Incomplete);
        assert!(fx.is_empty());
        assert_eq!(t.phase(), TransferPhase::AwaitingPrn);
    }

    #[test]
    fn test_start_rejected() {
        let (mut t, mut completion) = FileTransfer::new("upload", TestCodec, vec![0; 4], 8);
        let mut fx = Effects::new();
        assert_eq!(t.decode(&[0x81, 0x01], &mut fx), DecodeStatus::Completed);
        assert_eq!(t.phase(), TransferPhase::TimedOut);
        assert_eq!(completion.try_take(), Some(Err(CommandError::Rejected { code: 1 })));
    }

    #[test]
    fn test_transport_failure_mid_transfer() {
        let (mut t, mut completion) = FileTransfer::new("upload", TestCodec, vec![0; 64], 8);
        let mut fx = Effects::new();
        t.decode(&[0x81, 0x00], &mut fx);
        t.decode(&[0x82, 1, 0], &mut fx);
        t.on_failure(CommandError::Transport("link lost".into()));
        t.on_failure(CommandError::Timeout);
        assert_eq!(t.phase(), TransferPhase::TimedOut);
        assert_eq!(
            completion.try_take(),
            Some(Err(CommandError::Transport("link lost".into())))
        );
        assert_eq!(t.decode(&[0x82, 1, 0], &mut fx), DecodeStatus::Incompatible);
    }

    #[test]
    fn test_unexpected_reply_in_phase() {
        let (mut t, _c) = FileTransfer::new("upload", TestCodec, vec![0; 4], 8);
        let mut fx = Effects::new();
        assert_eq!(t.decode(&[0x82, 1, 0], &mut fx), DecodeStatus::Incompatible);
        assert_eq!(t.decode(&[0x09], &mut fx), DecodeStatus::Incompatible);
    }
}
