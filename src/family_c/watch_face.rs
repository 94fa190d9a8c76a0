//! Family C watch-face upload codec
//!
//! ```text
//! start  30 01 0700 01 size:u32le chunk:u16le 5A   -> 30 01 0100 status A5
//! credit 30 02 0000 5A                              -> 30 02 0200 prn:u16le A5
//! chunk  30 03 len offset:u32le bytes 5A              (bulk, no reply)
//! end    30 04 0400 crc:u32le 5A                    -> 30 04 0500 status crc:u32le A5
//! ```

use super::{reply, request, CLASS_TRANSFER, ENVELOPE_LEN};
use crate::command::{Completion, Recognition};
use crate::file_transfer::{FileTransfer, TransferCodec, TransferReply, TransferSummary};
use crate::types::{BandError, Result};

const KEY_START: u8 = 0x01;
const KEY_PRN: u8 = 0x02;
const KEY_DATA: u8 = 0x03;
const KEY_END: u8 = 0x04;

const KIND_WATCH_FACE: u8 = 0x01;
const STATUS_TIMEOUT: u8 = 0x02;

const OFFSET_LEN: usize = 4;

/// Chunk frame overhead: envelope plus the offset field
const CHUNK_OVERHEAD: usize = ENVELOPE_LEN + OFFSET_LEN;

/// Largest chunk whose offset and bytes fit the envelope's u16 length
pub const MAX_CHUNK_SIZE: usize = u16::MAX as usize - OFFSET_LEN;

/// Largest chunk that fits a frame of `max_frame` bytes
pub fn chunk_size_for(max_frame: usize) -> usize {
    max_frame
        .saturating_sub(CHUNK_OVERHEAD)
        .clamp(1, MAX_CHUNK_SIZE)
}

#[derive(Debug, Default, Clone, Copy)]
pub struct WatchFaceCodec;

impl WatchFaceCodec {
    fn recognize(key: u8, min_len: usize, frame: &[u8]) -> Recognition {
        reply(CLASS_TRANSFER, key, min_len).recognize(frame)
    }
}

impl TransferCodec for WatchFaceCodec {
    fn start_request(&self, total: usize, chunk_size: usize) -> Vec<u8> {
        let mut payload = vec![KIND_WATCH_FACE];
        payload.extend_from_slice(&(total as u32).to_le_bytes());
        payload.extend_from_slice(&(chunk_size as u16).to_le_bytes());
        request(CLASS_TRANSFER, KEY_START, &payload)
    }

    fn prn_request(&self) -> Vec<u8> {
        request(CLASS_TRANSFER, KEY_PRN, &[])
    }

    fn chunk(&self, offset: usize, bytes: &[u8]) -> Vec<u8> {
        let mut payload = (offset as u32).to_le_bytes().to_vec();
        payload.extend_from_slice(bytes);
        request(CLASS_TRANSFER, KEY_DATA, &payload)
    }

    fn end_request(&self, crc: u32) -> Vec<u8> {
        request(CLASS_TRANSFER, KEY_END, &crc.to_le_bytes())
    }

    fn classify(&self, frame: &[u8]) -> TransferReply {
        let shapes = [(KEY_START, 6), (KEY_PRN, 7), (KEY_END, 10)];
        for (key, min_len) in shapes {
            match Self::recognize(key, min_len, frame) {
                Recognition::Foreign => continue,
                Recognition::Malformed => return TransferReply::Malformed,
                Recognition::Matched => {}
            }
            return match key {
                KEY_START => TransferReply::Started { status: frame[4] },
                KEY_PRN => TransferReply::Grant {
                    prn: u16::from_le_bytes([frame[4], frame[5]]),
                },
                _ => TransferReply::Ended {
                    status: frame[4],
                    crc: u32::from_le_bytes([frame[5], frame[6], frame[7], frame[8]]),
                },
            };
        }
        TransferReply::Foreign
    }

    fn timeout_status(&self) -> u8 {
        STATUS_TIMEOUT
    }
}

/// Prepare a watch-face upload; issue the returned command through a session
pub fn upload_watch_face(
    data: Vec<u8>,
    chunk_size: usize,
) -> Result<(FileTransfer<WatchFaceCodec>, Completion<TransferSummary>)> {
    if data.is_empty() {
        return Err(BandError::InvalidParameter("empty watch face".to_string()));
    }
    if u32::try_from(data.len()).is_err() || !(1..=MAX_CHUNK_SIZE).contains(&chunk_size) {
        return Err(BandError::InvalidParameter(format!(
            "watch face of {} bytes in {} byte chunks",
            data.len(),
            chunk_size
        )));
    }
    Ok(FileTransfer::new(
        "C watch face upload",
        WatchFaceCodec,
        data,
        chunk_size,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{Command, Effects};
    use crate::events::{BandEvent, TransferState};
    use crate::file_transfer::{checksum, TransferPhase};
    use crate::types::{ChannelRole, CommandError, DecodeStatus};

    fn started(status: u8) -> Vec<u8> {
        vec![0x30, 0x01, 0x01, 0x00, status, 0xA5]
    }

    fn grant(prn: u16) -> Vec<u8> {
        let p = prn.to_le_bytes();
        vec![0x30, 0x02, 0x02, 0x00, p[0], p[1], 0xA5]
    }

    fn ended(status: u8, crc: u32) -> Vec<u8> {
        let mut f = vec![0x30, 0x04, 0x05, 0x00, status];
        f.extend_from_slice(&crc.to_le_bytes());
        f.push(0xA5);
        f
    }

    #[test]
    fn test_chunk_size_for_mtu() {
        // 247 byte MTU: 244 byte frames
        assert_eq!(chunk_size_for(244), 235);
        assert_eq!(chunk_size_for(20), 11);
        assert_eq!(chunk_size_for(4), 1);
    }

    #[test]
    fn test_frames() {
        let codec = WatchFaceCodec;
        assert_eq!(
            codec.start_request(0x0102, 0x00EB),
            vec![0x30, 0x01, 0x07, 0x00, 0x01, 0x02, 0x01, 0x00, 0x00, 0xEB, 0x00, 0x5A]
        );
        assert_eq!(codec.prn_request(), vec![0x30, 0x02, 0x00, 0x00, 0x5A]);
        assert_eq!(
            codec.chunk(0x10, &[0xAA, 0xBB]),
            vec![0x30, 0x03, 0x06, 0x00, 0x10, 0x00, 0x00, 0x00, 0xAA, 0xBB, 0x5A]
        );
        assert_eq!(
            codec.end_request(0xCBF4_3926),
            vec![0x30, 0x04, 0x04, 0x00, 0x26, 0x39, 0xF4, 0xCB, 0x5A]
        );
    }

    #[test]
    fn test_classify() {
        let codec = WatchFaceCodec;
        assert_eq!(codec.classify(&started(0)), TransferReply::Started { status: 0 });
        assert_eq!(codec.classify(&grant(300)), TransferReply::Grant { prn: 300 });
        assert_eq!(
            codec.classify(&ended(0, 7)),
            TransferReply::Ended { status: 0, crc: 7 }
        );
        // Our own PRN request echoed back
        assert_eq!(
            codec.classify(&[0x30, 0x02, 0x00, 0x00, 0x5A]),
            TransferReply::Foreign
        );
        // Grant without its credit field
        assert_eq!(
            codec.classify(&[0x30, 0x02, 0x00, 0x00, 0xA5]),
            TransferReply::Malformed
        );
        assert_eq!(codec.classify(&[0x25, 0x01, 0x00, 0x00, 0xA5]), TransferReply::Foreign);
    }

    #[test]
    fn test_upload_in_two_bursts() {
        let data: Vec<u8> = (0..50u8).collect();
        let crc = checksum(&data);
        let (mut upload, mut done) = upload_watch_face(data, 11).unwrap();
        assert_eq!(upload.encode()[0].payload[4], KIND_WATCH_FACE);

        let mut fx = Effects::new();
        assert_eq!(upload.decode(&started(0), &mut fx), DecodeStatus::Incomplete);
        assert_eq!(fx.requests[0].payload, vec![0x30, 0x02, 0x00, 0x00, 0x5A]);

        let mut fx = Effects::new();
        upload.decode(&grant(3), &mut fx);
        assert_eq!(fx.requests.len(), 3);
        assert!(fx.requests.iter().all(|r| r.role == ChannelRole::Bulk));
        assert_eq!(upload.phase(), TransferPhase::Transferring);
        assert_eq!(upload.sent(), 33);

        // 50 bytes in 11 byte chunks: two more chunks, then the end frame
        let mut fx = Effects::new();
        upload.decode(&grant(3), &mut fx);
        assert_eq!(fx.requests.len(), 3);
        assert_eq!(fx.requests[1].payload.len(), 5 + 4 + 6);
        assert_eq!(fx.requests[2].role, ChannelRole::Control);
        assert_eq!(upload.phase(), TransferPhase::AwaitingEnd);

        let mut fx = Effects::new();
        assert_eq!(upload.decode(&ended(0, crc), &mut fx), DecodeStatus::Completed);
        assert_eq!(
            fx.events,
            vec![BandEvent::WatchFaceTransfer(crate::events::TransferProgress {
                state: TransferState::Completed,
                sent: 50,
                total: 50,
            })]
        );
        let summary = done.try_take().unwrap().unwrap();
        assert_eq!(summary.chunks, 5);
        assert_eq!(summary.crc, crc);
    }

    #[test]
    fn test_band_timeout_status() {
        let (mut upload, mut done) = upload_watch_face(vec![1, 2, 3], 11).unwrap();
        let mut fx = Effects::new();
        upload.decode(&started(0), &mut fx);
        upload.decode(&grant(1), &mut fx);
        upload.decode(&ended(STATUS_TIMEOUT, 0), &mut fx);
        assert_eq!(upload.phase(), TransferPhase::TimedOut);
        assert_eq!(done.try_take(), Some(Err(CommandError::Timeout)));
    }

    #[test]
    fn test_empty_upload_rejected() {
        assert!(upload_watch_face(Vec::new(), 11).is_err());
    }

    #[test]
    fn test_chunk_size_fits_length_field() {
        assert_eq!(MAX_CHUNK_SIZE, 65_531);
        assert!(upload_watch_face(vec![0; 8], 0).is_err());
        assert!(upload_watch_face(vec![0; 8], MAX_CHUNK_SIZE + 1).is_err());
        assert!(upload_watch_face(vec![0; 8], usize::from(u16::MAX)).is_err());
        assert_eq!(chunk_size_for(usize::MAX), MAX_CHUNK_SIZE);

        // The largest chunk still declares its true payload length
        let (upload, _) = upload_watch_face(vec![0xAB; 8], MAX_CHUNK_SIZE).unwrap();
        let frame = WatchFaceCodec.chunk(0, &vec![0xAB; MAX_CHUNK_SIZE]);
        assert_eq!(
            usize::from(u16::from_le_bytes([frame[2], frame[3]])),
            MAX_CHUNK_SIZE + OFFSET_LEN
        );
        assert_eq!(frame.len(), MAX_CHUNK_SIZE + CHUNK_OVERHEAD);
        assert_eq!(upload.phase(), TransferPhase::Idle);
    }
}
