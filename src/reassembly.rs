//! Multi-frame reassembly
//!
//! History replies arrive as a few fixed header frames, a run of sequence
//! numbered data frames and a terminal frame. Headers are buffered by arrival
//! order at indices `1..=H`, data frames at `H + seq`. On the terminal frame
//! the buffer is checked for gaps and the valid-length bounded payloads are
//! concatenated for the record parser.

use crate::command::{Command, Completion, Effects, Matcher, Recognition, Reply};
use crate::types::{CommandError, CommandResult, CorrelationKey, DecodeStatus, Request};
use log::{debug, info, warn};
use std::collections::BTreeMap;

/// Whether gaps in the data sequence are looked for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GapPolicy {
    /// Never report gaps; whatever arrived before the terminal frame is used
    Trust,
    /// Compare received sequence numbers against the declared length
    Detect,
}

/// Width and byte order of a data frame's sequence field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeqField {
    U8,
    U16Le,
}

impl SeqField {
    fn read(self, frame: &[u8], offset: usize) -> Option<u32> {
        match self {
            SeqField::U8 => frame.get(offset).map(|&b| u32::from(b)),
            SeqField::U16Le => frame
                .get(offset..offset + 2)
                .map(|b| u32::from(u16::from_le_bytes([b[0], b[1]]))),
        }
    }

    /// Highest data sequence number the field can carry; `FFFF` ends a
    /// 16-bit stream
    pub fn max_seq(self) -> u32 {
        match self {
            SeqField::U8 => u32::from(u8::MAX),
            SeqField::U16Le => u32::from(u16::MAX - 1),
        }
    }
}

/// Frame geometry of one history reply stream
#[derive(Debug, Clone)]
pub struct ReassemblyLayout {
    pub header_min_sizes: Vec<usize>,
    pub seq: SeqField,
    pub seq_offset: usize,
    pub valid_len_offset: usize,
    pub payload_offset: usize,
    pub payload_size: usize,
    pub is_terminal: fn(&[u8]) -> bool,
    /// Total payload length announced by header 1
    pub declared_len: fn(&[u8]) -> Option<usize>,
    pub gap_policy: GapPolicy,
}

/// Sequence-indexed frame store owned by one command
#[derive(Debug, Default)]
pub struct ReassemblyBuffer {
    frames: BTreeMap<u32, Vec<u8>>,
    header_count: u32,
}

impl ReassemblyBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_header(&mut self, frame: &[u8]) -> u32 {
        self.header_count += 1;
        self.frames.insert(self.header_count, frame.to_vec());
        self.header_count
    }

    /// Store a data frame; returns false if the sequence number was already present
    pub fn put_data(&mut self, header_slots: u32, seq: u32, frame: &[u8]) -> bool {
        self.frames.insert(header_slots + seq, frame.to_vec()).is_none()
    }

    pub fn header_count(&self) -> u32 {
        self.header_count
    }

    pub fn get(&self, index: u32) -> Option<&[u8]> {
        self.frames.get(&index).map(|f| f.as_slice())
    }

    pub fn contains(&self, index: u32) -> bool {
        self.frames.contains_key(&index)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Data frames in sequence order
    pub fn data_frames(&self, header_slots: u32) -> impl Iterator<Item = (u32, &[u8])> + '_ {
        self.frames
            .range(header_slots + 1..)
            .map(move |(index, frame)| (index - header_slots, frame.as_slice()))
    }

    pub fn clear(&mut self) {
        self.frames.clear();
        self.header_count = 0;
    }
}

/// Headers and concatenated payload of a finished stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assembled {
    pub headers: Vec<Vec<u8>>,
    pub payload: Vec<u8>,
}

impl Assembled {
    pub fn header(&self, n: usize) -> &[u8] {
        self.headers.get(n).map(|h| h.as_slice()).unwrap_or(&[])
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Progress {
    Incomplete,
    /// Sequence numbers to request again
    Missing(Vec<u32>),
    Ready(Assembled),
    Malformed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Collecting,
    AwaitingResend,
    Done,
}

/// Drives a [`ReassemblyBuffer`] according to a [`ReassemblyLayout`]
#[derive(Debug)]
pub struct Reassembler {
    layout: ReassemblyLayout,
    buffer: ReassemblyBuffer,
    stage: Stage,
}

impl Reassembler {
    pub fn new(layout: ReassemblyLayout) -> Self {
        Self {
            layout,
            buffer: ReassemblyBuffer::new(),
            stage: Stage::Collecting,
        }
    }

    fn header_slots(&self) -> u32 {
        self.layout.header_min_sizes.len() as u32
    }

    pub fn is_done(&self) -> bool {
        self.stage == Stage::Done
    }

    pub fn buffer(&self) -> &ReassemblyBuffer {
        &self.buffer
    }

    /// Feed one frame already recognised as part of this stream
    pub fn accept(&mut self, frame: &[u8]) -> Progress {
        if self.stage == Stage::Done {
            return Progress::Incomplete;
        }

        if (self.layout.is_terminal)(frame) {
            return self.finish();
        }

        if self.buffer.header_count() < self.header_slots() {
            let n = self.buffer.push_header(frame);
            debug!("Buffered header {} ({} bytes)", n, frame.len());
            return Progress::Incomplete;
        }

        let Some(seq) = self.layout.seq.read(frame, self.layout.seq_offset) else {
            return self.malformed(format!("data frame too short: {} bytes", frame.len()));
        };
        if seq == 0 {
            return self.malformed("data frame with sequence 0".to_string());
        }
        if !self.buffer.put_data(self.header_slots(), seq, frame) {
            debug!("Duplicate data frame seq={}", seq);
        }

        if self.stage == Stage::AwaitingResend {
            return match self.missing() {
                Ok(missing) if missing.is_empty() => self.assemble(),
                Ok(_) => Progress::Incomplete,
                Err(reason) => self.malformed(reason),
            };
        }
        Progress::Incomplete
    }

    fn finish(&mut self) -> Progress {
        if let Err(reason) = self.check_headers() {
            return self.malformed(reason);
        }
        match self.missing() {
            Ok(missing) if missing.is_empty() => self.assemble(),
            Ok(missing) => {
                info!("Stream has {} missing data frames: {:?}", missing.len(), missing);
                self.stage = Stage::AwaitingResend;
                Progress::Missing(missing)
            }
            Err(reason) => self.malformed(reason),
        }
    }

    fn check_headers(&self) -> std::result::Result<(), String> {
        for (i, &min) in self.layout.header_min_sizes.iter().enumerate() {
            match self.buffer.get(i as u32 + 1) {
                None => return Err(format!("header {} missing", i + 1)),
                Some(h) if h.len() < min => {
                    return Err(format!("header {} is {} bytes, need {}", i + 1, h.len(), min))
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    /// Data sequence numbers expected but not yet buffered
    fn missing(&self) -> std::result::Result<Vec<u32>, String> {
        if self.layout.gap_policy == GapPolicy::Trust {
            return Ok(Vec::new());
        }
        let header = self.buffer.get(1).unwrap_or(&[]);
        let declared = (self.layout.declared_len)(header)
            .ok_or_else(|| "header 1 carries no total length".to_string())?;
        let expected = declared.div_ceil(self.layout.payload_size.max(1));
        let max_seq = self.layout.seq.max_seq();
        let expected = u32::try_from(expected)
            .ok()
            .filter(|&n| n <= max_seq)
            .ok_or_else(|| {
                format!(
                    "declared length {} needs {} data frames, sequence field holds {}",
                    declared, expected, max_seq
                )
            })?;
        let slots = self.header_slots();
        Ok((1..=expected)
            .filter(|seq| !self.buffer.contains(slots + seq))
            .collect())
    }

    fn assemble(&mut self) -> Progress {
        let slots = self.header_slots();
        let headers: Vec<Vec<u8>> = (1..=slots)
            .filter_map(|i| self.buffer.get(i).map(|h| h.to_vec()))
            .collect();

        match self.concat_payload(slots) {
            Ok(payload) => {
                self.stage = Stage::Done;
                self.buffer.clear();
                Progress::Ready(Assembled { headers, payload })
            }
            Err(reason) => self.malformed(reason),
        }
    }

    fn concat_payload(&self, slots: u32) -> std::result::Result<Vec<u8>, String> {
        let mut payload = Vec::new();
        for (seq, frame) in self.buffer.data_frames(slots) {
            let valid = frame
                .get(self.layout.valid_len_offset)
                .map(|&v| usize::from(v))
                .ok_or_else(|| format!("data frame {} has no valid length", seq))?;
            if valid > self.layout.payload_size {
                return Err(format!("data frame {} claims {} bytes", seq, valid));
            }
            let start = self.layout.payload_offset;
            let bytes = frame.get(start..start + valid).ok_or_else(|| {
                format!("data frame {} shorter than its valid length {}", seq, valid)
            })?;
            payload.extend_from_slice(bytes);
        }
        Ok(payload)
    }

    fn malformed(&mut self, reason: String) -> Progress {
        warn!("Reassembly failed: {}", reason);
        self.stage = Stage::Done;
        self.buffer.clear();
        Progress::Malformed(reason)
    }
}

/// Rebuilds a monotonic index from one-byte entry indices that wrap
#[derive(Debug, Default, Clone)]
pub struct IndexUnwrapper {
    last: Option<u8>,
    offset: u32,
}

impl IndexUnwrapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&mut self, raw: u8) -> u32 {
        if let Some(prev) = self.last {
            if raw < prev {
                self.offset += 256;
            }
        }
        self.last = Some(raw);
        self.offset + u32::from(raw)
    }
}

type RecordParser<T> = Box<dyn Fn(&Assembled) -> CommandResult<T> + Send>;
type ResendEncoder = Box<dyn Fn(u32) -> Option<Vec<u8>> + Send>;

/// Command that requests one history stream and parses it into a record
pub struct HistoryCommand<T> {
    name: &'static str,
    key: CorrelationKey,
    request: Vec<u8>,
    matcher: Matcher,
    reassembler: Reassembler,
    parse: RecordParser<T>,
    resend: ResendEncoder,
    reply: Reply<T>,
}

impl<T: Send + 'static> HistoryCommand<T> {
    pub fn new<P, R>(
        name: &'static str,
        request: Vec<u8>,
        matcher: Matcher,
        layout: ReassemblyLayout,
        parse: P,
        resend: R,
    ) -> (Self, Completion<T>)
    where
        P: Fn(&Assembled) -> CommandResult<T> + Send + 'static,
        R: Fn(u32) -> Option<Vec<u8>> + Send + 'static,
    {
        let (reply, completion) = Reply::channel();
        let command = Self {
            name,
            key: CorrelationKey::next(),
            request,
            matcher,
            reassembler: Reassembler::new(layout),
            parse: Box::new(parse),
            resend: Box::new(resend),
            reply,
        };
        (command, completion)
    }
}

impl<T: Send + 'static> Command for HistoryCommand<T> {
    fn name(&self) -> &'static str {
        self.name
    }

    fn key(&self) -> Option<CorrelationKey> {
        Some(self.key)
    }

    fn encode(&self) -> Vec<Request> {
        vec![Request::control(self.request.clone())]
    }

    fn decode(&mut self, frame: &[u8], effects: &mut Effects) -> DecodeStatus {
        if self.reply.is_done() {
            return DecodeStatus::Incompatible;
        }
        match self.matcher.recognize(frame) {
            Recognition::Foreign => return DecodeStatus::Incompatible,
            Recognition::Malformed => {
                self.reply.fail(CommandError::InvalidLength);
                return DecodeStatus::InvalidLength;
            }
            Recognition::Matched => {}
        }

        match self.reassembler.accept(frame) {
            Progress::Incomplete => DecodeStatus::Incomplete,
            Progress::Missing(seqs) => {
                let mut requests = Vec::with_capacity(seqs.len());
                for seq in seqs {
                    let Some(payload) = (self.resend)(seq) else {
                        warn!("{}: cannot request data frame {} again", self.name, seq);
                        self.reply.fail(CommandError::InvalidLength);
                        return DecodeStatus::InvalidLength;
                    };
                    requests.push(Request::control(payload));
                }
                for request in requests {
                    effects.send(request);
                }
                DecodeStatus::ItemMissed
            }
            Progress::Ready(assembled) => match (self.parse)(&assembled) {
                Ok(record) => {
                    debug!("{}: decoded {} payload bytes", self.name, assembled.payload.len());
                    self.reply.succeed(record);
                    DecodeStatus::Completed
                }
                Err(e) => {
                    warn!("{}: record parse failed: {}", self.name, e);
                    self.reply.fail(e);
                    DecodeStatus::InvalidLength
                }
            },
            Progress::Malformed(_) => {
                self.reply.fail(CommandError::InvalidLength);
                DecodeStatus::InvalidLength
            }
        }
    }

    fn on_failure(&mut self, error: CommandError) {
        self.reply.fail(error);
    }
}
