//! The command contract and the single-shot result channel
//!
//! A command encodes its request frames, then sees every inbound frame the
//! dispatcher routes to it until it reports a terminal status. Results flow
//! back to the issuer through a [`Reply`]/[`Completion`] pair built on a tokio
//! oneshot channel, so a second terminal result cannot be delivered.

use crate::events::BandEvent;
use crate::types::{CommandError, CommandResult, CorrelationKey, DecodeStatus, Request};
use log::{debug, warn};
use tokio::sync::oneshot;

/// Side effects produced while decoding one frame
///
/// The dispatcher writes the requests and delivers the events after the
/// registry lock has been released.
#[derive(Debug, Default)]
pub struct Effects {
    pub requests: Vec<Request>,
    pub events: Vec<BandEvent>,
}

impl Effects {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn send(&mut self, request: Request) {
        self.requests.push(request);
    }

    pub fn emit(&mut self, event: BandEvent) {
        self.events.push(event);
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty() && self.events.is_empty()
    }

    pub fn append(&mut self, other: Effects) {
        self.requests.extend(other.requests);
        self.events.extend(other.events);
    }
}

/// An in-flight request/response exchange with the band
pub trait Command: Send {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// `None` for fire-and-forget commands, which are never registered
    fn key(&self) -> Option<CorrelationKey>;

    /// Frames to write when the command is issued
    fn encode(&self) -> Vec<Request>;

    /// Inspect one inbound frame
    fn decode(&mut self, frame: &[u8], effects: &mut Effects) -> DecodeStatus;

    /// The transport gave up on this command
    fn on_failure(&mut self, error: CommandError);
}

/// Sending half of a command's result channel
pub struct Reply<T> {
    tx: Option<oneshot::Sender<CommandResult<T>>>,
}

/// Receiving half of a command's result channel
pub struct Completion<T> {
    rx: oneshot::Receiver<CommandResult<T>>,
}

impl<T> Reply<T> {
    pub fn channel() -> (Reply<T>, Completion<T>) {
        let (tx, rx) = oneshot::channel();
        (Reply { tx: Some(tx) }, Completion { rx })
    }

    /// Whether a terminal result has already been sent
    pub fn is_done(&self) -> bool {
        self.tx.is_none()
    }

    /// Deliver a result; returns false if one was already delivered
    pub fn send(&mut self, result: CommandResult<T>) -> bool {
        match self.tx.take() {
            Some(tx) => {
                if tx.send(result).is_err() {
                    debug!("Result receiver already dropped");
                }
                true
            }
            None => {
                warn!("Ignoring second terminal result");
                false
            }
        }
    }

    pub fn succeed(&mut self, value: T) -> bool {
        self.send(Ok(value))
    }

    pub fn fail(&mut self, error: CommandError) -> bool {
        self.send(Err(error))
    }
}

impl<T> Completion<T> {
    /// Wait for the command's terminal result
    pub async fn wait(self) -> CommandResult<T> {
        self.rx.await.unwrap_or(Err(CommandError::Dropped))
    }

    /// Take the result if it has already been delivered
    pub fn try_take(&mut self) -> Option<CommandResult<T>> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(CommandError::Dropped)),
        }
    }
}

/// How a frame's envelope is validated before its header is compared
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// Leading header bytes only
    Plain,
    /// `header len:u16le payload marker`; total length must be `5 + len`
    Enveloped { marker: u8 },
}

/// Result of comparing a frame against a command's expected header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recognition {
    Foreign,
    Malformed,
    Matched,
}

/// Byte-positional header matcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Matcher {
    prefix: Vec<u8>,
    min_len: usize,
    framing: Framing,
}

impl Matcher {
    pub fn plain(prefix: &[u8], min_len: usize) -> Self {
        Self {
            prefix: prefix.to_vec(),
            min_len,
            framing: Framing::Plain,
        }
    }

    pub fn enveloped(prefix: &[u8], min_len: usize, marker: u8) -> Self {
        Self {
            prefix: prefix.to_vec(),
            min_len,
            framing: Framing::Enveloped { marker },
        }
    }

    pub fn prefix(&self) -> &[u8] {
        &self.prefix
    }

    pub fn recognize(&self, frame: &[u8]) -> Recognition {
        if !frame.starts_with(&self.prefix) {
            return Recognition::Foreign;
        }
        if let Framing::Enveloped { marker } = self.framing {
            if frame.len() < 5 {
                return Recognition::Malformed;
            }
            if frame[frame.len() - 1] != marker {
                // Same header with the other direction's marker
                return Recognition::Foreign;
            }
            let declared = usize::from(u16::from_le_bytes([frame[2], frame[3]]));
            if declared + 5 != frame.len() {
                return Recognition::Malformed;
            }
        }
        if frame.len() < self.min_len {
            return Recognition::Malformed;
        }
        Recognition::Matched
    }
}

type Parser<T> = Box<dyn Fn(&[u8]) -> CommandResult<T> + Send>;

/// Single request, single reply frame
pub struct SimpleCommand<T> {
    name: &'static str,
    key: CorrelationKey,
    requests: Vec<Vec<u8>>,
    matcher: Matcher,
    parse: Parser<T>,
    reply: Reply<T>,
}

impl<T: Send + 'static> SimpleCommand<T> {
    pub fn new<F>(
        name: &'static str,
        request: Vec<u8>,
        matcher: Matcher,
        parse: F,
    ) -> (Self, Completion<T>)
    where
        F: Fn(&[u8]) -> CommandResult<T> + Send + 'static,
    {
        let (reply, completion) = Reply::channel();
        let command = Self {
            name,
            key: CorrelationKey::next(),
            requests: vec![request],
            matcher,
            parse: Box::new(parse),
            reply,
        };
        (command, completion)
    }
}

impl<T: Send + 'static> Command for SimpleCommand<T> {
    fn name(&self) -> &'static str {
        self.name
    }

    fn key(&self) -> Option<CorrelationKey> {
        Some(self.key)
    }

    fn encode(&self) -> Vec<Request> {
        self.requests.iter().cloned().map(Request::control).collect()
    }

    fn decode(&mut self, frame: &[u8], _effects: &mut Effects) -> DecodeStatus {
        if self.reply.is_done() {
            return DecodeStatus::Incompatible;
        }
        match self.matcher.recognize(frame) {
            Recognition::Foreign => DecodeStatus::Incompatible,
            Recognition::Malformed => {
                warn!("{}: malformed reply ({} bytes)", self.name, frame.len());
                self.reply.fail(CommandError::InvalidLength);
                DecodeStatus::InvalidLength
            }
            Recognition::Matched => match (self.parse)(frame) {
                Ok(value) => {
                    self.reply.succeed(value);
                    DecodeStatus::Completed
                }
                Err(CommandError::InvalidLength) => {
                    self.reply.fail(CommandError::InvalidLength);
                    DecodeStatus::InvalidLength
                }
                Err(e) => {
                    debug!("{}: {}", self.name, e);
                    self.reply.fail(e);
                    DecodeStatus::Completed
                }
            },
        }
    }

    fn on_failure(&mut self, error: CommandError) {
        self.reply.fail(error);
    }
}

/// Command that writes frames and never expects a routed reply
pub struct FireAndForget {
    name: &'static str,
    requests: Vec<Request>,
}

impl FireAndForget {
    pub fn new(name: &'static str, payload: Vec<u8>) -> Self {
        Self {
            name,
            requests: vec![Request::control_unacked(payload)],
        }
    }

    pub fn with_requests(name: &'static str, requests: Vec<Request>) -> Self {
        Self { name, requests }
    }
}

impl Command for FireAndForget {
    fn name(&self) -> &'static str {
        self.name
    }

    fn key(&self) -> Option<CorrelationKey> {
        None
    }

    fn encode(&self) -> Vec<Request> {
        self.requests.clone()
    }

    fn decode(&mut self, _frame: &[u8], _effects: &mut Effects) -> DecodeStatus {
        DecodeStatus::Incompatible
    }

    fn on_failure(&mut self, error: CommandError) {
        debug!("{}: write failed: {}", self.name, error);
    }
}

/// Reply carrying a single status byte at `pos`; zero means accepted
pub fn status_at(frame: &[u8], pos: usize) -> CommandResult<()> {
    match frame.get(pos) {
        Some(0) => Ok(()),
        Some(&code) => Err(CommandError::Rejected { code }),
        None => Err(CommandError::InvalidLength),
    }
}
