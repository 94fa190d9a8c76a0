//! Per-device dispatcher
//!
//! A [`BandSession`] ties a product descriptor to a transport, an event sink
//! and a correlation registry. Commands are issued through it; every frame
//! the band sends is handed to [`BandSession::on_frame`], which routes it to
//! the command it belongs to or to the family's event classifier.
//!
//! Decoding happens under the registry lock. Anything a decode asks for
//! (follow-up writes, events) is collected in [`Effects`] and carried out
//! after the lock is released.

use crate::command::{Command, Completion, Effects};
use crate::config::ProductDescriptor;
use crate::events::{EventClassifier, EventSink};
use crate::registry::CorrelationRegistry;
use crate::transport::Transport;
use crate::types::{
    hex_dump, CommandError, CommandResult, CorrelationKey, DecodeStatus, Request, Result,
};
use log::{debug, info, warn};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// What happened to an incoming frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Decoded by the in-flight command under `key`
    Routed {
        key: CorrelationKey,
        status: DecodeStatus,
    },
    /// Recognised as an unsolicited frame
    Event(&'static str),
    /// Addressed to `key`, claimed by nobody; the command was failed
    Failed(CorrelationKey),
    /// Unaddressed and claimed by nobody
    Ignored,
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Disposition::Routed { key, status } => write!(f, "{} -> {}", key, status),
            Disposition::Event(name) => write!(f, "event {}", name),
            Disposition::Failed(key) => write!(f, "{} failed", key),
            Disposition::Ignored => write!(f, "ignored"),
        }
    }
}

/// Outcome of routing, with the side effects still to be carried out
struct Routed {
    disposition: Disposition,
    effects: Effects,
    /// Command the follow-up requests belong to
    owner: Option<CorrelationKey>,
}

pub struct BandSession {
    descriptor: ProductDescriptor,
    registry: CorrelationRegistry,
    classifier: EventClassifier,
    transport: Arc<dyn Transport>,
    sink: Arc<dyn EventSink>,
}

impl BandSession {
    pub fn new(
        descriptor: ProductDescriptor,
        transport: Arc<dyn Transport>,
        sink: Arc<dyn EventSink>,
    ) -> Result<Self> {
        Self::with_registry(descriptor, CorrelationRegistry::new(), transport, sink)
    }

    /// Session over a registry shared with other sessions
    pub fn with_registry(
        descriptor: ProductDescriptor,
        registry: CorrelationRegistry,
        transport: Arc<dyn Transport>,
        sink: Arc<dyn EventSink>,
    ) -> Result<Self> {
        descriptor.validate()?;
        info!(
            "Session for {} (family {}, max frame {})",
            descriptor.model,
            descriptor.family,
            descriptor.max_frame()
        );
        Ok(Self {
            classifier: EventClassifier::for_family(descriptor.family),
            descriptor,
            registry,
            transport,
            sink,
        })
    }

    pub fn descriptor(&self) -> &ProductDescriptor {
        &self.descriptor
    }

    pub fn registry(&self) -> &CorrelationRegistry {
        &self.registry
    }

    /// Register a command and write its request frames
    ///
    /// Keyed commands stay registered until their reply completes them. A
    /// write failure fails the command and is returned as well.
    pub async fn issue(&self, command: Box<dyn Command>) -> Result<Option<CorrelationKey>> {
        let requests = command.encode();
        let name = command.name();
        let key = command.key();
        debug!("Issuing {} ({} frames)", name, requests.len());

        let mut unkeyed = match self.registry.add(command) {
            Ok(_) => None,
            Err(command) => Some(command),
        };

        let queue = requests.into_iter().map(|r| (key, r)).collect();
        if let Err(e) = self.flush(queue).await {
            warn!("Writing {} failed: {}", name, e);
            if let Some(command) = unkeyed.as_mut() {
                command.on_failure(CommandError::Transport(e.to_string()));
            }
            return Err(e);
        }
        Ok(key)
    }

    /// Issue a command and wait at most `timeout` for its result
    pub async fn request<T>(
        &self,
        command: Box<dyn Command>,
        completion: Completion<T>,
        timeout: Duration,
    ) -> CommandResult<T> {
        let key = command.key();
        if let Err(e) = self.issue(command).await {
            debug!("Issue failed, result follows from the command: {}", e);
        }
        match tokio::time::timeout(timeout, completion.wait()).await {
            Ok(result) => result,
            Err(_) => {
                if let Some(key) = key {
                    self.on_failure(key, CommandError::Timeout);
                }
                Err(CommandError::Timeout)
            }
        }
    }

    /// Fail and evict an in-flight command; false if it was not in flight
    pub fn on_failure(&self, key: CorrelationKey, reason: CommandError) -> bool {
        self.registry.fail(key, reason)
    }

    /// Route one frame received on `channel`
    ///
    /// `key` is the correlation the transport attached to the frame, if any.
    pub async fn on_frame(
        &self,
        channel: &str,
        frame: &[u8],
        key: Option<CorrelationKey>,
    ) -> Result<Disposition> {
        debug!("<- {} [{}]", channel, hex_dump(frame));
        let routed = self.route(frame, key);
        debug!("Frame {}", routed.disposition);
        self.apply(routed.effects, routed.owner).await?;
        Ok(routed.disposition)
    }

    fn route(&self, frame: &[u8], key: Option<CorrelationKey>) -> Routed {
        let mut effects = Effects::new();

        let Some(key) = key else {
            let disposition = self.route_unkeyed(frame, None, &mut effects);
            return Routed {
                owner: owner_of(disposition),
                disposition,
                effects,
            };
        };

        match self.registry.decode(key, frame, &mut effects) {
            None => {
                warn!("Frame for unknown {}, routing it as unaddressed", key);
                let disposition = self.route_unkeyed(frame, None, &mut effects);
                Routed {
                    owner: owner_of(disposition),
                    disposition,
                    effects,
                }
            }
            Some(DecodeStatus::Incompatible) => {
                let disposition = match self.route_unkeyed(frame, Some(key), &mut effects) {
                    Disposition::Ignored => {
                        let reason = format!("unclaimed frame [{}]", hex_dump(frame));
                        self.registry.fail(key, CommandError::Unexpected(reason));
                        Disposition::Failed(key)
                    }
                    other => other,
                };
                Routed {
                    owner: owner_of(disposition),
                    disposition,
                    effects,
                }
            }
            Some(status) => {
                if status.is_terminal() {
                    self.registry.remove(key);
                }
                Routed {
                    disposition: Disposition::Routed { key, status },
                    effects,
                    owner: Some(key),
                }
            }
        }
    }

    /// Classifier first, then in-flight commands oldest first
    fn route_unkeyed(
        &self,
        frame: &[u8],
        skip: Option<CorrelationKey>,
        effects: &mut Effects,
    ) -> Disposition {
        if let Some(name) = self.classifier.classify(frame, effects) {
            return Disposition::Event(name);
        }
        for key in self.registry.keys() {
            if Some(key) == skip {
                continue;
            }
            match self.registry.decode(key, frame, effects) {
                None | Some(DecodeStatus::Incompatible) => continue,
                Some(status) => {
                    if status.is_terminal() {
                        self.registry.remove(key);
                    }
                    return Disposition::Routed { key, status };
                }
            }
        }
        debug!("Nobody claimed [{}]", hex_dump(frame));
        Disposition::Ignored
    }

    async fn apply(&self, effects: Effects, owner: Option<CorrelationKey>) -> Result<()> {
        for event in effects.events {
            self.sink.deliver(event);
        }
        let queue = effects.requests.into_iter().map(|r| (owner, r)).collect();
        self.flush(queue).await
    }

    /// Write queued requests; synchronous replies are routed as they are read
    /// and their follow-ups join the queue.
    async fn flush(&self, mut queue: VecDeque<(Option<CorrelationKey>, Request)>) -> Result<()> {
        while let Some((key, request)) = queue.pop_front() {
            let frame = self.descriptor.address(&request, key)?;
            if let Err(e) = self.transport.write(&frame).await {
                if let Some(key) = key {
                    self.registry.fail(key, CommandError::Transport(e.to_string()));
                }
                return Err(e);
            }

            let Some(channel) = frame.read_channel.as_deref().filter(|_| !frame.notify) else {
                continue;
            };
            let reply = match self.transport.read(channel, frame.key).await {
                Ok(reply) => reply,
                Err(e) => {
                    if let Some(key) = key {
                        self.registry.fail(key, CommandError::Transport(e.to_string()));
                    }
                    return Err(e);
                }
            };
            if reply.is_empty() {
                continue;
            }
            debug!("<- {} [{}]", channel, hex_dump(&reply));
            let routed = self.route(&reply, frame.key);
            for event in routed.effects.events {
                self.sink.deliver(event);
            }
            queue.extend(routed.effects.requests.into_iter().map(|r| (routed.owner, r)));
        }
        Ok(())
    }
}

fn owner_of(disposition: Disposition) -> Option<CorrelationKey> {
    match disposition {
        Disposition::Routed { key, .. } => Some(key),
        _ => None,
    }
}
