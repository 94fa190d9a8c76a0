//! Correlation registry
//!
//! Maps correlation keys to in-flight commands. The registry is a cheap
//! clonable handle over shared state, so one instance can be owned by a
//! session or shared by several device sessions.

use crate::command::{Command, Effects};
use crate::types::{CommandError, CorrelationKey, DecodeStatus};
use log::{debug, info};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

struct Entry {
    command: Box<dyn Command>,
    registered_at: Instant,
}

/// Snapshot of registry occupancy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryStats {
    pub in_flight: usize,
    pub oldest_age: Option<Duration>,
}

#[derive(Clone, Default)]
pub struct CorrelationRegistry {
    entries: Arc<Mutex<BTreeMap<CorrelationKey, Entry>>>,
}

impl CorrelationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<CorrelationKey, Entry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a keyed command; fire-and-forget commands are handed back
    pub fn add(&self, command: Box<dyn Command>) -> Result<CorrelationKey, Box<dyn Command>> {
        let Some(key) = command.key() else {
            return Err(command);
        };
        debug!("Registering {} as {}", command.name(), key);
        self.lock().insert(
            key,
            Entry {
                command,
                registered_at: Instant::now(),
            },
        );
        Ok(key)
    }

    pub fn contains(&self, key: CorrelationKey) -> bool {
        self.lock().contains_key(&key)
    }

    /// Name of the command registered under `key`
    pub fn name_of(&self, key: CorrelationKey) -> Option<&'static str> {
        self.lock().get(&key).map(|e| e.command.name())
    }

    pub fn remove(&self, key: CorrelationKey) -> Option<Box<dyn Command>> {
        let removed = self.lock().remove(&key).map(|e| e.command);
        if let Some(command) = &removed {
            debug!("Evicted {} ({})", command.name(), key);
        }
        removed
    }

    /// Let the command under `key` decode a frame; `None` if the key is unknown
    pub fn decode(
        &self,
        key: CorrelationKey,
        frame: &[u8],
        effects: &mut Effects,
    ) -> Option<DecodeStatus> {
        self.lock()
            .get_mut(&key)
            .map(|e| e.command.decode(frame, effects))
    }

    /// Run `f` on the command under `key` while the registry is locked
    pub fn with_command<R>(
        &self,
        key: CorrelationKey,
        f: impl FnOnce(&mut dyn Command) -> R,
    ) -> Option<R> {
        self.lock().get_mut(&key).map(|e| f(e.command.as_mut()))
    }

    /// Registered keys, oldest first
    pub fn keys(&self) -> Vec<CorrelationKey> {
        let entries = self.lock();
        let mut keys: Vec<(Instant, CorrelationKey)> = entries
            .iter()
            .map(|(key, e)| (e.registered_at, *key))
            .collect();
        keys.sort();
        keys.into_iter().map(|(_, key)| key).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn stats(&self) -> RegistryStats {
        let entries = self.lock();
        RegistryStats {
            in_flight: entries.len(),
            oldest_age: entries.values().map(|e| e.registered_at.elapsed()).max(),
        }
    }

    /// Evict and fail a command; returns false if the key was not registered
    pub fn fail(&self, key: CorrelationKey, error: CommandError) -> bool {
        match self.remove(key) {
            Some(mut command) => {
                info!("{} ({}) failed: {}", command.name(), key, error);
                command.on_failure(error);
                true
            }
            None => false,
        }
    }

    /// Fail every command registered longer than `max_age`
    pub fn expire_older_than(&self, max_age: Duration) -> Vec<CorrelationKey> {
        let stale: Vec<(CorrelationKey, Box<dyn Command>)> = {
            let mut entries = self.lock();
            let keys: Vec<CorrelationKey> = entries
                .iter()
                .filter(|(_, e)| e.registered_at.elapsed() > max_age)
                .map(|(key, _)| *key)
                .collect();
            keys.into_iter()
                .filter_map(|key| entries.remove(&key).map(|e| (key, e.command)))
                .collect()
        };

        stale
            .into_iter()
            .map(|(key, mut command)| {
                info!("Expiring {} ({})", command.name(), key);
                command.on_failure(CommandError::Timeout);
                key
            })
            .collect()
    }
}
