//! Deduplicated store of known consoles

use std::collections::HashMap;
use tracing::debug;

use crate::classify::Confidence;
use crate::device::{DeviceId, DeviceRecord, DiscoveryMethod, VerificationState};

/// Result of merging a record into the registry
#[derive(Debug, Clone)]
pub struct UpsertOutcome {
    /// The stored record after the merge
    pub record: DeviceRecord,
    /// Identity was not known before
    pub is_new: bool,
    /// Identity was known and a material field changed
    pub is_updated: bool,
    /// A resolved verification state was reset to `Unverified`
    pub verification_reset: bool,
    /// Insertion episode a verification started now must resolve against
    pub episode: u64,
}

impl UpsertOutcome {
    /// Whether the merge needs a (new) confirmation query
    pub fn needs_verification(&self) -> bool {
        self.is_new || self.verification_reset
    }
}

/// Device registry keyed by identity, iterated in insertion order
#[derive(Debug, Default)]
pub struct Registry {
    devices: HashMap<DeviceId, DeviceRecord>,
    order: Vec<DeviceId>,
    episodes: HashMap<DeviceId, u64>,
    next_episode: u64,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn get(&self, id: &DeviceId) -> Option<&DeviceRecord> {
        self.devices.get(id)
    }

    fn begin_episode(&mut self, id: &DeviceId) -> u64 {
        self.next_episode += 1;
        self.episodes.insert(id.clone(), self.next_episode);
        self.next_episode
    }

    /// Merge a record by identity
    ///
    /// The discovery method is fixed by the first insertion. A scan result
    /// merged into an advertised entry does not replace the advertised name or
    /// port, since removal events match on that name. Verification state and
    /// error are always taken from the incoming record, and confidence only
    /// ever upgrades to `Exact`. `last_seen` is refreshed on every merge without
    /// counting as a change, and `first_seen` is kept from the original
    /// insertion.
    pub fn upsert(&mut self, record: DeviceRecord) -> UpsertOutcome {
        let Some(existing) = self.devices.get_mut(&record.id) else {
            debug!(device = %record.id, ip = %record.ip, "Registering new device");
            let episode = self.begin_episode(&record.id);
            self.order.push(record.id.clone());
            self.devices.insert(record.id.clone(), record.clone());
            return UpsertOutcome {
                record,
                is_new: true,
                is_updated: false,
                verification_reset: false,
                episode,
            };
        };

        let keeps_advertised = existing.method == DiscoveryMethod::Advertised
            && record.method == DiscoveryMethod::Probed;
        let (name, port) = if keeps_advertised {
            (existing.name.clone(), existing.port)
        } else {
            (record.name, record.port)
        };
        let confidence = if record.confidence == Confidence::Exact {
            Confidence::Exact
        } else {
            existing.confidence
        };

        let verification_reset = existing.verification != VerificationState::Unverified
            && record.verification == VerificationState::Unverified;
        let is_updated = existing.name != name
            || existing.port != port
            || existing.confidence != confidence
            || existing.verification != record.verification
            || existing.error != record.error;

        existing.name = name;
        existing.port = port;
        existing.confidence = confidence;
        existing.verification = record.verification;
        existing.error = record.error;
        existing.last_seen = record.last_seen;

        if is_updated {
            debug!(device = %existing.id, verification = ?existing.verification, "Device updated");
        }
        let merged = existing.clone();

        let episode = if verification_reset {
            self.begin_episode(&merged.id)
        } else {
            self.episodes.get(&merged.id).copied().unwrap_or_default()
        };

        UpsertOutcome {
            record: merged,
            is_new: false,
            is_updated,
            verification_reset,
            episode,
        }
    }

    /// Resolve a pending verification
    ///
    /// Returns `None` unless the entry is still `Unverified` in the same
    /// insertion episode the verification was started for.
    pub fn resolve_verification(
        &mut self,
        id: &DeviceId,
        episode: u64,
        result: Result<(), String>,
    ) -> Option<DeviceRecord> {
        if self.episodes.get(id) != Some(&episode) {
            debug!(device = %id, episode, "Dropping verification from a previous episode");
            return None;
        }
        let device = self.devices.get_mut(id)?;
        if device.verification != VerificationState::Unverified {
            return None;
        }
        match result {
            Ok(()) => device.mark_verified(),
            Err(error) => device.mark_failed(error),
        }
        Some(device.clone())
    }

    pub fn remove(&mut self, id: &DeviceId) -> Option<DeviceRecord> {
        let removed = self.devices.remove(id)?;
        self.episodes.remove(id);
        self.order.retain(|existing| existing != id);
        Some(removed)
    }

    /// Remove the first advertised entry whose display name equals `name`
    ///
    /// Matches on the display name rather than identity, so a service renamed
    /// between its up and down announcements leaves its entry behind.
    pub fn remove_advertised_by_name(&mut self, name: &str) -> Option<DeviceRecord> {
        let id = self
            .order
            .iter()
            .find(|id| {
                self.devices.get(*id).is_some_and(|d| {
                    d.method == DiscoveryMethod::Advertised && d.name == name
                })
            })?
            .clone();
        self.remove(&id)
    }

    /// All entries in insertion order
    pub fn snapshot(&self) -> Vec<DeviceRecord> {
        self.order
            .iter()
            .filter_map(|id| self.devices.get(id).cloned())
            .collect()
    }
}
