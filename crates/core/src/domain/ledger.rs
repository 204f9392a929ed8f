// Port Ledger Domain Model
// Shared, persisted record of port reservations across processes

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One reservation in the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub system: String,
    pub component: String,
    pub pid: u32,
    pub timestamp: i64, // epoch ms
}

impl LedgerEntry {
    pub fn new(
        system: impl Into<String>,
        component: impl Into<String>,
        pid: u32,
        timestamp: i64,
    ) -> Self {
        Self {
            system: system.into(),
            component: component.into(),
            pid,
            timestamp,
        }
    }

    /// True if this entry belongs to the given (system, component) pair
    pub fn is_owned_by(&self, system: &str, component: &str) -> bool {
        self.system == system && self.component == component
    }

    /// Age in milliseconds (negative ages from clock skew count as zero)
    pub fn age_ms(&self, now_millis: i64) -> i64 {
        (now_millis - self.timestamp).max(0)
    }
}

/// Outcome of writing a reservation into the ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reservation {
    /// Port was free and is now held by the requester
    Reserved,
    /// Port was already held by the same (system, component) pair
    AlreadyHeld,
    /// Port is held by someone else
    Conflict(LedgerEntry),
}

impl Reservation {
    pub fn is_granted(&self) -> bool {
        matches!(self, Reservation::Reserved | Reservation::AlreadyHeld)
    }
}

/// The whole ledger document: port -> entry
///
/// Serialized as a JSON object keyed by the decimal port number.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LedgerDocument {
    entries: BTreeMap<u16, LedgerEntry>,
}

impl LedgerDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, port: u16) -> Option<&LedgerEntry> {
        self.entries.get(&port)
    }

    pub fn entries(&self) -> impl Iterator<Item = (u16, &LedgerEntry)> {
        self.entries.iter().map(|(port, entry)| (*port, entry))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove entries whose owner is dead or which outlived `ttl_ms`
    ///
    /// Only provably stale entries are removed; a live pid within the TTL is
    /// always kept.
    pub fn reap_stale<F>(&mut self, now_millis: i64, ttl_ms: i64, is_alive: F) -> Vec<(u16, LedgerEntry)>
    where
        F: Fn(u32) -> bool,
    {
        let stale: Vec<u16> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.age_ms(now_millis) > ttl_ms || !is_alive(entry.pid))
            .map(|(port, _)| *port)
            .collect();

        stale
            .into_iter()
            .filter_map(|port| self.entries.remove(&port).map(|entry| (port, entry)))
            .collect()
    }

    /// Try to reserve `port` for the entry's owner
    ///
    /// Re-reserving by the same owner refreshes pid and timestamp.
    pub fn reserve(&mut self, port: u16, entry: LedgerEntry) -> Reservation {
        match self.entries.get_mut(&port) {
            None => {
                self.entries.insert(port, entry);
                Reservation::Reserved
            }
            Some(existing) if existing.is_owned_by(&entry.system, &entry.component) => {
                existing.pid = entry.pid;
                existing.timestamp = entry.timestamp;
                Reservation::AlreadyHeld
            }
            Some(existing) => Reservation::Conflict(existing.clone()),
        }
    }

    pub fn release(&mut self, port: u16) -> Option<LedgerEntry> {
        self.entries.remove(&port)
    }

    /// Remove every entry matching `predicate`, returning how many were removed
    pub fn release_where<F>(&mut self, predicate: F) -> usize
    where
        F: Fn(&LedgerEntry) -> bool,
    {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !predicate(entry));
        before - self.entries.len()
    }
}
