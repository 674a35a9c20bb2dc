//! Power tables: the weighted participant lists consensus runs over.

use {
    crate::serde_helpers::{base64_bytes, decimal_u128},
    serde::{Deserialize, Serialize},
    std::cmp::Ordering,
};

/// Numeric identifier of a participating miner actor.
pub type ActorId = u64;

/// Storage power backing a participant's vote weight.
pub type StoragePower = u128;

/// One participant and its weight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowerEntry {
    #[serde(rename = "ID")]
    pub id: ActorId,
    #[serde(rename = "Power", with = "decimal_u128")]
    pub power: StoragePower,
    #[serde(rename = "PubKey", with = "base64_bytes")]
    pub pub_key: Vec<u8>,
}

/// An ordered power table.
///
/// Canonical order is descending power, ties broken by ascending actor id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PowerEntries(Vec<PowerEntry>);

impl PowerEntries {
    /// Build a table, putting the entries into canonical order.
    pub fn new(mut entries: Vec<PowerEntry>) -> Self {
        entries.sort_by(canonical_order);
        Self(entries)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PowerEntry> {
        self.0.iter()
    }

    /// Sum of all participants' power, saturating at `u128::MAX`.
    pub fn total_power(&self) -> StoragePower {
        self.0
            .iter()
            .fold(0u128, |total, entry| total.saturating_add(entry.power))
    }

    pub fn get(&self, id: ActorId) -> Option<&PowerEntry> {
        self.0.iter().find(|entry| entry.id == id)
    }
}

impl From<Vec<PowerEntry>> for PowerEntries {
    fn from(entries: Vec<PowerEntry>) -> Self {
        Self::new(entries)
    }
}

fn canonical_order(a: &PowerEntry, b: &PowerEntry) -> Ordering {
    b.power.cmp(&a.power).then_with(|| a.id.cmp(&b.id))
}
