//! Progress of the running consensus instance.

use serde::{Deserialize, Serialize};

/// Phase of a consensus round. Travels as its numeric code.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Phase {
    #[default]
    Initial,
    Quality,
    Converge,
    Prepare,
    Commit,
    Decide,
    Terminated,
}

impl From<Phase> for u8 {
    fn from(phase: Phase) -> Self {
        match phase {
            Phase::Initial => 0,
            Phase::Quality => 1,
            Phase::Converge => 2,
            Phase::Prepare => 3,
            Phase::Commit => 4,
            Phase::Decide => 5,
            Phase::Terminated => 6,
        }
    }
}

impl TryFrom<u8> for Phase {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Ok(match code {
            0 => Phase::Initial,
            1 => Phase::Quality,
            2 => Phase::Converge,
            3 => Phase::Prepare,
            4 => Phase::Commit,
            5 => Phase::Decide,
            6 => Phase::Terminated,
            other => return Err(format!("unknown phase code {other}")),
        })
    }
}

/// Where the engine currently is: instance, round and phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InstanceProgress {
    #[serde(rename = "ID")]
    pub id: u64,
    pub round: u64,
    pub phase: Phase,
}
