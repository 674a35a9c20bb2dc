//! Value types exchanged between the host node, the sidecar and the
//! finality engine.
//!
//! Everything here is plain data. The serde representation follows the host
//! node's JSON wire format: PascalCase field names, CIDs encoded as
//! `{"/": "<cid>"}`, raw bytes as base64 and storage power as a decimal
//! string.

pub mod certificate;
pub mod cid;
pub mod host;
pub mod manifest;
pub mod power;
pub mod progress;
mod serde_helpers;
pub mod tipset;

pub use certificate::{ECChain, ECTipSet, FinalityCertificate, SupplementalData};
pub use cid::{Cid, CidError};
pub use host::{AddrInfo, PeerId, Signature, SignatureType, VersionInfo};
pub use manifest::{EcConfig, Manifest};
pub use power::{ActorId, PowerEntries, PowerEntry, StoragePower};
pub use progress::{InstanceProgress, Phase};
pub use tipset::{ChainEpoch, TipSet, TipSetKey};
