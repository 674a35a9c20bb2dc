//! Finality certificates.

use {
    crate::{
        cid::Cid,
        serde_helpers::base64_bytes,
        tipset::{ChainEpoch, TipSetKey},
    },
    serde::{Deserialize, Serialize},
};

/// A tipset as it appears inside a finalized chain segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ECTipSet {
    pub key: TipSetKey,
    pub epoch: ChainEpoch,
    /// CID of the power table in effect at this tipset.
    pub power_table: Cid,
    #[serde(with = "base64_bytes")]
    pub commitments: Vec<u8>,
}

/// A finalized chain segment. The first element is the base, which was
/// already final before the instance that produced this chain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ECChain(Vec<ECTipSet>);

impl ECChain {
    pub fn new(tipsets: Vec<ECTipSet>) -> Self {
        Self(tipsets)
    }

    pub fn base(&self) -> Option<&ECTipSet> {
        self.0.first()
    }

    pub fn head(&self) -> Option<&ECTipSet> {
        self.0.last()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ECTipSet> {
        self.0.iter()
    }
}

/// Data the participants agreed on alongside the chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SupplementalData {
    #[serde(with = "base64_bytes")]
    pub commitments: Vec<u8>,
    /// CID of the power table for the *next* instance.
    pub power_table: Cid,
}

/// Proof that instance `gpbft_instance` finalized `ec_chain`.
///
/// Certificate 0 is the genesis certificate; the base of its chain carries
/// the initial power table of the network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalityCertificate {
    #[serde(rename = "GPBFTInstance")]
    pub gpbft_instance: u64,
    #[serde(rename = "ECChain")]
    pub ec_chain: ECChain,
    #[serde(rename = "SupplementalData")]
    pub supplemental_data: SupplementalData,
    /// RLE+ bitfield of the signers, as produced by the engine.
    #[serde(rename = "Signers", with = "base64_bytes")]
    pub signers: Vec<u8>,
    /// Aggregated signature over the decision.
    #[serde(rename = "Signature", with = "base64_bytes")]
    pub signature: Vec<u8>,
}

impl FinalityCertificate {
    /// Power table CID of the chain base, if the chain is non-empty.
    pub fn base_power_table(&self) -> Option<&Cid> {
        self.ec_chain.base().map(|base| &base.power_table)
    }
}
