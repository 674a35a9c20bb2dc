//! Content identifiers.
//!
//! The sidecar never hashes or decodes CIDs itself; it only carries them
//! between the engine and the host. A [`Cid`] is therefore kept in its
//! canonical multibase string form and checked for shape only.

use {
    serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer},
    std::{fmt, str::FromStr},
};

/// A content identifier in its multibase string form (e.g. `bafy2bz...`).
///
/// An *undefined* CID is modelled as `Option<Cid>::None` by the types that
/// may carry one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Cid(String);

/// Errors when parsing a [`Cid`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CidError {
    #[error("cid is empty")]
    Empty,
    #[error("cid contains invalid character {0:?}")]
    InvalidCharacter(char),
}

impl Cid {
    /// Returns the multibase string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Cid {
    type Err = CidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(CidError::Empty);
        }
        if let Some(bad) = s.chars().find(|c| !c.is_ascii_alphanumeric()) {
            return Err(CidError::InvalidCharacter(bad));
        }
        Ok(Self(s.to_string()))
    }
}

impl fmt::Display for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Wire shape of a CID link: `{"/": "<cid>"}`.
#[derive(Serialize, Deserialize)]
struct CidLink<'a> {
    #[serde(rename = "/", borrow)]
    link: std::borrow::Cow<'a, str>,
}

impl Serialize for Cid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        CidLink {
            link: std::borrow::Cow::Borrowed(&self.0),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Cid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let link = CidLink::deserialize(deserializer)?;
        link.link.parse().map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const POWER_TABLE: &str = "bafy2bzacecnamqgqmifpluoeldx7zzglxcljo6oja4vrmtj7432rphldpdmm2";

    #[test]
    fn test_parse_and_display() {
        let cid: Cid = POWER_TABLE.parse().unwrap();
        assert_eq!(cid.as_str(), POWER_TABLE);
        assert_eq!(cid.to_string(), POWER_TABLE);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert_eq!("".parse::<Cid>(), Err(CidError::Empty));
        assert_eq!(
            "bafy 2bz".parse::<Cid>(),
            Err(CidError::InvalidCharacter(' '))
        );
    }

    #[test]
    fn test_json_link_form() {
        let cid: Cid = POWER_TABLE.parse().unwrap();
        let json = serde_json::to_string(&cid).unwrap();
        assert_eq!(json, format!(r#"{{"/":"{POWER_TABLE}"}}"#));
        let back: Cid = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cid);
    }

    #[test]
    fn test_undefined_cid_is_null() {
        let undefined: Option<Cid> = None;
        assert_eq!(serde_json::to_string(&undefined).unwrap(), "null");
        let back: Option<Cid> = serde_json::from_str("null").unwrap();
        assert!(back.is_none());
    }
}
