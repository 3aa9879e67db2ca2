use serde::{Deserialize, Serialize};
use std::{fmt::Display, str::FromStr};
use thiserror::Error;

/// The chains whose outputs are pooled. Each asset type owns an independent
/// watch registry, snapshot and pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetType {
    Bitcoin,
    Skycoin,
}

impl AssetType {
    pub const ALL: [AssetType; 2] = [AssetType::Bitcoin, AssetType::Skycoin];

    pub fn as_str(&self) -> &'static str {
        match self {
            AssetType::Bitcoin => "bitcoin",
            AssetType::Skycoin => "skycoin",
        }
    }
}

impl Display for AssetType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("unrecognized asset type '{0}'")]
pub struct ParseAssetTypeError(pub String);

impl FromStr for AssetType {
    type Err = ParseAssetTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AssetType::ALL
            .into_iter()
            .find(|asset| asset.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseAssetTypeError(s.to_string()))
    }
}
