//! Import options, read from TOML meta files next to the assets.

use serde::Deserialize;
use std::path::Path;

/// What the PROC parser does with a top-level keyword it does not know.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownBlockPolicy {
    /// Log a warning and skip the keyword (and its `{ }` block when one follows)
    Skip,
    /// Fail with a parse error
    Reject,
}

impl Default for UnknownBlockPolicy {
    fn default() -> Self {
        UnknownBlockPolicy::Skip
    }
}

/// How per-vertex weights that do not sum to one are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightPolicy {
    /// Use the weights as authored, only warn
    Trust,
    /// Rescale each vertex's weights to sum to one
    Normalize,
}

impl Default for WeightPolicy {
    fn default() -> Self {
        WeightPolicy::Trust
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct ProcOptions {
    /// Divisor applied to every converted position. `0` and `1` disable scaling.
    pub scale: f32,
    pub unknown_blocks: UnknownBlockPolicy,
}

impl Default for ProcOptions {
    fn default() -> Self {
        Self {
            scale: 1.0,
            unknown_blocks: UnknownBlockPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct Md5Options {
    pub weights: WeightPolicy,
    /// Allowed deviation of a weight sum from one before it is reported
    pub weight_epsilon: f32,
}

impl Default for Md5Options {
    fn default() -> Self {
        Self {
            weights: WeightPolicy::default(),
            weight_epsilon: 1e-3,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct ImportMeta {
    pub proc: ProcOptions,
    pub md5: Md5Options,
}

#[derive(thiserror::Error, Debug)]
pub enum MetaError {
    #[error("Failed to read meta file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse meta file: {0}")]
    Toml(#[from] toml::de::Error),
}

impl ImportMeta {
    pub fn parse(path: &Path) -> Result<Self, MetaError> {
        let data = std::fs::read(path)?;
        Self::from_slice(&data)
    }

    pub fn from_slice(data: &[u8]) -> Result<Self, MetaError> {
        Ok(toml::from_slice(data)?)
    }
}
