use serde::{Deserialize, Serialize};

pub const DEFAULT_BINS: u32 = 32;
pub const DEFAULT_MAX_DEPTH: u32 = 64;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SplitStrategyKind {
    /// Every centroid on every axis.
    Exhaustive,
    /// Fixed number of planes across the widest centroid axis.
    Binned,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    pub strategy: SplitStrategyKind,
    pub bins: u32,
    /// Nodes this deep become leaves regardless of their split cost.
    pub max_depth: u32,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            strategy: SplitStrategyKind::Binned,
            bins: DEFAULT_BINS,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl BuildConfig {
    pub fn exhaustive() -> Self {
        Self {
            strategy: SplitStrategyKind::Exhaustive,
            ..Default::default()
        }
    }

    pub fn binned(bins: u32) -> Self {
        Self {
            strategy: SplitStrategyKind::Binned,
            bins,
            ..Default::default()
        }
    }
}
