/// Engine configuration.
///
/// Configuration is plain data: it can be built in code, deserialized from
/// JSON, or read from `LIVEVIEW_*` environment variables.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::str::FromStr;

/// Hint for selecting the underlying storage strategy.
///
/// This allows users to optimize for their workload without needing to
/// understand the implementation details of the underlying data structures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageHint {
    /// Optimized for append and read-heavy workloads (default).
    ///
    /// - O(1) random access
    /// - O(1) amortized append
    /// - O(N) insert/delete in middle
    #[default]
    FastReads,

    /// Optimized for frequent inserts and deletes anywhere in the table.
    ///
    /// - Block-local insert/delete anywhere
    /// - Slightly slower random access
    FastUpdates,
}

impl StorageHint {
    /// Returns true if this hint uses tiered vector storage.
    pub(crate) fn use_tiered_vector(&self) -> bool {
        matches!(self, StorageHint::FastUpdates)
    }
}

impl FromStr for StorageHint {
    type Err = Error;

    /// Accepts: "fast_reads", "fast_updates"
    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "fast_reads" | "fastreads" => Ok(StorageHint::FastReads),
            "fast_updates" | "fastupdates" => Ok(StorageHint::FastUpdates),
            _ => Err(Error::Config(format!(
                "Unknown storage hint: '{}'. Use 'fast_reads' or 'fast_updates'",
                s
            ))),
        }
    }
}

/// Settings for an [`Engine`](crate::Engine).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Storage backend used for every table created by the engine.
    pub storage: StorageHint,
    /// Maximum rows rendered by `Display` on tables and views.
    pub render_limit: usize,
}

impl EngineConfig {
    pub const DEFAULT_RENDER_LIMIT: usize = 500;

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))
    }

    /// Read `LIVEVIEW_STORAGE` and `LIVEVIEW_RENDER_LIMIT`, falling back to
    /// defaults for unset variables.
    pub fn from_env() -> Result<Self> {
        let mut config = EngineConfig::default();
        if let Ok(storage) = std::env::var("LIVEVIEW_STORAGE") {
            config.storage = storage.parse()?;
        }
        if let Ok(limit) = std::env::var("LIVEVIEW_RENDER_LIMIT") {
            config.render_limit = limit.parse().map_err(|_| {
                Error::Config(format!("LIVEVIEW_RENDER_LIMIT must be a number, got '{}'", limit))
            })?;
        }
        Ok(config)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            storage: StorageHint::default(),
            render_limit: Self::DEFAULT_RENDER_LIMIT,
        }
    }
}
