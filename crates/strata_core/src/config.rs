//! # World Configuration
//!
//! Tuning knobs loaded once at startup, either built in code or parsed from
//! TOML:
//!
//! ```toml
//! chunk_size = 16384
//! chunk_budget = 4096
//! prewarm_chunks = 64
//! ```

use serde::Deserialize;

use crate::error::{EcsError, EcsResult};
use crate::memory::CHUNK_ALIGN;

/// Default chunk size in bytes (16 KiB).
pub const DEFAULT_CHUNK_SIZE: usize = 16 * 1024;

/// Configuration for a [`World`](crate::World).
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorldConfig {
    /// Byte size of every chunk. Must be a non-zero multiple of 64.
    pub chunk_size: usize,
    /// Maximum number of chunks live at once. `None` means unbounded.
    pub chunk_budget: Option<usize>,
    /// Chunks allocated into the pool when the world is created.
    pub prewarm_chunks: usize,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_budget: None,
            prewarm_chunks: 0,
        }
    }
}

impl WorldConfig {
    /// Creates a default configuration with a custom chunk size.
    #[must_use]
    pub fn with_chunk_size(chunk_size: usize) -> Self {
        Self {
            chunk_size,
            ..Self::default()
        }
    }

    /// Parses a configuration from TOML text and validates it.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::ConfigParse`] for malformed TOML or unknown keys,
    /// and [`EcsError::InvalidConfig`] when the values are rejected by
    /// [`WorldConfig::validate`].
    pub fn from_toml_str(text: &str) -> EcsResult<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| EcsError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that the values describe a usable world.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::InvalidConfig`] when the chunk size is zero or not
    /// a multiple of the chunk alignment, or when more chunks are prewarmed
    /// than the budget allows.
    pub fn validate(&self) -> EcsResult<()> {
        if self.chunk_size == 0 || self.chunk_size % CHUNK_ALIGN != 0 {
            return Err(EcsError::InvalidConfig(format!(
                "chunk_size must be a non-zero multiple of {CHUNK_ALIGN}, got {}",
                self.chunk_size
            )));
        }
        if let Some(budget) = self.chunk_budget {
            if self.prewarm_chunks > budget {
                return Err(EcsError::InvalidConfig(format!(
                    "prewarm_chunks ({}) exceeds chunk_budget ({budget})",
                    self.prewarm_chunks
                )));
            }
        }
        Ok(())
    }
}
