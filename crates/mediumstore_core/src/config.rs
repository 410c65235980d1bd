//! Medium configuration.

use crate::error::{StoreError, StoreResult};
use std::time::Duration;

/// Sentinel for a cache without a total size limit.
pub const UNLIMITED_CACHE_SIZE: u64 = u64::MAX;

/// Default maximum read/write block size.
pub const DEFAULT_MAX_READ_WRITE_BLOCK_SIZE: usize = 8192;

/// Default maximum size of one cached region.
pub const DEFAULT_MAX_CACHE_REGION_SIZE: u64 = DEFAULT_MAX_READ_WRITE_BLOCK_SIZE as u64;

/// Default maximum total cache size.
pub const DEFAULT_MAX_CACHE_SIZE: u64 = 1024 * 1024; // 1 MB

/// Configuration of a medium: caching limits, block sizes and stream behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediumConfig {
    /// Maximum number of bytes held in the cache (0 disables caching).
    pub max_cache_size: u64,

    /// Maximum size of a single cached region.
    pub max_cache_region_size: u64,

    /// Maximum number of bytes per physical read or write.
    ///
    /// Governs both read chunking and flush write chunking.
    pub max_read_write_block_size: usize,

    /// Whether read bytes are cached at all.
    pub caching_enabled: bool,

    /// Maximum time to wait for a stream read (stream media only).
    pub read_timeout: Option<Duration>,

    /// Whether bytes between the stream position and a forward read are
    /// skipped instead of cached (stream media only).
    pub skip_on_forward_read: bool,
}

impl Default for MediumConfig {
    fn default() -> Self {
        Self {
            max_cache_size: DEFAULT_MAX_CACHE_SIZE,
            max_cache_region_size: DEFAULT_MAX_CACHE_REGION_SIZE,
            max_read_write_block_size: DEFAULT_MAX_READ_WRITE_BLOCK_SIZE,
            caching_enabled: true,
            read_timeout: None,
            skip_on_forward_read: false,
        }
    }
}

impl MediumConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum total cache size.
    #[must_use]
    pub const fn max_cache_size(mut self, size: u64) -> Self {
        self.max_cache_size = size;
        self
    }

    /// Sets the maximum size of one cached region.
    #[must_use]
    pub const fn max_cache_region_size(mut self, size: u64) -> Self {
        self.max_cache_region_size = size;
        self
    }

    /// Sets the maximum read/write block size.
    #[must_use]
    pub const fn max_read_write_block_size(mut self, size: usize) -> Self {
        self.max_read_write_block_size = size;
        self
    }

    /// Sets whether caching is enabled.
    #[must_use]
    pub const fn caching_enabled(mut self, value: bool) -> Self {
        self.caching_enabled = value;
        self
    }

    /// Sets the stream read timeout.
    #[must_use]
    pub const fn read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Sets whether forward gaps on streams are skipped instead of cached.
    #[must_use]
    pub const fn skip_on_forward_read(mut self, value: bool) -> Self {
        self.skip_on_forward_read = value;
        self
    }

    /// Returns true if reads go through the cache.
    #[must_use]
    pub const fn uses_cache(&self) -> bool {
        self.caching_enabled && self.max_cache_size > 0
    }

    /// Checks the configuration for contradictory or degenerate values.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the block size or region size is zero, or
    /// if the region size exceeds a non-zero cache size.
    pub fn validate(&self) -> StoreResult<()> {
        if self.max_read_write_block_size == 0 {
            return Err(StoreError::invalid_argument(
                "max_read_write_block_size must be at least 1",
            ));
        }
        if self.max_cache_region_size == 0 {
            return Err(StoreError::invalid_argument(
                "max_cache_region_size must be at least 1",
            ));
        }
        if self.max_cache_size > 0 && self.max_cache_region_size > self.max_cache_size {
            return Err(StoreError::invalid_argument(format!(
                "max_cache_region_size {} exceeds max_cache_size {}",
                self.max_cache_region_size, self.max_cache_size
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = MediumConfig::default();
        assert!(config.caching_enabled);
        assert!(config.uses_cache());
        assert_eq!(config.max_read_write_block_size, 8192);
        assert_eq!(config.max_cache_region_size, 8192);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn builder_pattern() {
        let config = MediumConfig::new()
            .max_cache_size(100)
            .max_cache_region_size(10)
            .max_read_write_block_size(4)
            .skip_on_forward_read(true);

        assert_eq!(config.max_cache_size, 100);
        assert_eq!(config.max_cache_region_size, 10);
        assert_eq!(config.max_read_write_block_size, 4);
        assert!(config.skip_on_forward_read);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_cache_size_disables_caching() {
        let config = MediumConfig::new().max_cache_size(0);
        assert!(!config.uses_cache());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_block_size_rejected() {
        let config = MediumConfig::new().max_read_write_block_size(0);
        assert!(matches!(
            config.validate(),
            Err(StoreError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn region_larger_than_cache_rejected() {
        let config = MediumConfig::new()
            .max_cache_size(10)
            .max_cache_region_size(20);
        assert!(config.validate().is_err());
    }
}
