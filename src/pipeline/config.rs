//! Pipeline configuration.

use std::time::Duration;

use crate::core::Capacity;
use crate::error::Result;

/// Configuration for pipeline execution
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PipelineConfig {
    /// Capacity of every data channel between components
    pub capacity: Capacity,
    /// Capacity of every error channel
    pub error_capacity: Capacity,
    /// Longest a single transform may run before the item is rejected
    pub item_timeout: Option<Duration>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            capacity: Capacity::Bounded(64),
            error_capacity: Capacity::Bounded(64),
            item_timeout: None,
        }
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the bounded buffer size of data channels
    pub fn buffer_size(mut self, size: usize) -> Self {
        self.capacity = Capacity::Bounded(size);
        self
    }

    /// Let data channels grow without bound
    pub fn unbounded(mut self) -> Self {
        self.capacity = Capacity::Unbounded;
        self
    }

    /// Set the bounded buffer size of error channels
    pub fn error_buffer_size(mut self, size: usize) -> Self {
        self.error_capacity = Capacity::Bounded(size);
        self
    }

    /// Set the per-item transform timeout
    pub fn item_timeout(mut self, timeout: Duration) -> Self {
        self.item_timeout = Some(timeout);
        self
    }

    /// Check every setting before any channel is built
    pub fn validate(&self) -> Result<()> {
        self.capacity.validate()?;
        self.error_capacity.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_defaults() {
        let config = PipelineConfig::new()
            .buffer_size(8)
            .error_buffer_size(2)
            .item_timeout(Duration::from_millis(50));

        assert_eq!(config.capacity, Capacity::Bounded(8));
        assert_eq!(config.error_capacity, Capacity::Bounded(2));
        assert_eq!(config.item_timeout, Some(Duration::from_millis(50)));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_buffer_fails_validation() {
        assert!(PipelineConfig::new().buffer_size(0).validate().is_err());
        assert!(PipelineConfig::new().error_buffer_size(0).validate().is_err());
        assert!(PipelineConfig::new().unbounded().validate().is_ok());
    }
}
