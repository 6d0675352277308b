//! Manager configuration and builder.

use serde::{Deserialize, Serialize};

use super::CoordinateMapManager;
use crate::backend::{CoordinateBackend, HostBackend};
use crate::coordinate::CoordinateInt;
use crate::error::{CoordinateError, Result};

/// Configuration of a [`CoordinateMapManager`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Components per coordinate, batch index included.
    pub coordinate_size: usize,

    /// Whether component 0 is a batch index rather than a spatial axis.
    pub batch_dim: bool,

    /// Size of a dedicated thread pool. `None` runs on the global rayon pool.
    pub num_threads: Option<usize>,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            coordinate_size: 4,
            batch_dim: true,
            num_threads: None,
        }
    }
}

impl ManagerConfig {
    /// Number of leading components never touched by strides or kernels.
    pub fn batch_offset(&self) -> usize {
        usize::from(self.batch_dim)
    }

    /// Number of spatial axes.
    pub fn spatial_dim(&self) -> usize {
        self.coordinate_size.saturating_sub(self.batch_offset())
    }

    pub fn validate(&self) -> Result<()> {
        if self.spatial_dim() == 0 {
            return Err(CoordinateError::InvalidConfig(format!(
                "coordinate_size {} leaves no spatial axis (batch_dim = {})",
                self.coordinate_size, self.batch_dim
            )));
        }
        if self.num_threads == Some(0) {
            return Err(CoordinateError::InvalidConfig(
                "num_threads must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Builder for [`CoordinateMapManager`].
#[derive(Debug, Clone, Default)]
pub struct ManagerBuilder {
    config: ManagerConfig,
}

impl ManagerBuilder {
    /// Create a builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration.
    pub fn from_config(config: ManagerConfig) -> Self {
        Self { config }
    }

    /// Set the number of components per coordinate.
    pub fn coordinate_size(mut self, coordinate_size: usize) -> Self {
        self.config.coordinate_size = coordinate_size;
        self
    }

    /// Treat component 0 as a batch index.
    pub fn batch_dim(mut self, batch_dim: bool) -> Self {
        self.config.batch_dim = batch_dim;
        self
    }

    /// Run all parallel work on a dedicated pool of `num_threads` threads.
    pub fn num_threads(mut self, num_threads: usize) -> Self {
        self.config.num_threads = Some(num_threads);
        self
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Build a manager on the host backend.
    pub fn build<T: CoordinateInt>(self) -> Result<CoordinateMapManager<T, HostBackend>> {
        CoordinateMapManager::new(self.config, HostBackend)
    }

    /// Build a manager on an explicit backend.
    pub fn build_with_backend<T, B>(self, backend: B) -> Result<CoordinateMapManager<T, B>>
    where
        T: CoordinateInt,
        B: CoordinateBackend<T>,
    {
        CoordinateMapManager::new(self.config, backend)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ManagerConfig::default();
        assert_eq!(config.coordinate_size, 4);
        assert_eq!(config.spatial_dim(), 3);
        assert_eq!(config.batch_offset(), 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let builder = ManagerBuilder::new()
            .coordinate_size(3)
            .batch_dim(false)
            .num_threads(2);
        assert_eq!(
            builder.config(),
            &ManagerConfig {
                coordinate_size: 3,
                batch_dim: false,
                num_threads: Some(2),
            }
        );
        let manager = builder.build::<i32>().unwrap();
        assert_eq!(manager.config().spatial_dim(), 3);
    }

    #[test]
    fn test_invalid_configs() {
        let no_spatial = ManagerBuilder::new().coordinate_size(1).batch_dim(true);
        assert!(matches!(
            no_spatial.build::<i32>(),
            Err(CoordinateError::InvalidConfig(_))
        ));

        let no_threads = ManagerBuilder::new().num_threads(0);
        assert!(matches!(
            no_threads.build::<i64>(),
            Err(CoordinateError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_config_from_json() {
        let config: ManagerConfig =
            serde_json::from_str(r#"{ "coordinate_size": 3, "batch_dim": false }"#).unwrap();
        assert_eq!(config.coordinate_size, 3);
        assert!(!config.batch_dim);
        assert_eq!(config.num_threads, None);

        let round: ManagerConfig =
            serde_json::from_str(&serde_json::to_string(&config).unwrap()).unwrap();
        assert_eq!(round, config);
    }
}
