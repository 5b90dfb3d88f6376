//! Configuration system
//!
//! Tunables for the spatial index and collision manager, loadable from
//! TOML or RON files.

pub use serde::{Serialize, Deserialize};

/// Configuration trait
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Load configuration from file
    fn load_from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(ConfigError::Io)?;

        // Try different formats
        if path.ends_with(".toml") {
            toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else if path.ends_with(".ron") {
            ron::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else {
            Err(ConfigError::UnsupportedFormat(path.to_string()))
        }
    }

    /// Save configuration to file
    fn save_to_file(&self, path: &str) -> Result<(), ConfigError> {
        let contents = if path.ends_with(".toml") {
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else if path.ends_with(".ron") {
            ron::ser::to_string_pretty(self, Default::default())
                .map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else {
            return Err(ConfigError::UnsupportedFormat(path.to_string()));
        };

        std::fs::write(path, contents).map_err(ConfigError::Io)
    }
}

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// Unsupported format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

/// Tunables for the collision manager and its spatial indexes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollisionConfig {
    /// Maximum number of dirty shapes reprocessed per `update()` call
    pub dirty_budget: usize,

    /// Maximum primitives stored in a static-BVH leaf before splitting
    pub bvh_max_leaf_size: usize,

    /// Maximum static-BVH depth; deeper ranges become leaves regardless of size
    pub bvh_max_depth: usize,
}

impl Default for CollisionConfig {
    fn default() -> Self {
        Self {
            dirty_budget: 16,
            bvh_max_leaf_size: 8,
            bvh_max_depth: 24,
        }
    }
}

impl Config for CollisionConfig {}

impl CollisionConfig {
    /// Clamp all tunables to usable minimums
    pub fn sanitized(mut self) -> Self {
        self.dirty_budget = self.dirty_budget.max(1);
        self.bvh_max_leaf_size = self.bvh_max_leaf_size.max(1);
        self.bvh_max_depth = self.bvh_max_depth.max(1);
        self
    }
}
