//! World configuration.

use serde::{Deserialize, Serialize};

use crate::EcsError;

/// Hard ceiling for [`WorldConfig::max_entities`]; the entity table is
/// allocated up front, so this bounds its memory.
pub const MAX_ENTITY_LIMIT: u32 = 1 << 24;

/// Sizing knobs for a [`World`](crate::world::World).
///
/// Can be loaded from JSON; missing fields take their defaults and unknown
/// fields are rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorldConfig {
    /// Maximum number of simultaneously alive entities. Default: 65,536.
    pub max_entities: u32,

    /// Instances reserved in a component store when it is first created.
    /// Default: 64.
    pub initial_store_capacity: usize,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            max_entities: 65_536,
            initial_store_capacity: 64,
        }
    }
}

impl WorldConfig {
    pub fn with_max_entities(mut self, max_entities: u32) -> Self {
        self.max_entities = max_entities;
        self
    }

    /// # Errors
    ///
    /// [`EcsError::InvalidConfig`] if `max_entities` is zero or above
    /// [`MAX_ENTITY_LIMIT`].
    pub fn validate(&self) -> Result<(), EcsError> {
        if self.max_entities == 0 || self.max_entities > MAX_ENTITY_LIMIT {
            return Err(EcsError::InvalidConfig(format!(
                "max_entities must be in 1..={MAX_ENTITY_LIMIT}, got {}",
                self.max_entities
            )));
        }
        Ok(())
    }

    /// Parse and validate a JSON configuration.
    ///
    /// # Errors
    ///
    /// [`EcsError::Json`] on malformed input or unknown fields,
    /// [`EcsError::InvalidConfig`] if validation fails.
    pub fn from_json_str(json: &str) -> Result<Self, EcsError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }
}
