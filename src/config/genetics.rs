use super::traits::ConfigSection;
use crate::error::AestheticError;
use serde::{Deserialize, Serialize};

/// Parameters of the genetic operators and random tree growth
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneticsConfig {
    /// Chance that a randomly grown node is an operator rather than a leaf
    pub operator_chance: f64,
    pub constant_min: f64,
    pub constant_max: f64,
    /// Chance that mutation touches each constant
    pub mutate_chance: f64,
    /// Constants shift by a delta in [-mutate_range, mutate_range)
    pub mutate_range: f64,
    /// Mutated constants are reduced modulo this value
    pub mutate_fold: f64,
    pub max_tree_depth: usize,
    /// Regeneration attempts when a child's identity collides with a sibling
    pub identity_attempts: usize,
}

impl Default for GeneticsConfig {
    fn default() -> Self {
        Self {
            operator_chance: 0.35,
            constant_min: -2.0,
            constant_max: 2.0,
            mutate_chance: 0.25,
            mutate_range: 0.5,
            mutate_fold: 2.0,
            max_tree_depth: 8,
            identity_attempts: 8,
        }
    }
}

impl ConfigSection for GeneticsConfig {
    fn section_name() -> &'static str {
        "genetics"
    }

    fn validate(&self) -> Result<(), AestheticError> {
        if !(0.0..=1.0).contains(&self.operator_chance) {
            return Err(AestheticError::Configuration(
                "Operator chance must be between 0 and 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.mutate_chance) {
            return Err(AestheticError::Configuration(
                "Mutate chance must be between 0 and 1".to_string(),
            ));
        }
        if self.constant_min >= self.constant_max {
            return Err(AestheticError::Configuration(
                "Constant range must not be empty".to_string(),
            ));
        }
        if self.mutate_range <= 0.0 {
            return Err(AestheticError::Configuration(
                "Mutate range must be positive".to_string(),
            ));
        }
        if self.mutate_fold <= 0.0 {
            return Err(AestheticError::Configuration(
                "Mutate fold must be positive".to_string(),
            ));
        }
        if self.max_tree_depth < 1 {
            return Err(AestheticError::Configuration(
                "Max tree depth must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
