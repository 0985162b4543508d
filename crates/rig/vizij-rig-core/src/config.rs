//! Compositor configuration.

use serde::{Deserialize, Serialize};

use crate::error::{Result, RigError};
use crate::fallback::FallbackConfig;
use crate::stack::DEFAULT_BLEND_EPSILON;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositorConfig {
    /// Fixed tick interval in seconds. Used for interpolation until the
    /// first fixed tick reports its actual delta.
    pub fixed_timestep: f32,
    /// Blend durations shorter than this are applied instantly.
    pub blend_epsilon: f32,
    /// Install the fallback provider at priority 0. `None` leaves the stacks empty.
    pub fallback: Option<FallbackConfig>,
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self {
            fixed_timestep: 1.0 / 60.0,
            blend_epsilon: DEFAULT_BLEND_EPSILON,
            fallback: Some(FallbackConfig::default()),
        }
    }
}

impl CompositorConfig {
    /// Parse and validate a JSON configuration.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let cfg: CompositorConfig = serde_json::from_str(json)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.fixed_timestep <= 0.0 || !self.fixed_timestep.is_finite() {
            return Err(RigError::InvalidConfig {
                reason: "fixed timestep must be positive and finite".to_string(),
            });
        }
        if self.blend_epsilon < 0.0 || !self.blend_epsilon.is_finite() {
            return Err(RigError::InvalidConfig {
                reason: "blend epsilon must be non-negative and finite".to_string(),
            });
        }
        if let Some(fallback) = &self.fallback {
            fallback.validate()?;
        }
        Ok(())
    }

    #[inline]
    pub fn with_fixed_timestep(mut self, seconds: f32) -> Self {
        self.fixed_timestep = seconds;
        self
    }

    #[inline]
    pub fn with_blend_epsilon(mut self, epsilon: f32) -> Self {
        self.blend_epsilon = epsilon;
        self
    }

    #[inline]
    pub fn with_fallback(mut self, fallback: Option<FallbackConfig>) -> Self {
        self.fallback = fallback;
        self
    }
}
