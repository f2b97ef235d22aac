use serde::{Deserialize, Serialize};

use crate::error::{GlimmerError, GlimmerResult};

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CapacityConfig {
    /// Number of swatches requested. The effective capacity may be lower if the
    /// textures needed to hold them would exceed `max_texture_size`.
    pub desired_sprite_capacity: usize,
    /// Largest texture edge, in texels, the GPU accepts.
    pub max_texture_size: usize,
    /// Upper bound on candidates accepted by a single hit test.
    pub hit_test_max_candidates: usize,
}

impl Default for CapacityConfig {
    fn default() -> Self {
        Self {
            desired_sprite_capacity: 1 << 20,
            max_texture_size: 4096,
            hit_test_max_candidates: 1 << 16,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Transition time stamped onto a sprite before each of its callbacks runs.
    pub default_transition_time_ms: f64,
    /// Work budget per scheduler tick.
    pub max_work_time_ms: f64,
    /// Loop iterations between remaining-time checks inside tasks.
    pub steps_between_remaining_time_checks: usize,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            default_transition_time_ms: 250.0,
            max_work_time_ms: 20.0,
            steps_between_remaining_time_checks: 250,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct SceneConfig {
    #[serde(default)]
    pub capacity: CapacityConfig,
    #[serde(default)]
    pub timing: TimingConfig,
}

impl SceneConfig {
    pub fn load_from_file(path: &std::path::Path) -> GlimmerResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: SceneConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file(&self, path: &std::path::Path) -> GlimmerResult<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| GlimmerError::Config(format!("failed to encode config: {}", e)))?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn from_json(json: &str) -> GlimmerResult<Self> {
        let config: SceneConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> GlimmerResult<()> {
        if self.capacity.desired_sprite_capacity == 0 {
            return Err(GlimmerError::Config(
                "desired_sprite_capacity must be positive".into(),
            ));
        }
        if self.capacity.max_texture_size == 0 {
            return Err(GlimmerError::Config(
                "max_texture_size must be positive".into(),
            ));
        }
        if self.capacity.hit_test_max_candidates == 0 {
            return Err(GlimmerError::Config(
                "hit_test_max_candidates must be positive".into(),
            ));
        }
        let timing = &self.timing;
        if !timing.default_transition_time_ms.is_finite() || timing.default_transition_time_ms < 0.0
        {
            return Err(GlimmerError::Config(
                "default_transition_time_ms must be a non-negative number".into(),
            ));
        }
        if !timing.max_work_time_ms.is_finite() || timing.max_work_time_ms <= 0.0 {
            return Err(GlimmerError::Config(
                "max_work_time_ms must be a positive number".into(),
            ));
        }
        if timing.steps_between_remaining_time_checks == 0 {
            return Err(GlimmerError::Config(
                "steps_between_remaining_time_checks must be positive".into(),
            ));
        }
        Ok(())
    }
}
