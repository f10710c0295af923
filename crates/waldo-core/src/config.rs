use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

// ---------------------------------------------------------------------------
// Serde default functions
// ---------------------------------------------------------------------------

const fn default_physics_dt() -> f64 {
    0.02
}
const fn default_max_command_steps() -> u32 {
    10_000
}
fn default_extend_limits() -> Vec<f32> {
    vec![0.1, 0.1, 0.1, 0.1]
}
const fn default_base_limits() -> [f32; 2] {
    [0.0, 1.1]
}
const fn default_tolerance() -> f32 {
    1e-3
}
const fn default_max_time() -> f32 {
    10.0
}
const fn default_position_cache_size() -> usize {
    10
}
const fn default_true() -> bool {
    true
}

// ---------------------------------------------------------------------------
// SimConfig
// ---------------------------------------------------------------------------

/// Simulation stepping configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    /// Fixed physics timestep in seconds (default: 0.02 = 50 Hz).
    #[serde(default = "default_physics_dt")]
    pub physics_dt: f64,

    /// Hard cap on steps per command; a backstop above the per-joint
    /// `max_time` safety valve (default: 10 000).
    #[serde(default = "default_max_command_steps")]
    pub max_command_steps: u32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            physics_dt: default_physics_dt(),
            max_command_steps: default_max_command_steps(),
        }
    }
}

impl SimConfig {
    /// Validate configuration. Returns Err on invalid values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.physics_dt.is_finite() || self.physics_dt <= 0.0 {
            return Err(ConfigError::InvalidPhysicsDt(self.physics_dt));
        }
        if self.max_command_steps == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_command_steps".into(),
                message: "must be at least 1".into(),
            });
        }
        Ok(())
    }

    /// Load from a TOML file and validate.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }
}

// ---------------------------------------------------------------------------
// ArmConfig
// ---------------------------------------------------------------------------

/// Arm geometry and per-command defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArmConfig {
    /// Upper travel limit of each extend joint, base-most first. The sum is
    /// the arm's total reach along the extend axis.
    #[serde(default = "default_extend_limits")]
    pub extend_limits: Vec<f32>,

    /// [min, max] height of the base lift joint.
    #[serde(default = "default_base_limits")]
    pub base_limits: [f32; 2],

    /// Distance-to-target slack at which a joint counts as arrived.
    #[serde(default = "default_tolerance")]
    pub tolerance: f32,

    /// Per-joint wall-clock safety valve in simulated seconds.
    #[serde(default = "default_max_time")]
    pub max_time: f32,

    /// Number of recent positions kept for stall detection.
    #[serde(default = "default_position_cache_size")]
    pub position_cache_size: usize,

    /// When set, movable-but-heavy objects above this mass (kg) classify as
    /// immovable obstacles.
    #[serde(default)]
    pub mass_threshold: Option<f32>,

    /// Snap the logical extension handle to the physically realized pose
    /// when a command terminates.
    #[serde(default = "default_true")]
    pub snap_handle_on_finish: bool,
}

impl Default for ArmConfig {
    fn default() -> Self {
        Self {
            extend_limits: default_extend_limits(),
            base_limits: default_base_limits(),
            tolerance: default_tolerance(),
            max_time: default_max_time(),
            position_cache_size: default_position_cache_size(),
            mass_threshold: None,
            snap_handle_on_finish: true,
        }
    }
}

impl ArmConfig {
    /// Validate configuration. Returns Err on invalid values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.extend_limits.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "extend_limits".into(),
                message: "at least one extend joint is required".into(),
            });
        }
        if self.extend_limits.iter().any(|l| !l.is_finite() || *l < 0.0) {
            return Err(ConfigError::InvalidValue {
                field: "extend_limits".into(),
                message: "limits must be finite and non-negative".into(),
            });
        }
        if self.base_limits[1] < self.base_limits[0] {
            return Err(ConfigError::InvalidValue {
                field: "base_limits".into(),
                message: "max must be >= min".into(),
            });
        }
        if !self.tolerance.is_finite() || self.tolerance < 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "tolerance".into(),
                message: format!("must be non-negative, got {}", self.tolerance),
            });
        }
        if !self.max_time.is_finite() || self.max_time <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "max_time".into(),
                message: format!("must be positive, got {}", self.max_time),
            });
        }
        if self.position_cache_size < 2 {
            return Err(ConfigError::InvalidValue {
                field: "position_cache_size".into(),
                message: "stall detection needs at least 2 samples".into(),
            });
        }
        if let Some(threshold) = self.mass_threshold {
            if !threshold.is_finite() || threshold <= 0.0 {
                return Err(ConfigError::InvalidValue {
                    field: "mass_threshold".into(),
                    message: format!("must be positive, got {threshold}"),
                });
            }
        }
        Ok(())
    }

    /// Total reach along the extend axis.
    #[must_use]
    pub fn total_extension(&self) -> f32 {
        self.extend_limits.iter().sum()
    }

    /// Load from a TOML file and validate.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
