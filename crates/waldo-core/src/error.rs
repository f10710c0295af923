use thiserror::Error;

use crate::types::{CompletionResult, JointId, ObjectId};

/// Top-level error type for waldo-core.
#[derive(Debug, Error)]
pub enum WaldoError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Setup error: {0}")]
    Setup(#[from] SetupError),

    #[error("Command error: {0}")]
    Command(#[from] CommandError),
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid physics_dt: {0} (must be > 0 and finite)")]
    InvalidPhysicsDt(f64),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

/// Structural wiring mistakes, fatal at assembly time.
///
/// These indicate a misbuilt scene, not a runtime condition; they are never
/// retried and never folded into a [`CompletionResult`].
#[derive(Debug, Error)]
pub enum SetupError {
    #[error(
        "a contact registry is already attached to the rigid hierarchy of {0}; \
         one registry per hierarchy"
    )]
    DuplicateContactRegistry(ObjectId),

    #[error("unknown joint {0}")]
    UnknownJoint(JointId),

    #[error("unknown object {0}")]
    UnknownObject(ObjectId),
}

/// Pure-validation command rejections.
///
/// Raised before any physics step runs; no world state is touched. At the
/// controller boundary these become a failed [`CompletionResult`], never a
/// panic or a propagated error.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CommandError {
    #[error("target contains a non-finite coordinate")]
    NonFiniteTarget,

    #[error("speed must be positive and finite, got {0}")]
    NonPositiveSpeed(f32),

    #[error("tolerance must be non-negative, got {0}")]
    NegativeTolerance(f32),

    #[error("max_time must be positive, got {0}")]
    NonPositiveMaxTime(f32),

    #[error("position cache window must hold at least 2 samples, got {0}")]
    CacheWindowTooSmall(usize),

    #[error("rotation axis has zero length")]
    ZeroLengthAxis,

    #[error("rotation axis is not aligned with the wrist roll axis")]
    UnsupportedRotationAxis,

    #[error("already holding {0} object(s); release before picking up")]
    AlreadyHolding(usize),

    #[error("target extension {requested:.3} is outside the reachable range [0, {max:.3}]")]
    OutOfReach { requested: f32, max: f32 },

    #[error("target requires {0:.3} of lateral motion outside the arm's workspace")]
    LateralTarget(f32),

    #[error("joints have no travel capacity to allocate")]
    NoJointCapacity,

    #[error("nothing pickupable within {0:.3} of the magnet")]
    NothingWithinReach(f32),

    #[error("this arm has no elbow joint")]
    NoElbow,

    #[error("another motion is already in progress")]
    MotionInProgress,
}

impl From<CommandError> for CompletionResult {
    fn from(err: CommandError) -> Self {
        Self::fail(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn waldo_error_from_config_error() {
        let err = ConfigError::InvalidPhysicsDt(-0.02);
        let top: WaldoError = err.into();
        assert!(matches!(top, WaldoError::Config(_)));
        assert!(top.to_string().contains("-0.02"));
    }

    #[test]
    fn waldo_error_from_setup_error() {
        let err = SetupError::DuplicateContactRegistry(ObjectId(4));
        let top: WaldoError = err.into();
        assert!(matches!(top, WaldoError::Setup(_)));
        assert!(top.to_string().contains("object#4"));
    }

    #[test]
    fn command_error_becomes_failed_result() {
        let result: CompletionResult = CommandError::AlreadyHolding(1).into();
        assert!(!result.success);
        assert!(result.error_message.contains("already holding"));
    }

    #[test]
    fn command_error_display_messages() {
        assert_eq!(
            CommandError::NonPositiveSpeed(0.0).to_string(),
            "speed must be positive and finite, got 0"
        );
        assert_eq!(
            CommandError::ZeroLengthAxis.to_string(),
            "rotation axis has zero length"
        );
        assert_eq!(
            CommandError::CacheWindowTooSmall(1).to_string(),
            "position cache window must hold at least 2 samples, got 1"
        );
        assert_eq!(
            CommandError::OutOfReach {
                requested: 0.75,
                max: 0.4
            }
            .to_string(),
            "target extension 0.750 is outside the reachable range [0, 0.400]"
        );
    }

    #[test]
    fn config_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let config_err: ConfigError = io_err.into();
        assert!(matches!(config_err, ConfigError::Io(_)));
    }
}
