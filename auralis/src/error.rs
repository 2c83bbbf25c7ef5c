//! Error types for Auralis

use crate::world::SourceId;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AuralisError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Source {0} is already active")]
    DuplicateSource(SourceId),

    #[error("Source {0} is not active")]
    UnknownSource(SourceId),

    #[error("Invalid surface identifier: {0}")]
    InvalidSurface(i32),

    #[error("Unknown material: {0}")]
    UnknownMaterial(String),

    #[error("Block of {frames} frames exceeds the maximum block size of {max}")]
    BlockTooLarge { frames: usize, max: usize },

    #[error("Source mapping has {actual} entries but {expected} sources are active")]
    SourceCountMismatch { expected: usize, actual: usize },

    #[error("Source limit of {0} reached")]
    SourceLimit(usize),

    #[error("Parameter change queue is full")]
    ChangeQueueFull,

    #[error("Invalid buffer: {0}")]
    InvalidBuffer(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Audio device error: {0}")]
    AudioDevice(String),

    #[error("Audio format error: {0}")]
    AudioFormat(String),

    #[error("Spatialization error: {0}")]
    Spatialization(String),
}

pub type Result<T> = std::result::Result<T, AuralisError>;

/// Rejects non-finite values and values outside `[min, max]`.
pub(crate) fn ensure_in_range(name: &str, value: f32, min: f32, max: f32) -> Result<f32> {
    if value.is_finite() && (min..=max).contains(&value) {
        Ok(value)
    } else {
        Err(AuralisError::InvalidParameter(format!(
            "{} must be within [{}, {}], got {}",
            name, min, max, value
        )))
    }
}

/// Rejects non-finite and non-positive values.
pub(crate) fn ensure_positive(name: &str, value: f32) -> Result<f32> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(AuralisError::InvalidParameter(format!(
            "{} must be positive, got {}",
            name, value
        )))
    }
}

/// Rejects non-finite and negative values.
pub(crate) fn ensure_non_negative(name: &str, value: f32) -> Result<f32> {
    ensure_in_range(name, value, 0.0, f32::MAX)
}
