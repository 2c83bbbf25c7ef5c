use crate::config::GlobalDefaults;
use crate::error::{AuralisError, Result};

/// Sample rates the spatializer can run at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SampleRate {
    Hz44100,
    #[default]
    Hz48000,
    Hz88200,
    Hz96000,
    Hz192000,
}

impl SampleRate {
    pub fn hz(self) -> u32 {
        match self {
            Self::Hz44100 => 44_100,
            Self::Hz48000 => 48_000,
            Self::Hz88200 => 88_200,
            Self::Hz96000 => 96_000,
            Self::Hz192000 => 192_000,
        }
    }
}

impl TryFrom<u32> for SampleRate {
    type Error = AuralisError;

    fn try_from(hz: u32) -> Result<Self> {
        match hz {
            44_100 => Ok(Self::Hz44100),
            48_000 => Ok(Self::Hz48000),
            88_200 => Ok(Self::Hz88200),
            96_000 => Ok(Self::Hz96000),
            192_000 => Ok(Self::Hz192000),
            other => Err(AuralisError::InvalidParameter(format!(
                "unsupported sample rate: {} Hz",
                other
            ))),
        }
    }
}

impl From<SampleRate> for u32 {
    fn from(rate: SampleRate) -> Self {
        rate.hz()
    }
}

/// Configuration descriptor for an Auralis world
#[derive(Debug, Clone)]
pub struct AuralisWorldDesc {
    /// Sample rate of the render path
    pub sample_rate: SampleRate,
    /// Largest number of frames a single render call may request. Smaller blocks are allowed.
    pub max_block_size: usize,
    /// Maximum number of concurrently active sources. All per-source render memory is
    /// allocated up front for this many sources.
    pub max_sources: usize,
    /// Number of parameter changes that can be queued between two commits
    pub change_queue_capacity: usize,
    /// Longest propagation path in meters the renderer keeps delay memory for
    pub max_path_length: f32,
    /// Speed of sound in meters per second
    pub speed_of_sound: f32,
    /// Initial global source defaults and output gains
    pub defaults: GlobalDefaults,
    /// Optional path to a custom HRTF SOFA file (None uses the renderer's default HRTF)
    pub hrtf_path: Option<String>,
}

impl Default for AuralisWorldDesc {
    fn default() -> Self {
        Self {
            sample_rate: SampleRate::Hz48000,
            max_block_size: 1024,
            max_sources: 64,
            change_queue_capacity: 4096,
            max_path_length: 50.0,
            speed_of_sound: 343.0,
            defaults: GlobalDefaults::default(),
            hrtf_path: None,
        }
    }
}

impl AuralisWorldDesc {
    pub fn new(sample_rate: SampleRate, max_block_size: usize) -> Self {
        Self {
            sample_rate,
            max_block_size,
            ..Default::default()
        }
    }

    /// Checks every field, returning the first violation.
    pub fn validate(&self) -> Result<()> {
        if self.max_block_size == 0 {
            return Err(AuralisError::Configuration(
                "max_block_size must be greater than zero".into(),
            ));
        }
        if self.max_sources == 0 {
            return Err(AuralisError::Configuration(
                "max_sources must be greater than zero".into(),
            ));
        }
        if self.change_queue_capacity == 0 {
            return Err(AuralisError::Configuration(
                "change_queue_capacity must be greater than zero".into(),
            ));
        }
        if !(self.max_path_length.is_finite() && self.max_path_length > 0.0) {
            return Err(AuralisError::Configuration(format!(
                "max_path_length must be positive, got {}",
                self.max_path_length
            )));
        }
        if !(self.speed_of_sound.is_finite() && self.speed_of_sound > 0.0) {
            return Err(AuralisError::Configuration(format!(
                "speed_of_sound must be positive, got {}",
                self.speed_of_sound
            )));
        }
        self.defaults
            .validate()
            .map_err(|e| AuralisError::Configuration(format!("invalid defaults: {}", e)))
    }

    /// Longest delay in samples a path can have.
    pub fn max_delay_samples(&self) -> usize {
        (self.max_path_length / self.speed_of_sound * self.sample_rate.hz() as f32).ceil() as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_rate_conversion() {
        for hz in [44_100, 48_000, 88_200, 96_000, 192_000] {
            let rate = SampleRate::try_from(hz).unwrap();
            assert_eq!(rate.hz(), hz);
        }
        assert!(matches!(
            SampleRate::try_from(22_050),
            Err(AuralisError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_default_desc_is_valid() {
        assert!(AuralisWorldDesc::default().validate().is_ok());
    }

    #[test]
    fn test_zero_block_size_is_rejected() {
        let desc = AuralisWorldDesc::new(SampleRate::Hz44100, 0);
        assert!(matches!(
            desc.validate(),
            Err(AuralisError::Configuration(_))
        ));
    }

    #[test]
    fn test_invalid_defaults_are_rejected() {
        let mut desc = AuralisWorldDesc::default();
        desc.defaults.minimum_distance = 0.0;
        assert!(desc.validate().is_err());
    }

    #[test]
    fn test_max_delay_samples() {
        let desc = AuralisWorldDesc {
            max_path_length: 343.0,
            ..Default::default()
        };
        assert_eq!(desc.max_delay_samples(), 48_000);
    }
}
