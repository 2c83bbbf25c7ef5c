//! Global defaults and per-source parameter overrides.
//!
//! Every per-source scalar is either inherited from [`GlobalDefaults`] or explicitly set
//! for that source. Writing a global default only touches sources that still inherit it.

use crate::error::{Result, ensure_in_range, ensure_non_negative, ensure_positive};

/// Engine-wide fallback values for source parameters plus the output gains of the
/// reflections and latefield paths.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlobalDefaults {
    /// Distance in meters below which the distance gain stops increasing (> 0)
    pub minimum_distance: f32,
    /// Exponent of the distance law; 1.0 is the physical 1/distance attenuation (>= 0)
    pub attenuation_factor: f32,
    /// Remove propagation delay from the direct path
    pub zero_delay: bool,
    /// 0.0 = maximum externalisation, 1.0 = full clarity
    pub clarity: f32,
    /// RMS multiplier applied to all early reflections
    pub reflections_gain: f32,
    /// RMS multiplier applied to the latefield
    pub latefield_gain: f32,
}

impl Default for GlobalDefaults {
    fn default() -> Self {
        Self {
            minimum_distance: 0.1,
            attenuation_factor: 1.0,
            zero_delay: false,
            clarity: 0.0,
            reflections_gain: 1.0,
            latefield_gain: 1.0,
        }
    }
}

impl GlobalDefaults {
    pub fn validate(&self) -> Result<()> {
        validate_minimum_distance(self.minimum_distance)?;
        validate_attenuation_factor(self.attenuation_factor)?;
        validate_clarity(self.clarity)?;
        validate_gain("reflections gain", self.reflections_gain)?;
        validate_gain("latefield gain", self.latefield_gain)?;
        Ok(())
    }
}

pub(crate) fn validate_minimum_distance(value: f32) -> Result<f32> {
    ensure_positive("minimum distance", value)
}

pub(crate) fn validate_attenuation_factor(value: f32) -> Result<f32> {
    ensure_non_negative("distance attenuation factor", value)
}

pub(crate) fn validate_clarity(value: f32) -> Result<f32> {
    ensure_in_range("clarity", value, 0.0, 1.0)
}

pub(crate) fn validate_gain(name: &str, value: f32) -> Result<f32> {
    ensure_non_negative(name, value)
}

/// A source parameter that either follows the global default or overrides it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamValue<T> {
    Inherited(T),
    Explicit(T),
}

impl<T: Copy> ParamValue<T> {
    pub fn value(&self) -> T {
        match *self {
            Self::Inherited(value) | Self::Explicit(value) => value,
        }
    }

    pub fn is_explicit(&self) -> bool {
        matches!(self, Self::Explicit(_))
    }

    /// Follows a new global default unless explicitly overridden.
    pub fn inherit(&mut self, global: T) {
        if let Self::Inherited(value) = self {
            *value = global;
        }
    }

    pub fn set(&mut self, value: T) {
        *self = Self::Explicit(value);
    }

    pub fn reset(&mut self, global: T) {
        *self = Self::Inherited(global);
    }
}

/// The per-source scalars that shape a source's direct path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceParams {
    pub minimum_distance: ParamValue<f32>,
    pub attenuation_factor: ParamValue<f32>,
    pub zero_delay: ParamValue<bool>,
    pub clarity: ParamValue<f32>,
}

impl SourceParams {
    pub fn from_defaults(defaults: &GlobalDefaults) -> Self {
        Self {
            minimum_distance: ParamValue::Inherited(defaults.minimum_distance),
            attenuation_factor: ParamValue::Inherited(defaults.attenuation_factor),
            zero_delay: ParamValue::Inherited(defaults.zero_delay),
            clarity: ParamValue::Inherited(defaults.clarity),
        }
    }

    /// Drops every override.
    pub fn reset(&mut self, defaults: &GlobalDefaults) {
        *self = Self::from_defaults(defaults);
    }

    pub fn minimum_distance(&self) -> f32 {
        self.minimum_distance.value()
    }

    pub fn attenuation_factor(&self) -> f32 {
        self.attenuation_factor.value()
    }

    pub fn zero_delay(&self) -> bool {
        self.zero_delay.value()
    }

    pub fn clarity(&self) -> f32 {
        self.clarity.value()
    }
}

impl Default for SourceParams {
    fn default() -> Self {
        Self::from_defaults(&GlobalDefaults::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inherit_skips_explicit_values() {
        let mut inherited = ParamValue::Inherited(1.0);
        let mut explicit = ParamValue::Explicit(2.0);

        inherited.inherit(3.0);
        explicit.inherit(3.0);

        assert_eq!(inherited.value(), 3.0);
        assert_eq!(explicit.value(), 2.0);
        assert!(explicit.is_explicit());
    }

    #[test]
    fn test_reset_returns_to_defaults() {
        let defaults = GlobalDefaults::default();
        let mut params = SourceParams::from_defaults(&defaults);
        params.clarity.set(0.7);
        params.zero_delay.set(true);

        params.reset(&defaults);

        assert_eq!(params, SourceParams::from_defaults(&defaults));
        assert!(!params.clarity.is_explicit());
    }

    #[test]
    fn test_validation_rejects_out_of_domain_values() {
        assert!(validate_minimum_distance(0.0).is_err());
        assert!(validate_minimum_distance(-1.0).is_err());
        assert!(validate_minimum_distance(f32::NAN).is_err());
        assert!(validate_minimum_distance(0.01).is_ok());

        assert!(validate_attenuation_factor(-0.1).is_err());
        assert!(validate_attenuation_factor(0.0).is_ok());

        assert!(validate_clarity(1.5).is_err());
        assert!(validate_clarity(1.0).is_ok());

        assert!(validate_gain("gain", f32::INFINITY).is_err());
    }
}
