//! Acoustic material properties for shoebox surfaces.
//!
//! Materials describe how a surface interacts with sound in three frequency bands
//! (400 Hz, 2.5 KHz, 15 KHz).

use crate::error::{AuralisError, Result};

/// Acoustic properties of a surface material.
///
/// - **Absorption**: Energy absorbed (not reflected) at each frequency band
/// - **Scattering**: How diffuse (vs. specular) reflections are. Scattered energy
///   leaves the image-source reflection and stays in the latefield.
/// - **Transmission**: Energy transmitted through the surface. Validated and kept
///   for custom renderers; the built-in paths never cross a wall, so it is unused
///   there.
///
/// # Example
///
/// ```
/// use auralis::scene::AudioMaterial;
///
/// let wall = AudioMaterial::CONCRETE;
///
/// let foam = AudioMaterial {
///     absorption: [0.30, 0.80, 0.90],
///     ..AudioMaterial::GENERIC
/// };
/// assert!(foam.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioMaterial {
    /// Fraction of sound energy absorbed at [low, mid, high] frequencies (0.0 - 1.0)
    pub absorption: [f32; 3],

    /// Fraction of reflected energy scattered diffusely (0.0 - 1.0)
    pub scattering: f32,

    /// Fraction of sound energy transmitted through the surface at [low, mid, high] (0.0 - 1.0)
    pub transmission: [f32; 3],
}

impl AudioMaterial {
    pub const GENERIC: Self = Self {
        absorption: [0.10, 0.20, 0.30],
        scattering: 0.05,
        transmission: [0.100, 0.050, 0.030],
    };

    pub const BRICK: Self = Self {
        absorption: [0.03, 0.04, 0.07],
        scattering: 0.05,
        transmission: [0.015, 0.015, 0.015],
    };

    pub const CONCRETE: Self = Self {
        absorption: [0.05, 0.07, 0.08],
        scattering: 0.05,
        transmission: [0.015, 0.002, 0.001],
    };

    pub const CERAMIC: Self = Self {
        absorption: [0.01, 0.02, 0.02],
        scattering: 0.05,
        transmission: [0.060, 0.044, 0.011],
    };

    pub const GRAVEL: Self = Self {
        absorption: [0.60, 0.70, 0.80],
        scattering: 0.05,
        transmission: [0.031, 0.012, 0.008],
    };

    pub const CARPET: Self = Self {
        absorption: [0.24, 0.69, 0.73],
        scattering: 0.05,
        transmission: [0.020, 0.005, 0.003],
    };

    pub const GLASS: Self = Self {
        absorption: [0.06, 0.03, 0.02],
        scattering: 0.05,
        transmission: [0.060, 0.044, 0.011],
    };

    pub const PLASTER: Self = Self {
        absorption: [0.12, 0.06, 0.04],
        scattering: 0.05,
        transmission: [0.056, 0.056, 0.004],
    };

    pub const WOOD: Self = Self {
        absorption: [0.11, 0.07, 0.06],
        scattering: 0.05,
        transmission: [0.070, 0.014, 0.005],
    };

    pub const METAL: Self = Self {
        absorption: [0.20, 0.07, 0.06],
        scattering: 0.05,
        transmission: [0.200, 0.025, 0.010],
    };

    pub const ROCK: Self = Self {
        absorption: [0.13, 0.20, 0.24],
        scattering: 0.05,
        transmission: [0.015, 0.002, 0.001],
    };

    /// Validates that all material properties are within [0.0, 1.0]
    pub fn validate(&self) -> Result<()> {
        let in_unit_range = |v: f32| (0.0..=1.0).contains(&v);

        if !self.absorption.iter().copied().all(in_unit_range) {
            return Err(AuralisError::InvalidParameter(
                "Absorption values must be between 0.0 and 1.0".into(),
            ));
        }
        if !in_unit_range(self.scattering) {
            return Err(AuralisError::InvalidParameter(
                "Scattering value must be between 0.0 and 1.0".into(),
            ));
        }
        if !self.transmission.iter().copied().all(in_unit_range) {
            return Err(AuralisError::InvalidParameter(
                "Transmission values must be between 0.0 and 1.0".into(),
            ));
        }
        Ok(())
    }

    /// Pressure reflection factor per band, `sqrt(1 - absorption)`.
    pub fn reflection_factors(&self) -> [f32; 3] {
        self.absorption.map(|a| (1.0 - a).max(0.0).sqrt())
    }

    /// Pressure factor per band of the specular (mirror) part of a reflection,
    /// `sqrt((1 - absorption) * (1 - scattering))`.
    pub fn specular_factors(&self) -> [f32; 3] {
        let specular = (1.0 - self.scattering).max(0.0).sqrt();
        self.reflection_factors().map(|factor| factor * specular)
    }
}

impl Default for AudioMaterial {
    fn default() -> Self {
        Self::GENERIC
    }
}

/// A resolved material as carried by a parameter change.
///
/// Holds a copy of the properties so the render side never touches the library.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaterialRef {
    pub index: u16,
    pub properties: AudioMaterial,
}

const PRESETS: [(&str, AudioMaterial); 11] = [
    ("generic", AudioMaterial::GENERIC),
    ("brick", AudioMaterial::BRICK),
    ("concrete", AudioMaterial::CONCRETE),
    ("ceramic", AudioMaterial::CERAMIC),
    ("gravel", AudioMaterial::GRAVEL),
    ("carpet", AudioMaterial::CARPET),
    ("glass", AudioMaterial::GLASS),
    ("plaster", AudioMaterial::PLASTER),
    ("wood", AudioMaterial::WOOD),
    ("metal", AudioMaterial::METAL),
    ("rock", AudioMaterial::ROCK),
];

/// Named material lookup.
///
/// Names are matched case-insensitively. Indices are stable: re-registering a name
/// replaces its properties but keeps its index.
///
/// ```
/// use auralis::scene::{AudioMaterial, MaterialLibrary};
///
/// let mut library = MaterialLibrary::with_presets();
/// let wood = library.lookup("Wood").unwrap();
/// assert_eq!(wood.properties, AudioMaterial::WOOD);
///
/// library.register("foam", AudioMaterial { absorption: [0.3, 0.8, 0.9], ..AudioMaterial::GENERIC }).unwrap();
/// assert_eq!(library.name(library.lookup("foam").unwrap().index), Some("foam"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct MaterialLibrary {
    entries: Vec<(String, AudioMaterial)>,
}

impl MaterialLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a library pre-loaded with the built-in presets
    /// (generic, brick, concrete, ceramic, gravel, carpet, glass, plaster, wood, metal, rock).
    pub fn with_presets() -> Self {
        Self {
            entries: PRESETS
                .iter()
                .map(|(name, material)| (name.to_string(), *material))
                .collect(),
        }
    }

    /// Adds or replaces a named material and returns its reference.
    pub fn register(&mut self, name: &str, material: AudioMaterial) -> Result<MaterialRef> {
        material.validate()?;

        let key = normalize(name);
        if key.is_empty() {
            return Err(AuralisError::InvalidParameter(
                "material name must not be empty".into(),
            ));
        }

        if let Some(index) = self.position(&key) {
            self.entries[index].1 = material;
            return Ok(MaterialRef {
                index: index as u16,
                properties: material,
            });
        }

        if self.entries.len() > u16::MAX as usize {
            return Err(AuralisError::Configuration(format!(
                "material library is full ({} materials)",
                self.entries.len()
            )));
        }

        let index = self.entries.len() as u16;
        self.entries.push((key, material));
        Ok(MaterialRef {
            index,
            properties: material,
        })
    }

    /// Resolves a name, failing with `UnknownMaterial`.
    pub fn lookup(&self, name: &str) -> Result<MaterialRef> {
        self.position(&normalize(name))
            .map(|index| MaterialRef {
                index: index as u16,
                properties: self.entries[index].1,
            })
            .ok_or_else(|| AuralisError::UnknownMaterial(name.to_string()))
    }

    pub fn get(&self, name: &str) -> Option<&AudioMaterial> {
        self.position(&normalize(name))
            .map(|index| &self.entries[index].1)
    }

    pub fn name(&self, index: u16) -> Option<&str> {
        self.entries
            .get(index as usize)
            .map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AudioMaterial)> {
        self.entries
            .iter()
            .map(|(name, material)| (name.as_str(), material))
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.entries.iter().position(|(name, _)| name == key)
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_material_validation() {
        assert!(AudioMaterial::CONCRETE.validate().is_ok());

        let invalid_absorption = AudioMaterial {
            absorption: [0.5, 1.5, 0.3],
            ..AudioMaterial::GENERIC
        };
        assert!(invalid_absorption.validate().is_err());

        let invalid_scattering = AudioMaterial {
            scattering: -0.1,
            ..AudioMaterial::GENERIC
        };
        assert!(invalid_scattering.validate().is_err());

        let nan_transmission = AudioMaterial {
            transmission: [f32::NAN, 0.0, 0.0],
            ..AudioMaterial::GENERIC
        };
        assert!(nan_transmission.validate().is_err());
    }

    #[test]
    fn test_reflection_factors() {
        let hard = AudioMaterial {
            absorption: [0.0, 0.75, 1.0],
            ..AudioMaterial::GENERIC
        };
        assert_eq!(hard.reflection_factors(), [1.0, 0.5, 0.0]);

        let diffuse = AudioMaterial {
            scattering: 0.75,
            ..hard
        };
        assert_eq!(diffuse.specular_factors(), [0.5, 0.25, 0.0]);
        assert_eq!(diffuse.reflection_factors(), hard.reflection_factors());
    }

    #[test]
    fn test_library_with_presets() {
        let library = MaterialLibrary::with_presets();
        assert_eq!(library.len(), 11);
        assert_eq!(library.get("concrete"), Some(&AudioMaterial::CONCRETE));
        assert_eq!(library.lookup("  ROCK ").unwrap().properties, AudioMaterial::ROCK);
        assert_eq!(library.name(0), Some("generic"));
    }

    #[test]
    fn test_unknown_material() {
        let library = MaterialLibrary::with_presets();
        assert_eq!(
            library.lookup("velvet"),
            Err(AuralisError::UnknownMaterial("velvet".into()))
        );
    }

    #[test]
    fn test_register_keeps_index_on_replace() {
        let mut library = MaterialLibrary::new();
        assert!(library.is_empty());

        let first = library.register("panel", AudioMaterial::WOOD).unwrap();
        let second = library.register("Panel", AudioMaterial::METAL).unwrap();

        assert_eq!(first.index, second.index);
        assert_eq!(library.len(), 1);
        assert_eq!(library.get("panel"), Some(&AudioMaterial::METAL));
    }

    #[test]
    fn test_register_rejects_bad_input() {
        let mut library = MaterialLibrary::new();
        assert!(library.register("", AudioMaterial::WOOD).is_err());
        let bad = AudioMaterial {
            scattering: 2.0,
            ..AudioMaterial::WOOD
        };
        assert!(library.register("bad", bad).is_err());
        assert!(library.is_empty());
    }
}
