//! Acoustic scene description.
//!
//! The scene is the acoustic space sources and the listener live in:
//!
//! 1. **Environment** - free field, or a rectangular shoebox room placed in the world
//!    by an origin and orientation
//! 2. **AudioMaterial** - acoustic properties of a surface (absorption, scattering, transmission)
//! 3. **MaterialLibrary** - named materials that shoebox surfaces refer to
//!
//! # Example
//!
//! ```rust,ignore
//! use auralis::scene::{AudioMaterial, Surface};
//!
//! world.register_material("foam", AudioMaterial { absorption: [0.3, 0.8, 0.9], ..AudioMaterial::GENERIC })?;
//! world.set_environment_shoebox(6.0, 8.0, 3.0)?;
//! world.set_surface_material(Surface::Floor, "carpet")?;
//! world.set_surface_material(Surface::Ceiling, "foam")?;
//! ```

pub mod environment;
pub mod material;

pub use environment::{Environment, EnvironmentState, RoomDimensions, Surface};
pub use material::{AudioMaterial, MaterialLibrary, MaterialRef};
