//! # Auralis
//!
//! A real-time binaural spatializer for Rust. Auralis places mono sources in a 3D
//! scene around a listener, optionally inside a shoebox room with per-surface
//! materials, and renders them to a stereo headphone signal block by block.
//!
//! ## Quick Start
//!
//! ```
//! use auralis::{AuralisWorldDesc, SourceId, Vec3};
//!
//! let desc = AuralisWorldDesc {
//!     max_block_size: 256,
//!     ..Default::default()
//! };
//! let (world, mut engine) = auralis::create(desc)?;
//!
//! // Control side: queue changes from any thread
//! world.add_source(1, Vec3::new(1.0, 2.0, 0.0))?;
//! world.set_environment_shoebox(6.0, 8.0, 3.0)?;
//!
//! // Render side: one call per audio block
//! let input = [0.0f32; 256];
//! let mut left = [0.0f32; 256];
//! let mut right = [0.0f32; 256];
//! engine.render(&[SourceId(1)], &[&input], &mut left, &mut right, 256)?;
//! # Ok::<(), auralis::AuralisError>(())
//! ```
//!
//! ## Key Components
//!
//! - **[`AuralisWorld`]**: control-side API; setters validate and queue changes, getters
//!   read the last committed view
//! - **[`AuralisEngine`]**: render-side API; commits queued changes and renders blocks
//! - **[`Renderer`](spatial::Renderer)**: seam between path derivation and the signal
//!   processing, with a built-in [`BinauralRenderer`](spatial::BinauralRenderer)
//!
//! ## Architecture
//!
//! Setters never touch the state the renderer reads. Each one validates its
//! arguments and pushes a small change record onto a bounded queue. The render
//! thread drains the queue at the start of every block (`preprocess`), applies the
//! changes in the order they were queued and publishes a copy of the committed scene
//! for the getters. A value set between two blocks therefore takes effect at the
//! start of the next one, and every block renders a consistent scene.
//!
//! ## Features
//!
//! - `device`: live playback through the default output device ([`AuralisOutput`])
//! - `steam-audio`: HRTF rendering through Steam Audio (`SteamAudioRenderer`)

pub mod buffer;
pub mod changes;
pub mod config;
pub mod engine;
pub mod error;
pub mod geometry;
pub mod math;
#[cfg(feature = "device")]
pub mod output;
pub mod scene;
pub mod source;
pub mod spatial;
pub mod state;
pub mod world;

pub use config::{AuralisWorldDesc, GlobalDefaults, SampleRate};
pub use engine::AuralisEngine;
pub use error::{AuralisError, Result};
pub use geometry::{EulerAngles, Spherical};
pub use math::{Pose, Quat, Vec3};
#[cfg(feature = "device")]
pub use output::AuralisOutput;
pub use scene::{AudioMaterial, Environment, Surface};
pub use world::{AuralisWorld, SourceId};

use std::sync::Arc;

/// Creates a world and attaches its engine.
///
/// The world goes to the control threads, the engine to the render thread.
///
/// # Errors
///
/// Returns `Configuration` if the descriptor is invalid.
pub fn create(desc: AuralisWorldDesc) -> Result<(Arc<AuralisWorld>, AuralisEngine)> {
    let world = Arc::new(AuralisWorld::new(desc)?);
    let engine = AuralisEngine::new(Arc::clone(&world))?;
    Ok((world, engine))
}
