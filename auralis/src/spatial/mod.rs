// Spatial rendering
//
// Path derivation turns the committed scene into per-source render parameters; a
// `Renderer` turns those parameters and the source audio into a binaural block.

mod binaural;
pub mod paths;

#[cfg(feature = "steam-audio")]
mod hrtf;
#[cfg(feature = "steam-audio")]
mod steam;

pub use binaural::BinauralRenderer;
pub use paths::{PathContext, PathParams};
#[cfg(feature = "steam-audio")]
pub use steam::SteamAudioRenderer;

use crate::error::Result;
use crate::world::SourceId;

/// Everything a renderer needs to know about one source for one block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceRenderParams {
    pub id: SourceId,
    /// Stable arena slot; per-source renderer state is keyed by it
    pub slot: usize,
    /// Index passed to [`BlockInputs::input`] to fetch this source's audio
    pub input: usize,
    pub direct: PathParams,
    /// First-order reflections, indexed like [`Surface::REFLECTIVE`](crate::scene::Surface::REFLECTIVE)
    pub reflections: [Option<PathParams>; 6],
    /// 0.0 = maximum externalisation, 1.0 = full clarity
    pub clarity: f32,
    /// Amount of this source fed into the latefield
    pub latefield_send: f32,
}

/// Reverberant tail of a shoebox room.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatefieldParams {
    /// Reverberation time in seconds per band [low, mid, high]
    pub rt60: [f32; 3],
    /// RMS level of the tail, including the latefield multiplier
    pub level: f32,
}

/// One block worth of finalized render parameters.
#[derive(Debug, Clone, Copy)]
pub struct RenderBlock<'a> {
    pub frames: usize,
    pub sample_rate: u32,
    pub sources: &'a [SourceRenderParams],
    /// `None` in free field
    pub latefield: Option<LatefieldParams>,
}

/// Source audio for the current block.
pub trait BlockInputs {
    /// Mono samples for [`SourceRenderParams::input`]. May be shorter than the block,
    /// in which case the remainder is treated as silence.
    fn input(&self, index: usize) -> &[f32];
}

impl BlockInputs for &[&[f32]] {
    fn input(&self, index: usize) -> &[f32] {
        self.get(index).copied().unwrap_or(&[])
    }
}

/// Per-slot blocks stored back to back with a fixed stride.
pub struct SlotInputs<'a> {
    pub data: &'a [f32],
    pub stride: usize,
}

impl BlockInputs for SlotInputs<'_> {
    fn input(&self, index: usize) -> &[f32] {
        let start = index * self.stride;
        self.data.get(start..start + self.stride).unwrap_or(&[])
    }
}

/// Turns finalized render parameters into a stereo block.
///
/// Called once per block on the render thread with a committed snapshot. Must not
/// allocate or block.
pub trait Renderer: Send {
    /// Writes `block.frames` samples into `left` and `right`, overwriting them.
    fn render(
        &mut self,
        block: &RenderBlock<'_>,
        inputs: &dyn BlockInputs,
        left: &mut [f32],
        right: &mut [f32],
    ) -> Result<()>;

    /// Clears per-slot state after a source was added to or removed from `slot`.
    fn reset_source(&mut self, slot: usize);
}
