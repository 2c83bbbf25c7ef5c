use crate::error::{AuralisError, Result};
use crate::spatial::paths::{self, PathContext};
use crate::spatial::{
    BinauralRenderer, BlockInputs, RenderBlock, Renderer, SlotInputs, SourceRenderParams,
};
use crate::state::{SceneState, SlotEvent};
use crate::world::{AuralisWorld, SourceId};
use std::sync::Arc;

/// Render side of a spatializer instance.
///
/// `AuralisEngine` is owned by the audio thread. It keeps its own committed copy of
/// the scene, which it updates from the world's change queue in [`preprocess`](Self::preprocess)
/// and reads during [`render`](Self::render) and [`render_preassigned`](Self::render_preassigned).
/// Both render entry points run `preprocess` first.
///
/// Only one engine can be attached to a world at a time. Dropping the engine
/// detaches it and leaves its committed scene with the world, so a later engine
/// picks up the same sources, listener and environment.
///
/// # Failure policy
///
/// A render call that fails writes silence into the first `frames` samples of both
/// outputs (as far as they reach), logs a warning and returns the error. Committed
/// state stays as it was after the call's preprocess step.
pub struct AuralisEngine {
    world: Arc<AuralisWorld>,
    state: SceneState,
    renderer: Box<dyn Renderer>,
    context: PathContext,
    params: Vec<SourceRenderParams>,
    preassigned: Vec<f32>,
    max_block_size: usize,
    seen: Vec<u64>,
    epoch: u64,
    publish_pending: bool,
}

impl AuralisEngine {
    /// Attaches an engine with the built-in [`BinauralRenderer`].
    pub fn new(world: Arc<AuralisWorld>) -> Result<Self> {
        let renderer = BinauralRenderer::new(world.desc());
        Self::with_renderer(world, Box::new(renderer))
    }

    /// Attaches an engine that renders through a custom [`Renderer`].
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if another engine is attached to `world`.
    pub fn with_renderer(world: Arc<AuralisWorld>, renderer: Box<dyn Renderer>) -> Result<Self> {
        let parked = world.attach_engine()?;

        let desc = world.desc();
        let max_sources = desc.max_sources;
        let max_block_size = desc.max_block_size;

        log::info!(
            "Attaching Auralis engine ({} Hz, {} frames per block, {} sources)",
            desc.sample_rate.hz(),
            max_block_size,
            max_sources
        );

        if parked.is_some() {
            log::info!("Continuing from the scene committed by the previous engine");
        }

        Ok(Self {
            state: parked.unwrap_or_else(|| SceneState::new(desc.defaults, max_sources)),
            context: PathContext::new(desc),
            params: Vec::with_capacity(max_sources),
            preassigned: vec![0.0; max_sources * max_block_size],
            max_block_size,
            seen: vec![0; max_sources],
            epoch: 0,
            publish_pending: false,
            renderer,
            world,
        })
    }

    pub fn world(&self) -> &Arc<AuralisWorld> {
        &self.world
    }

    pub fn sample_rate(&self) -> u32 {
        self.world.sample_rate()
    }

    pub fn max_block_size(&self) -> usize {
        self.max_block_size
    }

    pub fn committed_source_count(&self) -> usize {
        self.state.sources.len()
    }

    /// Committed source ids in insertion order.
    pub fn committed_source_ids(&self) -> impl Iterator<Item = SourceId> + '_ {
        self.state.sources.ids()
    }

    /// Commits every change queued before this call, in the order it was queued.
    ///
    /// Changes queued while preprocess runs are left for the next call. Returns the
    /// number of changes applied; calling it with nothing queued changes nothing.
    pub fn preprocess(&mut self) -> usize {
        let world = Arc::clone(&self.world);
        let receiver = world.change_receiver();
        let pending = receiver.len();

        let mut applied = 0;
        for _ in 0..pending {
            let Ok(change) = receiver.try_recv() else {
                break;
            };
            if let Some(event) = self.state.apply(change) {
                let slot = match event {
                    SlotEvent::Added(slot) | SlotEvent::Removed(slot) => slot,
                };
                self.renderer.reset_source(slot);
                self.clear_preassigned(slot);
            }
            applied += 1;
        }

        if applied > 0 {
            log::debug!(
                "Committed {} changes ({} sources active)",
                applied,
                self.state.sources.len()
            );
            self.publish_pending = true;
        }

        if self.publish_pending {
            if self.world.try_publish(&self.state) {
                self.publish_pending = false;
            } else {
                log::debug!("Committed view is busy, publishing at the next preprocess");
            }
        }

        applied
    }

    /// Stores the next block of a source's audio for [`render_preassigned`](Self::render_preassigned).
    ///
    /// Copies up to `max_block_size` samples; a shorter block is padded with silence.
    /// The block is consumed by the next successful `render_preassigned`.
    ///
    /// # Errors
    ///
    /// Returns `UnknownSource` if the source is not committed. Call
    /// [`preprocess`](Self::preprocess) first to commit freshly added sources.
    pub fn source_audio_update(&mut self, id: impl Into<SourceId>, samples: &[f32]) -> Result<()> {
        let id = id.into();
        let slot = self
            .state
            .sources
            .slot_of(id)
            .ok_or(AuralisError::UnknownSource(id))?;

        let block = slot_block(&mut self.preassigned, self.max_block_size, slot);
        let count = samples.len().min(block.len());
        block[..count].copy_from_slice(&samples[..count]);
        block[count..].fill(0.0);
        Ok(())
    }

    /// Renders one block from caller-provided source audio.
    ///
    /// `source_ids[i]` names the source whose audio is `inputs[i]`. The mapping must
    /// list every committed source exactly once, in any order.
    ///
    /// # Errors
    ///
    /// - `BlockTooLarge` if `frames` exceeds the maximum block size
    /// - `SourceCountMismatch` if the mapping length differs from the committed source count
    /// - `UnknownSource` / `DuplicateSource` for ids not committed or listed twice
    /// - `InvalidBuffer` if an input or output holds fewer than `frames` samples
    pub fn render(
        &mut self,
        source_ids: &[SourceId],
        inputs: &[&[f32]],
        left: &mut [f32],
        right: &mut [f32],
        frames: usize,
    ) -> Result<()> {
        self.preprocess();
        let result = self.render_mapped(source_ids, inputs, left, right, frames);
        Self::finish(result, left, right, frames)
    }

    /// Renders one block from the audio stored with [`source_audio_update`](Self::source_audio_update).
    ///
    /// Sources without a stored block render silence.
    pub fn render_preassigned(
        &mut self,
        left: &mut [f32],
        right: &mut [f32],
        frames: usize,
    ) -> Result<()> {
        self.preprocess();
        let result = self.render_stored(left, right, frames);
        Self::finish(result, left, right, frames)
    }

    fn render_mapped(
        &mut self,
        source_ids: &[SourceId],
        inputs: &[&[f32]],
        left: &mut [f32],
        right: &mut [f32],
        frames: usize,
    ) -> Result<()> {
        self.check_block(left, right, frames)?;

        let expected = self.state.sources.len();
        if source_ids.len() != expected {
            return Err(AuralisError::SourceCountMismatch {
                expected,
                actual: source_ids.len(),
            });
        }
        if inputs.len() != source_ids.len() {
            return Err(AuralisError::InvalidBuffer(format!(
                "{} input buffers for {} sources",
                inputs.len(),
                source_ids.len()
            )));
        }
        if let Some(short) = inputs.iter().position(|input| input.len() < frames) {
            return Err(AuralisError::InvalidBuffer(format!(
                "input buffer {} holds {} samples, need {}",
                short,
                inputs[short].len(),
                frames
            )));
        }

        self.epoch += 1;
        self.params.clear();
        for (input, &id) in source_ids.iter().enumerate() {
            let (slot, source) = self
                .state
                .sources
                .slot_of(id)
                .and_then(|slot| self.state.sources.get(id).map(|source| (slot, source)))
                .ok_or(AuralisError::UnknownSource(id))?;
            if self.seen[slot] == self.epoch {
                return Err(AuralisError::DuplicateSource(id));
            }
            self.seen[slot] = self.epoch;

            self.params.push(paths::source_render_params(
                &self.context,
                &self.state,
                slot,
                source,
                input,
            ));
        }

        let block = RenderBlock {
            frames,
            sample_rate: self.world.sample_rate(),
            sources: &self.params,
            latefield: paths::latefield(&self.state.environment, self.state.globals.latefield_gain),
        };
        self.renderer.render(&block, &inputs, left, right)
    }

    fn render_stored(&mut self, left: &mut [f32], right: &mut [f32], frames: usize) -> Result<()> {
        self.check_block(left, right, frames)?;

        self.params.clear();
        for (slot, source) in self.state.sources.iter() {
            self.params.push(paths::source_render_params(
                &self.context,
                &self.state,
                slot,
                source,
                slot,
            ));
        }

        let inputs = SlotInputs {
            data: &self.preassigned,
            stride: self.max_block_size,
        };
        let block = RenderBlock {
            frames,
            sample_rate: self.world.sample_rate(),
            sources: &self.params,
            latefield: paths::latefield(&self.state.environment, self.state.globals.latefield_gain),
        };
        self.renderer
            .render(&block, &inputs as &dyn BlockInputs, left, right)?;

        for params in &self.params {
            slot_block(&mut self.preassigned, self.max_block_size, params.slot).fill(0.0);
        }
        Ok(())
    }

    fn check_block(&self, left: &[f32], right: &[f32], frames: usize) -> Result<()> {
        let max = self.max_block_size;
        if frames > max {
            return Err(AuralisError::BlockTooLarge { frames, max });
        }
        if left.len() < frames || right.len() < frames {
            return Err(AuralisError::InvalidBuffer(format!(
                "output buffers hold {} and {} samples, need {}",
                left.len(),
                right.len(),
                frames
            )));
        }
        Ok(())
    }

    fn finish(result: Result<()>, left: &mut [f32], right: &mut [f32], frames: usize) -> Result<()> {
        if let Err(e) = &result {
            let left_end = frames.min(left.len());
            let right_end = frames.min(right.len());
            left[..left_end].fill(0.0);
            right[..right_end].fill(0.0);
            log::warn!("Render pass rejected, output silenced: {}", e);
        }
        result
    }

    fn clear_preassigned(&mut self, slot: usize) {
        slot_block(&mut self.preassigned, self.max_block_size, slot).fill(0.0);
    }
}

fn slot_block(buffer: &mut [f32], stride: usize, slot: usize) -> &mut [f32] {
    &mut buffer[slot * stride..(slot + 1) * stride]
}

impl Drop for AuralisEngine {
    fn drop(&mut self) {
        let globals = self.state.globals;
        let state = std::mem::replace(&mut self.state, SceneState::new(globals, 0));
        self.world.detach_engine(state);
        log::info!("Auralis engine detached");
    }
}
