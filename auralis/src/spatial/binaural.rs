//! Built-in binaural renderer.
//!
//! Each source slot owns a delay line. Every path (direct plus six reflections) is
//! read from it at its propagation delay, shaped by a three-band equalizer and panned
//! with interaural level, time and head-shadow differences. Clarity fades the
//! interaural time and head-shadow cues out. A bank of damped comb filters per ear
//! renders the latefield.
//!
//! Parameters are interpolated across each block, and paths that appear or vanish
//! fade in and out, so moving sources do not click.

use crate::config::AuralisWorldDesc;
use crate::error::{AuralisError, Result};
use crate::spatial::{BlockInputs, LatefieldParams, PathParams, RenderBlock, Renderer};
use std::f32::consts::{FRAC_PI_4, TAU};

const PATHS: usize = 7;

/// Largest interaural time difference in seconds.
const MAX_ITD_SECONDS: f32 = 0.00066;
/// High-band loss at the far ear for a fully lateral source.
const HEAD_SHADOW: f32 = 0.6;
/// High-band loss for a source directly behind.
const REAR_SHADOW: f32 = 0.3;

const LOW_CROSSOVER_HZ: f32 = 800.0;
const HIGH_CROSSOVER_HZ: f32 = 6000.0;

/// Comb lengths at 44.1 kHz; the right ear is offset for decorrelation.
const COMB_TUNING: [usize; 4] = [1116, 1188, 1277, 1356];
const STEREO_SPREAD: usize = 23;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct EarParams {
    gain: f32,
    delay: f32,
    equalizer: [f32; 3],
}

impl EarParams {
    fn lerp(&self, target: &Self, t: f32) -> Self {
        let mix = |a: f32, b: f32| a + (b - a) * t;
        Self {
            gain: mix(self.gain, target.gain),
            delay: mix(self.delay, target.delay),
            equalizer: [
                mix(self.equalizer[0], target.equalizer[0]),
                mix(self.equalizer[1], target.equalizer[1]),
                mix(self.equalizer[2], target.equalizer[2]),
            ],
        }
    }

    fn silent(self) -> Self {
        Self { gain: 0.0, ..self }
    }
}

/// Per-ear parameters of one path.
fn ear_params(path: &PathParams, clarity: f32, max_itd: f32) -> [EarParams; 2] {
    let cue = 1.0 - clarity.clamp(0.0, 1.0);
    let (sin_az, cos_az) = path.azimuth.sin_cos();
    let cos_el = path.elevation.cos();

    // +1 is fully left, -1 fully right
    let lateral = (sin_az * cos_el).clamp(-1.0, 1.0);
    let angle = (1.0 - lateral) * FRAC_PI_4;
    let (pan_left, pan_right) = (angle.cos(), angle.sin());

    let itd = cue * max_itd * lateral.abs();
    let shadow = 1.0 - HEAD_SHADOW * cue * lateral.abs();
    let rear = 1.0 - REAR_SHADOW * cue * (-cos_az * cos_el).max(0.0);

    let near = |pan: f32| EarParams {
        gain: path.gain * pan,
        delay: path.delay,
        equalizer: [
            path.equalizer[0],
            path.equalizer[1],
            path.equalizer[2] * rear,
        ],
    };
    let far = |pan: f32| EarParams {
        gain: path.gain * pan,
        delay: path.delay + itd,
        equalizer: [
            path.equalizer[0],
            path.equalizer[1] * (1.0 + shadow) * 0.5,
            path.equalizer[2] * rear * shadow,
        ],
    };

    if lateral >= 0.0 {
        [near(pan_left), far(pan_right)]
    } else {
        [far(pan_left), near(pan_right)]
    }
}

/// Three-band split from two one-pole lowpass filters.
#[derive(Debug, Clone, Copy, Default)]
struct BandSplit {
    low: f32,
    below_high: f32,
}

impl BandSplit {
    #[inline]
    fn process(&mut self, x: f32, coefficients: (f32, f32), equalizer: &[f32; 3]) -> f32 {
        self.low += coefficients.0 * (x - self.low);
        self.below_high += coefficients.1 * (x - self.below_high);
        let mid = self.below_high - self.low;
        let high = x - self.below_high;
        equalizer[0] * self.low + equalizer[1] * mid + equalizer[2] * high
    }
}

fn one_pole_coefficient(cutoff_hz: f32, sample_rate: f32) -> f32 {
    1.0 - (-TAU * cutoff_hz / sample_rate).exp()
}

struct SlotState {
    history: Vec<f32>,
    write: usize,
    previous: [Option<[EarParams; 2]>; PATHS],
    filters: [[BandSplit; 2]; PATHS],
}

impl SlotState {
    fn new(length: usize) -> Self {
        Self {
            history: vec![0.0; length],
            write: 0,
            previous: [None; PATHS],
            filters: [[BandSplit::default(); 2]; PATHS],
        }
    }

    fn reset(&mut self) {
        self.history.fill(0.0);
        self.write = 0;
        self.previous = [None; PATHS];
        self.filters = [[BandSplit::default(); 2]; PATHS];
    }

    fn push(&mut self, input: &[f32], frames: usize) {
        let length = self.history.len();
        for i in 0..frames {
            self.history[(self.write + i) % length] = input.get(i).copied().unwrap_or(0.0);
        }
    }

    fn advance(&mut self, frames: usize) {
        self.write = (self.write + frames) % self.history.len();
    }

    #[inline]
    fn read(&self, position: f32) -> f32 {
        let length = self.history.len();
        let base = position.floor();
        let frac = position - base;
        let i0 = base as usize % length;
        let i1 = (i0 + 1) % length;
        self.history[i0] + (self.history[i1] - self.history[i0]) * frac
    }

    /// Mixes one path of the current block into the outputs.
    #[allow(clippy::too_many_arguments)]
    fn render_path(
        &mut self,
        index: usize,
        target: Option<[EarParams; 2]>,
        frames: usize,
        max_delay: f32,
        coefficients: (f32, f32),
        left: &mut [f32],
        right: &mut [f32],
    ) {
        let (start, end) = match (self.previous[index], target) {
            (None, None) => return,
            (Some(previous), None) => (previous, [previous[0].silent(), previous[1].silent()]),
            (None, Some(target)) => ([target[0].silent(), target[1].silent()], target),
            (Some(previous), Some(target)) => (previous, target),
        };
        self.previous[index] = target;

        let length = self.history.len() as f32;
        for (ear, output) in [left, right].into_iter().enumerate() {
            for (i, sample) in output.iter_mut().take(frames).enumerate() {
                let t = (i + 1) as f32 / frames as f32;
                let params = start[ear].lerp(&end[ear], t);
                let delay = params.delay.clamp(0.0, max_delay);
                let position = (self.write + i) as f32 + length - delay;
                let delayed = self.read(position);
                let shaped =
                    self.filters[index][ear].process(delayed, coefficients, &params.equalizer);
                *sample += params.gain * shaped;
            }
        }
    }
}

struct Comb {
    buffer: Vec<f32>,
    position: usize,
    damped: f32,
}

impl Comb {
    fn new(length: usize) -> Self {
        Self {
            buffer: vec![0.0; length.max(1)],
            position: 0,
            damped: 0.0,
        }
    }

    #[inline]
    fn process(&mut self, x: f32, feedback: f32, damping: f32) -> f32 {
        let y = self.buffer[self.position];
        self.damped = y * (1.0 - damping) + self.damped * damping;
        self.buffer[self.position] = x + self.damped * feedback;
        self.position = (self.position + 1) % self.buffer.len();
        y
    }

    fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.damped = 0.0;
    }
}

struct Latefield {
    combs: [Vec<Comb>; 2],
    active: bool,
}

impl Latefield {
    fn new(sample_rate: f32) -> Self {
        let scale = sample_rate / 44_100.0;
        let bank = |offset: usize| {
            COMB_TUNING
                .iter()
                .map(|&length| Comb::new(((length + offset) as f32 * scale).round() as usize))
                .collect::<Vec<_>>()
        };
        Self {
            combs: [bank(0), bank(STEREO_SPREAD)],
            active: false,
        }
    }

    fn process(
        &mut self,
        send: &[f32],
        params: &LatefieldParams,
        sample_rate: f32,
        left: &mut [f32],
        right: &mut [f32],
    ) {
        self.active = true;
        let rt60 = params.rt60[1].max(1e-3);
        let damping = (1.0 - params.rt60[2] / rt60).clamp(0.0, 0.7);
        let bank_size = COMB_TUNING.len() as f32;

        for (bank, output) in self.combs.iter_mut().zip([left, right]) {
            for comb in bank.iter_mut() {
                let length = comb.buffer.len() as f32;
                let feedback = 10f32.powf(-3.0 * length / (rt60 * sample_rate)).min(0.98);
                let scale = params.level * (1.0 - feedback * feedback).sqrt() / bank_size.sqrt();
                for (sample, x) in output.iter_mut().zip(send) {
                    *sample += scale * comb.process(*x, feedback, damping);
                }
            }
        }
    }

    fn clear(&mut self) {
        if self.active {
            self.combs.iter_mut().flatten().for_each(Comb::clear);
            self.active = false;
        }
    }
}

/// Delay-line binaural panner with a comb-filter latefield.
pub struct BinauralRenderer {
    sample_rate: f32,
    slots: Vec<SlotState>,
    send: Vec<f32>,
    latefield: Latefield,
    max_itd: f32,
    max_delay: f32,
    coefficients: (f32, f32),
}

impl BinauralRenderer {
    pub fn new(desc: &AuralisWorldDesc) -> Self {
        let sample_rate = desc.sample_rate.hz() as f32;
        let max_itd = MAX_ITD_SECONDS * sample_rate;
        let max_delay = desc.max_delay_samples() as f32 + max_itd.ceil();
        let history = max_delay as usize + desc.max_block_size + 4;

        log::debug!(
            "Creating binaural renderer ({} slots, {} samples of delay memory each)",
            desc.max_sources,
            history
        );

        Self {
            sample_rate,
            slots: (0..desc.max_sources)
                .map(|_| SlotState::new(history))
                .collect(),
            send: vec![0.0; desc.max_block_size],
            latefield: Latefield::new(sample_rate),
            max_itd,
            max_delay,
            coefficients: (
                one_pole_coefficient(LOW_CROSSOVER_HZ, sample_rate),
                one_pole_coefficient(HIGH_CROSSOVER_HZ, sample_rate),
            ),
        }
    }
}

impl Renderer for BinauralRenderer {
    fn render(
        &mut self,
        block: &RenderBlock<'_>,
        inputs: &dyn BlockInputs,
        left: &mut [f32],
        right: &mut [f32],
    ) -> Result<()> {
        let frames = block.frames;
        if left.len() < frames || right.len() < frames || self.send.len() < frames {
            return Err(AuralisError::InvalidBuffer(format!(
                "renderer needs {} frames per channel, got {} and {}",
                frames,
                left.len(),
                right.len()
            )));
        }

        let (left, right) = (&mut left[..frames], &mut right[..frames]);
        left.fill(0.0);
        right.fill(0.0);
        if frames == 0 {
            return Ok(());
        }

        let send = &mut self.send[..frames];
        send.fill(0.0);

        let slot_count = self.slots.len();
        for params in block.sources {
            let slot = self.slots.get_mut(params.slot).ok_or_else(|| {
                AuralisError::Spatialization(format!(
                    "source {} has slot {} but only {} slots exist",
                    params.id, params.slot, slot_count
                ))
            })?;

            let input = inputs.input(params.input);
            slot.push(input, frames);

            let send_gain = params.direct.gain * params.latefield_send;
            for (s, x) in send.iter_mut().zip(input) {
                *s += send_gain * x;
            }

            let direct = ear_params(&params.direct, params.clarity, self.max_itd);
            slot.render_path(
                0,
                Some(direct),
                frames,
                self.max_delay,
                self.coefficients,
                left,
                right,
            );
            for (k, reflection) in params.reflections.iter().enumerate() {
                let target = reflection.map(|path| ear_params(&path, params.clarity, self.max_itd));
                slot.render_path(
                    k + 1,
                    target,
                    frames,
                    self.max_delay,
                    self.coefficients,
                    left,
                    right,
                );
            }

            slot.advance(frames);
        }

        match &block.latefield {
            Some(latefield) => {
                self.latefield
                    .process(send, latefield, self.sample_rate, left, right)
            }
            None => self.latefield.clear(),
        }

        Ok(())
    }

    fn reset_source(&mut self, slot: usize) {
        if let Some(state) = self.slots.get_mut(slot) {
            state.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial::SourceRenderParams;
    use crate::world::SourceId;
    use approx::assert_abs_diff_eq;
    use std::f32::consts::{FRAC_1_SQRT_2, FRAC_PI_2};

    const FRAMES: usize = 64;

    fn desc() -> AuralisWorldDesc {
        AuralisWorldDesc {
            max_block_size: FRAMES,
            max_sources: 2,
            max_path_length: 10.0,
            ..Default::default()
        }
    }

    fn path(azimuth: f32, delay: f32) -> PathParams {
        PathParams {
            gain: 1.0,
            delay,
            azimuth,
            elevation: 0.0,
            distance: 1.0,
            equalizer: [1.0; 3],
        }
    }

    fn source(direct: PathParams, clarity: f32) -> SourceRenderParams {
        SourceRenderParams {
            id: SourceId(1),
            slot: 0,
            input: 0,
            direct,
            reflections: [None; 6],
            clarity,
            latefield_send: 1.0 - clarity,
        }
    }

    fn render(
        renderer: &mut BinauralRenderer,
        sources: &[SourceRenderParams],
        latefield: Option<LatefieldParams>,
        input: &[f32],
    ) -> (Vec<f32>, Vec<f32>) {
        let mut left = vec![0.0; FRAMES];
        let mut right = vec![0.0; FRAMES];
        let inputs: &[&[f32]] = &[input];
        let block = RenderBlock {
            frames: FRAMES,
            sample_rate: 48_000,
            sources,
            latefield,
        };
        renderer.render(&block, &inputs, &mut left, &mut right).unwrap();
        (left, right)
    }

    fn energy(samples: &[f32]) -> f32 {
        samples.iter().map(|x| x * x).sum()
    }

    #[test]
    fn test_silence_in_silence_out() {
        let mut renderer = BinauralRenderer::new(&desc());
        let sources = [source(path(0.0, 0.0), 0.0)];
        let (left, right) = render(&mut renderer, &sources, None, &[0.0; FRAMES]);
        assert!(left.iter().chain(&right).all(|x| *x == 0.0));
    }

    #[test]
    fn test_delayed_impulse_with_full_clarity() {
        let mut renderer = BinauralRenderer::new(&desc());
        let sources = [source(path(0.0, 10.0), 1.0)];

        // Settle the interpolated parameters first
        render(&mut renderer, &sources, None, &[0.0; FRAMES]);

        let mut impulse = [0.0; FRAMES];
        impulse[0] = 1.0;
        let (left, right) = render(&mut renderer, &sources, None, &impulse);

        assert_abs_diff_eq!(left[10], FRAC_1_SQRT_2, epsilon = 1e-4);
        assert_abs_diff_eq!(right[10], FRAC_1_SQRT_2, epsilon = 1e-4);
        assert_abs_diff_eq!(left[9], 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(left[11], 0.0, epsilon = 1e-4);
    }

    #[test]
    fn test_lateral_source_is_louder_and_earlier_on_near_ear() {
        let mut renderer = BinauralRenderer::new(&desc());
        // Azimuth π/2 is to the left
        let sources = [source(path(FRAC_PI_2, 0.0), 0.0)];
        render(&mut renderer, &sources, None, &[0.0; FRAMES]);

        let mut impulse = [0.0; FRAMES];
        impulse[0] = 1.0;
        let (left, right) = render(&mut renderer, &sources, None, &impulse);

        assert!(energy(&left) > 10.0 * energy(&right));
        let first = |s: &[f32]| s.iter().position(|x| x.abs() > 1e-6);
        assert_eq!(first(&left), Some(0));
    }

    #[test]
    fn test_latefield_rings_after_input_stops() {
        let mut renderer = BinauralRenderer::new(&desc());
        let sources = [source(path(0.0, 0.0), 0.0)];
        let tail = LatefieldParams {
            rt60: [1.0, 1.0, 0.8],
            level: 1.0,
        };

        let noise: Vec<f32> = (0..FRAMES).map(|i| ((i * 7919) % 13) as f32 / 13.0 - 0.5).collect();
        for _ in 0..40 {
            render(&mut renderer, &sources, Some(tail), &noise);
        }

        let silent_source = [source(
            PathParams {
                gain: 0.0,
                ..path(0.0, 0.0)
            },
            0.0,
        )];
        // Let the direct path fade out, then listen to the tail
        render(&mut renderer, &silent_source, Some(tail), &[0.0; FRAMES]);
        let (left, right) = render(&mut renderer, &silent_source, Some(tail), &[0.0; FRAMES]);
        assert!(energy(&left) > 0.0);
        assert!(energy(&right) > 0.0);

        // Free field drops the tail
        let (left, _) = render(&mut renderer, &silent_source, None, &[0.0; FRAMES]);
        assert_eq!(energy(&left), 0.0);
    }

    #[test]
    fn test_reset_source_clears_history() {
        let mut renderer = BinauralRenderer::new(&desc());
        let sources = [source(path(0.0, 32.0), 1.0)];
        render(&mut renderer, &sources, None, &[0.0; FRAMES]);

        let mut late_impulse = [0.0; FRAMES];
        late_impulse[FRAMES - 1] = 1.0;
        render(&mut renderer, &sources, None, &late_impulse);

        renderer.reset_source(0);
        let (left, _) = render(&mut renderer, &sources, None, &[0.0; FRAMES]);
        assert_eq!(energy(&left), 0.0);
    }

    #[test]
    fn test_short_output_is_rejected() {
        let mut renderer = BinauralRenderer::new(&desc());
        let mut left = vec![0.0; FRAMES - 1];
        let mut right = vec![0.0; FRAMES];
        let inputs: &[&[f32]] = &[];
        let block = RenderBlock {
            frames: FRAMES,
            sample_rate: 48_000,
            sources: &[],
            latefield: None,
        };
        assert!(matches!(
            renderer.render(&block, &inputs, &mut left, &mut right),
            Err(AuralisError::InvalidBuffer(_))
        ));
    }

    #[test]
    fn test_unity_equalizer_is_transparent() {
        let mut split = BandSplit::default();
        let coefficients = (
            one_pole_coefficient(LOW_CROSSOVER_HZ, 48_000.0),
            one_pole_coefficient(HIGH_CROSSOVER_HZ, 48_000.0),
        );
        for x in [1.0, -0.5, 0.25, 0.0, 0.8] {
            assert_abs_diff_eq!(split.process(x, coefficients, &[1.0; 3]), x, epsilon = 1e-6);
        }
    }
}
