use super::hrtf;
use super::{BlockInputs, PathParams, RenderBlock, Renderer};
use crate::config::AuralisWorldDesc;
use crate::error::{AuralisError, Result};
use audionimbus::{
    AmbisonicsDecodeEffect, AmbisonicsDecodeEffectParams, AmbisonicsDecodeEffectSettings,
    AmbisonicsEncodeEffect, AmbisonicsEncodeEffectParams, AmbisonicsEncodeEffectSettings,
    AudioBufferSettings, AudioSettings, Context, CoordinateSystem, DirectEffect,
    DirectEffectParams, DirectEffectSettings, Direction, Equalizer, Hrtf, SpeakerLayout, Vector3,
    audio_buffer::AudioBuffer,
};

// Order 2 ambisonics
const AMBISONICS_CHANNELS: usize = 9;

struct SlotEffects {
    direct: DirectEffect,
    encode: AmbisonicsEncodeEffect,
}

/// Renderer backed by Steam Audio.
///
/// Each source runs through a direct effect (distance gain and air absorption) and an
/// order 2 ambisonics encoder; the sum is decoded binaurally once per block with the
/// world's HRTF. Steam Audio processes whole frames only, so every block must be
/// exactly `max_block_size` frames long. Propagation delay, reflections, clarity and
/// the latefield are not rendered.
///
/// A slot handed to a new source gets freshly created effects, which allocates on the
/// thread that runs preprocess.
pub struct SteamAudioRenderer {
    context: Context,
    hrtf: Hrtf,
    decode: AmbisonicsDecodeEffect,
    slots: Vec<SlotEffects>,
    sample_rate: u32,
    frame_size: usize,

    input_buf: Vec<f32>,
    direct_buf: Vec<f32>,
    encode_buf: Vec<f32>,
    summed_buf: Vec<f32>,
    decode_buf: Vec<f32>,
    interleaved: Vec<f32>,
}

impl SteamAudioRenderer {
    /// Creates the Steam Audio context, the HRTF from `desc.hrtf_path` and one set of
    /// effects per source slot.
    pub fn new(desc: &AuralisWorldDesc) -> Result<Self> {
        let frame_size = desc.max_block_size;
        log::info!(
            "Initializing Steam Audio renderer (sample_rate: {} Hz, frame_size: {})",
            desc.sample_rate.hz(),
            frame_size
        );

        let context = Context::try_new(&audionimbus::ContextSettings::default()).map_err(|e| {
            AuralisError::Spatialization(format!("Failed to create Steam Audio context: {}", e))
        })?;

        let audio_settings = AudioSettings {
            sampling_rate: desc.sample_rate.hz(),
            frame_size: frame_size as u32,
        };

        let hrtf = hrtf::load_hrtf(&context, &audio_settings, desc.hrtf_path.as_deref())?;

        let decode = AmbisonicsDecodeEffect::try_new(
            &context,
            &audio_settings,
            &AmbisonicsDecodeEffectSettings {
                max_order: 2,
                speaker_layout: SpeakerLayout::Stereo,
                hrtf: &hrtf,
            },
        )
        .map_err(|e| {
            AuralisError::Spatialization(format!("Failed to create AmbisonicsDecodeEffect: {}", e))
        })?;

        let mut slots = Vec::with_capacity(desc.max_sources);
        for _ in 0..desc.max_sources {
            slots.push(create_slot_effects(&context, &audio_settings)?);
        }

        Ok(Self {
            context,
            hrtf,
            decode,
            slots,
            sample_rate: desc.sample_rate.hz(),
            frame_size,
            input_buf: vec![0.0; frame_size],
            direct_buf: vec![0.0; frame_size],
            encode_buf: vec![0.0; frame_size * AMBISONICS_CHANNELS],
            summed_buf: vec![0.0; frame_size * AMBISONICS_CHANNELS],
            decode_buf: vec![0.0; frame_size * 2],
            interleaved: vec![0.0; frame_size * 2],
        })
    }

    fn audio_settings(&self) -> AudioSettings {
        AudioSettings {
            sampling_rate: self.sample_rate,
            frame_size: self.frame_size as u32,
        }
    }

    fn process_source(&mut self, slot: usize, direct: &PathParams, input: &[f32]) -> Result<()> {
        let count = input.len().min(self.frame_size);
        self.input_buf[..count].copy_from_slice(&input[..count]);
        self.input_buf[count..].fill(0.0);

        let effects = self.slots.get_mut(slot).ok_or_else(|| {
            AuralisError::Spatialization(format!("No effects for source slot {}", slot))
        })?;

        let direct_params = DirectEffectParams {
            distance_attenuation: Some(direct.gain),
            air_absorption: Some(Equalizer(direct.equalizer)),
            directivity: None,
            occlusion: None,
            transmission: None,
        };
        let input_buf = AudioBuffer::try_with_data_and_settings(
            &self.input_buf,
            AudioBufferSettings {
                num_channels: Some(1),
                ..Default::default()
            },
        )
        .map_err(buffer_error)?;
        let direct_buf = AudioBuffer::try_with_data_and_settings(
            &mut self.direct_buf,
            AudioBufferSettings {
                num_channels: Some(1),
                ..Default::default()
            },
        )
        .map_err(buffer_error)?;
        effects.direct.apply(&direct_params, &input_buf, &direct_buf);

        // Listener-local (right, ahead, up) to Steam Audio's (right, up, -ahead)
        let (sin_az, cos_az) = direct.azimuth.sin_cos();
        let (sin_el, cos_el) = direct.elevation.sin_cos();
        let encode_params = AmbisonicsEncodeEffectParams {
            direction: Direction::new(-sin_az * cos_el, sin_el, -cos_az * cos_el),
            order: 2,
        };
        let direct_buf = AudioBuffer::try_with_data_and_settings(
            &self.direct_buf,
            AudioBufferSettings {
                num_channels: Some(1),
                ..Default::default()
            },
        )
        .map_err(buffer_error)?;
        let encode_buf = AudioBuffer::try_with_data_and_settings(
            &mut self.encode_buf,
            AudioBufferSettings {
                num_channels: Some(9),
                ..Default::default()
            },
        )
        .map_err(buffer_error)?;
        effects.encode.apply(&encode_params, &direct_buf, &encode_buf);

        for (sum, sample) in self.summed_buf.iter_mut().zip(&self.encode_buf) {
            *sum += sample;
        }
        Ok(())
    }

    fn decode(&mut self) -> Result<()> {
        let params = AmbisonicsDecodeEffectParams {
            order: 2,
            hrtf: &self.hrtf,
            orientation: CoordinateSystem {
                ahead: Vector3::new(0.0, 0.0, -1.0),
                ..Default::default()
            },
            binaural: true,
        };

        let input_buf = AudioBuffer::try_with_data_and_settings(
            &self.summed_buf,
            AudioBufferSettings {
                num_channels: Some(9),
                ..Default::default()
            },
        )
        .map_err(buffer_error)?;
        let output_buf = AudioBuffer::try_with_data_and_settings(
            &mut self.decode_buf,
            AudioBufferSettings {
                num_channels: Some(2),
                ..Default::default()
            },
        )
        .map_err(buffer_error)?;
        self.decode.apply(&params, &input_buf, &output_buf);

        let decoded = AudioBuffer::try_with_data_and_settings(
            &mut self.decode_buf,
            AudioBufferSettings {
                num_channels: Some(2),
                ..Default::default()
            },
        )
        .map_err(buffer_error)?;
        decoded.interleave(&self.context, &mut self.interleaved);
        Ok(())
    }
}

impl Renderer for SteamAudioRenderer {
    fn render(
        &mut self,
        block: &RenderBlock<'_>,
        inputs: &dyn BlockInputs,
        left: &mut [f32],
        right: &mut [f32],
    ) -> Result<()> {
        if block.frames != self.frame_size {
            return Err(AuralisError::Spatialization(format!(
                "Steam Audio renders blocks of exactly {} frames, got {}",
                self.frame_size, block.frames
            )));
        }

        self.summed_buf.fill(0.0);
        for source in block.sources {
            self.process_source(source.slot, &source.direct, inputs.input(source.input))?;
        }
        self.decode()?;

        for (i, frame) in self.interleaved.chunks_exact(2).enumerate() {
            left[i] = frame[0];
            right[i] = frame[1];
        }
        Ok(())
    }

    fn reset_source(&mut self, slot: usize) {
        if slot >= self.slots.len() {
            return;
        }
        match create_slot_effects(&self.context, &self.audio_settings()) {
            Ok(effects) => self.slots[slot] = effects,
            Err(e) => log::warn!("Keeping old effects for source slot {}: {}", slot, e),
        }
    }
}

fn create_slot_effects(context: &Context, audio_settings: &AudioSettings) -> Result<SlotEffects> {
    let direct = DirectEffect::try_new(context, audio_settings, &DirectEffectSettings { num_channels: 1 })
        .map_err(|e| {
            AuralisError::Spatialization(format!("Failed to create DirectEffect: {}", e))
        })?;

    let encode = AmbisonicsEncodeEffect::try_new(
        context,
        audio_settings,
        &AmbisonicsEncodeEffectSettings {
            max_order: 2,
        },
    )
    .map_err(|e| {
        AuralisError::Spatialization(format!("Failed to create AmbisonicsEncodeEffect: {}", e))
    })?;

    Ok(SlotEffects { direct, encode })
}

fn buffer_error(e: impl std::fmt::Display) -> AuralisError {
    AuralisError::Spatialization(format!("Failed to create audio buffer: {}", e))
}
