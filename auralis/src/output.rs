//! Live playback through the default output device

use crate::engine::AuralisEngine;
use crate::error::{AuralisError, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SizedSample};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

const CHANNELS: u16 = 2;

/// Drives an [`AuralisEngine`] from an audio device callback.
///
/// The engine moves into the callback. Before each block the callback calls the
/// `feed` closure, which pushes the next block of every source with
/// [`AuralisEngine::source_audio_update`], then renders it with
/// [`AuralisEngine::render_preassigned`]. Device buffers larger than the engine's
/// maximum block size are rendered in several blocks.
///
/// Dropping the output stops the stream and detaches the engine.
pub struct AuralisOutput {
    stream: Option<cpal::Stream>,
    is_running: Arc<AtomicBool>,
    frames_processed: Arc<AtomicUsize>,
}

impl AuralisOutput {
    /// Opens the default output device in stereo at the engine's sample rate and starts
    /// playback.
    ///
    /// `feed` receives the engine and the number of frames about to be rendered.
    ///
    /// # Errors
    ///
    /// Returns `AudioDevice` if there is no usable output device and `AudioFormat` if
    /// its sample format is not f32, i16 or u16.
    pub fn start<F>(engine: AuralisEngine, feed: F) -> Result<Self>
    where
        F: FnMut(&mut AuralisEngine, usize) + Send + 'static,
    {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| AuralisError::AudioDevice("No default output device available".into()))?;

        let config = cpal::StreamConfig {
            channels: CHANNELS,
            sample_rate: cpal::SampleRate(engine.sample_rate()),
            buffer_size: cpal::BufferSize::Fixed(engine.max_block_size() as u32),
        };

        let default_config = device.default_output_config().map_err(|e| {
            AuralisError::AudioDevice(format!("Failed to get default config: {}", e))
        })?;

        log::info!(
            "Opening output device {:?} ({} Hz, {:?})",
            device.name().unwrap_or_default(),
            config.sample_rate.0,
            default_config.sample_format()
        );

        let is_running = Arc::new(AtomicBool::new(true));
        let frames_processed = Arc::new(AtomicUsize::new(0));
        let stream = match default_config.sample_format() {
            cpal::SampleFormat::F32 => create_stream::<f32, F>(
                &device,
                &config,
                engine,
                feed,
                is_running.clone(),
                frames_processed.clone(),
            )?,
            cpal::SampleFormat::I16 => create_stream::<i16, F>(
                &device,
                &config,
                engine,
                feed,
                is_running.clone(),
                frames_processed.clone(),
            )?,
            cpal::SampleFormat::U16 => create_stream::<u16, F>(
                &device,
                &config,
                engine,
                feed,
                is_running.clone(),
                frames_processed.clone(),
            )?,
            format => {
                return Err(AuralisError::AudioFormat(format!(
                    "Unsupported sample format: {:?}",
                    format
                )));
            }
        };

        stream
            .play()
            .map_err(|e| AuralisError::AudioDevice(format!("Failed to start stream: {}", e)))?;

        Ok(Self {
            stream: Some(stream),
            is_running,
            frames_processed,
        })
    }

    /// Stops playback. The engine is dropped with the stream.
    pub fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            self.is_running.store(false, Ordering::Relaxed);
            drop(stream);
            log::info!("Output stream stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::Relaxed)
    }

    /// Frames rendered since start
    pub fn frames_processed(&self) -> usize {
        self.frames_processed.load(Ordering::Relaxed)
    }
}

impl Drop for AuralisOutput {
    fn drop(&mut self) {
        self.stop();
    }
}

fn create_stream<T, F>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut engine: AuralisEngine,
    mut feed: F,
    is_running: Arc<AtomicBool>,
    frames_processed: Arc<AtomicUsize>,
) -> Result<cpal::Stream>
where
    T: SizedSample + FromSample<f32>,
    F: FnMut(&mut AuralisEngine, usize) + Send + 'static,
{
    let block = engine.max_block_size();
    let mut left = vec![0.0f32; block];
    let mut right = vec![0.0f32; block];
    let channels = config.channels as usize;

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                if !is_running.load(Ordering::Relaxed) {
                    data.fill(T::from_sample(0.0f32));
                    return;
                }

                for chunk in data.chunks_mut(block * channels) {
                    let frames = chunk.len() / channels;
                    feed(&mut engine, frames);
                    // A rejected block is already silenced and logged by the engine
                    let _ = engine.render_preassigned(&mut left, &mut right, frames);

                    for (frame, (l, r)) in chunk
                        .chunks_exact_mut(channels)
                        .zip(left.iter().zip(right.iter()))
                    {
                        frame[0] = T::from_sample(*l);
                        frame[1] = T::from_sample(*r);
                    }
                    frames_processed.fetch_add(frames, Ordering::Relaxed);
                }
            },
            move |err| {
                log::error!("Audio stream error: {}", err);
            },
            None,
        )
        .map_err(|e| AuralisError::AudioDevice(format!("Failed to build stream: {}", e)))
}
