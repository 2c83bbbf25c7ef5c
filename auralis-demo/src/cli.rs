use anyhow::{Result, bail};
use auralis::scene::Surface;
use auralis::{AuralisWorld, AuralisWorldDesc, SourceId, Vec3};
use clap::Parser;
use std::f32::consts::TAU;

const BLOCK_SIZE: usize = 512;
const SOURCE: SourceId = SourceId(1);
const ORBIT_RADIUS: f32 = 2.0;
const ORBIT_SECONDS: f32 = 4.0;
const TONE_HZ: f32 = 440.0;

#[derive(Parser, Debug)]
#[command(name = "auralis-demo", about = "Orbits a tone around the listener")]
pub struct Options {
    /// Number of frames to render
    #[arg(long, default_value_t = 48_000 * 4)]
    pub frames: usize,

    /// Place the listener in a 6 x 8 x 3 m room
    #[arg(long)]
    pub shoebox: bool,

    /// Play through the default output device instead of rendering offline
    #[arg(long)]
    pub device: bool,
}

/// Sine tone with a running phase.
struct Tone {
    phase: f32,
    step: f32,
}

impl Tone {
    fn new(sample_rate: u32) -> Self {
        Self {
            phase: 0.0,
            step: TAU * TONE_HZ / sample_rate as f32,
        }
    }

    fn fill(&mut self, out: &mut [f32]) {
        for sample in out.iter_mut() {
            *sample = 0.3 * self.phase.sin();
            self.phase = (self.phase + self.step) % TAU;
        }
    }
}

fn orbit_position(seconds: f32) -> Vec3 {
    let angle = TAU * seconds / ORBIT_SECONDS;
    Vec3::new(
        ORBIT_RADIUS * angle.sin(),
        ORBIT_RADIUS * angle.cos(),
        0.0,
    )
}

fn setup_scene(world: &AuralisWorld, shoebox: bool) -> Result<()> {
    if shoebox {
        world.set_environment_shoebox(6.0, 8.0, 3.0)?;
        world.set_environment_origin(Vec3::new(-3.0, -4.0, -1.5))?;
        for surface in Surface::REFLECTIVE {
            let material = match surface {
                Surface::Floor => "wood",
                Surface::Ceiling => "plaster",
                _ => "brick",
            };
            world.set_surface_material(surface, material)?;
        }
        world.set_reflections_gain(0.8)?;
        log::info!("Listening inside a 6 x 8 x 3 m room");
    }
    world.set_global_clarity(0.2)?;
    world.add_source(SOURCE, orbit_position(0.0))?;
    Ok(())
}

fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    (samples.iter().map(|x| x * x).sum::<f32>() / samples.len() as f32).sqrt()
}

/// Renders the orbit without an audio device and logs the level of each ear.
pub fn run_offline(options: &Options) -> Result<()> {
    let desc = AuralisWorldDesc {
        max_block_size: BLOCK_SIZE,
        max_sources: 4,
        ..Default::default()
    };
    let (world, mut engine) = auralis::create(desc)?;
    setup_scene(&world, options.shoebox)?;
    engine.preprocess();

    let sample_rate = engine.sample_rate();
    let mut tone = Tone::new(sample_rate);
    let mut input = vec![0.0; BLOCK_SIZE];
    let mut left = vec![0.0; BLOCK_SIZE];
    let mut right = vec![0.0; BLOCK_SIZE];

    // Roughly two reports per second
    let report_every = (sample_rate as usize / 2).div_ceil(BLOCK_SIZE).max(1);

    let mut rendered = 0;
    let mut block_index = 0;
    while rendered < options.frames {
        let frames = BLOCK_SIZE.min(options.frames - rendered);
        let seconds = rendered as f32 / sample_rate as f32;
        world.set_source_position(SOURCE, orbit_position(seconds))?;

        tone.fill(&mut input[..frames]);
        engine.render(&[SOURCE], &[&input[..frames]], &mut left, &mut right, frames)?;

        if block_index % report_every == 0 {
            log::info!(
                "t = {:5.2} s  azimuth {:6.1} deg  L {:.4}  R {:.4}",
                seconds,
                auralis::geometry::cartesian_to_spherical(orbit_position(seconds))
                    .azimuth
                    .to_degrees(),
                rms(&left[..frames]),
                rms(&right[..frames])
            );
        }

        rendered += frames;
        block_index += 1;
    }

    log::info!("Rendered {} frames offline", rendered);
    Ok(())
}

#[cfg(feature = "device")]
pub fn run_device(options: &Options) -> Result<()> {
    use auralis::AuralisOutput;
    use std::time::{Duration, Instant};

    let desc = AuralisWorldDesc {
        max_block_size: BLOCK_SIZE,
        max_sources: 4,
        ..Default::default()
    };
    let (world, mut engine) = auralis::create(desc)?;
    setup_scene(&world, options.shoebox)?;
    engine.preprocess();

    let sample_rate = engine.sample_rate();
    let mut tone = Tone::new(sample_rate);
    let mut block = vec![0.0; BLOCK_SIZE];
    let mut output = AuralisOutput::start(engine, move |engine, frames| {
        tone.fill(&mut block[..frames]);
        if let Err(e) = engine.source_audio_update(SOURCE, &block[..frames]) {
            log::warn!("Dropped source block: {}", e);
        }
    })?;

    let duration = Duration::from_secs_f32(options.frames as f32 / sample_rate as f32);
    let start = Instant::now();
    while start.elapsed() < duration {
        world.set_source_position(SOURCE, orbit_position(start.elapsed().as_secs_f32()))?;
        std::thread::sleep(Duration::from_millis(10));
    }

    output.stop();
    log::info!("Played {} frames", output.frames_processed());
    Ok(())
}

#[cfg(not(feature = "device"))]
pub fn run_device(_options: &Options) -> Result<()> {
    bail!("auralis-demo was built without the `device` feature")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Options, clap::Error> {
        Options::try_parse_from(std::iter::once("auralis-demo").chain(args.iter().copied()))
    }

    #[test]
    fn test_parse_options() {
        let options = parse(&["--frames", "1024", "--shoebox"]).unwrap();
        assert_eq!(options.frames, 1024);
        assert!(options.shoebox);
        assert!(!options.device);

        assert_eq!(parse(&[]).unwrap().frames, 48_000 * 4);
        assert!(parse(&["--frames"]).is_err());
        assert!(parse(&["--frames", "many"]).is_err());
        assert!(parse(&["--loud"]).is_err());
    }

    #[test]
    fn test_offline_run() {
        let options = parse(&["--frames", "4000", "--shoebox"]).unwrap();
        assert!(run_offline(&options).is_ok());
    }
}
