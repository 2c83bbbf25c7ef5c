//! Acoustic path derivation.
//!
//! Turns a committed source, the listener pose and the environment into the
//! gain, delay, direction and spectral shape of each propagation path:
//!
//! - the direct path from source to listener
//! - one first-order image-source reflection per shoebox surface with a material,
//!   carrying the specular share of the reflected energy
//! - a latefield (reverberant tail) estimate from Sabine's formula

use crate::config::AuralisWorldDesc;
use crate::geometry::cartesian_to_spherical;
use crate::math::{Pose, Vec3};
use crate::scene::{EnvironmentState, RoomDimensions, Surface};
use crate::source::Source;
use crate::spatial::{LatefieldParams, SourceRenderParams};
use crate::state::SceneState;

/// Air absorption coefficients in nepers per meter for [400 Hz, 2.5 KHz, 15 KHz].
pub const AIR_ABSORPTION: [f32; 3] = [0.0002, 0.0017, 0.0182];

/// Longest reverberation time reported for a room, in seconds.
pub const MAX_RT60: f32 = 10.0;

const SABINE_CONSTANT: f32 = 0.161;

/// Per-engine constants used when deriving paths.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathContext {
    pub sample_rate: f32,
    pub speed_of_sound: f32,
    /// Longest delay in samples; longer paths are clamped
    pub max_delay: f32,
}

impl PathContext {
    pub fn new(desc: &AuralisWorldDesc) -> Self {
        Self {
            sample_rate: desc.sample_rate.hz() as f32,
            speed_of_sound: desc.speed_of_sound,
            max_delay: desc.max_delay_samples() as f32,
        }
    }

    /// Propagation delay of `distance` meters in samples.
    pub fn delay_samples(&self, distance: f32) -> f32 {
        (distance / self.speed_of_sound * self.sample_rate).min(self.max_delay)
    }
}

/// A single propagation path as heard by the listener.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PathParams {
    /// Broadband amplitude gain
    pub gain: f32,
    /// Delay in samples (fractional)
    pub delay: f32,
    /// Listener-relative arrival direction, see [`crate::geometry`]
    pub azimuth: f32,
    pub elevation: f32,
    /// Path length in meters
    pub distance: f32,
    /// Amplitude factor per band [low, mid, high]
    pub equalizer: [f32; 3],
}

/// Distance law `max(distance, minimum_distance) ^ -factor`.
pub fn distance_gain(distance: f32, minimum_distance: f32, factor: f32) -> f32 {
    distance.max(minimum_distance).powf(-factor)
}

pub fn air_absorption(distance: f32) -> [f32; 3] {
    AIR_ABSORPTION.map(|alpha| (-alpha * distance).exp())
}

fn trace(ctx: &PathContext, listener: &Pose, point: Vec3, source: &Source) -> PathParams {
    let direction = cartesian_to_spherical(listener.to_local(point));
    let distance = direction.radius;
    PathParams {
        gain: distance_gain(
            distance,
            source.params.minimum_distance(),
            source.params.attenuation_factor(),
        ),
        delay: ctx.delay_samples(distance),
        azimuth: direction.azimuth,
        elevation: direction.elevation,
        distance,
        equalizer: air_absorption(distance),
    }
}

/// The direct path. Its delay is zero when the source has zero-delay set.
pub fn direct_path(ctx: &PathContext, listener: &Pose, source: &Source) -> PathParams {
    let mut path = trace(ctx, listener, source.position, source);
    if source.params.zero_delay() {
        path.delay = 0.0;
    }
    path
}

/// Mirrors a room-local point across one surface of the room.
pub fn image_position(local: Vec3, room: &RoomDimensions, surface: Surface) -> Option<Vec3> {
    let mirrored = match surface {
        Surface::Direct => return None,
        Surface::Left => Vec3::new(-local.x, local.y, local.z),
        Surface::Right => Vec3::new(2.0 * room.width - local.x, local.y, local.z),
        Surface::Back => Vec3::new(local.x, -local.y, local.z),
        Surface::Front => Vec3::new(local.x, 2.0 * room.length - local.y, local.z),
        Surface::Floor => Vec3::new(local.x, local.y, -local.z),
        Surface::Ceiling => Vec3::new(local.x, local.y, 2.0 * room.height - local.z),
    };
    Some(mirrored)
}

/// First-order reflections off every surface that has a material.
///
/// Under zero-delay, reflection delays are measured relative to the direct path.
pub fn reflection_paths(
    ctx: &PathContext,
    listener: &Pose,
    source: &Source,
    environment: &EnvironmentState,
    reflections_gain: f32,
) -> [Option<PathParams>; 6] {
    let mut paths = [None; 6];
    let Some(room) = environment.environment.dimensions() else {
        return paths;
    };

    let local_source = environment.pose.to_local(source.position);
    let direct_delay = ctx.delay_samples(listener.position.distance(source.position));

    for (index, surface) in Surface::REFLECTIVE.iter().enumerate() {
        let Some(material) = environment.material(*surface) else {
            continue;
        };
        let Some(image) = image_position(local_source, &room, *surface) else {
            continue;
        };

        let mut path = trace(ctx, listener, environment.pose.to_world(image), source);
        path.gain *= reflections_gain;
        let reflection = material.properties.specular_factors();
        for (band, factor) in path.equalizer.iter_mut().enumerate() {
            *factor *= reflection[band];
        }
        if source.params.zero_delay() {
            path.delay = (path.delay - direct_delay).max(0.0);
        }
        paths[index] = Some(path);
    }
    paths
}

/// Sabine estimate of the room's reverberant tail. `None` in free field.
///
/// Surfaces without a material absorb everything.
pub fn latefield(environment: &EnvironmentState, latefield_gain: f32) -> Option<LatefieldParams> {
    let room = environment.environment.dimensions()?;

    let mut absorption_area = [0.0f32; 3];
    let mut reflective_area = 0.0;
    for surface in Surface::REFLECTIVE {
        let area = room.surface_area(surface);
        match environment.material(surface) {
            Some(material) => {
                for (band, total) in absorption_area.iter_mut().enumerate() {
                    *total += area * material.properties.absorption[band];
                }
                reflective_area += area * (1.0 - material.properties.absorption[1]);
            }
            None => {
                for total in absorption_area.iter_mut() {
                    *total += area;
                }
            }
        }
    }

    let volume = room.volume();
    let rt60 = absorption_area
        .map(|area| (SABINE_CONSTANT * volume / area.max(f32::EPSILON)).min(MAX_RT60));
    let level = latefield_gain * (reflective_area / room.total_area()).max(0.0).sqrt();

    Some(LatefieldParams { rt60, level })
}

/// Render parameters of one committed source.
pub fn source_render_params(
    ctx: &PathContext,
    scene: &SceneState,
    slot: usize,
    source: &Source,
    input: usize,
) -> SourceRenderParams {
    let clarity = source.params.clarity();
    SourceRenderParams {
        id: source.id,
        slot,
        input,
        direct: direct_path(ctx, &scene.listener, source),
        reflections: reflection_paths(
            ctx,
            &scene.listener,
            source,
            &scene.environment,
            scene.globals.reflections_gain,
        ),
        clarity,
        latefield_send: 1.0 - clarity,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GlobalDefaults;
    use crate::scene::{AudioMaterial, MaterialRef};
    use crate::world::SourceId;
    use crate::math::Quat;
    use approx::assert_abs_diff_eq;
    use std::f32::consts::{FRAC_PI_2, PI};

    fn ctx() -> PathContext {
        PathContext {
            sample_rate: 48_000.0,
            speed_of_sound: 343.0,
            max_delay: 1.0e6,
        }
    }

    fn source_at(position: Vec3) -> Source {
        Source::new(SourceId(1), position, &GlobalDefaults::default())
    }

    fn cube_room_around_origin(material: AudioMaterial) -> EnvironmentState {
        let mut environment = EnvironmentState::default();
        environment.set_shoebox(RoomDimensions::new(4.0, 4.0, 4.0).unwrap());
        environment.pose = Pose::from_position(Vec3::splat(-2.0));
        for surface in Surface::REFLECTIVE {
            environment.set_material(
                surface,
                Some(MaterialRef {
                    index: 0,
                    properties: material,
                }),
            );
        }
        environment
    }

    #[test]
    fn test_distance_gain() {
        assert_abs_diff_eq!(distance_gain(2.0, 1.0, 1.0), 0.5);
        assert_abs_diff_eq!(distance_gain(0.5, 1.0, 1.0), 1.0);
        assert_abs_diff_eq!(distance_gain(4.0, 1.0, 2.0), 1.0 / 16.0);
        assert_abs_diff_eq!(distance_gain(100.0, 0.1, 0.0), 1.0);
    }

    #[test]
    fn test_direct_path() {
        let mut source = source_at(Vec3::new(-3.0, 0.0, 0.0));
        let path = direct_path(&ctx(), &Pose::identity(), &source);

        assert_abs_diff_eq!(path.distance, 3.0, epsilon = 1e-5);
        assert_abs_diff_eq!(path.azimuth, PI / 2.0, epsilon = 1e-5);
        assert_abs_diff_eq!(path.delay, 3.0 / 343.0 * 48_000.0, epsilon = 1e-2);
        assert_abs_diff_eq!(path.gain, 1.0 / 3.0, epsilon = 1e-6);
        assert!(path.equalizer[2] < path.equalizer[0]);

        source.params.zero_delay.set(true);
        assert_eq!(direct_path(&ctx(), &Pose::identity(), &source).delay, 0.0);
    }

    #[test]
    fn test_delay_is_clamped() {
        let ctx = PathContext {
            max_delay: 100.0,
            ..ctx()
        };
        assert_eq!(ctx.delay_samples(1000.0), 100.0);
    }

    #[test]
    fn test_image_sources() {
        let environment = cube_room_around_origin(AudioMaterial::CONCRETE);
        let source = source_at(Vec3::new(0.0, 1.0, 0.0));
        let paths = reflection_paths(&ctx(), &Pose::identity(), &source, &environment, 1.0);

        let path = |surface: Surface| paths[surface.reflective_index().unwrap()].unwrap();

        let front = path(Surface::Front);
        assert_abs_diff_eq!(front.distance, 3.0, epsilon = 1e-4);
        assert_abs_diff_eq!(front.azimuth, 0.0, epsilon = 1e-4);

        let back = path(Surface::Back);
        assert_abs_diff_eq!(back.distance, 5.0, epsilon = 1e-4);
        assert_abs_diff_eq!(back.azimuth, PI, epsilon = 1e-4);

        let floor = path(Surface::Floor);
        assert_abs_diff_eq!(floor.distance, 17.0f32.sqrt(), epsilon = 1e-4);
        assert!(floor.elevation < 0.0);

        let ceiling = path(Surface::Ceiling);
        assert!(ceiling.elevation > 0.0);

        // Reflections lose energy to absorption and scattering
        let reflection = AudioMaterial::CONCRETE.specular_factors();
        let air = air_absorption(front.distance);
        assert_abs_diff_eq!(front.equalizer[1], reflection[1] * air[1], epsilon = 1e-6);
    }

    #[test]
    fn test_scattering_weakens_the_image() {
        let source = source_at(Vec3::new(0.0, 1.0, 0.0));
        let front = Surface::Front.reflective_index().unwrap();
        let mid_band = |scattering: f32| {
            let environment = cube_room_around_origin(AudioMaterial {
                scattering,
                ..AudioMaterial::BRICK
            });
            reflection_paths(&ctx(), &Pose::identity(), &source, &environment, 1.0)[front]
                .unwrap()
                .equalizer[1]
        };

        assert_abs_diff_eq!(mid_band(0.75), mid_band(0.0) * 0.5, epsilon = 1e-6);
        assert_eq!(mid_band(1.0), 0.0);
    }

    #[test]
    fn test_rotated_room_mirrors_across_its_own_walls() {
        // Room-local +X runs along world +Y; the room still spans [-2, 2] on every axis
        let mut environment = cube_room_around_origin(AudioMaterial::CONCRETE);
        environment.pose = Pose::new(
            Vec3::new(2.0, -2.0, -2.0),
            Quat::from_rotation_z(FRAC_PI_2),
        );
        let source = source_at(Vec3::new(0.0, 1.0, 0.0));
        let paths = reflection_paths(&ctx(), &Pose::identity(), &source, &environment, 1.0);
        let path = |surface: Surface| paths[surface.reflective_index().unwrap()].unwrap();

        let left = path(Surface::Left);
        assert_abs_diff_eq!(left.distance, 5.0, epsilon = 1e-4);
        assert_abs_diff_eq!(left.azimuth, PI, epsilon = 1e-4);

        let right = path(Surface::Right);
        assert_abs_diff_eq!(right.distance, 3.0, epsilon = 1e-4);
        // Straight ahead, which may wrap to just below 2π
        assert_abs_diff_eq!(right.azimuth.sin(), 0.0, epsilon = 1e-4);
        assert!(right.azimuth.cos() > 0.9999);
    }

    #[test]
    fn test_reflections_need_materials_and_a_room() {
        let source = source_at(Vec3::new(0.0, 1.0, 0.0));
        let free_field = EnvironmentState::default();
        let paths = reflection_paths(&ctx(), &Pose::identity(), &source, &free_field, 1.0);
        assert!(paths.iter().all(Option::is_none));

        let mut bare_room = EnvironmentState::default();
        bare_room.set_shoebox(RoomDimensions::new(4.0, 4.0, 4.0).unwrap());
        let paths = reflection_paths(&ctx(), &Pose::identity(), &source, &bare_room, 1.0);
        assert!(paths.iter().all(Option::is_none));
    }

    #[test]
    fn test_reflections_gain_and_zero_delay() {
        let environment = cube_room_around_origin(AudioMaterial::BRICK);
        let mut source = source_at(Vec3::new(0.0, 1.0, 0.0));

        let full = reflection_paths(&ctx(), &Pose::identity(), &source, &environment, 1.0);
        let half = reflection_paths(&ctx(), &Pose::identity(), &source, &environment, 0.5);
        let front = Surface::Front.reflective_index().unwrap();
        assert_abs_diff_eq!(
            half[front].unwrap().gain,
            full[front].unwrap().gain * 0.5,
            epsilon = 1e-6
        );

        source.params.zero_delay.set(true);
        let relative = reflection_paths(&ctx(), &Pose::identity(), &source, &environment, 1.0);
        // Front image is 3 m away, direct path 1 m
        assert_abs_diff_eq!(
            relative[front].unwrap().delay,
            2.0 / 343.0 * 48_000.0,
            epsilon = 1e-1
        );
    }

    #[test]
    fn test_latefield() {
        assert!(latefield(&EnvironmentState::default(), 1.0).is_none());

        let environment = cube_room_around_origin(AudioMaterial::CONCRETE);
        let tail = latefield(&environment, 1.0).unwrap();
        let expected_mid = 0.161 * 64.0 / (96.0 * AudioMaterial::CONCRETE.absorption[1]);
        assert_abs_diff_eq!(tail.rt60[1], expected_mid, epsilon = 1e-3);
        assert_abs_diff_eq!(
            tail.level,
            (1.0 - AudioMaterial::CONCRETE.absorption[1]).sqrt(),
            epsilon = 1e-5
        );

        let quiet = latefield(&environment, 0.0).unwrap();
        assert_eq!(quiet.level, 0.0);

        let mut bare_room = EnvironmentState::default();
        bare_room.set_shoebox(RoomDimensions::new(4.0, 4.0, 4.0).unwrap());
        assert_eq!(latefield(&bare_room, 1.0).unwrap().level, 0.0);
    }
}
