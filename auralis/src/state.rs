//! Committed scene state and its published copy.
//!
//! [`SceneState`] is owned by the render side and only ever mutated by
//! [`SceneState::apply`] during preprocess. [`PublishedScene`] is the copy the
//! control side reads its getters from.

use crate::changes::ParameterChange;
use crate::config::{GlobalDefaults, SourceParams};
use crate::math::{Pose, Vec3};
use crate::scene::EnvironmentState;
use crate::source::{Source, SourceTable};
use crate::world::SourceId;

/// Slot-level effect of an applied change, used to reset per-slot render state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotEvent {
    Added(usize),
    Removed(usize),
}

#[derive(Debug, Clone)]
pub struct SceneState {
    pub listener: Pose,
    pub globals: GlobalDefaults,
    pub sources: SourceTable,
    pub environment: EnvironmentState,
}

impl SceneState {
    pub fn new(defaults: GlobalDefaults, max_sources: usize) -> Self {
        Self {
            listener: Pose::identity(),
            globals: defaults,
            sources: SourceTable::with_capacity(max_sources),
            environment: EnvironmentState::default(),
        }
    }

    /// Applies one change. Changes are validated before they are queued, so a change
    /// that no longer fits the state is skipped with a warning.
    pub fn apply(&mut self, change: ParameterChange) -> Option<SlotEvent> {
        match change {
            ParameterChange::AddSource { id, position } => {
                let source = Source::new(id, position, &self.globals);
                match self.sources.insert(source) {
                    Ok(slot) => {
                        log::debug!("Source {} added in slot {}", id, slot);
                        return Some(SlotEvent::Added(slot));
                    }
                    Err(e) => log::warn!("Skipping add of source {}: {}", id, e),
                }
            }
            ParameterChange::RemoveSource(id) => match self.sources.remove(id) {
                Ok((slot, _)) => {
                    log::debug!("Source {} removed from slot {}", id, slot);
                    return Some(SlotEvent::Removed(slot));
                }
                Err(e) => log::warn!("Skipping removal of source {}: {}", id, e),
            },
            ParameterChange::SourcePosition { id, position } => {
                self.with_source(id, |source| source.position = position);
            }
            ParameterChange::SourceMinimumDistance { id, value } => {
                self.with_source(id, |source| source.params.minimum_distance.set(value));
            }
            ParameterChange::SourceAttenuationFactor { id, value } => {
                self.with_source(id, |source| source.params.attenuation_factor.set(value));
            }
            ParameterChange::SourceZeroDelay { id, value } => {
                self.with_source(id, |source| source.params.zero_delay.set(value));
            }
            ParameterChange::SourceClarity { id, value } => {
                self.with_source(id, |source| source.params.clarity.set(value));
            }
            ParameterChange::ResetSourceParameters(id) => {
                let globals = self.globals;
                self.with_source(id, |source| source.params.reset(&globals));
            }

            ParameterChange::ListenerPosition(position) => self.listener.position = position,
            ParameterChange::ListenerOrientation(rotation) => self.listener.rotation = rotation,

            ParameterChange::GlobalMinimumDistance(value) => {
                self.globals.minimum_distance = value;
                for source in self.sources.sources_mut() {
                    source.params.minimum_distance.inherit(value);
                }
            }
            ParameterChange::GlobalAttenuationFactor(value) => {
                self.globals.attenuation_factor = value;
                for source in self.sources.sources_mut() {
                    source.params.attenuation_factor.inherit(value);
                }
            }
            ParameterChange::GlobalZeroDelay(value) => {
                self.globals.zero_delay = value;
                for source in self.sources.sources_mut() {
                    source.params.zero_delay.inherit(value);
                }
            }
            ParameterChange::GlobalClarity(value) => {
                self.globals.clarity = value;
                for source in self.sources.sources_mut() {
                    source.params.clarity.inherit(value);
                }
            }
            ParameterChange::ReflectionsGain(value) => self.globals.reflections_gain = value,
            ParameterChange::LatefieldGain(value) => self.globals.latefield_gain = value,

            ParameterChange::SetFreeField => self.environment.set_free_field(),
            ParameterChange::SetShoebox(dimensions) => self.environment.set_shoebox(dimensions),
            ParameterChange::UpdateShoeboxDimensions(dimensions) => {
                if !self.environment.update_dimensions(dimensions) {
                    log::debug!("Ignoring shoebox dimensions in free field");
                }
            }
            ParameterChange::SurfaceMaterial { surface, material } => {
                if !self.environment.set_material(surface, material) {
                    log::debug!("Ignoring {} material in free field", surface);
                }
            }
            ParameterChange::EnvironmentOrigin(origin) => self.environment.pose.position = origin,
            ParameterChange::EnvironmentOrientation(rotation) => {
                self.environment.pose.rotation = rotation
            }
        }
        None
    }

    fn with_source(&mut self, id: SourceId, update: impl FnOnce(&mut Source)) {
        match self.sources.get_mut(id) {
            Some(source) => update(source),
            None => log::warn!("Skipping change for unknown source {}", id),
        }
    }
}

/// Committed values as seen by control-side getters.
#[derive(Debug, Clone)]
pub struct PublishedScene {
    pub listener: Pose,
    pub globals: GlobalDefaults,
    pub environment: EnvironmentState,
    sources: Vec<(SourceId, Vec3, SourceParams)>,
}

impl PublishedScene {
    pub fn new(defaults: GlobalDefaults, max_sources: usize) -> Self {
        Self {
            listener: Pose::identity(),
            globals: defaults,
            environment: EnvironmentState::default(),
            sources: Vec::with_capacity(max_sources),
        }
    }

    /// Copies the committed state in. Stays within the reserved capacity.
    pub fn copy_from(&mut self, state: &SceneState) {
        self.listener = state.listener;
        self.globals = state.globals;
        self.environment = state.environment;
        self.sources.clear();
        self.sources.extend(
            state
                .sources
                .iter()
                .map(|(_, source)| (source.id, source.position, source.params)),
        );
    }

    pub fn source_ids(&self) -> Vec<SourceId> {
        self.sources.iter().map(|(id, _, _)| *id).collect()
    }

    pub fn source(&self, id: SourceId) -> Option<(Vec3, SourceParams)> {
        self.sources
            .iter()
            .find(|(source_id, _, _)| *source_id == id)
            .map(|(_, position, params)| (*position, *params))
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{RoomDimensions, Surface};

    fn state() -> SceneState {
        SceneState::new(GlobalDefaults::default(), 8)
    }

    #[test]
    fn test_add_then_remove_nets_absent() {
        let mut state = state();
        let id = SourceId(5);

        assert_eq!(
            state.apply(ParameterChange::AddSource {
                id,
                position: Vec3::Y
            }),
            Some(SlotEvent::Added(0))
        );
        assert_eq!(
            state.apply(ParameterChange::RemoveSource(id)),
            Some(SlotEvent::Removed(0))
        );
        assert!(state.sources.is_empty());
    }

    #[test]
    fn test_global_writes_skip_overridden_sources() {
        let mut state = state();
        for id in [1, 2] {
            state.apply(ParameterChange::AddSource {
                id: SourceId(id),
                position: Vec3::ZERO,
            });
        }
        state.apply(ParameterChange::SourceClarity {
            id: SourceId(1),
            value: 0.25,
        });
        state.apply(ParameterChange::GlobalClarity(0.75));

        let clarity = |id| state.sources.get(SourceId(id)).map(|s| s.params.clarity());
        assert_eq!(clarity(1), Some(0.25));
        assert_eq!(clarity(2), Some(0.75));
        assert_eq!(state.globals.clarity, 0.75);
    }

    #[test]
    fn test_reset_follows_current_globals() {
        let mut state = state();
        let id = SourceId(3);
        state.apply(ParameterChange::AddSource {
            id,
            position: Vec3::ZERO,
        });
        state.apply(ParameterChange::SourceZeroDelay { id, value: true });
        state.apply(ParameterChange::GlobalZeroDelay(false));
        state.apply(ParameterChange::ResetSourceParameters(id));
        state.apply(ParameterChange::GlobalAttenuationFactor(2.0));

        let params = state.sources.get(id).map(|s| s.params).unwrap();
        assert!(!params.zero_delay());
        assert_eq!(params.attenuation_factor(), 2.0);
    }

    #[test]
    fn test_new_source_takes_globals_current_at_commit() {
        let mut state = state();
        state.apply(ParameterChange::GlobalMinimumDistance(0.5));
        state.apply(ParameterChange::AddSource {
            id: SourceId(9),
            position: Vec3::ZERO,
        });

        let params = state.sources.get(SourceId(9)).map(|s| s.params).unwrap();
        assert_eq!(params.minimum_distance(), 0.5);
        assert!(!params.minimum_distance.is_explicit());
    }

    #[test]
    fn test_free_field_dimension_update_is_ignored() {
        let mut state = state();
        let unit = RoomDimensions::new(1.0, 1.0, 1.0).unwrap();
        let room = RoomDimensions::new(5.0, 7.0, 3.0).unwrap();

        state.apply(ParameterChange::UpdateShoeboxDimensions(unit));
        state.apply(ParameterChange::SetShoebox(room));
        assert_eq!(state.environment.environment.dimensions(), Some(room));

        state.apply(ParameterChange::SurfaceMaterial {
            surface: Surface::Floor,
            material: None,
        });
        assert_eq!(state.environment.material(Surface::Floor), None);
    }

    #[test]
    fn test_published_copy() {
        let mut state = state();
        state.apply(ParameterChange::AddSource {
            id: SourceId(4),
            position: Vec3::X,
        });
        state.apply(ParameterChange::ListenerPosition(Vec3::Z));

        let mut published = PublishedScene::new(GlobalDefaults::default(), 8);
        published.copy_from(&state);

        assert_eq!(published.source_ids(), vec![SourceId(4)]);
        assert_eq!(published.source(SourceId(4)).map(|(p, _)| p), Some(Vec3::X));
        assert_eq!(published.listener.position, Vec3::Z);
        assert_eq!(published.source_count(), 1);
    }
}
