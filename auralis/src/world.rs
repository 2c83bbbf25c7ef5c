use crate::changes::ParameterChange;
use crate::config::{AuralisWorldDesc, SourceParams};
use crate::config::source_params::{
    validate_attenuation_factor, validate_clarity, validate_gain, validate_minimum_distance,
};
use crate::error::{AuralisError, Result};
use crate::geometry::{EulerAngles, ensure_finite_quat, euler_to_quaternion, quaternion_from_wxyz};
use crate::math::{Pose, Quat, Vec3, ensure_coordinates};
use crate::scene::{AudioMaterial, EnvironmentState, MaterialLibrary, RoomDimensions, Surface};
use crate::state::{PublishedScene, SceneState};
use crossbeam_channel::{Receiver, Sender, TrySendError};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, TryLockError};

/// Caller-assigned identifier of a source.
///
/// Ids are unique while a source is active and may be reused once it is removed.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(pub i32);

impl SourceId {
    pub fn get(self) -> i32 {
        self.0
    }
}

impl From<i32> for SourceId {
    fn from(id: i32) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for SourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SourceId({})", self.0)
    }
}

/// Ids as the control side sees them: committed sources plus queued adds, minus
/// queued removals.
#[derive(Debug)]
struct SourceRegistry {
    declared: HashSet<SourceId>,
    max_sources: usize,
}

impl SourceRegistry {
    fn ensure_declared(&self, id: SourceId) -> Result<()> {
        if self.declared.contains(&id) {
            Ok(())
        } else {
            Err(AuralisError::UnknownSource(id))
        }
    }
}

/// Control side of a spatializer instance.
///
/// `AuralisWorld` is `Send + Sync` and is shared through an `Arc`. Every setter can be
/// called from any thread at any time, including while a render call is running on
/// the audio thread: setters validate their input and queue a change, they never
/// touch the state the renderer reads. Queued changes become visible when the engine
/// runs [`preprocess`](crate::AuralisEngine::preprocess), which every render call
/// does first.
///
/// Getters return the last *committed* values.
///
/// # Architecture
///
/// - **Control threads**: call setters on `AuralisWorld`, which enqueue typed changes
/// - **Audio thread**: owns the [`AuralisEngine`](crate::AuralisEngine), which drains the
///   queue at preprocess and renders from its own committed state
///
/// # Example
///
/// ```
/// use auralis::{AuralisWorldDesc, Vec3};
///
/// let (world, mut engine) = auralis::create(AuralisWorldDesc::default()).unwrap();
/// world.add_source(5, Vec3::new(0.0, 2.0, 0.0)).unwrap();
/// assert!(world.source_ids().is_empty());
///
/// engine.preprocess();
/// assert_eq!(world.source_ids(), vec![auralis::SourceId(5)]);
/// ```
pub struct AuralisWorld {
    desc: AuralisWorldDesc,
    sender: Sender<ParameterChange>,
    receiver: Receiver<ParameterChange>,
    registry: Mutex<SourceRegistry>,
    published: Mutex<PublishedScene>,
    parked: Mutex<Option<SceneState>>,
    materials: RwLock<MaterialLibrary>,
    engine_attached: AtomicBool,
}

impl AuralisWorld {
    /// Creates a world from a validated descriptor.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if the descriptor fails [`AuralisWorldDesc::validate`].
    pub fn new(desc: AuralisWorldDesc) -> Result<Self> {
        desc.validate()?;

        let (sender, receiver) = crossbeam_channel::bounded(desc.change_queue_capacity);

        log::info!(
            "Creating Auralis world (sample_rate: {} Hz, max_block_size: {}, max_sources: {})",
            desc.sample_rate.hz(),
            desc.max_block_size,
            desc.max_sources
        );

        Ok(Self {
            registry: Mutex::new(SourceRegistry {
                declared: HashSet::with_capacity(desc.max_sources),
                max_sources: desc.max_sources,
            }),
            published: Mutex::new(PublishedScene::new(desc.defaults, desc.max_sources)),
            parked: Mutex::new(None),
            materials: RwLock::new(MaterialLibrary::with_presets()),
            engine_attached: AtomicBool::new(false),
            sender,
            receiver,
            desc,
        })
    }

    pub fn desc(&self) -> &AuralisWorldDesc {
        &self.desc
    }

    /// Returns the sample rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.desc.sample_rate.hz()
    }

    pub fn max_block_size(&self) -> usize {
        self.desc.max_block_size
    }

    pub fn max_sources(&self) -> usize {
        self.desc.max_sources
    }

    /// Number of changes queued and not yet committed.
    pub fn pending_changes(&self) -> usize {
        self.sender.len()
    }

    // Sources

    /// Queues a new source at `position`.
    ///
    /// The source starts with the global defaults current when it is committed.
    ///
    /// # Errors
    ///
    /// - `DuplicateSource` if the id is active or already queued for addition
    /// - `SourceLimit` if `max_sources` sources are active or queued
    /// - `InvalidParameter` for a non-finite or out-of-range position
    /// - `ChangeQueueFull` if the change queue has no room
    pub fn add_source(&self, id: impl Into<SourceId>, position: Vec3) -> Result<()> {
        let id = id.into();
        let position = ensure_coordinates("source position", position)?;

        let mut registry = self.registry();
        if registry.declared.contains(&id) {
            return Err(AuralisError::DuplicateSource(id));
        }
        if registry.declared.len() >= registry.max_sources {
            return Err(AuralisError::SourceLimit(registry.max_sources));
        }

        self.enqueue(ParameterChange::AddSource { id, position })?;
        registry.declared.insert(id);
        log::debug!("Queued add of source {}", id);
        Ok(())
    }

    /// Queues removal of a source.
    ///
    /// # Errors
    ///
    /// Returns `UnknownSource` if the id is neither active nor queued for addition.
    pub fn remove_source(&self, id: impl Into<SourceId>) -> Result<()> {
        let id = id.into();

        let mut registry = self.registry();
        registry.ensure_declared(id)?;

        self.enqueue(ParameterChange::RemoveSource(id))?;
        registry.declared.remove(&id);
        log::debug!("Queued removal of source {}", id);
        Ok(())
    }

    /// Queues a new position for a committed source.
    ///
    /// # Errors
    ///
    /// - `UnknownSource` if the source is not committed yet or is queued for removal
    /// - `InvalidParameter` for a non-finite or out-of-range position
    /// - `ChangeQueueFull` if the change queue has no room
    pub fn set_source_position(&self, id: impl Into<SourceId>, position: Vec3) -> Result<()> {
        let id = id.into();
        let position = ensure_coordinates("source position", position)?;
        self.enqueue_for_source(id, ParameterChange::SourcePosition { id, position })
    }

    /// Overrides the minimum distance (> 0) for one source.
    pub fn set_source_minimum_distance(&self, id: impl Into<SourceId>, value: f32) -> Result<()> {
        let id = id.into();
        let value = validate_minimum_distance(value)?;
        self.enqueue_for_source(id, ParameterChange::SourceMinimumDistance { id, value })
    }

    /// Overrides the distance attenuation factor (>= 0) for one source.
    pub fn set_source_attenuation_factor(&self, id: impl Into<SourceId>, value: f32) -> Result<()> {
        let id = id.into();
        let value = validate_attenuation_factor(value)?;
        self.enqueue_for_source(id, ParameterChange::SourceAttenuationFactor { id, value })
    }

    pub fn set_source_zero_delay(&self, id: impl Into<SourceId>, value: bool) -> Result<()> {
        let id = id.into();
        self.enqueue_for_source(id, ParameterChange::SourceZeroDelay { id, value })
    }

    /// Overrides clarity (0..=1) for one source.
    pub fn set_source_clarity(&self, id: impl Into<SourceId>, value: f32) -> Result<()> {
        let id = id.into();
        let value = validate_clarity(value)?;
        self.enqueue_for_source(id, ParameterChange::SourceClarity { id, value })
    }

    /// Drops every per-source override so the source follows the globals again.
    pub fn reset_source_parameters(&self, id: impl Into<SourceId>) -> Result<()> {
        let id = id.into();
        self.enqueue_for_source(id, ParameterChange::ResetSourceParameters(id))
    }

    /// Committed source ids in insertion order, the order `render` expects.
    pub fn source_ids(&self) -> Vec<SourceId> {
        self.published().source_ids()
    }

    pub fn source_position(&self, id: impl Into<SourceId>) -> Result<Vec3> {
        self.committed_source(id.into()).map(|(position, _)| position)
    }

    pub fn source_minimum_distance(&self, id: impl Into<SourceId>) -> Result<f32> {
        self.committed_source(id.into())
            .map(|(_, params)| params.minimum_distance())
    }

    pub fn source_attenuation_factor(&self, id: impl Into<SourceId>) -> Result<f32> {
        self.committed_source(id.into())
            .map(|(_, params)| params.attenuation_factor())
    }

    pub fn source_zero_delay(&self, id: impl Into<SourceId>) -> Result<bool> {
        self.committed_source(id.into())
            .map(|(_, params)| params.zero_delay())
    }

    pub fn source_clarity(&self, id: impl Into<SourceId>) -> Result<f32> {
        self.committed_source(id.into())
            .map(|(_, params)| params.clarity())
    }

    // Listener

    pub fn set_listener_position(&self, position: Vec3) -> Result<()> {
        let position = ensure_coordinates("listener position", position)?;
        self.enqueue(ParameterChange::ListenerPosition(position))
    }

    /// Sets the listener orientation. The quaternion is normalized; a zero or
    /// non-finite quaternion is rejected.
    pub fn set_listener_orientation(&self, rotation: Quat) -> Result<()> {
        let rotation = ensure_finite_quat("listener orientation", rotation)?;
        self.enqueue(ParameterChange::ListenerOrientation(rotation))
    }

    pub fn set_listener_orientation_wxyz(&self, w: f32, x: f32, y: f32, z: f32) -> Result<()> {
        let rotation = quaternion_from_wxyz(w, x, y, z)?;
        self.enqueue(ParameterChange::ListenerOrientation(rotation))
    }

    pub fn set_listener_orientation_euler(&self, angles: EulerAngles) -> Result<()> {
        let rotation = rotation_from_euler("listener orientation", angles)?;
        self.enqueue(ParameterChange::ListenerOrientation(rotation))
    }

    pub fn listener_pose(&self) -> Pose {
        self.published().listener
    }

    // Global defaults

    /// Sets the default minimum distance (> 0) of every source without an override.
    pub fn set_global_minimum_distance(&self, value: f32) -> Result<()> {
        let value = validate_minimum_distance(value)?;
        self.enqueue(ParameterChange::GlobalMinimumDistance(value))
    }

    /// Sets the default distance attenuation factor (>= 0).
    pub fn set_global_attenuation_factor(&self, value: f32) -> Result<()> {
        let value = validate_attenuation_factor(value)?;
        self.enqueue(ParameterChange::GlobalAttenuationFactor(value))
    }

    pub fn set_global_zero_delay(&self, value: bool) -> Result<()> {
        self.enqueue(ParameterChange::GlobalZeroDelay(value))
    }

    /// Sets the default clarity (0..=1).
    pub fn set_global_clarity(&self, value: f32) -> Result<()> {
        let value = validate_clarity(value)?;
        self.enqueue(ParameterChange::GlobalClarity(value))
    }

    /// Sets the RMS multiplier (>= 0) of all early reflections.
    pub fn set_reflections_gain(&self, value: f32) -> Result<()> {
        let value = validate_gain("reflections gain", value)?;
        self.enqueue(ParameterChange::ReflectionsGain(value))
    }

    /// Sets the RMS multiplier (>= 0) of the latefield.
    pub fn set_latefield_gain(&self, value: f32) -> Result<()> {
        let value = validate_gain("latefield gain", value)?;
        self.enqueue(ParameterChange::LatefieldGain(value))
    }

    pub fn global_minimum_distance(&self) -> f32 {
        self.published().globals.minimum_distance
    }

    pub fn global_attenuation_factor(&self) -> f32 {
        self.published().globals.attenuation_factor
    }

    pub fn global_zero_delay(&self) -> bool {
        self.published().globals.zero_delay
    }

    pub fn global_clarity(&self) -> f32 {
        self.published().globals.clarity
    }

    pub fn reflections_gain(&self) -> f32 {
        self.published().globals.reflections_gain
    }

    pub fn latefield_gain(&self) -> f32 {
        self.published().globals.latefield_gain
    }

    // Environment

    /// Switches to free field. Every configured surface material is dropped.
    pub fn set_environment_freefield(&self) -> Result<()> {
        self.enqueue(ParameterChange::SetFreeField)
    }

    /// Switches to a shoebox room of the given inner dimensions in meters.
    pub fn set_environment_shoebox(&self, width: f32, length: f32, height: f32) -> Result<()> {
        let dimensions = RoomDimensions::new(width, length, height)?;
        self.enqueue(ParameterChange::SetShoebox(dimensions))
    }

    /// Resizes the shoebox. Has no effect if the environment is free field when the
    /// change is committed.
    pub fn update_shoebox_dimensions(&self, width: f32, length: f32, height: f32) -> Result<()> {
        let dimensions = RoomDimensions::new(width, length, height)?;
        self.enqueue(ParameterChange::UpdateShoeboxDimensions(dimensions))
    }

    /// Assigns a named material to a reflective surface.
    ///
    /// Has no effect if the environment is free field when the change is committed.
    ///
    /// # Errors
    ///
    /// - `InvalidSurface` for `Surface::Direct`
    /// - `UnknownMaterial` if the name is not in the material library
    pub fn set_surface_material(&self, surface: Surface, name: &str) -> Result<()> {
        if surface.reflective_index().is_none() {
            return Err(AuralisError::InvalidSurface(surface as i32));
        }
        let material = self.materials_read().lookup(name)?;
        self.enqueue(ParameterChange::SurfaceMaterial {
            surface,
            material: Some(material),
        })
    }

    /// Same as [`set_surface_material`](Self::set_surface_material) with a raw surface id
    /// (0 = direct, 1 = left, 2 = front, 3 = right, 4 = back, 5 = ceiling, 6 = floor).
    pub fn set_surface_material_raw(&self, surface: i32, name: &str) -> Result<()> {
        self.set_surface_material(Surface::try_from(surface)?, name)
    }

    /// Removes the material of a surface so it no longer reflects.
    pub fn clear_surface_material(&self, surface: Surface) -> Result<()> {
        if surface.reflective_index().is_none() {
            return Err(AuralisError::InvalidSurface(surface as i32));
        }
        self.enqueue(ParameterChange::SurfaceMaterial {
            surface,
            material: None,
        })
    }

    pub fn set_environment_origin(&self, origin: Vec3) -> Result<()> {
        let origin = ensure_coordinates("environment origin", origin)?;
        self.enqueue(ParameterChange::EnvironmentOrigin(origin))
    }

    pub fn set_environment_orientation(&self, rotation: Quat) -> Result<()> {
        let rotation = ensure_finite_quat("environment orientation", rotation)?;
        self.enqueue(ParameterChange::EnvironmentOrientation(rotation))
    }

    pub fn set_environment_orientation_wxyz(&self, w: f32, x: f32, y: f32, z: f32) -> Result<()> {
        let rotation = quaternion_from_wxyz(w, x, y, z)?;
        self.enqueue(ParameterChange::EnvironmentOrientation(rotation))
    }

    pub fn set_environment_orientation_euler(&self, angles: EulerAngles) -> Result<()> {
        let rotation = rotation_from_euler("environment orientation", angles)?;
        self.enqueue(ParameterChange::EnvironmentOrientation(rotation))
    }

    /// Committed environment: variant, pose and surface materials.
    pub fn environment(&self) -> EnvironmentState {
        self.published().environment
    }

    /// Library name of the committed material on a surface.
    pub fn surface_material_name(&self, surface: Surface) -> Option<String> {
        let material = self.published().environment.material(surface)?;
        self.materials_read()
            .name(material.index)
            .map(str::to_string)
    }

    // Materials

    /// Adds a named material, or replaces the properties of an existing name.
    ///
    /// Surfaces that already use the name keep the old properties until the material
    /// is set on them again.
    pub fn register_material(&self, name: &str, material: AudioMaterial) -> Result<()> {
        let mut library = self
            .materials
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let reference = library.register(name, material)?;
        log::debug!("Registered material '{}' at index {}", name, reference.index);
        Ok(())
    }

    pub fn material(&self, name: &str) -> Option<AudioMaterial> {
        self.materials_read().get(name).copied()
    }

    // Engine plumbing

    pub(crate) fn change_receiver(&self) -> &Receiver<ParameterChange> {
        &self.receiver
    }

    /// Marks an engine as attached and hands it the state a previous engine left
    /// behind, if any.
    pub(crate) fn attach_engine(&self) -> Result<Option<SceneState>> {
        if self.engine_attached.swap(true, Ordering::AcqRel) {
            return Err(AuralisError::Configuration(
                "an engine is already attached to this world".into(),
            ));
        }
        Ok(self.parked().take())
    }

    /// Publishes and keeps the committed state of a departing engine so the next
    /// engine continues from it. Changes still queued stay queued.
    pub(crate) fn detach_engine(&self, state: SceneState) {
        self.published().copy_from(&state);
        *self.parked() = Some(state);
        self.engine_attached.store(false, Ordering::Release);
    }

    /// Copies committed state into the getter view without blocking.
    ///
    /// Returns `false` if a getter holds the view; the caller retries later.
    pub(crate) fn try_publish(&self, state: &SceneState) -> bool {
        match self.published.try_lock() {
            Ok(mut view) => {
                view.copy_from(state);
                true
            }
            Err(TryLockError::Poisoned(poisoned)) => {
                poisoned.into_inner().copy_from(state);
                true
            }
            Err(TryLockError::WouldBlock) => false,
        }
    }

    fn enqueue(&self, change: ParameterChange) -> Result<()> {
        self.sender.try_send(change).map_err(|e| match e {
            TrySendError::Full(_) => AuralisError::ChangeQueueFull,
            TrySendError::Disconnected(_) => {
                AuralisError::Configuration("change queue is disconnected".into())
            }
        })
    }

    /// Holds the registry across the send so lifecycle checks and queue order agree.
    ///
    /// Updates need a committed source that is not queued for removal.
    fn enqueue_for_source(&self, id: SourceId, change: ParameterChange) -> Result<()> {
        let registry = self.registry();
        registry.ensure_declared(id)?;
        if self.published().source(id).is_none() {
            return Err(AuralisError::UnknownSource(id));
        }
        self.enqueue(change)
    }

    fn committed_source(&self, id: SourceId) -> Result<(Vec3, SourceParams)> {
        self.published()
            .source(id)
            .ok_or(AuralisError::UnknownSource(id))
    }

    fn registry(&self) -> MutexGuard<'_, SourceRegistry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn published(&self) -> MutexGuard<'_, PublishedScene> {
        self.published.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn parked(&self) -> MutexGuard<'_, Option<SceneState>> {
        self.parked.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn materials_read(&self) -> RwLockReadGuard<'_, MaterialLibrary> {
        self.materials.read().unwrap_or_else(PoisonError::into_inner)
    }
}

fn rotation_from_euler(name: &str, angles: EulerAngles) -> Result<Quat> {
    if !(angles.yaw.is_finite() && angles.pitch.is_finite() && angles.roll.is_finite()) {
        return Err(AuralisError::InvalidParameter(format!(
            "{} angles must be finite, got {:?}",
            name, angles
        )));
    }
    Ok(euler_to_quaternion(angles))
}
