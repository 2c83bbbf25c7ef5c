//! Typed change records queued between the control side and the render side.
//!
//! Every setter on [`AuralisWorld`](crate::AuralisWorld) produces exactly one record.
//! Records are plain `Copy` data so the render thread can drain them without
//! freeing anything.

use crate::math::{Quat, Vec3};
use crate::scene::{MaterialRef, RoomDimensions, Surface};
use crate::world::SourceId;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParameterChange {
    AddSource { id: SourceId, position: Vec3 },
    RemoveSource(SourceId),
    SourcePosition { id: SourceId, position: Vec3 },
    SourceMinimumDistance { id: SourceId, value: f32 },
    SourceAttenuationFactor { id: SourceId, value: f32 },
    SourceZeroDelay { id: SourceId, value: bool },
    SourceClarity { id: SourceId, value: f32 },
    ResetSourceParameters(SourceId),

    ListenerPosition(Vec3),
    ListenerOrientation(Quat),

    GlobalMinimumDistance(f32),
    GlobalAttenuationFactor(f32),
    GlobalZeroDelay(bool),
    GlobalClarity(f32),
    ReflectionsGain(f32),
    LatefieldGain(f32),

    SetFreeField,
    SetShoebox(RoomDimensions),
    UpdateShoeboxDimensions(RoomDimensions),
    /// `None` clears the surface
    SurfaceMaterial {
        surface: Surface,
        material: Option<MaterialRef>,
    },
    EnvironmentOrigin(Vec3),
    EnvironmentOrientation(Quat),
}
