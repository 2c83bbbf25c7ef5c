//! Free-field and shoebox environments.

use std::fmt;

use crate::error::{AuralisError, Result, ensure_positive};
use crate::math::Pose;
use crate::scene::MaterialRef;

/// Surface identifiers of a shoebox room.
///
/// `Direct` names the direct path and carries no material; the other six are the
/// reflective walls, ceiling and floor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Surface {
    Direct = 0,
    Left = 1,
    Front = 2,
    Right = 3,
    Back = 4,
    Ceiling = 5,
    Floor = 6,
}

impl Surface {
    /// The six reflective surfaces, in the order of [`Surface::reflective_index`].
    pub const REFLECTIVE: [Surface; 6] = [
        Surface::Left,
        Surface::Front,
        Surface::Right,
        Surface::Back,
        Surface::Ceiling,
        Surface::Floor,
    ];

    /// Position in [`Surface::REFLECTIVE`], `None` for `Direct`.
    pub fn reflective_index(self) -> Option<usize> {
        match self {
            Surface::Direct => None,
            other => Some(other as usize - 1),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Surface::Direct => "direct",
            Surface::Left => "left",
            Surface::Front => "front",
            Surface::Right => "right",
            Surface::Back => "back",
            Surface::Ceiling => "ceiling",
            Surface::Floor => "floor",
        }
    }
}

impl TryFrom<i32> for Surface {
    type Error = AuralisError;

    fn try_from(value: i32) -> Result<Self> {
        match value {
            0 => Ok(Surface::Direct),
            1 => Ok(Surface::Left),
            2 => Ok(Surface::Front),
            3 => Ok(Surface::Right),
            4 => Ok(Surface::Back),
            5 => Ok(Surface::Ceiling),
            6 => Ok(Surface::Floor),
            other => Err(AuralisError::InvalidSurface(other)),
        }
    }
}

impl fmt::Display for Surface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Inner dimensions of a shoebox room in meters.
///
/// Width runs along the room's X axis, length along Y and height along Z.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoomDimensions {
    pub width: f32,
    pub length: f32,
    pub height: f32,
}

impl RoomDimensions {
    /// Fails with `InvalidParameter` unless every side is finite and positive.
    pub fn new(width: f32, length: f32, height: f32) -> Result<Self> {
        Ok(Self {
            width: ensure_positive("room width", width)?,
            length: ensure_positive("room length", length)?,
            height: ensure_positive("room height", height)?,
        })
    }

    pub fn volume(&self) -> f32 {
        self.width * self.length * self.height
    }

    /// Area of one surface in square meters (zero for `Direct`).
    pub fn surface_area(&self, surface: Surface) -> f32 {
        match surface {
            Surface::Direct => 0.0,
            Surface::Left | Surface::Right => self.length * self.height,
            Surface::Front | Surface::Back => self.width * self.height,
            Surface::Ceiling | Surface::Floor => self.width * self.length,
        }
    }

    pub fn total_area(&self) -> f32 {
        2.0 * (self.width * self.length + self.width * self.height + self.length * self.height)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Environment {
    /// No reflective geometry; only direct paths are rendered
    #[default]
    FreeField,
    Shoebox(RoomDimensions),
}

impl Environment {
    pub fn is_free_field(&self) -> bool {
        matches!(self, Environment::FreeField)
    }

    pub fn dimensions(&self) -> Option<RoomDimensions> {
        match self {
            Environment::FreeField => None,
            Environment::Shoebox(dimensions) => Some(*dimensions),
        }
    }
}

/// The environment variant together with its pose and surface materials.
///
/// The pose places the room's local frame in the world: the room spans
/// `[0, width] x [0, length] x [0, height]` from its origin.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EnvironmentState {
    pub environment: Environment,
    pub pose: Pose,
    materials: [Option<MaterialRef>; 6],
}

impl EnvironmentState {
    /// Switches to free field and drops every configured material.
    pub fn set_free_field(&mut self) {
        self.environment = Environment::FreeField;
        self.materials = [None; 6];
    }

    /// Switches to (or resizes) a shoebox, keeping materials already set on a shoebox.
    pub fn set_shoebox(&mut self, dimensions: RoomDimensions) {
        self.environment = Environment::Shoebox(dimensions);
    }

    /// Returns `false` without changing anything in free field.
    pub fn update_dimensions(&mut self, dimensions: RoomDimensions) -> bool {
        match &mut self.environment {
            Environment::FreeField => false,
            Environment::Shoebox(current) => {
                *current = dimensions;
                true
            }
        }
    }

    /// Sets or clears a surface material. Returns `false` without changing anything in
    /// free field or for `Surface::Direct`.
    pub fn set_material(&mut self, surface: Surface, material: Option<MaterialRef>) -> bool {
        if self.environment.is_free_field() {
            return false;
        }
        match surface.reflective_index() {
            Some(index) => {
                self.materials[index] = material;
                true
            }
            None => false,
        }
    }

    pub fn material(&self, surface: Surface) -> Option<MaterialRef> {
        surface
            .reflective_index()
            .and_then(|index| self.materials[index])
    }

    pub fn materials(&self) -> &[Option<MaterialRef>; 6] {
        &self.materials
    }
}
