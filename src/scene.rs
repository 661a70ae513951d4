//! Flattened host scene exchanged with the 3D content tool.
//!
//! Host space is Z-up in host units; model space is Y-up and five times larger.
//! Adapters implement [`SceneReader`] for export and [`SceneWriter`] for import.

use crate::error::Result;
use crate::types::{SphereMode, Vec2, Vec3, Vec4};

const SCALE: f32 = 5.0;

#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    CopyLocation {
        subtarget: String,
        influence: f32,
        /// All three axes inverted.
        inverted: bool,
    },
    CopyRotation {
        subtarget: String,
        influence: f32,
        inverted: bool,
    },
    LimitRotation {
        x: bool,
        z: bool,
    },
    /// Placed on the last chain bone; `subtarget` is the controller.
    Ik {
        subtarget: String,
        chain_count: u32,
    },
}

/// Per-axis rotation freedom of an IK chain member, radians.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum IkAxis {
    #[default]
    Free,
    Locked,
    Limited {
        min: f32,
        max: f32,
    },
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct HostBone {
    pub name: String,
    pub head: Vec3,
    pub tail: Vec3,
    pub parent: Option<String>,
    pub use_connect: bool,
    pub lock_rotation: [bool; 3],
    pub lock_location: [bool; 3],
    pub constraints: Vec<Constraint>,
    /// Solver settings stored on an IK controller.
    pub ik_loops: Option<i32>,
    pub ik_limit: Option<f32>,
    pub ik_axes: [IkAxis; 3],
}

impl HostBone {
    pub fn new<S: Into<String>>(name: S, head: Vec3, tail: Vec3) -> HostBone {
        HostBone {
            name: name.into(),
            head,
            tail,
            ..HostBone::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct HostVertex {
    pub position: Vec3,
    pub normal: Vec3,
    /// Vertex group (bone name) and weight.
    pub groups: Vec<(String, f32)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HostTriangle {
    /// Mesh-local vertex indices.
    pub corners: [usize; 3],
    /// Host UVs, origin at the bottom left.
    pub uvs: [Vec2; 3],
    /// Index into the mesh's material slots.
    pub material: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShapeKey {
    pub name: String,
    /// Absolute positions, one per mesh vertex.
    pub positions: Vec<Vec3>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct HostMesh {
    pub name: String,
    pub vertices: Vec<HostVertex>,
    pub triangles: Vec<HostTriangle>,
    /// Material slot names.
    pub materials: Vec<String>,
    pub shape_keys: Vec<ShapeKey>,
    /// Negative object scale; keeps the winding as is.
    pub mirrored: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HostMaterial {
    pub name: String,
    pub diffuse: Vec4,
    pub specular: Vec3,
    pub specular_power: f32,
    /// Custom ambient; derived from the diffuse color when absent.
    pub ambient: Option<Vec3>,
    /// Paths relative to the model file.
    pub texture: Option<String>,
    pub sphere: Option<(String, SphereMode)>,
}

impl HostMaterial {
    pub fn new<S: Into<String>>(name: S) -> HostMaterial {
        HostMaterial {
            name: name.into(),
            diffuse: [0.8, 0.8, 0.8, 1.0],
            specular: [0.0; 3],
            specular_power: 0.5,
            ambient: None,
            texture: None,
            sphere: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SceneDescription {
    pub name: String,
    /// Host order; parents are not required to come first.
    pub bones: Vec<HostBone>,
    pub meshes: Vec<HostMesh>,
    pub materials: Vec<HostMaterial>,
}

impl SceneDescription {
    pub fn bone(&self, name: &str) -> Option<&HostBone> {
        self.bones.iter().find(|b| b.name == name)
    }

    pub fn material(&self, name: &str) -> Option<&HostMaterial> {
        self.materials.iter().find(|m| m.name == name)
    }
}

pub trait SceneReader {
    fn read_scene(&self) -> Result<SceneDescription>;
}

pub trait SceneWriter {
    fn write_scene(&mut self, scene: SceneDescription) -> Result<()>;
}

impl SceneReader for SceneDescription {
    fn read_scene(&self) -> Result<SceneDescription> {
        Ok(self.clone())
    }
}

pub fn to_model_space(v: Vec3) -> Vec3 {
    [v[0] * SCALE, v[2] * SCALE, v[1] * SCALE]
}

pub fn to_host_space(v: Vec3) -> Vec3 {
    [v[0] / SCALE, v[2] / SCALE, v[1] / SCALE]
}

pub fn normalize(v: Vec3) -> Vec3 {
    let len = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
    if len == 0.0 {
        v
    } else {
        [v[0] / len, v[1] / len, v[2] / len]
    }
}

pub fn to_model_normal(n: Vec3) -> Vec3 {
    normalize([n[0], n[2], n[1]])
}

pub fn to_host_normal(n: Vec3) -> Vec3 {
    normalize([n[0], n[2], n[1]])
}

/// Host UVs have V pointing up, model UVs point down. The flip is its own inverse.
pub fn flip_uv(uv: Vec2) -> Vec2 {
    [uv[0], 1.0 - uv[1]]
}

pub(crate) fn sub(a: Vec3, b: Vec3) -> Vec3 {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

pub(crate) fn add(a: Vec3, b: Vec3) -> Vec3 {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}
