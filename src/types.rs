//! In-memory model shared by the binary codec, the legacy bridge and the sidecar layer.

use bitflags::bitflags;
use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::status::FormatStatus;

pub type Vec2 = [f32; 2];
pub type Vec3 = [f32; 3];
pub type Vec4 = [f32; 4];

/// Text encoding of length-prefixed strings. `ShiftJis` only appears in legacy files.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Encode {
    Utf16Le,
    Utf8,
    ShiftJis,
}

impl Encode {
    pub(crate) fn selector(self) -> u8 {
        match self {
            Encode::Utf8 => 1,
            // legacy models are always rewritten as UTF-16
            Encode::Utf16Le | Encode::ShiftJis => 0,
        }
    }
}

impl TryFrom<u8> for Encode {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Encode::Utf16Le),
            1 => Ok(Encode::Utf8),
            x => Err(Error::malformed(format!("unknown text encoding selector {}", x))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ModelInfo {
    pub name: String,
    pub name_en: String,
    pub comment: String,
    pub comment_en: String,
}

/// Root aggregate. Index fields refer into the sibling collections or hold -1.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Model {
    pub status: FormatStatus,
    pub info: ModelInfo,
    pub vertices: Vec<Vertex>,
    /// Flat triangle list, three vertex indices per face.
    pub faces: Vec<i32>,
    pub textures: Vec<String>,
    pub materials: Vec<Material>,
    pub bones: Vec<Bone>,
    pub morphs: Vec<Morph>,
    pub frames: Vec<Frame>,
    pub rigids: Vec<Rigid>,
    pub joints: Vec<Joint>,
    pub soft_bodies: Vec<SoftBody>,
}

impl Model {
    /// True when some record can only be expressed by the 2.1 revision.
    pub fn requires_v21(&self) -> bool {
        self.vertices
            .iter()
            .any(|v| matches!(v.weight, VertexWeight::QDEF { .. }))
            || self
                .morphs
                .iter()
                .any(|m| matches!(m.offsets, MorphOffsets::Flip(_) | MorphOffsets::Impulse(_)))
            || self.joints.iter().any(|j| j.kind != JointKind::Spring6Dof)
            || !self.soft_bodies.is_empty()
    }

    pub fn bone_by_name(&self, name: &str) -> Option<usize> {
        self.bones.iter().position(|b| b.name == name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Vertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub uv: Vec2,
    /// One entry per additional UV channel declared in the status header.
    pub extra_uv: Vec<Vec4>,
    pub weight: VertexWeight,
    pub edge_scale: f32,
}

impl Default for Vertex {
    fn default() -> Self {
        Vertex {
            position: [0.0; 3],
            normal: [0.0, 1.0, 0.0],
            uv: [0.0; 2],
            extra_uv: vec![],
            weight: VertexWeight::BDEF1(0),
            edge_scale: 1.0,
        }
    }
}

/// Skinning variants, tagged 0..=4 in the file.
#[derive(Debug, Clone, PartialEq)]
#[allow(clippy::upper_case_acronyms)]
pub enum VertexWeight {
    BDEF1(i32),
    BDEF2 {
        bones: [i32; 2],
        weight: f32,
    },
    BDEF4 {
        bones: [i32; 4],
        weights: [f32; 4],
    },
    SDEF {
        bones: [i32; 2],
        weight: f32,
        c: Vec3,
        r0: Vec3,
        r1: Vec3,
    },
    QDEF {
        bones: [i32; 4],
        weights: [f32; 4],
    },
}

impl VertexWeight {
    pub fn tag(&self) -> u8 {
        match self {
            VertexWeight::BDEF1(_) => 0,
            VertexWeight::BDEF2 { .. } => 1,
            VertexWeight::BDEF4 { .. } => 2,
            VertexWeight::SDEF { .. } => 3,
            VertexWeight::QDEF { .. } => 4,
        }
    }

    pub fn bones(&self) -> Vec<i32> {
        match self {
            VertexWeight::BDEF1(b) => vec![*b],
            VertexWeight::BDEF2 { bones, .. } | VertexWeight::SDEF { bones, .. } => bones.to_vec(),
            VertexWeight::BDEF4 { bones, .. } | VertexWeight::QDEF { bones, .. } => bones.to_vec(),
        }
    }

    /// Stored weights. A single bone stores none; the two-bone variants store the first one.
    pub fn weights(&self) -> Vec<f32> {
        match self {
            VertexWeight::BDEF1(_) => vec![],
            VertexWeight::BDEF2 { weight, .. } | VertexWeight::SDEF { weight, .. } => {
                vec![*weight]
            }
            VertexWeight::BDEF4 { weights, .. } | VertexWeight::QDEF { weights, .. } => {
                weights.to_vec()
            }
        }
    }

    /// Every (bone, weight) pair with the implied second weight filled in.
    pub fn influences(&self) -> Vec<(i32, f32)> {
        match self {
            VertexWeight::BDEF1(b) => vec![(*b, 1.0)],
            VertexWeight::BDEF2 { bones, weight } | VertexWeight::SDEF { bones, weight, .. } => {
                vec![(bones[0], *weight), (bones[1], 1.0 - *weight)]
            }
            VertexWeight::BDEF4 { bones, weights } | VertexWeight::QDEF { bones, weights } => bones
                .iter()
                .copied()
                .zip(weights.iter().copied())
                .filter(|(_, w)| *w > 0.0)
                .collect(),
        }
    }

    /// Linear skinning from arbitrary influences.
    ///
    /// Non-positive weights are dropped. Two influences keep their order; more than two keep
    /// the four strongest. The stored weights always sum to 1.
    pub fn from_influences(influences: &[(i32, f32)]) -> VertexWeight {
        let mut live: Vec<(i32, f32)> = influences
            .iter()
            .copied()
            .filter(|(_, w)| *w > 0.0)
            .collect();
        match live.len() {
            0 => VertexWeight::BDEF1(0),
            1 => VertexWeight::BDEF1(live[0].0),
            2 => VertexWeight::BDEF2 {
                bones: [live[0].0, live[1].0],
                weight: live[0].1 / (live[0].1 + live[1].1),
            },
            _ => {
                // stable, so equal weights keep host order
                live.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
                live.truncate(4);
                let total: f32 = live.iter().map(|(_, w)| w).sum();
                let mut bones = [0; 4];
                let mut weights = [0.0; 4];
                for (i, (b, w)) in live.iter().enumerate() {
                    bones[i] = *b;
                    weights[i] = w / total;
                }
                VertexWeight::BDEF4 { bones, weights }
            }
        }
    }
}

/// Texture slots shared by textures, sphere maps and toon textures, in first-seen order.
#[derive(Debug, Clone, Default)]
pub struct TextureTable {
    pub paths: Vec<String>,
    index: HashMap<String, i32>,
}

impl TextureTable {
    pub fn intern(&mut self, path: &str) -> i32 {
        if let Some(i) = self.index.get(path) {
            return *i;
        }
        let i = self.paths.len() as i32;
        self.paths.push(path.to_owned());
        self.index.insert(path.to_owned(), i);
        i
    }

    /// `None` for -1 or an out of range slot.
    pub fn path(&self, index: i32) -> Option<&str> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.paths.get(i))
            .map(String::as_str)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SphereMode {
    None,
    Multiply,
    Add,
    /// Sphere slot sampled through the first additional UV channel.
    SubTexture,
}

impl TryFrom<u8> for SphereMode {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(SphereMode::None),
            1 => Ok(SphereMode::Multiply),
            2 => Ok(SphereMode::Add),
            3 => Ok(SphereMode::SubTexture),
            x => Err(Error::malformed(format!("invalid sphere mode {}", x))),
        }
    }
}

impl From<SphereMode> for u8 {
    fn from(mode: SphereMode) -> u8 {
        match mode {
            SphereMode::None => 0,
            SphereMode::Multiply => 1,
            SphereMode::Add => 2,
            SphereMode::SubTexture => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToonMode {
    /// Texture slot index, or -1.
    Texture(i32),
    /// Shared toon00..toon09.
    System(u8),
}

bitflags! {
    pub struct MaterialFlags: u8 {
        const DOUBLE_SIDED = 0x01;
        const GROUND_SHADOW = 0x02;
        const DROP_SHADOW = 0x04;
        const RECEIVE_SHADOW = 0x08;
        const EDGE = 0x10;
        const VERTEX_COLOR = 0x20;
        const POINT_DRAW = 0x40;
        const LINE_DRAW = 0x80;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub name: String,
    pub name_en: String,
    pub diffuse: Vec4,
    pub specular: Vec3,
    pub specular_power: f32,
    pub ambient: Vec3,
    pub flags: MaterialFlags,
    pub edge_color: Vec4,
    pub edge_size: f32,
    pub texture: i32,
    pub sphere: i32,
    pub sphere_mode: SphereMode,
    pub toon: ToonMode,
    pub memo: String,
    /// Number of consecutive face indices (not triangles) drawn with this material.
    pub face_count: i32,
}

impl Default for Material {
    fn default() -> Self {
        Material {
            name: String::new(),
            name_en: String::new(),
            diffuse: [1.0, 1.0, 1.0, 1.0],
            specular: [0.0; 3],
            specular_power: 1.0,
            ambient: [0.4, 0.4, 0.4],
            flags: MaterialFlags::empty(),
            edge_color: [0.0, 0.0, 0.0, 1.0],
            edge_size: 1.0,
            texture: -1,
            sphere: -1,
            sphere_mode: SphereMode::None,
            toon: ToonMode::Texture(-1),
            memo: String::new(),
            face_count: 0,
        }
    }
}

bitflags! {
    pub struct BoneFlags: u16 {
        const CONNECT_TO_BONE = 0x0001;
        const ROTATABLE = 0x0002;
        const MOVABLE = 0x0004;
        const VISIBLE = 0x0008;
        const OPERATIONAL = 0x0010;
        const IK = 0x0020;
        const INHERIT_LOCAL = 0x0080;
        const INHERIT_ROTATION = 0x0100;
        const INHERIT_TRANSLATION = 0x0200;
        const FIXED_AXIS = 0x0400;
        const LOCAL_AXIS = 0x0800;
        const AFTER_PHYSICS = 0x1000;
        const EXTERNAL_PARENT = 0x2000;
    }
}

/// Where the bone's display tail points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BoneTail {
    Bone(i32),
    Offset(Vec3),
}

/// Additional (inherited) transform from another bone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Inherit {
    None,
    Rotate { parent: i32, power: f32 },
    Translate { parent: i32, power: f32 },
    Both { parent: i32, power: f32 },
}

impl Inherit {
    pub fn source(&self) -> Option<(i32, f32)> {
        match *self {
            Inherit::None => None,
            Inherit::Rotate { parent, power }
            | Inherit::Translate { parent, power }
            | Inherit::Both { parent, power } => Some((parent, power)),
        }
    }

    pub fn rotates(&self) -> bool {
        matches!(self, Inherit::Rotate { .. } | Inherit::Both { .. })
    }

    pub fn translates(&self) -> bool {
        matches!(self, Inherit::Translate { .. } | Inherit::Both { .. })
    }

    pub fn from_parts(rotate: bool, translate: bool, parent: i32, power: f32) -> Inherit {
        match (rotate, translate) {
            (true, true) => Inherit::Both { parent, power },
            (true, false) => Inherit::Rotate { parent, power },
            (false, true) => Inherit::Translate { parent, power },
            (false, false) => Inherit::None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalAxis {
    pub x: Vec3,
    pub z: Vec3,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ik {
    pub target: i32,
    pub loops: i32,
    /// Radians per iteration.
    pub limit: f32,
    pub links: Vec<IkLink>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IkLink {
    pub bone: i32,
    /// Lower and upper rotation clamp, radians.
    pub limit: Option<(Vec3, Vec3)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bone {
    pub name: String,
    pub name_en: String,
    pub position: Vec3,
    pub parent: i32,
    pub level: i32,
    pub tail: BoneTail,
    pub rotatable: bool,
    pub movable: bool,
    pub visible: bool,
    pub operational: bool,
    pub inherit_local: bool,
    pub inherit: Inherit,
    pub fixed_axis: Option<Vec3>,
    pub local_axis: Option<LocalAxis>,
    pub after_physics: bool,
    pub external_parent: Option<i32>,
    pub ik: Option<Ik>,
}

impl Bone {
    pub fn flags(&self) -> BoneFlags {
        let mut flags = BoneFlags::empty();
        flags.set(
            BoneFlags::CONNECT_TO_BONE,
            matches!(self.tail, BoneTail::Bone(_)),
        );
        flags.set(BoneFlags::ROTATABLE, self.rotatable);
        flags.set(BoneFlags::MOVABLE, self.movable);
        flags.set(BoneFlags::VISIBLE, self.visible);
        flags.set(BoneFlags::OPERATIONAL, self.operational);
        flags.set(BoneFlags::IK, self.ik.is_some());
        flags.set(BoneFlags::INHERIT_LOCAL, self.inherit_local);
        flags.set(BoneFlags::INHERIT_ROTATION, self.inherit.rotates());
        flags.set(BoneFlags::INHERIT_TRANSLATION, self.inherit.translates());
        flags.set(BoneFlags::FIXED_AXIS, self.fixed_axis.is_some());
        flags.set(BoneFlags::LOCAL_AXIS, self.local_axis.is_some());
        flags.set(BoneFlags::AFTER_PHYSICS, self.after_physics);
        flags.set(BoneFlags::EXTERNAL_PARENT, self.external_parent.is_some());
        flags
    }
}

impl Default for Bone {
    fn default() -> Bone {
        Bone {
            name: String::new(),
            name_en: String::new(),
            position: [0.0; 3],
            parent: -1,
            level: 0,
            tail: BoneTail::Bone(-1),
            rotatable: true,
            movable: false,
            visible: true,
            operational: true,
            inherit_local: false,
            inherit: Inherit::None,
            fixed_axis: None,
            local_axis: None,
            after_physics: false,
            external_parent: None,
            ik: None,
        }
    }
}

/// Facial control panel a morph is listed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Panel {
    System,
    Eyebrow,
    Eye,
    Mouth,
    Other,
}

impl TryFrom<u8> for Panel {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Panel::System),
            1 => Ok(Panel::Eyebrow),
            2 => Ok(Panel::Eye),
            3 => Ok(Panel::Mouth),
            4 => Ok(Panel::Other),
            x => Err(Error::malformed(format!("unknown morph panel {}", x))),
        }
    }
}

impl From<Panel> for u8 {
    fn from(panel: Panel) -> u8 {
        match panel {
            Panel::System => 0,
            Panel::Eyebrow => 1,
            Panel::Eye => 2,
            Panel::Mouth => 3,
            Panel::Other => 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Morph {
    pub name: String,
    pub name_en: String,
    pub panel: Panel,
    pub offsets: MorphOffsets,
}

/// Offset payload, one variant per morph kind.
#[derive(Debug, Clone, PartialEq)]
pub enum MorphOffsets {
    Group(Vec<GroupOffset>),
    Vertex(Vec<VertexOffset>),
    Bone(Vec<BoneOffset>),
    /// Channel 0 is the base UV, 1..=4 the additional channels.
    Uv { channel: u8, offsets: Vec<UvOffset> },
    Material(Vec<MaterialOffset>),
    Flip(Vec<GroupOffset>),
    Impulse(Vec<ImpulseOffset>),
}

impl MorphOffsets {
    pub fn kind(&self) -> u8 {
        match self {
            MorphOffsets::Group(_) => 0,
            MorphOffsets::Vertex(_) => 1,
            MorphOffsets::Bone(_) => 2,
            MorphOffsets::Uv { channel, .. } => 3 + channel,
            MorphOffsets::Material(_) => 8,
            MorphOffsets::Flip(_) => 9,
            MorphOffsets::Impulse(_) => 10,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            MorphOffsets::Group(o) | MorphOffsets::Flip(o) => o.len(),
            MorphOffsets::Vertex(o) => o.len(),
            MorphOffsets::Bone(o) => o.len(),
            MorphOffsets::Uv { offsets, .. } => offsets.len(),
            MorphOffsets::Material(o) => o.len(),
            MorphOffsets::Impulse(o) => o.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroupOffset {
    pub morph: i32,
    pub factor: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VertexOffset {
    pub vertex: i32,
    pub offset: Vec3,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoneOffset {
    pub bone: i32,
    pub translation: Vec3,
    /// Quaternion (x, y, z, w).
    pub rotation: Vec4,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UvOffset {
    pub vertex: i32,
    pub offset: Vec4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaterialOperation {
    Multiply,
    Add,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaterialOffset {
    /// -1 applies to every material.
    pub material: i32,
    pub operation: MaterialOperation,
    pub diffuse: Vec4,
    pub specular: Vec3,
    pub specular_power: f32,
    pub ambient: Vec3,
    pub edge_color: Vec4,
    pub edge_size: f32,
    pub texture_tint: Vec4,
    pub sphere_tint: Vec4,
    pub toon_tint: Vec4,
}

impl MaterialOffset {
    /// Identity offset for the given operation (all ones for multiply, zeros for add).
    pub fn identity(material: i32, operation: MaterialOperation) -> Self {
        let v = match operation {
            MaterialOperation::Multiply => 1.0,
            MaterialOperation::Add => 0.0,
        };
        MaterialOffset {
            material,
            operation,
            diffuse: [v; 4],
            specular: [v; 3],
            specular_power: v,
            ambient: [v; 3],
            edge_color: [v; 4],
            edge_size: v,
            texture_tint: [v; 4],
            sphere_tint: [v; 4],
            toon_tint: [v; 4],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImpulseOffset {
    pub rigid: i32,
    pub local: bool,
    pub velocity: Vec3,
    pub torque: Vec3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameItem {
    Bone(i32),
    Morph(i32),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Frame {
    pub name: String,
    pub name_en: String,
    /// Root and expression frames are special.
    pub special: bool,
    pub items: Vec<FrameItem>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RigidShape {
    Sphere,
    Box,
    Capsule,
}

impl TryFrom<u8> for RigidShape {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(RigidShape::Sphere),
            1 => Ok(RigidShape::Box),
            2 => Ok(RigidShape::Capsule),
            x => Err(Error::malformed(format!("invalid rigid shape {}", x))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RigidPhysics {
    Static,
    Dynamic,
    /// Simulated, then snapped back to its bone position.
    DynamicWithBone,
}

impl TryFrom<u8> for RigidPhysics {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(RigidPhysics::Static),
            1 => Ok(RigidPhysics::Dynamic),
            2 => Ok(RigidPhysics::DynamicWithBone),
            x => Err(Error::malformed(format!("invalid rigid physics mode {}", x))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rigid {
    pub name: String,
    pub name_en: String,
    pub bone: i32,
    pub group: u8,
    /// Bit i set means "collides with group i".
    pub collision_mask: u16,
    pub shape: RigidShape,
    pub size: Vec3,
    pub position: Vec3,
    /// Euler angles, radians.
    pub rotation: Vec3,
    pub mass: f32,
    pub linear_damping: f32,
    pub angular_damping: f32,
    pub restitution: f32,
    pub friction: f32,
    pub physics: RigidPhysics,
}

impl Default for Rigid {
    fn default() -> Self {
        Rigid {
            name: String::new(),
            name_en: String::new(),
            bone: -1,
            group: 0,
            collision_mask: 0xFFFF,
            shape: RigidShape::Sphere,
            size: [1.0; 3],
            position: [0.0; 3],
            rotation: [0.0; 3],
            mass: 1.0,
            linear_damping: 0.5,
            angular_damping: 0.5,
            restitution: 0.0,
            friction: 0.5,
            physics: RigidPhysics::Static,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JointKind {
    Spring6Dof,
    SixDof,
    P2P,
    ConeTwist,
    Slider,
    Hinge,
}

impl TryFrom<u8> for JointKind {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(JointKind::Spring6Dof),
            1 => Ok(JointKind::SixDof),
            2 => Ok(JointKind::P2P),
            3 => Ok(JointKind::ConeTwist),
            4 => Ok(JointKind::Slider),
            5 => Ok(JointKind::Hinge),
            x => Err(Error::malformed(format!("invalid joint kind {}", x))),
        }
    }
}

impl From<JointKind> for u8 {
    fn from(kind: JointKind) -> u8 {
        match kind {
            JointKind::Spring6Dof => 0,
            JointKind::SixDof => 1,
            JointKind::P2P => 2,
            JointKind::ConeTwist => 3,
            JointKind::Slider => 4,
            JointKind::Hinge => 5,
        }
    }
}

/// Joint parameters as stored. Kinds other than spring 6DOF reinterpret the same slots.
#[derive(Debug, Clone, PartialEq)]
pub struct Joint {
    pub name: String,
    pub name_en: String,
    pub kind: JointKind,
    pub rigid_a: i32,
    pub rigid_b: i32,
    pub position: Vec3,
    pub rotation: Vec3,
    pub position_min: Vec3,
    pub position_max: Vec3,
    pub rotation_min: Vec3,
    pub rotation_max: Vec3,
    pub position_spring: Vec3,
    pub rotation_spring: Vec3,
}

impl Default for Joint {
    fn default() -> Self {
        Joint {
            name: String::new(),
            name_en: String::new(),
            kind: JointKind::Spring6Dof,
            rigid_a: -1,
            rigid_b: -1,
            position: [0.0; 3],
            rotation: [0.0; 3],
            position_min: [0.0; 3],
            position_max: [0.0; 3],
            rotation_min: [0.0; 3],
            rotation_max: [0.0; 3],
            position_spring: [0.0; 3],
            rotation_spring: [0.0; 3],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoftBodyShape {
    TriMesh,
    Rope,
}

bitflags! {
    pub struct SoftBodyFlags: u8 {
        const B_LINK = 0x01;
        const CLUSTER = 0x02;
        const LINK_CROSSING = 0x04;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AeroModel {
    VPoint,
    VTwoSided,
    VOneSided,
    FTwoSided,
    FOneSided,
}

impl TryFrom<i32> for AeroModel {
    type Error = Error;

    fn try_from(value: i32) -> Result<Self> {
        match value {
            0 => Ok(AeroModel::VPoint),
            1 => Ok(AeroModel::VTwoSided),
            2 => Ok(AeroModel::VOneSided),
            3 => Ok(AeroModel::FTwoSided),
            4 => Ok(AeroModel::FOneSided),
            x => Err(Error::malformed(format!("invalid soft body aero model {}", x))),
        }
    }
}

impl From<AeroModel> for i32 {
    fn from(model: AeroModel) -> i32 {
        match model {
            AeroModel::VPoint => 0,
            AeroModel::VTwoSided => 1,
            AeroModel::VOneSided => 2,
            AeroModel::FTwoSided => 3,
            AeroModel::FOneSided => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SoftBodyAnchor {
    pub rigid: i32,
    pub vertex: i32,
    pub near_mode: bool,
}

/// Bullet soft body. Only present in 2.1 files.
#[derive(Debug, Clone, PartialEq)]
pub struct SoftBody {
    pub name: String,
    pub name_en: String,
    pub shape: SoftBodyShape,
    pub material: i32,
    pub group: u8,
    pub collision_mask: u16,
    pub flags: SoftBodyFlags,
    pub b_link_distance: i32,
    pub clusters: i32,
    pub mass: f32,
    pub margin: f32,
    pub aero_model: AeroModel,
    /// VCF, DP, DG, LF, PR, VC, DF, MT, CHR, KHR, SHR, AHR.
    pub config: [f32; 12],
    /// SRHR_CL, SKHR_CL, SSHR_CL, SR_SPLT_CL, SK_SPLT_CL, SS_SPLT_CL.
    pub cluster: [f32; 6],
    /// V_IT, P_IT, D_IT, C_IT.
    pub iteration: [i32; 4],
    /// LST, AST, VST.
    pub stiffness: [f32; 3],
    pub anchors: Vec<SoftBodyAnchor>,
    pub pins: Vec<i32>,
}
