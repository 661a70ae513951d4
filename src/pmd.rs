//! Legacy PMD parsing. Fixed-width Shift-JIS names and fixed index widths.
//!
//! The English, toon and physics blocks at the end are optional: a stream ending
//! exactly before one of them means the block is absent.

use crate::binary_reader::BinaryReader;
use crate::error::Result;
use crate::types::{Vec2, Vec3, Vec4};
use std::io::Read;
use tracing::debug;

const NAME: usize = 20;
const COMMENT: usize = 256;
const GROUP_NAME: usize = 50;
const TOON_NAME: usize = 100;
pub const TOON_COUNT: usize = 10;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PmdModel {
    pub name: String,
    pub comment: String,
    pub name_en: String,
    pub comment_en: String,
    pub vertices: Vec<PmdVertex>,
    pub indices: Vec<i32>,
    pub materials: Vec<PmdMaterial>,
    pub bones: Vec<PmdBone>,
    pub iks: Vec<PmdIk>,
    pub skins: Vec<PmdSkin>,
    /// Expression panel order; the entries index into `skins`.
    pub skin_display: Vec<PmdSkinDisplay>,
    pub bone_groups: Vec<PmdBoneGroup>,
    /// (bone, group) with groups numbered from 1.
    pub bone_display: Vec<(i32, u8)>,
    pub toon_names: Vec<String>,
    pub rigids: Vec<PmdRigid>,
    pub joints: Vec<PmdJoint>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PmdVertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub uv: Vec2,
    pub bones: [i32; 2],
    /// Weight of the first bone, 0..=100.
    pub weight: u8,
    /// 1 draws the outline; any other value disables it.
    pub edge_flag: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PmdMaterial {
    pub diffuse: Vec4,
    pub shininess: f32,
    pub specular: Vec3,
    pub ambient: Vec3,
    /// Index into the toon name table, -1 for none.
    pub toon: i32,
    pub edge: bool,
    pub face_count: u32,
    pub texture: String,
    pub sphere: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PmdBone {
    pub name: String,
    pub name_en: String,
    pub parent: i32,
    pub tail: i32,
    pub kind: u8,
    /// IK bone for kinds 4 and 5, rotation ratio for kind 9.
    pub kind_target: i32,
    pub position: Vec3,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PmdIk {
    pub target: i32,
    pub effector: i32,
    pub loops: u16,
    pub limit: f32,
    pub chain: Vec<i32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PmdSkin {
    pub name: String,
    /// 0 is the base skin, 1..=4 the facial panels.
    pub kind: u8,
    pub vertices: Vec<PmdSkinVertex>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PmdSkinVertex {
    /// Vertex index for the base skin, index into the base skin otherwise.
    pub index: u32,
    pub offset: Vec3,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PmdSkinDisplay {
    pub skin: i32,
    pub name_en: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PmdBoneGroup {
    pub name: String,
    pub name_en: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PmdRigid {
    pub name: String,
    pub bone: i32,
    pub group: u8,
    pub collision_mask: u16,
    pub shape: u8,
    pub size: Vec3,
    /// Relative to the attached bone.
    pub position: Vec3,
    pub rotation: Vec3,
    pub mass: f32,
    pub linear_damping: f32,
    pub angular_damping: f32,
    pub restitution: f32,
    pub friction: f32,
    pub physics: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PmdJoint {
    pub name: String,
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

/// Default shared toon names used when the toon block is missing.
pub fn default_toon_names() -> Vec<String> {
    (1..=TOON_COUNT).map(|i| format!("toon{:02}.bmp", i)).collect()
}

impl PmdModel {
    /// Reads everything after the magic and version.
    pub(crate) fn read_body<R: Read>(r: &mut BinaryReader<R>) -> Result<PmdModel> {
        let mut model = PmdModel {
            name: r.read_fixed_text(NAME)?,
            comment: r.read_fixed_text(COMMENT)?,
            ..PmdModel::default()
        };

        let n = r.read_u32()?;
        model.vertices = (0..n)
            .map(|_| -> Result<PmdVertex> {
                Ok(PmdVertex {
                    position: r.read_vec3()?,
                    normal: r.read_vec3()?,
                    uv: r.read_vec2()?,
                    bones: [r.read_u16_index()?, r.read_u16_index()?],
                    weight: r.read_u8()?,
                    edge_flag: r.read_u8()?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let n = r.read_u32()?;
        model.indices = (0..n)
            .map(|_| -> Result<i32> { Ok(i32::from(r.read_u16()?)) })
            .collect::<Result<Vec<_>>>()?;

        let n = r.read_u32()?;
        model.materials = (0..n)
            .map(|_| read_material(r))
            .collect::<Result<Vec<_>>>()?;

        let n = r.read_u16()?;
        model.bones = (0..n)
            .map(|_| -> Result<PmdBone> {
                Ok(PmdBone {
                    name: r.read_fixed_text(NAME)?,
                    name_en: String::new(),
                    parent: r.read_u16_index()?,
                    tail: r.read_u16_index()?,
                    kind: r.read_u8()?,
                    kind_target: r.read_u16_index()?,
                    position: r.read_vec3()?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let n = r.read_u16()?;
        model.iks = (0..n)
            .map(|_| -> Result<PmdIk> {
                let target = r.read_u16_index()?;
                let effector = r.read_u16_index()?;
                let links = r.read_u8()?;
                let loops = r.read_u16()?;
                let limit = r.read_f32()?;
                let chain = (0..links)
                    .map(|_| r.read_u16_index())
                    .collect::<Result<Vec<_>>>()?;
                Ok(PmdIk {
                    target,
                    effector,
                    loops,
                    limit,
                    chain,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let n = r.read_u16()?;
        model.skins = (0..n)
            .map(|_| -> Result<PmdSkin> {
                let name = r.read_fixed_text(NAME)?;
                let count = r.read_u32()?;
                let kind = r.read_u8()?;
                let vertices = (0..count)
                    .map(|_| -> Result<PmdSkinVertex> {
                        Ok(PmdSkinVertex {
                            index: r.read_u32()?,
                            offset: r.read_vec3()?,
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(PmdSkin {
                    name,
                    kind,
                    vertices,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let n = r.read_u8()?;
        model.skin_display = (0..n)
            .map(|_| -> Result<PmdSkinDisplay> {
                Ok(PmdSkinDisplay {
                    skin: r.read_u16_index()?,
                    name_en: String::new(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let n = r.read_u8()?;
        model.bone_groups = (0..n)
            .map(|_| -> Result<PmdBoneGroup> {
                Ok(PmdBoneGroup {
                    name: r.read_fixed_text(GROUP_NAME)?,
                    name_en: String::new(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let n = r.read_u32()?;
        model.bone_display = (0..n)
            .map(|_| -> Result<(i32, u8)> { Ok((r.read_u16_index()?, r.read_u8()?)) })
            .collect::<Result<Vec<_>>>()?;

        debug!(
            vertices = model.vertices.len(),
            bones = model.bones.len(),
            skins = model.skins.len(),
            "read legacy body"
        );

        if r.at_end()? {
            model.toon_names = default_toon_names();
            return Ok(model);
        }
        if r.read_u8()? != 0 {
            model.name_en = r.read_fixed_text(NAME)?;
            model.comment_en = r.read_fixed_text(COMMENT)?;
            for bone in model.bones.iter_mut() {
                bone.name_en = r.read_fixed_text(NAME)?;
            }
            for entry in model.skin_display.iter_mut() {
                entry.name_en = r.read_fixed_text(NAME)?;
            }
            for group in model.bone_groups.iter_mut() {
                group.name_en = r.read_fixed_text(GROUP_NAME)?;
            }
        }

        if r.at_end()? {
            model.toon_names = default_toon_names();
            return Ok(model);
        }
        model.toon_names = (0..TOON_COUNT)
            .map(|_| r.read_fixed_text(TOON_NAME))
            .collect::<Result<Vec<_>>>()?;

        if r.at_end()? {
            return Ok(model);
        }
        let n = r.read_u32()?;
        model.rigids = (0..n)
            .map(|_| read_rigid(r))
            .collect::<Result<Vec<_>>>()?;
        let n = r.read_u32()?;
        model.joints = (0..n)
            .map(|_| read_joint(r))
            .collect::<Result<Vec<_>>>()?;
        Ok(model)
    }
}

fn read_material<R: Read>(r: &mut BinaryReader<R>) -> Result<PmdMaterial> {
    let diffuse = r.read_vec4()?;
    let shininess = r.read_f32()?;
    let specular = r.read_vec3()?;
    let ambient = r.read_vec3()?;
    let toon = r.read_u8_index()?;
    let edge = r.read_u8()? != 0;
    let face_count = r.read_u32()?;
    let packed = r.read_fixed_text(NAME)?;
    let (texture, sphere) = split_texture_name(&packed);
    Ok(PmdMaterial {
        diffuse,
        shininess,
        specular,
        ambient,
        toon,
        edge,
        face_count,
        texture,
        sphere,
    })
}

/// Splits `"tex.bmp*sphere.sph"`. A part with a `.sph`/`.spa` extension is the sphere map.
pub fn split_texture_name(packed: &str) -> (String, String) {
    let mut texture = String::new();
    let mut sphere = String::new();
    for part in packed.split('*') {
        let lower = part.to_lowercase();
        let is_sphere = [".sph", ".spa"]
            .iter()
            .any(|ext| lower.find(ext).map_or(false, |at| at > 0));
        if is_sphere {
            sphere = part.to_owned();
        } else if !part.is_empty() {
            texture = part.to_owned();
        }
    }
    (texture, sphere)
}

fn read_rigid<R: Read>(r: &mut BinaryReader<R>) -> Result<PmdRigid> {
    Ok(PmdRigid {
        name: r.read_fixed_text(NAME)?,
        bone: r.read_u16_index()?,
        group: r.read_u8()?,
        collision_mask: r.read_u16()?,
        shape: r.read_u8()?,
        size: r.read_vec3()?,
        position: r.read_vec3()?,
        rotation: r.read_vec3()?,
        mass: r.read_f32()?,
        linear_damping: r.read_f32()?,
        angular_damping: r.read_f32()?,
        restitution: r.read_f32()?,
        friction: r.read_f32()?,
        physics: r.read_u8()?,
    })
}

fn read_joint<R: Read>(r: &mut BinaryReader<R>) -> Result<PmdJoint> {
    Ok(PmdJoint {
        name: r.read_fixed_text(NAME)?,
        rigid_a: r.read_u32()? as i32,
        rigid_b: r.read_u32()? as i32,
        position: r.read_vec3()?,
        rotation: r.read_vec3()?,
        position_min: r.read_vec3()?,
        position_max: r.read_vec3()?,
        rotation_min: r.read_vec3()?,
        rotation_max: r.read_vec3()?,
        position_spring: r.read_vec3()?,
        rotation_spring: r.read_vec3()?,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::Error;
    use crate::status::{FormatKind, FormatStatus};
    use std::io::Cursor;

    /// Byte builder for hand-made legacy streams.
    #[derive(Default)]
    pub(crate) struct PmdBytes(pub Vec<u8>);

    impl PmdBytes {
        pub fn u8(&mut self, v: u8) -> &mut Self {
            self.0.push(v);
            self
        }
        pub fn u16(&mut self, v: u16) -> &mut Self {
            self.0.extend_from_slice(&v.to_le_bytes());
            self
        }
        pub fn u32(&mut self, v: u32) -> &mut Self {
            self.0.extend_from_slice(&v.to_le_bytes());
            self
        }
        pub fn f32s(&mut self, v: &[f32]) -> &mut Self {
            for x in v {
                self.0.extend_from_slice(&x.to_le_bytes());
            }
            self
        }
        /// ASCII only, NUL padded.
        pub fn text(&mut self, s: &str, width: usize) -> &mut Self {
            let mut b = s.as_bytes().to_vec();
            b.resize(width, 0);
            self.0.extend_from_slice(&b);
            self
        }
    }

    /// One triangle, two bones, one base skin plus one facial skin.
    pub(crate) fn sample_pmd(with_tail: bool) -> Vec<u8> {
        let mut b = PmdBytes::default();
        b.text("Pmd", 3).f32s(&[1.0]).text("sample", 20).text("comment", 256);
        b.u32(3);
        for (i, bones, weight, edge) in [
            (0.0, [0, 0], 100, 1),
            (1.0, [0, 1], 40, 0),
            (2.0, [1, 1], 0, 2),
        ] {
            b.f32s(&[i, 0.0, 0.0, 0.0, 0.0, -1.0, 0.5, 0.5]);
            b.u16(bones[0]).u16(bones[1]).u8(weight).u8(edge);
        }
        b.u32(3).u16(0).u16(1).u16(2);
        b.u32(1)
            .f32s(&[1.0, 1.0, 1.0, 0.98, 5.0, 0.1, 0.1, 0.1, 0.2, 0.2, 0.2])
            .u8(0xFF)
            .u8(1)
            .u32(3)
            .text("skin.png*env.sph", 20);
        b.u16(2);
        b.text("center", 20).u16(0xFFFF).u16(1).u8(1).u16(0xFFFF).f32s(&[0.0, 0.0, 0.0]);
        b.text("tip", 20).u16(0).u16(0xFFFF).u8(7).u16(0xFFFF).f32s(&[0.0, 1.0, 0.0]);
        b.u16(0);
        b.u16(2);
        b.text("base", 20).u32(2).u8(0);
        b.u32(1).f32s(&[1.0, 0.0, 0.0]).u32(2).f32s(&[2.0, 0.0, 0.0]);
        b.text("smile", 20).u32(1).u8(3);
        b.u32(1).f32s(&[0.0, 0.5, 0.0]);
        b.u8(1).u16(1);
        b.u8(1).text("body", 50);
        b.u32(1).u16(1).u8(1);
        if with_tail {
            b.u8(1).text("sample_en", 20).text("comment_en", 256);
            b.text("center_en", 20).text("tip_en", 20);
            b.text("smile_en", 20);
            b.text("body_en", 50);
            for i in 1..=10 {
                b.text(&format!("toon{:02}.bmp", i), 100);
            }
            b.u32(1)
                .text("head", 20)
                .u16(0)
                .u8(1)
                .u16(0xFFFE)
                .u8(0)
                .f32s(&[1.0, 1.0, 1.0, 0.0, 2.0, 0.0, 0.0, 0.0, 0.0])
                .f32s(&[1.0, 0.5, 0.5, 0.0, 0.5])
                .u8(0);
            b.u32(0);
        }
        b.0
    }

    fn read(bytes: Vec<u8>) -> Result<PmdModel> {
        let mut r = BinaryReader::new(Cursor::new(bytes));
        let status = FormatStatus::load(&mut r)?;
        assert_eq!(status.kind, FormatKind::Pmd);
        PmdModel::read_body(&mut r)
    }

    #[test]
    fn reads_body_without_optional_blocks() {
        let model = read(sample_pmd(false)).unwrap();
        assert_eq!(model.name, "sample");
        assert_eq!(model.vertices.len(), 3);
        assert_eq!(model.vertices[1].bones, [0, 1]);
        assert_eq!(model.indices, vec![0, 1, 2]);
        assert_eq!(model.materials[0].toon, -1);
        assert_eq!(model.materials[0].texture, "skin.png");
        assert_eq!(model.materials[0].sphere, "env.sph");
        assert_eq!(model.bones[0].parent, -1);
        assert_eq!(model.skins.len(), 2);
        assert_eq!(model.toon_names, default_toon_names());
        assert!(model.rigids.is_empty());
    }

    #[test]
    fn reads_english_toon_and_physics_blocks() {
        let model = read(sample_pmd(true)).unwrap();
        assert_eq!(model.name_en, "sample_en");
        assert_eq!(model.bones[1].name_en, "tip_en");
        assert_eq!(model.skin_display[0].name_en, "smile_en");
        assert_eq!(model.bone_groups[0].name_en, "body_en");
        assert_eq!(model.toon_names[9], "toon10.bmp");
        assert_eq!(model.rigids.len(), 1);
        assert_eq!(model.rigids[0].collision_mask, 0xFFFE);
    }

    #[test]
    fn truncation_inside_a_block_is_malformed() {
        let mut bytes = sample_pmd(true);
        bytes.truncate(bytes.len() - 10);
        assert!(matches!(read(bytes), Err(Error::MalformedInput { .. })));
    }

    #[test]
    fn texture_name_splitting() {
        assert_eq!(
            split_texture_name("a.bmp*b.spa"),
            ("a.bmp".to_owned(), "b.spa".to_owned())
        );
        assert_eq!(
            split_texture_name("env.SPH"),
            (String::new(), "env.SPH".to_owned())
        );
        assert_eq!(
            split_texture_name("face.png"),
            ("face.png".to_owned(), String::new())
        );
    }
}
