//! # PMX reading module.
//! Reading is split into stages so that sections can only be consumed in file order.
//!
//! |Current stage|product|Next stage|
//! |-------------|-------|----------|
//! |[`ModelInfoStage`]|[`ModelInfo`]|[`VerticesStage`]|
//! |[`VerticesStage`]|[`Vec<Vertex>`]|[`FacesStage`]|
//! |[`FacesStage`]|`Vec<i32>`|[`TexturesStage`]|
//! |[`TexturesStage`]|`Vec<String>`|[`MaterialsStage`]|
//! |[`MaterialsStage`]|[`Vec<Material>`]|[`BonesStage`]|
//! |[`BonesStage`]|[`Vec<Bone>`]|[`MorphsStage`]|
//! |[`MorphsStage`]|[`Vec<Morph>`]|[`FrameStage`]|
//! |[`FrameStage`]|[`Vec<Frame>`]|[`RigidStage`]|
//! |[`RigidStage`]|[`Vec<Rigid>`]|[`JointStage`]|
//! |[`JointStage`]|[`Vec<Joint>`]|[`Option<SoftBodyStage>`]|
//! |[`SoftBodyStage`]|[`Vec<SoftBody>`]|There are no reader|
//!
//! Most callers want [`load_model`], which also accepts legacy PMD files.

use crate::binary_reader::BinaryReader;
use crate::error::{Error, Result};
use crate::status::{FormatKind, FormatStatus};
use crate::types::{
    AeroModel, Bone, BoneFlags, BoneOffset, BoneTail, Frame, FrameItem, GroupOffset, Ik, IkLink,
    ImpulseOffset, Inherit, Joint, JointKind, LocalAxis, Material, MaterialFlags, MaterialOffset,
    MaterialOperation, Model, ModelInfo, Morph, MorphOffsets, Panel, Rigid, RigidPhysics,
    RigidShape, SoftBody, SoftBodyAnchor, SoftBodyFlags, SoftBodyShape, SphereMode, ToonMode,
    UvOffset, Vertex, VertexOffset, VertexWeight,
};
use crate::{legacy, pmd};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::debug;

/// Reads a PMX or PMD file. Legacy files are upgraded on the fly.
pub fn load_model<P: AsRef<Path>>(path: P) -> Result<Model> {
    read_model(File::open(path)?)
}

pub fn read_model<R: Read>(inner: R) -> Result<Model> {
    let mut reader = BinaryReader::new(inner);
    let status = FormatStatus::load(&mut reader)?;
    match status.kind {
        FormatKind::Pmd => {
            let pmd = pmd::PmdModel::read_body(&mut reader)?;
            legacy::upgrade(&pmd)
        }
        FormatKind::Pmx => ModelInfoStage(ReaderInner {
            inner: reader,
            status,
        })
        .read_all(),
    }
}

pub struct ModelInfoStage<R>(ReaderInner<R>);

impl ModelInfoStage<File> {
    /// the start of reader module.
    /// # Errors
    /// * the file cannot be opened
    /// * the magic is not `PMX `, or the version is not 2.0/2.1
    pub fn open<P: AsRef<Path>>(path: P) -> Result<ModelInfoStage<File>> {
        ModelInfoStage::new(File::open(path)?)
    }
}

impl<R: Read> ModelInfoStage<R> {
    pub fn new(inner: R) -> Result<ModelInfoStage<R>> {
        let mut inner = BinaryReader::new(inner);
        let status = FormatStatus::load(&mut inner)?;
        if status.kind != FormatKind::Pmx {
            return Err(Error::malformed(
                "legacy PMD stream given to the PMX stage reader",
            ));
        }
        Ok(ModelInfoStage(ReaderInner { inner, status }))
    }

    pub fn status(&self) -> &FormatStatus {
        &self.0.status
    }

    pub fn read(mut self) -> Result<(ModelInfo, VerticesStage<R>)> {
        Ok((
            ModelInfo {
                name: self.0.read_text_buf()?,
                name_en: self.0.read_text_buf()?,
                comment: self.0.read_text_buf()?,
                comment_en: self.0.read_text_buf()?,
            },
            VerticesStage(self.0),
        ))
    }

    /// Runs every stage and assembles the model.
    pub fn read_all(self) -> Result<Model> {
        let status = self.0.status.clone();
        let (info, ns) = self.read()?;
        let (vertices, ns) = ns.read()?;
        let (faces, ns) = ns.read()?;
        let (textures, ns) = ns.read()?;
        let (materials, ns) = ns.read()?;
        let (bones, ns) = ns.read()?;
        let (morphs, ns) = ns.read()?;
        let (frames, ns) = ns.read()?;
        let (rigids, ns) = ns.read()?;
        let (joints, ns) = ns.read()?;
        let soft_bodies = match ns {
            Some(stage) => stage.read()?,
            None => vec![],
        };
        Ok(Model {
            status,
            info,
            vertices,
            faces,
            textures,
            materials,
            bones,
            morphs,
            frames,
            rigids,
            joints,
            soft_bodies,
        })
    }
}

pub struct VerticesStage<R>(ReaderInner<R>);
impl<R: Read> VerticesStage<R> {
    pub fn read(mut self) -> Result<(Vec<Vertex>, FacesStage<R>)> {
        let n = self.0.inner.read_count("vertex")?;
        let vertices = (0..n)
            .map(|_| self.read_pmx_vertex())
            .collect::<Result<Vec<_>>>()?;
        debug!(count = vertices.len(), "read vertices");
        Ok((vertices, FacesStage(self.0)))
    }

    fn read_pmx_vertex(&mut self) -> Result<Vertex> {
        let position = self.0.inner.read_vec3()?;
        let normal = self.0.inner.read_vec3()?;
        let uv = self.0.inner.read_vec2()?;
        let extra_uv = (0..self.0.status.additional_uv)
            .map(|_| self.0.inner.read_vec4())
            .collect::<Result<Vec<_>>>()?;
        let weight_type = self.0.inner.read_u8()?;
        let weight = match weight_type {
            0 => VertexWeight::BDEF1(self.0.read_bone_index()?),
            1 => VertexWeight::BDEF2 {
                bones: [self.0.read_bone_index()?, self.0.read_bone_index()?],
                weight: self.0.inner.read_f32()?,
            },
            2 | 4 => {
                let bones = [
                    self.0.read_bone_index()?,
                    self.0.read_bone_index()?,
                    self.0.read_bone_index()?,
                    self.0.read_bone_index()?,
                ];
                let weights = self.0.inner.read_vec4()?;
                if weight_type == 2 {
                    VertexWeight::BDEF4 { bones, weights }
                } else {
                    VertexWeight::QDEF { bones, weights }
                }
            }
            3 => VertexWeight::SDEF {
                bones: [self.0.read_bone_index()?, self.0.read_bone_index()?],
                weight: self.0.inner.read_f32()?,
                c: self.0.inner.read_vec3()?,
                r0: self.0.inner.read_vec3()?,
                r1: self.0.inner.read_vec3()?,
            },
            x => return Err(Error::malformed(format!("unknown weight type {}", x))),
        };
        Ok(Vertex {
            position,
            normal,
            uv,
            extra_uv,
            weight,
            edge_scale: self.0.inner.read_f32()?,
        })
    }
}

pub struct FacesStage<R>(ReaderInner<R>);
impl<R: Read> FacesStage<R> {
    /// Read the flat triangle index list. Each index is read on its own.
    pub fn read(mut self) -> Result<(Vec<i32>, TexturesStage<R>)> {
        let n = self.0.inner.read_count("face index")?;
        if n % 3 != 0 {
            return Err(Error::malformed(format!(
                "face index count {} is not a multiple of 3",
                n
            )));
        }
        let faces = (0..n)
            .map(|_| self.0.read_vertex_index())
            .collect::<Result<Vec<_>>>()?;
        debug!(triangles = faces.len() / 3, "read faces");
        Ok((faces, TexturesStage(self.0)))
    }
}

pub struct TexturesStage<R>(ReaderInner<R>);
impl<R: Read> TexturesStage<R> {
    /// Read texture paths relative to the model file.
    ///
    /// # Note
    /// paths keep the `\` separators they were written with
    pub fn read(mut self) -> Result<(Vec<String>, MaterialsStage<R>)> {
        let n = self.0.inner.read_count("texture")?;
        let textures = (0..n)
            .map(|_| self.0.read_text_buf())
            .collect::<Result<Vec<_>>>()?;
        Ok((textures, MaterialsStage(self.0)))
    }
}

pub struct MaterialsStage<R>(ReaderInner<R>);
impl<R: Read> MaterialsStage<R> {
    pub fn read(mut self) -> Result<(Vec<Material>, BonesStage<R>)> {
        let n = self.0.inner.read_count("material")?;
        let materials = (0..n)
            .map(|_| self.read_pmx_material())
            .collect::<Result<Vec<_>>>()?;
        debug!(count = materials.len(), "read materials");
        Ok((materials, BonesStage(self.0)))
    }

    fn read_pmx_material(&mut self) -> Result<Material> {
        Ok(Material {
            name: self.0.read_text_buf()?,
            name_en: self.0.read_text_buf()?,
            diffuse: self.0.inner.read_vec4()?,
            specular: self.0.inner.read_vec3()?,
            specular_power: self.0.inner.read_f32()?,
            ambient: self.0.inner.read_vec3()?,
            flags: MaterialFlags::from_bits_truncate(self.0.inner.read_u8()?),
            edge_color: self.0.inner.read_vec4()?,
            edge_size: self.0.inner.read_f32()?,
            texture: self.0.read_texture_index()?,
            sphere: self.0.read_texture_index()?,
            sphere_mode: SphereMode::try_from(self.0.inner.read_u8()?)?,
            toon: if self.0.inner.read_bool("system toon")? {
                ToonMode::System(self.0.inner.read_u8()?)
            } else {
                ToonMode::Texture(self.0.read_texture_index()?)
            },
            memo: self.0.read_text_buf()?,
            face_count: self.0.inner.read_i32()?,
        })
    }
}

pub struct BonesStage<R>(ReaderInner<R>);
impl<R: Read> BonesStage<R> {
    /// Optional payloads are consumed in declaration order, gated by the flag word.
    pub fn read(mut self) -> Result<(Vec<Bone>, MorphsStage<R>)> {
        let n = self.0.inner.read_count("bone")?;
        let bones = (0..n)
            .map(|_| self.read_pmx_bone())
            .collect::<Result<Vec<_>>>()?;
        debug!(count = bones.len(), "read bones");
        Ok((bones, MorphsStage(self.0)))
    }

    fn read_pmx_bone(&mut self) -> Result<Bone> {
        let name = self.0.read_text_buf()?;
        let name_en = self.0.read_text_buf()?;
        let position = self.0.inner.read_vec3()?;
        let parent = self.0.read_bone_index()?;
        let level = self.0.inner.read_i32()?;
        let flags = BoneFlags::from_bits_truncate(self.0.inner.read_u16()?);
        let tail = if flags.contains(BoneFlags::CONNECT_TO_BONE) {
            BoneTail::Bone(self.0.read_bone_index()?)
        } else {
            BoneTail::Offset(self.0.inner.read_vec3()?)
        };
        let rotate = flags.contains(BoneFlags::INHERIT_ROTATION);
        let translate = flags.contains(BoneFlags::INHERIT_TRANSLATION);
        let inherit = if rotate || translate {
            let parent = self.0.read_bone_index()?;
            let power = self.0.inner.read_f32()?;
            Inherit::from_parts(rotate, translate, parent, power)
        } else {
            Inherit::None
        };
        let fixed_axis = if flags.contains(BoneFlags::FIXED_AXIS) {
            Some(self.0.inner.read_vec3()?)
        } else {
            None
        };
        let local_axis = if flags.contains(BoneFlags::LOCAL_AXIS) {
            Some(LocalAxis {
                x: self.0.inner.read_vec3()?,
                z: self.0.inner.read_vec3()?,
            })
        } else {
            None
        };
        let external_parent = if flags.contains(BoneFlags::EXTERNAL_PARENT) {
            Some(self.0.inner.read_i32()?)
        } else {
            None
        };
        let ik = if flags.contains(BoneFlags::IK) {
            let target = self.0.read_bone_index()?;
            let loops = self.0.inner.read_i32()?;
            let limit = self.0.inner.read_f32()?;
            let n = self.0.inner.read_count("IK link")?;
            let links = (0..n)
                .map(|_| self.read_iklink())
                .collect::<Result<Vec<_>>>()?;
            Some(Ik {
                target,
                loops,
                limit,
                links,
            })
        } else {
            None
        };
        Ok(Bone {
            name,
            name_en,
            position,
            parent,
            level,
            tail,
            rotatable: flags.contains(BoneFlags::ROTATABLE),
            movable: flags.contains(BoneFlags::MOVABLE),
            visible: flags.contains(BoneFlags::VISIBLE),
            operational: flags.contains(BoneFlags::OPERATIONAL),
            inherit_local: flags.contains(BoneFlags::INHERIT_LOCAL),
            inherit,
            fixed_axis,
            local_axis,
            after_physics: flags.contains(BoneFlags::AFTER_PHYSICS),
            external_parent,
            ik,
        })
    }

    fn read_iklink(&mut self) -> Result<IkLink> {
        let bone = self.0.read_bone_index()?;
        let limit = if self.0.inner.read_bool("IK angle limit")? {
            Some((self.0.inner.read_vec3()?, self.0.inner.read_vec3()?))
        } else {
            None
        };
        Ok(IkLink { bone, limit })
    }
}

pub struct MorphsStage<R>(ReaderInner<R>);
impl<R: Read> MorphsStage<R> {
    pub fn read(mut self) -> Result<(Vec<Morph>, FrameStage<R>)> {
        let n = self.0.inner.read_count("morph")?;
        let morphs = (0..n)
            .map(|_| self.read_pmx_morph())
            .collect::<Result<Vec<_>>>()?;
        debug!(count = morphs.len(), "read morphs");
        Ok((morphs, FrameStage(self.0)))
    }

    fn read_pmx_morph(&mut self) -> Result<Morph> {
        let name = self.0.read_text_buf()?;
        let name_en = self.0.read_text_buf()?;
        let panel = Panel::try_from(self.0.inner.read_u8()?)?;
        let kind = self.0.inner.read_u8()?;
        let n = self.0.inner.read_count("morph offset")?;
        // the parent's kind picks the offset layout
        let offsets = match kind {
            0 => MorphOffsets::Group(self.read_n(n, Self::read_group_offset)?),
            1 => MorphOffsets::Vertex(self.read_n(n, Self::read_vertex_offset)?),
            2 => MorphOffsets::Bone(self.read_n(n, Self::read_bone_offset)?),
            3..=7 => MorphOffsets::Uv {
                channel: kind - 3,
                offsets: self.read_n(n, Self::read_uv_offset)?,
            },
            8 => MorphOffsets::Material(self.read_n(n, Self::read_material_offset)?),
            9 => MorphOffsets::Flip(self.read_n(n, Self::read_group_offset)?),
            10 => MorphOffsets::Impulse(self.read_n(n, Self::read_impulse_offset)?),
            x => return Err(Error::malformed(format!("unknown morph kind {}", x))),
        };
        Ok(Morph {
            name,
            name_en,
            panel,
            offsets,
        })
    }

    fn read_n<T>(&mut self, n: usize, f: fn(&mut Self) -> Result<T>) -> Result<Vec<T>> {
        (0..n).map(|_| f(self)).collect()
    }

    fn read_vertex_offset(&mut self) -> Result<VertexOffset> {
        Ok(VertexOffset {
            vertex: self.0.read_vertex_index()?,
            offset: self.0.inner.read_vec3()?,
        })
    }

    fn read_uv_offset(&mut self) -> Result<UvOffset> {
        Ok(UvOffset {
            vertex: self.0.read_vertex_index()?,
            offset: self.0.inner.read_vec4()?,
        })
    }

    fn read_bone_offset(&mut self) -> Result<BoneOffset> {
        Ok(BoneOffset {
            bone: self.0.read_bone_index()?,
            translation: self.0.inner.read_vec3()?,
            rotation: self.0.inner.read_vec4()?,
        })
    }

    fn read_material_offset(&mut self) -> Result<MaterialOffset> {
        Ok(MaterialOffset {
            material: self.0.read_material_index()?,
            operation: match self.0.inner.read_u8()? {
                0 => MaterialOperation::Multiply,
                1 => MaterialOperation::Add,
                x => {
                    return Err(Error::malformed(format!(
                        "unknown material morph operation {}",
                        x
                    )))
                }
            },
            diffuse: self.0.inner.read_vec4()?,
            specular: self.0.inner.read_vec3()?,
            specular_power: self.0.inner.read_f32()?,
            ambient: self.0.inner.read_vec3()?,
            edge_color: self.0.inner.read_vec4()?,
            edge_size: self.0.inner.read_f32()?,
            texture_tint: self.0.inner.read_vec4()?,
            sphere_tint: self.0.inner.read_vec4()?,
            toon_tint: self.0.inner.read_vec4()?,
        })
    }

    fn read_group_offset(&mut self) -> Result<GroupOffset> {
        Ok(GroupOffset {
            morph: self.0.read_morph_index()?,
            factor: self.0.inner.read_f32()?,
        })
    }

    fn read_impulse_offset(&mut self) -> Result<ImpulseOffset> {
        Ok(ImpulseOffset {
            rigid: self.0.read_rigid_index()?,
            local: self.0.inner.read_bool("impulse local")?,
            velocity: self.0.inner.read_vec3()?,
            torque: self.0.inner.read_vec3()?,
        })
    }
}

pub struct FrameStage<R>(ReaderInner<R>);

impl<R: Read> FrameStage<R> {
    /// read display frames
    /// # Errors
    /// * if an item has a target other than bone or morph
    pub fn read(mut self) -> Result<(Vec<Frame>, RigidStage<R>)> {
        let n = self.0.inner.read_count("display frame")?;
        let frames = (0..n)
            .map(|_| self.read_frame())
            .collect::<Result<Vec<_>>>()?;
        Ok((frames, RigidStage(self.0)))
    }

    fn read_frame(&mut self) -> Result<Frame> {
        let name = self.0.read_text_buf()?;
        let name_en = self.0.read_text_buf()?;
        let special = self.0.inner.read_bool("special frame")?;
        let n = self.0.inner.read_count("frame item")?;
        let items = (0..n)
            .map(|_| -> Result<FrameItem> {
                match self.0.inner.read_u8()? {
                    0 => Ok(FrameItem::Bone(self.0.read_bone_index()?)),
                    1 => Ok(FrameItem::Morph(self.0.read_morph_index()?)),
                    x => Err(Error::malformed(format!("invalid frame target {}", x))),
                }
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Frame {
            name,
            name_en,
            special,
            items,
        })
    }
}

pub struct RigidStage<R>(ReaderInner<R>);
impl<R: Read> RigidStage<R> {
    pub fn read(mut self) -> Result<(Vec<Rigid>, JointStage<R>)> {
        let n = self.0.inner.read_count("rigid body")?;
        let rigids = (0..n)
            .map(|_| self.read_rigid())
            .collect::<Result<Vec<_>>>()?;
        debug!(count = rigids.len(), "read rigid bodies");
        Ok((rigids, JointStage(self.0)))
    }

    fn read_rigid(&mut self) -> Result<Rigid> {
        Ok(Rigid {
            name: self.0.read_text_buf()?,
            name_en: self.0.read_text_buf()?,
            bone: self.0.read_bone_index()?,
            group: self.0.inner.read_u8()?,
            collision_mask: self.0.inner.read_u16()?,
            shape: RigidShape::try_from(self.0.inner.read_u8()?)?,
            size: self.0.inner.read_vec3()?,
            position: self.0.inner.read_vec3()?,
            rotation: self.0.inner.read_vec3()?,
            mass: self.0.inner.read_f32()?,
            linear_damping: self.0.inner.read_f32()?,
            angular_damping: self.0.inner.read_f32()?,
            restitution: self.0.inner.read_f32()?,
            friction: self.0.inner.read_f32()?,
            physics: RigidPhysics::try_from(self.0.inner.read_u8()?)?,
        })
    }
}

pub struct JointStage<R>(ReaderInner<R>);

impl<R: Read> JointStage<R> {
    /// The soft body stage only exists for 2.1 files.
    pub fn read(mut self) -> Result<(Vec<Joint>, Option<SoftBodyStage<R>>)> {
        let n = self.0.inner.read_count("joint")?;
        let joints = (0..n)
            .map(|_| self.read_joint())
            .collect::<Result<Vec<_>>>()?;
        debug!(count = joints.len(), "read joints");
        let next = if self.0.status.version > 2.0 {
            Some(SoftBodyStage(self.0))
        } else {
            None
        };
        Ok((joints, next))
    }

    fn read_joint(&mut self) -> Result<Joint> {
        Ok(Joint {
            name: self.0.read_text_buf()?,
            name_en: self.0.read_text_buf()?,
            kind: JointKind::try_from(self.0.inner.read_u8()?)?,
            rigid_a: self.0.read_rigid_index()?,
            rigid_b: self.0.read_rigid_index()?,
            position: self.0.inner.read_vec3()?,
            rotation: self.0.inner.read_vec3()?,
            position_min: self.0.inner.read_vec3()?,
            position_max: self.0.inner.read_vec3()?,
            rotation_min: self.0.inner.read_vec3()?,
            rotation_max: self.0.inner.read_vec3()?,
            position_spring: self.0.inner.read_vec3()?,
            rotation_spring: self.0.inner.read_vec3()?,
        })
    }
}

pub struct SoftBodyStage<R>(ReaderInner<R>);

impl<R: Read> SoftBodyStage<R> {
    pub fn read(mut self) -> Result<Vec<SoftBody>> {
        let n = self.0.inner.read_count("soft body")?;
        (0..n).map(|_| self.read_soft_body()).collect()
    }

    fn read_soft_body(&mut self) -> Result<SoftBody> {
        let name = self.0.read_text_buf()?;
        let name_en = self.0.read_text_buf()?;
        let shape = match self.0.inner.read_u8()? {
            0 => SoftBodyShape::TriMesh,
            1 => SoftBodyShape::Rope,
            x => return Err(Error::malformed(format!("invalid soft body shape {}", x))),
        };
        let material = self.0.read_material_index()?;
        let group = self.0.inner.read_u8()?;
        let collision_mask = self.0.inner.read_u16()?;
        let flags = SoftBodyFlags::from_bits_truncate(self.0.inner.read_u8()?);
        let b_link_distance = self.0.inner.read_i32()?;
        let clusters = self.0.inner.read_i32()?;
        let mass = self.0.inner.read_f32()?;
        let margin = self.0.inner.read_f32()?;
        let aero_model = AeroModel::try_from(self.0.inner.read_i32()?)?;
        let mut config = [0.0; 12];
        for c in config.iter_mut() {
            *c = self.0.inner.read_f32()?;
        }
        let mut cluster = [0.0; 6];
        for c in cluster.iter_mut() {
            *c = self.0.inner.read_f32()?;
        }
        let mut iteration = [0; 4];
        for i in iteration.iter_mut() {
            *i = self.0.inner.read_i32()?;
        }
        let mut stiffness = [0.0; 3];
        for s in stiffness.iter_mut() {
            *s = self.0.inner.read_f32()?;
        }
        let n = self.0.inner.read_count("soft body anchor")?;
        let anchors = (0..n)
            .map(|_| -> Result<SoftBodyAnchor> {
                Ok(SoftBodyAnchor {
                    rigid: self.0.read_rigid_index()?,
                    vertex: self.0.read_vertex_index()?,
                    near_mode: self.0.inner.read_bool("anchor near mode")?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let n = self.0.inner.read_count("pinned vertex")?;
        let pins = (0..n)
            .map(|_| self.0.read_vertex_index())
            .collect::<Result<Vec<_>>>()?;
        Ok(SoftBody {
            name,
            name_en,
            shape,
            material,
            group,
            collision_mask,
            flags,
            b_link_distance,
            clusters,
            mass,
            margin,
            aero_model,
            config,
            cluster,
            iteration,
            stiffness,
            anchors,
            pins,
        })
    }
}

struct ReaderInner<R> {
    inner: BinaryReader<R>,
    status: FormatStatus,
}

impl<R: Read> ReaderInner<R> {
    fn read_vertex_index(&mut self) -> Result<i32> {
        self.inner.read_vertex_index(self.status.vertex_index)
    }

    fn read_texture_index(&mut self) -> Result<i32> {
        self.inner.read_sized(self.status.texture_index)
    }

    fn read_material_index(&mut self) -> Result<i32> {
        self.inner.read_sized(self.status.material_index)
    }

    fn read_bone_index(&mut self) -> Result<i32> {
        self.inner.read_sized(self.status.bone_index)
    }

    fn read_morph_index(&mut self) -> Result<i32> {
        self.inner.read_sized(self.status.morph_index)
    }

    fn read_rigid_index(&mut self) -> Result<i32> {
        self.inner.read_sized(self.status.rigid_index)
    }

    fn read_text_buf(&mut self) -> Result<String> {
        self.inner.read_text_buf(self.status.encode)
    }
}
