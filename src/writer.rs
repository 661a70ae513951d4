//! PMX writing module.

use crate::binary_writer::BinaryWriter;
use crate::error::{Error, Result};
use crate::status::FormatStatus;
use crate::types::{
    Bone, BoneTail, Encode, Frame, FrameItem, Joint, Material, MaterialOperation, Model,
    ModelInfo, Morph, MorphOffsets, Rigid, SoftBody, SoftBodyShape, ToonMode, Vertex,
    VertexWeight,
};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tracing::debug;

/// PMX writer
///
/// This holds all ingredients e.g. Vertex, Face, Texture Path.
///
/// When write is called every index width is derived from the collected data,
/// then all data is written and dropped.
/// ```rust
/// use pmx_bridge::types::{Encode, ModelInfo};
/// let mut writer = pmx_bridge::writer::Writer::new(Vec::new(), Encode::Utf16Le);
/// writer.set_model_info(&ModelInfo {
///     name: "PMXモデル名".to_owned(),
///     name_en: "A PMX Model Name".to_owned(),
///     comment: "何かコメントをここに".to_owned(),
///     comment_en: "Exported by pmx_bridge".to_owned(),
/// });
/// let bytes = writer.write().unwrap();
/// assert_eq!(&bytes[..4], b"PMX ");
/// ```
pub struct Writer<W: Write> {
    inner: BinaryWriter<W>,
    additional_uvs: Option<u8>,
    model: Model,
}

impl Writer<File> {
    ///
    /// # Arguments
    ///
    /// * `path`: where to write
    /// * `encode`: UTF-16LE keeps compatibility with the reference editor.
    ///
    /// # Errors
    ///  if failed to create file with given path.
    pub fn begin_writer<P: AsRef<Path>>(path: P, encode: Encode) -> Result<Writer<File>> {
        Ok(Writer::new(File::create(path)?, encode))
    }
}

impl<W: Write> Writer<W> {
    pub fn new(inner: W, encode: Encode) -> Writer<W> {
        Writer {
            inner: BinaryWriter::new(inner, encode),
            additional_uvs: None,
            model: Model::default(),
        }
    }

    pub fn set_model_info(&mut self, model_info: &ModelInfo) {
        self.model.info = model_info.clone();
    }

    ///
    /// # Arguments
    ///
    /// * `count`: 0..=4, the minimum written; vertices carrying more channels widen it
    ///
    /// # Errors
    /// if additional uv count exceed 4.
    pub fn set_additional_uv(&mut self, count: u8) -> Result<()> {
        if count > 4 {
            Err(Error::malformed(format!(
                "{} additional UV channels, at most 4 allowed",
                count
            )))
        } else {
            self.additional_uvs = Some(count);
            Ok(())
        }
    }

    /// Forces the 2.1 header even when no record needs it.
    pub fn request_v21(&mut self) {
        self.model.status.version = 2.1;
    }

    pub fn add_vertices(&mut self, vertices: &[Vertex]) {
        self.model.vertices.extend_from_slice(vertices);
    }

    pub fn add_faces(&mut self, faces: &[i32]) {
        self.model.faces.extend_from_slice(faces);
    }

    pub fn add_textures(&mut self, textures: &[String]) {
        self.model.textures.extend_from_slice(textures);
    }

    pub fn add_materials(&mut self, materials: &[Material]) {
        self.model.materials.extend_from_slice(materials);
    }

    pub fn add_morphs(&mut self, morphs: &[Morph]) {
        self.model.morphs.extend_from_slice(morphs);
    }

    pub fn add_bones(&mut self, bones: &[Bone]) {
        self.model.bones.extend_from_slice(bones);
    }

    pub fn add_frames(&mut self, frames: &[Frame]) {
        self.model.frames.extend_from_slice(frames);
    }

    pub fn add_rigid_bodies(&mut self, rigid_bodies: &[Rigid]) {
        self.model.rigids.extend_from_slice(rigid_bodies);
    }

    pub fn add_joints(&mut self, joints: &[Joint]) {
        self.model.joints.extend_from_slice(joints);
    }

    pub fn add_soft_bodies(&mut self, soft_bodies: &[SoftBody]) {
        self.model.soft_bodies.extend_from_slice(soft_bodies);
    }

    /// Writes everything and hands back the underlying sink.
    pub fn write(self) -> Result<W> {
        let model = self.model;
        if model.faces.len() % 3 != 0 {
            return Err(Error::malformed(format!(
                "face index count {} is not a multiple of 3",
                model.faces.len()
            )));
        }
        if let Some(n) = model.vertices.iter().map(|v| v.extra_uv.len()).max() {
            if n > 4 {
                return Err(Error::malformed(format!(
                    "vertex carries {} additional UV channels, at most 4 allowed",
                    n
                )));
            }
        }
        let mut status = FormatStatus::for_model(&model, self.inner.encode());
        // a requested count may widen the header, never drop channels in use
        if let Some(n) = self.additional_uvs {
            status.additional_uv = status.additional_uv.max(n);
        }
        let mut w = WriterInner {
            inner: self.inner,
            status,
        };
        w.status.save(&mut w.inner)?;

        w.write_text(&model.info.name)?;
        w.write_text(&model.info.name_en)?;
        w.write_text(&model.info.comment)?;
        w.write_text(&model.info.comment_en)?;

        w.inner.write_count(model.vertices.len(), "vertex")?;
        for vertex in &model.vertices {
            w.write_pmx_vertex(vertex)?;
        }

        w.inner.write_count(model.faces.len(), "face index")?;
        for index in &model.faces {
            w.write_vertex_index(*index)?;
        }

        w.inner.write_count(model.textures.len(), "texture")?;
        for name in &model.textures {
            w.write_text(name)?;
        }

        w.inner.write_count(model.materials.len(), "material")?;
        for material in &model.materials {
            w.write_pmx_material(material)?;
        }

        w.inner.write_count(model.bones.len(), "bone")?;
        for bone in &model.bones {
            w.write_bone(bone)?;
        }

        w.inner.write_count(model.morphs.len(), "morph")?;
        for morph in &model.morphs {
            w.write_pmx_morph(morph)?;
        }

        w.inner.write_count(model.frames.len(), "display frame")?;
        for frame in &model.frames {
            w.write_pmx_frame(frame)?;
        }

        w.inner.write_count(model.rigids.len(), "rigid body")?;
        for rigid in &model.rigids {
            w.write_pmx_rigid(rigid)?;
        }

        w.inner.write_count(model.joints.len(), "joint")?;
        for joint in &model.joints {
            w.write_pmx_joint(joint)?;
        }
        // 2.1 extended section.
        if w.status.version > 2.0 {
            w.inner.write_count(model.soft_bodies.len(), "soft body")?;
            for soft_body in &model.soft_bodies {
                w.write_pmx_soft_body(soft_body)?;
            }
        }
        debug!(
            version = w.status.version,
            vertices = model.vertices.len(),
            bones = model.bones.len(),
            morphs = model.morphs.len(),
            "wrote model"
        );
        w.inner.finish()
    }
}

/// Serializes a whole model. Index widths are recomputed from the collections.
pub fn write_model<W: Write>(inner: W, model: &Model, encode: Encode) -> Result<W> {
    let mut writer = Writer::new(inner, encode);
    writer.model = model.clone();
    if model.status.additional_uv > 0 {
        writer.set_additional_uv(model.status.additional_uv)?;
    }
    writer.write()
}

/// Serializes into memory first so a failure leaves no partial file behind.
pub fn save_model<P: AsRef<Path>>(path: P, model: &Model, encode: Encode) -> Result<()> {
    let bytes = write_model(Vec::new(), model, encode)?;
    std::fs::write(path, bytes)?;
    Ok(())
}

struct WriterInner<W: Write> {
    inner: BinaryWriter<W>,
    status: FormatStatus,
}

impl<W: Write> WriterInner<W> {
    fn write_text(&mut self, text: &str) -> Result<()> {
        self.inner.write_text_buf(text)
    }

    fn write_vertex_index(&mut self, value: i32) -> Result<()> {
        self.inner.write_vertex_index(self.status.vertex_index, value)
    }

    fn write_texture_index(&mut self, value: i32) -> Result<()> {
        self.inner
            .write_sized(self.status.texture_index, "texture", value)
    }

    fn write_material_index(&mut self, value: i32) -> Result<()> {
        self.inner
            .write_sized(self.status.material_index, "material", value)
    }

    fn write_bone_index(&mut self, value: i32) -> Result<()> {
        self.inner.write_sized(self.status.bone_index, "bone", value)
    }

    fn write_morph_index(&mut self, value: i32) -> Result<()> {
        self.inner.write_sized(self.status.morph_index, "morph", value)
    }

    fn write_rigid_index(&mut self, value: i32) -> Result<()> {
        self.inner
            .write_sized(self.status.rigid_index, "rigid body", value)
    }

    fn write_pmx_vertex(&mut self, vertex: &Vertex) -> Result<()> {
        self.inner.write_vec3(&vertex.position)?;
        self.inner.write_vec3(&vertex.normal)?;
        self.inner.write_vec2(&vertex.uv)?;
        for i in 0..usize::from(self.status.additional_uv) {
            let uv = vertex.extra_uv.get(i).copied().unwrap_or([0.0; 4]);
            self.inner.write_vec4(&uv)?;
        }
        self.inner.write_u8(vertex.weight.tag())?;
        match &vertex.weight {
            VertexWeight::BDEF1(bone) => self.write_bone_index(*bone)?,
            VertexWeight::BDEF2 { bones, weight } => {
                self.write_bone_index(bones[0])?;
                self.write_bone_index(bones[1])?;
                self.inner.write_f32(*weight)?;
            }
            VertexWeight::BDEF4 { bones, weights } | VertexWeight::QDEF { bones, weights } => {
                for bone in bones {
                    self.write_bone_index(*bone)?;
                }
                self.inner.write_vec4(weights)?;
            }
            VertexWeight::SDEF {
                bones,
                weight,
                c,
                r0,
                r1,
            } => {
                self.write_bone_index(bones[0])?;
                self.write_bone_index(bones[1])?;
                self.inner.write_f32(*weight)?;
                self.inner.write_vec3(c)?;
                self.inner.write_vec3(r0)?;
                self.inner.write_vec3(r1)?;
            }
        }
        self.inner.write_f32(vertex.edge_scale)
    }

    fn write_pmx_material(&mut self, material: &Material) -> Result<()> {
        self.write_text(&material.name)?;
        self.write_text(&material.name_en)?;
        self.inner.write_vec4(&material.diffuse)?;
        self.inner.write_vec3(&material.specular)?;
        self.inner.write_f32(material.specular_power)?;
        self.inner.write_vec3(&material.ambient)?;
        self.inner.write_u8(material.flags.bits())?;
        self.inner.write_vec4(&material.edge_color)?;
        self.inner.write_f32(material.edge_size)?;
        self.write_texture_index(material.texture)?;
        self.write_texture_index(material.sphere)?;
        self.inner.write_u8(u8::from(material.sphere_mode))?;
        match material.toon {
            ToonMode::Texture(index) => {
                self.inner.write_bool(false)?;
                self.write_texture_index(index)?;
            }
            ToonMode::System(id) => {
                self.inner.write_bool(true)?;
                self.inner.write_u8(id)?;
            }
        }
        self.write_text(&material.memo)?;
        self.inner.write_i32(material.face_count)
    }

    fn write_bone(&mut self, bone: &Bone) -> Result<()> {
        self.write_text(&bone.name)?;
        self.write_text(&bone.name_en)?;
        self.inner.write_vec3(&bone.position)?;
        self.write_bone_index(bone.parent)?;
        self.inner.write_i32(bone.level)?;
        self.inner.write_u16(bone.flags().bits())?;
        match bone.tail {
            BoneTail::Bone(index) => self.write_bone_index(index)?,
            BoneTail::Offset(offset) => self.inner.write_vec3(&offset)?,
        }
        if let Some((parent, power)) = bone.inherit.source() {
            self.write_bone_index(parent)?;
            self.inner.write_f32(power)?;
        }
        if let Some(axis) = &bone.fixed_axis {
            self.inner.write_vec3(axis)?;
        }
        if let Some(axis) = &bone.local_axis {
            self.inner.write_vec3(&axis.x)?;
            self.inner.write_vec3(&axis.z)?;
        }
        if let Some(key) = bone.external_parent {
            self.inner.write_i32(key)?;
        }
        if let Some(ik) = &bone.ik {
            self.write_bone_index(ik.target)?;
            self.inner.write_i32(ik.loops)?;
            self.inner.write_f32(ik.limit)?;
            self.inner.write_count(ik.links.len(), "IK link")?;
            for link in &ik.links {
                self.write_bone_index(link.bone)?;
                match &link.limit {
                    Some((lower, upper)) => {
                        self.inner.write_bool(true)?;
                        self.inner.write_vec3(lower)?;
                        self.inner.write_vec3(upper)?;
                    }
                    None => self.inner.write_bool(false)?,
                }
            }
        }
        Ok(())
    }

    fn write_pmx_morph(&mut self, morph: &Morph) -> Result<()> {
        self.write_text(&morph.name)?;
        self.write_text(&morph.name_en)?;
        self.inner.write_u8(u8::from(morph.panel))?;
        self.inner.write_u8(morph.offsets.kind())?;
        self.inner.write_count(morph.offsets.len(), "morph offset")?;
        match &morph.offsets {
            MorphOffsets::Group(offsets) | MorphOffsets::Flip(offsets) => {
                for o in offsets {
                    self.write_morph_index(o.morph)?;
                    self.inner.write_f32(o.factor)?;
                }
            }
            MorphOffsets::Vertex(offsets) => {
                for o in offsets {
                    self.write_vertex_index(o.vertex)?;
                    self.inner.write_vec3(&o.offset)?;
                }
            }
            MorphOffsets::Bone(offsets) => {
                for o in offsets {
                    self.write_bone_index(o.bone)?;
                    self.inner.write_vec3(&o.translation)?;
                    self.inner.write_vec4(&o.rotation)?;
                }
            }
            MorphOffsets::Uv { offsets, .. } => {
                for o in offsets {
                    self.write_vertex_index(o.vertex)?;
                    self.inner.write_vec4(&o.offset)?;
                }
            }
            MorphOffsets::Material(offsets) => {
                for o in offsets {
                    self.write_material_index(o.material)?;
                    self.inner.write_u8(match o.operation {
                        MaterialOperation::Multiply => 0,
                        MaterialOperation::Add => 1,
                    })?;
                    self.inner.write_vec4(&o.diffuse)?;
                    self.inner.write_vec3(&o.specular)?;
                    self.inner.write_f32(o.specular_power)?;
                    self.inner.write_vec3(&o.ambient)?;
                    self.inner.write_vec4(&o.edge_color)?;
                    self.inner.write_f32(o.edge_size)?;
                    self.inner.write_vec4(&o.texture_tint)?;
                    self.inner.write_vec4(&o.sphere_tint)?;
                    self.inner.write_vec4(&o.toon_tint)?;
                }
            }
            MorphOffsets::Impulse(offsets) => {
                for o in offsets {
                    self.write_rigid_index(o.rigid)?;
                    self.inner.write_bool(o.local)?;
                    self.inner.write_vec3(&o.velocity)?;
                    self.inner.write_vec3(&o.torque)?;
                }
            }
        }
        Ok(())
    }

    fn write_pmx_frame(&mut self, frame: &Frame) -> Result<()> {
        self.write_text(&frame.name)?;
        self.write_text(&frame.name_en)?;
        self.inner.write_bool(frame.special)?;
        self.inner.write_count(frame.items.len(), "frame item")?;
        for item in &frame.items {
            match *item {
                FrameItem::Bone(index) => {
                    self.inner.write_u8(0)?;
                    self.write_bone_index(index)?;
                }
                FrameItem::Morph(index) => {
                    self.inner.write_u8(1)?;
                    self.write_morph_index(index)?;
                }
            }
        }
        Ok(())
    }

    fn write_pmx_rigid(&mut self, rigid: &Rigid) -> Result<()> {
        use crate::types::{RigidPhysics, RigidShape};
        self.write_text(&rigid.name)?;
        self.write_text(&rigid.name_en)?;
        self.write_bone_index(rigid.bone)?;
        self.inner.write_u8(rigid.group)?;
        self.inner.write_u16(rigid.collision_mask)?;
        self.inner.write_u8(match rigid.shape {
            RigidShape::Sphere => 0,
            RigidShape::Box => 1,
            RigidShape::Capsule => 2,
        })?;
        self.inner.write_vec3(&rigid.size)?;
        self.inner.write_vec3(&rigid.position)?;
        self.inner.write_vec3(&rigid.rotation)?;
        self.inner.write_f32(rigid.mass)?;
        self.inner.write_f32(rigid.linear_damping)?;
        self.inner.write_f32(rigid.angular_damping)?;
        self.inner.write_f32(rigid.restitution)?;
        self.inner.write_f32(rigid.friction)?;
        self.inner.write_u8(match rigid.physics {
            RigidPhysics::Static => 0,
            RigidPhysics::Dynamic => 1,
            RigidPhysics::DynamicWithBone => 2,
        })
    }

    fn write_pmx_joint(&mut self, joint: &Joint) -> Result<()> {
        self.write_text(&joint.name)?;
        self.write_text(&joint.name_en)?;
        self.inner.write_u8(u8::from(joint.kind))?;
        self.write_rigid_index(joint.rigid_a)?;
        self.write_rigid_index(joint.rigid_b)?;
        for v in [
            &joint.position,
            &joint.rotation,
            &joint.position_min,
            &joint.position_max,
            &joint.rotation_min,
            &joint.rotation_max,
            &joint.position_spring,
            &joint.rotation_spring,
        ] {
            self.inner.write_vec3(v)?;
        }
        Ok(())
    }

    fn write_pmx_soft_body(&mut self, soft_body: &SoftBody) -> Result<()> {
        self.write_text(&soft_body.name)?;
        self.write_text(&soft_body.name_en)?;
        self.inner.write_u8(match soft_body.shape {
            SoftBodyShape::TriMesh => 0,
            SoftBodyShape::Rope => 1,
        })?;
        self.write_material_index(soft_body.material)?;
        self.inner.write_u8(soft_body.group)?;
        self.inner.write_u16(soft_body.collision_mask)?;
        self.inner.write_u8(soft_body.flags.bits())?;
        self.inner.write_i32(soft_body.b_link_distance)?;
        self.inner.write_i32(soft_body.clusters)?;
        self.inner.write_f32(soft_body.mass)?;
        self.inner.write_f32(soft_body.margin)?;
        self.inner.write_i32(i32::from(soft_body.aero_model))?;
        for v in soft_body.config.iter().chain(soft_body.cluster.iter()) {
            self.inner.write_f32(*v)?;
        }
        for v in &soft_body.iteration {
            self.inner.write_i32(*v)?;
        }
        for v in &soft_body.stiffness {
            self.inner.write_f32(*v)?;
        }
        self.inner
            .write_count(soft_body.anchors.len(), "soft body anchor")?;
        for anchor in &soft_body.anchors {
            self.write_rigid_index(anchor.rigid)?;
            self.write_vertex_index(anchor.vertex)?;
            self.inner.write_bool(anchor.near_mode)?;
        }
        self.inner.write_count(soft_body.pins.len(), "pinned vertex")?;
        for pin in &soft_body.pins {
            self.write_vertex_index(*pin)?;
        }
        Ok(())
    }
}
