//! Format status header: magic, version, text encoding and the six index widths.

use crate::binary_reader::BinaryReader;
use crate::binary_writer::BinaryWriter;
use crate::error::{Error, Result};
use crate::types::{Encode, Model};
use std::io::{Read, Write};

const PMX_MAGIC: [u8; 3] = *b"PMX";
const PMD_MAGIC: [u8; 3] = *b"Pmd";
const PARAMETER_LENGTH: u8 = 8;

/// Width of a signed index field. The all-ones pattern is -1.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IndexKinds {
    I8,
    I16,
    I32,
}

/// Width of a vertex index field: unsigned for 1 and 2 bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VertexIndexKinds {
    U8,
    U16,
    I32,
}

impl TryFrom<u8> for IndexKinds {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            1 => Ok(IndexKinds::I8),
            2 => Ok(IndexKinds::I16),
            4 => Ok(IndexKinds::I32),
            x => Err(Error::malformed(format!("invalid index width {}", x))),
        }
    }
}

impl TryFrom<u8> for VertexIndexKinds {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            1 => Ok(VertexIndexKinds::U8),
            2 => Ok(VertexIndexKinds::U16),
            4 => Ok(VertexIndexKinds::I32),
            x => Err(Error::malformed(format!("invalid vertex index width {}", x))),
        }
    }
}

impl From<IndexKinds> for u8 {
    fn from(kind: IndexKinds) -> u8 {
        match kind {
            IndexKinds::I8 => 1,
            IndexKinds::I16 => 2,
            IndexKinds::I32 => 4,
        }
    }
}

impl From<VertexIndexKinds> for u8 {
    fn from(kind: VertexIndexKinds) -> u8 {
        match kind {
            VertexIndexKinds::U8 => 1,
            VertexIndexKinds::U16 => 2,
            VertexIndexKinds::I32 => 4,
        }
    }
}

/// Smallest unsigned width whose indices `0..len` stay clear of the sentinel.
pub fn infer_vertex_width(len: usize) -> VertexIndexKinds {
    if len < 0x100 {
        VertexIndexKinds::U8
    } else if len < 0x10000 {
        VertexIndexKinds::U16
    } else {
        VertexIndexKinds::I32
    }
}

/// Smallest signed width able to index a collection of `len` entries.
pub fn infer_signed_width(len: usize) -> IndexKinds {
    if len < 0x80 {
        IndexKinds::I8
    } else if len < 0x8000 {
        IndexKinds::I16
    } else {
        IndexKinds::I32
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FormatKind {
    Pmd,
    Pmx,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FormatStatus {
    pub kind: FormatKind,
    pub version: f32,
    pub encode: Encode,
    pub additional_uv: u8,
    pub vertex_index: VertexIndexKinds,
    pub texture_index: IndexKinds,
    pub material_index: IndexKinds,
    pub bone_index: IndexKinds,
    pub morph_index: IndexKinds,
    pub rigid_index: IndexKinds,
}

impl Default for FormatStatus {
    fn default() -> Self {
        FormatStatus {
            kind: FormatKind::Pmx,
            version: 2.0,
            encode: Encode::Utf16Le,
            additional_uv: 0,
            vertex_index: VertexIndexKinds::U8,
            texture_index: IndexKinds::I8,
            material_index: IndexKinds::I8,
            bone_index: IndexKinds::I8,
            morph_index: IndexKinds::I8,
            rigid_index: IndexKinds::I8,
        }
    }
}

impl FormatStatus {
    /// Fixed scheme of the legacy format.
    pub fn legacy() -> FormatStatus {
        FormatStatus {
            kind: FormatKind::Pmd,
            version: 1.0,
            encode: Encode::ShiftJis,
            additional_uv: 0,
            vertex_index: VertexIndexKinds::U16,
            texture_index: IndexKinds::I8,
            material_index: IndexKinds::I32,
            bone_index: IndexKinds::I16,
            morph_index: IndexKinds::I16,
            rigid_index: IndexKinds::I32,
        }
    }

    /// Reads the magic and whatever the detected format puts after it.
    pub(crate) fn load<R: Read>(reader: &mut BinaryReader<R>) -> Result<FormatStatus> {
        let mut magic = [0_u8; 3];
        magic.copy_from_slice(&reader.read_vec(3)?);
        match magic {
            PMD_MAGIC => {
                let version = reader.read_f32()?;
                if version != 1.0 {
                    return Err(Error::UnsupportedVersion { version });
                }
                Ok(FormatStatus::legacy())
            }
            PMX_MAGIC => {
                // "PMX " carries a trailing space
                reader.read_u8()?;
                let version = reader.read_f32()?;
                if version != 2.0 && version != 2.1 {
                    return Err(Error::UnsupportedVersion { version });
                }
                let length = reader.read_u8()?;
                if length < PARAMETER_LENGTH {
                    return Err(Error::malformed(format!(
                        "parameter block of {} bytes is too short",
                        length
                    )));
                }
                let config = reader.read_vec(usize::from(length))?;
                Ok(FormatStatus {
                    kind: FormatKind::Pmx,
                    version,
                    encode: Encode::try_from(config[0])?,
                    additional_uv: match config[1] {
                        n @ 0..=4 => n,
                        n => {
                            return Err(Error::malformed(format!(
                                "{} additional UV channels, at most 4 allowed",
                                n
                            )))
                        }
                    },
                    vertex_index: VertexIndexKinds::try_from(config[2])?,
                    texture_index: IndexKinds::try_from(config[3])?,
                    material_index: IndexKinds::try_from(config[4])?,
                    bone_index: IndexKinds::try_from(config[5])?,
                    morph_index: IndexKinds::try_from(config[6])?,
                    rigid_index: IndexKinds::try_from(config[7])?,
                })
            }
            other => Err(Error::malformed(format!("unknown magic {:?}", other))),
        }
    }

    /// Status a model must be written with: widths from the actual collection sizes,
    /// 2.1 whenever the model needs it or already declared it.
    pub fn for_model(model: &Model, encode: Encode) -> FormatStatus {
        let v21 = model.requires_v21()
            || (model.status.kind == FormatKind::Pmx && model.status.version > 2.0);
        FormatStatus {
            kind: FormatKind::Pmx,
            version: if v21 { 2.1 } else { 2.0 },
            encode,
            additional_uv: model
                .vertices
                .iter()
                .map(|v| v.extra_uv.len())
                .max()
                .unwrap_or(0)
                .min(4) as u8,
            vertex_index: infer_vertex_width(model.vertices.len()),
            texture_index: infer_signed_width(model.textures.len()),
            material_index: infer_signed_width(model.materials.len()),
            bone_index: infer_signed_width(model.bones.len()),
            morph_index: infer_signed_width(model.morphs.len()),
            rigid_index: infer_signed_width(model.rigids.len()),
        }
    }

    pub(crate) fn save<W: Write>(&self, writer: &mut BinaryWriter<W>) -> Result<()> {
        writer.write_vec(b"PMX ")?;
        writer.write_f32(self.version)?;
        writer.write_u8(PARAMETER_LENGTH)?;
        writer.write_vec(&[
            self.encode.selector(),
            self.additional_uv,
            u8::from(self.vertex_index),
            u8::from(self.texture_index),
            u8::from(self.material_index),
            u8::from(self.bone_index),
            u8::from(self.morph_index),
            u8::from(self.rigid_index),
        ])
    }
}
