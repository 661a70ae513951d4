use crate::error::{Error, Result};
use crate::status::{IndexKinds, VertexIndexKinds};
use crate::types::{Encode, Vec2, Vec3, Vec4};
use std::io::{BufWriter, Write};

macro_rules! write_bin {
    ($F:ident, $T:ty) => {
        pub(crate) fn $F(&mut self, value: $T) -> Result<()> {
            self.inner.write_all(&value.to_le_bytes())?;
            Ok(())
        }
    };
}

/// Little-endian primitive writer. Strings go out in the encoding chosen at creation.
pub(crate) struct BinaryWriter<W: Write> {
    inner: BufWriter<W>,
    encode: Encode,
}

impl<W: Write> BinaryWriter<W> {
    pub(crate) fn new(inner: W, encode: Encode) -> BinaryWriter<W> {
        BinaryWriter {
            inner: BufWriter::new(inner),
            encode,
        }
    }

    pub(crate) fn encode(&self) -> Encode {
        self.encode
    }

    pub(crate) fn write_vec(&mut self, bytes: &[u8]) -> Result<()> {
        self.inner.write_all(bytes)?;
        Ok(())
    }

    pub(crate) fn write_count(&mut self, n: usize, what: &'static str) -> Result<()> {
        let n = i32::try_from(n).map_err(|_| Error::IndexOverflow {
            kind: what,
            value: i32::MAX,
            width: 4,
        })?;
        self.write_i32(n)
    }

    pub(crate) fn write_text_buf(&mut self, text: &str) -> Result<()> {
        let bytes: Vec<u8> = match self.encode {
            Encode::Utf8 => text.as_bytes().to_vec(),
            // Shift-JIS is never written; legacy models are upgraded to UTF-16
            Encode::Utf16Le | Encode::ShiftJis => {
                text.encode_utf16().flat_map(|u| u.to_le_bytes()).collect()
            }
        };
        self.write_count(bytes.len(), "string length")?;
        self.write_vec(&bytes)
    }

    /// Unsigned widths re-encode -1 as the all-ones sentinel.
    pub(crate) fn write_vertex_index(&mut self, kind: VertexIndexKinds, value: i32) -> Result<()> {
        let overflow = |width| Error::IndexOverflow {
            kind: "vertex",
            value,
            width,
        };
        match kind {
            VertexIndexKinds::U8 => {
                let byte = match value {
                    -1 => u8::MAX,
                    0..=254 => value as u8,
                    _ => return Err(overflow(1)),
                };
                self.write_u8(byte)
            }
            VertexIndexKinds::U16 => {
                let short = match value {
                    -1 => u16::MAX,
                    0..=65534 => value as u16,
                    _ => return Err(overflow(2)),
                };
                self.write_u16(short)
            }
            VertexIndexKinds::I32 => self.write_i32(value),
        }
    }

    pub(crate) fn write_sized(
        &mut self,
        kind: IndexKinds,
        what: &'static str,
        value: i32,
    ) -> Result<()> {
        let overflow = |width| Error::IndexOverflow {
            kind: what,
            value,
            width,
        };
        match kind {
            IndexKinds::I8 => {
                let v = i8::try_from(value).map_err(|_| overflow(1))?;
                self.write_i8(v)
            }
            IndexKinds::I16 => {
                let v = i16::try_from(value).map_err(|_| overflow(2))?;
                self.write_i16(v)
            }
            IndexKinds::I32 => self.write_i32(value),
        }
    }

    pub(crate) fn write_vec2(&mut self, v: &Vec2) -> Result<()> {
        v.iter().try_for_each(|x| self.write_f32(*x))
    }

    pub(crate) fn write_vec3(&mut self, v: &Vec3) -> Result<()> {
        v.iter().try_for_each(|x| self.write_f32(*x))
    }

    pub(crate) fn write_vec4(&mut self, v: &Vec4) -> Result<()> {
        v.iter().try_for_each(|x| self.write_f32(*x))
    }

    pub(crate) fn write_bool(&mut self, value: bool) -> Result<()> {
        self.write_u8(u8::from(value))
    }

    write_bin!(write_f32, f32);
    write_bin!(write_i32, i32);
    write_bin!(write_i16, i16);
    write_bin!(write_u16, u16);
    write_bin!(write_i8, i8);
    write_bin!(write_u8, u8);

    pub(crate) fn finish(mut self) -> Result<W> {
        self.inner.flush()?;
        self.inner
            .into_inner()
            .map_err(|e| Error::Io(e.into_error()))
    }
}
