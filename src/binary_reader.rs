use crate::error::{Error, Result};
use crate::status::{IndexKinds, VertexIndexKinds};
use crate::types::{Encode, Vec2, Vec3, Vec4};
use std::io::{BufRead, BufReader, ErrorKind, Read};

macro_rules! read_bin {
    ($F:ident, $T:ty) => {
        pub(crate) fn $F(&mut self) -> Result<$T> {
            let mut buf = [0_u8; std::mem::size_of::<$T>()];
            self.fill(&mut buf, stringify!($T))?;
            Ok(<$T>::from_le_bytes(buf))
        }
    };
}

/// Little-endian primitive reader. End of stream inside a field is [`Error::MalformedInput`].
pub(crate) struct BinaryReader<R> {
    inner: BufReader<R>,
}

impl<R: Read> BinaryReader<R> {
    pub(crate) fn new(inner: R) -> BinaryReader<R> {
        BinaryReader {
            inner: BufReader::new(inner),
        }
    }

    fn fill(&mut self, buf: &mut [u8], what: &str) -> Result<()> {
        self.inner.read_exact(buf).map_err(|e| {
            if e.kind() == ErrorKind::UnexpectedEof {
                Error::malformed(format!("unexpected end of stream while reading {}", what))
            } else {
                Error::Io(e)
            }
        })
    }

    /// True when no byte is left. Used for optional trailing sections of legacy files.
    pub(crate) fn at_end(&mut self) -> Result<bool> {
        Ok(self.inner.fill_buf()?.is_empty())
    }

    /// Grows with the bytes actually present; a short block is malformed.
    pub(crate) fn read_vec(&mut self, n: usize) -> Result<Vec<u8>> {
        let mut v = Vec::new();
        (&mut self.inner).take(n as u64).read_to_end(&mut v)?;
        if v.len() < n {
            return Err(Error::malformed(format!(
                "unexpected end of stream: {} of {} bytes in block",
                v.len(),
                n
            )));
        }
        Ok(v)
    }

    /// Element count prefix. Negative counts are rejected.
    pub(crate) fn read_count(&mut self, what: &str) -> Result<usize> {
        let n = self.read_i32()?;
        usize::try_from(n).map_err(|_| Error::malformed(format!("negative {} count {}", what, n)))
    }

    /// Length-prefixed string. Invalid sequences are replaced, never fatal.
    pub(crate) fn read_text_buf(&mut self, encode: Encode) -> Result<String> {
        let length = self.read_count("string length")?;
        if length == 0 {
            return Ok(String::new());
        }
        let v = self.read_vec(length)?;
        Ok(decode(&v, encode))
    }

    /// Fixed-width Shift-JIS field of the legacy format, cut at the first NUL.
    pub(crate) fn read_fixed_text(&mut self, width: usize) -> Result<String> {
        let v = self.read_vec(width)?;
        let end = v.iter().position(|b| *b == 0).unwrap_or(v.len());
        Ok(decode(&v[..end], Encode::ShiftJis))
    }

    pub(crate) fn read_vertex_index(&mut self, kind: VertexIndexKinds) -> Result<i32> {
        match kind {
            VertexIndexKinds::U8 => self.read_u8_index(),
            VertexIndexKinds::U16 => self.read_u16_index(),
            VertexIndexKinds::I32 => self.read_i32(),
        }
    }

    pub(crate) fn read_sized(&mut self, kind: IndexKinds) -> Result<i32> {
        match kind {
            IndexKinds::I8 => Ok(i32::from(self.read_i8()?)),
            IndexKinds::I16 => Ok(i32::from(self.read_i16()?)),
            IndexKinds::I32 => self.read_i32(),
        }
    }

    /// Unsigned byte index; 0xFF is -1.
    pub(crate) fn read_u8_index(&mut self) -> Result<i32> {
        Ok(match self.read_u8()? {
            u8::MAX => -1,
            x => i32::from(x),
        })
    }

    /// Unsigned short index; 0xFFFF is -1.
    pub(crate) fn read_u16_index(&mut self) -> Result<i32> {
        Ok(match self.read_u16()? {
            u16::MAX => -1,
            x => i32::from(x),
        })
    }

    pub(crate) fn read_vec2(&mut self) -> Result<Vec2> {
        Ok([self.read_f32()?, self.read_f32()?])
    }

    pub(crate) fn read_vec3(&mut self) -> Result<Vec3> {
        Ok([self.read_f32()?, self.read_f32()?, self.read_f32()?])
    }

    pub(crate) fn read_vec4(&mut self) -> Result<Vec4> {
        Ok([
            self.read_f32()?,
            self.read_f32()?,
            self.read_f32()?,
            self.read_f32()?,
        ])
    }

    read_bin!(read_f32, f32);
    read_bin!(read_i32, i32);
    read_bin!(read_u32, u32);
    read_bin!(read_i16, i16);
    read_bin!(read_u16, u16);
    read_bin!(read_i8, i8);
    read_bin!(read_u8, u8);

    /// read `0_u8` as `false`, `1_u8` as `true`
    pub(crate) fn read_bool(&mut self, what: &str) -> Result<bool> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            x => Err(Error::malformed(format!("{} flag must be 0 or 1, got {}", what, x))),
        }
    }
}

fn decode(bytes: &[u8], encode: Encode) -> String {
    let encoding = match encode {
        Encode::Utf16Le => encoding_rs::UTF_16LE,
        Encode::Utf8 => encoding_rs::UTF_8,
        Encode::ShiftJis => encoding_rs::SHIFT_JIS,
    };
    encoding.decode_without_bom_handling(bytes).0.into_owned()
}
