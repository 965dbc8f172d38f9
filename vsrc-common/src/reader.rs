//! Cursor-based little-endian reader over a borrowed byte buffer
//!
//! Every read is bounds-checked before the cursor moves, so a failed read
//! leaves the position exactly where it was.

use byteorder::{ByteOrder, LittleEndian};
use glam::{Quat, Vec2, Vec3, Vec4};

use crate::error::{DecodeError, DecodeResult};

/// Little-endian cursor over an immutable byte buffer
#[derive(Debug, Clone)]
pub struct BinaryReader<'a> {
    data: &'a [u8],
    pos: usize,
}

macro_rules! read_le {
    ($name:ident, $ty:ty) => {
        #[inline]
        pub fn $name(&mut self) -> DecodeResult<$ty> {
            let bytes = self.take(std::mem::size_of::<$ty>())?;
            Ok(LittleEndian::$name(bytes))
        }
    };
}

impl<'a> BinaryReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Create a reader positioned at `offset`
    pub fn at(data: &'a [u8], offset: usize) -> DecodeResult<Self> {
        let mut reader = Self::new(data);
        reader.seek(offset)?;
        Ok(reader)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Move the cursor to an absolute offset. `offset == len` is allowed.
    pub fn seek(&mut self, offset: usize) -> DecodeResult<()> {
        if offset > self.data.len() {
            return Err(DecodeError::OutOfBounds {
                offset,
                len: 0,
                size: self.data.len(),
            });
        }
        self.pos = offset;
        Ok(())
    }

    pub fn skip(&mut self, count: usize) -> DecodeResult<()> {
        self.take(count).map(|_| ())
    }

    /// Borrow `count` bytes and advance past them
    pub fn take(&mut self, count: usize) -> DecodeResult<&'a [u8]> {
        let bytes = self.slice_at(self.pos, count)?;
        self.pos += count;
        Ok(bytes)
    }

    /// Borrow `count` bytes at an absolute offset without touching the cursor
    pub fn slice_at(&self, offset: usize, count: usize) -> DecodeResult<&'a [u8]> {
        let end = offset.checked_add(count).filter(|&end| end <= self.data.len());
        match end {
            Some(end) => Ok(&self.data[offset..end]),
            None => Err(DecodeError::OutOfBounds {
                offset,
                len: count,
                size: self.data.len(),
            }),
        }
    }

    /// Run `f` and restore the cursor afterwards, whatever the outcome
    pub fn peek<T>(&mut self, f: impl FnOnce(&mut Self) -> DecodeResult<T>) -> DecodeResult<T> {
        let saved = self.pos;
        let result = f(self);
        self.pos = saved;
        result
    }

    /// Run `f` with the cursor at `offset`, then restore it
    pub fn peek_at<T>(
        &mut self,
        offset: usize,
        f: impl FnOnce(&mut Self) -> DecodeResult<T>,
    ) -> DecodeResult<T> {
        let saved = self.pos;
        let result = self.seek(offset).and_then(|_| f(self));
        self.pos = saved;
        result
    }

    pub fn read_u8(&mut self) -> DecodeResult<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_i8(&mut self) -> DecodeResult<i8> {
        Ok(self.take(1)?[0] as i8)
    }

    read_le!(read_u16, u16);
    read_le!(read_i16, i16);
    read_le!(read_u32, u32);
    read_le!(read_i32, i32);
    read_le!(read_u64, u64);
    read_le!(read_i64, i64);
    read_le!(read_f32, f32);
    read_le!(read_f64, f64);

    pub fn read_array<const N: usize>(&mut self) -> DecodeResult<[u8; N]> {
        let bytes = self.take(N)?;
        let mut buf = [0u8; N];
        buf.copy_from_slice(bytes);
        Ok(buf)
    }

    pub fn read_vec2(&mut self) -> DecodeResult<Vec2> {
        let bytes = self.take(8)?;
        Ok(Vec2::new(f32_at(bytes, 0), f32_at(bytes, 4)))
    }

    pub fn read_vec3(&mut self) -> DecodeResult<Vec3> {
        let bytes = self.take(12)?;
        Ok(Vec3::new(f32_at(bytes, 0), f32_at(bytes, 4), f32_at(bytes, 8)))
    }

    pub fn read_vec4(&mut self) -> DecodeResult<Vec4> {
        let bytes = self.take(16)?;
        Ok(Vec4::new(
            f32_at(bytes, 0),
            f32_at(bytes, 4),
            f32_at(bytes, 8),
            f32_at(bytes, 12),
        ))
    }

    /// Quaternion stored as x, y, z, w
    pub fn read_quat(&mut self) -> DecodeResult<Quat> {
        let v = self.read_vec4()?;
        Ok(Quat::from_xyzw(v.x, v.y, v.z, v.w))
    }

    /// Fixed-width field holding a NUL-terminated string
    pub fn read_fixed_string(&mut self, width: usize) -> DecodeResult<String> {
        let bytes = self.take(width)?;
        Ok(string_from_bytes(bytes))
    }

    /// NUL-terminated string at the cursor. The terminator is consumed.
    pub fn read_cstring(&mut self) -> DecodeResult<String> {
        let tail = &self.data[self.pos..];
        let len = tail
            .iter()
            .position(|&b| b == 0)
            .ok_or(DecodeError::OutOfBounds {
                offset: self.pos,
                len: tail.len() + 1,
                size: self.data.len(),
            })?;
        let s = String::from_utf8_lossy(&tail[..len]).into_owned();
        self.pos += len + 1;
        Ok(s)
    }

    /// NUL-terminated string at an absolute offset; the cursor does not move
    pub fn cstring_at(&mut self, offset: usize) -> DecodeResult<String> {
        self.peek_at(offset, |r| r.read_cstring())
    }

    /// `u32` length followed by that many bytes
    pub fn read_blob(&mut self) -> DecodeResult<&'a [u8]> {
        let start = self.pos;
        let len = self.read_u32()? as usize;
        match self.take(len) {
            Ok(bytes) => Ok(bytes),
            Err(err) => {
                self.pos = start;
                Err(err)
            }
        }
    }
}

#[inline]
fn f32_at(bytes: &[u8], at: usize) -> f32 {
    LittleEndian::read_f32(&bytes[at..at + 4])
}

/// Decode a NUL-padded byte field into a `String`
pub fn string_from_bytes(bytes: &[u8]) -> String {
    let len = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..len]).into_owned()
}
