//! Little-endian cursor over a byte slice.
//!
//! The model, container and scene formats all address their own contents
//! with absolute offsets, so the cursor position is always an offset into
//! the whole slice rather than into some remaining tail. Seeking past the
//! end is allowed; the next read reports it.

use zerocopy::FromBytes;

use crate::{Error, FourCC, Result};

macro_rules! read_le {
    ($($(#[$doc:meta])* $name:ident => $ty:ty;)*) => {
        $(
            $(#[$doc])*
            #[inline]
            pub fn $name(&mut self) -> Result<$ty> {
                self.read_array().map(<$ty>::from_le_bytes)
            }
        )*
    };
}

/// Cursor for zero-copy reads.
///
/// # Example
///
/// ```
/// use shenkit_common::BinaryReader;
///
/// let data = [0x49, 0x50, 0x41, 0x43, 0x10, 0x00, 0x00, 0x00];
/// let mut reader = BinaryReader::new(&data);
///
/// assert_eq!(reader.read_fourcc().unwrap().as_bytes(), b"IPAC");
/// assert_eq!(reader.read_u32().unwrap(), 16);
/// assert!(reader.is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct BinaryReader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> BinaryReader<'a> {
    #[inline]
    pub const fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    /// Reader over `data` positioned at `position`.
    #[inline]
    pub const fn new_at(data: &'a [u8], position: usize) -> Self {
        Self { data, position }
    }

    #[inline]
    pub const fn position(&self) -> usize {
        self.position
    }

    /// Length of the whole slice, not of what is left.
    #[inline]
    pub const fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub const fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.position)
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.position >= self.data.len()
    }

    #[inline]
    pub fn seek(&mut self, position: usize) {
        self.position = position;
    }

    #[inline]
    pub fn advance(&mut self, count: usize) {
        self.position = self.position.saturating_add(count);
    }

    /// The whole underlying slice.
    #[inline]
    pub const fn data(&self) -> &'a [u8] {
        self.data
    }

    /// `len` bytes at an absolute offset, leaving the cursor alone.
    pub fn slice_at(&self, offset: usize, len: usize) -> Result<&'a [u8]> {
        offset
            .checked_add(len)
            .and_then(|end| self.data.get(offset..end))
            .ok_or(Error::UnexpectedEof {
                offset,
                needed: len,
                available: self.data.len().saturating_sub(offset),
            })
    }

    #[inline]
    pub fn peek_bytes(&self, count: usize) -> Result<&'a [u8]> {
        self.slice_at(self.position, count)
    }

    #[inline]
    pub fn read_bytes(&mut self, count: usize) -> Result<&'a [u8]> {
        let bytes = self.peek_bytes(count)?;
        self.position += count;
        Ok(bytes)
    }

    /// Read a fixed number of bytes by value.
    #[inline]
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    read_le! {
        read_u8 => u8;
        read_u16 => u16;
        read_i16 => i16;
        read_u32 => u32;
        read_f32 => f32;
    }

    #[inline]
    pub fn read_vec3(&mut self) -> Result<[f32; 3]> {
        Ok([self.read_f32()?, self.read_f32()?, self.read_f32()?])
    }

    #[inline]
    pub fn read_fourcc(&mut self) -> Result<FourCC> {
        self.read_array().map(FourCC)
    }

    /// Read a tag and fail unless it equals `expected`.
    pub fn expect_magic(&mut self, expected: &[u8; 4]) -> Result<()> {
        let offset = self.position;
        let found = self.read_fourcc()?;
        if found.as_bytes() != expected {
            return Err(Error::InvalidMagic {
                offset,
                expected: FourCC(*expected),
                found,
            });
        }
        Ok(())
    }

    /// Read a NUL-terminated string and step past the terminator.
    pub fn read_cstring(&mut self) -> Result<&'a str> {
        let (text, end) = self.cstring_at(self.position)?;
        self.position = end;
        Ok(text)
    }

    /// NUL-terminated string at an absolute offset; the cursor stays put.
    pub fn read_cstring_at(&self, offset: usize) -> Result<&'a str> {
        self.cstring_at(offset).map(|(text, _)| text)
    }

    fn cstring_at(&self, offset: usize) -> Result<(&'a str, usize)> {
        let tail = self.data.get(offset..).ok_or(Error::OutOfBounds {
            offset,
            end: offset,
            len: self.data.len(),
        })?;
        let nul = memchr::memchr(0, tail).ok_or(Error::MissingNullTerminator { offset })?;
        let text = std::str::from_utf8(&tail[..nul]).map_err(|source| Error::Utf8 { offset, source })?;
        Ok((text, offset + nul + 1))
    }

    /// Read a fixed-size, NUL-padded name field.
    ///
    /// Directory names are not guaranteed to be UTF-8, so the conversion is
    /// lossy.
    pub fn read_padded_name(&mut self, size: usize) -> Result<String> {
        let bytes = self.read_bytes(size)?;
        let end = memchr::memchr(0, bytes).unwrap_or(size);
        Ok(String::from_utf8_lossy(&bytes[..end]).into_owned())
    }

    /// Read a packed header struct.
    #[inline]
    pub fn read_struct<T: FromBytes>(&mut self) -> Result<T> {
        let offset = self.position;
        let size = std::mem::size_of::<T>();
        let bytes = self.read_bytes(size)?;
        T::read_from_bytes(bytes).map_err(|_| Error::UnexpectedEof {
            offset,
            needed: size,
            available: bytes.len(),
        })
    }
}
