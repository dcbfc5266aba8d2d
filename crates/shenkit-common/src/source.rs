//! Bounded, independently seekable byte views.

use std::fmt;
use std::io::{self, Read, Seek, SeekFrom};
use std::sync::Arc;

use crate::{BinaryReader, Error, Result};

/// Reference-counted backing storage for a [`ByteSource`].
///
/// Either a memory-mapped data file or a fully inflated payload; both are
/// shared read-only between every view opened over them.
pub type SharedBytes = Arc<dyn AsRef<[u8]> + Send + Sync>;

/// A seekable view over a region of shared bytes.
///
/// Each `ByteSource` owns its own cursor: cloning one, or opening a
/// [`sub_source`](Self::sub_source) from it, never moves the position of the
/// original. Positions are relative to the start of the region.
#[derive(Clone)]
pub struct ByteSource {
    backing: SharedBytes,
    start: usize,
    len: usize,
    position: usize,
}

impl ByteSource {
    /// View `len` bytes of `backing` starting at `start`.
    pub fn new(backing: SharedBytes, start: usize, len: usize) -> Result<Self> {
        let total = (*backing).as_ref().len();
        if start.checked_add(len).map_or(true, |end| end > total) {
            return Err(Error::OutOfBounds {
                offset: start,
                end: start.saturating_add(len),
                len: total,
            });
        }

        Ok(Self {
            backing,
            start,
            len,
            position: 0,
        })
    }

    /// View the whole of `backing`.
    pub fn from_shared(backing: SharedBytes) -> Self {
        let len = (*backing).as_ref().len();
        Self {
            backing,
            start: 0,
            len,
            position: 0,
        }
    }

    /// Wrap an owned buffer.
    pub fn from_vec(data: Vec<u8>) -> Self {
        Self::from_shared(Arc::new(data))
    }

    /// Length of the view in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the view is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Current cursor position, relative to the start of the view.
    #[inline]
    pub fn position(&self) -> usize {
        self.position
    }

    /// Move the cursor to an absolute position inside the view.
    pub fn set_position(&mut self, position: usize) -> Result<()> {
        if position > self.len {
            return Err(Error::OutOfBounds {
                offset: position,
                end: position,
                len: self.len,
            });
        }
        self.position = position;
        Ok(())
    }

    /// The bytes covered by this view.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &(*self.backing).as_ref()[self.start..self.start + self.len]
    }

    /// The bytes from the cursor to the end of the view.
    #[inline]
    pub fn remaining_slice(&self) -> &[u8] {
        &self.as_slice()[self.position.min(self.len)..]
    }

    /// A [`BinaryReader`] over the whole view, positioned at the cursor.
    ///
    /// The reader borrows the view; its movements do not feed back into the
    /// view's own cursor.
    #[inline]
    pub fn reader(&self) -> BinaryReader<'_> {
        BinaryReader::new_at(self.as_slice(), self.position)
    }

    /// A new view over `len` bytes starting at `offset` within this one.
    ///
    /// The new view shares the backing storage and starts with its cursor at
    /// zero.
    pub fn sub_source(&self, offset: usize, len: usize) -> Result<Self> {
        if offset.checked_add(len).map_or(true, |end| end > self.len) {
            return Err(Error::OutOfBounds {
                offset,
                end: offset.saturating_add(len),
                len: self.len,
            });
        }

        Ok(Self {
            backing: Arc::clone(&self.backing),
            start: self.start + offset,
            len,
            position: 0,
        })
    }

    /// A new view from `offset` to the end of this one.
    pub fn tail(&self, offset: usize) -> Result<Self> {
        let len = self.len.checked_sub(offset).ok_or(Error::OutOfBounds {
            offset,
            end: offset,
            len: self.len,
        })?;
        self.sub_source(offset, len)
    }

    /// Copy the viewed bytes into a new vector.
    pub fn to_vec(&self) -> Vec<u8> {
        self.as_slice().to_vec()
    }
}

impl fmt::Debug for ByteSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteSource")
            .field("start", &self.start)
            .field("len", &self.len)
            .field("position", &self.position)
            .finish()
    }
}

impl Read for ByteSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = self.remaining_slice();
        let n = remaining.len().min(buf.len());
        buf[..n].copy_from_slice(&remaining[..n]);
        self.position += n;
        Ok(n)
    }
}

impl Seek for ByteSource {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => i128::from(offset),
            SeekFrom::Current(delta) => self.position as i128 + i128::from(delta),
            SeekFrom::End(delta) => self.len as i128 + i128::from(delta),
        };
        if target < 0 || target > self.len as i128 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("seek to {target} outside view of {} bytes", self.len),
            ));
        }
        self.position = target as usize;
        Ok(self.position as u64)
    }
}
