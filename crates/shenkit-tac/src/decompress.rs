//! Seekable gzip decompression.
//!
//! Gzip is a forward-only stream. [`SeekableInflate`] makes it look seekable
//! by restarting the decoder from the beginning of the member and replaying
//! output up to the requested position whenever a seek goes backwards.

use std::io::{self, Read, Seek, SeekFrom};

use byteorder::{LittleEndian, ReadBytesExt};
use flate2::read::GzDecoder;

use crate::kind::is_gzip;
use crate::{Error, Result};

/// Length of the gzip trailer (CRC32 + ISIZE).
const GZIP_FOOTER_SIZE: u64 = 8;

/// Smallest possible gzip header.
const GZIP_HEADER_SIZE: u64 = 10;

/// Deflate cannot expand input by more than this factor.
const MAX_DEFLATE_RATIO: u64 = 1032;

/// Read the uncompressed length from a gzip member's ISIZE footer.
///
/// ISIZE is the length modulo 2^32; entries in these archives are far
/// smaller than that.
pub fn gzip_isize<R: Read + Seek>(reader: &mut R) -> Result<u64> {
    reader.seek(SeekFrom::End(-4))?;
    Ok(u64::from(reader.read_u32::<LittleEndian>()?))
}

/// A read-and-seek adapter over a gzip member.
pub struct SeekableInflate<R: Read + Seek> {
    // Only `None` transiently while `restart` rebuilds the decoder.
    decoder: Option<GzDecoder<R>>,
    position: u64,
    len: u64,
    raw_len: u64,
}

impl<R: Read + Seek> SeekableInflate<R> {
    /// Wrap a reader positioned anywhere inside a gzip member.
    ///
    /// The uncompressed length is taken from the footer, then the reader is
    /// rewound to the start of the member.
    pub fn new(mut inner: R) -> Result<Self> {
        let raw_len = inner.seek(SeekFrom::End(0))?;
        if raw_len < GZIP_HEADER_SIZE + GZIP_FOOTER_SIZE {
            return Err(Error::Decompression(format!(
                "{raw_len} bytes is too short for a gzip member"
            )));
        }

        let len = gzip_isize(&mut inner)?;
        inner.seek(SeekFrom::Start(0))?;

        Ok(Self {
            decoder: Some(GzDecoder::new(inner)),
            position: 0,
            len,
            raw_len,
        })
    }

    /// Uncompressed length as declared by the footer.
    #[inline]
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Whether the uncompressed stream is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Inflate the whole member into a buffer.
    ///
    /// The footer only sizes the initial reservation, capped at what the
    /// compressed size can possibly inflate to.
    pub fn read_all(mut self) -> Result<Vec<u8>> {
        self.seek(SeekFrom::Start(0))?;
        let reserve = self.len.min(self.raw_len.saturating_mul(MAX_DEFLATE_RATIO));
        let mut out = Vec::with_capacity(usize::try_from(reserve).unwrap_or(0));
        self.read_to_end(&mut out)
            .map_err(|e| Error::Decompression(e.to_string()))?;
        Ok(out)
    }

    fn decoder(&mut self) -> io::Result<&mut GzDecoder<R>> {
        self.decoder
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "gzip decoder lost during restart"))
    }

    fn restart(&mut self) -> io::Result<()> {
        let decoder = self
            .decoder
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "gzip decoder lost during restart"))?;
        let mut inner = decoder.into_inner();
        inner.seek(SeekFrom::Start(0))?;
        self.decoder = Some(GzDecoder::new(inner));
        self.position = 0;
        Ok(())
    }

    fn skip_forward(&mut self, count: u64) -> io::Result<()> {
        let skipped = io::copy(&mut self.decoder()?.take(count), &mut io::sink())?;
        self.position += skipped;
        if skipped < count {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "gzip stream ended before seek target",
            ));
        }
        Ok(())
    }
}

impl<R: Read + Seek> Read for SeekableInflate<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.decoder()?.read(buf)?;
        self.position += n as u64;
        Ok(n)
    }
}

impl<R: Read + Seek> Seek for SeekableInflate<R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => i128::from(offset),
            SeekFrom::Current(delta) => i128::from(self.position) + i128::from(delta),
            SeekFrom::End(delta) => i128::from(self.len) + i128::from(delta),
        };
        if target < 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek before start of gzip stream",
            ));
        }

        let target = target as u64;
        if target < self.position {
            self.restart()?;
        }
        if target > self.position {
            self.skip_forward(target - self.position)?;
        }
        Ok(self.position)
    }
}

/// Inflate `raw` if it is a gzip member, otherwise return `None`.
pub fn inflate_if_gzip(raw: &[u8]) -> Result<Option<Vec<u8>>> {
    if !is_gzip(raw) {
        return Ok(None);
    }
    SeekableInflate::new(io::Cursor::new(raw))?.read_all().map(Some)
}
