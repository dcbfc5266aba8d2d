//! TAD index file parsing.
//!
//! A `.tad` file is a fixed 72-byte header followed by fixed-size records,
//! one per top-level entry of the matching `.tac` data file. There is no
//! record count in the header; the record stream simply runs to EOF.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use shenkit_common::BinaryReader;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::{Error, Result};

/// Size of the index file header.
pub const INDEX_HEADER_SIZE: usize = 72;

/// A single index record (28 bytes on disk).
///
/// The padding words are not interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct IndexRecord {
    /// Unused
    pub padding0: [u8; 4],
    /// Byte offset of the entry in the data file
    pub offset: u32,
    /// Unused
    pub padding1: [u8; 4],
    /// Byte length of the entry in the data file
    pub length: u32,
    /// Unused
    pub padding2: [u8; 4],
    /// Content hash, stable across releases
    pub hash: [u8; 4],
    /// Unused
    pub padding3: [u8; 8],
}

impl IndexRecord {
    /// On-disk record size.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Build a record with zeroed padding.
    pub fn new(offset: u32, length: u32, hash: [u8; 4]) -> Self {
        Self {
            padding0: [0; 4],
            offset,
            padding1: [0; 4],
            length,
            padding2: [0; 4],
            hash,
            padding3: [0; 8],
        }
    }

    /// Hash rendered as uppercase hex in file byte order (`DEADBEEF`).
    pub fn hash_hex(&self) -> String {
        let hash = self.hash;
        let mut out = String::with_capacity(8);
        for byte in hash {
            let _ = write!(out, "{byte:02X}");
        }
        out
    }

    /// Exclusive end offset, or `None` if it overflows.
    #[inline]
    pub fn end(&self) -> Option<u64> {
        let (offset, length) = (self.offset, self.length);
        u64::from(offset).checked_add(u64::from(length))
    }
}

/// Parse index bytes into records.
///
/// Yields exactly `(len - 72) / 28` records; a trailing partial record is
/// ignored. Fails only when the header itself is truncated.
pub fn build_index(data: &[u8]) -> Result<Vec<IndexRecord>> {
    if data.len() < INDEX_HEADER_SIZE {
        return Err(Error::CorruptIndex(format!(
            "{} bytes is shorter than the {INDEX_HEADER_SIZE}-byte header",
            data.len()
        )));
    }

    let body = &data[INDEX_HEADER_SIZE..];
    let count = body.len() / IndexRecord::SIZE;
    let mut reader = BinaryReader::new(body);
    let mut records = Vec::with_capacity(count);

    for _ in 0..count {
        records.push(reader.read_struct::<IndexRecord>()?);
    }

    Ok(records)
}

/// Read and parse an index file from disk.
pub fn read_index<P: AsRef<Path>>(path: P) -> Result<Vec<IndexRecord>> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(Error::MissingDataFile(path.to_path_buf()));
    }

    let data = fs::read(path)?;
    build_index(&data).map_err(|e| match e {
        Error::CorruptIndex(reason) => Error::CorruptIndex(format!("{}: {reason}", path.display())),
        other => other,
    })
}

/// Check that every record addresses bytes inside a data file of `data_len`
/// bytes.
pub fn validate_records(records: &[IndexRecord], data_len: u64) -> Result<()> {
    for (i, record) in records.iter().enumerate() {
        match record.end() {
            Some(end) if end <= data_len => {}
            _ => {
                let (offset, length) = (record.offset, record.length);
                return Err(Error::CorruptIndex(format!(
                    "record {i} ({offset:#x}+{length:#x}) exceeds data file of {data_len} bytes"
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index_bytes(records: &[IndexRecord], trailing: usize) -> Vec<u8> {
        let mut data = vec![0u8; INDEX_HEADER_SIZE];
        for record in records {
            data.extend_from_slice(record.as_bytes());
        }
        data.extend(std::iter::repeat(0xAA).take(trailing));
        data
    }

    #[test]
    fn test_record_layout() {
        assert_eq!(IndexRecord::SIZE, 28);

        let record = IndexRecord::new(0x10, 0x20, [0xDE, 0xAD, 0xBE, 0xEF]);
        let bytes = record.as_bytes();
        assert_eq!(&bytes[4..8], &[0x10, 0, 0, 0]);
        assert_eq!(&bytes[12..16], &[0x20, 0, 0, 0]);
        assert_eq!(&bytes[20..24], &[0xDE, 0xAD, 0xBE, 0xEF]);
        assert_eq!(record.hash_hex(), "DEADBEEF");
    }

    #[test]
    fn test_record_count_follows_file_length() {
        let record = IndexRecord::new(0, 4, [1, 2, 3, 4]);
        for count in 0..6 {
            for trailing in [0, 1, 13, 27] {
                let data = index_bytes(&vec![record; count], trailing);
                let expected = (data.len() - INDEX_HEADER_SIZE) / IndexRecord::SIZE;
                let records = build_index(&data).unwrap();
                assert_eq!(records.len(), expected);
                assert_eq!(records.len(), count);
            }
        }
    }

    #[test]
    fn test_truncated_header_is_corrupt() {
        assert!(matches!(build_index(&[0u8; 71]), Err(Error::CorruptIndex(_))));
        assert!(build_index(&[0u8; 72]).unwrap().is_empty());
    }

    #[test]
    fn test_validate_records() {
        let records = [IndexRecord::new(8, 8, [0; 4]), IndexRecord::new(u32::MAX, u32::MAX, [0; 4])];
        assert!(validate_records(&records[..1], 16).is_ok());
        assert!(validate_records(&records[..1], 15).is_err());
        assert!(validate_records(&records, u64::MAX).is_ok());
        assert!(validate_records(&records, 1 << 32).is_err());
    }
}
