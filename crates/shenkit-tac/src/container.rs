//! Pack container layouts.
//!
//! Both outer pack formats end in the same inner `IPAC` directory:
//!
//! ```text
//! PAKS  magic, size, 2 x opaque u32           -> IPAC at 16
//! PAKF  magic, table size, opaque, tex count  -> texture blocks from 16,
//!                                                IPAC at table size
//! IPAC  magic, header size, count, opaque     -> count x 20-byte records
//! ```
//!
//! Everything here works on the decompressed content of one entry and
//! returns offsets relative to that content.

use shenkit_common::{BinaryReader, FourCC};
use tracing::{debug, trace};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::kind::ContainerKind;
use crate::Result;

/// Offset of the inner directory in a `PAKS` pack.
pub const PACK_A_DIRECTORY_OFFSET: usize = 16;

/// Offset of the first texture block in a `PAKF` pack.
pub const PACK_B_TABLE_OFFSET: usize = 16;

/// `PAKS` header.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct PackAHeader {
    /// `PAKS`
    pub magic: [u8; 4],
    /// Declared pack size
    pub size: u32,
    /// Unidentified
    pub unknown0: u32,
    /// Unidentified
    pub unknown1: u32,
}

/// `PAKF` header.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct PackBHeader {
    /// `PAKF`
    pub magic: [u8; 4],
    /// Size of header plus texture table; the directory starts here
    pub table_size: u32,
    /// Unidentified
    pub unknown0: u32,
    /// Number of texture blocks
    pub texture_count: u32,
}

/// `IPAC` directory header.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct DirectoryHeader {
    /// `IPAC`
    pub magic: [u8; 4],
    /// Distance from the directory start to the first record
    pub header_size: u32,
    /// Number of records
    pub count: u32,
    /// Unidentified
    pub size2: u32,
}

/// `IPAC` directory record (20 bytes on disk).
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct DirectoryRecordRaw {
    /// NUL-padded name
    pub name: [u8; 8],
    /// NUL-padded extension
    pub ext: [u8; 4],
    /// Offset from the directory start
    pub offset: u32,
    /// Byte length
    pub length: u32,
}

/// A child named by an inner directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryRecord {
    /// Child name, NULs trimmed.
    pub name: String,
    /// Child extension, NULs trimmed.
    pub ext: String,
    /// Offset within the parent content.
    pub offset: u64,
    /// Byte length.
    pub length: u64,
}

/// A texture registered by a `PAKF` texture table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureRecord {
    /// Synthetic name, tag followed by the decimal number.
    pub name: String,
    /// Offset of the texture node within the pack content.
    pub offset: u64,
}

/// Parsed layout of one container entry.
#[derive(Debug, Clone)]
pub struct ContainerLayout {
    /// Container format.
    pub kind: ContainerKind,
    /// Textures registered by the pack's texture table.
    pub textures: Vec<TextureRecord>,
    /// Children listed by the inner directory.
    pub records: Vec<DirectoryRecord>,
}

/// Parse a container's content.
pub fn parse_container(kind: ContainerKind, content: &[u8]) -> Result<ContainerLayout> {
    let (textures, directory_offset) = match kind {
        ContainerKind::PackA => {
            let mut reader = BinaryReader::new(content);
            reader.read_struct::<PackAHeader>()?;
            (Vec::new(), PACK_A_DIRECTORY_OFFSET)
        }
        ContainerKind::PackB => read_texture_table(content)?,
        ContainerKind::Directory => (Vec::new(), 0),
    };

    let records = read_directory(content, directory_offset)?;
    debug!(
        ?kind,
        textures = textures.len(),
        children = records.len(),
        "expanded container"
    );

    Ok(ContainerLayout {
        kind,
        textures,
        records,
    })
}

/// Walk a `PAKF` texture table.
///
/// Returns the registered textures and the offset of the inner directory.
pub fn read_texture_table(content: &[u8]) -> Result<(Vec<TextureRecord>, usize)> {
    let mut reader = BinaryReader::new(content);
    let header = reader.read_struct::<PackBHeader>()?;
    let (table_size, texture_count) = (header.table_size as usize, header.texture_count);

    let mut textures = Vec::new();
    if texture_count > 0 {
        let mut block_start = PACK_B_TABLE_OFFSET;
        while block_start + 8 <= content.len() {
            reader.seek(block_start);
            let tag = reader.read_fourcc()?;
            let size = reader.read_u32()? as usize;

            if tag.as_bytes()[0] == 0 || tag.as_bytes() == b"IPAC" {
                break;
            }

            match tag.as_bytes() {
                b"TEXN" => {
                    let number = reader.read_u32()?;
                    let name = reader.read_fourcc()?;
                    textures.push(TextureRecord {
                        name: format!("{}{number}", name.to_text()),
                        offset: (block_start + 8) as u64,
                    });
                }
                b"DUMY" => {}
                _ => trace!(%tag, block_start, "skipping texture table block"),
            }

            if size < 8 {
                break;
            }
            block_start += size;
        }
    }

    Ok((textures, table_size))
}

/// Read the `IPAC` directory starting at `start`.
///
/// A missing magic means the container has no children; it is not an error.
pub fn read_directory(content: &[u8], start: usize) -> Result<Vec<DirectoryRecord>> {
    let mut reader = BinaryReader::new_at(content, start);
    if reader.peek_bytes(4).map_or(true, |magic| magic != b"IPAC") {
        trace!(start, "no inner directory");
        return Ok(Vec::new());
    }

    let header = reader.read_struct::<DirectoryHeader>()?;
    let (header_size, count) = (header.header_size as usize, header.count as usize);
    reader.seek(start + header_size);

    let mut records = Vec::with_capacity(count.min(reader.remaining() / 20));
    for _ in 0..count {
        let raw = reader.read_struct::<DirectoryRecordRaw>()?;
        let mut fields = BinaryReader::new(raw.as_bytes());
        let name = fields.read_padded_name(8)?;
        let ext = fields.read_padded_name(4)?;
        let (offset, length) = (raw.offset, raw.length);

        records.push(DirectoryRecord {
            name,
            ext,
            offset: start as u64 + u64::from(offset),
            length: u64::from(length),
        });
    }

    Ok(records)
}

/// Build a directory blob. Used by fixtures in this crate and downstream.
#[doc(hidden)]
pub fn write_directory(records: &[(&str, &str, &[u8])]) -> Vec<u8> {
    let header_size = 16u32;
    let table_len = header_size as usize + records.len() * 20;
    let mut out = Vec::new();
    out.extend_from_slice(b"IPAC");
    out.extend_from_slice(&header_size.to_le_bytes());
    out.extend_from_slice(&(records.len() as u32).to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());

    let mut payload = Vec::new();
    for (name, ext, data) in records {
        let mut raw_name = [0u8; 8];
        raw_name[..name.len().min(8)].copy_from_slice(&name.as_bytes()[..name.len().min(8)]);
        let raw_ext = FourCC::from_prefix(ext.as_bytes());
        let record = DirectoryRecordRaw {
            name: raw_name,
            ext: raw_ext.0,
            offset: (table_len + payload.len()) as u32,
            length: data.len() as u32,
        };
        out.extend_from_slice(record.as_bytes());
        payload.extend_from_slice(data);
    }
    out.extend_from_slice(&payload);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::{LittleEndian, WriteBytesExt};

    fn pack_a(directory: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(b"PAKS");
        out.write_u32::<LittleEndian>((16 + directory.len()) as u32).unwrap();
        out.write_u32::<LittleEndian>(0).unwrap();
        out.write_u32::<LittleEndian>(0).unwrap();
        out.extend_from_slice(directory);
        out
    }

    #[test]
    fn test_pack_a_directory() {
        let directory = write_directory(&[("A0001", "MT5", &b"HRCM0000"[..]), ("B0002", "PVR", &b"GBIX"[..])]);
        let content = pack_a(&directory);
        let layout = parse_container(ContainerKind::PackA, &content).unwrap();

        assert!(layout.textures.is_empty());
        assert_eq!(layout.records.len(), 2);
        let first = &layout.records[0];
        assert_eq!((first.name.as_str(), first.ext.as_str()), ("A0001", "MT5"));
        let start = first.offset as usize;
        assert_eq!(&content[start..start + first.length as usize], b"HRCM0000");
        let second = &layout.records[1];
        assert_eq!(&content[second.offset as usize..][..4], b"GBIX");
    }

    #[test]
    fn test_missing_directory_magic_is_empty() {
        let mut content = pack_a(&[]);
        content.extend_from_slice(b"XXXX\x10\0\0\0\x05\0\0\0\0\0\0\0");
        let layout = parse_container(ContainerKind::PackA, &content).unwrap();
        assert!(layout.records.is_empty());
    }

    #[test]
    fn test_pack_b_texture_table() {
        let mut table = Vec::new();
        // TEXN block: tag, size, number, name, then node bytes
        table.extend_from_slice(b"TEXN");
        table.write_u32::<LittleEndian>(24).unwrap();
        table.write_u32::<LittleEndian>(12).unwrap();
        table.extend_from_slice(b"ab01");
        table.extend_from_slice(&[0xCC; 8]);
        // DUMY block is skipped
        table.extend_from_slice(b"DUMY");
        table.write_u32::<LittleEndian>(12).unwrap();
        table.write_u32::<LittleEndian>(0).unwrap();
        table.extend_from_slice(b"TEXN");
        table.write_u32::<LittleEndian>(16).unwrap();
        table.write_u32::<LittleEndian>(7).unwrap();
        table.extend_from_slice(b"cd02");
        // terminator
        table.extend_from_slice(&[0u8; 8]);

        let table_size = 16 + table.len();
        let mut content = Vec::new();
        content.extend_from_slice(b"PAKF");
        content.write_u32::<LittleEndian>(table_size as u32).unwrap();
        content.write_u32::<LittleEndian>(0).unwrap();
        content.write_u32::<LittleEndian>(2).unwrap();
        content.extend_from_slice(&table);
        content.extend_from_slice(&write_directory(&[("M0001", "MT5", &b"MDP7"[..])]));

        let layout = parse_container(ContainerKind::PackB, &content).unwrap();
        assert_eq!(
            layout.textures,
            vec![
                TextureRecord { name: "ab0112".into(), offset: 24 },
                TextureRecord { name: "cd027".into(), offset: 16 + 24 + 12 + 8 },
            ]
        );
        assert_eq!(layout.records.len(), 1);
        assert_eq!(&content[layout.records[0].offset as usize..][..4], b"MDP7");
    }

    #[test]
    fn test_texture_table_stops_on_short_block() {
        let mut content = Vec::new();
        content.extend_from_slice(b"PAKF");
        content.write_u32::<LittleEndian>(64).unwrap();
        content.write_u32::<LittleEndian>(0).unwrap();
        content.write_u32::<LittleEndian>(5).unwrap();
        content.extend_from_slice(b"TEXN");
        content.write_u32::<LittleEndian>(4).unwrap();
        content.write_u32::<LittleEndian>(1).unwrap();
        content.extend_from_slice(b"zz00");

        let (textures, directory) = read_texture_table(&content).unwrap();
        assert_eq!(textures.len(), 1);
        assert_eq!(directory, 64);
    }
}
