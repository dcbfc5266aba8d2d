//! Triangle strips and their on-disk encodings.

use shenkit_common::BinaryReader;
use tracing::{debug, warn};

use crate::format::LegacyFaceHeader;
use crate::{Error, Result};

/// Divisor that maps 16-bit UV fields to `[0, 1]`.
pub const UV_DIVISOR: f32 = 1023.0;

/// Vertex format with no per-vertex attributes beyond the index.
const FORMAT_INDEX_ONLY: i16 = 0x13;
/// Lowest vertex format carrying UVs.
const FORMAT_UV: i16 = 0x11;
/// Lowest vertex format carrying UVs and a colour pair.
const FORMAT_UV_COLOR: i16 = 0x1C;

/// Poly mode bit selecting mirrored UVs.
const POLY_MODE_MIRROR: i16 = 0x4;

/// Strip types followed by four opaque fields.
const TYPES_WITH_PREFIX: [i16; 3] = [0x2E, 0x2F, 0x0A];
/// Strip types with no prefix fields.
const TYPES_WITHOUT_PREFIX: [i16; 2] = [0x26, 0x02];
/// The one strip type without the two trailing opaque fields.
const TYPE_WITHOUT_SUFFIX: i16 = 0x2F;

/// Vertex count encoded by a run field: `0xFFFF - field + 1`.
///
/// The encoding covers `1..=0x10000`; a field of `0` means `0x10000`.
#[inline]
pub fn run_length(field: u16) -> usize {
    0x1_0000 - usize::from(field)
}

/// Run field that encodes `count` vertices, the inverse of [`run_length`].
#[inline]
pub fn run_field(count: usize) -> u16 {
    (0x1_0000 - count) as u16
}

/// One strip vertex.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct StripVertex {
    /// Index into the owning node's vertex array. Negative values count
    /// back from the end of the parent node's array.
    pub index: i16,
    pub uv: [f32; 2],
    /// Raw colour pair, present for the richest vertex formats.
    pub color: Option<[i16; 2]>,
}

/// A triangle strip with one texture.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Strip {
    /// Slot in the model's texture table.
    pub texture: i16,
    pub mirror_uvs: bool,
    /// Inverts the winding parity of emitted triangles.
    pub flipped: bool,
    pub vertices: Vec<StripVertex>,
}

impl Strip {
    /// Triangles as indices into [`Strip::vertices`].
    ///
    /// Winding alternates with the parity of the first vertex, inverted
    /// when the strip is flipped.
    pub fn triangles(&self) -> impl Iterator<Item = [usize; 3]> + '_ {
        (0..self.vertices.len().saturating_sub(2)).map(move |i| {
            if (i & 1 == 1) != self.flipped {
                [i, i + 1, i + 2]
            } else {
                [i, i + 2, i + 1]
            }
        })
    }
}

/// Header of a current-format strip block.
///
/// Fields the format carries but nothing interprets are kept verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct StripHeader {
    pub strip_type: i16,
    pub prefix: Option<[i16; 4]>,
    pub poly_mode: i16,
    pub opaque: [i16; 3],
    pub texture: i16,
    pub suffix: Option<[i16; 2]>,
    pub vertex_format: i16,
    pub block_size: u16,
    pub strip_count: i16,
}

impl StripHeader {
    /// Read a header starting at the strip type field.
    pub fn read(reader: &mut BinaryReader<'_>) -> Result<Self> {
        let start = reader.position();
        let strip_type = reader.read_i16()?;
        let prefix = if TYPES_WITH_PREFIX.contains(&strip_type) {
            Some(read_i16s::<4>(reader)?)
        } else {
            if !TYPES_WITHOUT_PREFIX.contains(&strip_type) {
                warn!(strip_type, offset = start, "unknown strip type");
            }
            None
        };
        let poly_mode = reader.read_i16()?;
        let opaque = read_i16s::<3>(reader)?;
        let texture = reader.read_i16()?;
        let suffix = if strip_type == TYPE_WITHOUT_SUFFIX {
            None
        } else {
            Some(read_i16s::<2>(reader)?)
        };
        Ok(Self {
            strip_type,
            prefix,
            poly_mode,
            opaque,
            texture,
            suffix,
            vertex_format: reader.read_i16()?,
            block_size: reader.read_u16()?,
            strip_count: reader.read_i16()?,
        })
    }

    #[inline]
    pub fn mirror_uvs(&self) -> bool {
        self.poly_mode & POLY_MODE_MIRROR != 0
    }
}

fn read_i16s<const N: usize>(reader: &mut BinaryReader<'_>) -> Result<[i16; N]> {
    let mut out = [0i16; N];
    for value in &mut out {
        *value = reader.read_i16()?;
    }
    Ok(out)
}

#[inline]
fn read_uv(reader: &mut BinaryReader<'_>) -> Result<[f32; 2]> {
    let u = reader.read_i16()?;
    let v = reader.read_i16()?;
    Ok([f32::from(u) / UV_DIVISOR, f32::from(v) / UV_DIVISOR])
}

/// Read one current-format strip block, positioned after its tag.
///
/// The reader always ends at the block end the header declares.
pub fn read_strip_block(reader: &mut BinaryReader<'_>) -> Result<Vec<Strip>> {
    let start = reader.position();
    let header = StripHeader::read(reader)?;
    if header.block_size < 2 {
        return Err(Error::strip(start, format!("block size {} too small", header.block_size)));
    }
    if header.strip_count < 0 {
        return Err(Error::strip(start, format!("negative strip count {}", header.strip_count)));
    }
    let end = reader.position() + usize::from(header.block_size) - 2;

    let format = header.vertex_format;
    let mut strips = Vec::with_capacity(header.strip_count as usize);
    for _ in 0..header.strip_count {
        let count = run_length(reader.read_u16()?);
        let mut vertices = Vec::with_capacity(count.min(reader.remaining() / 2));
        for _ in 0..count {
            let mut vertex = StripVertex {
                index: reader.read_i16()?,
                ..StripVertex::default()
            };
            if format != FORMAT_INDEX_ONLY {
                if format >= FORMAT_UV {
                    vertex.uv = read_uv(reader)?;
                }
                if format >= FORMAT_UV_COLOR {
                    vertex.color = Some(read_i16s::<2>(reader)?);
                }
            }
            vertices.push(vertex);
        }
        strips.push(Strip {
            texture: header.texture,
            mirror_uvs: header.mirror_uvs(),
            flipped: false,
            vertices,
        });
    }

    reader.seek(end);
    Ok(strips)
}

/// Read legacy face blocks from `start` up to `limit`.
///
/// Each block is a [`LegacyFaceHeader`] followed by runs of index/UV pairs.
/// A header without the expected marker ends the list, even the first one,
/// in which case the mesh has no faces.
pub fn read_legacy_faces(reader: &mut BinaryReader<'_>, start: usize, limit: usize) -> Result<Vec<Strip>> {
    reader.seek(start);
    let mut strips = Vec::new();
    while reader.position() < limit {
        let header_offset = reader.position();
        let header = reader.read_struct::<LegacyFaceHeader>()?;
        if header.marker() != LegacyFaceHeader::MARKER {
            debug!(offset = header_offset, marker = header.marker(), "face list ends");
            break;
        }
        let block_end = (reader.position() + usize::from(header.block_size())).saturating_sub(4);

        while reader.position() < block_end {
            let count = run_length(reader.read_u16()?);
            let mut vertices = Vec::with_capacity(count.min(reader.remaining() / 6));
            for _ in 0..count {
                let index = reader.read_i16()?;
                let u = reader.read_i16()? & 0x3FF;
                let v = reader.read_i16()? & 0x3FF;
                vertices.push(StripVertex {
                    index,
                    uv: [f32::from(u) / UV_DIVISOR, f32::from(v) / UV_DIVISOR],
                    color: None,
                });
            }
            strips.push(Strip {
                texture: header.texture(),
                mirror_uvs: false,
                flipped: false,
                vertices,
            });
        }
    }
    Ok(strips)
}

#[cfg(test)]
mod tests {
    use byteorder::{LittleEndian, WriteBytesExt};

    use super::*;

    #[test]
    fn test_run_length_round_trip() {
        for count in 1..=0x1_0000usize {
            assert_eq!(run_length(run_field(count)), count, "count {count}");
        }
        assert_eq!(run_length(0xFFFF), 1);
        assert_eq!(run_length(0), 0x1_0000);
    }

    #[test]
    fn test_triangle_parity() {
        let strip = Strip {
            vertices: vec![StripVertex::default(); 5],
            ..Strip::default()
        };
        let triangles: Vec<_> = strip.triangles().collect();
        assert_eq!(triangles, vec![[0, 2, 1], [1, 2, 3], [2, 4, 3]]);

        let flipped = Strip { flipped: true, ..strip };
        let triangles: Vec<_> = flipped.triangles().collect();
        assert_eq!(triangles, vec![[0, 1, 2], [1, 3, 2], [2, 3, 4]]);
    }

    #[test]
    fn test_short_strip_has_no_triangles() {
        let strip = Strip {
            vertices: vec![StripVertex::default(); 2],
            ..Strip::default()
        };
        assert_eq!(strip.triangles().count(), 0);
    }

    /// Build a strip block body (after the tag) with one strip.
    fn strip_block(strip_type: i16, format: i16, poly_mode: i16, indices: &[i16], padding: usize) -> Vec<u8> {
        let mut strips = Vec::new();
        strips.write_u16::<LittleEndian>(run_field(indices.len())).unwrap();
        for &index in indices {
            strips.write_i16::<LittleEndian>(index).unwrap();
            if format != FORMAT_INDEX_ONLY && format >= FORMAT_UV {
                strips.write_i16::<LittleEndian>(1023).unwrap();
                strips.write_i16::<LittleEndian>(0).unwrap();
            }
            if format != FORMAT_INDEX_ONLY && format >= FORMAT_UV_COLOR {
                strips.write_i16::<LittleEndian>(7).unwrap();
                strips.write_i16::<LittleEndian>(8).unwrap();
            }
        }
        strips.extend(std::iter::repeat(0xAA).take(padding));

        let mut out = Vec::new();
        out.write_i16::<LittleEndian>(strip_type).unwrap();
        if TYPES_WITH_PREFIX.contains(&strip_type) {
            for _ in 0..4 {
                out.write_i16::<LittleEndian>(0).unwrap();
            }
        }
        out.write_i16::<LittleEndian>(poly_mode).unwrap();
        for _ in 0..3 {
            out.write_i16::<LittleEndian>(0).unwrap();
        }
        out.write_i16::<LittleEndian>(5).unwrap(); // texture
        if strip_type != TYPE_WITHOUT_SUFFIX {
            out.write_i16::<LittleEndian>(0).unwrap();
            out.write_i16::<LittleEndian>(0).unwrap();
        }
        out.write_i16::<LittleEndian>(format).unwrap();
        out.write_u16::<LittleEndian>((strips.len() + 2) as u16).unwrap();
        out.write_i16::<LittleEndian>(1).unwrap();
        out.extend(strips);
        out
    }

    #[test]
    fn test_strip_block_with_colors() {
        let data = strip_block(0x2E, 0x1C, 0x4, &[0, 1, -1], 0);
        let mut reader = BinaryReader::new(&data);
        let strips = read_strip_block(&mut reader).unwrap();
        assert_eq!(reader.position(), data.len());

        assert_eq!(strips.len(), 1);
        let strip = &strips[0];
        assert_eq!(strip.texture, 5);
        assert!(strip.mirror_uvs);
        assert_eq!(strip.vertices.len(), 3);
        assert_eq!(strip.vertices[2].index, -1);
        assert_eq!(strip.vertices[0].uv, [1.0, 0.0]);
        assert_eq!(strip.vertices[0].color, Some([7, 8]));
    }

    #[test]
    fn test_strip_block_seeks_to_declared_end() {
        let data = strip_block(0x2F, 0x13, 0, &[3, 4, 5, 6], 6);
        let mut reader = BinaryReader::new(&data);
        let strips = read_strip_block(&mut reader).unwrap();
        assert_eq!(reader.position(), data.len());
        assert!(!strips[0].mirror_uvs);
        assert_eq!(strips[0].vertices.iter().map(|v| v.index).collect::<Vec<_>>(), vec![3, 4, 5, 6]);
        assert!(strips[0].vertices.iter().all(|v| v.color.is_none() && v.uv == [0.0, 0.0]));
    }

    #[test]
    fn test_unknown_strip_type_continues() {
        let data = strip_block(0x55, 0x11, 0, &[0, 1, 2], 0);
        let mut reader = BinaryReader::new(&data);
        let strips = read_strip_block(&mut reader).unwrap();
        assert_eq!(strips[0].vertices.len(), 3);
        assert_eq!(strips[0].vertices[1].color, None);
    }

    #[test]
    fn test_legacy_faces() {
        let mut data = Vec::new();
        let mut body = Vec::new();
        body.write_u16::<LittleEndian>(run_field(3)).unwrap();
        for (index, u) in [(0i16, 0x7FFi16), (1, 1023), (2, 0)] {
            body.write_i16::<LittleEndian>(index).unwrap();
            body.write_i16::<LittleEndian>(u).unwrap();
            body.write_i16::<LittleEndian>(0).unwrap();
        }
        let mut fields = [0i16; 17];
        fields[1] = LegacyFaceHeader::MARKER;
        fields[11] = 9;
        fields[15] = (body.len() + 4) as i16;
        for field in fields {
            data.write_i16::<LittleEndian>(field).unwrap();
        }
        data.extend(body);
        let limit = data.len();

        let mut reader = BinaryReader::new(&data);
        let strips = read_legacy_faces(&mut reader, 0, limit).unwrap();
        assert_eq!(strips.len(), 1);
        assert_eq!(strips[0].texture, 9);
        assert_eq!(strips[0].vertices.len(), 3);
        // 0x7FF masked to 0x3FF.
        assert_eq!(strips[0].vertices[0].uv[0], 1.0);
        assert_eq!(strips[0].vertices[1].uv[0], 1.0);
    }

    #[test]
    fn test_legacy_faces_without_marker_are_empty() {
        let mut data = Vec::new();
        for field in [0i16; 17] {
            data.write_i16::<LittleEndian>(field).unwrap();
        }
        data.extend_from_slice(&[0xAA; 8]);
        let limit = data.len();

        let mut reader = BinaryReader::new(&data);
        assert!(read_legacy_faces(&mut reader, 0, limit).unwrap().is_empty());
    }
}
