//! String fields.

use shenkit_common::{BinaryReader, Error, Result};

/// Read a 4-byte string field.
///
/// When any of the top 8 bits are set the field is the string itself,
/// four ASCII bytes. Otherwise it is an offset, relative to the field, of a
/// NUL-terminated string elsewhere in the block. Either way the reader ends
/// just past the field.
pub fn read_string_field(reader: &mut BinaryReader<'_>) -> Result<String> {
    let field_offset = reader.position();
    let value = reader.read_u32()?;
    if value & 0xFF00_0000 != 0 {
        return Ok(inline_text(&value.to_le_bytes()));
    }

    let target = field_offset
        .checked_add(value as usize)
        .ok_or(Error::OutOfBounds {
            offset: field_offset,
            end: usize::MAX,
            len: reader.len(),
        })?;
    Ok(reader.read_cstring_at(target)?.to_owned())
}

fn inline_text(bytes: &[u8; 4]) -> String {
    let end = bytes.iter().rposition(|&b| b != 0).map_or(0, |p| p + 1);
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}
