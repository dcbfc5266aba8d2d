//! The `TEXD` texture table.

use shenkit_common::{BinaryReader, FourCC};
use shenkit_pvr::{read_texture_node, TextureNode};
use tracing::debug;

use crate::scene::{Diagnostic, DiagnosticKind};

/// A reference to a texture stored outside the model, by synthetic name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct TextureRef {
    pub number: u32,
    pub tag: FourCC,
}

impl TextureRef {
    /// Name as registered by texture containers: tag text then number.
    pub fn name(&self) -> String {
        format!("{}{}", self.tag.to_text(), self.number)
    }
}

/// One texture slot, indexed by a strip's texture field.
#[derive(Debug, Clone, PartialEq)]
pub enum TextureSlot {
    /// Texture node stored inside the model.
    Embedded(TextureNode),
    /// Texture resolved by name from elsewhere in the archive.
    External(TextureRef),
    /// A slot whose data failed to decode.
    Placeholder { reason: String },
}

impl TextureSlot {
    #[inline]
    pub fn is_placeholder(&self) -> bool {
        matches!(self, Self::Placeholder { .. })
    }
}

const TAG_TEXN: &[u8; 4] = b"TEXN";
const TAG_NAME: &[u8; 4] = b"NAME";
const BLOCK_HEADER_SIZE: usize = 8;
const NAME_RECORD_SIZE: usize = 8;

/// Read the texture table at `offset`.
///
/// Never fails: problems become placeholder slots and diagnostics.
pub(crate) fn read_texture_table(data: &[u8], offset: usize, diagnostics: &mut Vec<Diagnostic>) -> Vec<TextureSlot> {
    let mut reader = BinaryReader::new_at(data, offset);
    let header = (|| -> shenkit_common::Result<(FourCC, u32)> {
        let magic = reader.read_fourcc()?;
        let _opaque = reader.read_u32()?;
        Ok((magic, reader.read_u32()?))
    })();

    let count = match header {
        Ok((magic, count)) if magic.as_bytes() == b"TEXD" => count,
        Ok((magic, _)) => {
            diagnostics.push(Diagnostic::new(offset, DiagnosticKind::Texture, format!("expected TEXD, found {magic}")));
            return Vec::new();
        }
        Err(e) => {
            diagnostics.push(Diagnostic::new(offset, DiagnosticKind::Texture, e));
            return Vec::new();
        }
    };
    debug!(offset, count, "reading texture table");

    let mut slots = Vec::new();
    for _ in 0..count {
        let block_start = reader.position();
        let (tag, length) = match (reader.read_fourcc(), reader.read_u32()) {
            (Ok(tag), Ok(length)) => (tag, length as usize),
            (Err(e), _) | (_, Err(e)) => {
                diagnostics.push(Diagnostic::new(block_start, DiagnosticKind::Texture, e));
                break;
            }
        };
        if length < BLOCK_HEADER_SIZE {
            diagnostics.push(Diagnostic::new(
                block_start,
                DiagnosticKind::Texture,
                format!("texture block {tag} too short ({length} bytes)"),
            ));
            break;
        }

        match tag.as_bytes() {
            TAG_TEXN => match read_texture_node(&mut reader) {
                Ok(node) => slots.push(TextureSlot::Embedded(node)),
                Err(e) => {
                    let reason = e.to_string();
                    diagnostics.push(Diagnostic::new(block_start, DiagnosticKind::Texture, &reason));
                    slots.push(TextureSlot::Placeholder { reason });
                }
            },
            TAG_NAME => {
                for _ in 0..(length - BLOCK_HEADER_SIZE) / NAME_RECORD_SIZE {
                    match (reader.read_u32(), reader.read_fourcc()) {
                        (Ok(number), Ok(tag)) => slots.push(TextureSlot::External(TextureRef { number, tag })),
                        (Err(e), _) | (_, Err(e)) => {
                            let reason = e.to_string();
                            diagnostics.push(Diagnostic::new(reader.position(), DiagnosticKind::Texture, &reason));
                            slots.push(TextureSlot::Placeholder { reason });
                            break;
                        }
                    }
                }
            }
            _ => diagnostics.push(Diagnostic::new(
                block_start,
                DiagnosticKind::Texture,
                format!("unknown texture block {tag}"),
            )),
        }
        reader.seek(block_start + length);
    }
    slots
}
