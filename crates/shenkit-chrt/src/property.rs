//! Scene properties and their payloads.

use shenkit_common::BinaryReader;
use tracing::debug;

use crate::string::read_string_field;
use crate::Result;

/// Value that usually follows `DEFIMAGE`.
pub const DEFIMAGE_MARKER: u32 = 35;
/// Value that usually follows `CHARACTER`.
pub const CHARACTER_MARKER: u32 = 34;
/// `IMAGE` kind naming a model file.
pub const IMAGE_KIND_MODEL: u32 = 25;
/// `IMAGE` kind naming an earlier image definition.
pub const IMAGE_KIND_REFERENCE: u32 = 3;
/// `ANGLE` kind carrying only the Y rotation.
pub const ANGLE_KIND_Y_ONLY: u32 = 1;

/// What an `IMAGE` property points at.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum ImageSource {
    /// A model file path.
    Model { scale: f32, path: String },
    /// The id of an image definition.
    Reference(String),
    /// A kind with no known payload.
    Other(u32),
}

/// One property with its payload.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Property {
    DefImage { marker: u32, id: String, value: u32 },
    Image(ImageSource),
    Character { marker: u32, id: String, value: u32 },
    Position { value: u32, position: [f32; 3] },
    Angle { kind: u32, angles: [f32; 3] },
    Scale([f32; 4]),
    Size([f32; 3]),
    Height { values: [f32; 3], flags: u32, name: String, extra: u32 },
    Range { start: u32, end: u32 },
    Object(u32),
    Adjust { value: u32, name: String },
    Disp,
    Sleep,
    Flags(u32),
    ShadowOff(u32),
    Shadow([u32; 2]),
    ColiOff(u32),
    Coli([u32; 2]),
}

impl Property {
    /// Read the payload of the property called `name`.
    ///
    /// Returns `None` for names with no known payload; the reader is left
    /// untouched in that case.
    pub fn read(name: &str, reader: &mut BinaryReader<'_>) -> Result<Option<Self>> {
        let property = match name.to_ascii_uppercase().as_str() {
            "DEFIMAGE" => {
                let marker = expect(reader, name, DEFIMAGE_MARKER)?;
                Self::DefImage {
                    marker,
                    id: read_string_field(reader)?,
                    value: reader.read_u32()?,
                }
            }
            "IMAGE" => Self::Image(match reader.read_u32()? {
                IMAGE_KIND_MODEL => ImageSource::Model {
                    scale: reader.read_f32()?,
                    path: read_string_field(reader)?,
                },
                IMAGE_KIND_REFERENCE => ImageSource::Reference(read_string_field(reader)?),
                other => {
                    debug!(kind = other, "unexpected image kind");
                    ImageSource::Other(other)
                }
            }),
            "CHARACTER" => {
                let marker = expect(reader, name, CHARACTER_MARKER)?;
                Self::Character {
                    marker,
                    id: read_string_field(reader)?,
                    value: reader.read_u32()?,
                }
            }
            "POSITION" => Self::Position {
                value: reader.read_u32()?,
                position: reader.read_vec3()?,
            },
            "ANGLE" => {
                let kind = reader.read_u32()?;
                let angles = if kind == ANGLE_KIND_Y_ONLY {
                    [0.0, reader.read_f32()?, 0.0]
                } else {
                    reader.read_vec3()?
                };
                Self::Angle { kind, angles }
            }
            "SCALE" => Self::Scale(read_f32s(reader)?),
            "SIZE" => Self::Size(reader.read_vec3()?),
            "HEIGHT" => Self::Height {
                values: reader.read_vec3()?,
                flags: reader.read_u32()?,
                name: read_string_field(reader)?,
                extra: reader.read_u32()?,
            },
            "RANGE" => Self::Range {
                start: reader.read_u32()?,
                end: reader.read_u32()?,
            },
            "OBJECT" => Self::Object(reader.read_u32()?),
            "ADJUST" => Self::Adjust {
                value: reader.read_u32()?,
                name: read_string_field(reader)?,
            },
            "DISP" => Self::Disp,
            "SLEEP" => Self::Sleep,
            "FLAGS" => Self::Flags(reader.read_u32()?),
            "SHADOWOFF" => Self::ShadowOff(reader.read_u32()?),
            "SHADOW" => Self::Shadow([reader.read_u32()?, reader.read_u32()?]),
            "COLIOFF" => Self::ColiOff(reader.read_u32()?),
            "COLI" => Self::Coli([reader.read_u32()?, reader.read_u32()?]),
            _ => return Ok(None),
        };
        Ok(Some(property))
    }
}

fn expect(reader: &mut BinaryReader<'_>, name: &str, usual: u32) -> Result<u32> {
    let value = reader.read_u32()?;
    if value != usual {
        debug!(property = name, value, usual, "unexpected marker");
    }
    Ok(value)
}

fn read_f32s<const N: usize>(reader: &mut BinaryReader<'_>) -> Result<[f32; N]> {
    let mut out = [0.0; N];
    for value in &mut out {
        *value = reader.read_f32()?;
    }
    Ok(out)
}
