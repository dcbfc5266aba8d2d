//! `CHRS` blocks.

use shenkit_common::{BinaryReader, ByteSource, FourCC};
use tracing::{debug, warn};

use crate::property::{ImageSource, Property};
use crate::string::read_string_field;
use crate::{Error, Result};

/// An image definition or a placed character.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ChrtNode {
    pub id: String,
    /// Model name: the file stem of the model path.
    pub model: Option<String>,
    /// Id of the image definition a character uses.
    pub image: Option<String>,
    pub position: [f32; 3],
    /// Euler angles as stored.
    pub angles: [f32; 3],
}

/// A parsed character scene.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct CharacterScene {
    /// `DEFIMAGE` entries in file order.
    pub images: Vec<ChrtNode>,
    /// `CHARACTER` entries in file order.
    pub characters: Vec<ChrtNode>,
    /// Every property read, in file order.
    pub properties: Vec<Property>,
    /// Name of the unknown property that ended parsing early, if any.
    pub stopped_at: Option<String>,
}

impl CharacterScene {
    /// Model names of the image definitions.
    pub fn model_names(&self) -> impl Iterator<Item = &str> {
        self.images.iter().filter_map(|image| image.model.as_deref())
    }

    pub fn image(&self, id: &str) -> Option<&ChrtNode> {
        self.images.iter().find(|image| image.id == id)
    }
}

/// Strip a model path to its name: leading `$`, directory and extension go.
pub fn model_name(path: &str) -> &str {
    let path = path.trim_start_matches('$');
    let file = path.rsplit(['/', '\\']).next().unwrap_or(path);
    match file.rfind('.') {
        Some(dot) if dot > 0 => &file[..dot],
        _ => file,
    }
}

#[derive(Clone, Copy)]
enum Current {
    Image(usize),
    Character(usize),
}

/// Parse a `CHRS` block at the source's cursor.
pub fn parse_chrt(source: &ByteSource) -> Result<CharacterScene> {
    let mut reader = source.reader();
    read_chrt(&mut reader)
}

/// Parse a `CHRS` block from a reader positioned at its magic.
pub fn read_chrt(reader: &mut BinaryReader<'_>) -> Result<CharacterScene> {
    let magic = reader.read_fourcc()?;
    if magic != FourCC(*b"CHRS") {
        return Err(Error::InvalidMagic(magic));
    }
    let end = (reader.position() + reader.read_u32()? as usize)
        .saturating_sub(4)
        .min(reader.len());

    let mut scene = CharacterScene::default();
    let mut current: Option<Current> = None;
    while reader.position() < end {
        let offset = reader.position();
        let name = read_string_field(reader)?;
        let Some(property) = Property::read(&name, reader)? else {
            warn!(property = %name, offset, "unknown property, stopping");
            scene.stopped_at = Some(name);
            break;
        };
        apply(&mut scene, &mut current, &property);
        scene.properties.push(property);
    }

    debug!(
        images = scene.images.len(),
        characters = scene.characters.len(),
        properties = scene.properties.len(),
        "parsed character scene"
    );
    Ok(scene)
}

/// Fold a property into the image or character it belongs to.
fn apply(scene: &mut CharacterScene, current: &mut Option<Current>, property: &Property) {
    match property {
        Property::DefImage { id, .. } => {
            scene.images.push(ChrtNode {
                id: id.clone(),
                ..ChrtNode::default()
            });
            *current = Some(Current::Image(scene.images.len() - 1));
        }
        Property::Character { id, .. } => {
            scene.characters.push(ChrtNode {
                id: id.clone(),
                ..ChrtNode::default()
            });
            *current = Some(Current::Character(scene.characters.len() - 1));
        }
        Property::Image(source) => {
            let (model, image) = match source {
                ImageSource::Model { path, .. } => (Some(model_name(path).to_owned()), None),
                ImageSource::Reference(id) => match scene.image(id) {
                    Some(image) => (image.model.clone(), Some(image.id.clone())),
                    None => return,
                },
                ImageSource::Other(_) => return,
            };
            if let Some(node) = node_mut(scene, *current) {
                node.model = model;
                if image.is_some() {
                    node.image = image;
                }
            }
        }
        Property::Position { position, .. } => {
            if let Some(node) = node_mut(scene, *current) {
                node.position = *position;
            }
        }
        Property::Angle { angles, .. } => {
            if let Some(node) = node_mut(scene, *current) {
                node.angles = *angles;
            }
        }
        _ => {}
    }
}

fn node_mut(scene: &mut CharacterScene, current: Option<Current>) -> Option<&mut ChrtNode> {
    match current? {
        Current::Image(index) => scene.images.get_mut(index),
        Current::Character(index) => scene.characters.get_mut(index),
    }
}

#[cfg(test)]
mod tests {
    use byteorder::{LittleEndian, WriteBytesExt};

    use super::*;

    /// Builds a `CHRS` block. Long strings go to a pool after the
    /// properties and are referenced by offset.
    #[derive(Default)]
    struct Builder {
        body: Vec<u8>,
        pool: Vec<(usize, String)>,
    }

    impl Builder {
        fn string(&mut self, text: &str) -> &mut Self {
            if text.len() == 4 {
                self.body.extend_from_slice(text.as_bytes());
            } else {
                self.pool.push((self.body.len(), text.to_owned()));
                self.body.extend_from_slice(&[0; 4]);
            }
            self
        }

        fn u32(&mut self, value: u32) -> &mut Self {
            self.body.write_u32::<LittleEndian>(value).unwrap();
            self
        }

        fn f32(&mut self, value: f32) -> &mut Self {
            self.body.write_f32::<LittleEndian>(value).unwrap();
            self
        }

        fn build(&self) -> Vec<u8> {
            // Fields are relative to the block body, which starts after the
            // 8-byte header.
            let mut body = self.body.clone();
            let mut strings = Vec::new();
            for (field, text) in &self.pool {
                let target = body.len() + strings.len();
                let relative = (target - field) as u32;
                body[*field..field + 4].copy_from_slice(&relative.to_le_bytes());
                strings.extend_from_slice(text.as_bytes());
                strings.push(0);
            }
            let mut out = b"CHRS".to_vec();
            out.write_u32::<LittleEndian>(self.body.len() as u32 + 8).unwrap();
            out.extend(body);
            out.extend(strings);
            out
        }
    }

    #[test]
    fn test_model_name() {
        assert_eq!(model_name("$data/model/akira.mt5"), "akira");
        assert_eq!(model_name("C:\\chr\\ine_a.MT5"), "ine_a");
        assert_eq!(model_name("plain"), "plain");
        assert_eq!(model_name(".hidden"), ".hidden");
    }

    #[test]
    fn test_parse_scene() {
        let mut builder = Builder::default();
        builder
            .string("DEFIMAGE")
            .u32(crate::DEFIMAGE_MARKER)
            .string("IMG1")
            .u32(0)
            .string("IMAGE")
            .u32(25)
            .f32(1.0)
            .string("$chr/model/ine_a.mt5")
            .string("CHARACTER")
            .u32(34)
            .string("INE_")
            .u32(7)
            .string("IMAGE")
            .u32(3)
            .string("IMG1")
            .string("POSITION")
            .u32(0)
            .f32(1.0)
            .f32(2.0)
            .f32(3.0)
            .string("ANGLE")
            .u32(1)
            .f32(90.0)
            .string("DISP")
            .string("COLI")
            .u32(4)
            .u32(5);
        let data = builder.build();

        let scene = parse_chrt(&ByteSource::from_vec(data)).unwrap();
        assert_eq!(scene.stopped_at, None);
        assert_eq!(scene.properties.len(), 8);
        assert_eq!(scene.model_names().collect::<Vec<_>>(), vec!["ine_a"]);

        let character = &scene.characters[0];
        assert_eq!(character.id, "INE_");
        assert_eq!(character.model.as_deref(), Some("ine_a"));
        assert_eq!(character.image.as_deref(), Some("IMG1"));
        assert_eq!(character.position, [1.0, 2.0, 3.0]);
        assert_eq!(character.angles, [0.0, 90.0, 0.0]);
        assert_eq!(scene.properties[7], Property::Coli([4, 5]));
    }

    #[test]
    fn test_unknown_property_stops() {
        let mut builder = Builder::default();
        builder.string("FLAGS").u32(1).string("WHAT").u32(9).string("DISP");
        let scene = parse_chrt(&ByteSource::from_vec(builder.build())).unwrap();
        assert_eq!(scene.properties, vec![Property::Flags(1)]);
        assert_eq!(scene.stopped_at.as_deref(), Some("WHAT"));
    }

    #[test]
    fn test_bad_magic() {
        let data = b"CHRT\x08\0\0\0".to_vec();
        assert!(matches!(parse_chrt(&ByteSource::from_vec(data)), Err(Error::InvalidMagic(_))));
    }
}
