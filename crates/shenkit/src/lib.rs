//! Shenkit - archive, model and texture extraction for Shenmue game data.
//!
//! This crate ties the format crates together:
//!
//! - [`shenkit_common`] - Binary reading and byte sources
//! - [`shenkit_tac`] - TAC/TAD archives and nested pack containers
//! - [`shenkit_mt`] - Model scene graphs and meshes
//! - [`shenkit_pvr`] - PVR textures
//! - [`shenkit_chrt`] - Character placement scenes
//!
//! On top of them it resolves a model's external texture references through
//! the archive's texture-name index ([`import_model`]) and matches scene
//! characters to their models ([`place_characters`]).
//!
//! # Example
//!
//! ```no_run
//! use shenkit::prelude::*;
//!
//! let resolver = ArchiveResolver::open(&[SourceRoot::new("s1", "data/scene")], ResolverOptions::default())?;
//! for &id in resolver.list_entries(FileKind::Model) {
//!     let model = import_model(&resolver, id, default_scope(&resolver, id))?;
//!     println!("{}: {}", resolver.entry(id).unwrap().path, model.report);
//! }
//! # Ok::<(), shenkit::Error>(())
//! ```

mod error;
mod import;
mod placement;

pub use shenkit_chrt as chrt;
pub use shenkit_common as common;
pub use shenkit_mt as mt;
pub use shenkit_pvr as pvr;
pub use shenkit_tac as tac;

pub use error::{Error, Result};
pub use import::{default_scope, import_model, ImportReport, ImportedModel, ResolvedTexture, TextureOrigin};
pub use placement::{load_character_scene, map_models, place_characters, scene_containers, Placement};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::{
        default_scope, import_model, load_character_scene, place_characters, scene_containers, ImportReport,
        ImportedModel, Placement,
    };
    pub use shenkit_chrt::{parse_chrt, CharacterScene};
    pub use shenkit_common::{BinaryReader, ByteSource, FourCC};
    pub use shenkit_mt::{decode_scene, MeshFormat, SceneGraph};
    pub use shenkit_pvr::{decode_pvr, decode_texture, Texture};
    pub use shenkit_tac::{ArchiveResolver, EntryId, FileKind, ResolverOptions, SourceRoot, TextureScope};
}

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use shenkit_tac::container::write_directory;
    use shenkit_tac::{IndexRecord, INDEX_HEADER_SIZE};
    use zerocopy::IntoBytes;

    use super::prelude::*;
    use super::*;

    fn write_archive(dir: &Path, stem: &str, blobs: &[([u8; 4], Vec<u8>)]) {
        let mut data = Vec::new();
        let mut index = vec![0u8; INDEX_HEADER_SIZE];
        for (hash, blob) in blobs {
            index.extend_from_slice(IndexRecord::new(data.len() as u32, blob.len() as u32, *hash).as_bytes());
            data.extend_from_slice(blob);
        }
        fs::write(dir.join(format!("{stem}.tac")), &data).unwrap();
        fs::write(dir.join(format!("{stem}.tad")), &index).unwrap();
    }

    fn open(dir: &Path) -> ArchiveResolver {
        ArchiveResolver::open(&[SourceRoot::new("s1", dir)], ResolverOptions::default()).unwrap()
    }

    fn u32s(values: &[u32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    /// Model header plus one childless, meshless node, then `textures`.
    fn model(textures: &[u8]) -> Vec<u8> {
        let texture_offset = if textures.is_empty() { 0 } else { 12 + 68 };
        let mut out = b"HRCM".to_vec();
        out.extend(u32s(&[texture_offset, 12]));
        out.extend(u32s(&[1, 0, 0, 0, 0]));
        out.extend(1.0f32.to_le_bytes().repeat(3));
        out.extend([0u8; 12]);
        out.extend(u32s(&[0, 0, 0]));
        out.extend_from_slice(b"ROOT");
        out.extend(u32s(&[0, 0]));
        assert_eq!(out.len(), 80);
        out.extend_from_slice(textures);
        out
    }

    /// A 2x2 RGB565 texture node named `tag + number`.
    fn texture_node(number: u32, tag: &[u8; 4], texel: u16) -> Vec<u8> {
        let mut out = u32s(&[number]);
        out.extend_from_slice(tag);
        out.extend_from_slice(b"PVRT");
        out.extend(u32s(&[16]));
        out.extend([1, 1, 0, 0]);
        out.extend(2u16.to_le_bytes());
        out.extend(2u16.to_le_bytes());
        out.extend(texel.to_le_bytes().repeat(4));
        out
    }

    fn texture_pack(textures: &[Vec<u8>], directory: &[u8]) -> Vec<u8> {
        let mut table = Vec::new();
        for node in textures {
            table.extend_from_slice(b"TEXN");
            table.extend(u32s(&[node.len() as u32 + 8]));
            table.extend_from_slice(node);
        }
        let mut out = b"PAKF".to_vec();
        out.extend(u32s(&[16 + table.len() as u32, 0, textures.len() as u32]));
        out.extend(table);
        out.extend_from_slice(directory);
        out
    }

    #[test]
    fn test_single_node_scene_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        write_archive(dir.path(), "A0001", &[([0xDE, 0xAD, 0xBE, 0xEF], model(&[]))]);

        let resolver = open(dir.path());
        let id = resolver.resolve("s1/A0001/DEADBEEF").unwrap();
        assert_eq!(resolver.list_entries(FileKind::Model), &[id]);

        let scene = decode_scene(&resolver.open_entry(id).unwrap()).unwrap();
        assert_eq!(scene.len(), 1);
        assert!(scene.root_node().mesh.is_none());
        assert!(scene.diagnostics.is_empty());

        let imported = import_model(&resolver, id, default_scope(&resolver, id)).unwrap();
        assert!(imported.report.is_clean());
        assert_eq!(imported.report.nodes_decoded, 1);
        assert!(imported.textures.is_empty());
    }

    #[test]
    fn test_external_textures_resolve_in_scope() {
        let dir = tempfile::tempdir().unwrap();

        let mut names = b"TEXD".to_vec();
        names.extend(u32s(&[0, 1]));
        names.extend_from_slice(b"NAME");
        names.extend(u32s(&[8 + 16, 12]));
        names.extend_from_slice(b"AKI_");
        names.extend(u32s(&[9]));
        names.extend_from_slice(b"MISS");
        let akira = model(&names);

        // Two packs register AKI_12; the model's own pack holds the white one.
        let own = texture_pack(
            &[texture_node(12, b"AKI_", 0xFFFF)],
            &write_directory(&[("AKIRA", "MT5", akira.as_slice())]),
        );
        let other = texture_pack(&[texture_node(12, b"AKI_", 0x0000)], &write_directory(&[]));
        write_archive(dir.path(), "A0002", &[([1, 2, 3, 4], own), ([5, 6, 7, 8], other)]);

        let resolver = open(dir.path());
        let pack = resolver.resolve("s1/A0002/01020304").unwrap();
        let id = resolver.resolve("s1/A0002/01020304_AKIRA").unwrap();
        assert_eq!(default_scope(&resolver, id), TextureScope::Container(pack));

        let imported = import_model(&resolver, id, default_scope(&resolver, id)).unwrap();
        assert_eq!(imported.textures.len(), 2);

        let found = &imported.textures[0];
        assert_eq!(found.name.as_deref(), Some("AKI_12"));
        assert_eq!(found.origin, TextureOrigin::External(pack));
        assert_eq!(found.texture.texel(0, 0), Some([1.0; 4]));

        let missing = &imported.textures[1];
        assert_eq!(missing.origin, TextureOrigin::Missing);
        assert!(missing.texture.is_placeholder());

        assert_eq!(imported.report.textures_decoded, 1);
        assert_eq!(imported.report.textures_missing, 1);
        assert!(!imported.report.is_clean());

        // Unscoped lookups take the most recent registration.
        let global = import_model(&resolver, id, TextureScope::Global).unwrap();
        assert_eq!(global.textures[0].texture.texel(0, 0), Some([0.0, 0.0, 0.0, 1.0]));
    }

    #[test]
    fn test_characters_placed_on_pack_models() {
        let dir = tempfile::tempdir().unwrap();

        // Properties, then a string pool for the long names. Offsets are
        // relative to each field.
        let mut body = Vec::new();
        let mut pool: Vec<(usize, &str)> = Vec::new();
        let mut string = |body: &mut Vec<u8>, text: &'static str| {
            if text.len() == 4 {
                body.extend_from_slice(text.as_bytes());
            } else {
                pool.push((body.len(), text));
                body.extend([0u8; 4]);
            }
        };
        string(&mut body, "DEFIMAGE");
        body.extend(u32s(&[35]));
        string(&mut body, "IMG1");
        body.extend(u32s(&[0]));
        string(&mut body, "IMAGE");
        body.extend(u32s(&[25]));
        body.extend(1.0f32.to_le_bytes());
        string(&mut body, "$chr/ine_a.mt5");
        string(&mut body, "CHARACTER");
        body.extend(u32s(&[34]));
        string(&mut body, "INE_");
        body.extend(u32s(&[0]));
        string(&mut body, "IMAGE");
        body.extend(u32s(&[3]));
        string(&mut body, "IMG1");
        string(&mut body, "POSITION");
        body.extend(u32s(&[0]));
        for v in [1.0f32, 2.0, 3.0] {
            body.extend(v.to_le_bytes());
        }
        let mut strings = Vec::new();
        let body_len = body.len();
        for (field, text) in pool {
            let relative = (body_len + strings.len() - field) as u32;
            body[field..field + 4].copy_from_slice(&relative.to_le_bytes());
            strings.extend_from_slice(text.as_bytes());
            strings.push(0);
        }
        let mut chrs = b"CHRS".to_vec();
        chrs.extend(u32s(&[body_len as u32 + 8]));
        chrs.extend(body);
        chrs.extend(strings);

        let ine = model(&[]);
        let directory = write_directory(&[("INE_A", "MT5", ine.as_slice()), ("SCENE", "CHR", chrs.as_slice())]);
        let mut pack = b"PAKS".to_vec();
        pack.extend(u32s(&[16 + directory.len() as u32, 0, 0]));
        pack.extend(directory);
        write_archive(dir.path(), "A0003", &[([0xAA, 0, 0, 1], pack)]);

        let resolver = open(dir.path());
        let pack = resolver.resolve("s1/A0003/AA000001").unwrap();
        let scene_id = resolver.resolve("s1/A0003/AA000001_SCENE").unwrap();
        let model_id = resolver.resolve("s1/A0003/AA000001_INE_A").unwrap();

        let scene = load_character_scene(&resolver, scene_id).unwrap();
        assert_eq!(scene_containers(&resolver, &scene), vec![pack]);

        let placements = place_characters(&resolver, &scene, pack);
        assert_eq!(
            placements,
            vec![Placement {
                character: "INE_".to_owned(),
                image: Some("IMG1".to_owned()),
                model: model_id,
                position: [1.0, 2.0, 3.0],
                angles: [0.0; 3],
            }]
        );
        assert!(map_models(&resolver, pack).is_empty());
    }
}
