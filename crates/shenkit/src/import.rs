//! Model import with texture resolution.

use std::fmt;

use shenkit_mt::{decode_scene, DiagnosticKind, SceneGraph, TextureSlot};
use shenkit_pvr::{decode_texture_node, PixelColorFormat, PixelStorageFormat, Texture};
use shenkit_tac::{ArchiveResolver, EntryId, TextureScope};
use tracing::{debug, warn};

use crate::Result;

/// Where a model's texture came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureOrigin {
    /// Stored in the model's own texture table.
    Embedded,
    /// Found by name in a pack's texture table.
    External(EntryId),
    /// Referenced by name but not registered anywhere.
    Missing,
    /// Present but undecodable.
    Placeholder,
}

/// A texture slot after resolution. Every slot holds a texture; missing or
/// broken ones get a placeholder.
#[derive(Debug, Clone)]
pub struct ResolvedTexture {
    /// Synthetic `tag + number` name, when the slot has one.
    pub name: Option<String>,
    pub origin: TextureOrigin,
    pub texture: Texture,
}

/// Counts of what an import decoded and what it had to skip.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ImportReport {
    pub nodes_decoded: usize,
    pub nodes_failed: usize,
    pub meshes: usize,
    pub meshes_dropped: usize,
    pub triangles: usize,
    pub textures_decoded: usize,
    pub textures_placeholder: usize,
    pub textures_missing: usize,
    /// Human-readable problems, model diagnostics first.
    pub diagnostics: Vec<String>,
}

impl ImportReport {
    /// Whether everything decoded without a placeholder or a skip.
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty() && self.textures_placeholder == 0 && self.textures_missing == 0
    }
}

impl fmt::Display for ImportReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "nodes {} ok / {} failed, meshes {} ok / {} dropped, {} triangles, textures {} ok / {} placeholder / {} missing",
            self.nodes_decoded,
            self.nodes_failed,
            self.meshes,
            self.meshes_dropped,
            self.triangles,
            self.textures_decoded,
            self.textures_placeholder,
            self.textures_missing,
        )
    }
}

/// A decoded model with its textures resolved.
#[derive(Debug, Clone)]
pub struct ImportedModel {
    pub entry: EntryId,
    pub scene: SceneGraph,
    /// One per texture table slot, in slot order.
    pub textures: Vec<ResolvedTexture>,
    pub report: ImportReport,
}

/// Scope a model's texture lookups to the container it sits in.
pub fn default_scope(resolver: &ArchiveResolver, id: EntryId) -> TextureScope {
    resolver
        .entry(id)
        .and_then(|entry| entry.parent)
        .map_or(TextureScope::Global, TextureScope::Container)
}

/// Decode the model entry `id` and resolve its texture table.
///
/// External texture names are looked up under `scope`. Only failures that
/// leave no model at all are errors; everything else lands in the report.
pub fn import_model(resolver: &ArchiveResolver, id: EntryId, scope: TextureScope) -> Result<ImportedModel> {
    let source = resolver.open_entry(id)?;
    let scene = decode_scene(&source)?;

    let mut report = ImportReport {
        nodes_decoded: scene.len(),
        meshes: scene.mesh_count(),
        triangles: scene.triangle_count(),
        ..ImportReport::default()
    };
    for diagnostic in &scene.diagnostics {
        match diagnostic.kind {
            DiagnosticKind::MalformedNode => report.nodes_failed += 1,
            DiagnosticKind::MalformedStrip | DiagnosticKind::UnknownMeshBlockTag => report.meshes_dropped += 1,
            DiagnosticKind::Texture => {}
        }
        report.diagnostics.push(diagnostic.to_string());
    }

    let textures: Vec<ResolvedTexture> = scene
        .textures
        .iter()
        .map(|slot| resolve_slot(resolver, slot, scope, &mut report))
        .collect();

    debug!(entry = %id, %report, "imported model");
    Ok(ImportedModel {
        entry: id,
        scene,
        textures,
        report,
    })
}

fn resolve_slot(
    resolver: &ArchiveResolver,
    slot: &TextureSlot,
    scope: TextureScope,
    report: &mut ImportReport,
) -> ResolvedTexture {
    match slot {
        TextureSlot::Embedded(node) => {
            count_decoded(report, &node.texture);
            ResolvedTexture {
                name: Some(node.synthetic_name()),
                origin: TextureOrigin::Embedded,
                texture: node.texture.clone(),
            }
        }
        TextureSlot::External(reference) => {
            let name = reference.name();
            let Some(found) = resolver.texture_entry(&name, scope) else {
                warn!(texture = %name, "texture not registered");
                report.textures_missing += 1;
                report.diagnostics.push(format!("texture {name} not found"));
                return ResolvedTexture {
                    name: Some(name),
                    origin: TextureOrigin::Missing,
                    texture: missing_texture(),
                };
            };
            let decoded = resolver
                .texture_source(&name, scope)
                .map_err(crate::Error::from)
                .and_then(|source| Ok(decode_texture_node(&source)?));
            match decoded {
                Ok(node) => {
                    count_decoded(report, &node.texture);
                    ResolvedTexture {
                        name: Some(name),
                        origin: TextureOrigin::External(found.entry),
                        texture: node.texture,
                    }
                }
                Err(e) => {
                    warn!(texture = %name, error = %e, "texture failed to decode");
                    report.textures_placeholder += 1;
                    report.diagnostics.push(format!("texture {name}: {e}"));
                    ResolvedTexture {
                        name: Some(name),
                        origin: TextureOrigin::Placeholder,
                        texture: missing_texture(),
                    }
                }
            }
        }
        TextureSlot::Placeholder { .. } => {
            report.textures_placeholder += 1;
            ResolvedTexture {
                name: None,
                origin: TextureOrigin::Placeholder,
                texture: missing_texture(),
            }
        }
    }
}

fn count_decoded(report: &mut ImportReport, texture: &Texture) {
    if texture.is_placeholder() {
        report.textures_placeholder += 1;
    } else {
        report.textures_decoded += 1;
    }
}

/// A 1x1 placeholder for slots with no texture data at all.
fn missing_texture() -> Texture {
    Texture::placeholder(1, 1, PixelColorFormat::Unknown(0xFF), PixelStorageFormat::Unknown(0xFF))
}
