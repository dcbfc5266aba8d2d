//! Placing characters from a `CHRS` scene onto models in a pack.

use shenkit_chrt::{parse_chrt, CharacterScene};
use shenkit_tac::{ArchiveResolver, EntryId, FileKind};

use crate::Result;

/// A character matched to the model entry that draws it.
#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    pub character: String,
    pub image: Option<String>,
    pub model: EntryId,
    pub position: [f32; 3],
    pub angles: [f32; 3],
}

/// Parse the character scene stored in entry `id`.
pub fn load_character_scene(resolver: &ArchiveResolver, id: EntryId) -> Result<CharacterScene> {
    Ok(parse_chrt(&resolver.open_entry(id)?)?)
}

/// Packs holding a model for every image the scene defines.
pub fn scene_containers(resolver: &ArchiveResolver, scene: &CharacterScene) -> Vec<EntryId> {
    resolver.find_container_candidates(scene.model_names())
}

/// Map-geometry models directly inside `pack`.
pub fn map_models(resolver: &ArchiveResolver, pack: EntryId) -> Vec<EntryId> {
    children(resolver, pack)
        .filter(|&child| {
            resolver
                .entry(child)
                .is_some_and(|entry| entry.magic.as_bytes() == b"MAPM")
        })
        .collect()
}

/// Match each character to the model child of `pack` named after it.
///
/// Characters without a model, or whose model is not in the pack, are left
/// out.
pub fn place_characters(resolver: &ArchiveResolver, scene: &CharacterScene, pack: EntryId) -> Vec<Placement> {
    scene
        .characters
        .iter()
        .filter_map(|character| {
            let model_name = character.model.as_deref()?;
            let model = children(resolver, pack).find(|&child| {
                resolver.entry(child).is_some_and(|entry| {
                    entry.kind == Some(FileKind::Model) && entry.stem().eq_ignore_ascii_case(model_name)
                })
            })?;
            Some(Placement {
                character: character.id.clone(),
                image: character.image.clone(),
                model,
                position: character.position,
                angles: character.angles,
            })
        })
        .collect()
}

fn children(resolver: &ArchiveResolver, pack: EntryId) -> impl Iterator<Item = EntryId> + '_ {
    resolver
        .entry(pack)
        .map(|entry| entry.children.as_slice())
        .unwrap_or_default()
        .iter()
        .copied()
}
