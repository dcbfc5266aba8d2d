//! Scene graph decoding.
//!
//! Nodes link to each other by raw file offsets. Decoding walks those links
//! from the root, decoding every node at most once, and stores the result in
//! an arena with an offset map. Parent/child adjacency is rebuilt from the
//! `up` links once the walk is complete.

use std::fmt;

use rustc_hash::FxHashMap;
use shenkit_common::{BinaryReader, ByteSource, FourCC};
use tracing::{debug, warn};

use crate::format::{MeshFooter, MeshFormat, ModelHeader, NodeHeader};
use crate::strip::{read_legacy_faces, read_strip_block, Strip};
use crate::textures::{read_texture_table, TextureSlot};
use crate::{Error, Result};

/// Mesh block tags that introduce a strip block.
const STRIP_BLOCK_TAGS: [u32; 3] = [0x0010_0002, 0x0010_0003, 0x0010_0004];
/// Mesh block tag followed by 12 bytes nobody reads.
const SKIP_BLOCK_TAG: u32 = 0x0008_000E;
const SKIP_BLOCK_SIZE: usize = 12;
/// Mesh block tag that ends the strip list.
const END_BLOCK_TAG: u32 = 0xFFFF_8000;

/// Legacy face blocks start this far past the strip offset.
const LEGACY_FACE_SKIP: usize = 16;
/// Position plus normal, both `3 x f32`.
const VERTEX_RECORD_SIZE: usize = 24;

/// Nesting limit for `up`/`child` links.
pub const MAX_NODE_DEPTH: usize = 256;

/// Index of a node in [`SceneGraph::nodes`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct NodeId(u32);

impl NodeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Local transform. Rotation is in radians per axis.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Transform {
    pub position: [f32; 3],
    pub rotation: [f32; 3],
    pub scale: [f32; 3],
}

/// Geometry attached to a node.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Mesh {
    /// Footer kind field, stored verbatim.
    pub kind: u32,
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub strips: Vec<Strip>,
    /// Footer floats nobody interprets.
    pub opaque: [f32; 4],
}

impl Mesh {
    pub fn triangle_count(&self) -> usize {
        self.strips.iter().map(|s| s.triangles().count()).sum()
    }
}

/// One decoded node.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SceneNode {
    /// Byte offset of the node header; the node's identity in the file.
    pub offset: u32,
    pub id: u32,
    pub transform: Transform,
    pub mesh: Option<Mesh>,
    pub child_offset: u32,
    pub next_offset: u32,
    /// Parent offset. Filled in from the first `child` link that reaches
    /// the node when the file leaves it zero.
    pub up_offset: u32,
    pub name_tag: FourCC,
    pub reserved: u32,
    pub next_object: u32,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

/// Category of a non-fatal decode problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum DiagnosticKind {
    MalformedNode,
    MalformedStrip,
    UnknownMeshBlockTag,
    Texture,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::MalformedNode => "malformed node",
            Self::MalformedStrip => "malformed strip",
            Self::UnknownMeshBlockTag => "unknown mesh block",
            Self::Texture => "texture",
        })
    }
}

/// A problem that skipped part of the model without failing the decode.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Diagnostic {
    pub offset: u64,
    pub kind: DiagnosticKind,
    pub message: String,
}

impl Diagnostic {
    pub(crate) fn new(offset: usize, kind: DiagnosticKind, message: impl ToString) -> Self {
        Self {
            offset: offset as u64,
            kind,
            message: message.to_string(),
        }
    }

    pub(crate) fn from_error(error: &Error, fallback_offset: usize) -> Self {
        let (offset, kind) = match *error {
            Error::MalformedNode { offset, .. } => (offset, DiagnosticKind::MalformedNode),
            Error::MalformedStrip { offset, .. } => (offset, DiagnosticKind::MalformedStrip),
            Error::UnknownMeshBlockTag { offset, .. } => (offset, DiagnosticKind::UnknownMeshBlockTag),
            Error::Texture(_) => (fallback_offset as u64, DiagnosticKind::Texture),
            Error::Common(_) | Error::InvalidMagic(_) => (fallback_offset as u64, DiagnosticKind::MalformedNode),
        };
        Self {
            offset,
            kind,
            message: error.to_string(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {:#x}: {}", self.kind, self.offset, self.message)
    }
}

/// A vertex located in the node that owns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexRef {
    pub node: NodeId,
    pub index: usize,
}

/// A decoded model.
#[derive(Debug, Clone)]
pub struct SceneGraph {
    pub format: MeshFormat,
    /// Nodes in load order.
    pub nodes: Vec<SceneNode>,
    pub root: NodeId,
    pub textures: Vec<TextureSlot>,
    pub diagnostics: Vec<Diagnostic>,
    by_offset: FxHashMap<u32, NodeId>,
}

impl SceneGraph {
    #[inline]
    pub fn node(&self, id: NodeId) -> &SceneNode {
        &self.nodes[id.index()]
    }

    #[inline]
    pub fn root_node(&self) -> &SceneNode {
        self.node(self.root)
    }

    /// Node decoded from the header at `offset`.
    pub fn node_at_offset(&self, offset: u32) -> Option<NodeId> {
        self.by_offset.get(&offset).copied()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Ids in load order.
    pub fn ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.nodes.len() as u32).map(NodeId)
    }

    /// Nodes with no parent, in load order.
    pub fn roots(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.ids().filter(|&id| self.node(id).parent.is_none())
    }

    /// Every node with its depth, parents before children.
    pub fn depth_first(&self) -> Vec<(NodeId, usize)> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<(NodeId, usize)> = self.roots().map(|id| (id, 0)).collect();
        stack.reverse();
        while let Some((id, depth)) = stack.pop() {
            out.push((id, depth));
            stack.extend(self.node(id).children.iter().rev().map(|&child| (child, depth + 1)));
        }
        out
    }

    /// Locate vertex `index` as referenced by a strip of `node`.
    ///
    /// Negative indices count back from the end of the parent's vertex
    /// array, so `-1` is the parent's last vertex.
    pub fn resolve_vertex(&self, node: NodeId, index: i16) -> Option<VertexRef> {
        let (owner, index) = if index >= 0 {
            (node, index as usize)
        } else {
            let parent = self.node(node).parent?;
            let len = self.node(parent).mesh.as_ref()?.positions.len();
            (parent, len.checked_sub(usize::from(index.unsigned_abs()))?)
        };
        let mesh = self.node(owner).mesh.as_ref()?;
        (index < mesh.positions.len()).then_some(VertexRef { node: owner, index })
    }

    pub fn position(&self, node: NodeId, index: i16) -> Option<[f32; 3]> {
        let vertex = self.resolve_vertex(node, index)?;
        self.node(vertex.node).mesh.as_ref()?.positions.get(vertex.index).copied()
    }

    pub fn normal(&self, node: NodeId, index: i16) -> Option<[f32; 3]> {
        let vertex = self.resolve_vertex(node, index)?;
        self.node(vertex.node).mesh.as_ref()?.normals.get(vertex.index).copied()
    }

    /// Texture slot a strip's texture field points at.
    pub fn texture(&self, index: i16) -> Option<&TextureSlot> {
        usize::try_from(index).ok().and_then(|i| self.textures.get(i))
    }

    pub fn mesh_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.mesh.is_some()).count()
    }

    pub fn vertex_count(&self) -> usize {
        self.nodes.iter().filter_map(|n| n.mesh.as_ref()).map(|m| m.positions.len()).sum()
    }

    pub fn triangle_count(&self) -> usize {
        self.nodes.iter().filter_map(|n| n.mesh.as_ref()).map(Mesh::triangle_count).sum()
    }
}

/// Decode a model, picking the format from its magic.
///
/// Offsets inside the model are relative to the source's cursor.
pub fn decode_scene(source: &ByteSource) -> Result<SceneGraph> {
    let data = source.remaining_slice();
    let header = BinaryReader::new(data).read_struct::<ModelHeader>()?;
    let format = MeshFormat::from_magic(FourCC(header.magic))?;
    SceneDecoder::new(data, format).decode(&header)
}

/// Decode a model as `format`, whatever its magic says.
pub fn decode_scene_as(source: &ByteSource, format: MeshFormat) -> Result<SceneGraph> {
    let data = source.remaining_slice();
    let header = BinaryReader::new(data).read_struct::<ModelHeader>()?;
    SceneDecoder::new(data, format).decode(&header)
}

struct SceneDecoder<'a> {
    data: &'a [u8],
    format: MeshFormat,
    nodes: Vec<SceneNode>,
    by_offset: FxHashMap<u32, NodeId>,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> SceneDecoder<'a> {
    fn new(data: &'a [u8], format: MeshFormat) -> Self {
        Self {
            data,
            format,
            nodes: Vec::new(),
            by_offset: FxHashMap::default(),
            diagnostics: Vec::new(),
        }
    }

    fn decode(mut self, header: &ModelHeader) -> Result<SceneGraph> {
        let root_offset = header.root_offset;
        let texture_offset = header.texture_offset;

        let root = self.read_node(root_offset)?;
        self.walk_from(root, 0);
        self.link();

        let textures = if texture_offset != 0 {
            read_texture_table(self.data, texture_offset as usize, &mut self.diagnostics)
        } else {
            Vec::new()
        };

        debug!(
            format = %self.format,
            nodes = self.nodes.len(),
            textures = textures.len(),
            diagnostics = self.diagnostics.len(),
            "decoded scene"
        );
        Ok(SceneGraph {
            format: self.format,
            nodes: self.nodes,
            root,
            textures,
            diagnostics: self.diagnostics,
            by_offset: self.by_offset,
        })
    }

    /// Decode the node at `offset` and everything reachable from it.
    fn visit(&mut self, offset: u32, depth: usize) -> Option<NodeId> {
        if let Some(&id) = self.by_offset.get(&offset) {
            return Some(id);
        }
        if depth > MAX_NODE_DEPTH {
            self.diagnostics.push(Diagnostic::new(
                offset as usize,
                DiagnosticKind::MalformedNode,
                format!("nesting deeper than {MAX_NODE_DEPTH}"),
            ));
            return None;
        }
        match self.read_node(offset) {
            Ok(id) => {
                self.walk_from(id, depth);
                Some(id)
            }
            Err(e) => {
                warn!(offset, error = %e, "skipping node");
                self.diagnostics.push(Diagnostic::from_error(&e, offset as usize));
                None
            }
        }
    }

    /// Follow the `up` and `child` links of `first`, then do the same for
    /// each node along its `next` chain.
    fn walk_from(&mut self, first: NodeId, depth: usize) {
        let mut current = first;
        loop {
            let node = &self.nodes[current.index()];
            let (offset, up, child, next) = (node.offset, node.up_offset, node.child_offset, node.next_offset);

            if up != 0 {
                self.visit(up, depth + 1);
            }
            if child != 0 {
                if let Some(child) = self.visit(child, depth + 1) {
                    let child = &mut self.nodes[child.index()];
                    if child.up_offset == 0 {
                        child.up_offset = offset;
                    }
                }
            }

            if next == 0 || self.by_offset.contains_key(&next) {
                break;
            }
            match self.read_node(next) {
                Ok(id) => current = id,
                Err(e) => {
                    warn!(offset = next, error = %e, "skipping node");
                    self.diagnostics.push(Diagnostic::from_error(&e, next as usize));
                    break;
                }
            }
        }
    }

    /// Read a node header and its mesh, then register it.
    ///
    /// Mesh failures drop the mesh with a diagnostic; only an unreadable
    /// header fails the node.
    fn read_node(&mut self, offset: u32) -> Result<NodeId> {
        let start = offset as usize;
        let header = BinaryReader::new_at(self.data, start)
            .read_struct::<NodeHeader>()
            .map_err(|e| Error::node(start, e))?;

        let mesh_offset = header.mesh_offset;
        let mesh = if mesh_offset == 0 {
            None
        } else {
            match self.read_mesh(mesh_offset as usize) {
                Ok(mesh) => Some(mesh),
                Err(e) => {
                    warn!(node = offset, mesh = mesh_offset, error = %e, "dropping mesh");
                    self.diagnostics.push(Diagnostic::from_error(&e, mesh_offset as usize));
                    None
                }
            }
        };

        let format = self.format;
        let rotation = header.rotation;
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(SceneNode {
            offset,
            id: header.id,
            transform: Transform {
                position: header.position,
                rotation: rotation.map(|raw| format.rotation_radians(raw)),
                scale: header.scale,
            },
            mesh,
            child_offset: header.child_offset,
            next_offset: header.next_offset,
            up_offset: header.up_offset,
            name_tag: FourCC(header.name_tag),
            reserved: header.reserved,
            next_object: header.next_object,
            parent: None,
            children: Vec::new(),
        });
        self.by_offset.insert(offset, id);
        Ok(id)
    }

    fn read_mesh(&mut self, offset: usize) -> Result<Mesh> {
        let mut reader = BinaryReader::new_at(self.data, offset);
        let footer = reader.read_struct::<MeshFooter>().map_err(|e| Error::node(offset, e))?;
        let vertex_offset = footer.vertex_offset as usize;
        let strip_offset = footer.strip_offset as usize;
        let vertex_count = usize::try_from(footer.vertex_count)
            .map_err(|_| Error::node(offset, format!("negative vertex count {}", { footer.vertex_count })))?;

        let faces_start = strip_offset + LEGACY_FACE_SKIP;
        let strips = match self.format {
            MeshFormat::Current => read_tagged_strips(&mut reader, strip_offset),
            MeshFormat::Legacy => read_legacy_faces(&mut reader, faces_start, vertex_offset),
        }
        .map_err(|e| match e {
            Error::Common(inner) => Error::strip(strip_offset, inner),
            other => other,
        })?;
        if self.format == MeshFormat::Legacy && strips.is_empty() && faces_start < vertex_offset {
            self.diagnostics.push(Diagnostic::new(
                faces_start,
                DiagnosticKind::MalformedStrip,
                "no face header at the face list start, mesh kept without faces",
            ));
        }

        reader.seek(vertex_offset);
        if vertex_count.saturating_mul(VERTEX_RECORD_SIZE) > reader.remaining() {
            return Err(Error::node(
                offset,
                format!("{vertex_count} vertices at {vertex_offset:#x} run past the end"),
            ));
        }
        let mut positions = Vec::with_capacity(vertex_count);
        let mut normals = Vec::with_capacity(vertex_count);
        for _ in 0..vertex_count {
            positions.push(reader.read_vec3()?);
            normals.push(reader.read_vec3()?);
        }

        Ok(Mesh {
            kind: footer.kind,
            positions,
            normals,
            strips,
            opaque: footer.opaque,
        })
    }

    /// Resolve `up` offsets into parent/children adjacency.
    ///
    /// A link that would close a cycle is dropped, so the result is a forest.
    fn link(&mut self) {
        for index in 0..self.nodes.len() {
            let up = self.nodes[index].up_offset;
            if up == 0 {
                continue;
            }
            let Some(&parent) = self.by_offset.get(&up) else {
                continue;
            };
            let id = NodeId(index as u32);
            if self.is_ancestor_or_self(id, parent) {
                self.diagnostics.push(Diagnostic::new(
                    self.nodes[index].offset as usize,
                    DiagnosticKind::MalformedNode,
                    format!("up link to {up:#x} forms a cycle"),
                ));
                continue;
            }
            self.nodes[index].parent = Some(parent);
            self.nodes[parent.index()].children.push(id);
        }
    }

    fn is_ancestor_or_self(&self, ancestor: NodeId, mut node: NodeId) -> bool {
        loop {
            if node == ancestor {
                return true;
            }
            match self.nodes[node.index()].parent {
                Some(parent) => node = parent,
                None => return false,
            }
        }
    }
}

/// Read current-format mesh blocks until the end tag.
fn read_tagged_strips(reader: &mut BinaryReader<'_>, start: usize) -> Result<Vec<Strip>> {
    reader.seek(start);
    let mut strips = Vec::new();
    loop {
        let tag_offset = reader.position();
        match reader.read_u32()? {
            tag if STRIP_BLOCK_TAGS.contains(&tag) => strips.extend(read_strip_block(reader)?),
            SKIP_BLOCK_TAG => reader.advance(SKIP_BLOCK_SIZE),
            END_BLOCK_TAG => break,
            tag => {
                return Err(Error::UnknownMeshBlockTag {
                    offset: tag_offset as u64,
                    tag,
                })
            }
        }
    }
    Ok(strips)
}

#[cfg(test)]
mod tests {
    use byteorder::{LittleEndian, WriteBytesExt};
    use zerocopy::{Immutable, IntoBytes};

    use super::*;
    use crate::strip::run_field;

    /// Model blob assembled front to back, with forward references patched.
    struct Blob(Vec<u8>);

    impl Blob {
        fn new(magic: &[u8; 4]) -> Self {
            let mut blob = Self(Vec::new());
            blob.put(&ModelHeader {
                magic: *magic,
                texture_offset: 0,
                root_offset: 0,
            });
            blob
        }

        fn here(&self) -> u32 {
            self.0.len() as u32
        }

        fn put<T: IntoBytes + Immutable>(&mut self, value: &T) -> u32 {
            let at = self.here();
            self.0.extend_from_slice(value.as_bytes());
            at
        }

        fn patch<T: IntoBytes + Immutable>(&mut self, at: u32, value: &T) {
            let bytes = value.as_bytes();
            let at = at as usize;
            self.0[at..at + bytes.len()].copy_from_slice(bytes);
        }

        fn set_root(&mut self, root: u32) {
            self.patch(8, &root);
        }

        fn set_textures(&mut self, offset: u32) {
            self.patch(4, &offset);
        }

        /// Reserve a node header, filled in later with [`Blob::patch`].
        fn reserve_node(&mut self) -> u32 {
            self.put(&node(0, 0, 0, 0, 0))
        }

        /// A current-format mesh with one strip over `indices`.
        fn put_mesh(&mut self, positions: &[[f32; 3]], indices: &[i16]) -> u32 {
            let strip_offset = self.here();
            self.0.write_u32::<LittleEndian>(STRIP_BLOCK_TAGS[0]).unwrap();
            let mut strips = Vec::new();
            strips.write_u16::<LittleEndian>(run_field(indices.len())).unwrap();
            for &index in indices {
                strips.write_i16::<LittleEndian>(index).unwrap();
            }
            // type 0x26, poly mode, 3 opaque, texture, 2 opaque, format
            for field in [0x26i16, 0, 0, 0, 0, 0, 0, 0, 0x13] {
                self.0.write_i16::<LittleEndian>(field).unwrap();
            }
            self.0.write_u16::<LittleEndian>(strips.len() as u16 + 2).unwrap();
            self.0.write_i16::<LittleEndian>(1).unwrap();
            self.0.extend(strips);
            self.0.write_u32::<LittleEndian>(END_BLOCK_TAG).unwrap();

            let vertex_offset = self.here();
            for position in positions {
                self.put(position);
                self.put(&[0.0f32, 1.0, 0.0]);
            }
            self.put(&MeshFooter {
                kind: 0,
                vertex_offset,
                vertex_count: positions.len() as i32,
                strip_offset,
                opaque: [0.0; 4],
            })
        }

        fn source(self) -> ByteSource {
            ByteSource::from_vec(self.0)
        }
    }

    fn node(id: u32, mesh_offset: u32, child_offset: u32, next_offset: u32, up_offset: u32) -> NodeHeader {
        NodeHeader {
            id,
            mesh_offset,
            rotation: [0; 3],
            scale: [1.0; 3],
            position: [0.0; 3],
            child_offset,
            next_offset,
            up_offset,
            name_tag: *b"NODE",
            reserved: 0,
            next_object: 0,
        }
    }

    #[test]
    fn test_single_node_scene() {
        let mut blob = Blob::new(b"HRCM");
        let root = blob.put(&node(7, 0, 0, 0, 0));
        blob.set_root(root);

        let scene = decode_scene(&blob.source()).unwrap();
        assert_eq!(scene.format, MeshFormat::Current);
        assert_eq!(scene.len(), 1);
        assert_eq!(scene.root_node().id, 7);
        assert_eq!(scene.root_node().offset, root);
        assert!(scene.root_node().mesh.is_none());
        assert!(scene.root_node().children.is_empty());
        assert!(scene.diagnostics.is_empty());
        assert!(scene.textures.is_empty());
    }

    #[test]
    fn test_negative_index_resolves_against_parent() {
        let mut blob = Blob::new(b"HRCM");
        let root = blob.reserve_node();
        let child = blob.reserve_node();
        let parent_mesh = blob.put_mesh(&[[1.0, 0.0, 0.0], [2.0, 0.0, 0.0], [3.0, 0.0, 0.0]], &[0, 1, 2]);
        let child_mesh = blob.put_mesh(&[[9.0, 9.0, 9.0]], &[0, -1, -3]);
        blob.patch(root, &node(1, parent_mesh, child, 0, 0));
        blob.patch(child, &node(2, child_mesh, 0, 0, 0));
        blob.set_root(root);

        let scene = decode_scene(&blob.source()).unwrap();
        assert!(scene.diagnostics.is_empty(), "{:?}", scene.diagnostics);
        let child_id = scene.node_at_offset(child).unwrap();
        assert_eq!(scene.node(child_id).up_offset, root);
        assert_eq!(scene.node(child_id).parent, Some(scene.root));

        let strip = &scene.node(child_id).mesh.as_ref().unwrap().strips[0];
        let indices: Vec<i16> = strip.vertices.iter().map(|v| v.index).collect();
        assert_eq!(indices, vec![0, -1, -3]);

        assert_eq!(scene.position(child_id, 0), Some([9.0, 9.0, 9.0]));
        assert_eq!(scene.position(child_id, -1), Some([3.0, 0.0, 0.0]));
        assert_eq!(scene.position(child_id, -3), Some([1.0, 0.0, 0.0]));
        assert_eq!(scene.position(child_id, -4), None);
        assert_eq!(
            scene.resolve_vertex(child_id, -1),
            Some(VertexRef {
                node: scene.root,
                index: 2
            })
        );
        assert_eq!(scene.normal(child_id, -1), Some([0.0, 1.0, 0.0]));
        // The root has no parent to resolve against.
        assert_eq!(scene.position(scene.root, -1), None);
    }

    #[test]
    fn test_shared_node_decoded_once() {
        let mut blob = Blob::new(b"MAPM");
        let root = blob.reserve_node();
        let a = blob.reserve_node();
        let b = blob.reserve_node();
        let c = blob.reserve_node();
        blob.patch(root, &node(0, 0, a, 0, 0));
        blob.patch(a, &node(1, 0, c, b, root));
        blob.patch(b, &node(2, 0, c, 0, root));
        blob.patch(c, &node(3, 0, 0, 0, 0));
        blob.set_root(root);

        let scene = decode_scene(&blob.source()).unwrap();
        assert_eq!(scene.len(), 4);
        let ids: Vec<u32> = scene.nodes.iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![0, 1, 3, 2]);

        let [a, b, c] = [a, b, c].map(|offset| scene.node_at_offset(offset).unwrap());
        assert_eq!(scene.root_node().children, vec![a, b]);
        assert_eq!(scene.node(a).children, vec![c]);
        assert_eq!(scene.node(c).parent, Some(a));
        assert!(scene.node(b).children.is_empty());

        let order: Vec<(NodeId, usize)> = scene.depth_first();
        assert_eq!(order, vec![(scene.root, 0), (a, 1), (c, 2), (b, 1)]);
    }

    #[test]
    fn test_up_cycle_is_broken() {
        let mut blob = Blob::new(b"HRCM");
        let root = blob.reserve_node();
        let a = blob.reserve_node();
        blob.patch(root, &node(0, 0, 0, a, a));
        blob.patch(a, &node(1, 0, 0, 0, root));
        blob.set_root(root);

        let scene = decode_scene(&blob.source()).unwrap();
        assert_eq!(scene.len(), 2);
        assert_eq!(scene.roots().count(), 1);
        assert_eq!(scene.depth_first().len(), 2);
        assert!(scene
            .diagnostics
            .iter()
            .any(|d| d.kind == DiagnosticKind::MalformedNode));
    }

    #[test]
    fn test_unknown_block_tag_drops_mesh_only() {
        let mut blob = Blob::new(b"HRCM");
        let root = blob.reserve_node();
        let strip_offset = blob.here();
        blob.0.write_u32::<LittleEndian>(0x1234_5678).unwrap();
        let mesh = blob.put(&MeshFooter {
            kind: 0,
            vertex_offset: strip_offset,
            vertex_count: 0,
            strip_offset,
            opaque: [0.0; 4],
        });
        blob.patch(root, &node(0, mesh, 0, 0, 0));
        blob.set_root(root);

        let scene = decode_scene(&blob.source()).unwrap();
        assert_eq!(scene.len(), 1);
        assert!(scene.root_node().mesh.is_none());
        assert_eq!(scene.diagnostics.len(), 1);
        assert_eq!(scene.diagnostics[0].kind, DiagnosticKind::UnknownMeshBlockTag);
        assert_eq!(scene.diagnostics[0].offset, u64::from(strip_offset));
    }

    #[test]
    fn test_bad_sibling_is_skipped() {
        let mut blob = Blob::new(b"HRCM");
        let root = blob.reserve_node();
        blob.patch(root, &node(0, 0, 0, 0x00FF_FFFF, 0));
        blob.set_root(root);

        let scene = decode_scene(&blob.source()).unwrap();
        assert_eq!(scene.len(), 1);
        assert_eq!(scene.diagnostics[0].kind, DiagnosticKind::MalformedNode);
    }

    #[test]
    fn test_root_failure_is_fatal() {
        let mut blob = Blob::new(b"HRCM");
        blob.set_root(0x1000);
        assert!(matches!(decode_scene(&blob.source()), Err(Error::MalformedNode { offset: 0x1000, .. })));

        let blob = Blob::new(b"NOPE");
        assert!(matches!(decode_scene(&blob.source()), Err(Error::InvalidMagic(_))));
    }

    #[test]
    fn test_forced_legacy_format() {
        let mut blob = Blob::new(b"NOPE");
        let mut header = node(0, 0, 0, 0, 0);
        header.rotation = [0.5f32.to_bits(), 0, 0];
        let root = blob.put(&header);
        blob.set_root(root);

        let scene = decode_scene_as(&blob.source(), MeshFormat::Legacy).unwrap();
        assert_eq!(scene.format, MeshFormat::Legacy);
        assert_eq!(scene.root_node().transform.rotation, [0.5, 0.0, 0.0]);
    }

    #[test]
    fn test_legacy_mesh() {
        let mut blob = Blob::new(b"MDP7");
        let root = blob.reserve_node();
        let strip_offset = blob.here();
        blob.0.extend_from_slice(&[0u8; LEGACY_FACE_SKIP]);
        let mut fields = [0i16; 17];
        fields[1] = 0x10;
        fields[11] = 2;
        fields[15] = 4 + 2 + 3 * 6;
        blob.put(&fields);
        blob.0.write_u16::<LittleEndian>(run_field(3)).unwrap();
        for index in 0..3i16 {
            for value in [index, 0x400 | 512, 0] {
                blob.0.write_i16::<LittleEndian>(value).unwrap();
            }
        }
        let vertex_offset = blob.here();
        for x in 0..3 {
            blob.put(&[x as f32, 0.0, 0.0]);
            blob.put(&[0.0f32, 0.0, 1.0]);
        }
        let mesh = blob.put(&MeshFooter {
            kind: 1,
            vertex_offset,
            vertex_count: 3,
            strip_offset,
            opaque: [0.0; 4],
        });
        blob.patch(root, &node(0, mesh, 0, 0, 0));
        blob.set_root(root);

        let scene = decode_scene(&blob.source()).unwrap();
        assert_eq!(scene.format, MeshFormat::Legacy);
        assert!(scene.diagnostics.is_empty(), "{:?}", scene.diagnostics);
        let mesh = scene.root_node().mesh.as_ref().unwrap();
        assert_eq!(mesh.kind, 1);
        assert_eq!(mesh.positions.len(), 3);
        assert_eq!(mesh.strips.len(), 1);
        assert_eq!(mesh.strips[0].texture, 2);
        assert!((mesh.strips[0].vertices[0].uv[0] - 512.0 / 1023.0).abs() < 1e-6);
        assert_eq!(scene.triangle_count(), 1);
    }

    #[test]
    fn test_legacy_mesh_without_faces_keeps_vertices() {
        let mut blob = Blob::new(b"MDC7");
        let root = blob.reserve_node();
        let strip_offset = blob.here();
        blob.0.extend_from_slice(&[0u8; LEGACY_FACE_SKIP]);
        // Marker field left at zero.
        blob.put(&[0i16; 17]);
        let vertex_offset = blob.here();
        for x in 0..2 {
            blob.put(&[x as f32, 0.0, 0.0]);
            blob.put(&[0.0f32, 0.0, 1.0]);
        }
        let mesh = blob.put(&MeshFooter {
            kind: 0,
            vertex_offset,
            vertex_count: 2,
            strip_offset,
            opaque: [0.0; 4],
        });
        blob.patch(root, &node(0, mesh, 0, 0, 0));
        blob.set_root(root);

        let scene = decode_scene(&blob.source()).unwrap();
        let mesh = scene.root_node().mesh.as_ref().unwrap();
        assert_eq!(mesh.positions, vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]]);
        assert!(mesh.strips.is_empty());
        assert_eq!(scene.diagnostics.len(), 1);
        assert_eq!(scene.diagnostics[0].kind, DiagnosticKind::MalformedStrip);
        assert_eq!(scene.diagnostics[0].offset, u64::from(strip_offset) + LEGACY_FACE_SKIP as u64);
    }

    #[test]
    fn test_texture_table() {
        let mut blob = Blob::new(b"HRCM");
        let root = blob.put(&node(0, 0, 0, 0, 0));
        blob.set_root(root);

        let table = blob.here();
        blob.set_textures(table);
        blob.0.extend_from_slice(b"TEXD");
        blob.0.write_u32::<LittleEndian>(0).unwrap();
        blob.0.write_u32::<LittleEndian>(3).unwrap();

        // Embedded 2x2 RGB565 texture.
        let mut texn = Vec::new();
        texn.extend_from_slice(b"\x05\0\0\0tx01");
        texn.extend_from_slice(b"PVRT");
        texn.write_u32::<LittleEndian>(16).unwrap();
        texn.extend_from_slice(&[1, 1, 0, 0]);
        texn.write_u16::<LittleEndian>(2).unwrap();
        texn.write_u16::<LittleEndian>(2).unwrap();
        for _ in 0..4 {
            texn.write_u16::<LittleEndian>(0xFFFF).unwrap();
        }
        blob.0.extend_from_slice(b"TEXN");
        blob.0.write_u32::<LittleEndian>(texn.len() as u32 + 8).unwrap();
        blob.0.extend(texn);

        // Two external references.
        blob.0.extend_from_slice(b"NAME");
        blob.0.write_u32::<LittleEndian>(8 + 16).unwrap();
        blob.0.write_u32::<LittleEndian>(12).unwrap();
        blob.0.extend_from_slice(b"AKI_");
        blob.0.write_u32::<LittleEndian>(3).unwrap();
        blob.0.extend_from_slice(b"BG__");

        // A broken texture node.
        blob.0.extend_from_slice(b"TEXN");
        blob.0.write_u32::<LittleEndian>(8 + 12).unwrap();
        blob.0.extend_from_slice(b"badnodexJUNK");

        let scene = decode_scene(&blob.source()).unwrap();
        assert_eq!(scene.textures.len(), 4);
        match &scene.textures[0] {
            TextureSlot::Embedded(node) => {
                assert_eq!(node.synthetic_name(), "tx015");
                assert_eq!(node.texture.width, 2);
                assert_eq!(node.texture.texel(1, 1), Some([1.0; 4]));
            }
            other => panic!("expected embedded texture, got {other:?}"),
        }
        match (&scene.textures[1], &scene.textures[2]) {
            (TextureSlot::External(first), TextureSlot::External(second)) => {
                assert_eq!(first.name(), "AKI_12");
                assert_eq!(second.name(), "BG__3");
            }
            other => panic!("expected external references, got {other:?}"),
        }
        assert!(scene.textures[3].is_placeholder());
        assert_eq!(scene.diagnostics.len(), 1);
        assert_eq!(scene.diagnostics[0].kind, DiagnosticKind::Texture);
        assert!(scene.texture(1).is_some());
        assert!(scene.texture(-1).is_none());
    }
}
