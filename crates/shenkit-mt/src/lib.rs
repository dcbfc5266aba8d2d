//! Model decoding.
//!
//! Models are trees of transform nodes linked by file offsets, each node
//! optionally carrying a mesh of triangle strips over its own vertex array.
//! Two generations of the format exist; see [`MeshFormat`].
//!
//! Decoding is forgiving below the root: a node, mesh or texture that fails
//! to parse is skipped and recorded as a [`Diagnostic`] on the returned
//! [`SceneGraph`]. Only a bad magic or an unreadable root node is an error.
//!
//! ```no_run
//! use shenkit_common::ByteSource;
//! use shenkit_mt::decode_scene;
//!
//! let scene = decode_scene(&ByteSource::from_vec(std::fs::read("akira.mt5")?))?;
//! for (id, depth) in scene.depth_first() {
//!     let node = scene.node(id);
//!     println!("{:indent$}{} {:?}", "", node.id, node.transform.position, indent = depth * 2);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod error;
mod format;
mod scene;
mod strip;
mod textures;

pub use error::{Error, Result};
pub use format::{LegacyFaceHeader, MeshFooter, MeshFormat, ModelHeader, NodeHeader};
pub use scene::{
    decode_scene, decode_scene_as, Diagnostic, DiagnosticKind, Mesh, NodeId, SceneGraph, SceneNode, Transform,
    VertexRef, MAX_NODE_DEPTH,
};
pub use strip::{read_legacy_faces, read_strip_block, run_field, run_length, Strip, StripHeader, StripVertex, UV_DIVISOR};
pub use textures::{TextureRef, TextureSlot};
