//! TAC/TAD archive resolver.
//!
//! Game data ships as pairs of files: a `.tac` data file holding raw entry
//! bytes back to back, and a `.tad` index of `(offset, length, hash)`
//! records. Entries may be gzip members and may themselves be pack
//! containers (`PAKS`, `PAKF`) holding an `IPAC` directory of children,
//! nested to any depth.
//!
//! [`ArchiveResolver`] turns a set of such pairs into one virtual
//! filesystem addressed by logical paths:
//!
//! ```text
//! source/container/HASH              top-level entry
//! source/container/HASH_CHILD        directory child
//! source/container/HASH_CHILD1       second sibling named CHILD
//! source/container/HASH_CHILD_INNER  child of a nested pack
//! ```
//!
//! # Example
//!
//! ```no_run
//! use shenkit_tac::{ArchiveResolver, FileKind, ResolverOptions, SourceRoot};
//!
//! let sources = [SourceRoot::new("s1", "/games/data/scene")];
//! let resolver = ArchiveResolver::open(&sources, ResolverOptions::default())?;
//!
//! for &id in resolver.list_entries(FileKind::Model) {
//!     let content = resolver.open_entry(id)?;
//!     println!("{}: {} bytes", resolver.entry(id).unwrap().path, content.len());
//! }
//! # Ok::<(), shenkit_tac::Error>(())
//! ```
//!
//! # Features
//!
//! - `parallel`: sniff the top-level entries of each data file on the rayon
//!   pool.

mod cache;
pub mod container;
mod decompress;
mod entry;
mod error;
pub mod index;
mod kind;
mod resolver;
mod textures;

pub use cache::InflateCache;
pub use container::{ContainerLayout, DirectoryRecord, TextureRecord};
pub use decompress::{gzip_isize, inflate_if_gzip, SeekableInflate};
pub use entry::{Entry, EntryId};
pub use error::{Error, Result};
pub use index::{build_index, read_index, IndexRecord, INDEX_HEADER_SIZE};
pub use kind::{classify, classify_extension, is_gzip, ContainerKind, FileKind, GZIP_MAGIC};
pub use resolver::{container_id, Archive, ArchiveResolver, ResolverOptions, ResolverStats, SourceRoot};
pub use textures::{TextureIndex, TextureNameEntry, TextureScope};

pub use shenkit_common::ByteSource;
