//! Model file layouts.

use std::f32::consts::TAU;
use std::fmt;

use shenkit_common::FourCC;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::{Error, Result};

/// Which generation of the model format a file uses.
///
/// The two differ in how rotations are stored and how strip data is laid
/// out; node and footer layouts are shared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum MeshFormat {
    /// `MDP7` / `MDC7`: float radians, untagged face blocks.
    Legacy,
    /// `HRCM` / `CHRM` / `MAPM`: fixed-point angles, tagged strip blocks.
    Current,
}

impl MeshFormat {
    /// Magics that select each format.
    pub const LEGACY_MAGICS: &'static [&'static [u8; 4]] = &[b"MDP7", b"MDC7"];
    pub const CURRENT_MAGICS: &'static [&'static [u8; 4]] = &[b"HRCM", b"CHRM", b"MAPM"];

    /// Pick the format from the file magic.
    pub fn from_magic(magic: FourCC) -> Result<Self> {
        let bytes = magic.as_bytes();
        if Self::CURRENT_MAGICS.iter().any(|m| *m == bytes) {
            Ok(Self::Current)
        } else if Self::LEGACY_MAGICS.iter().any(|m| *m == bytes) {
            Ok(Self::Legacy)
        } else {
            Err(Error::InvalidMagic(magic))
        }
    }

    /// Convert a raw rotation word to radians.
    ///
    /// Legacy files store `f32` radians. Current files store a signed
    /// fraction of a full turn in units of `1/65536`, so `0x4000` is exactly
    /// a quarter turn; dividing by `0xFFFF` instead would be off by about
    /// 0.0015%.
    #[inline]
    pub fn rotation_radians(self, raw: u32) -> f32 {
        match self {
            Self::Legacy => f32::from_bits(raw),
            Self::Current => (raw as i32) as f32 * TAU / 65536.0,
        }
    }
}

impl fmt::Display for MeshFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Legacy => f.write_str("legacy"),
            Self::Current => f.write_str("current"),
        }
    }
}

/// File header (12 bytes).
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct ModelHeader {
    pub magic: [u8; 4],
    /// Offset of the `TEXD` texture table, 0 if absent.
    pub texture_offset: u32,
    /// Offset of the root node.
    pub root_offset: u32,
}

/// Node header (68 bytes).
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct NodeHeader {
    pub id: u32,
    /// Offset of the mesh footer, 0 for transform-only nodes.
    pub mesh_offset: u32,
    /// Raw rotation words, interpreted by [`MeshFormat::rotation_radians`].
    pub rotation: [u32; 3],
    pub scale: [f32; 3],
    pub position: [f32; 3],
    pub child_offset: u32,
    pub next_offset: u32,
    pub up_offset: u32,
    pub name_tag: [u8; 4],
    pub reserved: u32,
    pub next_object: u32,
}

impl NodeHeader {
    pub const SIZE: usize = std::mem::size_of::<Self>();
}

/// Mesh footer pointed to by a node's mesh offset (32 bytes).
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct MeshFooter {
    pub kind: u32,
    pub vertex_offset: u32,
    pub vertex_count: i32,
    pub strip_offset: u32,
    /// Read but never interpreted.
    pub opaque: [f32; 4],
}

impl MeshFooter {
    pub const SIZE: usize = std::mem::size_of::<Self>();
}

/// Legacy face block header: 17 `i16` fields.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct LegacyFaceHeader {
    pub fields: [i16; 17],
}

impl LegacyFaceHeader {
    pub const SIZE: usize = std::mem::size_of::<Self>();
    /// Value of field 1 on every valid face block.
    pub const MARKER: i16 = 0x10;

    #[inline]
    pub fn marker(&self) -> i16 {
        let fields = self.fields;
        fields[1]
    }

    #[inline]
    pub fn texture(&self) -> i16 {
        let fields = self.fields;
        fields[11]
    }

    #[inline]
    pub fn block_size(&self) -> u16 {
        let fields = self.fields;
        fields[15] as u16
    }
}
