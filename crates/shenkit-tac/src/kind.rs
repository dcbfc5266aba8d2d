//! Content classification by magic prefix.

use std::fmt;

use shenkit_common::FourCC;

/// Leading bytes of a gzip member.
pub const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Logical type of an archive entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FileKind {
    /// DirectDraw surface.
    Texture,
    /// Streaming index.
    Index,
    /// AFS sound bank.
    Afs,
    /// RIFF wave.
    Wave,
    /// Compiled shader blob.
    Shader,
    /// Pack without texture table (`PAKS`).
    PackA,
    /// Pack with attached texture table (`PAKF`).
    PackB,
    /// Scene/mesh model.
    Model,
    /// Sound program pack.
    Sound,
    /// PVR texture.
    Pvr,
    /// Pawn data.
    Pawn,
    /// Character placement scene (`CHRS`).
    Scene,
}

impl FileKind {
    /// All kinds, in classification table order.
    pub const ALL: [FileKind; 12] = [
        FileKind::Texture,
        FileKind::Index,
        FileKind::Afs,
        FileKind::Wave,
        FileKind::Shader,
        FileKind::PackA,
        FileKind::PackB,
        FileKind::Model,
        FileKind::Sound,
        FileKind::Pvr,
        FileKind::Pawn,
        FileKind::Scene,
    ];

    /// Magic prefixes for this kind.
    pub fn magics(self) -> &'static [&'static [u8]] {
        match self {
            FileKind::Texture => &[b"DDS"],
            FileKind::Index => &[b"IDX"],
            FileKind::Afs => &[b"AFS"],
            FileKind::Wave => &[b"RIFF"],
            FileKind::Shader => &[b"DXBC"],
            FileKind::PackA => &[b"PAKS"],
            FileKind::PackB => &[b"PAKF"],
            FileKind::Model => &[b"MDP7", b"MDC7", b"HRCM", b"CHRM", b"MAPM"],
            FileKind::Sound => &[b"DTPK"],
            FileKind::Pvr => &[b"GBIX", b"TEXN"],
            FileKind::Pawn => &[b"PAWN"],
            FileKind::Scene => &[b"CHRS"],
        }
    }

    /// Directory-record extensions that imply this kind when the content
    /// magic is not recognised.
    fn extensions(self) -> &'static [&'static str] {
        match self {
            FileKind::Model => &["MT5", "MT7", "MDP", "MDC"],
            FileKind::Pvr => &["PVR"],
            FileKind::Scene => &["CHR"],
            FileKind::Sound => &["SND"],
            _ => &[],
        }
    }

    /// Container layout, for kinds that hold child entries.
    pub fn container(self) -> Option<ContainerKind> {
        match self {
            FileKind::PackA => Some(ContainerKind::PackA),
            FileKind::PackB => Some(ContainerKind::PackB),
            _ => None,
        }
    }

    /// Short lowercase name, used by the CLI.
    pub fn name(self) -> &'static str {
        match self {
            FileKind::Texture => "texture",
            FileKind::Index => "idx",
            FileKind::Afs => "afs",
            FileKind::Wave => "wav",
            FileKind::Shader => "dxbc",
            FileKind::PackA => "paks",
            FileKind::PackB => "pakf",
            FileKind::Model => "model",
            FileKind::Sound => "snd",
            FileKind::Pvr => "pvr",
            FileKind::Pawn => "pawn",
            FileKind::Scene => "chrt",
        }
    }

    /// Parse a name produced by [`FileKind::name`] (case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Layout of an entry that contains child entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    /// `PAKS`: 16-byte header, then an `IPAC` directory.
    PackA,
    /// `PAKF`: texture table, then an `IPAC` directory at the table end.
    PackB,
    /// `IPAC`: the shared inner directory.
    Directory,
}

/// Classify content by its first four bytes.
///
/// The first table row with a matching prefix wins.
pub fn classify(magic: &FourCC) -> Option<FileKind> {
    FileKind::ALL
        .into_iter()
        .find(|kind| kind.magics().iter().any(|m| magic.starts_with(m)))
}

/// Classify a directory record by its extension.
pub fn classify_extension(ext: &str) -> Option<FileKind> {
    FileKind::ALL.into_iter().find(|kind| {
        kind.extensions().iter().any(|e| e.eq_ignore_ascii_case(ext))
            || kind.magics().iter().any(|m| m.eq_ignore_ascii_case(ext.as_bytes()))
    })
}

/// Whether the bytes start a gzip member.
#[inline]
pub fn is_gzip(header: &[u8]) -> bool {
    header.len() >= 2 && header[..2] == GZIP_MAGIC
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_prefixes() {
        assert_eq!(classify(&FourCC(*b"DDS ")), Some(FileKind::Texture));
        assert_eq!(classify(&FourCC(*b"HRCM")), Some(FileKind::Model));
        assert_eq!(classify(&FourCC(*b"MAPM")), Some(FileKind::Model));
        assert_eq!(classify(&FourCC(*b"PAKF")), Some(FileKind::PackB));
        assert_eq!(classify(&FourCC(*b"TEXN")), Some(FileKind::Pvr));
        assert_eq!(classify(&FourCC(*b"CHRS")), Some(FileKind::Scene));
        assert_eq!(classify(&FourCC(*b"ZZZZ")), None);
    }

    #[test]
    fn test_classify_extension_fallback() {
        assert_eq!(classify_extension("mt5"), Some(FileKind::Model));
        assert_eq!(classify_extension("PVR"), Some(FileKind::Pvr));
        assert_eq!(classify_extension("PAKS"), Some(FileKind::PackA));
        assert_eq!(classify_extension("BIN"), None);
    }

    #[test]
    fn test_kind_names_round_trip() {
        for kind in FileKind::ALL {
            assert_eq!(FileKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(FileKind::PackA.container(), Some(ContainerKind::PackA));
        assert_eq!(FileKind::Model.container(), None);
    }

    #[test]
    fn test_gzip_magic() {
        assert!(is_gzip(&[0x1f, 0x8b, 0x08]));
        assert!(!is_gzip(&[0x1f]));
    }
}
