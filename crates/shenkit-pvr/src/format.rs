//! PVRT header and pixel format codes.

use std::fmt;

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// PVRT chunk body header (12 bytes), read after the `PVRT` tag.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct PvrtHeader {
    /// Byte length of the chunk after this field.
    pub length: u32,
    /// Colour format code.
    pub color_format: u8,
    /// Storage format code.
    pub storage_format: u8,
    /// Reserved.
    pub reserved: [u8; 2],
    /// Width in texels.
    pub width: u16,
    /// Height in texels.
    pub height: u16,
}

impl PvrtHeader {
    /// On-disk size.
    pub const SIZE: usize = std::mem::size_of::<Self>();
}

/// How one texel (or palette entry) is packed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum PixelColorFormat {
    /// 1-bit alpha, 5 bits per colour channel.
    Argb1555,
    /// No alpha, 5/6/5 colour.
    Rgb565,
    /// 4 bits per channel.
    Argb4444,
    /// Packed YUV, two texels per 32 bits.
    Yuv422,
    /// Bump map.
    Bump,
    /// 4-bit palette index.
    Pal4,
    /// 8-bit palette index.
    Pal8,
    /// Unrecognised code.
    Unknown(u8),
}

impl PixelColorFormat {
    /// Map a header code to a format.
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => Self::Argb1555,
            1 => Self::Rgb565,
            2 => Self::Argb4444,
            3 => Self::Yuv422,
            4 => Self::Bump,
            5 => Self::Pal4,
            6 => Self::Pal8,
            other => Self::Unknown(other),
        }
    }

    /// Whether texels of this format are a single 16-bit word that
    /// [`unpack_color`](crate::unpack_color) understands.
    pub fn is_direct(self) -> bool {
        matches!(self, Self::Argb1555 | Self::Rgb565 | Self::Argb4444)
    }
}

impl fmt::Display for PixelColorFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Argb1555 => f.write_str("ARGB1555"),
            Self::Rgb565 => f.write_str("RGB565"),
            Self::Argb4444 => f.write_str("ARGB4444"),
            Self::Yuv422 => f.write_str("YUV422"),
            Self::Bump => f.write_str("BUMP"),
            Self::Pal4 => f.write_str("PAL4"),
            Self::Pal8 => f.write_str("PAL8"),
            Self::Unknown(code) => write!(f, "unknown({code:#04x})"),
        }
    }
}

/// How texels are laid out in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum PixelStorageFormat {
    SquareTwiddled,
    SquareTwiddledMipmap,
    Vq,
    VqMipmap,
    ClutTwiddled8,
    ClutTwiddled4,
    DirectTwiddled8,
    DirectTwiddled4,
    Rectangle,
    RectangularStride,
    RectangularTwiddled,
    SmallVq,
    SmallVqMipmap,
    SquareTwiddledMipmapAlt,
    /// Unrecognised code.
    Unknown(u8),
}

impl PixelStorageFormat {
    /// Map a header code to a format.
    pub fn from_code(code: u8) -> Self {
        match code {
            0x01 => Self::SquareTwiddled,
            0x02 => Self::SquareTwiddledMipmap,
            0x03 => Self::Vq,
            0x04 => Self::VqMipmap,
            0x05 => Self::ClutTwiddled8,
            0x06 => Self::ClutTwiddled4,
            0x07 => Self::DirectTwiddled8,
            0x08 => Self::DirectTwiddled4,
            0x09 => Self::Rectangle,
            0x0B => Self::RectangularStride,
            0x0D => Self::RectangularTwiddled,
            0x10 => Self::SmallVq,
            0x11 => Self::SmallVqMipmap,
            0x12 => Self::SquareTwiddledMipmapAlt,
            other => Self::Unknown(other),
        }
    }

    /// Any vector-quantized layout.
    pub fn is_vq(self) -> bool {
        matches!(self, Self::Vq | Self::VqMipmap | Self::SmallVq | Self::SmallVqMipmap)
    }
}

impl fmt::Display for PixelStorageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown(code) => write!(f, "unknown({code:#04x})"),
            other => write!(f, "{other:?}"),
        }
    }
}
