//! Texture decoding.

use shenkit_common::{BinaryReader, ByteSource, FourCC};
use tracing::{debug, warn};

use crate::color::{unpack_color, Rgba, PLACEHOLDER_COLOR};
use crate::format::{PixelColorFormat, PixelStorageFormat, PvrtHeader};
use crate::twiddle::{twiddle_table, twiddled_address, untwiddle};
use crate::{Error, Result};

/// Number of colours in a VQ codebook (256 codes of 2x2 texels).
pub const VQ_CODEBOOK_SIZE: usize = 1024;

/// Largest side of a placeholder texture.
pub const MAX_PLACEHOLDER_SIDE: u32 = 1024;

/// Records why a texture holds placeholder texels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct UnsupportedPixelFormat {
    /// Colour format of the source.
    pub color: PixelColorFormat,
    /// Storage format of the source.
    pub storage: PixelStorageFormat,
    /// Width declared by the header.
    pub width: u32,
    /// Height declared by the header.
    pub height: u32,
}

/// A decoded texture: row-major, normalized RGBA texels.
#[derive(Debug, Clone, PartialEq)]
pub struct Texture {
    /// Colour format of the source data.
    pub color_format: PixelColorFormat,
    /// Storage format of the source data.
    pub storage_format: PixelStorageFormat,
    /// Width in texels.
    pub width: u32,
    /// Height in texels.
    pub height: u32,
    /// `width * height` texels, row-major.
    pub texels: Vec<Rgba>,
    /// Set when the texels are placeholders.
    pub unsupported: Option<UnsupportedPixelFormat>,
}

impl Texture {
    /// A texture filled with the placeholder colour.
    ///
    /// Each side is clamped to [`MAX_PLACEHOLDER_SIDE`]; the declared size is
    /// kept in [`UnsupportedPixelFormat`].
    pub fn placeholder(width: u32, height: u32, color_format: PixelColorFormat, storage_format: PixelStorageFormat) -> Self {
        let (w, h) = (width.min(MAX_PLACEHOLDER_SIDE), height.min(MAX_PLACEHOLDER_SIDE));
        Self {
            color_format,
            storage_format,
            width: w,
            height: h,
            texels: vec![PLACEHOLDER_COLOR; w as usize * h as usize],
            unsupported: Some(UnsupportedPixelFormat {
                color: color_format,
                storage: storage_format,
                width,
                height,
            }),
        }
    }

    /// Whether the texels are placeholders.
    #[inline]
    pub fn is_placeholder(&self) -> bool {
        self.unsupported.is_some()
    }

    /// Texel at `(x, y)`.
    #[inline]
    pub fn texel(&self, x: u32, y: u32) -> Option<Rgba> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.texels.get((y * self.width + x) as usize).copied()
    }

    /// Texels quantized to 8-bit RGBA, row-major.
    pub fn to_rgba8(&self) -> Vec<u8> {
        self.texels.iter().flat_map(|&t| crate::color::to_rgba8(t)).collect()
    }

    /// Convert to an [`image::RgbaImage`].
    #[cfg(feature = "png")]
    pub fn to_image(&self) -> Option<image::RgbaImage> {
        image::RgbaImage::from_raw(self.width, self.height, self.to_rgba8())
    }

    /// Write the texture as a PNG file.
    #[cfg(feature = "png")]
    pub fn save_png<P: AsRef<std::path::Path>>(&self, path: P) -> Result<()> {
        let image = self.to_image().ok_or(Error::InvalidDimensions {
            width: self.width,
            height: self.height,
        })?;
        image.save_with_format(path, image::ImageFormat::Png)?;
        Ok(())
    }
}

/// A texture node: an 8-byte name followed by `GBIX`/`PVRT` chunks.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureNode {
    /// Raw 8-byte name. For table-registered textures this is the
    /// `u32` number followed by the 4-byte tag.
    pub name: [u8; 8],
    /// Global index from the `GBIX` chunk, if present.
    pub global_index: Option<Vec<u8>>,
    /// Decoded texture.
    pub texture: Texture,
}

impl TextureNode {
    /// Name in the `tag + number` form used by texture tables.
    pub fn synthetic_name(&self) -> String {
        let number = u32::from_le_bytes([self.name[0], self.name[1], self.name[2], self.name[3]]);
        let tag = FourCC::from_prefix(&self.name[4..]);
        format!("{}{number}", tag.to_text())
    }
}

/// Decode a PVRT body: header, then pixel data.
///
/// The source's cursor must sit right after the `PVRT` tag.
pub fn decode_texture(source: &ByteSource) -> Result<Texture> {
    let mut reader = source.reader();
    read_texture(&mut reader)
}

/// Decode a texture node: 8-byte name, optional `GBIX`, `PVRT` body.
pub fn decode_texture_node(source: &ByteSource) -> Result<TextureNode> {
    let mut reader = source.reader();
    read_texture_node(&mut reader)
}

/// Decode a standalone PVR entry starting with `GBIX`, `TEXN` or `PVRT`.
pub fn decode_pvr(source: &ByteSource) -> Result<Texture> {
    let mut reader = source.reader();
    let magic = FourCC::from_prefix(reader.peek_bytes(4)?);
    match magic.as_bytes() {
        b"TEXN" => {
            reader.advance(8);
            Ok(read_texture_node(&mut reader)?.texture)
        }
        b"GBIX" | b"PVRT" => {
            skip_global_index(&mut reader)?;
            reader.expect_magic(b"PVRT").map_err(|_| Error::InvalidMagic(magic))?;
            read_texture(&mut reader)
        }
        _ => Err(Error::InvalidMagic(magic)),
    }
}

/// Read a texture node from a reader positioned at its name.
pub fn read_texture_node(reader: &mut BinaryReader<'_>) -> Result<TextureNode> {
    let mut name = [0u8; 8];
    name.copy_from_slice(reader.read_bytes(8)?);

    let global_index = skip_global_index(reader)?;
    let magic = reader.read_fourcc()?;
    if magic.as_bytes() != b"PVRT" {
        return Err(Error::InvalidMagic(magic));
    }

    Ok(TextureNode {
        name,
        global_index,
        texture: read_texture(reader)?,
    })
}

/// Skip a `GBIX` chunk by its declared length, returning its payload.
fn skip_global_index(reader: &mut BinaryReader<'_>) -> Result<Option<Vec<u8>>> {
    if reader.peek_bytes(4)? != b"GBIX" {
        return Ok(None);
    }
    reader.advance(4);
    let length = reader.read_u32()? as usize;
    Ok(Some(reader.read_bytes(length)?.to_vec()))
}

/// Read a PVRT body from a reader positioned after the `PVRT` tag.
pub fn read_texture(reader: &mut BinaryReader<'_>) -> Result<Texture> {
    let header = reader.read_struct::<PvrtHeader>()?;
    let color_format = PixelColorFormat::from_code(header.color_format);
    let storage_format = PixelStorageFormat::from_code(header.storage_format);
    let (width, height) = (u32::from(header.width), u32::from(header.height));
    debug!(%color_format, %storage_format, width, height, "decoding texture");

    let count = width as usize * height as usize;
    if storage_format == PixelStorageFormat::Vq && color_format.is_direct() {
        check_dimensions(width, height, 2)?;
        // Codebook and indices must both be present.
        reader.peek_bytes(VQ_CODEBOOK_SIZE * 2 + count / 4)?;
        let mut codebook = Vec::with_capacity(VQ_CODEBOOK_SIZE);
        for _ in 0..VQ_CODEBOOK_SIZE {
            codebook.push(read_color(reader, color_format)?);
        }
        let indices = reader.read_bytes(count / 4)?;
        let texels = expand_vq(indices, &codebook, width as usize, height as usize)?;
        return Ok(decoded(color_format, storage_format, width, height, texels));
    }

    if !storage_format.is_vq() && color_format.is_direct() {
        check_dimensions(width, height, 1)?;
        let words = reader.read_bytes(count * 2)?;
        let linear: Vec<Rgba> = words
            .chunks_exact(2)
            .map(|word| {
                unpack_color(u16::from_le_bytes([word[0], word[1]]), color_format).unwrap_or(PLACEHOLDER_COLOR)
            })
            .collect();
        let texels = untwiddle(&linear, width as usize, height as usize);
        return Ok(decoded(color_format, storage_format, width, height, texels));
    }

    warn!(%color_format, %storage_format, "unsupported pixel format, using placeholder");
    Ok(Texture::placeholder(width, height, color_format, storage_format))
}

fn decoded(
    color_format: PixelColorFormat,
    storage_format: PixelStorageFormat,
    width: u32,
    height: u32,
    texels: Vec<Rgba>,
) -> Texture {
    Texture {
        color_format,
        storage_format,
        width,
        height,
        texels,
        unsupported: None,
    }
}

/// Twiddled layouts address power-of-two squares.
fn check_dimensions(width: u32, height: u32, min: u32) -> Result<()> {
    let valid = |d: u32| d >= min && d.is_power_of_two();
    if valid(width) && valid(height) {
        Ok(())
    } else {
        Err(Error::InvalidDimensions { width, height })
    }
}

#[inline]
fn read_color(reader: &mut BinaryReader<'_>, format: PixelColorFormat) -> Result<Rgba> {
    let value = reader.read_u16()?;
    Ok(unpack_color(value, format).unwrap_or(PLACEHOLDER_COLOR))
}

/// Expand VQ indices into row-major texels.
///
/// Each index byte selects codebook entries `index*4 .. index*4+4`, placed
/// at `(x, y)`, `(x, y+1)`, `(x+1, y)`, `(x+1, y+1)`. The byte for the 2x2
/// block at `(x, y)` sits at the twiddled address of `(x/2, y/2)`.
pub fn expand_vq(indices: &[u8], codebook: &[Rgba], width: usize, height: usize) -> Result<Vec<Rgba>> {
    let table = twiddle_table(width.max(height) / 2);
    let mut texels = vec![PLACEHOLDER_COLOR; width * height];
    let invalid = || Error::InvalidDimensions {
        width: width as u32,
        height: height as u32,
    };

    for y in (0..height).step_by(2) {
        for x in (0..width).step_by(2) {
            let code = *indices
                .get(twiddled_address(&table, x / 2, y / 2))
                .ok_or_else(invalid)? as usize;
            let mut entry = code * 4;
            for dx in 0..2 {
                for dy in 0..2 {
                    texels[(y + dy) * width + x + dx] = codebook.get(entry).copied().unwrap_or(PLACEHOLDER_COLOR);
                    entry += 1;
                }
            }
        }
    }
    Ok(texels)
}
