//! PVR texture decoding.
//!
//! Textures are stored in the console's native layout: 16-bit texels in
//! twiddled (Z-order) layout, or vector-quantized with a 1024-colour codebook
//! of 2x2 blocks. This crate turns either into a flat row-major buffer of
//! normalized RGBA.
//!
//! Formats it cannot decode (palettized, YUV, bump maps) produce a
//! placeholder texture filled with [`PLACEHOLDER_COLOR`] rather than an
//! error, so one odd texture never sinks a whole model import.
//!
//! # Example
//!
//! ```no_run
//! use shenkit_common::ByteSource;
//! use shenkit_pvr::decode_pvr;
//!
//! let data = std::fs::read("face.pvr")?;
//! let texture = decode_pvr(&ByteSource::from_vec(data))?;
//! println!("{}x{} {}", texture.width, texture.height, texture.color_format);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Features
//!
//! - `png`: [`Texture::save_png`] via the `image` crate.
//! - `serde`: `Serialize` for format descriptors.

mod color;
mod error;
mod format;
mod texture;
mod twiddle;

pub use color::{to_rgba8, unpack_color, Rgba, PLACEHOLDER_COLOR};
pub use error::{Error, Result};
pub use format::{PixelColorFormat, PixelStorageFormat, PvrtHeader};
pub use texture::{
    decode_pvr, decode_texture, decode_texture_node, expand_vq, read_texture, read_texture_node, Texture,
    TextureNode, UnsupportedPixelFormat, MAX_PLACEHOLDER_SIDE, VQ_CODEBOOK_SIZE,
};
pub use twiddle::{twiddle, twiddle_table, twiddled_address, untwiddle};
