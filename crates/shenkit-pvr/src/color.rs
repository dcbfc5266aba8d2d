//! 16-bit colour unpacking.

use crate::format::PixelColorFormat;

/// Normalized RGBA.
pub type Rgba = [f32; 4];

/// Sentinel for texels that could not be decoded: opaque magenta.
pub const PLACEHOLDER_COLOR: Rgba = [1.0, 0.0, 1.0, 1.0];

/// Extract `bits` bits at `shift` and scale to `[0, 1]`.
#[inline]
fn channel(value: u16, shift: u32, bits: u32) -> f32 {
    let max = (1u32 << bits) - 1;
    ((u32::from(value) >> shift) & max) as f32 / max as f32
}

/// Decode one packed 16-bit texel.
///
/// Returns `None` for formats that are not a single 16-bit colour word.
pub fn unpack_color(value: u16, format: PixelColorFormat) -> Option<Rgba> {
    let rgba = match format {
        PixelColorFormat::Rgb565 => [
            channel(value, 11, 5),
            channel(value, 5, 6),
            channel(value, 0, 5),
            1.0,
        ],
        PixelColorFormat::Argb1555 => [
            channel(value, 10, 5),
            channel(value, 5, 5),
            channel(value, 0, 5),
            channel(value, 15, 1),
        ],
        PixelColorFormat::Argb4444 => [
            channel(value, 8, 4),
            channel(value, 4, 4),
            channel(value, 0, 4),
            channel(value, 12, 4),
        ],
        _ => return None,
    };
    Some(rgba)
}

/// Quantize normalized RGBA to 8 bits per channel.
#[inline]
pub fn to_rgba8(color: Rgba) -> [u8; 4] {
    color.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pack_565(r: f32, g: f32, b: f32) -> u16 {
        let r = (r * 31.0).round() as u16;
        let g = (g * 63.0).round() as u16;
        let b = (b * 31.0).round() as u16;
        (r << 11) | (g << 5) | b
    }

    #[test]
    fn test_rgb565_round_trip_within_one_step() {
        let samples = [0.0f32, 0.1, 0.25, 0.5, 0.66, 0.9, 1.0];
        for &r in &samples {
            for &g in &samples {
                for &b in &samples {
                    let [dr, dg, db, da] = unpack_color(pack_565(r, g, b), PixelColorFormat::Rgb565).unwrap();
                    assert!((dr - r).abs() <= 1.0 / 31.0, "r {r} -> {dr}");
                    assert!((dg - g).abs() <= 1.0 / 63.0, "g {g} -> {dg}");
                    assert!((db - b).abs() <= 1.0 / 31.0, "b {b} -> {db}");
                    assert_eq!(da, 1.0);
                }
            }
        }
    }

    #[test]
    fn test_alpha_formats() {
        assert_eq!(unpack_color(0x8000, PixelColorFormat::Argb1555), Some([0.0, 0.0, 0.0, 1.0]));
        assert_eq!(unpack_color(0x7C00, PixelColorFormat::Argb1555), Some([1.0, 0.0, 0.0, 0.0]));
        assert_eq!(unpack_color(0xF00F, PixelColorFormat::Argb4444), Some([0.0, 0.0, 1.0, 1.0]));
        assert_eq!(unpack_color(0x1234, PixelColorFormat::Pal8), None);
    }

    #[test]
    fn test_placeholder_quantizes_to_magenta() {
        assert_eq!(to_rgba8(PLACEHOLDER_COLOR), [255, 0, 255, 255]);
    }
}
