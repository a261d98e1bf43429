//! Transparency flattening for containers that cannot carry full alpha.

use image::{DynamicImage, Rgb, RgbImage};

/// True when every pixel is fully opaque (or the layout has no alpha).
pub fn is_opaque(image: &DynamicImage) -> bool {
    match image {
        DynamicImage::ImageLumaA8(buf) => buf.pixels().all(|p| p.0[1] == u8::MAX),
        DynamicImage::ImageRgba8(buf) => buf.pixels().all(|p| p.0[3] == u8::MAX),
        DynamicImage::ImageLumaA16(buf) => buf.pixels().all(|p| p.0[1] == u16::MAX),
        DynamicImage::ImageRgba16(buf) => buf.pixels().all(|p| p.0[3] == u16::MAX),
        DynamicImage::ImageRgba32F(buf) => buf.pixels().all(|p| p.0[3] >= 1.0),
        _ => true,
    }
}

/// Composite `image` over opaque white into a new RGB buffer.
///
/// Uses standard "over" blending. The result has no alpha channel, so
/// encoders that accept alpha still write an opaque image. Opaque input
/// comes back visually identical, in a fresh allocation.
pub fn flatten(image: &DynamicImage) -> DynamicImage {
    let rgba = image.to_rgba8();
    let rgb = RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        Rgb([over_white(r, a), over_white(g, a), over_white(b, a)])
    });
    DynamicImage::ImageRgb8(rgb)
}

/// `c*a + 255*(1-a)` in 8-bit fixed point, rounded.
fn over_white(channel: u8, alpha: u8) -> u8 {
    let (c, a) = (u32::from(channel), u32::from(alpha));
    ((c * a + 255 * (255 - a) + 127) / 255) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, LumaA, Rgba, RgbaImage};

    #[test]
    fn layouts_without_alpha_are_opaque() {
        assert!(is_opaque(&DynamicImage::new_rgb8(4, 4)));
        assert!(is_opaque(&DynamicImage::new_luma8(4, 4)));
    }

    #[test]
    fn alpha_layouts_checked_per_pixel() {
        let mut buf = RgbaImage::from_pixel(4, 4, Rgba([1, 2, 3, 255]));
        assert!(is_opaque(&DynamicImage::ImageRgba8(buf.clone())));
        buf.put_pixel(3, 3, Rgba([1, 2, 3, 254]));
        assert!(!is_opaque(&DynamicImage::ImageRgba8(buf)));

        let gray = ImageBuffer::from_pixel(2, 2, LumaA([10u8, 0]));
        assert!(!is_opaque(&DynamicImage::ImageLumaA8(gray)));
    }

    #[test]
    fn transparent_pixels_become_white() {
        let src = DynamicImage::ImageRgba8(RgbaImage::from_pixel(3, 3, Rgba([0, 0, 0, 0])));
        let out = flatten(&src).to_rgba8();
        assert!(out.pixels().all(|p| p.0 == [255, 255, 255, 255]));
    }

    #[test]
    fn half_transparent_black_becomes_gray() {
        let src = DynamicImage::ImageRgba8(RgbaImage::from_pixel(1, 1, Rgba([0, 0, 0, 128])));
        let out = flatten(&src).to_rgba8();
        let p = out.get_pixel(0, 0).0;
        assert_eq!(p[3], 255);
        assert!((120..=135).contains(&p[0]), "got {p:?}");
    }

    #[test]
    fn result_is_opaque_and_same_size() {
        let src = DynamicImage::ImageRgba8(RgbaImage::from_fn(7, 5, |x, _| {
            Rgba([200, 10, 10, (x * 30) as u8])
        }));
        let out = flatten(&src);
        assert_eq!((out.width(), out.height()), (7, 5));
        assert!(is_opaque(&out));
        assert!(!out.color().has_alpha());
    }

    #[test]
    fn partial_alpha_blends_without_residual_alpha() {
        for a in [1u8, 100, 128, 200, 254] {
            let src = DynamicImage::ImageRgba8(RgbaImage::from_pixel(1, 1, Rgba([0, 0, 0, a])));
            let out = flatten(&src);
            let p = out.to_rgba8().get_pixel(0, 0).0;
            assert_eq!(p, [255 - a, 255 - a, 255 - a, 255], "alpha {a}");
        }
    }

    #[test]
    fn opaque_input_is_visually_unchanged() {
        let rgb = RgbImage::from_fn(6, 6, |x, y| Rgb([x as u8 * 40, y as u8 * 40, 7]));
        let src = DynamicImage::ImageRgb8(rgb.clone());
        assert_eq!(flatten(&src).to_rgb8(), rgb);
    }
}
