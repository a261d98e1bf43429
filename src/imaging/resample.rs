//! Resampling dispatch by source pixel layout.
//!
//! | Source layout | Kernel | Implementation |
//! |---|---|---|
//! | `Luma8`, `Rgb8` (decoded JPEG), `Rgba8` | Lanczos3, fixed-point | `fast_image_resize` convolution |
//! | anything else (16-bit, float, gray+alpha) | Catmull-Rom, f32 | `image::imageops::resize` on RGBA8 |
//!
//! Both paths allocate a fresh buffer of exactly the target size; the source
//! is only read.

use super::backend::BackendError;
use super::calculations::Dimensions;
use fast_image_resize::images::Image;
use fast_image_resize::{FilterType, MulDiv, PixelType, ResizeAlg, ResizeOptions, Resizer};
use image::imageops::{self, FilterType as ImageFilter};
use image::{DynamicImage, GrayImage, RgbImage, RgbaImage};

/// Resampling strategy chosen for a source buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kernel {
    Lanczos3,
    CatmullRom,
}

pub fn kernel_for(image: &DynamicImage) -> Kernel {
    match image {
        DynamicImage::ImageLuma8(_) | DynamicImage::ImageRgb8(_) | DynamicImage::ImageRgba8(_) => {
            Kernel::Lanczos3
        }
        _ => Kernel::CatmullRom,
    }
}

/// Resample `image` to exactly `size`.
pub fn resize(image: &DynamicImage, size: Dimensions) -> Result<DynamicImage, BackendError> {
    match kernel_for(image) {
        Kernel::Lanczos3 => resize_lanczos(image, size),
        Kernel::CatmullRom => Ok(resize_catmull_rom(image, size)),
    }
}

fn resize_lanczos(image: &DynamicImage, size: Dimensions) -> Result<DynamicImage, BackendError> {
    let (w, h) = (size.width, size.height);
    match image {
        DynamicImage::ImageLuma8(buf) => {
            let pixels = lanczos(buf.width(), buf.height(), buf.as_raw(), PixelType::U8, size)?;
            GrayImage::from_raw(w, h, pixels)
                .map(DynamicImage::ImageLuma8)
                .ok_or_else(|| buffer_mismatch(size))
        }
        DynamicImage::ImageRgb8(buf) => {
            let pixels = lanczos(buf.width(), buf.height(), buf.as_raw(), PixelType::U8x3, size)?;
            RgbImage::from_raw(w, h, pixels)
                .map(DynamicImage::ImageRgb8)
                .ok_or_else(|| buffer_mismatch(size))
        }
        DynamicImage::ImageRgba8(buf) => {
            let pixels = lanczos(buf.width(), buf.height(), buf.as_raw(), PixelType::U8x4, size)?;
            RgbaImage::from_raw(w, h, pixels)
                .map(DynamicImage::ImageRgba8)
                .ok_or_else(|| buffer_mismatch(size))
        }
        other => Ok(resize_catmull_rom(other, size)),
    }
}

fn resize_catmull_rom(image: &DynamicImage, size: Dimensions) -> DynamicImage {
    DynamicImage::ImageRgba8(imageops::resize(
        &image.to_rgba8(),
        size.width,
        size.height,
        ImageFilter::CatmullRom,
    ))
}

fn lanczos(
    src_width: u32,
    src_height: u32,
    src_pixels: &[u8],
    pixel_type: PixelType,
    size: Dimensions,
) -> Result<Vec<u8>, BackendError> {
    let mut src = Image::from_vec_u8(src_width, src_height, src_pixels.to_vec(), pixel_type)
        .map_err(|e| BackendError::ProcessingFailed(format!("resize source buffer: {e:?}")))?;
    let mut dst = Image::new(size.width, size.height, pixel_type);

    // Convolve premultiplied RGBA so transparent neighbours don't darken edges
    let mul_div = MulDiv::default();
    if pixel_type == PixelType::U8x4 {
        mul_div
            .multiply_alpha_inplace(&mut src)
            .map_err(|e| BackendError::ProcessingFailed(format!("premultiply alpha: {e:?}")))?;
    }

    let options = ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::Lanczos3));
    Resizer::new()
        .resize(&src, &mut dst, &options)
        .map_err(|e| BackendError::ProcessingFailed(format!("Lanczos3 resize: {e:?}")))?;

    if pixel_type == PixelType::U8x4 {
        mul_div
            .divide_alpha_inplace(&mut dst)
            .map_err(|e| BackendError::ProcessingFailed(format!("unpremultiply alpha: {e:?}")))?;
    }

    Ok(dst.into_vec())
}

fn buffer_mismatch(size: Dimensions) -> BackendError {
    BackendError::ProcessingFailed(format!("resized buffer does not match {size}"))
}
