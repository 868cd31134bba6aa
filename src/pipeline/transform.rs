//! Pixel helpers: cover-fit, in-place rotation and centre zoom.
//!
//! All functions are pure: they take an image by reference and return a new
//! one, so the Composer can chain them without tracking mutation.

use crate::error::CoverGenError;
use crate::pipeline::layout::Rect;
use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgb, RgbImage};

/// Resampling filter used for every resize.
const FILTER: FilterType = FilterType::Lanczos3;

/// The centred region of a `src_w × src_h` image whose aspect ratio matches
/// `target_w × target_h`, cropping only the longer axis.
///
/// The matching side is rounded to the nearest pixel, so the ratio is exact
/// whenever an integer solution exists and within half a pixel otherwise.
/// An empty source yields an empty region.
pub fn cover_crop_region(src_w: u32, src_h: u32, target_w: u32, target_h: u32) -> Rect {
    if src_w == 0 || src_h == 0 {
        return Rect::new(0, 0, src_w, src_h);
    }
    let (sw, sh) = (u64::from(src_w), u64::from(src_h));
    let (tw, th) = (u64::from(target_w.max(1)), u64::from(target_h.max(1)));

    if sw * th > tw * sh {
        // Source is wider than the target: trim left and right.
        let crop_w = ((sh * tw + th / 2) / th).clamp(1, sw) as u32;
        Rect::new((src_w - crop_w) / 2, 0, crop_w, src_h)
    } else {
        // Source is taller (or equal): trim top and bottom.
        let crop_h = ((sw * th + tw / 2) / tw).clamp(1, sh) as u32;
        Rect::new(0, (src_h - crop_h) / 2, src_w, crop_h)
    }
}

/// Fill a `width × height` cell with `image` using "cover" semantics: crop the
/// centre to the target aspect ratio, then scale to the exact size.
///
/// # Errors
/// [`CoverGenError::EmptyImage`] when `image` has a zero side.
pub fn cover_fit(image: &DynamicImage, width: u32, height: u32) -> Result<RgbImage, CoverGenError> {
    if image.width() == 0 || image.height() == 0 {
        return Err(CoverGenError::EmptyImage {
            width: image.width(),
            height: image.height(),
        });
    }
    let region = cover_crop_region(image.width(), image.height(), width, height);
    let cropped = image.crop_imm(region.x, region.y, region.width, region.height);
    if cropped.width() == width && cropped.height() == height {
        return Ok(cropped.to_rgb8());
    }
    Ok(imageops::resize(&cropped.to_rgb8(), width, height, FILTER))
}

/// Rotate `image` counter-clockwise by `degrees` about its centre without
/// growing the canvas. Corners exposed by the rotation are filled with
/// `fill`; content rotated past the edges is clipped.
pub fn rotate_in_place(image: &RgbImage, degrees: f32, fill: Rgb<u8>) -> RgbImage {
    if degrees.rem_euclid(360.0) == 0.0 {
        return image.clone();
    }

    let (width, height) = image.dimensions();
    let (sin, cos) = f64::from(degrees).to_radians().sin_cos();
    let (cx, cy) = (f64::from(width) / 2.0, f64::from(height) / 2.0);

    let mut out = RgbImage::from_pixel(width, height, fill);
    for (x, y, pixel) in out.enumerate_pixels_mut() {
        let dx = f64::from(x) + 0.5 - cx;
        let dy = f64::from(y) + 0.5 - cy;
        // Inverse mapping: where in the source does this output pixel come from?
        let sx = cx + dx * cos - dy * sin;
        let sy = cy + dx * sin + dy * cos;
        *pixel = sample_bilinear(image, sx - 0.5, sy - 0.5, fill);
    }
    out
}

/// Bilinear sample at pixel-centre coordinates; neighbours outside the image
/// contribute `fill`.
fn sample_bilinear(image: &RgbImage, fx: f64, fy: f64, fill: Rgb<u8>) -> Rgb<u8> {
    let (width, height) = (i64::from(image.width()), i64::from(image.height()));
    let (x0, y0) = (fx.floor(), fy.floor());
    let (tx, ty) = (fx - x0, fy - y0);
    let (x0, y0) = (x0 as i64, y0 as i64);

    if x0 < -1 || y0 < -1 || x0 >= width || y0 >= height {
        return fill;
    }

    let at = |x: i64, y: i64| -> [f64; 3] {
        let Rgb(c) = if x >= 0 && y >= 0 && x < width && y < height {
            *image.get_pixel(x as u32, y as u32)
        } else {
            fill
        };
        [f64::from(c[0]), f64::from(c[1]), f64::from(c[2])]
    };

    let (p00, p10, p01, p11) = (at(x0, y0), at(x0 + 1, y0), at(x0, y0 + 1), at(x0 + 1, y0 + 1));
    let mut out = [0u8; 3];
    for i in 0..3 {
        let top = p00[i] * (1.0 - tx) + p10[i] * tx;
        let bottom = p01[i] * (1.0 - tx) + p11[i] * tx;
        out[i] = (top * (1.0 - ty) + bottom * ty).round().clamp(0.0, 255.0) as u8;
    }
    Rgb(out)
}

/// Magnify the centre of `image` by `zoom`: crop a centred region of
/// `dimension / zoom` on each axis and scale it back to the full size.
///
/// `zoom == 1.0` returns an identical copy. Factors below 1.0 (including zero,
/// negatives and NaN) are configuration errors.
pub fn zoom_in(image: &RgbImage, zoom: f32) -> Result<RgbImage, CoverGenError> {
    if !zoom.is_finite() || zoom < 1.0 {
        return Err(CoverGenError::InvalidConfig(format!(
            "Zoom must be a finite factor ≥ 1.0, got {zoom}"
        )));
    }

    let (width, height) = image.dimensions();
    let crop_w = ((f64::from(width) / f64::from(zoom)).round() as u32).clamp(1, width);
    let crop_h = ((f64::from(height) / f64::from(zoom)).round() as u32).clamp(1, height);
    if crop_w == width && crop_h == height {
        return Ok(image.clone());
    }

    let left = (width - crop_w) / 2;
    let top = (height - crop_h) / 2;
    let cropped = imageops::crop_imm(image, left, top, crop_w, crop_h).to_image();
    Ok(imageops::resize(&cropped, width, height, FILTER))
}
