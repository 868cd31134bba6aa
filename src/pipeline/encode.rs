//! Canvas encoding: `RgbImage` → JPEG/PNG bytes, files, or base64 payloads.
//!
//! The cover-upload endpoint takes a base64-encoded JPEG body of at most
//! 256 KiB. [`encode_for_upload`] lowers the JPEG quality step by step until
//! the payload fits.

use crate::config::OutputFormat;
use crate::error::CoverGenError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use std::io::{Cursor, Write};
use std::path::Path;
use tracing::debug;

/// Maximum base64 payload accepted by the cover-upload endpoint.
pub const UPLOAD_LIMIT_BYTES: usize = 256 * 1024;

/// Quality decrement between upload attempts.
const UPLOAD_QUALITY_STEP: u8 = 10;

/// Encode the canvas in `format`.
pub fn encode_canvas(canvas: &RgbImage, format: OutputFormat) -> Result<Vec<u8>, CoverGenError> {
    let mut buf = Vec::new();
    match format {
        OutputFormat::Jpeg { quality } => {
            JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100))
                .encode_image(canvas)
                .map_err(|e| CoverGenError::EncodeFailed {
                    detail: e.to_string(),
                })?;
        }
        OutputFormat::Png => {
            canvas
                .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
                .map_err(|e| CoverGenError::EncodeFailed {
                    detail: e.to_string(),
                })?;
        }
    }
    debug!("Encoded {}×{} canvas → {} bytes", canvas.width(), canvas.height(), buf.len());
    Ok(buf)
}

/// Encode and write the canvas to `path` atomically (temp file + rename in
/// the same directory), creating parent directories as needed.
pub fn save_canvas(canvas: &RgbImage, path: &Path, format: OutputFormat) -> Result<(), CoverGenError> {
    let bytes = encode_canvas(canvas, format)?;
    let write_err = |source: std::io::Error| CoverGenError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => std::path::PathBuf::from("."),
    };
    std::fs::create_dir_all(&parent).map_err(write_err)?;

    let mut tmp = tempfile::NamedTempFile::new_in(&parent).map_err(write_err)?;
    tmp.write_all(&bytes).map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}

/// Base64 JPEG body for the cover-upload endpoint.
///
/// Starts at `quality` and steps down by 10 until the payload fits
/// [`UPLOAD_LIMIT_BYTES`].
pub fn encode_for_upload(canvas: &RgbImage, quality: u8) -> Result<String, CoverGenError> {
    let mut quality = quality.clamp(1, 100);
    loop {
        let jpeg = encode_canvas(canvas, OutputFormat::Jpeg { quality })?;
        let b64 = STANDARD.encode(&jpeg);
        if b64.len() <= UPLOAD_LIMIT_BYTES {
            debug!("Upload payload at quality {}: {} bytes base64", quality, b64.len());
            return Ok(b64);
        }
        if quality <= UPLOAD_QUALITY_STEP {
            return Err(CoverGenError::CoverTooLarge {
                bytes: b64.len(),
                limit: UPLOAD_LIMIT_BYTES,
            });
        }
        quality -= UPLOAD_QUALITY_STEP;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn canvas() -> RgbImage {
        RgbImage::from_fn(64, 48, |x, y| Rgb([x as u8 * 4, y as u8 * 5, 90]))
    }

    #[test]
    fn jpeg_and_png_have_magic_bytes() {
        let jpeg = encode_canvas(&canvas(), OutputFormat::Jpeg { quality: 80 }).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);

        let png = encode_canvas(&canvas(), OutputFormat::Png).unwrap();
        assert_eq!(&png[..4], b"\x89PNG");
    }

    #[test]
    fn save_writes_decodable_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/cover.png");
        save_canvas(&canvas(), &path, OutputFormat::Png).unwrap();

        let back = image::open(&path).unwrap().to_rgb8();
        assert_eq!(back, canvas());
    }

    #[test]
    fn upload_payload_is_valid_base64_jpeg() {
        let b64 = encode_for_upload(&canvas(), 80).unwrap();
        let decoded = STANDARD.decode(&b64).expect("valid base64");
        assert_eq!(&decoded[..2], &[0xFF, 0xD8]);
        assert!(b64.len() <= UPLOAD_LIMIT_BYTES);
    }
}
