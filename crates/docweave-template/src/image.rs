//! Image embedding.
//!
//! Recognises the encoded format from the leading magic bytes, reads the
//! intrinsic pixel size from the format header and derives the display size
//! in millimetres.

use docweave_core::{DocweaveError, DocweaveResult};

use crate::data::{ImageConfig, TemplateImage};
use crate::document::{EmbeddedImage, ImageFormat};

/// Millimetres per pixel at 96 DPI.
const MM_PER_PIXEL: f64 = 25.4 / 96.0;

const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// Detects the image format from its magic bytes.
pub fn sniff_format(data: &[u8]) -> Option<ImageFormat> {
    if data.starts_with(PNG_MAGIC) {
        Some(ImageFormat::Png)
    } else if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some(ImageFormat::Jpeg)
    } else if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
        Some(ImageFormat::Gif)
    } else if data.starts_with(b"BM") && data.len() >= 26 {
        Some(ImageFormat::Bmp)
    } else {
        None
    }
}

/// Reads the pixel width and height from the image header.
pub fn dimensions(data: &[u8], format: ImageFormat) -> Option<(u32, u32)> {
    match format {
        ImageFormat::Png => {
            // IHDR is always the first chunk.
            if data.get(12..16)? != b"IHDR" {
                return None;
            }
            Some((be_u32(data, 16)?, be_u32(data, 20)?))
        }
        ImageFormat::Gif => Some((
            u32::from(le_u16(data, 6)?),
            u32::from(le_u16(data, 8)?),
        )),
        ImageFormat::Bmp => {
            // BITMAPINFOHEADER; a negative height means top-down rows.
            let width = le_i32(data, 18)?;
            let height = le_i32(data, 22)?;
            Some((width.unsigned_abs(), height.unsigned_abs()))
        }
        ImageFormat::Jpeg => jpeg_dimensions(data),
    }
}

/// Walks the JPEG segments until a start-of-frame marker.
fn jpeg_dimensions(data: &[u8]) -> Option<(u32, u32)> {
    let mut pos = 2;
    loop {
        if *data.get(pos)? != 0xFF {
            return None;
        }
        let marker = *data.get(pos + 1)?;
        match marker {
            // Fill bytes.
            0xFF => {
                pos += 1;
                continue;
            }
            // Standalone markers without a length.
            0x01 | 0xD0..=0xD7 => {
                pos += 2;
                continue;
            }
            // End of image / start of scan before any frame header.
            0xD9 | 0xDA => return None,
            _ => {}
        }
        let length = usize::from(be_u16(data, pos + 2)?);
        let is_sof = matches!(marker, 0xC0..=0xCF) && !matches!(marker, 0xC4 | 0xC8 | 0xCC);
        if is_sof {
            let height = be_u16(data, pos + 5)?;
            let width = be_u16(data, pos + 7)?;
            return Some((u32::from(width), u32::from(height)));
        }
        pos += 2 + length;
    }
}

/// Computes the display size in millimetres.
///
/// Without a configured size the pixel size is used at 96 DPI. With both
/// dimensions configured they are used as given. With one dimension and
/// `keep_aspect_ratio` the other follows the image's aspect ratio; without
/// `keep_aspect_ratio` the missing one falls back to 96 DPI.
pub fn display_size(pixel_width: u32, pixel_height: u32, config: &ImageConfig) -> (f64, f64) {
    let natural_w = f64::from(pixel_width) * MM_PER_PIXEL;
    let natural_h = f64::from(pixel_height) * MM_PER_PIXEL;

    let Some(size) = config.size else {
        return (natural_w, natural_h);
    };
    let (w, h) = (size.width_mm, size.height_mm);
    match (w > 0.0, h > 0.0) {
        (true, true) => (w, h),
        (true, false) if size.keep_aspect_ratio && pixel_width > 0 => {
            (w, w * f64::from(pixel_height) / f64::from(pixel_width))
        }
        (false, true) if size.keep_aspect_ratio && pixel_height > 0 => {
            (h * f64::from(pixel_width) / f64::from(pixel_height), h)
        }
        (true, false) => (w, natural_h),
        (false, true) => (natural_w, h),
        (false, false) => (natural_w, natural_h),
    }
}

/// Builds the embedded image for placeholder `name` from its encoded bytes.
///
/// # Errors
///
/// Returns `ImageLoad` if the bytes are not a PNG, JPEG, GIF or BMP image or
/// the header is truncated.
pub fn embed(name: &str, data: Vec<u8>, image: &TemplateImage) -> DocweaveResult<EmbeddedImage> {
    let format = sniff_format(&data).ok_or_else(|| DocweaveError::ImageLoad {
        name: name.to_string(),
        reason: "unsupported image format".to_string(),
    })?;
    let (pixel_width, pixel_height) =
        dimensions(&data, format).ok_or_else(|| DocweaveError::ImageLoad {
            name: name.to_string(),
            reason: format!("truncated or corrupt {} header", format.extension()),
        })?;
    let (width_mm, height_mm) = display_size(pixel_width, pixel_height, &image.config);

    tracing::debug!(
        image = %name,
        format = format.mime_type(),
        pixel_width,
        pixel_height,
        width_mm,
        height_mm,
        "embedding image"
    );

    Ok(EmbeddedImage {
        name: name.to_string(),
        format,
        data,
        pixel_width,
        pixel_height,
        width_mm,
        height_mm,
        position: image.config.position,
        wrap: image.config.wrap,
        alignment: image.config.alignment,
        offset_x_mm: image.config.offset_x_mm,
        offset_y_mm: image.config.offset_y_mm,
        alt_text: image.alt_text.clone(),
        title: image.title.clone(),
    })
}

fn be_u16(data: &[u8], at: usize) -> Option<u16> {
    let bytes = data.get(at..at + 2)?;
    Some(u16::from_be_bytes([bytes[0], bytes[1]]))
}

fn le_u16(data: &[u8], at: usize) -> Option<u16> {
    let bytes = data.get(at..at + 2)?;
    Some(u16::from_le_bytes([bytes[0], bytes[1]]))
}

fn be_u32(data: &[u8], at: usize) -> Option<u32> {
    let bytes: [u8; 4] = data.get(at..at + 4)?.try_into().ok()?;
    Some(u32::from_be_bytes(bytes))
}

fn le_i32(data: &[u8], at: usize) -> Option<i32> {
    let bytes: [u8; 4] = data.get(at..at + 4)?.try_into().ok()?;
    Some(i32::from_le_bytes(bytes))
}

/// Minimal well-formed image headers for tests.
#[cfg(test)]
pub(crate) mod fixtures {
    /// A PNG signature plus an IHDR chunk for a `width` x `height` image.
    pub fn png(width: u32, height: u32) -> Vec<u8> {
        let mut data = super::PNG_MAGIC.to_vec();
        data.extend_from_slice(&13u32.to_be_bytes());
        data.extend_from_slice(b"IHDR");
        data.extend_from_slice(&width.to_be_bytes());
        data.extend_from_slice(&height.to_be_bytes());
        data.extend_from_slice(&[8, 6, 0, 0, 0]);
        data.extend_from_slice(&[0; 4]);
        data
    }

    pub fn gif(width: u16, height: u16) -> Vec<u8> {
        let mut data = b"GIF89a".to_vec();
        data.extend_from_slice(&width.to_le_bytes());
        data.extend_from_slice(&height.to_le_bytes());
        data.extend_from_slice(&[0, 0, 0]);
        data
    }

    pub fn bmp(width: i32, height: i32) -> Vec<u8> {
        let mut data = vec![0u8; 54];
        data[0] = b'B';
        data[1] = b'M';
        data[14..18].copy_from_slice(&40u32.to_le_bytes());
        data[18..22].copy_from_slice(&width.to_le_bytes());
        data[22..26].copy_from_slice(&height.to_le_bytes());
        data
    }

    /// SOI, an APP0 segment, then a baseline SOF0 header.
    pub fn jpeg(width: u16, height: u16) -> Vec<u8> {
        let mut data = vec![0xFF, 0xD8];
        data.extend_from_slice(&[0xFF, 0xE0, 0x00, 0x10]);
        data.extend_from_slice(b"JFIF\0");
        data.extend_from_slice(&[1, 1, 0, 0, 1, 0, 1, 0, 0]);
        data.extend_from_slice(&[0xFF, 0xC0, 0x00, 0x11, 0x08]);
        data.extend_from_slice(&height.to_be_bytes());
        data.extend_from_slice(&width.to_be_bytes());
        data.extend_from_slice(&[3, 1, 0x22, 0, 2, 0x11, 1, 3, 0x11, 1]);
        data.extend_from_slice(&[0xFF, 0xD9]);
        data
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use crate::data::{ImageSize, ImageSource};
    use crate::document::ImagePosition;

    fn template_image(config: ImageConfig) -> TemplateImage {
        TemplateImage {
            source: ImageSource::Data(Vec::new()),
            config,
            alt_text: Some("logo".into()),
            title: None,
        }
    }

    #[test]
    fn test_sniff_format() {
        assert_eq!(sniff_format(&png(1, 1)), Some(ImageFormat::Png));
        assert_eq!(sniff_format(&jpeg(1, 1)), Some(ImageFormat::Jpeg));
        assert_eq!(sniff_format(&gif(1, 1)), Some(ImageFormat::Gif));
        assert_eq!(sniff_format(&bmp(1, 1)), Some(ImageFormat::Bmp));
        assert_eq!(sniff_format(b"plain text"), None);
        assert_eq!(sniff_format(&[]), None);
    }

    #[test]
    fn test_dimensions_per_format() {
        assert_eq!(dimensions(&png(640, 480), ImageFormat::Png), Some((640, 480)));
        assert_eq!(dimensions(&gif(32, 16), ImageFormat::Gif), Some((32, 16)));
        assert_eq!(dimensions(&bmp(100, -50), ImageFormat::Bmp), Some((100, 50)));
        assert_eq!(dimensions(&jpeg(300, 200), ImageFormat::Jpeg), Some((300, 200)));
    }

    #[test]
    fn test_truncated_headers() {
        let data = png(1, 1);
        assert_eq!(dimensions(&data[..18], ImageFormat::Png), None);
        assert_eq!(dimensions(&[0xFF, 0xD8, 0xFF], ImageFormat::Jpeg), None);
    }

    #[test]
    fn test_display_size_natural() {
        let (w, h) = display_size(96, 192, &ImageConfig::default());
        assert!((w - 25.4).abs() < 1e-9);
        assert!((h - 50.8).abs() < 1e-9);
    }

    #[test]
    fn test_display_size_keep_aspect() {
        let (w, h) = display_size(200, 100, &ImageConfig::with_width(50.0));
        assert!((w - 50.0).abs() < 1e-9);
        assert!((h - 25.0).abs() < 1e-9);

        let config = ImageConfig {
            size: Some(ImageSize {
                width_mm: 0.0,
                height_mm: 10.0,
                keep_aspect_ratio: true,
            }),
            ..ImageConfig::default()
        };
        let (w, h) = display_size(200, 100, &config);
        assert!((w - 20.0).abs() < 1e-9);
        assert!((h - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_display_size_explicit() {
        let config = ImageConfig {
            size: Some(ImageSize {
                width_mm: 30.0,
                height_mm: 40.0,
                keep_aspect_ratio: true,
            }),
            ..ImageConfig::default()
        };
        assert_eq!(display_size(1, 1, &config), (30.0, 40.0));
    }

    #[test]
    fn test_embed_carries_config() {
        let config = ImageConfig {
            position: ImagePosition::FloatRight,
            offset_x_mm: 3.0,
            ..ImageConfig::default()
        };
        let embedded = embed("logo", png(10, 20), &template_image(config)).unwrap();
        assert_eq!(embedded.format, ImageFormat::Png);
        assert_eq!((embedded.pixel_width, embedded.pixel_height), (10, 20));
        assert_eq!(embedded.position, ImagePosition::FloatRight);
        assert_eq!(embedded.alt_text.as_deref(), Some("logo"));
    }

    #[test]
    fn test_embed_rejects_unknown_bytes() {
        let err = embed("logo", b"nope".to_vec(), &template_image(ImageConfig::default()))
            .unwrap_err();
        assert!(matches!(err, DocweaveError::ImageLoad { ref name, .. } if name == "logo"));
    }
}
