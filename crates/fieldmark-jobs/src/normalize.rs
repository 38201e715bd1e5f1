//! Image normalization for imported survey photos.
//!
//! Produces the three payloads stored per image: the orientation-corrected
//! full image, the web preview, and the index thumbnail. Pure function over
//! byte buffers with no persistence and no shared state.
//!
//! A failure anywhere in here costs exactly one image: the owning note and
//! any sibling images still import.

use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;

use fieldmark_core::{defaults, exif, Error, Result, Rotation};

/// The three payload buffers produced for one source image.
#[derive(Debug, Clone)]
pub struct NormalizedImage {
    /// Orientation-corrected full image, original resolution, JPEG.
    pub image: Vec<u8>,
    /// Source thumbnail, passed through untouched.
    pub thumbnail: Vec<u8>,
    /// Downscaled web preview, JPEG.
    pub web_image: Vec<u8>,
}

/// Normalize one source image and its thumbnail.
///
/// The full payload is decoded, rotated per its EXIF orientation tag
/// (canvas expands to fit, no cropping), and re-encoded at high quality.
/// The web preview is the corrected image downscaled so neither dimension
/// exceeds [`defaults::WEB_IMAGE_MAX_PX`], aspect preserved, never
/// upscaled. The thumbnail is already pre-sized by the capturing app and
/// is used only as a small index preview, so it is neither rotated nor
/// recompressed.
///
/// # Errors
/// Returns [`Error::ImageDecode`] when the full payload cannot be decoded
/// or re-encoded. Missing or garbled EXIF is not an error; the image is
/// stored unrotated.
pub fn normalize(image_data: &[u8], thumbnail: &[u8]) -> Result<NormalizedImage> {
    let decoded = image::load_from_memory(image_data)
        .map_err(|e| Error::ImageDecode(e.to_string()))?;

    let rotation = exif::rotation_for(exif::orientation(image_data));
    let corrected = apply_rotation(decoded, rotation);

    let image = encode_jpeg(&corrected, defaults::FULL_IMAGE_QUALITY)?;
    let web_image = encode_jpeg(&web_preview(&corrected), defaults::WEB_IMAGE_QUALITY)?;

    Ok(NormalizedImage {
        image,
        thumbnail: thumbnail.to_vec(),
        web_image,
    })
}

/// Apply an orientation-correcting rotation. 90°/270° rotations swap the
/// canvas dimensions.
fn apply_rotation(img: DynamicImage, rotation: Rotation) -> DynamicImage {
    match rotation {
        Rotation::None => img,
        Rotation::Deg90 => img.rotate90(),
        Rotation::Deg180 => img.rotate180(),
        Rotation::Deg270 => img.rotate270(),
    }
}

/// Downscale to the web preview bound. Images already within bounds are
/// returned as-is rather than upscaled.
fn web_preview(img: &DynamicImage) -> DynamicImage {
    let max = defaults::WEB_IMAGE_MAX_PX;
    if img.width() <= max && img.height() <= max {
        img.clone()
    } else {
        img.thumbnail(max, max)
    }
}

fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut buf, quality);
    encoder
        .encode_image(&img.to_rgb8())
        .map_err(|e| Error::ImageDecode(format!("re-encode failed: {}", e)))?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    /// Encode a horizontal-gradient test image as PNG bytes.
    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, _| Rgb([(x % 256) as u8, 64, 128]));
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut buf, ImageFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    fn dimensions(data: &[u8]) -> (u32, u32) {
        let img = image::load_from_memory(data).unwrap();
        (img.width(), img.height())
    }

    #[test]
    fn test_normalize_rejects_undecodable_payload() {
        let result = normalize(b"not an image at all", b"thumb");
        assert!(matches!(result, Err(Error::ImageDecode(_))));
    }

    #[test]
    fn test_normalize_preserves_dimensions_without_exif() {
        let source = png_bytes(64, 48);
        let normalized = normalize(&source, b"thumb").unwrap();
        assert_eq!(dimensions(&normalized.image), (64, 48));
    }

    #[test]
    fn test_normalize_passes_thumbnail_through_untouched() {
        let source = png_bytes(64, 48);
        let thumb = vec![0xde, 0xad, 0xbe, 0xef];
        let normalized = normalize(&source, &thumb).unwrap();
        assert_eq!(normalized.thumbnail, thumb);
    }

    #[test]
    fn test_normalize_small_image_web_preview_not_upscaled() {
        let source = png_bytes(64, 48);
        let normalized = normalize(&source, b"t").unwrap();
        assert_eq!(dimensions(&normalized.web_image), (64, 48));
    }

    #[test]
    fn test_normalize_large_image_web_preview_bounded() {
        let source = png_bytes(960, 240);
        let normalized = normalize(&source, b"t").unwrap();
        let (w, h) = dimensions(&normalized.web_image);
        assert_eq!((w, h), (480, 120));
        // Full payload keeps original resolution.
        assert_eq!(dimensions(&normalized.image), (960, 240));
    }

    #[test]
    fn test_apply_rotation_dimension_swap() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(4, 2));
        assert_eq!(apply_rotation(img.clone(), Rotation::None).dimensions_tuple(), (4, 2));
        assert_eq!(apply_rotation(img.clone(), Rotation::Deg90).dimensions_tuple(), (2, 4));
        assert_eq!(apply_rotation(img.clone(), Rotation::Deg180).dimensions_tuple(), (4, 2));
        assert_eq!(apply_rotation(img, Rotation::Deg270).dimensions_tuple(), (2, 4));
    }

    #[test]
    fn test_apply_rotation_180_flips_pixels() {
        let mut img = RgbImage::new(2, 1);
        img.put_pixel(0, 0, Rgb([255, 0, 0]));
        img.put_pixel(1, 0, Rgb([0, 0, 255]));

        let rotated = apply_rotation(DynamicImage::ImageRgb8(img), Rotation::Deg180).to_rgb8();
        assert_eq!(rotated.get_pixel(0, 0), &Rgb([0, 0, 255]));
        assert_eq!(rotated.get_pixel(1, 0), &Rgb([255, 0, 0]));
    }

    #[test]
    fn test_apply_rotation_90_moves_top_left() {
        let mut img = RgbImage::new(2, 1);
        img.put_pixel(0, 0, Rgb([255, 0, 0]));
        img.put_pixel(1, 0, Rgb([0, 0, 255]));

        // Clockwise 90°: the left pixel of a 2x1 row lands top of a 1x2 column.
        let rotated = apply_rotation(DynamicImage::ImageRgb8(img), Rotation::Deg90).to_rgb8();
        assert_eq!(rotated.dimensions(), (1, 2));
        assert_eq!(rotated.get_pixel(0, 0), &Rgb([255, 0, 0]));
        assert_eq!(rotated.get_pixel(0, 1), &Rgb([0, 0, 255]));
    }

    trait DimensionsTuple {
        fn dimensions_tuple(&self) -> (u32, u32);
    }

    impl DimensionsTuple for DynamicImage {
        fn dimensions_tuple(&self) -> (u32, u32) {
            (self.width(), self.height())
        }
    }
}
