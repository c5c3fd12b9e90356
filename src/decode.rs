use crate::error::{PageflipError, PageflipResult};

/// A decoded frame: RGBA8, row-major, tightly packed.
#[derive(Clone, Debug)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub rgba8: Vec<u8>,
}

/// Turns raw encoded bytes into pixels. Malformed payloads are fatal to the
/// whole navigation command; there is no partial-page rendering.
pub trait ImageDecoder {
    fn decode(&self, bytes: &[u8]) -> PageflipResult<DecodedImage>;
}

/// [`ImageDecoder`] backed by the image crate. Grayscale and paletted
/// sources come out as RGBA8 like everything else.
pub struct ImageRsDecoder;

impl ImageDecoder for ImageRsDecoder {
    fn decode(&self, bytes: &[u8]) -> PageflipResult<DecodedImage> {
        let dyn_img = image::load_from_memory(bytes)
            .map_err(|e| PageflipError::decode(format!("load image from memory: {e}")))?;
        let rgba = dyn_img.to_rgba8();
        let (width, height) = rgba.dimensions();
        Ok(DecodedImage {
            width,
            height,
            rgba8: rgba.into_raw(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn decode_png_dimensions_and_pixels() {
        let img = image::RgbaImage::from_raw(2, 1, vec![10, 20, 30, 255, 40, 50, 60, 255]).unwrap();
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();

        let decoded = ImageRsDecoder.decode(&buf).unwrap();
        assert_eq!(decoded.width, 2);
        assert_eq!(decoded.height, 1);
        assert_eq!(decoded.rgba8, vec![10, 20, 30, 255, 40, 50, 60, 255]);
    }

    #[test]
    fn decode_grayscale_expands_to_rgba() {
        let img = image::GrayImage::from_raw(1, 1, vec![77]).unwrap();
        let mut buf = Vec::new();
        image::DynamicImage::ImageLuma8(img)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();

        let decoded = ImageRsDecoder.decode(&buf).unwrap();
        assert_eq!(decoded.rgba8, vec![77, 77, 77, 255]);
    }

    #[test]
    fn garbage_bytes_fail_with_decode_error() {
        let err = ImageRsDecoder.decode(b"definitely not an image").unwrap_err();
        assert!(matches!(err, PageflipError::Decode(_)));
    }
}
