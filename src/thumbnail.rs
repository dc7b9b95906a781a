use eframe::egui::ColorImage;

use crate::error::ThumbnailError;

/// Downloads and decodes the preview image reported by the probe.
pub fn fetch_thumbnail(url: &str) -> Result<ColorImage, ThumbnailError> {
    // Perform a blocking HTTP GET request
    let resp = reqwest::blocking::get(url)?.error_for_status()?.bytes()?;
    decode_thumbnail(&resp)
}

/// Converts encoded image bytes into an egui image without premultiplying alpha
pub fn decode_thumbnail(bytes: &[u8]) -> Result<ColorImage, ThumbnailError> {
    let img = image::load_from_memory(bytes)?.to_rgba8();
    let size = [img.width() as usize, img.height() as usize];
    Ok(ColorImage::from_rgba_unmultiplied(size, img.as_raw()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn decodes_png_bytes() {
        let src = image::RgbaImage::from_pixel(4, 2, image::Rgba([255, 0, 0, 255]));
        let mut png = Vec::new();
        image::DynamicImage::ImageRgba8(src)
            .write_to(&mut Cursor::new(&mut png), image::ImageOutputFormat::Png)
            .unwrap();

        let decoded = decode_thumbnail(&png).unwrap();
        assert_eq!(decoded.size, [4, 2]);
    }

    #[test]
    fn garbage_is_a_decode_error() {
        assert!(matches!(decode_thumbnail(b"nope"), Err(ThumbnailError::Decode(_))));
    }
}
