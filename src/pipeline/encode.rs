//! Image encoding: `RgbaImage` → PNG `data:` URL.
//!
//! PNG is the only output format: upload targets accept it everywhere and it
//! keeps rendered text crisp.

use crate::error::ConvertError;
use crate::file::{data_url, PNG_MIME};
use image::{DynamicImage, RgbaImage};
use std::io::Cursor;
use tracing::debug;

/// Encode a captured surface as a PNG data URL.
pub fn encode_png(img: RgbaImage) -> Result<String, ConvertError> {
    let mut buf = Vec::new();
    DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|e| ConvertError::Render {
            message: format!("PNG encoding failed: {e}"),
        })?;

    debug!("Encoded image → {} bytes PNG", buf.len());
    Ok(data_url(PNG_MIME, &buf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::decode_data_url;
    use image::Rgba;

    #[test]
    fn encode_small_image() {
        let img = RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255]));
        let url = encode_png(img).expect("encode should succeed");
        assert!(url.starts_with("data:image/png;base64,"));

        let (mime, bytes) = decode_data_url(&url).expect("valid data URL");
        assert_eq!(mime.as_deref(), Some("image/png"));
        let decoded = image::load_from_memory(&bytes).expect("valid PNG");
        assert_eq!((decoded.width(), decoded.height()), (10, 10));
    }
}
