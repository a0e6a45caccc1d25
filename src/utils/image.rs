//! Image decoding for uploaded and streamed payloads

use std::io::Cursor;

use base64::Engine;
use image::DynamicImage;

use crate::error::{ProcessingError, ProcessingResult};

/// Decode image from bytes (JPEG, PNG, etc.) with EXIF orientation applied
pub fn decode_image(data: &[u8]) -> ProcessingResult<DynamicImage> {
    if data.is_empty() {
        return Err(ProcessingError::Decode("empty image payload".to_string()));
    }
    let image = image::load_from_memory(data)?;
    Ok(apply_exif_orientation(data, image))
}

/// Decode a base64 payload, optionally wrapped in a `data:` URL
pub fn decode_base64_image(text: &str) -> ProcessingResult<DynamicImage> {
    let payload = match text.split_once("base64,") {
        Some((_, rest)) => rest,
        None => text,
    };
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| ProcessingError::Decode(format!("invalid base64 payload: {}", e)))?;
    decode_image(&bytes)
}

/// Apply EXIF orientation to correct image rotation
/// Mobile phones often store images with EXIF orientation tags instead of rotating pixels
fn apply_exif_orientation(data: &[u8], image: DynamicImage) -> DynamicImage {
    let orientation = match exif::Reader::new().read_from_container(&mut Cursor::new(data)) {
        Ok(exif_data) => exif_data
            .get_field(exif::Tag::Orientation, exif::In::PRIMARY)
            .and_then(|field| field.value.get_uint(0))
            .unwrap_or(1),
        Err(_) => 1,
    };

    // See https://exiftool.org/TagNames/EXIF.html (Orientation)
    match orientation {
        2 => image.fliph(),
        3 => image.rotate180(),
        4 => image.flipv(),
        5 => image.rotate90().fliph(),
        6 => image.rotate90(),
        7 => image.rotate270().fliph(),
        8 => image.rotate270(),
        _ => image,
    }
}

/// Encode image to PNG bytes
pub fn encode_png(image: &DynamicImage) -> anyhow::Result<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    image.write_to(&mut buffer, image::ImageFormat::Png)?;
    Ok(buffer.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_png() -> Vec<u8> {
        encode_png(&DynamicImage::new_rgb8(12, 7)).unwrap()
    }

    #[test]
    fn test_decode_png() {
        let image = decode_image(&sample_png()).unwrap();
        assert_eq!((image.width(), image.height()), (12, 7));
    }

    #[test]
    fn test_decode_garbage() {
        assert!(matches!(decode_image(b"not an image"), Err(ProcessingError::Decode(_))));
        assert!(matches!(decode_image(&[]), Err(ProcessingError::Decode(_))));
    }

    #[test]
    fn test_decode_base64_data_url() {
        let encoded = base64::engine::general_purpose::STANDARD.encode(sample_png());
        let url = format!("data:image/png;base64,{}", encoded);

        assert_eq!(decode_base64_image(&url).unwrap().width(), 12);
        assert_eq!(decode_base64_image(&encoded).unwrap().height(), 7);
        assert!(matches!(decode_base64_image("!!!"), Err(ProcessingError::Decode(_))));
    }
}
