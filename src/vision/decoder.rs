use std::io::Cursor;

use image::{ImageOutputFormat, RgbImage};

use super::VisionError;

/// Decode an encoded image (JPEG, PNG, ...) into an RGB pixel buffer.
pub fn decode_frame(payload: &[u8]) -> Result<RgbImage, VisionError> {
    if payload.is_empty() {
        return Err(VisionError::Decode("empty payload".to_string()));
    }
    let image = image::load_from_memory(payload).map_err(|e| VisionError::Decode(e.to_string()))?;
    Ok(image.to_rgb8())
}

/// Encode an RGB frame as JPEG.
pub fn encode_jpeg(frame: &RgbImage, quality: u8) -> Result<Vec<u8>, VisionError> {
    let mut output = Vec::new();
    frame
        .write_to(&mut Cursor::new(&mut output), ImageOutputFormat::Jpeg(quality))
        .map_err(|e| VisionError::Encode(e.to_string()))?;
    Ok(output)
}
