//! Image processing and encoding utilities.
//!
//! This module handles mirroring captured camera frames and encoding
//! images for transmission to the Gemini API or for snapshot export.
//!
//! # Mirroring
//!
//! Camera previews are conventionally shown mirrored, like a bathroom
//! mirror. The frame stored for the pipeline must match what the user
//! saw in the preview, so captured frames are flipped horizontally
//! before encoding rather than kept in raw sensor orientation.

use crate::error::{AppError, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;

/// JPEG quality used for captured camera frames (0.9 on the 0..1 scale).
pub const CAPTURE_JPEG_QUALITY: u8 = 90;

/// Image processing utilities for the capture and export workflows.
///
/// This struct provides static methods for processing images before
/// sending them to the Gemini API or writing them to disk.
pub struct ImageProcessor;

impl ImageProcessor {
    /// Mirrors an image horizontally.
    ///
    /// Applied to camera frames so the stored image matches the
    /// mirrored live preview the user composed against.
    pub fn mirror_horizontal(image: &DynamicImage) -> DynamicImage {
        image.fliph()
    }

    /// Encodes a DynamicImage to a Base64 JPEG string.
    ///
    /// Uses [`CAPTURE_JPEG_QUALITY`] for a balance between file size
    /// and image quality.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::ImageDecode`] if JPEG encoding fails.
    pub fn encode_to_base64_jpeg(image: &DynamicImage) -> Result<String> {
        let mut buffer: Vec<u8> = Vec::new();
        let mut cursor = Cursor::new(&mut buffer);

        let encoder = JpegEncoder::new_with_quality(&mut cursor, CAPTURE_JPEG_QUALITY);
        image
            .write_with_encoder(encoder)
            .map_err(|e| AppError::decode(format!("Failed to encode JPEG: {}", e)))?;

        Ok(BASE64.encode(buffer))
    }

    /// Encodes a DynamicImage to PNG bytes.
    ///
    /// Used by the snapshot exporter, where lossless output is preferred.
    pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>> {
        let mut buffer: Vec<u8> = Vec::new();
        let mut cursor = Cursor::new(&mut buffer);

        image
            .write_to(&mut cursor, ImageFormat::Png)
            .map_err(|e| AppError::decode(format!("Failed to encode PNG: {}", e)))?;

        Ok(buffer)
    }

    /// Decodes a Base64 payload back into an image.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::ImageDecode`] if the payload is not valid
    /// Base64 or does not contain a decodable image.
    pub fn decode_base64_image(data: &str) -> Result<DynamicImage> {
        let bytes = BASE64
            .decode(data)
            .map_err(|e| AppError::decode(format!("Invalid base64 payload: {}", e)))?;

        image::load_from_memory(&bytes)
            .map_err(|e| AppError::decode(format!("Failed to decode image: {}", e)))
    }

    /// Resizes an image to fit within the given bounds, preserving aspect ratio.
    ///
    /// Never upscales: images already inside the bounds are returned unchanged.
    pub fn fit_within(image: &DynamicImage, max_width: u32, max_height: u32) -> DynamicImage {
        if image.width() <= max_width && image.height() <= max_height {
            return image.clone();
        }
        image.resize(max_width, max_height, FilterType::Triangle)
    }
}
