//! Portrait capture functionality.
//!
//! This module normalizes the two ways a portrait can enter the system,
//! a live camera frame or an uploaded file, into a single in-memory
//! [`CapturedImage`] representation.
//!
//! The camera itself is a capability: hosts inject a [`CameraDevice`]
//! implementation (a webcam backend, a browser `getUserMedia` bridge, or
//! a fake in tests), and [`MediaCapture`] enforces the stream lifecycle
//! around it.
//!
//! # Example
//!
//! ```ignore
//! use glowup_core::capture;
//!
//! let portrait = capture::acquire_from_file("selfie.jpg")?;
//! println!("{} ({} base64 bytes)", portrait.mime_type, portrait.data.len());
//! ```

use crate::error::{AppError, Result};
use crate::image_processing::ImageProcessor;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use image::DynamicImage;
use std::fs;
use std::path::Path;

/// Upload size ceiling. Files above this are rejected before reading.
pub const MAX_UPLOAD_BYTES: u64 = 5 * 1024 * 1024;

/// Preferred camera stream resolution.
pub const PREFERRED_CAMERA_WIDTH: u32 = 1280;
/// Preferred camera stream resolution.
pub const PREFERRED_CAMERA_HEIGHT: u32 = 720;

/// How a portrait entered the system.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageSource {
    /// Captured from a live camera stream.
    Camera,
    /// Uploaded from a file.
    Upload,
}

/// An encoded portrait held in memory.
///
/// A new capture or upload always replaces the previous image wholesale;
/// the struct is never mutated in place. Downstream results derived from
/// a superseded image are invalidated by the orchestrator.
#[derive(Clone, Debug)]
pub struct CapturedImage {
    /// Base64-encoded image bytes.
    pub data: String,
    /// MIME type of the encoded bytes (e.g. `image/jpeg`).
    pub mime_type: String,
    /// Provenance of the image.
    pub source: ImageSource,
}

impl CapturedImage {
    /// Decodes the Base64 payload back into raw bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        BASE64
            .decode(&self.data)
            .map_err(|e| AppError::decode(format!("Invalid base64 payload: {}", e)))
    }
}

/// A camera stream backend.
///
/// Exactly one stream may be open at a time; [`MediaCapture`] guarantees
/// that every open is matched by a release. Implementations map platform
/// permission failures to [`AppError::PermissionDenied`].
pub trait CameraDevice {
    /// Opens a front-facing stream at the preferred resolution.
    fn open(&mut self, width: u32, height: u32) -> Result<()>;

    /// Reads the current frame in raw sensor orientation.
    fn read_frame(&mut self) -> Result<DynamicImage>;

    /// Stops all tracks and releases the hardware handle.
    ///
    /// Must be safe to call when no stream is open.
    fn release(&mut self);

    /// Whether a stream is currently open.
    fn is_open(&self) -> bool;
}

/// Owns the camera stream lifecycle and produces [`CapturedImage`]s.
///
/// All paths that end a stream (explicit stop, successful capture,
/// teardown) converge on the same release routine, so the hardware
/// handle can neither leak nor be released twice.
pub struct MediaCapture<C: CameraDevice> {
    camera: C,
}

impl<C: CameraDevice> MediaCapture<C> {
    pub fn new(camera: C) -> Self {
        Self { camera }
    }

    /// Opens the camera stream for a live preview.
    ///
    /// Any previously open stream is released first.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::PermissionDenied`] if camera access is refused,
    /// or [`AppError::CameraCapture`] for other acquisition failures.
    pub fn start_preview(&mut self) -> Result<()> {
        self.release_stream();
        self.camera
            .open(PREFERRED_CAMERA_WIDTH, PREFERRED_CAMERA_HEIGHT)
    }

    /// Returns the current frame mirrored for preview display.
    pub fn preview_frame(&mut self) -> Result<DynamicImage> {
        let frame = self.camera.read_frame()?;
        Ok(ImageProcessor::mirror_horizontal(&frame))
    }

    /// Captures the current frame and closes the stream.
    ///
    /// The frame is mirrored horizontally so the stored image matches
    /// the preview the user composed against, then encoded as JPEG.
    /// The stream is released whether or not encoding succeeds.
    pub fn acquire_from_camera(&mut self) -> Result<CapturedImage> {
        let frame = self.camera.read_frame();
        self.release_stream();

        let mirrored = ImageProcessor::mirror_horizontal(&frame?);
        let data = ImageProcessor::encode_to_base64_jpeg(&mirrored)?;

        Ok(CapturedImage {
            data,
            mime_type: "image/jpeg".to_string(),
            source: ImageSource::Camera,
        })
    }

    /// Releases the stream without capturing (user cancelled).
    pub fn stop_preview(&mut self) {
        self.release_stream();
    }

    /// Whether a preview stream is currently open.
    pub fn is_streaming(&self) -> bool {
        self.camera.is_open()
    }

    // The single release path. Releasing a closed stream is a no-op,
    // which makes the stop/capture/teardown convergence harmless.
    fn release_stream(&mut self) {
        if self.camera.is_open() {
            self.camera.release();
        }
    }
}

impl<C: CameraDevice> Drop for MediaCapture<C> {
    fn drop(&mut self) {
        self.release_stream();
    }
}

/// Reads a portrait from a file, enforcing the upload ceiling.
///
/// The size check runs against file metadata before any content is read.
///
/// # Errors
///
/// - [`AppError::FileTooLarge`] for files over [`MAX_UPLOAD_BYTES`]
/// - [`AppError::ImageDecode`] if the content is not a decodable image
pub fn acquire_from_file(path: impl AsRef<Path>) -> Result<CapturedImage> {
    let path = path.as_ref();
    let size = fs::metadata(path)?.len();
    if size > MAX_UPLOAD_BYTES {
        return Err(AppError::FileTooLarge {
            size,
            limit: MAX_UPLOAD_BYTES,
        });
    }

    let bytes = fs::read(path)?;
    acquire_from_bytes(&bytes)
}

/// Normalizes already-read file bytes into a [`CapturedImage`].
///
/// The original bytes are preserved verbatim in the Base64 payload;
/// decoding is only performed to validate the content and detect the
/// MIME type.
pub fn acquire_from_bytes(bytes: &[u8]) -> Result<CapturedImage> {
    let size = bytes.len() as u64;
    if size > MAX_UPLOAD_BYTES {
        return Err(AppError::FileTooLarge {
            size,
            limit: MAX_UPLOAD_BYTES,
        });
    }

    let format = image::guess_format(bytes)
        .map_err(|e| AppError::decode(format!("Unrecognized image format: {}", e)))?;

    // Validate the payload actually decodes before accepting it.
    image::load_from_memory(bytes)
        .map_err(|e| AppError::decode(format!("Failed to decode image: {}", e)))?;

    Ok(CapturedImage {
        data: BASE64.encode(bytes),
        mime_type: format.to_mime_type().to_string(),
        source: ImageSource::Upload,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;

    /// In-memory camera producing a fixed two-tone frame.
    struct FakeCamera {
        open: bool,
        opens: u32,
        releases: u32,
    }

    impl FakeCamera {
        fn new() -> Self {
            Self { open: false, opens: 0, releases: 0 }
        }
    }

    impl CameraDevice for FakeCamera {
        fn open(&mut self, _width: u32, _height: u32) -> Result<()> {
            self.open = true;
            self.opens += 1;
            Ok(())
        }

        fn read_frame(&mut self) -> Result<DynamicImage> {
            if !self.open {
                return Err(AppError::camera("stream not open"));
            }
            // Left half solid red, right half solid blue. Solid blocks
            // survive JPEG chroma subsampling, so the mirror check can
            // sample interior pixels safely.
            let img = RgbaImage::from_fn(16, 8, |x, _y| {
                if x < 8 {
                    Rgba([255, 0, 0, 255])
                } else {
                    Rgba([0, 0, 255, 255])
                }
            });
            Ok(DynamicImage::ImageRgba8(img))
        }

        fn release(&mut self) {
            self.open = false;
            self.releases += 1;
        }

        fn is_open(&self) -> bool {
            self.open
        }
    }

    struct DeniedCamera;

    impl CameraDevice for DeniedCamera {
        fn open(&mut self, _width: u32, _height: u32) -> Result<()> {
            Err(AppError::PermissionDenied("user refused".into()))
        }
        fn read_frame(&mut self) -> Result<DynamicImage> {
            Err(AppError::camera("stream not open"))
        }
        fn release(&mut self) {}
        fn is_open(&self) -> bool {
            false
        }
    }

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            width,
            height,
            Rgba([10, 20, 30, 255]),
        ));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png).unwrap();
        buf
    }

    #[test]
    fn camera_capture_is_mirrored_and_releases_stream() {
        let mut capture = MediaCapture::new(FakeCamera::new());
        capture.start_preview().unwrap();
        assert!(capture.is_streaming());

        let portrait = capture.acquire_from_camera().unwrap();
        assert_eq!(portrait.mime_type, "image/jpeg");
        assert_eq!(portrait.source, ImageSource::Camera);
        assert!(!capture.is_streaming());

        // The sensor frame is red-left/blue-right; the stored image must
        // match the mirrored preview, i.e. blue-left/red-right.
        let decoded = ImageProcessor::decode_base64_image(&portrait.data)
            .unwrap()
            .to_rgba8();
        let left = decoded.get_pixel(3, 4);
        let right = decoded.get_pixel(12, 4);
        assert!(left[2] > left[0], "left side should be blue, got {:?}", left);
        assert!(right[0] > right[2], "right side should be red, got {:?}", right);
    }

    #[test]
    fn stop_and_drop_converge_on_single_release() {
        let mut capture = MediaCapture::new(FakeCamera::new());
        capture.start_preview().unwrap();
        capture.stop_preview();
        capture.stop_preview(); // releasing a closed stream is a no-op
        assert_eq!(capture.camera.releases, 1);

        capture.start_preview().unwrap();
        drop(capture); // teardown path releases the open stream
    }

    #[test]
    fn restarting_preview_releases_previous_stream() {
        let mut capture = MediaCapture::new(FakeCamera::new());
        capture.start_preview().unwrap();
        capture.start_preview().unwrap();
        assert_eq!(capture.camera.opens, 2);
        assert_eq!(capture.camera.releases, 1);
    }

    #[test]
    fn denied_camera_surfaces_permission_error() {
        let mut capture = MediaCapture::new(DeniedCamera);
        assert!(matches!(
            capture.start_preview(),
            Err(AppError::PermissionDenied(_))
        ));
    }

    #[test]
    fn upload_round_trips_without_corruption() {
        let bytes = png_bytes(4, 4);
        let portrait = acquire_from_bytes(&bytes).unwrap();
        assert_eq!(portrait.mime_type, "image/png");
        assert_eq!(portrait.source, ImageSource::Upload);
        assert_eq!(portrait.to_bytes().unwrap(), bytes);
    }

    #[test]
    fn oversized_upload_is_rejected_before_decoding() {
        let bytes = vec![0u8; (MAX_UPLOAD_BYTES + 1) as usize];
        match acquire_from_bytes(&bytes) {
            Err(AppError::FileTooLarge { size, limit }) => {
                assert_eq!(size, MAX_UPLOAD_BYTES + 1);
                assert_eq!(limit, MAX_UPLOAD_BYTES);
            }
            other => panic!("expected FileTooLarge, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn oversized_file_is_rejected_from_metadata() {
        let dir = std::env::temp_dir();
        let path = dir.join("glowup-oversize-test.bin");
        fs::write(&path, vec![0u8; (MAX_UPLOAD_BYTES + 1) as usize]).unwrap();
        let result = acquire_from_file(&path);
        fs::remove_file(&path).ok();
        assert!(matches!(result, Err(AppError::FileTooLarge { .. })));
    }

    #[test]
    fn non_image_upload_fails_decode() {
        assert!(matches!(
            acquire_from_bytes(b"definitely not an image"),
            Err(AppError::ImageDecode(_))
        ));
    }
}
