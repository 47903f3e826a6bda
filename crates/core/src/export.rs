//! Snapshot export.
//!
//! Rasterizes a settled result into a fixed-layout PNG card (portrait,
//! diagnostic overlay and makeover side by side under a colored header
//! band) and hands it to a [`FileDownloader`] for delivery.
//!
//! Rasterizers that capture relative to viewport scroll need the page at
//! a deterministic origin, so the exporter scrolls to (0, 0) before
//! rendering and restores the prior offset afterwards — on failure too.
//! Overlapping exports are rejected; one capture runs at a time.

use crate::error::{AppError, Result};
use crate::image_processing::ImageProcessor;
use crate::orchestrator::AppState;
use chrono::Utc;
use image::imageops;
use image::{DynamicImage, Rgba, RgbaImage};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

/// Downloaded snapshot files are named `find-your-beauty-<unix-ms>.png`.
pub const SNAPSHOT_FILE_PREFIX: &str = "find-your-beauty";

const CARD_WIDTH: u32 = 1240;
const HEADER_HEIGHT: u32 = 96;
const PANEL_WIDTH: u32 = 380;
const PANEL_HEIGHT: u32 = 460;
const GUTTER: u32 = 25;
const CARD_HEIGHT: u32 = HEADER_HEIGHT + GUTTER + PANEL_HEIGHT + GUTTER;

const CARD_BACKGROUND: Rgba<u8> = Rgba([250, 244, 242, 255]);
const HEADER_COLOR: Rgba<u8> = Rgba([236, 72, 120, 255]);

/// Scroll capability of the hosting view.
pub trait Viewport {
    fn scroll_offset(&self) -> (f64, f64);
    fn set_scroll_offset(&mut self, x: f64, y: f64);
}

/// Viewport for headless hosts that have no scrolling surface.
pub struct NullViewport;

impl Viewport for NullViewport {
    fn scroll_offset(&self) -> (f64, f64) {
        (0.0, 0.0)
    }

    fn set_scroll_offset(&mut self, _x: f64, _y: f64) {}
}

/// File delivery capability (browser download, disk write, ...).
pub trait FileDownloader {
    fn deliver(&mut self, filename: &str, bytes: &[u8]) -> Result<()>;
}

/// Writes delivered files into a directory.
pub struct DiskDownloader {
    dir: PathBuf,
}

impl DiskDownloader {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self { dir: dir.as_ref().to_path_buf() }
    }
}

impl FileDownloader for DiskDownloader {
    fn deliver(&mut self, filename: &str, bytes: &[u8]) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        std::fs::write(self.dir.join(filename), bytes)?;
        Ok(())
    }
}

/// Rasterizes result cards, one at a time.
pub struct SnapshotExporter {
    in_flight: AtomicBool,
}

impl SnapshotExporter {
    pub fn new() -> Self {
        Self { in_flight: AtomicBool::new(false) }
    }

    /// Exports the given state snapshot as a PNG card.
    ///
    /// Returns the delivered filename.
    ///
    /// # Errors
    ///
    /// - [`AppError::ExportInFlight`] if another export is running
    /// - [`AppError::RasterizeFailure`] if the state is not shareable yet
    ///   or rendering/delivery fails; the scroll offset is restored and
    ///   the latch cleared regardless
    pub fn export(
        &self,
        state: &AppState,
        viewport: &mut dyn Viewport,
        downloader: &mut dyn FileDownloader,
    ) -> Result<String> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(AppError::ExportInFlight);
        }

        let prior = viewport.scroll_offset();
        viewport.set_scroll_offset(0.0, 0.0);

        let result = Self::rasterize_and_deliver(state, downloader);

        viewport.set_scroll_offset(prior.0, prior.1);
        self.in_flight.store(false, Ordering::SeqCst);
        result
    }

    fn rasterize_and_deliver(
        state: &AppState,
        downloader: &mut dyn FileDownloader,
    ) -> Result<String> {
        let card = render_card(state)?;
        let png = ImageProcessor::encode_png(&card)
            .map_err(|e| AppError::raster(e.to_string()))?;

        let filename = format!("{}-{}.png", SNAPSHOT_FILE_PREFIX, Utc::now().timestamp_millis());
        downloader.deliver(&filename, &png)?;
        Ok(filename)
    }
}

impl Default for SnapshotExporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Composites the fixed-layout card.
///
/// Shareable means: diagnostic overlay, generated makeover, a non-empty
/// description and at least one metric. The original portrait is
/// optional; its panel stays blank when absent.
fn render_card(state: &AppState) -> Result<DynamicImage> {
    let diagnostic = state
        .diagnostic_image
        .as_ref()
        .ok_or_else(|| AppError::raster("diagnostic overlay not available"))?;
    let generated = state
        .generated_image
        .as_ref()
        .ok_or_else(|| AppError::raster("generated makeover not available"))?;
    if state.look_description.trim().is_empty() || state.metrics.is_empty() {
        return Err(AppError::raster("results are not complete enough to export"));
    }

    let mut canvas = RgbaImage::from_pixel(CARD_WIDTH, CARD_HEIGHT, CARD_BACKGROUND);
    let header = RgbaImage::from_pixel(CARD_WIDTH, HEADER_HEIGHT, HEADER_COLOR);
    imageops::overlay(&mut canvas, &header, 0, 0);

    let mut panels: Vec<Option<DynamicImage>> = Vec::with_capacity(3);
    panels.push(match &state.original_image {
        Some(original) => Some(
            ImageProcessor::decode_base64_image(&original.data)
                .map_err(|e| AppError::raster(format!("original portrait: {}", e)))?,
        ),
        None => None,
    });
    panels.push(Some(
        ImageProcessor::decode_base64_image(&diagnostic.data)
            .map_err(|e| AppError::raster(format!("diagnostic overlay: {}", e)))?,
    ));
    panels.push(Some(
        ImageProcessor::decode_base64_image(&generated.data)
            .map_err(|e| AppError::raster(format!("generated makeover: {}", e)))?,
    ));

    for (slot, panel) in panels.iter().enumerate() {
        let Some(panel) = panel else { continue };
        let fitted = ImageProcessor::fit_within(panel, PANEL_WIDTH, PANEL_HEIGHT);
        let x = GUTTER + slot as u32 * (PANEL_WIDTH + GUTTER)
            + (PANEL_WIDTH - fitted.width()) / 2;
        let y = HEADER_HEIGHT + GUTTER + (PANEL_HEIGHT - fitted.height()) / 2;
        imageops::overlay(&mut canvas, &fitted.to_rgba8(), x as i64, y as i64);
    }

    Ok(DynamicImage::ImageRgba8(canvas))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{CapturedImage, ImageSource};
    use crate::gemini::{FacialMetric, InlineImage};
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
    use image::ImageFormat;
    use std::io::Cursor;
    use std::sync::mpsc;
    use std::sync::Arc;

    fn tiny_png_base64() -> String {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(2, 2, Rgba([80, 90, 100, 255])));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png).unwrap();
        BASE64.encode(buf)
    }

    fn shareable_state() -> AppState {
        let mut state = AppState::default();
        state.original_image = Some(CapturedImage {
            data: tiny_png_base64(),
            mime_type: "image/png".into(),
            source: ImageSource::Upload,
        });
        state.diagnostic_image = Some(InlineImage {
            data: tiny_png_base64(),
            mime_type: "image/png".into(),
        });
        state.generated_image = Some(InlineImage {
            data: tiny_png_base64(),
            mime_type: "image/png".into(),
        });
        state.look_description = "Soft glam picks".into();
        state.metrics = vec![FacialMetric { label: "Overall".into(), score: 88.0 }];
        state
    }

    struct RecordingViewport {
        offset: (f64, f64),
        sets: Vec<(f64, f64)>,
    }

    impl RecordingViewport {
        fn at(x: f64, y: f64) -> Self {
            Self { offset: (x, y), sets: Vec::new() }
        }
    }

    impl Viewport for RecordingViewport {
        fn scroll_offset(&self) -> (f64, f64) {
            self.offset
        }

        fn set_scroll_offset(&mut self, x: f64, y: f64) {
            self.offset = (x, y);
            self.sets.push((x, y));
        }
    }

    struct MemoryDownloader {
        delivered: Vec<(String, Vec<u8>)>,
    }

    impl MemoryDownloader {
        fn new() -> Self {
            Self { delivered: Vec::new() }
        }
    }

    impl FileDownloader for MemoryDownloader {
        fn deliver(&mut self, filename: &str, bytes: &[u8]) -> Result<()> {
            self.delivered.push((filename.to_string(), bytes.to_vec()));
            Ok(())
        }
    }

    struct FailingDownloader;

    impl FileDownloader for FailingDownloader {
        fn deliver(&mut self, _filename: &str, _bytes: &[u8]) -> Result<()> {
            Err(AppError::raster("disk full"))
        }
    }

    /// Signals when delivery starts, then blocks until released.
    struct BlockingDownloader {
        started: mpsc::Sender<()>,
        release: mpsc::Receiver<()>,
    }

    impl FileDownloader for BlockingDownloader {
        fn deliver(&mut self, _filename: &str, _bytes: &[u8]) -> Result<()> {
            self.started.send(()).unwrap();
            self.release.recv().unwrap();
            Ok(())
        }
    }

    #[test]
    fn export_delivers_a_timestamped_png_card() {
        let exporter = SnapshotExporter::new();
        let mut viewport = RecordingViewport::at(0.0, 0.0);
        let mut downloader = MemoryDownloader::new();

        let filename = exporter
            .export(&shareable_state(), &mut viewport, &mut downloader)
            .unwrap();
        assert!(filename.starts_with("find-your-beauty-"));
        assert!(filename.ends_with(".png"));

        let (delivered_name, bytes) = &downloader.delivered[0];
        assert_eq!(delivered_name, &filename);
        let card = image::load_from_memory(bytes).unwrap();
        assert_eq!((card.width(), card.height()), (CARD_WIDTH, CARD_HEIGHT));
    }

    #[test]
    fn missing_original_portrait_is_allowed() {
        let mut state = shareable_state();
        state.original_image = None;

        let exporter = SnapshotExporter::new();
        let mut downloader = MemoryDownloader::new();
        exporter
            .export(&state, &mut NullViewport, &mut downloader)
            .unwrap();
        assert_eq!(downloader.delivered.len(), 1);
    }

    #[test]
    fn incomplete_results_are_rejected() {
        let exporter = SnapshotExporter::new();
        let mut downloader = MemoryDownloader::new();

        let strips: &[fn(&mut AppState)] = &[
            |s| s.diagnostic_image = None,
            |s| s.generated_image = None,
            |s| s.look_description.clear(),
            |s| s.metrics.clear(),
        ];
        for strip in strips {
            let mut state = shareable_state();
            strip(&mut state);
            let result = exporter.export(&state, &mut NullViewport, &mut downloader);
            assert!(matches!(result, Err(AppError::RasterizeFailure(_))));
        }
        assert!(downloader.delivered.is_empty());
    }

    #[test]
    fn scroll_offset_is_restored_even_when_delivery_fails() {
        let exporter = SnapshotExporter::new();
        let mut viewport = RecordingViewport::at(12.0, 340.0);

        let result = exporter.export(&shareable_state(), &mut viewport, &mut FailingDownloader);
        assert!(matches!(result, Err(AppError::RasterizeFailure(_))));

        assert_eq!(viewport.offset, (12.0, 340.0));
        // Scrolled to origin for the capture, then back.
        assert_eq!(viewport.sets.first(), Some(&(0.0, 0.0)));
        assert_eq!(viewport.sets.last(), Some(&(12.0, 340.0)));

        // The latch cleared, so the next export can run.
        let mut downloader = MemoryDownloader::new();
        exporter
            .export(&shareable_state(), &mut NullViewport, &mut downloader)
            .unwrap();
    }

    #[test]
    fn concurrent_export_is_rejected() {
        let exporter = Arc::new(SnapshotExporter::new());
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();

        let first = {
            let exporter = Arc::clone(&exporter);
            std::thread::spawn(move || {
                let mut downloader = BlockingDownloader {
                    started: started_tx,
                    release: release_rx,
                };
                exporter.export(&shareable_state(), &mut NullViewport, &mut downloader)
            })
        };

        // Wait until the first export is inside delivery, then race it.
        started_rx.recv().unwrap();
        let second = exporter.export(
            &shareable_state(),
            &mut NullViewport,
            &mut MemoryDownloader::new(),
        );
        assert!(matches!(second, Err(AppError::ExportInFlight)));

        release_tx.send(()).unwrap();
        first.join().unwrap().unwrap();
    }
}
