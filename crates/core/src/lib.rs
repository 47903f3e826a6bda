//! GlowUp Core Library
//!
//! This library provides the core functionality for the GlowUp beauty
//! studio: portrait capture, Gemini AI integration, pipeline
//! orchestration, share links and snapshot export.
//!
//! # Overview
//!
//! GlowUp lets a user submit a portrait photo, receive an AI facial
//! diagnostic, a virtual-makeup rendering and a list of trending beauty
//! products matching a free-text style request. The library handles:
//!
//! - **Portrait Capture**: camera and file upload via the [`capture`] module
//! - **Image Processing**: mirroring and encoding via [`image_processing`]
//! - **AI Integration**: diagnosis, synthesis and product search via [`gemini`]
//! - **Orchestration**: the capture → diagnose → (synthesize ∥ search)
//!   state machine via [`orchestrator`]
//! - **Sharing**: URL-fragment share links via [`share`]
//! - **Export**: PNG snapshot cards via [`export`]
//!
//! # Quick Start
//!
//! The simplest way to use the library is through the [`GlowUp`] facade:
//!
//! ```ignore
//! use glowup_core::GlowUp;
//!
//! // Initialize with environment configuration
//! let app = GlowUp::new()?;
//!
//! // Upload a portrait and run the full pipeline
//! app.upload_file("selfie.jpg")?;
//! app.generate("soft coquette pink", "").await?;
//!
//! let state = app.state();
//! println!("{}", state.diagnosis_summary);
//! ```
//!
//! # Module Structure
//!
//! - [`capture`]: portrait capture (camera capability + file upload)
//! - [`config`]: configuration loading and management
//! - [`error`]: error types and result aliases
//! - [`export`]: snapshot card rasterization and delivery
//! - [`gemini`]: Gemini AI gateway (three operations)
//! - [`image_processing`]: image manipulation utilities
//! - [`orchestrator`]: application state machine
//! - [`settings`]: persisted user settings
//! - [`share`]: share-link codec and clipboard capability

pub mod capture;
pub mod config;
pub mod error;
pub mod export;
pub mod gemini;
pub mod image_processing;
pub mod orchestrator;
pub mod settings;
pub mod share;

// Re-export primary types for convenience
pub use capture::{CapturedImage, MediaCapture};
pub use config::Config;
pub use error::{AppError, Result};
pub use export::SnapshotExporter;
pub use gemini::GeminiClient;
pub use orchestrator::{AppState, Orchestrator, Phase};
pub use share::{ShareCodec, SharedPayload};

use std::sync::Arc;

/// Main entry point for the GlowUp application.
///
/// This struct provides a facade over the various subsystems,
/// handling initialization and orchestration. It's the recommended
/// way to use the library for most use cases.
///
/// # Example
///
/// ```ignore
/// use glowup_core::GlowUp;
///
/// let app = GlowUp::new()?;
/// app.upload_file("selfie.jpg")?;
/// ```
pub struct GlowUp {
    config: Config,
    orchestrator: Orchestrator,
    exporter: SnapshotExporter,
}

impl GlowUp {
    /// Creates a new GlowUp instance with default configuration.
    ///
    /// Loads configuration from environment variables (including `.env`
    /// files) and connects the Gemini gateway.
    ///
    /// # Errors
    ///
    /// Returns an error if the API key is missing or the client cannot
    /// be constructed.
    pub fn new() -> Result<Self> {
        let config = Config::load()?;
        Self::with_config(config)
    }

    /// Creates an instance with custom configuration.
    ///
    /// Use this when you need to override environment-based configuration,
    /// such as specifying different models or an API key.
    pub fn with_config(config: Config) -> Result<Self> {
        let client = GeminiClient::new(&config)?;
        Ok(Self {
            config,
            orchestrator: Orchestrator::new(Arc::new(client)),
            exporter: SnapshotExporter::new(),
        })
    }

    /// Uploads a portrait from a file and installs it as the source image.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::FileTooLarge`] above the 5 MB ceiling, or
    /// [`AppError::ImageDecode`] for non-image content.
    pub fn upload_file(&self, path: impl AsRef<std::path::Path>) -> Result<()> {
        let portrait = capture::acquire_from_file(path)?;
        self.orchestrator.set_captured(portrait);
        Ok(())
    }

    /// Runs the full pipeline on the held portrait.
    ///
    /// Callable again from a settled state to regenerate with edited
    /// request text; the held image is reused.
    pub async fn generate(&self, style_request: &str, research_notes: &str) -> Result<()> {
        self.orchestrator.run_pipeline(style_request, research_notes).await
    }

    /// Returns a consistent copy of the current application state.
    pub fn state(&self) -> AppState {
        self.orchestrator.snapshot()
    }

    /// Returns the orchestrator for direct transition access.
    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    /// Restores a shared view from a URL fragment.
    ///
    /// Best-effort: returns whether anything was restored; malformed
    /// fragments leave the state untouched.
    pub fn restore_from_fragment(&self, fragment: &str) -> bool {
        match ShareCodec::decode(fragment) {
            Some(payload) => {
                self.orchestrator.restore_shared(payload);
                true
            }
            None => false,
        }
    }

    /// Exports the current results as a PNG snapshot card.
    ///
    /// Returns the delivered filename.
    pub fn export_snapshot(
        &self,
        viewport: &mut dyn export::Viewport,
        downloader: &mut dyn export::FileDownloader,
    ) -> Result<String> {
        self.exporter.export(&self.state(), viewport, downloader)
    }

    /// Returns a reference to the current configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns a mutable reference to the configuration.
    ///
    /// Allows modifying settings like the model names after initialization.
    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }
}

/// Initializes the library by loading environment variables.
///
/// Call this once at application startup before using any other functions.
/// This loads `.env` files if present and sets up the environment.
///
/// # Example
///
/// ```ignore
/// glowup_core::init();
/// let config = glowup_core::Config::load()?;
/// ```
pub fn init() {
    let _ = dotenvy::dotenv();
}
