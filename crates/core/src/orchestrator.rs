//! End-to-end pipeline orchestration.
//!
//! The orchestrator owns the application state and drives the flow:
//! capture → diagnose → (synthesize ∥ search) → present. State lives
//! behind an `Arc<Mutex<_>>` so observers (UI hosts, the CLI) can read a
//! consistent snapshot at any time; every mutation goes through a defined
//! transition method.
//!
//! # Staleness
//!
//! In-flight Gemini responses are not cancelled when the user re-captures
//! or resets. Instead each processing cycle records the state's
//! monotonically increasing generation counter, and every commit re-checks
//! it under the lock: results from a superseded cycle are discarded
//! silently. A late response can therefore never overwrite the state of a
//! newer capture.

use crate::capture::CapturedImage;
use crate::error::{AppError, Result};
use crate::gemini::{BeautyGateway, DiagnosticResult, FacialMetric, InlineImage, Product, SearchOutcome};
use crate::share::SharedPayload;
use std::sync::{Arc, Mutex, MutexGuard};

/// Phase of the capture/processing flow.
///
/// `Idle` → `Capturing` → `Captured` → `Processing` → `Succeeded` |
/// `Failed`, back to `Idle` on reset, or to `Captured` again on
/// re-capture from any phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// No portrait held; waiting for capture or upload.
    Idle,
    /// Camera preview is open.
    Capturing,
    /// A portrait is held; pipeline not yet run.
    Captured,
    /// Diagnosis/synthesis/search in flight.
    Processing,
    /// Pipeline settled with results.
    Succeeded,
    /// Pipeline settled with a user-facing error.
    Failed,
}

/// The single state container observed by the presentation layer.
#[derive(Clone, Debug)]
pub struct AppState {
    pub phase: Phase,
    /// Bumped on every capture, reset and processing cycle; commits from
    /// older cycles are discarded.
    pub generation: u64,
    pub original_image: Option<CapturedImage>,
    pub diagnostic_image: Option<InlineImage>,
    pub generated_image: Option<InlineImage>,
    pub products: Vec<Product>,
    pub is_loading: bool,
    pub error: Option<String>,
    pub look_description: String,
    pub diagnosis_summary: String,
    pub metrics: Vec<FacialMetric>,
}

impl AppState {
    fn new() -> Self {
        Self {
            phase: Phase::Idle,
            generation: 0,
            original_image: None,
            diagnostic_image: None,
            generated_image: None,
            products: Vec::new(),
            is_loading: false,
            error: None,
            look_description: String::new(),
            diagnosis_summary: String::new(),
            metrics: Vec::new(),
        }
    }

    /// Clears every field derived from the current portrait.
    ///
    /// Invariant: runs in the same transition as any replacement of
    /// `original_image`, so stale results are never displayed alongside
    /// a new source image.
    fn clear_derived(&mut self) {
        self.diagnostic_image = None;
        self.generated_image = None;
        self.products.clear();
        self.error = None;
        self.look_description.clear();
        self.diagnosis_summary.clear();
        self.metrics.clear();
    }

    /// The metric shown prominently, looked up by label substring.
    /// Absence is a valid, handled state.
    pub fn overall_metric(&self) -> Option<&FacialMetric> {
        self.metrics
            .iter()
            .find(|m| m.label.to_lowercase().contains("overall"))
    }

    /// The minimal payload that survives a page reload via share link,
    /// available once the pipeline has settled successfully.
    pub fn share_payload(&self) -> Option<SharedPayload> {
        if self.phase != Phase::Succeeded {
            return None;
        }
        Some(SharedPayload {
            desc: self.look_description.clone(),
            prods: self.products.clone(),
        })
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

/// Drives the pipeline and owns the [`AppState`].
#[derive(Clone)]
pub struct Orchestrator {
    gateway: Arc<dyn BeautyGateway>,
    state: Arc<Mutex<AppState>>,
}

impl Orchestrator {
    pub fn new(gateway: Arc<dyn BeautyGateway>) -> Self {
        Self {
            gateway,
            state: Arc::new(Mutex::new(AppState::new())),
        }
    }

    /// Returns a consistent copy of the current state.
    pub fn snapshot(&self) -> AppState {
        self.lock_state().clone()
    }

    /// Opens the camera-preview phase.
    pub fn begin_capturing(&self) {
        self.lock_state().phase = Phase::Capturing;
    }

    /// Closes the camera preview without capturing.
    pub fn cancel_capturing(&self) {
        let mut state = self.lock_state();
        state.phase = if state.original_image.is_some() {
            Phase::Captured
        } else {
            Phase::Idle
        };
    }

    /// Installs a newly captured or uploaded portrait.
    ///
    /// Replaces the previous image wholesale, clears all derived state in
    /// the same transition and bumps the generation so in-flight results
    /// from the superseded portrait are discarded on arrival.
    pub fn set_captured(&self, image: CapturedImage) {
        let mut state = self.lock_state();
        state.generation += 1;
        state.original_image = Some(image);
        state.clear_derived();
        state.is_loading = false;
        state.phase = Phase::Captured;
    }

    /// Returns the application to its initial empty state.
    pub fn reset(&self) {
        let mut state = self.lock_state();
        let generation = state.generation + 1;
        *state = AppState::new();
        state.generation = generation;
    }

    /// Restores a shared view decoded from a URL fragment.
    ///
    /// Shared payloads exclude images by design, so the restored view has
    /// a description and product list only.
    pub fn restore_shared(&self, payload: SharedPayload) {
        let mut state = self.lock_state();
        let generation = state.generation + 1;
        *state = AppState::new();
        state.generation = generation;
        state.look_description = payload.desc;
        state.products = payload.prods;
        state.phase = Phase::Succeeded;
    }

    /// Runs diagnose → (synthesize ∥ search) on the held portrait.
    ///
    /// Re-running from `Succeeded`/`Failed` with edited request text is
    /// the "regenerate" affordance; the held image is reused and no new
    /// capture is required.
    ///
    /// Diagnostic fields are published as soon as diagnosis completes,
    /// before synthesis and search finish. The loading flag clears only
    /// after both settle.
    ///
    /// # Errors
    ///
    /// - [`AppError::NoSourceImage`] when no portrait is held
    /// - the first gateway failure otherwise; the state moves to
    ///   `Failed` with a user-facing message (unless superseded)
    pub async fn run_pipeline(&self, style_request: &str, research_notes: &str) -> Result<()> {
        let (image, generation) = {
            let mut state = self.lock_state();
            let Some(image) = state.original_image.clone() else {
                return Err(AppError::NoSourceImage);
            };
            state.generation += 1;
            state.clear_derived();
            state.is_loading = true;
            state.phase = Phase::Processing;
            (image, state.generation)
        };

        // Diagnosis blocks the fan-out: its text seeds both prompts.
        let diagnosis = match self.gateway.diagnose(&image).await {
            Ok(diagnosis) => diagnosis,
            Err(e) => {
                self.commit_failure(generation, &e);
                return Err(e);
            }
        };

        self.commit_diagnosis(generation, &diagnosis);
        let context = diagnosis.context_line();

        let (look, search) = tokio::join!(
            self.gateway
                .synthesize_look(&image, style_request, research_notes, &context),
            self.gateway
                .search_products(&image, style_request, research_notes, &context),
        );

        match (look, search) {
            (Ok(generated), Ok(outcome)) => {
                self.commit_results(generation, generated, outcome);
                Ok(())
            }
            (Err(e), _) | (_, Err(e)) => {
                self.commit_failure(generation, &e);
                Err(e)
            }
        }
    }

    /// Publishes diagnostic fields mid-cycle (progressive disclosure).
    fn commit_diagnosis(&self, generation: u64, diagnosis: &DiagnosticResult) {
        let mut state = self.lock_state();
        if state.generation != generation {
            tracing::debug!(generation, current = state.generation, "discarding stale diagnosis");
            return;
        }
        state.diagnosis_summary = diagnosis.summary.clone();
        state.metrics = diagnosis.metrics.clone();
        state.diagnostic_image = diagnosis.report_image.clone();
    }

    fn commit_results(&self, generation: u64, generated: InlineImage, outcome: SearchOutcome) {
        let mut state = self.lock_state();
        if state.generation != generation {
            tracing::debug!(generation, current = state.generation, "discarding stale results");
            return;
        }
        state.generated_image = Some(generated);
        state.look_description = outcome.description;
        state.products = outcome.products;
        state.is_loading = false;
        state.phase = Phase::Succeeded;
    }

    fn commit_failure(&self, generation: u64, error: &AppError) {
        let mut state = self.lock_state();
        if state.generation != generation {
            tracing::debug!(generation, current = state.generation, "discarding stale failure");
            return;
        }
        state.error = Some(error.to_string());
        state.is_loading = false;
        state.phase = Phase::Failed;
    }

    // A poisoned lock only means an observer panicked mid-read; the state
    // itself is a plain value, so recover the guard rather than propagate.
    fn lock_state(&self) -> MutexGuard<'_, AppState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}
