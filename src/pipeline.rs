//! # Captcha Solving Pipeline
//!
//! Ties the stages together behind one explicitly-constructed object:
//! decode the captcha bytes, subtract the best-matching background, run
//! constrained OCR, correct confusable characters, and evaluate the
//! arithmetic expression. The pipeline holds its collaborators (OCR
//! engine, background set, correction store) by injection; nothing is read
//! from ambient global state.

use std::sync::Arc;

use image::DynamicImage;
use tracing::{debug, info};

use crate::background;
use crate::config::SolverConfig;
use crate::corrections;
use crate::errors::{SolverError, SolverResult};
use crate::ocr::{OcrEngine, Recognizer};
use crate::solver::{self, Solution};
use crate::store::CorrectionStore;

/// Result of one solving attempt.
///
/// The corrected text always accompanies the solution so an unsolvable
/// attempt can be surfaced for manual entry, and so a human-confirmed fix
/// can be recorded against the raw recognition string.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptchaSolution {
    /// Normalized raw recognition string (learned-correction key)
    pub raw: String,
    /// Corrected recognition string
    pub corrected: String,
    /// Evaluated answer, or unsolvable
    pub solution: Solution,
}

/// The captcha solving pipeline.
///
/// Generic over the recognizer so tests can substitute a deterministic
/// engine; production code uses [`OcrEngine`].
pub struct CaptchaPipeline<R = OcrEngine> {
    config: SolverConfig,
    recognizer: R,
    backgrounds: Vec<DynamicImage>,
    store: Arc<CorrectionStore>,
}

impl CaptchaPipeline<OcrEngine> {
    /// Build a pipeline backed by a real Tesseract engine.
    pub fn new(
        config: SolverConfig,
        backgrounds: Vec<DynamicImage>,
        store: Arc<CorrectionStore>,
    ) -> SolverResult<Self> {
        config.validate()?;
        let recognizer = OcrEngine::new(&config.ocr)?;
        Ok(Self::with_recognizer(config, recognizer, backgrounds, store))
    }
}

impl<R: Recognizer> CaptchaPipeline<R> {
    /// Build a pipeline around an existing recognizer.
    pub fn with_recognizer(
        config: SolverConfig,
        recognizer: R,
        backgrounds: Vec<DynamicImage>,
        store: Arc<CorrectionStore>,
    ) -> Self {
        info!(
            backgrounds = backgrounds.len(),
            "Captcha pipeline initialized"
        );
        Self {
            config,
            recognizer,
            backgrounds,
            store,
        }
    }

    /// Solve one captcha attempt from raw image bytes.
    ///
    /// Malformed bytes and engine faults surface as errors; an expression
    /// that cannot be extracted is a normal [`Solution::Unsolvable`]
    /// outcome carried alongside the best-effort corrected text.
    pub fn solve(&self, image_bytes: &[u8]) -> SolverResult<CaptchaSolution> {
        let start = std::time::Instant::now();

        let captcha = image::load_from_memory(image_bytes)
            .map_err(|e| SolverError::Decode(format!("Failed to decode captcha image: {}", e)))?;

        let mut cleaned = background::remove_background(
            &captcha,
            &self.backgrounds,
            self.config.matcher.diff_threshold,
        );
        background::whiten_masked(&mut cleaned);

        let tokens = self.recognizer.recognize(&cleaned)?;
        let raw = corrections::normalize_tokens(&tokens);
        let corrected = corrections::correct_tokens(&tokens, &self.store.table());
        let solution = solver::solve(&corrected);

        debug!(
            %raw,
            %corrected,
            ?solution,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Captcha attempt finished"
        );

        Ok(CaptchaSolution {
            raw,
            corrected,
            solution,
        })
    }

    /// Record a human-confirmed correction for a previous attempt.
    ///
    /// Keyed on the attempt's raw recognition string; flushed to the store
    /// synchronously. A correction identical to the raw text is a no-op.
    pub fn record_correction(&self, raw: &str, corrected: &str) -> SolverResult<()> {
        self.store.record_correction(raw, corrected)
    }

    /// The injected correction store.
    pub fn store(&self) -> &Arc<CorrectionStore> {
        &self.store
    }
}
