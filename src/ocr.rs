//! # OCR Adapter Module
//!
//! Wraps the Tesseract OCR engine (via `leptess`) behind the narrow
//! contract the pipeline needs: hand in a cleaned captcha raster, get back
//! the ordered raw text tokens the engine recognized.
//!
//! The engine is created once and reused; Tesseract initialization costs
//! hundreds of milliseconds and the captcha images are tiny. Recognition is
//! constrained to the digit/operator allowlist and single-line page
//! segmentation, both set at construction time.

use crate::config::OcrConfig;
use crate::errors::{SolverError, SolverResult};
use image::{DynamicImage, ImageFormat, RgbImage};
use leptess::LepTess;
use std::io::Cursor;
use std::sync::Mutex;
use tracing::{debug, info};

/// One raw text fragment recognized by the engine, in reading order.
pub type RawToken = String;

/// Capability seam over the OCR engine.
///
/// The pipeline only needs "image in, ordered tokens out"; keeping that as
/// a trait lets tests substitute a deterministic recognizer for the real
/// Tesseract instance.
pub trait Recognizer {
    /// Recognize text in a cleaned captcha image.
    ///
    /// An empty vector is a valid result meaning "nothing recognized", not
    /// an error; engine faults surface as [`SolverError::Recognition`].
    fn recognize(&self, image: &RgbImage) -> SolverResult<Vec<RawToken>>;
}

/// Reusable OCR engine constrained to the captcha alphabet.
///
/// The inner Tesseract instance is stateful (each recognition replaces the
/// previous image), so it lives behind a mutex; concurrent attempts
/// serialize on it rather than paying per-attempt initialization.
pub struct OcrEngine {
    tess: Mutex<LepTess>,
}

impl OcrEngine {
    /// Initialize a Tesseract instance for the given configuration.
    ///
    /// The character whitelist and page segmentation mode are applied here
    /// and never change afterwards; a config change means a new engine.
    pub fn new(config: &OcrConfig) -> SolverResult<Self> {
        info!(
            languages = %config.languages,
            tessdata = ?config.tessdata_path,
            "Creating OCR engine"
        );

        let mut tess = LepTess::new(config.tessdata_path.as_deref(), &config.languages)
            .map_err(|e| {
                SolverError::Recognition(format!("Failed to initialize Tesseract: {}", e))
            })?;

        tess.set_variable(leptess::Variable::TesseditPagesegMode, &config.psm_mode)
            .map_err(|e| {
                SolverError::Recognition(format!("Failed to set page segmentation mode: {}", e))
            })?;

        tess.set_variable(
            leptess::Variable::TesseditCharWhitelist,
            &config.character_whitelist,
        )
        .map_err(|e| {
            SolverError::Recognition(format!("Failed to set character whitelist: {}", e))
        })?;

        Ok(Self {
            tess: Mutex::new(tess),
        })
    }
}

impl Recognizer for OcrEngine {
    fn recognize(&self, image: &RgbImage) -> SolverResult<Vec<RawToken>> {
        let start = std::time::Instant::now();

        // Tesseract wants encoded bytes; PNG keeps the raster lossless.
        let mut encoded = Vec::new();
        DynamicImage::ImageRgb8(image.clone())
            .write_to(&mut Cursor::new(&mut encoded), ImageFormat::Png)
            .map_err(|e| {
                SolverError::Recognition(format!("Failed to encode image for OCR: {}", e))
            })?;

        let text = {
            let mut tess = self
                .tess
                .lock()
                .expect("Failed to acquire Tesseract instance lock");
            tess.set_image_from_mem(&encoded).map_err(|e| {
                SolverError::Recognition(format!("Failed to load image into Tesseract: {}", e))
            })?;
            tess.get_utf8_text().map_err(|e| {
                SolverError::Recognition(format!("Failed to extract text from image: {}", e))
            })?
        };

        let tokens: Vec<RawToken> = text
            .split_whitespace()
            .map(str::to_string)
            .collect();

        debug!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            token_count = tokens.len(),
            "OCR recognition completed"
        );

        Ok(tokens)
    }
}
