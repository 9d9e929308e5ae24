//! # Solver Configuration
//!
//! Centralized configuration for the captcha solving pipeline. Settings are
//! plain structs with sensible defaults, optionally overridden from
//! environment variables, and validated once at startup.

use crate::errors::{SolverError, SolverResult};
use serde::{Deserialize, Serialize};
use std::env;

/// Character allowlist passed verbatim to the OCR engine.
///
/// Changing this constant is a behavior change: the remote captchas only
/// ever contain digits and the four operator glyphs, and widening the
/// alphabet reintroduces the false character classes the allowlist exists
/// to suppress.
pub const CHAR_ALLOWLIST: &str = "0123456789+-*/";

/// Canonical captcha width in pixels; every image is resized to this before
/// comparison or recognition.
pub const CANONICAL_WIDTH: u32 = 110;
/// Canonical captcha height in pixels.
pub const CANONICAL_HEIGHT: u32 = 60;

/// Default grayscale intensity above which a difference pixel counts as
/// foreground during background subtraction.
pub const DEFAULT_DIFF_THRESHOLD: u8 = 40;

/// Default file holding the learned correction table.
pub const DEFAULT_CORRECTIONS_FILE: &str = "corrections.json";

/// OCR engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrConfig {
    /// Tesseract language model to load
    pub languages: String,
    /// Optional explicit tessdata directory
    pub tessdata_path: Option<String>,
    /// Page segmentation mode; the captcha is a single text line
    pub psm_mode: String,
    /// Characters the engine is allowed to recognize
    pub character_whitelist: String,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            languages: "eng".to_string(),
            tessdata_path: None,
            psm_mode: "7".to_string(),
            character_whitelist: CHAR_ALLOWLIST.to_string(),
        }
    }
}

impl OcrConfig {
    /// Validate OCR configuration
    pub fn validate(&self) -> SolverResult<()> {
        if self.languages.trim().is_empty() {
            return Err(SolverError::Config(
                "OCR languages cannot be empty".to_string(),
            ));
        }
        if self.character_whitelist != CHAR_ALLOWLIST {
            return Err(SolverError::Config(format!(
                "Character whitelist must be '{}' (got '{}')",
                CHAR_ALLOWLIST, self.character_whitelist
            )));
        }
        if self.psm_mode.parse::<u8>().map(|m| m > 13).unwrap_or(true) {
            return Err(SolverError::Config(format!(
                "Invalid page segmentation mode: {}",
                self.psm_mode
            )));
        }
        Ok(())
    }
}

/// Background matcher configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatcherConfig {
    /// Grayscale difference threshold separating glyph pixels from background
    pub diff_threshold: u8,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            diff_threshold: DEFAULT_DIFF_THRESHOLD,
        }
    }
}

/// Top-level solver configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SolverConfig {
    pub ocr: OcrConfig,
    pub matcher: MatcherConfig,
    /// Path of the persisted correction table
    pub corrections_path: String,
}

impl SolverConfig {
    /// Build configuration from environment variables, falling back to
    /// defaults for anything unset.
    ///
    /// Recognized variables:
    /// - `CAPTCHA_TESSDATA_PATH` - explicit tessdata directory
    /// - `CAPTCHA_OCR_LANGUAGES` - Tesseract language model (default `eng`)
    /// - `CAPTCHA_DIFF_THRESHOLD` - background subtraction threshold (0-255)
    /// - `CAPTCHA_CORRECTIONS_FILE` - learned correction table path
    pub fn from_env() -> SolverResult<Self> {
        let mut config = Self::default();

        if let Ok(path) = env::var("CAPTCHA_TESSDATA_PATH") {
            if !path.trim().is_empty() {
                config.ocr.tessdata_path = Some(path);
            }
        }
        if let Ok(languages) = env::var("CAPTCHA_OCR_LANGUAGES") {
            if !languages.trim().is_empty() {
                config.ocr.languages = languages;
            }
        }
        if let Ok(threshold) = env::var("CAPTCHA_DIFF_THRESHOLD") {
            config.matcher.diff_threshold = threshold.parse::<u8>().map_err(|_| {
                SolverError::Config(format!(
                    "CAPTCHA_DIFF_THRESHOLD must be an integer in 0-255 (got '{}')",
                    threshold
                ))
            })?;
        }
        if let Ok(path) = env::var("CAPTCHA_CORRECTIONS_FILE") {
            if !path.trim().is_empty() {
                config.corrections_path = path;
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate the complete configuration
    pub fn validate(&self) -> SolverResult<()> {
        self.ocr.validate()?;
        if self.corrections_path().trim().is_empty() {
            return Err(SolverError::Config(
                "Corrections file path cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Path of the persisted correction table, defaulting when unset.
    pub fn corrections_path(&self) -> &str {
        if self.corrections_path.is_empty() {
            DEFAULT_CORRECTIONS_FILE
        } else {
            &self.corrections_path
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = SolverConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.ocr.character_whitelist, "0123456789+-*/");
        assert_eq!(config.ocr.psm_mode, "7");
        assert_eq!(config.corrections_path(), DEFAULT_CORRECTIONS_FILE);
    }

    #[test]
    fn test_empty_languages_rejected() {
        let mut config = SolverConfig::default();
        config.ocr.languages = "  ".to_string();
        assert!(matches!(config.validate(), Err(SolverError::Config(_))));
    }

    #[test]
    fn test_modified_whitelist_rejected() {
        let mut config = SolverConfig::default();
        config.ocr.character_whitelist = "0123456789".to_string();
        assert!(matches!(config.validate(), Err(SolverError::Config(_))));
    }

    #[test]
    fn test_invalid_psm_rejected() {
        let mut config = SolverConfig::default();
        config.ocr.psm_mode = "99".to_string();
        assert!(matches!(config.validate(), Err(SolverError::Config(_))));
    }
}
