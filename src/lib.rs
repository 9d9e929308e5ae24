//! # Arithmetic Captcha Solver
//!
//! Solves arithmetic captchas served as noisy images over a patterned
//! background: two integers and one operator, to be evaluated and sent
//! back as a numeric answer.
//!
//! The pipeline runs four stages over each captcha attempt:
//! background subtraction against a library of candidate backgrounds,
//! Tesseract OCR constrained to the digit/operator alphabet, correction
//! of common OCR misreads, and deterministic evaluation of the recovered
//! expression. Operator-confirmed corrections are persisted and consulted
//! on later attempts.

pub mod background;
pub mod config;
pub mod corrections;
pub mod errors;
pub mod ocr;
pub mod pipeline;
pub mod session;
pub mod solver;
pub mod store;

// Re-export types for easier access
pub use errors::{SolverError, SolverResult};
pub use pipeline::{CaptchaPipeline, CaptchaSolution};
pub use solver::Solution;
