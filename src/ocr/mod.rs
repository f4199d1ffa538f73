mod engine;

use anyhow::{Context, Result};
use image::GrayImage;
use std::collections::BTreeSet;
use tracing::debug;

pub use engine::{
    DEFAULT_LANGUAGE, DEFAULT_THRESHOLD, LATIN_WHITELIST, MAX_THRESHOLD, MIN_THRESHOLD,
    NoiseFilter, PreprocessOptions, SINGLE_LINE_PSM, TesseractEngine, is_valid_threshold,
    preprocess,
};

/// Recognizes text in an already binarized image.
pub trait OcrEngine: Send + Sync {
    fn recognize(&self, image: &GrayImage) -> Result<String>;
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExtractionResult {
    pub raw_text: String,
    /// First non-empty line, whitespace collapsed. Empty when nothing was read.
    pub sanitized_text: String,
    pub tokens: BTreeSet<String>,
}

impl ExtractionResult {
    pub fn from_raw(raw: &str) -> Self {
        engine::sanitize(raw)
    }

    pub fn is_empty(&self) -> bool {
        self.sanitized_text.is_empty()
    }

    pub fn words(&self) -> Vec<String> {
        self.tokens.iter().cloned().collect()
    }
}

pub fn extract_text<E: OcrEngine + ?Sized>(engine: &E, image: &GrayImage) -> Result<ExtractionResult> {
    let raw = engine
        .recognize(image)
        .with_context(|| "text extraction failed")?;
    debug!("ocr: raw text {:?}", raw);
    Ok(engine::sanitize(&raw))
}
