use anyhow::Context;
use image::GenericImageView;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use tracing::info;

use crate::catalog::{CatalogStore, FontDirectory, FontEntry};
use crate::matching::{
    DEFAULT_SIMILARITY_CUTOFF, FontMatches, MatchConfig, MatchStrategy, match_fonts,
};
use crate::ocr::{
    DEFAULT_THRESHOLD, ExtractionResult, NoiseFilter, OcrEngine, PreprocessOptions, extract_text,
    preprocess,
};

pub const NO_TEXT_FOUND: &str = "No text found";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineConfig {
    pub threshold_luminance: u8,
    pub filter: NoiseFilter,
    pub strategy: MatchStrategy,
    pub similarity_cutoff: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            threshold_luminance: DEFAULT_THRESHOLD,
            filter: NoiseFilter::default(),
            strategy: MatchStrategy::default(),
            similarity_cutoff: DEFAULT_SIMILARITY_CUTOFF,
        }
    }
}

impl PipelineConfig {
    pub fn preprocess_options(&self) -> PreprocessOptions {
        PreprocessOptions {
            threshold: self.threshold_luminance,
            filter: self.filter,
        }
    }

    pub fn match_config(&self) -> MatchConfig {
        MatchConfig {
            strategy: self.strategy,
            cutoff: self.similarity_cutoff,
        }
    }
}

#[derive(Debug)]
pub enum IdentifyError {
    /// The payload is not a decodable image.
    Decode(anyhow::Error),
    Ocr(anyhow::Error),
}

impl fmt::Display for IdentifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentifyError::Decode(err) | IdentifyError::Ocr(err) => write!(f, "{:#}", err),
        }
    }
}

impl std::error::Error for IdentifyError {}

#[derive(Debug, Clone, PartialEq)]
pub enum Identification {
    Found {
        extraction: ExtractionResult,
        matches: FontMatches,
    },
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentifyStatus {
    Found,
    Empty,
}

#[derive(Debug, Clone, Serialize)]
pub struct IdentifyResponse {
    pub status: IdentifyStatus,
    pub text: String,
    pub words: Vec<String>,
    pub matches: Vec<FontEntry>,
    pub word_matches: BTreeMap<String, Vec<FontEntry>>,
}

impl Identification {
    pub fn into_response(self) -> IdentifyResponse {
        match self {
            Identification::Found {
                extraction,
                matches,
            } => IdentifyResponse {
                status: IdentifyStatus::Found,
                words: extraction.words(),
                text: extraction.sanitized_text,
                matches: matches.ranked,
                word_matches: matches.by_word,
            },
            Identification::Empty => IdentifyResponse {
                status: IdentifyStatus::Empty,
                text: NO_TEXT_FOUND.to_string(),
                words: Vec::new(),
                matches: Vec::new(),
                word_matches: BTreeMap::new(),
            },
        }
    }
}

/// Image bytes in, ranked font suggestions out.
pub struct FontIdentifier<E: OcrEngine, D: FontDirectory> {
    engine: E,
    catalog: CatalogStore<D>,
    config: PipelineConfig,
}

impl<E: OcrEngine, D: FontDirectory> FontIdentifier<E, D> {
    pub fn new(engine: E, catalog: CatalogStore<D>, config: PipelineConfig) -> Self {
        Self {
            engine,
            catalog,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn catalog(&self) -> &CatalogStore<D> {
        &self.catalog
    }

    pub async fn identify(&self, image_bytes: &[u8]) -> Result<Identification, IdentifyError> {
        let image = image::load_from_memory(image_bytes)
            .with_context(|| "failed to decode image")
            .map_err(IdentifyError::Decode)?;
        let (width, height) = image.dimensions();
        info!("identify: decoded {}x{} image", width, height);

        let binary = preprocess(&image, &self.config.preprocess_options());
        let extraction = extract_text(&self.engine, &binary).map_err(IdentifyError::Ocr)?;
        if extraction.is_empty() {
            info!("identify: no text found");
            return Ok(Identification::Empty);
        }

        let catalog = self.catalog.get_catalog().await;
        let matches = match_fonts(&extraction, &catalog, &self.config.match_config());
        info!(
            "identify: {:?} -> {} candidates ({} words, strategy={})",
            extraction.sanitized_text,
            matches.ranked.len(),
            extraction.tokens.len(),
            self.config.strategy.as_str()
        );
        Ok(Identification::Found {
            extraction,
            matches,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::fallback_catalog;
    use crate::test_util::{ScriptedEngine, StaticDirectory, blank_png, png_bytes};
    use image::{DynamicImage, Rgba, RgbaImage};
    use tempfile::tempdir;

    fn identifier(
        engine: ScriptedEngine,
        directory: StaticDirectory,
        config: PipelineConfig,
    ) -> (FontIdentifier<ScriptedEngine, StaticDirectory>, tempfile::TempDir) {
        let dir = tempdir().expect("tempdir");
        let store = CatalogStore::new(dir.path().join("cached_fonts.json"), directory);
        (FontIdentifier::new(engine, store, config), dir)
    }

    fn text_like_png() -> Vec<u8> {
        let mut image = RgbaImage::from_pixel(32, 16, Rgba([0, 0, 0, 0]));
        for y in 5..11 {
            for x in 4..28 {
                image.put_pixel(x, y, Rgba([0, 0, 0, 255]));
            }
        }
        png_bytes(DynamicImage::ImageRgba8(image))
    }

    #[tokio::test]
    async fn roboto_is_ranked_first() {
        let (identifier, _dir) = identifier(
            ScriptedEngine::reading("Roboto\n"),
            StaticDirectory::with_families(&["Roboto Mono", "Lato", "Roboto", "Roboto Slab"]),
            PipelineConfig::default(),
        );
        let result = identifier.identify(&text_like_png()).await.expect("identify");
        let Identification::Found { extraction, matches } = result else {
            panic!("expected text");
        };
        assert!(extraction.sanitized_text.contains("Roboto"));
        assert_eq!(matches.ranked[0].name, "Roboto");
    }

    #[tokio::test]
    async fn blank_image_short_circuits_before_catalog() {
        for strategy in [MatchStrategy::Approximate, MatchStrategy::Substring] {
            let config = PipelineConfig {
                strategy,
                ..PipelineConfig::default()
            };
            let (identifier, _dir) = identifier(
                ScriptedEngine::reading("\x0c"),
                StaticDirectory::with_families(&["Roboto"]),
                config,
            );
            let result = identifier.identify(&blank_png(40, 20)).await.expect("identify");
            assert_eq!(result, Identification::Empty);
            assert_eq!(identifier.catalog().directory().calls(), 0);

            let response = result.into_response();
            assert_eq!(response.status, IdentifyStatus::Empty);
            assert_eq!(response.text, NO_TEXT_FOUND);
            assert!(response.matches.is_empty());
        }
    }

    #[tokio::test]
    async fn offline_partial_name_hits_fallback_catalog() {
        for strategy in [MatchStrategy::Approximate, MatchStrategy::Substring] {
            let config = PipelineConfig {
                strategy,
                ..PipelineConfig::default()
            };
            let (identifier, dir) = identifier(
                ScriptedEngine::reading("Open"),
                StaticDirectory::unreachable(),
                config,
            );
            let result = identifier.identify(&text_like_png()).await.expect("identify");
            let response = result.into_response();
            assert_eq!(response.status, IdentifyStatus::Found);
            assert!(
                response.matches.iter().any(|entry| entry.name == "Open Sans"),
                "{:?}: {:?}",
                strategy,
                response.matches
            );
            assert!(fallback_catalog().entries().contains(&response.matches[0]));
            assert!(!dir.path().join("cached_fonts.json").exists());
        }
    }

    #[tokio::test]
    async fn undecodable_bytes_are_a_decode_error() {
        let engine = ScriptedEngine::reading("Roboto");
        let (identifier, _dir) = identifier(
            engine,
            StaticDirectory::with_families(&["Roboto"]),
            PipelineConfig::default(),
        );
        let err = identifier
            .identify(b"definitely not an image")
            .await
            .expect_err("decode should fail");
        assert!(matches!(err, IdentifyError::Decode(_)));
        assert!(err.to_string().starts_with("failed to decode image"));
    }

    #[tokio::test]
    async fn engine_failure_is_an_ocr_error() {
        let (identifier, _dir) = identifier(
            ScriptedEngine::failing(),
            StaticDirectory::with_families(&["Roboto"]),
            PipelineConfig::default(),
        );
        let err = identifier
            .identify(&blank_png(8, 8))
            .await
            .expect_err("ocr should fail");
        assert!(matches!(err, IdentifyError::Ocr(_)));
        assert!(err.to_string().contains("simulated crash"));
    }

    #[tokio::test]
    async fn found_response_carries_words_and_per_word_matches() {
        let (identifier, _dir) = identifier(
            ScriptedEngine::reading("Lora Zzzzzz\n"),
            StaticDirectory::with_families(&["Roboto", "Lora", "Lato"]),
            PipelineConfig::default(),
        );
        let response = identifier
            .identify(&text_like_png())
            .await
            .expect("identify")
            .into_response();
        assert_eq!(response.words, vec!["Lora", "Zzzzzz"]);
        assert_eq!(response.word_matches["Lora"][0].name, "Lora");
        assert!(response.word_matches["Zzzzzz"].is_empty());

        let value = serde_json::to_value(&response).expect("serialize");
        assert_eq!(value["status"], "found");
        assert_eq!(
            value["word_matches"]["Lora"][0]["url"],
            "https://fonts.google.com/specimen/Lora"
        );
    }
}
