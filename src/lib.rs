use anyhow::{Context, Result, anyhow};
use std::path::Path;

pub mod catalog;
pub mod logging;
pub mod matching;
pub mod ocr;
pub mod pipeline;
pub mod server;
pub mod settings;
#[cfg(test)]
mod test_util;

pub use catalog::{
    CatalogStore, FontCatalog, FontDirectory, FontEntry, GoogleFontsDirectory, fallback_catalog,
};
pub use matching::{FontMatches, MatchConfig, MatchStrategy};
pub use ocr::{ExtractionResult, NoiseFilter, OcrEngine, TesseractEngine};
pub use pipeline::{
    FontIdentifier, Identification, IdentifyError, IdentifyResponse, IdentifyStatus,
    PipelineConfig,
};
pub use settings::Settings;

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub data: Option<String>,
    pub data_bytes: Option<Vec<u8>>,
    pub settings_path: Option<String>,
    pub strategy: Option<String>,
    pub threshold: Option<i64>,
    pub cutoff: Option<f64>,
    pub show_catalog: bool,
    pub refresh_catalog: bool,
}

pub fn build_identifier(settings: &Settings) -> FontIdentifier<TesseractEngine, GoogleFontsDirectory> {
    let engine = TesseractEngine::new(
        settings.ocr_language.clone(),
        settings.ocr_psm,
        settings.ocr_whitelist.clone(),
    );
    let directory = GoogleFontsDirectory::new(
        settings.catalog_endpoint.clone(),
        catalog::resolve_api_key(settings.catalog_api_key.as_deref()),
    );
    let store = CatalogStore::new(settings.catalog_cache_path.clone(), directory);
    FontIdentifier::new(engine, store, settings.pipeline_config())
}

pub fn resolve_settings(config: &Config) -> Result<Settings> {
    let settings_path = config.settings_path.as_deref().map(Path::new);
    settings::load_settings(settings_path)?.with_overrides(
        config.strategy.as_deref(),
        config.threshold,
        config.cutoff,
    )
}

pub async fn run(config: Config) -> Result<String> {
    let settings = resolve_settings(&config)?;
    let identifier = build_identifier(&settings);

    if config.refresh_catalog {
        let catalog = identifier
            .catalog()
            .refresh()
            .await
            .with_context(|| "failed to refresh font catalog")?;
        return Ok(format!(
            "cached {} fonts in {}",
            catalog.len(),
            identifier.catalog().path().display()
        ));
    }
    if config.show_catalog {
        let catalog = identifier.catalog().get_catalog().await;
        return Ok(format_catalog(&catalog));
    }

    let bytes = match (config.data.as_deref(), config.data_bytes) {
        (Some(path), _) => std::fs::read(path)
            .with_context(|| format!("failed to read image: {}", path))?,
        (None, Some(bytes)) if !bytes.is_empty() => bytes,
        _ => return Err(anyhow!("no image given (use --data or pipe it on stdin)")),
    };

    let identification = identifier.identify(&bytes).await?;
    let response = identification.into_response();
    Ok(serde_json::to_string_pretty(&response)?)
}

fn format_catalog(catalog: &FontCatalog) -> String {
    catalog
        .entries()
        .iter()
        .map(|entry| format!("{}\t{}", entry.name, entry.url))
        .collect::<Vec<_>>()
        .join("\n")
}
