use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::catalog::{DEFAULT_CACHE_FILE, DEFAULT_ENDPOINT};
use crate::matching::{DEFAULT_SIMILARITY_CUTOFF, MatchStrategy};
use crate::ocr::{
    DEFAULT_LANGUAGE, DEFAULT_THRESHOLD, LATIN_WHITELIST, MAX_THRESHOLD, MIN_THRESHOLD,
    NoiseFilter, SINGLE_LINE_PSM, is_valid_threshold,
};
use crate::pipeline::PipelineConfig;

const DEFAULT_SETTINGS_TOML: &str = include_str!("../settings.toml");
const HOME_DIR_NAME: &str = ".font-identifier-rust";

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub server_addr: String,
    pub catalog_cache_path: PathBuf,
    pub catalog_endpoint: String,
    pub catalog_api_key: Option<String>,
    pub threshold: u8,
    pub filter: NoiseFilter,
    pub ocr_language: String,
    pub ocr_psm: u32,
    pub ocr_whitelist: String,
    pub strategy: MatchStrategy,
    pub cutoff: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_addr: "127.0.0.1:8000".to_string(),
            catalog_cache_path: PathBuf::from(DEFAULT_CACHE_FILE),
            catalog_endpoint: DEFAULT_ENDPOINT.to_string(),
            catalog_api_key: None,
            threshold: DEFAULT_THRESHOLD,
            filter: NoiseFilter::default(),
            ocr_language: DEFAULT_LANGUAGE.to_string(),
            ocr_psm: SINGLE_LINE_PSM,
            ocr_whitelist: LATIN_WHITELIST.to_string(),
            strategy: MatchStrategy::default(),
            cutoff: DEFAULT_SIMILARITY_CUTOFF,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    server: Option<ServerSettings>,
    catalog: Option<CatalogSettings>,
    preprocess: Option<PreprocessSettings>,
    ocr: Option<OcrSettings>,
    matching: Option<MatchingSettings>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerSettings {
    addr: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct CatalogSettings {
    cache_path: Option<String>,
    endpoint: Option<String>,
    api_key: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct PreprocessSettings {
    threshold: Option<i64>,
    filter: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct OcrSettings {
    language: Option<String>,
    psm: Option<u32>,
    whitelist: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct MatchingSettings {
    strategy: Option<String>,
    cutoff: Option<f64>,
}

pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    let mut settings = Settings::default();
    ensure_home_settings_file()?;

    let mut ordered_paths = Vec::new();
    ordered_paths.push(PathBuf::from("settings.toml"));
    ordered_paths.push(PathBuf::from("settings.local.toml"));

    if let Some(home) = home_dir() {
        ordered_paths.push(home.join("settings.toml"));
        ordered_paths.push(home.join("settings.local.toml"));
    }

    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
        ordered_paths.push(extra.to_path_buf());
    }

    for path in ordered_paths {
        if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings: {}", path.display()))?;
            let parsed: SettingsFile = toml::from_str(&content)
                .with_context(|| format!("failed to parse settings: {}", path.display()))?;
            settings.merge(parsed);
        }
    }

    Ok(settings)
}

impl Settings {
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            threshold_luminance: self.threshold,
            filter: self.filter,
            strategy: self.strategy,
            similarity_cutoff: self.cutoff,
        }
    }

    /// Applies command line values. Unlike file values, invalid ones are errors.
    pub fn with_overrides(
        mut self,
        strategy: Option<&str>,
        threshold: Option<i64>,
        cutoff: Option<f64>,
    ) -> Result<Self> {
        if let Some(value) = strategy {
            self.strategy = MatchStrategy::parse(value)
                .ok_or_else(|| anyhow!("unknown match strategy: {}", value))?;
        }
        if let Some(value) = threshold {
            if !is_valid_threshold(value) {
                return Err(anyhow!(
                    "threshold must be between {} and {}: {}",
                    MIN_THRESHOLD,
                    MAX_THRESHOLD,
                    value
                ));
            }
            self.threshold = value as u8;
        }
        if let Some(value) = cutoff {
            if !(0.0..=1.0).contains(&value) {
                return Err(anyhow!("cutoff must be between 0 and 1: {}", value));
            }
            self.cutoff = value;
        }
        Ok(self)
    }

    fn merge(&mut self, incoming: SettingsFile) {
        if let Some(server) = incoming.server {
            if let Some(addr) = server.addr {
                if !addr.trim().is_empty() {
                    self.server_addr = addr.trim().to_string();
                }
            }
        }
        if let Some(catalog) = incoming.catalog {
            if let Some(path) = catalog.cache_path {
                if !path.trim().is_empty() {
                    self.catalog_cache_path = PathBuf::from(path.trim());
                }
            }
            if let Some(endpoint) = catalog.endpoint {
                if !endpoint.trim().is_empty() {
                    self.catalog_endpoint = endpoint.trim().to_string();
                }
            }
            if let Some(key) = catalog.api_key {
                if !key.trim().is_empty() {
                    self.catalog_api_key = Some(key.trim().to_string());
                }
            }
        }
        if let Some(preprocess) = incoming.preprocess {
            if let Some(threshold) = preprocess.threshold {
                if is_valid_threshold(threshold) {
                    self.threshold = threshold as u8;
                } else {
                    warn!(
                        "settings: threshold {} outside {}..={}; keeping {}",
                        threshold, MIN_THRESHOLD, MAX_THRESHOLD, self.threshold
                    );
                }
            }
            if let Some(filter) = preprocess.filter {
                match NoiseFilter::parse(&filter) {
                    Some(filter) => self.filter = filter,
                    None => warn!("settings: unknown filter {:?}", filter),
                }
            }
        }
        if let Some(ocr) = incoming.ocr {
            if let Some(language) = ocr.language {
                if !language.trim().is_empty() {
                    self.ocr_language = language.trim().to_string();
                }
            }
            if let Some(psm) = ocr.psm {
                if psm <= 13 {
                    self.ocr_psm = psm;
                } else {
                    warn!("settings: invalid page segmentation mode {}", psm);
                }
            }
            if let Some(whitelist) = ocr.whitelist {
                self.ocr_whitelist = whitelist.trim().to_string();
            }
        }
        if let Some(matching) = incoming.matching {
            if let Some(strategy) = matching.strategy {
                match MatchStrategy::parse(&strategy) {
                    Some(strategy) => self.strategy = strategy,
                    None => warn!("settings: unknown match strategy {:?}", strategy),
                }
            }
            if let Some(cutoff) = matching.cutoff {
                if (0.0..=1.0).contains(&cutoff) {
                    self.cutoff = cutoff;
                } else {
                    warn!("settings: cutoff {} outside 0..=1", cutoff);
                }
            }
        }
    }
}

fn ensure_home_settings_file() -> Result<()> {
    let Some(home) = home_dir() else {
        return Ok(());
    };
    fs::create_dir_all(&home)
        .with_context(|| format!("failed to create settings directory: {}", home.display()))?;
    let path = home.join("settings.toml");
    if !path.exists() {
        fs::write(&path, DEFAULT_SETTINGS_TOML)
            .with_context(|| format!("failed to write settings: {}", path.display()))?;
    }
    Ok(())
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().and_then(|home| {
        let home = home.trim();
        if home.is_empty() {
            None
        } else {
            Some(Path::new(home).join(HOME_DIR_NAME))
        }
    })
}
