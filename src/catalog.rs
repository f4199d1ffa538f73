use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::future::Future;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

pub const DEFAULT_ENDPOINT: &str = "https://www.googleapis.com/webfonts/v1/webfonts";
pub const DEFAULT_CACHE_FILE: &str = "cached_fonts.json";
pub const API_KEY_ENV: &str = "GOOGLE_FONTS_API_KEY";

const FETCH_TIMEOUT: Duration = Duration::from_secs(15);
const SPECIMEN_BASE_URL: &str = "https://fonts.google.com/specimen/";
const FALLBACK_FAMILIES: &[&str] = &["Roboto", "Open Sans", "Lora", "Lato", "Montserrat"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FontEntry {
    pub name: String,
    /// Specimen page for the family.
    pub url: String,
}

impl FontEntry {
    pub fn from_family(family: &str) -> Self {
        Self {
            name: family.to_string(),
            url: specimen_url(family),
        }
    }
}

pub fn specimen_url(family: &str) -> String {
    format!("{}{}", SPECIMEN_BASE_URL, family.replace(' ', "+"))
}

/// Ordered, never-empty list of known fonts. Order is the source order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontCatalog {
    entries: Vec<FontEntry>,
}

impl FontCatalog {
    pub fn new(entries: Vec<FontEntry>) -> Option<Self> {
        if entries.is_empty() {
            return None;
        }
        Some(Self { entries })
    }

    pub fn from_families<S: AsRef<str>>(families: &[S]) -> Option<Self> {
        let entries = families
            .iter()
            .map(|family| family.as_ref().trim())
            .filter(|family| !family.is_empty())
            .map(FontEntry::from_family)
            .collect();
        Self::new(entries)
    }

    pub fn entries(&self) -> &[FontEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn head(&self, count: usize) -> Vec<FontEntry> {
        self.entries.iter().take(count).cloned().collect()
    }
}

pub fn fallback_catalog() -> FontCatalog {
    FontCatalog {
        entries: FALLBACK_FAMILIES
            .iter()
            .map(|family| FontEntry::from_family(family))
            .collect(),
    }
}

pub type DirectoryFuture<'a> = Pin<Box<dyn Future<Output = Result<Vec<String>>> + Send + 'a>>;

/// Remote listing of font family names.
pub trait FontDirectory: Send + Sync {
    fn fetch_families(&self) -> DirectoryFuture<'_>;
}

#[derive(Debug, Clone)]
pub struct GoogleFontsDirectory {
    endpoint: String,
    key: Option<String>,
    client: reqwest::Client,
}

impl GoogleFontsDirectory {
    pub fn new(endpoint: impl Into<String>, key: Option<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            key,
            client: reqwest::Client::new(),
        }
    }
}

impl FontDirectory for GoogleFontsDirectory {
    fn fetch_families(&self) -> DirectoryFuture<'_> {
        Box::pin(async move {
            let mut request = self.client.get(&self.endpoint);
            if let Some(key) = self.key.as_deref() {
                request = request.query(&[("key", key)]);
            }
            let response = request
                .send()
                .await
                .with_context(|| "failed to reach font directory")?;

            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            if !status.is_success() {
                return Err(anyhow!(
                    "font directory API error ({}): {}",
                    status,
                    extract_directory_error(&body).unwrap_or(body)
                ));
            }
            parse_families(&body)
        })
    }
}

pub fn resolve_api_key(configured: Option<&str>) -> Option<String> {
    if let Some(key) = configured {
        let key = key.trim();
        if !key.is_empty() {
            return Some(key.to_string());
        }
    }
    std::env::var(API_KEY_ENV)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Font catalog backed by a JSON file at an injected path.
///
/// A present file is trusted and short-circuits the remote directory. A
/// successful load is kept in memory for the lifetime of the store; the
/// built-in fallback is never persisted nor kept, so the next call retries.
///
/// Callers arriving while the first fetch is in flight wait for it and share
/// its outcome. Once a fetch has failed, retries run without the lock so a
/// slow directory never queues requests behind each other.
pub struct CatalogStore<D: FontDirectory> {
    path: PathBuf,
    directory: D,
    loaded: RwLock<Option<Arc<FontCatalog>>>,
    fetching: Mutex<()>,
    failed_fetches: AtomicUsize,
}

impl<D: FontDirectory> CatalogStore<D> {
    pub fn new(path: impl Into<PathBuf>, directory: D) -> Self {
        Self {
            path: path.into(),
            directory,
            loaded: RwLock::new(None),
            fetching: Mutex::new(()),
            failed_fetches: AtomicUsize::new(0),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn directory(&self) -> &D {
        &self.directory
    }

    pub async fn get_catalog(&self) -> Arc<FontCatalog> {
        if let Some(catalog) = self.memoized().await {
            return catalog;
        }

        let failures_seen = self.failed_fetches.load(Ordering::Acquire);
        let guard = if failures_seen == 0 {
            Some(self.fetching.lock().await)
        } else {
            None
        };
        if let Some(catalog) = self.memoized().await {
            return catalog;
        }
        if guard.is_some() && self.failed_fetches.load(Ordering::Acquire) != failures_seen {
            debug!("catalog: in-flight fetch failed, using built-in fallback");
            return Arc::new(fallback_catalog());
        }

        match self.load() {
            Ok(Some(catalog)) => {
                info!(
                    "catalog: loaded {} fonts from {}",
                    catalog.len(),
                    self.path.display()
                );
                return self.remember(catalog).await;
            }
            Ok(None) => {}
            Err(err) => warn!("catalog: ignoring unreadable cache: {:#}", err),
        }

        match self.fetch_and_persist().await {
            Ok(catalog) => self.remember(catalog).await,
            Err(err) => {
                self.failed_fetches.fetch_add(1, Ordering::AcqRel);
                warn!("catalog: using built-in fallback: {:#}", err);
                Arc::new(fallback_catalog())
            }
        }
    }

    pub fn load(&self) -> Result<Option<FontCatalog>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read font cache: {}", self.path.display()))?;
        let entries: Vec<FontEntry> = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse font cache: {}", self.path.display()))?;
        FontCatalog::new(entries)
            .map(Some)
            .ok_or_else(|| anyhow!("font cache is empty: {}", self.path.display()))
    }

    pub async fn refresh(&self) -> Result<Arc<FontCatalog>> {
        let _guard = self.fetching.lock().await;
        let catalog = self.fetch_and_persist().await?;
        Ok(self.remember(catalog).await)
    }

    async fn memoized(&self) -> Option<Arc<FontCatalog>> {
        self.loaded.read().await.clone()
    }

    async fn remember(&self, catalog: FontCatalog) -> Arc<FontCatalog> {
        let catalog = Arc::new(catalog);
        *self.loaded.write().await = Some(Arc::clone(&catalog));
        catalog
    }

    async fn fetch_and_persist(&self) -> Result<FontCatalog> {
        let families = tokio::time::timeout(FETCH_TIMEOUT, self.directory.fetch_families())
            .await
            .map_err(|_| anyhow!("font directory timed out after {:?}", FETCH_TIMEOUT))??;
        let catalog = FontCatalog::from_families(&families)
            .ok_or_else(|| anyhow!("font directory returned no families"))?;
        write_catalog(&self.path, &catalog)?;
        info!(
            "catalog: fetched {} fonts into {}",
            catalog.len(),
            self.path.display()
        );
        Ok(catalog)
    }
}

fn write_catalog(path: &Path, catalog: &FontCatalog) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create cache directory: {}", dir.display()))?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".font-catalog-")
        .suffix(".json")
        .tempfile_in(&dir)
        .with_context(|| "failed to create temp file for font cache")?;
    serde_json::to_writer(&mut tmp, catalog.entries())
        .with_context(|| "failed to serialize font cache")?;
    tmp.flush()
        .with_context(|| "failed to flush font cache")?;
    tmp.persist(path)
        .map_err(|err| err.error)
        .with_context(|| format!("failed to write font cache: {}", path.display()))?;
    Ok(())
}

fn parse_families(body: &str) -> Result<Vec<String>> {
    let payload: WebfontsResponse =
        serde_json::from_str(body).with_context(|| "failed to parse font directory response")?;
    Ok(payload.items.into_iter().map(|item| item.family).collect())
}

fn extract_directory_error(body: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: Option<DirectoryError>,
    }

    #[derive(Deserialize)]
    struct DirectoryError {
        message: Option<String>,
        status: Option<String>,
    }

    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    let error = parsed.error?;
    let mut parts = Vec::new();
    if let Some(message) = error.message.filter(|value| !value.trim().is_empty()) {
        parts.push(message);
    }
    if let Some(status) = error.status.filter(|value| !value.trim().is_empty()) {
        parts.push(format!("status: {}", status));
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" | "))
    }
}

#[derive(Debug, Deserialize)]
struct WebfontsResponse {
    #[serde(default)]
    items: Vec<WebfontItem>,
}

#[derive(Debug, Deserialize)]
struct WebfontItem {
    family: String,
}
