use anyhow::{Result, anyhow};
use font_identifier_rust::catalog::DirectoryFuture;
use font_identifier_rust::{
    CatalogStore, FontDirectory, FontIdentifier, IdentifyStatus, MatchStrategy, OcrEngine,
    PipelineConfig,
};
use image::{DynamicImage, GrayImage, Rgb, RgbImage};
use std::io::Cursor;

struct CannedEngine(&'static str);

impl OcrEngine for CannedEngine {
    fn recognize(&self, _image: &GrayImage) -> Result<String> {
        Ok(self.0.to_string())
    }
}

struct Listing(&'static [&'static str]);

impl FontDirectory for Listing {
    fn fetch_families(&self) -> DirectoryFuture<'_> {
        let families = self.0.iter().map(|value| value.to_string()).collect();
        Box::pin(async move { Ok(families) })
    }
}

struct Offline;

impl FontDirectory for Offline {
    fn fetch_families(&self) -> DirectoryFuture<'_> {
        Box::pin(async { Err(anyhow!("dns error: no network")) })
    }
}

fn white_png() -> Vec<u8> {
    let image = RgbImage::from_pixel(48, 16, Rgb([255, 255, 255]));
    let mut cursor = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(image)
        .write_to(&mut cursor, image::ImageFormat::Png)
        .unwrap();
    cursor.into_inner()
}

#[tokio::test]
async fn found_response_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let store = CatalogStore::new(
        dir.path().join("cached_fonts.json"),
        Listing(&["Roboto", "Roboto Mono", "Open Sans", "Lora"]),
    );
    let identifier = FontIdentifier::new(
        CannedEngine("Open Sans\nRoboto\n"),
        store,
        PipelineConfig::default(),
    );
    let response = identifier.identify(&white_png()).await.unwrap().into_response();
    insta::assert_json_snapshot!(response);
}

#[tokio::test]
async fn empty_response_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let store = CatalogStore::new(dir.path().join("cached_fonts.json"), Offline);
    let identifier = FontIdentifier::new(CannedEngine("  \n"), store, PipelineConfig::default());
    let response = identifier.identify(&white_png()).await.unwrap().into_response();
    insta::assert_json_snapshot!(response);
}

#[tokio::test]
async fn offline_substring_match_uses_fallback_catalog() {
    let dir = tempfile::tempdir().unwrap();
    let store = CatalogStore::new(dir.path().join("cached_fonts.json"), Offline);
    let config = PipelineConfig {
        strategy: MatchStrategy::Substring,
        ..PipelineConfig::default()
    };
    let identifier = FontIdentifier::new(CannedEngine("Open"), store, config);
    let response = identifier.identify(&white_png()).await.unwrap().into_response();
    assert_eq!(response.status, IdentifyStatus::Found);
    let names: Vec<&str> = response.matches.iter().map(|entry| entry.name.as_str()).collect();
    assert_eq!(names, vec!["Open Sans"]);
    assert!(!dir.path().join("cached_fonts.json").exists());
}

#[tokio::test]
async fn persisted_catalog_is_reused_across_stores() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cached_fonts.json");

    let first = CatalogStore::new(&path, Listing(&["Inter", "Open Sans"]));
    let fetched = first.get_catalog().await;

    let second = CatalogStore::new(&path, Offline);
    assert_eq!(second.get_catalog().await, fetched);
    assert_eq!(second.get_catalog().await, fetched);
}
