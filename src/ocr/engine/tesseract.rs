use anyhow::{Context, Result, anyhow};
use image::GrayImage;
use std::ffi::OsString;
use std::io::Write;
use std::path::Path;
use std::process::Command;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::ocr::OcrEngine;

pub const LATIN_WHITELIST: &str = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
/// Treat the image as a single text line.
pub const SINGLE_LINE_PSM: u32 = 7;
pub const DEFAULT_LANGUAGE: &str = "eng";

/// Runs the `tesseract` binary on a temporary PNG.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TesseractEngine {
    pub language: String,
    pub psm: u32,
    pub whitelist: String,
}

impl Default for TesseractEngine {
    fn default() -> Self {
        Self {
            language: DEFAULT_LANGUAGE.to_string(),
            psm: SINGLE_LINE_PSM,
            whitelist: LATIN_WHITELIST.to_string(),
        }
    }
}

impl TesseractEngine {
    pub fn new(language: impl Into<String>, psm: u32, whitelist: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            psm,
            whitelist: whitelist.into(),
        }
    }

    fn args(&self, path: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            path.as_os_str().to_os_string(),
            "stdout".into(),
            "-l".into(),
            self.language.clone().into(),
            "--psm".into(),
            self.psm.to_string().into(),
        ];
        if !self.whitelist.is_empty() {
            args.push("-c".into());
            args.push(format!("tessedit_char_whitelist={}", self.whitelist).into());
        }
        args
    }
}

impl OcrEngine for TesseractEngine {
    fn recognize(&self, image: &GrayImage) -> Result<String> {
        let tmp = write_temp_png(image)?;
        let args = self.args(tmp.path());
        debug!("tesseract: psm={} lang={}", self.psm, self.language);
        let output = Command::new("tesseract")
            .args(&args)
            .output()
            .with_context(|| "failed to run tesseract (is it installed?)")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("tesseract failed: {}", stderr.trim()));
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

fn write_temp_png(image: &GrayImage) -> Result<NamedTempFile> {
    let mut tmp = tempfile::Builder::new()
        .prefix("font-identifier-")
        .suffix(".png")
        .tempfile()
        .with_context(|| "failed to create temp file for OCR")?;
    image
        .write_to(&mut tmp, image::ImageFormat::Png)
        .with_context(|| "failed to write temp image for OCR")?;
    tmp.flush()
        .with_context(|| "failed to flush temp image for OCR")?;
    Ok(tmp)
}
