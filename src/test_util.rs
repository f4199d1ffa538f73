#[cfg(test)]
pub(crate) fn with_temp_home<F, R>(func: F) -> R
where
    F: FnOnce(&std::path::Path) -> R,
{
    static HOME_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());
    let _guard = HOME_MUTEX.lock().unwrap_or_else(|err| err.into_inner());
    let dir = tempfile::tempdir().expect("tempdir");
    let old_home = std::env::var("HOME").ok();
    // SAFETY: HOME is only mutated under HOME_MUTEX.
    unsafe { std::env::set_var("HOME", dir.path()) };
    let result = func(dir.path());
    match old_home {
        Some(old) => unsafe { std::env::set_var("HOME", old) },
        None => unsafe { std::env::remove_var("HOME") },
    }
    result
}

#[cfg(test)]
pub(crate) struct StaticDirectory {
    families: Option<Vec<String>>,
    latency: std::time::Duration,
    calls: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl StaticDirectory {
    pub(crate) fn with_families(families: &[&str]) -> Self {
        Self {
            families: Some(families.iter().map(|value| value.to_string()).collect()),
            latency: std::time::Duration::ZERO,
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    pub(crate) fn unreachable() -> Self {
        Self {
            families: None,
            latency: std::time::Duration::ZERO,
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// Every fetch sleeps for `latency` before answering.
    pub(crate) fn delayed(mut self, latency: std::time::Duration) -> Self {
        self.latency = latency;
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
impl crate::catalog::FontDirectory for StaticDirectory {
    fn fetch_families(&self) -> crate::catalog::DirectoryFuture<'_> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let families = self.families.clone();
        let latency = self.latency;
        Box::pin(async move {
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }
            families.ok_or_else(|| anyhow::anyhow!("network unreachable"))
        })
    }
}

/// Returns canned text, or fails, instead of running tesseract.
#[cfg(test)]
pub(crate) struct ScriptedEngine {
    text: Option<String>,
    calls: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl ScriptedEngine {
    pub(crate) fn reading(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            text: None,
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
impl crate::ocr::OcrEngine for ScriptedEngine {
    fn recognize(&self, image: &image::GrayImage) -> anyhow::Result<String> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        assert!(
            image.pixels().all(|pixel| pixel[0] == 0 || pixel[0] == 255),
            "engine received a non-binary image"
        );
        self.text
            .clone()
            .ok_or_else(|| anyhow::anyhow!("tesseract failed: simulated crash"))
    }
}

#[cfg(test)]
pub(crate) fn png_bytes(image: image::DynamicImage) -> Vec<u8> {
    let mut cursor = std::io::Cursor::new(Vec::new());
    image
        .write_to(&mut cursor, image::ImageFormat::Png)
        .expect("encode png");
    cursor.into_inner()
}

#[cfg(test)]
pub(crate) fn blank_png(width: u32, height: u32) -> Vec<u8> {
    let image = image::RgbImage::from_pixel(width, height, image::Rgb([255, 255, 255]));
    png_bytes(image::DynamicImage::ImageRgb8(image))
}
