use image::{DynamicImage, GrayImage, Luma};
use imageproc::filter::median_filter;

pub const MIN_THRESHOLD: u8 = 128;
pub const MAX_THRESHOLD: u8 = 160;
pub const DEFAULT_THRESHOLD: u8 = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NoiseFilter {
    /// 3x3 median, removes speckle.
    #[default]
    Median,
    Autocontrast,
    Sharpen,
    None,
}

impl NoiseFilter {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "median" => Some(Self::Median),
            "autocontrast" | "contrast" => Some(Self::Autocontrast),
            "sharpen" => Some(Self::Sharpen),
            "none" | "off" => Some(Self::None),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NoiseFilter::Median => "median",
            NoiseFilter::Autocontrast => "autocontrast",
            NoiseFilter::Sharpen => "sharpen",
            NoiseFilter::None => "none",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreprocessOptions {
    pub threshold: u8,
    pub filter: NoiseFilter,
}

impl Default for PreprocessOptions {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            filter: NoiseFilter::default(),
        }
    }
}

pub fn is_valid_threshold(value: i64) -> bool {
    (MIN_THRESHOLD as i64..=MAX_THRESHOLD as i64).contains(&value)
}

/// Turns any decoded image into a same-sized black/white image for OCR.
/// No cropping, rotation or deskewing happens here.
pub fn preprocess(image: &DynamicImage, options: &PreprocessOptions) -> GrayImage {
    let luma = flatten_to_luma(image);
    if luma.width() == 0 || luma.height() == 0 {
        return luma;
    }
    let filtered = match options.filter {
        NoiseFilter::Median => median_filter(&luma, 1, 1),
        NoiseFilter::Autocontrast => contrast_stretch(&luma),
        NoiseFilter::Sharpen => image::imageops::unsharpen(&luma, 1.0, 2),
        NoiseFilter::None => luma,
    };
    binarize(&filtered, options.threshold)
}

fn flatten_to_luma(image: &DynamicImage) -> GrayImage {
    if let DynamicImage::ImageLuma8(gray) = image {
        return gray.clone();
    }

    if image.color().has_alpha() {
        // transparent regions become white paper, not black
        let rgba = image.to_rgba8();
        let (width, height) = rgba.dimensions();
        let mut luma = GrayImage::new(width, height);
        for (x, y, pixel) in rgba.enumerate_pixels() {
            let [r, g, b, a] = pixel.0;
            let alpha = a as f32 / 255.0;
            let r = (r as f32 * alpha + 255.0 * (1.0 - alpha)).round() as u8;
            let g = (g as f32 * alpha + 255.0 * (1.0 - alpha)).round() as u8;
            let b = (b as f32 * alpha + 255.0 * (1.0 - alpha)).round() as u8;
            luma.put_pixel(x, y, Luma([luminance(r, g, b)]));
        }
        return luma;
    }

    let rgb = image.to_rgb8();
    let (width, height) = rgb.dimensions();
    let mut luma = GrayImage::new(width, height);
    for (x, y, pixel) in rgb.enumerate_pixels() {
        let [r, g, b] = pixel.0;
        luma.put_pixel(x, y, Luma([luminance(r, g, b)]));
    }
    luma
}

fn luminance(r: u8, g: u8, b: u8) -> u8 {
    (0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32)
        .round()
        .clamp(0.0, 255.0) as u8
}

fn contrast_stretch(image: &GrayImage) -> GrayImage {
    let mut min = 255u8;
    let mut max = 0u8;
    for pixel in image.pixels() {
        let value = pixel[0];
        min = min.min(value);
        max = max.max(value);
    }

    if max <= min {
        return image.clone();
    }

    let scale = 255.0 / (max as f32 - min as f32);
    let mut output = image.clone();
    for pixel in output.pixels_mut() {
        let value = pixel[0];
        pixel[0] = ((value.saturating_sub(min)) as f32 * scale).round() as u8;
    }
    output
}

fn binarize(image: &GrayImage, threshold: u8) -> GrayImage {
    let mut output = image.clone();
    for pixel in output.pixels_mut() {
        pixel[0] = if pixel[0] < threshold { 0 } else { 255 };
    }
    output
}
