mod preprocess;
mod tesseract;
mod text;

pub use preprocess::{
    DEFAULT_THRESHOLD, MAX_THRESHOLD, MIN_THRESHOLD, NoiseFilter, PreprocessOptions,
    is_valid_threshold, preprocess,
};
pub use tesseract::{DEFAULT_LANGUAGE, LATIN_WHITELIST, SINGLE_LINE_PSM, TesseractEngine};

pub(crate) use text::sanitize;
