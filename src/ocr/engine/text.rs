use std::collections::BTreeSet;

use crate::ocr::ExtractionResult;

pub(crate) fn sanitize(raw: &str) -> ExtractionResult {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return ExtractionResult {
            raw_text: raw.to_string(),
            sanitized_text: String::new(),
            tokens: BTreeSet::new(),
        };
    }

    let sanitized_text = trimmed
        .lines()
        .map(collapse_whitespace)
        .find(|line| !line.is_empty())
        .unwrap_or_default();
    let tokens = trimmed
        .split_whitespace()
        .map(|token| token.to_string())
        .collect();

    ExtractionResult {
        raw_text: raw.to_string(),
        sanitized_text,
        tokens,
    }
}

fn collapse_whitespace(line: &str) -> String {
    line.split_whitespace().collect::<Vec<_>>().join(" ")
}
