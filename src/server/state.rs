use crate::catalog::FontDirectory;
use crate::ocr::OcrEngine;
use crate::pipeline::FontIdentifier;

pub(crate) struct ServerState<E: OcrEngine, D: FontDirectory> {
    pub(crate) identifier: FontIdentifier<E, D>,
}
