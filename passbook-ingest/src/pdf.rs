//! Page text extraction.
//!
//! `PdfTextExtractor` walks each page's content stream with lopdf, places every
//! shown string in default user space (text matrix times the current
//! transformation matrix), and rebuilds lines with the configured tolerances.
//! Strings are decoded and measured through the page's font resources.

use lopdf::content::{Content, Operation};
use lopdf::{Document, Object};
use passbook_core::{Result, StatementError};
use rayon::prelude::*;
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::fonts::{PageFonts, number};
use crate::layout::assemble_lines;
use crate::types::{ExtractionTolerance, TextFragment};

/// Page separator for pre-extracted text (form feed, as `pdftotext` emits).
pub const PAGE_BREAK: char = '\u{0c}';

/// Turns a document into page-ordered plain text.
pub trait TextExtractor: Sync {
    fn extract_pages(&self, path: &Path) -> Result<Vec<String>>;
}

#[derive(Debug, Clone)]
pub struct PdfTextExtractor {
    tolerance: ExtractionTolerance,
    parallel: bool,
}

impl PdfTextExtractor {
    pub fn new(tolerance: ExtractionTolerance) -> Self {
        Self {
            tolerance,
            parallel: false,
        }
    }

    /// Lay out pages on the rayon pool. Page order is kept.
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    fn layout_page(&self, page: &PageSource) -> Result<String> {
        let failed = |reason: String| StatementError::Extraction {
            path: Default::default(),
            reason: format!("page {}: {}", page.number, reason),
        };
        let content = Content::decode(&page.content).map_err(|e| failed(e.to_string()))?;
        let fragments =
            fragments_from_operations(&content.operations, &page.fonts).map_err(failed)?;
        debug!(
            page = page.number,
            fonts = page.fonts.len(),
            fragments = fragments.len(),
            "laid out page"
        );
        Ok(assemble_lines(fragments, self.tolerance).join("\n"))
    }
}

impl Default for PdfTextExtractor {
    fn default() -> Self {
        Self::new(ExtractionTolerance::REFERENCE)
    }
}

/// What layout needs from one page, copied out of the document.
struct PageSource {
    number: u32,
    content: Vec<u8>,
    fonts: PageFonts,
}

impl TextExtractor for PdfTextExtractor {
    fn extract_pages(&self, path: &Path) -> Result<Vec<String>> {
        // The document only lives for this block.
        let pages: Vec<PageSource> = {
            let doc = Document::load(path).map_err(|e| StatementError::extraction(path, e))?;
            doc.get_pages()
                .into_iter()
                .map(|(number, id)| -> Result<PageSource> {
                    let content = doc.get_page_content(id).map_err(|e| {
                        StatementError::extraction(path, format!("page {}: {}", number, e))
                    })?;
                    Ok(PageSource {
                        number,
                        content,
                        fonts: PageFonts::load(&doc, id),
                    })
                })
                .collect::<Result<_>>()?
        };

        let laid_out = |page: &PageSource| {
            self.layout_page(page).map_err(|e| match e {
                StatementError::Extraction { reason, .. } => StatementError::extraction(path, reason),
                other => other,
            })
        };

        if self.parallel {
            pages.par_iter().map(laid_out).collect()
        } else {
            pages.iter().map(laid_out).collect()
        }
    }
}

/// Reads text that was already extracted, one page per form-feed-separated chunk.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn extract_pages(&self, path: &Path) -> Result<Vec<String>> {
        let text = fs::read_to_string(path).map_err(|e| StatementError::extraction(path, e))?;
        Ok(text.split(PAGE_BREAK).map(str::to_string).collect())
    }
}

/// Pick an extractor from the file extension: `.txt` is pre-extracted text,
/// everything else is treated as PDF.
pub fn extractor_for(path: &Path, pdf: &PdfTextExtractor) -> Box<dyn TextExtractor> {
    let is_text = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("txt"));
    if is_text {
        Box::new(PlainTextExtractor)
    } else {
        Box::new(pdf.clone())
    }
}

/// Row-vector affine matrix `[a b c d e f]`.
type Matrix = [f32; 6];

const IDENTITY: Matrix = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

fn translate(m: &Matrix, tx: f32, ty: f32) -> Matrix {
    [m[0], m[1], m[2], m[3], tx * m[0] + ty * m[2] + m[4], tx * m[1] + ty * m[3] + m[5]]
}

/// `a × b`: apply `a`, then `b`.
fn multiply(a: &Matrix, b: &Matrix) -> Matrix {
    [
        a[0] * b[0] + a[1] * b[2],
        a[0] * b[1] + a[1] * b[3],
        a[2] * b[0] + a[3] * b[2],
        a[2] * b[1] + a[3] * b[3],
        a[4] * b[0] + a[5] * b[2] + b[4],
        a[4] * b[1] + a[5] * b[3] + b[5],
    ]
}

/// Graphics and text state. `q`/`Q` save and restore everything except the
/// text and line matrices, which belong to the enclosing `BT`.
#[derive(Debug, Clone)]
struct TextState {
    ctm: Matrix,
    matrix: Matrix,
    line_matrix: Matrix,
    font: Option<Vec<u8>>,
    font_size: f32,
    leading: f32,
    char_spacing: f32,
    word_spacing: f32,
    horizontal_scale: f32,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            ctm: IDENTITY,
            matrix: IDENTITY,
            line_matrix: IDENTITY,
            font: None,
            font_size: 1.0,
            leading: 0.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scale: 1.0,
        }
    }
}

impl TextState {
    fn restore(&mut self, saved: TextState) {
        *self = TextState {
            matrix: self.matrix,
            line_matrix: self.line_matrix,
            ..saved
        };
    }

    fn move_line(&mut self, tx: f32, ty: f32) {
        self.line_matrix = translate(&self.line_matrix, tx, ty);
        self.matrix = self.line_matrix;
    }

    fn next_line(&mut self) {
        let leading = self.leading;
        self.move_line(0.0, -leading);
    }

    /// Place the string at the current position and advance past it.
    fn show(
        &mut self,
        bytes: &[u8],
        fonts: &PageFonts,
        out: &mut Vec<TextFragment>,
    ) -> std::result::Result<(), String> {
        let glyphs = fonts.font(self.font.as_deref()).decode(bytes)?;

        let mut text = String::new();
        let mut advance = 0.0;
        for glyph in &glyphs {
            let word = if glyph.is_space { self.word_spacing } else { 0.0 };
            advance += (glyph.width * self.font_size + self.char_spacing + word) * self.horizontal_scale;
            text.push_str(&glyph.text);
        }

        let placed = multiply(&self.matrix, &self.ctm);
        let width = advance * placed[0].hypot(placed[1]);
        out.push(TextFragment::new(placed[4], placed[5], width, text));
        self.matrix = translate(&self.matrix, advance, 0.0);
        Ok(())
    }

    fn kern(&mut self, thousandths: f32) {
        let tx = -thousandths / 1000.0 * self.font_size * self.horizontal_scale;
        self.matrix = translate(&self.matrix, tx, 0.0);
    }
}

fn numbers<const N: usize>(operands: &[Object]) -> Option<[f32; N]> {
    if operands.len() < N {
        return None;
    }
    let mut out = [0.0; N];
    for (slot, obj) in out.iter_mut().zip(operands) {
        *slot = number(obj)?;
    }
    Some(out)
}

fn string_operand(obj: &Object) -> Option<&[u8]> {
    match obj {
        Object::String(bytes, _) => Some(bytes),
        _ => None,
    }
}

/// Positioned text fragments shown by a content stream, in stream order.
/// Coordinates are in default user space.
pub fn fragments_from_operations(
    operations: &[Operation],
    fonts: &PageFonts,
) -> std::result::Result<Vec<TextFragment>, String> {
    let mut state = TextState::default();
    let mut saved: Vec<TextState> = Vec::new();
    let mut out = Vec::new();

    for op in operations {
        let operands = &op.operands;
        match op.operator.as_str() {
            "q" => saved.push(state.clone()),
            "Q" => {
                if let Some(prev) = saved.pop() {
                    state.restore(prev);
                }
            }
            "cm" => {
                if let Some(m) = numbers::<6>(operands) {
                    state.ctm = multiply(&m, &state.ctm);
                }
            }
            "BT" => {
                state.matrix = IDENTITY;
                state.line_matrix = IDENTITY;
            }
            "Tf" => {
                if let Some(Object::Name(name)) = operands.first() {
                    state.font = Some(name.clone());
                }
                if let Some(size) = operands.get(1).and_then(number) {
                    state.font_size = size;
                }
            }
            "TL" => {
                if let Some([leading]) = numbers::<1>(operands) {
                    state.leading = leading;
                }
            }
            "Tc" => {
                if let Some([spacing]) = numbers::<1>(operands) {
                    state.char_spacing = spacing;
                }
            }
            "Tw" => {
                if let Some([spacing]) = numbers::<1>(operands) {
                    state.word_spacing = spacing;
                }
            }
            "Tz" => {
                if let Some([scale]) = numbers::<1>(operands) {
                    state.horizontal_scale = scale / 100.0;
                }
            }
            "Tm" => {
                if let Some(m) = numbers::<6>(operands) {
                    state.matrix = m;
                    state.line_matrix = m;
                }
            }
            "Td" => {
                if let Some([tx, ty]) = numbers::<2>(operands) {
                    state.move_line(tx, ty);
                }
            }
            "TD" => {
                if let Some([tx, ty]) = numbers::<2>(operands) {
                    state.leading = -ty;
                    state.move_line(tx, ty);
                }
            }
            "T*" => state.next_line(),
            "Tj" => {
                if let Some(bytes) = operands.first().and_then(string_operand) {
                    state.show(bytes, fonts, &mut out)?;
                }
            }
            "'" => {
                state.next_line();
                if let Some(bytes) = operands.first().and_then(string_operand) {
                    state.show(bytes, fonts, &mut out)?;
                }
            }
            "\"" => {
                if let Some([aw, ac]) = numbers::<2>(operands) {
                    state.word_spacing = aw;
                    state.char_spacing = ac;
                }
                state.next_line();
                if let Some(bytes) = operands.get(2).and_then(string_operand) {
                    state.show(bytes, fonts, &mut out)?;
                }
            }
            "TJ" => {
                if let Some(Object::Array(items)) = operands.first() {
                    for item in items {
                        if let Some(bytes) = string_operand(item) {
                            state.show(bytes, fonts, &mut out)?;
                        } else if let Some(k) = number(item) {
                            state.kern(k);
                        }
                    }
                }
            }
            _ => {}
        }
    }

    Ok(out)
}
