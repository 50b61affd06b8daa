//! passbook-ingest: statement text extraction, transaction line parsing and
//! debit/credit classification.

pub mod classify;
pub mod fonts;
pub mod layout;
pub mod overrides;
pub mod parser;
pub mod parsers;
pub mod pdf;
pub mod types;

pub use fonts::{FontInfo, PageFonts};
pub use overrides::{KeywordOverrides, KeywordRule};
pub use parser::{ParserConfig, StatementParser, Strategy};
pub use pdf::{PdfTextExtractor, PlainTextExtractor, TextExtractor, extractor_for};
pub use types::{ExtractionTolerance, TextFragment};
