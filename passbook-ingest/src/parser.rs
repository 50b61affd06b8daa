//! The statement parsing pipeline: text → candidates → classified rows → table.

use passbook_core::{
    CandidateTransaction, ClassifiedTransaction, Result, StatementError, Table, TableSchema,
    validate_date_format,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::classify::classify_by_balance;
use crate::overrides::{KeywordOverrides, classify_by_keywords};
use crate::parsers::running_balance::RunningBalanceParser;
use crate::pdf::{PdfTextExtractor, TextExtractor};
use crate::types::ExtractionTolerance;

/// How pass 2 assigns debit and credit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Falling balance is a debit, anything else a credit.
    #[default]
    BalanceDelta,
    /// Credit keywords in the description decide.
    Keywords,
}

/// Everything a parse depends on. Passed in explicitly; nothing is read from
/// sample files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Format of the leading date token, e.g. `%d-%m-%Y`.
    pub date_input_format: String,
    /// Format of the rendered date column, e.g. `%d/%m/%Y`.
    pub date_output_format: String,
    pub parallel_pages: bool,
    pub strategy: Strategy,
    /// Used by `Strategy::Keywords`.
    pub credit_keywords: Vec<String>,
    /// Treat a statement without transaction lines as an error.
    pub require_rows: bool,
    pub tolerance: ExtractionTolerance,
    pub schema: TableSchema,
    pub overrides: KeywordOverrides,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            date_input_format: "%d-%m-%Y".to_string(),
            date_output_format: "%d/%m/%Y".to_string(),
            parallel_pages: false,
            strategy: Strategy::BalanceDelta,
            credit_keywords: vec!["Credit".to_string(), "Deposit".to_string()],
            require_rows: false,
            tolerance: ExtractionTolerance::REFERENCE,
            schema: TableSchema::default(),
            overrides: KeywordOverrides::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StatementParser {
    config: ParserConfig,
    lines: RunningBalanceParser,
}

impl StatementParser {
    /// Validate the configuration and build a parser.
    pub fn new(config: ParserConfig) -> Result<Self> {
        config.schema.validate()?;
        validate_date_format(&config.date_output_format)?;
        let lines = RunningBalanceParser::new(&config.date_input_format)?;
        if config.tolerance.x < 0.0 || config.tolerance.y < 0.0 {
            return Err(StatementError::Config(format!(
                "extraction tolerances must not be negative: {:?}",
                config.tolerance
            )));
        }
        Ok(Self { config, lines })
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Pass 1.
    pub fn candidates(&self, text: &str) -> Vec<CandidateTransaction> {
        self.lines.extract(text.lines())
    }

    /// Pass 2, then keyword overrides.
    pub fn classify(&self, candidates: Vec<CandidateTransaction>) -> Vec<ClassifiedTransaction> {
        let mut txns = match self.config.strategy {
            Strategy::BalanceDelta => classify_by_balance(candidates),
            Strategy::Keywords => classify_by_keywords(candidates, &self.config.credit_keywords),
        };
        self.config.overrides.apply(&mut txns);
        txns
    }

    pub fn transactions(&self, text: &str) -> Vec<ClassifiedTransaction> {
        self.classify(self.candidates(text))
    }

    /// Parse already-extracted text into a table conforming to the schema.
    pub fn parse_text(&self, text: &str) -> Result<Table> {
        let txns = self.transactions(text);
        if txns.is_empty() && self.config.require_rows {
            return Err(StatementError::EmptyDocument);
        }

        let table = Table::from_transactions(
            &self.config.schema,
            &txns,
            &self.config.date_output_format,
        )?;
        table.ensure_conforms(&self.config.schema)?;

        let debits = txns.iter().filter(|t| t.is_debit()).count();
        info!(
            rows = table.len(),
            debits,
            credits = txns.len() - debits,
            "parsed statement"
        );
        Ok(table)
    }

    /// Parse page texts in page order.
    pub fn parse_pages(&self, pages: &[String]) -> Result<Table> {
        self.parse_text(&pages.join("\n"))
    }

    pub fn parse_document(&self, path: &Path, extractor: &dyn TextExtractor) -> Result<Table> {
        let pages = extractor.extract_pages(path)?;
        info!(path = %path.display(), pages = pages.len(), "extracted text");
        self.parse_pages(&pages)
    }

    /// Parse a PDF with the configured tolerances.
    pub fn parse_pdf(&self, path: &Path) -> Result<Table> {
        self.parse_document(path, &self.pdf_extractor())
    }

    pub fn pdf_extractor(&self) -> PdfTextExtractor {
        PdfTextExtractor::new(self.config.tolerance).parallel(self.config.parallel_pages)
    }
}
