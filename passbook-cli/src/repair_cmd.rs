//! `passbook repair`: find a parser configuration that reproduces a bank's
//! reference CSV, and save it.

use anyhow::{Context, Result, bail};
use passbook_core::{Outcome, ProposalSource, RepairLoop, Stage, Table, Validator};
use passbook_ingest::{ParserConfig, StatementParser, Strategy, extractor_for};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::write_parser_config;

/// Sample statement and reference table for one bank.
#[derive(Debug, Clone)]
pub struct SampleSet {
    pub statement: PathBuf,
    pub reference: PathBuf,
}

impl SampleSet {
    /// `<data_dir>/<bank>/<bank>_sample.{pdf,txt}` and `<bank>_sample.csv`.
    pub fn locate(data_dir: &Path, bank: &str) -> Result<Self> {
        let dir = data_dir.join(bank);
        let reference = dir.join(format!("{}_sample.csv", bank));

        let statement = ["pdf", "txt"]
            .iter()
            .map(|ext| dir.join(format!("{}_sample.{}", bank, ext)))
            .find(|p| p.exists());

        let Some(statement) = statement else {
            bail!(
                "no sample statement for {:?} (expected {}/{}_sample.pdf)",
                bank,
                dir.display(),
                bank
            );
        };
        if !reference.exists() {
            bail!("reference CSV not found: {}", reference.display());
        }

        Ok(Self {
            statement,
            reference,
        })
    }
}

/// The configured parser first, then the same settings with the other strategy.
pub struct ConfigProposals {
    candidates: Vec<ParserConfig>,
}

impl ConfigProposals {
    pub fn from_base(base: &ParserConfig) -> Self {
        let other = match base.strategy {
            Strategy::BalanceDelta => Strategy::Keywords,
            Strategy::Keywords => Strategy::BalanceDelta,
        };
        let alternate = ParserConfig {
            strategy: other,
            ..base.clone()
        };
        Self {
            candidates: vec![base.clone(), alternate],
        }
    }
}

impl ProposalSource for ConfigProposals {
    type Proposal = ParserConfig;

    fn propose(&mut self, attempt: u32) -> Option<ParserConfig> {
        let idx = usize::try_from(attempt).ok()?.checked_sub(1)?;
        self.candidates.get(idx).cloned()
    }
}

/// Parses the sample statement and compares it with the reference CSV.
pub struct ReferenceValidator {
    samples: SampleSet,
    reference_csv: String,
}

impl ReferenceValidator {
    pub fn new(samples: SampleSet) -> Result<Self> {
        let reference_csv = fs::read_to_string(&samples.reference)
            .with_context(|| format!("read {}", samples.reference.display()))?;
        Ok(Self {
            samples,
            reference_csv,
        })
    }
}

impl Validator<ParserConfig> for ReferenceValidator {
    fn validate(&mut self, proposal: &ParserConfig) -> std::result::Result<(), String> {
        let parser = StatementParser::new(proposal.clone()).map_err(|e| e.to_string())?;
        let extractor = extractor_for(&self.samples.statement, &parser.pdf_extractor());
        let actual = parser
            .parse_document(&self.samples.statement, extractor.as_ref())
            .map_err(|e| e.to_string())?;
        let expected = Table::read_csv(self.reference_csv.as_bytes(), &proposal.schema)
            .map_err(|e| e.to_string())?;

        let diff = actual.compare(&expected);
        if diff.is_match() {
            Ok(())
        } else {
            Err(diff.to_string())
        }
    }
}

#[derive(Debug)]
pub struct RepairReport {
    pub written: PathBuf,
    pub attempts: u32,
    pub trace: Vec<Stage>,
}

pub fn run_repair(
    bank: &str,
    base: &ParserConfig,
    data_dir: &Path,
    out_dir: &Path,
    max_attempts: u32,
) -> Result<RepairReport> {
    let samples = SampleSet::locate(data_dir, bank)?;
    info!(statement = %samples.statement.display(), reference = %samples.reference.display(), "repairing parser");

    let mut proposals = ConfigProposals::from_base(base);
    let mut validator = ReferenceValidator::new(samples)?;
    let mut repair = RepairLoop::new(max_attempts);

    match repair.run(&mut proposals, &mut validator) {
        Outcome::Accepted { proposal, attempts } => {
            let written = out_dir.join(format!("{}.toml", bank));
            write_parser_config(&proposal, &written)?;
            Ok(RepairReport {
                written,
                attempts,
                trace: repair.trace().to_vec(),
            })
        }
        Outcome::Failed { attempts, reason } => {
            bail!("no parser for {:?} after {} attempt(s): {}", bank, attempts, reason)
        }
    }
}
