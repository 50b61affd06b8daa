//! Keyword rules layered on top of balance classification, and the keyword-only
//! classification strategy.
//!
//! Rules are explicit configuration. Nothing here matches a hardcoded description.

use passbook_core::{CandidateTransaction, ClassifiedTransaction, Side};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordRule {
    /// Matched case-insensitively anywhere in the description.
    pub keyword: String,
    pub side: Side,
}

impl KeywordRule {
    pub fn new(keyword: impl Into<String>, side: Side) -> Self {
        Self {
            keyword: keyword.into(),
            side,
        }
    }

    fn matches(&self, description_upper: &str) -> bool {
        !self.keyword.is_empty() && description_upper.contains(&self.keyword.to_uppercase())
    }
}

/// Ordered override list. First matching rule wins.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeywordOverrides {
    pub rules: Vec<KeywordRule>,
}

impl KeywordOverrides {
    pub fn new(rules: Vec<KeywordRule>) -> Self {
        Self { rules }
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn side_for(&self, description: &str) -> Option<Side> {
        let upper = description.to_uppercase();
        self.rules.iter().find(|r| r.matches(&upper)).map(|r| r.side)
    }

    /// Move amounts to the side their rule demands. Returns how many rows changed.
    ///
    /// Balances are left alone, so an override can break the balance chain for the
    /// rows it touches.
    pub fn apply(&self, txns: &mut [ClassifiedTransaction]) -> usize {
        if self.rules.is_empty() {
            return 0;
        }

        let mut changed = 0;
        for txn in txns.iter_mut() {
            if let Some(side) = self.side_for(&txn.description) {
                if side != txn.side {
                    debug!(description = %txn.description, ?side, "keyword override");
                    txn.side = side;
                    changed += 1;
                }
            }
        }
        changed
    }
}

/// Credit when the description contains any credit keyword (case-sensitive),
/// debit otherwise. Balances are not consulted.
pub fn classify_by_keywords(
    candidates: Vec<CandidateTransaction>,
    credit_keywords: &[String],
) -> Vec<ClassifiedTransaction> {
    candidates
        .into_iter()
        .map(|c| {
            let is_credit = credit_keywords
                .iter()
                .any(|k| !k.is_empty() && c.description.contains(k.as_str()));
            let side = if is_credit { Side::Credit } else { Side::Debit };
            ClassifiedTransaction::from_candidate(c, side)
        })
        .collect()
}
