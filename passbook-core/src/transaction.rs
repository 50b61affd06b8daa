//! Transaction records produced by the two parsing passes.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// The date token of a transaction line.
///
/// A token with the right shape that is not a calendar date (`31-02-2024`) keeps
/// its row and is carried through verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntryDate {
    Calendar(NaiveDate),
    Unparsed(String),
}

impl EntryDate {
    /// Parse `token` with `format`, keeping the raw text when that fails.
    pub fn parse(token: &str, format: &str) -> Self {
        match NaiveDate::parse_from_str(token, format) {
            Ok(date) => EntryDate::Calendar(date),
            Err(_) => EntryDate::Unparsed(token.to_string()),
        }
    }

    pub fn as_calendar(&self) -> Option<NaiveDate> {
        match self {
            EntryDate::Calendar(date) => Some(*date),
            EntryDate::Unparsed(_) => None,
        }
    }
}

impl From<NaiveDate> for EntryDate {
    fn from(date: NaiveDate) -> Self {
        EntryDate::Calendar(date)
    }
}

/// A line provisionally recognized as a transaction (pass 1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateTransaction {
    pub date: EntryDate,
    pub description: String,
    /// Unsigned transaction amount as printed.
    pub amount: f64,
    /// Running balance after this transaction.
    pub balance: f64,
}

/// Which side of the ledger an amount landed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    #[serde(rename = "debit")]
    Debit,
    #[serde(rename = "credit")]
    Credit,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Debit => Side::Credit,
            Side::Credit => Side::Debit,
        }
    }
}

/// A candidate with its amount assigned to exactly one side (pass 2).
///
/// Holding a single `side` + `amount` pair keeps debit and credit mutually
/// exclusive; `debit()` / `credit()` give the column view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedTransaction {
    pub date: EntryDate,
    pub description: String,
    pub side: Side,
    pub amount: f64,
    pub balance: f64,
}

impl ClassifiedTransaction {
    pub fn from_candidate(candidate: CandidateTransaction, side: Side) -> Self {
        Self {
            date: candidate.date,
            description: candidate.description,
            side,
            amount: candidate.amount,
            balance: candidate.balance,
        }
    }

    pub fn debit(&self) -> Option<f64> {
        (self.side == Side::Debit).then_some(self.amount)
    }

    pub fn credit(&self) -> Option<f64> {
        (self.side == Side::Credit).then_some(self.amount)
    }

    pub fn is_debit(&self) -> bool {
        self.side == Side::Debit
    }

    /// Effect on the running balance: credits add, debits subtract.
    pub fn signed_amount(&self) -> f64 {
        match self.side {
            Side::Debit => -self.amount,
            Side::Credit => self.amount,
        }
    }
}
