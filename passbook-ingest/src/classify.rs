//! Debit/credit classification from the running balance (pass 2).
//!
//! A statement row only carries an unsigned amount and the balance after it, so
//! the side is read off the balance movement: a falling balance is a debit,
//! anything else a credit.

use passbook_core::{CandidateTransaction, ClassifiedTransaction, Side};

/// Balance assumed before the first row.
///
/// If the first balance exceeds its amount the row is taken as a credit
/// (`balance - amount`), otherwise as a debit (`balance + amount`). Only used to
/// bootstrap the comparison; it is never emitted as a row.
pub fn opening_balance(first: &CandidateTransaction) -> f64 {
    if first.balance > first.amount {
        first.balance - first.amount
    } else {
        first.balance + first.amount
    }
}

/// Side for a row given the balance before it.
///
/// An unchanged balance counts as a credit.
pub fn side_for(previous_balance: f64, balance: f64) -> Side {
    if balance < previous_balance {
        Side::Debit
    } else {
        Side::Credit
    }
}

/// Classify candidates in document order.
///
/// The chain always advances on the observed balance of each row, never on a
/// recomputed one.
pub fn classify_by_balance(candidates: Vec<CandidateTransaction>) -> Vec<ClassifiedTransaction> {
    let Some(first) = candidates.first() else {
        return Vec::new();
    };
    let mut previous = opening_balance(first);

    candidates
        .into_iter()
        .map(|c| {
            let side = side_for(previous, c.balance);
            previous = c.balance;
            ClassifiedTransaction::from_candidate(c, side)
        })
        .collect()
}
