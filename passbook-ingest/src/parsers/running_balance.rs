//! Running-balance statement lines (pass 1).
//!
//! Expected extracted-text rows:
//!   01-04-2024 Salary Credit XYZ Pvt Ltd 50000.00 150000.00
//!   02-04-2024 ATM Withdrawal 2000.00 148000.00
//!
//! A row is a date token, a free-text description, the transaction amount and the
//! balance after it. Headers, footers, page furniture and wrapped continuation
//! lines do not start with a date token and are dropped.

use passbook_core::{CandidateTransaction, EntryDate, Result, StatementError};
use regex::Regex;
use tracing::debug;

/// Why a line that looked like a transaction was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    /// Fewer than description + amount + balance tokens after the date.
    TooFewTokens,
    BadAmount,
    BadBalance,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LineOutcome {
    Candidate(CandidateTransaction),
    Discarded(DiscardReason),
    /// Not a transaction line at all.
    Skipped,
}

/// Translate a strftime date format into a token regex.
///
/// Only `%d`, `%m` (two digits) and `%Y` (four digits) are supported; other
/// characters match literally.
pub fn date_token_pattern(format: &str) -> Result<String> {
    let mut pattern = String::new();
    let mut chars = format.chars();
    while let Some(c) = chars.next() {
        if c != '%' {
            pattern.push_str(&regex::escape(c.encode_utf8(&mut [0; 4])));
            continue;
        }
        match chars.next() {
            Some('d') | Some('m') => pattern.push_str(r"\d{2}"),
            Some('Y') => pattern.push_str(r"\d{4}"),
            Some('%') => pattern.push('%'),
            Some(other) => {
                return Err(StatementError::Config(format!(
                    "unsupported specifier %{} in date input format {:?}",
                    other, format
                )));
            }
            None => {
                return Err(StatementError::Config(format!(
                    "dangling % in date input format {:?}",
                    format
                )));
            }
        }
    }
    if pattern.is_empty() {
        return Err(StatementError::Config("date input format is empty".to_string()));
    }
    Ok(pattern)
}

/// Plain ASCII decimal: optional sign, digits, optional fraction. No grouping,
/// no exponent, no `inf`/`nan`.
fn parse_decimal(token: &str, re: &Regex) -> Option<f64> {
    if !re.is_match(token) {
        return None;
    }
    token.parse().ok()
}

#[derive(Debug, Clone)]
pub struct RunningBalanceParser {
    line_re: Regex,
    decimal_re: Regex,
    date_format: String,
}

impl RunningBalanceParser {
    pub fn new(date_format: &str) -> Result<Self> {
        let token = date_token_pattern(date_format)?;
        let line_re = Regex::new(&format!(r"^(?P<date>{})\s+(?P<rest>.*)$", token))
            .map_err(|e| StatementError::Config(e.to_string()))?;
        let decimal_re = Regex::new(r"^[+-]?(?:\d+(?:\.\d*)?|\.\d+)$")
            .map_err(|e| StatementError::Config(e.to_string()))?;

        Ok(Self {
            line_re,
            decimal_re,
            date_format: date_format.to_string(),
        })
    }

    /// Classify one raw line.
    pub fn parse_line(&self, line: &str) -> LineOutcome {
        let Some(caps) = self.line_re.captures(line.trim()) else {
            return LineOutcome::Skipped;
        };

        let parts: Vec<&str> = caps["rest"].split_whitespace().collect();
        if parts.len() < 3 {
            return LineOutcome::Discarded(DiscardReason::TooFewTokens);
        }

        let n = parts.len();
        let Some(balance) = parse_decimal(parts[n - 1], &self.decimal_re) else {
            return LineOutcome::Discarded(DiscardReason::BadBalance);
        };
        let Some(amount) = parse_decimal(parts[n - 2], &self.decimal_re) else {
            return LineOutcome::Discarded(DiscardReason::BadAmount);
        };

        LineOutcome::Candidate(CandidateTransaction {
            date: EntryDate::parse(&caps["date"], &self.date_format),
            description: parts[..n - 2].join(" "),
            amount,
            balance,
        })
    }

    /// Pass 1: candidates in document order.
    pub fn extract<'a>(&self, lines: impl IntoIterator<Item = &'a str>) -> Vec<CandidateTransaction> {
        let mut out = Vec::new();

        for line in lines {
            match self.parse_line(line) {
                LineOutcome::Candidate(c) => out.push(c),
                LineOutcome::Discarded(reason) => {
                    debug!(?reason, line = line.trim(), "discarding malformed transaction line");
                }
                LineOutcome::Skipped => {}
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn parser() -> RunningBalanceParser {
        RunningBalanceParser::new("%d-%m-%Y").unwrap()
    }

    #[test]
    fn test_default_pattern_shape() {
        let re = Regex::new(&format!("^{}$", date_token_pattern("%d-%m-%Y").unwrap())).unwrap();
        assert!(re.is_match("01-04-2024"));
        assert!(!re.is_match("1-4-2024"));
        assert!(!re.is_match("01/04/2024"));
        assert!(date_token_pattern("%b %d").is_err());
        assert!(date_token_pattern("%d-%").is_err());
    }

    #[test]
    fn test_parses_salary_line() {
        let out = parser().parse_line("  01-04-2024 Salary Credit XYZ Pvt Ltd 50000.00 150000.00  ");
        let LineOutcome::Candidate(c) = out else {
            panic!("expected candidate, got {:?}", out);
        };
        assert_eq!(c.date, EntryDate::from(NaiveDate::from_ymd_opt(2024, 4, 1).unwrap()));
        assert_eq!(c.description, "Salary Credit XYZ Pvt Ltd");
        assert_eq!(c.amount, 50000.0);
        assert_eq!(c.balance, 150000.0);
    }

    #[test]
    fn test_collapses_whitespace_in_description() {
        let out = parser().parse_line("05-04-2024 UPI\tPayment   Swiggy 450.50 99549.50");
        let LineOutcome::Candidate(c) = out else { panic!() };
        assert_eq!(c.description, "UPI Payment Swiggy");
    }

    #[test]
    fn test_too_few_tokens() {
        assert_eq!(
            parser().parse_line("01-04-2024 150000.00"),
            LineOutcome::Discarded(DiscardReason::TooFewTokens)
        );
        assert_eq!(
            parser().parse_line("01-04-2024 Opening Balance 150000.00"),
            LineOutcome::Discarded(DiscardReason::BadAmount)
        );
    }

    #[test]
    fn test_non_numeric_balance() {
        assert_eq!(
            parser().parse_line("01-04-2024 Fee Reversal N/A"),
            LineOutcome::Discarded(DiscardReason::BadBalance)
        );
    }

    #[test]
    fn test_rejects_grouped_and_exotic_numbers() {
        for line in [
            "01-04-2024 Rent 1,000.00 5000.00",
            "01-04-2024 Rent 1e3 5000.00",
            "01-04-2024 Rent inf 5000.00",
            "01-04-2024 Rent NaN 5000.00",
        ] {
            assert_eq!(
                parser().parse_line(line),
                LineOutcome::Discarded(DiscardReason::BadAmount),
                "{}",
                line
            );
        }
        let LineOutcome::Candidate(c) = parser().parse_line("01-04-2024 Adj -12. +.5") else {
            panic!()
        };
        assert_eq!(c.amount, -12.0);
        assert_eq!(c.balance, 0.5);
    }

    #[test]
    fn test_impossible_date_keeps_row() {
        let out = parser().parse_line("31-02-2024 Ghost 1.00 2.00");
        let LineOutcome::Candidate(c) = out else {
            panic!("expected candidate, got {:?}", out);
        };
        assert_eq!(c.date, EntryDate::Unparsed("31-02-2024".to_string()));
        assert_eq!(c.description, "Ghost");
        assert_eq!(c.balance, 2.0);
    }

    #[test]
    fn test_non_transaction_lines_skipped() {
        for line in [
            "",
            "Date Description Amount Balance",
            "ICICI Bank Statement for 01-04-2024 to 30-04-2024",
            "2024-04-01 ISO dated 1.00 2.00",
            "01-04-2024",
            "01-04-2024Salary 1.00 2.00",
        ] {
            assert_eq!(parser().parse_line(line), LineOutcome::Skipped, "{:?}", line);
        }
    }

    #[test]
    fn test_extract_keeps_document_order() {
        let text = "\
Statement of account
01-04-2024 Salary 500.00 1500.00
Page 1 of 2
02-04-2024 Rent 1000.00 500.00
continued text from previous line
03-04-2024 broken
";
        let out = parser().extract(text.lines());
        let descs: Vec<_> = out.iter().map(|c| c.description.as_str()).collect();
        assert_eq!(descs, vec!["Salary", "Rent"]);
    }

    #[test]
    fn test_custom_date_format() {
        let p = RunningBalanceParser::new("%d/%m/%Y").unwrap();
        let LineOutcome::Candidate(c) = p.parse_line("15/04/2024 Interest 12.50 1012.50") else {
            panic!()
        };
        assert_eq!(c.date, EntryDate::from(NaiveDate::from_ymd_opt(2024, 4, 15).unwrap()));
        assert_eq!(p.parse_line("15-04-2024 Interest 12.50 1012.50"), LineOutcome::Skipped);
    }
}
