//! Normalized transaction table, its CSV form, and frame-style comparison.

use chrono::format::{Item, StrftimeItems};
use serde::Serialize;
use std::fmt;
use std::io::{Read, Write};

use crate::error::{Result, StatementError};
use crate::schema::{ColumnKind, Field, TableSchema};
use crate::transaction::{ClassifiedTransaction, EntryDate};

/// Relative / absolute tolerance for float cells (pandas defaults).
const RTOL: f64 = 1e-5;
const ATOL: f64 = 1e-8;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Value {
    Text(String),
    Float(f64),
    /// The side of a transaction that did not apply. Never zero.
    Missing,
}

impl Value {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }

    fn fits(&self, kind: ColumnKind) -> bool {
        match (self, kind) {
            (Value::Text(_), ColumnKind::Text) => true,
            (Value::Float(_) | Value::Missing, ColumnKind::Float) => true,
            _ => false,
        }
    }

    /// Equality with float tolerance.
    pub fn approx_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Float(a), Value::Float(b)) => (a - b).abs() <= ATOL + RTOL * b.abs(),
            (a, b) => a == b,
        }
    }

    fn to_field(&self) -> String {
        match self {
            Value::Text(s) => s.clone(),
            Value::Float(v) => v.to_string(),
            Value::Missing => String::new(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(s) => write!(f, "{:?}", s),
            Value::Float(v) => write!(f, "{}", v),
            Value::Missing => write!(f, "NaN"),
        }
    }
}

/// Reject strftime strings chrono cannot render.
pub fn validate_date_format(format: &str) -> Result<()> {
    if format.trim().is_empty() {
        return Err(StatementError::Config("date format is empty".to_string()));
    }
    if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
        return Err(StatementError::Config(format!(
            "invalid date format {:?}",
            format
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    schema: TableSchema,
    rows: Vec<Vec<Value>>,
}

impl Table {
    /// Zero rows, full column set.
    pub fn empty(schema: TableSchema) -> Self {
        Self {
            schema,
            rows: Vec::new(),
        }
    }

    /// Project classified transactions onto the schema, in input order.
    pub fn from_transactions(
        schema: &TableSchema,
        txns: &[ClassifiedTransaction],
        date_format: &str,
    ) -> Result<Self> {
        schema.validate()?;
        validate_date_format(date_format)?;

        let mut table = Table::empty(schema.clone());
        for txn in txns {
            let mut row = Vec::with_capacity(schema.len());
            for col in &schema.columns {
                let value = match col.field {
                    Field::Date => Value::Text(render_date(txn, date_format)?),
                    Field::Description => Value::Text(txn.description.clone()),
                    Field::Debit => txn.debit().map(Value::Float).unwrap_or(Value::Missing),
                    Field::Credit => txn.credit().map(Value::Float).unwrap_or(Value::Missing),
                    Field::Balance => Value::Float(txn.balance),
                };
                row.push(value);
            }
            table.push_row(row)?;
        }

        Ok(table)
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.schema.position(column)?;
        self.rows.get(row).and_then(|r| r.get(idx))
    }

    pub fn column(&self, name: &str) -> Option<Vec<&Value>> {
        let idx = self.schema.position(name)?;
        Some(self.rows.iter().map(|r| &r[idx]).collect())
    }

    /// Append a row, rejecting it unless every cell fits its column.
    pub fn push_row(&mut self, row: Vec<Value>) -> Result<()> {
        if row.len() != self.schema.len() {
            return Err(StatementError::schema(format!(
                "row has {} cells, schema has {} columns",
                row.len(),
                self.schema.len()
            )));
        }
        for (value, col) in row.iter().zip(&self.schema.columns) {
            if !value.fits(col.kind) {
                return Err(StatementError::schema(format!(
                    "value {} does not fit {:?} column {:?}",
                    value, col.kind, col.name
                )));
            }
        }
        self.rows.push(row);
        Ok(())
    }

    /// Check that this table has exactly the given columns, order and kinds.
    pub fn ensure_conforms(&self, schema: &TableSchema) -> Result<()> {
        if self.schema.names() != schema.names() {
            return Err(StatementError::schema(format!(
                "columns {:?} do not match required {:?}",
                self.schema.names(),
                schema.names()
            )));
        }
        for (ours, theirs) in self.schema.columns.iter().zip(&schema.columns) {
            if ours.kind != theirs.kind {
                return Err(StatementError::schema(format!(
                    "column {:?} is {:?}, required {:?}",
                    ours.name, ours.kind, theirs.kind
                )));
            }
        }
        Ok(())
    }

    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(self.schema.names())?;
        for row in &self.rows {
            wtr.write_record(row.iter().map(Value::to_field))?;
        }
        wtr.flush()?;
        Ok(())
    }

    /// Read a reference CSV typed by `schema`. The header must match exactly.
    pub fn read_csv<R: Read>(reader: R, schema: &TableSchema) -> Result<Table> {
        schema.validate()?;
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(reader);

        let headers: Vec<String> = rdr.headers()?.iter().map(|h| h.to_string()).collect();
        if headers.iter().map(String::as_str).ne(schema.names()) {
            return Err(StatementError::schema(format!(
                "CSV header {:?} does not match required {:?}",
                headers,
                schema.names()
            )));
        }

        let mut table = Table::empty(schema.clone());
        for (i, record) in rdr.records().enumerate() {
            let record = record?;
            let mut row = Vec::with_capacity(schema.len());
            for (raw, col) in record.iter().zip(&schema.columns) {
                let value = match col.kind {
                    ColumnKind::Text => Value::Text(raw.to_string()),
                    ColumnKind::Float => parse_float_cell(raw).ok_or_else(|| {
                        StatementError::schema(format!(
                            "row {}: {:?} is not a number in column {:?}",
                            i + 1,
                            raw,
                            col.name
                        ))
                    })?,
                };
                row.push(value);
            }
            table.push_row(row)?;
        }

        Ok(table)
    }

    /// Compare against an expected table, reporting every difference.
    pub fn compare(&self, expected: &Table) -> TableDiff {
        let mut differences = Vec::new();

        let ours = self.schema.names();
        let theirs = expected.schema.names();
        if ours != theirs {
            differences.push(Difference::Columns {
                actual: ours.iter().map(|s| s.to_string()).collect(),
                expected: theirs.iter().map(|s| s.to_string()).collect(),
            });
            return TableDiff { differences };
        }

        if self.len() != expected.len() {
            differences.push(Difference::RowCount {
                actual: self.len(),
                expected: expected.len(),
            });
        }

        for (i, (a_row, e_row)) in self.rows.iter().zip(&expected.rows).enumerate() {
            for ((a, e), col) in a_row.iter().zip(e_row).zip(&self.schema.columns) {
                if !a.approx_eq(e) {
                    differences.push(Difference::Cell {
                        row: i,
                        column: col.name.clone(),
                        actual: a.clone(),
                        expected: e.clone(),
                    });
                }
            }
        }

        TableDiff { differences }
    }
}

fn render_date(txn: &ClassifiedTransaction, format: &str) -> Result<String> {
    use std::fmt::Write as _;
    let date = match &txn.date {
        EntryDate::Calendar(date) => date,
        EntryDate::Unparsed(raw) => return Ok(raw.clone()),
    };
    let mut out = String::new();
    write!(out, "{}", date.format(format))
        .map_err(|_| StatementError::Config(format!("cannot render date with {:?}", format)))?;
    Ok(out)
}

fn parse_float_cell(raw: &str) -> Option<Value> {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("nan") {
        return Some(Value::Missing);
    }
    raw.parse::<f64>().ok().filter(|v| v.is_finite()).map(Value::Float)
}

#[derive(Debug, Clone, PartialEq)]
pub enum Difference {
    Columns {
        actual: Vec<String>,
        expected: Vec<String>,
    },
    RowCount {
        actual: usize,
        expected: usize,
    },
    Cell {
        row: usize,
        column: String,
        actual: Value,
        expected: Value,
    },
}

impl fmt::Display for Difference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Difference::Columns { actual, expected } => {
                write!(f, "columns differ: got {:?}, expected {:?}", actual, expected)
            }
            Difference::RowCount { actual, expected } => {
                write!(f, "row count differs: got {}, expected {}", actual, expected)
            }
            Difference::Cell {
                row,
                column,
                actual,
                expected,
            } => write!(
                f,
                "row {} column {:?}: got {}, expected {}",
                row, column, actual, expected
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TableDiff {
    pub differences: Vec<Difference>,
}

impl TableDiff {
    pub fn is_match(&self) -> bool {
        self.differences.is_empty()
    }
}

impl fmt::Display for TableDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.differences.is_empty() {
            return write!(f, "tables match");
        }
        writeln!(f, "{} difference(s):", self.differences.len())?;
        for d in &self.differences {
            writeln!(f, "  - {}", d)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Column;
    use crate::transaction::Side;
    use chrono::NaiveDate;

    fn txn(day: u32, desc: &str, side: Side, amount: f64, balance: f64) -> ClassifiedTransaction {
        ClassifiedTransaction {
            date: NaiveDate::from_ymd_opt(2024, 4, day).unwrap().into(),
            description: desc.to_string(),
            side,
            amount,
            balance,
        }
    }

    fn sample() -> Vec<ClassifiedTransaction> {
        vec![
            txn(1, "Salary Credit XYZ Pvt Ltd", Side::Credit, 50000.0, 150000.0),
            txn(2, "Electricity Bill NEFT", Side::Debit, 2500.5, 147499.5),
        ]
    }

    #[test]
    fn test_from_transactions_uses_schema_order_and_date_format() {
        let schema = TableSchema::default();
        let table = Table::from_transactions(&schema, &sample(), "%d/%m/%Y").unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.get(0, "Date"), Some(&Value::Text("01/04/2024".to_string())));
        assert_eq!(table.get(0, "Debit Amt"), Some(&Value::Missing));
        assert_eq!(table.get(0, "Credit Amt"), Some(&Value::Float(50000.0)));
        assert_eq!(table.get(1, "Debit Amt"), Some(&Value::Float(2500.5)));
        assert_eq!(table.get(1, "Credit Amt"), Some(&Value::Missing));
        table.ensure_conforms(&schema).unwrap();
    }

    #[test]
    fn test_custom_schema_projects_subset() {
        let schema = TableSchema::new(vec![
            Column::new("Closing", Field::Balance, ColumnKind::Float),
            Column::new("On", Field::Date, ColumnKind::Text),
        ])
        .unwrap();
        let table = Table::from_transactions(&schema, &sample(), "%Y-%m-%d").unwrap();
        assert_eq!(table.rows()[1], vec![Value::Float(147499.5), Value::Text("2024-04-02".into())]);
    }

    #[test]
    fn test_unparsed_date_rendered_verbatim() {
        let mut txns = sample();
        txns[1].date = EntryDate::Unparsed("31-02-2024".to_string());
        let table = Table::from_transactions(&TableSchema::default(), &txns, "%d/%m/%Y").unwrap();
        assert_eq!(table.get(0, "Date"), Some(&Value::Text("01/04/2024".into())));
        assert_eq!(table.get(1, "Date"), Some(&Value::Text("31-02-2024".into())));
    }

    #[test]
    fn test_invalid_date_format_is_config_error() {
        let err = Table::from_transactions(&TableSchema::default(), &sample(), "%Q").unwrap_err();
        assert!(matches!(err, StatementError::Config(_)));
    }

    #[test]
    fn test_push_row_rejects_misfit_cells() {
        let mut table = Table::empty(TableSchema::default());
        let err = table
            .push_row(vec![
                Value::Text("01/04/2024".into()),
                Value::Text("x".into()),
                Value::Text("oops".into()),
                Value::Missing,
                Value::Float(1.0),
            ])
            .unwrap_err();
        assert!(matches!(err, StatementError::SchemaMismatch(_)));
        assert!(table.is_empty());
    }

    #[test]
    fn test_csv_write_then_read_matches() {
        let schema = TableSchema::default();
        let table = Table::from_transactions(&schema, &sample(), "%d/%m/%Y").unwrap();

        let mut buf = Vec::new();
        table.write_csv(&mut buf).unwrap();
        let text = String::from_utf8(buf.clone()).unwrap();
        assert!(text.starts_with("Date,Description,Debit Amt,Credit Amt,Balance\n"));
        assert!(text.contains("01/04/2024,Salary Credit XYZ Pvt Ltd,,50000,150000\n"));

        let back = Table::read_csv(buf.as_slice(), &schema).unwrap();
        assert!(back.compare(&table).is_match());
    }

    #[test]
    fn test_read_csv_rejects_wrong_header() {
        let csv = "Date,Description,Credit Amt,Debit Amt,Balance\n";
        let err = Table::read_csv(csv.as_bytes(), &TableSchema::default()).unwrap_err();
        assert!(matches!(err, StatementError::SchemaMismatch(_)));
    }

    #[test]
    fn test_read_csv_nan_and_bad_numbers() {
        let schema = TableSchema::default();
        let ok = "Date,Description,Debit Amt,Credit Amt,Balance\n01/04/2024,Fee,NaN,10.0,90.0\n";
        let table = Table::read_csv(ok.as_bytes(), &schema).unwrap();
        assert!(table.get(0, "Debit Amt").unwrap().is_missing());

        let bad = "Date,Description,Debit Amt,Credit Amt,Balance\n01/04/2024,Fee,ten,,90.0\n";
        assert!(Table::read_csv(bad.as_bytes(), &schema).is_err());
    }

    #[test]
    fn test_compare_reports_cells_and_row_count() {
        let schema = TableSchema::default();
        let actual = Table::from_transactions(&schema, &sample(), "%d/%m/%Y").unwrap();

        let mut swapped = sample();
        swapped[0].side = Side::Debit;
        swapped.pop();
        let expected = Table::from_transactions(&schema, &swapped, "%d/%m/%Y").unwrap();

        let diff = actual.compare(&expected);
        assert!(!diff.is_match());
        assert!(diff.differences.contains(&Difference::RowCount { actual: 2, expected: 1 }));
        let cells = diff
            .differences
            .iter()
            .filter(|d| matches!(d, Difference::Cell { .. }))
            .count();
        assert_eq!(cells, 2);
        assert!(diff.to_string().contains("Debit Amt"));
    }

    #[test]
    fn test_float_tolerance() {
        assert!(Value::Float(100000.0).approx_eq(&Value::Float(100000.0000001)));
        assert!(!Value::Float(100.0).approx_eq(&Value::Float(100.5)));
        assert!(!Value::Missing.approx_eq(&Value::Float(0.0)));
    }
}
