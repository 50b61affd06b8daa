//! Target table schema: column names, order and value kinds.
//!
//! The schema is always injected by the caller (config file or code). The parser
//! never infers it from a sample file.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{Result, StatementError};

/// Transaction field carried by a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    Date,
    Description,
    Debit,
    Credit,
    Balance,
}

impl Field {
    /// The only value kind a column carrying this field may declare.
    pub fn kind(self) -> ColumnKind {
        match self {
            Field::Date | Field::Description => ColumnKind::Text,
            Field::Debit | Field::Credit | Field::Balance => ColumnKind::Float,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Text,
    Float,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub field: Field,
    pub kind: ColumnKind,
}

impl Column {
    pub fn new(name: impl Into<String>, field: Field, kind: ColumnKind) -> Self {
        Self {
            name: name.into(),
            field,
            kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    pub columns: Vec<Column>,
}

impl Default for TableSchema {
    /// `Date, Description, Debit Amt, Credit Amt, Balance`
    fn default() -> Self {
        Self {
            columns: vec![
                Column::new("Date", Field::Date, ColumnKind::Text),
                Column::new("Description", Field::Description, ColumnKind::Text),
                Column::new("Debit Amt", Field::Debit, ColumnKind::Float),
                Column::new("Credit Amt", Field::Credit, ColumnKind::Float),
                Column::new("Balance", Field::Balance, ColumnKind::Float),
            ],
        }
    }
}

impl TableSchema {
    /// Build a schema, rejecting it if it is not usable.
    pub fn new(columns: Vec<Column>) -> Result<Self> {
        let schema = Self { columns };
        schema.validate()?;
        Ok(schema)
    }

    pub fn validate(&self) -> Result<()> {
        if self.columns.is_empty() {
            return Err(StatementError::schema("schema has no columns"));
        }

        let mut seen = HashSet::new();
        for col in &self.columns {
            if !seen.insert(col.name.as_str()) {
                return Err(StatementError::schema(format!(
                    "duplicate column name {:?}",
                    col.name
                )));
            }
            if col.kind != col.field.kind() {
                return Err(StatementError::schema(format!(
                    "column {:?} carries {:?} and must be {:?}, not {:?}",
                    col.name,
                    col.field,
                    col.field.kind(),
                    col.kind
                )));
            }
        }

        Ok(())
    }

    pub fn names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_schema_order() {
        let schema = TableSchema::default();
        assert_eq!(
            schema.names(),
            vec!["Date", "Description", "Debit Amt", "Credit Amt", "Balance"]
        );
        assert!(schema.validate().is_ok());
        assert_eq!(schema.position("Credit Amt"), Some(3));
    }

    #[test]
    fn test_rejects_duplicate_names() {
        let err = TableSchema::new(vec![
            Column::new("Amount", Field::Debit, ColumnKind::Float),
            Column::new("Amount", Field::Credit, ColumnKind::Float),
        ])
        .unwrap_err();
        assert!(matches!(err, StatementError::SchemaMismatch(_)));
    }

    #[test]
    fn test_rejects_wrong_kind() {
        let err = TableSchema::new(vec![Column::new("Balance", Field::Balance, ColumnKind::Text)])
            .unwrap_err();
        assert!(err.to_string().contains("Balance"));
    }

    #[test]
    fn test_rejects_empty() {
        assert!(TableSchema::new(vec![]).is_err());
    }

    #[test]
    fn test_subset_in_custom_order_is_valid() {
        let schema = TableSchema::new(vec![
            Column::new("Balance", Field::Balance, ColumnKind::Float),
            Column::new("When", Field::Date, ColumnKind::Text),
        ])
        .unwrap();
        assert_eq!(schema.names(), vec!["Balance", "When"]);
    }

    #[test]
    fn test_schema_from_toml() {
        let src = r#"
[[columns]]
name = "Txn Date"
field = "date"
kind = "text"

[[columns]]
name = "Closing"
field = "balance"
kind = "float"
"#;
        let schema: TableSchema = toml::from_str(src).unwrap();
        schema.validate().unwrap();
        assert_eq!(schema.columns[1].field, Field::Balance);
    }
}
