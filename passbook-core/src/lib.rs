//! passbook-core: transaction types, target schema, table model and the repair loop

pub mod error;
pub mod repair;
pub mod schema;
pub mod table;
pub mod transaction;

pub use error::{Result, StatementError};
pub use repair::{Outcome, ProposalSource, RepairLoop, Stage, Validator};
pub use schema::{Column, ColumnKind, Field, TableSchema};
pub use table::{Difference, Table, TableDiff, Value, validate_date_format};
pub use transaction::{CandidateTransaction, ClassifiedTransaction, EntryDate, Side};
