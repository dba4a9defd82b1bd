//! Core module containing the filter, sort and query building blocks

pub mod column;
pub mod command;
pub mod error;
pub mod filter;
pub mod messages;
pub mod query;
pub mod schema;
pub mod sort;
pub mod validation;

pub use column::{ColumnSpec, Dialect};
pub use command::{Command, FilterCommand, SortCommand, SortTerm};
pub use error::{ActionError, ConfigError, DataTableError, DataTableResult, FilterError, StorageError};
pub use filter::{ActiveFilter, ActiveFilters, CaptionStrategy, FilterArgs, FilterRegistry, FilterSpec};
pub use messages::{MessageCatalog, Translator};
pub use query::{Condition, SearchCondition};
pub use schema::{ModelSchema, SchemaCatalog};
pub use sort::{SortColumn, SortDirection, SortList};
pub use validation::{BuiltInValidator, RecordLookup, ValidationOutcome, ValidatorRef};
