//! Per-view filter and sort state
//!
//! State is kept per session and per view. A view is identified by a
//! [`ViewKey`] built from the owner path (e.g. `admin/orders`) and the action
//! name (e.g. `index`). The persisted layout of one view is:
//!
//! ```json
//! { "filters": { "<group>": { "<scope>": { "<arg>": "<value>" } } },
//!   "sort": [ ["<table.column>", "ASC"] ] }
//! ```

pub mod session;

use crate::core::error::StorageError;
use crate::core::filter::ActiveFilters;
use crate::core::sort::SortList;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use session::{SessionPolicy, ViewSession};

/// Identifies one view: `admin/orders` + `index` -> `admin_orders_index`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ViewKey(String);

impl ViewKey {
    pub fn new(owner: &str, action: &str) -> Self {
        Self(format!("{}_{}", owner.replace('/', "_"), action))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ViewKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ViewKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

/// Filters and sort columns of one view
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewState {
    #[serde(default)]
    pub filters: ActiveFilters,
    #[serde(default)]
    pub sort: SortList,
}

impl ViewState {
    /// Empty states are dropped from the store
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty() && self.sort.is_empty()
    }
}

/// Key-value persistence of view states
///
/// Writes are last-writer-wins per (session, view).
pub trait StateStore: Send + Sync {
    fn get(&self, session: &str, key: &ViewKey) -> Result<Option<ViewState>, StorageError>;

    fn set(&self, session: &str, key: &ViewKey, state: ViewState) -> Result<(), StorageError>;

    fn remove(&self, session: &str, key: &ViewKey) -> Result<(), StorageError>;
}
