//! Sortable columns
//!
//! The sort key of a view is an ordered list of `(qualified column, direction)`
//! pairs. Insertion order is sort priority and a column appears at most once.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortDirection {
    #[default]
    #[serde(rename = "ASC", alias = "asc")]
    Asc,
    #[serde(rename = "DESC", alias = "desc")]
    Desc,
}

impl SortDirection {
    pub fn toggled(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid sort direction '{0}', expected ASC or DESC")]
pub struct ParseDirectionError(String);

impl FromStr for SortDirection {
    type Err = ParseDirectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ASC" => Ok(SortDirection::Asc),
            "DESC" => Ok(SortDirection::Desc),
            _ => Err(ParseDirectionError(s.to_string())),
        }
    }
}

/// A `(qualified column, direction)` pair, persisted as `["orders.total", "DESC"]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortColumn(String, SortDirection);

impl SortColumn {
    pub fn new(column: impl Into<String>, direction: SortDirection) -> Self {
        Self(column.into(), direction)
    }

    pub fn column(&self) -> &str {
        &self.0
    }

    pub fn direction(&self) -> SortDirection {
        self.1
    }
}

/// Ordered, duplicate-free list of sort columns
///
/// Transitions: toggle (add or remove one column), change direction (in
/// place), set base (collapse to one column), set columns (bulk replace).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<SortColumn>", into = "Vec<SortColumn>")]
pub struct SortList(Vec<SortColumn>);

impl SortList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn columns(&self) -> &[SortColumn] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &SortColumn> {
        self.0.iter()
    }

    fn position(&self, column: &str) -> Option<usize> {
        self.0.iter().position(|c| c.column() == column)
    }

    pub fn direction(&self, column: &str) -> Option<SortDirection> {
        self.position(column).map(|i| self.0[i].direction())
    }

    pub fn contains(&self, column: &str) -> bool {
        self.position(column).is_some()
    }

    /// Remove the column if present, otherwise append it ascending
    ///
    /// Returns whether the column is active afterwards.
    pub fn toggle(&mut self, column: &str) -> bool {
        match self.position(column) {
            Some(index) => {
                self.0.remove(index);
                false
            }
            None => {
                self.0.push(SortColumn::new(column, SortDirection::Asc));
                true
            }
        }
    }

    /// Flip (or set) the direction of an active column; inactive columns are left alone
    ///
    /// Returns whether anything changed.
    pub fn change_direction(&mut self, column: &str, direction: Option<SortDirection>) -> bool {
        let Some(index) = self.position(column) else {
            return false;
        };
        let current = self.0[index].direction();
        let next = direction.unwrap_or_else(|| current.toggled());
        self.0[index] = SortColumn::new(column, next);
        next != current
    }

    /// Make `column` the only sort column
    pub fn set_base(&mut self, column: &str, direction: Option<SortDirection>) {
        self.0 = vec![SortColumn::new(column, direction.unwrap_or_default())];
    }

    /// Replace the whole list; later duplicates of a column are dropped
    pub fn set_columns(&mut self, columns: impl IntoIterator<Item = SortColumn>) {
        let mut list = Vec::new();
        for column in columns {
            if !list.iter().any(|c: &SortColumn| c.column() == column.column()) {
                list.push(column);
            }
        }
        self.0 = list;
    }

    pub fn remove(&mut self, column: &str) -> bool {
        match self.position(column) {
            Some(index) => {
                self.0.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }
}

impl From<Vec<SortColumn>> for SortList {
    fn from(columns: Vec<SortColumn>) -> Self {
        columns.into_iter().collect()
    }
}

impl From<SortList> for Vec<SortColumn> {
    fn from(list: SortList) -> Self {
        list.0
    }
}

impl FromIterator<SortColumn> for SortList {
    fn from_iter<T: IntoIterator<Item = SortColumn>>(iter: T) -> Self {
        let mut list = SortList::new();
        list.set_columns(iter);
        list
    }
}
