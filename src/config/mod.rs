//! Configuration loading and management
//!
//! Everything except the scopes themselves (which are code) can be declared in
//! YAML:
//!
//! ```yaml
//! options:
//!   auto_remove_on_toggle: true
//!   dialect: mysql
//! models:
//!   - name: Order
//!     table: orders
//!     columns: [id, reference, total, created_at, customer_id]
//!     associations: { customer: Customer }
//! search_scopes:
//!   - model: Order
//!     name: full_text
//!     columns: [reference, { customer: [name, email] }]
//! filters:
//!   - model: Order
//!     group: quick_search
//!     scope: full_text
//!     args: [text]
//!     validations: [all_present]
//! views:
//!   - path: /orders
//!     owner: orders
//!     action: index
//!     model: Order
//!     default_sort: [[created_at, DESC]]
//! messages:
//!   scope_filters.order.full_text: "Search: %{text}"
//! ```

use crate::core::column::{ColumnSpec, Dialect};
use crate::core::error::ConfigError;
use crate::core::filter::FilterSpec;
use crate::core::schema::ModelSchema;
use crate::core::sort::SortColumn;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Header carrying the session id when nothing else is configured
pub const DEFAULT_SESSION_HEADER: &str = "x-data-table-session";

/// Engine switches; unset values fall back to the defaults
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_remove_on_toggle: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dialect: Option<Dialect>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_header: Option<String>,
}

impl OptionsConfig {
    pub fn auto_remove_on_toggle(&self) -> bool {
        self.auto_remove_on_toggle.unwrap_or(false)
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect.unwrap_or_default()
    }

    pub fn session_header(&self) -> &str {
        self.session_header.as_deref().unwrap_or(DEFAULT_SESSION_HEADER)
    }

    /// Values set in `other` win
    pub fn merge(self, other: OptionsConfig) -> Self {
        Self {
            auto_remove_on_toggle: other.auto_remove_on_toggle.or(self.auto_remove_on_toggle),
            dialect: other.dialect.or(self.dialect),
            session_header: other.session_header.or(self.session_header),
        }
    }
}

/// Schema of one model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub name: String,
    pub table: String,

    #[serde(default)]
    pub columns: Vec<String>,

    /// association name -> model name
    #[serde(default)]
    pub associations: IndexMap<String, String>,
}

impl ModelConfig {
    pub fn to_schema(&self) -> ModelSchema {
        self.associations.iter().fold(
            ModelSchema::new(&self.name, &self.table).columns(self.columns.iter().cloned()),
            |schema, (name, model)| schema.association(name, model),
        )
    }
}

/// Multi-column text search registered as a one-argument scope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchScopeConfig {
    pub model: String,
    pub name: String,
    pub columns: Vec<ColumnSpec>,

    #[serde(default = "default_case_insensitive")]
    pub case_insensitive: bool,
}

fn default_case_insensitive() -> bool {
    true
}

/// A view bound to a request path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewConfig {
    /// Request path, e.g. `/orders` or `/customers/{id}/orders`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Owner path, e.g. `admin/orders`
    pub owner: String,
    pub action: String,
    pub model: String,

    /// Sort columns published while nothing is stored
    #[serde(default)]
    pub default_sort: Vec<SortColumn>,
}

/// Complete configuration of the engine
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DataTableConfig {
    #[serde(default)]
    pub options: OptionsConfig,

    #[serde(default)]
    pub models: Vec<ModelConfig>,

    #[serde(default)]
    pub search_scopes: Vec<SearchScopeConfig>,

    #[serde(default)]
    pub filters: Vec<FilterSpec>,

    #[serde(default)]
    pub views: Vec<ViewConfig>,

    /// Message templates (key -> template with `%{name}` placeholders)
    #[serde(default)]
    pub messages: BTreeMap<String, String>,
}

impl DataTableConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.display().to_string(),
            });
        }

        let content = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError {
            file: Some(path.display().to_string()),
            message: e.to_string(),
        })
    }

    /// Load configuration from a YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Combine two configurations
    ///
    /// Options and messages of `other` win, all lists are concatenated.
    pub fn merge(mut self, other: DataTableConfig) -> Self {
        self.options = self.options.merge(other.options);
        self.models.extend(other.models);
        self.search_scopes.extend(other.search_scopes);
        self.filters.extend(other.filters);
        self.views.extend(other.views);
        self.messages.extend(other.messages);
        self
    }
}
