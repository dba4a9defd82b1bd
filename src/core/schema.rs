//! Explicit schema description used for registration-time checks
//!
//! A [`ModelSchema`] lists what the engine is allowed to know about a data
//! model: its table, its columns, its associations, and the named query
//! operations ("scopes") it exposes as function references. Filters may only
//! point at scopes registered here, so no operation is ever looked up by
//! name through reflection at request time.

use crate::core::column::{ColumnResolver, ColumnSpec, Dialect};
use crate::core::error::ConfigError;
use crate::core::filter::FilterArgs;
use crate::core::query::{Condition, SearchScope};
use crate::core::validation::ValidationOutcome;
use indexmap::{IndexMap, IndexSet};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A named, parameterized query predicate
///
/// Receives the filter arguments ordered as declared at registration.
pub type ScopeFn = Arc<dyn Fn(&[String]) -> Condition + Send + Sync>;

/// A caption method defined on a model, invoked with (group, scope, args)
pub type CaptionMethod = Arc<dyn Fn(&str, &str, &FilterArgs) -> String + Send + Sync>;

/// A validation method defined on a model
pub type ValidationMethod = Arc<dyn Fn(&FilterArgs) -> ValidationOutcome + Send + Sync>;

/// Description of a single data model
#[derive(Clone)]
pub struct ModelSchema {
    name: String,
    table: String,
    columns: IndexSet<String>,
    /// association name -> model name
    associations: IndexMap<String, String>,
    scopes: HashMap<String, ScopeFn>,
    caption_methods: HashMap<String, CaptionMethod>,
    validation_methods: HashMap<String, ValidationMethod>,
}

impl ModelSchema {
    /// Create a model description
    ///
    /// # Example
    /// ```rust,ignore
    /// let order = ModelSchema::new("Order", "orders")
    ///     .columns(["id", "status", "total", "created_at"])
    ///     .association("customer", "Customer")
    ///     .scope("locked", |_| Condition::new("orders.locked = ?").bind("1"));
    /// ```
    pub fn new(name: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            columns: IndexSet::new(),
            associations: IndexMap::new(),
            scopes: HashMap::new(),
            caption_methods: HashMap::new(),
            validation_methods: HashMap::new(),
        }
    }

    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.columns.insert(column.into());
        self
    }

    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns.extend(columns.into_iter().map(Into::into));
        self
    }

    /// Declare an association resolved against another model of the catalog
    pub fn association(mut self, name: impl Into<String>, model: impl Into<String>) -> Self {
        self.associations.insert(name.into(), model.into());
        self
    }

    /// Register a named query operation
    pub fn scope<F>(mut self, name: impl Into<String>, scope: F) -> Self
    where
        F: Fn(&[String]) -> Condition + Send + Sync + 'static,
    {
        self.scopes.insert(name.into(), Arc::new(scope));
        self
    }

    pub fn caption_method<F>(mut self, name: impl Into<String>, method: F) -> Self
    where
        F: Fn(&str, &str, &FilterArgs) -> String + Send + Sync + 'static,
    {
        self.caption_methods.insert(name.into(), Arc::new(method));
        self
    }

    pub fn validation_method<F, R>(mut self, name: impl Into<String>, method: F) -> Self
    where
        F: Fn(&FilterArgs) -> R + Send + Sync + 'static,
        R: Into<ValidationOutcome>,
    {
        self.validation_methods
            .insert(name.into(), Arc::new(move |args| method(args).into()));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.contains(column)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(String::as_str)
    }

    /// Model name behind an association
    pub fn association_model(&self, association: &str) -> Option<&str> {
        self.associations.get(association).map(String::as_str)
    }

    pub fn scope_fn(&self, name: &str) -> Option<&ScopeFn> {
        self.scopes.get(name)
    }

    pub fn has_scope(&self, name: &str) -> bool {
        self.scopes.contains_key(name)
    }

    pub fn caption_method_fn(&self, name: &str) -> Option<&CaptionMethod> {
        self.caption_methods.get(name)
    }

    pub fn validation_method_fn(&self, name: &str) -> Option<&ValidationMethod> {
        self.validation_methods.get(name)
    }

    /// Snake-cased model name, used for translation keys
    pub fn key(&self) -> String {
        underscore(&self.name)
    }

    pub(crate) fn insert_scope(&mut self, name: String, scope: ScopeFn) {
        self.scopes.insert(name, scope);
    }
}

impl fmt::Debug for ModelSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut scopes: Vec<_> = self.scopes.keys().collect();
        scopes.sort();
        f.debug_struct("ModelSchema")
            .field("name", &self.name)
            .field("table", &self.table)
            .field("columns", &self.columns)
            .field("associations", &self.associations)
            .field("scopes", &scopes)
            .finish()
    }
}

/// All models known to the engine
#[derive(Debug, Clone, Default)]
pub struct SchemaCatalog {
    models: IndexMap<String, ModelSchema>,
    dialect: Dialect,
}

impl SchemaCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Register a model; a model with the same name is replaced
    pub fn register(&mut self, model: ModelSchema) {
        if self.models.contains_key(model.name()) {
            tracing::warn!(model = %model.name(), "replacing previously registered model schema");
        }
        self.models.insert(model.name().to_string(), model);
    }

    pub fn model(&self, name: &str) -> Result<&ModelSchema, ConfigError> {
        self.models.get(name).ok_or_else(|| ConfigError::UnknownModel {
            model: name.to_string(),
        })
    }

    fn model_mut(&mut self, name: &str) -> Result<&mut ModelSchema, ConfigError> {
        self.models
            .get_mut(name)
            .ok_or_else(|| ConfigError::UnknownModel {
                model: name.to_string(),
            })
    }

    pub fn model_names(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }

    pub fn find_by_table(&self, table: &str) -> Option<&ModelSchema> {
        self.models.values().find(|m| m.table() == table)
    }

    /// Follow an association of `schema` to its model
    pub fn associated_model(
        &self,
        schema: &ModelSchema,
        association: &str,
    ) -> Result<&ModelSchema, ConfigError> {
        let target = schema
            .association_model(association)
            .ok_or_else(|| ConfigError::UnknownAssociation {
                model: schema.name().to_string(),
                association: association.to_string(),
            })?;
        self.model(target)
    }

    /// Qualify a column of `model` as `table.column`
    ///
    /// An already qualified `table.column` is accepted when the table belongs
    /// to a known model that has the column.
    pub fn qualify(&self, model: &str, column: &str) -> Result<String, ConfigError> {
        if let Some((table, name)) = column.split_once('.') {
            let schema = self
                .find_by_table(table)
                .ok_or_else(|| ConfigError::UnknownColumn {
                    table: table.to_string(),
                    column: name.to_string(),
                })?;
            return if schema.has_column(name) {
                Ok(column.to_string())
            } else {
                Err(ConfigError::UnknownColumn {
                    table: table.to_string(),
                    column: name.to_string(),
                })
            };
        }

        let schema = self.model(model)?;
        if schema.has_column(column) {
            Ok(format!("{}.{}", schema.table(), column))
        } else {
            Err(ConfigError::UnknownColumn {
                table: schema.table().to_string(),
                column: column.to_string(),
            })
        }
    }

    /// Attach a scope to an already registered model
    pub fn register_scope(
        &mut self,
        model: &str,
        name: impl Into<String>,
        scope: ScopeFn,
    ) -> Result<(), ConfigError> {
        self.model_mut(model)?.insert_scope(name.into(), scope);
        Ok(())
    }

    pub fn resolver(&self) -> ColumnResolver<'_> {
        ColumnResolver::new(self)
    }

    /// Register a multi-column text search as a one-argument scope of `model`
    ///
    /// The columns are resolved now; an unknown column fails registration.
    /// Every expression is cast to text for the configured dialect.
    pub fn register_search_scope(
        &mut self,
        model: &str,
        name: impl Into<String>,
        columns: &[ColumnSpec],
        case_insensitive: bool,
    ) -> Result<(), ConfigError> {
        let dialect = self.dialect;
        let resolved = self
            .resolver()
            .resolve(model, columns)?
            .map_expressions(|e| dialect.cast_text(e));
        let search = Arc::new(SearchScope::new(resolved, case_insensitive));
        let name = name.into();

        tracing::debug!(model = %model, scope = %name, columns = search.columns().expressions.len(), "registered search scope");

        let scope: ScopeFn = Arc::new(move |args: &[String]| {
            let text = args.first().map(String::as_str).unwrap_or_default();
            search.condition(text)
        });
        self.model_mut(model)?.insert_scope(name, scope);
        Ok(())
    }
}

/// `OrderItem` -> `order_item`
pub(crate) fn underscore(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for c in name.chars() {
        if c.is_uppercase() {
            if !out.is_empty() && !out.ends_with('_') {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else if c == ':' || c == '-' {
            if !out.ends_with('_') {
                out.push('_');
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// `not_locked` -> `Not Locked`
pub(crate) fn humanize(name: &str) -> String {
    name.split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> SchemaCatalog {
        let mut catalog = SchemaCatalog::new();
        catalog.register(
            ModelSchema::new("Order", "orders")
                .columns(["id", "reference", "total", "customer_id"])
                .association("customer", "Customer")
                .scope("locked", |_| Condition::new("orders.locked = ?").bind("1")),
        );
        catalog.register(ModelSchema::new("Customer", "customers").columns(["id", "name"]));
        catalog
    }

    #[test]
    fn test_qualify_plain_and_qualified() {
        let catalog = catalog();
        assert_eq!(catalog.qualify("Order", "total").unwrap(), "orders.total");
        assert_eq!(catalog.qualify("Order", "customers.name").unwrap(), "customers.name");
        assert!(catalog.qualify("Order", "name").is_err());
        assert!(catalog.qualify("Order", "ghosts.name").is_err());
    }

    #[test]
    fn test_unknown_model() {
        let catalog = catalog();
        assert!(matches!(
            catalog.model("Invoice"),
            Err(ConfigError::UnknownModel { .. })
        ));
    }

    #[test]
    fn test_register_search_scope() {
        let mut catalog = catalog();
        catalog
            .register_search_scope(
                "Order",
                "full_text",
                &[
                    ColumnSpec::column("reference"),
                    ColumnSpec::association("customer", [ColumnSpec::column("name")]),
                ],
                true,
            )
            .unwrap();

        let scope = catalog.model("Order").unwrap().scope_fn("full_text").unwrap();
        let condition = scope(&["Acme".to_string()]);

        assert_eq!(
            condition.sql,
            "(LOWER(CAST(orders.reference AS TEXT)) LIKE ? OR LOWER(CAST(customers.name AS TEXT)) LIKE ?)"
        );
        assert_eq!(condition.binds, vec!["%acme%", "%acme%"]);
        assert_eq!(condition.joins, vec!["customer"]);
    }

    #[test]
    fn test_register_search_scope_unknown_column() {
        let mut catalog = catalog();
        let err = catalog
            .register_search_scope("Order", "full_text", &[ColumnSpec::column("colour")], true)
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownColumn { .. }));
        assert!(!catalog.model("Order").unwrap().has_scope("full_text"));
    }

    #[test]
    fn test_underscore_and_humanize() {
        assert_eq!(underscore("OrderItem"), "order_item");
        assert_eq!(underscore("Admin::User"), "admin_user");
        assert_eq!(humanize("not_locked"), "Not Locked");
    }
}
