//! Column reference resolution
//!
//! A column specification describes where a search or filter should look:
//!
//! - a plain column of the model (`"email"`)
//! - a list of columns concatenated with a space (`["first_name", "last_name"]`)
//! - columns of an associated model (`{"customer": ["name"]}`), which also
//!   records the association as a required join
//!
//! Resolution happens once, at registration time, against the
//! [`SchemaCatalog`](super::schema::SchemaCatalog). Any unknown name is a
//! [`ConfigError`].

use crate::core::error::ConfigError;
use crate::core::schema::{ModelSchema, SchemaCatalog};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A single column specification
///
/// # YAML forms
/// ```yaml
/// columns:
///   - email                          # plain column
///   - [first_name, last_name]        # CONCAT(TRIM(..), ' ', TRIM(..))
///   - customer: name                 # joined association, one column
///   - customer: [name, [street, city]]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnSpec {
    Column(String),
    Concat(Vec<ColumnSpec>),
    Association(IndexMap<String, AssociationColumns>),
}

/// Columns listed under an association; each one is resolved on its own
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AssociationColumns {
    Many(Vec<ColumnSpec>),
    One(Box<ColumnSpec>),
}

impl AssociationColumns {
    fn as_slice(&self) -> &[ColumnSpec] {
        match self {
            AssociationColumns::Many(specs) => specs,
            AssociationColumns::One(spec) => std::slice::from_ref(spec.as_ref()),
        }
    }
}

impl ColumnSpec {
    /// A plain column of the model being resolved
    pub fn column(name: impl Into<String>) -> Self {
        ColumnSpec::Column(name.into())
    }

    /// Columns concatenated with a single space after trimming each
    pub fn concat<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ColumnSpec::Concat(names.into_iter().map(|n| ColumnSpec::Column(n.into())).collect())
    }

    /// Columns looked up on an associated model
    pub fn association(
        association: impl Into<String>,
        columns: impl IntoIterator<Item = ColumnSpec>,
    ) -> Self {
        let mut map = IndexMap::new();
        map.insert(
            association.into(),
            AssociationColumns::Many(columns.into_iter().collect()),
        );
        ColumnSpec::Association(map)
    }
}

impl From<&str> for ColumnSpec {
    fn from(name: &str) -> Self {
        ColumnSpec::column(name)
    }
}

/// Output of the resolver: qualified expressions plus required joins
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolvedColumns {
    /// Fully-qualified column expressions, in specification order
    pub expressions: Vec<String>,

    /// Association names that must be joined, deduplicated, in first-seen order
    pub joins: Vec<String>,
}

impl ResolvedColumns {
    /// Apply `f` to every expression, keeping the joins
    pub fn map_expressions(self, f: impl Fn(&str) -> String) -> Self {
        Self {
            expressions: self.expressions.iter().map(|e| f(e)).collect(),
            joins: self.joins,
        }
    }
}

/// SQL shim for the one construct that differs between databases
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    Standard,
    #[serde(alias = "mariadb")]
    Mysql,
}

impl Dialect {
    /// Cast an expression to a text type so it can be matched with LIKE
    pub fn cast_text(&self, expression: &str) -> String {
        match self {
            Dialect::Standard => format!("CAST({} AS TEXT)", expression),
            Dialect::Mysql => format!("CAST({} AS CHAR(10000) CHARACTER SET utf8)", expression),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Nesting {
    Root,
    Association,
}

/// Tree-walking resolver over the schema catalog
pub struct ColumnResolver<'a> {
    catalog: &'a SchemaCatalog,
}

impl<'a> ColumnResolver<'a> {
    pub fn new(catalog: &'a SchemaCatalog) -> Self {
        Self { catalog }
    }

    /// Resolve `specs` against `model`
    pub fn resolve(&self, model: &str, specs: &[ColumnSpec]) -> Result<ResolvedColumns, ConfigError> {
        let schema = self.catalog.model(model)?;
        let mut resolved = ResolvedColumns::default();

        for spec in specs {
            self.resolve_spec(schema, spec, Nesting::Root, &mut resolved)?;
        }

        Ok(resolved)
    }

    fn resolve_spec(
        &self,
        schema: &ModelSchema,
        spec: &ColumnSpec,
        nesting: Nesting,
        resolved: &mut ResolvedColumns,
    ) -> Result<(), ConfigError> {
        match spec {
            ColumnSpec::Column(name) => {
                resolved.expressions.push(qualify(schema, name)?);
            }
            ColumnSpec::Concat(parts) => {
                resolved.expressions.push(self.concat(schema, parts)?);
            }
            ColumnSpec::Association(associations) => {
                if nesting == Nesting::Association {
                    return Err(ConfigError::UnsupportedNesting {
                        model: schema.name().to_string(),
                        context: format!(
                            "association chain through '{}'",
                            associations.keys().cloned().collect::<Vec<_>>().join(", ")
                        ),
                    });
                }

                for (association, columns) in associations {
                    let target = self.catalog.associated_model(schema, association)?;
                    if !resolved.joins.contains(association) {
                        resolved.joins.push(association.clone());
                    }
                    for column in columns.as_slice() {
                        self.resolve_spec(target, column, Nesting::Association, resolved)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn concat(&self, schema: &ModelSchema, parts: &[ColumnSpec]) -> Result<String, ConfigError> {
        if parts.is_empty() {
            return Err(ConfigError::UnsupportedNesting {
                model: schema.name().to_string(),
                context: "empty concatenation".to_string(),
            });
        }

        let mut trimmed = Vec::with_capacity(parts.len());
        for part in parts {
            let expression = match part {
                ColumnSpec::Column(name) => qualify(schema, name)?,
                ColumnSpec::Concat(inner) => self.concat(schema, inner)?,
                ColumnSpec::Association(_) => {
                    return Err(ConfigError::UnsupportedNesting {
                        model: schema.name().to_string(),
                        context: "association inside a concatenation".to_string(),
                    });
                }
            };
            trimmed.push(format!("TRIM({})", expression));
        }

        Ok(format!("CONCAT({})", trimmed.join(", ' ', ")))
    }
}

fn qualify(schema: &ModelSchema, column: &str) -> Result<String, ConfigError> {
    if schema.has_column(column) {
        Ok(format!("{}.{}", schema.table(), column))
    } else {
        Err(ConfigError::UnknownColumn {
            table: schema.table().to_string(),
            column: column.to_string(),
        })
    }
}
