//! Filter registry
//!
//! Filters are named query operations ("scopes") of a model, grouped so that
//! at most one filter per group is active in a view. Every filter must be
//! registered before it can be used; registration checks the scope, the
//! validators and the caption method against the [`SchemaCatalog`].

use crate::core::error::{ConfigError, FilterError};
use crate::core::messages::{self, Translator};
use crate::core::query::Condition;
use crate::core::schema::{CaptionMethod, ModelSchema, SchemaCatalog, ScopeFn, humanize};
use crate::core::validation::{
    BuiltInValidator, RecordLookup, ValidationChain, ValidationContext, ValidatorRef,
};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Filter arguments, normalized to string keys and string values
pub type FilterArgs = BTreeMap<String, String>;

/// Active filters of a view: group -> filter
pub type ActiveFilters = BTreeMap<String, ActiveFilter>;

/// Normalize arbitrary JSON arguments
///
/// Strings are kept, numbers and booleans are stringified, `null` becomes the
/// empty string and nested values are kept as JSON text. Anything but an
/// object yields no arguments.
pub fn normalize_args(value: &serde_json::Value) -> FilterArgs {
    use serde_json::Value;

    let Value::Object(map) = value else {
        return FilterArgs::new();
    };

    map.iter()
        .map(|(name, value)| {
            let value = match value {
                Value::String(s) => s.clone(),
                Value::Null => String::new(),
                Value::Bool(b) => b.to_string(),
                Value::Number(n) => n.to_string(),
                other => other.to_string(),
            };
            (name.clone(), value)
        })
        .collect()
}

/// The filter currently applied in one group
///
/// Persisted as a single-entry map `{ <scope>: { <arg>: <value> } }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<String, FilterArgs>",
    into = "BTreeMap<String, FilterArgs>"
)]
pub struct ActiveFilter {
    pub scope: String,
    pub args: FilterArgs,
}

impl ActiveFilter {
    pub fn new(scope: impl Into<String>, args: FilterArgs) -> Self {
        Self {
            scope: scope.into(),
            args,
        }
    }

    /// Same scope and every given argument stored with the same value
    pub fn matches(&self, scope: &str, args: &FilterArgs) -> bool {
        self.scope == scope
            && args
                .iter()
                .all(|(name, value)| self.args.get(name) == Some(value))
    }
}

impl TryFrom<BTreeMap<String, FilterArgs>> for ActiveFilter {
    type Error = String;

    fn try_from(map: BTreeMap<String, FilterArgs>) -> Result<Self, Self::Error> {
        let mut entries = map.into_iter();
        match (entries.next(), entries.next()) {
            (Some((scope, args)), None) => Ok(ActiveFilter { scope, args }),
            _ => Err("an active filter must hold exactly one scope".to_string()),
        }
    }
}

impl From<ActiveFilter> for BTreeMap<String, FilterArgs> {
    fn from(filter: ActiveFilter) -> Self {
        BTreeMap::from([(filter.scope, filter.args)])
    }
}

/// How the caption of a filter is produced
#[derive(Clone, Default, Deserialize)]
#[serde(from = "CaptionConfig")]
pub enum CaptionStrategy {
    /// Translated `scope_filters.<model>.<scope>`, falling back to the humanized scope
    #[default]
    Default,
    Literal(String),
    /// A caption method of the model, called with (group, scope, args)
    Method(String),
    Computed(Arc<dyn Fn(&FilterArgs) -> String + Send + Sync>),
}

impl CaptionStrategy {
    pub fn literal(caption: impl Into<String>) -> Self {
        CaptionStrategy::Literal(caption.into())
    }

    pub fn method(name: impl Into<String>) -> Self {
        CaptionStrategy::Method(name.into())
    }

    pub fn computed<F>(f: F) -> Self
    where
        F: Fn(&FilterArgs) -> String + Send + Sync + 'static,
    {
        CaptionStrategy::Computed(Arc::new(f))
    }
}

impl fmt::Debug for CaptionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptionStrategy::Default => f.write_str("Default"),
            CaptionStrategy::Literal(s) => write!(f, "Literal({:?})", s),
            CaptionStrategy::Method(m) => write!(f, "Method({})", m),
            CaptionStrategy::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

/// YAML form: `caption: "Locked"` or `caption: { method: status_caption }`
#[derive(Deserialize)]
#[serde(untagged)]
enum CaptionConfig {
    Literal(String),
    Method { method: String },
}

impl From<CaptionConfig> for CaptionStrategy {
    fn from(config: CaptionConfig) -> Self {
        match config {
            CaptionConfig::Literal(s) => CaptionStrategy::Literal(s),
            CaptionConfig::Method { method } => CaptionStrategy::Method(method),
        }
    }
}

/// Registration input for one filter
///
/// # Example
/// ```rust,ignore
/// registry.register(
///     FilterSpec::new("Order", "date", "between")
///         .args(["start_date", "end_date"])
///         .validate("all_dates"),
/// )?;
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct FilterSpec {
    pub model: String,
    pub group: String,
    #[serde(alias = "operation_name")]
    pub scope: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub validations: Vec<ValidatorRef>,
    #[serde(default)]
    pub caption: CaptionStrategy,
}

impl FilterSpec {
    pub fn new(
        model: impl Into<String>,
        group: impl Into<String>,
        scope: impl Into<String>,
    ) -> Self {
        Self {
            model: model.into(),
            group: group.into(),
            scope: scope.into(),
            args: Vec::new(),
            validations: Vec::new(),
            caption: CaptionStrategy::Default,
        }
    }

    /// Declared argument names, in the order the scope expects them
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn validate(mut self, validator: impl Into<ValidatorRef>) -> Self {
        self.validations.push(validator.into());
        self
    }

    pub fn caption(mut self, caption: CaptionStrategy) -> Self {
        self.caption = caption;
        self
    }
}

#[derive(Clone)]
enum Caption {
    Default,
    Literal(String),
    Method(CaptionMethod),
    Computed(Arc<dyn Fn(&FilterArgs) -> String + Send + Sync>),
}

/// A registered filter; immutable once registered
#[derive(Clone)]
pub struct FilterDefinition {
    model: String,
    model_key: String,
    group: String,
    scope: String,
    arg_names: Vec<String>,
    chain: ValidationChain,
    caption: Caption,
    scope_fn: ScopeFn,
}

impl FilterDefinition {
    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn arg_names(&self) -> &[String] {
        &self.arg_names
    }

    pub fn arity(&self) -> usize {
        self.arg_names.len()
    }

    pub fn validation_chain(&self) -> &ValidationChain {
        &self.chain
    }

    /// Supplied args in declared order; missing ones become empty strings
    pub fn actual_params(&self, args: &FilterArgs) -> Vec<String> {
        self.arg_names
            .iter()
            .map(|name| args.get(name).cloned().unwrap_or_default())
            .collect()
    }

    /// Invoke the scope with the actual params
    pub fn condition(&self, args: &FilterArgs) -> Condition {
        (self.scope_fn)(&self.actual_params(args))
    }
}

impl fmt::Debug for FilterDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterDefinition")
            .field("model", &self.model)
            .field("group", &self.group)
            .field("scope", &self.scope)
            .field("arg_names", &self.arg_names)
            .field("validators", &self.chain.validators())
            .finish()
    }
}

type GroupMap = IndexMap<String, IndexMap<String, Arc<FilterDefinition>>>;

/// Catalogue of allowed filters: model -> group -> scope
pub struct FilterRegistry {
    catalog: Arc<SchemaCatalog>,
    translator: Arc<dyn Translator>,
    records: Option<Arc<dyn RecordLookup>>,
    filters: IndexMap<String, GroupMap>,
}

impl FilterRegistry {
    pub fn new(catalog: Arc<SchemaCatalog>, translator: Arc<dyn Translator>) -> Self {
        Self {
            catalog,
            translator,
            records: None,
            filters: IndexMap::new(),
        }
    }

    /// Lookup used by the `record_existence` validator
    pub fn with_records(mut self, records: Arc<dyn RecordLookup>) -> Self {
        self.records = Some(records);
        self
    }

    pub fn catalog(&self) -> &SchemaCatalog {
        &self.catalog
    }

    pub fn translator(&self) -> &dyn Translator {
        self.translator.as_ref()
    }

    /// Register a filter; an existing (model, group, scope) is replaced
    pub fn register(&mut self, spec: FilterSpec) -> Result<(), ConfigError> {
        let catalog = Arc::clone(&self.catalog);
        let schema = catalog.model(&spec.model)?;

        let scope_fn = schema
            .scope_fn(&spec.scope)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownScope {
                model: spec.model.clone(),
                group: spec.group.clone(),
                scope: spec.scope.clone(),
            })?;

        let validators = spec
            .validations
            .iter()
            .map(|v| {
                if matches!(v, ValidatorRef::BuiltIn(BuiltInValidator::RecordExistence))
                    && self.records.is_none()
                {
                    return Err(ConfigError::MissingRecordLookup {
                        model: spec.model.clone(),
                        scope: spec.scope.clone(),
                    });
                }
                v.resolve(schema)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let caption = resolve_caption(schema, &spec.caption)?;

        let definition = FilterDefinition {
            model: spec.model.clone(),
            model_key: schema.key(),
            group: spec.group.clone(),
            scope: spec.scope.clone(),
            arg_names: spec.args.clone(),
            chain: ValidationChain::new(validators),
            caption,
            scope_fn,
        };

        let previous = self
            .filters
            .entry(spec.model.clone())
            .or_default()
            .entry(spec.group.clone())
            .or_default()
            .insert(spec.scope.clone(), Arc::new(definition));

        if previous.is_some() {
            tracing::warn!(
                model = %spec.model,
                group = %spec.group,
                scope = %spec.scope,
                "replacing previously registered filter"
            );
        } else {
            tracing::debug!(model = %spec.model, group = %spec.group, scope = %spec.scope, "registered filter");
        }

        Ok(())
    }

    pub fn lookup(
        &self,
        model: &str,
        group: &str,
        scope: &str,
    ) -> Result<&FilterDefinition, FilterError> {
        self.filters
            .get(model)
            .and_then(|groups| groups.get(group))
            .and_then(|scopes| scopes.get(scope))
            .map(Arc::as_ref)
            .ok_or_else(|| FilterError::NotRegistered {
                model: model.to_string(),
                group: group.to_string(),
                scope: scope.to_string(),
            })
    }

    pub fn is_registered(&self, model: &str, group: &str, scope: &str) -> bool {
        self.lookup(model, group, scope).is_ok()
    }

    pub fn arg_count(&self, model: &str, group: &str, scope: &str) -> Result<usize, FilterError> {
        self.lookup(model, group, scope).map(FilterDefinition::arity)
    }

    pub fn matching_arity(&self, model: &str, group: &str, scope: &str, given: usize) -> bool {
        self.arg_count(model, group, scope)
            .map(|expected| expected == given)
            .unwrap_or(false)
    }

    /// Group names of a model, in registration order
    pub fn groups(&self, model: &str) -> Vec<&str> {
        self.filters
            .get(model)
            .map(|groups| groups.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Filters of one group, in registration order
    pub fn group_filters(&self, model: &str, group: &str) -> Vec<&FilterDefinition> {
        self.filters
            .get(model)
            .and_then(|groups| groups.get(group))
            .map(|scopes| scopes.values().map(Arc::as_ref).collect())
            .unwrap_or_default()
    }

    pub fn caption(
        &self,
        model: &str,
        group: &str,
        scope: &str,
        args: &FilterArgs,
    ) -> Result<String, FilterError> {
        let definition = self.lookup(model, group, scope)?;

        Ok(match &definition.caption {
            Caption::Literal(caption) => caption.clone(),
            Caption::Method(method) => method(group, scope, args),
            Caption::Computed(f) => f(args),
            Caption::Default => {
                let params: Vec<(&str, &str)> = args
                    .iter()
                    .map(|(k, v)| (k.as_str(), v.as_str()))
                    .collect();
                self.translator
                    .translate(
                        &format!("scope_filters.{}.{}", definition.model_key, scope),
                        &params,
                    )
                    .unwrap_or_else(|| humanize(scope))
            }
        })
    }

    pub fn validation_errors(
        &self,
        model: &str,
        group: &str,
        scope: &str,
        args: &FilterArgs,
    ) -> Result<Vec<String>, FilterError> {
        let definition = self.lookup(model, group, scope)?;
        Ok(self.run_chain(definition, args))
    }

    fn run_chain(&self, definition: &FilterDefinition, args: &FilterArgs) -> Vec<String> {
        let ctx = ValidationContext {
            model_key: &definition.model_key,
            scope: &definition.scope,
            translator: self.translator.as_ref(),
            records: self.records.as_deref(),
        };
        definition.chain.run(&ctx, args)
    }

    pub fn actual_params(
        &self,
        model: &str,
        group: &str,
        scope: &str,
        args: &FilterArgs,
    ) -> Result<Vec<String>, FilterError> {
        self.lookup(model, group, scope)
            .map(|definition| definition.actual_params(args))
    }

    /// Full admission check: registered, matching arity, passing validation
    pub fn check(
        &self,
        model: &str,
        group: &str,
        scope: &str,
        args: &FilterArgs,
    ) -> Result<&FilterDefinition, FilterError> {
        let definition = self.lookup(model, group, scope)?;

        if definition.arity() != args.len() {
            return Err(FilterError::ArityMismatch {
                model: model.to_string(),
                group: group.to_string(),
                scope: scope.to_string(),
                expected: definition.arity(),
                given: args.len(),
            });
        }

        let messages = self.run_chain(definition, args);
        if !messages.is_empty() {
            return Err(FilterError::Validation {
                group: group.to_string(),
                messages,
            });
        }

        Ok(definition)
    }

    /// User-facing messages for a rejected filter
    pub fn messages_for(&self, error: &FilterError) -> Vec<String> {
        match error {
            FilterError::NotRegistered {
                model,
                group,
                scope,
            } => vec![self.translator.message(
                messages::FILTER_NOT_REGISTERED,
                &[
                    ("model", model.as_str()),
                    ("group", group.as_str()),
                    ("scope", scope.as_str()),
                ],
            )],
            FilterError::ArityMismatch {
                model,
                group,
                scope,
                expected,
                given,
            } => {
                let expected = expected.to_string();
                let given = given.to_string();
                vec![self.translator.message(
                    messages::NON_MATCHING_ARITY,
                    &[
                        ("model", model.as_str()),
                        ("group", group.as_str()),
                        ("scope", scope.as_str()),
                        ("expected", expected.as_str()),
                        ("given", given.as_str()),
                    ],
                )]
            }
            FilterError::Validation { messages, .. } => messages.clone(),
        }
    }

    /// AND together the conditions of all valid active filters
    ///
    /// Every filter is checked again; filters that no longer pass are skipped.
    pub fn apply_filters(&self, model: &str, active: &ActiveFilters) -> Condition {
        let conditions = active.iter().filter_map(|(group, filter)| {
            match self.check(model, group, &filter.scope, &filter.args) {
                Ok(definition) => Some(definition.condition(&filter.args)),
                Err(error) => {
                    tracing::warn!(
                        model = %model,
                        group = %group,
                        scope = %filter.scope,
                        error = %error,
                        "skipping invalid active filter"
                    );
                    None
                }
            }
        });

        Condition::all(conditions)
    }
}

impl fmt::Debug for FilterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterRegistry")
            .field("filters", &self.filters)
            .field("records", &self.records.is_some())
            .finish()
    }
}

fn resolve_caption(schema: &ModelSchema, caption: &CaptionStrategy) -> Result<Caption, ConfigError> {
    Ok(match caption {
        CaptionStrategy::Default => Caption::Default,
        CaptionStrategy::Literal(s) => Caption::Literal(s.clone()),
        CaptionStrategy::Computed(f) => Caption::Computed(f.clone()),
        CaptionStrategy::Method(name) => Caption::Method(
            schema
                .caption_method_fn(name)
                .cloned()
                .ok_or_else(|| ConfigError::UnknownCaptionMethod {
                    model: schema.name().to_string(),
                    method: name.clone(),
                })?,
        ),
    })
}
