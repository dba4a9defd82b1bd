//! EngineBuilder for fluent API to build the engine

use super::engine::{DataTableEngine, ViewBinding};
use crate::config::{DataTableConfig, OptionsConfig, SearchScopeConfig, ViewConfig};
use crate::core::column::{ColumnSpec, Dialect};
use crate::core::error::ConfigError;
use crate::core::filter::{FilterRegistry, FilterSpec};
use crate::core::messages::{MessageCatalog, Translator};
use crate::core::query::Condition;
use crate::core::schema::{ModelSchema, SchemaCatalog, ScopeFn};
use crate::core::sort::SortColumn;
use crate::core::validation::RecordLookup;
use crate::state::{SessionPolicy, StateStore};
use crate::storage::InMemoryStateStore;
use axum::http::HeaderName;
use std::path::Path;
use std::sync::Arc;

/// Builder collecting everything the engine needs at startup
///
/// Nothing is checked until [`build`](Self::build), which registers models,
/// scopes, search scopes, filters and views in that order and fails on the
/// first unknown name.
///
/// # Example
///
/// ```ignore
/// let engine = EngineBuilder::new()
///     .with_config_file("config/datatable.yaml")?
///     .scope("Order", "locked", |_| Condition::new("orders.locked = ?").bind("1"))
///     .with_store(InMemoryStateStore::new())
///     .build()?;
/// ```
pub struct EngineBuilder {
    configs: Vec<DataTableConfig>,
    models: Vec<ModelSchema>,
    scopes: Vec<(String, String, ScopeFn)>,
    search_scopes: Vec<SearchScopeConfig>,
    filters: Vec<FilterSpec>,
    views: Vec<ViewConfig>,
    options: OptionsConfig,
    store: Option<Arc<dyn StateStore>>,
    translator: Option<Arc<dyn Translator>>,
    records: Option<Arc<dyn RecordLookup>>,
}

impl EngineBuilder {
    /// Create a new EngineBuilder
    pub fn new() -> Self {
        Self {
            configs: Vec::new(),
            models: Vec::new(),
            scopes: Vec::new(),
            search_scopes: Vec::new(),
            filters: Vec::new(),
            views: Vec::new(),
            options: OptionsConfig::default(),
            store: None,
            translator: None,
            records: None,
        }
    }

    /// Add a parsed configuration; several configurations are merged in order
    pub fn with_config(mut self, config: DataTableConfig) -> Self {
        self.configs.push(config);
        self
    }

    /// Load and add a YAML configuration file
    pub fn with_config_file(self, path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let config = DataTableConfig::from_yaml_file(path)?;
        Ok(self.with_config(config))
    }

    /// Describe a model in code; scopes defined here are kept
    pub fn model(mut self, model: ModelSchema) -> Self {
        self.models.push(model);
        self
    }

    /// Attach a scope to a model described in code or in configuration
    pub fn scope<F>(mut self, model: impl Into<String>, name: impl Into<String>, scope: F) -> Self
    where
        F: Fn(&[String]) -> Condition + Send + Sync + 'static,
    {
        self.scopes.push((model.into(), name.into(), Arc::new(scope)));
        self
    }

    /// Register a multi-column search as a one-argument scope
    pub fn search_scope(
        mut self,
        model: impl Into<String>,
        name: impl Into<String>,
        columns: Vec<ColumnSpec>,
        case_insensitive: bool,
    ) -> Self {
        self.search_scopes.push(SearchScopeConfig {
            model: model.into(),
            name: name.into(),
            columns,
            case_insensitive,
        });
        self
    }

    pub fn filter(mut self, filter: FilterSpec) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn view(mut self, view: ViewConfig) -> Self {
        self.views.push(view);
        self
    }

    /// Set the view-state store (defaults to [`InMemoryStateStore`])
    pub fn with_store(mut self, store: impl StateStore + 'static) -> Self {
        self.store = Some(Arc::new(store));
        self
    }

    /// Replace the message catalog; configured messages are then ignored
    pub fn with_translator(mut self, translator: impl Translator + 'static) -> Self {
        self.translator = Some(Arc::new(translator));
        self
    }

    /// Lookup for the `record_existence` validator
    pub fn with_records(mut self, records: impl RecordLookup + 'static) -> Self {
        self.records = Some(Arc::new(records));
        self
    }

    pub fn auto_remove_on_toggle(mut self, enabled: bool) -> Self {
        self.options.auto_remove_on_toggle = Some(enabled);
        self
    }

    pub fn dialect(mut self, dialect: Dialect) -> Self {
        self.options.dialect = Some(dialect);
        self
    }

    pub fn session_header(mut self, header: impl Into<String>) -> Self {
        self.options.session_header = Some(header.into());
        self
    }

    /// Register everything and build the engine
    pub fn build(self) -> Result<DataTableEngine, ConfigError> {
        let config = self
            .configs
            .into_iter()
            .fold(DataTableConfig::default(), DataTableConfig::merge);
        // Options set in code win over configuration files
        let options = config.options.merge(self.options);

        let mut catalog = SchemaCatalog::new().with_dialect(options.dialect());
        for model in &config.models {
            catalog.register(model.to_schema());
        }
        for model in self.models {
            catalog.register(model);
        }

        for (model, name, scope) in self.scopes {
            catalog.register_scope(&model, name, scope)?;
        }

        for search in config.search_scopes.iter().chain(&self.search_scopes) {
            catalog.register_search_scope(
                &search.model,
                search.name.clone(),
                &search.columns,
                search.case_insensitive,
            )?;
        }

        let translator: Arc<dyn Translator> = match self.translator {
            Some(translator) => {
                if !config.messages.is_empty() {
                    tracing::warn!(
                        count = config.messages.len(),
                        "custom translator configured, ignoring configured messages"
                    );
                }
                translator
            }
            None => Arc::new(MessageCatalog::new().with_messages(config.messages)),
        };

        let catalog = Arc::new(catalog);
        let mut registry = FilterRegistry::new(Arc::clone(&catalog), translator);
        if let Some(records) = self.records {
            registry = registry.with_records(records);
        }

        let filters: Vec<FilterSpec> = config.filters.into_iter().chain(self.filters).collect();
        let filter_count = filters.len();
        for filter in filters {
            registry.register(filter)?;
        }

        let views = config
            .views
            .iter()
            .chain(&self.views)
            .map(|view| bind_view(&catalog, view))
            .collect::<Result<Vec<_>, _>>()?;

        let session_header = HeaderName::try_from(options.session_header()).map_err(|_| {
            ConfigError::InvalidHeader {
                header: options.session_header().to_string(),
            }
        })?;

        let policy = SessionPolicy {
            auto_remove_on_toggle: options.auto_remove_on_toggle(),
        };

        tracing::info!(
            models = catalog.model_names().count(),
            filters = filter_count,
            views = views.len(),
            dialect = ?options.dialect(),
            auto_remove_on_toggle = policy.auto_remove_on_toggle,
            "data table engine built"
        );

        let store = self
            .store
            .unwrap_or_else(|| Arc::new(InMemoryStateStore::new()));

        Ok(DataTableEngine::from_builder_components(
            registry,
            store,
            views,
            policy,
            session_header,
        ))
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn bind_view(catalog: &SchemaCatalog, view: &ViewConfig) -> Result<ViewBinding, ConfigError> {
    catalog.model(&view.model)?;

    let default_sort = view
        .default_sort
        .iter()
        .map(|column| {
            catalog
                .qualify(&view.model, column.column())
                .map(|qualified| SortColumn::new(qualified, column.direction()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut binding =
        ViewBinding::new(&view.owner, &view.action, view.model.clone()).with_default_sort(default_sort);
    if let Some(path) = &view.path {
        binding = binding.at(path.clone());
    }
    Ok(binding)
}
