//! The engine facade
//!
//! A [`DataTableEngine`] holds everything built at startup: the schema, the
//! filter registry, the state store and the bound views. It is shared behind
//! an `Arc` and hands out [`ViewSession`]s per request.

use crate::context::{self, RequestContext};
use crate::core::column::ColumnSpec;
use crate::core::command::Command;
use crate::core::error::{ConfigError, DataTableResult};
use crate::core::filter::FilterRegistry;
use crate::core::query::{Condition, SearchCondition, build_search_condition};
use crate::core::schema::SchemaCatalog;
use crate::core::sort::{SortColumn, SortList};
use crate::state::{SessionPolicy, StateStore, ViewKey, ViewSession};
use axum::http::HeaderName;
use indexmap::IndexMap;
use std::sync::Arc;

/// A view the engine keeps state for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewBinding {
    /// Request path pattern; `{param}` and `:param` segments match anything
    pub path: Option<String>,
    pub key: ViewKey,
    pub model: String,
    /// Published while the view has no sort columns of its own
    pub default_sort: SortList,
}

impl ViewBinding {
    pub fn new(owner: &str, action: &str, model: impl Into<String>) -> Self {
        Self {
            path: None,
            key: ViewKey::new(owner, action),
            model: model.into(),
            default_sort: SortList::new(),
        }
    }

    pub fn at(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_default_sort(mut self, columns: impl IntoIterator<Item = SortColumn>) -> Self {
        self.default_sort = columns.into_iter().collect();
        self
    }

    pub fn matches_path(&self, path: &str) -> bool {
        let Some(pattern) = &self.path else {
            return false;
        };

        let pattern: Vec<&str> = pattern.split('/').filter(|s| !s.is_empty()).collect();
        let path: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        pattern.len() == path.len()
            && pattern.iter().zip(&path).all(|(expected, actual)| {
                is_placeholder(expected) || expected == actual
            })
    }
}

fn is_placeholder(segment: &str) -> bool {
    segment.starts_with(':') || (segment.starts_with('{') && segment.ends_with('}'))
}

/// Shared engine state
pub struct DataTableEngine {
    registry: Arc<FilterRegistry>,
    store: Arc<dyn StateStore>,
    views: IndexMap<ViewKey, ViewBinding>,
    policy: SessionPolicy,
    session_header: HeaderName,
}

impl DataTableEngine {
    pub(crate) fn from_builder_components(
        registry: FilterRegistry,
        store: Arc<dyn StateStore>,
        views: Vec<ViewBinding>,
        policy: SessionPolicy,
        session_header: HeaderName,
    ) -> Self {
        Self {
            registry: Arc::new(registry),
            store,
            views: views.into_iter().map(|v| (v.key.clone(), v)).collect(),
            policy,
            session_header,
        }
    }

    pub fn registry(&self) -> &FilterRegistry {
        &self.registry
    }

    pub fn catalog(&self) -> &SchemaCatalog {
        self.registry.catalog()
    }

    pub fn store(&self) -> &Arc<dyn StateStore> {
        &self.store
    }

    pub fn policy(&self) -> SessionPolicy {
        self.policy
    }

    pub fn session_header(&self) -> &HeaderName {
        &self.session_header
    }

    pub fn views(&self) -> impl Iterator<Item = &ViewBinding> {
        self.views.values()
    }

    pub fn view(&self, key: &ViewKey) -> Option<&ViewBinding> {
        self.views.get(key)
    }

    /// First bound view whose path pattern matches `path`
    pub fn view_for_path(&self, path: &str) -> Option<&ViewBinding> {
        self.views.values().find(|view| view.matches_path(path))
    }

    /// Open the state of `view` for a session
    pub fn session(&self, session_id: &str, view: &ViewKey) -> DataTableResult<ViewSession> {
        let binding = self.view(view).ok_or_else(|| ConfigError::UnknownView {
            view: view.to_string(),
        })?;

        Ok(ViewSession::new(
            session_id,
            binding.key.clone(),
            binding.model.clone(),
            Arc::clone(&self.registry),
            Arc::clone(&self.store),
        )
        .with_policy(self.policy))
    }

    /// Apply one command; `false` means a filter was rejected (see `session.errors()`)
    pub fn apply(&self, session: &mut ViewSession, command: Command) -> DataTableResult<bool> {
        tracing::debug!(session = %session.session_id(), view = %session.key(), command = ?command, "applying command");
        session.apply(command)
    }

    /// What a request on this session publishes
    pub fn request_context(&self, session: &ViewSession) -> DataTableResult<RequestContext> {
        let state = session.state()?;
        let sort = if state.sort.is_empty() {
            self.view(session.key())
                .map(|view| view.default_sort.clone())
                .unwrap_or_default()
        } else {
            state.sort
        };

        Ok(RequestContext {
            model: session.model().to_string(),
            view: session.key().clone(),
            filters: state.filters,
            sort,
            errors: session.errors().to_vec(),
        })
    }

    /// Filter condition of the request currently being handled
    pub fn current_filter_condition(&self) -> Condition {
        context::current_filter_condition(&self.registry)
    }

    /// Ad-hoc multi-column search over `model`
    pub fn search_condition(
        &self,
        model: &str,
        columns: &[ColumnSpec],
        search_text: &str,
        case_insensitive: bool,
    ) -> Result<SearchCondition, ConfigError> {
        let catalog = self.catalog();
        let dialect = catalog.dialect();
        let resolved = catalog
            .resolver()
            .resolve(model, columns)?
            .map_expressions(|e| dialect.cast_text(e));
        Ok(build_search_condition(&resolved, search_text, case_insensitive))
    }
}
