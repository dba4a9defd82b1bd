//! Mutation API over the state of one view

use super::{StateStore, ViewKey, ViewState};
use crate::core::command::{Command, FilterCommand, SortCommand, qualify_sort_column};
use crate::core::error::{ActionError, DataTableResult, FilterError, StorageError};
use crate::core::filter::{ActiveFilter, ActiveFilters, FilterArgs, FilterRegistry};
use crate::core::sort::{SortColumn, SortDirection, SortList};
use std::sync::Arc;

/// Behaviour switches of a session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionPolicy {
    /// Toggling an active filter removes it instead of adding it again
    pub auto_remove_on_toggle: bool,
}

/// The state of one view in one session
///
/// Every operation reads the current state from the store and writes it back,
/// so two sessions on the same view never share anything. A view whose
/// filters and sort columns are all gone is removed from the store.
pub struct ViewSession {
    session_id: String,
    key: ViewKey,
    model: String,
    registry: Arc<FilterRegistry>,
    store: Arc<dyn StateStore>,
    policy: SessionPolicy,
    last_error: Option<FilterError>,
    errors: Vec<String>,
}

impl ViewSession {
    pub fn new(
        session_id: impl Into<String>,
        key: ViewKey,
        model: impl Into<String>,
        registry: Arc<FilterRegistry>,
        store: Arc<dyn StateStore>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            key,
            model: model.into(),
            registry,
            store,
            policy: SessionPolicy::default(),
            last_error: None,
            errors: Vec::new(),
        }
    }

    pub fn with_policy(mut self, policy: SessionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn key(&self) -> &ViewKey {
        &self.key
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn registry(&self) -> &FilterRegistry {
        &self.registry
    }

    /// Messages of the last mutation attempt
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Structured form of the last rejected filter, if any
    pub fn last_error(&self) -> Option<&FilterError> {
        self.last_error.as_ref()
    }

    pub fn state(&self) -> DataTableResult<ViewState> {
        Ok(self.load()?)
    }

    fn load(&self) -> Result<ViewState, StorageError> {
        Ok(self
            .store
            .get(&self.session_id, &self.key)?
            .unwrap_or_default())
    }

    fn persist(&self, state: ViewState) -> Result<(), StorageError> {
        if state.is_empty() {
            tracing::debug!(view = %self.key, "releasing empty view state");
            self.store.remove(&self.session_id, &self.key)
        } else {
            self.store.set(&self.session_id, &self.key, state)
        }
    }

    fn update<R>(&mut self, f: impl FnOnce(&mut ViewState) -> R) -> DataTableResult<R> {
        self.reset_errors();
        let mut state = self.load()?;
        let result = f(&mut state);
        self.persist(state)?;
        Ok(result)
    }

    fn reset_errors(&mut self) {
        self.errors.clear();
        self.last_error = None;
    }

    fn reject(&mut self, error: FilterError) {
        tracing::warn!(
            model = %self.model,
            view = %self.key,
            group = %error.group(),
            error = %error,
            "filter rejected"
        );
        self.errors = self.registry.messages_for(&error);
        self.last_error = Some(error);
    }

    // ------------------------------------------------------------------
    // Filters
    // ------------------------------------------------------------------

    /// Activate a filter, replacing whatever is active in its group
    ///
    /// Returns `false` (and records the reason in [`errors`](Self::errors))
    /// when the filter is not registered, the argument count does not match
    /// or validation fails.
    pub fn add_filter(&mut self, group: &str, scope: &str, args: FilterArgs) -> DataTableResult<bool> {
        self.reset_errors();

        let checked = self
            .registry
            .check(&self.model, group, scope, &args)
            .map(|_| ());
        if let Err(error) = checked {
            self.reject(error);
            return Ok(false);
        }

        let mut state = self.load()?;
        state
            .filters
            .insert(group.to_string(), ActiveFilter::new(scope, args));
        self.persist(state)?;

        tracing::debug!(model = %self.model, view = %self.key, group = %group, scope = %scope, "filter added");
        Ok(true)
    }

    /// Returns whether the group had an active filter
    pub fn remove_filter(&mut self, group: &str) -> DataTableResult<bool> {
        let removed = self.update(|state| state.filters.remove(group).is_some())?;
        tracing::debug!(view = %self.key, group = %group, removed, "filter removed");
        Ok(removed)
    }

    pub fn reset_filters(&mut self) -> DataTableResult<()> {
        self.update(|state| state.filters.clear())?;
        tracing::debug!(view = %self.key, "filters reset");
        Ok(())
    }

    pub fn active_filters(&self) -> DataTableResult<ActiveFilters> {
        Ok(self.load()?.filters)
    }

    /// Whether `scope` is active in `group` with (at least) the given args
    pub fn is_active_filter(&self, group: &str, scope: &str, args: &FilterArgs) -> DataTableResult<bool> {
        Ok(self
            .load()?
            .filters
            .get(group)
            .is_some_and(|active| active.matches(scope, args)))
    }

    /// Value of one argument of an active filter
    pub fn filter_arg(&self, group: &str, scope: &str, name: &str) -> DataTableResult<Option<String>> {
        Ok(self
            .load()?
            .filters
            .get(group)
            .filter(|active| active.scope == scope)
            .and_then(|active| active.args.get(name).cloned()))
    }

    /// Add the filter, or remove it when it is active and the session
    /// removes on toggle
    ///
    /// Returns `false` only when adding was rejected.
    pub fn toggle_filter(&mut self, group: &str, scope: &str, args: FilterArgs) -> DataTableResult<bool> {
        if self.policy.auto_remove_on_toggle && self.is_active_filter(group, scope, &args)? {
            self.remove_filter(group)?;
            return Ok(true);
        }
        self.add_filter(group, scope, args)
    }

    /// The command a link for this filter should carry
    pub fn filter_link_target(
        &self,
        group: &str,
        scope: &str,
        args: FilterArgs,
        remove: bool,
    ) -> DataTableResult<FilterCommand> {
        let auto_remove =
            self.policy.auto_remove_on_toggle && self.is_active_filter(group, scope, &args)?;

        Ok(if remove || auto_remove {
            FilterCommand::remove(group)
        } else {
            FilterCommand::add(group, scope, args)
        })
    }

    pub fn caption(&self, group: &str, scope: &str, args: &FilterArgs) -> Result<String, FilterError> {
        self.registry.caption(&self.model, group, scope, args)
    }

    // ------------------------------------------------------------------
    // Sorting
    // ------------------------------------------------------------------

    /// Returns whether the column is active afterwards
    pub fn toggle_column(&mut self, column: &str) -> DataTableResult<bool> {
        let active = self.update(|state| state.sort.toggle(column))?;
        tracing::debug!(view = %self.key, column = %column, active, "sort column toggled");
        Ok(active)
    }

    /// No-op for inactive columns
    pub fn change_direction(
        &mut self,
        column: &str,
        direction: Option<SortDirection>,
    ) -> DataTableResult<bool> {
        let changed = self.update(|state| state.sort.change_direction(column, direction))?;
        tracing::debug!(view = %self.key, column = %column, changed, "sort direction changed");
        Ok(changed)
    }

    pub fn set_base_column(
        &mut self,
        column: &str,
        direction: Option<SortDirection>,
    ) -> DataTableResult<()> {
        self.update(|state| state.sort.set_base(column, direction))?;
        tracing::debug!(view = %self.key, column = %column, "sort base column set");
        Ok(())
    }

    pub fn set_columns(&mut self, columns: Vec<SortColumn>) -> DataTableResult<()> {
        let count = columns.len();
        self.update(|state| state.sort.set_columns(columns))?;
        tracing::debug!(view = %self.key, count, "sort columns replaced");
        Ok(())
    }

    pub fn sorting_direction(&self, column: &str) -> DataTableResult<Option<SortDirection>> {
        Ok(self.load()?.sort.direction(column))
    }

    pub fn sort_columns(&self) -> DataTableResult<SortList> {
        Ok(self.load()?.sort)
    }

    pub fn reset_sorting(&mut self) -> DataTableResult<()> {
        self.update(|state| state.sort.clear())?;
        tracing::debug!(view = %self.key, "sorting reset");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------

    /// Apply a parsed command
    ///
    /// Returns `false` when a filter was rejected; unknown sort columns are
    /// errors.
    pub fn apply(&mut self, command: Command) -> DataTableResult<bool> {
        match command {
            Command::Filter(command) => self.apply_filter(command),
            Command::Sort(command) => self.apply_sort(command),
        }
    }

    /// Fail the way [`apply`](Self::apply) would on an unknown sort column,
    /// without touching the state
    ///
    /// Filter commands always pass: a rejected filter is reported through
    /// [`errors`](Self::errors), not as a failure.
    pub fn check(&self, command: &Command) -> Result<(), ActionError> {
        let Command::Sort(command) = command else {
            return Ok(());
        };
        let catalog = self.registry.catalog();

        match command {
            SortCommand::Toggle { column, model }
            | SortCommand::ChangeDirection { column, model, .. }
            | SortCommand::SetBase { column, model, .. } => {
                qualify_sort_column(catalog, &self.model, model.as_deref(), column).map(|_| ())
            }
            SortCommand::Set { columns } => columns.iter().try_for_each(|term| {
                qualify_sort_column(catalog, &self.model, Some(&term.0), &term.1).map(|_| ())
            }),
        }
    }

    fn apply_filter(&mut self, command: FilterCommand) -> DataTableResult<bool> {
        match command {
            FilterCommand::Add { group, scope, args } => self.add_filter(&group, &scope, args),
            FilterCommand::Toggle { group, scope, args } => {
                self.toggle_filter(&group, &scope, args)
            }
            FilterCommand::Remove { group } => self.remove_filter(&group).map(|_| true),
            FilterCommand::Reset {} => self.reset_filters().map(|_| true),
        }
    }

    fn apply_sort(&mut self, command: SortCommand) -> DataTableResult<bool> {
        let registry = Arc::clone(&self.registry);
        let catalog = registry.catalog();

        match command {
            SortCommand::Toggle { column, model } => {
                let column = qualify_sort_column(catalog, &self.model, model.as_deref(), &column)?;
                self.toggle_column(&column).map(|_| true)
            }
            SortCommand::ChangeDirection {
                column,
                model,
                direction,
            } => {
                let column = qualify_sort_column(catalog, &self.model, model.as_deref(), &column)?;
                self.change_direction(&column, direction).map(|_| true)
            }
            SortCommand::SetBase {
                column,
                model,
                direction,
            } => {
                let column = qualify_sort_column(catalog, &self.model, model.as_deref(), &column)?;
                self.set_base_column(&column, direction).map(|_| true)
            }
            SortCommand::Set { columns } => {
                let columns = columns
                    .into_iter()
                    .map(|term| {
                        qualify_sort_column(catalog, &self.model, Some(&term.0), &term.1)
                            .map(|column| SortColumn::new(column, term.2))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                self.set_columns(columns).map(|_| true)
            }
        }
    }
}
