//! Request-scoped publication of the view state
//!
//! While a request for a bound view is handled, its active filters and sort
//! columns are published into a task-local slot. The data-access layer reads
//! them from there instead of taking them as parameters on every query. The
//! slot only exists for the duration of [`scope`] / [`sync_scope`], so it is
//! gone on every exit path, panics included.
//!
//! # Example
//!
//! ```rust,ignore
//! async fn list_orders(State(db): State<Db>) -> Json<Vec<Order>> {
//!     let condition = context::current_filter_condition(&registry);
//!     let order_by = context::current_order_by(None);
//!     Json(db.orders(condition, order_by).await)
//! }
//! ```

use crate::core::filter::{ActiveFilters, FilterRegistry};
use crate::core::query::{Condition, build_order_by};
use crate::core::sort::{SortColumn, SortList};
use crate::state::ViewKey;
use serde::Serialize;
use std::future::Future;

tokio::task_local! {
    static CURRENT: RequestContext;
}

/// What a request publishes about its view
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestContext {
    pub model: String,
    pub view: ViewKey,
    pub filters: ActiveFilters,
    /// Effective sort columns (the view defaults when nothing is stored)
    pub sort: SortList,
    /// Messages of the mutation applied by this request
    pub errors: Vec<String>,
}

impl RequestContext {
    pub fn new(model: impl Into<String>, view: ViewKey) -> Self {
        Self {
            model: model.into(),
            view,
            filters: ActiveFilters::new(),
            sort: SortList::new(),
            errors: Vec::new(),
        }
    }

    /// Conditions of all valid active filters, ANDed together
    pub fn filter_condition(&self, registry: &FilterRegistry) -> Condition {
        registry.apply_filters(&self.model, &self.filters)
    }

    /// ORDER BY terms, optionally overriding the published sort columns
    pub fn order_by(&self, sort_override: Option<&[SortColumn]>) -> Option<String> {
        build_order_by(sort_override.unwrap_or(self.sort.columns()))
    }
}

/// Run `future` with `context` published
pub async fn scope<F>(context: RequestContext, future: F) -> F::Output
where
    F: Future,
{
    tracing::debug!(model = %context.model, view = %context.view, filters = context.filters.len(), "publishing request context");
    CURRENT.scope(context, future).await
}

/// Run `f` with `context` published
pub fn sync_scope<F, R>(context: RequestContext, f: F) -> R
where
    F: FnOnce() -> R,
{
    tracing::debug!(model = %context.model, view = %context.view, filters = context.filters.len(), "publishing request context");
    CURRENT.sync_scope(context, f)
}

/// The published context, if any
pub fn current() -> Option<RequestContext> {
    CURRENT.try_with(Clone::clone).ok()
}

pub fn with_current<F, R>(f: F) -> Option<R>
where
    F: FnOnce(&RequestContext) -> R,
{
    CURRENT.try_with(f).ok()
}

pub fn is_published() -> bool {
    CURRENT.try_with(|_| ()).is_ok()
}

/// Filter condition of the current request; no-op outside a request
pub fn current_filter_condition(registry: &FilterRegistry) -> Condition {
    with_current(|context| context.filter_condition(registry)).unwrap_or_default()
}

/// ORDER BY of the current request
///
/// An explicit override is used even outside a request.
pub fn current_order_by(sort_override: Option<&[SortColumn]>) -> Option<String> {
    match with_current(|context| context.order_by(sort_override)) {
        Some(order_by) => order_by,
        None => sort_override.and_then(build_order_by),
    }
}
