//! axum binding of the engine
//!
//! For every request whose path matches a bound view the layer:
//!
//! 1. reads the session id from the session header, issuing a UUID when absent
//! 2. applies the `scope_filters` and `sortable_columns` query commands
//! 3. publishes the resulting [`RequestContext`] as a request extension and in
//!    the task-local slot while the handler runs
//!
//! Requests for unbound paths pass through untouched.

use super::engine::DataTableEngine;
use crate::context::{self, RequestContext};
use crate::core::command::{Command, FilterCommand, SortCommand};
use crate::core::error::{ActionError, DataTableResult};
use crate::state::ViewKey;
use axum::Router;
use axum::extract::{Query, Request, State};
use axum::http::{HeaderValue, Uri};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Query parameter carrying a filter command
pub const FILTER_PARAM: &str = "scope_filters";

/// Query parameter carrying a sort command
pub const SORT_PARAM: &str = "sortable_columns";

/// Install the data table layer on `router`
///
/// # Example
///
/// ```ignore
/// let app = Router::new().route("/orders", get(list_orders));
/// let app = with_data_tables(app, Arc::new(engine));
/// ```
pub fn with_data_tables<S>(router: Router<S>, engine: Arc<DataTableEngine>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.layer(middleware::from_fn_with_state(engine, data_table_layer))
}

/// The middleware function, usable with `axum::middleware::from_fn_with_state`
pub async fn data_table_layer(
    State(engine): State<Arc<DataTableEngine>>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(view) = engine
        .view_for_path(request.uri().path())
        .map(|binding| binding.key.clone())
    else {
        return next.run(request).await;
    };

    let presented = request
        .headers()
        .get(engine.session_header())
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(str::to_string);
    let issued = presented.is_none();
    let session_id = presented.unwrap_or_else(|| Uuid::new_v4().to_string());

    let mut response = match prepare(&engine, &session_id, &view, request.uri()) {
        Ok(context) => {
            request.extensions_mut().insert(context.clone());
            request.extensions_mut().insert(Arc::clone(&engine));
            context::scope(context, next.run(request)).await
        }
        Err(e) => {
            tracing::warn!(session = %session_id, view = %view, error = %e, "data table request rejected");
            e.into_response()
        }
    };

    if issued {
        if let Ok(value) = HeaderValue::from_str(&session_id) {
            response
                .headers_mut()
                .insert(engine.session_header().clone(), value);
        }
    }
    response
}

fn prepare(
    engine: &DataTableEngine,
    session_id: &str,
    view: &ViewKey,
    uri: &Uri,
) -> DataTableResult<RequestContext> {
    let mut session = engine.session(session_id, view)?;
    let commands = commands_from_uri(uri)?;

    // A request is rejected before any of its commands is applied
    for command in &commands {
        session.check(command)?;
    }

    // Errors are reset by every mutation, so they are collected per command
    let mut errors = Vec::new();
    for command in commands {
        engine.apply(&mut session, command)?;
        errors.extend(session.errors().iter().cloned());
    }

    let mut context = engine.request_context(&session)?;
    context.errors = errors;
    Ok(context)
}

/// Commands carried by the query string, the filter command first
pub fn commands_from_uri(uri: &Uri) -> Result<Vec<Command>, ActionError> {
    let Query(params) = Query::<HashMap<String, String>>::try_from_uri(uri).map_err(|e| {
        ActionError::Malformed {
            target: "query".to_string(),
            message: e.body_text(),
        }
    })?;

    let mut commands = Vec::new();
    if let Some(json) = params.get(FILTER_PARAM) {
        commands.push(FilterCommand::from_json(json)?.into());
    }
    if let Some(json) = params.get(SORT_PARAM) {
        commands.push(SortCommand::from_json(json)?.into());
    }
    Ok(commands)
}
