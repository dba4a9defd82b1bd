//! Engine assembly and the axum binding
//!
//! - [`EngineBuilder`] registers models, scopes, filters and views at startup
//! - [`DataTableEngine`] is the shared facade handing out view sessions
//! - [`with_data_tables`] installs the request middleware on a router

pub mod builder;
pub mod engine;
pub mod middleware;

pub use builder::EngineBuilder;
pub use engine::{DataTableEngine, ViewBinding};
pub use middleware::{FILTER_PARAM, SORT_PARAM, commands_from_uri, data_table_layer, with_data_tables};
