//! # datatable
//!
//! Per-view scope filters and sortable columns for data-listing endpoints.
//!
//! ## Features
//!
//! - **Scope filters**: named, validated filters grouped so that one filter per
//!   group is active, translated into SQL condition fragments
//! - **Sortable columns**: ordered multi-column sorting with per-column direction
//! - **Per-session view state**: filters and sort columns persist per view
//! - **Multi-column search**: text search over columns and association columns
//! - **Request context**: the active state is published for the duration of a
//!   request, so data-access code picks it up without extra parameters
//! - **Configuration-Based**: models, filters and views can be declared in YAML
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use datatable::prelude::*;
//!
//! let engine = EngineBuilder::new()
//!     .model(
//!         ModelSchema::new("Order", "orders")
//!             .columns(["id", "reference", "total", "created_at"])
//!             .scope("locked", |_| Condition::new("orders.locked = ?").bind("1")),
//!     )
//!     .filter(FilterSpec::new("Order", "status", "locked"))
//!     .view(ViewConfig {
//!         path: Some("/orders".into()),
//!         owner: "orders".into(),
//!         action: "index".into(),
//!         model: "Order".into(),
//!         default_sort: vec![SortColumn::new("created_at", SortDirection::Desc)],
//!     })
//!     .build()?;
//!
//! let engine = Arc::new(engine);
//! let app = with_data_tables(Router::new().route("/orders", get(list_orders)), engine);
//! ```

pub mod config;
pub mod context;
pub mod core;
pub mod server;
pub mod state;
pub mod storage;

/// Re-exports of commonly used types and traits
pub mod prelude {
    // === Core ===
    pub use crate::core::{
        column::{AssociationColumns, ColumnSpec, Dialect},
        command::{Command, FilterCommand, SortCommand, SortTerm},
        error::{ActionError, ConfigError, DataTableError, DataTableResult, FilterError, StorageError},
        filter::{ActiveFilter, ActiveFilters, CaptionStrategy, FilterArgs, FilterRegistry, FilterSpec},
        messages::{MessageCatalog, Translator},
        query::{Condition, SearchCondition},
        schema::{ModelSchema, SchemaCatalog},
        sort::{SortColumn, SortDirection, SortList},
        validation::{BuiltInValidator, RecordLookup, ValidationOutcome, ValidatorRef},
    };

    // === Context ===
    pub use crate::context::{RequestContext, current_filter_condition, current_order_by};

    // === State ===
    pub use crate::state::{SessionPolicy, StateStore, ViewKey, ViewSession, ViewState};

    // === Storage ===
    pub use crate::storage::{InMemoryRecords, InMemoryStateStore};

    // === Config ===
    pub use crate::config::{DataTableConfig, ModelConfig, OptionsConfig, SearchScopeConfig, ViewConfig};

    // === Server ===
    pub use crate::server::{DataTableEngine, EngineBuilder, ViewBinding, with_data_tables};

    // === External dependencies ===
    pub use anyhow::Result;
    pub use serde::{Deserialize, Serialize};
    pub use std::sync::Arc;

    // === Axum ===
    pub use axum::{
        Extension, Json, Router,
        extract::{Query, State},
        routing::get,
    };
}
