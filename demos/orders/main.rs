//! Orders listing demo
//!
//! Serves `/orders` and `/customers/{id}/orders`. Instead of querying a
//! database the handlers return the SQL fragments the engine produced.
//!
//! ```text
//! curl -i 'localhost:3000/orders'
//! curl -H 'x-data-table-session: <id>' \
//!   'localhost:3000/orders?scope_filters={"action":"add","group":"quick_search","scope":"full_text","args":{"text":"acme"}}'
//! ```

use datatable::context;
use datatable::prelude::*;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const CONFIG: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/demos/orders/datatable.yaml");

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "datatable=debug,tower_http=info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let records = InMemoryRecords::new()
        .with_record("customer", "1")
        .with_record("customer", "2");

    let engine = EngineBuilder::new()
        .with_config_file(CONFIG)?
        .scope("Order", "between", |args| {
            Condition::new("orders.created_at BETWEEN ? AND ?")
                .bind(args[0].clone())
                .bind(args[1].clone())
        })
        .scope("Order", "of_customer", |args| {
            Condition::new("orders.customer_id = ?").bind(args[0].clone())
        })
        .scope("Order", "locked", |_| Condition::new("orders.status = 'locked'"))
        .with_records(records)
        .with_store(InMemoryStateStore::new().with_max_sessions(10_000))
        .build()?;
    let engine = Arc::new(engine);

    let app = Router::new()
        .route("/orders", get(list_orders))
        .route("/customers/{id}/orders", get(list_orders))
        .route("/health", get(|| async { Json(json!({"status": "ok"})) }));
    let app = with_data_tables(app, Arc::clone(&engine)).layer(TraceLayer::new_for_http());

    let addr = "127.0.0.1:3000";
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Orders demo listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn list_orders(
    Extension(engine): Extension<Arc<DataTableEngine>>,
    Extension(request): Extension<RequestContext>,
) -> Json<Value> {
    let condition = engine.current_filter_condition();

    let captions: Vec<String> = request
        .filters
        .iter()
        .filter_map(|(group, filter)| {
            engine
                .registry()
                .caption(&request.model, group, &filter.scope, &filter.args)
                .ok()
        })
        .collect();

    Json(json!({
        "view": request.view,
        "where": condition.to_inline_sql(),
        "joins": condition.joins,
        "order_by": context::current_order_by(None),
        "filters": request.filters,
        "captions": captions,
        "errors": request.errors,
    }))
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM signal, initiating graceful shutdown...");
        },
    }
}
