//! HTTP tests of the data table middleware
//!
//! These tests verify that:
//! - Sessions are identified by header, and issued when missing
//! - Query commands are applied before the handler runs
//! - The handler sees the context both as extension and task-local
//! - Malformed commands abort the request with 400

use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::TestServer;
use datatable::context;
use datatable::prelude::*;
use serde_json::{Value, json};

const SESSION_HEADER: &str = "x-data-table-session";

fn engine() -> Arc<DataTableEngine> {
    let engine = EngineBuilder::new()
        .model(
            ModelSchema::new("Order", "orders")
                .columns(["id", "reference", "total", "created_at"])
                .scope("locked", |_| Condition::new("orders.locked = ?").bind("1"))
                .scope("min_total", |args| {
                    Condition::new("orders.total >= ?").bind(args[0].clone())
                }),
        )
        .filter(FilterSpec::new("Order", "status", "locked"))
        .filter(
            FilterSpec::new("Order", "amount", "min_total")
                .args(["total"])
                .validate(BuiltInValidator::AllPresent),
        )
        .view(ViewConfig {
            path: Some("/orders".to_string()),
            owner: "orders".to_string(),
            action: "index".to_string(),
            model: "Order".to_string(),
            default_sort: vec![SortColumn::new("created_at", SortDirection::Desc)],
        })
        .view(ViewConfig {
            path: Some("/customers/{id}/orders".to_string()),
            owner: "customers/orders".to_string(),
            action: "index".to_string(),
            model: "Order".to_string(),
            default_sort: Vec::new(),
        })
        .build()
        .expect("engine should build");
    Arc::new(engine)
}

async fn list_orders(
    Extension(engine): Extension<Arc<DataTableEngine>>,
    Extension(request): Extension<RequestContext>,
) -> Json<Value> {
    Json(json!({
        "view": request.view,
        "published": context::is_published(),
        "where": engine.current_filter_condition().to_inline_sql(),
        "order_by": current_order_by(None),
        "errors": request.errors,
    }))
}

async fn health() -> Json<Value> {
    Json(json!({ "published": context::is_published() }))
}

fn create_test_server() -> TestServer {
    let app = Router::new()
        .route("/orders", get(list_orders))
        .route("/customers/{id}/orders", get(list_orders))
        .route("/health", get(health));
    let app = with_data_tables(app, engine());

    TestServer::try_new(app).expect("Failed to create test server")
}

fn session_header() -> HeaderName {
    HeaderName::from_static(SESSION_HEADER)
}

// =============================================================================
// Session handling
// =============================================================================

mod session_tests {
    use super::*;

    #[tokio::test]
    async fn test_session_id_is_issued() {
        let server = create_test_server();

        let response = server.get("/orders").await;
        response.assert_status_ok();

        let issued = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .expect("session id should be issued");
        assert!(uuid::Uuid::parse_str(issued).is_ok());
    }

    #[tokio::test]
    async fn test_presented_session_id_is_not_echoed() {
        let server = create_test_server();

        let response = server
            .get("/orders")
            .add_header(session_header(), HeaderValue::from_static("alice"))
            .await;

        response.assert_status_ok();
        assert!(response.headers().get(SESSION_HEADER).is_none());
    }

    #[tokio::test]
    async fn test_state_persists_per_session() {
        let server = create_test_server();

        server
            .get("/orders")
            .add_header(session_header(), HeaderValue::from_static("alice"))
            .add_query_param(
                "scope_filters",
                json!({"action": "add", "group": "status", "scope": "locked"}).to_string(),
            )
            .await
            .assert_status_ok();

        let alice: Value = server
            .get("/orders")
            .add_header(session_header(), HeaderValue::from_static("alice"))
            .await
            .json();
        assert_eq!(alice["where"], "orders.locked = '1'");

        let bob: Value = server
            .get("/orders")
            .add_header(session_header(), HeaderValue::from_static("bob"))
            .await
            .json();
        assert_eq!(bob["where"], "");
    }
}

// =============================================================================
// Commands
// =============================================================================

mod command_tests {
    use super::*;

    #[tokio::test]
    async fn test_filter_and_sort_commands_applied() {
        let server = create_test_server();

        let body: Value = server
            .get("/orders")
            .add_header(session_header(), HeaderValue::from_static("alice"))
            .add_query_param(
                "scope_filters",
                json!({"action": "add", "group": "amount", "scope": "min_total", "args": {"total": 100}})
                    .to_string(),
            )
            .add_query_param(
                "sortable_columns",
                json!({"action": "setBase", "column": "total", "direction": "DESC"}).to_string(),
            )
            .await
            .json();

        assert_eq!(body["published"], true);
        assert_eq!(body["view"], "orders_index");
        assert_eq!(body["where"], "orders.total >= '100'");
        assert_eq!(body["order_by"], "orders.total DESC");
        assert_eq!(body["errors"], json!([]));
    }

    #[tokio::test]
    async fn test_default_sort_published() {
        let server = create_test_server();

        let body: Value = server.get("/orders").await.json();
        assert_eq!(body["order_by"], "orders.created_at DESC");
    }

    #[tokio::test]
    async fn test_rejected_filter_reported_in_context() {
        let server = create_test_server();

        let response = server
            .get("/orders")
            .add_header(session_header(), HeaderValue::from_static("alice"))
            .add_query_param(
                "scope_filters",
                json!({"action": "add", "group": "amount", "scope": "min_total", "args": {"total": ""}})
                    .to_string(),
            )
            .add_query_param(
                "sortable_columns",
                json!({"action": "toggle", "column": "reference"}).to_string(),
            )
            .await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["where"], "");
        assert_eq!(body["errors"], json!(["total must not be blank"]));
        assert_eq!(body["order_by"], "orders.reference ASC");
    }

    #[tokio::test]
    async fn test_invalid_action_returns_400() {
        let server = create_test_server();

        let response = server
            .get("/orders")
            .add_query_param("scope_filters", json!({"action": "explode"}).to_string())
            .await;

        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(body["code"], "INVALID_ACTION");
        assert_eq!(body["details"]["action"], "explode");
        assert!(response.headers().get(SESSION_HEADER).is_some());
    }

    #[tokio::test]
    async fn test_unknown_sort_column_returns_400() {
        let server = create_test_server();

        let response = server
            .get("/orders")
            .add_query_param(
                "sortable_columns",
                json!({"action": "toggle", "column": "colour"}).to_string(),
            )
            .await;

        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(body["code"], "UNKNOWN_SORT_COLUMN");
    }

    #[tokio::test]
    async fn test_rejected_request_stores_nothing() {
        let server = create_test_server();

        let response = server
            .get("/orders")
            .add_header(session_header(), HeaderValue::from_static("alice"))
            .add_query_param(
                "scope_filters",
                json!({"action": "add", "group": "status", "scope": "locked"}).to_string(),
            )
            .add_query_param(
                "sortable_columns",
                json!({"action": "toggle", "column": "colour"}).to_string(),
            )
            .await;
        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

        let body: Value = server
            .get("/orders")
            .add_header(session_header(), HeaderValue::from_static("alice"))
            .await
            .json();
        assert_eq!(body["where"], "");
        assert_eq!(body["order_by"], "orders.created_at DESC");
    }
}

// =============================================================================
// Routing
// =============================================================================

mod routing_tests {
    use super::*;

    #[tokio::test]
    async fn test_parameterized_path_resolves_view() {
        let server = create_test_server();

        let body: Value = server.get("/customers/42/orders").await.json();
        assert_eq!(body["view"], "customers_orders_index");
        assert_eq!(body["order_by"], Value::Null);
    }

    #[tokio::test]
    async fn test_unbound_path_passes_through() {
        let server = create_test_server();

        let response = server.get("/health").await;
        response.assert_status_ok();

        let body: Value = response.json();
        assert_eq!(body["published"], false);
        assert!(response.headers().get(SESSION_HEADER).is_none());
    }
}
