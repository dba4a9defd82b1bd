//! End-to-end tests of the engine: filter groups, validation, sorting and
//! the conditions published for a request

use datatable::context;
use datatable::prelude::*;
use std::collections::BTreeMap;
use tokio_test::{assert_err, assert_ok};

// =============================================================================
// Fixtures
// =============================================================================

fn order_schema() -> ModelSchema {
    ModelSchema::new("Order", "orders")
        .columns(["id", "reference", "total", "created_at", "customer_id"])
        .association("customer", "Customer")
        .scope("locked", |_| Condition::new("orders.locked = ?").bind("1"))
        .scope("unlocked", |_| Condition::new("orders.locked = ?").bind("0"))
        .scope("date_range", |args| {
            Condition::new("orders.created_at BETWEEN ? AND ?")
                .bind(args[0].clone())
                .bind(args[1].clone())
        })
        .scope("of_customer", |args| {
            Condition::new("orders.customer_id = ?").bind(args[0].clone())
        })
}

fn customer_schema() -> ModelSchema {
    ModelSchema::new("Customer", "customers").columns(["id", "name", "email"])
}

fn orders_view() -> ViewConfig {
    ViewConfig {
        path: Some("/orders".to_string()),
        owner: "orders".to_string(),
        action: "index".to_string(),
        model: "Order".to_string(),
        default_sort: vec![SortColumn::new("created_at", SortDirection::Desc)],
    }
}

fn builder() -> EngineBuilder {
    EngineBuilder::new()
        .model(order_schema())
        .model(customer_schema())
        .filter(FilterSpec::new("Order", "status", "locked"))
        .filter(FilterSpec::new("Order", "status", "unlocked"))
        .filter(
            FilterSpec::new("Order", "period", "date_range")
                .args(["start_date", "end_date"])
                .validate(BuiltInValidator::AllDates),
        )
        .filter(
            FilterSpec::new("Order", "customer", "of_customer")
                .args(["customer_id"])
                .validate(BuiltInValidator::RecordExistence),
        )
        .with_records(InMemoryRecords::new().with_record("customer", "7"))
        .view(orders_view())
}

fn engine() -> DataTableEngine {
    builder().build().expect("engine should build")
}

fn view() -> ViewKey {
    ViewKey::new("orders", "index")
}

fn args(pairs: &[(&str, &str)]) -> FilterArgs {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect::<BTreeMap<_, _>>()
}

// =============================================================================
// Filter groups
// =============================================================================

mod filter_tests {
    use super::*;

    #[test]
    fn test_group_holds_one_filter() {
        let engine = engine();
        let mut session = engine.session("s1", &view()).unwrap();

        assert!(session.add_filter("status", "locked", FilterArgs::new()).unwrap());
        let active = session.active_filters().unwrap();
        assert_eq!(active["status"].scope, "locked");

        assert!(session.add_filter("status", "unlocked", FilterArgs::new()).unwrap());
        let active = session.active_filters().unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active["status"].scope, "unlocked");
        assert!(!session.is_active_filter("status", "locked", &FilterArgs::new()).unwrap());

        assert!(session.remove_filter("status").unwrap());
        assert!(session.active_filters().unwrap().is_empty());
        assert!(session.state().unwrap().is_empty());
    }

    #[test]
    fn test_arity_mismatch_yields_one_message() {
        let engine = engine();
        let mut session = engine.session("s1", &view()).unwrap();

        for supplied in [
            args(&[]),
            args(&[("start_date", "2024-01-01")]),
            args(&[("start_date", "2024-01-01"), ("end_date", "2024-02-01"), ("x", "1")]),
        ] {
            assert!(!session.add_filter("period", "date_range", supplied).unwrap());
            assert_eq!(session.errors().len(), 1);
            assert!(matches!(
                session.last_error(),
                Some(FilterError::ArityMismatch { expected: 2, .. })
            ));
        }

        assert!(session.active_filters().unwrap().is_empty());
    }

    #[test]
    fn test_invalid_date_is_rejected() {
        let engine = engine();
        let mut session = engine.session("s1", &view()).unwrap();

        let added = session
            .add_filter(
                "period",
                "date_range",
                args(&[("start_date", "not-a-date"), ("end_date", "2024-01-01")]),
            )
            .unwrap();

        assert!(!added);
        assert_eq!(session.errors().len(), 1);
        assert!(session.errors()[0].contains("start_date"));
        assert!(!session.errors()[0].contains("end_date"));
    }

    #[test]
    fn test_unregistered_filter_is_rejected() {
        let engine = engine();
        let mut session = engine.session("s1", &view()).unwrap();

        assert!(!session.add_filter("status", "archived", FilterArgs::new()).unwrap());
        assert!(matches!(
            session.last_error(),
            Some(FilterError::NotRegistered { .. })
        ));
    }

    #[test]
    fn test_record_existence() {
        let engine = engine();
        let mut session = engine.session("s1", &view()).unwrap();

        assert!(!session
            .add_filter("customer", "of_customer", args(&[("customer_id", "99")]))
            .unwrap());
        assert!(session
            .add_filter("customer", "of_customer", args(&[("customer_id", "7")]))
            .unwrap());
        assert!(session.errors().is_empty());
        assert_eq!(
            session.filter_arg("customer", "of_customer", "customer_id").unwrap().as_deref(),
            Some("7")
        );
    }

    #[test]
    fn test_toggle_follows_policy() {
        let engine = builder().auto_remove_on_toggle(true).build().unwrap();
        let mut session = engine.session("s1", &view()).unwrap();

        assert_ok!(session.toggle_filter("status", "locked", FilterArgs::new()));
        assert!(session.is_active_filter("status", "locked", &FilterArgs::new()).unwrap());

        assert_ok!(session.toggle_filter("status", "locked", FilterArgs::new()));
        assert!(session.active_filters().unwrap().is_empty());

        let engine = engine_without_auto_remove();
        let mut session = engine.session("s1", &view()).unwrap();
        session.toggle_filter("status", "locked", FilterArgs::new()).unwrap();
        session.toggle_filter("status", "locked", FilterArgs::new()).unwrap();
        assert!(session.is_active_filter("status", "locked", &FilterArgs::new()).unwrap());
    }

    fn engine_without_auto_remove() -> DataTableEngine {
        builder().auto_remove_on_toggle(false).build().unwrap()
    }

    #[test]
    fn test_sessions_are_isolated() {
        let engine = engine();
        let mut first = engine.session("s1", &view()).unwrap();
        let second = engine.session("s2", &view()).unwrap();

        first.add_filter("status", "locked", FilterArgs::new()).unwrap();

        assert_eq!(first.active_filters().unwrap().len(), 1);
        assert!(second.active_filters().unwrap().is_empty());
    }
}

// =============================================================================
// Sorting
// =============================================================================

mod sort_tests {
    use super::*;

    fn columns(session: &ViewSession) -> Vec<SortColumn> {
        session.sort_columns().unwrap().into()
    }

    #[test]
    fn test_toggle_twice_restores_list() {
        let engine = engine();
        let mut session = engine.session("s1", &view()).unwrap();
        session
            .set_columns(vec![SortColumn::new("orders.created_at", SortDirection::Asc)])
            .unwrap();
        let before = columns(&session);

        session.toggle_column("orders.total").unwrap();
        session.toggle_column("orders.total").unwrap();

        assert_eq!(columns(&session), before);
    }

    #[test]
    fn test_change_direction_on_inactive_column_is_noop() {
        let engine = engine();
        let mut session = engine.session("s1", &view()).unwrap();
        session
            .set_columns(vec![SortColumn::new("orders.created_at", SortDirection::Asc)])
            .unwrap();
        let before = columns(&session);

        let changed = session
            .change_direction("orders.total", Some(SortDirection::Desc))
            .unwrap();

        assert!(!changed);
        assert_eq!(columns(&session), before);
    }

    #[test]
    fn test_set_base_column_replaces_list() {
        let engine = engine();
        let mut session = engine.session("s1", &view()).unwrap();
        session
            .set_columns(vec![
                SortColumn::new("orders.created_at", SortDirection::Asc),
                SortColumn::new("orders.total", SortDirection::Desc),
                SortColumn::new("orders.reference", SortDirection::Asc),
            ])
            .unwrap();

        session
            .set_base_column("orders.id", Some(SortDirection::Desc))
            .unwrap();

        assert_eq!(
            columns(&session),
            vec![SortColumn::new("orders.id", SortDirection::Desc)]
        );
    }

    #[test]
    fn test_set_then_toggle_removes_column() {
        let engine = engine();
        let mut session = engine.session("s1", &view()).unwrap();

        engine
            .apply(
                &mut session,
                SortCommand::set(vec![
                    SortTerm::new("Order", "created_at", SortDirection::Asc),
                    SortTerm::new("Order", "total", SortDirection::Desc),
                ])
                .into(),
            )
            .unwrap();
        engine
            .apply(&mut session, SortCommand::toggle("orders.total").into())
            .unwrap();

        assert_eq!(
            columns(&session),
            vec![SortColumn::new("orders.created_at", SortDirection::Asc)]
        );
    }

    #[test]
    fn test_unknown_sort_column_is_fatal() {
        let engine = engine();
        let mut session = engine.session("s1", &view()).unwrap();

        let err = assert_err!(engine.apply(&mut session, SortCommand::toggle("colour").into()));

        assert!(matches!(
            err,
            DataTableError::Action(ActionError::UnknownColumn { .. })
        ));
    }
}

// =============================================================================
// Request context
// =============================================================================

mod context_tests {
    use super::*;

    #[tokio::test]
    async fn test_conditions_published_for_request() {
        let engine = engine();
        let mut session = engine.session("s1", &view()).unwrap();
        session.add_filter("status", "locked", FilterArgs::new()).unwrap();
        session
            .add_filter(
                "period",
                "date_range",
                args(&[("start_date", "2024-01-01"), ("end_date", "2024-02-01")]),
            )
            .unwrap();

        let request = engine.request_context(&session).unwrap();
        let (condition, order_by) = context::scope(request, async {
            (engine.current_filter_condition(), current_order_by(None))
        })
        .await;

        assert_eq!(
            condition.to_inline_sql(),
            "(orders.created_at BETWEEN '2024-01-01' AND '2024-02-01') AND (orders.locked = '1')"
        );
        assert_eq!(order_by.as_deref(), Some("orders.created_at DESC"));

        assert!(engine.current_filter_condition().is_empty());
        assert_eq!(current_order_by(None), None);
    }

    #[test]
    fn test_default_sort_is_not_persisted() {
        let engine = engine();
        let session = engine.session("s1", &view()).unwrap();

        let request = engine.request_context(&session).unwrap();

        assert_eq!(
            request.sort.columns(),
            &[SortColumn::new("orders.created_at", SortDirection::Desc)]
        );
        assert!(session.sort_columns().unwrap().is_empty());
    }

    #[test]
    fn test_stored_sort_replaces_default() {
        let engine = engine();
        let mut session = engine.session("s1", &view()).unwrap();
        session.toggle_column("orders.total").unwrap();

        let request = engine.request_context(&session).unwrap();

        assert_eq!(
            request.sort.columns(),
            &[SortColumn::new("orders.total", SortDirection::Asc)]
        );
    }

    #[test]
    fn test_unknown_view() {
        let engine = engine();
        let err = engine
            .session("s1", &ViewKey::new("invoices", "index"))
            .err()
            .unwrap();
        assert!(matches!(
            err,
            DataTableError::Config(ConfigError::UnknownView { .. })
        ));
    }
}

// =============================================================================
// Search
// =============================================================================

mod search_tests {
    use super::*;

    #[test]
    fn test_blank_search_is_noop() {
        let engine = engine();
        let search = engine
            .search_condition("Order", &["reference".into(), "total".into()], "", true)
            .unwrap();

        assert!(search.is_noop());
        assert!(search.into_condition().is_empty());
    }

    #[test]
    fn test_case_insensitive_single_column() {
        let engine = engine();
        let search = engine
            .search_condition("Order", &["reference".into()], "Foo", true)
            .unwrap();

        let condition = search.into_condition();
        assert_eq!(
            condition.to_inline_sql(),
            "LOWER(CAST(orders.reference AS TEXT)) LIKE '%foo%'"
        );
    }

    #[test]
    fn test_search_scope_as_filter() {
        let engine = builder()
            .search_scope(
                "Order",
                "full_text",
                vec!["reference".into(), ColumnSpec::association("customer", [ColumnSpec::column("name")])],
                true,
            )
            .filter(
                FilterSpec::new("Order", "quick_search", "full_text")
                    .args(["text"])
                    .validate(BuiltInValidator::AllPresent),
            )
            .build()
            .unwrap();
        let mut session = engine.session("s1", &view()).unwrap();

        assert!(!session
            .add_filter("quick_search", "full_text", args(&[("text", "  ")]))
            .unwrap());
        assert!(session
            .add_filter("quick_search", "full_text", args(&[("text", "Acme")]))
            .unwrap());

        let condition = engine
            .registry()
            .apply_filters("Order", &session.active_filters().unwrap());
        assert_eq!(condition.joins, vec!["customer".to_string()]);
        assert!(condition.to_inline_sql().contains("'%acme%'"));

        // The only active filter still comes out as one grouped predicate
        assert_eq!(
            condition.sql,
            "(LOWER(CAST(orders.reference AS TEXT)) LIKE ? OR LOWER(CAST(customers.name AS TEXT)) LIKE ?)"
        );
        assert_eq!(condition.binds, vec!["%acme%", "%acme%"]);
    }

    #[test]
    fn test_unknown_search_column_fails() {
        let engine = engine();
        let err = engine
            .search_condition("Order", &["colour".into()], "x", true)
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownColumn { .. }));
    }
}
