//! Tests for the typed error handling system
//!
//! These tests verify that:
//! - Errors return correct HTTP status codes
//! - Error responses are properly formatted
//! - Error conversions work correctly

use axum::http::StatusCode;
use axum::response::IntoResponse;
use datatable::prelude::*;

// =============================================================================
// HTTP Status Code Tests
// =============================================================================

mod status_code_tests {
    use super::*;

    #[test]
    fn test_invalid_action_returns_400() {
        let err = DataTableError::Action(ActionError::InvalidAction {
            target: "filter".to_string(),
            action: "explode".to_string(),
        });
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_malformed_command_returns_400() {
        let err = DataTableError::Action(ActionError::Malformed {
            target: "sort".to_string(),
            message: "missing field `column`".to_string(),
        });
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_filter_error_returns_422() {
        let err = DataTableError::Filter(FilterError::Validation {
            group: "period".to_string(),
            messages: vec!["start_date is not a valid date: 'x'".to_string()],
        });
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_config_error_returns_500() {
        let err = DataTableError::Config(ConfigError::UnknownModel {
            model: "Invoice".to_string(),
        });
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_storage_error_returns_500() {
        let err = DataTableError::Storage(StorageError::LockPoisoned {
            message: "poisoned".to_string(),
        });
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}

// =============================================================================
// Error Response Tests
// =============================================================================

mod response_tests {
    use super::*;

    #[test]
    fn test_invalid_action_response() {
        let err = DataTableError::Action(ActionError::InvalidAction {
            target: "sort".to_string(),
            action: "shuffle".to_string(),
        });

        let response = err.to_response();
        assert_eq!(response.code, "INVALID_ACTION");
        assert_eq!(response.message, "Invalid sort action 'shuffle' was given");

        let details = response.details.unwrap();
        assert_eq!(details["target"], "sort");
        assert_eq!(details["action"], "shuffle");
    }

    #[test]
    fn test_validation_response_lists_messages() {
        let err = DataTableError::Filter(FilterError::Validation {
            group: "quick_search".to_string(),
            messages: vec!["text must not be blank".to_string()],
        });

        let response = err.to_response();
        assert_eq!(response.code, "FILTER_VALIDATION_FAILED");
        let details = response.details.unwrap();
        assert_eq!(details["group"], "quick_search");
        assert_eq!(details["messages"][0], "text must not be blank");
    }

    #[test]
    fn test_into_response() {
        let err = DataTableError::Action(ActionError::UnknownColumn {
            model: "Order".to_string(),
            column: "colour".to_string(),
        });

        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_response_without_details() {
        let err = DataTableError::Internal("boom".to_string());
        let response = err.to_response();
        assert_eq!(response.code, "INTERNAL_ERROR");
        assert!(response.details.is_none());

        let json = serde_json::to_value(&response).unwrap();
        assert!(json.get("details").is_none());
    }
}

// =============================================================================
// Conversion Tests
// =============================================================================

mod conversion_tests {
    use super::*;

    #[test]
    fn test_config_error_conversion() {
        let err: DataTableError = ConfigError::UnknownView {
            view: "orders_index".to_string(),
        }
        .into();
        assert!(matches!(err, DataTableError::Config(ConfigError::UnknownView { .. })));
        assert_eq!(err.error_code(), "CONFIG_ERROR");
    }

    #[test]
    fn test_filter_error_codes() {
        let not_registered: DataTableError = FilterError::NotRegistered {
            model: "Order".to_string(),
            group: "status".to_string(),
            scope: "archived".to_string(),
        }
        .into();
        assert_eq!(not_registered.error_code(), "FILTER_NOT_REGISTERED");

        let arity: DataTableError = FilterError::ArityMismatch {
            model: "Order".to_string(),
            group: "period".to_string(),
            scope: "date_range".to_string(),
            expected: 2,
            given: 1,
        }
        .into();
        assert_eq!(arity.error_code(), "FILTER_ARITY_MISMATCH");
    }

    #[test]
    fn test_yaml_error_conversion() {
        let yaml_err = serde_yaml::from_str::<Vec<String>>("{").unwrap_err();
        let err: ConfigError = yaml_err.into();
        assert!(matches!(err, ConfigError::ParseError { file: None, .. }));
    }

    #[test]
    fn test_anyhow_conversion() {
        let err: DataTableError = anyhow::anyhow!("database unreachable").into();
        assert!(matches!(err, DataTableError::Internal(_)));
        assert_eq!(err.to_string(), "Internal error: database unreachable");
    }

    #[test]
    fn test_error_source() {
        use std::error::Error;

        let err = DataTableError::Action(ActionError::Malformed {
            target: "filter".to_string(),
            message: "missing field `group`".to_string(),
        });
        assert!(err.source().is_some());
        assert!(DataTableError::Internal("x".to_string()).source().is_none());
    }
}
