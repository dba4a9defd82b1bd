//! Mutation commands
//!
//! Commands arrive as JSON objects with an `action` discriminator, usually as
//! the `scope_filters` and `sortable_columns` query parameters. They serialize
//! back to the same shape so a routing layer can build links from them.
//!
//! ```json
//! {"action": "add", "group": "date", "scope": "between",
//!  "args": {"start_date": "2024-01-01", "end_date": "2024-02-01"}}
//! {"action": "setBase", "column": "created_at", "direction": "DESC"}
//! ```

use crate::core::error::ActionError;
use crate::core::filter::{FilterArgs, normalize_args};
use crate::core::schema::SchemaCatalog;
use crate::core::sort::SortDirection;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

const FILTER_TARGET: &str = "filter";
const SORT_TARGET: &str = "sort";

const FILTER_ACTIONS: &[&str] = &["add", "remove", "reset", "toggle"];
const SORT_ACTIONS: &[&str] = &["toggle", "changeDirection", "setBase", "set"];

/// Filter mutations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum FilterCommand {
    Add {
        group: String,
        #[serde(alias = "operationName")]
        scope: String,
        #[serde(default, deserialize_with = "deserialize_args")]
        args: FilterArgs,
    },
    Remove {
        group: String,
    },
    Reset {},
    Toggle {
        group: String,
        #[serde(alias = "operationName")]
        scope: String,
        #[serde(default, deserialize_with = "deserialize_args")]
        args: FilterArgs,
    },
}

impl FilterCommand {
    pub fn add(group: impl Into<String>, scope: impl Into<String>, args: FilterArgs) -> Self {
        FilterCommand::Add {
            group: group.into(),
            scope: scope.into(),
            args,
        }
    }

    pub fn remove(group: impl Into<String>) -> Self {
        FilterCommand::Remove {
            group: group.into(),
        }
    }

    pub fn reset() -> Self {
        FilterCommand::Reset {}
    }

    pub fn toggle(group: impl Into<String>, scope: impl Into<String>, args: FilterArgs) -> Self {
        FilterCommand::Toggle {
            group: group.into(),
            scope: scope.into(),
            args,
        }
    }

    pub fn from_value(value: Value) -> Result<Self, ActionError> {
        parse_command(FILTER_TARGET, FILTER_ACTIONS, value)
    }

    pub fn from_json(json: &str) -> Result<Self, ActionError> {
        Self::from_value(parse_json(FILTER_TARGET, json)?)
    }

    /// JSON form, e.g. for a `scope_filters` query parameter
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// One entry of a bulk `set`, persisted as `[model, column, direction]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortTerm(pub String, pub String, pub SortDirection);

impl SortTerm {
    pub fn new(model: impl Into<String>, column: impl Into<String>, direction: SortDirection) -> Self {
        Self(model.into(), column.into(), direction)
    }
}

/// Sort mutations
///
/// A column is either qualified (`orders.total`) or a plain column of
/// `model`, which defaults to the model of the view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum SortCommand {
    Toggle {
        column: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        model: Option<String>,
    },
    ChangeDirection {
        column: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        model: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        direction: Option<SortDirection>,
    },
    SetBase {
        column: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        model: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        direction: Option<SortDirection>,
    },
    Set {
        columns: Vec<SortTerm>,
    },
}

impl SortCommand {
    pub fn toggle(column: impl Into<String>) -> Self {
        SortCommand::Toggle {
            column: column.into(),
            model: None,
        }
    }

    pub fn change_direction(column: impl Into<String>, direction: Option<SortDirection>) -> Self {
        SortCommand::ChangeDirection {
            column: column.into(),
            model: None,
            direction,
        }
    }

    pub fn set_base(column: impl Into<String>, direction: Option<SortDirection>) -> Self {
        SortCommand::SetBase {
            column: column.into(),
            model: None,
            direction,
        }
    }

    pub fn set(columns: Vec<SortTerm>) -> Self {
        SortCommand::Set { columns }
    }

    pub fn from_value(value: Value) -> Result<Self, ActionError> {
        parse_command(SORT_TARGET, SORT_ACTIONS, value)
    }

    pub fn from_json(json: &str) -> Result<Self, ActionError> {
        Self::from_value(parse_json(SORT_TARGET, json)?)
    }

    /// JSON form, e.g. for a `sortable_columns` query parameter
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Any mutation a view accepts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Filter(FilterCommand),
    Sort(SortCommand),
}

impl From<FilterCommand> for Command {
    fn from(command: FilterCommand) -> Self {
        Command::Filter(command)
    }
}

impl From<SortCommand> for Command {
    fn from(command: SortCommand) -> Self {
        Command::Sort(command)
    }
}

/// Qualify a sort column as `table.column`
///
/// An unknown column is fatal for the request.
pub fn qualify_sort_column(
    catalog: &SchemaCatalog,
    view_model: &str,
    model: Option<&str>,
    column: &str,
) -> Result<String, ActionError> {
    let model = model.unwrap_or(view_model);
    catalog
        .qualify(model, column)
        .map_err(|_| ActionError::UnknownColumn {
            model: model.to_string(),
            column: column.to_string(),
        })
}

fn deserialize_args<'de, D>(deserializer: D) -> Result<FilterArgs, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(normalize_args(&value))
}

fn parse_json(target: &str, json: &str) -> Result<Value, ActionError> {
    serde_json::from_str(json).map_err(|e| ActionError::Malformed {
        target: target.to_string(),
        message: e.to_string(),
    })
}

// The discriminator is checked first so that an unknown action is reported
// as such and not as a shape mismatch.
fn parse_command<T>(target: &str, actions: &[&str], value: Value) -> Result<T, ActionError>
where
    T: for<'de> Deserialize<'de>,
{
    let action = match value.get("action") {
        Some(Value::String(action)) => action.clone(),
        Some(other) => {
            return Err(ActionError::InvalidAction {
                target: target.to_string(),
                action: other.to_string(),
            });
        }
        None => {
            return Err(ActionError::Malformed {
                target: target.to_string(),
                message: "missing field `action`".to_string(),
            });
        }
    };

    if !actions.contains(&action.as_str()) {
        return Err(ActionError::InvalidAction {
            target: target.to_string(),
            action,
        });
    }

    serde_json::from_value(value).map_err(|e| ActionError::Malformed {
        target: target.to_string(),
        message: e.to_string(),
    })
}
