//! User-facing message lookup
//!
//! Storing translations is the application's business; the engine only needs
//! a [`Translator`]. [`MessageCatalog`] ships English defaults for the
//! engine's own keys and accepts overrides (usually from the `messages`
//! section of the YAML configuration).

use std::collections::HashMap;

pub const FILTER_NOT_REGISTERED: &str = "scope_filters.add_filter.filter_not_registered";
pub const NON_MATCHING_ARITY: &str = "scope_filters.add_filter.non_matching_arity";
pub const GENERAL_ERROR: &str = "scope_filters.validations.general_error";
pub const INVALID_DATE: &str = "scope_filters.validations.invalid_date";
pub const BLANK: &str = "scope_filters.validations.blank";
pub const INVALID_RECORD: &str = "scope_filters.validations.invalid_record";

/// Lookup of message templates
pub trait Translator: Send + Sync {
    /// Translate `key`, interpolating `%{name}` placeholders from `params`
    fn translate(&self, key: &str, params: &[(&str, &str)]) -> Option<String>;

    /// Display label of a filter argument, if one is defined
    fn arg_label(&self, model_key: &str, scope: &str, arg: &str) -> Option<String> {
        self.translate(
            &format!("scope_filters.args.{}.{}.{}", model_key, scope, arg),
            &[],
        )
    }

    /// Translate or fall back to the key itself
    fn message(&self, key: &str, params: &[(&str, &str)]) -> String {
        self.translate(key, params)
            .unwrap_or_else(|| interpolate(key, params))
    }
}

/// Template map with English defaults
#[derive(Debug, Clone)]
pub struct MessageCatalog {
    templates: HashMap<String, String>,
}

impl MessageCatalog {
    pub fn new() -> Self {
        let templates = [
            (
                FILTER_NOT_REGISTERED,
                "The filter '%{scope}' in group '%{group}' is not available for %{model}",
            ),
            (
                NON_MATCHING_ARITY,
                "The filter '%{scope}' in group '%{group}' expects %{expected} argument(s), %{given} given",
            ),
            (GENERAL_ERROR, "The filter arguments are invalid"),
            (INVALID_DATE, "%{arg_name} is not a valid date: '%{arg_value}'"),
            (BLANK, "%{arg_name} must not be blank"),
            (
                INVALID_RECORD,
                "%{arg_name} does not reference an existing record: '%{arg_value}'",
            ),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self { templates }
    }

    /// A catalog without the built-in templates
    pub fn empty() -> Self {
        Self {
            templates: HashMap::new(),
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, template: impl Into<String>) {
        self.templates.insert(key.into(), template.into());
    }

    pub fn with_messages<I, K, V>(mut self, messages: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (key, template) in messages {
            self.insert(key, template);
        }
        self
    }
}

impl Default for MessageCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl Translator for MessageCatalog {
    fn translate(&self, key: &str, params: &[(&str, &str)]) -> Option<String> {
        self.templates
            .get(key)
            .map(|template| interpolate(template, params))
    }
}

/// Replace every `%{name}` in `template`
pub fn interpolate(template: &str, params: &[(&str, &str)]) -> String {
    params
        .iter()
        .fold(template.to_string(), |acc, (name, value)| {
            acc.replace(&format!("%{{{}}}", name), value)
        })
}
