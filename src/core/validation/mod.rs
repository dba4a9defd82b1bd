//! Filter argument validation
//!
//! A filter declares an ordered list of validators. Each one is either a
//! built-in (`all_present`, `all_dates`, `record_existence`), a validation
//! method defined on the model, or a closure. Named methods are resolved when
//! the filter is registered, never at request time.

pub mod chain;
pub mod validators;

use crate::core::error::ConfigError;
use crate::core::filter::FilterArgs;
use crate::core::messages::{self, Translator};
use crate::core::schema::{ModelSchema, ValidationMethod};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

pub use chain::{ValidationChain, ValidationContext};
pub use validators::RecordLookup;

/// What a validator answers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    Passed,
    /// Failure without details; reported with the generic message
    Failed,
    /// Explicit messages; an empty list means success
    Messages(Vec<String>),
}

impl ValidationOutcome {
    pub fn into_messages(self, translator: &dyn Translator) -> Vec<String> {
        match self {
            ValidationOutcome::Passed => Vec::new(),
            ValidationOutcome::Failed => vec![translator.message(messages::GENERAL_ERROR, &[])],
            ValidationOutcome::Messages(messages) => messages,
        }
    }
}

impl From<bool> for ValidationOutcome {
    fn from(valid: bool) -> Self {
        if valid {
            ValidationOutcome::Passed
        } else {
            ValidationOutcome::Failed
        }
    }
}

impl From<Vec<String>> for ValidationOutcome {
    fn from(messages: Vec<String>) -> Self {
        ValidationOutcome::Messages(messages)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltInValidator {
    AllPresent,
    AllDates,
    RecordExistence,
}

impl BuiltInValidator {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuiltInValidator::AllPresent => "all_present",
            BuiltInValidator::AllDates => "all_dates",
            BuiltInValidator::RecordExistence => "record_existence",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("'{0}' is not a built-in validator")]
pub struct UnknownBuiltIn(String);

impl FromStr for BuiltInValidator {
    type Err = UnknownBuiltIn;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all_present" => Ok(BuiltInValidator::AllPresent),
            "all_dates" => Ok(BuiltInValidator::AllDates),
            "record_existence" => Ok(BuiltInValidator::RecordExistence),
            _ => Err(UnknownBuiltIn(s.to_string())),
        }
    }
}

/// A resolved validator, ready to run
#[derive(Clone)]
pub enum Validator {
    BuiltIn(BuiltInValidator),
    Custom(ValidationMethod),
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Validator::BuiltIn(b) => write!(f, "BuiltIn({})", b.as_str()),
            Validator::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// A validator as written at registration time
#[derive(Clone)]
pub enum ValidatorRef {
    BuiltIn(BuiltInValidator),
    /// A validation method defined on the model
    Named(String),
    Custom(ValidationMethod),
}

impl ValidatorRef {
    /// A closure validator
    pub fn custom<F, R>(f: F) -> Self
    where
        F: Fn(&FilterArgs) -> R + Send + Sync + 'static,
        R: Into<ValidationOutcome>,
    {
        ValidatorRef::Custom(Arc::new(move |args| f(args).into()))
    }

    pub fn resolve(&self, model: &ModelSchema) -> Result<Validator, ConfigError> {
        match self {
            ValidatorRef::BuiltIn(builtin) => Ok(Validator::BuiltIn(*builtin)),
            ValidatorRef::Custom(method) => Ok(Validator::Custom(method.clone())),
            ValidatorRef::Named(name) => model
                .validation_method_fn(name)
                .cloned()
                .map(Validator::Custom)
                .ok_or_else(|| ConfigError::UnknownValidator {
                    model: model.name().to_string(),
                    validator: name.clone(),
                }),
        }
    }
}

impl From<&str> for ValidatorRef {
    fn from(name: &str) -> Self {
        match name.parse::<BuiltInValidator>() {
            Ok(builtin) => ValidatorRef::BuiltIn(builtin),
            Err(_) => ValidatorRef::Named(name.to_string()),
        }
    }
}

impl From<BuiltInValidator> for ValidatorRef {
    fn from(builtin: BuiltInValidator) -> Self {
        ValidatorRef::BuiltIn(builtin)
    }
}

impl fmt::Debug for ValidatorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidatorRef::BuiltIn(b) => write!(f, "BuiltIn({})", b.as_str()),
            ValidatorRef::Named(name) => write!(f, "Named({})", name),
            ValidatorRef::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

// Configuration files refer to validators by name.
impl<'de> Deserialize<'de> for ValidatorRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(ValidatorRef::from(name.as_str()))
    }
}

impl Serialize for ValidatorRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ValidatorRef::BuiltIn(b) => serializer.serialize_str(b.as_str()),
            ValidatorRef::Named(name) => serializer.serialize_str(name),
            ValidatorRef::Custom(_) => Err(serde::ser::Error::custom(
                "closure validators cannot be serialized",
            )),
        }
    }
}
