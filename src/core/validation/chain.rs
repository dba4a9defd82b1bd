//! Ordered validation of filter arguments

use super::validators::{self, RecordLookup};
use super::{BuiltInValidator, ValidationOutcome, Validator};
use crate::core::filter::FilterArgs;
use crate::core::messages::{self, Translator};

/// Everything a validator may need besides the arguments
pub struct ValidationContext<'a> {
    /// Snake-cased model name, used for argument labels
    pub model_key: &'a str,
    pub scope: &'a str,
    pub translator: &'a dyn Translator,
    pub records: Option<&'a dyn RecordLookup>,
}

/// The validators registered for one filter, run in order
#[derive(Clone, Default)]
pub struct ValidationChain {
    validators: Vec<Validator>,
}

impl ValidationChain {
    pub fn new(validators: Vec<Validator>) -> Self {
        Self { validators }
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    pub fn validators(&self) -> &[Validator] {
        &self.validators
    }

    /// Run every validator and collect their messages, deduplicated in order
    pub fn run(&self, ctx: &ValidationContext<'_>, args: &FilterArgs) -> Vec<String> {
        let mut errors: Vec<String> = Vec::new();

        for validator in &self.validators {
            let outcome = match validator {
                Validator::BuiltIn(builtin) => run_builtin(*builtin, ctx, args),
                Validator::Custom(method) => method(args),
            };

            for message in outcome.into_messages(ctx.translator) {
                if !errors.contains(&message) {
                    errors.push(message);
                }
            }
        }

        errors
    }

    pub fn is_valid(&self, ctx: &ValidationContext<'_>, args: &FilterArgs) -> bool {
        self.run(ctx, args).is_empty()
    }
}

fn run_builtin(
    builtin: BuiltInValidator,
    ctx: &ValidationContext<'_>,
    args: &FilterArgs,
) -> ValidationOutcome {
    match builtin {
        BuiltInValidator::AllPresent => {
            validate_all(ctx, args, messages::BLANK, validators::present())
        }
        BuiltInValidator::AllDates => {
            validate_all(ctx, args, messages::INVALID_DATE, validators::date())
        }
        BuiltInValidator::RecordExistence => match ctx.records {
            Some(records) => validate_all(
                ctx,
                args,
                messages::INVALID_RECORD,
                validators::record_reference(records),
            ),
            None => ValidationOutcome::Failed,
        },
    }
}

fn validate_all(
    ctx: &ValidationContext<'_>,
    args: &FilterArgs,
    message_key: &str,
    check: impl Fn(&str, &str) -> bool,
) -> ValidationOutcome {
    let errors: Vec<String> = args
        .iter()
        .filter(|(name, value)| !check(name, value))
        .map(|(name, value)| {
            let label = ctx
                .translator
                .arg_label(ctx.model_key, ctx.scope, name)
                .unwrap_or_else(|| name.clone());
            ctx.translator.message(
                message_key,
                &[("arg_name", label.as_str()), ("arg_value", value.as_str())],
            )
        })
        .collect();

    ValidationOutcome::Messages(errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::messages::MessageCatalog;
    use std::sync::Arc;

    fn args(pairs: &[(&str, &str)]) -> FilterArgs {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn ctx<'a>(catalog: &'a MessageCatalog) -> ValidationContext<'a> {
        ValidationContext {
            model_key: "order",
            scope: "date_range",
            translator: catalog,
            records: None,
        }
    }

    #[test]
    fn test_all_dates_reports_offending_arg() {
        let catalog = MessageCatalog::new();
        let chain = ValidationChain::new(vec![Validator::BuiltIn(BuiltInValidator::AllDates)]);
        let errors = chain.run(
            &ctx(&catalog),
            &args(&[("start_date", "not-a-date"), ("end_date", "2024-01-01")]),
        );

        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("start_date"));
        assert!(errors[0].contains("not-a-date"));
    }

    #[test]
    fn test_messages_of_all_validators_are_concatenated() {
        let catalog = MessageCatalog::new();
        let custom: Validator = Validator::Custom(Arc::new(|_: &FilterArgs| {
            ValidationOutcome::Messages(vec!["range too long".to_string()])
        }));
        let chain = ValidationChain::new(vec![
            Validator::BuiltIn(BuiltInValidator::AllPresent),
            custom,
        ]);

        let errors = chain.run(&ctx(&catalog), &args(&[("text", " ")]));
        assert_eq!(errors, vec!["text must not be blank", "range too long"]);
    }

    #[test]
    fn test_boolean_failure_maps_to_general_error() {
        let catalog = MessageCatalog::new();
        let chain = ValidationChain::new(vec![Validator::Custom(Arc::new(|_: &FilterArgs| {
            ValidationOutcome::from(false)
        }))]);

        let errors = chain.run(&ctx(&catalog), &FilterArgs::new());
        assert_eq!(errors, vec!["The filter arguments are invalid"]);
    }

    #[test]
    fn test_duplicate_messages_collapse() {
        let catalog = MessageCatalog::new();
        let failing: Validator = Validator::Custom(Arc::new(|_: &FilterArgs| false.into()));
        let chain = ValidationChain::new(vec![failing.clone(), failing]);

        assert_eq!(chain.run(&ctx(&catalog), &FilterArgs::new()).len(), 1);
    }

    #[test]
    fn test_empty_chain_is_valid() {
        let catalog = MessageCatalog::new();
        let chain = ValidationChain::default();
        assert!(chain.is_valid(&ctx(&catalog), &args(&[("anything", "")])));
    }

    #[test]
    fn test_arg_label_is_used_when_translated() {
        let catalog = MessageCatalog::new()
            .with_messages([("scope_filters.args.order.date_range.start_date", "Start")]);
        let chain = ValidationChain::new(vec![Validator::BuiltIn(BuiltInValidator::AllDates)]);

        let errors = chain.run(&ctx(&catalog), &args(&[("start_date", "x")]));
        assert_eq!(errors, vec!["Start is not a valid date: 'x'"]);
    }
}
