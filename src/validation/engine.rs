use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

use super::rules::{ValidationRule, listing_rules};
use super::types::{
    FieldChangeValidation, FieldValidation, FormValidation, StepCompletionStatus, StepValidation,
    ValidationSummary, ValidationTrigger,
};
use crate::types::{FormSnapshot, percentage};

/// Stateless evaluator over a fixed rule table. Nothing here mutates the
/// snapshot or performs I/O.
#[derive(Clone, Debug)]
pub struct ValidationEngine {
    rules: Vec<ValidationRule>,
    /// Field name to the first rule declared for it.
    by_field: HashMap<&'static str, usize>,
    /// Step number to its rules, in declaration order.
    by_step: BTreeMap<u32, Vec<usize>>,
}

impl Default for ValidationEngine {
    fn default() -> Self {
        Self::new(listing_rules())
    }
}

impl ValidationEngine {
    pub fn new(rules: Vec<ValidationRule>) -> Self {
        let mut by_field = HashMap::with_capacity(rules.len());
        let mut by_step: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
        for (index, rule) in rules.iter().enumerate() {
            by_field.entry(rule.field).or_insert(index);
            by_step.entry(rule.step).or_default().push(index);
        }
        Self {
            rules,
            by_field,
            by_step,
        }
    }

    pub fn rules(&self) -> &[ValidationRule] {
        &self.rules
    }

    fn rule_for(&self, field: &str) -> Option<&ValidationRule> {
        self.by_field.get(field).map(|&index| &self.rules[index])
    }

    fn step_rules(&self, step: u32) -> impl Iterator<Item = &ValidationRule> {
        self.by_step
            .get(&step)
            .into_iter()
            .flatten()
            .map(|&index| &self.rules[index])
    }

    /// Highest step any rule is tagged with.
    pub fn total_steps(&self) -> u32 {
        self.by_step.keys().next_back().copied().unwrap_or(0)
    }

    /// Unknown fields, and rules whose trigger does not match, are valid.
    pub fn validate_field(
        &self,
        field: &str,
        value: Option<&Value>,
        snapshot: &FormSnapshot,
        trigger: ValidationTrigger,
    ) -> FieldValidation {
        match self.rule_for(field) {
            Some(rule) if rule.trigger.runs_on(trigger) => rule.check(value, snapshot),
            _ => FieldValidation::valid(),
        }
    }

    /// Runs every rule of `step` regardless of trigger. Steps without rules
    /// are valid and 100% complete.
    pub fn validate_step(&self, step: u32, snapshot: &FormSnapshot) -> StepValidation {
        let mut result = StepValidation::trivially_valid();
        let (mut total, mut valid) = (0, 0);
        let (mut required, mut valid_required) = (0, 0);

        for rule in self.step_rules(step) {
            let outcome = rule.check_snapshot(snapshot);
            total += 1;
            if rule.required {
                required += 1;
                if outcome.is_valid {
                    valid_required += 1;
                }
            }
            if outcome.is_valid {
                valid += 1;
            } else if let Some(error) = outcome.error {
                result.errors.insert(rule.field.to_string(), error);
            }
            if let Some(warning) = outcome.warning {
                result.warnings.insert(rule.field.to_string(), warning);
            }
            if let Some(suggestion) = outcome.suggestion {
                if !result.suggestions.contains(&suggestion) {
                    result.suggestions.push(suggestion);
                }
            }
        }

        result.completion_percentage = percentage(valid, total);
        result.is_valid = result.errors.is_empty() && valid_required == required;
        result
    }

    pub fn validate_form(&self, snapshot: &FormSnapshot) -> FormValidation {
        let mut step_results = BTreeMap::new();
        let mut overall_errors: Vec<String> = Vec::new();
        let mut overall_warnings: Vec<String> = Vec::new();

        for step in 1..=self.total_steps() {
            let result = self.validate_step(step, snapshot);
            for error in result.errors.values() {
                if !overall_errors.contains(error) {
                    overall_errors.push(error.clone());
                }
            }
            for warning in result.warnings.values() {
                if !overall_warnings.contains(warning) {
                    overall_warnings.push(warning.clone());
                }
            }
            step_results.insert(step, result);
        }

        let is_valid = step_results.values().all(|step| step.is_valid);
        let completion_percentage = if step_results.is_empty() {
            100
        } else {
            let sum: u32 = step_results
                .values()
                .map(|step| u32::from(step.completion_percentage))
                .sum();
            (f64::from(sum) / step_results.len() as f64).round() as u8
        };

        FormValidation {
            is_valid,
            step_results,
            overall_errors,
            overall_warnings,
            completion_percentage,
        }
    }

    /// Progress view; `next_required_field` is the first required field
    /// with an error, in step then rule order.
    pub fn get_validation_summary(&self, snapshot: &FormSnapshot) -> ValidationSummary {
        let form = self.validate_form(snapshot);
        let next_required_field = form.step_results.iter().find_map(|(step, result)| {
            self.step_rules(*step)
                .find(|rule| rule.required && result.errors.contains_key(rule.field))
                .map(|rule| rule.field.to_string())
        });

        ValidationSummary {
            total_errors: form.overall_errors.len(),
            total_warnings: form.overall_warnings.len(),
            completed_steps: form.step_results.values().filter(|s| s.is_valid).count(),
            total_steps: form.step_results.len(),
            next_required_field,
            ready_to_submit: form.is_valid,
        }
    }

    pub fn get_step_completion_status(
        &self,
        step: u32,
        snapshot: &FormSnapshot,
    ) -> StepCompletionStatus {
        let result = self.validate_step(step, snapshot);
        let (completed, total) = self
            .step_rules(step)
            .filter(|rule| rule.required)
            .fold((0, 0), |(completed, total), rule| {
                let ok = rule.check_snapshot(snapshot).is_valid;
                (completed + usize::from(ok), total + 1)
            });

        StepCompletionStatus {
            is_complete: result.is_valid,
            has_errors: !result.errors.is_empty(),
            has_warnings: !result.warnings.is_empty(),
            completion_percentage: result.completion_percentage,
            required_fields_completed: completed,
            total_required_fields: total,
        }
    }

    /// Validates `field` as if it held `value`, then the step it belongs to
    /// (step 1 for unknown fields).
    pub fn validate_field_change(
        &self,
        field: &str,
        value: Value,
        snapshot: &FormSnapshot,
        trigger: ValidationTrigger,
    ) -> FieldChangeValidation {
        let updated = snapshot.clone().with(field, value);
        let field_result = self.validate_field(field, updated.get(field), &updated, trigger);
        let step = self.rule_for(field).map_or(1, |rule| rule.step);

        FieldChangeValidation {
            field_result,
            step_result: self.validate_step(step, &updated),
            affected_steps: vec![step],
        }
    }
}
