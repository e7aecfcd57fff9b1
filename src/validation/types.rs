use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The UI event that asked for validation. `OnSubmit` runs every rule.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ValidationTrigger {
    OnChange,
    #[default]
    OnBlur,
    OnSubmit,
}

impl ValidationTrigger {
    /// Whether a rule registered for `self` runs when `requested` fires.
    pub fn runs_on(self, requested: ValidationTrigger) -> bool {
        self == requested || requested == ValidationTrigger::OnSubmit
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldValidation {
    pub is_valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl Default for FieldValidation {
    fn default() -> Self {
        Self::valid()
    }
}

impl FieldValidation {
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            error: None,
            warning: None,
            suggestion: None,
        }
    }

    pub fn invalid(error: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            error: Some(error.into()),
            ..Self::valid()
        }
    }

    /// Valid, with a hint for a better listing.
    pub fn suggest(suggestion: impl Into<String>) -> Self {
        Self {
            suggestion: Some(suggestion.into()),
            ..Self::valid()
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepValidation {
    pub is_valid: bool,
    pub errors: BTreeMap<String, String>,
    pub warnings: BTreeMap<String, String>,
    pub suggestions: Vec<String>,
    pub completion_percentage: u8,
}

impl StepValidation {
    /// Result for a step with no rules.
    pub fn trivially_valid() -> Self {
        Self {
            is_valid: true,
            errors: BTreeMap::new(),
            warnings: BTreeMap::new(),
            suggestions: Vec::new(),
            completion_percentage: 100,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormValidation {
    pub is_valid: bool,
    pub step_results: BTreeMap<u32, StepValidation>,
    pub overall_errors: Vec<String>,
    pub overall_warnings: Vec<String>,
    /// Rounded mean of the per-step completion percentages.
    pub completion_percentage: u8,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationSummary {
    pub total_errors: usize,
    pub total_warnings: usize,
    pub completed_steps: usize,
    pub total_steps: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_required_field: Option<String>,
    pub ready_to_submit: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepCompletionStatus {
    pub is_complete: bool,
    pub has_errors: bool,
    pub has_warnings: bool,
    pub completion_percentage: u8,
    pub required_fields_completed: usize,
    pub total_required_fields: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldChangeValidation {
    pub field_result: FieldValidation,
    pub step_result: StepValidation,
    pub affected_steps: Vec<u32>,
}
