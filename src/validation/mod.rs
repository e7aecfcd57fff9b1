//! Field, step and whole-form validation of a listing draft, plus the
//! standalone weekly-hours rule engine.

pub mod business_hours;
mod engine;
mod rules;
mod types;

pub use business_hours::{
    BusinessHours, BusinessHoursValidator, DayHours, HoursReport, HoursRule,
    validate_business_hours,
};
pub use engine::ValidationEngine;
pub use rules::{ValidationRule, Validator, listing_rules};
pub use types::{
    FieldChangeValidation, FieldValidation, FormValidation, StepCompletionStatus, StepValidation,
    ValidationSummary, ValidationTrigger,
};
