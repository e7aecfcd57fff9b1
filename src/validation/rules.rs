//! Field rules of the four-step listing form.

use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

use super::business_hours::time_to_minutes;
use super::types::{FieldValidation, ValidationTrigger};
use crate::types::FormSnapshot;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email pattern"));

static URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^https?://(www\.)?[-a-zA-Z0-9@:%._\+~#=]{1,256}\.[a-zA-Z0-9()]{1,6}\b([-a-zA-Z0-9()@:%_\+.~#?&//=]*)$",
    )
    .expect("valid url pattern")
});

const LISTING_TYPES: [&str; 3] = ["Eatery", "Catering", "Food Truck"];
const KOSHER_CATEGORIES: [&str; 3] = ["Meat", "Dairy", "Pareve"];
const MAX_IMAGES: usize = 10;

/// Checks one field's value; the snapshot supplies cross-field context.
pub type Validator = fn(Option<&Value>, &FormSnapshot) -> FieldValidation;

#[derive(Clone, Copy, Debug)]
pub struct ValidationRule {
    pub field: &'static str,
    pub step: u32,
    pub required: bool,
    pub trigger: ValidationTrigger,
    pub validator: Validator,
}

impl ValidationRule {
    pub fn check(&self, value: Option<&Value>, snapshot: &FormSnapshot) -> FieldValidation {
        (self.validator)(value, snapshot)
    }

    /// Checks the field's stored value.
    pub fn check_snapshot(&self, snapshot: &FormSnapshot) -> FieldValidation {
        self.check(snapshot.get(self.field), snapshot)
    }
}

fn text(value: Option<&Value>) -> Option<&str> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Numbers and numeric strings; anything else reads as absent.
fn number(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn length_between(
    value: Option<&Value>,
    min: usize,
    max: usize,
    missing: &str,
    too_short: &str,
    too_long: &str,
) -> FieldValidation {
    let Some(value) = text(value) else {
        return FieldValidation::invalid(missing);
    };
    let len = value.chars().count();
    if len < min {
        FieldValidation::invalid(too_short)
    } else if len > max {
        FieldValidation::invalid(too_long)
    } else {
        FieldValidation::valid()
    }
}

fn one_of(value: Option<&Value>, options: &[&str], error: &str) -> FieldValidation {
    match value.and_then(Value::as_str) {
        Some(choice) if options.contains(&choice) => FieldValidation::valid(),
        _ => FieldValidation::invalid(error),
    }
}

fn in_range(value: Option<&Value>, max: f64, error: &str) -> FieldValidation {
    match number(value) {
        Some(n) if n != 0.0 && !(0.0..=max).contains(&n) => FieldValidation::invalid(error),
        _ => FieldValidation::valid(),
    }
}

fn social_link(value: Option<&Value>, domain: &str, error: &str) -> FieldValidation {
    match text(value) {
        Some(link) if !link.contains(domain) => FieldValidation::invalid(error),
        _ => FieldValidation::valid(),
    }
}

fn name(value: Option<&Value>, _: &FormSnapshot) -> FieldValidation {
    length_between(
        value,
        2,
        100,
        "Business name is required",
        "Business name must be at least 2 characters",
        "Business name must be less than 100 characters",
    )
}

fn address(value: Option<&Value>, _: &FormSnapshot) -> FieldValidation {
    match text(value) {
        None => FieldValidation::invalid("Business address is required"),
        Some(address) if address.chars().count() < 10 => {
            FieldValidation::invalid("Please enter a complete address")
        }
        Some(_) => FieldValidation::valid(),
    }
}

fn phone(value: Option<&Value>, _: &FormSnapshot) -> FieldValidation {
    let Some(value) = text(value) else {
        return FieldValidation::invalid("Phone number is required");
    };
    let digits = value.chars().filter(char::is_ascii_digit).count();
    if digits < 10 {
        FieldValidation::invalid("Please enter a valid phone number")
    } else if digits > 15 {
        FieldValidation::invalid("Phone number is too long")
    } else {
        FieldValidation::valid()
    }
}

fn business_email(value: Option<&Value>, _: &FormSnapshot) -> FieldValidation {
    match text(value) {
        None => FieldValidation::invalid("Business email is required"),
        Some(email) if !EMAIL_RE.is_match(email) => {
            FieldValidation::invalid("Please enter a valid email address")
        }
        Some(_) => FieldValidation::valid(),
    }
}

fn website(value: Option<&Value>, _: &FormSnapshot) -> FieldValidation {
    match text(value) {
        None => FieldValidation::suggest("Adding a website helps customers find you online"),
        Some(url) if !URL_RE.is_match(url) => FieldValidation::invalid(
            "Please enter a valid website URL (include http:// or https://)",
        ),
        Some(_) => FieldValidation::valid(),
    }
}

fn listing_type(value: Option<&Value>, _: &FormSnapshot) -> FieldValidation {
    one_of(value, &LISTING_TYPES, "Please select a valid listing type")
}

fn kosher_category(value: Option<&Value>, _: &FormSnapshot) -> FieldValidation {
    one_of(value, &KOSHER_CATEGORIES, "Please select a kosher category")
}

fn certifying_agency(value: Option<&Value>, snapshot: &FormSnapshot) -> FieldValidation {
    if text(value).is_none() && snapshot.text("custom_certifying_agency").is_none() {
        return FieldValidation::invalid("Please select or enter a certifying agency");
    }
    FieldValidation::valid()
}

fn short_description(value: Option<&Value>, _: &FormSnapshot) -> FieldValidation {
    length_between(
        value,
        10,
        80,
        "Short description is required",
        "Short description must be at least 10 characters",
        "Short description must be 80 characters or less",
    )
}

fn description(value: Option<&Value>, _: &FormSnapshot) -> FieldValidation {
    match text(value) {
        None => FieldValidation::suggest(
            "A detailed description helps customers understand your business better",
        ),
        Some(text) if text.chars().count() > 2000 => {
            FieldValidation::invalid("Description must be 2000 characters or less")
        }
        Some(_) => FieldValidation::valid(),
    }
}

fn is_open_with_times(day: &Value) -> bool {
    let closed = day.get("isClosed").and_then(Value::as_bool).unwrap_or(false);
    let has = |key: &str| {
        day.get(key)
            .and_then(Value::as_str)
            .is_some_and(|time| !time.is_empty())
    };
    !closed && has("openTime") && has("closeTime")
}

fn business_hours(value: Option<&Value>, _: &FormSnapshot) -> FieldValidation {
    let Some(days) = value.and_then(Value::as_array) else {
        return FieldValidation::invalid("Business hours are required");
    };
    if !days.iter().any(is_open_with_times) {
        return FieldValidation::invalid("At least one day must have operating hours");
    }

    for day in days.iter().filter(|day| is_open_with_times(day)) {
        let minutes = |key: &str| day.get(key).and_then(Value::as_str).and_then(time_to_minutes);
        if let (Some(open), Some(close)) = (minutes("openTime"), minutes("closeTime")) {
            if close <= open {
                let name = day.get("day").and_then(Value::as_str).unwrap_or_default();
                return FieldValidation::invalid(format!(
                    "{name}: Closing time must be after opening time"
                ));
            }
        }
    }
    FieldValidation::valid()
}

fn seating_capacity(value: Option<&Value>, _: &FormSnapshot) -> FieldValidation {
    in_range(value, 1000.0, "Seating capacity must be between 0 and 1000")
}

fn years_in_business(value: Option<&Value>, _: &FormSnapshot) -> FieldValidation {
    in_range(value, 100.0, "Years in business must be between 0 and 100")
}

fn instagram_link(value: Option<&Value>, _: &FormSnapshot) -> FieldValidation {
    social_link(value, "instagram.com", "Please enter a valid Instagram URL")
}

fn facebook_link(value: Option<&Value>, _: &FormSnapshot) -> FieldValidation {
    social_link(value, "facebook.com", "Please enter a valid Facebook URL")
}

fn tiktok_link(value: Option<&Value>, _: &FormSnapshot) -> FieldValidation {
    social_link(value, "tiktok.com", "Please enter a valid TikTok URL")
}

fn business_images(value: Option<&Value>, _: &FormSnapshot) -> FieldValidation {
    let count = value.and_then(Value::as_array).map_or(0, Vec::len);
    if count == 0 {
        FieldValidation::suggest(
            "Adding photos helps customers see your business and increases engagement",
        )
    } else if count > MAX_IMAGES {
        FieldValidation::invalid("Maximum 10 images allowed")
    } else {
        FieldValidation::valid()
    }
}

fn rule(
    field: &'static str,
    step: u32,
    required: bool,
    trigger: ValidationTrigger,
    validator: Validator,
) -> ValidationRule {
    ValidationRule {
        field,
        step,
        required,
        trigger,
        validator,
    }
}

pub fn listing_rules() -> Vec<ValidationRule> {
    use ValidationTrigger::{OnBlur, OnChange};
    vec![
        // Basic info
        rule("name", 1, true, OnBlur, name),
        rule("address", 1, true, OnBlur, address),
        rule("phone", 1, true, OnBlur, phone),
        rule("business_email", 1, true, OnBlur, business_email),
        rule("website", 1, false, OnBlur, website),
        rule("listing_type", 1, true, OnChange, listing_type),
        // Kosher certification
        rule("kosher_category", 2, true, OnChange, kosher_category),
        rule("certifying_agency", 2, true, OnBlur, certifying_agency),
        // Business details
        rule("short_description", 3, true, OnBlur, short_description),
        rule("description", 3, false, OnBlur, description),
        rule("business_hours", 3, true, OnChange, business_hours),
        rule("seating_capacity", 3, false, OnBlur, seating_capacity),
        rule("years_in_business", 3, false, OnBlur, years_in_business),
        rule("instagram_link", 3, false, OnBlur, instagram_link),
        rule("facebook_link", 3, false, OnBlur, facebook_link),
        rule("tiktok_link", 3, false, OnBlur, tiktok_link),
        // Photos
        rule("business_images", 4, false, OnChange, business_images),
    ]
}
