//! Rule engine for a weekly opening-hours table.
//!
//! Rules run in priority order and their reports are merged: later rules
//! overwrite a day's message, suggestions are de-duplicated, and any failing
//! rule makes the whole table invalid. Warnings and suggestions never do.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::LazyLock;

static TIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-1]?[0-9]|2[0-3]):[0-5][0-9]$").expect("valid time pattern")
});

const WEEKDAYS: [&str; 5] = ["Monday", "Tuesday", "Wednesday", "Thursday", "Friday"];
const WEEKEND: [&str; 2] = ["Saturday", "Sunday"];

const EARLY_OPENING: u32 = 5 * 60;
const LATE_CLOSING_NEXT_DAY: u32 = 2 * 60;
const LONG_DAY: i64 = 16 * 60;
const SHORT_DAY: i64 = 2 * 60;
const MINUTES_PER_DAY: i64 = 24 * 60;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayHours {
    pub day: String,
    #[serde(default)]
    pub is_open: bool,
    #[serde(default)]
    pub open_time: String,
    #[serde(default)]
    pub close_time: String,
    /// Closing time falls after midnight.
    #[serde(default)]
    pub is_next_day: bool,
}

impl DayHours {
    pub fn open(day: &str, open_time: &str, close_time: &str) -> Self {
        Self {
            day: day.to_string(),
            is_open: true,
            open_time: open_time.to_string(),
            close_time: close_time.to_string(),
            is_next_day: false,
        }
    }

    pub fn closed(day: &str) -> Self {
        Self {
            day: day.to_string(),
            ..Self::default()
        }
    }

    pub fn next_day(mut self) -> Self {
        self.is_next_day = true;
        self
    }

    fn has_times(&self) -> bool {
        !self.open_time.is_empty() && !self.close_time.is_empty()
    }
}

/// Day name to that day's hours.
pub type BusinessHours = BTreeMap<String, DayHours>;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HoursReport {
    pub is_valid: bool,
    pub errors: BTreeMap<String, String>,
    pub warnings: BTreeMap<String, String>,
    pub suggestions: Vec<String>,
}

impl Default for HoursReport {
    fn default() -> Self {
        Self {
            is_valid: true,
            errors: BTreeMap::new(),
            warnings: BTreeMap::new(),
            suggestions: Vec::new(),
        }
    }
}

impl HoursReport {
    fn from_errors(errors: BTreeMap<String, String>, suggestion: &str) -> Self {
        let failed = !errors.is_empty();
        Self {
            is_valid: !failed,
            errors,
            suggestions: if failed {
                vec![suggestion.to_string()]
            } else {
                Vec::new()
            },
            ..Self::default()
        }
    }

    fn suggest(&mut self, suggestion: &str) {
        if !self.suggestions.iter().any(|s| s == suggestion) {
            self.suggestions.push(suggestion.to_string());
        }
    }

    fn absorb(&mut self, other: HoursReport) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
        for suggestion in &other.suggestions {
            self.suggest(suggestion);
        }
        self.is_valid &= other.is_valid;
    }
}

#[derive(Clone, Copy, Debug)]
pub struct HoursRule {
    pub name: &'static str,
    /// Lower runs first.
    pub priority: u8,
    pub check: fn(&BusinessHours) -> HoursReport,
}

/// `"HH:MM"` to minutes after midnight; `None` when either part is not a
/// number or falls outside a 24-hour clock.
pub fn time_to_minutes(time: &str) -> Option<u32> {
    let (hours, minutes) = time.split_once(':')?;
    let hours: u32 = hours.trim().parse().ok()?;
    let minutes: u32 = minutes.trim().parse().ok()?;
    if hours > 23 || minutes > 59 {
        return None;
    }
    Some(hours * 60 + minutes)
}

pub fn minutes_to_time(minutes: u32) -> String {
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

/// `"13:05"` becomes `"1:05 PM"`. Unparseable input is returned unchanged.
pub fn format_time_for_display(time: &str) -> String {
    let Some(total) = time_to_minutes(time) else {
        return time.to_string();
    };
    let (hours, minutes) = (total / 60, total % 60);
    let period = if hours >= 12 { "PM" } else { "AM" };
    let display = match hours {
        0 => 12,
        h if h > 12 => h - 12,
        h => h,
    };
    format!("{display}:{minutes:02} {period}")
}

fn open_days(hours: &BusinessHours) -> impl Iterator<Item = &DayHours> {
    hours.values().filter(|day| day.is_open)
}

fn at_least_one_day_open(hours: &BusinessHours) -> HoursReport {
    if open_days(hours).next().is_some() {
        return HoursReport::default();
    }
    HoursReport {
        is_valid: false,
        errors: BTreeMap::from([(
            "general".to_string(),
            "At least one day must be open".to_string(),
        )]),
        suggestions: vec!["Consider setting standard business hours for weekdays".to_string()],
        ..HoursReport::default()
    }
}

fn required_times_for_open_days(hours: &BusinessHours) -> HoursReport {
    let errors = open_days(hours)
        .filter(|day| !day.has_times())
        .map(|day| {
            (
                day.day.clone(),
                "Both opening and closing times are required".to_string(),
            )
        })
        .collect();
    HoursReport::from_errors(errors, "Set both opening and closing times for all open days")
}

fn valid_time_format(hours: &BusinessHours) -> HoursReport {
    let mut report = HoursReport::default();
    for day in open_days(hours) {
        if !day.open_time.is_empty() && !TIME_RE.is_match(&day.open_time) {
            report
                .errors
                .insert(day.day.clone(), "Invalid opening time format".to_string());
        }
        if !day.close_time.is_empty() && !TIME_RE.is_match(&day.close_time) {
            report
                .errors
                .insert(day.day.clone(), "Invalid closing time format".to_string());
        }
    }
    report.is_valid = report.errors.is_empty();
    report
}

fn close_after_open(hours: &BusinessHours) -> HoursReport {
    let errors = open_days(hours)
        .filter(|day| day.has_times() && !day.is_next_day)
        .filter(|day| {
            match (time_to_minutes(&day.open_time), time_to_minutes(&day.close_time)) {
                (Some(open), Some(close)) => close <= open,
                _ => false,
            }
        })
        .map(|day| {
            (
                day.day.clone(),
                "Closing time must be after opening time, or enable \"Next Day\"".to_string(),
            )
        })
        .collect();
    HoursReport::from_errors(errors, "For late-night businesses, enable the \"Next Day\" option")
}

fn reasonable_hours(hours: &BusinessHours) -> HoursReport {
    let mut report = HoursReport::default();
    for day in open_days(hours).filter(|day| day.has_times()) {
        let (Some(open), Some(close)) =
            (time_to_minutes(&day.open_time), time_to_minutes(&day.close_time))
        else {
            continue;
        };

        if open < EARLY_OPENING {
            report.warnings.insert(
                day.day.clone(),
                format!("Very early opening time: {}", format_time_for_display(&day.open_time)),
            );
        }
        if day.is_next_day && close > LATE_CLOSING_NEXT_DAY {
            report.warnings.insert(
                day.day.clone(),
                format!(
                    "Very late closing time: {} next day",
                    format_time_for_display(&day.close_time)
                ),
            );
        }

        let (open, close) = (i64::from(open), i64::from(close));
        let total = if day.is_next_day {
            MINUTES_PER_DAY - open + close
        } else {
            close - open
        };
        if total > LONG_DAY {
            report.warnings.insert(
                day.day.clone(),
                format!("Very long operating hours: {} hours", total.div_euclid(60)),
            );
            report.suggest("Consider if such long hours are sustainable for your business");
        }
        if !day.is_next_day && total < SHORT_DAY {
            report.warnings.insert(
                day.day.clone(),
                format!("Very short operating hours: {} hours", total.div_euclid(60)),
            );
        }
    }
    report
}

fn inconsistent(hours: &BusinessHours, days: &[&str]) -> bool {
    let mut open = days
        .iter()
        .filter_map(|day| hours.get(*day))
        .filter(|day| day.is_open);
    let Some(first) = open.next() else {
        return false;
    };
    open.any(|day| day.open_time != first.open_time || day.close_time != first.close_time)
}

fn consistent_patterns(hours: &BusinessHours) -> HoursReport {
    let mut report = HoursReport::default();
    if inconsistent(hours, &WEEKDAYS) {
        report.suggest("Consider using consistent hours for all weekdays");
    }
    if inconsistent(hours, &WEEKEND) {
        report.suggest("Consider using consistent hours for weekends");
    }
    report
}

pub fn default_hours_rules() -> Vec<HoursRule> {
    vec![
        HoursRule {
            name: "atLeastOneDayOpen",
            priority: 1,
            check: at_least_one_day_open,
        },
        HoursRule {
            name: "requiredTimesForOpenDays",
            priority: 2,
            check: required_times_for_open_days,
        },
        HoursRule {
            name: "validTimeFormat",
            priority: 3,
            check: valid_time_format,
        },
        HoursRule {
            name: "closeAfterOpen",
            priority: 4,
            check: close_after_open,
        },
        HoursRule {
            name: "reasonableHours",
            priority: 5,
            check: reasonable_hours,
        },
        HoursRule {
            name: "consistentPatterns",
            priority: 6,
            check: consistent_patterns,
        },
    ]
}

#[derive(Clone, Debug)]
pub struct BusinessHoursValidator {
    rules: Vec<HoursRule>,
}

impl Default for BusinessHoursValidator {
    fn default() -> Self {
        Self::new(default_hours_rules())
    }
}

impl BusinessHoursValidator {
    pub fn new(mut rules: Vec<HoursRule>) -> Self {
        rules.sort_by_key(|rule| rule.priority);
        Self { rules }
    }

    pub fn validate_all(&self, hours: &BusinessHours) -> HoursReport {
        self.rules
            .iter()
            .fold(HoursReport::default(), |mut combined, rule| {
                combined.absorb((rule.check)(hours));
                combined
            })
    }

    /// Runs every rule against `day` alone.
    pub fn validate_day(&self, hours: &BusinessHours, day: &str) -> HoursReport {
        let Some(day_hours) = hours.get(day) else {
            return HoursReport {
                is_valid: false,
                errors: BTreeMap::from([(day.to_string(), "Day not found".to_string())]),
                ..HoursReport::default()
            };
        };
        let single = BusinessHours::from([(day.to_string(), day_hours.clone())]);
        self.validate_all(&single)
    }

    /// Validates `hours` with `day` replaced by `updated`.
    pub fn validate_change(
        &self,
        hours: &BusinessHours,
        day: &str,
        updated: DayHours,
    ) -> HoursReport {
        let mut hours = hours.clone();
        hours.insert(day.to_string(), updated);
        self.validate_all(&hours)
    }

    pub fn is_valid(&self, hours: &BusinessHours) -> bool {
        self.validate_all(hours).is_valid
    }
}

pub fn validate_business_hours(hours: &BusinessHours) -> HoursReport {
    BusinessHoursValidator::default().validate_all(hours)
}
