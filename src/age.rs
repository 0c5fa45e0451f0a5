//! Age strings.
//!
//! A valid age is `na`, one of the HPO onset labels, an ISO-8601 duration
//! restricted to years/months/days (`P2Y6M`), or a gestational age
//! (`G20w`, `G20w3d`). Free text such as "2.5 years" can be converted into the
//! ISO form with [`parse_age_to_iso8601`].

use std::sync::OnceLock;

use regex::Regex;

pub const NOT_AVAILABLE: &str = "na";

pub const ONSET_TERMS: [&str; 19] = [
    "Antenatal onset",
    "Embryonal onset",
    "Fetal onset",
    "Late first trimester onset",
    "Second trimester onset",
    "Third trimester onset",
    "Congenital onset",
    "Pediatric onset",
    "Neonatal onset",
    "Infantile onset",
    "Childhood onset",
    "Juvenile onset",
    "Adult onset",
    "Young adult onset",
    "Early young adult onset",
    "Intermediate young adult onset",
    "Late young adult onset",
    "Middle age onset",
    "Late onset",
];

fn iso_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^P(\d+Y)?(\d+M)?(\d+D)?$").expect("valid ISO age regex"))
}

fn gestational_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^G\d{1,2}w([0-6]d)?$").expect("valid gestational regex"))
}

fn year_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(\d+(?:\.\d+)?)\s*(y|year|years)\b").expect("valid year regex")
    })
}

fn month_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(\d+(?:\.\d+)?)\s*(m|month|months)\b").expect("valid month regex")
    })
}

fn day_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(\d+)\s*(d|day|days)\b").expect("valid day regex"))
}

pub fn is_iso8601_age(value: &str) -> bool {
    value.len() > 1 && iso_pattern().is_match(value)
}

pub fn is_gestational_age(value: &str) -> bool {
    gestational_pattern().is_match(value)
}

pub fn is_onset_term(value: &str) -> bool {
    ONSET_TERMS.contains(&value)
}

/// Exact-match validation of the age grammar.
pub fn is_valid_age(value: &str) -> bool {
    value == NOT_AVAILABLE
        || is_onset_term(value)
        || is_iso8601_age(value)
        || is_gestational_age(value)
}

/// Returns the canonical spelling of an onset label, ignoring case.
pub fn canonical_onset_term(value: &str) -> Option<&'static str> {
    let needle = value.trim();
    ONSET_TERMS
        .iter()
        .copied()
        .find(|term| term.eq_ignore_ascii_case(needle))
}

/// Upper bound for any age a free-text or numeric value may convert to.
pub const MAX_AGE_YEARS: f64 = 150.0;

/// Converts free text such as "2.5 years" or "3 months 4 days" to `P2Y6M` /
/// `P3M4D`. Returns `None` when nothing usable is found or the total exceeds
/// [`MAX_AGE_YEARS`].
pub fn parse_age_to_iso8601(value: &str) -> Option<String> {
    let lower = value.trim().to_lowercase();

    let years_raw = capture_number(year_pattern(), &lower);
    let months_raw = capture_number(month_pattern(), &lower);
    let days_raw = capture_number(day_pattern(), &lower);
    let total = years_raw.unwrap_or(0.0)
        + months_raw.unwrap_or(0.0) / 12.0
        + days_raw.unwrap_or(0.0) / 365.0;
    if !within_lifespan(total) {
        return None;
    }

    if let Some(raw) = years_raw
        && !lower.contains("month")
        && !lower.contains("day")
    {
        let (years, months) = split_years(raw);
        return format_duration(years, months, 0);
    }

    let (years, extra_months) = split_years(years_raw.unwrap_or(0.0));
    let months = months_raw.map(|m| m.floor() as u64).unwrap_or(0) + extra_months;
    let days = days_raw.map(|d| d as u64).unwrap_or(0);
    format_duration(years, months, days)
}

/// Interprets a bare number as years; anything already valid is kept.
pub fn parse_age_assume_years(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if is_valid_age(trimmed) {
        return Some(trimmed.to_string());
    }
    let number = trimmed.parse::<f64>().ok().filter(|n| within_lifespan(*n))?;
    let (years, months) = split_years(number);
    format_duration(years, months, 0)
}

/// Element-wise age mapping: keeps valid ages, normalizes onset label case,
/// and falls back to free-text parsing.
pub fn map_age(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if is_valid_age(trimmed) {
        return Some(trimmed.to_string());
    }
    if let Some(term) = canonical_onset_term(trimmed) {
        return Some(term.to_string());
    }
    if trimmed.eq_ignore_ascii_case(NOT_AVAILABLE) {
        return Some(NOT_AVAILABLE.to_string());
    }
    parse_age_to_iso8601(trimmed)
}

/// Element-wise age validation without any conversion.
pub fn validate_age(value: &str) -> Option<String> {
    let trimmed = value.trim();
    is_valid_age(trimmed).then(|| trimmed.to_string())
}

fn capture_number(pattern: &Regex, text: &str) -> Option<f64> {
    pattern
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
}

fn within_lifespan(years: f64) -> bool {
    years.is_finite() && (0.0..=MAX_AGE_YEARS).contains(&years)
}

fn split_years(raw: f64) -> (u64, u64) {
    let mut years = raw.floor() as u64;
    let mut months = ((raw - raw.floor()) * 12.0).round() as u64;
    if months >= 12 {
        years += 1;
        months -= 12;
    }
    (years, months)
}

fn format_duration(years: u64, months: u64, days: u64) -> Option<String> {
    let mut result = String::from("P");
    if years > 0 {
        result.push_str(&format!("{years}Y"));
    }
    if months > 0 {
        result.push_str(&format!("{months}M"));
    }
    if days > 0 {
        result.push_str(&format!("{days}D"));
    }
    (result.len() > 1).then_some(result)
}
