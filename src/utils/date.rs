// src/utils/date.rs

//! Spanish long-form date rendering ("22 de abril de 1997").

use std::sync::LazyLock;

use chrono::{Datelike, NaiveDate};
use regex::Regex;

const MONTHS: [&str; 12] = [
    "enero",
    "febrero",
    "marzo",
    "abril",
    "mayo",
    "junio",
    "julio",
    "agosto",
    "septiembre",
    "octubre",
    "noviembre",
    "diciembre",
];

static ISO_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})-(\d{1,2})-(\d{1,2})$").expect("iso date regex"));

static DAY_FIRST_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{1,2})[/.\-](\d{1,2})[/.\-](\d{4}|\d{2})$").expect("day-first date regex")
});

static DIGITS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").expect("digits regex"));

/// Whether the text already reads like "22 de abril de 1997".
pub fn is_long_form(text: &str) -> bool {
    let lower = text.to_lowercase();
    lower.contains(" de ") && MONTHS.iter().any(|m| lower.contains(m))
}

/// Render a portal date as a Spanish long-form date.
///
/// Accepts `dd/mm/yyyy`, `dd-mm-yyyy`, `dd.mm.yyyy`, `yyyy-mm-dd` and
/// two-digit years; anything else, including already converted text, is
/// returned unchanged.
pub fn format_date_es(value: &str) -> String {
    if value.trim().is_empty() || is_long_form(value) {
        return value.to_string();
    }

    match parse_date(value.trim()) {
        Some(date) => format!(
            "{} de {} de {}",
            date.day(),
            MONTHS[date.month0() as usize],
            date.year()
        ),
        None => value.to_string(),
    }
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    if let Some(caps) = ISO_RE.captures(value) {
        return build_date(&caps[3], &caps[2], &caps[1]);
    }
    if let Some(caps) = DAY_FIRST_RE.captures(value) {
        return build_date(&caps[1], &caps[2], &caps[3]);
    }

    // Loose fallback: any three digit groups in day, month, year order.
    let groups: Vec<&str> = DIGITS_RE.find_iter(value).map(|m| m.as_str()).collect();
    match groups.as_slice() {
        [day, month, year] => build_date(day, month, year),
        _ => None,
    }
}

fn build_date(day: &str, month: &str, year: &str) -> Option<NaiveDate> {
    let mut year_num: i32 = year.parse().ok()?;
    if year.len() == 2 {
        year_num += if year_num >= 50 { 1900 } else { 2000 };
    }
    NaiveDate::from_ymd_opt(year_num, month.parse().ok()?, day.parse().ok()?)
}
