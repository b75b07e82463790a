//! Input checks run before any provider is contacted.

use crate::core::error::{Error, Result};
use chrono::{Datelike, Utc};

/// Earliest year the World Bank publishes indicator data for.
pub const MIN_YEAR: i32 = 1960;

/// Upper bound on amounts, keeps downstream multiplication finite.
pub const MAX_AMOUNT: f64 = 1e15;

pub fn validate_country_code(code: &str) -> Result<()> {
    validate_code(code, 2, "country code", "country_code")
}

pub fn validate_currency_code(code: &str) -> Result<()> {
    validate_code(code, 3, "currency code", "currency_code")
}

fn validate_code(code: &str, len: usize, label: &str, field: &str) -> Result<()> {
    if code.chars().count() != len {
        return Err(
            Error::invalid_input(format!("{label} must be {len} characters"))
                .with_context(field, code),
        );
    }
    if !code.chars().all(|c| c.is_ascii_uppercase()) {
        return Err(
            Error::invalid_input(format!("{label} must be uppercase letters"))
                .with_context(field, code),
        );
    }
    Ok(())
}

pub fn validate_amount(amount: f64) -> Result<()> {
    if amount.is_nan() {
        return Err(Error::invalid_input("amount must be a number").with_context("amount", amount));
    }
    if amount < 0.0 {
        return Err(Error::invalid_input("amount cannot be negative").with_context("amount", amount));
    }
    if amount == 0.0 {
        return Err(Error::invalid_input("amount cannot be zero").with_context("amount", amount));
    }
    if amount > MAX_AMOUNT {
        return Err(Error::invalid_input("amount is too large").with_context("amount", amount));
    }
    Ok(())
}

pub fn validate_year_range(start_year: i32, end_year: i32) -> Result<()> {
    let current_year = current_year();

    if start_year < MIN_YEAR {
        return Err(Error::invalid_input(format!(
            "start year cannot be before {MIN_YEAR} (World Bank data limitation)"
        ))
        .with_context("start_year", start_year));
    }
    if end_year > current_year + 1 {
        return Err(Error::invalid_input("end year cannot be in the future")
            .with_context("end_year", end_year)
            .with_context("current_year", current_year));
    }
    if start_year > end_year {
        return Err(
            Error::invalid_input("start year must be before or equal to end year")
                .with_context("start_year", start_year)
                .with_context("end_year", end_year),
        );
    }
    Ok(())
}

pub(crate) fn current_year() -> i32 {
    Utc::now().year()
}
