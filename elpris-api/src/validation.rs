//! Validation Traits and Query Parameter Parsers
//!
//! Route handlers receive every query parameter as an optional string and
//! turn it into a typed value here, so a malformed request always produces
//! the [`ApiError`] envelope rather than an extractor rejection.

use chrono::NaiveDate;
use elpris_core::{PriceArea, DEFAULT_CHARGE_TYPE};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::json;

use crate::error::{ApiError, ApiResult};

static GLN_PATTERN: Lazy<Result<Regex, regex::Error>> = Lazy::new(|| Regex::new(r"^[0-9]{13}$"));
static DATE_PATTERN: Lazy<Result<Regex, regex::Error>> =
    Lazy::new(|| Regex::new(r"^[0-9]{4}-[0-9]{2}-[0-9]{2}$"));
static CODE_PATTERN: Lazy<Result<Regex, regex::Error>> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.\-]{1,32}$"));

/// Default and bounds for the `limit` parameter of the price list route.
pub const DEFAULT_PRICE_LIST_LIMIT: u32 = 500;
pub const MAX_PRICE_LIST_LIMIT: u32 = 1000;

fn matches(pattern: &Lazy<Result<Regex, regex::Error>>, value: &str) -> bool {
    match pattern.as_ref() {
        Ok(regex) => regex.is_match(value),
        Err(e) => {
            tracing::error!(error = %e, "Validation pattern failed to compile");
            false
        }
    }
}

/// Trait for validating non-empty strings.
///
/// # Example
/// ```ignore
/// use elpris_api::validation::ValidateNonEmpty;
///
/// fn lookup(gln: &str) -> ApiResult<()> {
///     gln.validate_non_empty("gln")?;
///     // ... rest of logic
/// }
/// ```
pub trait ValidateNonEmpty {
    /// Returns `ApiError::missing_field` if the value is absent, empty or
    /// whitespace-only.
    fn validate_non_empty(&self, field_name: &str) -> ApiResult<()>;
}

impl ValidateNonEmpty for str {
    fn validate_non_empty(&self, field_name: &str) -> ApiResult<()> {
        if self.trim().is_empty() {
            return Err(ApiError::missing_field(field_name));
        }
        Ok(())
    }
}

impl ValidateNonEmpty for &str {
    fn validate_non_empty(&self, field_name: &str) -> ApiResult<()> {
        (*self).validate_non_empty(field_name)
    }
}

impl ValidateNonEmpty for String {
    fn validate_non_empty(&self, field_name: &str) -> ApiResult<()> {
        self.as_str().validate_non_empty(field_name)
    }
}

impl<T: ValidateNonEmpty> ValidateNonEmpty for Option<T> {
    fn validate_non_empty(&self, field_name: &str) -> ApiResult<()> {
        match self {
            Some(value) => value.validate_non_empty(field_name),
            None => Err(ApiError::missing_field(field_name)),
        }
    }
}

/// Trait for validating numeric ranges.
pub trait ValidateRange {
    /// Validate that the value is within an inclusive range.
    fn validate_range(&self, field_name: &str, min: Self, max: Self) -> ApiResult<()>
    where
        Self: Sized;
}

macro_rules! impl_validate_range {
    ($($t:ty),*) => {
        $(
            impl ValidateRange for $t {
                fn validate_range(&self, field_name: &str, min: Self, max: Self) -> ApiResult<()> {
                    if *self < min || *self > max {
                        return Err(ApiError::invalid_range(field_name, min, max));
                    }
                    Ok(())
                }
            }
        )*
    };
}

impl_validate_range!(u32, u64, usize, i64);

// ============================================================================
// QUERY PARAMETERS
// ============================================================================

/// Required 13-digit GLN.
pub fn parse_gln(raw: Option<&str>) -> ApiResult<String> {
    raw.validate_non_empty("gln")?;
    let gln = raw.unwrap_or_default().trim();
    if !matches(&GLN_PATTERN, gln) {
        return Err(ApiError::invalid_format("gln", "13 digits")
            .with_details(json!({ "field": "gln", "value": gln })));
    }
    Ok(gln.to_string())
}

/// Optional charge type code; blank counts as absent.
pub fn parse_charge_code(raw: Option<&str>) -> ApiResult<Option<String>> {
    let Some(code) = raw.map(str::trim).filter(|c| !c.is_empty()) else {
        return Ok(None);
    };
    if !matches(&CODE_PATTERN, code) {
        return Err(ApiError::invalid_format("chargeCode", "1-32 letters, digits, '_', '-' or '.'")
            .with_details(json!({ "field": "chargeCode", "value": code })));
    }
    Ok(Some(code.to_string()))
}

/// Charge type, upper-cased; defaults to grid tariffs.
pub fn parse_charge_type(raw: Option<&str>) -> ApiResult<String> {
    let Some(charge_type) = raw.map(str::trim).filter(|c| !c.is_empty()) else {
        return Ok(DEFAULT_CHARGE_TYPE.to_string());
    };
    if !matches(&CODE_PATTERN, charge_type) {
        return Err(ApiError::invalid_format("chargeType", "a charge type such as D03")
            .with_details(json!({ "field": "chargeType", "value": charge_type })));
    }
    Ok(charge_type.to_ascii_uppercase())
}

/// Record limit in `1..=1000`, default 500.
pub fn parse_limit(raw: Option<&str>) -> ApiResult<u32> {
    let Some(limit) = raw.map(str::trim).filter(|l| !l.is_empty()) else {
        return Ok(DEFAULT_PRICE_LIST_LIMIT);
    };
    let limit: u32 = limit
        .parse()
        .map_err(|_| ApiError::invalid_format("limit", "an integer"))?;
    limit.validate_range("limit", 1, MAX_PRICE_LIST_LIMIT)?;
    Ok(limit)
}

/// `DK1` or `DK2`, case-insensitive, default `DK1`.
pub fn parse_area(raw: Option<&str>) -> ApiResult<PriceArea> {
    let Some(area) = raw.map(str::trim).filter(|a| !a.is_empty()) else {
        return Ok(PriceArea::DK1);
    };
    PriceArea::parse(area).ok_or_else(|| {
        ApiError::invalid_format("area", "DK1 or DK2")
            .with_details(json!({ "field": "area", "value": area }))
    })
}

/// Calendar date as `YYYY-MM-DD`, defaulting to `today`.
pub fn parse_date(raw: Option<&str>, today: NaiveDate) -> ApiResult<NaiveDate> {
    let Some(date) = raw.map(str::trim).filter(|d| !d.is_empty()) else {
        return Ok(today);
    };
    let invalid = || {
        ApiError::invalid_format("date", "YYYY-MM-DD")
            .with_details(json!({ "field": "date", "value": date }))
    };
    if !matches(&DATE_PATTERN, date) {
        return Err(invalid());
    }
    NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|_| invalid())
}
