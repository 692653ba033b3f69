//! Raw upstream records as published by the energy-market data service.
//!
//! The upstream schema is not under our control, so every field is optional
//! and numeric fields that are missing or malformed read as `0.0`.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Number of hourly price columns on a price list record.
pub const HOURS_PER_DAY: usize = 24;

/// Envelope returned by every dataset query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetResponse<R> {
    #[serde(default = "Vec::new")]
    pub records: Vec<R>,
}

impl<R> DatasetResponse<R> {
    pub fn empty() -> Self {
        Self {
            records: Vec::new(),
        }
    }
}

impl<R> Default for DatasetResponse<R> {
    fn default() -> Self {
        Self::empty()
    }
}

/// One row of the `DatahubPricelist` dataset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawPriceListRecord {
    #[serde(rename = "GLN_Number", default)]
    pub gln_number: Option<String>,
    #[serde(rename = "ChargeOwner", default)]
    pub charge_owner: Option<String>,
    #[serde(rename = "GridArea", default, skip_serializing_if = "Option::is_none")]
    pub grid_area: Option<String>,
    #[serde(rename = "ChargeType", default)]
    pub charge_type: Option<String>,
    #[serde(rename = "ChargeTypeCode", default)]
    pub charge_type_code: Option<String>,
    #[serde(rename = "ValidFrom", default)]
    pub valid_from: Option<String>,
    #[serde(rename = "ValidTo", default)]
    pub valid_to: Option<String>,
    /// `Price1`..`Price24` plus any other columns upstream decides to add.
    #[serde(flatten)]
    pub columns: BTreeMap<String, serde_json::Value>,
}

impl RawPriceListRecord {
    /// Rate for the zero-based hour, defaulting to 0 when absent or not numeric.
    pub fn price(&self, hour: usize) -> f64 {
        self.columns
            .get(&format!("Price{}", hour + 1))
            .and_then(numeric)
            .unwrap_or(0.0)
    }

    /// All 24 hourly rates.
    pub fn hourly_rates(&self) -> [f64; HOURS_PER_DAY] {
        let mut rates = [0.0; HOURS_PER_DAY];
        for (hour, rate) in rates.iter_mut().enumerate() {
            *rate = self.price(hour);
        }
        rates
    }

    pub fn valid_from_at(&self) -> Option<NaiveDateTime> {
        self.valid_from.as_deref().and_then(parse_upstream_timestamp)
    }

    pub fn valid_to_at(&self) -> Option<NaiveDateTime> {
        self.valid_to.as_deref().and_then(parse_upstream_timestamp)
    }

    /// Whether `[ValidFrom, ValidTo)` contains `now`. A missing `ValidTo` is
    /// open-ended; a missing or unreadable `ValidFrom` never matches.
    pub fn is_valid_at(&self, now: NaiveDateTime) -> bool {
        let Some(from) = self.valid_from_at() else {
            return false;
        };
        if now < from {
            return false;
        }
        match self.valid_to_at() {
            Some(to) => now < to,
            None => true,
        }
    }
}

/// One row of the `Elspotprices` dataset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawSpotPriceRecord {
    #[serde(rename = "HourUTC", default)]
    pub hour_utc: Option<String>,
    #[serde(rename = "HourDK", default)]
    pub hour_dk: Option<String>,
    #[serde(rename = "PriceArea", default)]
    pub price_area: Option<String>,
    #[serde(rename = "SpotPriceDKK", default, deserialize_with = "lenient_f64")]
    pub spot_price_dkk: Option<f64>,
    #[serde(rename = "SpotPriceEUR", default, deserialize_with = "lenient_f64")]
    pub spot_price_eur: Option<f64>,
}

/// Choose the record whose validity window contains `now`, else the first
/// (most recently issued, given upstream sorts by `ValidFrom` descending).
pub fn select_current(records: &[RawPriceListRecord], now: NaiveDateTime) -> Option<&RawPriceListRecord> {
    records
        .iter()
        .find(|record| record.is_valid_at(now))
        .or_else(|| records.first())
}

/// Parse the timestamp formats the upstream service emits.
pub fn parse_upstream_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    const FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"];
    for format in FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(parsed);
        }
    }
    if let Ok(parsed) = chrono::DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.naive_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

fn numeric(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(numeric))
}
