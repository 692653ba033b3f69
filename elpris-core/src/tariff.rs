//! Tariff normalization.
//!
//! Turns the irregular `DatahubPricelist` rows for one GLN and charge code into
//! the canonical [`TariffResult`]: 24 hourly rates, a consumption-weighted
//! average, a flat/time-of-use classification and a seasonal tag.
//!
//! The normalizer is a pure function of its inputs. It never fails: missing
//! numbers read as zero and an empty input yields [`TariffResult::empty`].

use chrono::{Datelike, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::records::{select_current, RawPriceListRecord, HOURS_PER_DAY};

/// Low-price night hours (00-05).
const LOW_HOURS: &[usize] = &[0, 1, 2, 3, 4, 5];
/// Daytime and late-evening hours (06-16, 21-23).
const HIGH_HOURS: &[usize] = &[6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 21, 22, 23];
/// Evening peak hours (17-20).
const PEAK_HOURS: &[usize] = &[17, 18, 19, 20];

/// Share of household consumption in each hour group. Sums to 1.0.
const LOW_WEIGHT: f64 = 0.25;
const HIGH_WEIGHT: f64 = 0.60;
const PEAK_WEIGHT: f64 = 0.15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TariffType {
    #[serde(rename = "flat")]
    Flat,
    #[serde(rename = "time-of-use")]
    TimeOfUse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Season {
    Winter,
    Summer,
    YearRound,
}

impl Season {
    /// April through September is summer; everything else is winter.
    pub fn from_month0(month0: u32) -> Self {
        if (3..9).contains(&month0) {
            Season::Summer
        } else {
            Season::Winter
        }
    }
}

/// Canonical tariff derived from exactly one upstream record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TariffResult {
    pub gln: String,
    pub provider: String,
    pub valid_from: Option<String>,
    pub valid_to: Option<String>,
    pub hourly_rates: Vec<f64>,
    pub average_rate: f64,
    pub tariff_type: TariffType,
    pub season: Season,
}

impl TariffResult {
    /// Zero-filled tariff used when upstream has no record for the GLN.
    pub fn empty(gln: impl Into<String>) -> Self {
        Self {
            gln: gln.into(),
            provider: String::new(),
            valid_from: None,
            valid_to: None,
            hourly_rates: vec![0.0; HOURS_PER_DAY],
            average_rate: 0.0,
            tariff_type: TariffType::Flat,
            season: Season::YearRound,
        }
    }

    /// Whether this is the placeholder produced for an absent GLN.
    pub fn is_empty(&self) -> bool {
        self.provider.is_empty()
            && self.valid_from.is_none()
            && self.hourly_rates.iter().all(|rate| *rate == 0.0)
    }
}

/// Derive the tariff for `gln` from records sorted by `ValidFrom` descending.
pub fn normalize_tariff(
    gln: &str,
    records: &[RawPriceListRecord],
    now: NaiveDateTime,
) -> TariffResult {
    let Some(record) = select_current(records, now) else {
        return TariffResult::empty(gln);
    };

    let hourly_rates = record.hourly_rates().to_vec();
    let season = record
        .valid_from_at()
        .map(|from| Season::from_month0(from.month0()))
        .unwrap_or(Season::YearRound);

    TariffResult {
        gln: gln.to_string(),
        provider: record.charge_owner.clone().unwrap_or_default(),
        valid_from: record.valid_from.clone(),
        valid_to: record.valid_to.clone(),
        average_rate: weighted_average(&hourly_rates),
        tariff_type: classify(&hourly_rates),
        season,
        hourly_rates,
    }
}

/// `Flat` when every hour carries the same rate.
pub fn classify(rates: &[f64]) -> TariffType {
    match rates.split_first() {
        Some((first, rest)) if rest.iter().any(|rate| rate != first) => TariffType::TimeOfUse,
        _ => TariffType::Flat,
    }
}

/// Consumption-weighted average over a Danish residential load profile.
///
/// Each hour group contributes the simple mean of its rates times the group
/// weight. No rounding happens here.
pub fn weighted_average(rates: &[f64]) -> f64 {
    let rate = |hour: usize| rates.get(hour).copied().unwrap_or(0.0);
    let mean = |hours: &[usize]| hours.iter().map(|h| rate(*h)).sum::<f64>() / hours.len() as f64;

    mean(LOW_HOURS) * LOW_WEIGHT + mean(HIGH_HOURS) * HIGH_WEIGHT + mean(PEAK_HOURS) * PEAK_WEIGHT
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::parse_upstream_timestamp;
    use proptest::prelude::*;
    use serde_json::json;

    fn now() -> NaiveDateTime {
        parse_upstream_timestamp("2024-06-15T12:00:00").expect("timestamp")
    }

    fn record_with(rates: &[f64], valid_from: &str) -> RawPriceListRecord {
        let mut value = json!({
            "GLN_Number": "5790000000000",
            "ChargeOwner": "Radius Elnet A/S",
            "ChargeTypeCode": "DT_C_01",
            "ValidFrom": valid_from,
            "ValidTo": null
        });
        for (hour, rate) in rates.iter().enumerate() {
            value[format!("Price{}", hour + 1)] = json!(rate);
        }
        serde_json::from_value(value).expect("record")
    }

    #[test]
    fn test_uniform_rates_average_to_themselves() {
        let record = record_with(&[2.0; 24], "2024-01-01T00:00:00");
        let tariff = normalize_tariff("5790000000000", &[record], now());
        assert_eq!(tariff.average_rate, 2.0);
        assert_eq!(tariff.tariff_type, TariffType::Flat);
    }

    #[test]
    fn test_single_differing_hour_is_time_of_use() {
        let mut rates = [0.3; 24];
        rates[18] = 0.9;
        let record = record_with(&rates, "2024-01-01T00:00:00");
        let tariff = normalize_tariff("5790000000000", &[record], now());
        assert_eq!(tariff.tariff_type, TariffType::TimeOfUse);
    }

    #[test]
    fn test_weighted_average_uses_group_means() {
        let mut rates = [0.0; 24];
        for h in LOW_HOURS {
            rates[*h] = 1.0;
        }
        for h in HIGH_HOURS {
            rates[*h] = 2.0;
        }
        for h in PEAK_HOURS {
            rates[*h] = 4.0;
        }
        let expected = 1.0 * 0.25 + 2.0 * 0.60 + 4.0 * 0.15;
        assert!((weighted_average(&rates) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_season_boundaries() {
        let season_of = |from: &str| {
            normalize_tariff("5790000000000", &[record_with(&[1.0; 24], from)], now()).season
        };
        assert_eq!(season_of("2024-03-01T00:00:00"), Season::Winter);
        assert_eq!(season_of("2024-04-01T00:00:00"), Season::Summer);
        assert_eq!(season_of("2024-09-01T00:00:00"), Season::Summer);
        assert_eq!(season_of("2024-10-01T00:00:00"), Season::Winter);
    }

    #[test]
    fn test_no_records_yields_empty_tariff() {
        let tariff = normalize_tariff("5790000000000", &[], now());
        assert_eq!(tariff, TariffResult::empty("5790000000000"));
        assert_eq!(tariff.hourly_rates, vec![0.0; 24]);
        assert_eq!(tariff.average_rate, 0.0);
        assert_eq!(tariff.tariff_type, TariffType::Flat);
        assert_eq!(tariff.season, Season::YearRound);
        assert!(tariff.is_empty());
    }

    #[test]
    fn test_missing_price_columns_default_to_zero() {
        let record = record_with(&[1.0; 12], "2024-01-01T00:00:00");
        let tariff = normalize_tariff("5790000000000", &[record], now());
        assert_eq!(tariff.hourly_rates[11], 1.0);
        assert_eq!(tariff.hourly_rates[12], 0.0);
        assert_eq!(tariff.tariff_type, TariffType::TimeOfUse);
    }

    #[test]
    fn test_serialized_shape() {
        let json = serde_json::to_value(TariffResult::empty("5790000000000")).expect("json");
        assert_eq!(json["tariffType"], "flat");
        assert_eq!(json["season"], "year-round");
        assert_eq!(json["hourlyRates"].as_array().map(Vec::len), Some(24));
        assert_eq!(json["provider"], "");

        let tou = serde_json::to_value(TariffType::TimeOfUse).expect("json");
        assert_eq!(tou, "time-of-use");
    }

    proptest! {
        #[test]
        fn prop_uniform_average_is_identity(rate in 0.0f64..10.0) {
            let avg = weighted_average(&[rate; 24]);
            prop_assert!((avg - rate).abs() <= 1e-12 * rate.max(1.0));
            prop_assert_eq!(classify(&[rate; 24]), TariffType::Flat);
        }

        #[test]
        fn prop_normalizer_is_idempotent(rates in proptest::collection::vec(0.0f64..5.0, 24)) {
            let records = vec![record_with(&rates, "2024-02-01T00:00:00")];
            let first = normalize_tariff("5790000000000", &records, now());
            let second = normalize_tariff("5790000000000", &records, now());
            prop_assert_eq!(first.average_rate.to_bits(), second.average_rate.to_bits());
            prop_assert_eq!(first, second);
        }
    }
}
