//! Spot price conversion from DKK/MWh to kr/kWh.

use serde::{Deserialize, Serialize};

use crate::records::{parse_upstream_timestamp, RawSpotPriceRecord};

/// Bidding zones served by the site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PriceArea {
    DK1,
    DK2,
}

impl PriceArea {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriceArea::DK1 => "DK1",
            PriceArea::DK2 => "DK2",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "DK1" => Some(PriceArea::DK1),
            "DK2" => Some(PriceArea::DK2),
            _ => None,
        }
    }
}

impl std::fmt::Display for PriceArea {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HourlySpotPrice {
    pub hour: String,
    pub price_kr_per_kwh: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpotPrices {
    pub area: PriceArea,
    pub date: String,
    pub prices: Vec<HourlySpotPrice>,
    pub min: f64,
    pub max: f64,
    pub average: f64,
}

impl SpotPrices {
    /// Structurally valid day with no prices.
    pub fn empty(area: PriceArea, date: impl Into<String>) -> Self {
        Self {
            area,
            date: date.into(),
            prices: Vec::new(),
            min: 0.0,
            max: 0.0,
            average: 0.0,
        }
    }
}

/// Convert raw `Elspotprices` rows into hourly kr/kWh prices.
///
/// Rows without an hour are dropped; a missing DKK price reads as zero.
pub fn convert_spot_prices(
    area: PriceArea,
    date: &str,
    records: &[RawSpotPriceRecord],
) -> SpotPrices {
    let mut prices: Vec<HourlySpotPrice> = records
        .iter()
        .filter_map(|record| {
            let hour = record.hour_dk.clone().or_else(|| record.hour_utc.clone())?;
            Some(HourlySpotPrice {
                hour,
                price_kr_per_kwh: record.spot_price_dkk.unwrap_or(0.0) / 1000.0,
            })
        })
        .collect();

    prices.sort_by(|a, b| {
        let left = parse_upstream_timestamp(&a.hour);
        let right = parse_upstream_timestamp(&b.hour);
        left.cmp(&right).then_with(|| a.hour.cmp(&b.hour))
    });

    if prices.is_empty() {
        return SpotPrices::empty(area, date);
    }

    let values = prices.iter().map(|p| p.price_kr_per_kwh);
    let min = values.clone().fold(f64::INFINITY, f64::min);
    let max = values.clone().fold(f64::NEG_INFINITY, f64::max);
    let average = values.sum::<f64>() / prices.len() as f64;

    SpotPrices {
        area,
        date: date.to_string(),
        prices,
        min,
        max,
        average,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(hour: &str, dkk: Option<f64>) -> RawSpotPriceRecord {
        RawSpotPriceRecord {
            hour_dk: Some(hour.to_string()),
            price_area: Some("DK1".to_string()),
            spot_price_dkk: dkk,
            ..Default::default()
        }
    }

    #[test]
    fn test_converts_and_sorts_ascending() {
        let records = vec![
            raw("2024-05-01T01:00:00", Some(500.0)),
            raw("2024-05-01T00:00:00", Some(250.0)),
            raw("2024-05-01T02:00:00", None),
        ];

        let day = convert_spot_prices(PriceArea::DK1, "2024-05-01", &records);
        assert_eq!(day.prices.len(), 3);
        assert_eq!(day.prices[0].hour, "2024-05-01T00:00:00");
        assert_eq!(day.prices[0].price_kr_per_kwh, 0.25);
        assert_eq!(day.prices[2].price_kr_per_kwh, 0.0);
        assert_eq!(day.min, 0.0);
        assert_eq!(day.max, 0.5);
        assert!((day.average - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_empty_records_yield_zeroed_day() {
        let day = convert_spot_prices(PriceArea::DK2, "2024-05-01", &[]);
        assert_eq!(day, SpotPrices::empty(PriceArea::DK2, "2024-05-01"));
    }

    #[test]
    fn test_area_parsing() {
        assert_eq!(PriceArea::parse("dk1"), Some(PriceArea::DK1));
        assert_eq!(PriceArea::parse(" DK2 "), Some(PriceArea::DK2));
        assert_eq!(PriceArea::parse("SE3"), None);
    }
}
