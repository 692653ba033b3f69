//! Elpris Test Utilities
//!
//! Shared test infrastructure for the Elpris workspace:
//! - Upstream record fixtures (typed and as raw JSON for HTTP mocks)
//! - Key-value stores that misbehave on purpose
//! - Proptest generators for hourly rates and GLNs

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

pub use elpris_core::{
    CacheError, RawPriceListRecord, RawSpotPriceRecord, TariffResult, HOURS_PER_DAY,
};
pub use elpris_storage::{CacheResult, InMemoryKvStore, KvStore};

/// GLN used across fixtures.
pub const TEST_GLN: &str = "5790000000000";

// ============================================================================
// RECORD FIXTURES
// ============================================================================

/// Same rate every hour.
pub fn uniform_rates(rate: f64) -> Vec<f64> {
    vec![rate; HOURS_PER_DAY]
}

/// Night 0.10, day 0.30, evening peak (17-20) 0.90.
pub fn time_of_use_rates() -> Vec<f64> {
    (0..HOURS_PER_DAY)
        .map(|hour| match hour {
            0..=5 => 0.10,
            17..=20 => 0.90,
            _ => 0.30,
        })
        .collect()
}

/// One `DatahubPricelist` row as the upstream service returns it.
pub fn price_list_json(
    gln: &str,
    owner: &str,
    valid_from: &str,
    valid_to: Option<&str>,
    rates: &[f64],
) -> Value {
    let mut record = json!({
        "GLN_Number": gln,
        "ChargeOwner": owner,
        "GridArea": "031",
        "ChargeType": "D03",
        "ChargeTypeCode": "DT_C_01",
        "ValidFrom": valid_from,
        "ValidTo": valid_to,
    });
    for (hour, rate) in rates.iter().enumerate() {
        record[format!("Price{}", hour + 1)] = json!(rate);
    }
    record
}

/// Typed counterpart of [`price_list_json`].
pub fn price_list_record(
    gln: &str,
    owner: &str,
    valid_from: &str,
    valid_to: Option<&str>,
    rates: &[f64],
) -> RawPriceListRecord {
    serde_json::from_value(price_list_json(gln, owner, valid_from, valid_to, rates))
        .unwrap_or_default()
}

/// One `Elspotprices` row.
pub fn spot_price_json(hour_dk: &str, area: &str, dkk_per_mwh: f64) -> Value {
    json!({
        "HourUTC": hour_dk,
        "HourDK": hour_dk,
        "PriceArea": area,
        "SpotPriceDKK": dkk_per_mwh,
        "SpotPriceEUR": dkk_per_mwh / 7.46,
    })
}

/// `{ "records": [...] }` envelope.
pub fn dataset_body(records: Vec<Value>) -> Value {
    json!({ "total": records.len(), "records": records })
}

// ============================================================================
// KEY-VALUE STORES
// ============================================================================

/// Store whose every call fails as if the backend were unreachable.
#[derive(Debug, Clone, Default)]
pub struct FailingKvStore;

fn unreachable_backend() -> CacheError {
    CacheError::Unavailable {
        reason: "connection refused".to_string(),
    }
}

#[async_trait]
impl KvStore for FailingKvStore {
    async fn get(&self, _key: &str) -> CacheResult<Option<String>> {
        Err(unreachable_backend())
    }

    async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> CacheResult<()> {
        Err(unreachable_backend())
    }

    async fn exists(&self, _key: &str) -> CacheResult<bool> {
        Err(unreachable_backend())
    }

    async fn keys(&self, _prefix: &str) -> CacheResult<Vec<String>> {
        Err(unreachable_backend())
    }

    async fn ping(&self) -> CacheResult<()> {
        Err(unreachable_backend())
    }

    fn backend_name(&self) -> &'static str {
        "failing"
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    use proptest::prelude::*;

    use super::HOURS_PER_DAY;

    /// 24 non-negative rates in kr/kWh.
    pub fn hourly_rates() -> impl Strategy<Value = Vec<f64>> {
        proptest::collection::vec(0.0f64..5.0, HOURS_PER_DAY)
    }

    /// Thirteen-digit global location number.
    pub fn gln() -> impl Strategy<Value = String> {
        "[0-9]{13}"
    }

    /// Strings that are not a valid GLN.
    pub fn invalid_gln() -> impl Strategy<Value = String> {
        prop_oneof!["[0-9]{1,12}", "[0-9]{14,20}", "[0-9]{6}[a-zA-Z][0-9]{6}"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_list_record_fixture_decodes() {
        let record = price_list_record(
            TEST_GLN,
            "Radius Elnet A/S",
            "2024-01-01T00:00:00",
            None,
            &time_of_use_rates(),
        );
        assert_eq!(record.gln_number.as_deref(), Some(TEST_GLN));
        assert_eq!(record.price(18), 0.90);
        assert_eq!(record.price(0), 0.10);
    }

    #[test]
    fn test_dataset_body_shape() {
        let body = dataset_body(vec![spot_price_json("2024-05-01T00:00:00", "DK1", 500.0)]);
        assert_eq!(body["records"].as_array().map(Vec::len), Some(1));
        assert_eq!(body["total"], 1);
    }
}
