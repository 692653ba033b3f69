//! `GET /api/pricelists` - current price list per grid company.

use std::time::Duration;

use axum::extract::{Query, State};
use chrono::NaiveDate;
use elpris_core::{build_price_list, PriceList, RawPriceListRecord, UpstreamError};
use elpris_storage::{CacheKeys, Computed};
use elpris_upstream::{DatasetQuery, EnergiDataClient, DATAHUB_PRICELIST};
use serde::Deserialize;

use super::{query_dataset, respond, utc_now};
use crate::cache_headers::CachedJson;
use crate::error::ApiResult;
use crate::state::AppState;
use crate::validation::{parse_charge_type, parse_limit};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceListQuery {
    pub charge_type: Option<String>,
    pub limit: Option<String>,
}

pub fn price_list_keys(charge_type: &str, limit: u32, date: NaiveDate) -> CacheKeys {
    CacheKeys::new(
        format!("pricelist:{}:{}:{}", charge_type, limit, date.format("%Y-%m-%d")),
        format!("pricelist:{}", charge_type),
    )
}

/// An empty list is cached under the primary key only so it cannot replace a
/// populated latest-good list.
async fn fetch_price_list(
    client: EnergiDataClient,
    charge_type: String,
    limit: u32,
    primary_ttl: Duration,
) -> Result<Computed<PriceList>, UpstreamError> {
    let query = DatasetQuery::price_list(&charge_type, limit);
    let response = query_dataset::<RawPriceListRecord>(&client, DATAHUB_PRICELIST, &query).await?;

    let list = build_price_list(&response.records, utc_now());
    if list.providers.is_empty() {
        return Ok(Computed::Negative {
            value: list,
            ttl: primary_ttl,
        });
    }
    Ok(Computed::Fresh(list))
}

pub async fn get_price_list(
    State(state): State<AppState>,
    Query(query): Query<PriceListQuery>,
) -> ApiResult<CachedJson<PriceList>> {
    let charge_type = parse_charge_type(query.charge_type.as_deref())?;
    let limit = parse_limit(query.limit.as_deref())?;

    let keys = price_list_keys(&charge_type, limit, utc_now().date());
    let ttl = state.config.ttls.pricelist;

    let client = state.upstream.clone();
    let outcome = state
        .orchestrator
        .get_or_compute(
            &keys,
            ttl,
            move || fetch_price_list(client.clone(), charge_type.clone(), limit, ttl.primary),
            PriceList::empty,
        )
        .await;

    Ok(respond("pricelist", outcome))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_list_keys() {
        let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap_or_default();
        let keys = price_list_keys("D03", 500, date);
        assert_eq!(keys.primary, "pricelist:D03:500:2024-05-01");
        assert_eq!(keys.latest, "pricelist:D03");
    }
}
