//! `GET /api/electricity-prices` - hourly spot prices for one area and day.

use std::time::Duration;

use axum::extract::{Query, State};
use chrono::NaiveDate;
use elpris_core::{convert_spot_prices, PriceArea, RawSpotPriceRecord, SpotPrices, UpstreamError};
use elpris_storage::{CacheKeys, Computed};
use elpris_upstream::{DatasetQuery, EnergiDataClient, ELSPOT_PRICES};
use serde::Deserialize;

use super::{query_dataset, respond, utc_today};
use crate::cache_headers::CachedJson;
use crate::error::ApiResult;
use crate::state::AppState;
use crate::validation::{parse_area, parse_date};

#[derive(Debug, Default, Deserialize)]
pub struct SpotPriceQuery {
    pub area: Option<String>,
    pub date: Option<String>,
}

pub fn spot_keys(area: PriceArea, date: NaiveDate) -> CacheKeys {
    CacheKeys::new(
        format!("spot:{}:{}", area, date.format("%Y-%m-%d")),
        format!("spot:{}", area),
    )
}

/// A day upstream has not published yet comes back empty; it is cached under
/// the primary key only.
async fn fetch_spot_prices(
    client: EnergiDataClient,
    area: PriceArea,
    date: NaiveDate,
    primary_ttl: Duration,
) -> Result<Computed<SpotPrices>, UpstreamError> {
    let query = DatasetQuery::spot_prices(area.as_str(), date);
    let response = query_dataset::<RawSpotPriceRecord>(&client, ELSPOT_PRICES, &query).await?;

    let day = convert_spot_prices(area, &date.format("%Y-%m-%d").to_string(), &response.records);
    if day.prices.is_empty() {
        return Ok(Computed::Negative {
            value: day,
            ttl: primary_ttl,
        });
    }
    Ok(Computed::Fresh(day))
}

pub async fn get_electricity_prices(
    State(state): State<AppState>,
    Query(query): Query<SpotPriceQuery>,
) -> ApiResult<CachedJson<SpotPrices>> {
    let area = parse_area(query.area.as_deref())?;
    let date = parse_date(query.date.as_deref(), utc_today())?;

    let keys = spot_keys(area, date);
    let ttl = state.config.ttls.spot;

    let client = state.upstream.clone();
    let outcome = state
        .orchestrator
        .get_or_compute(
            &keys,
            ttl,
            move || fetch_spot_prices(client.clone(), area, date, ttl.primary),
            || SpotPrices::empty(area, date.format("%Y-%m-%d").to_string()),
        )
        .await;

    Ok(respond("spot", outcome))
}
