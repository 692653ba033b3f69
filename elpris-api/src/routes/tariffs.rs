//! `GET /api/tariffs` - normalized grid tariff for one GLN.

use std::time::Duration;

use axum::extract::{Query, State};
use chrono::NaiveDate;
use elpris_core::{normalize_tariff, RawPriceListRecord, TariffResult, UpstreamError};
use elpris_storage::{CacheKeys, Computed};
use elpris_upstream::{DatasetQuery, EnergiDataClient, DATAHUB_PRICELIST};
use serde::Deserialize;

use super::{query_dataset, respond, utc_now};
use crate::cache_headers::CachedJson;
use crate::error::ApiResult;
use crate::state::AppState;
use crate::validation::{parse_charge_code, parse_gln};

/// Key segment used when no charge code narrows the query.
const ANY_CHARGE_CODE: &str = "all";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TariffQuery {
    pub gln: Option<String>,
    pub charge_code: Option<String>,
}

pub fn tariff_keys(gln: &str, charge_code: Option<&str>, date: NaiveDate) -> CacheKeys {
    let code = charge_code.unwrap_or(ANY_CHARGE_CODE);
    CacheKeys::new(
        format!("tariff:{}:{}:{}", gln, code, date.format("%Y-%m-%d")),
        format!("tariff:{}:{}", gln, code),
    )
}

/// Fetch and normalize. A GLN without records yields the zero tariff as a
/// negative result so it is cached briefly and never becomes the latest-good value.
async fn fetch_tariff(
    client: EnergiDataClient,
    gln: String,
    charge_code: Option<String>,
    negative_ttl: Duration,
) -> Result<Computed<TariffResult>, UpstreamError> {
    let query = DatasetQuery::tariff(&gln, charge_code.as_deref());
    let response = query_dataset::<RawPriceListRecord>(&client, DATAHUB_PRICELIST, &query).await?;

    let tariff = normalize_tariff(&gln, &response.records, utc_now());
    if response.records.is_empty() {
        tracing::debug!(gln = %gln, "No tariff records; caching empty tariff");
        return Ok(Computed::Negative {
            value: tariff,
            ttl: negative_ttl,
        });
    }
    Ok(Computed::Fresh(tariff))
}

pub async fn get_tariff(
    State(state): State<AppState>,
    Query(query): Query<TariffQuery>,
) -> ApiResult<CachedJson<TariffResult>> {
    let gln = parse_gln(query.gln.as_deref())?;
    let charge_code = parse_charge_code(query.charge_code.as_deref())?;

    let keys = tariff_keys(&gln, charge_code.as_deref(), utc_now().date());
    let ttls = state.config.ttls;
    let negative_ttl = ttls.tariff_negative;

    let client = state.upstream.clone();
    let compute_gln = gln.clone();
    let outcome = state
        .orchestrator
        .get_or_compute(
            &keys,
            ttls.tariff,
            move || {
                fetch_tariff(
                    client.clone(),
                    compute_gln.clone(),
                    charge_code.clone(),
                    negative_ttl,
                )
            },
            || TariffResult::empty(gln.as_str()),
        )
        .await;

    let advertise_negative = outcome.value.is_empty() && !outcome.status.is_degraded();
    let response = respond("tariff", outcome);
    Ok(if advertise_negative {
        response.with_ttl(negative_ttl)
    } else {
        response
    })
}
