//! Provider price lists: the current `DatahubPricelist` row per grid company.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::records::{select_current, RawPriceListRecord};

/// Charge type code for grid tariffs.
pub const DEFAULT_CHARGE_TYPE: &str = "D03";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderPriceList {
    pub gln: String,
    pub charge_owner: String,
    pub charge_type_code: String,
    pub valid_from: Option<String>,
    pub valid_to: Option<String>,
    pub hourly_rates: Vec<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceList {
    pub providers: Vec<ProviderPriceList>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl PriceList {
    /// Structurally valid list with no providers.
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Group records by GLN and publish the current record for each provider,
/// sorted by charge owner name. Records without a GLN are skipped.
pub fn build_price_list(records: &[RawPriceListRecord], now: NaiveDateTime) -> PriceList {
    let mut by_gln: BTreeMap<&str, Vec<RawPriceListRecord>> = BTreeMap::new();
    for record in records {
        if let Some(gln) = record.gln_number.as_deref().filter(|g| !g.trim().is_empty()) {
            by_gln.entry(gln).or_default().push(record.clone());
        }
    }

    let mut providers: Vec<ProviderPriceList> = by_gln
        .into_iter()
        .filter_map(|(gln, group)| {
            let record = select_current(&group, now)?;
            Some(ProviderPriceList {
                gln: gln.to_string(),
                charge_owner: record.charge_owner.clone().unwrap_or_default(),
                charge_type_code: record.charge_type_code.clone().unwrap_or_default(),
                valid_from: record.valid_from.clone(),
                valid_to: record.valid_to.clone(),
                hourly_rates: record.hourly_rates().to_vec(),
            })
        })
        .collect();

    providers.sort_by(|a, b| a.charge_owner.cmp(&b.charge_owner).then_with(|| a.gln.cmp(&b.gln)));

    PriceList {
        providers,
        updated_at: Some(now.and_utc().to_rfc3339()),
    }
}
