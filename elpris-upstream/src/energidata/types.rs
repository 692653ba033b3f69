//! Dataset names and query construction.

use chrono::{Days, NaiveDate};
use serde_json::{json, Map, Value};

/// Public dataset API root.
pub const DEFAULT_BASE_URL: &str = "https://api.energidataservice.dk/dataset";

/// Grid company price lists (tariffs, subscriptions, fees).
pub const DATAHUB_PRICELIST: &str = "DatahubPricelist";

/// Hourly day-ahead spot prices per bidding zone.
pub const ELSPOT_PRICES: &str = "Elspotprices";

/// Records considered when picking the current tariff for one GLN.
const TARIFF_RECORD_LIMIT: u32 = 10;

/// Upper bound on hourly rows for one day, DST days included.
const SPOT_RECORD_LIMIT: u32 = 48;

/// Query parameters for one dataset request.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetQuery {
    /// Column name to accepted values.
    pub filter: Map<String, Value>,
    pub sort: Option<String>,
    pub limit: Option<u32>,
    pub start: Option<String>,
    pub end: Option<String>,
    /// Read 400/404 as "no records" instead of a client error.
    pub empty_on_not_found: bool,
}

impl Default for DatasetQuery {
    fn default() -> Self {
        Self::new()
    }
}

impl DatasetQuery {
    pub fn new() -> Self {
        Self {
            filter: Map::new(),
            sort: None,
            limit: None,
            start: None,
            end: None,
            empty_on_not_found: false,
        }
    }

    /// Match rows whose `column` equals `value`.
    pub fn filter(mut self, column: &str, value: impl Into<String>) -> Self {
        self.filter
            .insert(column.to_string(), json!([value.into()]));
        self
    }

    pub fn sort(mut self, sort: impl Into<String>) -> Self {
        self.sort = Some(sort.into());
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn window(mut self, start: impl Into<String>, end: impl Into<String>) -> Self {
        self.start = Some(start.into());
        self.end = Some(end.into());
        self
    }

    pub fn empty_on_not_found(mut self) -> Self {
        self.empty_on_not_found = true;
        self
    }

    /// Records for one GLN and optional charge code, newest first.
    pub fn tariff(gln: &str, charge_code: Option<&str>) -> Self {
        let mut query = Self::new()
            .filter("GLN_Number", gln)
            .sort("ValidFrom desc")
            .limit(TARIFF_RECORD_LIMIT)
            .empty_on_not_found();
        if let Some(code) = charge_code.filter(|c| !c.is_empty()) {
            query = query.filter("ChargeTypeCode", code);
        }
        query
    }

    /// Price list rows for one charge type, newest first.
    pub fn price_list(charge_type: &str, limit: u32) -> Self {
        Self::new()
            .filter("ChargeType", charge_type)
            .sort("ValidFrom desc")
            .limit(limit)
            .empty_on_not_found()
    }

    /// Spot prices for one area over one local day.
    pub fn spot_prices(area: &str, date: NaiveDate) -> Self {
        let next = date.checked_add_days(Days::new(1)).unwrap_or(date);
        Self::new()
            .filter("PriceArea", area)
            .sort("HourDK asc")
            .limit(SPOT_RECORD_LIMIT)
            .window(format!("{}T00:00", date), format!("{}T00:00", next))
    }

    /// Query-string pairs in a stable order.
    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params = Vec::new();
        if !self.filter.is_empty() {
            params.push((
                "filter".to_string(),
                Value::Object(self.filter.clone()).to_string(),
            ));
        }
        if let Some(start) = &self.start {
            params.push(("start".to_string(), start.clone()));
        }
        if let Some(end) = &self.end {
            params.push(("end".to_string(), end.clone()));
        }
        if let Some(sort) = &self.sort {
            params.push(("sort".to_string(), sort.clone()));
        }
        if let Some(limit) = self.limit {
            params.push(("limit".to_string(), limit.to_string()));
        }
        params
    }
}
