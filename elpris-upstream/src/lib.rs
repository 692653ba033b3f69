//! Elpris Upstream - Outbound HTTP
//!
//! - [`fetch_with_timeout`]: one HTTP call bounded by a deadline, returning
//!   the raw status and body
//! - [`EnergiDataClient`]: typed dataset queries against the public
//!   energy-market data service, with status classification

pub mod energidata;
pub mod http;

pub use energidata::{
    DatasetQuery, EnergiDataClient, DATAHUB_PRICELIST, DEFAULT_BASE_URL, ELSPOT_PRICES,
};
pub use http::{fetch_with_timeout, FetchRequest, RawResponse, DEFAULT_TIMEOUT};
