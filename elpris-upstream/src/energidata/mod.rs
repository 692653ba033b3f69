//! Energi Data Service dataset client.
//!
//! Datasets are queried with `GET {base}/{dataset}?filter=..&sort=..&limit=..`
//! and answer with `{ "records": [...] }`.

mod client;
mod types;

pub use client::EnergiDataClient;
pub use types::{DatasetQuery, DATAHUB_PRICELIST, DEFAULT_BASE_URL, ELSPOT_PRICES};
