//! Elpris Core - Domain Types and Derivations
//!
//! Pure data structures and pure functions shared by every other crate:
//! upstream record shapes, the tariff normalizer, price list grouping, spot
//! price conversion, the retry executor and the error taxonomy.

pub mod error;
pub mod pricelist;
pub mod records;
pub mod retry;
pub mod spot;
pub mod tariff;

pub use error::{CacheError, ConfigError, ElprisError, ElprisResult, FetchError, UpstreamError};
pub use pricelist::{build_price_list, PriceList, ProviderPriceList, DEFAULT_CHARGE_TYPE};
pub use records::{
    parse_upstream_timestamp, select_current, DatasetResponse, RawPriceListRecord,
    RawSpotPriceRecord, HOURS_PER_DAY,
};
pub use retry::{retry_with_backoff, retry_with_backoff_if, RetryPolicy};
pub use spot::{convert_spot_prices, HourlySpotPrice, PriceArea, SpotPrices};
pub use tariff::{classify, normalize_tariff, weighted_average, Season, TariffResult, TariffType};
