//! # nimbus-feed — Market data for the retargeter.
//!
//! Vendor bindings implement [`DataFeed`](nimbus_core::traits::DataFeed)
//! for the methods their API serves and report the rest as unavailable;
//! [`CompositeFeed`] routes each method to the vendor that serves it.
//! Response parsing is kept in plain functions over `serde_json::Value`.

pub mod coingecko;
pub mod composite;
pub mod defillama;
pub mod http;
pub mod memory;
pub mod yahoo;

pub use coingecko::CoinGeckoFeed;
pub use composite::CompositeFeed;
pub use defillama::DefiLlamaFeed;
pub use memory::MemoryFeed;
pub use yahoo::YahooFeed;
