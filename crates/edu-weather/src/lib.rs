//! Weather board for Edu Portal
//!
//! Current conditions for a fixed list of locations via the OpenWeather API,
//! with a persistent 30-minute snapshot cache and alert classification.

pub mod board;
pub mod cache;
pub mod clock;
pub mod locations;
pub mod provider;
pub mod retry;
pub mod state;
pub mod store;
pub mod types;

pub use board::{BoardOptions, WeatherBoard};
pub use cache::{cache_key, WeatherCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use locations::indian_capitals;
pub use provider::WeatherProvider;
pub use retry::RetryConfig;
pub use state::RefreshStatus;
pub use store::{KeyValueStore, MemoryKeyValueStore, SqliteKeyValueStore};
pub use types::*;
