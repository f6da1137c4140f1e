//! Scenario Module
//!
//! Scenario data and the store that registers them.

mod entry;
pub mod store;

pub use entry::{IndicatorSeries, Scenario, ScenarioBuilder};
pub use store::{ScenarioStore, StoreSnapshot};
