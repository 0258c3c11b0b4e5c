use crate::timeframe::TimeFrameUnit;
use serde::{Deserialize, Serialize};

/// Default number of listing rows per page.
pub const DEFAULT_PAGE_SIZE: usize = 6;

/// [`DashboardController`](crate::DashboardController) configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Listing rows per page
    pub page_size: usize,
    /// Optional fixed upper bound on listed items, stops "next" at `page * page_size >= cap`
    pub item_cap: Option<usize>,
    /// Time-frame unit selected on start-up
    pub initial_unit: TimeFrameUnit,
    /// Seed for reproducible series colours, random if `None`
    pub color_seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            item_cap: None,
            initial_unit: TimeFrameUnit::Minute,
            color_seed: None,
        }
    }
}

impl EngineConfig {
    /// Build from `SPREAD_PAGE_SIZE`, `SPREAD_ITEM_CAP`, `SPREAD_TIME_FRAME` and
    /// `SPREAD_COLOR_SEED`, falling back to defaults for missing or unparsable values.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            page_size: env_parse("SPREAD_PAGE_SIZE").unwrap_or(defaults.page_size),
            item_cap: env_parse("SPREAD_ITEM_CAP"),
            initial_unit: env_parse("SPREAD_TIME_FRAME").unwrap_or(defaults.initial_unit),
            color_seed: env_parse("SPREAD_COLOR_SEED"),
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_item_cap(mut self, item_cap: Option<usize>) -> Self {
        self.item_cap = item_cap;
        self
    }

    pub fn with_initial_unit(mut self, unit: TimeFrameUnit) -> Self {
        self.initial_unit = unit;
        self
    }

    pub fn with_color_seed(mut self, seed: u64) -> Self {
        self.color_seed = Some(seed);
        self
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|value| value.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = EngineConfig::default()
            .with_page_size(10)
            .with_item_cap(Some(100))
            .with_initial_unit(TimeFrameUnit::Day)
            .with_color_seed(9);

        assert_eq!(config.page_size, 10);
        assert_eq!(config.item_cap, Some(100));
        assert_eq!(config.initial_unit, TimeFrameUnit::Day);
        assert_eq!(config.color_seed, Some(9));
    }

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.page_size, 6);
        assert_eq!(config.item_cap, None);
        assert_eq!(config.initial_unit, TimeFrameUnit::Minute);
        assert_eq!(config.color_seed, None);
    }
}
