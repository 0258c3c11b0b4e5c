use crate::percent::Percentage;
use chrono::{DateTime, Utc};
use derive_more::{Constructor, Display, From};
use serde::{Deserialize, Deserializer, Serialize};
use smol_str::SmolStr;

/// Identifier of a tradable [`Pair`].
///
/// The GraphQL layer exposes pair primary keys both as `ID` strings and as integers, so
/// deserialisation accepts either and normalises to a string.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Display, From)]
pub struct PairId(pub SmolStr);

impl PairId {
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(SmolStr::new(id))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<&str> for PairId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<i64> for PairId {
    fn from(value: i64) -> Self {
        Self(SmolStr::new(value.to_string()))
    }
}

impl<'de> Deserialize<'de> for PairId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawPairId {
            Int(i64),
            Str(SmolStr),
        }

        Ok(match RawPairId::deserialize(deserializer)? {
            RawPairId::Int(id) => PairId::from(id),
            RawPairId::Str(id) => PairId(id),
        })
    }
}

/// Which of the buy or sell spread a selection or series refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }

    pub fn is_buy(&self) -> bool {
        matches!(self, Side::Buy)
    }

    /// Select the spread value this side refers to.
    pub fn pick(&self, buy_spread: Option<f64>, sell_spread: Option<f64>) -> Option<f64> {
        match self {
            Side::Buy => buy_spread,
            Side::Sell => sell_spread,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Uniqueness key of a selection entry and of the [`ChartSeries`] derived from it.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize, Constructor,
)]
pub struct SeriesKey {
    pub pair_id: PairId,
    pub side: Side,
}

impl std::fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.pair_id, self.side)
    }
}

/// A tradable instrument composed of two underlying legs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct Pair {
    pub id: PairId,
    pub name: String,
    pub leg_a_name: String,
    pub leg_b_name: String,
}

/// One historical spread observation.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SpreadSample {
    pub pair_id: PairId,
    pub buy_spread: Option<f64>,
    pub sell_spread: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

/// One row of the paginated listing.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ListingRow {
    pub id: String,
    pub pair: Pair,
    pub buy_spread: Option<f64>,
    pub sell_spread: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl ListingRow {
    /// Latest spread for the provided [`Side`].
    pub fn spread(&self, side: Side) -> Option<f64> {
        side.pick(self.buy_spread, self.sell_spread)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct PageInfo {
    pub has_previous_page: bool,
    pub has_next_page: bool,
}

/// A settled page of the listing query.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct ListingPage {
    pub rows: Vec<ListingRow>,
    pub page_info: PageInfo,
}

/// Real-time spread update received over the push channel.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PushEvent {
    pub pair_id: PairId,
    pub buy_spread: Option<f64>,
    pub sell_spread: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

/// Display colour of a chart series.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize, Constructor,
)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl std::fmt::Display for Rgb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "rgb({}, {}, {})", self.r, self.g, self.b)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Constructor)]
pub struct ChartPoint {
    pub x: DateTime<Utc>,
    pub y: Percentage,
}

/// Render-ready series, one per selected `(pair, side)`.
///
/// `points` are replaced wholesale on every historical refetch and appended to while live.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSeries {
    pub key: SeriesKey,
    pub label: String,
    pub color: Rgb,
    pub points: Vec<ChartPoint>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_id_deserialises_from_int_or_string() {
        let from_int: PairId = serde_json::from_str("7").unwrap();
        let from_str: PairId = serde_json::from_str("\"7\"").unwrap();
        assert_eq!(from_int, PairId::new("7"));
        assert_eq!(from_str, from_int);
    }

    #[test]
    fn test_side_display_and_pick() {
        assert_eq!(Side::Buy.to_string(), "buy");
        assert_eq!(Side::Sell.to_string(), "sell");
        assert_eq!(Side::Buy.pick(Some(1.0), Some(2.0)), Some(1.0));
        assert_eq!(Side::Sell.pick(Some(1.0), None), None);
    }

    #[test]
    fn test_rgb_display() {
        assert_eq!(Rgb::new(12, 0, 255).to_string(), "rgb(12, 0, 255)");
    }
}
