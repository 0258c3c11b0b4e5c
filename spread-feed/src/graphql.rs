//! GraphQL documents exchanged with the spread server and the DTOs decoding their responses
//! into [`spread_engine`] types.

use crate::error::FeedError;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use spread_engine::{
    HistoricalRequest, HistoricalSeries, ListingPage, ListingRow, PageInfo, Pair, PairId,
    PairParam, PushEvent, SpreadSample, TimeFrameUnit,
};

/// Paginated listing of the latest spread per pair.
pub const SPREADS_QUERY: &str = r#"
query Spreads($first: Int!, $offset: Int!) {
  spreads(first: $first, offset: $offset) {
    pageInfo {
      hasPreviousPage
      hasNextPage
    }
    edges {
      node {
        id
        pair {
          pk
          name
          pairA { name }
          pairB { name }
        }
        buySpread
        sellSpread
        timestamp
      }
    }
  }
}
"#;

/// Historical spreads of the selected (pair, side) entries, one sample list per entry.
pub const CHART_PAIRS_SPREADS_QUERY: &str = r#"
query ChartPairsSpreads($pairsParams: [PairInput]!, $timeFrame: String!, $startDate: DateTime, $endDate: DateTime) {
  chartPairsSpreads(pairsParams: $pairsParams, timeFrame: $timeFrame, startDate: $startDate, endDate: $endDate) {
    buySpread
    sellSpread
    timestamp
    pair
  }
}
"#;

/// Live spread updates for a set of pairs.
pub const SPREAD_SUBSCRIPTION: &str = r#"
subscription Spread($pairsIds: [ID]!) {
  spread(pairsIds: $pairsIds) {
    spread {
      buySpread
      sellSpread
      timestamp
      pair {
        pk
        name
      }
    }
  }
}
"#;

/// GraphQL operation envelope, shared by HTTP queries & WebSocket `start` payloads.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphQlRequest<'a, V> {
    pub operation_name: &'a str,
    pub query: &'a str,
    pub variables: V,
}

impl<'a, V> GraphQlRequest<'a, V> {
    pub fn new(operation_name: &'a str, query: &'a str, variables: V) -> Self {
        Self {
            operation_name,
            query,
            variables,
        }
    }
}

/// GraphQL response envelope.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GraphQlResponse<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Vec<GraphQlErrorMessage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GraphQlErrorMessage {
    pub message: String,
}

impl<T> GraphQlResponse<T> {
    /// Any reported error wins over partial data.
    pub fn into_data(self) -> Result<T, FeedError> {
        if !self.errors.is_empty() {
            return Err(FeedError::GraphQl(
                self.errors.into_iter().map(|error| error.message).collect(),
            ));
        }
        self.data.ok_or(FeedError::MissingData)
    }
}

/// Variables of [`CHART_PAIRS_SPREADS_QUERY`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartPairsSpreadsVariables<'a> {
    pub pairs_params: &'a [PairParam],
    pub time_frame: TimeFrameUnit,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime<Utc>>,
}

impl<'a> From<&'a HistoricalRequest> for ChartPairsSpreadsVariables<'a> {
    fn from(request: &'a HistoricalRequest) -> Self {
        Self {
            pairs_params: &request.pairs_params,
            time_frame: request.time_frame_unit,
            start_date: request.start_date,
            end_date: request.end_date,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SpreadsData {
    pub spreads: SpreadConnection,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpreadConnection {
    pub page_info: PageInfoNode,
    #[serde(default)]
    pub edges: Vec<SpreadEdge>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfoNode {
    pub has_previous_page: bool,
    pub has_next_page: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SpreadEdge {
    pub node: Option<SpreadNode>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpreadNode {
    pub id: String,
    pub pair: PairNode,
    pub buy_spread: Option<f64>,
    pub sell_spread: Option<f64>,
    #[serde(deserialize_with = "de_timestamp")]
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairNode {
    pub pk: PairId,
    pub name: String,
    pub pair_a: LegNode,
    pub pair_b: LegNode,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LegNode {
    pub name: String,
}

impl From<SpreadsData> for ListingPage {
    fn from(data: SpreadsData) -> Self {
        let SpreadConnection { page_info, edges } = data.spreads;

        let rows = edges
            .into_iter()
            .filter_map(|edge| edge.node)
            .map(|node| ListingRow {
                id: node.id,
                pair: Pair {
                    id: node.pair.pk,
                    name: node.pair.name,
                    leg_a_name: node.pair.pair_a.name,
                    leg_b_name: node.pair.pair_b.name,
                },
                buy_spread: node.buy_spread,
                sell_spread: node.sell_spread,
                timestamp: node.timestamp,
            })
            .collect();

        ListingPage {
            rows,
            page_info: PageInfo {
                has_previous_page: page_info.has_previous_page,
                has_next_page: page_info.has_next_page,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartPairsSpreadsData {
    #[serde(default)]
    pub chart_pairs_spreads: Vec<Vec<ChartSpreadNode>>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartSpreadNode {
    pub buy_spread: Option<f64>,
    pub sell_spread: Option<f64>,
    #[serde(deserialize_with = "de_timestamp")]
    pub timestamp: DateTime<Utc>,
    pub pair: PairId,
}

impl From<ChartSpreadNode> for SpreadSample {
    fn from(node: ChartSpreadNode) -> Self {
        Self {
            pair_id: node.pair,
            buy_spread: node.buy_spread,
            sell_spread: node.sell_spread,
            timestamp: node.timestamp,
        }
    }
}

impl From<ChartPairsSpreadsData> for Vec<HistoricalSeries> {
    fn from(data: ChartPairsSpreadsData) -> Self {
        // The server does not echo the requested side, series are matched by the assembler
        data.chart_pairs_spreads
            .into_iter()
            .map(|nodes| HistoricalSeries::untagged(nodes.into_iter().map(SpreadSample::from).collect()))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SpreadSubscriptionData {
    pub spread: SpreadPayload,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SpreadPayload {
    pub spread: LiveSpreadNode,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveSpreadNode {
    pub buy_spread: Option<f64>,
    pub sell_spread: Option<f64>,
    #[serde(deserialize_with = "de_timestamp")]
    pub timestamp: DateTime<Utc>,
    pub pair: PairRef,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PairRef {
    pub pk: PairId,
    #[serde(default)]
    pub name: Option<String>,
}

impl From<SpreadSubscriptionData> for PushEvent {
    fn from(data: SpreadSubscriptionData) -> Self {
        let node = data.spread.spread;
        Self {
            pair_id: node.pair.pk,
            buy_spread: node.buy_spread,
            sell_spread: node.sell_spread,
            timestamp: node.timestamp,
        }
    }
}

/// Parse an RFC 3339 timestamp, treating a naive timestamp without offset as UTC.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|timestamp| timestamp.with_timezone(&Utc))
        .or_else(|_| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").map(|naive| naive.and_utc())
        })
}

fn de_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).map_err(serde::de::Error::custom)
}
