use crate::{
    model::{ChartPoint, PairId, SeriesKey, Side, SpreadSample},
    percent::to_percentage,
    selection::PairSelectionStore,
    timeframe::{TimeFrameState, TimeFrameUnit},
};
use chrono::{DateTime, Utc};
use fnv::FnvHashSet;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// One `(pair, side)` parameter of a [`HistoricalRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PairParam {
    pub id: PairId,
    pub buy_or_sell: Side,
}

impl PairParam {
    pub fn key(&self) -> SeriesKey {
        SeriesKey::new(self.id.clone(), self.buy_or_sell)
    }
}

/// Batched historical series request covering the full selection.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoricalRequest {
    pub pairs_params: Vec<PairParam>,
    pub time_frame_unit: TimeFrameUnit,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

/// One per-series sample sequence of a historical response.
///
/// Series are positionally aligned with the request's `pairs_params`. A transport able to
/// echo the originating `(pair, side)` should set `tag`, otherwise the owner is inferred.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct HistoricalSeries {
    pub tag: Option<SeriesKey>,
    pub samples: Vec<SpreadSample>,
}

impl HistoricalSeries {
    pub fn untagged(samples: Vec<SpreadSample>) -> Self {
        Self { tag: None, samples }
    }

    pub fn tagged(key: SeriesKey, samples: Vec<SpreadSample>) -> Self {
        Self {
            tag: Some(key),
            samples,
        }
    }

    /// Owner inferred from the first sample: `buy` if its buy spread is populated, else `sell`.
    fn inferred_key(&self) -> Option<SeriesKey> {
        let first = self.samples.first()?;
        let side = if first.buy_spread.is_some() {
            Side::Buy
        } else {
            Side::Sell
        };
        Some(SeriesKey::new(first.pair_id.clone(), side))
    }
}

/// How a response series was associated with its selection entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchSource {
    Tagged,
    Positional,
    Inferred,
}

/// Assembled series awaiting a colour.
#[derive(Debug, Clone, PartialEq)]
pub struct DraftSeries {
    pub key: SeriesKey,
    pub label: String,
    pub points: Vec<ChartPoint>,
}

/// Builds historical requests from the selection and assembles responses into
/// [`DraftSeries`] ordered like the selection.
///
/// Assembly is pure: colour assignment happens afterwards, keyed by each draft's slot (its
/// index in the returned collection).
#[derive(Debug, Clone, Copy, Default)]
pub struct HistoricalSeriesAssembler;

impl HistoricalSeriesAssembler {
    /// Request for the current selection, `None` if nothing is selected.
    pub fn request(
        &self,
        selection: &PairSelectionStore,
        time_frame: &TimeFrameState,
    ) -> Option<HistoricalRequest> {
        if selection.is_empty() {
            return None;
        }

        let (start_date, end_date) = time_frame.effective_bounds();
        Some(HistoricalRequest {
            pairs_params: selection
                .iter()
                .map(|entry| PairParam {
                    id: entry.pair.id.clone(),
                    buy_or_sell: entry.side,
                })
                .collect(),
            time_frame_unit: time_frame.unit(),
            start_date,
            end_date,
        })
    }

    /// Match every response series to its owning selection entry and build its points.
    ///
    /// Series that cannot be matched, or that duplicate an already assembled key, are dropped.
    pub fn assemble(
        &self,
        request: &HistoricalRequest,
        response: Vec<HistoricalSeries>,
        selection: &PairSelectionStore,
    ) -> Vec<DraftSeries> {
        if response.len() != request.pairs_params.len() {
            warn!(
                requested = request.pairs_params.len(),
                received = response.len(),
                "historical response length differs from request"
            );
        }

        let mut seen = FnvHashSet::default();
        let mut drafts = Vec::with_capacity(response.len());

        for (index, series) in response.into_iter().enumerate() {
            let Some((key, source)) = resolve_key(index, &series, request) else {
                warn!(index, "dropping historical series: owner cannot be determined");
                continue;
            };

            let Some(entry) = selection.get(&key) else {
                warn!(index, %key, ?source, "dropping historical series: not in current selection");
                continue;
            };

            if !seen.insert(key.clone()) {
                warn!(index, %key, ?source, "dropping duplicate historical series");
                continue;
            }

            let points = build_points(&key, &series.samples);
            debug!(index, %key, ?source, points = points.len(), "assembled historical series");

            drafts.push(DraftSeries {
                label: entry.label(),
                key,
                points,
            });
        }

        // Keys are unique and all present in the selection
        drafts.sort_by_key(|draft| selection.position(&draft.key).unwrap_or(usize::MAX));
        drafts
    }
}

/// Resolve the owner of a response series: explicit tag, then position in the request, then
/// the populated-field heuristic.
fn resolve_key(
    index: usize,
    series: &HistoricalSeries,
    request: &HistoricalRequest,
) -> Option<(SeriesKey, MatchSource)> {
    if let Some(tag) = &series.tag {
        return Some((tag.clone(), MatchSource::Tagged));
    }

    let positional = request.pairs_params.get(index).map(PairParam::key);
    let inferred = series.inferred_key();

    match (positional, inferred) {
        (Some(positional), None) => Some((positional, MatchSource::Positional)),
        (Some(positional), Some(inferred)) if positional.pair_id == inferred.pair_id => {
            if positional.side != inferred.side {
                warn!(
                    index,
                    %positional,
                    %inferred,
                    "populated-field heuristic disagrees with request position, using position"
                );
            }
            Some((positional, MatchSource::Positional))
        }
        (Some(positional), Some(inferred)) => {
            warn!(
                index,
                %positional,
                %inferred,
                "historical series pair differs from request position, using inferred owner"
            );
            Some((inferred, MatchSource::Inferred))
        }
        (None, Some(inferred)) => Some((inferred, MatchSource::Inferred)),
        (None, None) => None,
    }
}

fn build_points(key: &SeriesKey, samples: &[SpreadSample]) -> Vec<ChartPoint> {
    samples
        .iter()
        .filter_map(|sample| {
            if sample.pair_id != key.pair_id {
                debug!(%key, sample_pair = %sample.pair_id, "skipping sample of foreign pair");
                return None;
            }

            let Some(y) = key
                .side
                .pick(sample.buy_spread, sample.sell_spread)
                .and_then(to_percentage)
            else {
                debug!(%key, timestamp = %sample.timestamp, "skipping sample without spread value");
                return None;
            };

            Some(ChartPoint::new(sample.timestamp, y))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Pair;
    use chrono::TimeZone;

    fn pair(id: &str) -> Pair {
        Pair {
            id: PairId::new(id),
            name: format!("name{id}"),
            leg_a_name: "A".to_string(),
            leg_b_name: "B".to_string(),
        }
    }

    fn time(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2021, 3, 1, 12, minute, 0).unwrap()
    }

    fn buy(id: &str, value: f64, minute: u32) -> SpreadSample {
        SpreadSample {
            pair_id: PairId::new(id),
            buy_spread: Some(value),
            sell_spread: None,
            timestamp: time(minute),
        }
    }

    fn sell(id: &str, value: f64, minute: u32) -> SpreadSample {
        SpreadSample {
            pair_id: PairId::new(id),
            buy_spread: None,
            sell_spread: Some(value),
            timestamp: time(minute),
        }
    }

    fn selection(entries: &[(&str, Side)]) -> PairSelectionStore {
        let mut store = PairSelectionStore::new();
        for (id, side) in entries {
            store.toggle(&pair(id), *side, true).unwrap();
        }
        store
    }

    fn request_for(store: &PairSelectionStore) -> HistoricalRequest {
        HistoricalSeriesAssembler
            .request(store, &TimeFrameState::default())
            .unwrap()
    }

    fn labels(drafts: &[DraftSeries]) -> Vec<&str> {
        drafts.iter().map(|draft| draft.label.as_str()).collect()
    }

    #[test]
    fn test_request_empty_selection() {
        let store = PairSelectionStore::new();
        assert!(
            HistoricalSeriesAssembler
                .request(&store, &TimeFrameState::default())
                .is_none()
        );
    }

    #[test]
    fn test_request_mirrors_selection_and_time_frame() {
        let store = selection(&[("7", Side::Buy), ("3", Side::Sell)]);
        let mut time_frame = TimeFrameState::new(TimeFrameUnit::Hour);
        time_frame.set_range(Some(time(0)), None).unwrap();

        let request = HistoricalSeriesAssembler.request(&store, &time_frame).unwrap();

        assert_eq!(
            request.pairs_params,
            vec![
                PairParam {
                    id: PairId::new("7"),
                    buy_or_sell: Side::Buy
                },
                PairParam {
                    id: PairId::new("3"),
                    buy_or_sell: Side::Sell
                },
            ]
        );
        assert_eq!(request.time_frame_unit, TimeFrameUnit::Hour);
        assert_eq!(request.start_date, Some(time(0)));
        assert_eq!(request.end_date, None);
    }

    #[test]
    fn test_assemble_single_buy_series() {
        let store = selection(&[("7", Side::Buy)]);
        let request = request_for(&store);

        let drafts = HistoricalSeriesAssembler.assemble(
            &request,
            vec![HistoricalSeries::untagged(vec![buy("7", 0.01, 1)])],
            &store,
        );

        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].label, "name7 (buy)");
        assert_eq!(drafts[0].points.len(), 1);
        assert_eq!(drafts[0].points[0].x, time(1));
        assert_eq!(drafts[0].points[0].y.to_string(), "1.00");
    }

    #[test]
    fn test_assemble_orders_by_selection() {
        let store = selection(&[("1", Side::Buy), ("2", Side::Sell), ("1", Side::Sell)]);
        let request = request_for(&store);

        // Tagged series may come back in any order
        let response = vec![
            HistoricalSeries::tagged(
                SeriesKey::new(PairId::new("1"), Side::Sell),
                vec![sell("1", 0.02, 1)],
            ),
            HistoricalSeries::tagged(
                SeriesKey::new(PairId::new("1"), Side::Buy),
                vec![buy("1", 0.01, 1)],
            ),
            HistoricalSeries::tagged(
                SeriesKey::new(PairId::new("2"), Side::Sell),
                vec![sell("2", 0.03, 1)],
            ),
        ];

        let drafts = HistoricalSeriesAssembler.assemble(&request, response, &store);
        assert_eq!(labels(&drafts), vec!["name1 (buy)", "name2 (sell)", "name1 (sell)"]);
    }

    #[test]
    fn test_position_resolves_null_first_buy_value() {
        let store = selection(&[("7", Side::Buy)]);
        let request = request_for(&store);

        // First buy value missing would make the heuristic pick `sell`
        let samples = vec![
            SpreadSample {
                pair_id: PairId::new("7"),
                buy_spread: None,
                sell_spread: Some(0.5),
                timestamp: time(0),
            },
            buy("7", 0.02, 1),
        ];

        let drafts = HistoricalSeriesAssembler.assemble(
            &request,
            vec![HistoricalSeries::untagged(samples)],
            &store,
        );

        assert_eq!(labels(&drafts), vec!["name7 (buy)"]);
        assert_eq!(drafts[0].points.len(), 1);
        assert_eq!(drafts[0].points[0].y.to_string(), "2.00");
    }

    #[test]
    fn test_empty_series_resolved_by_position() {
        let store = selection(&[("7", Side::Sell)]);
        let request = request_for(&store);

        let drafts = HistoricalSeriesAssembler.assemble(
            &request,
            vec![HistoricalSeries::untagged(vec![])],
            &store,
        );

        assert_eq!(labels(&drafts), vec!["name7 (sell)"]);
        assert!(drafts[0].points.is_empty());
    }

    #[test]
    fn test_heuristic_fallback_when_position_mismatches() {
        let store = selection(&[("1", Side::Buy), ("2", Side::Sell)]);
        let request = request_for(&store);

        // Server returned the series in swapped order
        let response = vec![
            HistoricalSeries::untagged(vec![sell("2", 0.01, 0)]),
            HistoricalSeries::untagged(vec![buy("1", 0.02, 0)]),
        ];

        let drafts = HistoricalSeriesAssembler.assemble(&request, response, &store);
        assert_eq!(labels(&drafts), vec!["name1 (buy)", "name2 (sell)"]);
    }

    #[test]
    fn test_unmatched_and_duplicate_series_dropped() {
        let store = selection(&[("1", Side::Buy)]);
        let request = request_for(&store);

        let response = vec![
            HistoricalSeries::untagged(vec![buy("1", 0.01, 0)]),
            // Duplicate owner
            HistoricalSeries::untagged(vec![buy("1", 0.05, 0)]),
            // Deselected since the request was issued
            HistoricalSeries::untagged(vec![buy("9", 0.01, 0)]),
            // Nothing to infer from
            HistoricalSeries::untagged(vec![]),
        ];

        let drafts = HistoricalSeriesAssembler.assemble(&request, response, &store);
        assert_eq!(labels(&drafts), vec!["name1 (buy)"]);
        assert_eq!(drafts[0].points[0].y.to_string(), "1.00");
    }
}
