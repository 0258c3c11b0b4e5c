use crate::{
    error::ChannelFailure,
    model::{ChartPoint, ChartSeries, PairId, PushEvent},
    percent::to_percentage,
    selection::PairSelectionStore,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Push subscription parameters: the distinct pair identifiers of the selection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct SubscriptionParams {
    #[serde(rename = "pairsIds")]
    pub pair_ids: Vec<PairId>,
}

impl SubscriptionParams {
    /// Desired subscription as a pure function of live mode & selection.
    ///
    /// `None` while not live or when nothing is selected.
    pub fn derive(is_live: bool, selection: &PairSelectionStore) -> Option<Self> {
        if !is_live || selection.is_empty() {
            return None;
        }
        Some(Self {
            pair_ids: selection.pair_ids(),
        })
    }

    pub fn contains(&self, pair_id: &PairId) -> bool {
        self.pair_ids.contains(pair_id)
    }
}

/// Change to the push subscription required to match the desired [`SubscriptionParams`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionChange {
    /// Open a subscription, replacing any active one.
    Open(SubscriptionParams),
    Close,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
pub enum LiveState {
    #[default]
    Off,
    Live,
}

/// Push channel health as reported by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ChannelStatus {
    #[default]
    Idle,
    Connecting,
    Connected,
    Failed(ChannelFailure),
}

/// Merges push events into chart series while live.
#[derive(Debug, Clone, Default)]
pub struct LiveUpdateMerger {
    state: LiveState,
    active: Option<SubscriptionParams>,
    channel: ChannelStatus,
}

impl LiveUpdateMerger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> LiveState {
        self.state
    }

    pub fn is_live(&self) -> bool {
        self.state == LiveState::Live
    }

    pub fn active_subscription(&self) -> Option<&SubscriptionParams> {
        self.active.as_ref()
    }

    pub fn channel_status(&self) -> &ChannelStatus {
        &self.channel
    }

    /// Move to the provided live state and diff the desired subscription against the active
    /// one, yielding the change (if any) the transport must apply.
    pub fn reconcile(
        &mut self,
        is_live: bool,
        selection: &PairSelectionStore,
    ) -> Option<SubscriptionChange> {
        self.state = if is_live { LiveState::Live } else { LiveState::Off };

        let desired = SubscriptionParams::derive(is_live, selection);
        if desired == self.active {
            return None;
        }

        let change = match &desired {
            Some(params) => {
                info!(pairs = ?params.pair_ids, "opening push subscription");
                SubscriptionChange::Open(params.clone())
            }
            None => {
                info!("closing push subscription");
                self.channel = ChannelStatus::Idle;
                SubscriptionChange::Close
            }
        };

        self.active = desired;
        Some(change)
    }

    /// Append one point per selection entry matching the event's pair.
    ///
    /// No-op while [`LiveState::Off`]. Events for pairs without a materialised series (eg/
    /// before the first historical fetch settles) are dropped. Ordering & duplicates are
    /// trusted as delivered. Returns the number of points appended.
    pub fn merge(
        &self,
        event: &PushEvent,
        selection: &PairSelectionStore,
        series: &mut [ChartSeries],
    ) -> usize {
        if !self.is_live() {
            return 0;
        }

        if !self
            .active
            .as_ref()
            .is_some_and(|params| params.contains(&event.pair_id))
        {
            debug!(pair_id = %event.pair_id, "ignoring push event for unsubscribed pair");
            return 0;
        }

        let mut appended = 0;
        for entry in selection.entries_for_pair(&event.pair_id) {
            let key = entry.key();

            let Some(target) = series.iter_mut().find(|series| series.key == key) else {
                debug!(%key, "dropping push event: series not materialised yet");
                continue;
            };

            let Some(y) = entry
                .side
                .pick(event.buy_spread, event.sell_spread)
                .and_then(to_percentage)
            else {
                debug!(%key, "skipping push event without spread value");
                continue;
            };

            target.points.push(ChartPoint::new(event.timestamp, y));
            appended += 1;
        }

        appended
    }

    pub fn on_channel_status(&mut self, status: ChannelStatus) {
        if let ChannelStatus::Failed(failure) = &status {
            warn!(%failure, "push channel failure, live merging paused until recovery");
        }
        self.channel = status;
    }
}
