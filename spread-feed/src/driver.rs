use crate::{
    config::FeedConfig,
    http::SpreadApi,
    subscription::{PushChannel, PushUpdate, SubscriptionHandle},
};
use chrono::{DateTime, Utc};
use spread_engine::{
    ChartSeries, ChartStatus, Command, ControlsView, DashboardController, EngineError,
    FetchFailure, FetchKind, HistoricalSeries, ListingPage, ListingView, Pair, RequestTicket,
    SeriesKey, Side, TimeFrameUnit,
};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, trace, warn};

/// User intent forwarded from the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Toggle {
        pair: Pair,
        side: Side,
        selected: bool,
    },
    SetPageSize(usize),
    NextPage,
    PrevPage,
    SetTimeFrame(TimeFrameUnit),
    SetDateRange {
        start_date: Option<DateTime<Utc>>,
        end_date: Option<DateTime<Utc>>,
    },
    SetLive(bool),
    Refresh,
    Shutdown,
}

/// Render-ready copy of the dashboard state, published after every processed event.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardSnapshot {
    pub series: Vec<ChartSeries>,
    pub chart_status: ChartStatus,
    pub listing: ListingView,
    pub controls: ControlsView,
    pub selected: Vec<SeriesKey>,
    /// Last rejected action, cleared by the next accepted one
    pub rejection: Option<EngineError>,
}

impl DashboardSnapshot {
    fn capture(controller: &DashboardController, rejection: Option<EngineError>) -> Self {
        Self {
            series: controller.chart_series().to_vec(),
            chart_status: controller.chart_status().clone(),
            listing: controller.listing().clone(),
            controls: controller.controls(),
            selected: controller.selection().keys().cloned().collect(),
            rejection,
        }
    }

    pub fn is_selected(&self, key: &SeriesKey) -> bool {
        self.selected.contains(key)
    }
}

#[derive(Debug)]
enum FetchResult {
    Listing {
        ticket: RequestTicket,
        result: Result<ListingPage, FetchFailure>,
    },
    Historical {
        ticket: RequestTicket,
        result: Result<Vec<HistoricalSeries>, FetchFailure>,
    },
}

#[derive(Debug)]
enum Event {
    Action(Action),
    Fetch(FetchResult),
    Push(PushUpdate),
    ActionsClosed,
}

/// Single-threaded event loop owning the [`DashboardController`].
///
/// Actions, fetch results and push updates are applied one at a time. Engine [`Command`]s are
/// executed by spawning fetch tasks against the [`SpreadApi`] and by opening or closing
/// subscriptions on the [`PushChannel`]. Each subscription gets its own update channel, so
/// updates of a replaced subscription are never merged.
pub struct DashboardDriver<Api, Push> {
    controller: DashboardController,
    api: Arc<Api>,
    push: Push,
    channel_buffer_size: usize,
    results_tx: mpsc::Sender<FetchResult>,
    results_rx: mpsc::Receiver<FetchResult>,
    subscription: Option<(SubscriptionHandle, mpsc::Receiver<PushUpdate>)>,
    snapshot_tx: watch::Sender<DashboardSnapshot>,
    rejection: Option<EngineError>,
}

impl<Api, Push> DashboardDriver<Api, Push>
where
    Api: SpreadApi + 'static,
    Push: PushChannel + 'static,
{
    pub fn new(
        controller: DashboardController,
        api: Arc<Api>,
        push: Push,
        config: &FeedConfig,
    ) -> (Self, watch::Receiver<DashboardSnapshot>) {
        let (results_tx, results_rx) = mpsc::channel(config.channel_buffer_size);
        let (snapshot_tx, snapshot_rx) =
            watch::channel(DashboardSnapshot::capture(&controller, None));

        let driver = Self {
            controller,
            api,
            push,
            channel_buffer_size: config.channel_buffer_size,
            results_tx,
            results_rx,
            subscription: None,
            snapshot_tx,
            rejection: None,
        };

        (driver, snapshot_rx)
    }

    /// Run until [`Action::Shutdown`] is received or every action sender is dropped.
    pub async fn run(mut self, mut actions: mpsc::Receiver<Action>) {
        info!("dashboard driver started");

        let commands = self.controller.start();
        self.execute(commands);
        self.publish();

        loop {
            let event = tokio::select! {
                action = actions.recv() => match action {
                    Some(action) => Event::Action(action),
                    None => Event::ActionsClosed,
                },
                Some(result) = self.results_rx.recv() => Event::Fetch(result),
                Some(update) = next_push_update(&mut self.subscription) => Event::Push(update),
            };

            match event {
                Event::Action(Action::Shutdown) | Event::ActionsClosed => break,
                Event::Action(action) => self.apply_action(action),
                Event::Fetch(result) => self.apply_fetch_result(result),
                Event::Push(update) => self.apply_push_update(update),
            }

            self.publish();
        }

        if let Some((handle, _)) = self.subscription.take() {
            handle.close();
        }
        info!("dashboard driver stopped");
    }

    fn apply_action(&mut self, action: Action) {
        debug!(?action, "applying dashboard action");

        let outcome = match action {
            Action::Toggle {
                pair,
                side,
                selected,
            } => self.controller.toggle_selection(&pair, side, selected),
            Action::SetPageSize(page_size) => self.controller.set_page_size(page_size),
            Action::NextPage => Ok(self.controller.next_page()),
            Action::PrevPage => Ok(self.controller.prev_page()),
            Action::SetTimeFrame(unit) => self.controller.set_time_frame(unit),
            Action::SetDateRange {
                start_date,
                end_date,
            } => self.controller.set_date_range(start_date, end_date),
            Action::SetLive(is_live) => Ok(self.controller.set_live(is_live)),
            Action::Refresh => Ok(self.controller.refresh()),
            Action::Shutdown => Ok(Vec::new()),
        };

        match outcome {
            Ok(commands) => {
                self.rejection = None;
                self.execute(commands);
            }
            Err(error) => {
                warn!(%error, "dashboard action rejected");
                self.rejection = Some(error);
            }
        }
    }

    fn apply_fetch_result(&mut self, result: FetchResult) {
        match result {
            FetchResult::Listing { ticket, result } => {
                self.controller.on_listing_result(ticket, result)
            }
            FetchResult::Historical { ticket, result } => {
                self.controller.on_historical_result(ticket, result)
            }
        }
    }

    fn apply_push_update(&mut self, update: PushUpdate) {
        match update {
            PushUpdate::Event(event) => {
                let appended = self.controller.on_push_event(&event);
                trace!(pair_id = %event.pair_id, appended, "merged push event");
            }
            PushUpdate::Status(status) => self.controller.on_channel_status(status),
        }
    }

    fn execute(&mut self, commands: Vec<Command>) {
        for command in commands {
            match command {
                Command::FetchListing { ticket, query } => {
                    let api = Arc::clone(&self.api);
                    let results_tx = self.results_tx.clone();
                    tokio::spawn(async move {
                        let result = api
                            .fetch_listing(query)
                            .await
                            .map_err(|error| error.into_fetch_failure(FetchKind::Listing));
                        let _ = results_tx
                            .send(FetchResult::Listing { ticket, result })
                            .await;
                    });
                }
                Command::FetchHistorical { ticket, request } => {
                    let api = Arc::clone(&self.api);
                    let results_tx = self.results_tx.clone();
                    tokio::spawn(async move {
                        let result = api
                            .fetch_historical(&request)
                            .await
                            .map_err(|error| error.into_fetch_failure(FetchKind::Historical));
                        let _ = results_tx
                            .send(FetchResult::Historical { ticket, result })
                            .await;
                    });
                }
                Command::Subscribe(params) => {
                    let (updates_tx, updates_rx) = mpsc::channel(self.channel_buffer_size);
                    let handle = self.push.open(params, updates_tx);
                    if let Some((previous, _)) = self.subscription.replace((handle, updates_rx)) {
                        previous.close();
                    }
                }
                Command::Unsubscribe => {
                    if let Some((handle, _)) = self.subscription.take() {
                        handle.close();
                    }
                }
            }
        }
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(DashboardSnapshot::capture(
            &self.controller,
            self.rejection.clone(),
        ));
    }
}

async fn next_push_update(
    subscription: &mut Option<(SubscriptionHandle, mpsc::Receiver<PushUpdate>)>,
) -> Option<PushUpdate> {
    match subscription {
        Some((_, updates)) => updates.recv().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FeedError;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use spread_engine::{
        ChannelStatus, EngineConfig, HistoricalRequest, ListingQuery, ListingRow, PageInfo,
        PairId, PushEvent, SpreadSample, SubscriptionParams,
    };
    use std::{sync::Mutex, time::Duration};
    use tokio::sync::oneshot;

    fn pair(id: &str) -> Pair {
        Pair {
            id: PairId::new(id),
            name: format!("name{id}"),
            leg_a_name: "A".to_string(),
            leg_b_name: "B".to_string(),
        }
    }

    fn time(second: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2021, 3, 1, 12, 0, second).unwrap()
    }

    struct FakeApi {
        fail_listing: bool,
    }

    #[async_trait]
    impl SpreadApi for FakeApi {
        async fn fetch_listing(&self, _: ListingQuery) -> Result<ListingPage, FeedError> {
            if self.fail_listing {
                return Err(FeedError::Status(500));
            }
            Ok(ListingPage {
                rows: vec![ListingRow {
                    id: "row7".to_string(),
                    pair: pair("7"),
                    buy_spread: Some(0.01),
                    sell_spread: Some(0.02),
                    timestamp: time(0),
                }],
                page_info: PageInfo {
                    has_previous_page: false,
                    has_next_page: false,
                },
            })
        }

        async fn fetch_historical(
            &self,
            request: &HistoricalRequest,
        ) -> Result<Vec<HistoricalSeries>, FeedError> {
            Ok(request
                .pairs_params
                .iter()
                .map(|param| {
                    HistoricalSeries::untagged(vec![SpreadSample {
                        pair_id: param.id.clone(),
                        buy_spread: param.buy_or_sell.is_buy().then_some(0.01),
                        sell_spread: (!param.buy_or_sell.is_buy()).then_some(0.02),
                        timestamp: time(0),
                    }])
                })
                .collect())
        }
    }

    #[derive(Default)]
    struct FakePush {
        opened: Arc<Mutex<Vec<(SubscriptionParams, mpsc::Sender<PushUpdate>)>>>,
    }

    impl PushChannel for FakePush {
        fn open(
            &self,
            params: SubscriptionParams,
            updates: mpsc::Sender<PushUpdate>,
        ) -> SubscriptionHandle {
            self.opened.lock().unwrap().push((params, updates));
            let (shutdown_tx, _) = oneshot::channel();
            SubscriptionHandle::new(shutdown_tx, tokio::spawn(async {}))
        }
    }

    async fn wait_for(
        snapshots: &mut watch::Receiver<DashboardSnapshot>,
        predicate: impl Fn(&DashboardSnapshot) -> bool,
    ) -> DashboardSnapshot {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let snapshot = snapshots.borrow_and_update().clone();
                if predicate(&snapshot) {
                    return snapshot;
                }
                snapshots.changed().await.unwrap();
            }
        })
        .await
        .unwrap()
    }

    fn spawn_driver(
        api: FakeApi,
        push: FakePush,
    ) -> (
        mpsc::Sender<Action>,
        watch::Receiver<DashboardSnapshot>,
        tokio::task::JoinHandle<()>,
    ) {
        let controller =
            DashboardController::new(EngineConfig::default().with_color_seed(1)).unwrap();
        let (driver, snapshots) =
            DashboardDriver::new(controller, Arc::new(api), push, &FeedConfig::default());
        let (actions_tx, actions_rx) = mpsc::channel(16);
        let task = tokio::spawn(driver.run(actions_rx));
        (actions_tx, snapshots, task)
    }

    #[tokio::test]
    async fn test_selection_live_and_shutdown() {
        let push = FakePush::default();
        let opened = Arc::clone(&push.opened);
        let (actions, mut snapshots, task) = spawn_driver(FakeApi { fail_listing: false }, push);

        wait_for(&mut snapshots, |snapshot| {
            matches!(snapshot.listing, ListingView::Ready(_))
        })
        .await;

        actions
            .send(Action::Toggle {
                pair: pair("7"),
                side: Side::Buy,
                selected: true,
            })
            .await
            .unwrap();
        let snapshot = wait_for(&mut snapshots, |snapshot| {
            snapshot.chart_status == ChartStatus::Settled && snapshot.series.len() == 1
        })
        .await;
        assert_eq!(snapshot.series[0].label, "name7 (buy)");
        assert!(snapshot.is_selected(&SeriesKey::new(PairId::new("7"), Side::Buy)));

        actions.send(Action::SetLive(true)).await.unwrap();
        wait_for(&mut snapshots, |snapshot| snapshot.controls.is_live).await;

        let updates = {
            let opened = opened.lock().unwrap();
            assert_eq!(opened.len(), 1);
            assert_eq!(opened[0].0.pair_ids, vec![PairId::new("7")]);
            opened[0].1.clone()
        };
        updates
            .send(PushUpdate::Status(ChannelStatus::Connected))
            .await
            .unwrap();
        updates
            .send(PushUpdate::Event(PushEvent {
                pair_id: PairId::new("7"),
                buy_spread: Some(0.03),
                sell_spread: None,
                timestamp: time(5),
            }))
            .await
            .unwrap();
        let snapshot = wait_for(&mut snapshots, |snapshot| {
            snapshot.series.first().is_some_and(|series| series.points.len() == 2)
        })
        .await;
        assert_eq!(snapshot.series[0].points[1].y.to_string(), "3.00");
        assert_eq!(snapshot.controls.channel, ChannelStatus::Connected);

        // Toggles are locked while live
        actions
            .send(Action::Toggle {
                pair: pair("7"),
                side: Side::Sell,
                selected: true,
            })
            .await
            .unwrap();
        wait_for(&mut snapshots, |snapshot| {
            snapshot.rejection == Some(EngineError::LiveModeLocked)
        })
        .await;

        actions.send(Action::Shutdown).await.unwrap();
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_listing_failure_is_published() {
        let (actions, mut snapshots, task) =
            spawn_driver(FakeApi { fail_listing: true }, FakePush::default());

        let snapshot = wait_for(&mut snapshots, |snapshot| {
            matches!(snapshot.listing, ListingView::Failed(_))
        })
        .await;
        assert_eq!(
            snapshot.listing,
            ListingView::Failed(FetchFailure::new(FetchKind::Listing, "HTTP status 500"))
        );

        drop(actions);
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
    }
}
