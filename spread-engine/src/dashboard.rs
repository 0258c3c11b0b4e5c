use crate::{
    color::ColorAllocator,
    config::EngineConfig,
    error::{EngineError, FetchFailure},
    historical::{HistoricalRequest, HistoricalSeries, HistoricalSeriesAssembler},
    live::{ChannelStatus, LiveUpdateMerger, SubscriptionChange, SubscriptionParams},
    model::{ChartSeries, ListingPage, Pair, PushEvent, SeriesKey, Side},
    pagination::{ListingQuery, PaginationController},
    selection::PairSelectionStore,
    timeframe::{TimeFrameState, TimeFrameUnit},
};
use chrono::{DateTime, Utc};
use derive_more::Display;
use tracing::{debug, error, info, warn};

/// Generation tag of an issued request. Results carrying an outdated ticket are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display)]
#[display("#{_0}")]
pub struct RequestTicket(pub u64);

/// Effect the transport collaborator must execute on behalf of the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    FetchListing {
        ticket: RequestTicket,
        query: ListingQuery,
    },
    FetchHistorical {
        ticket: RequestTicket,
        request: HistoricalRequest,
    },
    /// Open the push subscription, replacing any active one.
    Subscribe(SubscriptionParams),
    Unsubscribe,
}

/// State of the listing table.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ListingView {
    #[default]
    Loading,
    Ready(ListingPage),
    /// Blocking error state, no partial table is rendered.
    Failed(FetchFailure),
}

/// State of the chart's historical fetch. Previous series stay visible in every state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ChartStatus {
    #[default]
    Idle,
    Fetching,
    Settled,
    Failed(FetchFailure),
}

/// Render-ready state of the dashboard controls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlsView {
    pub unit: TimeFrameUnit,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub is_live: bool,
    pub page: usize,
    pub page_size: usize,
    pub can_prev: bool,
    pub can_next: bool,
    /// Buy/sell toggles of the listing are enabled
    pub toggles_enabled: bool,
    /// Time-frame selector & date pickers are enabled
    pub range_enabled: bool,
    pub channel: ChannelStatus,
}

/// Orchestrates pagination, selection, historical assembly and live merging into one
/// consolidated chart series view.
///
/// Every operation runs to completion and returns the [`Command`]s to execute. Async results
/// are fed back through the `on_*` methods.
#[derive(Debug)]
pub struct DashboardController {
    time_frame: TimeFrameState,
    pagination: PaginationController,
    selection: PairSelectionStore,
    colors: ColorAllocator,
    assembler: HistoricalSeriesAssembler,
    merger: LiveUpdateMerger,
    listing: ListingView,
    series: Vec<ChartSeries>,
    chart_status: ChartStatus,
    ticket_sequence: u64,
    listing_inflight: Option<RequestTicket>,
    historical_inflight: Option<(RequestTicket, HistoricalRequest)>,
    last_historical_request: Option<HistoricalRequest>,
}

impl DashboardController {
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        let pagination =
            PaginationController::new(config.page_size)?.with_item_cap(config.item_cap);
        let colors = match config.color_seed {
            Some(seed) => ColorAllocator::seeded(seed),
            None => ColorAllocator::new(),
        };

        Ok(Self {
            time_frame: TimeFrameState::new(config.initial_unit),
            pagination,
            selection: PairSelectionStore::new(),
            colors,
            assembler: HistoricalSeriesAssembler,
            merger: LiveUpdateMerger::new(),
            listing: ListingView::Loading,
            series: Vec::new(),
            chart_status: ChartStatus::Idle,
            ticket_sequence: 0,
            listing_inflight: None,
            historical_inflight: None,
            last_historical_request: None,
        })
    }

    /// Initial commands: fetch the first listing page (and series for any selection).
    pub fn start(&mut self) -> Vec<Command> {
        let mut commands = Vec::new();
        self.fetch_listing(&mut commands);
        self.refresh_historical(false, &mut commands);
        self.reconcile_subscription(&mut commands);
        commands
    }

    /// Re-issue the listing & historical queries regardless of whether their parameters
    /// changed. Failures are never retried automatically, this is the manual retry.
    pub fn refresh(&mut self) -> Vec<Command> {
        let mut commands = Vec::new();
        self.fetch_listing(&mut commands);
        self.refresh_historical(true, &mut commands);
        commands
    }

    pub fn toggle_selection(
        &mut self,
        pair: &Pair,
        side: Side,
        selected: bool,
    ) -> Result<Vec<Command>, EngineError> {
        let mut commands = Vec::new();
        if self.selection.toggle(pair, side, selected)? {
            self.refresh_historical(false, &mut commands);
            self.reconcile_subscription(&mut commands);
        }
        Ok(commands)
    }

    pub fn set_page_size(&mut self, page_size: usize) -> Result<Vec<Command>, EngineError> {
        let mut commands = Vec::new();
        if self.pagination.set_page_size(page_size)? {
            self.fetch_listing(&mut commands);
        }
        Ok(commands)
    }

    pub fn next_page(&mut self) -> Vec<Command> {
        let mut commands = Vec::new();
        if self.pagination.next() {
            self.fetch_listing(&mut commands);
        }
        commands
    }

    pub fn prev_page(&mut self) -> Vec<Command> {
        let mut commands = Vec::new();
        if self.pagination.prev() {
            self.fetch_listing(&mut commands);
        }
        commands
    }

    pub fn set_time_frame(&mut self, unit: TimeFrameUnit) -> Result<Vec<Command>, EngineError> {
        let mut commands = Vec::new();
        if self.time_frame.set_unit(unit)? {
            self.refresh_historical(false, &mut commands);
        }
        Ok(commands)
    }

    pub fn set_date_range(
        &mut self,
        start_date: Option<DateTime<Utc>>,
        end_date: Option<DateTime<Utc>>,
    ) -> Result<Vec<Command>, EngineError> {
        let mut commands = Vec::new();
        if self.time_frame.set_range(start_date, end_date)? {
            self.refresh_historical(false, &mut commands);
        }
        Ok(commands)
    }

    /// Enter or leave live mode.
    ///
    /// Entering forces minute granularity, locks selection & range controls and opens the
    /// push subscription. Leaving closes it and restores the stored date bounds.
    pub fn set_live(&mut self, is_live: bool) -> Vec<Command> {
        let mut commands = Vec::new();
        if !self.time_frame.set_live(is_live) {
            return commands;
        }

        info!(is_live, "live mode toggled");
        self.selection.set_locked(is_live);
        self.refresh_historical(false, &mut commands);
        self.reconcile_subscription(&mut commands);
        commands
    }

    pub fn on_listing_result(
        &mut self,
        ticket: RequestTicket,
        result: Result<ListingPage, FetchFailure>,
    ) {
        if self.listing_inflight != Some(ticket) {
            debug!(%ticket, "ignoring stale listing result");
            return;
        }
        self.listing_inflight = None;

        match result {
            Ok(page) => {
                debug!(%ticket, rows = page.rows.len(), "listing settled");
                self.pagination.apply_page_info(page.page_info);
                self.listing = ListingView::Ready(page);
            }
            Err(failure) => {
                error!(%ticket, %failure, "listing fetch failed");
                self.listing = ListingView::Failed(failure);
            }
        }
    }

    pub fn on_historical_result(
        &mut self,
        ticket: RequestTicket,
        result: Result<Vec<HistoricalSeries>, FetchFailure>,
    ) {
        let request = match self.historical_inflight.take() {
            Some((inflight, request)) if inflight == ticket => request,
            other => {
                debug!(%ticket, "ignoring stale historical result");
                self.historical_inflight = other;
                return;
            }
        };

        match result {
            Ok(response) => {
                let drafts = self.assembler.assemble(&request, response, &self.selection);
                self.colors.register_slots(drafts.len());

                let colors = &self.colors;
                self.series = drafts
                    .into_iter()
                    .enumerate()
                    .map(|(slot, draft)| ChartSeries {
                        key: draft.key,
                        label: draft.label,
                        color: colors.color(slot).unwrap_or_default(),
                        points: draft.points,
                    })
                    .collect();
                self.chart_status = ChartStatus::Settled;

                if self.series.len() != self.selection.len() {
                    warn!(
                        %ticket,
                        series = self.series.len(),
                        selected = self.selection.len(),
                        "historical series settled partially"
                    );
                } else {
                    debug!(%ticket, series = self.series.len(), "historical series settled");
                }
            }
            Err(failure) => {
                warn!(%ticket, %failure, "historical fetch failed, keeping previous series");
                self.chart_status = ChartStatus::Failed(failure);
            }
        }
    }

    /// Merge a push event, returns the number of points appended.
    pub fn on_push_event(&mut self, event: &PushEvent) -> usize {
        self.merger.merge(event, &self.selection, &mut self.series)
    }

    pub fn on_channel_status(&mut self, status: ChannelStatus) {
        self.merger.on_channel_status(status);
    }

    pub fn chart_series(&self) -> &[ChartSeries] {
        &self.series
    }

    pub fn chart_status(&self) -> &ChartStatus {
        &self.chart_status
    }

    pub fn listing(&self) -> &ListingView {
        &self.listing
    }

    pub fn selection(&self) -> &PairSelectionStore {
        &self.selection
    }

    pub fn time_frame(&self) -> &TimeFrameState {
        &self.time_frame
    }

    pub fn is_selected(&self, key: &SeriesKey) -> bool {
        self.selection.contains(key)
    }

    pub fn controls(&self) -> ControlsView {
        let is_live = self.time_frame.is_live();
        ControlsView {
            unit: self.time_frame.unit(),
            start_date: self.time_frame.start_date(),
            end_date: self.time_frame.end_date(),
            is_live,
            page: self.pagination.page(),
            page_size: self.pagination.page_size(),
            can_prev: self.pagination.can_prev(),
            can_next: self.pagination.can_next(),
            toggles_enabled: !is_live,
            range_enabled: !is_live,
            channel: self.merger.channel_status().clone(),
        }
    }

    fn next_ticket(&mut self) -> RequestTicket {
        self.ticket_sequence += 1;
        RequestTicket(self.ticket_sequence)
    }

    fn fetch_listing(&mut self, commands: &mut Vec<Command>) {
        let ticket = self.next_ticket();
        let query = self.pagination.query();
        debug!(%ticket, first = query.first, offset = query.offset, "fetching listing");

        self.listing_inflight = Some(ticket);
        self.listing = ListingView::Loading;
        commands.push(Command::FetchListing { ticket, query });
    }

    /// Issue a historical request if its parameters changed (or `force`), superseding any
    /// request in flight.
    fn refresh_historical(&mut self, force: bool, commands: &mut Vec<Command>) {
        let request = self.assembler.request(&self.selection, &self.time_frame);
        if !force && request == self.last_historical_request {
            return;
        }
        self.last_historical_request = request.clone();

        match request {
            Some(request) => {
                let ticket = self.next_ticket();
                debug!(
                    %ticket,
                    series = request.pairs_params.len(),
                    unit = %request.time_frame_unit,
                    "fetching historical series"
                );
                self.historical_inflight = Some((ticket, request.clone()));
                self.chart_status = ChartStatus::Fetching;
                commands.push(Command::FetchHistorical { ticket, request });
            }
            None => {
                debug!("selection empty, clearing chart series");
                self.historical_inflight = None;
                self.series.clear();
                self.chart_status = ChartStatus::Settled;
            }
        }
    }

    fn reconcile_subscription(&mut self, commands: &mut Vec<Command>) {
        match self
            .merger
            .reconcile(self.time_frame.is_live(), &self.selection)
        {
            Some(SubscriptionChange::Open(params)) => commands.push(Command::Subscribe(params)),
            Some(SubscriptionChange::Close) => commands.push(Command::Unsubscribe),
            None => {}
        }
    }
}
