#![forbid(unsafe_code)]

//! # Spread Engine
//! Client-side state synchronisation for a live spread dashboard.
//!
//! Three independent, asynchronously-arriving sources are reconciled into one render-ready
//! collection of [`ChartSeries`]:
//! - A paginated listing of spread pairs ([`PaginationController`]).
//! - An on-demand historical series fetch ([`HistoricalSeriesAssembler`]).
//! - A continuous push-update channel ([`LiveUpdateMerger`]).
//!
//! The [`DashboardController`] orchestrates these and never performs I/O itself. Every state
//! transition returns the [`Command`]s a transport collaborator must execute, and results are
//! fed back tagged with the [`RequestTicket`] they were issued under so stale responses can be
//! discarded.

/// Engine configuration (page size, item cap, initial time-frame, colour seed).
pub mod config;

/// Stable per-slot colour assignment.
pub mod color;

/// [`DashboardController`] orchestration, [`Command`]s and render views.
pub mod dashboard;

/// All errors generated in `spread-engine`.
pub mod error;

/// Historical series request building and response assembly.
pub mod historical;

/// Live-mode subscription reconciliation and push-event merging.
pub mod live;

/// Core data model: pairs, samples, listing pages, chart series.
pub mod model;

/// Listing pagination.
pub mod pagination;

/// Fixed two-decimal percentage values.
pub mod percent;

/// User selection of `(pair, side)` entries.
pub mod selection;

/// Time-frame unit, date range and live flag.
pub mod timeframe;

pub use color::ColorAllocator;
pub use config::EngineConfig;
pub use dashboard::{
    ChartStatus, Command, ControlsView, DashboardController, ListingView, RequestTicket,
};
pub use error::{ChannelFailure, EngineError, FetchFailure, FetchKind};
pub use historical::{
    DraftSeries, HistoricalRequest, HistoricalSeries, HistoricalSeriesAssembler, PairParam,
};
pub use live::{ChannelStatus, LiveState, LiveUpdateMerger, SubscriptionChange, SubscriptionParams};
pub use model::{
    ChartPoint, ChartSeries, ListingPage, ListingRow, PageInfo, Pair, PairId, PushEvent, Rgb,
    SeriesKey, Side, SpreadSample,
};
pub use pagination::{ListingQuery, PaginationController, PaginationState};
pub use percent::{Percentage, to_percentage};
pub use selection::{PairSelectionStore, SelectionEntry};
pub use timeframe::{TimeFrameState, TimeFrameUnit};
