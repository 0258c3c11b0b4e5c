use chrono::{DateTime, Duration, Utc};
use crossterm::event::KeyCode;
use spread_engine::{ListingRow, ListingView, SeriesKey, Side};
use spread_feed::{Action, DashboardSnapshot};

/// Date range shortcuts cycled from the keyboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RangePreset {
    #[default]
    All,
    LastHour,
    LastDay,
    LastWeek,
    LastMonth,
}

impl RangePreset {
    pub fn cycle(&self) -> Self {
        match self {
            RangePreset::All => RangePreset::LastHour,
            RangePreset::LastHour => RangePreset::LastDay,
            RangePreset::LastDay => RangePreset::LastWeek,
            RangePreset::LastWeek => RangePreset::LastMonth,
            RangePreset::LastMonth => RangePreset::All,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RangePreset::All => "all",
            RangePreset::LastHour => "last hour",
            RangePreset::LastDay => "last day",
            RangePreset::LastWeek => "last week",
            RangePreset::LastMonth => "last 30 days",
        }
    }

    /// `(start_date, end_date)` relative to `now`, open ended for [`RangePreset::All`].
    pub fn bounds(&self, now: DateTime<Utc>) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
        let lookback = match self {
            RangePreset::All => return (None, None),
            RangePreset::LastHour => Duration::hours(1),
            RangePreset::LastDay => Duration::days(1),
            RangePreset::LastWeek => Duration::weeks(1),
            RangePreset::LastMonth => Duration::days(30),
        };
        (Some(now - lookback), Some(now))
    }
}

/// Result of a key press.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyOutcome {
    Quit,
    Dispatch(Action),
    Ignored,
}

/// Presentation-only state: listing cursor & range preset.
#[derive(Debug, Clone, Default)]
pub struct App {
    pub cursor: usize,
    pub range: RangePreset,
}

impl App {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep the cursor inside the current page.
    pub fn clamp(&mut self, snapshot: &DashboardSnapshot) {
        let rows = listing_rows(snapshot).len();
        self.cursor = self.cursor.min(rows.saturating_sub(1));
    }

    pub fn handle_key(
        &mut self,
        code: KeyCode,
        snapshot: &DashboardSnapshot,
        now: DateTime<Utc>,
    ) -> KeyOutcome {
        let controls = &snapshot.controls;

        let action = match code {
            KeyCode::Char('q') | KeyCode::Esc => return KeyOutcome::Quit,
            KeyCode::Up | KeyCode::Char('k') => {
                self.cursor = self.cursor.saturating_sub(1);
                return KeyOutcome::Ignored;
            }
            KeyCode::Down | KeyCode::Char('j') => {
                let rows = listing_rows(snapshot).len();
                if self.cursor + 1 < rows {
                    self.cursor += 1;
                }
                return KeyOutcome::Ignored;
            }
            KeyCode::Char('b') => return self.toggle(snapshot, Side::Buy),
            KeyCode::Char('s') => return self.toggle(snapshot, Side::Sell),
            KeyCode::Char('n') | KeyCode::Right => Action::NextPage,
            KeyCode::Char('p') | KeyCode::Left => Action::PrevPage,
            KeyCode::Char('+') => Action::SetPageSize(controls.page_size + 1),
            KeyCode::Char('-') => Action::SetPageSize(controls.page_size.saturating_sub(1)),
            KeyCode::Char('t') => Action::SetTimeFrame(controls.unit.cycle()),
            KeyCode::Char('r') => {
                if !controls.range_enabled {
                    return KeyOutcome::Ignored;
                }
                self.range = self.range.cycle();
                let (start_date, end_date) = self.range.bounds(now);
                Action::SetDateRange {
                    start_date,
                    end_date,
                }
            }
            KeyCode::Char('l') => Action::SetLive(!controls.is_live),
            KeyCode::Char('R') => Action::Refresh,
            _ => return KeyOutcome::Ignored,
        };

        KeyOutcome::Dispatch(action)
    }

    fn toggle(&self, snapshot: &DashboardSnapshot, side: Side) -> KeyOutcome {
        let Some(row) = listing_rows(snapshot).get(self.cursor) else {
            return KeyOutcome::Ignored;
        };
        let key = SeriesKey::new(row.pair.id.clone(), side);

        KeyOutcome::Dispatch(Action::Toggle {
            pair: row.pair.clone(),
            side,
            selected: !snapshot.is_selected(&key),
        })
    }
}

pub fn listing_rows(snapshot: &DashboardSnapshot) -> &[ListingRow] {
    match &snapshot.listing {
        ListingView::Ready(page) => &page.rows,
        ListingView::Loading | ListingView::Failed(_) => &[],
    }
}
