use crate::error::EngineError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Display-bucket granularity for historical charting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeFrameUnit {
    #[default]
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Year,
}

impl TimeFrameUnit {
    pub const ALL: [TimeFrameUnit; 6] = [
        TimeFrameUnit::Minute,
        TimeFrameUnit::Hour,
        TimeFrameUnit::Day,
        TimeFrameUnit::Week,
        TimeFrameUnit::Month,
        TimeFrameUnit::Year,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeFrameUnit::Minute => "minute",
            TimeFrameUnit::Hour => "hour",
            TimeFrameUnit::Day => "day",
            TimeFrameUnit::Week => "week",
            TimeFrameUnit::Month => "month",
            TimeFrameUnit::Year => "year",
        }
    }

    /// `chrono` format string for time axis labels at this granularity.
    pub fn axis_format(&self) -> &'static str {
        match self {
            TimeFrameUnit::Minute => "%-H:%M",
            TimeFrameUnit::Hour => "%a %-H:%M",
            TimeFrameUnit::Day => "%b %-d %-H:%M",
            TimeFrameUnit::Week | TimeFrameUnit::Month | TimeFrameUnit::Year => "%b %Y",
        }
    }

    /// Next coarser unit, wrapping back to [`TimeFrameUnit::Minute`].
    pub fn cycle(&self) -> Self {
        match self {
            TimeFrameUnit::Minute => TimeFrameUnit::Hour,
            TimeFrameUnit::Hour => TimeFrameUnit::Day,
            TimeFrameUnit::Day => TimeFrameUnit::Week,
            TimeFrameUnit::Week => TimeFrameUnit::Month,
            TimeFrameUnit::Month => TimeFrameUnit::Year,
            TimeFrameUnit::Year => TimeFrameUnit::Minute,
        }
    }
}

impl std::fmt::Display for TimeFrameUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TimeFrameUnit {
    type Err = EngineError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        TimeFrameUnit::ALL
            .into_iter()
            .find(|unit| unit.as_str().eq_ignore_ascii_case(input.trim()))
            .ok_or_else(|| EngineError::UnknownTimeFrame(input.to_string()))
    }
}

/// Time-frame unit, optional date bounds and the live flag.
///
/// While live the unit is forced to [`TimeFrameUnit::Minute`] and the unit & bounds cannot be
/// changed. The stored bounds are retained so they apply again once live mode is left.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct TimeFrameState {
    unit: TimeFrameUnit,
    start_date: Option<DateTime<Utc>>,
    end_date: Option<DateTime<Utc>>,
    is_live: bool,
}

impl TimeFrameState {
    pub fn new(unit: TimeFrameUnit) -> Self {
        Self {
            unit,
            ..Self::default()
        }
    }

    pub fn unit(&self) -> TimeFrameUnit {
        self.unit
    }

    pub fn start_date(&self) -> Option<DateTime<Utc>> {
        self.start_date
    }

    pub fn end_date(&self) -> Option<DateTime<Utc>> {
        self.end_date
    }

    pub fn is_live(&self) -> bool {
        self.is_live
    }

    /// Returns whether the unit changed.
    pub fn set_unit(&mut self, unit: TimeFrameUnit) -> Result<bool, EngineError> {
        if self.is_live {
            return Err(EngineError::LiveModeLocked);
        }
        let changed = self.unit != unit;
        self.unit = unit;
        Ok(changed)
    }

    /// Returns whether either bound changed.
    pub fn set_range(
        &mut self,
        start_date: Option<DateTime<Utc>>,
        end_date: Option<DateTime<Utc>>,
    ) -> Result<bool, EngineError> {
        if self.is_live {
            return Err(EngineError::LiveModeLocked);
        }
        if let (Some(start), Some(end)) = (start_date, end_date) {
            if start > end {
                return Err(EngineError::InvalidDateRange { start, end });
            }
        }

        let changed = self.start_date != start_date || self.end_date != end_date;
        self.start_date = start_date;
        self.end_date = end_date;
        Ok(changed)
    }

    /// Enter or leave live mode, forcing minute granularity on entry.
    ///
    /// Returns whether the live flag changed.
    pub fn set_live(&mut self, is_live: bool) -> bool {
        if self.is_live == is_live {
            return false;
        }
        self.is_live = is_live;
        if is_live {
            self.unit = TimeFrameUnit::Minute;
        }
        true
    }

    /// Bounds to query with, `(None, None)` while live.
    pub fn effective_bounds(&self) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
        if self.is_live {
            (None, None)
        } else {
            (self.start_date, self.end_date)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_unit_from_str() {
        struct TestCase {
            input: &'static str,
            expected: Result<TimeFrameUnit, EngineError>,
        }

        let tests = vec![
            TestCase {
                // TC0: lowercase
                input: "hour",
                expected: Ok(TimeFrameUnit::Hour),
            },
            TestCase {
                // TC1: mixed case & whitespace
                input: " Week ",
                expected: Ok(TimeFrameUnit::Week),
            },
            TestCase {
                // TC2: unknown
                input: "fortnight",
                expected: Err(EngineError::UnknownTimeFrame("fortnight".to_string())),
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = test.input.parse::<TimeFrameUnit>();
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_cycle_visits_every_unit() {
        let mut unit = TimeFrameUnit::Minute;
        let mut seen = Vec::new();
        for _ in 0..TimeFrameUnit::ALL.len() {
            seen.push(unit);
            unit = unit.cycle();
        }
        assert_eq!(seen, TimeFrameUnit::ALL.to_vec());
        assert_eq!(unit, TimeFrameUnit::Minute);
    }

    #[test]
    fn test_live_forces_minute_and_locks_controls() {
        let start = Utc.with_ymd_and_hms(2021, 3, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2021, 3, 2, 0, 0, 0).unwrap();

        let mut state = TimeFrameState::new(TimeFrameUnit::Day);
        assert_eq!(state.set_range(Some(start), Some(end)), Ok(true));

        assert!(state.set_live(true));
        assert!(!state.set_live(true));
        assert_eq!(state.unit(), TimeFrameUnit::Minute);
        assert_eq!(state.effective_bounds(), (None, None));
        assert_eq!(state.set_unit(TimeFrameUnit::Hour), Err(EngineError::LiveModeLocked));
        assert_eq!(state.set_range(None, None), Err(EngineError::LiveModeLocked));

        assert!(state.set_live(false));
        assert_eq!(state.effective_bounds(), (Some(start), Some(end)));
        assert_eq!(state.unit(), TimeFrameUnit::Minute);
    }

    #[test]
    fn test_inverted_range_rejected() {
        let start = Utc.with_ymd_and_hms(2021, 3, 2, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2021, 3, 1, 0, 0, 0).unwrap();

        let mut state = TimeFrameState::default();
        assert_eq!(
            state.set_range(Some(start), Some(end)),
            Err(EngineError::InvalidDateRange { start, end })
        );
        assert_eq!(state.effective_bounds(), (None, None));
    }
}
