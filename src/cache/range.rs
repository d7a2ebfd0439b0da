//! Inclusive calendar-date ranges used by every time-windowed fetch.

use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};
use thiserror::Error;

/// Date format accepted from the command line and the UI (`YYYY-MM-DD`).
pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RangeError {
  #[error("invalid date '{0}', expected YYYY-MM-DD")]
  InvalidDate(String),
  #[error("range start {start} is after range end {end}")]
  Inverted { start: NaiveDate, end: NaiveDate },
}

/// An inclusive range of calendar days.
///
/// The range covers `start` at 00:00:00 through `end` at 23:59:59 (UTC),
/// which is also how the bounds are sent to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DateRange {
  start: NaiveDate,
  end: NaiveDate,
}

impl DateRange {
  pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, RangeError> {
    if start > end {
      return Err(RangeError::Inverted { start, end });
    }
    Ok(Self { start, end })
  }

  /// Parse a range from two `YYYY-MM-DD` strings.
  pub fn parse(start: &str, end: &str) -> Result<Self, RangeError> {
    Self::new(parse_date(start)?, parse_date(end)?)
  }

  /// The `days` calendar days ending on `today`, inclusive.
  pub fn last_days(today: NaiveDate, days: u64) -> Self {
    let start = today
      .checked_sub_days(Days::new(days.saturating_sub(1)))
      .unwrap_or(NaiveDate::MIN);
    Self { start, end: today }
  }

  pub fn start(&self) -> NaiveDate {
    self.start
  }

  pub fn end(&self) -> NaiveDate {
    self.end
  }

  /// First instant covered by the range.
  pub fn start_instant(&self) -> DateTime<Utc> {
    self.start.and_time(NaiveTime::MIN).and_utc()
  }

  /// Last instant covered by the range (end day at 23:59:59).
  pub fn end_instant(&self) -> DateTime<Utc> {
    let end_of_day = NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN);
    self.end.and_time(end_of_day).and_utc()
  }

  pub fn contains(&self, ts: DateTime<Utc>) -> bool {
    ts >= self.start_instant() && ts <= self.end_instant()
  }

  /// Every calendar day in the range, in order.
  pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
    let end = self.end;
    self.start.iter_days().take_while(move |d| *d <= end)
  }

  /// Shift both ends of the range by a signed number of days.
  pub fn shifted(&self, days: i64) -> Self {
    let shift = |d: NaiveDate| {
      if days >= 0 {
        d.checked_add_days(Days::new(days as u64)).unwrap_or(d)
      } else {
        d.checked_sub_days(Days::new(days.unsigned_abs())).unwrap_or(d)
      }
    };
    Self {
      start: shift(self.start),
      end: shift(self.end),
    }
  }
}

impl std::fmt::Display for DateRange {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(
      f,
      "{}..{}",
      self.start.format(DATE_FORMAT),
      self.end.format(DATE_FORMAT)
    )
  }
}

pub fn parse_date(s: &str) -> Result<NaiveDate, RangeError> {
  NaiveDate::parse_from_str(s.trim(), DATE_FORMAT)
    .map_err(|_| RangeError::InvalidDate(s.trim().to_string()))
}
