//! Recurrence rules and the calendar arithmetic used to advance schedules.

use std::{fmt, str::FromStr};

use chrono::{Datelike, Days, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Largest interval accepted by [`RecurrenceRule::validate`].
pub const MAX_INTERVAL: u32 = 1000;

/// Calendar unit a recurring charge repeats on.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RecurrenceType {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl RecurrenceType {
    pub fn as_str(self) -> &'static str {
        match self {
            RecurrenceType::Daily => "daily",
            RecurrenceType::Weekly => "weekly",
            RecurrenceType::Monthly => "monthly",
            RecurrenceType::Yearly => "yearly",
        }
    }

    fn unit_label(self) -> &'static str {
        match self {
            RecurrenceType::Daily => "day",
            RecurrenceType::Weekly => "week",
            RecurrenceType::Monthly => "month",
            RecurrenceType::Yearly => "year",
        }
    }
}

impl fmt::Display for RecurrenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecurrenceType {
    type Err = RuleError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "daily" | "day" => Ok(RecurrenceType::Daily),
            "weekly" | "week" => Ok(RecurrenceType::Weekly),
            "monthly" | "month" => Ok(RecurrenceType::Monthly),
            "yearly" | "year" | "annual" => Ok(RecurrenceType::Yearly),
            _ => Err(RuleError::UnknownType(value.trim().to_string())),
        }
    }
}

/// Reasons a recurrence rule cannot be used to advance a schedule.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleError {
    #[error("unknown recurrence type `{0}`")]
    UnknownType(String),
    #[error("recurrence interval must be at least 1")]
    ZeroInterval,
    #[error("recurrence interval {0} exceeds the maximum of {MAX_INTERVAL}")]
    IntervalTooLarge(u32),
    #[error("date arithmetic overflowed advancing from {0}")]
    Overflow(NaiveDate),
}

/// Interval plus unit, e.g. "every 3 months".
///
/// Month and year steps clamp to the last valid day of the target month, so
/// Jan 31 + 1 month is Feb 28 (or Feb 29 in leap years). The clamped day is
/// what the next step starts from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecurrenceRule {
    pub recurrence_type: RecurrenceType,
    pub recurrence_interval: u32,
}

impl RecurrenceRule {
    /// Builds a validated rule.
    pub fn new(recurrence_type: RecurrenceType, recurrence_interval: u32) -> Result<Self, RuleError> {
        let rule = Self {
            recurrence_type,
            recurrence_interval,
        };
        rule.validate()?;
        Ok(rule)
    }

    pub fn monthly() -> Self {
        Self {
            recurrence_type: RecurrenceType::Monthly,
            recurrence_interval: 1,
        }
    }

    pub fn validate(&self) -> Result<(), RuleError> {
        match self.recurrence_interval {
            0 => Err(RuleError::ZeroInterval),
            n if n > MAX_INTERVAL => Err(RuleError::IntervalTooLarge(n)),
            _ => Ok(()),
        }
    }

    /// Calculates the date one step after `from`, or `None` if the calendar overflows.
    pub fn next_date(&self, from: NaiveDate) -> Option<NaiveDate> {
        let every = self.recurrence_interval;
        match self.recurrence_type {
            RecurrenceType::Daily => from.checked_add_days(Days::new(u64::from(every))),
            RecurrenceType::Weekly => from.checked_add_days(Days::new(u64::from(every) * 7)),
            RecurrenceType::Monthly => shift_month(from, i64::from(every)),
            RecurrenceType::Yearly => shift_month(from, i64::from(every) * 12),
        }
    }

    /// Validates the rule and returns the next date after `from`.
    pub fn advance(&self, from: NaiveDate) -> Result<NaiveDate, RuleError> {
        self.validate()?;
        self.next_date(from).ok_or(RuleError::Overflow(from))
    }

    pub fn label(&self) -> String {
        match (self.recurrence_interval, self.recurrence_type) {
            (1, RecurrenceType::Daily) => "Daily".into(),
            (1, RecurrenceType::Weekly) => "Weekly".into(),
            (1, RecurrenceType::Monthly) => "Monthly".into(),
            (1, RecurrenceType::Yearly) => "Yearly".into(),
            (n, kind) => format!("Every {} {}s", n, kind.unit_label()),
        }
    }
}

impl fmt::Display for RecurrenceRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

fn shift_month(date: NaiveDate, months: i64) -> Option<NaiveDate> {
    let index = i64::from(date.year()) * 12 + i64::from(date.month0()) + months;
    let year = i32::try_from(index.div_euclid(12)).ok()?;
    let month = u32::try_from(index.rem_euclid(12)).ok()? + 1;
    let day = date.day().min(days_in_month(year, month)?);
    NaiveDate::from_ymd_opt(year, month, day)
}

fn days_in_month(year: i32, month: u32) -> Option<u32> {
    let (next_year, next_month) = if month == 12 {
        (year.checked_add(1)?, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)?
        .pred_opt()
        .map(|last| last.day())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn rule(kind: RecurrenceType, every: u32) -> RecurrenceRule {
        RecurrenceRule {
            recurrence_type: kind,
            recurrence_interval: every,
        }
    }

    #[test]
    fn next_date_steps_each_unit() {
        let start = date(2026, 1, 1);
        assert_eq!(rule(RecurrenceType::Daily, 3).next_date(start), Some(date(2026, 1, 4)));
        assert_eq!(rule(RecurrenceType::Weekly, 2).next_date(start), Some(date(2026, 1, 15)));
        assert_eq!(rule(RecurrenceType::Monthly, 1).next_date(start), Some(date(2026, 2, 1)));
        assert_eq!(rule(RecurrenceType::Monthly, 14).next_date(start), Some(date(2027, 3, 1)));
        assert_eq!(rule(RecurrenceType::Yearly, 1).next_date(start), Some(date(2027, 1, 1)));
    }

    #[test]
    fn month_end_clamps_to_last_valid_day() {
        let monthly = rule(RecurrenceType::Monthly, 1);
        assert_eq!(monthly.next_date(date(2026, 1, 31)), Some(date(2026, 2, 28)));
        assert_eq!(monthly.next_date(date(2028, 1, 31)), Some(date(2028, 2, 29)));
        assert_eq!(monthly.next_date(date(2026, 3, 31)), Some(date(2026, 4, 30)));
        assert_eq!(monthly.next_date(date(2026, 12, 31)), Some(date(2027, 1, 31)));
    }

    #[test]
    fn clamped_day_carries_into_following_steps() {
        let monthly = rule(RecurrenceType::Monthly, 1);
        let feb = monthly.next_date(date(2026, 1, 31)).unwrap();
        assert_eq!(monthly.next_date(feb), Some(date(2026, 3, 28)));
    }

    #[test]
    fn leap_day_yearly_clamps_to_feb_28() {
        let yearly = rule(RecurrenceType::Yearly, 1);
        assert_eq!(yearly.next_date(date(2028, 2, 29)), Some(date(2029, 2, 28)));
        assert_eq!(rule(RecurrenceType::Yearly, 4).next_date(date(2028, 2, 29)), Some(date(2032, 2, 29)));
    }

    #[test]
    fn validate_rejects_zero_and_oversized_intervals() {
        assert_eq!(rule(RecurrenceType::Daily, 0).validate(), Err(RuleError::ZeroInterval));
        assert_eq!(
            rule(RecurrenceType::Daily, MAX_INTERVAL + 1).validate(),
            Err(RuleError::IntervalTooLarge(MAX_INTERVAL + 1))
        );
        assert!(RecurrenceRule::new(RecurrenceType::Weekly, 2).is_ok());
    }

    #[test]
    fn advance_reports_calendar_overflow() {
        let last = NaiveDate::MAX;
        assert_eq!(
            rule(RecurrenceType::Daily, 1).advance(last),
            Err(RuleError::Overflow(last))
        );
    }

    #[test]
    fn recurrence_type_parses_case_insensitively() {
        assert_eq!("Monthly".parse::<RecurrenceType>(), Ok(RecurrenceType::Monthly));
        assert_eq!(" WEEKLY ".parse::<RecurrenceType>(), Ok(RecurrenceType::Weekly));
        assert_eq!(
            "fortnightly".parse::<RecurrenceType>(),
            Err(RuleError::UnknownType("fortnightly".into()))
        );
    }

    #[test]
    fn labels_describe_interval() {
        assert_eq!(RecurrenceRule::monthly().label(), "Monthly");
        assert_eq!(rule(RecurrenceType::Weekly, 2).label(), "Every 2 weeks");
    }
}
