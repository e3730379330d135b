//! Parameters of a latest-forecast resolution.
//!
//! [`ForecastQuery::accepts`] is the eligibility predicate for a single
//! candidate row. The store pre-filter built from a query additionally bounds
//! how far back a forecast run may have been made, see
//! [`ForecastQuery::timestamp_lower_bound`].

use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use super::forecast::ForecastCandidate;
use super::site::Site;
use crate::error::{DataError, DataResult};

/// Target window length when no `end_utc` is given
pub const DEFAULT_WINDOW_HOURS: i64 = 24;

/// Minimum look-back on `forecast.timestamp_utc` before the query anchor
pub const BASE_LOOKBACK_HOURS: i64 = 24;

/// Extra look-back added on top of `forecast_horizon_minutes`
pub const HORIZON_LOOKBACK_MARGIN_MINUTES: i64 = 60;

/// Largest accepted timezone shift for day-ahead cutoffs
pub const MAX_TIMEZONE_DELTA_HOURS: f64 = 24.0;

/// Latest accepted day-ahead wall-clock hour, counted from local midnight of the previous day
pub const MAX_DAY_AHEAD_HOURS: u32 = 48;

/// Which forecast timestamp is compared against the day-ahead cutoff
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum DayAheadGate {
    /// `forecast.timestamp_utc`, the modelling "now" of the run
    #[default]
    TimestampUtc,
    /// `forecast.created_utc`, when the run was written
    CreatedUtc,
}

/// "Available the day before by a local wall-clock time" rule
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DayAheadCutoff {
    pub hours: u32,
    #[serde(default)]
    pub timezone_delta_hours: f64,
    #[serde(default)]
    pub gate: DayAheadGate,
}

impl DayAheadCutoff {
    pub fn new(hours: u32) -> Self {
        Self {
            hours,
            timezone_delta_hours: 0.0,
            gate: DayAheadGate::default(),
        }
    }

    pub fn with_timezone_delta_hours(mut self, delta: f64) -> Self {
        self.timezone_delta_hours = delta;
        self
    }

    pub fn with_gate(mut self, gate: DayAheadGate) -> Self {
        self.gate = gate;
        self
    }

    /// Timezone shift as integer minutes; 4.5 hours is 270 minutes
    pub fn timezone_delta_minutes(&self) -> i64 {
        (self.timezone_delta_hours * 60.0).round() as i64
    }

    /// Cutoff for a target interval starting at `target_start_utc`.
    ///
    /// Local midnight of the target's local date, minus one day, plus
    /// `hours`, converted back to UTC. `None` when the result leaves the
    /// representable range.
    pub fn cutoff_for(&self, target_start_utc: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let delta = Duration::minutes(self.timezone_delta_minutes());
        let local_date = target_start_utc.checked_add_signed(delta)?.date_naive();
        local_date
            .and_time(NaiveTime::MIN)
            .and_utc()
            .checked_sub_signed(Duration::days(1))?
            .checked_add_signed(Duration::hours(i64::from(self.hours)))?
            .checked_sub_signed(delta)
    }

    /// Gate timestamp must be strictly before the cutoff
    pub fn is_eligible(&self, candidate: &ForecastCandidate) -> bool {
        let gate_ts = match self.gate {
            DayAheadGate::TimestampUtc => candidate.forecast_timestamp_utc,
            DayAheadGate::CreatedUtc => candidate.forecast_created_utc,
        };
        self.cutoff_for(candidate.start_utc)
            .is_some_and(|cutoff| gate_ts < cutoff)
    }

    fn validate(&self) -> DataResult<()> {
        if self.hours > MAX_DAY_AHEAD_HOURS {
            return Err(DataError::invalid(format!(
                "day_ahead_hours must be at most {MAX_DAY_AHEAD_HOURS}, got {}",
                self.hours
            )));
        }
        if !self.timezone_delta_hours.is_finite()
            || self.timezone_delta_hours.abs() > MAX_TIMEZONE_DELTA_HOURS
        {
            return Err(DataError::invalid(format!(
                "day_ahead_timezone_delta_hours must be within +/-{MAX_TIMEZONE_DELTA_HOURS}, got {}",
                self.timezone_delta_hours
            )));
        }
        Ok(())
    }
}

/// Grouping applied to resolved values
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum SumBy {
    Total,
    Dno,
    Gsp,
}

impl SumBy {
    /// Parse an optional `sum_by` parameter; absent means per-site output
    pub fn parse_optional(value: Option<&str>) -> DataResult<Option<Self>> {
        match value.map(str::trim) {
            None | Some("") => Ok(None),
            Some(raw) => SumBy::from_str(raw)
                .map(Some)
                .map_err(|_| DataError::invalid(format!("unknown sum_by '{raw}', expected total, dno or gsp"))),
        }
    }

    /// Group key of `site` under this grouping
    pub fn group_key(&self, site: Option<&Site>) -> Option<String> {
        match self {
            SumBy::Total => None,
            SumBy::Dno => site.and_then(|s| s.dno.clone()),
            SumBy::Gsp => site.and_then(|s| s.gsp.clone()),
        }
    }
}

/// Filters for resolving the latest forecast value per site and interval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastQuery {
    pub start_utc: DateTime<Utc>,
    pub end_utc: Option<DateTime<Utc>>,
    /// Only values forecast at least this many minutes ahead
    pub forecast_horizon_minutes: Option<i32>,
    pub day_ahead: Option<DayAheadCutoff>,
    pub model_name: Option<String>,
    /// Inclusive upper bound on the value's `created_utc`
    pub created_by: Option<DateTime<Utc>>,
    /// Exclusive lower bound on the value's `created_utc`
    pub created_after: Option<DateTime<Utc>>,
    pub sum_by: Option<SumBy>,
    #[serde(default)]
    pub adjust_for_curtailment: bool,
}

impl ForecastQuery {
    pub fn new(start_utc: DateTime<Utc>) -> Self {
        Self {
            start_utc,
            end_utc: None,
            forecast_horizon_minutes: None,
            day_ahead: None,
            model_name: None,
            created_by: None,
            created_after: None,
            sum_by: None,
            adjust_for_curtailment: false,
        }
    }

    pub fn ending(mut self, end_utc: DateTime<Utc>) -> Self {
        self.end_utc = Some(end_utc);
        self
    }

    pub fn with_horizon_minutes(mut self, minutes: i32) -> Self {
        self.forecast_horizon_minutes = Some(minutes);
        self
    }

    pub fn with_day_ahead(mut self, day_ahead: DayAheadCutoff) -> Self {
        self.day_ahead = Some(day_ahead);
        self
    }

    pub fn with_model_name(mut self, name: impl Into<String>) -> Self {
        self.model_name = Some(name.into());
        self
    }

    pub fn created_by(mut self, created_by: DateTime<Utc>) -> Self {
        self.created_by = Some(created_by);
        self
    }

    pub fn created_after(mut self, created_after: DateTime<Utc>) -> Self {
        self.created_after = Some(created_after);
        self
    }

    pub fn with_sum_by(mut self, sum_by: SumBy) -> Self {
        self.sum_by = Some(sum_by);
        self
    }

    pub fn with_curtailment(mut self) -> Self {
        self.adjust_for_curtailment = true;
        self
    }

    /// Exclusive end of the target window
    pub fn window_end(&self) -> DataResult<DateTime<Utc>> {
        match self.end_utc {
            Some(end_utc) => Ok(end_utc),
            None => self
                .start_utc
                .checked_add_signed(Duration::hours(DEFAULT_WINDOW_HOURS))
                .ok_or_else(|| DataError::invalid(format!("start_utc {} is out of range", self.start_utc))),
        }
    }

    /// Reject malformed parameters before anything touches the store
    pub fn validate(&self) -> DataResult<()> {
        let window_end = self.window_end()?;
        if window_end <= self.start_utc {
            return Err(DataError::invalid(format!(
                "end_utc {window_end} must be after start_utc {}",
                self.start_utc
            )));
        }
        if let Some(minutes) = self.forecast_horizon_minutes {
            if minutes < 0 {
                return Err(DataError::invalid(format!(
                    "forecast_horizon_minutes must be non-negative, got {minutes}"
                )));
            }
        }
        if let Some(name) = &self.model_name {
            if name.trim().is_empty() {
                return Err(DataError::invalid("model_name must not be empty"));
            }
        }
        if let (Some(after), Some(by)) = (self.created_after, self.created_by) {
            if after >= by {
                return Err(DataError::invalid(format!(
                    "created_after {after} must be before created_by {by}"
                )));
            }
        }
        if let Some(day_ahead) = &self.day_ahead {
            day_ahead.validate()?;
        }
        self.timestamp_lower_bound()?;
        Ok(())
    }

    /// Oldest `forecast.timestamp_utc` the store pre-filter admits.
    ///
    /// Anchored on the earliest moment a winning run could have been made:
    /// the window start, `created_by`, or the day-ahead cutoff of the first
    /// target. The look-back is the wider of [`BASE_LOOKBACK_HOURS`] and the
    /// horizon filter plus [`HORIZON_LOOKBACK_MARGIN_MINUTES`].
    pub fn timestamp_lower_bound(&self) -> DataResult<DateTime<Utc>> {
        let out_of_range = || DataError::invalid(format!("look-back from {} is out of range", self.start_utc));

        let mut anchor = self.start_utc;
        if let Some(created_by) = self.created_by {
            anchor = anchor.min(created_by);
        }
        if let Some(day_ahead) = &self.day_ahead {
            anchor = anchor.min(day_ahead.cutoff_for(self.start_utc).ok_or_else(out_of_range)?);
        }

        let base = Duration::hours(BASE_LOOKBACK_HOURS);
        let lookback = match self.forecast_horizon_minutes {
            Some(minutes) => base.max(
                Duration::minutes(i64::from(minutes) + HORIZON_LOOKBACK_MARGIN_MINUTES),
            ),
            None => base,
        };
        anchor.checked_sub_signed(lookback).ok_or_else(out_of_range)
    }

    /// Whether a candidate row satisfies every filter of this query
    pub fn accepts(&self, candidate: &ForecastCandidate) -> bool {
        let Ok(window_end) = self.window_end() else {
            return false;
        };
        if candidate.start_utc < self.start_utc || candidate.start_utc >= window_end {
            return false;
        }
        if let Some(minutes) = self.forecast_horizon_minutes {
            if candidate.horizon_minutes < minutes {
                return false;
            }
        }
        if let Some(day_ahead) = &self.day_ahead {
            if !day_ahead.is_eligible(candidate) {
                return false;
            }
        }
        if let Some(name) = &self.model_name {
            if candidate.ml_model_name.as_deref() != Some(name.as_str()) {
                return false;
            }
        }
        if let Some(created_by) = self.created_by {
            if candidate.created_utc > created_by {
                return false;
            }
        }
        if let Some(created_after) = self.created_after {
            if candidate.created_utc <= created_after {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;
    use uuid::Uuid;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    fn candidate(start: DateTime<Utc>, forecast_ts: DateTime<Utc>) -> ForecastCandidate {
        ForecastCandidate {
            site_uuid: Uuid::nil(),
            forecast_uuid: Uuid::new_v4(),
            forecast_timestamp_utc: forecast_ts,
            forecast_created_utc: forecast_ts,
            forecast_value_uuid: Uuid::new_v4(),
            start_utc: start,
            end_utc: start + Duration::minutes(30),
            forecast_power_kw: 1.0,
            horizon_minutes: crate::domain::forecast::horizon_minutes(forecast_ts, start),
            created_utc: forecast_ts,
            ml_model_name: None,
            probabilistic_values: None,
        }
    }

    #[rstest]
    #[case(0.0, at(2000, 1, 3, 0, 0), at(2000, 1, 2, 9, 0))]
    #[case(0.0, at(2000, 1, 3, 23, 30), at(2000, 1, 2, 9, 0))]
    #[case(4.5, at(2000, 1, 3, 0, 0), at(2000, 1, 2, 4, 30))]
    // 20:00 UTC is already the next local day at +4:30
    #[case(4.5, at(2000, 1, 2, 20, 0), at(2000, 1, 2, 4, 30))]
    #[case(-5.0, at(2000, 1, 3, 2, 0), at(2000, 1, 1, 14, 0))]
    fn test_cutoff_for(
        #[case] delta: f64,
        #[case] target: DateTime<Utc>,
        #[case] expected: DateTime<Utc>,
    ) {
        let cutoff = DayAheadCutoff::new(9).with_timezone_delta_hours(delta);
        assert_eq!(cutoff.cutoff_for(target), Some(expected));
    }

    #[test]
    fn test_timezone_delta_is_minute_exact() {
        assert_eq!(DayAheadCutoff::new(9).with_timezone_delta_hours(4.5).timezone_delta_minutes(), 270);
        assert_eq!(DayAheadCutoff::new(9).with_timezone_delta_hours(5.75).timezone_delta_minutes(), 345);
        assert_eq!(DayAheadCutoff::new(9).with_timezone_delta_hours(-3.5).timezone_delta_minutes(), -210);
    }

    #[rstest]
    #[case(at(2000, 1, 2, 8, 59), true)]
    #[case(at(2000, 1, 2, 9, 0), false)]
    #[case(at(2000, 1, 2, 9, 1), false)]
    fn test_day_ahead_boundary(#[case] created: DateTime<Utc>, #[case] eligible: bool) {
        let cutoff = DayAheadCutoff::new(9);
        let c = candidate(at(2000, 1, 3, 0, 0), created);
        assert_eq!(cutoff.is_eligible(&c), eligible);
    }

    #[rstest]
    #[case(at(2000, 1, 2, 4, 29), true)]
    #[case(at(2000, 1, 2, 4, 30), false)]
    #[case(at(2000, 1, 2, 4, 45), false)]
    fn test_day_ahead_fractional_timezone(#[case] created: DateTime<Utc>, #[case] eligible: bool) {
        let cutoff = DayAheadCutoff::new(9).with_timezone_delta_hours(4.5);
        let c = candidate(at(2000, 1, 3, 0, 0), created);
        assert_eq!(cutoff.is_eligible(&c), eligible);
    }

    #[test]
    fn test_day_ahead_gate_selects_timestamp() {
        let target = at(2000, 1, 3, 0, 0);
        let mut c = candidate(target, at(2000, 1, 2, 8, 0));
        c.forecast_created_utc = at(2000, 1, 2, 10, 0);

        assert!(DayAheadCutoff::new(9).is_eligible(&c));
        assert!(!DayAheadCutoff::new(9)
            .with_gate(DayAheadGate::CreatedUtc)
            .is_eligible(&c));
    }

    #[rstest]
    #[case(None, None)]
    #[case(Some(""), None)]
    #[case(Some("total"), Some(SumBy::Total))]
    #[case(Some("DNO"), Some(SumBy::Dno))]
    #[case(Some("gsp"), Some(SumBy::Gsp))]
    fn test_sum_by_parse(#[case] raw: Option<&str>, #[case] expected: Option<SumBy>) {
        assert_eq!(SumBy::parse_optional(raw).unwrap(), expected);
    }

    #[test]
    fn test_sum_by_unknown_is_invalid_argument() {
        let err = SumBy::parse_optional(Some("region")).unwrap_err();
        assert!(matches!(err, DataError::InvalidArgument(_)));
    }

    #[test]
    fn test_window_defaults_to_one_day() {
        let query = ForecastQuery::new(at(2000, 1, 1, 0, 0));
        assert_eq!(query.window_end().unwrap(), at(2000, 1, 2, 0, 0));
        assert!(query.accepts(&candidate(at(2000, 1, 1, 23, 30), at(2000, 1, 1, 0, 0))));
        assert!(!query.accepts(&candidate(at(2000, 1, 2, 0, 0), at(2000, 1, 1, 0, 0))));
        assert!(!query.accepts(&candidate(at(1999, 12, 31, 23, 30), at(1999, 12, 31, 0, 0))));
    }

    #[test]
    fn test_validate_rejects_inverted_window() {
        let query = ForecastQuery::new(at(2000, 1, 2, 0, 0)).ending(at(2000, 1, 1, 0, 0));
        assert!(matches!(query.validate(), Err(DataError::InvalidArgument(_))));
    }

    #[test]
    fn test_validate_rejects_bad_filters() {
        let start = at(2000, 1, 1, 0, 0);
        assert!(ForecastQuery::new(start).with_horizon_minutes(-1).validate().is_err());
        assert!(ForecastQuery::new(start).with_model_name("  ").validate().is_err());
        assert!(ForecastQuery::new(start)
            .created_after(start)
            .created_by(start)
            .validate()
            .is_err());
        assert!(ForecastQuery::new(start)
            .with_day_ahead(DayAheadCutoff::new(9).with_timezone_delta_hours(f64::NAN))
            .validate()
            .is_err());
    }

    #[test]
    fn test_lower_bound_uses_widest_lookback() {
        let start = at(2000, 1, 3, 0, 0);

        let plain = ForecastQuery::new(start);
        assert_eq!(plain.timestamp_lower_bound().unwrap(), at(2000, 1, 2, 0, 0));

        let far_horizon = ForecastQuery::new(start).with_horizon_minutes(36 * 60);
        assert_eq!(far_horizon.timestamp_lower_bound().unwrap(), at(2000, 1, 1, 11, 0));

        // cutoff for the first target is 2000-01-02T09:00
        let day_ahead = ForecastQuery::new(start)
            .with_day_ahead(DayAheadCutoff::new(9))
            .with_horizon_minutes(60);
        assert_eq!(day_ahead.timestamp_lower_bound().unwrap(), at(2000, 1, 1, 9, 0));

        let backtest = ForecastQuery::new(start).created_by(at(2000, 1, 1, 0, 0));
        assert_eq!(backtest.timestamp_lower_bound().unwrap(), at(1999, 12, 31, 0, 0));
    }

    #[rstest]
    #[case(MAX_DAY_AHEAD_HOURS + 1)]
    #[case(u32::MAX)]
    fn test_validate_rejects_oversized_day_ahead_hours(#[case] hours: u32) {
        let query = ForecastQuery::new(at(2024, 6, 1, 0, 0)).with_day_ahead(DayAheadCutoff::new(hours));
        assert!(matches!(query.validate(), Err(DataError::InvalidArgument(_))));
    }

    #[test]
    fn test_cutoff_out_of_range_is_not_eligible() {
        let cutoff = DayAheadCutoff::new(u32::MAX);
        let c = candidate(at(2024, 6, 1, 0, 0), at(2024, 5, 31, 0, 0));
        assert_eq!(cutoff.cutoff_for(c.start_utc), None);
        assert!(!cutoff.is_eligible(&c));
    }

    #[test]
    fn test_range_edges_are_invalid_argument() {
        let latest = DateTime::<Utc>::MAX_UTC - Duration::hours(1);
        let query = ForecastQuery::new(latest);
        assert!(matches!(query.window_end(), Err(DataError::InvalidArgument(_))));
        assert!(matches!(query.validate(), Err(DataError::InvalidArgument(_))));

        let earliest = DateTime::<Utc>::MIN_UTC + Duration::hours(1);
        let query = ForecastQuery::new(earliest).ending(earliest + Duration::hours(1));
        assert!(matches!(query.timestamp_lower_bound(), Err(DataError::InvalidArgument(_))));
        assert!(matches!(query.validate(), Err(DataError::InvalidArgument(_))));
    }

    #[test]
    fn test_created_bounds() {
        let start = at(2000, 1, 1, 12, 0);
        let made = at(2000, 1, 1, 6, 0);
        let c = candidate(start, made);

        assert!(ForecastQuery::new(start).created_by(made).accepts(&c));
        assert!(!ForecastQuery::new(start).created_after(made).accepts(&c));
        assert!(ForecastQuery::new(start)
            .created_after(made - Duration::minutes(1))
            .accepts(&c));
    }

    #[test]
    fn test_model_name_filter() {
        let start = at(2000, 1, 1, 12, 0);
        let mut c = candidate(start, at(2000, 1, 1, 6, 0));
        let query = ForecastQuery::new(start).with_model_name("pvnet");

        assert!(!query.accepts(&c));
        c.ml_model_name = Some("pvnet".to_string());
        assert!(query.accepts(&c));
    }
}
