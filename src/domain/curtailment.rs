use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// Operator instruction to cap a site's output over a daily window within a date range
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Curtailment {
    pub curtailment_uuid: Uuid,
    pub site_uuid: Uuid,
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    pub from_time_utc: NaiveTime,
    pub to_time_utc: NaiveTime,
    pub curtailment_kw: f64,
    pub created_utc: DateTime<Utc>,
}

impl Curtailment {
    /// Whether this curtailment covers the instant `at`.
    ///
    /// Date and time-of-day are taken from `at` in UTC, both ranges inclusive.
    pub fn is_active_at(&self, at: DateTime<Utc>) -> bool {
        let date = at.date_naive();
        let time = at.time();
        self.from_date <= date
            && date <= self.to_date
            && self.from_time_utc <= time
            && time <= self.to_time_utc
    }

    /// Power left after this curtailment, never negative
    pub fn curtailed_power_kw(&self, power_kw: f64) -> f64 {
        curtailed_power_kw(power_kw, self.curtailment_kw)
    }
}

/// `max(0, power_kw - curtailment_kw)`
pub fn curtailed_power_kw(power_kw: f64, curtailment_kw: f64) -> f64 {
    (power_kw - curtailment_kw).max(0.0)
}

/// Payload for creating a curtailment
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_new_window"))]
pub struct NewCurtailment {
    pub site_uuid: Uuid,
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    pub from_time_utc: NaiveTime,
    pub to_time_utc: NaiveTime,
    #[validate(range(min = 0.0))]
    pub curtailment_kw: f64,
}

impl NewCurtailment {
    pub fn into_curtailment(self) -> Curtailment {
        Curtailment {
            curtailment_uuid: Uuid::new_v4(),
            site_uuid: self.site_uuid,
            from_date: self.from_date,
            to_date: self.to_date,
            from_time_utc: self.from_time_utc,
            to_time_utc: self.to_time_utc,
            curtailment_kw: self.curtailment_kw,
            created_utc: Utc::now(),
        }
    }
}

/// Partial update; unset fields keep their stored value
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct CurtailmentUpdate {
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
    pub from_time_utc: Option<NaiveTime>,
    pub to_time_utc: Option<NaiveTime>,
    #[validate(range(min = 0.0))]
    pub curtailment_kw: Option<f64>,
}

impl CurtailmentUpdate {
    /// Apply onto `current`, returning the merged record after range checks
    pub fn merged(&self, current: &Curtailment) -> Result<Curtailment, validator::ValidationErrors> {
        self.validate()?;
        let merged = Curtailment {
            from_date: self.from_date.unwrap_or(current.from_date),
            to_date: self.to_date.unwrap_or(current.to_date),
            from_time_utc: self.from_time_utc.unwrap_or(current.from_time_utc),
            to_time_utc: self.to_time_utc.unwrap_or(current.to_time_utc),
            curtailment_kw: self.curtailment_kw.unwrap_or(current.curtailment_kw),
            ..current.clone()
        };
        check_window(
            merged.from_date,
            merged.to_date,
            merged.from_time_utc,
            merged.to_time_utc,
        )
        .map_err(|e| {
            let mut errors = validator::ValidationErrors::new();
            errors.add("__all__", e);
            errors
        })?;
        Ok(merged)
    }
}

fn validate_new_window(c: &NewCurtailment) -> Result<(), ValidationError> {
    check_window(c.from_date, c.to_date, c.from_time_utc, c.to_time_utc)
}

fn check_window(
    from_date: NaiveDate,
    to_date: NaiveDate,
    from_time: NaiveTime,
    to_time: NaiveTime,
) -> Result<(), ValidationError> {
    if from_date > to_date {
        let mut err = ValidationError::new("date_range");
        err.message = Some("from_date must not be after to_date".into());
        return Err(err);
    }
    if from_time > to_time {
        let mut err = ValidationError::new("time_range");
        err.message = Some("from_time_utc must not be after to_time_utc".into());
        return Err(err);
    }
    Ok(())
}
