use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One forecasting run for a site
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Forecast {
    pub forecast_uuid: Uuid,
    pub site_uuid: Uuid,
    /// Modelling "now" of the run
    pub timestamp_utc: DateTime<Utc>,
    /// When the run was written
    pub created_utc: DateTime<Utc>,
    pub forecast_version: String,
}

impl Forecast {
    pub fn new(site_uuid: Uuid, timestamp_utc: DateTime<Utc>, forecast_version: &str) -> Self {
        Self {
            forecast_uuid: Uuid::new_v4(),
            site_uuid,
            timestamp_utc,
            created_utc: Utc::now(),
            forecast_version: forecast_version.to_string(),
        }
    }

    /// Override the write time (backfills and tests)
    pub fn created_at(mut self, created_utc: DateTime<Utc>) -> Self {
        self.created_utc = created_utc;
        self
    }
}

/// A predicted power value for `[start_utc, end_utc)` within one forecast
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ForecastValue {
    pub forecast_value_uuid: Uuid,
    pub forecast_uuid: Uuid,
    pub start_utc: DateTime<Utc>,
    pub end_utc: DateTime<Utc>,
    pub forecast_power_kw: f64,
    /// Always `start_utc - forecast.timestamp_utc` in whole minutes
    pub horizon_minutes: i32,
    pub ml_model_uuid: Option<Uuid>,
    pub probabilistic_values: Option<serde_json::Value>,
    pub created_utc: DateTime<Utc>,
}

impl ForecastValue {
    /// Create a value for `forecast`, deriving the horizon from its timestamp
    pub fn new(
        forecast: &Forecast,
        start_utc: DateTime<Utc>,
        end_utc: DateTime<Utc>,
        forecast_power_kw: f64,
    ) -> Self {
        Self {
            forecast_value_uuid: Uuid::new_v4(),
            forecast_uuid: forecast.forecast_uuid,
            start_utc,
            end_utc,
            forecast_power_kw,
            horizon_minutes: horizon_minutes(forecast.timestamp_utc, start_utc),
            ml_model_uuid: None,
            probabilistic_values: None,
            created_utc: forecast.created_utc,
        }
    }

    pub fn with_model(mut self, ml_model_uuid: Uuid) -> Self {
        self.ml_model_uuid = Some(ml_model_uuid);
        self
    }

    pub fn with_probabilistic_values(mut self, values: serde_json::Value) -> Self {
        self.probabilistic_values = Some(values);
        self
    }

    /// Whether the stored horizon agrees with the owning forecast's timestamp
    pub fn horizon_is_consistent(&self, forecast: &Forecast) -> bool {
        self.horizon_minutes == horizon_minutes(forecast.timestamp_utc, self.start_utc)
    }
}

/// Whole minutes between a forecast's as-of time and a target interval start
pub fn horizon_minutes(forecast_timestamp_utc: DateTime<Utc>, start_utc: DateTime<Utc>) -> i32 {
    let minutes = (start_utc - forecast_timestamp_utc).num_minutes();
    minutes.clamp(i32::MIN as i64, i32::MAX as i64) as i32
}

/// Model that produced a forecast value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct MlModel {
    pub ml_model_uuid: Uuid,
    pub name: String,
    pub version: Option<String>,
}

impl MlModel {
    pub fn new(name: &str, version: Option<&str>) -> Self {
        Self {
            ml_model_uuid: Uuid::new_v4(),
            name: name.to_string(),
            version: version.map(str::to_string),
        }
    }
}

/// Forecast value joined with the forecast and model columns the selector ranks on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ForecastCandidate {
    pub site_uuid: Uuid,
    pub forecast_uuid: Uuid,
    pub forecast_timestamp_utc: DateTime<Utc>,
    pub forecast_created_utc: DateTime<Utc>,
    pub forecast_value_uuid: Uuid,
    pub start_utc: DateTime<Utc>,
    pub end_utc: DateTime<Utc>,
    pub forecast_power_kw: f64,
    pub horizon_minutes: i32,
    pub created_utc: DateTime<Utc>,
    pub ml_model_name: Option<String>,
    pub probabilistic_values: Option<serde_json::Value>,
}

impl ForecastCandidate {
    pub fn from_parts(forecast: &Forecast, value: &ForecastValue, model: Option<&MlModel>) -> Self {
        Self {
            site_uuid: forecast.site_uuid,
            forecast_uuid: forecast.forecast_uuid,
            forecast_timestamp_utc: forecast.timestamp_utc,
            forecast_created_utc: forecast.created_utc,
            forecast_value_uuid: value.forecast_value_uuid,
            start_utc: value.start_utc,
            end_utc: value.end_utc,
            forecast_power_kw: value.forecast_power_kw,
            horizon_minutes: value.horizon_minutes,
            created_utc: value.created_utc,
            ml_model_name: model.map(|m| m.name.clone()),
            probabilistic_values: value.probabilistic_values.clone(),
        }
    }
}

/// The single forecast value chosen for a (site, interval) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedForecastValue {
    pub forecast_value_uuid: Uuid,
    pub forecast_uuid: Uuid,
    pub start_utc: DateTime<Utc>,
    pub end_utc: DateTime<Utc>,
    pub forecast_power_kw: f64,
    pub horizon_minutes: i32,
    pub forecast_timestamp_utc: DateTime<Utc>,
    pub created_utc: DateTime<Utc>,
    pub ml_model_name: Option<String>,
    pub probabilistic_values: Option<serde_json::Value>,
    /// Set once a curtailment has reduced `forecast_power_kw`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub curtailment_uuid: Option<Uuid>,
}

impl From<ForecastCandidate> for ResolvedForecastValue {
    fn from(c: ForecastCandidate) -> Self {
        Self {
            forecast_value_uuid: c.forecast_value_uuid,
            forecast_uuid: c.forecast_uuid,
            start_utc: c.start_utc,
            end_utc: c.end_utc,
            forecast_power_kw: c.forecast_power_kw,
            horizon_minutes: c.horizon_minutes,
            forecast_timestamp_utc: c.forecast_timestamp_utc,
            created_utc: c.created_utc,
            ml_model_name: c.ml_model_name,
            probabilistic_values: c.probabilistic_values,
            curtailment_uuid: None,
        }
    }
}

/// Power summed over a group of sites for one interval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastValueSum {
    pub start_utc: DateTime<Utc>,
    pub power_kw: f64,
    /// `None` for totals, or for sites without a dno/gsp tag
    pub name: Option<String>,
}
