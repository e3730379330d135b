use std::time::Instant;

use axum::extract::{Query, State};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use super::{error::ApiError, response::ApiResponse, AppState};
use crate::domain::{DayAheadCutoff, DayAheadGate, ForecastQuery, SumBy};
use crate::forecast::{get_latest_forecast_values, LatestForecastValues};

/// Query string of `GET /api/v1/forecasts/latest`
#[derive(Debug, Deserialize)]
pub struct LatestForecastParams {
    /// Comma-separated site UUIDs
    pub site_uuids: String,
    pub start_utc: DateTime<Utc>,
    pub end_utc: Option<DateTime<Utc>>,
    pub forecast_horizon_minutes: Option<i32>,
    pub day_ahead_hours: Option<u32>,
    pub day_ahead_timezone_delta_hours: Option<f64>,
    pub day_ahead_gate: Option<DayAheadGate>,
    pub model_name: Option<String>,
    pub created_by: Option<DateTime<Utc>>,
    pub created_after: Option<DateTime<Utc>>,
    pub sum_by: Option<String>,
    #[serde(default)]
    pub adjust_for_curtailment: bool,
}

impl LatestForecastParams {
    pub fn site_uuids(&self) -> Result<Vec<Uuid>, ApiError> {
        self.site_uuids
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                Uuid::parse_str(s).map_err(|e| ApiError::BadRequest(format!("invalid site uuid {s:?}: {e}")))
            })
            .collect()
    }

    /// Build the query; `default_gate` applies when the request names none
    pub fn to_query(&self, default_gate: DayAheadGate) -> Result<ForecastQuery, ApiError> {
        let mut query = ForecastQuery::new(self.start_utc);
        if let Some(end_utc) = self.end_utc {
            query = query.ending(end_utc);
        }
        if let Some(minutes) = self.forecast_horizon_minutes {
            query = query.with_horizon_minutes(minutes);
        }
        if let Some(hours) = self.day_ahead_hours {
            query = query.with_day_ahead(
                DayAheadCutoff::new(hours)
                    .with_timezone_delta_hours(self.day_ahead_timezone_delta_hours.unwrap_or(0.0))
                    .with_gate(self.day_ahead_gate.unwrap_or(default_gate)),
            );
        } else if self.day_ahead_timezone_delta_hours.is_some() {
            return Err(ApiError::BadRequest(
                "day_ahead_timezone_delta_hours requires day_ahead_hours".to_string(),
            ));
        }
        if let Some(name) = &self.model_name {
            query = query.with_model_name(name.clone());
        }
        if let Some(created_by) = self.created_by {
            query = query.created_by(created_by);
        }
        if let Some(created_after) = self.created_after {
            query = query.created_after(created_after);
        }
        if let Some(sum_by) = SumBy::parse_optional(self.sum_by.as_deref())? {
            query = query.with_sum_by(sum_by);
        }
        if self.adjust_for_curtailment {
            query = query.with_curtailment();
        }
        query.validate()?;
        Ok(query)
    }
}

/// GET /api/v1/forecasts/latest
pub async fn latest_forecast_values(
    State(state): State<AppState>,
    Query(params): Query<LatestForecastParams>,
) -> Result<ApiResponse<LatestForecastValues>, ApiError> {
    let start = Instant::now();
    let site_uuids = params.site_uuids()?;
    let query = params.to_query(state.forecast.day_ahead_gate)?;

    let values = get_latest_forecast_values(state.store.as_ref(), &site_uuids, &query).await?;
    let count = match &values {
        LatestForecastValues::BySite(by_site) => by_site.values().map(Vec::len).sum(),
        LatestForecastValues::Summed(sums) => sums.len(),
    };

    Ok(ApiResponse::success(values)
        .with_count(count)
        .with_duration(start.elapsed().as_millis() as u64))
}
