use sea_query::{Alias, Expr, Order, PostgresQueryBuilder, Query, SelectStatement};
use sea_query_binder::SqlxBinder;
use sqlx::PgPool;
use tracing::{debug, info};

use crate::database::schema::{ForecastValues, Forecasts, MlModels};
use crate::domain::{forecast::horizon_minutes, Forecast, ForecastCandidate, ForecastValue};
use crate::error::{DataError, DataResult};
use crate::store::CandidateRequest;

pub struct ForecastRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ForecastRepository<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert a forecast and its values in one transaction.
    ///
    /// `horizon_minutes` is written from the forecast and value timestamps;
    /// values carrying a different horizon are rejected.
    pub async fn insert_forecast(&self, forecast: &Forecast, values: &[ForecastValue]) -> DataResult<()> {
        for value in values {
            if value.forecast_uuid != forecast.forecast_uuid {
                return Err(DataError::invalid(format!(
                    "forecast value {} belongs to forecast {}, not {}",
                    value.forecast_value_uuid, value.forecast_uuid, forecast.forecast_uuid
                )));
            }
            if !value.horizon_is_consistent(forecast) {
                return Err(DataError::invalid(format!(
                    "forecast value {} has horizon {} inconsistent with its timestamps",
                    value.forecast_value_uuid, value.horizon_minutes
                )));
            }
        }

        let mut tx = self.pool.begin().await?;

        let site_exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM sites WHERE site_uuid = $1)",
        )
        .bind(forecast.site_uuid)
        .fetch_one(&mut *tx)
        .await?;
        if !site_exists {
            return Err(DataError::not_found("site", forecast.site_uuid));
        }

        sqlx::query(
            r#"
            INSERT INTO forecasts (forecast_uuid, site_uuid, timestamp_utc, created_utc, forecast_version)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(forecast.forecast_uuid)
        .bind(forecast.site_uuid)
        .bind(forecast.timestamp_utc)
        .bind(forecast.created_utc)
        .bind(&forecast.forecast_version)
        .execute(&mut *tx)
        .await?;

        for value in values {
            sqlx::query(
                r#"
                INSERT INTO forecast_values (
                    forecast_value_uuid, forecast_uuid, start_utc, end_utc, forecast_power_kw,
                    horizon_minutes, ml_model_uuid, probabilistic_values, created_utc
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(value.forecast_value_uuid)
            .bind(value.forecast_uuid)
            .bind(value.start_utc)
            .bind(value.end_utc)
            .bind(value.forecast_power_kw)
            .bind(horizon_minutes(forecast.timestamp_utc, value.start_utc))
            .bind(value.ml_model_uuid)
            .bind(&value.probabilistic_values)
            .bind(value.created_utc)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        info!(
            forecast_uuid = %forecast.forecast_uuid,
            site_uuid = %forecast.site_uuid,
            values = values.len(),
            "Inserted forecast"
        );
        Ok(())
    }

    /// Joined value rows matching the pushed-down filters of `request`
    pub async fn candidates(&self, request: &CandidateRequest) -> DataResult<Vec<ForecastCandidate>> {
        if request.site_uuids.is_empty() {
            return Ok(Vec::new());
        }

        let (sql, values) = candidate_query(request).build_sqlx(PostgresQueryBuilder);
        let rows = sqlx::query_as_with::<_, ForecastCandidate, _>(&sql, values)
            .fetch_all(self.pool)
            .await?;

        debug!(sites = request.site_uuids.len(), rows = rows.len(), "Fetched forecast candidates");
        Ok(rows)
    }
}

fn candidate_query(request: &CandidateRequest) -> SelectStatement {
    let mut query = Query::select();
    query
        .column((Forecasts::Table, Forecasts::SiteUuid))
        .column((ForecastValues::Table, ForecastValues::ForecastUuid))
        .expr_as(
            Expr::col((Forecasts::Table, Forecasts::TimestampUtc)),
            Alias::new("forecast_timestamp_utc"),
        )
        .expr_as(
            Expr::col((Forecasts::Table, Forecasts::CreatedUtc)),
            Alias::new("forecast_created_utc"),
        )
        .columns([
            (ForecastValues::Table, ForecastValues::ForecastValueUuid),
            (ForecastValues::Table, ForecastValues::StartUtc),
            (ForecastValues::Table, ForecastValues::EndUtc),
            (ForecastValues::Table, ForecastValues::ForecastPowerKw),
            (ForecastValues::Table, ForecastValues::HorizonMinutes),
            (ForecastValues::Table, ForecastValues::CreatedUtc),
            (ForecastValues::Table, ForecastValues::ProbabilisticValues),
        ])
        .expr_as(
            Expr::col((MlModels::Table, MlModels::Name)),
            Alias::new("ml_model_name"),
        )
        .from(ForecastValues::Table)
        .inner_join(
            Forecasts::Table,
            Expr::col((ForecastValues::Table, ForecastValues::ForecastUuid))
                .equals((Forecasts::Table, Forecasts::ForecastUuid)),
        )
        .left_join(
            MlModels::Table,
            Expr::col((ForecastValues::Table, ForecastValues::MlModelUuid))
                .equals((MlModels::Table, MlModels::MlModelUuid)),
        )
        .and_where(
            Expr::col((Forecasts::Table, Forecasts::SiteUuid))
                .is_in(request.site_uuids.iter().copied()),
        )
        .and_where(Expr::col((ForecastValues::Table, ForecastValues::StartUtc)).gte(request.start_utc))
        .and_where(Expr::col((ForecastValues::Table, ForecastValues::StartUtc)).lt(request.end_utc))
        .and_where(
            Expr::col((Forecasts::Table, Forecasts::TimestampUtc)).gte(request.timestamp_lower_bound),
        )
        .order_by((Forecasts::Table, Forecasts::SiteUuid), Order::Asc)
        .order_by((ForecastValues::Table, ForecastValues::StartUtc), Order::Asc);

    if let Some(horizon) = request.min_horizon_minutes {
        query.and_where(Expr::col((ForecastValues::Table, ForecastValues::HorizonMinutes)).gte(horizon));
    }
    if let Some(name) = &request.model_name {
        query.and_where(Expr::col((MlModels::Table, MlModels::Name)).eq(name.as_str()));
    }
    if let Some(created_by) = request.created_by {
        query.and_where(Expr::col((ForecastValues::Table, ForecastValues::CreatedUtc)).lte(created_by));
    }
    if let Some(created_after) = request.created_after {
        query.and_where(Expr::col((ForecastValues::Table, ForecastValues::CreatedUtc)).gt(created_after));
    }

    query
}
