//! Bootstrap DDL and table identifiers for query building.

use anyhow::{Context, Result};
use sea_query::Iden;
use sqlx::PgPool;
use tracing::info;

#[derive(Iden, Clone, Copy)]
pub(crate) enum Forecasts {
    Table,
    ForecastUuid,
    SiteUuid,
    TimestampUtc,
    CreatedUtc,
}

#[derive(Iden, Clone, Copy)]
pub(crate) enum ForecastValues {
    Table,
    ForecastValueUuid,
    ForecastUuid,
    StartUtc,
    EndUtc,
    ForecastPowerKw,
    HorizonMinutes,
    MlModelUuid,
    ProbabilisticValues,
    CreatedUtc,
}

#[derive(Iden, Clone, Copy)]
pub(crate) enum MlModels {
    Table,
    MlModelUuid,
    Name,
}

const STATEMENTS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS sites (
        site_uuid         UUID PRIMARY KEY,
        client_site_id    INTEGER,
        client_site_name  TEXT,
        latitude          DOUBLE PRECISION NOT NULL,
        longitude         DOUBLE PRECISION NOT NULL,
        capacity_kw       DOUBLE PRECISION NOT NULL CHECK (capacity_kw >= 0),
        asset_type        TEXT        NOT NULL DEFAULT 'pv',
        dno               TEXT,
        gsp               TEXT,
        created_utc       TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS ml_models (
        ml_model_uuid  UUID PRIMARY KEY,
        name           TEXT        NOT NULL,
        version        TEXT,
        created_utc    TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    // NULL versions must collide too, hence the expression index
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS ux_ml_models_name_version
        ON ml_models (name, (COALESCE(version, '')))
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS forecasts (
        forecast_uuid     UUID PRIMARY KEY,
        site_uuid         UUID        NOT NULL REFERENCES sites (site_uuid) ON DELETE CASCADE,
        timestamp_utc     TIMESTAMPTZ NOT NULL,
        created_utc       TIMESTAMPTZ NOT NULL DEFAULT now(),
        forecast_version  TEXT        NOT NULL
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_forecasts_site_timestamp
        ON forecasts (site_uuid, timestamp_utc)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS forecast_values (
        forecast_value_uuid   UUID PRIMARY KEY,
        forecast_uuid         UUID             NOT NULL REFERENCES forecasts (forecast_uuid) ON DELETE CASCADE,
        start_utc             TIMESTAMPTZ      NOT NULL,
        end_utc               TIMESTAMPTZ      NOT NULL,
        forecast_power_kw     DOUBLE PRECISION NOT NULL,
        horizon_minutes       INTEGER          NOT NULL,
        ml_model_uuid         UUID REFERENCES ml_models (ml_model_uuid),
        probabilistic_values  JSONB,
        created_utc           TIMESTAMPTZ      NOT NULL DEFAULT now(),
        CHECK (end_utc > start_utc)
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_forecast_values_forecast_start
        ON forecast_values (forecast_uuid, start_utc)
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_forecast_values_start_horizon
        ON forecast_values (start_utc, horizon_minutes)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS curtailments (
        curtailment_uuid  UUID PRIMARY KEY,
        site_uuid         UUID             NOT NULL REFERENCES sites (site_uuid) ON DELETE CASCADE,
        from_date         DATE             NOT NULL,
        to_date           DATE             NOT NULL,
        from_time_utc     TIME             NOT NULL,
        to_time_utc       TIME             NOT NULL,
        curtailment_kw    DOUBLE PRECISION NOT NULL CHECK (curtailment_kw >= 0),
        created_utc       TIMESTAMPTZ      NOT NULL DEFAULT now(),
        CHECK (from_date <= to_date),
        CHECK (from_time_utc <= to_time_utc)
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_curtailments_site
        ON curtailments (site_uuid)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS generation (
        generation_uuid      UUID PRIMARY KEY,
        site_uuid            UUID             NOT NULL REFERENCES sites (site_uuid) ON DELETE CASCADE,
        start_utc            TIMESTAMPTZ      NOT NULL,
        end_utc              TIMESTAMPTZ      NOT NULL,
        generation_power_kw  DOUBLE PRECISION NOT NULL,
        created_utc          TIMESTAMPTZ      NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_generation_site_start
        ON generation (site_uuid, start_utc)
    "#,
];

/// Create tables and indexes if they are missing.
///
/// Idempotent; runs in one transaction so a partial bootstrap never sticks.
pub async fn create_schema(pool: &PgPool) -> Result<()> {
    let mut tx = pool.begin().await.context("Failed to start transaction")?;

    for statement in STATEMENTS {
        sqlx::query(statement)
            .execute(&mut *tx)
            .await
            .context("Failed to apply schema statement")?;
    }

    tx.commit().await.context("Failed to commit schema")?;
    info!(statements = STATEMENTS.len(), "Database schema ensured");
    Ok(())
}
