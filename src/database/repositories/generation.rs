use std::collections::HashSet;

use chrono::{DateTime, Utc};
use itertools::Itertools;
use sqlx::PgPool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::GenerationReading;
use crate::error::{DataError, DataResult};

pub struct GenerationRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> GenerationRepository<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert readings in one transaction; every referenced site must exist
    pub async fn insert_many(&self, readings: &[GenerationReading]) -> DataResult<()> {
        if readings.is_empty() {
            return Ok(());
        }

        let wanted: Vec<Uuid> = readings.iter().map(|r| r.site_uuid).unique().collect();

        let mut tx = self.pool.begin().await?;

        let existing: HashSet<Uuid> =
            sqlx::query_scalar::<_, Uuid>("SELECT site_uuid FROM sites WHERE site_uuid = ANY($1)")
                .bind(&wanted)
                .fetch_all(&mut *tx)
                .await?
                .into_iter()
                .collect();
        if let Some(missing) = wanted.iter().find(|uuid| !existing.contains(uuid)) {
            return Err(DataError::not_found("site", missing));
        }

        for reading in readings {
            sqlx::query(
                r#"
                INSERT INTO generation (generation_uuid, site_uuid, start_utc, end_utc, generation_power_kw, created_utc)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(reading.generation_uuid)
            .bind(reading.site_uuid)
            .bind(reading.start_utc)
            .bind(reading.end_utc)
            .bind(reading.generation_power_kw)
            .bind(reading.created_utc)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        info!(readings = readings.len(), sites = wanted.len(), "Inserted generation");
        Ok(())
    }

    /// Readings with `start_utc` in `[start_utc, end_utc)`
    pub async fn find_range(
        &self,
        site_uuids: &[Uuid],
        start_utc: DateTime<Utc>,
        end_utc: DateTime<Utc>,
    ) -> DataResult<Vec<GenerationReading>> {
        if site_uuids.is_empty() {
            return Ok(Vec::new());
        }
        let readings = sqlx::query_as::<_, GenerationReading>(
            r#"
            SELECT generation_uuid, site_uuid, start_utc, end_utc, generation_power_kw, created_utc
            FROM generation
            WHERE site_uuid = ANY($1) AND start_utc >= $2 AND start_utc < $3
            ORDER BY site_uuid, start_utc
            "#,
        )
        .bind(site_uuids)
        .bind(start_utc)
        .bind(end_utc)
        .fetch_all(self.pool)
        .await?;

        debug!(sites = site_uuids.len(), readings = readings.len(), "Fetched generation");
        Ok(readings)
    }
}
