use sqlx::{PgPool, Postgres, Transaction};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::domain::{Curtailment, CurtailmentUpdate, NewCurtailment};
use crate::error::{DataError, DataResult};

const CURTAILMENT_COLUMNS: &str = "curtailment_uuid, site_uuid, from_date, to_date, \
    from_time_utc, to_time_utc, curtailment_kw, created_utc";

pub struct CurtailmentRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CurtailmentRepository<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, new: NewCurtailment) -> DataResult<Curtailment> {
        new.validate()?;
        let mut tx = self.pool.begin().await?;

        // FOR SHARE keeps the site from being deleted underneath the insert
        let site = sqlx::query_scalar::<_, Uuid>("SELECT site_uuid FROM sites WHERE site_uuid = $1 FOR SHARE")
            .bind(new.site_uuid)
            .fetch_optional(&mut *tx)
            .await?;
        if site.is_none() {
            return Err(DataError::not_found("site", new.site_uuid));
        }

        let curtailment = new.into_curtailment();
        let stored = sqlx::query_as::<_, Curtailment>(&format!(
            r#"
            INSERT INTO curtailments ({CURTAILMENT_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {CURTAILMENT_COLUMNS}
            "#
        ))
        .bind(curtailment.curtailment_uuid)
        .bind(curtailment.site_uuid)
        .bind(curtailment.from_date)
        .bind(curtailment.to_date)
        .bind(curtailment.from_time_utc)
        .bind(curtailment.to_time_utc)
        .bind(curtailment.curtailment_kw)
        .bind(curtailment.created_utc)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        info!(
            curtailment_uuid = %stored.curtailment_uuid,
            site_uuid = %stored.site_uuid,
            curtailment_kw = stored.curtailment_kw,
            "Created curtailment"
        );
        Ok(stored)
    }

    pub async fn get(&self, curtailment_uuid: Uuid) -> DataResult<Curtailment> {
        sqlx::query_as::<_, Curtailment>(&format!(
            "SELECT {CURTAILMENT_COLUMNS} FROM curtailments WHERE curtailment_uuid = $1"
        ))
        .bind(curtailment_uuid)
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| DataError::not_found("curtailment", curtailment_uuid))
    }

    pub async fn list_for_site(&self, site_uuid: Uuid) -> DataResult<Vec<Curtailment>> {
        self.list_for_sites(&[site_uuid]).await
    }

    pub async fn list_for_sites(&self, site_uuids: &[Uuid]) -> DataResult<Vec<Curtailment>> {
        if site_uuids.is_empty() {
            return Ok(Vec::new());
        }
        let curtailments = sqlx::query_as::<_, Curtailment>(&format!(
            r#"
            SELECT {CURTAILMENT_COLUMNS}
            FROM curtailments
            WHERE site_uuid = ANY($1)
            ORDER BY site_uuid, from_date, from_time_utc
            "#
        ))
        .bind(site_uuids)
        .fetch_all(self.pool)
        .await?;
        Ok(curtailments)
    }

    /// Merge `update` onto the stored row under a row lock
    pub async fn update(&self, curtailment_uuid: Uuid, update: CurtailmentUpdate) -> DataResult<Curtailment> {
        let mut tx = self.pool.begin().await?;
        let current = lock_for_update(&mut tx, curtailment_uuid).await?;
        let merged = update.merged(&current)?;

        let stored = sqlx::query_as::<_, Curtailment>(&format!(
            r#"
            UPDATE curtailments
            SET from_date = $2, to_date = $3, from_time_utc = $4, to_time_utc = $5, curtailment_kw = $6
            WHERE curtailment_uuid = $1
            RETURNING {CURTAILMENT_COLUMNS}
            "#
        ))
        .bind(curtailment_uuid)
        .bind(merged.from_date)
        .bind(merged.to_date)
        .bind(merged.from_time_utc)
        .bind(merged.to_time_utc)
        .bind(merged.curtailment_kw)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        info!(%curtailment_uuid, "Updated curtailment");
        Ok(stored)
    }

    pub async fn delete(&self, curtailment_uuid: Uuid) -> DataResult<()> {
        let deleted = sqlx::query("DELETE FROM curtailments WHERE curtailment_uuid = $1")
            .bind(curtailment_uuid)
            .execute(self.pool)
            .await?
            .rows_affected();
        if deleted == 0 {
            return Err(DataError::not_found("curtailment", curtailment_uuid));
        }
        info!(%curtailment_uuid, "Deleted curtailment");
        Ok(())
    }
}

async fn lock_for_update(
    tx: &mut Transaction<'_, Postgres>,
    curtailment_uuid: Uuid,
) -> DataResult<Curtailment> {
    sqlx::query_as::<_, Curtailment>(&format!(
        "SELECT {CURTAILMENT_COLUMNS} FROM curtailments WHERE curtailment_uuid = $1 FOR UPDATE"
    ))
    .bind(curtailment_uuid)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or_else(|| DataError::not_found("curtailment", curtailment_uuid))
}
