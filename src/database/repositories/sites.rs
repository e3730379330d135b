use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::domain::{NewSite, RegionClassifier, Site};
use crate::error::{DataError, DataResult};

const SITE_COLUMNS: &str = "site_uuid, client_site_id, client_site_name, latitude, longitude, \
    capacity_kw, asset_type, dno, gsp, created_utc";

pub struct SiteRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> SiteRepository<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Validate, tag with `dno`/`gsp` and insert a new site
    pub async fn insert(&self, new_site: &NewSite, classifier: &dyn RegionClassifier) -> DataResult<Site> {
        new_site.validate()?;
        let site = Site::from_new(new_site, classifier);

        let stored = sqlx::query_as::<_, Site>(&format!(
            r#"
            INSERT INTO sites ({SITE_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {SITE_COLUMNS}
            "#
        ))
        .bind(site.site_uuid)
        .bind(site.client_site_id)
        .bind(&site.client_site_name)
        .bind(site.latitude)
        .bind(site.longitude)
        .bind(site.capacity_kw)
        .bind(site.asset_type)
        .bind(&site.dno)
        .bind(&site.gsp)
        .bind(site.created_utc)
        .fetch_one(self.pool)
        .await?;

        info!(site_uuid = %stored.site_uuid, dno = ?stored.dno, gsp = ?stored.gsp, "Inserted site");
        Ok(stored)
    }

    pub async fn find_by_uuid(&self, site_uuid: Uuid) -> DataResult<Site> {
        sqlx::query_as::<_, Site>(&format!("SELECT {SITE_COLUMNS} FROM sites WHERE site_uuid = $1"))
            .bind(site_uuid)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DataError::not_found("site", site_uuid))
    }

    /// Sites that exist among `site_uuids`
    pub async fn find_many(&self, site_uuids: &[Uuid]) -> DataResult<Vec<Site>> {
        if site_uuids.is_empty() {
            return Ok(Vec::new());
        }
        let sites = sqlx::query_as::<_, Site>(&format!(
            "SELECT {SITE_COLUMNS} FROM sites WHERE site_uuid = ANY($1) ORDER BY site_uuid"
        ))
        .bind(site_uuids)
        .fetch_all(self.pool)
        .await?;
        Ok(sites)
    }

    /// Delete a site and everything referencing it in one transaction
    pub async fn delete(&self, site_uuid: Uuid) -> DataResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            DELETE FROM forecast_values
            WHERE forecast_uuid IN (SELECT forecast_uuid FROM forecasts WHERE site_uuid = $1)
            "#,
        )
        .bind(site_uuid)
        .execute(&mut *tx)
        .await?;

        for table in ["forecasts", "curtailments", "generation"] {
            sqlx::query(&format!("DELETE FROM {table} WHERE site_uuid = $1"))
                .bind(site_uuid)
                .execute(&mut *tx)
                .await?;
        }

        let deleted = sqlx::query("DELETE FROM sites WHERE site_uuid = $1")
            .bind(site_uuid)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if deleted == 0 {
            // dropping the transaction rolls back
            return Err(DataError::not_found("site", site_uuid));
        }

        tx.commit().await?;
        info!(%site_uuid, "Deleted site");
        Ok(())
    }
}
