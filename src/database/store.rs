use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::repositories::{
    CurtailmentRepository, ForecastRepository, GenerationRepository, MlModelRepository, SiteRepository,
};
use crate::domain::{
    Curtailment, CurtailmentUpdate, ForecastCandidate, GenerationReading, NewCurtailment, Site,
};
use crate::error::DataResult;
use crate::store::{CandidateRequest, CurtailmentStore, EntityStore};

/// Postgres-backed store; the pool handle is owned here and shared by clone
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn sites(&self) -> SiteRepository<'_> {
        SiteRepository::new(&self.pool)
    }

    pub fn forecasts(&self) -> ForecastRepository<'_> {
        ForecastRepository::new(&self.pool)
    }

    pub fn ml_models(&self) -> MlModelRepository<'_> {
        MlModelRepository::new(&self.pool)
    }

    pub fn curtailments(&self) -> CurtailmentRepository<'_> {
        CurtailmentRepository::new(&self.pool)
    }

    pub fn generation(&self) -> GenerationRepository<'_> {
        GenerationRepository::new(&self.pool)
    }
}

#[async_trait]
impl EntityStore for PgStore {
    async fn sites_by_uuid(&self, site_uuids: &[Uuid]) -> DataResult<Vec<Site>> {
        self.sites().find_many(site_uuids).await
    }

    async fn forecast_candidates(&self, request: &CandidateRequest) -> DataResult<Vec<ForecastCandidate>> {
        self.forecasts().candidates(request).await
    }

    async fn curtailments_for_sites(&self, site_uuids: &[Uuid]) -> DataResult<Vec<Curtailment>> {
        self.curtailments().list_for_sites(site_uuids).await
    }

    async fn generation_for_sites(
        &self,
        site_uuids: &[Uuid],
        start_utc: DateTime<Utc>,
        end_utc: DateTime<Utc>,
    ) -> DataResult<Vec<GenerationReading>> {
        self.generation().find_range(site_uuids, start_utc, end_utc).await
    }

    async fn ping(&self) -> DataResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl CurtailmentStore for PgStore {
    async fn create_curtailment(&self, new: NewCurtailment) -> DataResult<Curtailment> {
        self.curtailments().create(new).await
    }

    async fn get_curtailment(&self, curtailment_uuid: Uuid) -> DataResult<Curtailment> {
        self.curtailments().get(curtailment_uuid).await
    }

    async fn list_curtailments(&self, site_uuid: Uuid) -> DataResult<Vec<Curtailment>> {
        self.curtailments().list_for_site(site_uuid).await
    }

    async fn update_curtailment(
        &self,
        curtailment_uuid: Uuid,
        update: CurtailmentUpdate,
    ) -> DataResult<Curtailment> {
        self.curtailments().update(curtailment_uuid, update).await
    }

    async fn delete_curtailment(&self, curtailment_uuid: Uuid) -> DataResult<()> {
        self.curtailments().delete(curtailment_uuid).await
    }
}
