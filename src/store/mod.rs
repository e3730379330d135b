//! Entity store seam.
//!
//! The selector only needs a few read operations from the relational store;
//! they live behind [`EntityStore`] so the resolution logic runs unchanged
//! against Postgres ([`crate::database::PgStore`]) or [`MemoryStore`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{
    Curtailment, CurtailmentUpdate, ForecastCandidate, ForecastQuery, GenerationReading,
    NewCurtailment, Site,
};
use crate::error::DataResult;

pub mod memory;

pub use memory::MemoryStore;

/// Pre-filter pushed down to the store when fetching forecast candidates.
///
/// Stores may return a superset; the selector re-checks every row against
/// the full [`ForecastQuery`].
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateRequest {
    pub site_uuids: Vec<Uuid>,
    pub start_utc: DateTime<Utc>,
    pub end_utc: DateTime<Utc>,
    pub timestamp_lower_bound: DateTime<Utc>,
    pub min_horizon_minutes: Option<i32>,
    pub model_name: Option<String>,
    pub created_by: Option<DateTime<Utc>>,
    pub created_after: Option<DateTime<Utc>>,
}

impl CandidateRequest {
    pub fn from_query(site_uuids: &[Uuid], query: &ForecastQuery) -> DataResult<Self> {
        Ok(Self {
            site_uuids: site_uuids.to_vec(),
            start_utc: query.start_utc,
            end_utc: query.window_end()?,
            timestamp_lower_bound: query.timestamp_lower_bound()?,
            min_horizon_minutes: query.forecast_horizon_minutes,
            model_name: query.model_name.clone(),
            created_by: query.created_by,
            created_after: query.created_after,
        })
    }

    /// Row-level equivalent of the SQL pre-filter
    pub fn matches(&self, candidate: &ForecastCandidate) -> bool {
        self.site_uuids.contains(&candidate.site_uuid)
            && candidate.start_utc >= self.start_utc
            && candidate.start_utc < self.end_utc
            && candidate.forecast_timestamp_utc >= self.timestamp_lower_bound
            && self
                .min_horizon_minutes
                .map_or(true, |h| candidate.horizon_minutes >= h)
            && self
                .model_name
                .as_ref()
                .map_or(true, |name| candidate.ml_model_name.as_ref() == Some(name))
            && self.created_by.map_or(true, |by| candidate.created_utc <= by)
            && self
                .created_after
                .map_or(true, |after| candidate.created_utc > after)
    }
}

/// Read access the forecast selector needs
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Sites among `site_uuids` that exist; unknown ids are skipped
    async fn sites_by_uuid(&self, site_uuids: &[Uuid]) -> DataResult<Vec<Site>>;

    /// Joined forecast value rows matching `request`
    async fn forecast_candidates(&self, request: &CandidateRequest) -> DataResult<Vec<ForecastCandidate>>;

    /// All curtailments of the given sites
    async fn curtailments_for_sites(&self, site_uuids: &[Uuid]) -> DataResult<Vec<Curtailment>>;

    /// Generation readings with `start_utc` in `[start_utc, end_utc)`
    async fn generation_for_sites(
        &self,
        site_uuids: &[Uuid],
        start_utc: DateTime<Utc>,
        end_utc: DateTime<Utc>,
    ) -> DataResult<Vec<GenerationReading>>;

    /// Cheap liveness probe
    async fn ping(&self) -> DataResult<()> {
        Ok(())
    }
}

/// Curtailment create/read/update/delete
#[async_trait]
pub trait CurtailmentStore: Send + Sync {
    async fn create_curtailment(&self, new: NewCurtailment) -> DataResult<Curtailment>;
    async fn get_curtailment(&self, curtailment_uuid: Uuid) -> DataResult<Curtailment>;
    async fn list_curtailments(&self, site_uuid: Uuid) -> DataResult<Vec<Curtailment>>;
    async fn update_curtailment(
        &self,
        curtailment_uuid: Uuid,
        update: CurtailmentUpdate,
    ) -> DataResult<Curtailment>;
    async fn delete_curtailment(&self, curtailment_uuid: Uuid) -> DataResult<()>;
}

/// Everything the HTTP layer uses
pub trait SiteDataStore: EntityStore + CurtailmentStore {}

impl<T: EntityStore + CurtailmentStore> SiteDataStore for T {}
