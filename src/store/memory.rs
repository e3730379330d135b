use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::debug;
use uuid::Uuid;
use validator::Validate;

use super::{CandidateRequest, CurtailmentStore, EntityStore};
use crate::domain::{
    Curtailment, CurtailmentUpdate, Forecast, ForecastCandidate, ForecastValue, GenerationReading,
    MlModel, NewCurtailment, NewSite, RegionClassifier, Site,
};
use crate::error::{DataError, DataResult};

#[derive(Debug, Default)]
struct State {
    sites: BTreeMap<Uuid, Site>,
    models: HashMap<Uuid, MlModel>,
    forecasts: HashMap<Uuid, Forecast>,
    values: Vec<ForecastValue>,
    curtailments: BTreeMap<Uuid, Curtailment>,
    generation: Vec<GenerationReading>,
}

/// In-process store with the same semantics as the Postgres implementation
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_site(&self, site: Site) -> DataResult<()> {
        let mut state = self.state.write();
        if state.sites.contains_key(&site.site_uuid) {
            return Err(DataError::Conflict(format!("site {} already exists", site.site_uuid)));
        }
        state.sites.insert(site.site_uuid, site);
        Ok(())
    }

    pub fn create_site(&self, new_site: &NewSite, classifier: &dyn RegionClassifier) -> DataResult<Site> {
        new_site.validate()?;
        let site = Site::from_new(new_site, classifier);
        self.insert_site(site.clone())?;
        Ok(site)
    }

    /// Remove a site together with everything that references it
    pub fn delete_site(&self, site_uuid: Uuid) -> DataResult<()> {
        let mut state = self.state.write();
        if state.sites.remove(&site_uuid).is_none() {
            return Err(DataError::not_found("site", site_uuid));
        }
        let forecast_ids: Vec<Uuid> = state
            .forecasts
            .values()
            .filter(|f| f.site_uuid == site_uuid)
            .map(|f| f.forecast_uuid)
            .collect();
        state.values.retain(|v| !forecast_ids.contains(&v.forecast_uuid));
        state.forecasts.retain(|_, f| f.site_uuid != site_uuid);
        state.curtailments.retain(|_, c| c.site_uuid != site_uuid);
        state.generation.retain(|g| g.site_uuid != site_uuid);
        Ok(())
    }

    /// Return the model with this name and version, creating it if needed
    pub fn get_or_create_model(&self, name: &str, version: Option<&str>) -> MlModel {
        let mut state = self.state.write();
        if let Some(existing) = state
            .models
            .values()
            .find(|m| m.name == name && m.version.as_deref() == version)
        {
            return existing.clone();
        }
        let model = MlModel::new(name, version);
        state.models.insert(model.ml_model_uuid, model.clone());
        model
    }

    /// Store a forecast and its values as one unit
    pub fn insert_forecast(&self, forecast: Forecast, values: Vec<ForecastValue>) -> DataResult<()> {
        let mut state = self.state.write();
        if !state.sites.contains_key(&forecast.site_uuid) {
            return Err(DataError::not_found("site", forecast.site_uuid));
        }
        if state.forecasts.contains_key(&forecast.forecast_uuid) {
            return Err(DataError::Conflict(format!(
                "forecast {} already exists",
                forecast.forecast_uuid
            )));
        }
        for value in &values {
            if value.forecast_uuid != forecast.forecast_uuid {
                return Err(DataError::invalid(format!(
                    "forecast value {} belongs to forecast {}, not {}",
                    value.forecast_value_uuid, value.forecast_uuid, forecast.forecast_uuid
                )));
            }
            if !value.horizon_is_consistent(&forecast) {
                return Err(DataError::invalid(format!(
                    "forecast value {} has horizon {} inconsistent with its timestamps",
                    value.forecast_value_uuid, value.horizon_minutes
                )));
            }
            if let Some(model_uuid) = value.ml_model_uuid {
                if !state.models.contains_key(&model_uuid) {
                    return Err(DataError::not_found("ml model", model_uuid));
                }
            }
        }
        debug!(
            forecast_uuid = %forecast.forecast_uuid,
            values = values.len(),
            "storing forecast in memory"
        );
        state.forecasts.insert(forecast.forecast_uuid, forecast);
        state.values.extend(values);
        Ok(())
    }

    pub fn insert_generation(&self, readings: Vec<GenerationReading>) -> DataResult<()> {
        let mut state = self.state.write();
        if let Some(missing) = readings.iter().find(|r| !state.sites.contains_key(&r.site_uuid)) {
            return Err(DataError::not_found("site", missing.site_uuid));
        }
        state.generation.extend(readings);
        Ok(())
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn sites_by_uuid(&self, site_uuids: &[Uuid]) -> DataResult<Vec<Site>> {
        let state = self.state.read();
        Ok(site_uuids
            .iter()
            .filter_map(|uuid| state.sites.get(uuid).cloned())
            .collect())
    }

    async fn forecast_candidates(&self, request: &CandidateRequest) -> DataResult<Vec<ForecastCandidate>> {
        let state = self.state.read();
        let candidates: Vec<ForecastCandidate> = state
            .values
            .iter()
            .filter_map(|value| {
                let forecast = state.forecasts.get(&value.forecast_uuid)?;
                let model = value.ml_model_uuid.and_then(|id| state.models.get(&id));
                Some(ForecastCandidate::from_parts(forecast, value, model))
            })
            .filter(|candidate| request.matches(candidate))
            .collect();
        Ok(candidates)
    }

    async fn curtailments_for_sites(&self, site_uuids: &[Uuid]) -> DataResult<Vec<Curtailment>> {
        let state = self.state.read();
        Ok(state
            .curtailments
            .values()
            .filter(|c| site_uuids.contains(&c.site_uuid))
            .cloned()
            .collect())
    }

    async fn generation_for_sites(
        &self,
        site_uuids: &[Uuid],
        start_utc: DateTime<Utc>,
        end_utc: DateTime<Utc>,
    ) -> DataResult<Vec<GenerationReading>> {
        let state = self.state.read();
        Ok(state
            .generation
            .iter()
            .filter(|g| {
                site_uuids.contains(&g.site_uuid) && g.start_utc >= start_utc && g.start_utc < end_utc
            })
            .cloned()
            .collect())
    }
}

#[async_trait]
impl CurtailmentStore for MemoryStore {
    async fn create_curtailment(&self, new: NewCurtailment) -> DataResult<Curtailment> {
        new.validate()?;
        let mut state = self.state.write();
        if !state.sites.contains_key(&new.site_uuid) {
            return Err(DataError::not_found("site", new.site_uuid));
        }
        let curtailment = new.into_curtailment();
        state
            .curtailments
            .insert(curtailment.curtailment_uuid, curtailment.clone());
        Ok(curtailment)
    }

    async fn get_curtailment(&self, curtailment_uuid: Uuid) -> DataResult<Curtailment> {
        self.state
            .read()
            .curtailments
            .get(&curtailment_uuid)
            .cloned()
            .ok_or_else(|| DataError::not_found("curtailment", curtailment_uuid))
    }

    async fn list_curtailments(&self, site_uuid: Uuid) -> DataResult<Vec<Curtailment>> {
        let mut found: Vec<Curtailment> = self
            .state
            .read()
            .curtailments
            .values()
            .filter(|c| c.site_uuid == site_uuid)
            .cloned()
            .collect();
        found.sort_by_key(|c| (c.from_date, c.from_time_utc));
        Ok(found)
    }

    async fn update_curtailment(
        &self,
        curtailment_uuid: Uuid,
        update: CurtailmentUpdate,
    ) -> DataResult<Curtailment> {
        let mut state = self.state.write();
        let current = state
            .curtailments
            .get_mut(&curtailment_uuid)
            .ok_or_else(|| DataError::not_found("curtailment", curtailment_uuid))?;
        let merged = update.merged(current)?;
        *current = merged.clone();
        Ok(merged)
    }

    async fn delete_curtailment(&self, curtailment_uuid: Uuid) -> DataResult<()> {
        self.state
            .write()
            .curtailments
            .remove(&curtailment_uuid)
            .map(|_| ())
            .ok_or_else(|| DataError::not_found("curtailment", curtailment_uuid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AssetType, UnclassifiedRegions};
    use chrono::{Duration, NaiveDate, NaiveTime, TimeZone};

    fn site(store: &MemoryStore) -> Site {
        store
            .create_site(
                &NewSite {
                    client_site_id: Some(1),
                    client_site_name: Some("test".to_string()),
                    latitude: 51.5,
                    longitude: -0.1,
                    capacity_kw: 4.0,
                    asset_type: AssetType::Pv,
                },
                &UnclassifiedRegions,
            )
            .unwrap()
    }

    #[test]
    fn test_insert_forecast_requires_site() {
        let store = MemoryStore::new();
        let ts = Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap();
        let forecast = Forecast::new(Uuid::new_v4(), ts, "0.1.0");
        let err = store.insert_forecast(forecast, vec![]).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_insert_forecast_rejects_inconsistent_horizon() {
        let store = MemoryStore::new();
        let site = site(&store);
        let ts = Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap();
        let forecast = Forecast::new(site.site_uuid, ts, "0.1.0");
        let mut value = ForecastValue::new(&forecast, ts + Duration::hours(1), ts + Duration::minutes(75), 1.0);
        value.horizon_minutes = 5;

        let err = store.insert_forecast(forecast, vec![value]).unwrap_err();
        assert!(matches!(err, DataError::InvalidArgument(_)));
    }

    #[test]
    fn test_get_or_create_model_is_stable() {
        let store = MemoryStore::new();
        let a = store.get_or_create_model("pvnet", Some("1"));
        let b = store.get_or_create_model("pvnet", Some("1"));
        let c = store.get_or_create_model("pvnet", Some("2"));
        assert_eq!(a.ml_model_uuid, b.ml_model_uuid);
        assert_ne!(a.ml_model_uuid, c.ml_model_uuid);
    }

    #[tokio::test]
    async fn test_curtailment_crud() {
        let store = MemoryStore::new();
        let site = site(&store);
        let new = NewCurtailment {
            site_uuid: site.site_uuid,
            from_date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            to_date: NaiveDate::from_ymd_opt(2024, 6, 30).unwrap(),
            from_time_utc: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            to_time_utc: NaiveTime::from_hms_opt(14, 0, 0).unwrap(),
            curtailment_kw: 2.0,
        };

        let created = store.create_curtailment(new).await.unwrap();
        assert_eq!(store.get_curtailment(created.curtailment_uuid).await.unwrap(), created);
        assert_eq!(store.list_curtailments(site.site_uuid).await.unwrap().len(), 1);

        let updated = store
            .update_curtailment(
                created.curtailment_uuid,
                CurtailmentUpdate {
                    curtailment_kw: Some(5.0),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.curtailment_kw, 5.0);

        store.delete_curtailment(created.curtailment_uuid).await.unwrap();
        let err = store.get_curtailment(created.curtailment_uuid).await.unwrap_err();
        assert!(err.is_not_found());
        assert!(store
            .delete_curtailment(created.curtailment_uuid)
            .await
            .unwrap_err()
            .is_not_found());
    }

    #[tokio::test]
    async fn test_delete_site_cascades() {
        let store = MemoryStore::new();
        let site = site(&store);
        let ts = Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap();
        let forecast = Forecast::new(site.site_uuid, ts, "0.1.0");
        let value = ForecastValue::new(&forecast, ts, ts + Duration::minutes(30), 1.0);
        store.insert_forecast(forecast, vec![value]).unwrap();
        store
            .insert_generation(vec![GenerationReading::new(site.site_uuid, ts, ts + Duration::minutes(30), 1.0)])
            .unwrap();

        store.delete_site(site.site_uuid).unwrap();

        let generation = store
            .generation_for_sites(&[site.site_uuid], ts, ts + Duration::hours(1))
            .await
            .unwrap();
        assert!(generation.is_empty());
        assert!(store.sites_by_uuid(&[site.site_uuid]).await.unwrap().is_empty());
        assert!(store.delete_site(site.site_uuid).unwrap_err().is_not_found());
    }
}
