use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::Serialize;
use tracing::{debug, instrument};
use uuid::Uuid;

use super::aggregation::sum_resolved;
use super::curtailment::CurtailmentAdjuster;
use super::resolution::select_latest;
use crate::domain::{
    ForecastQuery, ForecastValueSum, GenerationReading, ResolvedForecastValue, Site, SumBy,
};
use crate::error::{DataError, DataResult};
use crate::store::{CandidateRequest, EntityStore};

/// Resolved values per requested site, each list ordered by `start_utc`
pub type LatestValuesBySite = BTreeMap<Uuid, Vec<ResolvedForecastValue>>;

/// Output of [`get_latest_forecast_values`]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum LatestForecastValues {
    BySite(LatestValuesBySite),
    Summed(Vec<ForecastValueSum>),
}

/// Fetch a single site; unknown ids are `NotFound`
pub async fn get_site_by_uuid<S>(store: &S, site_uuid: Uuid) -> DataResult<Site>
where
    S: EntityStore + ?Sized,
{
    store
        .sites_by_uuid(&[site_uuid])
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| DataError::not_found("site", site_uuid))
}

/// Latest forecast value per (site, target interval).
///
/// Every requested site appears in the result; sites with no eligible
/// forecasts, including ids unknown to the store, map to an empty list.
#[instrument(skip(store, site_uuids), fields(sites = site_uuids.len()))]
pub async fn resolve_latest_values<S>(
    store: &S,
    site_uuids: &[Uuid],
    query: &ForecastQuery,
) -> DataResult<LatestValuesBySite>
where
    S: EntityStore + ?Sized,
{
    query.validate()?;

    let site_uuids: Vec<Uuid> = site_uuids.iter().copied().sorted_unstable().dedup().collect();

    let mut out: LatestValuesBySite = site_uuids.iter().map(|uuid| (*uuid, Vec::new())).collect();
    if site_uuids.is_empty() {
        return Ok(out);
    }

    let request = CandidateRequest::from_query(&site_uuids, query)?;
    let candidates = store.forecast_candidates(&request).await?;
    let fetched = candidates.len();
    let winners = select_latest(candidates, query);

    let adjusters = if query.adjust_for_curtailment {
        let curtailments = store.curtailments_for_sites(&site_uuids).await?;
        Some(CurtailmentAdjuster::for_sites(&site_uuids, curtailments))
    } else {
        None
    };

    let mut resolved = 0usize;
    for (site_uuid, candidates) in winners {
        let Some(slot) = out.get_mut(&site_uuid) else {
            continue;
        };
        let adjuster = adjusters.as_ref().and_then(|a| a.get(&site_uuid));
        for candidate in candidates {
            let value = ResolvedForecastValue::from(candidate);
            let value = match adjuster {
                Some(adjuster) => adjuster.adjust(value)?,
                None => value,
            };
            slot.push(value);
            resolved += 1;
        }
    }

    debug!(fetched, resolved, "resolved latest forecast values");
    Ok(out)
}

/// Resolve, then sum per interval and group
pub async fn resolve_latest_values_summed<S>(
    store: &S,
    site_uuids: &[Uuid],
    query: &ForecastQuery,
    sum_by: SumBy,
) -> DataResult<Vec<ForecastValueSum>>
where
    S: EntityStore + ?Sized,
{
    let resolved = resolve_latest_values(store, site_uuids, query).await?;
    if resolved.is_empty() {
        return Ok(Vec::new());
    }

    let site_list: Vec<Uuid> = resolved.keys().copied().collect();
    let sites: HashMap<Uuid, Site> = store
        .sites_by_uuid(&site_list)
        .await?
        .into_iter()
        .map(|site| (site.site_uuid, site))
        .collect();

    Ok(sum_resolved(&resolved, &sites, sum_by))
}

/// Per-site values, or summed values when `query.sum_by` is set
pub async fn get_latest_forecast_values<S>(
    store: &S,
    site_uuids: &[Uuid],
    query: &ForecastQuery,
) -> DataResult<LatestForecastValues>
where
    S: EntityStore + ?Sized,
{
    match query.sum_by {
        Some(sum_by) => resolve_latest_values_summed(store, site_uuids, query, sum_by)
            .await
            .map(LatestForecastValues::Summed),
        None => resolve_latest_values(store, site_uuids, query)
            .await
            .map(LatestForecastValues::BySite),
    }
}

/// Apply `site_uuid`'s curtailments to one unadjusted value
pub async fn apply_curtailment<S>(
    store: &S,
    value: ResolvedForecastValue,
    site_uuid: Uuid,
) -> DataResult<ResolvedForecastValue>
where
    S: EntityStore + ?Sized,
{
    let curtailments = store.curtailments_for_sites(&[site_uuid]).await?;
    CurtailmentAdjuster::new(site_uuid, curtailments).adjust(value)
}

/// Generation readings per requested site with `start_utc` in `[start_utc, end_utc)`.
///
/// Same key policy as [`resolve_latest_values`]: every requested site is
/// present, unknown ones with an empty list.
pub async fn get_generation_by_sites<S>(
    store: &S,
    site_uuids: &[Uuid],
    start_utc: DateTime<Utc>,
    end_utc: DateTime<Utc>,
) -> DataResult<BTreeMap<Uuid, Vec<GenerationReading>>>
where
    S: EntityStore + ?Sized,
{
    if end_utc <= start_utc {
        return Err(DataError::invalid(format!(
            "end_utc {end_utc} must be after start_utc {start_utc}"
        )));
    }

    let mut out: BTreeMap<Uuid, Vec<GenerationReading>> =
        site_uuids.iter().map(|uuid| (*uuid, Vec::new())).collect();
    if out.is_empty() {
        return Ok(out);
    }

    let site_list: Vec<Uuid> = out.keys().copied().collect();
    let readings = store.generation_for_sites(&site_list, start_utc, end_utc).await?;
    debug!(readings = readings.len(), "fetched generation");
    for reading in readings {
        if let Some(slot) = out.get_mut(&reading.site_uuid) {
            slot.push(reading);
        }
    }
    for readings in out.values_mut() {
        readings.sort_by_key(|r| r.start_utc);
    }
    Ok(out)
}
