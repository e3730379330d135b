use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{ForecastValueSum, ResolvedForecastValue, Site, SumBy};

/// Sum resolved power per (start_utc, group key), ordered by that pair.
///
/// Sites without a dno/gsp tag fall into the `None` group rather than being
/// dropped.
pub fn sum_resolved(
    resolved: &BTreeMap<Uuid, Vec<ResolvedForecastValue>>,
    sites: &HashMap<Uuid, Site>,
    sum_by: SumBy,
) -> Vec<ForecastValueSum> {
    let mut groups: BTreeMap<(DateTime<Utc>, Option<String>), f64> = BTreeMap::new();

    for (site_uuid, values) in resolved {
        let key = sum_by.group_key(sites.get(site_uuid));
        for value in values {
            *groups.entry((value.start_utc, key.clone())).or_insert(0.0) += value.forecast_power_kw;
        }
    }

    groups
        .into_iter()
        .map(|((start_utc, name), power_kw)| ForecastValueSum {
            start_utc,
            power_kw,
            name,
        })
        .collect()
}
