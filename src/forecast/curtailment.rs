use std::collections::HashMap;

use tracing::warn;
use uuid::Uuid;

use crate::domain::{Curtailment, ResolvedForecastValue};
use crate::error::{DataError, DataResult};

/// Applies one site's curtailment windows to resolved values
#[derive(Debug, Clone)]
pub struct CurtailmentAdjuster {
    site_uuid: Uuid,
    curtailments: Vec<Curtailment>,
}

impl CurtailmentAdjuster {
    /// Curtailments belonging to other sites are ignored
    pub fn new(site_uuid: Uuid, curtailments: impl IntoIterator<Item = Curtailment>) -> Self {
        Self {
            site_uuid,
            curtailments: curtailments
                .into_iter()
                .filter(|c| c.site_uuid == site_uuid)
                .collect(),
        }
    }

    /// Split a mixed list into one adjuster per site in `site_uuids`
    pub fn for_sites(site_uuids: &[Uuid], curtailments: Vec<Curtailment>) -> HashMap<Uuid, Self> {
        let mut grouped: HashMap<Uuid, Vec<Curtailment>> =
            site_uuids.iter().map(|uuid| (*uuid, Vec::new())).collect();
        for curtailment in curtailments {
            if let Some(list) = grouped.get_mut(&curtailment.site_uuid) {
                list.push(curtailment);
            }
        }
        grouped
            .into_iter()
            .map(|(site_uuid, curtailments)| (site_uuid, Self { site_uuid, curtailments }))
            .collect()
    }

    /// The curtailment active at the value's start, if any.
    ///
    /// Overlapping active windows have no defined precedence and are
    /// reported as [`DataError::Ambiguous`].
    pub fn active_for(&self, value: &ResolvedForecastValue) -> DataResult<Option<&Curtailment>> {
        let mut active = self
            .curtailments
            .iter()
            .filter(|c| c.is_active_at(value.start_utc));
        let first = active.next();
        let extra = active.count();
        if extra > 0 {
            warn!(
                site_uuid = %self.site_uuid,
                start_utc = %value.start_utc,
                active = extra + 1,
                "overlapping curtailments"
            );
            return Err(DataError::Ambiguous {
                site_uuid: self.site_uuid,
                at: value.start_utc,
                count: extra + 1,
            });
        }
        Ok(first)
    }

    /// Return `value` with the active curtailment applied.
    ///
    /// Only unadjusted values are accepted; feeding back an adjusted value
    /// is an `InvalidArgument`.
    pub fn adjust(&self, value: ResolvedForecastValue) -> DataResult<ResolvedForecastValue> {
        if let Some(applied) = value.curtailment_uuid {
            return Err(DataError::invalid(format!(
                "forecast value {} already adjusted by curtailment {applied}",
                value.forecast_value_uuid
            )));
        }
        match self.active_for(&value)? {
            Some(curtailment) => Ok(ResolvedForecastValue {
                forecast_power_kw: curtailment.curtailed_power_kw(value.forecast_power_kw),
                curtailment_uuid: Some(curtailment.curtailment_uuid),
                ..value
            }),
            None => Ok(value),
        }
    }
}
