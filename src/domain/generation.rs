use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Measured output of a site over `[start_utc, end_utc)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct GenerationReading {
    pub generation_uuid: Uuid,
    pub site_uuid: Uuid,
    pub start_utc: DateTime<Utc>,
    pub end_utc: DateTime<Utc>,
    pub generation_power_kw: f64,
    pub created_utc: DateTime<Utc>,
}

impl GenerationReading {
    pub fn new(
        site_uuid: Uuid,
        start_utc: DateTime<Utc>,
        end_utc: DateTime<Utc>,
        generation_power_kw: f64,
    ) -> Self {
        Self {
            generation_uuid: Uuid::new_v4(),
            site_uuid,
            start_utc,
            end_utc,
            generation_power_kw,
            created_utc: Utc::now(),
        }
    }
}
