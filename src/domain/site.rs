use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Generation technology of a site
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    sqlx::Type,
    strum::Display,
    strum::EnumString,
)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum AssetType {
    #[default]
    Pv,
    Wind,
}

/// A generation site as stored in `sites`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Site {
    pub site_uuid: Uuid,
    pub client_site_id: Option<i32>,
    pub client_site_name: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub capacity_kw: f64,
    pub asset_type: AssetType,
    /// Distribution network operator tag
    pub dno: Option<String>,
    /// Grid supply point tag
    pub gsp: Option<String>,
    pub created_utc: DateTime<Utc>,
}

/// Payload for creating a site; `dno`/`gsp` are assigned by a [`RegionClassifier`]
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewSite {
    pub client_site_id: Option<i32>,
    #[validate(length(min = 1))]
    pub client_site_name: Option<String>,
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: f64,
    #[validate(range(min = 0.0))]
    pub capacity_kw: f64,
    #[serde(default)]
    pub asset_type: AssetType,
}

/// Region tags resolved from a coordinate
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionTags {
    pub dno: Option<String>,
    pub gsp: Option<String>,
}

/// Maps a coordinate to its network regions.
///
/// Implementations usually wrap shape-file lookups; the data layer only
/// needs the resulting tags.
pub trait RegionClassifier: Send + Sync {
    fn classify(&self, latitude: f64, longitude: f64) -> RegionTags;
}

/// Classifier that leaves both tags unset
#[derive(Debug, Clone, Copy, Default)]
pub struct UnclassifiedRegions;

impl RegionClassifier for UnclassifiedRegions {
    fn classify(&self, _latitude: f64, _longitude: f64) -> RegionTags {
        RegionTags::default()
    }
}

impl Site {
    /// Build a site record from a creation payload
    pub fn from_new(new_site: &NewSite, classifier: &dyn RegionClassifier) -> Self {
        let RegionTags { dno, gsp } = classifier.classify(new_site.latitude, new_site.longitude);
        Self {
            site_uuid: Uuid::new_v4(),
            client_site_id: new_site.client_site_id,
            client_site_name: new_site.client_site_name.clone(),
            latitude: new_site.latitude,
            longitude: new_site.longitude,
            capacity_kw: new_site.capacity_kw,
            asset_type: new_site.asset_type,
            dno,
            gsp,
            created_utc: Utc::now(),
        }
    }
}
