//! Repository pattern implementations over a borrowed `PgPool`
//!
//! - Sites: create with region tagging, lookup, cascading delete
//! - Forecasts: transactional ingest and the candidate query used by the selector
//! - ML models: idempotent get-or-create
//! - Curtailments: validated CRUD
//! - Generation: bulk insert and range reads

pub mod curtailments;
pub mod forecasts;
pub mod generation;
pub mod ml_models;
pub mod sites;

pub use curtailments::CurtailmentRepository;
pub use forecasts::ForecastRepository;
pub use generation::GenerationRepository;
pub use ml_models::MlModelRepository;
pub use sites::SiteRepository;
