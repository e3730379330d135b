use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use crate::domain::MlModel;
use crate::error::{DataError, DataResult};

pub struct MlModelRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> MlModelRepository<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Return the model with this name and version, creating it if needed.
    ///
    /// Concurrent callers converge on one row through the unique
    /// `(name, version)` index.
    pub async fn get_or_create(&self, name: &str, version: Option<&str>) -> DataResult<MlModel> {
        if name.trim().is_empty() {
            return Err(DataError::invalid("model name must not be empty"));
        }

        let model = sqlx::query_as::<_, MlModel>(
            r#"
            INSERT INTO ml_models (ml_model_uuid, name, version)
            VALUES ($1, $2, $3)
            ON CONFLICT (name, (COALESCE(version, ''))) DO UPDATE
            SET name = EXCLUDED.name
            RETURNING ml_model_uuid, name, version
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(version)
        .fetch_one(self.pool)
        .await?;

        debug!(ml_model_uuid = %model.ml_model_uuid, name, ?version, "Resolved ml model");
        Ok(model)
    }
}
