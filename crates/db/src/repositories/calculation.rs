use sqlx::Row;

use cargolink_core::domain::calculation::{Calculation, CalculationId};

use super::{timestamp, CalculationRepository, RepositoryError};
use crate::DbPool;

pub struct SqlCalculationRepository {
    pool: DbPool,
}

impl SqlCalculationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl CalculationRepository for SqlCalculationRepository {
    async fn find_by_id(
        &self,
        id: &CalculationId,
    ) -> Result<Option<Calculation>, RepositoryError> {
        let row = sqlx::query("SELECT document FROM calculations WHERE id = ?")
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let document: String =
            row.try_get("document").map_err(|e| RepositoryError::Decode(e.to_string()))?;
        serde_json::from_str(&document)
            .map(Some)
            .map_err(|e| RepositoryError::Decode(format!("calculation document: {e}")))
    }

    async fn save(&self, calculation: &Calculation) -> Result<(), RepositoryError> {
        let document = serde_json::to_string(calculation)
            .map_err(|e| RepositoryError::Decode(format!("calculation document: {e}")))?;

        sqlx::query(
            "INSERT INTO calculations (id, chat_id, document, created_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET document = excluded.document",
        )
        .bind(&calculation.id.0)
        .bind(calculation.chat_id)
        .bind(document)
        .bind(timestamp(calculation.created_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
