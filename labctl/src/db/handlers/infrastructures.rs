//! Database repository for the infrastructure registry.

use sqlx::PgConnection;
use tracing::instrument;
use uuid::Uuid;

use crate::db::errors::Result;
use crate::db::models::infrastructures::{Infrastructure, InfrastructureCreateDBRequest};
use crate::types::InfrastructureId;

pub struct Infrastructures<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Infrastructures<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(name = %request.name), err)]
    pub async fn create(&mut self, request: &InfrastructureCreateDBRequest) -> Result<Infrastructure> {
        let infrastructure = sqlx::query_as::<_, Infrastructure>(
            r#"
            INSERT INTO infrastructures (id, name, description)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&request.name)
        .bind(&request.description)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(infrastructure)
    }

    #[instrument(skip(self), err)]
    pub async fn get_by_id(&mut self, id: InfrastructureId) -> Result<Option<Infrastructure>> {
        let infrastructure = sqlx::query_as::<_, Infrastructure>("SELECT * FROM infrastructures WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(infrastructure)
    }

    #[instrument(skip(self), err)]
    pub async fn exists(&mut self, id: InfrastructureId) -> Result<bool> {
        let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM infrastructures WHERE id = $1)")
            .bind(id)
            .fetch_one(&mut *self.db)
            .await?;

        Ok(exists)
    }
}
