//! Database repository for filter questions.

use sqlx::PgConnection;
use tracing::instrument;

use crate::db::errors::Result;
use crate::db::models::questions::{FilterQuestion, FilterQuestionCreateDBRequest};
use crate::types::{InfrastructureId, QuestionId};

pub struct FilterQuestions<'c> {
    db: &'c mut PgConnection,
}

impl<'c> FilterQuestions<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(infrastructure_id = %request.infrastructure_id), err)]
    pub async fn create(&mut self, request: &FilterQuestionCreateDBRequest) -> Result<FilterQuestion> {
        let question = sqlx::query_as::<_, FilterQuestion>(
            r#"
            INSERT INTO filter_questions (infrastructure_id, prompt, required, position)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(request.infrastructure_id)
        .bind(&request.prompt)
        .bind(request.required)
        .bind(request.position)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(question)
    }

    #[instrument(skip(self), err)]
    pub async fn list_for_infrastructure(&mut self, infrastructure_id: InfrastructureId) -> Result<Vec<FilterQuestion>> {
        let questions = sqlx::query_as::<_, FilterQuestion>(
            "SELECT * FROM filter_questions WHERE infrastructure_id = $1 ORDER BY position, created_at",
        )
        .bind(infrastructure_id)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(questions)
    }

    /// Ids of the questions a booking request against this infrastructure
    /// must answer.
    #[instrument(skip(self), err)]
    pub async fn required_question_ids(&mut self, infrastructure_id: InfrastructureId) -> Result<Vec<QuestionId>> {
        let ids = sqlx::query_scalar::<_, QuestionId>("SELECT id FROM filter_questions WHERE infrastructure_id = $1 AND required")
            .bind(infrastructure_id)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(ids)
    }
}
