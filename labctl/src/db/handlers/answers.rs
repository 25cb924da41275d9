//! Database repository for booking answers.

use sqlx::PgConnection;
use tracing::instrument;

use crate::db::errors::Result;
use crate::db::models::answers::{Answer, AnswerCreateDBRequest};
use crate::types::SlotId;

pub struct Answers<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Answers<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, rows), fields(count = rows.len()), err)]
    pub async fn insert_for_booking(&mut self, slot_id: SlotId, rows: &[AnswerCreateDBRequest]) -> Result<Vec<Answer>> {
        let mut answers = Vec::with_capacity(rows.len());
        for row in rows {
            let answer = sqlx::query_as::<_, Answer>(
                r#"
                INSERT INTO answers (slot_id, question_id, text_value, file_ref)
                VALUES ($1, $2, $3, $4)
                RETURNING *
                "#,
            )
            .bind(slot_id)
            .bind(row.question_id)
            .bind(&row.text_value)
            .bind(&row.file_ref)
            .fetch_one(&mut *self.db)
            .await?;
            answers.push(answer);
        }
        Ok(answers)
    }

    #[instrument(skip(self), err)]
    pub async fn list_for_booking(&mut self, slot_id: SlotId) -> Result<Vec<Answer>> {
        let answers = sqlx::query_as::<_, Answer>("SELECT * FROM answers WHERE slot_id = $1 ORDER BY created_at")
            .bind(slot_id)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(answers)
    }
}
