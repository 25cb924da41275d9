//! Maintenance handlers: the on-demand sweep trigger.

use crate::{
    AppState,
    api::models::bookings::SweepResponse,
    auth::Actor,
    db::handlers::Slots,
    errors::{Error, Result},
};
use axum::{extract::State, response::Json};

/// Force an expiry sweep
#[utoipa::path(
    post,
    path = "/maintenance/sweep",
    tag = "maintenance",
    summary = "Retire all past-dated active slots immediately",
    description = "Runs the same pass as the recurring sweeper: every active slot whose window \
                   has fully passed is set to completed.",
    responses(
        (status = 200, description = "Sweep completed", body = SweepResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - requires manager role"),
    )
)]
pub async fn force_sweep(State(state): State<AppState>, actor: Actor) -> Result<Json<SweepResponse>> {
    actor.require_manager("force a sweep")?;

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let mut slots = Slots::new(&mut pool_conn);
    let updated_count = slots.sweep_expired(state.config.sweeper.batch_size).await?;

    Ok(Json(SweepResponse { updated_count }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::db::models::slots::{SlotKind, SlotStatus};
    use crate::test_utils::{create_test_app, create_test_infrastructure, insert_slot_raw, with_auth};
    use chrono::{Duration, NaiveTime, Utc};
    use sqlx::PgPool;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_force_sweep(pool: PgPool) {
        let (server, _bg) = create_test_app(pool.clone()).await;
        let infra = create_test_infrastructure(&pool).await;
        let yesterday = Utc::now().date_naive() - Duration::days(1);
        let expired = insert_slot_raw(
            &pool,
            infra.id,
            yesterday,
            t(10, 0),
            t(11, 0),
            SlotKind::Booking,
            SlotStatus::Approved,
            Some("ada@example.com"),
        )
        .await;

        // students cannot trigger maintenance
        let response = with_auth(server.post("/api/v1/maintenance/sweep"), Role::Student, "ada@example.com").await;
        response.assert_status_forbidden();

        let response = with_auth(server.post("/api/v1/maintenance/sweep"), Role::Admin, "admin@example.com").await;
        response.assert_status_ok();
        let outcome: SweepResponse = response.json();
        assert_eq!(outcome.updated_count, 1);

        // the pass is idempotent
        let response = with_auth(server.post("/api/v1/maintenance/sweep"), Role::Admin, "admin@example.com").await;
        response.assert_status_ok();
        let outcome: SweepResponse = response.json();
        assert_eq!(outcome.updated_count, 0);

        let status = sqlx::query_scalar::<_, SlotStatus>("SELECT status FROM slots WHERE id = $1")
            .bind(expired.id)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(status, SlotStatus::Completed);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_force_sweep_requires_authentication(pool: PgPool) {
        let (server, _bg) = create_test_app(pool).await;

        let response = server.post("/api/v1/maintenance/sweep").await;
        response.assert_status_unauthorized();
    }
}
