//! Test utilities for integration testing (available with `test-utils` feature).

use crate::auth::Role;
use crate::config::{Config, DatabaseConfig, ProxyHeaderAuthConfig, SweeperConfig};
use crate::db::handlers::{FilterQuestions, Infrastructures, Slots};
use crate::db::models::infrastructures::{Infrastructure, InfrastructureCreateDBRequest};
use crate::db::models::questions::{FilterQuestion, FilterQuestionCreateDBRequest};
use crate::db::models::slots::{CreateOutcome, Slot, SlotCreateDBRequest, SlotKind, SlotStatus};
use crate::types::InfrastructureId;
use axum_test::TestServer;
use chrono::{Duration, NaiveDate, NaiveTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

pub async fn create_test_app(pool: PgPool) -> (TestServer, crate::BackgroundServices) {
    let config = create_test_config();

    let app = crate::Application::new_with_pool(config, Some(pool))
        .await
        .expect("Failed to create application");

    app.into_test_server()
}

pub fn create_test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        database: DatabaseConfig {
            // Tests inject their own pool; never dialed
            url: "postgresql://unused".to_string(),
            max_connections: 1,
        },
        sweeper: SweeperConfig {
            enabled: false,
            ..SweeperConfig::default()
        },
        ..Config::default()
    }
}

/// Trusted-proxy headers for a caller with the given role.
pub fn auth_headers(role: Role, email: &str) -> Vec<(String, String)> {
    let config = ProxyHeaderAuthConfig::default();
    vec![
        (config.id_header_name, Uuid::new_v4().to_string()),
        (config.email_header_name, email.to_string()),
        (config.role_header_name, role.to_string()),
    ]
}

/// Attach trusted-proxy auth headers to a test request.
pub fn with_auth(mut request: axum_test::TestRequest, role: Role, email: &str) -> axum_test::TestRequest {
    for (name, value) in auth_headers(role, email) {
        request = request.add_header(name, value);
    }
    request
}

pub async fn create_test_infrastructure(pool: &PgPool) -> Infrastructure {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    let mut repo = Infrastructures::new(&mut conn);

    repo.create(&InfrastructureCreateDBRequest {
        name: format!("test-instrument-{}", Uuid::new_v4().simple()),
        description: Some("Test instrument".to_string()),
    })
    .await
    .expect("Failed to create test infrastructure")
}

pub async fn create_test_question(pool: &PgPool, infrastructure_id: InfrastructureId, required: bool) -> FilterQuestion {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    let mut repo = FilterQuestions::new(&mut conn);

    repo.create(&FilterQuestionCreateDBRequest {
        infrastructure_id,
        prompt: "What will the instrument be used for?".to_string(),
        required,
        position: 0,
    })
    .await
    .expect("Failed to create test question")
}

/// Publish an available timeslot through the generator path.
pub async fn create_available_slot(
    pool: &PgPool,
    infrastructure_id: InfrastructureId,
    date: NaiveDate,
    start: NaiveTime,
    end: NaiveTime,
) -> Slot {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    let mut repo = Slots::new(&mut conn);

    match repo
        .create(&SlotCreateDBRequest {
            infrastructure_id,
            booking_date: date,
            start_time: start,
            end_time: end,
        })
        .await
        .expect("Failed to create test slot")
    {
        CreateOutcome::Created(slot) => slot,
        CreateOutcome::Overlap => panic!("Test slot unexpectedly overlaps"),
    }
}

/// Insert a slot row directly, bypassing generator validation. Lets tests
/// fabricate past-dated or already-claimed rows.
pub async fn insert_slot_raw(
    pool: &PgPool,
    infrastructure_id: InfrastructureId,
    date: NaiveDate,
    start: NaiveTime,
    end: NaiveTime,
    kind: SlotKind,
    status: SlotStatus,
    user_email: Option<&str>,
) -> Slot {
    sqlx::query_as::<_, Slot>(
        r#"
        INSERT INTO slots (id, infrastructure_id, booking_date, start_time, end_time, kind, status, user_email, purpose)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(infrastructure_id)
    .bind(date)
    .bind(start)
    .bind(end)
    .bind(kind)
    .bind(status)
    .bind(user_email)
    .bind(user_email.map(|_| "test booking"))
    .fetch_one(pool)
    .await
    .expect("Failed to insert raw slot")
}

/// A half-hour window whose start sits roughly `hours` from now (nudged
/// earlier when it would land too close to midnight for the end time to stay
/// on the same date).
pub fn window_at_offset(hours: i64) -> (NaiveDate, NaiveTime, NaiveTime) {
    let mut start = Utc::now().naive_utc() + Duration::hours(hours);
    let latest = NaiveTime::from_hms_opt(23, 0, 0).expect("valid time");
    if start.time() > latest {
        start -= Duration::hours(1);
    }
    (start.date(), start.time(), start.time() + Duration::minutes(30))
}

/// Number of active (available/pending/approved) rows for an infrastructure
/// and date.
pub async fn count_active_slots(pool: &PgPool, infrastructure_id: InfrastructureId, date: NaiveDate) -> i64 {
    sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*) FROM slots
        WHERE infrastructure_id = $1
          AND booking_date = $2
          AND status IN ('available', 'pending', 'approved')
        "#,
    )
    .bind(infrastructure_id)
    .bind(date)
    .fetch_one(pool)
    .await
    .expect("Failed to count active slots")
}
