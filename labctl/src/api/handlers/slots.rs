//! Handlers for publishing and listing timeslots.

use crate::{
    AppState,
    api::models::slots::{BatchCreateResponse, BatchSlotCreate, ListSlotsQuery, SlotCreate, SlotResponse},
    auth::Actor,
    db::{
        handlers::{Infrastructures, Slots},
        models::slots::CreateOutcome,
    },
    errors::{Error, Result},
    types::InfrastructureId,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use chrono::Utc;

/// Publish a single timeslot
#[utoipa::path(
    post,
    path = "/infrastructures/{infrastructure_id}/slots",
    tag = "slots",
    summary = "Publish a single timeslot",
    params(
        ("infrastructure_id" = String, Path, description = "Infrastructure ID (UUID)"),
    ),
    request_body = SlotCreate,
    responses(
        (status = 201, description = "Timeslot created", body = SlotResponse),
        (status = 400, description = "Past date or invalid window"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - requires manager role"),
        (status = 404, description = "Infrastructure not found"),
        (status = 409, description = "Window overlaps an existing active slot"),
    )
)]
pub async fn create_slot(
    State(state): State<AppState>,
    Path(infrastructure_id): Path<InfrastructureId>,
    actor: Actor,
    Json(data): Json<SlotCreate>,
) -> Result<(StatusCode, Json<SlotResponse>)> {
    actor.require_manager("publish slots")?;

    let request = data.into_db_request(infrastructure_id);
    request
        .validate(Utc::now().date_naive())
        .map_err(|e| Error::BadRequest { message: e.to_string() })?;

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let mut infrastructures = Infrastructures::new(&mut pool_conn);
    if !infrastructures.exists(infrastructure_id).await? {
        return Err(Error::NotFound {
            resource: "Infrastructure",
            id: infrastructure_id.to_string(),
        });
    }

    let mut slots = Slots::new(&mut pool_conn);
    match slots.create(&request).await? {
        CreateOutcome::Created(slot) => Ok((StatusCode::CREATED, Json(SlotResponse::from(slot)))),
        CreateOutcome::Overlap => Err(Error::Conflict {
            message: "The requested window overlaps an existing active slot".to_string(),
        }),
    }
}

/// Publish a batch of timeslots
#[utoipa::path(
    post,
    path = "/infrastructures/{infrastructure_id}/slots/batch",
    tag = "slots",
    summary = "Publish a batch of back-to-back timeslots over a date range",
    params(
        ("infrastructure_id" = String, Path, description = "Infrastructure ID (UUID)"),
    ),
    request_body = BatchSlotCreate,
    responses(
        (status = 201, description = "Batch processed; overlapping candidates were skipped", body = BatchCreateResponse),
        (status = 400, description = "Invalid batch specification"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - requires manager role"),
        (status = 404, description = "Infrastructure not found"),
    )
)]
pub async fn create_batch_slots(
    State(state): State<AppState>,
    Path(infrastructure_id): Path<InfrastructureId>,
    actor: Actor,
    Json(data): Json<BatchSlotCreate>,
) -> Result<(StatusCode, Json<BatchCreateResponse>)> {
    actor.require_manager("publish slots")?;

    let request = data.into_db_request(infrastructure_id);
    // All validation happens before any row is written
    let windows = request
        .windows(Utc::now().date_naive())
        .map_err(|e| Error::BadRequest { message: e.to_string() })?;

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let mut infrastructures = Infrastructures::new(&mut pool_conn);
    if !infrastructures.exists(infrastructure_id).await? {
        return Err(Error::NotFound {
            resource: "Infrastructure",
            id: infrastructure_id.to_string(),
        });
    }

    let mut slots = Slots::new(&mut pool_conn);
    let (created, skipped) = slots.create_batch(&request, &windows).await?;

    Ok((StatusCode::CREATED, Json(BatchCreateResponse { created, skipped })))
}

/// List available timeslots
#[utoipa::path(
    get,
    path = "/infrastructures/{infrastructure_id}/slots",
    tag = "slots",
    summary = "List available timeslots for an infrastructure",
    params(
        ("infrastructure_id" = String, Path, description = "Infrastructure ID (UUID)"),
        ListSlotsQuery
    ),
    responses(
        (status = 200, description = "Available timeslots", body = [SlotResponse]),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Infrastructure not found"),
    )
)]
pub async fn list_available_slots(
    State(state): State<AppState>,
    Path(infrastructure_id): Path<InfrastructureId>,
    Query(query): Query<ListSlotsQuery>,
    _actor: Actor,
) -> Result<Json<Vec<SlotResponse>>> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let mut infrastructures = Infrastructures::new(&mut pool_conn);
    if !infrastructures.exists(infrastructure_id).await? {
        return Err(Error::NotFound {
            resource: "Infrastructure",
            id: infrastructure_id.to_string(),
        });
    }

    let mut slots = Slots::new(&mut pool_conn);
    let available = slots.list_available(infrastructure_id, query.date).await?;

    Ok(Json(available.into_iter().map(SlotResponse::from).collect()))
}
