//! Handlers for the booking state machine: request, approve, reject, cancel.
//!
//! Every mutation commits before its notification is dispatched; dispatcher
//! failures never affect the response.

use crate::{
    AppState,
    api::models::{
        bookings::{BookingRequest, BookingResponse, RejectResponse},
        slots::SlotResponse,
    },
    auth::Actor,
    db::{
        handlers::{Answers, FilterQuestions, Slots, slots::CancelPolicy},
        models::{
            answers::AnswerCreateDBRequest,
            slots::{BookingRequestDBRequest, CancelOutcome, ClaimOutcome, RejectOutcome, SlotKind, TransitionOutcome},
        },
    },
    errors::{Error, Result},
    notifications::BookingEvent,
    types::{BookingId, SlotId},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};

/// Request a booking against an available timeslot
#[utoipa::path(
    post,
    path = "/slots/{slot_id}/bookings",
    tag = "bookings",
    summary = "Claim an available timeslot",
    description = "Claims the slot for the calling user. All required filter questions of the \
                   slot's infrastructure must carry a non-blank answer.",
    params(
        ("slot_id" = String, Path, description = "Slot ID (UUID)"),
    ),
    request_body = BookingRequest,
    responses(
        (status = 201, description = "Booking created and pending approval", body = BookingResponse),
        (status = 400, description = "Required answers missing or blank"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Slot not found"),
        (status = 409, description = "Slot already claimed"),
    )
)]
pub async fn request_booking(
    State(state): State<AppState>,
    Path(slot_id): Path<SlotId>,
    actor: Actor,
    Json(data): Json<BookingRequest>,
) -> Result<(StatusCode, Json<BookingResponse>)> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let mut slots = Slots::new(&mut pool_conn);
    let slot = slots.get_by_id(slot_id).await?.ok_or(Error::NotFound {
        resource: "Slot",
        id: slot_id.to_string(),
    })?;

    // Presence check for required answers; runs before any mutation. The
    // claim below re-validates the slot's state atomically, so this read is
    // only advisory about the question set.
    let mut questions = FilterQuestions::new(&mut pool_conn);
    let required = questions.required_question_ids(slot.infrastructure_id).await?;
    let missing: Vec<String> = required
        .iter()
        .filter(|question_id| {
            !data
                .answers
                .iter()
                .any(|a| a.question_id == **question_id && !a.answer.is_blank())
        })
        .map(|question_id| question_id.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(Error::BadRequest {
            message: format!("Missing answers for required questions: {}", missing.join(", ")),
        });
    }

    let request = BookingRequestDBRequest {
        user_email: actor.email.clone(),
        purpose: data.purpose,
        answers: data.answers.into_iter().map(AnswerCreateDBRequest::from).collect(),
    };

    let mut slots = Slots::new(&mut pool_conn);
    let booking = match slots.request_booking(slot_id, &request).await? {
        ClaimOutcome::Claimed(slot) => slot,
        ClaimOutcome::NotFound => {
            return Err(Error::NotFound {
                resource: "Slot",
                id: slot_id.to_string(),
            });
        }
        ClaimOutcome::Unavailable { status, .. } => {
            return Err(Error::Conflict {
                message: format!("Slot is no longer available (status {status})"),
            });
        }
    };

    state.notifier.dispatch(BookingEvent::Requested, &booking).await;

    let mut answers = Answers::new(&mut pool_conn);
    let stored = answers.list_for_booking(booking.id).await?;

    Ok((StatusCode::CREATED, Json(BookingResponse::new(booking, stored))))
}

/// Fetch a booking with its answers
#[utoipa::path(
    get,
    path = "/bookings/{booking_id}",
    tag = "bookings",
    summary = "Fetch a booking and its answers",
    params(
        ("booking_id" = String, Path, description = "Booking ID (UUID)"),
    ),
    responses(
        (status = 200, description = "The booking", body = BookingResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Booking not found"),
    )
)]
pub async fn get_booking(
    State(state): State<AppState>,
    Path(booking_id): Path<BookingId>,
    _actor: Actor,
) -> Result<Json<BookingResponse>> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let mut slots = Slots::new(&mut pool_conn);
    let slot = slots.get_by_id(booking_id).await?.filter(|s| s.kind == SlotKind::Booking);
    let Some(booking) = slot else {
        return Err(Error::NotFound {
            resource: "Booking",
            id: booking_id.to_string(),
        });
    };

    let mut answers = Answers::new(&mut pool_conn);
    let stored = answers.list_for_booking(booking.id).await?;

    Ok(Json(BookingResponse::new(booking, stored)))
}

/// Approve a pending booking
#[utoipa::path(
    post,
    path = "/bookings/{booking_id}/approve",
    tag = "bookings",
    summary = "Approve a pending booking",
    params(
        ("booking_id" = String, Path, description = "Booking ID (UUID)"),
    ),
    responses(
        (status = 200, description = "Booking approved", body = SlotResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - requires manager role"),
        (status = 404, description = "Booking not found"),
        (status = 409, description = "Booking is not pending"),
    )
)]
pub async fn approve_booking(
    State(state): State<AppState>,
    Path(booking_id): Path<BookingId>,
    actor: Actor,
) -> Result<Json<SlotResponse>> {
    actor.require_manager("approve bookings")?;

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let mut slots = Slots::new(&mut pool_conn);
    match slots.approve(booking_id).await? {
        TransitionOutcome::Applied(slot) => {
            state.notifier.dispatch(BookingEvent::Approved, &slot).await;
            Ok(Json(SlotResponse::from(slot)))
        }
        TransitionOutcome::NotFound => Err(Error::NotFound {
            resource: "Booking",
            id: booking_id.to_string(),
        }),
        TransitionOutcome::InvalidStatus(status) => Err(Error::Conflict {
            message: format!("Cannot approve a booking in status {status}"),
        }),
    }
}

/// Reject a pending booking and re-offer its window
#[utoipa::path(
    post,
    path = "/bookings/{booking_id}/reject",
    tag = "bookings",
    summary = "Reject a pending booking",
    description = "Rejects the booking and creates one new available timeslot with the identical \
                   infrastructure, date, and time range.",
    params(
        ("booking_id" = String, Path, description = "Booking ID (UUID)"),
    ),
    responses(
        (status = 200, description = "Booking rejected; replacement slot created", body = RejectResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - requires manager role"),
        (status = 404, description = "Booking not found"),
        (status = 409, description = "Booking is not pending"),
    )
)]
pub async fn reject_booking(
    State(state): State<AppState>,
    Path(booking_id): Path<BookingId>,
    actor: Actor,
) -> Result<Json<RejectResponse>> {
    actor.require_manager("reject bookings")?;

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let mut slots = Slots::new(&mut pool_conn);
    match slots.reject(booking_id).await? {
        RejectOutcome::Rejected { booking, replacement } => {
            state.notifier.dispatch(BookingEvent::Rejected, &booking).await;
            Ok(Json(RejectResponse {
                booking: SlotResponse::from(booking),
                new_slot_id: replacement.id,
            }))
        }
        RejectOutcome::NotFound => Err(Error::NotFound {
            resource: "Booking",
            id: booking_id.to_string(),
        }),
        RejectOutcome::InvalidStatus(status) => Err(Error::Conflict {
            message: format!("Cannot reject a booking in status {status}"),
        }),
    }
}

/// Cancel a pending or approved booking
#[utoipa::path(
    post,
    path = "/bookings/{booking_id}/cancel",
    tag = "bookings",
    summary = "Cancel a pending or approved booking",
    description = "End users may cancel only their own bookings, and only up to the configured \
                   cutoff before the start time. Managers and admins bypass both restrictions. \
                   Canceling does not re-offer the window.",
    params(
        ("booking_id" = String, Path, description = "Booking ID (UUID)"),
    ),
    responses(
        (status = 200, description = "Booking canceled", body = SlotResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Within the cancellation cutoff, or not the booking's requester"),
        (status = 404, description = "Booking not found"),
        (status = 409, description = "Booking is neither pending nor approved"),
    )
)]
pub async fn cancel_booking(
    State(state): State<AppState>,
    Path(booking_id): Path<BookingId>,
    actor: Actor,
) -> Result<Json<SlotResponse>> {
    let cutoff = chrono::Duration::from_std(state.config.booking.cancellation_cutoff).map_err(|e| Error::Internal {
        operation: format!("convert cancellation cutoff: {e}"),
    })?;

    let policy = if actor.role.can_manage() {
        CancelPolicy::default()
    } else {
        CancelPolicy {
            owner_email: Some(&actor.email),
            cutoff: Some(cutoff),
        }
    };

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let mut slots = Slots::new(&mut pool_conn);
    match slots.cancel(booking_id, &policy).await? {
        CancelOutcome::Canceled(slot) => {
            state.notifier.dispatch(BookingEvent::Canceled, &slot).await;
            Ok(Json(SlotResponse::from(slot)))
        }
        CancelOutcome::NotFound => Err(Error::NotFound {
            resource: "Booking",
            id: booking_id.to_string(),
        }),
        CancelOutcome::InvalidStatus(status) => Err(Error::Conflict {
            message: format!("Cannot cancel a booking in status {status}"),
        }),
        CancelOutcome::WithinCutoff { starts_at } => Err(Error::WithinCutoffWindow { starts_at }),
        CancelOutcome::NotOwner => Err(Error::InsufficientRole {
            role: actor.role,
            action: "cancel another user's booking",
        }),
    }
}
