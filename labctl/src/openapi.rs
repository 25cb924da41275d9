//! OpenAPI documentation aggregation.

use utoipa::OpenApi;

use crate::api::handlers;
use crate::api::models::bookings::{AnswerResponse, AnswerSubmission, AnswerValue, BookingRequest, BookingResponse, RejectResponse, SweepResponse};
use crate::api::models::slots::{BatchCreateResponse, BatchSlotCreate, SlotCreate, SlotResponse};
use crate::auth::Role;
use crate::db::models::slots::{SlotKind, SlotStatus};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "labctl",
        description = "Booking control layer for shared scientific infrastructure"
    ),
    paths(
        handlers::slots::create_slot,
        handlers::slots::create_batch_slots,
        handlers::slots::list_available_slots,
        handlers::bookings::request_booking,
        handlers::bookings::get_booking,
        handlers::bookings::approve_booking,
        handlers::bookings::reject_booking,
        handlers::bookings::cancel_booking,
        handlers::maintenance::force_sweep,
    ),
    components(schemas(
        SlotCreate,
        BatchSlotCreate,
        BatchCreateResponse,
        SlotResponse,
        SlotKind,
        SlotStatus,
        Role,
        AnswerValue,
        AnswerSubmission,
        AnswerResponse,
        BookingRequest,
        BookingResponse,
        RejectResponse,
        SweepResponse,
    )),
    tags(
        (name = "slots", description = "Publishing and listing bookable time windows"),
        (name = "bookings", description = "The booking lifecycle: request, approve, reject, cancel"),
        (name = "maintenance", description = "Operational triggers"),
    )
)]
pub struct ApiDoc;
