//! Database models for slots, the single lifecycle table.
//!
//! A slot is either an unclaimed *timeslot* (published availability) or a
//! *booking* (a user's claim on that window). Both are the same row; claiming
//! flips the kind and starts the booking state machine.

use crate::db::models::answers::AnswerCreateDBRequest;
use crate::types::{InfrastructureId, SlotId};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror::Error;
use utoipa::ToSchema;

/// Whether a row is published availability or a user's claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "slot_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SlotKind {
    Timeslot,
    Booking,
}

/// Position in the booking state machine.
///
/// `available → pending → {approved, rejected}`; `pending`/`approved` may be
/// `canceled`; any active status is retired to `completed` by the sweeper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "slot_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SlotStatus {
    Available,
    Pending,
    Approved,
    Rejected,
    Canceled,
    Completed,
}

impl SlotStatus {
    /// Active rows participate in overlap checks and are eligible for expiry.
    pub fn is_active(&self) -> bool {
        matches!(self, SlotStatus::Available | SlotStatus::Pending | SlotStatus::Approved)
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_active()
    }
}

impl std::fmt::Display for SlotStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SlotStatus::Available => "available",
            SlotStatus::Pending => "pending",
            SlotStatus::Approved => "approved",
            SlotStatus::Rejected => "rejected",
            SlotStatus::Canceled => "canceled",
            SlotStatus::Completed => "completed",
        };
        write!(f, "{name}")
    }
}

/// One persisted time window row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Slot {
    pub id: SlotId,
    pub infrastructure_id: InfrastructureId,
    pub booking_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub kind: SlotKind,
    pub status: SlotStatus,
    pub user_email: Option<String>,
    pub purpose: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Slot {
    /// Naive wall-clock start of the window (date + start time).
    pub fn starts_at(&self) -> NaiveDateTime {
        self.booking_date.and_time(self.start_time)
    }
}

/// Two half-open ranges `[s1,e1)` and `[s2,e2)` on the same date overlap iff
/// `s1 < e2 AND s2 < e1`.
pub fn ranges_overlap(s1: NaiveTime, e1: NaiveTime, s2: NaiveTime, e2: NaiveTime) -> bool {
    s1 < e2 && s2 < e1
}

/// Database request for creating a single timeslot
#[derive(Debug, Clone)]
pub struct SlotCreateDBRequest {
    pub infrastructure_id: InfrastructureId,
    pub booking_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

/// Validation failures for slot creation requests, raised before any row is
/// written.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SlotSpecError {
    #[error("booking date {0} is in the past")]
    PastDate(NaiveDate),
    #[error("end time must be after start time")]
    EmptyWindow,
    #[error("slot duration must be at least one minute")]
    NonPositiveDuration,
    #[error("slots per day must be at least 1")]
    NoSlotsPerDay,
    #[error("end date must not be before start date")]
    InvertedDateRange,
    #[error("daily slot ladder runs past midnight")]
    LadderPastMidnight,
}

impl SlotCreateDBRequest {
    pub fn validate(&self, today: NaiveDate) -> Result<(), SlotSpecError> {
        if self.booking_date < today {
            return Err(SlotSpecError::PastDate(self.booking_date));
        }
        if self.end_time <= self.start_time {
            return Err(SlotSpecError::EmptyWindow);
        }
        Ok(())
    }
}

/// Database request for batch timeslot generation
#[derive(Debug, Clone)]
pub struct BatchCreateDBRequest {
    pub infrastructure_id: InfrastructureId,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub daily_start_time: NaiveTime,
    pub slot_duration_minutes: i64,
    pub slots_per_day: i64,
}

impl BatchCreateDBRequest {
    /// Expand the batch specification into candidate windows, one per `(day, k)` pair:
    /// candidate `k` starts at `daily_start_time + k * duration` and the
    /// windows sit back-to-back. All validation happens here, before any
    /// database write.
    pub fn windows(&self, today: NaiveDate) -> Result<Vec<(NaiveDate, NaiveTime, NaiveTime)>, SlotSpecError> {
        if self.slot_duration_minutes < 1 {
            return Err(SlotSpecError::NonPositiveDuration);
        }
        if self.slots_per_day < 1 {
            return Err(SlotSpecError::NoSlotsPerDay);
        }
        if self.end_date < self.start_date {
            return Err(SlotSpecError::InvertedDateRange);
        }
        if self.start_date < today {
            return Err(SlotSpecError::PastDate(self.start_date));
        }

        // Candidates must never cross into the next calendar date: the whole
        // ladder has to end strictly before midnight (a window closing at
        // 24:00 has no representable end time).
        let ladder_minutes = self
            .slot_duration_minutes
            .checked_mul(self.slots_per_day)
            .ok_or(SlotSpecError::LadderPastMidnight)?;
        let midnight = NaiveTime::from_hms_opt(0, 0, 0).expect("midnight is a valid time");
        let start_of_day = NaiveDateTime::new(self.start_date, midnight);
        let minutes_until_midnight =
            24 * 60 - (NaiveDateTime::new(self.start_date, self.daily_start_time) - start_of_day).num_minutes();
        if ladder_minutes >= minutes_until_midnight {
            return Err(SlotSpecError::LadderPastMidnight);
        }

        let duration = Duration::minutes(self.slot_duration_minutes);

        let mut windows = Vec::new();
        let mut day = self.start_date;
        while day <= self.end_date {
            for k in 0..self.slots_per_day {
                let start = self.daily_start_time + duration * k as i32;
                // Ladder fits before midnight, so this add never wraps
                let end = start + duration;
                windows.push((day, start, end));
            }
            match day.succ_opt() {
                Some(next) => day = next,
                None => break,
            }
        }
        Ok(windows)
    }
}

/// Database request for claiming a timeslot as a booking
#[derive(Debug, Clone)]
pub struct BookingRequestDBRequest {
    pub user_email: String,
    pub purpose: String,
    pub answers: Vec<AnswerCreateDBRequest>,
}

/// Result of a single-slot insert attempt.
#[derive(Debug)]
pub enum CreateOutcome {
    Created(Slot),
    /// An active row already occupies part of the window
    Overlap,
}

/// Result of a claim attempt (`requestBooking`).
#[derive(Debug)]
pub enum ClaimOutcome {
    Claimed(Slot),
    NotFound,
    /// The row exists but is not an available timeslot
    Unavailable { kind: SlotKind, status: SlotStatus },
}

/// Result of an approve attempt.
#[derive(Debug)]
pub enum TransitionOutcome {
    Applied(Slot),
    NotFound,
    InvalidStatus(SlotStatus),
}

/// Result of a reject attempt. Rejection flips the booking to its terminal
/// status and re-offers the identical window as a brand-new timeslot.
#[derive(Debug)]
pub enum RejectOutcome {
    Rejected { booking: Slot, replacement: Slot },
    NotFound,
    InvalidStatus(SlotStatus),
}

/// Result of a cancel attempt.
#[derive(Debug)]
pub enum CancelOutcome {
    Canceled(Slot),
    NotFound,
    InvalidStatus(SlotStatus),
    /// The caller is subject to the cutoff and the window starts too soon
    WithinCutoff { starts_at: NaiveDateTime },
    /// The caller is not the booking's requester (and holds no management role)
    NotOwner,
}
