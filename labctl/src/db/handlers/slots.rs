//! Database repository for slots: the lifecycle engine.
//!
//! All mutation of slot rows passes through this repository. Every
//! check-then-write sequence runs inside one transaction; slot creation
//! additionally serializes on a transaction-scoped advisory lock keyed by
//! `(infrastructure_id, booking_date)` so two writers can never both pass the
//! overlap check for the same window. Claims and approval transitions are
//! single conditional updates keyed on the row's current status, never
//! read-then-write pairs.

use chrono::{Duration, NaiveDate, NaiveTime, Utc};
use sqlx::{Connection, PgConnection};
use tracing::instrument;
use uuid::Uuid;

use crate::db::errors::Result;
use crate::db::handlers::answers::Answers;
use crate::db::models::slots::{
    BatchCreateDBRequest, BookingRequestDBRequest, CancelOutcome, ClaimOutcome, CreateOutcome, RejectOutcome, Slot,
    SlotCreateDBRequest, SlotStatus, TransitionOutcome,
};
use crate::types::{InfrastructureId, SlotId, abbrev_uuid};

/// Constraints a cancel attempt must satisfy, derived from the caller's role.
///
/// Managers and admins cancel with `CancelPolicy::default()` (no ownership or
/// cutoff restriction); end users carry both.
#[derive(Debug, Default)]
pub struct CancelPolicy<'a> {
    /// When set, the booking's `user_email` must match
    pub owner_email: Option<&'a str>,
    /// When set, cancellation must happen strictly before `start - cutoff`
    pub cutoff: Option<Duration>,
}

pub struct Slots<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Slots<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Whether any active row on this infrastructure/date collides with the
    /// half-open candidate window `[start, end)`. Pure read; call it inside
    /// the transaction that performs the subsequent write.
    #[instrument(skip(self), err)]
    pub async fn has_overlap(
        &mut self,
        infrastructure_id: InfrastructureId,
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
        exclude: Option<SlotId>,
    ) -> Result<bool> {
        let overlaps = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM slots
                WHERE infrastructure_id = $1
                  AND booking_date = $2
                  AND status IN ('available', 'pending', 'approved')
                  AND start_time < $4
                  AND $3 < end_time
                  AND ($5::uuid IS NULL OR id <> $5)
            )
            "#,
        )
        .bind(infrastructure_id)
        .bind(date)
        .bind(start)
        .bind(end)
        .bind(exclude)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(overlaps)
    }

    #[instrument(skip(self), err)]
    pub async fn get_by_id(&mut self, id: SlotId) -> Result<Option<Slot>> {
        let slot = sqlx::query_as::<_, Slot>("SELECT * FROM slots WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(slot)
    }

    #[instrument(skip(self), err)]
    pub async fn list_available(&mut self, infrastructure_id: InfrastructureId, date: Option<NaiveDate>) -> Result<Vec<Slot>> {
        let slots = sqlx::query_as::<_, Slot>(
            r#"
            SELECT * FROM slots
            WHERE infrastructure_id = $1
              AND status = 'available'
              AND ($2::date IS NULL OR booking_date = $2)
            ORDER BY booking_date, start_time
            "#,
        )
        .bind(infrastructure_id)
        .bind(date)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(slots)
    }

    /// Insert one timeslot after an overlap check, both inside a transaction
    /// serialized per `(infrastructure_id, booking_date)`.
    ///
    /// Input validation (past date, inverted window) happens at the API layer
    /// before this is called.
    #[instrument(skip(self, request), fields(infrastructure_id = %request.infrastructure_id, date = %request.booking_date), err)]
    pub async fn create(&mut self, request: &SlotCreateDBRequest) -> Result<CreateOutcome> {
        let mut tx = self.db.begin().await?;

        lock_schedule(&mut tx, request.infrastructure_id, request.booking_date).await?;

        let mut this = Slots::new(&mut tx);
        if this
            .has_overlap(
                request.infrastructure_id,
                request.booking_date,
                request.start_time,
                request.end_time,
                None,
            )
            .await?
        {
            return Ok(CreateOutcome::Overlap);
        }

        let slot = sqlx::query_as::<_, Slot>(
            r#"
            INSERT INTO slots (id, infrastructure_id, booking_date, start_time, end_time, kind, status)
            VALUES ($1, $2, $3, $4, $5, 'timeslot', 'available')
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(request.infrastructure_id)
        .bind(request.booking_date)
        .bind(request.start_time)
        .bind(request.end_time)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(CreateOutcome::Created(slot))
    }

    /// Commit each pre-expanded candidate window independently: overlapping
    /// candidates are skipped, never aborting the rest of the batch. Returns
    /// `(created, skipped)`.
    #[instrument(skip(self, request, windows), fields(infrastructure_id = %request.infrastructure_id, candidates = windows.len()), err)]
    pub async fn create_batch(
        &mut self,
        request: &BatchCreateDBRequest,
        windows: &[(NaiveDate, NaiveTime, NaiveTime)],
    ) -> Result<(u64, u64)> {
        let mut created = 0u64;
        let mut skipped = 0u64;

        for (date, start, end) in windows {
            let candidate = SlotCreateDBRequest {
                infrastructure_id: request.infrastructure_id,
                booking_date: *date,
                start_time: *start,
                end_time: *end,
            };
            match self.create(&candidate).await? {
                CreateOutcome::Created(_) => created += 1,
                CreateOutcome::Overlap => skipped += 1,
            }
        }

        Ok((created, skipped))
    }

    /// Claim an available timeslot as a pending booking and persist its
    /// answers, in one transaction.
    ///
    /// The claim is a single conditional update keyed on
    /// `kind = 'timeslot' AND status = 'available'`: of N concurrent callers
    /// exactly one sees a row change, the rest resolve to [`ClaimOutcome::NotFound`]
    /// or [`ClaimOutcome::Unavailable`].
    #[instrument(skip(self, request), fields(slot_id = %abbrev_uuid(&slot_id), user_email = %request.user_email), err)]
    pub async fn request_booking(&mut self, slot_id: SlotId, request: &BookingRequestDBRequest) -> Result<ClaimOutcome> {
        let mut tx = self.db.begin().await?;

        let claimed = sqlx::query_as::<_, Slot>(
            r#"
            UPDATE slots
            SET kind = 'booking', status = 'pending', user_email = $2, purpose = $3, updated_at = now()
            WHERE id = $1 AND kind = 'timeslot' AND status = 'available'
            RETURNING *
            "#,
        )
        .bind(slot_id)
        .bind(&request.user_email)
        .bind(&request.purpose)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(slot) = claimed else {
            // Read back to tell "gone" apart from "already claimed"
            let existing = sqlx::query_as::<_, Slot>("SELECT * FROM slots WHERE id = $1")
                .bind(slot_id)
                .fetch_optional(&mut *tx)
                .await?;
            tx.commit().await?;
            return Ok(match existing {
                None => ClaimOutcome::NotFound,
                Some(row) => ClaimOutcome::Unavailable {
                    kind: row.kind,
                    status: row.status,
                },
            });
        };

        let mut answers = Answers::new(&mut tx);
        answers.insert_for_booking(slot.id, &request.answers).await?;

        tx.commit().await?;
        Ok(ClaimOutcome::Claimed(slot))
    }

    /// `pending -> approved`, as a single conditional update.
    #[instrument(skip(self), fields(booking_id = %abbrev_uuid(&booking_id)), err)]
    pub async fn approve(&mut self, booking_id: SlotId) -> Result<TransitionOutcome> {
        let approved = sqlx::query_as::<_, Slot>(
            r#"
            UPDATE slots
            SET status = 'approved', updated_at = now()
            WHERE id = $1 AND kind = 'booking' AND status = 'pending'
            RETURNING *
            "#,
        )
        .bind(booking_id)
        .fetch_optional(&mut *self.db)
        .await?;

        match approved {
            Some(slot) => Ok(TransitionOutcome::Applied(slot)),
            None => self.transition_miss(booking_id).await,
        }
    }

    /// `pending -> rejected`, and re-offer the identical window as a brand-new
    /// available timeslot. Both writes commit in one transaction.
    #[instrument(skip(self), fields(booking_id = %abbrev_uuid(&booking_id)), err)]
    pub async fn reject(&mut self, booking_id: SlotId) -> Result<RejectOutcome> {
        let mut tx = self.db.begin().await?;

        let rejected = sqlx::query_as::<_, Slot>(
            r#"
            UPDATE slots
            SET status = 'rejected', updated_at = now()
            WHERE id = $1 AND kind = 'booking' AND status = 'pending'
            RETURNING *
            "#,
        )
        .bind(booking_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(booking) = rejected else {
            drop(tx);
            return match self.transition_miss(booking_id).await? {
                TransitionOutcome::NotFound => Ok(RejectOutcome::NotFound),
                TransitionOutcome::InvalidStatus(status) => Ok(RejectOutcome::InvalidStatus(status)),
                TransitionOutcome::Applied(_) => unreachable!("transition_miss never reports success"),
            };
        };

        // The rejected row just left the active set, so the identical window
        // cannot collide with it.
        let replacement = sqlx::query_as::<_, Slot>(
            r#"
            INSERT INTO slots (id, infrastructure_id, booking_date, start_time, end_time, kind, status)
            VALUES ($1, $2, $3, $4, $5, 'timeslot', 'available')
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(booking.infrastructure_id)
        .bind(booking.booking_date)
        .bind(booking.start_time)
        .bind(booking.end_time)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(RejectOutcome::Rejected { booking, replacement })
    }

    /// `pending/approved -> canceled`, subject to the caller's
    /// [`CancelPolicy`]. The row is locked for the duration of the check so
    /// the cutoff decision and the write observe the same state.
    ///
    /// Canceling an approved booking does NOT re-offer the window; only
    /// rejection does.
    #[instrument(skip(self, policy), fields(slot_id = %abbrev_uuid(&id)), err)]
    pub async fn cancel(&mut self, id: SlotId, policy: &CancelPolicy<'_>) -> Result<CancelOutcome> {
        let mut tx = self.db.begin().await?;

        let row = sqlx::query_as::<_, Slot>("SELECT * FROM slots WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(slot) = row else {
            return Ok(CancelOutcome::NotFound);
        };

        if !matches!(slot.status, SlotStatus::Pending | SlotStatus::Approved) {
            return Ok(CancelOutcome::InvalidStatus(slot.status));
        }

        if let Some(owner) = policy.owner_email
            && slot.user_email.as_deref() != Some(owner)
        {
            return Ok(CancelOutcome::NotOwner);
        }

        if let Some(cutoff) = policy.cutoff {
            let starts_at = slot.starts_at();
            if Utc::now().naive_utc() >= starts_at - cutoff {
                return Ok(CancelOutcome::WithinCutoff { starts_at });
            }
        }

        let canceled = sqlx::query_as::<_, Slot>(
            r#"
            UPDATE slots
            SET status = 'canceled', updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(CancelOutcome::Canceled(canceled))
    }

    /// Retire every active row whose window has fully passed to `completed`.
    ///
    /// Works in bounded batches with `SKIP LOCKED` so it never waits on rows
    /// an in-flight transition holds; a row transitioned and expired in the
    /// same instant is picked up by the next pass. Idempotent: completed rows
    /// fall out of the active predicate.
    #[instrument(skip(self), err)]
    pub async fn sweep_expired(&mut self, batch_size: i64) -> Result<u64> {
        let mut total = 0u64;

        loop {
            let batch = sqlx::query(
                r#"
                UPDATE slots
                SET status = 'completed', updated_at = now()
                WHERE id IN (
                    SELECT id FROM slots
                    WHERE status IN ('available', 'pending', 'approved')
                      AND booking_date + end_time < (now() AT TIME ZONE 'utc')
                    LIMIT $1
                    FOR UPDATE SKIP LOCKED
                )
                "#,
            )
            .bind(batch_size)
            .execute(&mut *self.db)
            .await?
            .rows_affected();

            total += batch;
            if batch < batch_size as u64 {
                break;
            }
        }

        Ok(total)
    }

    /// Discriminate a failed conditional transition: the row is either gone
    /// or sits in a status the transition does not start from.
    async fn transition_miss(&mut self, booking_id: SlotId) -> Result<TransitionOutcome> {
        let existing = sqlx::query_as::<_, Slot>("SELECT * FROM slots WHERE id = $1")
            .bind(booking_id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(match existing {
            None => TransitionOutcome::NotFound,
            Some(row) => TransitionOutcome::InvalidStatus(row.status),
        })
    }
}

/// Serialize schedule writers for one infrastructure/date.
///
/// `pg_advisory_xact_lock` is released automatically at transaction end, so
/// the lock covers exactly the overlap-check-plus-insert pair.
async fn lock_schedule(tx: &mut PgConnection, infrastructure_id: InfrastructureId, date: NaiveDate) -> Result<()> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1), hashtext($2))")
        .bind(infrastructure_id.to_string())
        .bind(date.to_string())
        .execute(tx)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::answers::AnswerCreateDBRequest;
    use crate::db::models::slots::{SlotKind, SlotStatus};
    use crate::test_utils::{
        count_active_slots, create_available_slot, create_test_infrastructure, create_test_question, insert_slot_raw,
        window_at_offset,
    };
    use sqlx::PgPool;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn tomorrow() -> NaiveDate {
        Utc::now().date_naive() + Duration::days(1)
    }

    fn booking_request(email: &str) -> BookingRequestDBRequest {
        BookingRequestDBRequest {
            user_email: email.to_string(),
            purpose: "calibration run".to_string(),
            answers: vec![],
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_overlap_symmetry_and_inactive_exclusion(pool: PgPool) {
        let infra = create_test_infrastructure(&pool).await;
        let date = tomorrow();
        let existing = create_available_slot(&pool, infra.id, date, t(10, 0), t(11, 0)).await;
        insert_slot_raw(
            &pool,
            infra.id,
            date,
            t(13, 0),
            t(14, 0),
            SlotKind::Booking,
            SlotStatus::Canceled,
            Some("someone@example.com"),
        )
        .await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Slots::new(&mut conn);

        // candidate straddling the active window collides
        assert!(repo.has_overlap(infra.id, date, t(10, 30), t(11, 30), None).await.unwrap());
        // and so does the mirrored direction
        assert!(repo.has_overlap(infra.id, date, t(9, 30), t(10, 30), None).await.unwrap());
        // back-to-back half-open windows do not
        assert!(!repo.has_overlap(infra.id, date, t(11, 0), t(12, 0), None).await.unwrap());
        // canceled rows are invisible to the validator
        assert!(!repo.has_overlap(infra.id, date, t(13, 30), t(14, 30), None).await.unwrap());
        // a row never collides with itself when excluded
        assert!(
            !repo
                .has_overlap(infra.id, date, t(10, 0), t(11, 0), Some(existing.id))
                .await
                .unwrap()
        );
        // other dates do not collide
        assert!(
            !repo
                .has_overlap(infra.id, date + Duration::days(1), t(10, 0), t(11, 0), None)
                .await
                .unwrap()
        );
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_rejects_overlapping_window(pool: PgPool) {
        let infra = create_test_infrastructure(&pool).await;
        let date = tomorrow();

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Slots::new(&mut conn);

        let first = SlotCreateDBRequest {
            infrastructure_id: infra.id,
            booking_date: date,
            start_time: t(9, 0),
            end_time: t(10, 0),
        };
        assert!(matches!(repo.create(&first).await.unwrap(), CreateOutcome::Created(_)));

        let colliding = SlotCreateDBRequest {
            start_time: t(9, 30),
            end_time: t(10, 30),
            ..first
        };
        assert!(matches!(repo.create(&colliding).await.unwrap(), CreateOutcome::Overlap));

        assert_eq!(count_active_slots(&pool, infra.id, date).await, 1);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_batch_creates_then_skips_on_repeat(pool: PgPool) {
        let infra = create_test_infrastructure(&pool).await;
        let date = tomorrow();

        let request = BatchCreateDBRequest {
            infrastructure_id: infra.id,
            start_date: date,
            end_date: date,
            daily_start_time: t(9, 0),
            slot_duration_minutes: 60,
            slots_per_day: 3,
        };
        let windows = request.windows(Utc::now().date_naive()).unwrap();

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Slots::new(&mut conn);

        assert_eq!(repo.create_batch(&request, &windows).await.unwrap(), (3, 0));

        let published = repo.list_available(infra.id, Some(date)).await.unwrap();
        let ladder: Vec<(NaiveTime, NaiveTime)> = published.iter().map(|s| (s.start_time, s.end_time)).collect();
        assert_eq!(ladder, vec![(t(9, 0), t(10, 0)), (t(10, 0), t(11, 0)), (t(11, 0), t(12, 0))]);

        // the identical call finds every window occupied
        assert_eq!(repo.create_batch(&request, &windows).await.unwrap(), (0, 3));
        assert_eq!(count_active_slots(&pool, infra.id, date).await, 3);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_request_booking_claims_exactly_once(pool: PgPool) {
        let infra = create_test_infrastructure(&pool).await;
        let slot = create_available_slot(&pool, infra.id, tomorrow(), t(10, 0), t(11, 0)).await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Slots::new(&mut conn);

        let claimed = match repo.request_booking(slot.id, &booking_request("ada@example.com")).await.unwrap() {
            ClaimOutcome::Claimed(slot) => slot,
            other => panic!("expected claim to succeed, got {other:?}"),
        };
        assert_eq!(claimed.kind, SlotKind::Booking);
        assert_eq!(claimed.status, SlotStatus::Pending);
        assert_eq!(claimed.user_email.as_deref(), Some("ada@example.com"));

        // second claimant loses
        match repo.request_booking(slot.id, &booking_request("grace@example.com")).await.unwrap() {
            ClaimOutcome::Unavailable { status, .. } => assert_eq!(status, SlotStatus::Pending),
            other => panic!("expected the slot to be claimed already, got {other:?}"),
        }

        // unknown ids resolve to NotFound
        assert!(matches!(
            repo.request_booking(Uuid::new_v4(), &booking_request("ada@example.com"))
                .await
                .unwrap(),
            ClaimOutcome::NotFound
        ));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_concurrent_claims_have_a_single_winner(pool: PgPool) {
        let infra = create_test_infrastructure(&pool).await;
        let slot = create_available_slot(&pool, infra.id, tomorrow(), t(10, 0), t(11, 0)).await;

        let mut handles = Vec::new();
        for i in 0..5 {
            let pool = pool.clone();
            let slot_id = slot.id;
            handles.push(tokio::spawn(async move {
                let mut conn = pool.acquire().await.unwrap();
                let mut repo = Slots::new(&mut conn);
                let request = booking_request(&format!("user{i}@example.com"));
                matches!(repo.request_booking(slot_id, &request).await.unwrap(), ClaimOutcome::Claimed(_))
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_request_booking_persists_answers(pool: PgPool) {
        let infra = create_test_infrastructure(&pool).await;
        let question = create_test_question(&pool, infra.id, true).await;
        let slot = create_available_slot(&pool, infra.id, tomorrow(), t(10, 0), t(11, 0)).await;

        let request = BookingRequestDBRequest {
            user_email: "ada@example.com".to_string(),
            purpose: "protein assay".to_string(),
            answers: vec![AnswerCreateDBRequest {
                question_id: question.id,
                text_value: Some("protein assay".to_string()),
                file_ref: None,
            }],
        };

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Slots::new(&mut conn);
        let claimed = match repo.request_booking(slot.id, &request).await.unwrap() {
            ClaimOutcome::Claimed(slot) => slot,
            other => panic!("expected claim to succeed, got {other:?}"),
        };

        let mut answers = Answers::new(&mut conn);
        let stored = answers.list_for_booking(claimed.id).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].question_id, question.id);
        assert_eq!(stored[0].text_value.as_deref(), Some("protein assay"));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_approve_requires_pending(pool: PgPool) {
        let infra = create_test_infrastructure(&pool).await;
        let slot = create_available_slot(&pool, infra.id, tomorrow(), t(10, 0), t(11, 0)).await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Slots::new(&mut conn);

        // approving an unclaimed timeslot is an invalid transition
        match repo.approve(slot.id).await.unwrap() {
            TransitionOutcome::InvalidStatus(status) => assert_eq!(status, SlotStatus::Available),
            other => panic!("expected invalid status, got {other:?}"),
        }

        repo.request_booking(slot.id, &booking_request("ada@example.com")).await.unwrap();

        let approved = match repo.approve(slot.id).await.unwrap() {
            TransitionOutcome::Applied(slot) => slot,
            other => panic!("expected approval to apply, got {other:?}"),
        };
        assert_eq!(approved.status, SlotStatus::Approved);

        // approved is terminal for the approve operation
        assert!(matches!(
            repo.approve(slot.id).await.unwrap(),
            TransitionOutcome::InvalidStatus(SlotStatus::Approved)
        ));
        assert!(matches!(repo.approve(Uuid::new_v4()).await.unwrap(), TransitionOutcome::NotFound));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_reject_regenerates_exactly_one_slot(pool: PgPool) {
        let infra = create_test_infrastructure(&pool).await;
        let date = tomorrow();
        let slot = create_available_slot(&pool, infra.id, date, t(10, 0), t(11, 0)).await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Slots::new(&mut conn);
        repo.request_booking(slot.id, &booking_request("ada@example.com")).await.unwrap();
        assert_eq!(count_active_slots(&pool, infra.id, date).await, 1);

        let (booking, replacement) = match repo.reject(slot.id).await.unwrap() {
            RejectOutcome::Rejected { booking, replacement } => (booking, replacement),
            other => panic!("expected rejection to apply, got {other:?}"),
        };

        assert_eq!(booking.status, SlotStatus::Rejected);
        assert_ne!(replacement.id, booking.id);
        assert_eq!(replacement.kind, SlotKind::Timeslot);
        assert_eq!(replacement.status, SlotStatus::Available);
        assert_eq!(
            (replacement.booking_date, replacement.start_time, replacement.end_time),
            (date, t(10, 0), t(11, 0))
        );

        // the pool regained exactly the window the booking held
        assert_eq!(count_active_slots(&pool, infra.id, date).await, 1);

        // a second reject finds the row already terminal
        assert!(matches!(
            repo.reject(slot.id).await.unwrap(),
            RejectOutcome::InvalidStatus(SlotStatus::Rejected)
        ));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_cancel_cutoff_enforcement(pool: PgPool) {
        let infra = create_test_infrastructure(&pool).await;
        let (date, start, end) = window_at_offset(23);
        let slot = insert_slot_raw(
            &pool,
            infra.id,
            date,
            start,
            end,
            SlotKind::Booking,
            SlotStatus::Pending,
            Some("ada@example.com"),
        )
        .await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Slots::new(&mut conn);

        let user_policy = CancelPolicy {
            owner_email: Some("ada@example.com"),
            cutoff: Some(Duration::hours(24)),
        };
        assert!(matches!(
            repo.cancel(slot.id, &user_policy).await.unwrap(),
            CancelOutcome::WithinCutoff { .. }
        ));

        // the manager policy carries no cutoff
        let canceled = match repo.cancel(slot.id, &CancelPolicy::default()).await.unwrap() {
            CancelOutcome::Canceled(slot) => slot,
            other => panic!("expected manager cancel to succeed, got {other:?}"),
        };
        assert_eq!(canceled.status, SlotStatus::Canceled);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_cancel_outside_cutoff_and_ownership(pool: PgPool) {
        let infra = create_test_infrastructure(&pool).await;
        let (date, start, end) = window_at_offset(72);
        let slot = insert_slot_raw(
            &pool,
            infra.id,
            date,
            start,
            end,
            SlotKind::Booking,
            SlotStatus::Approved,
            Some("ada@example.com"),
        )
        .await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Slots::new(&mut conn);

        let stranger_policy = CancelPolicy {
            owner_email: Some("mallory@example.com"),
            cutoff: Some(Duration::hours(24)),
        };
        assert!(matches!(repo.cancel(slot.id, &stranger_policy).await.unwrap(), CancelOutcome::NotOwner));

        let owner_policy = CancelPolicy {
            owner_email: Some("ada@example.com"),
            cutoff: Some(Duration::hours(24)),
        };
        let canceled = match repo.cancel(slot.id, &owner_policy).await.unwrap() {
            CancelOutcome::Canceled(slot) => slot,
            other => panic!("expected owner cancel to succeed, got {other:?}"),
        };
        assert_eq!(canceled.status, SlotStatus::Canceled);

        // canceling an approved booking does not re-offer the window
        assert_eq!(count_active_slots(&pool, infra.id, date).await, 0);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_cancel_invalid_from_available(pool: PgPool) {
        let infra = create_test_infrastructure(&pool).await;
        let slot = create_available_slot(&pool, infra.id, tomorrow(), t(10, 0), t(11, 0)).await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Slots::new(&mut conn);

        assert!(matches!(
            repo.cancel(slot.id, &CancelPolicy::default()).await.unwrap(),
            CancelOutcome::InvalidStatus(SlotStatus::Available)
        ));
        assert!(matches!(
            repo.cancel(Uuid::new_v4(), &CancelPolicy::default()).await.unwrap(),
            CancelOutcome::NotFound
        ));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_sweep_is_idempotent_and_spares_terminal_rows(pool: PgPool) {
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
        let already_canceled = insert_slot_raw(
            &pool,
            infra.id,
            yesterday,
            t(12, 0),
            t(13, 0),
            SlotKind::Booking,
            SlotStatus::Canceled,
            Some("grace@example.com"),
        )
        .await;
        // future rows stay untouched
        let upcoming = create_available_slot(&pool, infra.id, tomorrow(), t(10, 0), t(11, 0)).await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Slots::new(&mut conn);

        assert_eq!(repo.sweep_expired(100).await.unwrap(), 1);
        assert_eq!(repo.sweep_expired(100).await.unwrap(), 0);

        let swept = repo.get_by_id(expired.id).await.unwrap().unwrap();
        assert_eq!(swept.status, SlotStatus::Completed);
        let untouched = repo.get_by_id(already_canceled.id).await.unwrap().unwrap();
        assert_eq!(untouched.status, SlotStatus::Canceled);
        let future = repo.get_by_id(upcoming.id).await.unwrap().unwrap();
        assert_eq!(future.status, SlotStatus::Available);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_sweep_works_in_bounded_batches(pool: PgPool) {
        let infra = create_test_infrastructure(&pool).await;
        let yesterday = Utc::now().date_naive() - Duration::days(1);

        for hour in 8..13 {
            insert_slot_raw(
                &pool,
                infra.id,
                yesterday,
                t(hour, 0),
                t(hour, 30),
                SlotKind::Timeslot,
                SlotStatus::Available,
                None,
            )
            .await;
        }

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Slots::new(&mut conn);

        // batch size smaller than the backlog still retires everything
        assert_eq!(repo.sweep_expired(2).await.unwrap(), 5);
        assert_eq!(repo.sweep_expired(2).await.unwrap(), 0);
    }
}

