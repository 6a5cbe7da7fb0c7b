use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::cancellations::reasons::ReasonDetails;
use crate::cancellations::steps::{final_step, flow_decision, next_actions};
use crate::cancellations::survey::{validate_found_job, FoundJobSurveyInput};
use crate::cancellations::variant::{assign_variant, discounted_price, CoinSource};
use crate::errors::{is_unique_violation, AppError};
use crate::models::cancellation::{Cancellation, FlowType, FoundJobSurvey, Step, Variant};
use crate::models::subscription::{Subscription, SubscriptionStatus};

/// Guard shared by every resolving mutation: a resolved cancellation is
/// immutable history and re-invocation surfaces as a conflict.
pub fn ensure_unresolved(cancellation: &Cancellation) -> Result<(), AppError> {
    if cancellation.resolved_at.is_some() {
        return Err(AppError::Conflict(format!(
            "Cancellation {} is already resolved",
            cancellation.id
        )));
    }
    Ok(())
}

pub async fn cancellation_by_id(
    db: &PgPool,
    id: Uuid,
) -> Result<Option<Cancellation>, sqlx::Error> {
    sqlx::query_as::<_, Cancellation>("SELECT * FROM cancellations WHERE id = $1")
        .bind(id)
        .fetch_optional(db)
        .await
}

pub async fn unresolved_for_user(
    db: &PgPool,
    user_id: Uuid,
) -> Result<Option<Cancellation>, sqlx::Error> {
    sqlx::query_as::<_, Cancellation>(
        "SELECT * FROM cancellations WHERE user_id = $1 AND resolved_at IS NULL LIMIT 1",
    )
    .bind(user_id)
    .fetch_optional(db)
    .await
}

pub async fn survey_for_cancellation(
    db: &PgPool,
    cancellation_id: Uuid,
) -> Result<Option<FoundJobSurvey>, sqlx::Error> {
    sqlx::query_as::<_, FoundJobSurvey>(
        "SELECT * FROM found_job_surveys WHERE cancellation_id = $1",
    )
    .bind(cancellation_id)
    .fetch_optional(db)
    .await
}

pub async fn subscription_for_user(
    db: &PgPool,
    user_id: Uuid,
) -> Result<Option<Subscription>, sqlx::Error> {
    sqlx::query_as::<_, Subscription>("SELECT * FROM subscriptions WHERE user_id = $1 LIMIT 1")
        .bind(user_id)
        .fetch_optional(db)
        .await
}

async fn required_cancellation(db: &PgPool, id: Uuid) -> Result<Cancellation, AppError> {
    cancellation_by_id(db, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Cancellation {id} not found")))
}

async fn set_subscription_status(
    conn: &mut PgConnection,
    subscription_id: Uuid,
    status: SubscriptionStatus,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE subscriptions SET status = $2, updated_at = now() WHERE id = $1")
        .bind(subscription_id)
        .bind(status)
        .execute(conn)
        .await?;
    Ok(())
}

/// Inserts or merges survey answers for a cancellation. Absent fields leave
/// previously saved answers untouched, so the wizard can save progress one
/// step at a time.
async fn upsert_survey(
    conn: &mut PgConnection,
    cancellation_id: Uuid,
    input: &FoundJobSurveyInput,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO found_job_surveys
            (cancellation_id, via_migrate_mate, roles_applied, companies_emailed,
             companies_interviewed, feedback, visa_lawyer, visa_type)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (cancellation_id) DO UPDATE SET
            via_migrate_mate = COALESCE(EXCLUDED.via_migrate_mate, found_job_surveys.via_migrate_mate),
            roles_applied = COALESCE(EXCLUDED.roles_applied, found_job_surveys.roles_applied),
            companies_emailed = COALESCE(EXCLUDED.companies_emailed, found_job_surveys.companies_emailed),
            companies_interviewed = COALESCE(EXCLUDED.companies_interviewed, found_job_surveys.companies_interviewed),
            feedback = COALESCE(EXCLUDED.feedback, found_job_surveys.feedback),
            visa_lawyer = COALESCE(EXCLUDED.visa_lawyer, found_job_surveys.visa_lawyer),
            visa_type = COALESCE(EXCLUDED.visa_type, found_job_surveys.visa_type),
            updated_at = now()
        "#,
    )
    .bind(cancellation_id)
    .bind(input.via_migrate_mate)
    .bind(input.roles_applied)
    .bind(input.companies_emailed)
    .bind(input.companies_interviewed)
    .bind(input.feedback.as_deref())
    .bind(input.visa_lawyer)
    .bind(input.visa_type.as_deref())
    .execute(conn)
    .await?;
    Ok(())
}

pub struct StartOutcome {
    pub cancellation_id: Uuid,
    pub variant: Variant,
    pub monthly_price: i32,
    pub discounted_price: i32,
    pub flow_type: FlowType,
    pub flow_decision: Step,
    /// True when an unresolved cancellation already existed and was returned
    /// instead of creating a new one.
    pub resumed: bool,
}

/// Starts (or resumes) a cancellation flow for a user.
///
/// At most one unresolved cancellation may exist per user: an existing one is
/// returned as-is, and a racing insert trips the partial unique index and
/// maps to a conflict. The subscription flip and the cancellation insert
/// commit as one transaction.
pub async fn start_cancellation(
    db: &PgPool,
    coins: &dyn CoinSource,
    user_id: Uuid,
    flow_type: FlowType,
) -> Result<StartOutcome, AppError> {
    if let Some(existing) = unresolved_for_user(db, user_id).await? {
        let subscription = sqlx::query_as::<_, Subscription>(
            "SELECT * FROM subscriptions WHERE id = $1",
        )
        .bind(existing.subscription_id)
        .fetch_one(db)
        .await?;

        return Ok(StartOutcome {
            cancellation_id: existing.id,
            variant: existing.downsell_variant,
            monthly_price: subscription.monthly_price,
            discounted_price: discounted_price(
                existing.downsell_variant,
                subscription.monthly_price,
            ),
            flow_type: existing.flow_type,
            flow_decision: flow_decision(existing.flow_type, coins),
            resumed: true,
        });
    }

    // Sticky variant: reuse whatever the most recent attempt recorded.
    let prior: Option<Variant> = sqlx::query_scalar(
        "SELECT downsell_variant FROM cancellations WHERE user_id = $1 \
         ORDER BY created_at DESC LIMIT 1",
    )
    .bind(user_id)
    .fetch_optional(db)
    .await?;

    let subscription = sqlx::query_as::<_, Subscription>(
        "SELECT * FROM subscriptions WHERE user_id = $1 \
         AND status IN ('active', 'pending_cancellation') LIMIT 1",
    )
    .bind(user_id)
    .fetch_optional(db)
    .await?
    .ok_or_else(|| {
        AppError::NotFound(format!(
            "No active or pending-cancellation subscription for user {user_id}"
        ))
    })?;

    let variant = assign_variant(prior, coins);

    let mut tx = db.begin().await?;
    set_subscription_status(
        &mut tx,
        subscription.id,
        SubscriptionStatus::PendingCancellation,
    )
    .await?;
    let insert = sqlx::query_scalar::<_, Uuid>(
        r#"
        INSERT INTO cancellations (user_id, subscription_id, downsell_variant, flow_type)
        VALUES ($1, $2, $3, $4)
        RETURNING id
        "#,
    )
    .bind(user_id)
    .bind(subscription.id)
    .bind(variant)
    .bind(flow_type)
    .fetch_one(&mut *tx)
    .await;
    let cancellation_id = match insert {
        Ok(id) => id,
        Err(e) if is_unique_violation(&e) => {
            // Lost the race to a concurrent start; the transaction rolls back
            // on drop.
            return Err(AppError::Conflict(format!(
                "User {user_id} already has a cancellation in progress"
            )));
        }
        Err(e) => return Err(e.into()),
    };
    tx.commit().await?;

    Ok(StartOutcome {
        cancellation_id,
        variant,
        monthly_price: subscription.monthly_price,
        discounted_price: discounted_price(variant, subscription.monthly_price),
        flow_type,
        flow_decision: flow_decision(flow_type, coins),
        resumed: false,
    })
}

pub struct CompletionOutcome {
    pub cancellation_id: Uuid,
    pub flow_type: FlowType,
    pub final_step: Step,
    pub next_actions: Vec<&'static str>,
}

/// Completes the found-job flow: validates the full survey, persists it,
/// resolves the cancellation, and cancels the subscription, all in one
/// transaction.
pub async fn complete_found_job(
    db: &PgPool,
    cancellation_id: Uuid,
    input: &FoundJobSurveyInput,
) -> Result<CompletionOutcome, AppError> {
    let valid = validate_found_job(input).map_err(AppError::Validation)?;
    let cancellation = required_cancellation(db, cancellation_id).await?;
    ensure_unresolved(&cancellation)?;

    let step = final_step(valid.visa_lawyer);
    let full = FoundJobSurveyInput {
        via_migrate_mate: Some(valid.via_migrate_mate),
        roles_applied: Some(valid.roles_applied),
        companies_emailed: Some(valid.companies_emailed),
        companies_interviewed: Some(valid.companies_interviewed),
        feedback: Some(valid.feedback.clone()),
        visa_lawyer: Some(valid.visa_lawyer),
        visa_type: valid.visa_type.clone(),
    };

    let mut tx = db.begin().await?;
    upsert_survey(&mut tx, cancellation_id, &full).await?;
    sqlx::query(
        "UPDATE cancellations SET resolved_at = now(), flow_type = $2, current_step = $3 \
         WHERE id = $1",
    )
    .bind(cancellation_id)
    .bind(FlowType::FoundJob)
    .bind(step)
    .execute(&mut *tx)
    .await?;
    set_subscription_status(&mut tx, cancellation.subscription_id, SubscriptionStatus::Cancelled)
        .await?;
    tx.commit().await?;

    Ok(CompletionOutcome {
        cancellation_id,
        flow_type: FlowType::FoundJob,
        final_step: step,
        next_actions: next_actions(step),
    })
}

/// The user took the discounted offer: resolve the cancellation as
/// `offer_accepted` and reactivate the subscription.
pub async fn accept_downsell(db: &PgPool, cancellation_id: Uuid) -> Result<(), AppError> {
    let cancellation = required_cancellation(db, cancellation_id).await?;
    ensure_unresolved(&cancellation)?;

    let mut tx = db.begin().await?;
    sqlx::query(
        "UPDATE cancellations SET accepted_downsell = true, flow_type = $2, \
         current_step = $3, resolved_at = now() WHERE id = $1",
    )
    .bind(cancellation_id)
    .bind(FlowType::OfferAccepted)
    .bind(Step::OfferAccepted)
    .execute(&mut *tx)
    .await?;
    set_subscription_status(&mut tx, cancellation.subscription_id, SubscriptionStatus::Active)
        .await?;
    tx.commit().await?;
    Ok(())
}

/// Records that the offer was declined without ending the flow; the wizard
/// moves on to the reason step.
pub async fn record_downsell_declined(db: &PgPool, cancellation_id: Uuid) -> Result<(), AppError> {
    let cancellation = required_cancellation(db, cancellation_id).await?;
    ensure_unresolved(&cancellation)?;

    sqlx::query("UPDATE cancellations SET accepted_downsell = false WHERE id = $1")
        .bind(cancellation_id)
        .execute(db)
        .await?;
    Ok(())
}

/// Declined offer with a stated reason: store the validated reason/details,
/// resolve the cancellation, and cancel the subscription.
pub async fn decline_to_standard_reason(
    db: &PgPool,
    cancellation_id: Uuid,
    reason: &ReasonDetails,
) -> Result<(), AppError> {
    let cancellation = required_cancellation(db, cancellation_id).await?;
    ensure_unresolved(&cancellation)?;

    let mut tx = db.begin().await?;
    sqlx::query(
        "UPDATE cancellations SET reason = $2, details = $3, accepted_downsell = false, \
         current_step = $4, resolved_at = now() WHERE id = $1",
    )
    .bind(cancellation_id)
    .bind(reason.reason())
    .bind(reason.to_details_json())
    .bind(Step::SubscriptionCancelled)
    .execute(&mut *tx)
    .await?;
    set_subscription_status(&mut tx, cancellation.subscription_id, SubscriptionStatus::Cancelled)
        .await?;
    tx.commit().await?;
    Ok(())
}

/// Standard-flow completion: resolve the cancellation and cancel the
/// subscription.
pub async fn complete_standard(db: &PgPool, cancellation_id: Uuid) -> Result<(), AppError> {
    let cancellation = required_cancellation(db, cancellation_id).await?;
    ensure_unresolved(&cancellation)?;

    let mut tx = db.begin().await?;
    sqlx::query(
        "UPDATE cancellations SET resolved_at = now(), current_step = $2 WHERE id = $1",
    )
    .bind(cancellation_id)
    .bind(Step::SubscriptionCancelled)
    .execute(&mut *tx)
    .await?;
    set_subscription_status(&mut tx, cancellation.subscription_id, SubscriptionStatus::Cancelled)
        .await?;
    tx.commit().await?;
    Ok(())
}

/// Partial update of an in-flight cancellation. Offer acceptance never
/// reaches here; the handler routes it through [`accept_downsell`].
#[derive(Debug, Default)]
pub struct CancellationUpdate {
    pub reason: Option<ReasonDetails>,
    pub accepted_downsell: Option<bool>,
    pub flow_type: Option<FlowType>,
    pub current_step: Option<Step>,
    pub survey: Option<FoundJobSurveyInput>,
}

pub async fn update_cancellation(
    db: &PgPool,
    cancellation_id: Uuid,
    update: CancellationUpdate,
) -> Result<(), AppError> {
    let cancellation = required_cancellation(db, cancellation_id).await?;
    ensure_unresolved(&cancellation)?;

    let mut tx = db.begin().await?;
    if let Some(reason) = &update.reason {
        sqlx::query("UPDATE cancellations SET reason = $2, details = $3 WHERE id = $1")
            .bind(cancellation_id)
            .bind(reason.reason())
            .bind(reason.to_details_json())
            .execute(&mut *tx)
            .await?;
    }
    if let Some(accepted) = update.accepted_downsell {
        sqlx::query("UPDATE cancellations SET accepted_downsell = $2 WHERE id = $1")
            .bind(cancellation_id)
            .bind(accepted)
            .execute(&mut *tx)
            .await?;
    }
    if let Some(flow_type) = update.flow_type {
        sqlx::query("UPDATE cancellations SET flow_type = $2 WHERE id = $1")
            .bind(cancellation_id)
            .bind(flow_type)
            .execute(&mut *tx)
            .await?;
    }
    if let Some(step) = update.current_step {
        sqlx::query("UPDATE cancellations SET current_step = $2 WHERE id = $1")
            .bind(cancellation_id)
            .bind(step)
            .execute(&mut *tx)
            .await?;
    }
    if let Some(survey) = &update.survey {
        upsert_survey(&mut tx, cancellation_id, survey).await?;
    }
    tx.commit().await?;
    Ok(())
}

/// Backs the user out entirely: subscription returns to `active` and any
/// unresolved cancellation is resolved in place (kept as history for
/// analytics). Calling twice is a no-op with the same end state.
pub async fn renew_subscription(db: &PgPool, user_id: Uuid) -> Result<(), AppError> {
    let subscription = subscription_for_user(db, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Subscription not found for user {user_id}")))?;

    let mut tx = db.begin().await?;
    set_subscription_status(&mut tx, subscription.id, SubscriptionStatus::Active).await?;
    sqlx::query(
        "UPDATE cancellations SET resolved_at = now() \
         WHERE user_id = $1 AND resolved_at IS NULL",
    )
    .bind(user_id)
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;
    Ok(())
}

/// Resolves a stale unresolved cancellation so the wizard can restart from
/// the beginning. Does not touch the subscription. Idempotent; returns the
/// resolved id when there was one.
pub async fn reset_modal_state(db: &PgPool, user_id: Uuid) -> Result<Option<Uuid>, AppError> {
    let resolved: Option<Uuid> = sqlx::query_scalar(
        "UPDATE cancellations SET resolved_at = now() \
         WHERE user_id = $1 AND resolved_at IS NULL RETURNING id",
    )
    .bind(user_id)
    .fetch_optional(db)
    .await?;
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn cancellation(resolved: bool) -> Cancellation {
        Cancellation {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            subscription_id: Uuid::new_v4(),
            downsell_variant: Variant::B,
            flow_type: FlowType::Standard,
            current_step: Step::Start,
            reason: None,
            accepted_downsell: false,
            details: serde_json::json!({}),
            resolved_at: resolved.then(Utc::now),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_unresolved_passes_guard() {
        assert!(ensure_unresolved(&cancellation(false)).is_ok());
    }

    #[test]
    fn test_resolved_is_conflict() {
        let err = ensure_unresolved(&cancellation(true)).unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }
}
