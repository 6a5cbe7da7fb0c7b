use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cancellations::handlers::UserIdQuery;
use crate::cancellations::transitions::{
    renew_subscription, subscription_for_user, unresolved_for_user,
};
use crate::errors::AppError;
use crate::models::cancellation::Cancellation;
use crate::models::subscription::SubscriptionStatus;
use crate::state::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptedOffer {
    pub has_accepted_offer: bool,
    pub accepted_downsell: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub success: bool,
    pub status: SubscriptionStatus,
    pub accepted_offer: Option<AcceptedOffer>,
}

/// GET /api/subscriptions/status?userId=
/// Effective status: an unresolved cancellation on an otherwise active
/// subscription reads as `pending_cancellation`.
pub async fn handle_status(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<StatusResponse>, AppError> {
    let subscription = subscription_for_user(&state.db, params.user_id)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!("Subscription not found for user {}", params.user_id))
        })?;

    let unresolved = unresolved_for_user(&state.db, params.user_id).await?;
    let accepted: Option<Cancellation> = sqlx::query_as(
        "SELECT * FROM cancellations WHERE user_id = $1 AND flow_type = 'offer_accepted' \
         AND resolved_at IS NOT NULL ORDER BY resolved_at DESC LIMIT 1",
    )
    .bind(params.user_id)
    .fetch_optional(&state.db)
    .await?;

    let status = if unresolved.is_some() && subscription.status == SubscriptionStatus::Active {
        SubscriptionStatus::PendingCancellation
    } else {
        subscription.status
    };

    Ok(Json(StatusResponse {
        success: true,
        status,
        accepted_offer: accepted.map(|c| AcceptedOffer {
            has_accepted_offer: true,
            accepted_downsell: c.accepted_downsell,
        }),
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenewRequest {
    pub user_id: Uuid,
}

#[derive(Serialize)]
pub struct RenewResponse {
    pub success: bool,
    pub message: &'static str,
    pub data: RenewData,
}

#[derive(Serialize)]
pub struct RenewData {
    pub status: SubscriptionStatus,
}

/// POST /api/subscriptions/renew
pub async fn handle_renew(
    State(state): State<AppState>,
    Json(req): Json<RenewRequest>,
) -> Result<Json<RenewResponse>, AppError> {
    renew_subscription(&state.db, req.user_id).await?;
    Ok(Json(RenewResponse {
        success: true,
        message: "Subscription renewed successfully",
        data: RenewData {
            status: SubscriptionStatus::Active,
        },
    }))
}
