use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::cancellations::analytics::{compute_analytics, CancellationAnalytics};
use crate::cancellations::reasons::ReasonDetails;
use crate::cancellations::steps::compute_current_step;
use crate::cancellations::survey::FoundJobSurveyInput;
use crate::cancellations::transitions::{
    accept_downsell, complete_found_job, complete_standard, decline_to_standard_reason,
    record_downsell_declined, reset_modal_state, start_cancellation, survey_for_cancellation,
    unresolved_for_user, update_cancellation, CancellationUpdate,
};
use crate::errors::AppError;
use crate::models::cancellation::{
    CancelReason, Cancellation, FlowType, FoundJobSurvey, Step, Variant,
};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct UserIdQuery {
    #[serde(rename = "userId")]
    pub user_id: Uuid,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartRequest {
    pub user_id: Uuid,
    pub flow_type: Option<FlowType>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartResponse {
    pub cancellation_id: Uuid,
    pub variant: Variant,
    pub monthly_price: i32,
    pub discounted_price: i32,
    pub flow_type: FlowType,
    pub flow_decision: Step,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
}

/// POST /api/cancellations/start
pub async fn handle_start(
    State(state): State<AppState>,
    Json(req): Json<StartRequest>,
) -> Result<Json<StartResponse>, AppError> {
    let flow_type = req.flow_type.unwrap_or(FlowType::Standard);
    if flow_type == FlowType::OfferAccepted {
        return Err(AppError::Validation(vec![
            "flowType must be \"standard\" or \"found_job\"".to_string(),
        ]));
    }

    let outcome =
        start_cancellation(&state.db, state.coins.as_ref(), req.user_id, flow_type).await?;
    Ok(Json(StartResponse {
        cancellation_id: outcome.cancellation_id,
        variant: outcome.variant,
        monthly_price: outcome.monthly_price,
        discounted_price: outcome.discounted_price,
        flow_type: outcome.flow_type,
        flow_decision: outcome.flow_decision,
        message: outcome
            .resumed
            .then_some("Returning existing active cancellation"),
    }))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateResponse {
    pub has_active_cancellation: bool,
    pub current_step: Step,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancellation_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub downsell_variant: Option<Variant>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flow_type: Option<FlowType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<CancelReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accepted_downsell: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    pub found_job_data: Option<FoundJobSurvey>,
}

/// GET /api/cancellations/state?userId=
/// Resume support: maps stored rows back to the step the wizard should show.
pub async fn handle_state(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<StateResponse>, AppError> {
    let cancellation = unresolved_for_user(&state.db, params.user_id).await?;
    let survey = match &cancellation {
        Some(c) => survey_for_cancellation(&state.db, c.id).await?,
        None => None,
    };
    let current_step = compute_current_step(cancellation.as_ref(), survey.as_ref());

    Ok(Json(match cancellation {
        None => StateResponse {
            has_active_cancellation: false,
            current_step,
            cancellation_id: None,
            downsell_variant: None,
            flow_type: None,
            reason: None,
            accepted_downsell: None,
            details: None,
            found_job_data: None,
        },
        Some(c) => StateResponse {
            has_active_cancellation: true,
            current_step,
            cancellation_id: Some(c.id),
            downsell_variant: Some(c.downsell_variant),
            flow_type: Some(c.flow_type),
            reason: c.reason,
            accepted_downsell: Some(c.accepted_downsell),
            details: Some(c.details),
            found_job_data: survey,
        },
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepUpdateRequest {
    pub cancellation_id: Uuid,
    pub current_step: Step,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepUpdateResponse {
    pub success: bool,
    pub current_step: Step,
}

/// POST /api/cancellations/step
pub async fn handle_step(
    State(state): State<AppState>,
    Json(req): Json<StepUpdateRequest>,
) -> Result<Json<StepUpdateResponse>, AppError> {
    update_cancellation(
        &state.db,
        req.cancellation_id,
        CancellationUpdate {
            current_step: Some(req.current_step),
            ..Default::default()
        },
    )
    .await?;
    Ok(Json(StepUpdateResponse {
        success: true,
        current_step: req.current_step,
    }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CancellationUpdateRequest {
    pub reason: Option<CancelReason>,
    pub details: Option<Value>,
    pub accepted_downsell: Option<bool>,
    pub flow_type: Option<FlowType>,
    pub current_step: Option<Step>,
    pub found_job_data: Option<FoundJobSurveyInput>,
}

#[derive(Serialize)]
pub struct OkResponse {
    pub ok: bool,
}

/// PATCH /api/cancellations/:id
pub async fn handle_update(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<CancellationUpdateRequest>,
) -> Result<Json<OkResponse>, AppError> {
    if req.details.is_some() && req.reason.is_none() {
        return Err(AppError::Validation(vec![
            "reason is required when details are provided".to_string(),
        ]));
    }
    let reason = req
        .reason
        .map(|r| ReasonDetails::parse(r, req.details.as_ref()))
        .transpose()
        .map_err(AppError::Validation)?;

    let accepting_offer = req.flow_type == Some(FlowType::OfferAccepted);
    update_cancellation(
        &state.db,
        id,
        CancellationUpdate {
            reason,
            accepted_downsell: req.accepted_downsell,
            flow_type: req.flow_type.filter(|_| !accepting_offer),
            current_step: req.current_step,
            survey: req.found_job_data,
        },
    )
    .await?;
    if accepting_offer {
        accept_downsell(&state.db, id).await?;
    }
    Ok(Json(OkResponse { ok: true }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownsellRequest {
    pub cancellation_id: Uuid,
    pub accepted: bool,
    pub reason: Option<CancelReason>,
    pub details: Option<Value>,
}

#[derive(Serialize)]
pub struct DownsellResponse {
    pub success: bool,
    pub message: &'static str,
    pub data: DownsellData,
}

#[derive(Serialize)]
pub struct DownsellData {
    pub accepted: bool,
}

/// POST /api/cancellations/downsell
/// Accepting resolves the flow and reactivates the subscription. Declining
/// with a reason completes the standard flow; declining without one only
/// records the refusal and lets the wizard continue.
pub async fn handle_downsell(
    State(state): State<AppState>,
    Json(req): Json<DownsellRequest>,
) -> Result<Json<DownsellResponse>, AppError> {
    let message = if req.accepted {
        accept_downsell(&state.db, req.cancellation_id).await?;
        "Downsell offer accepted successfully"
    } else if let Some(reason) = req.reason {
        let reason =
            ReasonDetails::parse(reason, req.details.as_ref()).map_err(AppError::Validation)?;
        decline_to_standard_reason(&state.db, req.cancellation_id, &reason).await?;
        "Downsell offer declined successfully"
    } else {
        record_downsell_declined(&state.db, req.cancellation_id).await?;
        "Downsell offer declined successfully"
    };

    Ok(Json(DownsellResponse {
        success: true,
        message,
        data: DownsellData {
            accepted: req.accepted,
        },
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FoundJobCompletionRequest {
    pub cancellation_id: Uuid,
    pub found_job_data: FoundJobSurveyInput,
}

#[derive(Serialize)]
pub struct FoundJobCompletionResponse {
    pub success: bool,
    pub data: FoundJobCompletionData,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FoundJobCompletionData {
    pub cancellation_id: Uuid,
    pub flow_type: FlowType,
    pub final_step: Step,
    pub next_actions: Vec<&'static str>,
}

/// POST /api/cancellations/found-job/complete
pub async fn handle_found_job_complete(
    State(state): State<AppState>,
    Json(req): Json<FoundJobCompletionRequest>,
) -> Result<Json<FoundJobCompletionResponse>, AppError> {
    let outcome =
        complete_found_job(&state.db, req.cancellation_id, &req.found_job_data).await?;
    Ok(Json(FoundJobCompletionResponse {
        success: true,
        data: FoundJobCompletionData {
            cancellation_id: outcome.cancellation_id,
            flow_type: outcome.flow_type,
            final_step: outcome.final_step,
            next_actions: outcome.next_actions,
        },
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteRequest {
    pub cancellation_id: Uuid,
}

#[derive(Serialize)]
pub struct CompleteResponse {
    pub success: bool,
    pub message: &'static str,
    pub data: StatusData,
}

#[derive(Serialize)]
pub struct StatusData {
    pub status: &'static str,
}

/// POST /api/cancellations/complete
pub async fn handle_complete(
    State(state): State<AppState>,
    Json(req): Json<CompleteRequest>,
) -> Result<Json<CompleteResponse>, AppError> {
    complete_standard(&state.db, req.cancellation_id).await?;
    Ok(Json(CompleteResponse {
        success: true,
        message: "Cancellation completed successfully",
        data: StatusData {
            status: "cancelled",
        },
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetRequest {
    pub user_id: Uuid,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetResponse {
    pub success: bool,
    pub message: &'static str,
    pub cancellation_id: Option<Uuid>,
}

/// POST /api/cancellations/reset
pub async fn handle_reset(
    State(state): State<AppState>,
    Json(req): Json<ResetRequest>,
) -> Result<Json<ResetResponse>, AppError> {
    let cancellation_id = reset_modal_state(&state.db, req.user_id).await?;
    Ok(Json(ResetResponse {
        success: true,
        message: "Modal state reset successfully",
        cancellation_id,
    }))
}

#[derive(Serialize)]
pub struct AnalyticsResponse {
    pub success: bool,
    pub data: CancellationAnalytics,
}

/// GET /api/cancellations/analytics
pub async fn handle_analytics(
    State(state): State<AppState>,
) -> Result<Json<AnalyticsResponse>, AppError> {
    let cancellations: Vec<Cancellation> = sqlx::query_as("SELECT * FROM cancellations")
        .fetch_all(&state.db)
        .await?;
    let surveys: Vec<FoundJobSurvey> = sqlx::query_as("SELECT * FROM found_job_surveys")
        .fetch_all(&state.db)
        .await?;
    Ok(Json(AnalyticsResponse {
        success: true,
        data: compute_analytics(&cancellations, &surveys),
    }))
}
