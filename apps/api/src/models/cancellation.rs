use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A/B pricing treatment. Sticky per user across repeated attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "UPPERCASE")]
pub enum Variant {
    A,
    B,
}

/// Which path the user declared at the start of the wizard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum FlowType {
    Standard,
    FoundJob,
    OfferAccepted,
}

/// Wizard step names as the UI knows them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "camelCase")]
#[sqlx(rename_all = "camelCase")]
pub enum Step {
    Start,
    Step1Offer,
    Step2OfferVariantA,
    Offer,
    Reason,
    FoundDetails,
    Downsell,
    SubscriptionCancelled,
    OfferAccepted,
    FoundJobStep1,
    FoundJobStep2,
    FoundJobStep3VariantA,
    FoundJobStep3VariantB,
    FoundJobCancelledNoHelp,
    FoundJobCancelledWithHelp,
}

/// Exit-survey reasons, as presented by the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
pub enum CancelReason {
    #[serde(rename = "Found a job")]
    #[sqlx(rename = "Found a job")]
    FoundJob,
    #[serde(rename = "Too expensive")]
    #[sqlx(rename = "Too expensive")]
    TooExpensive,
    #[serde(rename = "Platform not helpful")]
    #[sqlx(rename = "Platform not helpful")]
    PlatformNotHelpful,
    #[serde(rename = "Not enough relevant jobs")]
    #[sqlx(rename = "Not enough relevant jobs")]
    NotEnoughRelevantJobs,
    #[serde(rename = "Decided not to move")]
    #[sqlx(rename = "Decided not to move")]
    DecidedNotToMove,
    #[serde(rename = "Other")]
    #[sqlx(rename = "Other")]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
pub enum YesNo {
    Yes,
    No,
}

/// Answer buckets for "roles applied" / "companies emailed".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
pub enum AppliedBucket {
    #[serde(rename = "0")]
    #[sqlx(rename = "0")]
    Zero,
    #[serde(rename = "1-5")]
    #[sqlx(rename = "1-5")]
    OneToFive,
    #[serde(rename = "6-20")]
    #[sqlx(rename = "6-20")]
    SixToTwenty,
    #[serde(rename = "20+")]
    #[sqlx(rename = "20+")]
    TwentyPlus,
}

/// Answer buckets for "companies interviewed".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
pub enum InterviewBucket {
    #[serde(rename = "0")]
    #[sqlx(rename = "0")]
    Zero,
    #[serde(rename = "1-2")]
    #[sqlx(rename = "1-2")]
    OneToTwo,
    #[serde(rename = "3-5")]
    #[sqlx(rename = "3-5")]
    ThreeToFive,
    #[serde(rename = "5+")]
    #[sqlx(rename = "5+")]
    FivePlus,
}

/// One user's attempt to leave the subscription. Unresolved (`resolved_at`
/// null) means in flight; once resolved the row is immutable history.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Cancellation {
    pub id: Uuid,
    pub user_id: Uuid,
    pub subscription_id: Uuid,
    pub downsell_variant: Variant,
    pub flow_type: FlowType,
    pub current_step: Step,
    pub reason: Option<CancelReason>,
    pub accepted_downsell: bool,
    pub details: serde_json::Value,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Exit survey for the found-job flow, 1:1 with its cancellation. Columns are
/// nullable so partial wizard progress can be persisted before completion.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FoundJobSurvey {
    pub id: Uuid,
    pub cancellation_id: Uuid,
    pub via_migrate_mate: Option<YesNo>,
    pub roles_applied: Option<AppliedBucket>,
    pub companies_emailed: Option<AppliedBucket>,
    pub companies_interviewed: Option<InterviewBucket>,
    pub feedback: Option<String>,
    pub visa_lawyer: Option<YesNo>,
    pub visa_type: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
