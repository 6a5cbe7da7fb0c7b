use serde::Deserialize;

use crate::models::cancellation::{AppliedBucket, InterviewBucket, YesNo};

pub const FEEDBACK_MIN_LEN: usize = 25;
pub const FEEDBACK_MAX_LEN: usize = 1000;
pub const VISA_TYPE_MAX_LEN: usize = 100;

/// Found-job survey payload as submitted by the wizard. All fields optional:
/// the same shape serves partial step saves and the final completion call,
/// which validates the full set via [`validate_found_job`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FoundJobSurveyInput {
    pub via_migrate_mate: Option<YesNo>,
    pub roles_applied: Option<AppliedBucket>,
    pub companies_emailed: Option<AppliedBucket>,
    pub companies_interviewed: Option<InterviewBucket>,
    pub feedback: Option<String>,
    pub visa_lawyer: Option<YesNo>,
    pub visa_type: Option<String>,
}

/// A survey that passed completion validation: every answer present and in
/// range, visa type present when the user has no lawyer.
#[derive(Debug, Clone)]
pub struct ValidFoundJobSurvey {
    pub via_migrate_mate: YesNo,
    pub roles_applied: AppliedBucket,
    pub companies_emailed: AppliedBucket,
    pub companies_interviewed: InterviewBucket,
    pub feedback: String,
    pub visa_lawyer: YesNo,
    pub visa_type: Option<String>,
}

/// Validates a survey for completion, collecting every failing field rather
/// than stopping at the first.
pub fn validate_found_job(input: &FoundJobSurveyInput) -> Result<ValidFoundJobSurvey, Vec<String>> {
    let mut errors = Vec::new();

    if input.via_migrate_mate.is_none() {
        errors.push("viaMigrateMate is required".to_string());
    }
    if input.roles_applied.is_none() {
        errors.push("rolesApplied is required".to_string());
    }
    if input.companies_emailed.is_none() {
        errors.push("companiesEmailed is required".to_string());
    }
    if input.companies_interviewed.is_none() {
        errors.push("companiesInterviewed is required".to_string());
    }
    if input.visa_lawyer.is_none() {
        errors.push("visaLawyer is required".to_string());
    }

    match &input.feedback {
        None => errors.push("feedback is required".to_string()),
        Some(feedback) => {
            let len = feedback.chars().count();
            if len < FEEDBACK_MIN_LEN {
                errors.push(format!(
                    "feedback must be at least {FEEDBACK_MIN_LEN} characters"
                ));
            }
            if len > FEEDBACK_MAX_LEN {
                errors.push(format!(
                    "feedback must be at most {FEEDBACK_MAX_LEN} characters"
                ));
            }
        }
    }

    let visa_type = input
        .visa_type
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string);

    if let Some(t) = &visa_type {
        if t.chars().count() > VISA_TYPE_MAX_LEN {
            errors.push(format!(
                "visaType must be at most {VISA_TYPE_MAX_LEN} characters"
            ));
        }
    }
    if input.visa_lawyer == Some(YesNo::No) && visa_type.is_none() {
        errors.push("visaType is required when visaLawyer is \"No\"".to_string());
    }

    match (
        input.via_migrate_mate,
        input.roles_applied,
        input.companies_emailed,
        input.companies_interviewed,
        &input.feedback,
        input.visa_lawyer,
    ) {
        (
            Some(via_migrate_mate),
            Some(roles_applied),
            Some(companies_emailed),
            Some(companies_interviewed),
            Some(feedback),
            Some(visa_lawyer),
        ) if errors.is_empty() => Ok(ValidFoundJobSurvey {
            via_migrate_mate,
            roles_applied,
            companies_emailed,
            companies_interviewed,
            feedback: feedback.clone(),
            visa_lawyer,
            visa_type,
        }),
        _ => Err(errors),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete_input() -> FoundJobSurveyInput {
        FoundJobSurveyInput {
            via_migrate_mate: Some(YesNo::Yes),
            roles_applied: Some(AppliedBucket::OneToFive),
            companies_emailed: Some(AppliedBucket::SixToTwenty),
            companies_interviewed: Some(InterviewBucket::ThreeToFive),
            feedback: Some("Found a great role through the platform, thanks!".to_string()),
            visa_lawyer: Some(YesNo::Yes),
            visa_type: None,
        }
    }

    #[test]
    fn test_complete_survey_passes() {
        assert!(validate_found_job(&complete_input()).is_ok());
    }

    #[test]
    fn test_empty_survey_reports_all_missing_fields() {
        let errors = validate_found_job(&FoundJobSurveyInput::default()).unwrap_err();
        assert_eq!(errors.len(), 6);
        assert!(errors.iter().any(|e| e.contains("viaMigrateMate")));
        assert!(errors.iter().any(|e| e.contains("feedback")));
    }

    #[test]
    fn test_feedback_length_24_fails() {
        let mut input = complete_input();
        input.feedback = Some("x".repeat(24));
        let errors = validate_found_job(&input).unwrap_err();
        assert_eq!(errors, vec!["feedback must be at least 25 characters"]);
    }

    #[test]
    fn test_feedback_length_25_passes() {
        let mut input = complete_input();
        input.feedback = Some("x".repeat(25));
        assert!(validate_found_job(&input).is_ok());
    }

    #[test]
    fn test_feedback_length_1000_passes() {
        let mut input = complete_input();
        input.feedback = Some("x".repeat(1000));
        assert!(validate_found_job(&input).is_ok());
    }

    #[test]
    fn test_feedback_length_1001_fails() {
        let mut input = complete_input();
        input.feedback = Some("x".repeat(1001));
        let errors = validate_found_job(&input).unwrap_err();
        assert_eq!(errors, vec!["feedback must be at most 1000 characters"]);
    }

    #[test]
    fn test_visa_no_without_type_fails() {
        let mut input = complete_input();
        input.visa_lawyer = Some(YesNo::No);
        input.visa_type = None;
        let errors = validate_found_job(&input).unwrap_err();
        assert_eq!(errors, vec!["visaType is required when visaLawyer is \"No\""]);
    }

    #[test]
    fn test_visa_no_with_blank_type_fails() {
        let mut input = complete_input();
        input.visa_lawyer = Some(YesNo::No);
        input.visa_type = Some("   ".to_string());
        assert!(validate_found_job(&input).is_err());
    }

    #[test]
    fn test_visa_no_with_type_passes() {
        let mut input = complete_input();
        input.visa_lawyer = Some(YesNo::No);
        input.visa_type = Some("H-1B".to_string());
        let valid = validate_found_job(&input).unwrap();
        assert_eq!(valid.visa_type.as_deref(), Some("H-1B"));
    }

    #[test]
    fn test_visa_type_over_100_chars_fails() {
        let mut input = complete_input();
        input.visa_lawyer = Some(YesNo::No);
        input.visa_type = Some("x".repeat(101));
        let errors = validate_found_job(&input).unwrap_err();
        assert_eq!(errors, vec!["visaType must be at most 100 characters"]);
    }
}
