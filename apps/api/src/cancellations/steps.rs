use crate::cancellations::variant::CoinSource;
use crate::models::cancellation::{Cancellation, FlowType, FoundJobSurvey, Step, YesNo};

/// Entry decision made when a flow starts. The standard flow always lands on
/// the retention offer; the found-job flow skips it entirely for half of
/// users and sends them straight to the terminal cancelled state. That skip
/// is a product rule, not an accident.
pub fn flow_decision(flow_type: FlowType, coins: &dyn CoinSource) -> Step {
    match flow_type {
        FlowType::FoundJob => {
            if coins.flip() {
                Step::Step1Offer
            } else {
                Step::SubscriptionCancelled
            }
        }
        _ => Step::Step1Offer,
    }
}

/// Maps stored state to the step the wizard should resume on. Pure; rules
/// are evaluated top to bottom, first match wins.
pub fn compute_current_step(
    cancellation: Option<&Cancellation>,
    survey: Option<&FoundJobSurvey>,
) -> Step {
    let Some(cancellation) = cancellation else {
        return Step::Start;
    };

    if let Some(survey) = survey {
        let Some(via) = survey.via_migrate_mate else {
            return Step::FoundJobStep1;
        };
        if survey.feedback.is_none() {
            return Step::FoundJobStep2;
        }
        let Some(visa_lawyer) = survey.visa_lawyer else {
            // Step 3 copy differs by how the user found the job; the
            // branching itself is identical.
            return match via {
                YesNo::Yes => Step::FoundJobStep3VariantA,
                YesNo::No => Step::FoundJobStep3VariantB,
            };
        };
        if visa_lawyer == YesNo::No && survey.visa_type.is_none() {
            // Visa type still required; hold on step 3.
            return match via {
                YesNo::Yes => Step::FoundJobStep3VariantA,
                YesNo::No => Step::FoundJobStep3VariantB,
            };
        }
        return final_step(visa_lawyer);
    }

    if cancellation.flow_type == FlowType::FoundJob {
        return Step::FoundJobStep1;
    }

    cancellation.current_step
}

/// Terminal step for a completed found-job survey. "WithHelp" means the user
/// has no visa lawyer yet and gets the consultation follow-up.
pub fn final_step(visa_lawyer: YesNo) -> Step {
    match visa_lawyer {
        YesNo::Yes => Step::FoundJobCancelledNoHelp,
        YesNo::No => Step::FoundJobCancelledWithHelp,
    }
}

/// Follow-up actions the caller should surface after completion.
pub fn next_actions(step: Step) -> Vec<&'static str> {
    match step {
        Step::FoundJobCancelledNoHelp => vec!["Close modal", "Send confirmation email"],
        Step::FoundJobCancelledWithHelp => vec![
            "Close modal",
            "Send confirmation email",
            "Schedule visa consultation call",
        ],
        _ => vec!["Close modal"],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancellations::variant::{FixedCoinSource, SeededCoinSource};
    use crate::models::cancellation::{AppliedBucket, InterviewBucket, Variant};
    use chrono::Utc;
    use uuid::Uuid;

    fn cancellation(flow_type: FlowType, current_step: Step) -> Cancellation {
        Cancellation {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            subscription_id: Uuid::new_v4(),
            downsell_variant: Variant::A,
            flow_type,
            current_step,
            reason: None,
            accepted_downsell: false,
            details: serde_json::json!({}),
            resolved_at: None,
            created_at: Utc::now(),
        }
    }

    fn survey() -> FoundJobSurvey {
        FoundJobSurvey {
            id: Uuid::new_v4(),
            cancellation_id: Uuid::new_v4(),
            via_migrate_mate: None,
            roles_applied: Some(AppliedBucket::OneToFive),
            companies_emailed: Some(AppliedBucket::Zero),
            companies_interviewed: Some(InterviewBucket::OneToTwo),
            feedback: None,
            visa_lawyer: None,
            visa_type: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_standard_flow_always_offers() {
        for _ in 0..100 {
            assert_eq!(
                flow_decision(FlowType::Standard, &FixedCoinSource(false)),
                Step::Step1Offer
            );
            assert_eq!(
                flow_decision(FlowType::Standard, &FixedCoinSource(true)),
                Step::Step1Offer
            );
        }
    }

    #[test]
    fn test_found_job_flow_splits_roughly_even() {
        let coins = SeededCoinSource::new(11);
        let offers = (0..200)
            .filter(|_| flow_decision(FlowType::FoundJob, &coins) == Step::Step1Offer)
            .count();
        // 50/50 within +-15% at n=200
        assert!((70..=130).contains(&offers), "offers = {offers}");
    }

    #[test]
    fn test_no_cancellation_means_start() {
        assert_eq!(compute_current_step(None, None), Step::Start);
    }

    #[test]
    fn test_found_job_without_survey_is_step1() {
        let c = cancellation(FlowType::FoundJob, Step::Start);
        assert_eq!(compute_current_step(Some(&c), None), Step::FoundJobStep1);
    }

    #[test]
    fn test_survey_without_via_is_step1() {
        let c = cancellation(FlowType::FoundJob, Step::Start);
        let s = survey();
        assert_eq!(
            compute_current_step(Some(&c), Some(&s)),
            Step::FoundJobStep1
        );
    }

    #[test]
    fn test_survey_without_feedback_is_step2() {
        let c = cancellation(FlowType::FoundJob, Step::Start);
        let mut s = survey();
        s.via_migrate_mate = Some(YesNo::Yes);
        assert_eq!(
            compute_current_step(Some(&c), Some(&s)),
            Step::FoundJobStep2
        );
    }

    #[test]
    fn test_survey_without_visa_answer_is_step3_by_via() {
        let c = cancellation(FlowType::FoundJob, Step::Start);
        let mut s = survey();
        s.via_migrate_mate = Some(YesNo::Yes);
        s.feedback = Some("x".repeat(30));
        assert_eq!(
            compute_current_step(Some(&c), Some(&s)),
            Step::FoundJobStep3VariantA
        );

        s.via_migrate_mate = Some(YesNo::No);
        assert_eq!(
            compute_current_step(Some(&c), Some(&s)),
            Step::FoundJobStep3VariantB
        );
    }

    #[test]
    fn test_visa_no_without_type_holds_step3() {
        let c = cancellation(FlowType::FoundJob, Step::Start);
        let mut s = survey();
        s.via_migrate_mate = Some(YesNo::Yes);
        s.feedback = Some("x".repeat(30));
        s.visa_lawyer = Some(YesNo::No);
        assert_eq!(
            compute_current_step(Some(&c), Some(&s)),
            Step::FoundJobStep3VariantA
        );
    }

    #[test]
    fn test_complete_survey_reaches_terminals() {
        let c = cancellation(FlowType::FoundJob, Step::Start);
        let mut s = survey();
        s.via_migrate_mate = Some(YesNo::No);
        s.feedback = Some("x".repeat(30));
        s.visa_lawyer = Some(YesNo::No);
        s.visa_type = Some("H-1B".to_string());
        assert_eq!(
            compute_current_step(Some(&c), Some(&s)),
            Step::FoundJobCancelledWithHelp
        );

        s.visa_lawyer = Some(YesNo::Yes);
        s.visa_type = None;
        assert_eq!(
            compute_current_step(Some(&c), Some(&s)),
            Step::FoundJobCancelledNoHelp
        );
    }

    #[test]
    fn test_standard_flow_resumes_stored_step() {
        let c = cancellation(FlowType::Standard, Step::Reason);
        assert_eq!(compute_current_step(Some(&c), None), Step::Reason);
    }

    #[test]
    fn test_final_step_mapping() {
        assert_eq!(final_step(YesNo::Yes), Step::FoundJobCancelledNoHelp);
        assert_eq!(final_step(YesNo::No), Step::FoundJobCancelledWithHelp);
    }

    #[test]
    fn test_next_actions_include_consultation_for_with_help() {
        let with_help = next_actions(Step::FoundJobCancelledWithHelp);
        assert!(with_help.contains(&"Schedule visa consultation call"));
        let no_help = next_actions(Step::FoundJobCancelledNoHelp);
        assert!(!no_help.contains(&"Schedule visa consultation call"));
    }
}
