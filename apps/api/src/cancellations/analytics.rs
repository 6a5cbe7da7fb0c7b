use serde::Serialize;

use crate::models::cancellation::{Cancellation, FlowType, FoundJobSurvey, Variant, YesNo};

#[derive(Debug, Default, PartialEq, Serialize)]
pub struct FlowTypeBreakdown {
    pub standard: usize,
    pub found_job: usize,
    pub offer_accepted: usize,
}

#[derive(Debug, Default, PartialEq, Serialize)]
pub struct VariantBreakdown {
    #[serde(rename = "A")]
    pub a: usize,
    #[serde(rename = "B")]
    pub b: usize,
}

#[derive(Debug, Default, PartialEq, Serialize)]
pub struct YesNoBreakdown {
    #[serde(rename = "Yes")]
    pub yes: usize,
    #[serde(rename = "No")]
    pub no: usize,
}

#[derive(Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FoundJobStats {
    pub total: usize,
    pub via_migrate_mate: YesNoBreakdown,
    pub visa_lawyer: YesNoBreakdown,
    pub average_feedback_length: usize,
}

#[derive(Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionRates {
    pub offer_accepted: f64,
    pub direct_cancellation: f64,
    pub found_job_cancellation: f64,
}

#[derive(Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancellationAnalytics {
    pub total_cancellations: usize,
    pub by_flow_type: FlowTypeBreakdown,
    pub by_variant: VariantBreakdown,
    pub found_job_stats: FoundJobStats,
    pub conversion_rates: ConversionRates,
}

/// Aggregates all cancellation and survey rows into the analytics report.
/// Pure; rates over an empty set come out as zero rather than NaN.
pub fn compute_analytics(
    cancellations: &[Cancellation],
    surveys: &[FoundJobSurvey],
) -> CancellationAnalytics {
    let mut by_flow_type = FlowTypeBreakdown::default();
    let mut by_variant = VariantBreakdown::default();

    for c in cancellations {
        match c.flow_type {
            FlowType::Standard => by_flow_type.standard += 1,
            FlowType::FoundJob => by_flow_type.found_job += 1,
            FlowType::OfferAccepted => by_flow_type.offer_accepted += 1,
        }
        match c.downsell_variant {
            Variant::A => by_variant.a += 1,
            Variant::B => by_variant.b += 1,
        }
    }

    let mut found_job_stats = FoundJobStats {
        total: surveys.len(),
        ..Default::default()
    };
    let mut total_feedback_length = 0usize;
    for s in surveys {
        match s.via_migrate_mate {
            Some(YesNo::Yes) => found_job_stats.via_migrate_mate.yes += 1,
            Some(YesNo::No) => found_job_stats.via_migrate_mate.no += 1,
            None => {}
        }
        match s.visa_lawyer {
            Some(YesNo::Yes) => found_job_stats.visa_lawyer.yes += 1,
            Some(YesNo::No) => found_job_stats.visa_lawyer.no += 1,
            None => {}
        }
        total_feedback_length += s.feedback.as_ref().map_or(0, |f| f.chars().count());
    }
    if found_job_stats.total > 0 {
        found_job_stats.average_feedback_length =
            (total_feedback_length as f64 / found_job_stats.total as f64).round() as usize;
    }

    let total = cancellations.len();
    let rate = |n: usize| {
        if total == 0 {
            0.0
        } else {
            n as f64 / total as f64
        }
    };
    let conversion_rates = ConversionRates {
        offer_accepted: rate(by_flow_type.offer_accepted),
        direct_cancellation: rate(by_flow_type.standard + by_flow_type.found_job),
        found_job_cancellation: rate(by_flow_type.found_job),
    };

    CancellationAnalytics {
        total_cancellations: total,
        by_flow_type,
        by_variant,
        found_job_stats,
        conversion_rates,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::cancellation::Step;
    use chrono::Utc;
    use uuid::Uuid;

    fn cancellation(flow_type: FlowType, variant: Variant) -> Cancellation {
        Cancellation {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            subscription_id: Uuid::new_v4(),
            downsell_variant: variant,
            flow_type,
            current_step: Step::Start,
            reason: None,
            accepted_downsell: false,
            details: serde_json::json!({}),
            resolved_at: None,
            created_at: Utc::now(),
        }
    }

    fn survey(via: YesNo, visa: YesNo, feedback_len: usize) -> FoundJobSurvey {
        FoundJobSurvey {
            id: Uuid::new_v4(),
            cancellation_id: Uuid::new_v4(),
            via_migrate_mate: Some(via),
            roles_applied: None,
            companies_emailed: None,
            companies_interviewed: None,
            feedback: Some("x".repeat(feedback_len)),
            visa_lawyer: Some(visa),
            visa_type: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_empty_input_is_all_zero() {
        let report = compute_analytics(&[], &[]);
        assert_eq!(report, CancellationAnalytics::default());
    }

    #[test]
    fn test_mixed_fixture_breakdowns() {
        let cancellations = vec![
            cancellation(FlowType::Standard, Variant::A),
            cancellation(FlowType::Standard, Variant::B),
            cancellation(FlowType::FoundJob, Variant::A),
            cancellation(FlowType::OfferAccepted, Variant::B),
        ];
        let surveys = vec![
            survey(YesNo::Yes, YesNo::No, 30),
            survey(YesNo::No, YesNo::Yes, 50),
        ];

        let report = compute_analytics(&cancellations, &surveys);
        assert_eq!(report.total_cancellations, 4);
        assert_eq!(report.by_flow_type.standard, 2);
        assert_eq!(report.by_flow_type.found_job, 1);
        assert_eq!(report.by_flow_type.offer_accepted, 1);
        assert_eq!(report.by_variant.a, 2);
        assert_eq!(report.by_variant.b, 2);
        assert_eq!(report.found_job_stats.total, 2);
        assert_eq!(report.found_job_stats.via_migrate_mate.yes, 1);
        assert_eq!(report.found_job_stats.via_migrate_mate.no, 1);
        assert_eq!(report.found_job_stats.visa_lawyer.yes, 1);
        assert_eq!(report.found_job_stats.visa_lawyer.no, 1);
        assert_eq!(report.found_job_stats.average_feedback_length, 40);
    }

    #[test]
    fn test_conversion_rates() {
        let cancellations = vec![
            cancellation(FlowType::Standard, Variant::A),
            cancellation(FlowType::FoundJob, Variant::A),
            cancellation(FlowType::OfferAccepted, Variant::B),
            cancellation(FlowType::OfferAccepted, Variant::B),
        ];
        let report = compute_analytics(&cancellations, &[]);
        assert_eq!(report.conversion_rates.offer_accepted, 0.5);
        assert_eq!(report.conversion_rates.direct_cancellation, 0.5);
        assert_eq!(report.conversion_rates.found_job_cancellation, 0.25);
    }
}
