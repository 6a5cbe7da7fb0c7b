use serde_json::{json, Value};

use crate::models::cancellation::CancelReason;

pub const OTHER_NOTE_MAX_LEN: usize = 500;

/// A cancellation reason with its reason-specific details, parsed and
/// validated as a unit. The stored `details` column stays JSON but only holds
/// shapes this type has admitted.
#[derive(Debug, Clone, PartialEq)]
pub enum ReasonDetails {
    FoundJob,
    TooExpensive { willing_price_cents: Option<i64> },
    PlatformNotHelpful,
    NotEnoughRelevantJobs,
    DecidedNotToMove,
    Other { note: Option<String> },
}

impl ReasonDetails {
    /// Validates a reason/details pair from the wire. Reasons that take no
    /// details reject any payload; the rest admit only their own fields.
    pub fn parse(reason: CancelReason, details: Option<&Value>) -> Result<Self, Vec<String>> {
        match reason {
            CancelReason::TooExpensive => {
                let willing_price_cents = match field(details, "willing_price_cents") {
                    None => None,
                    Some(v) => match v.as_i64() {
                        Some(cents) if cents >= 0 => Some(cents),
                        _ => {
                            return Err(vec![
                                "details.willing_price_cents must be a non-negative integer"
                                    .to_string(),
                            ])
                        }
                    },
                };
                reject_unknown_fields(details, &["willing_price_cents"])?;
                Ok(ReasonDetails::TooExpensive { willing_price_cents })
            }
            CancelReason::Other => {
                let note = match field(details, "other") {
                    None => None,
                    Some(v) => match v.as_str() {
                        Some(s) if s.trim().is_empty() => None,
                        Some(s) if s.chars().count() <= OTHER_NOTE_MAX_LEN => {
                            Some(s.trim().to_string())
                        }
                        Some(_) => {
                            return Err(vec![format!(
                                "details.other must be at most {OTHER_NOTE_MAX_LEN} characters"
                            )])
                        }
                        None => return Err(vec!["details.other must be a string".to_string()]),
                    },
                };
                reject_unknown_fields(details, &["other"])?;
                Ok(ReasonDetails::Other { note })
            }
            CancelReason::FoundJob => {
                reject_unknown_fields(details, &[])?;
                Ok(ReasonDetails::FoundJob)
            }
            CancelReason::PlatformNotHelpful => {
                reject_unknown_fields(details, &[])?;
                Ok(ReasonDetails::PlatformNotHelpful)
            }
            CancelReason::NotEnoughRelevantJobs => {
                reject_unknown_fields(details, &[])?;
                Ok(ReasonDetails::NotEnoughRelevantJobs)
            }
            CancelReason::DecidedNotToMove => {
                reject_unknown_fields(details, &[])?;
                Ok(ReasonDetails::DecidedNotToMove)
            }
        }
    }

    pub fn reason(&self) -> CancelReason {
        match self {
            ReasonDetails::FoundJob => CancelReason::FoundJob,
            ReasonDetails::TooExpensive { .. } => CancelReason::TooExpensive,
            ReasonDetails::PlatformNotHelpful => CancelReason::PlatformNotHelpful,
            ReasonDetails::NotEnoughRelevantJobs => CancelReason::NotEnoughRelevantJobs,
            ReasonDetails::DecidedNotToMove => CancelReason::DecidedNotToMove,
            ReasonDetails::Other { .. } => CancelReason::Other,
        }
    }

    /// The JSON stored in the `details` column.
    pub fn to_details_json(&self) -> Value {
        match self {
            ReasonDetails::TooExpensive {
                willing_price_cents: Some(cents),
            } => json!({ "willing_price_cents": cents }),
            ReasonDetails::Other { note: Some(note) } => json!({ "other": note }),
            _ => json!({}),
        }
    }
}

fn field<'a>(details: Option<&'a Value>, key: &str) -> Option<&'a Value> {
    details.and_then(|d| d.get(key)).filter(|v| !v.is_null())
}

fn reject_unknown_fields(details: Option<&Value>, allowed: &[&str]) -> Result<(), Vec<String>> {
    match details {
        None => Ok(()),
        Some(Value::Object(map)) => {
            let unknown: Vec<String> = map
                .keys()
                .filter(|k| !allowed.contains(&k.as_str()))
                .map(|k| format!("details.{k} is not valid for this reason"))
                .collect();
            if unknown.is_empty() {
                Ok(())
            } else {
                Err(unknown)
            }
        }
        Some(_) => Err(vec!["details must be an object".to_string()]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_too_expensive_with_price() {
        let details = json!({ "willing_price_cents": 1500 });
        let parsed = ReasonDetails::parse(CancelReason::TooExpensive, Some(&details)).unwrap();
        assert_eq!(
            parsed,
            ReasonDetails::TooExpensive {
                willing_price_cents: Some(1500)
            }
        );
        assert_eq!(parsed.to_details_json(), details);
    }

    #[test]
    fn test_too_expensive_without_price() {
        let parsed = ReasonDetails::parse(CancelReason::TooExpensive, None).unwrap();
        assert_eq!(
            parsed,
            ReasonDetails::TooExpensive {
                willing_price_cents: None
            }
        );
        assert_eq!(parsed.to_details_json(), json!({}));
    }

    #[test]
    fn test_too_expensive_rejects_negative_price() {
        let details = json!({ "willing_price_cents": -5 });
        assert!(ReasonDetails::parse(CancelReason::TooExpensive, Some(&details)).is_err());
    }

    #[test]
    fn test_other_note_is_trimmed_and_kept() {
        let details = json!({ "other": "  switching careers  " });
        let parsed = ReasonDetails::parse(CancelReason::Other, Some(&details)).unwrap();
        assert_eq!(
            parsed,
            ReasonDetails::Other {
                note: Some("switching careers".to_string())
            }
        );
    }

    #[test]
    fn test_other_note_over_500_chars_fails() {
        let details = json!({ "other": "x".repeat(501) });
        let errors = ReasonDetails::parse(CancelReason::Other, Some(&details)).unwrap_err();
        assert_eq!(
            errors,
            vec!["details.other must be at most 500 characters"]
        );
    }

    #[test]
    fn test_plain_reason_rejects_details_payload() {
        let details = json!({ "willing_price_cents": 1500 });
        assert!(ReasonDetails::parse(CancelReason::DecidedNotToMove, Some(&details)).is_err());
    }

    #[test]
    fn test_unknown_detail_field_rejected() {
        let details = json!({ "note": "wrong key" });
        assert!(ReasonDetails::parse(CancelReason::Other, Some(&details)).is_err());
    }

    #[test]
    fn test_reason_round_trip() {
        let parsed = ReasonDetails::parse(CancelReason::FoundJob, None).unwrap();
        assert_eq!(parsed.reason(), CancelReason::FoundJob);
    }
}
