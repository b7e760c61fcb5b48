//! Payload decoder - converts broker message bodies into suspensions
//!
//! Decoding is a pure function of the body text so the dispatch path can
//! be tested without a broker.

use crate::error::DecodeError;
use crate::model::Suspension;

/// Decode one message body into a `Suspension`
///
/// Unknown fields are ignored. Every field of the suspension record is
/// required and identifiers must be non-empty.
pub fn decode_suspension(body: &str) -> Result<Suspension, DecodeError> {
    let suspension: Suspension = serde_json::from_str(body)?;

    if suspension.id.as_str().trim().is_empty() {
        return Err(DecodeError::InvalidField {
            field: "id",
            reason: "must not be empty".to_string(),
        });
    }

    if suspension.metro_line_id.as_str().trim().is_empty() {
        return Err(DecodeError::InvalidField {
            field: "metroLineId",
            reason: "must not be empty".to_string(),
        });
    }

    Ok(suspension)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SuspensionType;
    use chrono::{TimeZone, Utc};
    use rstest::rstest;

    const VALID: &str = r#"{
        "id": "s1",
        "metroLineId": "L1",
        "title": "X",
        "description": "Y",
        "suspensionType": "EMERGENCY",
        "expectedRestoreTime": "2025-01-01T10:00:00Z"
    }"#;

    #[test]
    fn test_decode_valid() {
        let suspension = decode_suspension(VALID).unwrap();

        assert_eq!(suspension.id.as_str(), "s1");
        assert_eq!(suspension.metro_line_id.as_str(), "L1");
        assert_eq!(suspension.title, "X");
        assert_eq!(suspension.description, "Y");
        assert_eq!(suspension.suspension_type, SuspensionType::Emergency);
        assert_eq!(
            suspension.expected_restore_time,
            Utc.with_ymd_and_hms(2025, 1, 1, 10, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_decode_numeric_ids_and_extra_fields() {
        let body = r#"{
            "id": 17,
            "metroLineId": 3,
            "title": "Line 3 closed",
            "description": "Signal failure",
            "suspensionType": "SCHEDULED",
            "expectedRestoreTime": "2025-06-30T22:15:00",
            "affectedStations": ["A", "B"]
        }"#;

        let suspension = decode_suspension(body).unwrap();
        assert_eq!(suspension.id.as_str(), "17");
        assert_eq!(suspension.metro_line_id.as_str(), "3");
        assert_eq!(suspension.suspension_type, SuspensionType::Scheduled);
    }

    #[rstest]
    #[case::not_json("definitely not json")]
    #[case::truncated(r#"{"id":"s1","#)]
    #[case::empty("")]
    fn test_malformed(#[case] body: &str) {
        assert!(matches!(
            decode_suspension(body),
            Err(DecodeError::Malformed(_))
        ));
    }

    #[rstest]
    #[case::missing_title(r#"{"id":"s1","metroLineId":"L1","description":"Y","suspensionType":"EMERGENCY","expectedRestoreTime":"2025-01-01T10:00:00Z"}"#)]
    #[case::bad_enum(r#"{"id":"s1","metroLineId":"L1","title":"X","description":"Y","suspensionType":"PLANNED","expectedRestoreTime":"2025-01-01T10:00:00Z"}"#)]
    #[case::bad_time(r#"{"id":"s1","metroLineId":"L1","title":"X","description":"Y","suspensionType":"EMERGENCY","expectedRestoreTime":"soon"}"#)]
    #[case::null_id(r#"{"id":null,"metroLineId":"L1","title":"X","description":"Y","suspensionType":"EMERGENCY","expectedRestoreTime":"2025-01-01T10:00:00Z"}"#)]
    #[case::array("[]")]
    #[case::scalar("42")]
    fn test_schema_mismatch(#[case] body: &str) {
        assert!(matches!(
            decode_suspension(body),
            Err(DecodeError::Schema(_))
        ));
    }

    #[test]
    fn test_empty_identifiers_rejected() {
        let body = VALID.replace(r#""id": "s1""#, r#""id": "  ""#);
        assert_eq!(
            decode_suspension(&body).unwrap_err(),
            DecodeError::InvalidField {
                field: "id",
                reason: "must not be empty".to_string(),
            }
        );

        let body = VALID.replace(r#""metroLineId": "L1""#, r#""metroLineId": """#);
        assert!(matches!(
            decode_suspension(&body),
            Err(DecodeError::InvalidField { field: "metroLineId", .. })
        ));
    }

    proptest::proptest! {
        #[test]
        fn prop_decode_never_panics(body in ".*") {
            let _ = decode_suspension(&body);
        }
    }
}
